use crate::matching_data::build_response;
use crate::protocol::{
    MatchingDataRequest, MatchingDataResponse, RecommendationsRequest, RecommendationsResponse,
    SchedulerEvent,
};
use crate::validate::validate_batch;
use myco_market::{MatchRecommendation, Market};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// Server-side endpoints for the three pub/sub topics under `external-myco/{sim_id}/` (spec
/// §4.8). The client (external process) holds the other end of each channel; in this
/// in-process crate that other end is whatever test or harness constructed the matching
/// `ExternalMatcherChannels` pair with `channel_pair()`.
#[derive(Debug)]
pub struct ExternalMatcherServer {
    matching_data_request_rx: mpsc::Receiver<MatchingDataRequest>,
    matching_data_response_tx: mpsc::Sender<MatchingDataResponse>,
    recommendations_request_rx: mpsc::Receiver<RecommendationsRequest>,
    recommendations_response_tx: mpsc::Sender<RecommendationsResponse>,
    events_tx: mpsc::Sender<SchedulerEvent>,
}

#[derive(Debug)]
pub struct ExternalMatcherClient {
    pub matching_data_request_tx: mpsc::Sender<MatchingDataRequest>,
    pub matching_data_response_rx: mpsc::Receiver<MatchingDataResponse>,
    pub recommendations_request_tx: mpsc::Sender<RecommendationsRequest>,
    pub recommendations_response_rx: mpsc::Receiver<RecommendationsResponse>,
    pub events_rx: mpsc::Receiver<SchedulerEvent>,
}

pub fn channel_pair() -> (ExternalMatcherServer, ExternalMatcherClient) {
    let (mdr_tx, mdr_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (mdresp_tx, mdresp_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (rr_tx, rr_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (rresp_tx, rresp_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (ev_tx, ev_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let server = ExternalMatcherServer {
        matching_data_request_rx: mdr_rx,
        matching_data_response_tx: mdresp_tx,
        recommendations_request_rx: rr_rx,
        recommendations_response_tx: rresp_tx,
        events_tx: ev_tx,
    };
    let client = ExternalMatcherClient {
        matching_data_request_tx: mdr_tx,
        matching_data_response_rx: mdresp_rx,
        recommendations_request_tx: rr_tx,
        recommendations_response_rx: rresp_rx,
        events_rx: ev_rx,
    };
    (server, client)
}

impl ExternalMatcherServer {
    /// Drains every pending `matching-data/` request and replies on `matching-data/response/`.
    /// Called by the host once per tick (spec §5 "the scheduler drains on tick boundaries").
    pub fn drain_matching_data_requests(&mut self, market: &Market) {
        while let Ok(request) = self.matching_data_request_rx.try_recv() {
            let response = build_response(market, request.filters.as_ref());
            if self.matching_data_response_tx.try_send(response).is_err() {
                warn!("matching-data/response/ is full, dropping a reply");
            }
        }
    }

    pub fn broadcast(&self, event: SchedulerEvent) {
        self.events_tx.try_send(event).ok();
    }
}

/// Implements `myco_scheduler::ExternalMatcher`: blocks (with a busy-poll, since the scheduler
/// itself is synchronous) on an incoming `recommendations/` request for up to `timeout`,
/// validates it against the live market, and replies on `recommendations/response/`.
impl myco_scheduler::ExternalMatcher for ExternalMatcherServer {
    fn request_recommendations(
        &mut self,
        market: &Market,
        timeout: Duration,
    ) -> Option<Vec<MatchRecommendation>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.recommendations_request_rx.try_recv() {
                Ok(request) => {
                    return match validate_batch(market, &request.recommended_matches) {
                        Ok(recommendations) => {
                            debug!(count = recommendations.len(), "external matcher recommendations validated");
                            self.recommendations_response_tx.try_send(RecommendationsResponse::success()).ok();
                            Some(recommendations)
                        }
                        Err(err) => {
                            warn!(%err, "external matcher recommendations rejected");
                            self.recommendations_response_tx
                                .try_send(RecommendationsResponse::fail(err.to_string()))
                                .ok();
                            None
                        }
                    };
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(mpsc::error::TryRecvError::Disconnected) => return None,
            }
        }
    }
}
