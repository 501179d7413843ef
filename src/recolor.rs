use crate::coloring::{ColorRamp, ColoringResult, RequestId};
use crate::service::{CalculateRequest, CalculateResponse, ServiceError};
use crate::store::{LatLng, OriginParameterStore};
use std::sync::Arc;

/// A recolor request ready to be sent. The origin is captured by value so a
/// later store change cannot alter what this request meant.
#[derive(Clone, Debug)]
pub struct IssuedRecolor {
    pub seq: u64,
    pub origin: LatLng,
    pub request: CalculateRequest,
    pub ramp: ColorRamp,
}

#[derive(Debug)]
pub enum RecolorOutcome {
    /// A newer request was issued after this one; nothing is applied.
    Stale,
    Colored(Arc<ColoringResult>),
    Failed(ServiceError),
}

/// Hands out recolor sequence numbers and decides which settled request is
/// still current. Superseded requests are left running; their results are
/// dropped on arrival.
#[derive(Default)]
pub struct RecolorController {
    latest_seq: u64,
    previous_request_id: Option<RequestId>,
    issued: u64,
}

impl RecolorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Total requests issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// `None` while the store's options are incomplete.
    pub fn issue(&mut self, store: &OriginParameterStore) -> Option<IssuedRecolor> {
        let snapshot = store.snapshot()?;
        self.latest_seq += 1;
        self.issued += 1;

        Some(IssuedRecolor {
            seq: self.latest_seq,
            origin: snapshot.origin,
            request: CalculateRequest::new(&snapshot, self.previous_request_id.clone()),
            ramp: ColorRamp::new(snapshot.max_duration_secs),
        })
    }

    pub fn settle(
        &mut self,
        seq: u64,
        result: Result<CalculateResponse, ServiceError>,
        ramp: &ColorRamp,
    ) -> RecolorOutcome {
        if seq != self.latest_seq {
            log::debug!(
                "Discarding recolor result #{seq}; #{} is current",
                self.latest_seq
            );
            return RecolorOutcome::Stale;
        }

        match result {
            Ok(response) => {
                let coloring = ColoringResult::new(response.request_id, response.edge_times, ramp);
                self.previous_request_id = Some(coloring.request_id.clone());
                RecolorOutcome::Colored(Arc::new(coloring))
            }
            Err(err) => RecolorOutcome::Failed(err),
        }
    }
}
