//! Collaborator seams: the reachability service computes edge times, the detail
//! service explains one edge, and the agency service supplies the vocabulary
//! the query options need before anything can be requested.

use crate::agencies::Agency;
use crate::coloring::{EdgeId, RequestId};
use crate::store::QuerySnapshot;
use crate::trip_details::{DetailParseError, DetailResult, GetDetailsRequest};
use futures::future::{AbortRegistration, BoxFuture};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CalculateRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub agencies: Vec<String>,
    pub modes: Vec<String>,

    #[serde(rename = "startTime")]
    pub start_time: u64,

    #[serde(rename = "maxSearchTime")]
    pub max_search_time: u64,

    #[serde(rename = "transferPenaltySecs")]
    pub transfer_penalty_secs: u64,

    #[serde(rename = "previousRequestId", skip_serializing_if = "Option::is_none")]
    pub previous_request_id: Option<RequestId>,
}

impl CalculateRequest {
    pub fn new(snapshot: &QuerySnapshot, previous_request_id: Option<RequestId>) -> Self {
        CalculateRequest {
            latitude: snapshot.origin.latitude,
            longitude: snapshot.origin.longitude,
            agencies: snapshot.agencies.clone(),
            modes: snapshot.modes.clone(),
            start_time: snapshot.start_time.as_u32() as u64,
            max_search_time: snapshot.max_duration_secs,
            transfer_penalty_secs: snapshot.transfer_penalty_secs,
            previous_request_id,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct CalculateResponse {
    pub request_id: RequestId,
    pub edge_times: FxHashMap<EdgeId, u32>,
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("request aborted")]
    Cancelled,
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Protocol(#[from] DetailParseError),
}

impl ServiceError {
    /// An unparsable detail body means client and server disagree on the wire
    /// format; refreshing is the only fix.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, ServiceError::Protocol(_))
    }
}

pub trait ReachabilityService: Send + Sync + 'static {
    fn calculate(
        &self,
        request: CalculateRequest,
    ) -> BoxFuture<'static, Result<CalculateResponse, ServiceError>>;
}

pub trait DetailService: Send + Sync + 'static {
    /// Implementations observe `abort` at their next await point and resolve with
    /// [`ServiceError::Cancelled`].
    fn details(
        &self,
        request: GetDetailsRequest,
        abort: AbortRegistration,
    ) -> BoxFuture<'static, Result<Option<DetailResult>, ServiceError>>;
}

pub trait AgencyService: Send + Sync + 'static {
    fn agencies(&self) -> BoxFuture<'static, Result<Vec<Agency>, ServiceError>>;
}
