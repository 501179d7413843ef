//! Detail lookups for the edge under the pointer.
//!
//! `Idle -> Pending -> {Resolved, Aborted, Errored}`, and back to `Idle` on
//! dismissal. The in-flight lookup lives in a single slot; replacing it aborts
//! the old one first, and a settled lookup whose id no longer matches the slot
//! is dropped without any visible effect.

use crate::coloring::{ColoringResult, EdgeId};
use crate::map_layer::{Cursor, MapLayer, ScreenPoint};
use crate::service::ServiceError;
use crate::store::LatLng;
use crate::trip_details::{DetailResult, DetailView, GetDetailsRequest};
use futures::future::{AbortHandle, AbortRegistration};

pub const PROTOCOL_ALERT: &str = "Unexpected error. Please refresh the page and try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverPhase {
    Idle,
    Pending,
    Resolved,
    Aborted,
    Errored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    /// Continuous movement over the transit layer.
    Hover,
    /// A discrete click or tap.
    Click,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub point: ScreenPoint,
    pub lat_lng: LatLng,
    pub alt_key: bool,
}

struct DetailOperation {
    id: u64,
    abort: AbortHandle,
    edge: EdgeId,
    seconds: u32,
}

/// Everything needed to start the network call for a new lookup.
pub struct DetailIssue {
    pub id: u64,
    pub edge: EdgeId,
    pub request: GetDetailsRequest,
    pub registration: AbortRegistration,
}

pub struct HoverController {
    phase: HoverPhase,
    current: Option<DetailOperation>,
    next_id: u64,
    hit_radius_px: f64,
    detail: Option<DetailView>,
    alert: Option<String>,
}

impl HoverController {
    pub fn new(hit_radius_px: f64) -> Self {
        HoverController {
            phase: HoverPhase::Idle,
            current: None,
            next_id: 0,
            hit_radius_px,
            detail: None,
            alert: None,
        }
    }

    pub fn phase(&self) -> HoverPhase {
        self.phase
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn clear_alert(&mut self) {
        self.alert = None;
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> Option<EdgeId> {
        self.current.as_ref().map(|op| op.edge)
    }

    /// Aborts the in-flight lookup, if any.
    pub fn cancel_current(&mut self) -> bool {
        match self.current.take() {
            Some(op) => {
                op.abort.abort();
                log::debug!("Aborted detail request #{} for edge {}", op.id, op.edge);
                self.phase = HoverPhase::Aborted;
                true
            }
            None => false,
        }
    }

    pub fn on_pointer<M: MapLayer>(
        &mut self,
        event: PointerEvent,
        map: &mut M,
        coloring: Option<&ColoringResult>,
    ) -> Option<DetailIssue> {
        if event.alt_key {
            return None;
        }

        self.cancel_current();

        let nearby = map.query_rendered_features(event.point, self.hit_radius_px);
        let Some(feature) = nearby.first() else {
            if event.kind == PointerKind::Click {
                self.dismiss(map);
            }
            return None;
        };

        map.set_cursor(Cursor::Crosshair);
        let edge = feature.id?;

        let Some(coloring) = coloring else {
            log::debug!("No edge times yet; ignoring pointer over edge {edge}");
            return None;
        };
        // Edges without a time are not reachable yet.
        let seconds = coloring.seconds(edge)?;

        self.next_id += 1;
        let (abort, registration) = AbortHandle::new_pair();
        self.current = Some(DetailOperation {
            id: self.next_id,
            abort,
            edge,
            seconds,
        });
        self.phase = HoverPhase::Pending;

        Some(DetailIssue {
            id: self.next_id,
            edge,
            request: GetDetailsRequest {
                latlng: event.lat_lng,
                request_id: coloring.request_id.clone(),
            },
            registration,
        })
    }

    /// Applies a settled lookup. Errors that are neither cancellation nor a
    /// protocol mismatch are handed back for the top-level handler.
    pub fn on_settled<M: MapLayer>(
        &mut self,
        id: u64,
        result: Result<Option<DetailResult>, ServiceError>,
        map: &mut M,
    ) -> Option<ServiceError> {
        let is_current = self.current.as_ref().map(|op| op.id) == Some(id);
        if !is_current {
            log::debug!("Dropping superseded detail result #{id}");
            return None;
        }
        let op = self.current.take()?;

        match result {
            Ok(Some(detail)) => {
                self.phase = HoverPhase::Resolved;
                if let Some(path) = &detail.path {
                    map.set_path_data(Some(path));
                }
                self.detail = Some(DetailView {
                    details: detail.details,
                    arrival_secs: op.seconds,
                });
                None
            }
            Ok(None) => {
                self.phase = HoverPhase::Resolved;
                self.detail = None;
                None
            }
            Err(ServiceError::Cancelled) => {
                self.phase = HoverPhase::Aborted;
                None
            }
            Err(err) if err.is_protocol_mismatch() => {
                log::error!("Details response could not be parsed: {err}");
                self.phase = HoverPhase::Errored;
                self.alert = Some(PROTOCOL_ALERT.to_string());
                None
            }
            Err(err) => {
                self.phase = HoverPhase::Errored;
                Some(err)
            }
        }
    }

    /// Escape, pointer-leave, or a click on empty map.
    pub fn dismiss<M: MapLayer>(&mut self, map: &mut M) {
        self.cancel_current();
        map.set_cursor(Cursor::Default);
        map.set_path_data(None);
        self.detail = None;
        self.phase = HoverPhase::Idle;
    }

    /// A new coloring result invalidates every detail tied to the old one.
    pub fn reset_for_new_result<M: MapLayer>(&mut self, map: &mut M) {
        self.cancel_current();
        map.set_path_data(None);
        self.detail = None;
        self.phase = HoverPhase::Idle;
    }
}
