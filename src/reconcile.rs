use crate::coloring::ColoringResult;
use crate::map_layer::{MapError, MapLayer};
use std::sync::Arc;

#[derive(Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The map has not loaded yet; the result is applied on load.
    Deferred,
    Applied { seq: u64 },
    /// The layer was missing. It has been re-added and one more attempt is allowed.
    RetryScheduled { seq: u64, error: MapError },
    Failed { seq: u64, error: MapError },
}

/// Owns the newest coloring result and paints it onto the map.
#[derive(Default)]
pub struct LayerReconciler {
    map_loaded: bool,
    current: Option<(u64, Arc<ColoringResult>)>,
    queued: bool,
    awaiting_render: Option<u64>,
}

impl LayerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.map_loaded
    }

    pub fn active(&self) -> Option<&Arc<ColoringResult>> {
        self.current.as_ref().map(|(_, result)| result)
    }

    pub fn current_seq(&self) -> Option<u64> {
        self.current.as_ref().map(|(seq, _)| *seq)
    }

    pub fn has_queued(&self) -> bool {
        self.queued
    }

    /// Replaces the active result wholesale.
    pub fn accept(&mut self, seq: u64, result: Arc<ColoringResult>) {
        log::info!("Edge times count: {}", result.raw.len());
        self.current = Some((seq, result));
        self.queued = true;
    }

    pub fn on_map_loaded<M: MapLayer>(&mut self, map: &mut M) -> Result<(), MapError> {
        self.map_loaded = true;
        map.add_transit_layer()?;
        map.add_path_layer()
    }

    pub fn apply<M: MapLayer>(&mut self, map: &mut M, retry_allowed: bool) -> ApplyOutcome {
        let Some((seq, result)) = self.current.as_ref().filter(|_| self.map_loaded) else {
            return ApplyOutcome::Deferred;
        };
        let seq = *seq;
        self.queued = false;

        match map.set_edge_colors(&result.paint_expression()) {
            Ok(()) => {
                map.set_path_data(None);
                self.awaiting_render = Some(seq);
                ApplyOutcome::Applied { seq }
            }
            Err(error) if error.is_layer_not_ready() && retry_allowed => {
                log::warn!("Transit layer not ready, re-adding before retry: {error}");
                if let Err(e) = map.add_transit_layer() {
                    log::warn!("Re-adding transit layer failed: {e}");
                }
                ApplyOutcome::RetryScheduled { seq, error }
            }
            Err(error) => ApplyOutcome::Failed { seq, error },
        }
    }

    /// The first render after a paint. Returns the sequence that was painted.
    pub fn take_render_wait(&mut self) -> Option<u64> {
        self.awaiting_render.take()
    }
}
