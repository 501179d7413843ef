use crate::coloring::{EdgeId, PaintExpression};

pub const TRANSIT_LAYER_ID: &str = "transit-layer";
pub const GEOJSON_PATH_SOURCE_ID: &str = "geojson-path";

const NOT_IN_STYLE: &str = "does not exist in the map's style";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        ScreenPoint { x, y }
    }
}

/// A rendered feature under the pointer. Features without an id cannot be
/// matched against a coloring result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderedFeature {
    pub id: Option<EdgeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Crosshair,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("The layer '{0}' does not exist in the map's style and cannot be styled.")]
    LayerNotReady(String),
    #[error("{0}")]
    Renderer(String),
}

impl MapError {
    /// Classifies a raw renderer error message.
    pub fn from_message(layer: &str, message: &str) -> Self {
        if message.contains(NOT_IN_STYLE) {
            MapError::LayerNotReady(layer.to_string())
        } else {
            MapError::Renderer(message.to_string())
        }
    }

    pub fn is_layer_not_ready(&self) -> bool {
        matches!(self, MapError::LayerNotReady(_))
    }
}

/// The live map. Only the engine writes to it, from its single event loop.
pub trait MapLayer {
    /// Removes the transit vector source and layer if present, then adds them again.
    fn add_transit_layer(&mut self) -> Result<(), MapError>;

    /// Adds the source and layers that draw a detail path.
    fn add_path_layer(&mut self) -> Result<(), MapError>;

    fn set_edge_colors(&mut self, paint: &PaintExpression) -> Result<(), MapError>;

    /// `None` clears the overlay.
    fn set_path_data(&mut self, path: Option<&geojson::GeoJson>);

    fn query_rendered_features(&self, point: ScreenPoint, radius_px: f64) -> Vec<RenderedFeature>;

    fn set_cursor(&mut self, cursor: Cursor);
}

/// Lifecycle notifications from the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    Loaded,
    Render,
    Error(MapError),
}
