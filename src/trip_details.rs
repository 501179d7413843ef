use crate::coloring::RequestId;
use crate::store::LatLng;
use crate::time::{DurationFormatter, Time};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GetDetailsRequest {
    pub latlng: LatLng,
    pub request_id: RequestId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TripDetailsInner {
    pub time: Time,
    pub line: String,
    pub stop: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TripDetailsTransit {
    pub background_color: String,
    pub text_color: String,
    pub mode: String,
    pub boarding: TripDetailsInner,
    pub exit: TripDetailsInner,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TripDetailsWalking {
    pub time: f64,
    pub length: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "method")]
pub enum TripDetails {
    Transit(TripDetailsTransit),
    Walking(TripDetailsWalking),
}

/// Legs in travel order plus the path drawn as the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailResult {
    pub details: Vec<TripDetails>,
    pub path: Option<geojson::GeoJson>,
}

#[derive(Deserialize)]
struct DetailResponse {
    details: Vec<TripDetails>,
    #[serde(default)]
    path: Option<geojson::GeoJson>,
}

#[derive(thiserror::Error, Debug)]
pub enum DetailParseError {
    #[error("details response is not JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("details response has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Parses a `/details` body. The server answers with a bare JSON string (such as
/// `"None"`) when no trip reaches the point, which maps to `Ok(None)`.
pub fn parse_detail_response(body: &str) -> Result<Option<DetailResult>, DetailParseError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(DetailParseError::Syntax)?;
    if let serde_json::Value::String(msg) = &value {
        log::debug!("No trip details: {msg}");
        return Ok(None);
    }
    let response: DetailResponse = serde_json::from_value(value).map_err(DetailParseError::Shape)?;
    Ok(Some(DetailResult {
        details: response.details,
        path: response.path,
    }))
}

impl Display for TripDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TripDetails::Walking(walk) => write!(
                f,
                "Walk {} ({:.0} m)",
                DurationFormatter(walk.time),
                walk.length
            ),
            TripDetails::Transit(transit) => write!(
                f,
                "{} {}: board at {}, {}; get off at {}, {}",
                transit.mode,
                transit.boarding.line,
                transit.boarding.stop,
                transit.boarding.time.clock(),
                transit.exit.stop,
                transit.exit.time.clock(),
            ),
        }
    }
}

/// What the detail popup shows for one hovered edge.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailView {
    pub details: Vec<TripDetails>,
    pub arrival_secs: u32,
}

impl Display for DetailView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Arrive in {}", DurationFormatter(self.arrival_secs as f64))?;
        for leg in &self.details {
            writeln!(f, "  {leg}")?;
        }
        Ok(())
    }
}
