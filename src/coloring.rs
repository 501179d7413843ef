use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Neutral colour for edges the current result does not reach.
pub const DEFAULT_COLOR: &str = "rgba(143,143,143,0.13)";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side handle for a computed result. Opaque to the client; it is only
/// echoed back in detail requests and as `previousRequestId`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct RequestId(pub Value);

#[derive(Clone, Debug, PartialEq)]
pub struct ColoringResult {
    pub request_id: RequestId,
    pub raw: FxHashMap<EdgeId, u32>,
    pub paint: FxHashMap<EdgeId, String>,
}

impl ColoringResult {
    pub fn new(request_id: RequestId, raw: FxHashMap<EdgeId, u32>, ramp: &ColorRamp) -> Self {
        let paint = raw
            .iter()
            .map(|(edge, secs)| (*edge, ramp.color_for(*secs)))
            .collect();
        ColoringResult {
            request_id,
            raw,
            paint,
        }
    }

    pub fn seconds(&self, edge: EdgeId) -> Option<u32> {
        self.raw.get(&edge).copied()
    }

    pub fn paint_expression(self: &Arc<Self>) -> PaintExpression {
        PaintExpression {
            colors: self.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

const RAMP_STOPS: [Rgb; 5] = [
    Rgb(0, 200, 90),
    Rgb(140, 220, 40),
    Rgb(250, 210, 30),
    Rgb(245, 120, 30),
    Rgb(215, 40, 60),
];

/// Linear colour ramp from zero seconds to the query's maximum duration.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRamp {
    pub max_secs: u32,
}

impl ColorRamp {
    pub fn new(max_duration_secs: u64) -> Self {
        ColorRamp {
            max_secs: max_duration_secs.clamp(1, u32::MAX as u64) as u32,
        }
    }

    pub fn color_for(&self, secs: u32) -> String {
        let t = (secs as f64 / self.max_secs as f64).clamp(0.0, 1.0);
        let scaled = t * (RAMP_STOPS.len() - 1) as f64;
        let lower = (scaled.floor() as usize).min(RAMP_STOPS.len() - 2);
        let c = RAMP_STOPS[lower].lerp(RAMP_STOPS[lower + 1], scaled - lower as f64);
        format!("rgb({},{},{})", c.0, c.1, c.2)
    }

    /// Evenly spaced (seconds, colour) pairs for a legend.
    pub fn legend(&self, steps: usize) -> Vec<(u32, String)> {
        let steps = steps.max(2);
        (0..steps)
            .map(|i| {
                let secs = (self.max_secs as u64 * i as u64 / (steps as u64 - 1)) as u32;
                (secs, self.color_for(secs))
            })
            .collect()
    }
}

/// Line-colour expression: look the feature id up in the paint table, fall back
/// to [`DEFAULT_COLOR`].
#[derive(Clone, Debug)]
pub struct PaintExpression {
    colors: Arc<ColoringResult>,
}

impl PaintExpression {
    pub fn color_of(&self, edge: EdgeId) -> &str {
        self.colors
            .paint
            .get(&edge)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }

    pub fn to_style_json(&self) -> Value {
        let literal: serde_json::Map<String, Value> = self
            .colors
            .paint
            .iter()
            .map(|(edge, color)| (edge.to_string(), Value::String(color.clone())))
            .collect();

        json!([
            "coalesce",
            ["get", ["to-string", ["id"]], ["literal", literal]],
            DEFAULT_COLOR
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> Arc<ColoringResult> {
        let mut raw = FxHashMap::default();
        raw.insert(EdgeId(123), 540);
        raw.insert(EdgeId(456), 2700);
        Arc::new(ColoringResult::new(
            RequestId(json!({"rs_list_index": 1, "city": "London"})),
            raw,
            &ColorRamp::new(2700),
        ))
    }

    #[test]
    fn ramp_endpoints() {
        let ramp = ColorRamp::new(2700);
        assert_eq!(ramp.color_for(0), "rgb(0,200,90)");
        assert_eq!(ramp.color_for(2700), "rgb(215,40,60)");
        assert_eq!(ramp.color_for(99_999), "rgb(215,40,60)");
        assert_eq!(ramp.legend(5).len(), 5);
        assert_eq!(ramp.legend(5)[4].0, 2700);
    }

    #[test]
    fn zero_duration_does_not_divide_by_zero() {
        let ramp = ColorRamp::new(0);
        assert_eq!(ramp.color_for(0), "rgb(0,200,90)");
    }

    #[test]
    fn paint_falls_back_to_default() {
        let paint = result().paint_expression();
        assert_ne!(paint.color_of(EdgeId(123)), DEFAULT_COLOR);
        assert_eq!(paint.color_of(EdgeId(7)), DEFAULT_COLOR);
    }

    #[test]
    fn style_expression_shape() {
        let style = result().paint_expression().to_style_json();
        assert_eq!(style[0], "coalesce");
        assert_eq!(style[1][0], "get");
        assert!(style[1][2][1].get("123").is_some());
        assert_eq!(style[2], DEFAULT_COLOR);
    }
}
