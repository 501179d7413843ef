use crate::hover::{PointerEvent, PointerKind};
use crate::map_layer::ScreenPoint;
use crate::store::LatLng;
use std::time::Duration;
use tokio::time::Instant;

const DOUBLE_TAP_INTERVAL: Duration = Duration::from_millis(300);
const DOUBLE_TAP_DISTANCE_PX: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputModality {
    Mouse,
    Touch,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub point: ScreenPoint,
    pub lat_lng: LatLng,
    pub alt_key: bool,
}

/// Raw input as delivered by the platform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawGesture {
    MouseOver(PointerSample),
    Click(PointerSample),
    DoubleClick(PointerSample),
    Tap(PointerSample),
    PointerLeave,
}

/// Input after platform dispatch; identical for every modality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Detail(PointerEvent),
    SetOrigin(LatLng),
    Leave,
}

#[derive(Default)]
struct DoubleTapRecognizer {
    last_tap: Option<(Instant, ScreenPoint)>,
}

impl DoubleTapRecognizer {
    fn on_tap(&mut self, point: ScreenPoint, now: Instant) -> bool {
        match self.last_tap.take() {
            Some((at, prev))
                if now.duration_since(at) <= DOUBLE_TAP_INTERVAL
                    && (prev.x - point.x).hypot(prev.y - point.y) <= DOUBLE_TAP_DISTANCE_PX =>
            {
                true
            }
            _ => {
                self.last_tap = Some((now, point));
                false
            }
        }
    }
}

pub struct GestureDispatcher {
    modality: InputModality,
    taps: DoubleTapRecognizer,
}

fn detail(kind: PointerKind, sample: PointerSample) -> Gesture {
    Gesture::Detail(PointerEvent {
        kind,
        point: sample.point,
        lat_lng: sample.lat_lng,
        alt_key: sample.alt_key,
    })
}

impl GestureDispatcher {
    pub fn new(modality: InputModality) -> Self {
        GestureDispatcher {
            modality,
            taps: DoubleTapRecognizer::default(),
        }
    }

    pub fn modality(&self) -> InputModality {
        self.modality
    }

    pub fn dispatch(&mut self, raw: RawGesture, now: Instant) -> Vec<Gesture> {
        match (self.modality, raw) {
            (_, RawGesture::PointerLeave) => vec![Gesture::Leave],
            (_, RawGesture::Click(sample)) => vec![detail(PointerKind::Click, sample)],

            (InputModality::Mouse, RawGesture::MouseOver(sample)) => {
                vec![detail(PointerKind::Hover, sample)]
            }
            (InputModality::Mouse, RawGesture::DoubleClick(sample)) => {
                vec![Gesture::SetOrigin(sample.lat_lng)]
            }
            (InputModality::Mouse, RawGesture::Tap(sample)) => {
                vec![detail(PointerKind::Click, sample)]
            }

            // touch screens have no hover, and double-tap replaces double-click
            (InputModality::Touch, RawGesture::MouseOver(_))
            | (InputModality::Touch, RawGesture::DoubleClick(_)) => vec![],
            (InputModality::Touch, RawGesture::Tap(sample)) => {
                if self.taps.on_tap(sample.point, now) {
                    vec![Gesture::SetOrigin(sample.lat_lng)]
                } else {
                    vec![detail(PointerKind::Click, sample)]
                }
            }
        }
    }
}
