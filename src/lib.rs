//! Client-side query state for the time-to-reach map: which origin and
//! options are active, which recolor result is painted, what the pointer is
//! hovering, and whether the map is still busy.

pub mod agencies;
pub mod coloring;
pub mod configuration;
pub mod engine;
pub mod gestures;
pub mod headless_map;
pub mod hover;
pub mod loading;
pub mod map_layer;
pub mod recolor;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod time;
pub mod timers;
pub mod trip_details;
pub mod web;

pub use configuration::Configuration;
pub use engine::{Engine, EngineHandle, Input, Key, ViewState};
pub use store::LatLng;

#[cfg(test)]
mod tests;
