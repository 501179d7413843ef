use crate::store::{LatLng, QueryOptions};
use std::env;
use std::time::Duration;

#[cfg(feature = "prod")]
const DEFAULT_API_URL: &str = "https://map.henryn.ca/api/v2";
#[cfg(not(feature = "prod"))]
const DEFAULT_API_URL: &str = "http://localhost:3030";

/// Delays used by the engine. Every one of them is cancelled on its success path
/// and on teardown.
#[derive(Clone, Debug, PartialEq)]
pub struct Timings {
    /// Forces the busy indicator off if a recolor call has not settled.
    pub safety_timeout: Duration,
    /// Wait after the first render event following a paint before clearing busy.
    pub render_debounce: Duration,
    /// Clears busy after a paint even if no render event shows up.
    pub busy_fallback: Duration,
    /// Backoff before re-applying a paint that hit a not-yet-loaded layer.
    pub layer_retry_backoff: Duration,
    /// A pending cycle older than this is reported as stuck.
    pub stuck_threshold: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            safety_timeout: Duration::from_secs(10),
            render_debounce: Duration::from_millis(300),
            busy_fallback: Duration::from_secs(3),
            layer_retry_backoff: Duration::from_secs(2),
            stuck_threshold: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Configuration {
    pub api_url: String,
    pub mvt_url: String,
    pub client_id: String,
    pub city: String,
    pub start_location: LatLng,
    pub options: QueryOptions,
    pub timings: Timings,
    pub hit_radius_px: f64,
    pub reset_nudge_degrees: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            api_url: DEFAULT_API_URL.to_string(),
            mvt_url: format!("{DEFAULT_API_URL}/mvt"),
            client_id: "0".to_string(),
            city: "London".to_string(),
            // London, Ontario
            start_location: LatLng::from_lat_lng(42.9849, -81.2453),
            options: QueryOptions::default(),
            timings: Timings::default(),
            hit_radius_px: 3.0,
            reset_nudge_degrees: 0.0001,
        }
    }
}

impl Configuration {
    pub fn from_env() -> Self {
        let mut config = Configuration::default();

        if let Ok(url) = env::var("TIME2REACH_API_URL") {
            config.mvt_url = format!("{}/mvt", url.trim_end_matches('/'));
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("TIME2REACH_MVT_URL") {
            config.mvt_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(id) = env::var("TIME2REACH_CLIENT_ID") {
            config.client_id = id;
        }
        log::debug!("Using API at {} (tiles at {})", config.api_url, config.mvt_url);
        config
    }

    /// Tile template for the transit vector source. `.bin` keeps CDN caching on.
    pub fn tile_url(&self) -> String {
        format!("{}/mvt/{{z}}/{{x}}/{{y}}.bin", self.mvt_url)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let t = Timings::default();
        assert_eq!(t.safety_timeout, Duration::from_millis(10_000));
        assert_eq!(t.render_debounce, Duration::from_millis(300));
        assert_eq!(t.busy_fallback, Duration::from_millis(3_000));
        assert_eq!(t.layer_retry_backoff, Duration::from_millis(2_000));
        assert_eq!(t.stuck_threshold, Duration::from_millis(15_000));
    }

    #[test]
    fn endpoints() {
        let config = Configuration {
            api_url: "http://localhost:3030".into(),
            mvt_url: "http://localhost:3030/mvt".into(),
            ..Configuration::default()
        };
        assert_eq!(config.endpoint("/hello"), "http://localhost:3030/hello");
        assert_eq!(config.endpoint("details"), "http://localhost:3030/details");
        assert_eq!(
            config.tile_url(),
            "http://localhost:3030/mvt/mvt/{z}/{x}/{y}.bin"
        );
    }
}
