use crate::time::Time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn from_lat_lng(lat: f64, lng: f64) -> Self {
        Self {
            latitude: lat,
            longitude: lng,
        }
    }

    pub fn nudged(&self, degrees: f64) -> Self {
        Self {
            latitude: self.latitude + degrees,
            longitude: self.longitude + degrees,
        }
    }
}

/// Trip parameters. Agencies and modes arrive asynchronously from the metadata
/// service, so they stay `None` until populated.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    pub start_time: Time,
    pub max_duration_secs: u64,
    pub transfer_penalty_secs: u64,
    pub agencies: Option<BTreeSet<String>>,
    pub modes: Option<BTreeSet<String>>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            start_time: Time::from_hms(17, 40, 0),
            max_duration_secs: 2700,
            transfer_penalty_secs: 0,
            agencies: None,
            modes: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionsAction {
    SetStartTime(Time),
    SetDuration(u64),
    SetTransferPenalty(u64),
    SetAgencies(BTreeSet<String>),
    SetModes(BTreeSet<String>),
}

/// Complete query captured by value when a recolor request is issued.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    pub origin: LatLng,
    pub start_time: Time,
    pub max_duration_secs: u64,
    pub transfer_penalty_secs: u64,
    pub agencies: Vec<String>,
    pub modes: Vec<String>,
}

pub struct OriginParameterStore {
    origin: LatLng,
    last_good_origin: LatLng,
    options: QueryOptions,
    revision: u64,
}

impl OriginParameterStore {
    pub fn new(origin: LatLng, options: QueryOptions) -> Self {
        OriginParameterStore {
            origin,
            last_good_origin: origin,
            options,
            revision: 0,
        }
    }

    pub fn origin(&self) -> LatLng {
        self.origin
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn last_good_origin(&self) -> LatLng {
        self.last_good_origin
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_origin(&mut self, origin: LatLng) {
        self.origin = origin;
        self.revision += 1;
    }

    pub fn record_last_good(&mut self, origin: LatLng) {
        self.last_good_origin = origin;
    }

    pub fn apply(&mut self, action: OptionsAction) {
        log::debug!("Options update {:?}", action);
        match action {
            OptionsAction::SetStartTime(t) => self.options.start_time = t,
            OptionsAction::SetDuration(d) => self.options.max_duration_secs = d,
            OptionsAction::SetTransferPenalty(p) => self.options.transfer_penalty_secs = p,
            OptionsAction::SetAgencies(a) => self.options.agencies = Some(a),
            OptionsAction::SetModes(m) => self.options.modes = Some(m),
        }
        self.revision += 1;
    }

    pub fn snapshot(&self) -> Option<QuerySnapshot> {
        let agencies = self.options.agencies.as_ref()?;
        let modes = self.options.modes.as_ref()?;

        Some(QuerySnapshot {
            origin: self.origin,
            start_time: self.options.start_time,
            max_duration_secs: self.options.max_duration_secs,
            transfer_penalty_secs: self.options.transfer_penalty_secs,
            agencies: agencies.iter().cloned().collect(),
            modes: modes.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn snapshot_requires_agencies_and_modes() {
        let mut store = OriginParameterStore::new(
            LatLng::from_lat_lng(42.9849, -81.2453),
            QueryOptions::default(),
        );
        assert!(store.snapshot().is_none());

        store.apply(OptionsAction::SetAgencies(set(&["LTC"])));
        assert!(store.snapshot().is_none());

        store.apply(OptionsAction::SetModes(set(&["bus", "rail"])));
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.agencies, vec!["LTC".to_string()]);
        assert_eq!(snap.modes, vec!["bus".to_string(), "rail".to_string()]);
        assert_eq!(snap.max_duration_secs, 2700);
        assert_eq!(snap.start_time, Time(63600.0));
    }

    #[test]
    fn every_update_bumps_revision() {
        let mut store =
            OriginParameterStore::new(LatLng::from_lat_lng(0.0, 0.0), QueryOptions::default());
        store.set_origin(LatLng::from_lat_lng(1.0, 1.0));
        store.apply(OptionsAction::SetDuration(3600));
        store.apply(OptionsAction::SetTransferPenalty(120));
        assert_eq!(store.revision(), 3);
        assert_eq!(store.options().transfer_penalty_secs, 120);
        // out-of-range values are not rejected here
        store.apply(OptionsAction::SetDuration(0));
        assert_eq!(store.options().max_duration_secs, 0);
    }

    #[test]
    fn last_good_is_separate_from_current() {
        let start = LatLng::from_lat_lng(42.0, -81.0);
        let mut store = OriginParameterStore::new(start, QueryOptions::default());
        store.set_origin(LatLng::from_lat_lng(43.0, -80.0));
        assert_eq!(store.last_good_origin(), start);
        store.record_last_good(store.origin());
        assert_eq!(store.last_good_origin(), LatLng::from_lat_lng(43.0, -80.0));
    }

    #[test]
    fn nudge() {
        let p = LatLng::from_lat_lng(42.9849, -81.2453).nudged(0.0001);
        assert!((p.latitude - 42.9850).abs() < 1e-9);
        assert!((p.longitude - -81.2452).abs() < 1e-9);
    }
}
