use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Agency {
    pub public_name: String,
    pub short_code: String,
    pub city: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mode {
    pub code: &'static str,
    pub public_name: &'static str,
}

pub const MODES: [Mode; 5] = [
    Mode {
        code: "bus",
        public_name: "Bus",
    },
    Mode {
        code: "subway",
        public_name: "Subway",
    },
    Mode {
        code: "tram",
        public_name: "Tram",
    },
    Mode {
        code: "rail",
        public_name: "Train",
    },
    Mode {
        code: "ferry",
        public_name: "Ferry",
    },
];

pub fn all_modes() -> BTreeSet<String> {
    MODES.iter().map(|m| m.code.to_string()).collect()
}

impl Agency {
    /// Kitchener-Waterloo is served out of the Toronto feed set.
    pub fn is_shown_in(&self, city: &str) -> bool {
        self.city == city || (self.city == "Toronto" && city == "Kitchener-Waterloo")
    }
}

pub fn agencies_for_city<'a>(agencies: &'a [Agency], city: &str) -> Vec<&'a Agency> {
    agencies.iter().filter(|ag| ag.is_shown_in(city)).collect()
}

/// Every fetched agency starts out enabled, including ones hidden for the current city.
pub fn default_enabled_agencies(agencies: &[Agency]) -> BTreeSet<String> {
    agencies.iter().map(|ag| ag.short_code.clone()).collect()
}
