use serde::Serialize;
use std::collections::BTreeMap;

/// What one smartctl invocation told us about one disk. Any field may be
/// missing: drives report wildly different subsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveReading {
    pub temperature:    Option<i32>,
    pub power_on_hours: Option<u64>,
    /// Raw status token, e.g. `PASSED` (ATA) or `OK` (SCSI).
    pub health:         Option<String>,
}

impl DriveReading {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.power_on_hours.is_none() && self.health.is_none()
    }
}

/// Result maps for one cycle, keyed by canonical device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveHealth {
    pub temperatures:   BTreeMap<String, i32>,
    pub power_on_hours: BTreeMap<String, u64>,
    pub health:         BTreeMap<String, String>,
}

impl DriveHealth {
    /// Fold one disk's reading in; unset metrics leave the maps untouched.
    pub fn record(&mut self, name: &str, reading: DriveReading) {
        if let Some(t) = reading.temperature {
            self.temperatures.insert(name.to_string(), t);
        }
        if let Some(h) = reading.power_on_hours {
            self.power_on_hours.insert(name.to_string(), h);
        }
        if let Some(s) = reading.health {
            self.health.insert(name.to_string(), s);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty() && self.power_on_hours.is_empty() && self.health.is_empty()
    }

    /// Every disk that has at least one metric, in name order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.temperatures.keys()
            .chain(self.power_on_hours.keys())
            .chain(self.health.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
