use std::collections::BTreeMap;

/// Canonical device name → controller hint (empty when none is known).
///
/// Ordered so that a cycle invokes smartctl, and logs, in the same order
/// every time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskSet {
    disks: BTreeMap<String, String>,
}

impl DiskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the hint for `name`.
    pub fn insert(&mut self, name: impl Into<String>, hint: impl Into<String>) {
        self.disks.insert(name.into(), hint.into());
    }

    pub fn hint(&self, name: &str) -> Option<&str> {
        self.disks.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// (name, hint) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.disks.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One partition as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub device:  String,
    pub options: Vec<String>,
}

impl PartitionInfo {
    pub fn new(device: impl Into<String>, options: &[&str]) -> Self {
        Self {
            device:  device.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}

/// One physical disk from the hardware block inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub name:     String,
    pub bus_path: String,
}

impl BlockInfo {
    pub fn new(name: impl Into<String>, bus_path: impl Into<String>) -> Self {
        Self { name: name.into(), bus_path: bus_path.into() }
    }
}
