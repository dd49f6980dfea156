use crate::collectors::block::{self, SystemBlocks};
use crate::collectors::command::{Cancel, CommandRunner};
use crate::collectors::partitions::{self, SystemPartitions};
use crate::collectors::{scan, smart, BlockSource, PartitionSource};
use crate::error::CollectError;
use crate::models::disk::DiskSet;
use crate::models::health::{DriveHealth, DriveReading};
use crate::platform::Platform;
use chrono::{DateTime, Local};
use log::{debug, warn};

/// Everything one collection cycle produced.
#[derive(Debug)]
pub struct DriveSnapshot {
    pub taken_at: DateTime<Local>,
    pub health:   DriveHealth,
    /// Non-fatal problems, in the order they were hit.
    pub errors:   Vec<CollectError>,
}

impl DriveSnapshot {
    fn empty() -> Self {
        Self { taken_at: Local::now(), health: DriveHealth::default(), errors: Vec::new() }
    }

    pub fn no_disks(&self) -> bool {
        self.errors.iter().any(CollectError::is_no_disks)
    }
}

/// Runs disk discovery and per-disk smartctl queries for one platform.
pub struct Collector<P, B> {
    platform:   Platform,
    partitions: P,
    blocks:     B,
    smartctl:   CommandRunner,
    enabled:    bool,
}

impl Collector<SystemPartitions, SystemBlocks> {
    /// Collector backed by the running OS.
    pub fn system(platform: Platform, smartctl: CommandRunner) -> Self {
        Collector::new(platform, SystemPartitions::new(platform), SystemBlocks::new(platform), smartctl)
    }
}

impl<P: PartitionSource, B: BlockSource> Collector<P, B> {
    pub fn new(platform: Platform, partitions: P, blocks: B, smartctl: CommandRunner) -> Self {
        Self { platform, partitions, blocks, smartctl, enabled: true }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Merge partitions, the smartctl scan and the block inventory into one
    /// disk set. Source failures land in `errors`; later sources still run.
    pub fn discover(&self, cancel: &Cancel, errors: &mut Vec<CollectError>) -> DiskSet {
        let mut disks = DiskSet::new();

        match self.partitions.partitions() {
            Ok(parts) => partitions::discover(self.platform, &parts, &mut disks),
            Err(e)    => errors.push(CollectError::Partitions(e)),
        }
        debug!("disks after partitions: {:?}", disks);

        // Partitions don't always list every drive.
        if self.platform.probes_hardware() {
            if let Err(e) = scan::probe(&self.smartctl, cancel, &mut disks) {
                errors.push(CollectError::Scan(e));
            }
            debug!("disks after scan: {:?}", disks);

            match self.blocks.block_devices() {
                Ok(devs) => block::enumerate(self.platform, &devs, &mut disks),
                Err(e)   => errors.push(CollectError::BlockDevices(e)),
            }
        }
        debug!("disks: {:?}", disks);

        disks
    }

    /// One full cycle: discovery, then one smartctl query per disk.
    pub fn collect(&self, cancel: &Cancel) -> DriveSnapshot {
        let mut snap = DriveSnapshot::empty();
        if !self.enabled {
            debug!("drive data collection disabled");
            return snap;
        }

        let disks = self.discover(cancel, &mut snap.errors);
        if disks.is_empty() {
            snap.errors.push(CollectError::NoDisks);
            return snap;
        }

        for (name, hint) in disks.iter() {
            let Some(args) = smart::health_args(self.platform, name, hint) else {
                debug!("skipping {}", name);
                continue;
            };

            let mut reading = DriveReading::default();
            let outcome = self.smartctl.run(cancel, &args, |stream| {
                reading = smart::parse_health(name, stream);
            });
            snap.health.record(name, reading);

            if let Err(source) = outcome {
                warn!("{}: {}", name, source);
                snap.errors.push(CollectError::Disk { name: name.to_string(), source });
            }
        }

        snap.taken_at = Local::now();
        snap
    }
}

/// Whether smartctl should go through sudo this cycle.
pub fn needs_sudo(requested: bool) -> bool {
    requested && !running_as_root()
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
