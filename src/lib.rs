//! Physical disk health telemetry: which disks exist, and what smartctl says
//! about their temperature, power-on hours and overall health.
//!
//! Disks are discovered from three sources (the partition table,
//! `smartctl --scan-open` and the hardware block inventory), then queried one
//! at a time. Failures of any single source or disk are collected rather than
//! propagated.

pub mod collectors;
pub mod config;
pub mod error;
pub mod models;
pub mod platform;
pub mod report;
pub mod snapshot;

pub use collectors::command::{Cancel, CommandRunner};
pub use error::{CollectError, CommandError};
pub use models::disk::{BlockInfo, DiskSet, PartitionInfo};
pub use models::health::{DriveHealth, DriveReading};
pub use platform::Platform;
pub use snapshot::{Collector, DriveSnapshot};
