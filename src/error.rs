//! Error types for a disk health collection cycle.
//!
//! Nothing here is fatal to the monitoring loop: a cycle hands back every
//! error it ran into alongside whatever readings it did manage to collect.

use std::io;
use thiserror::Error;

/// Failure of one external tool invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The process could not be started (missing binary, bad permissions).
    #[error("unable to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Process ran but exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },

    /// The governing cancel token fired before the process finished.
    #[error("{program} cancelled")]
    Cancelled { program: String },

    /// Waiting on the child failed.
    #[error("waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The stdout drain task panicked.
    #[error("output reader for {program} panicked")]
    DrainPanicked { program: String },
}

/// Non-fatal errors accumulated over one collection cycle.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("unable to get partitions: {0:#}")]
    Partitions(anyhow::Error),

    #[error("unable to get block devices: {0:#}")]
    BlockDevices(anyhow::Error),

    #[error("smartctl scan: {0}")]
    Scan(#[source] CommandError),

    /// All discovery sources came back empty.
    #[error("no disks found")]
    NoDisks,

    #[error("{name}: {source}")]
    Disk {
        name: String,
        #[source]
        source: CommandError,
    },
}

impl CollectError {
    pub fn is_no_disks(&self) -> bool {
        matches!(self, CollectError::NoDisks)
    }
}
