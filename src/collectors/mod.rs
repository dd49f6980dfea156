pub mod block;
pub mod command;
pub mod partitions;
pub mod scan;
pub mod smart;

use crate::models::disk::{BlockInfo, PartitionInfo};
use anyhow::Result;

/// Source of the OS partition list (device path + mount options).
pub trait PartitionSource {
    fn partitions(&self) -> Result<Vec<PartitionInfo>>;
}

/// Source of the hardware block inventory (name + bus path).
pub trait BlockSource {
    fn block_devices(&self) -> Result<Vec<BlockInfo>>;
}

impl PartitionSource for Vec<PartitionInfo> {
    fn partitions(&self) -> Result<Vec<PartitionInfo>> {
        Ok(self.clone())
    }
}

impl BlockSource for Vec<BlockInfo> {
    fn block_devices(&self) -> Result<Vec<BlockInfo>> {
        Ok(self.clone())
    }
}
