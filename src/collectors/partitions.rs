use crate::collectors::PartitionSource;
use crate::models::disk::{DiskSet, PartitionInfo};
use crate::platform::Platform;
use anyhow::{bail, Context, Result};
use log::debug;
use std::process::Command;

const MAC_DISK_PREFIX: &str = "/dev/disk";

/// Merge the OS partition list into `disks`, one entry per whole disk.
pub fn discover(platform: Platform, partitions: &[PartitionInfo], disks: &mut DiskSet) {
    for part in partitions {
        debug!("partition: {:?}", part);

        if !platform.collapses_slices() {
            disks.insert(part.device.as_str(), "");
            continue;
        }

        if !part.device.starts_with(MAC_DISK_PREFIX) || part.options.iter().any(|o| o == "nobrowse") {
            continue;
        }
        disks.insert(whole_disk(&part.device), "");
    }
}

/// `/dev/disk3s1s1` → `/dev/disk3`. Names without a slice suffix are returned as-is.
pub fn whole_disk(device: &str) -> &str {
    let Some(rest) = device.strip_prefix(MAC_DISK_PREFIX) else {
        return device;
    };
    match rest.find('s') {
        Some(stop) if stop > 0 => &device[..MAC_DISK_PREFIX.len() + stop],
        _ => device,
    }
}

/// Partition table as the running OS reports it.
#[derive(Debug, Clone, Copy)]
pub struct SystemPartitions {
    platform: Platform,
}

impl SystemPartitions {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl PartitionSource for SystemPartitions {
    fn partitions(&self) -> Result<Vec<PartitionInfo>> {
        match self.platform {
            Platform::MacOs   => read_mount_command(),
            Platform::Windows => read_logical_disks(),
            Platform::Linux | Platform::Synology | Platform::Other => {
                let content = std::fs::read_to_string("/proc/mounts")
                    .context("reading /proc/mounts")?;
                Ok(parse_proc_mounts(&content))
            }
        }
    }
}

/// Block-backed entries of `/proc/mounts`; pseudo filesystems (`proc`,
/// `tmpfs`, …) have no device path and are dropped.
pub fn parse_proc_mounts(content: &str) -> Vec<PartitionInfo> {
    let mut v = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 { continue; }
        if !fields[0].starts_with('/') { continue; }
        v.push(PartitionInfo {
            device:  fields[0].to_string(),
            options: fields[3].split(',').map(str::to_string).collect(),
        });
    }
    v
}

fn read_mount_command() -> Result<Vec<PartitionInfo>> {
    let out = Command::new("mount").output().context("mount not found")?;
    if !out.status.success() {
        bail!("mount exited with {}", out.status);
    }
    Ok(parse_mount_output(&String::from_utf8_lossy(&out.stdout)))
}

/// BSD-style `mount` output: `/dev/disk3s1s1 on / (apfs, sealed, local, read-only)`.
pub fn parse_mount_output(text: &str) -> Vec<PartitionInfo> {
    text.lines()
        .filter_map(|line| {
            let (device, rest) = line.split_once(" on ")?;
            let options = match (rest.rfind('('), rest.rfind(')')) {
                (Some(open), Some(close)) if open < close => rest[open + 1..close]
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
                _ => Vec::new(),
            };
            Some(PartitionInfo { device: device.trim().to_string(), options })
        })
        .collect()
}

fn read_logical_disks() -> Result<Vec<PartitionInfo>> {
    let out = Command::new("wmic")
        .args(["logicaldisk", "get", "DeviceID"])
        .output()
        .context("wmic not found")?;
    if !out.status.success() {
        bail!("wmic exited with {}", out.status);
    }
    let text = String::from_utf8_lossy(&out.stdout);
    Ok(text.lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| PartitionInfo { device: l.to_string(), options: Vec::new() })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_slices_collapse_to_whole_disk() {
        let parts = vec![
            PartitionInfo::new("/dev/disk3s1", &["apfs", "local"]),
            PartitionInfo::new("/dev/disk3s5", &["apfs", "local"]),
            PartitionInfo::new("/dev/disk10s2", &["hfs"]),
        ];
        let mut d = DiskSet::new();
        discover(Platform::MacOs, &parts, &mut d);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![("/dev/disk10", ""), ("/dev/disk3", "")]);
    }

    #[test]
    fn mac_skips_nobrowse_and_foreign_paths() {
        let parts = vec![
            PartitionInfo::new("/dev/disk1s2", &["apfs", "nobrowse"]),
            PartitionInfo::new("map auto_home", &["autofs"]),
            PartitionInfo::new("devfs", &["devfs"]),
        ];
        let mut d = DiskSet::new();
        discover(Platform::MacOs, &parts, &mut d);
        assert!(d.is_empty());
    }

    #[test]
    fn other_platforms_keep_paths_verbatim() {
        let parts = vec![
            PartitionInfo::new("/dev/sda1", &["rw"]),
            PartitionInfo::new("/dev/disk3s1", &["nobrowse"]),
        ];
        let mut d = DiskSet::new();
        discover(Platform::Linux, &parts, &mut d);
        assert!(d.contains("/dev/sda1"));
        assert!(d.contains("/dev/disk3s1"));
        assert_eq!(d.hint("/dev/sda1"), Some(""));
    }

    #[test]
    fn whole_disk_leaves_bare_disks_alone() {
        assert_eq!(whole_disk("/dev/disk0"), "/dev/disk0");
        assert_eq!(whole_disk("/dev/disk0s3s1"), "/dev/disk0");
        assert_eq!(whole_disk("/dev/sda1"), "/dev/sda1");
    }

    #[test]
    fn proc_mounts_keeps_block_devices_only() {
        let text = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
/dev/sdb1 /data xfs ro,noatime 0 0
";
        let parts = parse_proc_mounts(text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].device, "/dev/nvme0n1p2");
        assert_eq!(parts[1].options, vec!["ro", "noatime"]);
    }

    #[test]
    fn mount_output_parses_options() {
        let text = "\
/dev/disk3s1s1 on / (apfs, sealed, local, read-only, journaled)
devfs on /dev (devfs, local, nobrowse)
/dev/disk3s6 on /System/Volumes/VM (apfs, local, noexec, journaled, noatime, nobrowse)
";
        let parts = parse_mount_output(text);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].device, "/dev/disk3s1s1");
        assert!(parts[2].options.iter().any(|o| o == "nobrowse"));

        let mut d = DiskSet::new();
        discover(Platform::MacOs, &parts, &mut d);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![("/dev/disk3", "")]);
    }
}
