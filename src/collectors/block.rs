use crate::collectors::BlockSource;
use crate::models::disk::{BlockInfo, DiskSet};
use crate::platform::Platform;
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Command;

const UNKNOWN_BUS: &str = "unknown";
const BY_PATH_DIR: &str = "/dev/disk/by-path";

/// Merge the hardware block inventory into `disks`, one entry per bus path.
///
/// Every entry is written with an empty hint, replacing whatever hint the
/// scan probe left for the same name.
pub fn enumerate(platform: Platform, devices: &[BlockInfo], disks: &mut DiskSet) {
    let mut seen: HashSet<&str> = HashSet::new();

    for dev in devices {
        debug!("block dev: {:?}", dev);

        // Devices without a known bus path can't be told apart, so none of them count as repeats.
        if seen.contains(dev.bus_path.as_str()) && !dev.bus_path.eq_ignore_ascii_case(UNKNOWN_BUS) {
            continue;
        }
        seen.insert(dev.bus_path.as_str());

        if platform.has_dev_namespace() {
            disks.insert(format!("/dev/{}", dev.name), "");
        } else {
            disks.insert(dev.name.as_str(), "");
        }
    }
}

/// Block inventory as the running OS reports it.
#[derive(Debug, Clone, Copy)]
pub struct SystemBlocks {
    platform: Platform,
}

impl SystemBlocks {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl BlockSource for SystemBlocks {
    fn block_devices(&self) -> Result<Vec<BlockInfo>> {
        match self.platform {
            Platform::Linux | Platform::Synology => read_linux_blocks(),
            Platform::Windows => read_windows_disks(),
            Platform::MacOs | Platform::Other => {
                Err(anyhow!("block inventory unsupported on {}", self.platform.label()))
            }
        }
    }
}

fn read_linux_blocks() -> Result<Vec<BlockInfo>> {
    let out = Command::new("lsblk")
        .args(["--json", "--nodeps", "-o", "NAME,TYPE"])
        .output()
        .context("lsblk not found")?;
    if !out.status.success() {
        bail!("lsblk exited with {}", out.status);
    }

    let v: Value = serde_json::from_slice(&out.stdout).context("parsing lsblk output")?;
    let names = parse_lsblk_disks(&v);
    let bus_paths = read_by_path(Path::new(BY_PATH_DIR));

    Ok(names.into_iter()
        .map(|name| {
            let bus_path = bus_paths.get(&name).cloned().unwrap_or_else(|| UNKNOWN_BUS.to_string());
            BlockInfo { name, bus_path }
        })
        .collect())
}

/// Names of top-level `disk` entries in `lsblk --json` output.
pub fn parse_lsblk_disks(v: &Value) -> Vec<String> {
    let devices = match v["blockdevices"].as_array() {
        Some(d) => d,
        None    => return Vec::new(),
    };

    devices.iter()
        .filter(|dev| dev["type"].as_str() == Some("disk"))
        .filter_map(|dev| dev["name"].as_str())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Kernel name → bus path, from the udev `by-path` symlinks. Partition links
/// (`…-part1`) are skipped; when a disk has several links the first in
/// directory-name order wins.
fn read_by_path(dir: &Path) -> HashMap<String, String> {
    let mut entries: Vec<(String, String)> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok())
            .filter_map(|e| {
                let link = e.file_name().to_string_lossy().into_owned();
                let target = std::fs::read_link(e.path()).ok()?;
                let name = target.file_name()?.to_string_lossy().into_owned();
                Some((link, name))
            })
            .collect(),
        Err(_) => return HashMap::new(),
    };
    entries.sort();

    let mut map = HashMap::new();
    for (link, name) in entries {
        if link.contains("-part") { continue; }
        map.entry(name).or_insert(link);
    }
    map
}

fn read_windows_disks() -> Result<Vec<BlockInfo>> {
    let out = Command::new("wmic")
        .args(["diskdrive", "get", "DeviceID,PNPDeviceID", "/format:csv"])
        .output()
        .context("wmic not found")?;
    if !out.status.success() {
        bail!("wmic exited with {}", out.status);
    }
    Ok(parse_wmic_csv(&String::from_utf8_lossy(&out.stdout)))
}

/// `Node,DeviceID,PNPDeviceID` rows; the header row and blank lines are skipped.
pub fn parse_wmic_csv(text: &str) -> Vec<BlockInfo> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let f: Vec<&str> = l.split(',').collect();
            if f.len() < 3 || f[1] == "DeviceID" { return None; }
            let bus = if f[2].is_empty() { UNKNOWN_BUS } else { f[2] };
            Some(BlockInfo::new(f[1], bus))
        })
        .collect()
}
