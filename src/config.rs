use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub smartctl: SmartctlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Collect drive data at all.
    pub enabled:     bool,
    /// Run smartctl through `sudo -n` (ignored when already root).
    pub use_sudo:    bool,
    /// Deadline for a whole collection cycle in seconds (0 = none).
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartctlConfig {
    /// Command line used to invoke smartctl, e.g. "/usr/sbin/smartctl".
    pub command: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { enabled: true, use_sudo: false, timeout_sec: 60 }
    }
}

impl Default for SmartctlConfig {
    fn default() -> Self {
        Self { command: "smartctl".to_string() }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match try_load() {
            Ok(c)  => c,
            Err(e) => {
                log::debug!("using default config: {:#}", e);
                // Write defaults on first run (best-effort)
                if let Err(e) = try_write_defaults() {
                    log::debug!("could not write default config: {:#}", e);
                }
                Config::default()
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("diskhealth").join("diskhealth.toml"))
    }
}

fn try_load() -> Result<Config> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    let text = fs::read_to_string(path)?;
    Config::from_toml(&text)
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# diskhealth configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
