use std::path::Path;

/// Marker file present on Synology DSM installs.
const SYNOLOGY_MARKER: &str = "/etc/synoinfo.conf";

/// Which OS family we are collecting on. Every platform-specific branch in
/// discovery and argument selection dispatches through this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    /// Linux-based NAS; its drives sit behind a SAT bridge smartctl can't autodetect.
    Synology,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            if Path::new(SYNOLOGY_MARKER).exists() {
                Platform::Synology
            } else {
                Platform::Linux
            }
        } else {
            Platform::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Linux    => "linux",
            Platform::Synology => "synology",
            Platform::MacOs    => "macos",
            Platform::Windows  => "windows",
            Platform::Other    => "other",
        }
    }

    /// Partitions are reported per slice (`/dev/disk3s1`) and must be folded
    /// back to the whole disk.
    pub fn collapses_slices(&self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// Whether the smartctl scan and the block inventory run at all.
    pub fn probes_hardware(&self) -> bool {
        !matches!(self, Platform::MacOs)
    }

    /// Whether block device names live under `/dev`.
    pub fn has_dev_namespace(&self) -> bool {
        !matches!(self, Platform::Windows)
    }

    /// Controller type that overrides any discovered hint.
    pub fn forced_hint(&self) -> Option<&'static str> {
        match self {
            Platform::Synology => Some("sat"),
            _                  => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_macos_collapses_and_skips_probes() {
        for p in [Platform::Linux, Platform::Synology, Platform::Windows, Platform::Other] {
            assert!(!p.collapses_slices());
            assert!(p.probes_hardware());
        }
        assert!(Platform::MacOs.collapses_slices());
        assert!(!Platform::MacOs.probes_hardware());
    }

    #[test]
    fn forced_hint_is_synology_only() {
        assert_eq!(Platform::Synology.forced_hint(), Some("sat"));
        assert_eq!(Platform::Linux.forced_hint(), None);
        assert!(!Platform::Windows.has_dev_namespace());
        assert!(Platform::Linux.has_dev_namespace());
    }
}
