use crate::models::health::DriveReading;
use crate::platform::Platform;
use log::debug;

/// Device name prefixes smartctl has nothing to say about: md arrays, RAM
/// disks, the Synology boot stick, network block devices, virtio disks.
pub const SKIP_PREFIXES: &[&str] = &[
    "/dev/md", "/dev/ram", "/dev/zram", "/dev/synoboot", "/dev/nbd", "/dev/vda",
];

/// Build the `smartctl -AH` argument list for one disk, or None when the disk
/// shouldn't be queried at all.
pub fn health_args<'a>(platform: Platform, name: &'a str, hint: &'a str) -> Option<Vec<&'a str>> {
    if SKIP_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return None;
    }

    let args = if let Some(forced) = platform.forced_hint() {
        vec!["-d", forced, "-AH", name]
    } else if !hint.is_empty() && name.contains(',') {
        // Keyed by controller spec (`megaraid,0`); the hint holds the real device.
        vec!["-d", name, "-AH", hint]
    } else if !hint.is_empty() {
        vec!["-d", hint, "-AH", name]
    } else {
        vec!["-AH", name]
    };
    Some(args)
}

/// One line of smartctl output, pre-split on whitespace.
pub struct Line<'a> {
    pub text:   &'a str,
    pub fields: Vec<&'a str>,
}

impl<'a> Line<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, fields: text.split_whitespace().collect() }
    }

    fn field(&self, n: usize) -> Option<&'a str> {
        self.fields.get(n).copied()
    }
}

/// A vendor-dialect rule: when `matches` accepts a line, `extract` pulls what
/// it can from it and no later rule sees that line.
pub struct Rule {
    pub name:    &'static str,
    pub matches: fn(&Line) -> bool,
    pub extract: fn(&Line, &mut DriveReading),
}

/// Evaluated top to bottom, first match wins.
pub static RULES: &[Rule] = &[
    // SCSI/SAS: "Current Drive Temperature:     36 C"
    Rule {
        name:    "scsi-temperature",
        matches: |l| l.text.starts_with("Current Drive Temperature:"),
        extract: |l, r| set(&mut r.temperature, l.field(3).and_then(parse_int)),
    },
    // SCSI/SAS: "Accumulated power on time, hours:minutes 41811:12"
    Rule {
        name:    "scsi-power-on",
        matches: |l| l.text.starts_with("Accumulated power on time, hours:minutes"),
        extract: |l, r| set(
            &mut r.power_on_hours,
            l.field(5).and_then(|f| f.split(':').next()).and_then(parse_int),
        ),
    },
    // NVMe: "Temperature:                        38 Celsius"
    Rule {
        name:    "nvme-temperature",
        matches: |l| l.fields.len() > 1 && l.fields[0] == "Temperature:",
        extract: |l, r| set(&mut r.temperature, l.field(1).and_then(parse_int)),
    },
    // NVMe: "Power On Hours:                     12,345"
    Rule {
        name:    "nvme-power-on",
        matches: |l| l.fields.len() > 3 && l.fields[..3].concat() == "PowerOnHours:",
        extract: |l, r| set(
            &mut r.power_on_hours,
            l.field(3).and_then(|f| parse_int(&f.replace(',', ""))),
        ),
    },
    // "SMART overall-health self-assessment test result: PASSED" / "SMART Health Status: OK"
    Rule {
        name:    "health-status",
        matches: |l| l.text.contains("self-assessment ") || l.text.contains("SMART Health Status:"),
        extract: |l, r| {
            if let Some(last) = l.fields.last() {
                r.health = Some(last.to_string());
            }
        },
    },
    // Anything shorter can't be an ATA attribute row.
    Rule {
        name:    "not-an-attribute",
        matches: |l| l.fields.len() < 10,
        extract: |_, _| {},
    },
    // ATA: "194 Temperature_Celsius 0x0022 064 045 000 Old_age Always - 36 (Min/Max 20/55)"
    Rule {
        name:    "ata-temperature",
        matches: |l| l.fields[1].starts_with("Airflow_Temp") || l.fields[1].starts_with("Temperature_Cel"),
        extract: |l, r| set(&mut r.temperature, l.field(9).and_then(parse_int)),
    },
    // ATA: "  9 Power_On_Hours 0x0032 095 095 000 Old_age Always - 23456"
    Rule {
        name:    "ata-power-on",
        matches: |l| l.fields[1].starts_with("Power_On_Hour"),
        extract: |l, r| set(&mut r.power_on_hours, l.field(9).and_then(parse_int)),
    },
];

fn parse_int<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

/// Parse failures leave the previous value alone.
fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Run one line through the rule table. Returns the rule that claimed it.
pub fn apply_line(text: &str, reading: &mut DriveReading) -> Option<&'static str> {
    let line = Line::new(text);
    let rule = RULES.iter().find(|rule| (rule.matches)(&line))?;
    (rule.extract)(&line, reading);
    Some(rule.name)
}

/// Reduce one disk's `smartctl -AH` output to a reading. Never fails: text
/// in an unfamiliar dialect just yields fewer metrics.
pub fn parse_health<I, S>(name: &str, lines: I) -> DriveReading
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut reading = DriveReading::default();
    for line in lines {
        apply_line(line.as_ref(), &mut reading);
    }
    debug!("{}: {:?}", name, reading);
    reading
}
