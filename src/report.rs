use crate::snapshot::DriveSnapshot;
use serde_json::{json, Value};

/// Human-readable summary of one collection cycle.
pub fn generate(snap: &DriveSnapshot) -> String {
    let mut out = String::new();
    let h = &snap.health;

    out.push_str(&format!("Drive health, {}\n\n", snap.taken_at.format("%Y-%m-%d %H:%M:%S")));

    let names = h.names();
    if names.is_empty() {
        out.push_str("  (no readings)\n");
    }
    for name in names {
        let temp = match h.temperatures.get(name) {
            Some(t) => format!("{}°C", t),
            None    => "—".to_string(),
        };
        let age = match h.power_on_hours.get(name) {
            Some(hrs) => format!("{} h", hrs),
            None      => "—".to_string(),
        };
        let status = h.health.get(name).map(String::as_str).unwrap_or("?");
        out.push_str(&format!("  {:24}  Temp:{:6}  Age:{:10}  Health:{}\n", name, temp, age, status));
    }

    if !snap.errors.is_empty() {
        out.push_str(&format!("\nErrors ({}):\n", snap.errors.len()));
        for e in &snap.errors {
            out.push_str(&format!("  {}\n", e));
        }
    }
    out
}

/// JSON form of a snapshot; errors are flattened to their messages.
pub fn to_json(snap: &DriveSnapshot) -> Value {
    json!({
        "timestamp":      snap.taken_at.to_rfc3339(),
        "temperatures":   snap.health.temperatures,
        "power_on_hours": snap.health.power_on_hours,
        "health":         snap.health.health,
        "errors":         snap.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
    })
}
