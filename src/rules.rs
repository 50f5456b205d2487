//! Safety rule classifier: sensor reading in, at most one alert out.
//!
//! `classify` is a pure function with no I/O and no state, safe to call
//! concurrently and repeatedly. Readings with unrecognized sensor types or
//! value shapes degrade to "no match" rather than erroring — the shared
//! store may hold anything the feed (or a misbehaving sensor) wrote.

use crate::models::{AlertKind, Classification, Reading, Severity};

// ---

/// Thresholds are strict: boundary values do not trigger.
const HIGH_TEMP_C: f64 = 35.0;
const LOW_TEMP_C: f64 = 10.0;
const HIGH_HUMIDITY_PCT: f64 = 70.0;

/// Check a reading against the safety rules.
///
/// Rules are mutually exclusive by sensor type, so at most one
/// classification results. Noise and motion readings exist in the store
/// for dashboard display only and never alert.
pub fn classify(reading: &Reading) -> Option<Classification> {
    // ---
    let room = reading.room.as_deref().unwrap_or_default();

    match reading.sensor_type.as_str() {
        "smoke" if smoke_detected(&reading.value) => Some(Classification {
            kind: AlertKind::FireSafety,
            severity: Severity::High,
            message: format!("CRITICAL: Smoke detected in {room}!"),
        }),
        "temperature" => {
            let v = numeric(&reading.value)?;
            if v > HIGH_TEMP_C {
                Some(Classification {
                    kind: AlertKind::HighTemp,
                    severity: Severity::High,
                    message: format!("Dangerous heat ({v}°C) in {room}. Potential fire risk."),
                })
            } else if v < LOW_TEMP_C {
                Some(Classification {
                    kind: AlertKind::LowTemp,
                    severity: Severity::Medium,
                    message: format!("Low temperature ({v}°C) in {room}. Check heating."),
                })
            } else {
                None
            }
        }
        "humidity" => {
            let v = numeric(&reading.value)?;
            (v > HIGH_HUMIDITY_PCT).then(|| Classification {
                kind: AlertKind::Humidity,
                severity: Severity::Low,
                message: format!("High humidity ({v}%) in {room}. Mold risk."),
            })
        }
        _ => None,
    }
}

/// Smoke counts as detected only for boolean `true` or integer `1`.
/// Floats (including `1.0`), `0`, `false`, and anything else do not count.
fn smoke_detected(value: &serde_json::Value) -> bool {
    // ---
    matches!(value, serde_json::Value::Bool(true)) || value.as_i64() == Some(1)
}

/// Extract a numeric value; booleans and other shapes yield `None`.
fn numeric(value: &serde_json::Value) -> Option<f64> {
    // ---
    value.as_f64()
}
