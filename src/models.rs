//! Data models for the alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// One timestamped sensor observation from the shared reading store.
///
/// Readings are written exclusively by the external sensor feed and are
/// immutable once stored. `value` is kept as raw JSON because its shape
/// depends on the sensor (numeric for temperature/humidity/noise, boolean
/// or 0/1 for smoke/motion) and the store may contain anything.
#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub apartment_id: String,
    pub room: Option<String>,
    pub sensor_type: String,
    pub value: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

/// Alert categories produced by the rule classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    FireSafety,
    HighTemp,
    LowTemp,
    Humidity,
}

impl AlertKind {
    /// Stable code persisted in the `alerts.kind` column.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlertKind::FireSafety => "fire_safety",
            AlertKind::HighTemp => "high_temp",
            AlertKind::LowTemp => "low_temp",
            AlertKind::Humidity => "humidity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Lifecycle status of a persisted alert.
///
/// The engine only ever writes `New`; the remaining transitions belong to
/// the admin dashboard, which shares the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Open,
    Resolved,
    Ignored,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlertStatus::New => "new",
            AlertStatus::Open => "open",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Ignored => "ignored",
        }
    }
}

/// Transient output of the rule classifier. Built per reading, consumed
/// immediately by the poll loop, never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    // ---
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

/// A new incident row destined for the alert ledger.
#[derive(Debug, Clone)]
pub struct NewAlert {
    // ---
    pub apartment_id: String,
    pub room: String,
    pub source_reading_id: Uuid,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

impl NewAlert {
    /// Combine a reading with its classification into an insertable alert.
    ///
    /// A reading without a room still yields an alert; the room collapses
    /// to an empty placeholder rather than failing.
    pub fn from_classification(reading: &Reading, classification: Classification) -> Self {
        // ---
        NewAlert {
            apartment_id: reading.apartment_id.clone(),
            room: reading.room.clone().unwrap_or_default(),
            source_reading_id: reading.id,
            kind: classification.kind,
            severity: classification.severity,
            message: classification.message,
        }
    }
}
