use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Threat categories a sensor line can report.
///
/// Declaration order is the classification order: when several kinds match one
/// line, the last one in this order is the one that gets spoken and archived.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatKind {
    Fire,
    Smoke,
    Motion,
    Rain,
    Intruder,
}

impl ThreatKind {
    pub const ALL: [ThreatKind; 5] = [
        ThreatKind::Fire,
        ThreatKind::Smoke,
        ThreatKind::Motion,
        ThreatKind::Rain,
        ThreatKind::Intruder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatKind::Fire => "FIRE",
            ThreatKind::Smoke => "SMOKE",
            ThreatKind::Motion => "MOTION",
            ThreatKind::Rain => "RAIN",
            ThreatKind::Intruder => "INTRUDER",
        }
    }

    /// Display channel that lights up when this kind is detected.
    pub fn channel(&self) -> SensorChannel {
        match self {
            ThreatKind::Fire => SensorChannel::Fire,
            ThreatKind::Smoke => SensorChannel::Smoke,
            ThreatKind::Motion => SensorChannel::Motion,
            ThreatKind::Rain => SensorChannel::Water,
            ThreatKind::Intruder => SensorChannel::Laser,
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard channels, one per sensor card.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    Fire,
    Smoke,
    Motion,
    Water,
    Laser,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 5] = [
        SensorChannel::Fire,
        SensorChannel::Smoke,
        SensorChannel::Motion,
        SensorChannel::Water,
        SensorChannel::Laser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorChannel::Fire => "fire",
            SensorChannel::Smoke => "smoke",
            SensorChannel::Motion => "motion",
            SensorChannel::Water => "water",
            SensorChannel::Laser => "laser",
        }
    }

    /// Label shown once a transient alarm has expired.
    pub fn idle_label(&self) -> &'static str {
        match self {
            SensorChannel::Laser => "SECURE",
            SensorChannel::Water => "DRY",
            _ => "STABLE",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detection produced by a classification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatEvent {
    pub kind: ThreatKind,
    pub severity_label: String,
    /// 0-100
    pub confidence: u8,
    pub reasoning: String,
}

/// A persisted record of one dispatched alert.
///
/// Field names on the wire follow the dashboard's record layout
/// (`type`, `date`, `time`), and unknown fields are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ThreatKind,
    #[serde(rename = "date")]
    pub date_key: String,
    #[serde(rename = "time")]
    pub time_label: String,
    #[serde(default)]
    pub details: String,
}

impl Incident {
    /// Text the archive search matches against.
    pub fn search_text(&self) -> String {
        format!("{}{}", self.kind, self.date_key).to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    SensorAlarm {
        trace_id: Uuid,
        channel: SensorChannel,
        label: String,
        confidence: u8,
    },
    SensorIdle {
        channel: SensorChannel,
        label: String,
    },
    AlarmsSilenced,
    ThoughtUpdated {
        trace_id: Uuid,
        text: String,
    },
    AlertDispatched {
        trace_id: Uuid,
        incident: Incident,
    },
    ArchiveFailed {
        trace_id: Uuid,
        error: String,
    },
    TrendUpdated {
        points: Vec<u8>,
        at: DateTime<Utc>,
    },
}
