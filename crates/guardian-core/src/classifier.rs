//! Keyword classifier for sensor lines.
//!
//! Pure and total: any input, including empty or garbled text, yields a
//! (possibly empty) list of events. Rows are checked independently, so one
//! line can raise several kinds at once.

use guardian_schema::{ThreatEvent, ThreatKind};

#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    /// Lowercase substring searched for in the lowercased line
    pub needle: &'static str,
    pub kind: ThreatKind,
    pub severity_label: &'static str,
    pub confidence: u8,
    pub reasoning: &'static str,
}

/// Evaluated top to bottom; the order decides which kind is reported last.
pub const TRIGGERS: [Trigger; 5] = [
    Trigger {
        needle: "fire",
        kind: ThreatKind::Fire,
        severity_label: "CRITICAL",
        confidence: 100,
        reasoning: "Critical thermal runaway detected.",
    },
    Trigger {
        needle: "smoke",
        kind: ThreatKind::Smoke,
        severity_label: "DANGER",
        confidence: 85,
        reasoning: "Particulate density spike detected.",
    },
    Trigger {
        needle: "object",
        kind: ThreatKind::Motion,
        severity_label: "MOVEMENT",
        confidence: 70,
        reasoning: "Proximity alarm triggered.",
    },
    Trigger {
        needle: "rain",
        kind: ThreatKind::Rain,
        severity_label: "DETECTED",
        confidence: 90,
        reasoning: "Environmental moisture detected.",
    },
    Trigger {
        needle: "intruder",
        kind: ThreatKind::Intruder,
        severity_label: "BREACH",
        confidence: 100,
        reasoning: "Perimeter breach detected! Laser beam interrupted.",
    },
];

impl Trigger {
    fn event(&self) -> ThreatEvent {
        ThreatEvent {
            kind: self.kind,
            severity_label: self.severity_label.to_string(),
            confidence: self.confidence,
            reasoning: self.reasoning.to_string(),
        }
    }
}

pub fn classify(line: &str) -> Vec<ThreatEvent> {
    let lowered = line.to_lowercase();
    TRIGGERS
        .iter()
        .filter(|trigger| lowered.contains(trigger.needle))
        .map(Trigger::event)
        .collect()
}
