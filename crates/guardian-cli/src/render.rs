use guardian_schema::{BusMessage, Incident};

pub fn render(msg: &BusMessage) -> Option<String> {
    match msg {
        BusMessage::SensorAlarm {
            channel,
            label,
            confidence,
            ..
        } => Some(format!("[{channel}] {label} {confidence}%")),
        BusMessage::SensorIdle { channel, label } => Some(format!("[{channel}] {label}")),
        BusMessage::AlarmsSilenced => Some("alarms silenced".to_string()),
        BusMessage::ThoughtUpdated { text, .. } => Some(format!("AI> {text}")),
        BusMessage::AlertDispatched { incident, .. } => {
            Some(format!("logged {}", incident_row(incident)))
        }
        BusMessage::ArchiveFailed { error, .. } => Some(format!("archive unavailable: {error}")),
        BusMessage::TrendUpdated { points, .. } => Some(format!("trend {}", sparkline(points))),
    }
}

pub fn sparkline(points: &[u8]) -> String {
    points
        .iter()
        .map(|&p| if p >= 50 { '#' } else { '_' })
        .collect()
}

pub fn incident_row(incident: &Incident) -> String {
    format!(
        "{:<14} {:<9} {:<11} {:<9} {}",
        incident.id,
        incident.kind.as_str(),
        incident.date_key,
        incident.time_label,
        incident.details
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_schema::{SensorChannel, ThreatKind};
    use uuid::Uuid;

    #[test]
    fn renders_alarm_and_idle() {
        let alarm = BusMessage::SensorAlarm {
            trace_id: Uuid::new_v4(),
            channel: SensorChannel::Laser,
            label: "BREACH".into(),
            confidence: 100,
        };
        assert_eq!(render(&alarm).as_deref(), Some("[laser] BREACH 100%"));

        let idle = BusMessage::SensorIdle {
            channel: SensorChannel::Water,
            label: "DRY".into(),
        };
        assert_eq!(render(&idle).as_deref(), Some("[water] DRY"));
    }

    #[test]
    fn sparkline_marks_threat_samples() {
        assert_eq!(sparkline(&[0, 100, 0, 100, 100]), "_#_##");
    }

    #[test]
    fn incident_row_lists_every_field() {
        let row = incident_row(&Incident {
            id: 1_777_777_777_000,
            kind: ThreatKind::Rain,
            date_key: "2026-05-02".into(),
            time_label: "07:00:01".into(),
            details: "Neural alert triggered by RAIN sensor.".into(),
        });
        assert!(row.starts_with("1777777777000"));
        assert!(row.contains("RAIN"));
        assert!(row.contains("2026-05-02"));
        assert!(row.ends_with("Neural alert triggered by RAIN sensor."));
    }
}
