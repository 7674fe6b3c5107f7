//! Canned replies for the operator chat box.

use guardian_archive::IncidentArchive;
use guardian_schema::SensorChannel;

use crate::display::DisplayBoard;

pub const FALLBACK_REPLY: &str = "I am monitoring all neural nodes. Ask for a 'summary' for logs.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Summary,
    Status,
    Other,
}

impl Query {
    pub fn parse(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("summary") || text.contains("report") {
            Query::Summary
        } else if text.contains("status") {
            Query::Status
        } else {
            Query::Other
        }
    }
}

pub fn daily_summary(count: usize) -> String {
    if count == 0 {
        "No threats have been detected today.".to_string()
    } else {
        format!("Today's Summary: recorded {count} events.")
    }
}

pub fn status_reply(perimeter_label: &str) -> String {
    format!("System status is nominal. Security perimeter is {perimeter_label}.")
}

pub struct Assistant<'a> {
    archive: &'a IncidentArchive,
    display: &'a DisplayBoard,
}

impl<'a> Assistant<'a> {
    pub fn new(archive: &'a IncidentArchive, display: &'a DisplayBoard) -> Self {
        Self { archive, display }
    }

    pub async fn reply(&self, text: &str, today: &str) -> String {
        match Query::parse(text) {
            Query::Summary => daily_summary(self.archive.summary(today).await.count),
            Query::Status => status_reply(&self.display.label(SensorChannel::Laser).await),
            Query::Other => FALLBACK_REPLY.to_string(),
        }
    }
}
