//! One classification pass per incoming line: display intents, the spoken
//! thought, the debounced notify + archive dispatch and the trend sample.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use guardian_archive::{date_key, default_details, ArchiveError, IncidentArchive};
use guardian_bus::BusPublisher;
use guardian_schema::{BusMessage, Incident, ThreatEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assistant::Assistant;
use crate::classifier::classify;
use crate::config::GuardianConfig;
use crate::debounce::AlertDebouncer;
use crate::display::DisplayBoard;
use crate::sinks::{notification_title, NotifySink, SpeakSink};
use crate::trend::TrendBuffer;

#[derive(Debug)]
pub struct PassOutcome {
    pub trace_id: Uuid,
    pub events: Vec<ThreatEvent>,
    /// Reasoning of the last matching event, when anything matched.
    pub thought: Option<String>,
    pub dispatched: Option<Incident>,
    pub quarantined: Option<String>,
    pub archive_error: Option<ArchiveError>,
    pub trend_value: u8,
}

impl PassOutcome {
    pub fn matched(&self) -> bool {
        !self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: usize,
    /// Passes with at least one matching event.
    pub alerts: usize,
    /// Incidents written to the archive.
    pub incidents: usize,
}

pub struct AlertPipeline {
    debouncer: AlertDebouncer,
    trend: TrendBuffer,
    archive: IncidentArchive,
    display: Arc<DisplayBoard>,
    notifier: Arc<dyn NotifySink>,
    speaker: Arc<dyn SpeakSink>,
    bus: BusPublisher,
    thought: Option<String>,
    deliveries: JoinSet<()>,
}

/// Stop-alarm handle that stays usable while the pipeline is busy reading.
#[derive(Clone)]
pub struct AlarmControl {
    display: Arc<DisplayBoard>,
    speaker: Arc<dyn SpeakSink>,
}

impl AlarmControl {
    /// Cut the current utterance and clear every alarm flag.
    pub async fn stop(&self) {
        if let Err(e) = self.speaker.cancel().await {
            warn!(error = %e, "failed to cancel speech");
        }
        self.display.silence().await;
    }
}

impl AlertPipeline {
    pub fn new(
        archive: IncidentArchive,
        notifier: Arc<dyn NotifySink>,
        speaker: Arc<dyn SpeakSink>,
        bus: BusPublisher,
    ) -> Self {
        Self::from_config(&GuardianConfig::default(), archive, notifier, speaker, bus)
    }

    pub fn from_config(
        config: &GuardianConfig,
        archive: IncidentArchive,
        notifier: Arc<dyn NotifySink>,
        speaker: Arc<dyn SpeakSink>,
        bus: BusPublisher,
    ) -> Self {
        let display = DisplayBoard::new(bus.clone(), Duration::from_millis(config.revert_ms));
        Self {
            debouncer: AlertDebouncer::new(config.debounce_ms),
            trend: TrendBuffer::new(config.trend_capacity),
            archive,
            display: Arc::new(display),
            notifier,
            speaker,
            bus,
            thought: None,
            deliveries: JoinSet::new(),
        }
    }

    /// Builds the archive and both sinks from configuration.
    pub fn open(config: &GuardianConfig, root: &Path, bus: BusPublisher) -> Result<Self> {
        let store = config.archive.open_store(root)?;
        let archive = IncidentArchive::new(store, config.archive.key.clone());
        let notifier = config.notify.build()?;
        let speaker = config.speech.build()?;
        Ok(Self::from_config(config, archive, notifier, speaker, bus))
    }

    pub async fn handle_line(&mut self, line: &str, now: DateTime<Local>) -> PassOutcome {
        let trace_id = Uuid::new_v4();
        let events = classify(line);

        for event in &events {
            self.display.raise(trace_id, event).await;
        }

        let mut outcome = PassOutcome {
            trace_id,
            events,
            thought: None,
            dispatched: None,
            quarantined: None,
            archive_error: None,
            trend_value: 0,
        };

        if let Some(last) = outcome.events.last().cloned() {
            outcome.thought = Some(last.reasoning.clone());
            self.set_thought(trace_id, &last.reasoning).await;

            if let Err(e) = self.speaker.speak(&last.reasoning).await {
                warn!(%trace_id, error = %e, "speech failed");
            }

            if self.debouncer.try_acquire(now.timestamp_millis()) {
                self.dispatch(trace_id, &last, &now, &mut outcome).await;
            } else {
                debug!(%trace_id, kind = %last.kind, "alert suppressed by debounce window");
            }
        }

        outcome.trend_value = self.trend.push_presence(outcome.matched());
        let _ = self
            .bus
            .publish(BusMessage::TrendUpdated {
                points: self.trend.snapshot(),
                at: Utc::now(),
            })
            .await;

        outcome
    }

    async fn dispatch(
        &mut self,
        trace_id: Uuid,
        event: &ThreatEvent,
        now: &DateTime<Local>,
        outcome: &mut PassOutcome,
    ) {
        self.send_notification(trace_id, event);

        match self
            .archive
            .append(event.kind, now, default_details(event.kind))
            .await
        {
            Ok(appended) => {
                info!(%trace_id, id = appended.incident.id, kind = %event.kind, "alert dispatched");
                let _ = self
                    .bus
                    .publish(BusMessage::AlertDispatched {
                        trace_id,
                        incident: appended.incident.clone(),
                    })
                    .await;
                outcome.dispatched = Some(appended.incident);
                outcome.quarantined = appended.quarantined;
            }
            Err(e) => {
                warn!(%trace_id, kind = %event.kind, error = %e, "incident not archived");
                let _ = self
                    .bus
                    .publish(BusMessage::ArchiveFailed {
                        trace_id,
                        error: e.to_string(),
                    })
                    .await;
                outcome.quarantined = e.quarantined().map(str::to_string);
                outcome.archive_error = Some(e);
            }
        }
    }

    /// Delivery runs in the background so a slow gateway never holds up the pass.
    fn send_notification(&mut self, trace_id: Uuid, event: &ThreatEvent) {
        while self.deliveries.try_join_next().is_some() {}

        let notifier = Arc::clone(&self.notifier);
        let title = notification_title(event.kind);
        let body = event.reasoning.clone();
        self.deliveries.spawn(async move {
            if let Err(e) = notifier.notify(&title, &body).await {
                warn!(%trace_id, error = %e, "notification failed");
            }
        });
    }

    /// Waits for queued notifications and the current utterance.
    pub async fn flush(&mut self) {
        while self.deliveries.join_next().await.is_some() {}
        if let Err(e) = self.speaker.finish().await {
            warn!(error = %e, "speech did not finish");
        }
    }

    async fn set_thought(&mut self, trace_id: Uuid, text: &str) {
        self.thought = Some(text.to_string());
        let _ = self
            .bus
            .publish(BusMessage::ThoughtUpdated {
                trace_id,
                text: text.to_string(),
            })
            .await;
    }

    /// Drives `source` line by line until EOF. Bytes that are not valid
    /// UTF-8 are decoded lossily.
    pub async fn run<R>(&mut self, mut source: R) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = RunSummary::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = source
                .read_until(b'\n', &mut buf)
                .await
                .context("failed to read from line source")?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            summary.lines += 1;

            let outcome = self.handle_line(line, Local::now()).await;
            if outcome.matched() {
                summary.alerts += 1;
            }
            if outcome.dispatched.is_some() {
                summary.incidents += 1;
            }
        }
        info!(
            lines = summary.lines,
            alerts = summary.alerts,
            incidents = summary.incidents,
            "line source closed"
        );
        Ok(summary)
    }

    pub fn alarm_control(&self) -> AlarmControl {
        AlarmControl {
            display: Arc::clone(&self.display),
            speaker: Arc::clone(&self.speaker),
        }
    }

    /// Stop-alarm control: cut the current utterance and clear alarm flags.
    pub async fn stop_alarm(&self) {
        self.alarm_control().stop().await;
    }

    /// Answers an operator question and speaks the answer.
    pub async fn ask(&self, text: &str, now: DateTime<Local>) -> String {
        let reply = Assistant::new(&self.archive, &self.display)
            .reply(text, &date_key(&now))
            .await;
        if let Err(e) = self.speaker.speak(&reply).await {
            warn!(error = %e, "speech failed");
        }
        reply
    }

    pub fn archive(&self) -> &IncidentArchive {
        &self.archive
    }

    pub fn display(&self) -> &Arc<DisplayBoard> {
        &self.display
    }

    pub fn trend(&self) -> &TrendBuffer {
        &self.trend
    }

    pub fn debouncer(&self) -> &AlertDebouncer {
        &self.debouncer
    }

    pub fn thought(&self) -> Option<&str> {
        self.thought.as_deref()
    }
}
