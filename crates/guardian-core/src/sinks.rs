//! Delivery side effects the pipeline triggers but never waits on for
//! confirmation: push notifications and speech.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

#[async_trait]
pub trait SpeakSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;

    /// Cut off the current utterance, if any.
    async fn cancel(&self) -> Result<()>;

    /// Wait for the current utterance to play out. Call before exiting.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

pub fn notification_title(kind: impl std::fmt::Display) -> String {
    format!("GUARDIAN: {kind} ALERT")
}

pub struct LogNotifier;

#[async_trait]
impl NotifySink for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!(title, body, "notification");
        Ok(())
    }
}

pub struct LogSpeaker;

#[async_trait]
impl SpeakSink for LogSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        info!(text, "speak");
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        debug!("speech cancelled");
        Ok(())
    }
}

/// Posts `{"title": .., "body": ..}` to a push gateway.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotifySink for WebhookNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await
            .with_context(|| format!("webhook request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("webhook {} returned {}", self.url, status);
        }
        debug!(%status, "notification delivered");
        Ok(())
    }
}

/// Runs a text-to-speech program with the text as its last argument.
///
/// Only one utterance plays at a time: a new one kills the previous child.
pub struct CommandSpeaker {
    argv: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            anyhow::bail!("speech command must name a program");
        }
        Ok(Self {
            argv,
            current: Mutex::new(None),
        })
    }
}

#[async_trait]
impl SpeakSink for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut current = self.current.lock().await;
        if let Some(mut previous) = current.take() {
            let _ = previous.start_kill();
        }

        let child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start speech command {}", self.argv[0]))?;
        *current = Some(child);
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        if let Some(mut child) = self.current.lock().await.take() {
            child.start_kill().context("failed to stop speech command")?;
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        if let Some(mut child) = self.current.lock().await.take() {
            let status = child
                .wait()
                .await
                .context("failed to wait for speech command")?;
            debug!(%status, "speech finished");
        }
        Ok(())
    }
}
