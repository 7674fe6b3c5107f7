use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use guardian_archive::{
    BlobStore, FileBlobStore, MemoryBlobStore, SqliteBlobStore, DEFAULT_ARCHIVE_KEY,
};
use serde::{Deserialize, Serialize};

use crate::debounce::DEFAULT_DEBOUNCE_MS;
use crate::display::DEFAULT_REVERT_MS;
use crate::sinks::{
    CommandSpeaker, LogNotifier, LogSpeaker, NotifySink, SpeakSink, WebhookNotifier,
};
use crate::trend::DEFAULT_TREND_CAPACITY;

pub const CONFIG_FILE: &str = "guardian.yaml";

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_revert_ms() -> u64 {
    DEFAULT_REVERT_MS
}

fn default_trend_capacity() -> usize {
    DEFAULT_TREND_CAPACITY
}

fn default_archive_dir() -> String {
    "data".to_string()
}

fn default_archive_key() -> String {
    DEFAULT_ARCHIVE_KEY.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub backend: ArchiveBackend,
    /// Relative paths resolve against the guardian root.
    #[serde(default = "default_archive_dir")]
    pub dir: String,
    #[serde(default = "default_archive_key")]
    pub key: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            dir: default_archive_dir(),
            key: default_archive_key(),
        }
    }
}

impl ArchiveConfig {
    pub fn open_store(&self, root: &Path) -> Result<Arc<dyn BlobStore>> {
        let dir = root.join(&self.dir);
        let store: Arc<dyn BlobStore> = match self.backend {
            ArchiveBackend::File => Arc::new(FileBlobStore::new(dir)),
            ArchiveBackend::Sqlite => Arc::new(SqliteBlobStore::open(&dir.join("guardian.db"))?),
            ArchiveBackend::Memory => Arc::new(MemoryBlobStore::new()),
        };
        Ok(store)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// `${VAR}` references are expanded from the environment.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NotifyConfig {
    pub fn build(&self) -> Result<Arc<dyn NotifySink>> {
        match self.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => Ok(Arc::new(WebhookNotifier::new(
                url,
                Duration::from_secs(self.timeout_secs),
            )?)),
            None => Ok(Arc::new(LogNotifier)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

impl SpeechConfig {
    pub fn build(&self) -> Result<Arc<dyn SpeakSink>> {
        match &self.command {
            Some(argv) => Ok(Arc::new(CommandSpeaker::new(argv.clone())?)),
            None => Ok(Arc::new(LogSpeaker)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_revert_ms")]
    pub revert_ms: u64,
    #[serde(default = "default_trend_capacity")]
    pub trend_capacity: usize,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            revert_ms: default_revert_ms(),
            trend_capacity: default_trend_capacity(),
            archive: ArchiveConfig::default(),
            notify: NotifyConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Reads `<config_dir>/guardian.yaml`. A missing file yields the defaults.
pub fn load_config(config_dir: &Path) -> Result<GuardianConfig> {
    let path = config_dir.join(CONFIG_FILE);
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            GuardianConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse yaml file: {}", path.display()))?
        }
    } else {
        GuardianConfig::default()
    };

    if let Some(url) = &mut config.notify.webhook_url {
        *url = resolve_env_var(url);
    }

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &GuardianConfig) -> Result<()> {
    if config.trend_capacity == 0 {
        return Err(anyhow!("trend_capacity must be at least 1"));
    }
    if config.revert_ms == 0 {
        return Err(anyhow!("revert_ms must be positive"));
    }
    if config.archive.key.trim().is_empty() {
        return Err(anyhow!("archive.key must not be empty"));
    }
    if config
        .archive
        .key
        .chars()
        .any(|c| matches!(c, '/' | '\\') || c.is_control())
    {
        return Err(anyhow!("archive.key contains a path separator: {}", config.archive.key));
    }
    if config.notify.timeout_secs == 0 {
        return Err(anyhow!("notify.timeout_secs must be positive"));
    }
    if let Some(url) = config.notify.webhook_url.as_deref() {
        if !url.trim().is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("notify.webhook_url must be an http(s) url: {url}"));
        }
    }
    if let Some(argv) = &config.speech.command {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(anyhow!("speech.command must name a program"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, yaml: &str) {
        fs::write(dir.join(CONFIG_FILE), yaml).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.debounce_ms, 5_000);
        assert_eq!(config.revert_ms, 6_000);
        assert_eq!(config.trend_capacity, 20);
        assert_eq!(config.archive.backend, ArchiveBackend::File);
        assert_eq!(config.archive.dir, "data");
        assert_eq!(config.archive.key, "guardian_records");
        assert_eq!(config.notify.timeout_secs, 10);
        assert!(config.notify.webhook_url.is_none());
        assert!(config.speech.command.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            "debounce_ms: 2500\narchive:\n  backend: sqlite\nspeech:\n  command: [espeak, -s, \"150\"]\n",
        );

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.debounce_ms, 2_500);
        assert_eq!(config.revert_ms, 6_000);
        assert_eq!(config.archive.backend, ArchiveBackend::Sqlite);
        assert_eq!(config.archive.key, "guardian_records");
        assert_eq!(
            config.speech.command.as_deref(),
            Some(&["espeak".to_string(), "-s".to_string(), "150".to_string()][..])
        );
    }

    #[test]
    fn webhook_url_expands_env() {
        std::env::set_var("GUARDIAN_TEST_PUSH_HOST", "push.example.net");
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            "notify:\n  webhook_url: https://${GUARDIAN_TEST_PUSH_HOST}/alerts\n",
        );

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://push.example.net/alerts")
        );
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "debounce_ms: [not, a, number]\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse yaml file"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = GuardianConfig::default();
        config.trend_capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = GuardianConfig::default();
        config.archive.key = "../escape".into();
        assert!(validate_config(&config).is_err());

        let mut config = GuardianConfig::default();
        config.notify.webhook_url = Some("ftp://nope".into());
        assert!(validate_config(&config).is_err());

        let mut config = GuardianConfig::default();
        config.speech.command = Some(vec![]);
        assert!(validate_config(&config).is_err());

        assert!(validate_config(&GuardianConfig::default()).is_ok());
    }

    #[test]
    fn resolve_env_var_leaves_unterminated_reference() {
        assert_eq!(resolve_env_var("http://${HOST"), "http://${HOST");
        assert_eq!(resolve_env_var("plain"), "plain");
    }

    #[tokio::test]
    async fn open_store_for_each_backend() {
        let tmp = TempDir::new().unwrap();
        for backend in [ArchiveBackend::File, ArchiveBackend::Sqlite, ArchiveBackend::Memory] {
            let archive = ArchiveConfig {
                backend,
                ..ArchiveConfig::default()
            };
            let store = archive.open_store(tmp.path()).unwrap();
            store.put("guardian_records", "[]").await.unwrap();
            assert_eq!(
                store.get("guardian_records").await.unwrap().as_deref(),
                Some("[]")
            );
        }
        assert!(tmp.path().join("data/guardian_records.json").exists());
        assert!(tmp.path().join("data/guardian.db").exists());
    }

    #[test]
    fn sinks_default_to_logging() {
        let config = GuardianConfig::default();
        assert!(config.notify.build().is_ok());
        assert!(config.speech.build().is_ok());
    }
}
