use std::sync::Arc;

use chrono::{Local, TimeZone};
use guardian_archive::{
    ArchiveError, BlobStore, FileBlobStore, IncidentArchive, SqliteBlobStore, DEFAULT_ARCHIVE_KEY,
};
use guardian_schema::ThreatKind;

#[tokio::test]
async fn file_archive_survives_restart() {
    let temp = tempfile::TempDir::new().unwrap();
    let now = Local.with_ymd_and_hms(2026, 2, 13, 9, 0, 0).single().unwrap();

    let appended = {
        let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp.path()));
        let mut archive = IncidentArchive::new(store, DEFAULT_ARCHIVE_KEY);
        archive.append(ThreatKind::Rain, &now, "wet").await.unwrap()
    };

    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp.path()));
    let archive = IncidentArchive::new(store, DEFAULT_ARCHIVE_KEY);
    assert_eq!(archive.all().await, vec![appended.incident]);
}

#[tokio::test]
async fn file_archive_reads_records_written_by_the_dashboard() {
    let temp = tempfile::TempDir::new().unwrap();
    let legacy = r#"[
        {"id": 1760000000000, "type": "INTRUDER", "date": "2026-02-13", "time": "21:04:11",
         "details": "Neural alert triggered by INTRUDER sensor.", "ack": true},
        {"id": 1760000009000, "type": "SMOKE", "date": "2026-02-13", "time": "21:04:20"}
    ]"#;
    std::fs::write(temp.path().join("guardian_records.json"), legacy).unwrap();

    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp.path()));
    let archive = IncidentArchive::new(store, DEFAULT_ARCHIVE_KEY);

    let all = archive.all().await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].kind, ThreatKind::Intruder);
    assert_eq!(all[1].details, "Neural alert triggered by SMOKE sensor.");
    assert_eq!(archive.summary("2026-02-13").await.count, 2);
}

#[tokio::test]
async fn corrupt_file_is_reported_not_raised() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("guardian_records.json"), "[{\"id\": 1,").unwrap();

    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp.path()));
    let archive = IncidentArchive::new(store, DEFAULT_ARCHIVE_KEY);

    let read = archive.read().await;
    assert!(read.incidents.is_empty());
    assert!(matches!(read.warning, Some(ArchiveError::StoreCorrupt { .. })));
}

#[tokio::test]
async fn sqlite_archive_roundtrip() {
    let temp = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn BlobStore> =
        Arc::new(SqliteBlobStore::open(&temp.path().join("guardian.db")).unwrap());
    let mut archive = IncidentArchive::new(store, DEFAULT_ARCHIVE_KEY);
    let now = Local.with_ymd_and_hms(2026, 2, 13, 9, 0, 0).single().unwrap();

    let appended = archive.append(ThreatKind::Fire, &now, "hot").await.unwrap();

    assert_eq!(archive.search("FIRE").await, vec![appended.incident]);
}
