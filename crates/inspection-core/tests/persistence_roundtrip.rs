//! Save/restore scenarios across simulated restarts
//!
//! A restart is modelled as a second session reading the same store.

use inspection_core::testing::{jpeg_bytes, png_bytes, previews_of, CollectingNotifier};
use inspection_core::{
    FileStore, InspectionConfig, InspectionSession, LoadState, Loaded, MemoryStore,
    PersistenceManager, RawUpload, Restored, SessionStore, Severity,
};
use inspection_types::{Photo, PhotoId, Snapshot};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "elevatorInspection";

fn session_on(store: Arc<dyn SessionStore>) -> (InspectionSession, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::default());
    let mut config = InspectionConfig::default();
    config.session.repair_resave_delay_ms = 10;
    (
        InspectionSession::new(config, store, notifier.clone()),
        notifier,
    )
}

fn uploads() -> Vec<RawUpload> {
    vec![
        RawUpload::new("a.jpg", "image/jpeg", jpeg_bytes(80, 60, 85)),
        RawUpload::new("b.png", "image/png", png_bytes(40, 40)),
        RawUpload::new("c.jpg", "image/jpeg", jpeg_bytes(60, 80, 85)),
    ]
}

#[tokio::test]
async fn corrupted_photo_is_dropped_and_storage_converges() {
    let store = Arc::new(MemoryStore::new());
    let (session, _) = session_on(store.clone());
    session.set_field("adresse", "14 rue Lafayette").await;
    session.upload_photos(6, uploads()).await.unwrap();
    assert!(session.flush().await);
    let saved = session.snapshot().await;

    // Corrupt the middle photo directly in storage
    let mut raw: serde_json::Value =
        serde_json::from_str(&store.get(KEY).unwrap().unwrap()).unwrap();
    raw["sectionPhotos"]["6"][1]["dataUrl"] = serde_json::Value::String("blob:stale".into());
    store.set(KEY, &raw.to_string()).unwrap();

    let (restored, notifier) = session_on(store.clone());
    let outcome = restored.restore().await;
    assert!(matches!(
        outcome,
        Restored::Restored {
            dropped_count: 1,
            ..
        }
    ));
    assert_eq!(notifier.count(Severity::Warning), 1);

    let photos = restored.photos(6).await;
    let originals = saved.section_photos.get(6);
    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0].embedded_data, originals[0].embedded_data);
    assert_eq!(photos[1].embedded_data, originals[2].embedded_data);
    assert_eq!(photos[0].id, originals[0].id);

    // The repaired state reaches storage without any further mutation
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stored = Snapshot::from_json(&store.get(KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored.section_photos.count(6), 2);
}

#[tokio::test]
async fn removal_semantics() {
    let (session, _) = session_on(Arc::new(MemoryStore::new()));
    let report = session.upload_photos(0, uploads()).await.unwrap();
    let previews = previews_of(&session);
    assert_eq!(previews.live_count(), 3);

    assert!(session.remove_photo(0, &report.accepted[1]).await);
    assert_eq!(session.photos(0).await.len(), 2);
    assert_eq!(previews.live_count(), 2);

    assert!(!session.remove_photo(0, &PhotoId::from("missing")).await);
    assert_eq!(session.photos(0).await.len(), 2);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Arc::new(FileStore::new(dir.path()).unwrap());
        let (session, _) = session_on(store);
        session.set_field("fabricant", "Otis").await;
        session.set_field("eclairage", true).await;
        session.upload_photos(1, uploads()).await.unwrap();
        assert!(session.flush().await);
    }

    let store = Arc::new(FileStore::new(dir.path()).unwrap());
    let (session, _) = session_on(store);
    session.restore().await;
    let snapshot = session.snapshot().await;
    assert!(snapshot.form_data.is_filled("fabricant"));
    assert!(snapshot.form_data.is_filled("eclairage"));
    assert_eq!(snapshot.section_photos.count(1), 3);
    assert!(snapshot
        .section_photos
        .get(1)
        .iter()
        .all(|p| p.preview_handle.is_some()));
}

#[test]
fn legacy_snapshot_loads() {
    let store = Arc::new(MemoryStore::new());
    let photo = r#"{"id": 1718000000123.456, "name": "porte.jpg", "dataUrl": "data:image/jpeg;base64,/9j/", "url": "blob:http://x/1", "size": 3}"#;
    let json = format!(
        r#"{{
            "formData": {{"adresse": "1 place Bellecour", "eclairage": true, "etage": 3}},
            "completedSections": [0, 2, 99],
            "currentSection": 4,
            "sectionPhotos": {{"0": [{photo}], "10": [{photo}], "x": []}},
            "lastSaved": "2024-05-02T08:30:00.000Z"
        }}"#
    );
    store.set(KEY, &json).unwrap();

    let manager = PersistenceManager::new(store, KEY);
    let Loaded::Restored {
        snapshot,
        dropped_count,
    } = manager.load()
    else {
        panic!("expected a restored snapshot");
    };
    assert_eq!(dropped_count, 0);
    assert_eq!(manager.state(), LoadState::Hydrated);
    assert_eq!(snapshot.current_section, 4);
    assert_eq!(snapshot.completed_sections.len(), 2);
    assert_eq!(snapshot.section_photos.total(), 1);
    let photos: &[Photo] = snapshot.section_photos.get(0);
    assert_eq!(photos[0].display_name, "porte.jpg");
    assert!(snapshot.last_saved.is_some());
}
