//! Tests de integración del store de filesystem.

use serde_json::json;
use story_core::model::{ArtifactEnvelope, Project};
use story_core::{EngineError, ProjectStore};
use story_persistence::{FsProjectStore, StoreConfig};
use uuid::Uuid;

fn store_in(dir: &tempfile::TempDir) -> FsProjectStore {
    FsProjectStore::new(StoreConfig::with_root(dir.path()))
}

fn envelope(step: usize, name: &str, payload: serde_json::Value) -> ArtifactEnvelope {
    ArtifactEnvelope::new(step, name, "up".into(), payload, None, 1, false)
}

#[tokio::test]
async fn create_load_round_trip_preserves_seed() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "a ghost story");
    store.create(&project).await.unwrap();
    let loaded = store.load(project.id).await.unwrap();
    assert_eq!(loaded.id, project.id);
    assert_eq!(loaded.seed, "a ghost story");
    assert_eq!(loaded.name, "demo");
}

#[tokio::test]
async fn create_twice_is_already_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    assert!(matches!(store.create(&project).await, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn load_unknown_project_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert!(matches!(store.load(Uuid::new_v4()).await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn artifact_write_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    let artifact = envelope(1, "logline", json!({"logline": "a detective hunts a ghost"}));
    store.write_artifact(project.id, &artifact, Some("a detective hunts a ghost")).await.unwrap();
    let read = store.read_artifact(project.id, 1).await.unwrap();
    assert_eq!(read, artifact);
    assert!(dir.path().join(project.id.to_string()).join("step_1_logline.json").exists());
    assert!(dir.path().join(project.id.to_string()).join("step_1_logline.txt").exists());
}

#[tokio::test]
async fn overwrite_moves_previous_to_numbered_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    store.write_artifact(project.id, &envelope(3, "characters", json!({"v": 1})), None).await.unwrap();
    store.write_artifact(project.id, &envelope(3, "characters", json!({"v": 2})), None).await.unwrap();
    store.write_artifact(project.id, &envelope(3, "characters", json!({"v": 3})), None).await.unwrap();

    assert_eq!(store.snapshot_versions(project.id, 3).await.unwrap(), vec![1, 2]);
    let snapshot_path = dir.path()
                           .join(project.id.to_string())
                           .join("snapshots")
                           .join("step_3_v1.json");
    assert!(snapshot_path.exists());
    let current = store.read_artifact(project.id, 3).await.unwrap();
    assert_eq!(current.payload, json!({"v": 3}));
}

#[tokio::test]
async fn corrupt_artifact_surfaces_without_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    let path = dir.path().join(project.id.to_string()).join("step_2_paragraph.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let err = store.read_artifact(project.id, 2).await.unwrap_err();
    assert!(matches!(err, EngineError::CorruptArtifact { step: 2, .. }));
    assert!(path.exists(), "corrupt artifact must never be deleted");
}

#[tokio::test]
async fn missing_artifact_is_distinct_from_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    assert!(matches!(store.read_artifact(project.id, 5).await,
                     Err(EngineError::MissingArtifact { step: 5 })));
}

#[tokio::test]
async fn load_reconciles_completed_set_with_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    store.write_artifact(project.id, &envelope(0, "category", json!({"category": "x"})), None)
         .await
         .unwrap();
    // el registro dice 0 y 1 completos, pero el artifact de 1 no existe
    project.completed_steps.insert(0);
    project.completed_steps.insert(1);
    store.write_status(&project).await.unwrap();
    let loaded = store.load(project.id).await.unwrap();
    assert!(loaded.completed_steps.contains(&0));
    assert!(!loaded.completed_steps.contains(&1), "steps without artifacts drop out on load");
}

#[tokio::test]
async fn status_file_mirrors_project() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut project = Project::new("demo", "seed");
    store.create(&project).await.unwrap();
    project.current_step = 2;
    store.write_status(&project).await.unwrap();
    let status_path = dir.path().join(project.id.to_string()).join("status.json");
    let status: serde_json::Value = serde_json::from_slice(&std::fs::read(status_path).unwrap()).unwrap();
    assert_eq!(status["current_step"], 2);
    assert_eq!(status["id"], project.id.to_string());
}
