use academy_core::model::{LessonId, ProgressRecord};
use storage::repository::{PROGRESS_KEY, ProgressRepository, ProgressSnapshot, StorageError};
use storage::sqlite::SqliteRepository;
use storage::Storage;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress() {
    let repo = connect("memdb_progress_roundtrip").await;
    assert_eq!(repo.load_progress().await.unwrap(), None);

    let mut record = ProgressRecord::new();
    record.record_completion(LessonId::new(0));
    record.record_completion(LessonId::new(1));
    record.record_completion(LessonId::new(2));
    repo.save_progress(&ProgressSnapshot::from_record(&record))
        .await
        .unwrap();

    let loaded = repo.load_progress().await.unwrap().expect("snapshot");
    assert_eq!(loaded.completed_lesson_ids, vec![0, 1, 2]);
    assert_eq!(loaded.reward_points, 9);
}

#[tokio::test]
async fn sqlite_save_replaces_previous_snapshot() {
    let repo = connect("memdb_progress_upsert").await;

    let first = ProgressSnapshot {
        completed_lesson_ids: vec![0],
        reward_points: 3,
    };
    let second = ProgressSnapshot {
        completed_lesson_ids: vec![0, 1],
        reward_points: 6,
    };
    repo.save_progress(&first).await.unwrap();
    repo.save_progress(&second).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_store")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(repo.load_progress().await.unwrap(), Some(second));
}

#[tokio::test]
async fn sqlite_corrupt_value_surfaces_serialization_error() {
    let repo = connect("memdb_progress_corrupt").await;
    sqlx::query("INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)")
        .bind(PROGRESS_KEY)
        .bind("not json at all")
        .bind("2024-01-01T00:00:00Z")
        .execute(repo.pool())
        .await
        .unwrap();

    assert!(matches!(
        repo.load_progress().await,
        Err(StorageError::Serialization(_))
    ));

    repo.clear_progress().await.unwrap();
    assert_eq!(repo.load_progress().await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_progress_migrate").await;
    repo.migrate().await.expect("second migrate");

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);
}

#[tokio::test]
async fn storage_sqlite_builds_progress_repository() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .progress
        .save_progress(&ProgressSnapshot::default())
        .await
        .unwrap();
    assert_eq!(
        storage.progress.load_progress().await.unwrap(),
        Some(ProgressSnapshot::default())
    );
}
