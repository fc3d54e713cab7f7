use std::sync::Arc;

use academy_core::model::{LessonId, LessonStatus};
use academy_core::time::fixed_now;
use async_trait::async_trait;
use chrono::Duration;
use services::{AcademyServices, Clock, ServiceOptions, SessionError};
use storage::catalog::bundled_catalog;
use storage::repository::{
    InMemoryRepository, ProgressRepository, ProgressSnapshot, Storage, StorageError,
};

fn options() -> ServiceOptions {
    ServiceOptions {
        clock: Clock::fixed(fixed_now()),
        ..ServiceOptions::default()
    }
}

async fn services_over(storage: &Storage) -> AcademyServices {
    AcademyServices::from_storage(storage, bundled_catalog().unwrap(), options()).await
}

fn solution_for(services: &AcademyServices, id: u32) -> String {
    services
        .lesson(LessonId::new(id))
        .and_then(|lesson| lesson.exercise().solution.clone())
        .expect("bundled lessons carry a solution")
}

#[tokio::test]
async fn full_curriculum_walkthrough_graduates() {
    let storage = Storage::in_memory();
    let mut services = services_over(&storage).await;

    for id in 0..6 {
        let lesson_id = LessonId::new(id);
        assert!(services.progress().is_unlocked(lesson_id));
        services.open(lesson_id).unwrap();
        services.complete_theory().unwrap();

        let code = solution_for(&services, id);
        let run = services.run_practice(code).await.unwrap();
        assert!(run.passed, "lesson {id}: {:?}", run.outcome);

        services.session_mut().clock_mut().advance(Duration::seconds(1));
        assert!(services.tick());
    }

    let progress = services.progress();
    assert!(progress.is_graduated());
    assert_eq!(progress.reward_points(), 18);
    assert!(
        progress
            .lesson_cards()
            .iter()
            .all(|card| card.status == LessonStatus::Completed && card.stars == 3)
    );

    let reloaded = services_over(&storage).await;
    assert_eq!(reloaded.progress().record(), services.progress().record());
}

#[tokio::test]
async fn second_lesson_stays_locked_until_first_is_solved() {
    let storage = Storage::in_memory();
    let mut services = services_over(&storage).await;

    assert!(matches!(
        services.open(LessonId::new(1)),
        Err(SessionError::Locked(_))
    ));

    services.open(LessonId::FIRST).unwrap();
    services.complete_theory().unwrap();
    let starter = services.session().editor().to_owned();
    let run = services.run_practice(starter).await.unwrap();
    assert!(!run.passed);
    services.exit();

    assert!(matches!(
        services.open(LessonId::new(1)),
        Err(SessionError::Locked(_))
    ));
    assert_eq!(services.progress().summary().current_lesson, Some(LessonId::FIRST));
}

#[tokio::test]
async fn reset_progress_clears_storage() {
    let repo = InMemoryRepository::new();
    let storage = Storage::from_repository(repo.clone());
    let mut services = services_over(&storage).await;

    services.open(LessonId::FIRST).unwrap();
    services.complete_theory().unwrap();
    let code = solution_for(&services, 0);
    services.run_practice(code).await.unwrap();
    assert_eq!(services.progress().reward_points(), 3);

    services.reset_progress().await;
    assert!(services.session().state().is_idle());
    let stored = repo.load_progress().await.unwrap().unwrap();
    assert_eq!(stored, ProgressSnapshot::default());
}

#[tokio::test]
async fn evaluate_runs_outside_a_lesson() {
    let services = services_over(&Storage::in_memory()).await;
    let outcome = services.evaluate("let speed: number = 3;\nconsole.log(speed * 2);");
    assert_eq!(outcome.captured_text(), Some("6"));
}

struct FailingRepository;

#[async_trait]
impl ProgressRepository for FailingRepository {
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn save_progress(&self, _snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn clear_progress(&self) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn storage_failures_never_reach_the_learner() {
    let storage = Storage {
        progress: Arc::new(FailingRepository),
    };
    let mut services = services_over(&storage).await;
    assert_eq!(services.progress().reward_points(), 0);

    services.open(LessonId::FIRST).unwrap();
    services.complete_theory().unwrap();
    let code = solution_for(&services, 0);
    let run = services.run_practice(code).await.unwrap();
    assert!(run.passed);
    assert_eq!(services.progress().reward_points(), 3);
    assert!(services.progress().is_unlocked(LessonId::new(1)));
}
