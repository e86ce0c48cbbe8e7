use lingua_core::model::{
    CefrLevel, ChapterId, LessonFlags, ProfileDraft, Progress, Score, TestResult, TestResults,
};
use lingua_core::Clock;
use lingua_core::time::fixed_now;
use storage::Storage;
use storage::records::PROGRESS_KEY;
use storage::repository::{
    LessonRepository, ProfileRepository, ProgressRepository, RecordStore, StorageError,
    TestResultRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress() {
    let repo = connect("memdb_progress").await;
    assert!(repo.get_progress().await.unwrap().is_none());

    let mut progress = Progress::new(fixed_now());
    progress.award_xp(20, fixed_now());
    progress.mark_completed(ChapterId::new(1), fixed_now());
    progress.award_xp(50, fixed_now());
    repo.save_progress(&progress).await.unwrap();

    let loaded = repo.get_progress().await.unwrap().expect("stored");
    assert_eq!(loaded, progress);
    assert_eq!(loaded.total_xp(), 70);
    assert!(loaded.is_completed(ChapterId::new(1)));

    progress.enter_chapter(ChapterId::new(2), fixed_now()).unwrap();
    repo.save_progress(&progress).await.unwrap();
    let loaded = repo.get_progress().await.unwrap().expect("stored");
    assert_eq!(loaded.current_chapter(), ChapterId::new(2));

    repo.delete_progress().await.unwrap();
    assert!(repo.get_progress().await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_system_clock_progress_equal() {
    let repo = connect("memdb_progress_clock").await;
    let clock = Clock::system();

    let mut progress = Progress::new(clock.now());
    progress.set_scene(1, clock.now());
    progress.award_xp(10, clock.now());
    repo.save_progress(&progress).await.unwrap();

    let loaded = repo.get_progress().await.unwrap().expect("stored");
    assert_eq!(loaded, progress);
}

#[tokio::test]
async fn sqlite_stores_profile_results_and_lessons() {
    let repo = connect("memdb_records").await;

    let profile = ProfileDraft {
        name: Some("Alex".into()),
        level: Some(CefrLevel::A2),
        ..ProfileDraft::new()
    }
    .validate(fixed_now())
    .unwrap();
    repo.save_profile(&profile).await.unwrap();
    assert_eq!(repo.get_profile().await.unwrap(), Some(profile));

    let mut results = TestResults::new();
    results.record(
        ChapterId::new(1),
        TestResult::new(Score::new(60).unwrap(), 70, fixed_now(), 40),
    );
    repo.save_test_results(&results).await.unwrap();
    results.record(
        ChapterId::new(1),
        TestResult::new(Score::new(80).unwrap(), 70, fixed_now(), 35),
    );
    repo.save_test_results(&results).await.unwrap();

    let loaded = repo.get_test_results().await.unwrap();
    assert_eq!(loaded.len(), 1);
    let stored = loaded.get(ChapterId::new(1)).unwrap();
    assert_eq!(stored.score().value(), 80);
    assert!(stored.passed());

    let mut flags = LessonFlags::new();
    flags.set("greetings", true);
    repo.save_lesson_flags(&flags).await.unwrap();
    assert!(repo.get_lesson_flags().await.unwrap().is_complete("greetings"));
}

#[tokio::test]
async fn sqlite_reports_corrupt_record() {
    let repo = connect("memdb_corrupt").await;
    repo.put_raw(PROGRESS_KEY, r#"{"currentChapterId": "one"}"#)
        .await
        .unwrap();
    assert!(matches!(
        repo.get_progress().await,
        Err(StorageError::Serialization(_))
    ));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate").await;
    repo.migrate().await.expect("second migrate");

    let storage = Storage::sqlite("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .progress
        .save_progress(&Progress::new(fixed_now()))
        .await
        .unwrap();
    assert!(repo.get_progress().await.unwrap().is_some());
}
