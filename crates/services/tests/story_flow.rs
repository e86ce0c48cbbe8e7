use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lingua_core::Catalog;
use lingua_core::model::{ChapterId, Progress};
use lingua_core::time::{fixed_clock, fixed_now};
use services::story::QuestionView;
use services::{
    Clock, CommandOutcome, EngineError, EngineSettings, FeedbackTimer, ProgressService,
    StoryEngine, StoryEvent, StoryState,
};
use storage::records::PROGRESS_KEY;
use storage::repository::{
    InMemoryRepository, ProgressRepository, RecordStore, Storage, StorageError,
    TestResultRepository,
};

const CATALOG: &str = r#"{
  "chapters": [
    {
      "id": 1, "level": "A1", "title": "Arrival", "xpReward": 50,
      "scenes": [
        { "location": "Airport", "dialogue": [{ "speaker": "Marco", "text": "Come ti chiami?" }],
          "choices": [
            { "text": "Mi chiamo Alex", "correct": true, "feedback": "Perfetto!", "xp": 10 },
            { "text": "Sono americano", "correct": false, "feedback": "Not quite", "xp": 5 }
          ] },
        { "location": "Taxi", "dialogue": [{ "speaker": "Marco", "text": "Come stai?" }],
          "choices": [
            { "text": "Bene, grazie", "correct": true, "feedback": "Perfetto!", "xp": 10 },
            { "text": "Non capisco", "correct": false, "feedback": "Try again", "xp": 5 }
          ] }
      ]
    },
    {
      "id": 2, "level": "A1", "title": "Hotel", "xpReward": 60,
      "scenes": [
        { "location": "Lobby", "dialogue": [{ "speaker": "Sofia", "text": "Buonasera!" }] },
        { "location": "Desk", "dialogue": [{ "speaker": "Sofia", "text": "Ha una prenotazione?" }],
          "choices": [
            { "text": "Sì", "correct": true, "feedback": "Eccellente!", "xp": 15 },
            { "text": "No", "correct": false, "feedback": "Oops", "xp": 5 }
          ] }
      ]
    },
    { "id": 3, "level": "A2", "title": "Apartment", "xpReward": 90, "scenes": [] }
  ],
  "testBanks": {
    "A1": [
      { "id": 1, "type": "fill_blank", "prompt": "Q1", "answer": "a1" },
      { "id": 2, "type": "fill_blank", "prompt": "Q2", "answer": "a2" },
      { "id": 3, "type": "fill_blank", "prompt": "Q3", "answer": "a3" },
      { "id": 4, "type": "fill_blank", "prompt": "Q4", "answer": "a4" },
      { "id": 5, "type": "fill_blank", "prompt": "Q5", "answer": "a5" },
      { "id": 6, "type": "fill_blank", "prompt": "Q6", "answer": "a6" },
      { "id": 7, "type": "fill_blank", "prompt": "Q7", "answer": "a7" },
      { "id": 8, "type": "fill_blank", "prompt": "Q8", "answer": "a8" },
      { "id": 9, "type": "fill_blank", "prompt": "Q9", "answer": "a9" },
      { "id": 10, "type": "multiple_choice", "prompt": "Q10", "options": ["a10", "b10"], "answer": "a10" }
    ]
  }
}"#;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_json(CATALOG).expect("test catalog"))
}

fn progress_service<S: RecordStore + 'static>(store: Arc<S>) -> Arc<ProgressService> {
    let storage = Storage::from_store(store);
    Arc::new(ProgressService::new(
        fixed_clock(),
        storage.progress,
        storage.test_results,
        storage.lessons,
    ))
}

async fn engine(repo: &InMemoryRepository) -> StoryEngine {
    StoryEngine::load(
        catalog(),
        progress_service(Arc::new(repo.clone())),
        fixed_clock(),
        EngineSettings::default(),
    )
    .await
}

async fn seed_progress(repo: &InMemoryRepository, completed: &[u32], current: u32) {
    let progress = Progress::from_persisted(
        ChapterId::new(current),
        0,
        0,
        completed.iter().copied().map(ChapterId::new),
        fixed_now(),
    )
    .unwrap();
    repo.save_progress(&progress).await.unwrap();
}

async fn choose(engine: &mut StoryEngine, index: usize) -> CommandOutcome {
    let outcome = engine.select_choice(index).await.unwrap();
    let (ticket, delay) = outcome.feedback_ticket().expect("feedback scheduled");
    assert_eq!(delay, Duration::from_secs(3));
    engine.complete_feedback(ticket).await.unwrap()
}

async fn answer_all(engine: &mut StoryEngine, correct: usize) -> CommandOutcome {
    let mut last = CommandOutcome::noop();
    for n in 1..=10 {
        engine.clock_mut().advance(chrono::Duration::seconds(5));
        let answer = if n <= correct {
            format!(" A{n} ")
        } else {
            "wrong".to_string()
        };
        last = engine.submit_answer(&answer).await.unwrap();
    }
    last
}

//
// ─── UNLOCKING ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn first_chapter_is_open_and_second_is_locked() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;

    let map = engine.chapter_map();
    assert!(map[0].unlocked && !map[1].unlocked && !map[2].unlocked);

    let outcome = engine.select_chapter(ChapterId::new(2)).await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(engine.state(), &StoryState::AtMap);

    let outcome = engine.select_chapter(ChapterId::new(1)).await.unwrap();
    assert!(!outcome.is_noop());
    assert_eq!(
        engine.state(),
        &StoryState::InScene {
            chapter: ChapterId::new(1),
            scene: 0
        }
    );
}

#[tokio::test]
async fn selecting_chapter_three_with_only_one_completed_stays_at_map() {
    let repo = InMemoryRepository::new();
    seed_progress(&repo, &[1], 2).await;
    let mut engine = engine(&repo).await;

    let outcome = engine.select_chapter(ChapterId::new(3)).await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(engine.state(), &StoryState::AtMap);
    assert_eq!(engine.progress().current_chapter(), ChapterId::new(2));
}

#[tokio::test]
async fn unknown_chapter_is_ignored() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    assert!(engine.select_chapter(ChapterId::new(42)).await.unwrap().is_noop());
    assert!(engine.state().is_at_map());
}

//
// ─── CHOICES AND FEEDBACK ──────────────────────────────────────────────────────
//

#[tokio::test]
async fn correct_choice_awards_xp_and_wrong_awards_nothing() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();

    engine.select_choice(1).await.unwrap();
    assert_eq!(engine.progress().total_xp(), 0);
    let pending = engine.snapshot().pending_feedback.expect("feedback showing");
    assert!(!pending.correct);
    assert_eq!(pending.message, "Not quite");

    let again = engine.select_choice(0).await.unwrap();
    assert!(again.is_noop());
    assert_eq!(engine.progress().total_xp(), 0);

    let ticket = pending.ticket;
    engine.complete_feedback(ticket).await.unwrap();
    engine.select_choice(0).await.unwrap();
    assert_eq!(engine.progress().total_xp(), 10);

    let stored = repo.get_progress().await.unwrap().unwrap();
    assert_eq!(stored.total_xp(), 10);
}

#[tokio::test]
async fn out_of_range_choice_is_ignored() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();

    assert!(engine.select_choice(7).await.unwrap().is_noop());
    assert!(matches!(engine.state(), StoryState::InScene { .. }));
}

#[tokio::test]
async fn stale_ticket_after_return_to_map_does_nothing() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();

    let outcome = engine.select_choice(0).await.unwrap();
    let (ticket, _) = outcome.feedback_ticket().unwrap();
    engine.return_to_map();

    let fired = engine.complete_feedback(ticket).await.unwrap();
    assert!(fired.is_noop());
    assert_eq!(engine.state(), &StoryState::AtMap);
    assert_eq!(engine.progress().current_scene(), 0);
    assert_eq!(engine.progress().total_xp(), 10);
}

#[tokio::test]
async fn return_to_map_is_idempotent() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    assert!(engine.return_to_map().is_noop());

    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    let first = engine.return_to_map();
    assert_eq!(first.events(), &[StoryEvent::ReturnedToMap]);
    let second = engine.return_to_map();
    assert!(second.is_noop());
    assert_eq!(engine.state(), &StoryState::AtMap);
}

#[tokio::test]
async fn pass_through_scene_is_skipped_without_feedback() {
    let repo = InMemoryRepository::new();
    seed_progress(&repo, &[1], 2).await;
    let mut engine = engine(&repo).await;

    let outcome = engine.select_chapter(ChapterId::new(2)).await.unwrap();
    let scenes: Vec<usize> = outcome
        .events()
        .iter()
        .filter_map(|event| match event {
            StoryEvent::SceneEntered { scene, .. } => Some(*scene),
            _ => None,
        })
        .collect();
    assert_eq!(scenes, vec![0, 1]);
    assert!(outcome.feedback_ticket().is_none());
    assert_eq!(
        engine.state(),
        &StoryState::InScene {
            chapter: ChapterId::new(2),
            scene: 1
        }
    );
}

//
// ─── FULL CHAPTER ──────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn two_scenes_and_eight_of_ten_passes() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();

    let after_first = choose(&mut engine, 0).await;
    assert_eq!(
        after_first.events(),
        &[StoryEvent::SceneEntered {
            chapter: ChapterId::new(1),
            scene: 1
        }]
    );

    let after_second = choose(&mut engine, 0).await;
    assert!(after_second.events().iter().any(|event| matches!(
        event,
        StoryEvent::ChapterCompleted {
            first_completion: true,
            xp_awarded: 50,
            ..
        }
    )));
    assert_eq!(
        engine.state(),
        &StoryState::InTest {
            chapter: ChapterId::new(1)
        }
    );
    assert_eq!(engine.progress().total_xp(), 70);
    assert!(engine.progress().is_completed(ChapterId::new(1)));

    let snapshot = engine.snapshot();
    let QuestionView { index, total, .. } = snapshot.question.expect("first question");
    assert_eq!((index, total), (0, 10));

    let last = answer_all(&mut engine, 8).await;
    assert!(last.events().iter().any(|event| matches!(
        event,
        StoryEvent::TestCompleted { passed: true, .. }
    )));

    let report = engine.last_report().expect("report");
    assert_eq!(report.score.value(), 80);
    assert!(report.passed);
    assert_eq!(report.correct, 8);
    assert_eq!(report.incorrect, 2);
    assert_eq!(report.time_spent_secs, 50);
    assert!(report.next_level_unlocked);
    assert_eq!(report.outcomes[0].time_spent, chrono::Duration::seconds(5));

    let stored = repo.get_progress().await.unwrap().unwrap();
    assert_eq!(stored.total_xp(), 70);
    assert_eq!(stored.current_scene(), 1);
    assert_eq!(
        stored.completed().iter().copied().collect::<Vec<_>>(),
        vec![ChapterId::new(1)]
    );
    let results = repo.get_test_results().await.unwrap();
    let result = results.get(ChapterId::new(1)).expect("result stored");
    assert_eq!(result.score().value(), 80);
    assert!(result.passed());
    assert_eq!(result.time_spent_secs(), 50);
}

#[tokio::test]
async fn skipped_questions_count_as_wrong() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 0).await;
    choose(&mut engine, 0).await;

    engine.submit_answer("a1").await.unwrap();
    assert_eq!(engine.snapshot().correct_so_far, 1);
    for _ in 0..9 {
        let outcome = engine.skip_question().await.unwrap();
        assert!(matches!(
            outcome.events()[0],
            StoryEvent::AnswerRecorded {
                correct: false,
                skipped: true,
                ..
            }
        ));
    }

    let report = engine.last_report().unwrap();
    assert_eq!(report.score.value(), 10);
    assert!(!report.passed);
    assert!(report.outcomes.iter().skip(1).all(|o| o.given.is_empty()));
}

#[tokio::test]
async fn failed_test_keeps_completion_and_returns_to_map() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 1).await;
    choose(&mut engine, 1).await;
    answer_all(&mut engine, 6).await;

    let report = engine.last_report().unwrap();
    assert_eq!(report.score.value(), 60);
    assert!(!report.passed);
    assert!(!report.next_level_unlocked);

    let outcome = engine.continue_after_test();
    assert_eq!(outcome.events(), &[StoryEvent::ReturnedToMap]);
    assert!(engine.state().is_at_map());
    assert!(engine.progress().is_completed(ChapterId::new(1)));
    assert_eq!(engine.progress().total_xp(), 50);
    assert!(engine.chapter_map()[1].unlocked);
}

#[tokio::test]
async fn passing_leads_through_practice_to_next_chapter() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 0).await;
    choose(&mut engine, 0).await;
    answer_all(&mut engine, 10).await;

    let started = engine.continue_after_test();
    assert_eq!(
        started.events(),
        &[StoryEvent::PracticeStarted {
            chapter: ChapterId::new(1)
        }]
    );

    let finished = engine.finish_practice().await.unwrap();
    assert_eq!(
        finished.events()[0],
        StoryEvent::PracticeFinished {
            chapter: ChapterId::new(1),
            next: Some(ChapterId::new(2))
        }
    );
    assert!(engine.state().is_at_map());

    let stored = repo.get_progress().await.unwrap().unwrap();
    assert_eq!(stored.current_chapter(), ChapterId::new(2));
    assert_eq!(stored.current_scene(), 0);
}

#[tokio::test]
async fn zero_scene_chapter_with_empty_bank_passes_automatically() {
    let repo = InMemoryRepository::new();
    seed_progress(&repo, &[1, 2], 3).await;
    let mut engine = engine(&repo).await;

    let outcome = engine.select_chapter(ChapterId::new(3)).await.unwrap();
    assert!(outcome.events().iter().any(|event| matches!(
        event,
        StoryEvent::TestStarted { questions: 0, .. }
    )));
    assert_eq!(
        engine.state(),
        &StoryState::TestComplete {
            chapter: ChapterId::new(3)
        }
    );
    assert_eq!(engine.progress().total_xp(), 90);
    let stored = repo.get_progress().await.unwrap().unwrap();
    assert_eq!(stored.current_chapter(), ChapterId::new(3));
    assert_eq!(stored.current_scene(), 0);

    let report = engine.last_report().unwrap();
    assert_eq!(report.score.value(), 100);
    assert!(report.passed);

    let results = repo.get_test_results().await.unwrap();
    assert!(results.get(ChapterId::new(3)).unwrap().passed());

    engine.continue_after_test();
    let finished = engine.finish_practice().await.unwrap();
    assert_eq!(
        finished.events()[0],
        StoryEvent::PracticeFinished {
            chapter: ChapterId::new(3),
            next: None
        }
    );
}

#[tokio::test]
async fn replaying_a_completed_chapter_awards_no_reward() {
    let repo = InMemoryRepository::new();
    seed_progress(&repo, &[1, 2], 3).await;
    let mut engine = engine(&repo).await;

    engine.select_chapter(ChapterId::new(3)).await.unwrap();
    engine.return_to_map();
    let outcome = engine.select_chapter(ChapterId::new(3)).await.unwrap();
    assert!(outcome.events().iter().any(|event| matches!(
        event,
        StoryEvent::ChapterCompleted {
            first_completion: false,
            xp_awarded: 0,
            ..
        }
    )));
    assert_eq!(engine.progress().total_xp(), 90);
}

#[tokio::test]
async fn retake_overwrites_previous_result() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 0).await;
    choose(&mut engine, 0).await;
    answer_all(&mut engine, 5).await;
    assert!(!engine.last_report().unwrap().passed);

    let retake = engine.retake_test().await.unwrap();
    assert!(matches!(
        retake.events()[0],
        StoryEvent::TestStarted { questions: 10, .. }
    ));
    assert!(engine.last_report().is_none());
    answer_all(&mut engine, 9).await;

    let results = repo.get_test_results().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.get(ChapterId::new(1)).unwrap().score().value(), 90);
}

#[tokio::test]
async fn abandoning_a_test_records_nothing() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 0).await;
    choose(&mut engine, 0).await;
    engine.submit_answer("a1").await.unwrap();

    engine.return_to_map();
    assert!(engine.snapshot().question.is_none());
    assert!(engine.submit_answer("a2").await.unwrap().is_noop());
    assert!(repo.get_test_results().await.unwrap().is_empty());
    assert!(engine.progress().is_completed(ChapterId::new(1)));
}

//
// ─── RESUME AND PERSISTENCE ────────────────────────────────────────────────────
//

#[tokio::test]
async fn resume_reenters_saved_scene() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    assert!(engine.resume().await.unwrap().is_noop());

    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    choose(&mut engine, 0).await;
    engine.return_to_map();

    let mut reloaded = self::engine(&repo).await;
    let outcome = reloaded.resume().await.unwrap();
    assert_eq!(
        outcome.events()[0],
        StoryEvent::ChapterEntered {
            chapter: ChapterId::new(1),
            scene: 1
        }
    );
    assert_eq!(
        reloaded.state(),
        &StoryState::InScene {
            chapter: ChapterId::new(1),
            scene: 1
        }
    );
    assert_eq!(reloaded.progress().total_xp(), 10);
}

#[tokio::test]
async fn corrupt_progress_loads_defaults() {
    let repo = InMemoryRepository::new();
    repo.put_raw(PROGRESS_KEY, "{\"currentChapterId\":").await.unwrap();

    let mut engine = engine(&repo).await;
    assert_eq!(engine.progress(), &Progress::new(fixed_now()));
    assert!(!engine.select_chapter(ChapterId::new(1)).await.unwrap().is_noop());
}

struct ReadOnlyStore(InMemoryRepository);

#[async_trait]
impl RecordStore for ReadOnlyStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get_raw(key).await
    }

    async fn put_raw(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }

    async fn delete_raw(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }
}

#[tokio::test]
async fn write_failure_is_reported_after_transition() {
    let store = Arc::new(ReadOnlyStore(InMemoryRepository::new()));
    let mut engine = StoryEngine::load(
        catalog(),
        progress_service(store),
        Clock::fixed(fixed_now()),
        EngineSettings::default(),
    )
    .await;

    let err = engine.select_chapter(ChapterId::new(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Progress(_)));
    assert_eq!(
        engine.state(),
        &StoryState::InScene {
            chapter: ChapterId::new(1),
            scene: 0
        }
    );
}

//
// ─── TIMER ─────────────────────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn timer_drives_feedback_advance() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut timer = FeedbackTimer::new();

    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    let outcome = engine.select_choice(0).await.unwrap();
    let (ticket, delay) = outcome.feedback_ticket().unwrap();
    timer.schedule(ticket, delay, tx);

    let fired = rx.recv().await.unwrap();
    let advanced = engine.complete_feedback(fired).await.unwrap();
    assert!(!advanced.is_noop());
    assert_eq!(
        engine.state(),
        &StoryState::InScene {
            chapter: ChapterId::new(1),
            scene: 1
        }
    );
}

#[tokio::test(start_paused = true)]
async fn leaving_before_timer_fires_cancels_advance() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut timer = FeedbackTimer::new();

    engine.select_chapter(ChapterId::new(1)).await.unwrap();
    let outcome = engine.select_choice(0).await.unwrap();
    let (ticket, delay) = outcome.feedback_ticket().unwrap();
    timer.schedule(ticket, delay, tx);

    engine.return_to_map();
    assert_eq!(timer.cancel(), Some(ticket));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
    assert!(engine.state().is_at_map());
}
