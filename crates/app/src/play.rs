//! Terminal walk through story mode. Choices, answers and prompts come from
//! stdin one line at a time; choice feedback advances on its own timer.

use lingua_core::model::{ProfileDraft, QuestionKind};
use services::{
    AppServices, CommandOutcome, EngineError, FeedbackTimer, StoryEngine, StoryEvent, StoryState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

pub(crate) async fn run(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = services.profiles();
    if !profiles.has_completed_onboarding().await {
        let profile = profiles.complete_onboarding(ProfileDraft::new()).await?;
        println!("Benvenuto, {}! Starting at level {}.", profile.name(), profile.level());
    }

    let mut engine = services.story_engine().await;
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let mut timer = FeedbackTimer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut outcome = engine.resume().await?;
    if outcome.is_noop() {
        let current = engine.progress().current_chapter();
        outcome = engine.select_chapter(current).await?;
    }
    if outcome.is_noop() {
        println!("Nothing to play. Run `status` to see the chapter map.");
        return Ok(());
    }

    loop {
        render_events(&engine, &outcome);
        if let Some((ticket, delay)) = outcome.feedback_ticket() {
            timer.schedule(ticket, delay, fired_tx.clone());
        }
        if engine.state().is_at_map() {
            timer.cancel();
            break;
        }
        render_prompt(&engine);

        outcome = tokio::select! {
            Some(ticket) = fired_rx.recv() => engine.complete_feedback(ticket).await?,
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&mut engine, line.trim()).await?,
                None => engine.return_to_map(),
            },
        };
    }

    println!("Total XP: {}", engine.progress().total_xp());
    Ok(())
}

async fn handle_line(engine: &mut StoryEngine, line: &str) -> Result<CommandOutcome, EngineError> {
    if matches!(line, "q" | "quit" | "map") {
        return Ok(engine.return_to_map());
    }

    let state = engine.state().clone();
    match state {
        StoryState::InScene { .. } => match line.parse::<usize>() {
            Ok(n) if n > 0 => engine.select_choice(n - 1).await,
            _ => Ok(CommandOutcome::noop()),
        },
        StoryState::InTest { .. } if line == "skip" => engine.skip_question().await,
        StoryState::InTest { .. } => {
            let answer = option_for_number(engine, line).unwrap_or_else(|| line.to_owned());
            engine.submit_answer(&answer).await
        }
        StoryState::TestComplete { .. } if line == "retake" => engine.retake_test().await,
        StoryState::TestComplete { .. } => Ok(engine.continue_after_test()),
        StoryState::ConversationPractice { .. } => engine.finish_practice().await,
        StoryState::AtMap
        | StoryState::AwaitingChoiceFeedback { .. }
        | StoryState::ChapterComplete { .. } => {
            debug!(line, "input ignored in current state");
            Ok(CommandOutcome::noop())
        }
    }
}

/// Multiple-choice questions also accept the option's number.
fn option_for_number(engine: &StoryEngine, line: &str) -> Option<String> {
    let view = engine.snapshot().question?;
    let QuestionKind::MultipleChoice { options } = view.question.kind() else {
        return None;
    };
    let n = line.parse::<usize>().ok()?;
    options.get(n.checked_sub(1)?).cloned()
}

fn render_events(engine: &StoryEngine, outcome: &CommandOutcome) {
    let catalog = engine.catalog();
    for event in outcome.events() {
        match event {
            StoryEvent::ChapterEntered { chapter, .. } => {
                if let Some(chapter) = catalog.chapter(*chapter) {
                    println!();
                    println!("== Chapter {}: {} ({}) ==", chapter.id(), chapter.title(), chapter.level());
                    if !chapter.description().is_empty() {
                        println!("{}", chapter.description());
                    }
                }
            }
            StoryEvent::SceneEntered { chapter, scene } => {
                let Some(scene) = catalog.chapter(*chapter).and_then(|c| c.scene(*scene)) else {
                    continue;
                };
                println!();
                if !scene.location().is_empty() {
                    println!("[{}]", scene.location());
                }
                for line in scene.dialogue() {
                    println!("  {}: {}", line.speaker, line.text);
                    if !line.translation.is_empty() {
                        println!("      ({})", line.translation);
                    }
                }
            }
            StoryEvent::ChoiceSelected {
                correct,
                xp_awarded,
                ..
            } => {
                let message = engine
                    .snapshot()
                    .pending_feedback
                    .map(|feedback| feedback.message)
                    .unwrap_or_default();
                let mark = if *correct { "+" } else { "x" };
                if *xp_awarded > 0 {
                    println!("{mark} {message} (+{xp_awarded} XP)");
                } else {
                    println!("{mark} {message}");
                }
            }
            StoryEvent::FeedbackScheduled { .. } => {}
            StoryEvent::ChapterCompleted {
                chapter,
                first_completion,
                xp_awarded,
            } => {
                println!();
                if *first_completion {
                    println!("Chapter {chapter} complete! +{xp_awarded} XP");
                } else {
                    println!("Chapter {chapter} complete again.");
                }
            }
            StoryEvent::TestStarted {
                level, questions, ..
            } => {
                println!("Level test {level}: {questions} questions.");
            }
            StoryEvent::AnswerRecorded {
                correct, skipped, ..
            } => {
                let verdict = match (*correct, *skipped) {
                    (_, true) => "skipped",
                    (true, false) => "correct",
                    (false, false) => "incorrect",
                };
                println!("  {verdict}");
            }
            StoryEvent::TestCompleted { .. } => render_report(engine),
            StoryEvent::PracticeStarted { chapter } => {
                println!("Conversation practice for chapter {chapter} is open.");
            }
            StoryEvent::PracticeFinished { next, .. } => match next {
                Some(next) => println!("Chapter {next} is next."),
                None => println!("That was the last chapter."),
            },
            StoryEvent::ReturnedToMap => println!("Back at the chapter map."),
        }
    }
}

fn render_report(engine: &StoryEngine) {
    let Some(report) = engine.last_report() else {
        return;
    };
    println!();
    println!(
        "Score {}% ({}/{} correct, {}s) - {}",
        report.score.value(),
        report.correct,
        report.total,
        report.time_spent_secs,
        if report.passed { "passed" } else { "not passed" }
    );
    for outcome in report.outcomes.iter().filter(|o| !o.correct) {
        println!("  Q{}: expected \"{}\"", outcome.question, outcome.accepted);
    }
    if report.next_level_unlocked {
        if let Some(next) = report.level.next() {
            println!("Level {next} unlocked.");
        }
    }
}

fn render_prompt(engine: &StoryEngine) {
    let snapshot = engine.snapshot();
    match &snapshot.state {
        StoryState::InScene { chapter, scene } => {
            let Some(scene) = engine.catalog().chapter(*chapter).and_then(|c| c.scene(*scene)) else {
                return;
            };
            for (i, choice) in scene.choices().iter().enumerate() {
                println!("  {}) {}", i + 1, choice.text);
            }
            println!("Pick a choice (or `map`):");
        }
        StoryState::InTest { .. } => {
            let Some(view) = snapshot.question else {
                return;
            };
            println!();
            println!("Question {}/{}: {}", view.index + 1, view.total, view.question.prompt());
            if let Some(source) = view.question.source() {
                println!("  {source}");
            }
            if let QuestionKind::MultipleChoice { options } = view.question.kind() {
                for (i, option) in options.iter().enumerate() {
                    println!("  {}) {}", i + 1, option);
                }
            }
            println!("Answer (or `skip`):");
        }
        StoryState::TestComplete { .. } => {
            println!("Press enter to continue, or type `retake`.");
        }
        StoryState::ConversationPractice { .. } => {
            println!("Press enter when you are done practicing.");
        }
        StoryState::AtMap
        | StoryState::AwaitingChoiceFeedback { .. }
        | StoryState::ChapterComplete { .. } => {}
    }
}
