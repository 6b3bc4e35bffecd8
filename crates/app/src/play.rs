use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use quiz_core::model::{Answer, Confidence, Question, QuestionKind, QuizMode};
use services::{SessionOutcome, StudyContext, StudyServices, StudyStats};

use crate::report_save;

enum Input {
    Answer(Answer),
    Quit,
}

fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = read_line(&format!("{question} [y/N] "))?.unwrap_or_default();
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn ask(question: &Question, typed: bool) -> Result<Input> {
    println!("\n{}", question.prompt());
    let choices = match question.kind() {
        QuestionKind::MultipleChoice { choices, .. } if !typed => Some(choices),
        _ => None,
    };
    if let Some(choices) = choices {
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}. {choice}", i + 1);
        }
    }

    loop {
        let Some(line) = read_line("> ")? else {
            return Ok(Input::Quit);
        };
        match line.as_str() {
            "q" | ":q" => return Ok(Input::Quit),
            "?" => {
                println!("  hint: {}", question.hint());
                continue;
            }
            "" => continue,
            _ => {}
        }
        if let Some(choices) = choices {
            match line.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => {
                    return Ok(Input::Answer(Answer::Choice(n - 1)));
                }
                Ok(_) => {
                    println!("  pick 1-{}", choices.len());
                    continue;
                }
                Err(_) => {}
            }
        }
        return Ok(Input::Answer(Answer::Text(line)));
    }
}

fn ask_confidence() -> Result<Confidence> {
    loop {
        let line = read_line("confidence [l/m/h, default m] ")?.unwrap_or_default();
        match line.parse() {
            Ok(confidence) => return Ok(confidence),
            Err(err) => println!("  {err}"),
        }
    }
}

pub async fn run(
    services: &StudyServices,
    ctx: &mut StudyContext,
    mode: QuizMode,
    count: Option<usize>,
) -> Result<()> {
    let mut recorder = services.start_session(ctx, mode, count)?;
    if recorder.questions().is_empty() {
        println!("No questions available for {mode}.");
        return Ok(());
    }
    let total = recorder.questions().len();
    println!("{mode}: {total} questions. Type q to stop, ? for a hint.");
    if let Some(limit) = mode.time_limit() {
        println!("Time limit: {}s", limit.as_secs());
    }

    let mut quit = false;
    while let Some(id) = recorder.current().cloned() {
        if recorder.is_expired(services.clock().now()) {
            println!("\nTime is up!");
            break;
        }
        let Some(question) = services.catalog().question(&id) else {
            recorder.skip();
            continue;
        };
        let shown = Instant::now();
        let answer = match ask(question, mode.is_typed())? {
            Input::Answer(answer) => answer,
            Input::Quit => {
                quit = true;
                break;
            }
        };
        let response_time = shown.elapsed();
        let confidence = ask_confidence()?;
        let feedback = recorder.submit(question, &answer, confidence, response_time)?;
        if feedback.correct {
            println!("  correct");
        } else {
            println!("  wrong, answer: {}", feedback.correct_text);
        }
        if let Some(explanation) = feedback.explanation {
            println!("  {explanation}");
        }
    }

    let now = services.clock().now();
    let result = if quit {
        recorder.abandon(now)?
    } else {
        recorder.finish(now)?
    };
    let (outcome, status) = services.complete_session(ctx, &result).await;
    print_outcome(&outcome, ctx);
    report_save(&status);
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome, ctx: &StudyContext) {
    println!(
        "\n{}/{} correct, +{} XP{}",
        outcome.correct,
        outcome.answered,
        outcome.xp_gained,
        if outcome.accuracy_bonus { " (accuracy bonus)" } else { "" }
    );
    for quest in &outcome.completed_quests {
        println!("Quest complete: {quest} (+{} XP)", quest.xp_reward());
    }
    if outcome.leveled_up() {
        println!("Level up! Now level {}", outcome.level_after);
    }
    println!(
        "Level {} | {} XP | streak {} (freezes {})",
        ctx.progress.level(),
        ctx.progress.xp(),
        ctx.progress.streak_count(),
        ctx.progress.streak_freezes()
    );
    for id in &outcome.new_achievements {
        println!("Achievement unlocked: {id}");
    }
    for topic in &outcome.newly_weak_topics {
        println!("Topic {topic} needs a weak-area drill");
    }
    for topic in &outcome.cleared_weak_topics {
        println!("Topic {topic} is no longer weak");
    }
}

pub fn print_stats(stats: &StudyStats) {
    let accuracy = stats
        .overall_accuracy
        .map_or_else(|| "-".to_owned(), |a| format!("{:.0}%", a * 100.0));
    println!(
        "Level {} | {} XP | streak {} (best {}, freezes {})",
        stats.level, stats.xp, stats.streak, stats.longest_streak, stats.streak_freezes
    );
    println!(
        "{} answered, accuracy {accuracy}, {} sessions, {} achievements",
        stats.answered, stats.sessions_completed, stats.achievements
    );
    println!(
        "Exam readiness {}% | {} questions due | {}m {:02}s studied",
        stats.exam_readiness,
        stats.due_now,
        stats.study_time_secs / 60,
        stats.study_time_secs % 60
    );
    println!();
    if !stats.active_quests.is_empty() {
        println!("Quests ({} completed so far):", stats.quests_completed);
        for quest in &stats.active_quests {
            println!(
                "  {quest}: {}/{} (+{} XP)",
                quest.progress(),
                quest.target(),
                quest.xp_reward()
            );
        }
        println!();
    }
    for topic in &stats.topics {
        let acc = topic
            .accuracy
            .map_or_else(|| "-".to_owned(), |a| format!("{:.0}%", a * 100.0));
        println!(
            "{:>3} {:<52} acc {:>4} mastery {:>3}% due {:>2}{}",
            topic.topic,
            topic.name,
            acc,
            topic.mastery_pct,
            topic.due,
            if topic.weak { "  [weak]" } else { "" }
        );
    }
    if let Some(weakest) = stats.weakest_topic {
        println!("\nWeakest topic: {weakest}");
    }
}
