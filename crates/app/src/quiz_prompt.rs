//! Terminal front end for a quiz attempt.
//!
//! Reads one line per action from stdin while a one-second ticker drives the
//! countdown. The ticker only exists while an attempt is in progress.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use course_core::model::{CorrectAnswer, Quiz, QuizQuestion};
use services::{AppServices, CountdownTick, QuizAttempt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, Instant, Interval};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    Submit,
    Quit,
    Answer(String),
    Empty,
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            ":n" | ":next" => Input::Next,
            ":p" | ":prev" => Input::Previous,
            ":s" | ":submit" => Input::Submit,
            ":q" | ":quit" => Input::Quit,
            other => Input::Answer(other.to_string()),
        }
    }
}

/// Maps a 1-based option number to the option text; anything else is taken
/// verbatim as a free-form answer.
fn resolve_answer(question: &QuizQuestion, raw: &str) -> String {
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| question.options.get(idx))
        .cloned()
        .unwrap_or_else(|| raw.to_string())
}

fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn countdown() -> Interval {
    let period = Duration::from_secs(1);
    time::interval_at(Instant::now() + period, period)
}

fn print_question(attempt: &QuizAttempt) {
    let Some(question) = attempt.current_question() else {
        return;
    };
    let progress = attempt.progress();
    println!();
    match attempt.time_remaining() {
        Some(secs) => println!(
            "Question {} of {}  [{}]",
            progress.position + 1,
            progress.total,
            format_remaining(secs)
        ),
        None => println!("Question {} of {}", progress.position + 1, progress.total),
    }
    println!("{}", question.question);
    if let Some(code) = &question.code {
        println!();
        for line in code.lines() {
            println!("    {line}");
        }
    }
    for (idx, option) in question.options.iter().enumerate() {
        println!("  {}. {option}", idx + 1);
    }
    if let Some(hint) = &question.hint {
        println!("  (hint: {hint})");
    }
    if let Some(current) = attempt.answer_for(&question.id) {
        println!("  current answer: {current}");
    }
}

fn print_outcome(attempt: &QuizAttempt, new_best: bool) {
    let Some(outcome) = attempt.outcome() else {
        return;
    };
    let quiz = attempt.quiz();
    println!();
    if outcome.timed_out {
        println!("Time is up!");
    }
    println!(
        "Score: {}% ({} of {} correct)",
        outcome.score.percent, outcome.score.correct, outcome.score.total
    );
    if outcome.passed {
        println!("Passed.");
    } else {
        println!("Not passed: {}% is needed.", quiz.passing_score);
    }
    if new_best {
        println!("New best score saved.");
    }

    for (idx, (question, review)) in quiz.questions.iter().zip(&outcome.reviews).enumerate() {
        let mark = if review.correct { "ok" } else { "--" };
        println!();
        println!("{mark} {}. {}", idx + 1, question.question);
        println!("   your answer: {}", review.given.as_deref().unwrap_or("(none)"));
        if !review.correct {
            println!("   expected: {}", describe_expected(question));
        }
        println!("   {}", question.explanation);
    }
}

fn describe_expected(question: &QuizQuestion) -> String {
    match &question.correct_answer {
        CorrectAnswer::Single(answer) => answer.clone(),
        CorrectAnswer::AnyOf(answers) => answers.join(" or "),
    }
}

pub async fn run_quiz(app: &AppServices, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let quiz = Arc::new(Quiz::from_json(&raw)?);
    let runner = app.quizzes();
    let mut attempt = runner.start(Arc::clone(&quiz))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", quiz.title);
    if !quiz.description.is_empty() {
        println!("{}", quiz.description);
    }
    if let Some(best) = runner.best_result(&quiz.id).await {
        println!("Best so far: {}%", best.score);
    }
    println!("Answer with an option number or text. :n next, :p previous, :s submit, :q quit.");

    loop {
        let timed = attempt.time_remaining().is_some();
        let mut ticker = countdown();
        let mut new_best = false;
        print_question(&attempt);

        while !attempt.is_complete() {
            tokio::select! {
                _ = ticker.tick(), if timed => {
                    match runner.tick(&mut attempt).await? {
                        CountdownTick::Remaining(secs) if secs <= 10 || secs % 30 == 0 => {
                            println!("  {} left", format_remaining(secs));
                        }
                        CountdownTick::Expired(submission) => new_best = submission.new_best,
                        _ => {}
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        // stdin closed: grade whatever was answered
                        new_best = runner.submit(&mut attempt).await?.new_best;
                        break;
                    };
                    match Input::parse(&line) {
                        Input::Empty => {}
                        Input::Quit => return Ok(()),
                        Input::Submit => {
                            new_best = runner.submit(&mut attempt).await?.new_best;
                        }
                        Input::Next => {
                            if !attempt.has_answered_current() {
                                println!("  answer this question first");
                            } else if attempt.next()? {
                                print_question(&attempt);
                            } else {
                                println!("  last question, :s to submit");
                            }
                        }
                        Input::Previous => {
                            if attempt.previous()? {
                                print_question(&attempt);
                            }
                        }
                        Input::Answer(raw) => {
                            let value = attempt
                                .current_question()
                                .map(|q| resolve_answer(q, &raw))
                                .unwrap_or(raw);
                            attempt.answer_current(value)?;
                            if attempt.is_last_question() {
                                println!("  recorded, :s to submit");
                            } else if attempt.next()? {
                                print_question(&attempt);
                            }
                        }
                    }
                }
            }
        }
        drop(ticker);

        print_outcome(&attempt, new_best);

        println!();
        println!("Retry? [y/N]");
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if !line.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
        attempt.retry();
    }
}
