use std::fmt;
use std::path::PathBuf;

use course_core::model::{LessonId, Theme};
use services::{
    AppServices, Channel, Clock, CrateType, Edition, ExecuteOptions, Mode, PlaygroundConfig,
};
use tracing_subscriber::EnvFilter;

mod quiz_prompt;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLessonCount { raw: String },
    InvalidValue { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLessonCount { raw } => write!(f, "invalid --lessons value: {raw}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  course [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  progress [--lessons <n>]      show lesson and quiz progress");
    eprintln!("  complete <lesson-id>          mark a lesson complete");
    eprintln!("  incomplete <lesson-id>        clear a lesson's completion");
    eprintln!("  reset                         delete all progress");
    eprintln!("  quiz <quiz.json>              take a quiz interactively");
    eprintln!("  run <file.rs> [--release] [--channel <c>] [--edition <e>] [--lib] [--tests] [--backtrace]");
    eprintln!("  fmt <file.rs> [--write]       format through the playground");
    eprintln!("  share <file.rs>               publish a snippet and print its URL");
    eprintln!("  theme [light|dark|system]     show or set the theme preference");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:course.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_PLAYGROUND_URL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Progress { total_lessons: Option<u32> },
    Complete(LessonId),
    Incomplete(LessonId),
    Reset,
    Quiz(PathBuf),
    Run { file: PathBuf, options: ExecuteOptions },
    Format { file: PathBuf, write: bool },
    Share(PathBuf),
    Theme(Option<Theme>),
}

struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://course.sqlite3".into(), normalize_sqlite_url);

        let mut args = args.into_iter();
        let name = loop {
            let Some(arg) = args.next() else {
                return Ok(None);
            };
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" | "help" => return Ok(None),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => break arg,
            }
        };

        let command = match name.as_str() {
            "progress" => parse_progress(&mut args)?,
            "complete" => Command::Complete(parse_lesson(&mut args)?),
            "incomplete" => Command::Incomplete(parse_lesson(&mut args)?),
            "reset" => Command::Reset,
            "quiz" => Command::Quiz(parse_file(&mut args, "quiz file")?),
            "run" => parse_run(&mut args)?,
            "fmt" => parse_format(&mut args)?,
            "share" => Command::Share(parse_file(&mut args, "source file")?),
            "theme" => parse_theme(&mut args)?,
            _ => return Err(ArgsError::UnknownArg(name)),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self { db_url, command }))
    }
}

fn parse_progress(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut total_lessons = None;
    if let Some(arg) = args.next() {
        if arg != "--lessons" {
            return Err(ArgsError::UnknownArg(arg));
        }
        let value = require_value(args, "--lessons")?;
        let parsed = value
            .parse::<u32>()
            .map_err(|_| ArgsError::InvalidLessonCount { raw: value.clone() })?;
        total_lessons = Some(parsed);
    }
    Ok(Command::Progress { total_lessons })
}

fn parse_lesson(args: &mut impl Iterator<Item = String>) -> Result<LessonId, ArgsError> {
    let raw = args.next().ok_or(ArgsError::MissingArgument { what: "lesson id" })?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidValue { flag: "lesson id", raw })
}

fn parse_file(
    args: &mut impl Iterator<Item = String>,
    what: &'static str,
) -> Result<PathBuf, ArgsError> {
    args.next()
        .map(PathBuf::from)
        .ok_or(ArgsError::MissingArgument { what })
}

fn parse_run(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let file = parse_file(args, "source file")?;
    let mut options = ExecuteOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--release" => options.mode = Mode::Release,
            "--lib" => options.crate_type = CrateType::Lib,
            "--tests" => options.tests = true,
            "--backtrace" => options.backtrace = true,
            "--channel" => {
                let value = require_value(args, "--channel")?;
                options.channel = match value.as_str() {
                    "stable" => Channel::Stable,
                    "beta" => Channel::Beta,
                    "nightly" => Channel::Nightly,
                    _ => return Err(ArgsError::InvalidValue { flag: "--channel", raw: value }),
                };
            }
            "--edition" => {
                let value = require_value(args, "--edition")?;
                options.edition = match value.as_str() {
                    "2015" => Edition::E2015,
                    "2018" => Edition::E2018,
                    "2021" => Edition::E2021,
                    "2024" => Edition::E2024,
                    _ => return Err(ArgsError::InvalidValue { flag: "--edition", raw: value }),
                };
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Run { file, options })
}

fn parse_format(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let file = parse_file(args, "source file")?;
    let mut write = false;
    for arg in args.by_ref() {
        match arg.as_str() {
            "--write" => write = true,
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Format { file, write })
}

fn parse_theme(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let Some(raw) = args.next() else {
        return Ok(Command::Theme(None));
    };
    let theme = raw
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag: "theme", raw })?;
    Ok(Command::Theme(Some(theme)))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn show_progress(
    app: &AppServices,
    total_lessons: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Report corruption instead of silently showing an empty slate.
    let progress = app.progress().try_load().await?;

    if progress.is_empty() {
        println!("No progress recorded yet.");
        return Ok(());
    }

    println!("Lessons:");
    for lesson in progress.lessons() {
        let mark = if lesson.completed { "x" } else { " " };
        match lesson.completed_at {
            Some(at) => println!("  [{mark}] {} ({})", lesson.lesson_id, at.format("%Y-%m-%d %H:%M")),
            None => println!("  [{mark}] {}", lesson.lesson_id),
        }
    }
    println!("  {} completed", progress.completed_lesson_count());
    if let Some(total) = total_lessons {
        println!(
            "  {}% of {total} lessons complete",
            progress.completion_percentage(total)
        );
    }

    if !progress.quizzes().is_empty() {
        println!("Quizzes (best score):");
        for quiz in progress.quizzes() {
            println!(
                "  {}: {}% on {} questions",
                quiz.quiz_id, quiz.score, quiz.total_questions
            );
        }
    }

    if let Some(last) = progress.last_visited() {
        println!("Last visited: {last}");
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    prepare_sqlite_file(&parsed.db_url)?;
    tracing::debug!(db = %parsed.db_url, "opening storage");
    let app = AppServices::new_sqlite(
        &parsed.db_url,
        Clock::system(),
        &PlaygroundConfig::from_env(),
    )
    .await?;

    match parsed.command {
        Command::Progress { total_lessons } => show_progress(&app, total_lessons).await?,
        Command::Complete(lesson) => {
            app.progress().mark_lesson_complete(&lesson).await;
            println!("{lesson}: complete");
        }
        Command::Incomplete(lesson) => {
            app.progress().mark_lesson_incomplete(&lesson).await;
            println!("{lesson}: not complete");
        }
        Command::Reset => {
            app.progress().reset_progress().await;
            println!("Progress reset.");
        }
        Command::Quiz(path) => quiz_prompt::run_quiz(&app, &path).await?,
        Command::Run { file, options } => {
            let code = tokio::fs::read_to_string(&file).await?;
            let Some(output) = app.playground_session().execute(&code, options).await? else {
                return Ok(());
            };
            println!("{}", output.combined());
            if !output.success {
                return Err(std::io::Error::other("compilation failed").into());
            }
        }
        Command::Format { file, write } => {
            let code = tokio::fs::read_to_string(&file).await?;
            let formatted = app.playground().format(&code).await?;
            if write {
                tokio::fs::write(&file, formatted).await?;
            } else {
                print!("{formatted}");
            }
        }
        Command::Share(file) => {
            let code = tokio::fs::read_to_string(&file).await?;
            let url = app.playground().share(&code).await?;
            println!("{url}");
        }
        Command::Theme(None) => println!("{}", app.theme().theme().await),
        Command::Theme(Some(theme)) => {
            app.theme().set_theme(theme).await;
            println!("theme: {theme}");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn no_arguments_prints_usage() {
        assert!(parse(&[]).unwrap().is_none());
        assert!(parse(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn parses_lesson_commands() {
        let args = parse(&["complete", "ownership"]).unwrap().unwrap();
        assert_eq!(args.command, Command::Complete(LessonId::new("ownership")));

        let err = parse(&["incomplete"]).err().unwrap();
        assert!(matches!(err, ArgsError::MissingArgument { .. }));
    }

    #[test]
    fn db_flag_precedes_command() {
        let args = parse(&["--db", "sqlite::memory:", "reset"]).unwrap().unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.command, Command::Reset);
    }

    #[test]
    fn relative_db_path_becomes_absolute() {
        let url = normalize_sqlite_url("sqlite:data/course.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/course.sqlite3"));
    }

    #[test]
    fn parses_run_options() {
        let args = parse(&["run", "main.rs", "--release", "--edition", "2024", "--channel", "nightly"])
            .unwrap()
            .unwrap();
        let Command::Run { file, options } = args.command else {
            panic!("expected run command");
        };
        assert_eq!(file, PathBuf::from("main.rs"));
        assert_eq!(options.mode, Mode::Release);
        assert_eq!(options.edition, Edition::E2024);
        assert_eq!(options.channel, Channel::Nightly);
        assert!(!options.tests);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["run", "main.rs", "--edition", "2020"]).err().unwrap(),
            ArgsError::InvalidValue { flag: "--edition", .. }
        ));
        assert!(matches!(
            parse(&["progress", "--lessons", "many"]).err().unwrap(),
            ArgsError::InvalidLessonCount { .. }
        ));
        assert!(matches!(
            parse(&["theme", "sepia"]).err().unwrap(),
            ArgsError::InvalidValue { flag: "theme", .. }
        ));
        assert!(matches!(
            parse(&["reset", "now"]).err().unwrap(),
            ArgsError::UnknownArg(_)
        ));
    }

    #[test]
    fn theme_without_value_reads() {
        let args = parse(&["theme"]).unwrap().unwrap();
        assert_eq!(args.command, Command::Theme(None));
        let args = parse(&["theme", "dark"]).unwrap().unwrap();
        assert_eq!(args.command, Command::Theme(Some(Theme::Dark)));
    }
}
