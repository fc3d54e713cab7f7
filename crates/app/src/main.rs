use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use academy_core::model::{LessonCatalog, LessonId, LessonStatus};
use services::{AcademyServices, Clock, ServiceOptions};
use storage::catalog::{bundled_catalog, load_catalog_file};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::{Config, normalize_sqlite_url};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidLessonId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing argument: <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid lesson id: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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
    eprintln!("  app lessons                 list lessons with their status");
    eprintln!("  app show <id>               print a lesson's theory and exercise");
    eprintln!("  app run <id> <file|->       submit a solution for a lesson");
    eprintln!("  app eval <file|->           run a snippet and print its output");
    eprintln!("  app progress                show completed lessons and stars");
    eprintln!("  app reset                   forget all progress");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>           default sqlite://academy.sqlite3");
    eprintln!("  --catalog <path>            lesson catalog JSON (default: bundled)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_CATALOG, ACADEMY_MAX_STEPS, ACADEMY_CELEBRATION_MS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Lessons,
    Show(LessonId),
    Run { lesson: LessonId, source: String },
    Eval { source: String },
    Progress,
    Reset,
}

struct Args {
    command: Command,
    config: Config,
}

impl Args {
    fn parse(argv: Vec<String>, mut config: Config) -> Result<Self, ArgsError> {
        let mut positional = Vec::new();
        let mut iter = argv.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut iter, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = normalize_sqlite_url(&value);
                }
                "--catalog" => {
                    config.catalog_path = Some(PathBuf::from(require_value(&mut iter, "--catalog")?));
                }
                "-" => positional.push(arg),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let name = positional
            .next()
            .ok_or(ArgsError::MissingArgument { name: "command" })?;
        let command = match name.as_str() {
            "lessons" => Command::Lessons,
            "show" => Command::Show(parse_lesson_id(positional.next())?),
            "run" => Command::Run {
                lesson: parse_lesson_id(positional.next())?,
                source: positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "file" })?,
            },
            "eval" => Command::Eval {
                source: positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "file" })?,
            },
            "progress" => Command::Progress,
            "reset" => Command::Reset,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { command, config })
    }
}

fn parse_lesson_id(raw: Option<String>) -> Result<LessonId, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArgument { name: "id" })?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidLessonId { raw: raw.clone() })
}

fn read_source(source: &str) -> std::io::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = log_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn load_catalog(config: &Config) -> Result<LessonCatalog, Box<dyn std::error::Error>> {
    let catalog = match &config.catalog_path {
        Some(path) => load_catalog_file(path)?,
        None => bundled_catalog()?,
    };
    Ok(catalog)
}

fn status_label(status: LessonStatus) -> &'static str {
    match status {
        LessonStatus::Completed => "done",
        LessonStatus::Available => "open",
        LessonStatus::Locked => "locked",
    }
}

fn print_lessons(services: &AcademyServices) {
    for card in services.progress().lesson_cards() {
        let stars = "*".repeat(card.stars as usize);
        println!(
            "{:>2}  [{:<6}] {} ({}, {}) {stars}",
            card.id.value(),
            status_label(card.status),
            card.title,
            card.difficulty,
            card.estimated_time,
        );
    }
}

fn print_lesson(services: &AcademyServices, id: LessonId) -> Result<(), Box<dyn std::error::Error>> {
    let lesson = services
        .lesson(id)
        .ok_or_else(|| format!("lesson {id} does not exist"))?;
    println!("# {}", lesson.title());
    println!("{} | {}", lesson.difficulty(), lesson.estimated_time());
    println!("{}", lesson.description());
    println!();
    println!("## {}", lesson.theory().title);
    println!("{}", lesson.theory().content);
    for example in &lesson.theory().examples {
        println!();
        println!("{}", example.code);
        println!("> {}", example.explanation);
    }
    println!();
    println!("## Exercise: {}", lesson.exercise().concept);
    println!("{}", lesson.exercise().initial_code);
    println!();
    println!("Expected output: {}", lesson.exercise().expected_output);
    if !services.progress().is_unlocked(id) {
        println!("(locked: complete lesson {} first)", id.prerequisite().unwrap_or(id));
    }
    Ok(())
}

fn print_progress(services: &AcademyServices) {
    let summary = services.progress().summary();
    println!(
        "Completed {}/{} lessons ({:.0}%), {} stars",
        summary.completed, summary.total, summary.percent, summary.reward_points
    );
    match summary.current_lesson {
        Some(id) if !summary.graduated => println!("Next lesson: {id}"),
        _ => println!("All lessons completed. Welcome to the crew!"),
    }
}

async fn run_lesson(
    services: &mut AcademyServices,
    id: LessonId,
    code: String,
) -> Result<bool, Box<dyn std::error::Error>> {
    services.open(id)?;
    services.complete_theory()?;
    let run = services.run_practice(code).await?;

    println!("{}", run.feedback());
    if !run.passed {
        if run.outcome.is_failure() {
            println!("Your code stopped with an error. Fix it and try again.");
        } else if let Some(lesson) = services.lesson(id) {
            println!("Expected: {}", lesson.exercise().expected_output);
            println!("Hint: {}", lesson.exercise().hint);
        }
        services.exit();
        return Ok(false);
    }

    if let Some(lesson) = services.lesson(id) {
        println!("Correct! {}", lesson.exercise().explanation);
    }
    if let Some(deadline) = services.session().pending_return() {
        let wait = deadline
            .remaining(services.session().clock())
            .to_std()
            .unwrap_or_default();
        tokio::time::sleep(wait).await;
        services.tick();
    }
    print_progress(services);
    Ok(true)
}

async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() || argv.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(ExitCode::SUCCESS);
    }

    let args = Args::parse(argv, Config::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let config = args.config;

    let catalog = load_catalog(&config)?;
    let options = ServiceOptions {
        clock: Clock::System,
        limits: config.limits,
        session: config.session,
    };
    let mut services = AcademyServices::new_sqlite(&config.db_url, catalog, options).await?;
    tracing::debug!(db = %config.db_url, "services ready");

    match args.command {
        Command::Lessons => print_lessons(&services),
        Command::Show(id) => print_lesson(&services, id)?,
        Command::Run { lesson, source } => {
            let code = read_source(&source)?;
            if !run_lesson(&mut services, lesson, code).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Eval { source } => {
            let code = read_source(&source)?;
            let outcome = services.evaluate(&code);
            println!("{}", outcome.feedback());
            if outcome.is_failure() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Progress => print_progress(&services),
        Command::Reset => {
            services.reset_progress().await;
            println!("Progress cleared.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn parses_run_with_stdin_and_flags() {
        let args = Args::parse(
            argv(&["run", "2", "-", "--db", "sqlite::memory:"]),
            Config::default(),
        )
        .unwrap();
        assert_eq!(
            args.command,
            Command::Run {
                lesson: LessonId::new(2),
                source: "-".into()
            }
        );
        assert_eq!(args.config.db_url, "sqlite::memory:");
    }

    #[test]
    fn flags_may_precede_the_command() {
        let args = Args::parse(
            argv(&["--catalog", "custom.json", "lessons"]),
            Config::default(),
        )
        .unwrap();
        assert_eq!(args.command, Command::Lessons);
        assert_eq!(args.config.catalog_path, Some(PathBuf::from("custom.json")));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Args::parse(argv(&["show", "abc"]), Config::default()),
            Err(ArgsError::InvalidLessonId { .. })
        ));
        assert!(matches!(
            Args::parse(argv(&["run", "1"]), Config::default()),
            Err(ArgsError::MissingArgument { name: "file" })
        ));
        assert!(matches!(
            Args::parse(argv(&["fly"]), Config::default()),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(
            Args::parse(argv(&["lessons", "--db"]), Config::default()),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            Args::parse(argv(&["progress", "--verbose"]), Config::default()),
            Err(ArgsError::UnknownArg(_))
        ));
    }
}
