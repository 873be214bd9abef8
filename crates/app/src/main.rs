use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::FixedOffset;
use mathkids_core::model::{AgeGroup, AgeGroupError, Difficulty, DifficultyError};
use services::{AppServices, Clock, QuizError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://mathkids.sqlite3";
const RECENT_SESSIONS: usize = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidCount { raw: String },
    InvalidDifficulty { raw: String },
    InvalidOffset { raw: String },
    AgeGroup(AgeGroupError),
    Difficulty(DifficultyError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => write!(f, "invalid --difficulty value: {raw}"),
            ArgsError::InvalidOffset { raw } => {
                write!(f, "invalid MATHKIDS_UTC_OFFSET_MINUTES value: {raw}")
            }
            ArgsError::AgeGroup(e) => write!(f, "{e}"),
            ArgsError::Difficulty(e) => write!(f, "{e}"),
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
    eprintln!("  app practice <age-group> [--questions <n>] [--difficulty <1-5>]");
    eprintln!("  app stats <age-group>");
    eprintln!("  app export [--out <path>]");
    eprintln!("  app import <path>");
    eprintln!("  app clear --yes");
    eprintln!();
    eprintln!("Every command accepts --db <sqlite_url> (default {DEFAULT_DB_URL}).");
    eprintln!("Age groups: 3-5, 6-8, 9-12.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MATHKIDS_DB_URL, MATHKIDS_UTC_OFFSET_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Practice {
        age_group: AgeGroup,
        questions: Option<usize>,
        difficulty: Difficulty,
    },
    Stats {
        age_group: AgeGroup,
    },
    Export {
        out: Option<PathBuf>,
    },
    Import {
        path: PathBuf,
    },
    Clear {
        confirmed: bool,
    },
}

/// Settings read from the process environment.
#[derive(Debug, Clone, Default)]
struct EnvConfig {
    db_url: Option<String>,
    utc_offset_minutes: Option<String>,
}

impl EnvConfig {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("MATHKIDS_DB_URL").ok(),
            utc_offset_minutes: std::env::var("MATHKIDS_UTC_OFFSET_MINUTES").ok(),
        }
    }
}

struct Args {
    db_url: String,
    utc_offset: Option<FixedOffset>,
    command: Command,
}

impl Args {
    fn parse(
        name: &str,
        args: &mut impl Iterator<Item = String>,
        env: &EnvConfig,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env
            .db_url
            .clone()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let utc_offset = env
            .utc_offset_minutes
            .as_deref()
            .map(parse_offset_minutes)
            .transpose()?;

        let mut positional = Vec::new();
        let mut out = None;
        let mut questions = None;
        let mut difficulty = Difficulty::default();
        let mut confirmed = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--out" if name == "export" => {
                    out = Some(PathBuf::from(require_value(args, "--out")?));
                }
                "--questions" if name == "practice" => {
                    let value = require_value(args, "--questions")?;
                    let parsed: usize = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCount { raw: value.clone() })?;
                    questions = Some(parsed);
                }
                "--difficulty" if name == "practice" => {
                    let value = require_value(args, "--difficulty")?;
                    let level: u8 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDifficulty { raw: value.clone() })?;
                    difficulty = Difficulty::new(level).map_err(ArgsError::Difficulty)?;
                }
                "--yes" if name == "clear" => confirmed = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match name {
            "practice" | "stats" => {
                let raw = positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "age group" })?;
                let age_group: AgeGroup = raw.parse().map_err(ArgsError::AgeGroup)?;
                if name == "practice" {
                    Command::Practice {
                        age_group,
                        questions,
                        difficulty,
                    }
                } else {
                    Command::Stats { age_group }
                }
            }
            "export" => Command::Export { out },
            "import" => Command::Import {
                path: positional
                    .next()
                    .map(PathBuf::from)
                    .ok_or(ArgsError::MissingArgument { what: "import path" })?,
            },
            "clear" => Command::Clear { confirmed },
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };

        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            utc_offset,
            command,
        })
    }
}

fn parse_offset_minutes(raw: &str) -> Result<FixedOffset, ArgsError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ArgsError::InvalidOffset {
            raw: raw.to_string(),
        })
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
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

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn practice(
    services: &AppServices,
    age_group: AgeGroup,
    questions: Option<usize>,
    difficulty: Difficulty,
) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_loop = services.quiz_loop();
    let count = questions.unwrap_or_else(|| {
        usize::try_from(age_group.default_session_length()).unwrap_or(usize::MAX)
    });
    let mut quiz = quiz_loop.start_quiz_with(age_group, count, difficulty)?;

    let config = age_group.difficulty_config();
    println!("Practice for ages {age_group}: {count} questions.");
    if let Some(limit) = config.time_limit() {
        println!("Try to answer each one within {} seconds.", limit.as_secs());
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let Some(question) = quiz.current_question() else {
            break;
        };
        println!();
        println!(
            "[{}/{}] {}",
            quiz.current_index() + 1,
            quiz.questions().len(),
            question.prompt()
        );
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            println!("Stopped early; this session was not saved.");
            return Ok(());
        };
        let line = line?;

        match quiz_loop.answer_current(&mut quiz, &line).await {
            Ok(result) if result.record.is_correct => println!("Correct!"),
            Ok(result) if result.advanced => {
                println!("Not quite, the answer was {}.", result.record.correct_answer);
            }
            Ok(_) => println!("Not quite, try again."),
            Err(QuizError::EmptyAnswer | QuizError::InvalidAnswer(_)) => {
                println!("Please type a whole number.");
            }
            Err(QuizError::Store(err)) if quiz.is_complete() => {
                warn!(%err, "saving the session failed, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    // No-op unless the save on the last answer failed.
    quiz_loop.persist_outcome(&mut quiz).await?;

    if let Some(session) = quiz.outcome() {
        println!();
        println!(
            "Done: {}/{} correct ({:.0}%), {}.",
            session.correct_answers(),
            session.total_questions(),
            session.accuracy(),
            session.performance().label()
        );
    }
    Ok(())
}

async fn stats(services: &AppServices, age_group: AgeGroup) {
    let store = services.progress();
    let stats = store.get_learning_stats(age_group).await;

    println!("Ages {age_group}");
    println!(
        "  today:   {} questions, {:.0}% correct",
        stats.today_questions, stats.today_accuracy
    );
    println!(
        "  week:    {} questions, {:.0}% correct",
        stats.weekly_questions, stats.weekly_accuracy
    );
    println!(
        "  overall: {} questions, {:.0}% correct",
        stats.total_questions, stats.total_accuracy
    );
    println!("  streak:  {} day(s)", stats.streak_days);

    let recent = store.recent_sessions(age_group, RECENT_SESSIONS).await;
    if !recent.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in recent {
            println!(
                "  {}  {}/{}  {:.0}s",
                session.started_at().format("%Y-%m-%d %H:%M"),
                session.correct_answers(),
                session.total_questions(),
                session.total_time_ms() as f64 / 1000.0
            );
        }
    }
}

async fn export(
    services: &AppServices,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = services.progress();
    let json = store.export_data().await?;
    let path = out.unwrap_or_else(|| PathBuf::from(store.export_filename()));
    std::fs::write(&path, json)?;
    println!("Exported to {}", path.display());
    Ok(())
}

async fn import(services: &AppServices, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(&path)?;
    services.progress().import_data(&json).await?;
    println!("Imported {}", path.display());
    Ok(())
}

async fn clear(services: &AppServices, confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        eprintln!("This deletes every saved session and all progress. Re-run with --yes.");
        return Err(ArgsError::MissingArgument { what: "--yes" }.into());
    }
    services.progress().clear_all_data().await?;
    println!("All data cleared.");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let mut iter = argv.into_iter();
    let name = match iter.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let env = EnvConfig::from_env();
    let parsed = Args::parse(&name, &mut iter, &env).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), parsed.utc_offset).await?;
    info!(db = %parsed.db_url, command = %name, "ready");

    match parsed.command {
        Command::Practice {
            age_group,
            questions,
            difficulty,
        } => practice(&services, age_group, questions, difficulty).await,
        Command::Stats { age_group } => {
            stats(&services, age_group).await;
            Ok(())
        }
        Command::Export { out } => export(&services, out).await,
        Command::Import { path } => import(&services, path).await,
        Command::Clear { confirmed } => clear(&services, confirmed).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
