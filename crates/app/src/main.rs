use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lingua_core::Catalog;
use services::{AppServices, Clock, DEFAULT_TOTAL_LESSONS, EngineSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod play;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidFeedbackMs { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidFeedbackMs { raw } => {
                write!(f, "invalid --feedback-ms value: {raw}")
            }
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
    eprintln!("  cargo run -p app -- status [options]");
    eprintln!("  cargo run -p app -- play   [options]");
    eprintln!("  cargo run -p app -- reset  [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>       default sqlite:lingua.sqlite3");
    eprintln!("  --catalog <path>        story catalog JSON, default built-in content");
    eprintln!("  --feedback-ms <millis>  choice feedback delay, default 3000");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUA_DB_URL, LINGUA_CATALOG, LINGUA_FEEDBACK_MS");
    eprintln!("  LINGUA_LOG (filter, default info), LINGUA_LOG_FORMAT=json");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Play,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "play" => Some(Self::Play),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    catalog: Option<PathBuf>,
    feedback_delay: Option<Duration>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LINGUA_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("lingua.sqlite3".into()), normalize_sqlite_url);
        let mut catalog = std::env::var_os("LINGUA_CATALOG").map(PathBuf::from);
        let mut feedback_delay = match std::env::var("LINGUA_FEEDBACK_MS") {
            Ok(raw) => Some(parse_feedback_ms(raw)?),
            Err(_) => None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => {
                    catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                "--feedback-ms" => {
                    let value = require_value(args, "--feedback-ms")?;
                    feedback_delay = Some(parse_feedback_ms(value)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            catalog,
            feedback_delay,
        })
    }

    fn settings(&self) -> EngineSettings {
        let settings = EngineSettings::default();
        match self.feedback_delay {
            Some(delay) => settings.with_feedback_delay(delay),
            None => settings,
        }
    }
}

fn parse_feedback_ms(raw: String) -> Result<Duration, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ArgsError::InvalidFeedbackMs { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite::memory:") || raw.starts_with("sqlite://") {
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
    if db_url.starts_with("sqlite::memory:") {
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

/// Logs go to stderr so they never interleave with the story on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LINGUA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("LINGUA_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog, Box<dyn std::error::Error>> {
    let catalog = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let catalog = Catalog::from_json(&json)?;
            info!(path = %path.display(), chapters = catalog.chapters().len(), "catalog loaded");
            catalog
        }
        None => Catalog::builtin()?,
    };
    Ok(catalog)
}

async fn print_status(services: &AppServices) {
    match services.profiles().load_profile().await {
        Some(profile) => println!(
            "{} learning {} at {}",
            profile.name(),
            profile.target_language(),
            profile.level()
        ),
        None => println!("No profile yet. Run `play` to start."),
    }

    let summary = services.progress().dashboard(DEFAULT_TOTAL_LESSONS).await;
    println!(
        "Story XP {} | chapters completed {} | tests passed {}/{} | lessons {}/{} ({}%)",
        summary.story_xp,
        summary.chapters_completed,
        summary.tests_passed,
        summary.tests_taken,
        summary.lessons_completed,
        summary.total_lessons,
        summary.lesson_percentage,
    );
    println!();

    let engine = services.story_engine().await;
    for entry in engine.chapter_map() {
        let marker = if entry.completed {
            "done"
        } else if entry.unlocked {
            "open"
        } else {
            "locked"
        };
        let current = if entry.current { " <" } else { "" };
        let score = engine
            .test_results()
            .get(entry.id)
            .map(|result| format!(" test {}%", result.score().value()))
            .unwrap_or_default();
        println!(
            "  [{marker:>6}] {:>2}. {} {} ({} XP){score}{current}",
            entry.id, entry.level, entry.title, entry.xp_reward
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let catalog = load_catalog(parsed.catalog.as_ref())?;
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::system(), catalog, parsed.settings())
            .await?;

    match cmd {
        Command::Status => {
            print_status(&services).await;
            Ok(())
        }
        Command::Play => play::run(&services).await,
        Command::Reset => {
            services.progress().reset_story().await?;
            println!("Story progress cleared.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
