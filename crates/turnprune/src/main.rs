//! Run the pruning engine over a conversation fixture.
//!
//! # Examples
//!
//! ```sh
//! # How many exchanges stay visible with the default budget
//! turnprune --fixture chat.json stats
//!
//! # Search, then step to the third match
//! turnprune --fixture chat.json --keep 3 search "lifetime" --next 2
//!
//! # Counts under the research profile
//! turnprune --fixture chat.json --preset research stats
//!
//! # Export the whole conversation as Markdown
//! turnprune --fixture chat.json export --format markdown --out chat.md
//!
//! # Settings JSON schema
//! turnprune schema
//! ```

use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use turnprune::config::{FileStore, MemoryStore, Preset, SETTINGS_KEY, Settings, SettingsStore};
use turnprune::dom::{ConversationFixture, MemoryDocument};
use turnprune::engine::Engine;
use turnprune::events::LoggingHandler;
use turnprune::export::{self, ExportFormat};
use turnprune::json_schema_for;
use turnprune::protocol::{Command, Response};
use turnprune::search::{RoleFilter, SearchAction};

/// Visibility-pruning engine for long chat transcripts.
#[derive(Parser)]
#[command(name = "turnprune", version)]
struct Cli {
    /// Conversation fixture: `{"turns": [{"role": "user", "text": "..."}]}`.
    #[arg(long, short, global = true)]
    fixture: Option<PathBuf>,

    /// Start from a named settings profile.
    #[arg(long, value_enum, global = true)]
    preset: Option<Preset>,

    /// Override the number of exchanges kept visible (applied after
    /// `--preset`).
    #[arg(long, global = true)]
    keep: Option<usize>,

    /// Settings file (read only; one JSON object keyed by store key).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log engine diagnostics.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print visible / archived / total exchange counts.
    Stats,
    /// Search every message, hidden or not.
    Search {
        query: String,
        /// Treat the query as a regular expression.
        #[arg(long)]
        regex: bool,
        /// Only search messages by this author.
        #[arg(long, value_enum, default_value = "all")]
        filter: RoleFilter,
        /// Step forward this many matches after searching.
        #[arg(long, default_value_t = 0)]
        next: usize,
    },
    /// Export every message.
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the settings JSON schema.
    Schema,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(level),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let now = Instant::now();
    match &cli.command {
        CliCommand::Schema => print_json(&json_schema_for::<Settings>()),
        CliCommand::Stats => {
            let mut engine = load_engine(&cli, now)?;
            print_json(&engine.handle(Command::GetStats, now))
        }
        CliCommand::Search {
            query,
            regex,
            filter,
            next,
        } => {
            let mut engine = load_engine(&cli, now)?;
            let mut response = engine.handle(
                Command::SearchArchive {
                    query: query.clone(),
                    action: SearchAction::Search,
                    use_regex: *regex,
                    filter: *filter,
                },
                now,
            );
            if response.error_message().is_none() {
                for _ in 0..*next {
                    response = engine.handle(Command::SearchNext, now);
                }
            }
            print_json(&response)?;
            for text in engine.doc().highlighted_text() {
                println!("  > {text}");
            }
            Ok(())
        }
        CliCommand::Export { format, out } => {
            let mut engine = load_engine(&cli, now)?;
            let Response::Messages { messages } =
                engine.handle(Command::GetAllMessagesForExport, now)
            else {
                return Err("engine returned no messages".into());
            };
            let exported_at = Local::now();
            let rendered = export::render(&messages, *format, exported_at)
                .map_err(|e| format!("export failed: {e}"))?;
            match out {
                Some(path) => {
                    std::fs::write(path, rendered)
                        .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
                    eprintln!(
                        "wrote {} messages to {} (suggested name {})",
                        messages.len(),
                        path.display(),
                        export::file_name(*format, exported_at)
                    );
                }
                None => println!("{rendered}"),
            }
            Ok(())
        }
    }
}

/// Load the fixture and start an engine over it.
fn load_engine(cli: &Cli, now: Instant) -> Result<Engine<MemoryDocument>, String> {
    let fixture_path = cli
        .fixture
        .as_deref()
        .ok_or("--fixture is required for this command")?;
    let fixture = ConversationFixture::from_path(fixture_path)?;
    let store = seeded_store(cli)?;
    let mut engine = Engine::new(fixture.into_document(), store).with_handler(LoggingHandler);
    engine.start(now);
    Ok(engine)
}

/// A volatile store seeded from the settings file, `--preset` and `--keep`, so the CLI
/// never writes back to disk.
fn seeded_store(cli: &Cli) -> Result<MemoryStore, String> {
    let mut settings = match &cli.settings {
        Some(path) => FileStore::new(path)
            .load(SETTINGS_KEY)
            .map_err(|e| e.to_string())?
            .unwrap_or_else(|| serde_json::json!({})),
        None => serde_json::json!({}),
    };
    if let Some(preset) = cli.preset {
        settings = Settings::apply_preset(settings, preset).map_err(|e| e.to_string())?;
    }
    if let Some(keep) = cli.keep
        && let Some(obj) = settings.as_object_mut()
    {
        obj.insert("keepN".into(), keep.into());
    }
    if cli.debug
        && let Some(obj) = settings.as_object_mut()
    {
        obj.insert("debugLogs".into(), true.into());
    }
    Ok(MemoryStore::new().with_entry(SETTINGS_KEY, settings))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
