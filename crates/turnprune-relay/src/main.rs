//! Serve a turnprune engine over HTTP and WebSocket.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p turnprune-relay -- --fixture chat.json
//! cargo run -p turnprune-relay -- --fixture chat.json --port 8080 --settings settings.json
//! cargo run -p turnprune-relay            # no page attached: commands report not-ready
//! ```
//!
//! ## Sending commands
//!
//! **REST** (`POST /api/command`):
//! ```json
//! {"type": "searchArchive", "query": "lifetimes", "useRegex": false}
//! ```
//!
//! **WebSocket** (connect to `/ws`): send the same JSON; replies arrive as
//! `{"type": "response", "response": {...}}` alongside `stats` broadcasts.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use turnprune::config::{FileStore, MemoryStore, Preset, SETTINGS_KEY, Settings, SettingsStore};
use turnprune::dom::ConversationFixture;
use turnprune::engine::Engine;
use turnprune::events::{CompositeEventHandler, LoggingHandler};
use turnprune::logging::DiagnosticsLayer;
use turnprune_relay::{
    RelayBroadcastHandler, RelayConfig, RelayMessage, attach, empty_slot, spawn_relay,
    spawn_ticker,
};

/// Message relay for a turnprune engine.
#[derive(Parser)]
#[command(about = "HTTP/WebSocket relay between a settings UI and a turnprune engine")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3002)]
    port: u16,

    /// Conversation fixture to load as the page. Without one, the relay runs
    /// with no engine attached.
    #[arg(long, short)]
    fixture: Option<PathBuf>,

    /// Settings file. Budget and badge changes are written back to it.
    /// Without one, settings live in memory.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Apply a named settings profile to the stored settings.
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Seed the budget (ignored when --settings already has one).
    #[arg(long)]
    keep: Option<usize>,

    /// Log engine diagnostics. Also turns on `debugLogs` in the stored
    /// settings.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    // 1. Logging: stderr plus the buffer served at /api/logs.
    let (diagnostics, logs) = DiagnosticsLayer::new();
    let level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(level),
        )
        .with(diagnostics.with_filter(level))
        .init();

    // 2. Broadcast channel shared by the engine's handler and the server.
    let config = RelayConfig {
        bind_addr: ([127, 0, 0, 1], args.port).into(),
        ..Default::default()
    };
    let (tx, _) = tokio::sync::broadcast::channel::<RelayMessage>(config.broadcast_capacity);

    // 3. The page, if any.
    let slot = match &args.fixture {
        Some(path) => {
            let fixture = ConversationFixture::from_path(path)?;
            let handler = CompositeEventHandler::new()
                .with(LoggingHandler)
                .with(RelayBroadcastHandler::new(tx.clone()));
            let doc = fixture.into_document();
            let mut engine = match &args.settings {
                Some(file) => {
                    let mut store = FileStore::new(file);
                    seed_settings(&mut store, &args)?;
                    Engine::new(doc, store)
                }
                None => {
                    let mut store = MemoryStore::new();
                    seed_settings(&mut store, &args)?;
                    Engine::new(doc, store)
                }
            }
            .with_handler(handler);
            engine.start(Instant::now());
            attach(engine)
        }
        None => empty_slot(),
    };

    // 4. Serve and keep the engine's timers running.
    let addr = spawn_relay(slot.clone(), tx, logs, config)
        .await
        .map_err(|e| format!("failed to bind relay: {e}"))?;
    let _ticker = spawn_ticker(slot);
    println!("Relay: http://{addr}");
    info!(%addr, "relay listening");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to wait for ctrl-c: {e}"))?;
    Ok(())
}

/// Write `--preset`/`--keep`/`--debug` into the stored settings. `--keep`
/// overrides a preset but never a budget already in the store.
fn seed_settings(store: &mut impl SettingsStore, args: &Args) -> Result<(), String> {
    if args.preset.is_none() && args.keep.is_none() && !args.debug {
        return Ok(());
    }
    let mut settings = store
        .load(SETTINGS_KEY)
        .map_err(|e| e.to_string())?
        .unwrap_or_else(|| serde_json::json!({}));
    let had_budget = settings.get("keepN").is_some();
    if let Some(preset) = args.preset {
        settings = Settings::apply_preset(settings, preset).map_err(|e| e.to_string())?;
    }
    let Some(obj) = settings.as_object_mut() else {
        return Ok(());
    };
    if let Some(keep) = args.keep
        && (args.preset.is_some() || !had_budget)
    {
        obj.insert("keepN".into(), keep.into());
    }
    if args.debug {
        obj.insert("debugLogs".into(), true.into());
    }
    store.save(SETTINGS_KEY, settings).map_err(|e| e.to_string())
}
