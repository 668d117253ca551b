//! Convenience re-exports for common `turnprune` types.
//!
//! ```ignore
//! use turnprune::prelude::*;
//! ```

pub use std::time::Instant;

// ── Engine ──────────────────────────────────────────────────────────
pub use crate::engine::Engine;
pub use crate::events::{
    CompositeEventHandler, EngineEvent, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
pub use crate::json_schema_for;
pub use crate::protocol::{Command, Response, Stats};

// ── Page ────────────────────────────────────────────────────────────
pub use crate::dom::{ConversationFixture, DocumentAdapter, ElementId, MemoryDocument};
pub use crate::indicator::{Modifiers, Viewport};

// ── Settings ────────────────────────────────────────────────────────
pub use crate::config::{FileStore, MemoryStore, Preset, Settings, SettingsStore};

// ── Search and export ───────────────────────────────────────────────
pub use crate::export::ExportFormat;
pub use crate::search::{RoleFilter, SearchAction, SearchOptions, SearchOutcome};
