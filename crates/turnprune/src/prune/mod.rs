//! The visibility-pruning pipeline.
//!
//! ```text
//! MessageLocator ──► group_exchanges ──► Budgeter::apply ──► indicator
//!        ▲                                   ▲
//!        └── MutationWatcher / AutoExpand ───┘
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`locator`] | Ordered selector strategies that find message elements |
//! | [`grouper`] | Pairs messages into prompt/response exchanges |
//! | [`budget`] | Persisted vs effective budget and the hidden set |
//! | [`auto_expand`] | Scroll and intersection triggers for temporary raises |
//! | [`watcher`] | Debounced mutation reactions, paused during generation |
//! | [`timer`] | Debounce and bounded-retry state machines |

pub mod auto_expand;
pub mod budget;
pub mod grouper;
pub mod locator;
pub mod timer;
pub mod watcher;

pub use auto_expand::{AutoExpand, EXPAND_STEP, ExpandTrigger};
pub use budget::{Budgeter, HiddenSet, PruneOutcome, VisibilityBudget};
pub use grouper::{ExchangeUnit, GroupingAnomaly, find_anomalies, group_exchanges};
pub use locator::{Located, Matcher, MessageLocator};
pub use timer::{Debouncer, Interval};
pub use watcher::{MutationWatcher, Reaction};
