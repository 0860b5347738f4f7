//! Aggregation engine that turns a streamed chat history into stable turns.
//!
//! [`group`] is the pure grouping step; [`LiveAggregator`] drives it as
//! fragments and completion signals arrive.

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod fragment;
pub mod grouping;
pub mod observability;
pub mod turn;
pub mod visual;

pub use aggregator::{LiveAggregator, TranscriptView};
pub use config::{AggregatorConfig, DEFAULT_VISUAL_TOOLS};
pub use errors::{AggregationError, ConfigError};
pub use fragment::{Fragment, RawFragment, Role, ToolInvocation, ToolState};
pub use grouping::group;
pub use observability::init_observability;
pub use turn::{HistoryEntry, Turn, flatten_history, merge_tool_invocations};
pub use visual::{
    CardSupply, HeroProfile, MarketData, OwnedCard, PerformancePoint, PriceEntry, StarSwing,
    ToolVisual, TournamentScore, VisualKind,
};
