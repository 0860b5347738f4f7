//! Streaming chat harness with a builder-first async API.
//!
//! A run answers one user message. It streams [`StreamEvent::Fragment`]
//! snapshots (the user message first, then one assistant message per
//! provider round) and executes registered [`Tool`]s between rounds.
//! Vendor-specific APIs are namespaced under `vendors::*`.
//!
//! # Tool-calling run (OpenAI)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flux_ai_harness::prelude::*;
//! use flux_ai_harness::vendors::openai::{
//!     OpenAiProvider, OpenAiRequestOptions, OpenAiRunBuilderExt,
//! };
//! use flux_core::HistoryEntry;
//!
//! # async fn demo(tools: ToolRegistry, earlier: Vec<HistoryEntry>) -> Result<(), HarnessError> {
//! let harness = Harness::builder()
//!     .register_provider(Arc::new(OpenAiProvider::from_env()?))
//!     .build()?;
//! let session = harness.session(SessionConfig::named("demo").tools(tools));
//!
//! let mut stream = session
//!     .run(ModelRef::new("openai", "gpt-4o-mini"))
//!     .system_prompt("Answer briefly.")
//!     .history(earlier)
//!     .user_text("How is hero 42 doing?")
//!     .max_tool_roundtrips(2)
//!     .openai_options(OpenAiRequestOptions::default().temperature(0.3))
//!     .start_stream()
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     if let StreamEvent::Fragment { fragment, .. } = event {
//!         println!("{}: {}", fragment.id, fragment.content);
//!     }
//! }
//! let output = stream.finish().await?;
//! println!("{} fragments", output.fragments.len());
//! # Ok(())
//! # }
//! ```

/// Provider message types and final run output helpers.
pub mod content;
/// Public error types used by the harness API.
pub mod errors;
/// Harness entry point and builder.
pub mod harness;
/// Model and provider identifiers plus generic run options.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contracts used by vendor integrations.
pub mod provider;
/// Run builder, streaming handle, and cancellation handle.
pub mod run;
/// Session configuration and session handle.
pub mod session;
/// Normalized public stream events.
pub mod stream;
/// Tool trait and per-session registry.
pub mod tools;
/// Vendor-specific integrations and extension traits.
pub mod vendors;

pub use content::{ProviderMessage, RunOutput};
pub use errors::{HarnessError, ProviderError, RunFailure, ToolError};
pub use harness::{Harness, HarnessBuilder};
pub use model::{ModelRef, ProviderId, RunOptions};
pub use provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
    ToolChoice,
};
pub use run::{AbortHandle, RunBuilder, RunStream};
pub use session::{Session, SessionConfig};
pub use stream::StreamEvent;
pub use tools::{Tool, ToolRegistry, ToolSpec};
