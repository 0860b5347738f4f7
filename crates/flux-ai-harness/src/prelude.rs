//! Common imports for typical harness usage.
//!
//! Builder, stream and tool types a chat front end needs in one import.
pub use crate::{
    AbortHandle, Harness, HarnessBuilder, HarnessError, ModelRef, ProviderId, RunBuilder,
    RunOutput, RunStream, Session, SessionConfig, StreamEvent, Tool, ToolError, ToolRegistry,
};
