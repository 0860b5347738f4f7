use std::collections::HashMap;
use std::pin::Pin;

use crate::content::ProviderMessage;
use crate::errors::ProviderError;
use crate::model::{ModelRef, ProviderId, RunOptions};
use crate::tools::ToolSpec;

/// Whether the model may call tools in this request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides.
    #[default]
    Auto,
    /// Text only; used once the round-trip budget is spent.
    None,
}

/// One provider round: the conversation so far plus the tools on offer.
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub run_id: uuid::Uuid,
    pub session_id: uuid::Uuid,
    pub model: ModelRef,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub options: RunOptions,
    pub vendor_options: HashMap<ProviderId, serde_json::Value>,
}

/// Normalized provider event for one round.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// The model asked for a tool call; arguments are complete.
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// The round finished. `output_text` carries the full text when the
    /// provider reports it, for streams that sent no deltas.
    Completed {
        output_text: Option<String>,
        finish_reason: Option<String>,
    },
}

/// Response metadata captured when a provider stream starts.
#[derive(Clone, Debug, Default)]
pub struct ProviderResponseMeta {
    pub request_id: Option<String>,
}

pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static>>;

/// Live event stream for a single provider round.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub metadata: ProviderResponseMeta,
}

/// Contract every vendor integration implements.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable id used to route `ModelRef::provider` to this adapter.
    fn id(&self) -> ProviderId;

    /// Starts one streaming round.
    async fn start_stream(&self, req: ProviderRequest)
    -> Result<ProviderStreamHandle, ProviderError>;
}
