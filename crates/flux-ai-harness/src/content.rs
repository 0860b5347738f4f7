use flux_core::{Fragment, HistoryEntry, Role, ToolInvocation};

/// Conversation item replayed to a provider.
///
/// Tool rounds within a run are replayed as call/result pairs so the model
/// sees what it asked for and what came back.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum ProviderMessage {
    User(String),
    Assistant(String),
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        output: serde_json::Value,
    },
}

impl From<HistoryEntry> for ProviderMessage {
    fn from(entry: HistoryEntry) -> Self {
        match entry.role {
            Role::User => Self::User(entry.content),
            Role::Assistant => Self::Assistant(entry.content),
        }
    }
}

/// Final output of a completed run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct RunOutput {
    /// Final snapshot of every fragment the run produced, user message first.
    pub fragments: Vec<Fragment>,
    /// Vendor-specific finish reason when available (for example `completed`).
    pub finish_reason: Option<String>,
}

impl RunOutput {
    /// Concatenates assistant text in order and ignores tool data.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            if fragment.role == Role::Assistant {
                out.push_str(&fragment.content);
            }
        }
        out
    }

    /// Id of the last assistant message, the one the completion signal closes.
    pub fn last_message_id(&self) -> Option<&str> {
        self.fragments
            .iter()
            .rev()
            .find(|f| f.role == Role::Assistant)
            .map(|f| f.id.as_str())
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.fragments.iter().flat_map(|f| f.tool_invocations.iter())
    }
}
