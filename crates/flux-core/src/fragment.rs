use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AggregationError;

/// Author of a fragment or turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a wire role name. Unknown names return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a tool invocation: requested (`Call`) or resolved (`Result`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Call,
    Result,
}

/// One tool call the model asked for, optionally with its resolved payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolInvocation {
    /// Creates a requested invocation.
    pub fn call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            state: ToolState::Call,
            args: Some(args),
            result: None,
        }
    }

    /// Upgrades this invocation to the resolved state, keeping its args.
    pub fn resolve(mut self, result: serde_json::Value) -> Self {
        self.state = ToolState::Result;
        self.result = Some(result);
        self
    }

    pub fn is_result(&self) -> bool {
        self.state == ToolState::Result
    }
}

/// One validated element of the incoming message stream.
///
/// The same `id` is delivered many times while a message slot grows; each
/// delivery is a full snapshot of that slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl Fragment {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn with_tool(mut self, invocation: ToolInvocation) -> Self {
        self.tool_invocations.push(invocation);
        self
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// True when the fragment carries tool data but no text.
    pub fn is_tool_only(&self) -> bool {
        self.content.is_empty() && !self.tool_invocations.is_empty()
    }
}

/// Unvalidated wire form of a [`Fragment`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFragment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
}

impl TryFrom<RawFragment> for Fragment {
    type Error = AggregationError;

    fn try_from(raw: RawFragment) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AggregationError::malformed(None, "missing id"))?;
        let role_name = raw
            .role
            .ok_or_else(|| AggregationError::malformed(Some(&id), "missing role"))?;
        let role = Role::parse(&role_name).ok_or_else(|| {
            AggregationError::malformed(Some(&id), format!("unknown role `{role_name}`"))
        })?;
        Ok(Self {
            id,
            role,
            content: raw.content.unwrap_or_default(),
            tool_invocations: raw.tool_invocations.unwrap_or_default(),
        })
    }
}
