use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::fragment::Fragment;

/// Environment variable holding a comma-separated visual tool allow-list.
pub const VISUAL_TOOLS_ENV: &str = "FLUX_VISUAL_TOOLS";

/// Tools with a dedicated visual. Tool-only fragments for other tools are
/// dropped when a turn is finalized.
pub const DEFAULT_VISUAL_TOOLS: [&str; 6] = [
    "getHero",
    "getHeroPerformance",
    "getHeroMarketData",
    "getHeroTournamentScores",
    "predictStarSwings",
    "getCardsByOwner",
];

/// Live aggregator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Tool names whose tool-only fragments survive finalization.
    #[serde(default = "default_visual_tools")]
    pub visual_tools: BTreeSet<String>,
}

fn default_visual_tools() -> BTreeSet<String> {
    DEFAULT_VISUAL_TOOLS.iter().map(|s| s.to_string()).collect()
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            visual_tools: default_visual_tools(),
        }
    }
}

impl AggregatorConfig {
    /// Replaces the allow-list.
    pub fn visual_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visual_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Reads `FLUX_VISUAL_TOOLS`, falling back to the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(VISUAL_TOOLS_ENV) {
            Ok(raw) => Self::default().with_visual_tools_list(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses a comma-separated allow-list. An empty list is rejected.
    pub fn with_visual_tools_list(self, raw: &str) -> Result<Self, ConfigError> {
        let tools: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if tools.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: VISUAL_TOOLS_ENV.into(),
                message: "expected at least one tool name".into(),
            });
        }
        Ok(self.visual_tools(tools))
    }

    pub fn is_visual_tool(&self, tool_name: &str) -> bool {
        self.visual_tools.contains(tool_name)
    }

    /// Relevance filter applied at finalization. Fragments with text always
    /// pass; tool-only fragments pass when their first tool is allow-listed.
    pub fn is_relevant(&self, fragment: &Fragment) -> bool {
        if !fragment.is_tool_only() {
            return true;
        }
        fragment
            .tool_invocations
            .first()
            .is_some_and(|invocation| self.is_visual_tool(&invocation.tool_name))
    }
}
