//! Typed tool results for the render layer.
//!
//! Each visual tool maps to exactly one variant. Anything else falls through
//! to [`ToolVisual::Unsupported`], which renders nothing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fragment::{ToolInvocation, ToolState};

/// Visual families, keyed by tool name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum VisualKind {
    HeroProfile,
    PerformanceChart,
    MarketData,
    TournamentScores,
    StarSwings,
    Inventory,
}

impl VisualKind {
    pub const ALL: [VisualKind; 6] = [
        Self::HeroProfile,
        Self::PerformanceChart,
        Self::MarketData,
        Self::TournamentScores,
        Self::StarSwings,
        Self::Inventory,
    ];

    pub fn for_tool(tool_name: &str) -> Option<Self> {
        match tool_name {
            "getHero" => Some(Self::HeroProfile),
            "getHeroPerformance" => Some(Self::PerformanceChart),
            "getHeroMarketData" => Some(Self::MarketData),
            "getHeroTournamentScores" => Some(Self::TournamentScores),
            "predictStarSwings" => Some(Self::StarSwings),
            "getCardsByOwner" => Some(Self::Inventory),
            _ => None,
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::HeroProfile => "getHero",
            Self::PerformanceChart => "getHeroPerformance",
            Self::MarketData => "getHeroMarketData",
            Self::TournamentScores => "getHeroTournamentScores",
            Self::StarSwings => "predictStarSwings",
            Self::Inventory => "getCardsByOwner",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeroProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub date: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub rarity: String,
    /// Wei; `None` when nothing is listed.
    pub price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSupply {
    pub rarity: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub burnt: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub hero_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub floor_prices: Vec<PriceEntry>,
    #[serde(default)]
    pub highest_bids: Vec<PriceEntry>,
    #[serde(default)]
    pub card_supplies: Vec<CardSupply>,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub last_sale: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentScore {
    pub index: i64,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarSwing {
    pub hero: String,
    pub swing: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnedCard {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub hero_id: String,
    #[serde(default)]
    pub rarity: i64,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub season: i64,
    #[serde(default)]
    pub picture: String,
}

/// Renderable payload of a resolved tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolVisual {
    HeroProfile(HeroProfile),
    PerformanceChart(Vec<PerformancePoint>),
    MarketData(MarketData),
    TournamentScores(Vec<TournamentScore>),
    StarSwings(Vec<StarSwing>),
    Inventory(Vec<OwnedCard>),
    /// The tool ran but reported an error payload.
    ToolError { tool_name: String, message: String },
    /// Result did not match the shape expected for its tool.
    Malformed { tool_name: String, message: String },
    /// No visual exists for this tool.
    Unsupported { tool_name: String },
}

impl ToolVisual {
    /// Builds the visual for a resolved invocation; `None` while the call is
    /// still pending.
    pub fn from_invocation(invocation: &ToolInvocation) -> Option<Self> {
        if invocation.state != ToolState::Result {
            return None;
        }
        let tool_name = invocation.tool_name.clone();
        let Some(kind) = VisualKind::for_tool(&tool_name) else {
            return Some(Self::Unsupported { tool_name });
        };
        let payload = invocation
            .result
            .clone()
            .unwrap_or(serde_json::Value::Null);
        if let Some(message) = error_message(&payload) {
            return Some(Self::ToolError { tool_name, message });
        }

        let parsed = match kind {
            VisualKind::HeroProfile => parse(payload).map(Self::HeroProfile),
            VisualKind::PerformanceChart => parse(payload).map(Self::PerformanceChart),
            VisualKind::MarketData => parse(payload).map(Self::MarketData),
            VisualKind::TournamentScores => parse(payload).map(Self::TournamentScores),
            VisualKind::StarSwings => parse(payload).map(Self::StarSwings),
            VisualKind::Inventory => parse(payload).map(Self::Inventory),
        };
        Some(parsed.unwrap_or_else(|err| Self::Malformed {
            tool_name,
            message: err.to_string(),
        }))
    }
}

fn parse<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

fn error_message(payload: &serde_json::Value) -> Option<String> {
    let error = payload.as_object()?.get("error")?;
    Some(
        error
            .as_str()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VISUAL_TOOLS;
    use serde_json::json;

    fn resolved(tool: &str, result: serde_json::Value) -> ToolInvocation {
        ToolInvocation::call("c", tool, json!({})).resolve(result)
    }

    #[test]
    fn mapping_is_total_over_default_visual_tools() {
        for name in DEFAULT_VISUAL_TOOLS {
            let kind = VisualKind::for_tool(name).expect("visual tool");
            assert_eq!(kind.tool_name(), name);
        }
        assert_eq!(VisualKind::ALL.len(), DEFAULT_VISUAL_TOOLS.len());
    }

    #[test]
    fn pending_call_has_no_visual() {
        let call = ToolInvocation::call("c", "getHero", json!({"heroId": "1"}));
        assert_eq!(ToolVisual::from_invocation(&call), None);
    }

    #[test]
    fn hero_result_parses_into_profile() {
        let visual = ToolVisual::from_invocation(&resolved(
            "getHero",
            json!({"name": "Makesy", "handle": "0xMakesy", "followers_count": 1200, "stars": 3, "status": "active"}),
        ));
        match visual {
            Some(ToolVisual::HeroProfile(hero)) => {
                assert_eq!(hero.handle, "0xMakesy");
                assert_eq!(hero.stars, 3);
            }
            other => panic!("unexpected visual: {other:?}"),
        }
    }

    #[test]
    fn error_payload_becomes_tool_error() {
        let visual = ToolVisual::from_invocation(&resolved(
            "getHeroMarketData",
            json!({"error": "upstream 500"}),
        ));
        assert_eq!(
            visual,
            Some(ToolVisual::ToolError {
                tool_name: "getHeroMarketData".into(),
                message: "upstream 500".into(),
            })
        );
    }

    #[test]
    fn wrong_shape_is_malformed_and_unknown_is_unsupported() {
        assert!(matches!(
            ToolVisual::from_invocation(&resolved("predictStarSwings", json!("nope"))),
            Some(ToolVisual::Malformed { .. })
        ));
        assert!(matches!(
            ToolVisual::from_invocation(&resolved("listHeroes", json!([]))),
            Some(ToolVisual::Unsupported { .. })
        ));
    }
}
