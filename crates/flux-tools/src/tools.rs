use std::sync::Arc;

use flux_ai_harness::{Tool, ToolError, ToolRegistry};
use tracing::debug;

use crate::api::HeroApi;

/// How a tool turns its arguments into a data-service request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    /// Fixed path, no arguments.
    List(&'static str),
    /// `{prefix}{id}/` where `id` comes from the named argument.
    ById {
        prefix: &'static str,
        arg: &'static str,
    },
    /// Fixed path with the named argument sent as a query parameter.
    Search {
        path: &'static str,
        arg: &'static str,
        param: &'static str,
    },
    /// Full card list filtered by the card's `owner` field.
    CardsByOwner { arg: &'static str },
}

impl Endpoint {
    fn required_arg(&self) -> Option<&'static str> {
        match self {
            Self::List(_) => None,
            Self::ById { arg, .. } | Self::Search { arg, .. } | Self::CardsByOwner { arg } => {
                Some(arg)
            }
        }
    }
}

struct ToolDef {
    name: &'static str,
    description: &'static str,
    endpoint: Endpoint,
}

const HERO_TOOLS: [ToolDef; 12] = [
    ToolDef {
        name: "listHeroes",
        description: "List all heroes",
        endpoint: Endpoint::List("/heroes/"),
    },
    ToolDef {
        name: "getHero",
        description: "Get detailed information about a specific hero",
        endpoint: Endpoint::ById {
            prefix: "/heroes/",
            arg: "heroId",
        },
    },
    ToolDef {
        name: "listCards",
        description: "List all cards",
        endpoint: Endpoint::List("/cards/"),
    },
    ToolDef {
        name: "getCard",
        description: "Get detailed information about a specific card",
        endpoint: Endpoint::ById {
            prefix: "/cards/",
            arg: "cardId",
        },
    },
    ToolDef {
        name: "getCardsByOwner",
        description: "List the cards owned by a wallet address",
        endpoint: Endpoint::CardsByOwner {
            arg: "ownerAddress",
        },
    },
    ToolDef {
        name: "listPlayers",
        description: "List all players",
        endpoint: Endpoint::List("/players/"),
    },
    ToolDef {
        name: "getPlayer",
        description: "Get detailed information about a specific player",
        endpoint: Endpoint::ById {
            prefix: "/players/",
            arg: "playerId",
        },
    },
    ToolDef {
        name: "getHeroPerformance",
        description: "Get performance data for a specific hero",
        endpoint: Endpoint::ById {
            prefix: "/hero-performance/",
            arg: "heroId",
        },
    },
    ToolDef {
        name: "getHeroMarketData",
        description: "Get market data for a specific hero",
        endpoint: Endpoint::ById {
            prefix: "/hero-market-data/",
            arg: "heroId",
        },
    },
    ToolDef {
        name: "getHeroTournamentScores",
        description: "Get tournament scores for a specific hero",
        endpoint: Endpoint::ById {
            prefix: "/hero-tournament-scores/",
            arg: "heroId",
        },
    },
    ToolDef {
        name: "predictStarSwings",
        description: "Predict star swings for heroes",
        endpoint: Endpoint::List("/predict-star-swings/"),
    },
    ToolDef {
        name: "searchHeroesByHandle",
        description: "Search heroes by Twitter handle",
        endpoint: Endpoint::Search {
            path: "/search-heroes-by-handle/",
            arg: "handle",
            param: "handle",
        },
    },
];

/// One data-service operation exposed to the model.
pub struct HeroTool {
    name: &'static str,
    description: &'static str,
    endpoint: Endpoint,
    api: Arc<dyn HeroApi>,
}

impl HeroTool {
    async fn fetch(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let api_err = |err: crate::api::HeroApiError| ToolError::execution(self.name, err.to_string());
        match self.endpoint {
            Endpoint::List(path) => self.api.get_json(path, &[]).await.map_err(api_err),
            Endpoint::ById { prefix, arg } => {
                let id = path_segment_arg(self.name, args, arg)?;
                let path = format!("{prefix}{id}/");
                self.api.get_json(&path, &[]).await.map_err(api_err)
            }
            Endpoint::Search { path, arg, param } => {
                let value = required_string_arg(self.name, args, arg)?;
                self.api
                    .get_json(path, &[(param, value)])
                    .await
                    .map_err(api_err)
            }
            Endpoint::CardsByOwner { arg } => {
                let owner = required_string_arg(self.name, args, arg)?;
                let cards = self.api.get_json("/cards/", &[]).await.map_err(api_err)?;
                let Some(cards) = cards.as_array() else {
                    return Err(ToolError::execution(
                        self.name,
                        "card list response is not an array",
                    ));
                };
                let owned: Vec<serde_json::Value> = cards
                    .iter()
                    .filter(|card| card.get("owner").and_then(|v| v.as_str()) == Some(owner))
                    .cloned()
                    .collect();
                debug!(
                    event = "tool.cards_by_owner",
                    total = cards.len(),
                    owned = owned.len()
                );
                Ok(serde_json::Value::Array(owned))
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for HeroTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> serde_json::Value {
        match self.endpoint.required_arg() {
            Some(arg) => serde_json::json!({
                "type": "object",
                "properties": { arg: { "type": "string" } },
                "required": [arg],
                "additionalProperties": false,
            }),
            None => serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false,
            }),
        }
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.fetch(&args).await
    }
}

fn required_string_arg<'a>(
    tool: &str,
    args: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ToolError::invalid_args(tool, format!("`{key}` must be a non-empty string")))
}

/// Like [`required_string_arg`], and rejects values that would change the
/// request path.
fn path_segment_arg<'a>(
    tool: &str,
    args: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    let value = required_string_arg(tool, args, key)?;
    if value.contains(['/', '?', '#']) || value.contains(char::is_whitespace) {
        return Err(ToolError::invalid_args(
            tool,
            format!("`{key}` must be a single path segment"),
        ));
    }
    Ok(value)
}

/// Registers every data-service tool against `api`.
pub fn register_hero_tools(
    registry: &mut ToolRegistry,
    api: Arc<dyn HeroApi>,
) -> Result<(), ToolError> {
    for def in &HERO_TOOLS {
        registry.register(Arc::new(HeroTool {
            name: def.name,
            description: def.description,
            endpoint: def.endpoint,
            api: Arc::clone(&api),
        }))?;
    }
    debug!(event = "tool.registered", count = HERO_TOOLS.len());
    Ok(())
}

/// Builds a registry holding only the data-service tools.
pub fn hero_tool_registry(api: Arc<dyn HeroApi>) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    register_hero_tools(&mut registry, api)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HeroApiError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait::async_trait]
    impl HeroApi for MockApi {
        async fn get_json(
            &self,
            path: &str,
            query: &[(&str, &str)],
        ) -> Result<serde_json::Value, HeroApiError> {
            self.calls.lock().expect("calls").push((
                path.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            match path {
                "/cards/" => Ok(serde_json::json!([
                    {"id": "c1", "owner": "0xabc", "hero": "Makesy"},
                    {"id": "c2", "owner": "0xdef", "hero": "Cobie"},
                    {"id": "c3", "owner": "0xabc", "hero": "Hsaka"},
                ])),
                "/heroes/missing/" => Err(HeroApiError::Status {
                    path: path.to_string(),
                    status: 404,
                    body: "not found".into(),
                }),
                _ => Ok(serde_json::json!({"path": path})),
            }
        }
    }

    fn registry_with(api: Arc<MockApi>) -> ToolRegistry {
        hero_tool_registry(api).expect("registry")
    }

    #[test]
    fn registers_every_data_service_tool_once() {
        let registry = registry_with(Arc::new(MockApi::default()));
        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "listHeroes",
                "getHero",
                "listCards",
                "getCard",
                "getCardsByOwner",
                "listPlayers",
                "getPlayer",
                "getHeroPerformance",
                "getHeroMarketData",
                "getHeroTournamentScores",
                "predictStarSwings",
                "searchHeroesByHandle",
            ]
        );

        let mut again = registry.clone();
        assert!(matches!(
            register_hero_tools(&mut again, Arc::new(MockApi::default())),
            Err(ToolError::Duplicate(_))
        ));
    }

    #[test]
    fn parameter_schema_lists_required_argument() {
        let registry = registry_with(Arc::new(MockApi::default()));
        let specs = registry.specs();
        let get_hero = specs.iter().find(|s| s.name == "getHero").expect("getHero");
        assert_eq!(get_hero.parameters["required"], serde_json::json!(["heroId"]));
        assert_eq!(
            get_hero.parameters["properties"]["heroId"]["type"],
            "string"
        );
        let list = specs
            .iter()
            .find(|s| s.name == "listHeroes")
            .expect("listHeroes");
        assert!(list.parameters.get("required").is_none());
    }

    #[tokio::test]
    async fn by_id_tools_build_trailing_slash_paths() {
        let api = Arc::new(MockApi::default());
        let registry = registry_with(api.clone());
        let value = registry
            .execute("getHeroMarketData", serde_json::json!({"heroId": "42"}))
            .await
            .expect("market data");
        assert_eq!(value["path"], "/hero-market-data/42/");
        registry
            .execute("getPlayer", serde_json::json!({"playerId": "p9"}))
            .await
            .expect("player");
        let calls = api.calls.lock().expect("calls");
        assert_eq!(calls[1].0, "/players/p9/");
    }

    #[tokio::test]
    async fn search_sends_handle_as_query_parameter() {
        let api = Arc::new(MockApi::default());
        let registry = registry_with(api.clone());
        registry
            .execute("searchHeroesByHandle", serde_json::json!({"handle": "cobie"}))
            .await
            .expect("search");
        let calls = api.calls.lock().expect("calls");
        assert_eq!(calls[0].0, "/search-heroes-by-handle/");
        assert_eq!(calls[0].1, vec![("handle".to_string(), "cobie".to_string())]);
    }

    #[tokio::test]
    async fn cards_by_owner_filters_the_card_list() {
        let registry = registry_with(Arc::new(MockApi::default()));
        let cards = registry
            .execute("getCardsByOwner", serde_json::json!({"ownerAddress": "0xabc"}))
            .await
            .expect("cards");
        let ids: Vec<&str> = cards
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|c| c["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn missing_or_unsafe_arguments_are_rejected() {
        let registry = registry_with(Arc::new(MockApi::default()));
        let missing = registry.execute("getHero", serde_json::json!({})).await;
        assert!(matches!(missing, Err(ToolError::InvalidArgs { .. })));
        let blank = registry
            .execute("getCard", serde_json::json!({"cardId": "  "}))
            .await;
        assert!(matches!(blank, Err(ToolError::InvalidArgs { .. })));
        let traversal = registry
            .execute("getHero", serde_json::json!({"heroId": "../admin"}))
            .await;
        assert!(matches!(traversal, Err(ToolError::InvalidArgs { .. })));
    }

    #[tokio::test]
    async fn service_errors_become_error_results() {
        let registry = registry_with(Arc::new(MockApi::default()));
        let payload = registry
            .execute_to_payload("getHero", serde_json::json!({"heroId": "missing"}))
            .await;
        let message = payload["error"].as_str().expect("error text");
        assert!(message.starts_with("getHero failed"));
        assert!(message.contains("status=404"));
    }
}
