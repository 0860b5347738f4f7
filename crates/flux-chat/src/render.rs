//! Plain-text rendering of the transcript and of tool visuals.

use std::fmt::Write as _;

use flux_core::{
    HeroProfile, MarketData, OwnedCard, PerformancePoint, PriceEntry, Role, StarSwing, ToolState,
    ToolVisual, TournamentScore, TranscriptView, Turn,
};

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const WEI_PER_ETH: f64 = 1e18;

/// Renders every visible turn in order.
pub fn render_transcript(view: &TranscriptView<'_>) -> String {
    render_from(view, 0)
}

/// Renders the visible turns from index `start` on.
pub fn render_from(view: &TranscriptView<'_>, start: usize) -> String {
    let mut out = String::new();
    for turn in view.turns.get(start..).unwrap_or_default() {
        out.push_str(&render_turn(view, turn));
    }
    out
}

/// Renders one turn: speaker line, then visuals or pending-call markers,
/// then the failure indicator if the exchange failed.
pub fn render_turn(view: &TranscriptView<'_>, turn: &Turn) -> String {
    let mut out = String::new();
    let speaker = match turn.role {
        Role::User => "you",
        Role::Assistant => "flux",
    };
    let completed = view.shows_tool_visuals(turn);
    let marker = if completed || turn.is_user() { "" } else { " …" };
    let _ = writeln!(out, "{speaker}> {}{marker}", turn.content.trim_end());

    for invocation in &turn.tool_invocations {
        if !completed {
            if invocation.state == ToolState::Call {
                let _ = writeln!(out, "  [calling {}]", invocation.tool_name);
            }
            continue;
        }
        if let Some(text) = ToolVisual::from_invocation(invocation).and_then(|v| render_visual(&v))
        {
            for line in text.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
    }

    if let Some(message) = view.failure(turn) {
        let _ = writeln!(out, "  ! response failed: {message}");
    }
    out
}

/// Text panel for a tool visual. `Unsupported` renders nothing.
pub fn render_visual(visual: &ToolVisual) -> Option<String> {
    match visual {
        ToolVisual::HeroProfile(hero) => Some(hero_profile(hero)),
        ToolVisual::PerformanceChart(points) => Some(performance_chart(points)),
        ToolVisual::MarketData(data) => Some(market_data(data)),
        ToolVisual::TournamentScores(scores) => Some(tournament_scores(scores)),
        ToolVisual::StarSwings(swings) => Some(star_swings(swings)),
        ToolVisual::Inventory(cards) => Some(inventory(cards)),
        ToolVisual::ToolError { tool_name, message } => {
            Some(format!("[{tool_name}] unavailable: {message}"))
        }
        ToolVisual::Malformed { tool_name, .. } => {
            Some(format!("[{tool_name}] returned data that could not be displayed"))
        }
        ToolVisual::Unsupported { .. } => None,
    }
}

fn hero_profile(hero: &HeroProfile) -> String {
    let mut out = String::new();
    let stars = "★".repeat(hero.stars.min(10) as usize);
    let _ = writeln!(out, "┌ {} (@{}) {stars}", hero.name, hero.handle);
    let _ = writeln!(out, "│ followers: {}", hero.followers_count);
    let _ = write!(out, "└ status: {}", hero.status);
    out
}

fn performance_chart(points: &[PerformancePoint]) -> String {
    if points.is_empty() {
        return "performance: no data".to_string();
    }
    let scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    let first = &points[0];
    let last = &points[points.len() - 1];
    format!(
        "performance {} .. {}\n{}  last {:.1}",
        first.date,
        last.date,
        sparkline(&scores),
        last.score
    )
}

fn market_data(data: &MarketData) -> String {
    let mut out = String::new();
    let title = if data.name.is_empty() { &data.hero_id } else { &data.name };
    let _ = writeln!(out, "market: {title}");
    let _ = writeln!(
        out,
        "  volume {}  last sale {}",
        format_eth(data.volume),
        format_eth(data.last_sale)
    );
    price_table(&mut out, "floor prices", &data.floor_prices);
    price_table(&mut out, "highest bids", &data.highest_bids);
    if !data.card_supplies.is_empty() {
        let _ = writeln!(out, "  supply");
        for supply in &data.card_supplies {
            let _ = writeln!(
                out,
                "    {:<10} {:>5} / {:<5} burnt {}",
                supply.rarity, supply.amount, supply.total, supply.burnt
            );
        }
    }
    out.trim_end().to_string()
}

fn price_table(out: &mut String, title: &str, entries: &[PriceEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {title}");
    for entry in entries {
        let price = entry.price.map_or_else(|| "N/A".to_string(), format_eth);
        let _ = writeln!(out, "    {:<10} {price:>16}", entry.rarity);
    }
}

fn tournament_scores(scores: &[TournamentScore]) -> String {
    if scores.is_empty() {
        return "tournament scores: no data".to_string();
    }
    let mut ordered: Vec<&TournamentScore> = scores.iter().collect();
    ordered.sort_by_key(|s| s.index);
    let values: Vec<f64> = ordered.iter().map(|s| s.score).collect();
    let best = values.iter().copied().fold(f64::MIN, f64::max);
    format!(
        "tournament scores ({} tournaments)\n{}  best {best:.1}",
        ordered.len(),
        sparkline(&values)
    )
}

fn star_swings(swings: &[StarSwing]) -> String {
    let mut out = String::from("predicted star swings");
    for swing in swings {
        let sign = if swing.swing >= 0.0 { "+" } else { "" };
        let _ = write!(out, "\n  {:<20} {sign}{}", swing.hero, swing.swing);
    }
    out
}

fn inventory(cards: &[OwnedCard]) -> String {
    if cards.is_empty() {
        return "inventory: no cards".to_string();
    }
    let mut out = format!("inventory ({} cards)", cards.len());
    for card in cards {
        let _ = write!(
            out,
            "\n  #{:<8} hero {:<10} rarity {} season {}",
            card.token_id, card.hero_id, card.rarity, card.season
        );
    }
    out
}

fn format_eth(wei: f64) -> String {
    format!("{:.4} ETH", wei / WEI_PER_ETH)
}

fn sparkline(values: &[f64]) -> String {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                return SPARK_BARS[SPARK_BARS.len() / 2];
            }
            let slot = ((v - min) / span * (SPARK_BARS.len() - 1) as f64).round() as usize;
            SPARK_BARS[slot.min(SPARK_BARS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_core::{AggregatorConfig, Fragment, LiveAggregator, ToolInvocation};
    use serde_json::json;

    fn hero_result() -> ToolInvocation {
        ToolInvocation::call("a", "getHero", json!({"heroId": "7"})).resolve(json!({
            "name": "Makesy",
            "handle": "0xMakesy",
            "followers_count": 1200,
            "stars": 3,
            "status": "active"
        }))
    }

    #[test]
    fn streaming_turn_hides_visuals_and_shows_pending_calls() {
        let mut agg = LiveAggregator::new(AggregatorConfig::default());
        agg.push(Fragment::user("u", "show hero 7"));
        agg.push(Fragment::assistant("a", "").with_tool(ToolInvocation::call(
            "a",
            "getHero",
            json!({"heroId": "7"}),
        )));
        let text = render_transcript(&agg.view());
        assert!(text.contains("you> show hero 7"));
        assert!(text.contains("[calling getHero]"));
        assert!(!text.contains("Makesy"));
    }

    #[test]
    fn completed_turn_renders_hero_profile() {
        let mut agg = LiveAggregator::new(AggregatorConfig::default());
        agg.push(Fragment::user("u", "show hero 7"));
        agg.push(Fragment::assistant("a", "Here he is").with_tool(hero_result()));
        agg.finish();
        let text = render_transcript(&agg.view());
        assert!(text.contains("flux> Here he is\n"));
        assert!(text.contains("Makesy (@0xMakesy) ★★★"));
        assert!(text.contains("followers: 1200"));
    }

    #[test]
    fn failed_exchange_shows_indicator() {
        let mut agg = LiveAggregator::new(AggregatorConfig::default());
        agg.push(Fragment::user("u", "hi"));
        agg.push(Fragment::assistant("a", "Hel"));
        agg.fail("transport failure (openai): reset");
        let text = render_transcript(&agg.view());
        assert!(text.contains("flux> Hel …"));
        assert!(text.contains("! response failed: transport failure (openai): reset"));
    }

    #[test]
    fn unsupported_visual_renders_nothing() {
        let visual = ToolVisual::Unsupported {
            tool_name: "listHeroes".into(),
        };
        assert_eq!(render_visual(&visual), None);
    }

    #[test]
    fn market_prices_are_shown_in_eth() {
        let visual = ToolVisual::MarketData(MarketData {
            name: "Makesy".into(),
            floor_prices: vec![
                PriceEntry {
                    rarity: "common".into(),
                    price: Some(25e15),
                },
                PriceEntry {
                    rarity: "legendary".into(),
                    price: None,
                },
            ],
            volume: 1e18,
            ..MarketData::default()
        });
        let text = render_visual(&visual).expect("panel");
        assert!(text.contains("volume 1.0000 ETH"));
        assert!(text.contains("0.0250 ETH"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn star_swings_carry_sign() {
        let text = star_swings(&[
            StarSwing {
                hero: "Makesy".into(),
                swing: 1.5,
            },
            StarSwing {
                hero: "Cobie".into(),
                swing: -2.0,
            },
        ]);
        assert!(text.contains("+1.5"));
        assert!(text.contains("-2"));
    }

    #[test]
    fn sparkline_spans_lowest_to_highest_bar() {
        assert_eq!(sparkline(&[1.0, 5.0, 9.0]), "▁▅█");
        assert_eq!(sparkline(&[3.0, 3.0]), "▅▅");
    }
}
