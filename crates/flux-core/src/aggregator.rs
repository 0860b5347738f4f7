//! Incremental driver over the fragment stream.
//!
//! The aggregator keeps one record per message slot (a newer snapshot of an
//! id replaces the older one) and splits the record into a folded prefix,
//! whose turns are settled, and a tail belonging to the exchange still in
//! flight. While the tail streams it is shown fragment-by-fragment; the
//! completion signal groups it into final turns.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::fragment::{Fragment, RawFragment, Role};
use crate::grouping::group;
use crate::turn::Turn;

/// Stateful projection of the fragment stream into renderable turns.
#[derive(Debug, Default)]
pub struct LiveAggregator {
    config: AggregatorConfig,
    fragments: Vec<Fragment>,
    /// `fragments[..folded]` belong to closed exchanges.
    folded: usize,
    visible: Vec<Turn>,
    /// `visible[..settled]` are final or frozen.
    settled: usize,
    completed: BTreeSet<String>,
    failures: BTreeMap<String, String>,
}

impl LiveAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Validates and records a wire fragment. Malformed input is logged and
    /// dropped; returns whether the fragment was accepted.
    pub fn push_raw(&mut self, raw: RawFragment) -> bool {
        match Fragment::try_from(raw) {
            Ok(fragment) => self.push(fragment),
            Err(err) => {
                warn!(event = "aggregator.fragment_dropped", error = %err, "dropping malformed fragment");
                false
            }
        }
    }

    /// Records a fragment snapshot and recomputes the streaming view.
    ///
    /// Returns `false` when the fragment targets a slot of an exchange that
    /// was already finalized, failed or cancelled; such late snapshots are
    /// ignored.
    pub fn push(&mut self, fragment: Fragment) -> bool {
        match self.fragments.iter().position(|f| f.id == fragment.id) {
            Some(pos) if pos < self.folded => {
                warn!(
                    event = "aggregator.late_fragment",
                    fragment_id = %fragment.id,
                    "ignoring snapshot for a closed exchange"
                );
                return false;
            }
            Some(pos) => self.fragments[pos] = fragment,
            None => self.fragments.push(fragment),
        }
        self.refresh_live();
        true
    }

    /// Completion signal: groups the in-flight tail into final turns.
    pub fn finish(&mut self) {
        if !self.is_streaming() {
            debug!(event = "aggregator.finish_noop", "completion signal with nothing in flight");
            return;
        }
        self.finalize();
    }

    /// Cancellation force-finalizes whatever has arrived so far, so the
    /// partial turn is marked complete rather than left streaming forever.
    pub fn cancel(&mut self) {
        if !self.is_streaming() {
            return;
        }
        info!(event = "aggregator.cancelled", pending = self.fragments.len() - self.folded);
        self.finalize();
    }

    /// Records an upstream failure for the exchange in flight. Its live
    /// turns are frozen incomplete and carry the failure message.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        let key = self
            .visible
            .get(self.settled..)
            .and_then(|live| live.last())
            .map(|turn| turn.group_id.clone())
            .or_else(|| self.fragments.last().map(|f| f.id.clone()));
        warn!(
            event = "aggregator.upstream_failed",
            group_id = key.as_deref().unwrap_or("<none>"),
            error = %message
        );
        if let Some(key) = key {
            self.failures.insert(key, message);
        }
        self.settled = self.visible.len();
        self.folded = self.fragments.len();
    }

    /// Turns to render, in conversation order.
    pub fn visible_turns(&self) -> &[Turn] {
        &self.visible
    }

    /// Group ids whose turns are final. Only ever grows.
    pub fn completed_ids(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn is_completed(&self, group_id: &str) -> bool {
        self.completed.contains(group_id)
    }

    pub fn failure_for(&self, group_id: &str) -> Option<&str> {
        self.failures.get(group_id).map(String::as_str)
    }

    /// True while fragments have arrived that no signal has closed yet.
    pub fn is_streaming(&self) -> bool {
        self.folded < self.fragments.len()
    }

    /// Turns of closed exchanges, for replaying history upstream.
    pub fn settled_turns(&self) -> &[Turn] {
        &self.visible[..self.settled]
    }

    /// Borrowed snapshot handed to the render layer.
    pub fn view(&self) -> TranscriptView<'_> {
        TranscriptView {
            turns: &self.visible,
            completed: &self.completed,
            failures: &self.failures,
        }
    }

    fn refresh_live(&mut self) {
        let tail = &self.fragments[self.folded..];
        let Some(newest) = tail.last().map(|f| f.id.as_str()) else {
            return;
        };
        let order: HashMap<&str, usize> = tail
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.id.as_str(), idx))
            .collect();
        let live = &mut self.visible;
        let live_start = self.settled;

        for (idx, fragment) in tail.iter().enumerate() {
            let keep = fragment.role == Role::User
                || fragment.has_content()
                || fragment.id == newest;
            if !keep {
                continue;
            }
            match live[live_start..]
                .iter_mut()
                .find(|turn| turn.group_id == fragment.id)
            {
                Some(turn) => turn.refresh_from(fragment),
                None => {
                    let at = live[live_start..]
                        .iter()
                        .position(|turn| order.get(turn.group_id.as_str()).is_some_and(|&i| i > idx))
                        .map_or(live.len(), |offset| live_start + offset);
                    live.insert(at, Turn::from_fragment(fragment));
                }
            }
        }

        // Only the newest assistant slot may render without text.
        let mut idx = live_start;
        while idx < live.len() {
            let turn = &live[idx];
            if !turn.is_user() && !turn.has_content() && turn.group_id != newest {
                live.remove(idx);
            } else {
                idx += 1;
            }
        }
        debug!(
            event = "aggregator.streaming_view",
            newest = newest,
            live_turns = live.len() - live_start
        );
    }

    fn finalize(&mut self) {
        let tail = &self.fragments[self.folded..];
        let relevant: Vec<Fragment> = tail
            .iter()
            .filter(|f| self.config.is_relevant(f))
            .cloned()
            .collect();
        let dropped = tail.len() - relevant.len();

        let mut turns = group(&relevant);
        drop_superseded(&mut turns);
        for turn in &mut turns {
            turn.is_completed = true;
            self.completed.insert(turn.group_id.clone());
        }
        info!(
            event = "aggregator.finalized",
            turns = turns.len(),
            dropped_tool_fragments = dropped,
            completed_total = self.completed.len()
        );

        self.visible.truncate(self.settled);
        self.visible.extend(turns);
        self.settled = self.visible.len();
        self.folded = self.fragments.len();
    }
}

/// Keeps only the most recent of assistant turns with identical text,
/// ignoring surrounding whitespace.
fn drop_superseded(turns: &mut Vec<Turn>) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut keep = vec![true; turns.len()];
    for (idx, turn) in turns.iter().enumerate().rev() {
        if turn.is_user() || !turn.has_content() {
            continue;
        }
        if !seen.insert(turn.content.trim()) {
            keep[idx] = false;
        }
    }
    let mut flags = keep.into_iter();
    turns.retain(|_| flags.next().unwrap_or(true));
}

/// Read-only view of the transcript state for renderers.
#[derive(Clone, Copy, Debug)]
pub struct TranscriptView<'a> {
    pub turns: &'a [Turn],
    pub completed: &'a BTreeSet<String>,
    pub failures: &'a BTreeMap<String, String>,
}

impl TranscriptView<'_> {
    /// Tool visuals render only once the owning turn is final.
    pub fn shows_tool_visuals(&self, turn: &Turn) -> bool {
        self.completed.contains(&turn.group_id)
    }

    pub fn failure(&self, turn: &Turn) -> Option<&str> {
        self.failures.get(&turn.group_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::ToolInvocation;
    use serde_json::json;

    fn aggregator() -> LiveAggregator {
        LiveAggregator::new(AggregatorConfig::default())
    }

    fn contents(agg: &LiveAggregator) -> Vec<&str> {
        agg.visible_turns().iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn snapshots_of_one_slot_update_in_place() {
        let mut agg = aggregator();
        agg.push(Fragment::assistant("1", "Hello"));
        agg.push(Fragment::assistant("1", "Hello there"));
        assert_eq!(agg.visible_turns().len(), 1);
        let turn = &agg.visible_turns()[0];
        assert_eq!(turn.content, "Hello there");
        assert_eq!(turn.group_id, "1");
        assert!(!turn.is_completed);
        assert!(agg.is_streaming());
    }

    #[test]
    fn empty_placeholder_is_replaced_by_newer_content() {
        let mut agg = aggregator();
        agg.push(Fragment::user("u", "hi"));
        agg.push(Fragment::assistant("a1", ""));
        assert_eq!(contents(&agg), vec!["hi", ""]);

        agg.push(Fragment::assistant("a2", "Hey"));
        assert_eq!(contents(&agg), vec!["hi", "Hey"]);
    }

    #[test]
    fn at_most_one_empty_turn_while_streaming() {
        let mut agg = aggregator();
        agg.push(Fragment::user("u", "hi"));
        for id in ["a1", "a2", "a3"] {
            agg.push(Fragment::assistant(id, ""));
            let empties: Vec<_> = agg
                .visible_turns()
                .iter()
                .filter(|t| !t.has_content())
                .collect();
            assert_eq!(empties.len(), 1);
            assert_eq!(empties[0].group_id, id);
        }
    }

    #[test]
    fn late_content_on_earlier_slot_keeps_arrival_order() {
        let mut agg = aggregator();
        agg.push(Fragment::assistant("a1", ""));
        agg.push(Fragment::assistant("a2", "second"));
        agg.push(Fragment::assistant("a1", "first"));
        assert_eq!(contents(&agg), vec!["first", "second"]);
    }

    #[test]
    fn finish_merges_tail_and_marks_completed() {
        let mut agg = aggregator();
        agg.push(Fragment::user("u", "who is hero 7?"));
        agg.push(
            Fragment::assistant("1", "")
                .with_tool(ToolInvocation::call("a", "getHero", json!({"heroId": "7"}))),
        );
        agg.push(Fragment::assistant("2", "Here he is").with_tool(
            ToolInvocation::call("a", "getHero", json!({"heroId": "7"})).resolve(json!({"name": "M"})),
        ));
        agg.finish();

        let turns = agg.visible_turns();
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| t.is_completed));
        assert_eq!(turns[1].content, "Here he is");
        assert_eq!(turns[1].tool_invocations.len(), 1);
        assert!(agg.is_completed("2"));
        assert!(!agg.is_streaming());
    }

    #[test]
    fn finish_without_pending_fragments_is_noop() {
        let mut agg = aggregator();
        agg.finish();
        assert!(agg.visible_turns().is_empty());
        assert!(agg.completed_ids().is_empty());
    }

    #[test]
    fn cancel_force_finalizes_partial_turn() {
        let mut agg = aggregator();
        agg.push(Fragment::user("u", "hi"));
        agg.push(Fragment::assistant("a", "partial"));
        agg.cancel();
        assert!(agg.is_completed("a"));
        assert!(agg.visible_turns()[1].is_completed);
    }

    #[test]
    fn failure_freezes_incomplete_turn_with_indicator() {
        let mut agg = aggregator();
        agg.push(Fragment::user("u", "hi"));
        agg.push(Fragment::assistant("a", "partial"));
        agg.fail("transport failure (openai): reset");

        assert!(!agg.is_streaming());
        assert!(!agg.is_completed("a"));
        assert_eq!(
            agg.failure_for("a"),
            Some("transport failure (openai): reset")
        );
        assert!(!agg.push(Fragment::assistant("a", "partial and more")));
        assert_eq!(agg.visible_turns()[1].content, "partial");
    }

    #[test]
    fn malformed_raw_fragment_is_dropped() {
        let mut agg = aggregator();
        let accepted = agg.push_raw(RawFragment {
            id: None,
            role: Some("assistant".into()),
            content: Some("ghost".into()),
            tool_invocations: None,
        });
        assert!(!accepted);
        assert!(agg.visible_turns().is_empty());
    }

    #[test]
    fn drop_superseded_keeps_latest_duplicate() {
        let mut turns = vec![
            Turn::from_fragment(&Fragment::assistant("1", "same")),
            Turn::from_fragment(&Fragment::user("u", "same")),
            Turn::from_fragment(&Fragment::assistant("2", "same")),
        ];
        drop_superseded(&mut turns);
        let ids: Vec<_> = turns.iter().map(|t| t.group_id.as_str()).collect();
        assert_eq!(ids, vec!["u", "2"]);
    }

    #[test]
    fn drop_superseded_ignores_surrounding_whitespace() {
        let mut turns = vec![
            Turn::from_fragment(&Fragment::assistant("1", "Sure! ")),
            Turn::from_fragment(&Fragment::assistant("2", "Sure!")),
        ];
        drop_superseded(&mut turns);
        let ids: Vec<_> = turns.iter().map(|t| t.group_id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn empty_user_turn_stays_visible_while_answer_streams() {
        let mut agg = aggregator();
        assert!(agg.push_raw(RawFragment {
            id: Some("u".into()),
            role: Some("user".into()),
            content: Some(String::new()),
            tool_invocations: None,
        }));
        agg.push(Fragment::assistant("a", "hello"));

        let streaming: Vec<_> = agg
            .visible_turns()
            .iter()
            .map(|t| (t.role, t.content.clone()))
            .collect();
        agg.finish();
        let finished: Vec<_> = agg
            .visible_turns()
            .iter()
            .map(|t| (t.role, t.content.clone()))
            .collect();
        assert_eq!(
            streaming,
            vec![(Role::User, String::new()), (Role::Assistant, "hello".to_string())]
        );
        assert_eq!(streaming, finished);
    }

    #[test]
    fn view_gates_tool_visuals_on_completion() {
        let mut agg = aggregator();
        agg.push(Fragment::assistant("a", "text"));
        let turn = agg.visible_turns()[0].clone();
        assert!(!agg.view().shows_tool_visuals(&turn));
        agg.finish();
        let turn = agg.visible_turns()[0].clone();
        assert!(agg.view().shows_tool_visuals(&turn));
    }
}
