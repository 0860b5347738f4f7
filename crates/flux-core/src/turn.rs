use serde::{Deserialize, Serialize};

use crate::fragment::{Fragment, Role, ToolInvocation, ToolState};

/// Presentation-level unit of the conversation: one user message or one
/// merged assistant response with its tool invocations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    /// Id of the last fragment merged into this turn. Stable key for
    /// identity and completion tracking.
    pub group_id: String,
    pub is_completed: bool,
}

impl Turn {
    /// Starts a turn from a single fragment. User turns are complete on
    /// arrival; assistant turns wait for the completion signal.
    pub fn from_fragment(fragment: &Fragment) -> Self {
        let mut turn = Self {
            role: fragment.role,
            content: fragment.content.clone(),
            tool_invocations: Vec::with_capacity(fragment.tool_invocations.len()),
            group_id: fragment.id.clone(),
            is_completed: fragment.role == Role::User,
        };
        merge_tool_invocations(&mut turn.tool_invocations, &fragment.tool_invocations);
        turn
    }

    /// Folds another assistant fragment into this turn.
    pub fn absorb(&mut self, fragment: &Fragment) {
        self.content.push_str(&fragment.content);
        self.group_id = fragment.id.clone();
        merge_tool_invocations(&mut self.tool_invocations, &fragment.tool_invocations);
    }

    /// Replaces this turn's body with a newer snapshot of the same slot.
    pub(crate) fn refresh_from(&mut self, fragment: &Fragment) {
        self.content.clone_from(&fragment.content);
        self.tool_invocations.clear();
        merge_tool_invocations(&mut self.tool_invocations, &fragment.tool_invocations);
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Appends `incoming` to `target`, keeping entries unique by `tool_call_id`.
///
/// A `result` replaces an earlier entry for the same call id. A `call` only
/// replaces an earlier `call`; it never downgrades a resolved entry.
pub fn merge_tool_invocations(target: &mut Vec<ToolInvocation>, incoming: &[ToolInvocation]) {
    for invocation in incoming {
        match target
            .iter_mut()
            .find(|existing| existing.tool_call_id == invocation.tool_call_id)
        {
            Some(existing) => {
                if invocation.state == ToolState::Result || existing.state == ToolState::Call {
                    *existing = invocation.clone();
                }
            }
            None => target.push(invocation.clone()),
        }
    }
}

/// Role/content pair used to replay finished turns to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Flattens turns back into role/content pairs for the next request.
/// Turns with no text are skipped.
pub fn flatten_history(turns: &[Turn]) -> Vec<HistoryEntry> {
    turns
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .map(|turn| HistoryEntry {
            role: turn.role,
            content: turn.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_replaces_call_for_same_id() {
        let mut list = vec![ToolInvocation::call("a", "getHero", json!({}))];
        merge_tool_invocations(
            &mut list,
            &[ToolInvocation::call("a", "getHero", json!({})).resolve(json!({"ok": true}))],
        );
        assert_eq!(list.len(), 1);
        assert!(list[0].is_result());
    }

    #[test]
    fn later_call_never_downgrades_result() {
        let resolved = ToolInvocation::call("a", "getHero", json!({})).resolve(json!(1));
        let mut list = vec![resolved.clone()];
        merge_tool_invocations(&mut list, &[ToolInvocation::call("a", "getHero", json!({}))]);
        assert_eq!(list, vec![resolved]);
    }

    #[test]
    fn unrelated_calls_are_kept_in_order() {
        let mut list = vec![ToolInvocation::call("a", "getHero", json!({}))];
        merge_tool_invocations(
            &mut list,
            &[ToolInvocation::call("b", "getHeroPerformance", json!({}))],
        );
        let ids: Vec<_> = list.iter().map(|i| i.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn flatten_history_skips_blank_turns() {
        let turns = vec![
            Turn::from_fragment(&Fragment::user("1", "hi")),
            Turn::from_fragment(&Fragment::assistant("2", "")),
            Turn::from_fragment(&Fragment::assistant("3", "hello")),
        ];
        let history = flatten_history(&turns);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
    }
}
