use crate::fragment::{Fragment, Role};
use crate::turn::Turn;

/// Groups an ordered fragment history into turns.
///
/// Every user fragment becomes its own turn. Runs of consecutive assistant
/// fragments merge into one turn whose `group_id` is the id of the last
/// fragment merged. Pure: the same input always yields the same turns.
pub fn group(fragments: &[Fragment]) -> Vec<Turn> {
    let mut out = Vec::new();
    let mut current: Option<Turn> = None;

    for fragment in fragments {
        match fragment.role {
            Role::User => {
                if let Some(group) = current.take() {
                    out.push(group);
                }
                out.push(Turn::from_fragment(fragment));
            }
            Role::Assistant => match current.as_mut() {
                Some(group) => group.absorb(fragment),
                None => current = Some(Turn::from_fragment(fragment)),
            },
        }
    }

    if let Some(group) = current {
        out.push(group);
    }
    out
}
