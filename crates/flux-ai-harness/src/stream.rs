use flux_core::Fragment;

use crate::{RunOutput, errors::RunFailure, model::ProviderId};

/// Normalized stream events exposed by `RunStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event for every run.
    RunStarted {
        run_id: uuid::Uuid,
        session_id: uuid::Uuid,
        provider: ProviderId,
        model: String,
    },
    /// Full snapshot of one message slot. The same `fragment.id` repeats as
    /// the slot grows.
    Fragment {
        run_id: uuid::Uuid,
        seq: u64,
        fragment: Fragment,
    },
    /// Completion signal: every fragment of this run has been delivered.
    Finished {
        run_id: uuid::Uuid,
        output: RunOutput,
    },
    /// Terminal failure event.
    Error {
        run_id: uuid::Uuid,
        error: RunFailure,
    },
}
