use std::collections::HashMap;
use std::sync::Arc;

use flux_core::{Fragment, HistoryEntry, ToolInvocation, ToolState};
use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::content::{ProviderMessage, RunOutput};
use crate::errors::{HarnessError, RunFailure, run_failure_from_provider_error};
use crate::harness::HarnessInner;
use crate::model::{ModelRef, ProviderId, RunOptions};
use crate::provider::{ProviderAdapter, ProviderEvent, ProviderRequest, ToolChoice};
use crate::stream::StreamEvent;
use crate::tools::ToolRegistry;

/// Handle used to request cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and becomes visible as a terminal
    /// `StreamEvent::Error` with `RunFailure::Cancelled`; `RunStream::finish`
    /// then returns `HarnessError::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Builder for configuring and starting a single chat run.
///
/// A run answers one user message: it replays the supplied history, streams
/// the assistant response, and executes tool calls until the model answers
/// with text or the round-trip budget is spent.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    session_id: uuid::Uuid,
    session_name: String,
    tools: Arc<ToolRegistry>,
    model: ModelRef,
    system_prompt: Option<String>,
    history: Vec<ProviderMessage>,
    user_text: Option<String>,
    user_message_id: Option<String>,
    options: RunOptions,
    vendor_options: HashMap<ProviderId, serde_json::Value>,
}

impl RunBuilder {
    pub(crate) fn new(
        harness: Arc<HarnessInner>,
        session_id: uuid::Uuid,
        session_name: String,
        tools: Arc<ToolRegistry>,
        model: ModelRef,
    ) -> Self {
        Self {
            harness,
            session_id,
            session_name,
            tools,
            model,
            system_prompt: None,
            history: Vec::new(),
            user_text: None,
            user_message_id: None,
            options: RunOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    /// Sets the system prompt for the run.
    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Replays earlier turns, flattened into role/content pairs.
    pub fn history(mut self, entries: Vec<HistoryEntry>) -> Self {
        self.history = entries.into_iter().map(ProviderMessage::from).collect();
        self
    }

    /// Sets the user message this run answers.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.user_text = Some(text.into());
        self
    }

    /// Overrides the fragment id of the user message (a UUID by default).
    pub fn user_message_id(mut self, id: impl Into<String>) -> Self {
        self.user_message_id = Some(id.into());
        self
    }

    /// Sets an optional per-run timeout.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the bounded stream buffer size used between the runtime task and
    /// the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Caps automatic tool round trips for this run.
    pub fn max_tool_roundtrips(mut self, max: u32) -> Self {
        self.options.max_tool_roundtrips = max;
        self
    }

    pub(crate) fn set_vendor_options_json(
        mut self,
        provider: ProviderId,
        value: serde_json::Value,
    ) -> Self {
        self.vendor_options.insert(provider, value);
        self
    }

    #[cfg(test)]
    pub(crate) fn vendor_options_value(&self, provider: &ProviderId) -> Option<&serde_json::Value> {
        self.vendor_options.get(provider)
    }

    /// Validates the builder state and starts a streaming run.
    ///
    /// The returned `RunStream` yields `RunStarted`, the user fragment, one
    /// `Fragment` snapshot per change of an assistant message, and a terminal
    /// `Finished`/`Error` event.
    pub async fn start_stream(self) -> Result<RunStream, HarnessError> {
        let harness = self.harness.clone();
        let tools = self.tools.clone();
        let validated = self.validate_and_build_request()?;
        let provider = harness
            .provider(&validated.request.model.provider)
            .ok_or_else(|| HarnessError::ProviderNotFound {
                provider: validated.request.model.provider.clone(),
            })?;

        let (tx, rx) = mpsc::channel(validated.request.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        let abort_handle = AbortHandle { tx: abort_tx };
        let run_id = validated.request.run_id;
        let session_id = validated.request.session_id;
        let model = validated.request.model.clone();
        info!(
            event = "run.starting",
            run_id = %run_id,
            session = %validated.session_name,
            provider = %model.provider,
            model = %model.model,
            tools = tools.len()
        );
        tokio::spawn(run_task(
            provider,
            tools,
            validated.request,
            validated.user,
            tx,
            final_tx,
            abort_rx,
        ));

        Ok(RunStream {
            run_id,
            session_id,
            provider: model.provider,
            model: model.model,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the final output.
    pub async fn collect_output(self) -> Result<RunOutput, HarnessError> {
        let stream = self.start_stream().await?;
        stream.finish().await
    }

    /// Runs to completion and returns concatenated assistant text.
    pub async fn collect_text(self) -> Result<String, HarnessError> {
        Ok(self.collect_output().await?.text())
    }

    fn validate_and_build_request(self) -> Result<ValidatedRun, HarnessError> {
        if self.model.provider.as_str().trim().is_empty() {
            return Err(HarnessError::Validation(
                "model provider must not be empty".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(HarnessError::Validation("model must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(HarnessError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        let Some(user_text) = self.user_text else {
            return Err(HarnessError::Validation(
                "a user message is required".into(),
            ));
        };
        if user_text.trim().is_empty() {
            return Err(HarnessError::Validation(
                "user text must not be empty".into(),
            ));
        }
        let user_id = self
            .user_message_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut messages = self.history;
        messages.push(ProviderMessage::User(user_text.clone()));

        let request = ProviderRequest {
            run_id: uuid::Uuid::new_v4(),
            session_id: self.session_id,
            model: self.model,
            system_prompt: self.system_prompt.filter(|s| !s.trim().is_empty()),
            messages,
            tools: self.tools.specs(),
            tool_choice: ToolChoice::Auto,
            options: self.options,
            vendor_options: self.vendor_options,
        };
        Ok(ValidatedRun {
            request,
            user: Fragment::user(user_id, user_text),
            session_name: self.session_name,
        })
    }
}

struct ValidatedRun {
    request: ProviderRequest,
    user: Fragment,
    session_name: String,
}

/// Streaming handle returned by `RunBuilder::start_stream`.
///
/// Use `next_event()` to consume events as they arrive and `finish()` to obtain
/// the final result after the terminal event.
pub struct RunStream {
    run_id: uuid::Uuid,
    session_id: uuid::Uuid,
    provider: ProviderId,
    model: String,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Result<RunOutput, HarnessError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    /// Returns the run id for this stream.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns the session id that owns this run.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next stream event.
    ///
    /// Returns `None` after the stream channel is closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if let Some(StreamEvent::Finished { .. } | StreamEvent::Error { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream (if needed) and returns the terminal run result.
    ///
    /// This is safe to call after consuming events manually with `next_event()`.
    pub async fn finish(mut self) -> Result<RunOutput, HarnessError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(StreamEvent::Finished { .. } | StreamEvent::Error { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::protocol_msg(format!(
                "run task ended without final result (provider={}, model={})",
                self.provider, self.model
            ))),
        }
    }
}

enum DriveError {
    Failed(RunFailure),
    ReceiverDropped(&'static str),
}

/// Emits fragment snapshots and tracks their sequence numbers.
struct Emitter<'a> {
    tx: &'a mpsc::Sender<StreamEvent>,
    run_id: uuid::Uuid,
    seq: u64,
}

impl Emitter<'_> {
    async fn fragment(&mut self, fragment: &Fragment) -> Result<(), DriveError> {
        let event = StreamEvent::Fragment {
            run_id: self.run_id,
            seq: self.seq,
            fragment: fragment.clone(),
        };
        self.seq = self.seq.saturating_add(1);
        if send_event(self.tx, event).await {
            Ok(())
        } else {
            Err(DriveError::ReceiverDropped(
                "run stream receiver dropped during output",
            ))
        }
    }
}

async fn run_task(
    provider: Arc<dyn ProviderAdapter>,
    tools: Arc<ToolRegistry>,
    request: ProviderRequest,
    user: Fragment,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Result<RunOutput, HarnessError>>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;

    if !send_event(
        &tx,
        StreamEvent::RunStarted {
            run_id,
            session_id: request.session_id,
            provider: request.model.provider.clone(),
            model: request.model.model.clone(),
        },
    )
    .await
    {
        let _ = final_tx.send(Err(HarnessError::protocol_msg(
            "run stream receiver dropped before RunStarted",
        )));
        return;
    }

    let mut emitter = Emitter {
        tx: &tx,
        run_id,
        seq: 0,
    };
    let result = drive_run(
        provider.as_ref(),
        tools.as_ref(),
        request,
        user,
        &mut emitter,
        &mut abort_rx,
    )
    .await;

    match result {
        Ok(output) => {
            info!(
                event = "run.finished",
                run_id = %run_id,
                fragments = output.fragments.len(),
                finish_reason = output.finish_reason.as_deref().unwrap_or("unknown")
            );
            let sent = send_event(
                &tx,
                StreamEvent::Finished {
                    run_id,
                    output: output.clone(),
                },
            )
            .await;
            let _ = final_tx.send(if sent {
                Ok(output)
            } else {
                Err(HarnessError::protocol_msg(
                    "run stream receiver dropped before completion",
                ))
            });
        }
        Err(DriveError::Failed(failure)) => {
            info!(event = "run.failed", run_id = %run_id, error = %failure);
            let _ = send_event(
                &tx,
                StreamEvent::Error {
                    run_id,
                    error: failure.clone(),
                },
            )
            .await;
            let _ = final_tx.send(Err(HarnessError::run_failed(failure)));
        }
        Err(DriveError::ReceiverDropped(message)) => {
            let _ = final_tx.send(Err(HarnessError::protocol_msg(message)));
        }
    }
}

async fn drive_run(
    provider: &dyn ProviderAdapter,
    tools: &ToolRegistry,
    mut request: ProviderRequest,
    user: Fragment,
    emitter: &mut Emitter<'_>,
    abort_rx: &mut watch::Receiver<bool>,
) -> Result<RunOutput, DriveError> {
    let provider_id = request.model.provider.clone();
    let max_roundtrips = request.options.max_tool_roundtrips;

    emitter.fragment(&user).await?;
    let mut fragments = vec![user];
    let mut roundtrips = 0_u32;

    loop {
        if roundtrips >= max_roundtrips {
            request.tool_choice = ToolChoice::None;
        }
        let mut message = Fragment::assistant(uuid::Uuid::new_v4().to_string(), "");
        let finish_reason = tokio::select! {
            _ = cancelled(abort_rx) => return Err(DriveError::Failed(RunFailure::Cancelled)),
            round = stream_round(provider, &request, &mut message, emitter) => round?,
        };

        let pending: Vec<ToolInvocation> = message
            .tool_invocations
            .iter()
            .filter(|invocation| invocation.state == ToolState::Call)
            .cloned()
            .collect();
        if pending.is_empty() {
            fragments.push(message);
            return Ok(RunOutput {
                fragments,
                finish_reason,
            });
        }

        debug!(
            event = "run.tool_round",
            provider = %provider_id,
            round = roundtrips + 1,
            calls = pending.len()
        );
        if !message.content.is_empty() {
            request
                .messages
                .push(ProviderMessage::Assistant(message.content.clone()));
        }
        for call in pending {
            let args = call.args.clone().unwrap_or_else(|| serde_json::json!({}));
            let output = tokio::select! {
                _ = cancelled(abort_rx) => return Err(DriveError::Failed(RunFailure::Cancelled)),
                output = tools.execute_to_payload(&call.tool_name, args.clone()) => output,
            };
            request.messages.push(ProviderMessage::ToolCall {
                call_id: call.tool_call_id.clone(),
                name: call.tool_name.clone(),
                arguments: args,
            });
            request.messages.push(ProviderMessage::ToolResult {
                call_id: call.tool_call_id.clone(),
                output: output.clone(),
            });
            flux_core::merge_tool_invocations(
                &mut message.tool_invocations,
                &[call.resolve(output)],
            );
            emitter.fragment(&message).await?;
        }
        fragments.push(message);
        roundtrips = roundtrips.saturating_add(1);
    }
}

/// Streams one provider round into `message`, emitting a snapshot on every
/// change. Returns the round's finish reason.
async fn stream_round(
    provider: &dyn ProviderAdapter,
    request: &ProviderRequest,
    message: &mut Fragment,
    emitter: &mut Emitter<'_>,
) -> Result<Option<String>, DriveError> {
    let provider_id = request.model.provider.clone();
    let mut handle = provider
        .start_stream(request.clone())
        .await
        .map_err(|err| DriveError::Failed(run_failure_from_provider_error(&err)))?;

    loop {
        match handle.stream.next().await {
            Some(Ok(ProviderEvent::TextDelta { text })) => {
                if text.is_empty() {
                    continue;
                }
                message.content.push_str(&text);
                emitter.fragment(message).await?;
            }
            Some(Ok(ProviderEvent::ToolCall {
                call_id,
                name,
                arguments,
            })) => {
                if request.tool_choice == ToolChoice::None {
                    debug!(event = "run.tool_call_ignored", provider = %provider_id, tool = %name);
                    continue;
                }
                message
                    .tool_invocations
                    .push(ToolInvocation::call(call_id, name, arguments));
                emitter.fragment(message).await?;
            }
            Some(Ok(ProviderEvent::Completed {
                output_text,
                finish_reason,
            })) => {
                if message.content.is_empty()
                    && let Some(text) = output_text.filter(|t| !t.is_empty())
                {
                    message.content = text;
                    emitter.fragment(message).await?;
                }
                return Ok(finish_reason);
            }
            Some(Err(err)) => {
                return Err(DriveError::Failed(run_failure_from_provider_error(&err)));
            }
            None => {
                return Err(DriveError::Failed(RunFailure::Protocol {
                    message: format!("provider stream ended without completion ({provider_id})"),
                }));
            }
        }
    }
}

/// Resolves once cancellation is requested. Never resolves if every abort
/// handle is dropped without aborting.
async fn cancelled(abort_rx: &mut watch::Receiver<bool>) {
    loop {
        if *abort_rx.borrow_and_update() {
            return;
        }
        if abort_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}
