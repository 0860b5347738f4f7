use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::ProviderId;
use crate::content::ProviderMessage;
use crate::errors::{HarnessError, ProviderError};
use crate::provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
};

use super::config::OpenAiClientConfig;
use super::options::OpenAiRequestOptions;
use super::transport::{SseDecoder, map_openai_frame_to_events};

const OPENAI_PROVIDER: &str = "openai";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Provider adapter for OpenAI's Responses API (streaming).
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(OPENAI_PROVIDER)
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let provider_id = ProviderId::new(OPENAI_PROVIDER);
        let request_options = read_openai_options(&req, &provider_id)?;
        let body = build_request_body(&req, &request_options)?;
        debug!(
            event = "openai.stream_start",
            run_id = %req.run_id,
            session_id = %req.session_id,
            model = %req.model.model,
            messages = req.messages.len(),
            tools = req.tools.len()
        );

        let mut http_req = self
            .client
            .post(self.config.responses_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("OpenAI request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("OpenAI responses request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        let stream = openai_event_stream(provider_id.clone(), bytes_stream);

        Ok(ProviderStreamHandle {
            stream: Box::pin(stream),
            metadata: ProviderResponseMeta::default(),
        })
    }
}

fn read_openai_options(
    req: &ProviderRequest,
    provider_id: &ProviderId,
) -> Result<OpenAiRequestOptions, ProviderError> {
    match req.vendor_options.get(provider_id) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid OpenAI options: {e}"))
        }),
        None => Ok(OpenAiRequestOptions::default()),
    }
}

pub(crate) fn build_request_body(
    req: &ProviderRequest,
    options: &OpenAiRequestOptions,
) -> Result<serde_json::Value, ProviderError> {
    let provider_id = ProviderId::new(OPENAI_PROVIDER);
    options
        .validate()
        .map_err(|message| ProviderError::protocol(provider_id.clone(), message))?;

    let mut input = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system_prompt) = req
        .system_prompt
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        input.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }
    for message in &req.messages {
        input.push(render_message(message).map_err(|e| {
            ProviderError::protocol(
                provider_id.clone(),
                format!("failed to serialize conversation input: {e}"),
            )
        })?);
    }

    let mut body = serde_json::json!({
        "model": req.model.model,
        "input": input,
        "stream": true,
        "store": options.store.unwrap_or(false),
    });

    if !req.tools.is_empty() {
        body["tools"] = req
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        body["tool_choice"] = serde_json::json!(req.tool_choice);
    }

    if let Some(temperature) = options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(tokens) = options.max_output_tokens {
        body["max_output_tokens"] = serde_json::json!(tokens);
    }
    if !req.tools.is_empty()
        && let Some(parallel) = options.parallel_tool_calls
    {
        body["parallel_tool_calls"] = serde_json::json!(parallel);
    }

    Ok(body)
}

fn render_message(message: &ProviderMessage) -> Result<serde_json::Value, serde_json::Error> {
    Ok(match message {
        ProviderMessage::User(text) => serde_json::json!({"role": "user", "content": text}),
        ProviderMessage::Assistant(text) => {
            serde_json::json!({"role": "assistant", "content": text})
        }
        ProviderMessage::ToolCall {
            call_id,
            name,
            arguments,
        } => serde_json::json!({
            "type": "function_call",
            "call_id": call_id,
            "name": name,
            "arguments": serde_json::to_string(arguments)?,
        }),
        ProviderMessage::ToolResult { call_id, output } => serde_json::json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": serde_json::to_string(output)?,
        }),
    })
}

fn openai_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<ProviderEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            provider_id,
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        let frames = state.decoder.push_chunk(&chunk);
                        for frame in frames {
                            let events = map_openai_frame_to_events(&state.provider_id, &frame)?;
                            for event in events {
                                state.pending.push_back(event);
                            }
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("OpenAI streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelRef, RunOptions};
    use crate::provider::{ProviderRequest, ToolChoice};
    use crate::tools::ToolSpec;
    use std::collections::HashMap;

    fn request_with_messages(messages: Vec<ProviderMessage>) -> ProviderRequest {
        ProviderRequest {
            run_id: uuid::Uuid::new_v4(),
            session_id: uuid::Uuid::new_v4(),
            model: ModelRef::new("openai", "gpt-4o-mini"),
            system_prompt: Some("sys".into()),
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            options: RunOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    #[test]
    fn request_serialization_has_stream_and_store_defaults() {
        let req = request_with_messages(vec![ProviderMessage::User("hello".into())]);
        let body = build_request_body(&req, &OpenAiRequestOptions::default()).expect("body");
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(body.get("store").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(
            body.get("model").and_then(|v| v.as_str()),
            Some("gpt-4o-mini")
        );
        assert!(body.get("tools").is_none());
        assert_eq!(
            body["input"],
            serde_json::json!([
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"},
            ])
        );
    }

    #[test]
    fn tool_round_trip_is_rendered_as_function_items() {
        let mut req = request_with_messages(vec![
            ProviderMessage::User("show hero 7".into()),
            ProviderMessage::ToolCall {
                call_id: "call_1".into(),
                name: "getHero".into(),
                arguments: serde_json::json!({"heroId": "7"}),
            },
            ProviderMessage::ToolResult {
                call_id: "call_1".into(),
                output: serde_json::json!({"name": "Makesy"}),
            },
        ]);
        req.tools = vec![ToolSpec {
            name: "getHero".into(),
            description: "Get one hero".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        req.tool_choice = ToolChoice::None;

        let body = build_request_body(&req, &OpenAiRequestOptions::default()).expect("body");
        assert_eq!(body["input"][2]["type"], "function_call");
        assert_eq!(body["input"][2]["arguments"], "{\"heroId\":\"7\"}");
        assert_eq!(body["input"][3]["type"], "function_call_output");
        assert_eq!(body["input"][3]["output"], "{\"name\":\"Makesy\"}");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["name"], "getHero");
        assert_eq!(body["tool_choice"], "none");
    }

    #[test]
    fn vendor_options_are_applied_when_present() {
        let req = request_with_messages(vec![ProviderMessage::User("hi".into())]);
        let body = build_request_body(
            &req,
            &OpenAiRequestOptions::default()
                .store(true)
                .temperature(0.5)
                .max_output_tokens(512)
                .parallel_tool_calls(false),
        )
        .expect("body");
        assert_eq!(body.get("store").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_output_tokens"], 512);
        assert!(body.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let req = request_with_messages(vec![ProviderMessage::User("hi".into())]);
        let err = build_request_body(&req, &OpenAiRequestOptions::default().temperature(3.0))
            .expect_err("invalid temperature");
        assert!(matches!(err, ProviderError::Protocol { ref message, .. } if message.contains("temperature")));
    }

    #[tokio::test]
    async fn env_gated_smoke_stream_emits_started_and_terminal_if_key_present() {
        if std::env::var("OPENAI_API_KEY")
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            eprintln!("skipping OpenAI stream smoke test (OPENAI_API_KEY missing)");
            return;
        }

        let harness = crate::Harness::builder()
            .register_provider(std::sync::Arc::new(
                OpenAiProvider::from_env().expect("provider"),
            ))
            .build()
            .expect("harness");

        let mut run = harness
            .session(crate::SessionConfig::named("smoke-stream"))
            .run(crate::ModelRef::new("openai", "gpt-4o-mini"))
            .timeout(std::time::Duration::from_secs(30))
            .system_prompt("Reply with a short greeting.")
            .user_text("hello")
            .start_stream()
            .await
            .expect("start stream");

        let mut saw_started = false;
        let mut saw_terminal = false;
        while let Some(event) = run.next_event().await {
            match event {
                crate::StreamEvent::RunStarted { .. } => saw_started = true,
                crate::StreamEvent::Finished { .. } | crate::StreamEvent::Error { .. } => {
                    saw_terminal = true;
                    break;
                }
                crate::StreamEvent::Fragment { .. } => {}
            }
        }

        let _ = run.finish().await;
        assert!(saw_started, "expected RunStarted event");
        assert!(saw_terminal, "expected terminal event");
    }
}
