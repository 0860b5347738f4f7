//! Vendor integrations. Each vendor registers a `ProviderAdapter` and may add
//! an extension trait on `RunBuilder` for its own request options.

/// OpenAI Responses API adapter.
pub mod openai;
