//! OpenAI Responses API integration: streaming text, function calling and
//! per-run request options.
mod adapter;
mod config;
mod options;
pub(crate) mod transport;

pub use adapter::OpenAiProvider;
pub use config::{
    DEFAULT_OPENAI_BASE_URL, OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV, OPENAI_TIMEOUT_ENV,
    OpenAiClientConfig,
};
pub use options::OpenAiRequestOptions;

use crate::ProviderId;
use crate::run::RunBuilder;

/// Extension trait for attaching OpenAI-specific options to a `RunBuilder`.
pub trait OpenAiRunBuilderExt {
    /// Adds OpenAI request options for the current run.
    ///
    /// These options are stored internally under the `openai` provider key and
    /// read only by `OpenAiProvider`.
    fn openai_options(self, options: OpenAiRequestOptions) -> Self;
}

impl OpenAiRunBuilderExt for RunBuilder {
    fn openai_options(self, options: OpenAiRequestOptions) -> Self {
        match serde_json::to_value(options) {
            Ok(value) => self.set_vendor_options_json(ProviderId::new("openai"), value),
            Err(err) => {
                tracing::warn!(event = "openai.options_dropped", error = %err);
                self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderAdapter, ProviderRequest, ProviderStreamHandle};
    use crate::{Harness, SessionConfig};
    use crate::{ProviderError, ProviderId};
    use std::sync::Arc;

    struct Dummy;

    #[async_trait::async_trait]
    impl ProviderAdapter for Dummy {
        fn id(&self) -> ProviderId {
            ProviderId::new("openai")
        }

        async fn start_stream(
            &self,
            _req: ProviderRequest,
        ) -> Result<ProviderStreamHandle, ProviderError> {
            unreachable!()
        }
    }

    #[test]
    fn openai_run_builder_ext_stores_options_under_openai_key() {
        let harness = Harness::builder()
            .register_provider(Arc::new(Dummy))
            .build()
            .expect("harness");
        let builder = harness
            .session(SessionConfig::named("t"))
            .run(crate::ModelRef::new("openai", "gpt-4o-mini"))
            .user_text("hello")
            .openai_options(OpenAiRequestOptions::default().store(true));

        let value = builder
            .vendor_options_value(&ProviderId::new("openai"))
            .expect("stored option");
        assert_eq!(value.get("store").and_then(|v| v.as_bool()), Some(true));
    }
}
