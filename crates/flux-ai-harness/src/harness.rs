use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::debug;

use crate::errors::HarnessError;
use crate::model::ProviderId;
use crate::provider::ProviderAdapter;
use crate::session::{Session, SessionConfig};

pub(crate) struct HarnessInner {
    providers: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl HarnessInner {
    pub(crate) fn provider(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).cloned()
    }
}

/// Shared handle to the registered model providers. Cheap to clone.
#[derive(Clone)]
pub struct Harness {
    pub(crate) inner: Arc<HarnessInner>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Opens a chat session. Runs started from it share its tool registry.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::new(self.inner.clone(), config)
    }

    pub fn has_provider(&self, id: &ProviderId) -> bool {
        self.inner.providers.contains_key(id)
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl HarnessBuilder {
    pub fn register_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Fails when two adapters report the same provider id.
    pub fn build(self) -> Result<Harness, HarnessError> {
        let mut providers = HashMap::with_capacity(self.providers.len());
        for provider in self.providers {
            match providers.entry(provider.id()) {
                Entry::Occupied(slot) => {
                    return Err(HarnessError::Config(format!(
                        "duplicate provider registration: {}",
                        slot.key()
                    )));
                }
                Entry::Vacant(slot) => {
                    debug!(event = "harness.provider_registered", provider = %slot.key());
                    slot.insert(provider);
                }
            }
        }
        Ok(Harness {
            inner: Arc::new(HarnessInner { providers }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::provider::{ProviderRequest, ProviderStreamHandle};

    struct NamedProvider(&'static str);

    #[async_trait::async_trait]
    impl ProviderAdapter for NamedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::new(self.0)
        }

        async fn start_stream(
            &self,
            _req: ProviderRequest,
        ) -> Result<ProviderStreamHandle, ProviderError> {
            unreachable!("not used in this test")
        }
    }

    #[test]
    fn build_rejects_duplicate_provider_ids() {
        let result = Harness::builder()
            .register_provider(Arc::new(NamedProvider("openai")))
            .register_provider(Arc::new(NamedProvider("openai")))
            .build();
        assert!(
            matches!(result, Err(HarnessError::Config(message)) if message == "duplicate provider registration: openai")
        );
    }

    #[test]
    fn registered_providers_are_looked_up_by_id() {
        let harness = Harness::builder()
            .register_provider(Arc::new(NamedProvider("openai")))
            .register_provider(Arc::new(NamedProvider("local")))
            .build()
            .expect("harness");
        assert!(harness.has_provider(&ProviderId::new("local")));
        assert!(!harness.has_provider(&ProviderId::new("anthropic")));
    }
}
