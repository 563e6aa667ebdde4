use std::sync::Arc;

use super::{anthropic::AnthropicProvider, base::Provider, configs::ProviderConfig};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
        }
    }
}
