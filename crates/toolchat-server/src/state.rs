use std::sync::Arc;

use crate::configuration::Settings;
use toolchat::agent::Agent;
use toolchat::providers::factory;
use toolchat::systems::club::ClubSystem;
use toolchat::systems::remote::RemoteSystem;
use toolchat::systems::ToolRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Agent,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    /// Build the provider and tool registry once, to be shared by every request
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let provider = factory::get_provider(settings.provider.into_config())?;

        let mut registry = ToolRegistry::new().with_call_timeout(settings.agent.tool_timeout());
        registry.add_system(Box::new(ClubSystem::new()))?;
        for remote in &settings.systems {
            // A tool server that is down at startup is skipped rather than fatal
            match RemoteSystem::connect(&remote.name, &remote.url).await {
                Ok(system) => registry.add_namespaced_system(Box::new(system))?,
                Err(err) => {
                    tracing::warn!(system = %remote.name, error = %err, "skipping tool server")
                }
            }
        }
        tracing::info!(tools = registry.list_tools().len(), "tool registry ready");

        let agent = Agent::new(provider, Arc::new(registry))
            .with_config(settings.agent.into_config()?);
        Ok(Self::new(agent))
    }
}
