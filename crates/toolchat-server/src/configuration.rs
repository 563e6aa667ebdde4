use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolchat::agent::{AgentConfig, DEFAULT_MAX_TURNS};
use toolchat::providers::configs::{
    AnthropicProviderConfig, ProviderConfig, ANTHROPIC_HOST, ANTHROPIC_MODEL,
};

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Anthropic {
        #[serde(default = "default_anthropic_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Anthropic {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Tera template replacing the built-in system prompt
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
            system_prompt_file: None,
        }
    }
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn into_config(self) -> anyhow::Result<AgentConfig> {
        let system_prompt = match self.system_prompt_file {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("failed to read system prompt {}: {}", path.display(), e)
            })?),
            None => None,
        };
        Ok(AgentConfig {
            max_turns: self.max_turns,
            system_prompt,
        })
    }
}

/// A tool host reached over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSystemSettings {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub systems: Vec<RemoteSystemSettings>,
}

impl Settings {
    /// Load from `toolchat.toml` in the working directory or the user config directory,
    /// then the environment
    pub fn new() -> Result<Self, ConfigError> {
        let mut files = vec![PathBuf::from("toolchat.toml")];
        if let Some(dir) = dirs::config_dir() {
            files.push(dir.join("toolchat").join("toolchat.toml"));
        }
        Self::load(&files)
    }

    pub fn load<P: AsRef<Path>>(files: &[P]) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.type", "anthropic")?
            .set_default("provider.host", default_anthropic_host())?
            .set_default("provider.model", default_model())?;

        // Files listed later take precedence
        for file in files.iter().rev() {
            builder = builder.add_source(File::from(file.as_ref()).required(false));
        }

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("TOOLCHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Handle missing field errors specially
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `api_key`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .split('`')
                        .next()
                        .unwrap_or_default();
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    ANTHROPIC_MODEL.to_string()
}

fn default_anthropic_host() -> String {
    ANTHROPIC_HOST.to_string()
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_tool_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("TOOLCHAT_") {
                env::remove_var(&key);
            }
        }
    }

    fn no_files() -> Vec<PathBuf> {
        Vec::new()
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("TOOLCHAT_PROVIDER__API_KEY", "test-key");

        let settings = Settings::load(&no_files()).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.agent.max_turns, 10);
        assert_eq!(settings.agent.tool_timeout(), Duration::from_secs(30));
        assert!(settings.systems.is_empty());

        let ProviderSettings::Anthropic {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider;
        assert_eq!(host, "https://api.anthropic.com");
        assert_eq!(api_key, "test-key");
        assert_eq!(model, ANTHROPIC_MODEL);
        assert_eq!(temperature, None);
        assert_eq!(max_tokens, None);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_the_variable() {
        clean_env();

        let err = Settings::load(&no_files()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration, set TOOLCHAT_PROVIDER__API_KEY"
        );
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("TOOLCHAT_SERVER__PORT", "8080");
        env::set_var("TOOLCHAT_PROVIDER__API_KEY", "test-key");
        env::set_var("TOOLCHAT_PROVIDER__HOST", "https://proxy.example.com");
        env::set_var("TOOLCHAT_PROVIDER__MODEL", "claude-3-5-haiku-latest");
        env::set_var("TOOLCHAT_PROVIDER__TEMPERATURE", "0.8");
        env::set_var("TOOLCHAT_AGENT__MAX_TURNS", "4");
        env::set_var("TOOLCHAT_AGENT__TOOL_TIMEOUT_SECS", "5");

        let settings = Settings::load(&no_files()).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.agent.max_turns, 4);
        assert_eq!(settings.agent.tool_timeout_secs, 5);

        let ProviderConfig::Anthropic(config) = settings.provider.into_config();
        assert_eq!(config.host, "https://proxy.example.com");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.temperature, Some(0.8));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_file_settings_with_remote_systems() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let prompt = dir.path().join("prompt.md");
        std::fs::write(&prompt, "Be brief.").unwrap();
        let file = dir.path().join("toolchat.toml");
        std::fs::write(
            &file,
            format!(
                r#"
[provider]
api_key = "from-file"

[agent]
max_turns = 6
system_prompt_file = "{}"

[[systems]]
name = "weather"
url = "http://127.0.0.1:8081"

[[systems]]
name = "calendar"
url = "http://127.0.0.1:8082"
"#,
                prompt.display()
            ),
        )
        .unwrap();

        env::set_var("TOOLCHAT_SERVER__PORT", "9000");
        let settings = Settings::load(&[file]).unwrap();
        assert_eq!(settings.server.port, 9000);

        let names: Vec<_> = settings.systems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["weather", "calendar"]);

        let ProviderConfig::Anthropic(config) = settings.provider.into_config();
        assert_eq!(config.api_key, "from-file");

        let agent = settings.agent.into_config().unwrap();
        assert_eq!(agent.max_turns, 6);
        assert_eq!(agent.system_prompt.as_deref(), Some("Be brief."));

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
