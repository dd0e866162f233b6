use serde::{Deserialize, Serialize};

/// Name of the optional configuration file in the invocation directory.
pub const CONFIG_FILE: &str = "waterbot.toml";

/// waterbot.toml configuration
///
/// Only engine plumbing lives here. Images, ports and the registry target are
/// fixed by the pipeline and cannot be overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaterbotConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Docker CLI binary (name on PATH or absolute path)
    #[serde(default = "default_docker")]
    pub docker: String,
    /// Target platform passed as `--platform`, e.g. `linux/arm64`
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry user; `REGISTRY_USERNAME` takes precedence
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker: default_docker(),
            platform: None,
        }
    }
}

impl WaterbotConfig {
    /// Load from waterbot.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

fn default_docker() -> String {
    "docker".to_owned()
}
