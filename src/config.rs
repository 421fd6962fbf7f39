use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub session: SessionTuning,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

/// Session tuning knobs. The defaults match the product behavior; a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Practice-session countdown length.
    pub practice_duration_secs: u64,

    /// Minimum hidden span that counts as an attention loss.
    pub hidden_threshold_ms: u64,

    /// Window before a hide in which user input excuses it.
    pub interaction_grace_ms: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            practice_duration_secs: 120,
            hidden_threshold_ms: 1000,
            interaction_grace_ms: 500,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
