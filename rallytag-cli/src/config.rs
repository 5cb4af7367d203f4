use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub poll_interval_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rallytag"),
            base_url: "https://rallytag.app".to_string(),
            poll_interval_secs: 2,
        }
    }
}
