use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:10000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Overrides the port of `bind_addr` when set.
    pub port: Option<u16>,

    /// Root directory holding one output directory per job
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Executable of the analysis tool
    #[serde(default = "default_analyzer_program")]
    pub analyzer_program: String,

    /// Arguments placed before `--repo` (comma-separated in the environment)
    #[serde(default = "default_analyzer_args")]
    pub analyzer_args: Vec<String>,

    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:10000".to_string()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_analyzer_program() -> String {
    "python".to_string()
}

fn default_analyzer_args() -> Vec<String> {
    vec!["main.py".to_string()]
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// `bind_addr`, with its port replaced by `port` if one is configured.
    pub fn listen_addr(&self) -> String {
        match self.port {
            Some(port) => {
                let host = self
                    .bind_addr
                    .rsplit_once(':')
                    .map(|(host, _)| host)
                    .unwrap_or(&self.bind_addr);
                format!("{host}:{port}")
            }
            None => self.bind_addr.clone(),
        }
    }
}
