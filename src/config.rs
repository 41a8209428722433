//! Configuration: defaults, then an optional file, then `LIBRARY__*`
//! environment variables.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

const DEMO_API_KEY: &str = "demo-key";
const DEMO_PROJECT_ID: &str = "demo-project";

/// Credentials of the managed backend. The defaults are demo placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: DEMO_API_KEY.to_string(),
            auth_domain: "demo-project.example.com".to_string(),
            project_id: DEMO_PROJECT_ID.to_string(),
            storage_bucket: "demo-project.appspot.com".to_string(),
            messaging_sender_id: "123456789".to_string(),
            app_id: "1:123456789:web:abcdef123456".to_string(),
        }
    }
}

impl BackendConfig {
    /// True when real credentials are present (not blank, not the demo placeholders).
    pub fn is_configured(&self) -> bool {
        let api_key = self.api_key.trim();
        let project_id = self.project_id.trim();
        !api_key.is_empty()
            && !project_id.is_empty()
            && api_key != DEMO_API_KEY
            && project_id != DEMO_PROJECT_ID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub backend: BackendConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            backend: BackendConfig::default(),
        }
    }
}

impl LibraryConfig {
    /// Loads configuration. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, LibraryError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("LIBRARY").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
