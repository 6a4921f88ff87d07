use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    pub input: InputConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Reader event log to replay
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub directory: String,
    /// Gzip snapshot data before it is stored
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: "snapshots".to_string(),
            compress: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&ImportConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("omero-meta").required(false));

        // Add environment variables with prefix "OMERO_META_"
        config = config.add_source(
            config::Environment::with_prefix("OMERO_META")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let import_config: ImportConfig = config.try_deserialize()?;

        Ok(import_config)
    }

    /// Input path from the command line, falling back to config
    pub fn input_path(&self, arg: Option<String>) -> anyhow::Result<PathBuf> {
        arg.or_else(|| self.input.path.clone())
            .map(PathBuf::from)
            .ok_or_else(|| {
                anyhow::anyhow!("No event log given: pass a path or set OMERO_META_INPUT_PATH")
            })
    }

    pub fn store_directory(&self) -> PathBuf {
        PathBuf::from(&self.store.directory)
    }
}
