use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::store::{MemoryStore, Record, RecordStore, SheetsConfig, SheetsStore};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub store: StoreConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sheets,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON file of seed records for the memory backend.
    pub fixture_path: Option<String>,
    pub sheets: Option<SheetsConfig>,
    /// Environment variable holding the Sheets API token. Credentials
    /// come from the environment, never the config file.
    #[serde(default = "default_sheets_token_env")]
    pub token_env: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionConfig {
    /// Environment variable holding the transcription API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl StoreConfig {
    /// Construct the configured record store backend.
    pub fn build(&self) -> Result<Arc<dyn RecordStore>> {
        match self.backend {
            StoreBackend::Memory => {
                let records: Vec<Record> = match &self.fixture_path {
                    Some(path) => {
                        let raw = std::fs::read_to_string(path)
                            .with_context(|| format!("Failed to read fixture {}", path))?;
                        serde_json::from_str(&raw)
                            .with_context(|| format!("Failed to parse fixture {}", path))?
                    }
                    None => Vec::new(),
                };
                let store =
                    MemoryStore::new(records).context("Invalid memory store fixture")?;
                Ok(Arc::new(store))
            }
            StoreBackend::Sheets => {
                let sheets = self
                    .sheets
                    .clone()
                    .context("store.sheets section is required for the sheets backend")?;
                let token = std::env::var(&self.token_env).with_context(|| {
                    format!("Sheets API token not set ({})", self.token_env)
                })?;
                if sheets.spreadsheet_id.is_empty() {
                    bail!("store.sheets.spreadsheet_id is empty");
                }
                Ok(Arc::new(SheetsStore::new(sheets, token)))
            }
        }
    }
}

fn default_sheets_token_env() -> String {
    "SHEETS_API_TOKEN".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
