//! Environment-driven configuration.
//!
//! Reads a `.env` file when present (via dotenvy), then the process
//! environment. Required values fail loudly at startup instead of deep in a
//! run.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("missing required environment variable: {name}")]
    #[diagnostic(
        code(paperflow::config::missing),
        help("Set the variable in the environment or in a .env file.")
    )]
    Missing { name: &'static str },
}

/// Application settings.
#[derive(Clone, Debug)]
pub struct Settings {
    // Language model
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model_name: String,

    // Archive (Craft)
    pub craft_api_base_url: String,
    pub craft_collection_id: String,

    // Feishu bot
    pub feishu_app_id: String,
    pub feishu_app_secret: String,
    pub feishu_verification_token: String,
    pub feishu_receive_id: String,
    pub feishu_receive_id_type: String,

    // Persistence
    pub sqlite_db_path: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { name })
}

fn or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Settings {
    /// Load settings from `.env` (if present) and the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            llm_base_url: or_default("LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key: required("LLM_API_KEY")?,
            llm_model_name: or_default("LLM_MODEL_NAME", "gpt-4"),

            craft_api_base_url: required("CRAFT_API_BASE_URL")?,
            craft_collection_id: required("CRAFT_COLLECTION_ID")?,

            feishu_app_id: required("FEISHU_APP_ID")?,
            feishu_app_secret: required("FEISHU_APP_SECRET")?,
            feishu_verification_token: required("FEISHU_VERIFICATION_TOKEN")?,
            feishu_receive_id: required("FEISHU_RECEIVE_ID")?,
            feishu_receive_id_type: or_default("FEISHU_RECEIVE_ID_TYPE", "chat_id"),

            sqlite_db_path: or_default("SQLITE_DB_PATH", "./data/workflow.db"),
        })
    }

    /// SQLite connection URL for the configured database path.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.sqlite_db_path)
    }
}
