//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;

/// Which document store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// In-process store; data is lost on restart.
    Memory,
}

/// Connection parameters for the alternate MongoDB store.
///
/// Parsed and reported at startup only; the request workflow runs on the
/// document store selected by [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct AlternateStoreConfig {
    pub uri: String,
    pub db_name: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Firebase Web API key; without it accounts live in memory
    pub firebase_api_key: Option<String>,
    /// Endpoint of the category suggestion service
    pub suggest_api_url: Option<String>,
    /// Student dataset for the leaderboard (built-in dataset when unset)
    pub student_data_path: Option<String>,
    pub alternate_store: Option<AlternateStoreConfig>,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Code required for admin self-registration. Admin signup is disabled when unset.
    pub admin_signup_code: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StorageBackend::Firestore,
            "memory" => StorageBackend::Memory,
            other => return Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        };

        let alternate_store = non_empty_var("MONGODB_URI").map(|uri| AlternateStoreConfig {
            uri,
            db_name: non_empty_var("MONGODB_DB_NAME")
                .unwrap_or_else(|| "meritocracy_board".to_string()),
        });

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:9002".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            firebase_api_key: non_empty_var("FIREBASE_API_KEY"),
            suggest_api_url: non_empty_var("SUGGEST_API_URL"),
            student_data_path: non_empty_var("STUDENT_DATA_PATH"),
            alternate_store,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            admin_signup_code: non_empty_var("ADMIN_SIGNUP_CODE").map(|v| v.trim().to_string()),
        })
    }

    /// Config for tests: in-memory storage, fixed keys.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:9002".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            firebase_api_key: None,
            suggest_api_url: None,
            student_data_path: None,
            alternate_store: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            admin_signup_code: Some("letmein-admin".to_string()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
