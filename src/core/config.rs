use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub thesis_vault_server_config: ThesisVaultWebServerConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub borrowing: BorrowingConfig,
    pub viewer: ViewerConfig,
    pub scanner: ScannerConfig,
    pub jwt_auth_config: JwtAuthConfig,
    pub kiosk: KioskConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let base_path = std::env::current_dir()
            .map_err(|e| config::ConfigError::Message(format!("Failed to find the current dir: {}", e)))?;
        let config_dir = base_path.join("src/core/configurations");

        let app_environment: Environment = std::env::var("THESIS_VAULT_APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        let configurations = config::Config::builder()
            .add_source(
                config::File::from(config_dir.join(app_environment.as_str())).required(true),
            )
            .add_source(
                config::Environment::with_prefix("THESIS_VAULT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        configurations.try_deserialize()
    }
}

#[derive(Deserialize, Clone)]
pub struct ThesisVaultWebServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_gateway_timeout() -> u64 {
    10
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub folder: String,
    pub signed_url_ttl_seconds: u64,
    pub url_marker: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "thesis_files".to_string(),
            folder: "thesis-pdfs".to_string(),
            signed_url_ttl_seconds: 60 * 60,
            url_marker: "/storage/v1/object/".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct BorrowingConfig {
    pub access_duration_days: i64,
    pub borrow_qr_ttl_minutes: i64,
    pub copy_decrement_retries: u32,
    /// Enables the pending-transaction reconciliation job when set.
    pub reconcile_interval_seconds: Option<u64>,
}

impl Default for BorrowingConfig {
    fn default() -> Self {
        Self {
            access_duration_days: 7,
            borrow_qr_ttl_minutes: 15,
            copy_decrement_retries: 3,
            reconcile_interval_seconds: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ViewerConfig {
    pub download_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir().join("thesis_vault"),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScannerConfig {
    pub debounce_millis: u64,
    pub recent_scans_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_millis: 2000,
            recent_scans_limit: 10,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct JwtAuthConfig {
    pub secret: Secret<String>,
    /// Token lifetime in hours.
    pub token_expiration_time: i64,
}

#[derive(Deserialize, Clone)]
pub struct KioskConfig {
    pub api_key: Secret<String>,
}

/// The knobs the core flows read, detached from the transport-level config.
#[derive(Clone, Debug, Default)]
pub struct FlowSettings {
    pub storage: StorageConfig,
    pub borrowing: BorrowingConfig,
    pub viewer: ViewerConfig,
    pub scanner: ScannerConfig,
}

impl From<&AppConfig> for FlowSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            storage: config.storage.clone(),
            borrowing: config.borrowing.clone(),
            viewer: config.viewer.clone(),
            scanner: config.scanner.clone(),
        }
    }
}

pub enum Environment {
    Local,
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either `local`, `sandbox` or `production` ",
                other
            )),
        }
    }
}
