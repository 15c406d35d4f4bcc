use config::{ConfigError, Environment, File};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Marks both session cookies `Secure`. Enable in production.
    pub secure_cookies: bool,
    pub storage: StorageBackend,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token and credential hashing settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub access_token_expiry: i64,  // seconds (900 = 15 minutes)
    pub refresh_token_expiry: i64, // seconds (604800 = 7 days)
    pub hash_cost: u32,
    /// Rotate the stored refresh hash with compare-and-set instead of a
    /// plain overwrite. Off by default.
    pub atomic_rotation: bool,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct CacheSettings {
    pub summary_ttl_seconds: u64,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 5001)?
        .set_default("application.secure_cookies", false)?
        .set_default("application.storage", "postgres")?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.port", 5432)?
        .set_default("database.host", "localhost")?
        .set_default("database.database_name", "spendwise")?
        .set_default("auth.issuer", "spendwise")?
        .set_default("auth.access_token_expiry", 900)?
        .set_default("auth.refresh_token_expiry", 604_800)?
        .set_default("auth.hash_cost", 10)?
        .set_default("auth.atomic_rotation", false)?
        .set_default("rate_limit.max_requests", 10)?
        .set_default("rate_limit.window_seconds", 900)?
        .set_default("cache.summary_ttl_seconds", 60)?
        .add_source(File::with_name("configuration").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
