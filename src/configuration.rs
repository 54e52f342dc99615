use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub client_ip: ClientIpSettings,
    #[serde(default)]
    pub token_cleanup: TokenCleanupSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Refresh token cookie attributes
#[derive(serde::Deserialize, Clone, Debug)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    /// Only disable for plain-HTTP local development.
    pub secure: bool,
    /// "strict", "lax" or "none"
    pub same_site: String,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "refresh_token".to_string(),
            path: "/api/auth".to_string(),
            secure: true,
            same_site: "strict".to_string(),
        }
    }
}

/// Reverse proxies whose forwarding headers are believed
#[derive(serde::Deserialize, Clone, Debug, Default)]
pub struct ClientIpSettings {
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// Background purge of expired refresh tokens
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TokenCleanupSettings {
    pub interval_seconds: u64,
}

impl TokenCleanupSettings {
    /// Never zero; `tokio::time::interval` rejects that.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for TokenCleanupSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        // e.g. APP__JWT__SECRET=... overrides jwt.secret
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
