use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT: f64 = 20.0;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 5;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Where quizzes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local store; nothing survives a restart and no database is
    /// contacted.
    Memory,
}

impl StoreBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "in-memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

pub struct Config {
    pub port: u16,
    /// Free-form deployment name (`development`, `production`, ...), logged at startup.
    pub environment: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Connections the pool keeps open even when idle (`DB_MIN_CONNS`).
    pub db_min_connections: u32,
    pub db_max_lifetime: Duration,
    /// When `false`, the server starts without applying migrations.
    /// Set `RUN_MIGRATIONS=false` to manage migrations out-of-band; readiness
    /// only needs the `quizzes` table to exist. Defaults to `true`.
    pub run_migrations: bool,
    /// Tokens added to each client's bucket per second.
    pub rate_limit_per_sec: f64,
    /// Bucket capacity per client.
    pub rate_limit_burst: u32,
    /// Key clients by the first `X-Forwarded-For` entry instead of the socket
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: "development".to_string(),
            store_backend: StoreBackend::Postgres,
            database_url: DbParts::default().to_url(),
            db_max_connections: 25,
            db_min_connections: 0,
            db_max_lifetime: Duration::from_secs(5 * 60),
            run_migrations: true,
            rate_limit_per_sec: DEFAULT_RATE_LIMIT,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            trust_proxy: false,
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
        }
    }
}

// Custom Debug masks the database URL (it embeds the password) so the struct
// is safe to log.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("store_backend", &self.store_backend)
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_max_lifetime", &self.db_max_lifetime)
            .field("run_migrations", &self.run_migrations)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("trust_proxy", &self.trust_proxy)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

/// Connection settings used when `DATABASE_URL` is not set.
struct DbParts {
    host: String,
    port: String,
    user: String,
    password: String,
    name: String,
    sslmode: String,
}

impl Default for DbParts {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "5432".to_string(),
            user: "dev".to_string(),
            password: "dev".to_string(),
            name: "app_db".to_string(),
            sslmode: "disable".to_string(),
        }
    }
}

impl DbParts {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: env_or("DB_HOST", d.host),
            port: env_or("DB_PORT", d.port),
            user: env_or("DB_USER", d.user),
            password: env_or("DB_PASSWORD", d.password),
            name: env_or("DB_NAME", d.name),
            sslmode: env_or("DB_SSLMODE", d.sslmode),
        }
    }

    fn to_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.sslmode
        )
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DbParts::from_env().to_url());

        let rate_limit_per_sec = env_parse("RATE_LIMIT", d.rate_limit_per_sec);
        let rate_limit_per_sec = if rate_limit_per_sec.is_finite() && rate_limit_per_sec > 0.0 {
            rate_limit_per_sec
        } else {
            tracing::warn!(
                "RATE_LIMIT must be a positive number, defaulting to {DEFAULT_RATE_LIMIT}"
            );
            DEFAULT_RATE_LIMIT
        };

        let port = match env_parse("PORT", d.port) {
            0 => {
                tracing::warn!("PORT 0 is not a valid port number, defaulting to {DEFAULT_PORT}");
                DEFAULT_PORT
            }
            port => port,
        };

        Self {
            port,
            environment: env_or("APP_ENV", d.environment),
            store_backend: env_parse("STORE_BACKEND", d.store_backend),
            database_url,
            db_max_connections: env_parse("DB_MAX_OPEN_CONNS", d.db_max_connections),
            db_min_connections: env_parse("DB_MIN_CONNS", d.db_min_connections),
            db_max_lifetime: Duration::from_secs(
                60 * env_parse("DB_CONN_MAX_LIFETIME_MINUTES", 5_u64),
            ),
            run_migrations: env_flag("RUN_MIGRATIONS", d.run_migrations),
            rate_limit_per_sec,
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", d.rate_limit_burst),
            trust_proxy: env_flag("TRUST_PROXY", d.trust_proxy),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| split_origins(&s))
                .unwrap_or(d.cors_origins),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

/// Parse `key` from the environment, warning and falling back to `default`
/// when it is set but malformed.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{key} env var {raw:?} is invalid, defaulting to {default}");
            default
        }),
        _ => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map_or(default, |v| {
        match v.trim().to_lowercase().as_str() {
            "false" | "0" | "no" | "off" => false,
            "true" | "1" | "yes" | "on" => true,
            _ => default,
        }
    })
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
