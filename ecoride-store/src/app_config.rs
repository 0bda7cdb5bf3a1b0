use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub eco: EcoConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    pub service_fee_percent: u32,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self { service_fee_percent: 20 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Maximum distance between the driver and the trip start when opening
    pub open_radius_m: f64,
    /// Maximum distance between the driver and the trip end when completing
    pub complete_radius_m: f64,
    /// Half-width of the opening window around departure
    pub open_window_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub cancel_empty_on_sweep: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            open_radius_m: 500.0,
            complete_radius_m: 500.0,
            open_window_minutes: 30,
            sweep_interval_seconds: 60,
            cancel_empty_on_sweep: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EcoConfig {
    pub co2_per_km: f64,
    pub trees_per_km: f64,
}

impl Default for EcoConfig {
    fn default() -> Self {
        Self {
            co2_per_km: ecoride_core::eco::DEFAULT_CO2_PER_KM,
            trees_per_km: ecoride_core::eco::DEFAULT_TREES_PER_KM,
        }
    }
}

impl From<&EcoConfig> for ecoride_core::EcoFactors {
    fn from(cfg: &EcoConfig) -> Self {
        ecoride_core::EcoFactors { co2_per_km: cfg.co2_per_km, trees_per_km: cfg.trees_per_km }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests: 100, window_seconds: 60 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `ECORIDE_SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("ECORIDE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
