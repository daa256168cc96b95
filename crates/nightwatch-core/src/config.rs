//! Environment-variable configuration loading.
//!
//! Settings are read once at startup with [`Config::from_env`]. Individual
//! getters are exposed separately so callers needing a single value (tests,
//! ad-hoc tools) don't have to construct a full [`Config`].

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::DetectionType;

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_required_string(key: &str) -> Result<String> {
    env_string(key).ok_or_else(|| Error::MissingConfig(key.to_string()))
}

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u32>().map_err(|_| Error::InvalidConfig {
            key: key.to_string(),
            reason: "not a non-negative integer".to_string(),
        }),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<f64>().map_err(|_| Error::InvalidConfig {
            key: key.to_string(),
            reason: "not a number".to_string(),
        }),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidConfig {
                key: key.to_string(),
                reason: "not a recognized boolean".to_string(),
            }),
        },
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Result<Duration> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => {
            let secs = raw.parse::<u64>().map_err(|_| Error::InvalidConfig {
                key: key.to_string(),
                reason: "not a non-negative integer number of seconds".to_string(),
            })?;
            Ok(Duration::from_secs(secs))
        }
    }
}

fn env_csv(key: &str) -> Vec<String> {
    env_string(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Per-provider AI settings derived from `AI_API_KEY_<NAME>` style variables.
#[derive(Debug, Clone)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub gemini: Option<String>,
    pub grok: Option<String>,
}

impl ProviderKeys {
    fn from_env() -> Self {
        Self {
            openai: env_string("AI_API_KEY_OPENAI"),
            anthropic: env_string("AI_API_KEY_ANTHROPIC"),
            gemini: env_string("AI_API_KEY_GEMINI"),
            grok: env_string("AI_API_KEY_GROK"),
        }
    }
}

/// Process-wide settings assembled from the environment at startup.
///
/// Loaded once in `nightwatchd::main` via [`Config::from_env`] after
/// `dotenvy::dotenv()` has populated `std::env` from an optional `.env` file.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub event_worker_count: u32,
    pub event_queue_capacity: u32,
    pub provider_keys: ProviderKeys,
    pub ai_provider_order: Vec<String>,
    pub description_prompt_override: Option<String>,
    pub ab_test_enabled: bool,
    pub ab_test_prompt: Option<String>,
    pub face_recognition_enabled: bool,
    pub vehicle_recognition_enabled: bool,
    pub person_match_threshold: f32,
    pub vehicle_match_threshold: f32,
    pub auto_create_person_entities: bool,
    pub auto_create_vehicle_entities: bool,
    pub daily_cost_cap_usd: Option<f64>,
    pub motion_sensor_timeout: Duration,
    pub motion_sensor_max_timeout: Duration,
    pub occupancy_sensor_timeout: Duration,
    pub occupancy_sensor_max_timeout: Duration,
    pub event_sensor_timeout: Duration,
}

impl Config {
    /// Number of worker tasks is clamped into `[2, 5]`; values outside that
    /// range are accepted but logged and clamped rather than rejected.
    pub const MIN_WORKERS: u32 = 2;
    pub const MAX_WORKERS: u32 = 5;

    /// Default bounded-queue capacity when `EVENT_QUEUE_CAPACITY` is unset.
    pub const DEFAULT_QUEUE_CAPACITY: u32 = 50;

    /// Default match threshold for person entities.
    pub const DEFAULT_PERSON_THRESHOLD: f32 = 0.70;

    /// Default match threshold for vehicle entities (fast-path exact-match
    /// lookups bypass this; see `nightwatch-entities`).
    pub const DEFAULT_VEHICLE_THRESHOLD: f32 = 0.65;

    /// Loads configuration from the process environment, applying the
    /// defaults documented on each field.
    pub fn from_env() -> Result<Self> {
        let database_url = env_required_string("DATABASE_URL")?;

        let raw_worker_count = env_u32("EVENT_WORKER_COUNT", 2)?;
        let event_worker_count = raw_worker_count.clamp(Self::MIN_WORKERS, Self::MAX_WORKERS);

        let ai_provider_order = {
            let order = env_csv("AI_PROVIDER_ORDER");
            if order.is_empty() {
                vec![
                    "openai".to_string(),
                    "grok".to_string(),
                    "anthropic".to_string(),
                    "gemini".to_string(),
                ]
            } else {
                order
            }
        };

        Ok(Self {
            database_url,
            event_worker_count,
            event_queue_capacity: env_u32("EVENT_QUEUE_CAPACITY", Self::DEFAULT_QUEUE_CAPACITY)?,
            provider_keys: ProviderKeys::from_env(),
            ai_provider_order,
            description_prompt_override: env_string("DESCRIPTION_PROMPT_OVERRIDE"),
            ab_test_enabled: env_bool("AB_TEST_ENABLED", false)?,
            ab_test_prompt: env_string("AB_TEST_PROMPT"),
            face_recognition_enabled: env_bool("FACE_RECOGNITION_ENABLED", true)?,
            vehicle_recognition_enabled: env_bool("VEHICLE_RECOGNITION_ENABLED", true)?,
            person_match_threshold: env_f64(
                "PERSON_MATCH_THRESHOLD",
                f64::from(Self::DEFAULT_PERSON_THRESHOLD),
            )? as f32,
            vehicle_match_threshold: env_f64(
                "VEHICLE_MATCH_THRESHOLD",
                f64::from(Self::DEFAULT_VEHICLE_THRESHOLD),
            )? as f32,
            auto_create_person_entities: env_bool("AUTO_CREATE_PERSON_ENTITIES", true)?,
            auto_create_vehicle_entities: env_bool("AUTO_CREATE_VEHICLE_ENTITIES", true)?,
            daily_cost_cap_usd: match env_string("DAILY_COST_CAP_USD") {
                None => None,
                Some(raw) => Some(raw.parse::<f64>().map_err(|_| Error::InvalidConfig {
                    key: "DAILY_COST_CAP_USD".to_string(),
                    reason: "not a number".to_string(),
                })?),
            },
            motion_sensor_timeout: env_duration_secs("MOTION_SENSOR_TIMEOUT", Duration::from_secs(30))?,
            motion_sensor_max_timeout: env_duration_secs(
                "MOTION_SENSOR_MAX_TIMEOUT",
                Duration::from_secs(600),
            )?,
            occupancy_sensor_timeout: env_duration_secs(
                "OCCUPANCY_SENSOR_TIMEOUT",
                Duration::from_secs(300),
            )?,
            occupancy_sensor_max_timeout: env_duration_secs(
                "OCCUPANCY_SENSOR_MAX_TIMEOUT",
                Duration::from_secs(1800),
            )?,
            event_sensor_timeout: env_duration_secs("EVENT_SENSOR_TIMEOUT", Duration::from_secs(60))?,
        })
    }

    /// Detection types currently enabled for entity extraction, derived from
    /// the recognition feature flags.
    #[must_use]
    pub fn entity_extraction_types(&self) -> HashSet<DetectionType> {
        let mut types = HashSet::new();
        if self.face_recognition_enabled {
            types.insert(DetectionType::Person);
        }
        if self.vehicle_recognition_enabled {
            types.insert(DetectionType::Vehicle);
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't clobber each other when run concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_nightwatch_env() {
        for (key, _) in env::vars() {
            if key.starts_with("AI_")
                || key.starts_with("EVENT_")
                || key.ends_with("_MATCH_THRESHOLD")
                || key == "DATABASE_URL"
                || key == "DESCRIPTION_PROMPT_OVERRIDE"
                || key == "AB_TEST_ENABLED"
                || key == "AB_TEST_PROMPT"
                || key == "FACE_RECOGNITION_ENABLED"
                || key == "VEHICLE_RECOGNITION_ENABLED"
                || key == "AUTO_CREATE_PERSON_ENTITIES"
                || key == "AUTO_CREATE_VEHICLE_ENTITIES"
                || key == "DAILY_COST_CAP_USD"
                || key.contains("SENSOR_TIMEOUT")
            {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_nightwatch_env();
        let result = Config::from_env();
        assert!(matches!(result, Err(Error::MissingConfig(key)) if key == "DATABASE_URL"));
    }

    #[test]
    fn worker_count_is_clamped_into_range() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_nightwatch_env();
        env::set_var("DATABASE_URL", "sqlite://test.db");
        env::set_var("EVENT_WORKER_COUNT", "25");
        let config = Config::from_env().unwrap();
        assert_eq!(config.event_worker_count, Config::MAX_WORKERS);

        env::set_var("EVENT_WORKER_COUNT", "0");
        let config = Config::from_env().unwrap();
        assert_eq!(config.event_worker_count, Config::MIN_WORKERS);
        clear_nightwatch_env();
    }

    #[test]
    fn default_provider_order_used_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_nightwatch_env();
        env::set_var("DATABASE_URL", "sqlite://test.db");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.ai_provider_order,
            vec!["openai", "grok", "anthropic", "gemini"]
        );
        clear_nightwatch_env();
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_nightwatch_env();
        env::set_var("DATABASE_URL", "sqlite://test.db");
        env::set_var("AB_TEST_ENABLED", "maybe");
        let result = Config::from_env();
        assert!(matches!(result, Err(Error::InvalidConfig { key, .. }) if key == "AB_TEST_ENABLED"));
        clear_nightwatch_env();
    }

    #[test]
    fn entity_extraction_types_follows_feature_flags() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_nightwatch_env();
        env::set_var("DATABASE_URL", "sqlite://test.db");
        env::set_var("VEHICLE_RECOGNITION_ENABLED", "false");
        let config = Config::from_env().unwrap();
        let types = config.entity_extraction_types();
        assert!(types.contains(&DetectionType::Person));
        assert!(!types.contains(&DetectionType::Vehicle));
        clear_nightwatch_env();
    }
}
