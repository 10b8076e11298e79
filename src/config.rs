// ⚙️ Runtime configuration - environment variables with defaults
//
// Binaries call `dotenvy::dotenv()` first, so a local `.env` file can
// provide any of these.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP server
    pub addr: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Country registry feed (JSON array)
    pub registry_url: String,

    /// Exchange-rate feed (JSON object with `rates`)
    pub rates_url: String,

    /// Bound applied to each upstream fetch
    pub fetch_timeout: Duration,

    /// Where the last rendered summary image lives
    pub summary_image_path: PathBuf,

    /// TrueType font used by the summary renderer
    pub font_path: PathBuf,

    /// Per-request bound on the HTTP surface
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            database_path: PathBuf::from("countries.db"),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            rates_url: DEFAULT_RATES_URL.to_string(),
            fetch_timeout: Duration::from_secs(10),
            summary_image_path: PathBuf::from("cache/summary.png"),
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            addr: lookup("ADDR").unwrap_or(defaults.addr),
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            registry_url: lookup("REGISTRY_URL").unwrap_or(defaults.registry_url),
            rates_url: lookup("RATES_URL").unwrap_or(defaults.rates_url),
            fetch_timeout: secs("FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
            summary_image_path: lookup("SUMMARY_IMAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.summary_image_path),
            font_path: lookup("FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.font_path),
            request_timeout: secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout),
        }
    }
}
