// 🌍 Country Entity - Stable identity + refreshed values
//
// "Country name is the match key, country UUID is IDENTITY"
//
// - The id is generated on first sighting and never replaced
// - Every other field is overwritten on each refresh that sees the name
// - Names collide case-insensitively ("France" == "france")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// COUNTRY RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    // ========================================================================
    // IDENTITY (never changes once assigned)
    // ========================================================================
    /// Stable identity (UUID v4)
    pub id: String,

    /// Display name, unique case-insensitively
    pub name: String,

    // ========================================================================
    // VALUES (replaced on every refresh)
    // ========================================================================
    pub region: String,

    pub population: u64,

    /// First listed currency of the country, absent when it lists none
    pub currency_code: Option<String>,

    /// Rate against the feed's base currency, absent when the code has no rate
    pub exchange_rate: Option<f64>,

    /// Always present; exactly 0.0 when no rate is available
    pub estimated_gdp: f64,

    pub flag_url: String,

    /// Start time of the refresh batch that last touched this record
    pub last_refreshed_at: DateTime<Utc>,
}

impl CountryRecord {
    /// Create a record with a fresh identity and no currency data.
    pub fn new(name: &str, region: &str, population: u64, refreshed_at: DateTime<Utc>) -> Self {
        CountryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            region: region.to_string(),
            population,
            currency_code: None,
            exchange_rate: None,
            estimated_gdp: 0.0,
            flag_url: String::new(),
            last_refreshed_at: refreshed_at,
        }
    }

    /// Case-folded name used for matching and uniqueness.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Overwrite every value from `incoming`, keeping this record's id and name.
    pub fn absorb(&mut self, incoming: CountryRecord) {
        self.region = incoming.region;
        self.population = incoming.population;
        self.currency_code = incoming.currency_code;
        self.exchange_rate = incoming.exchange_rate;
        self.estimated_gdp = incoming.estimated_gdp;
        self.flag_url = incoming.flag_url;
        self.last_refreshed_at = incoming.last_refreshed_at;
    }
}

/// Normalize a country name for lookup. Trims, then lowercases (Unicode-aware).
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
