// 🔎 Query Layer - filter, sort and aggregate the persisted countries
//
// Normalization is deliberately asymmetric:
//   region   → compared lower-cased on both sides (case-insensitive)
//   currency → the filter value is upper-cased, stored codes are compared as-is
//
// Unknown sort keys fall back to name ascending instead of failing.

use crate::db::CountryStore;
use crate::entities::CountryRecord;
use crate::error::LedgerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// SORT KEY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    GdpDesc,
    GdpAsc,
    PopulationDesc,
    PopulationAsc,
    #[default]
    NameAsc,
}

impl SortKey {
    /// Parse a query-string value; anything unrecognized is `NameAsc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("gdp_desc") => SortKey::GdpDesc,
            Some("gdp_asc") => SortKey::GdpAsc,
            Some("population_desc") => SortKey::PopulationDesc,
            Some("population_asc") => SortKey::PopulationAsc,
            _ => SortKey::NameAsc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::GdpDesc => "gdp_desc",
            SortKey::GdpAsc => "gdp_asc",
            SortKey::PopulationDesc => "population_desc",
            SortKey::PopulationAsc => "population_asc",
            SortKey::NameAsc => "name_asc",
        }
    }

    fn compare(&self, a: &CountryRecord, b: &CountryRecord) -> Ordering {
        match self {
            SortKey::GdpDesc => b.estimated_gdp.total_cmp(&a.estimated_gdp),
            SortKey::GdpAsc => a.estimated_gdp.total_cmp(&b.estimated_gdp),
            SortKey::PopulationDesc => b.population.cmp(&a.population),
            SortKey::PopulationAsc => a.population.cmp(&b.population),
            SortKey::NameAsc => a.name.cmp(&b.name),
        }
    }
}

// ============================================================================
// COUNTRY QUERY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryQuery {
    pub region: Option<String>,
    pub currency: Option<String>,
    pub sort: SortKey,
}

impl CountryQuery {
    /// Build from raw query-string values. Blank filters are ignored.
    pub fn from_params(region: Option<&str>, currency: Option<&str>, sort: Option<&str>) -> Self {
        let non_blank = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        CountryQuery {
            region: non_blank(region),
            currency: non_blank(currency),
            sort: SortKey::parse(sort),
        }
    }

    pub fn matches(&self, record: &CountryRecord) -> bool {
        let region_ok = self
            .region
            .as_ref()
            .map_or(true, |r| record.region.to_lowercase() == r.to_lowercase());

        let currency_ok = self
            .currency
            .as_ref()
            .map_or(true, |c| record.currency_code.as_deref() == Some(c.to_uppercase().as_str()));

        region_ok && currency_ok
    }

    /// Filter then stable-sort. Total is the filtered size (no pagination).
    pub fn apply(&self, records: Vec<CountryRecord>) -> QueryResult {
        let mut countries: Vec<CountryRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        countries.sort_by(|a, b| self.sort.compare(a, b));

        QueryResult {
            total: countries.len(),
            countries,
        }
    }

    pub fn run<S: CountryStore + ?Sized>(&self, store: &S) -> LedgerResult<QueryResult> {
        Ok(self.apply(store.all()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub countries: Vec<CountryRecord>,
    pub total: usize,
}

// ============================================================================
// STATUS AGGREGATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub total_countries: usize,
    /// Unix epoch when the dataset is empty
    pub last_refreshed_at: DateTime<Utc>,
}

impl StatusSummary {
    pub fn from_records(records: &[CountryRecord]) -> Self {
        StatusSummary {
            total_countries: records.len(),
            last_refreshed_at: latest_refresh(records),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_countries == 0
    }
}

pub fn status<S: CountryStore + ?Sized>(store: &S) -> LedgerResult<StatusSummary> {
    Ok(StatusSummary::from_records(&store.all()?))
}

/// Most recent `last_refreshed_at`, or the Unix epoch for an empty set.
pub fn latest_refresh(records: &[CountryRecord]) -> DateTime<Utc> {
    records
        .iter()
        .map(|r| r.last_refreshed_at)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
