// 🔗 Record Merger - registry entry + exchange rate → CountryRecord
//
// Join key is the entry's FIRST currency code. Missing currencies and
// missing rates are normal states, not errors:
//
//   no currencies        → code None,  rate None, gdp 0.0
//   code without a rate  → code Some,  rate None, gdp 0.0
//   code with a rate     → code Some,  rate Some, gdp estimate
//   estimate not finite  → code Some,  rate None, gdp 0.0

use crate::entities::CountryRecord;
use crate::gdp::{estimate_gdp, usable_rate};
use crate::upstream::{ExchangeRateTable, RegistryEntry};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

/// Merge one refresh worth of registry entries with the rate table.
///
/// Every output record carries a fresh id and `refreshed_at`. Entries with
/// a blank name cannot be matched or stored, so they are skipped.
pub fn merge<R: Rng + ?Sized>(
    registry: &[RegistryEntry],
    rates: &ExchangeRateTable,
    refreshed_at: DateTime<Utc>,
    rng: &mut R,
) -> Vec<CountryRecord> {
    let mut records = Vec::with_capacity(registry.len());
    let mut without_rate = 0usize;

    for entry in registry {
        if entry.name.trim().is_empty() {
            warn!(region = %entry.region, "skipping registry entry without a name");
            continue;
        }

        let record = merge_entry(entry, rates, refreshed_at, rng);
        if record.exchange_rate.is_none() {
            without_rate += 1;
        }
        records.push(record);
    }

    debug!(
        merged = records.len(),
        without_rate,
        base = %rates.base_code,
        "merged registry with exchange rates"
    );

    records
}

/// Merge a single entry.
pub fn merge_entry<R: Rng + ?Sized>(
    entry: &RegistryEntry,
    rates: &ExchangeRateTable,
    refreshed_at: DateTime<Utc>,
    rng: &mut R,
) -> CountryRecord {
    let mut record = CountryRecord::new(&entry.name, &entry.region, entry.population, refreshed_at);
    record.flag_url = entry.flag_url.clone();

    if let Some(code) = entry.primary_currency() {
        record.currency_code = Some(code.to_string());

        if let Some(rate) = rates.rate_for(code).and_then(usable_rate) {
            let gdp = estimate_gdp(rng, entry.population, rate);
            if gdp.is_finite() {
                record.exchange_rate = Some(rate);
                record.estimated_gdp = gdp;
            } else {
                // Tiny rates overflow the division; treat them as unmatched
                warn!(country = %entry.name, currency = code, rate, "rate yields a non-finite estimate; ignoring it");
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::CurrencyDescriptor;
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};

    fn entry(name: &str, population: u64, codes: &[&str]) -> RegistryEntry {
        RegistryEntry {
            name: name.to_string(),
            capital: Some(format!("{name} City")),
            region: "Africa".to_string(),
            population,
            flag_url: format!("https://flagcdn.com/{}.svg", name.to_lowercase()),
            independent: true,
            currencies: codes
                .iter()
                .map(|c| CurrencyDescriptor {
                    code: c.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn rates(pairs: &[(&str, f64)]) -> ExchangeRateTable {
        ExchangeRateTable {
            base_code: "USD".to_string(),
            rates: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    fn batch_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 22, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_currency_list() {
        let mut rng = StdRng::seed_from_u64(1);
        let record = merge_entry(&entry("Antarctica", 1000, &[]), &rates(&[("USD", 1.0)]), batch_time(), &mut rng);

        assert_eq!(record.currency_code, None);
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, 0.0);
    }

    #[test]
    fn test_currency_without_rate_keeps_code() {
        let mut rng = StdRng::seed_from_u64(1);
        let record = merge_entry(&entry("Zimbabwe", 15_000_000, &["ZWL"]), &rates(&[("USD", 1.0)]), batch_time(), &mut rng);

        assert_eq!(record.currency_code.as_deref(), Some("ZWL"));
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, 0.0);
    }

    #[test]
    fn test_matched_rate_estimates_gdp() {
        let mut rng = StepRng::new(0, 0);
        let record = merge_entry(&entry("Ghana", 3_000, &["GHS"]), &rates(&[("GHS", 15.0)]), batch_time(), &mut rng);

        assert_eq!(record.currency_code.as_deref(), Some("GHS"));
        assert_eq!(record.exchange_rate, Some(15.0));
        assert_eq!(record.estimated_gdp, 3_000.0 * 1000.0 / 15.0);
        assert_eq!(record.flag_url, "https://flagcdn.com/ghana.svg");
    }

    #[test]
    fn test_only_first_currency_is_used() {
        let mut rng = StdRng::seed_from_u64(3);
        let record = merge_entry(
            &entry("Panama", 4_000_000, &["PAB", "USD"]),
            &rates(&[("USD", 1.0)]),
            batch_time(),
            &mut rng,
        );

        assert_eq!(record.currency_code.as_deref(), Some("PAB"));
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, 0.0);
    }

    #[test]
    fn test_non_positive_rate_counts_as_missing() {
        let mut rng = StdRng::seed_from_u64(3);
        let record = merge_entry(&entry("Nowhere", 10, &["NWH"]), &rates(&[("NWH", 0.0)]), batch_time(), &mut rng);

        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, 0.0);
    }

    #[test]
    fn test_subnormal_rate_counts_as_missing() {
        let mut rng = StdRng::seed_from_u64(3);
        let record = merge_entry(
            &entry("Tinyland", 50_000_000, &["TNY"]),
            &rates(&[("TNY", 1e-310)]),
            batch_time(),
            &mut rng,
        );

        assert_eq!(record.currency_code.as_deref(), Some("TNY"));
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, 0.0);
        assert_eq!(serde_json::to_value(&record).unwrap()["estimated_gdp"], 0.0);
    }

    #[test]
    fn test_merge_batch_ids_and_timestamp() {
        let mut rng = StdRng::seed_from_u64(5);
        let registry = vec![
            entry("Nigeria", 200_000_000, &["NGN"]),
            entry("Kenya", 50_000_000, &["KES"]),
            entry("   ", 1, &["USD"]),
            entry("Chad", 16_000_000, &[]),
        ];

        let records = merge(&registry, &rates(&[("NGN", 1600.0), ("KES", 130.0)]), batch_time(), &mut rng);

        assert_eq!(records.len(), 3, "blank-named entry is skipped");
        assert!(records.iter().all(|r| r.last_refreshed_at == batch_time()));

        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);

        assert!(records[0].estimated_gdp > 0.0);
        assert!(records[1].estimated_gdp > 0.0);
        assert_eq!(records[2].estimated_gdp, 0.0);
    }
}
