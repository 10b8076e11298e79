// 🗄️ Country store - SQLite + WAL
//
// One table, keyed by UUID, unique on the case-folded name. Name matching
// goes through the `name_key` column (folded in Rust) so lookups and deletes
// agree with the reconciliation engine for non-ASCII names too.

use crate::entities::{name_key, CountryRecord};
use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::path::Path;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id, name, region, population, currency_code, exchange_rate,
                              estimated_gdp, flag_url, last_refreshed_at";

// ============================================================================
// STORE COLLABORATOR
// ============================================================================

/// Keyed record store the reconciliation engine and the query layer run against.
pub trait CountryStore {
    /// Records whose folded name is in `keys`.
    fn find_by_name_keys(&self, keys: &[String]) -> LedgerResult<Vec<CountryRecord>>;

    /// Case-insensitive point lookup.
    fn find_by_name(&self, name: &str) -> LedgerResult<Option<CountryRecord>>;

    /// Every record, ordered by name ascending.
    fn all(&self) -> LedgerResult<Vec<CountryRecord>>;

    /// One bulk insert followed by one save per update, all-or-nothing.
    fn write_batch(&mut self, inserts: &[CountryRecord], updates: &[CountryRecord]) -> LedgerResult<()>;

    /// Case-insensitive delete; `false` when nothing matched.
    fn delete_by_name(&mut self, name: &str) -> LedgerResult<bool>;

    fn count(&self) -> LedgerResult<usize>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> LedgerResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(LedgerError::persistence("setup"))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS countries (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            name_key TEXT UNIQUE NOT NULL,
            region TEXT NOT NULL,
            population INTEGER NOT NULL,
            currency_code TEXT,
            exchange_rate REAL,
            estimated_gdp REAL NOT NULL DEFAULT 0,
            flag_url TEXT NOT NULL,
            last_refreshed_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(LedgerError::persistence("setup"))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_countries_region ON countries(region)",
        [],
    )
    .map_err(LedgerError::persistence("setup"))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_countries_currency ON countries(currency_code)",
        [],
    )
    .map_err(LedgerError::persistence("setup"))?;

    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CountryRecord> {
    let population: i64 = row.get(3)?;
    let refreshed_str: String = row.get(8)?;
    let last_refreshed_at = DateTime::parse_from_rfc3339(&refreshed_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(CountryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        region: row.get(2)?,
        population: population.max(0) as u64,
        currency_code: row.get(4)?,
        exchange_rate: row.get(5)?,
        estimated_gdp: row.get(6)?,
        flag_url: row.get(7)?,
        last_refreshed_at,
    })
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteCountryStore {
    conn: Connection,
}

impl SqliteCountryStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let conn = Connection::open(path).map_err(LedgerError::persistence("open"))?;
        setup_database(&conn)?;
        info!(path = %path.display(), "country store opened");
        Ok(SqliteCountryStore { conn })
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory().map_err(LedgerError::persistence("open"))?;
        setup_database(&conn)?;
        Ok(SqliteCountryStore { conn })
    }

    fn insert_all(tx: &Transaction<'_>, records: &[CountryRecord]) -> rusqlite::Result<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO countries (
                id, name, name_key, region, population, currency_code,
                exchange_rate, estimated_gdp, flag_url, last_refreshed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;

        let mut inserted = 0;
        for record in records {
            inserted += stmt.execute(params![
                record.id,
                record.name,
                record.name_key(),
                record.region,
                record.population as i64,
                record.currency_code,
                record.exchange_rate,
                record.estimated_gdp,
                record.flag_url,
                format_timestamp(&record.last_refreshed_at),
            ])?;
        }
        Ok(inserted)
    }

    /// Save by id: insert if the id is unknown, otherwise replace the values.
    fn save(tx: &Transaction<'_>, record: &CountryRecord) -> rusqlite::Result<usize> {
        tx.execute(
            "INSERT INTO countries (
                id, name, name_key, region, population, currency_code,
                exchange_rate, estimated_gdp, flag_url, last_refreshed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                name_key = excluded.name_key,
                region = excluded.region,
                population = excluded.population,
                currency_code = excluded.currency_code,
                exchange_rate = excluded.exchange_rate,
                estimated_gdp = excluded.estimated_gdp,
                flag_url = excluded.flag_url,
                last_refreshed_at = excluded.last_refreshed_at",
            params![
                record.id,
                record.name,
                record.name_key(),
                record.region,
                record.population as i64,
                record.currency_code,
                record.exchange_rate,
                record.estimated_gdp,
                record.flag_url,
                format_timestamp(&record.last_refreshed_at),
            ],
        )
    }
}

impl CountryStore for SqliteCountryStore {
    fn find_by_name_keys(&self, keys: &[String]) -> LedgerResult<Vec<CountryRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::with_capacity(keys.len());

        // Stay under SQLite's bound-parameter limit
        for chunk in keys.chunks(500) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM countries WHERE name_key IN ({placeholders})"
            );

            let mut stmt = self
                .conn
                .prepare(&sql)
                .map_err(LedgerError::persistence("lookup existing"))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_record)
                .map_err(LedgerError::persistence("lookup existing"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(LedgerError::persistence("lookup existing"))?;
            found.extend(rows);
        }

        Ok(found)
    }

    fn find_by_name(&self, name: &str) -> LedgerResult<Option<CountryRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM countries WHERE name_key = ?1");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(LedgerError::persistence("lookup"))?;
        let mut rows = stmt
            .query_map(params![name_key(name)], row_to_record)
            .map_err(LedgerError::persistence("lookup"))?;

        rows.next()
            .transpose()
            .map_err(LedgerError::persistence("lookup"))
    }

    fn all(&self) -> LedgerResult<Vec<CountryRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM countries ORDER BY name ASC");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(LedgerError::persistence("list"))?;

        let records = stmt
            .query_map([], row_to_record)
            .map_err(LedgerError::persistence("list"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LedgerError::persistence("list"))?;

        Ok(records)
    }

    fn write_batch(&mut self, inserts: &[CountryRecord], updates: &[CountryRecord]) -> LedgerResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(LedgerError::persistence("begin batch"))?;

        if !inserts.is_empty() {
            let inserted = Self::insert_all(&tx, inserts).map_err(LedgerError::persistence("bulk insert"))?;
            debug!(inserted, "bulk insert staged");
        }

        for record in updates {
            Self::save(&tx, record).map_err(LedgerError::persistence("update"))?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().map_err(LedgerError::persistence("commit batch"))?;

        info!(inserted = inserts.len(), updated = updates.len(), "country batch committed");
        Ok(())
    }

    fn delete_by_name(&mut self, name: &str) -> LedgerResult<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM countries WHERE name_key = ?1", params![name_key(name)])
            .map_err(LedgerError::persistence("delete"))?;

        Ok(affected > 0)
    }

    fn count(&self) -> LedgerResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM countries", [], |row| row.get(0))
            .map_err(LedgerError::persistence("count"))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Helper function to create test countries with all required fields
    fn create_test_country(name: &str, region: &str, code: Option<&str>, gdp: f64) -> CountryRecord {
        let refreshed = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let mut record = CountryRecord::new(name, region, 1_000_000, refreshed);
        record.currency_code = code.map(str::to_string);
        record.exchange_rate = code.map(|_| 1.5);
        record.estimated_gdp = gdp;
        record.flag_url = format!("https://flagcdn.com/{name}.svg");
        record
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        let ghana = create_test_country("Ghana", "Africa", Some("GHS"), 1234.56);
        let chad = create_test_country("Chad", "Africa", None, 0.0);

        store.write_batch(&[ghana.clone(), chad.clone()], &[]).unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], chad, "ordered by name, round-trips exactly");
        assert_eq!(all[1], ghana);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        store
            .write_batch(&[create_test_country("Côte d'Ivoire", "Africa", Some("XOF"), 10.0)], &[])
            .unwrap();

        let found = store.find_by_name("CÔTE D'IVOIRE").unwrap();
        assert_eq!(found.map(|c| c.name), Some("Côte d'Ivoire".to_string()));
        assert!(store.find_by_name("Atlantis").unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_keys() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        store
            .write_batch(
                &[
                    create_test_country("France", "Europe", Some("EUR"), 5.0),
                    create_test_country("Spain", "Europe", Some("EUR"), 4.0),
                ],
                &[],
            )
            .unwrap();

        let found = store
            .find_by_name_keys(&["france".to_string(), "peru".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "France");

        assert!(store.find_by_name_keys(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_update_replaces_values_in_place() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        let mut peru = create_test_country("Peru", "Americas", Some("PEN"), 10.0);
        store.write_batch(&[peru.clone()], &[]).unwrap();

        peru.population = 34_000_000;
        peru.currency_code = None;
        peru.exchange_rate = None;
        peru.estimated_gdp = 0.0;
        store.write_batch(&[], &[peru.clone()]).unwrap();

        let stored = store.find_by_name("peru").unwrap().unwrap();
        assert_eq!(stored, peru);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        store
            .write_batch(&[create_test_country("Mali", "Africa", Some("XOF"), 1.0)], &[])
            .unwrap();

        // Second "Mali" violates the unique name key, so "Niger" must not land either
        let result = store.write_batch(
            &[
                create_test_country("Niger", "Africa", Some("XOF"), 1.0),
                create_test_country("MALI", "Africa", Some("XOF"), 1.0),
            ],
            &[],
        );

        match result {
            Err(LedgerError::Persistence { stage, .. }) => assert_eq!(stage, "bulk insert"),
            other => panic!("expected persistence failure, got {other:?}"),
        }
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.find_by_name("Niger").unwrap().is_none());
    }

    #[test]
    fn test_delete_by_name() {
        let mut store = SqliteCountryStore::open_in_memory().unwrap();
        store
            .write_batch(
                &[
                    create_test_country("Togo", "Africa", Some("XOF"), 1.0),
                    create_test_country("Benin", "Africa", Some("XOF"), 1.0),
                ],
                &[],
            )
            .unwrap();

        assert!(!store.delete_by_name("Atlantis").unwrap());
        assert_eq!(store.count().unwrap(), 2);

        assert!(store.delete_by_name("TOGO").unwrap());
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.find_by_name("togo").unwrap().is_none());
    }

    #[test]
    fn test_open_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("countries.db");

        {
            let mut store = SqliteCountryStore::open(&path).unwrap();
            store
                .write_batch(&[create_test_country("Fiji", "Oceania", Some("FJD"), 2.0)], &[])
                .unwrap();
        }

        let reopened = SqliteCountryStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
