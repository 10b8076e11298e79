// ⚖️ Reconciliation Engine - incoming batch vs persisted countries
//
// Partition rule, keyed by the case-folded country name:
//
//   name unseen in store → INSERT (keeps its fresh id)
//   name already stored  → UPDATE (stored id + name kept, every value replaced)
//
// Existing records are indexed once in a HashMap, so the partition is
// O(N + M). Entries repeating a name inside one batch collapse onto the
// first occurrence; later values win.
//
// Write-back is one bulk insert then one save per update. The engine never
// re-reads after writing: callers report from the returned records.

use crate::db::CountryStore;
use crate::entities::CountryRecord;
use crate::error::LedgerResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

// ============================================================================
// RECONCILIATION PLAN
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub to_insert: Vec<CountryRecord>,
    pub to_update: Vec<CountryRecord>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len()
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Insert(usize),
    Update(usize),
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub inserted: usize,
    pub updated: usize,
    /// Reconciled set as written, inserts first then updates
    pub records: Vec<CountryRecord>,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} countries: {} inserted, {} updated",
            self.records.len(),
            self.inserted,
            self.updated
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine
    }

    /// Split `incoming` against `existing` without touching any store.
    pub fn partition(&self, incoming: Vec<CountryRecord>, existing: Vec<CountryRecord>) -> ReconciliationPlan {
        let mut existing_by_key: HashMap<String, CountryRecord> =
            existing.into_iter().map(|r| (r.name_key(), r)).collect();

        let mut plan = ReconciliationPlan::default();
        let mut slots: HashMap<String, Slot> = HashMap::with_capacity(incoming.len());

        for record in incoming {
            let key = record.name_key();

            match slots.get(&key).copied() {
                Some(Slot::Insert(i)) => plan.to_insert[i].absorb(record),
                Some(Slot::Update(i)) => plan.to_update[i].absorb(record),
                None => match existing_by_key.remove(&key) {
                    Some(mut current) => {
                        current.absorb(record);
                        slots.insert(key, Slot::Update(plan.to_update.len()));
                        plan.to_update.push(current);
                    }
                    None => {
                        slots.insert(key, Slot::Insert(plan.to_insert.len()));
                        plan.to_insert.push(record);
                    }
                },
            }
        }

        plan
    }

    /// Look up existing records, partition, and commit the batch.
    ///
    /// An empty `incoming` set is a successful no-op that never touches the store.
    pub fn reconcile<S: CountryStore + ?Sized>(
        &self,
        store: &mut S,
        incoming: Vec<CountryRecord>,
    ) -> LedgerResult<ReconciliationReport> {
        if incoming.is_empty() {
            debug!("nothing to reconcile");
            return Ok(ReconciliationReport::default());
        }

        let mut keys: Vec<String> = incoming.iter().map(CountryRecord::name_key).collect();
        keys.sort_unstable();
        keys.dedup();

        let existing = store.find_by_name_keys(&keys)?;
        let plan = self.partition(incoming, existing);

        store.write_batch(&plan.to_insert, &plan.to_update)?;

        let report = ReconciliationReport {
            inserted: plan.to_insert.len(),
            updated: plan.to_update.len(),
            records: plan.to_insert.into_iter().chain(plan.to_update).collect(),
        };
        info!("{}", report.summary());

        Ok(report)
    }
}
