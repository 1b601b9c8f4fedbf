//! Inner join of raw-content and derived-text record sets.
//!
//! Both sides are keyed by (url, correlation id). The derived side is indexed
//! once into a hash map, then each raw record probes it, so a join is linear in
//! the size of both inputs. Output follows raw-side order.
//!
//! When the derived side repeats a key, the last occurrence wins and earlier
//! ones are dropped. Repeats are counted in [`JoinStats::duplicate_derived_keys`]
//! since they usually mean correlation ids were mis-associated upstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use ccjoin_shared::{ExtractedRecord, JoinedRecord};

/// Counters for one join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub raw_records: usize,
    pub derived_records: usize,
    pub joined: usize,
    /// Raw records with no derived counterpart.
    pub missing_correlates: usize,
    /// Derived records shadowed by a later record with the same key.
    pub duplicate_derived_keys: usize,
}

/// Output of [`join_records`].
#[derive(Debug, Clone, Default)]
pub struct Join {
    pub records: Vec<JoinedRecord>,
    pub stats: JoinStats,
}

/// Derived text indexed by borrowed (url, correlation id).
pub struct DerivedIndex<'a> {
    by_key: HashMap<(&'a str, &'a str), &'a str>,
    duplicates: usize,
    len: usize,
}

impl<'a> DerivedIndex<'a> {
    /// Index `derived` in input order; later entries overwrite earlier ones.
    pub fn build(derived: &'a [ExtractedRecord]) -> Self {
        let mut by_key = HashMap::with_capacity(derived.len());
        let mut duplicates = 0;
        for record in derived {
            let key = (record.url.as_str(), record.correlation_id.as_str());
            if by_key.insert(key, record.content.as_str()).is_some() {
                duplicates += 1;
            }
        }
        Self {
            by_key,
            duplicates,
            len: derived.len(),
        }
    }

    /// Derived text for a key, if any.
    pub fn get(&self, url: &str, correlation_id: &str) -> Option<&'a str> {
        self.by_key.get(&(url, correlation_id)).copied()
    }

    /// Distinct keys indexed.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Entries dropped because a later entry shared their key.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Join raw pages with derived text on (url, correlation id).
///
/// Raw records without a derived counterpart are dropped, as are derived
/// records without a raw counterpart. Deterministic for equal inputs.
#[instrument(skip_all, fields(raw = raw.len(), derived = derived.len()))]
pub fn join_records(raw: &[ExtractedRecord], derived: &[ExtractedRecord]) -> Join {
    let index = DerivedIndex::build(derived);

    let mut records = Vec::new();
    let mut missing = 0;
    for page in raw {
        match index.get(&page.url, &page.correlation_id) {
            Some(text) => records.push(JoinedRecord {
                url: page.url.clone(),
                correlation_id: page.correlation_id.clone(),
                raw_content: page.content.clone(),
                derived_text: text.to_string(),
            }),
            None => missing += 1,
        }
    }

    let stats = JoinStats {
        raw_records: raw.len(),
        derived_records: index.len,
        joined: records.len(),
        missing_correlates: missing,
        duplicate_derived_keys: index.duplicates(),
    };

    debug!(
        joined = stats.joined,
        missing = stats.missing_correlates,
        duplicates = stats.duplicate_derived_keys,
        "join complete"
    );

    Join { records, stats }
}
