//! Startup integrity checks.
//!
//! Run before the node replays proposals into memory, so a damaged store is
//! reported up front instead of surfacing halfway through recovery.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::Env;

use liquid_types::ProposalId;

use crate::environment::{BALLOTS_DB, META_DB, PROPOSALS_DB, TALLIES_DB};
use crate::LmdbError;

/// Outcome of [`check_integrity`].
#[derive(Debug, Default)]
pub struct IntegrityReport {
    /// Entry count per database that could be read.
    pub entries: BTreeMap<&'static str, u64>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn databases_checked(&self) -> usize {
        self.entries.len()
    }

    pub fn total_entries(&self) -> u64 {
        self.entries.values().sum()
    }
}

/// Expected key width per database; `None` means variable.
const EXPECTED_DATABASES: &[(&str, Option<usize>)] = &[
    (PROPOSALS_DB, Some(ProposalId::LEN)),
    (BALLOTS_DB, Some(ProposalId::LEN + 8)),
    (TALLIES_DB, Some(ProposalId::LEN)),
    (META_DB, None),
];

/// Open every database, count its entries and check key widths.
///
/// Problems are collected into the report; only failing to start a read
/// transaction is a hard error.
pub fn check_integrity(env: &Arc<Env>) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.read_txn()?;

    for &(name, key_len) in EXPECTED_DATABASES {
        let db = match env.open_database::<Bytes, Bytes>(&rtxn, Some(name)) {
            Ok(Some(db)) => db,
            Ok(None) => {
                report.errors.push(format!("database '{name}' is missing"));
                continue;
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("failed to open database '{name}': {e}"));
                continue;
            }
        };

        let iter = match db.iter(&rtxn) {
            Ok(iter) => iter,
            Err(e) => {
                report
                    .errors
                    .push(format!("failed to read database '{name}': {e}"));
                continue;
            }
        };

        let mut count = 0u64;
        let mut bad_keys = 0u64;
        for entry in iter {
            match entry {
                Ok((key, _)) => {
                    count += 1;
                    if key_len.is_some_and(|len| key.len() != len) {
                        bad_keys += 1;
                    }
                }
                Err(e) => {
                    report
                        .errors
                        .push(format!("read error in database '{name}': {e}"));
                    break;
                }
            }
        }
        if bad_keys > 0 {
            report.errors.push(format!(
                "database '{name}' has {bad_keys} keys of unexpected length"
            ));
        }
        report.entries.insert(name, count);
    }

    Ok(report)
}

/// Sanity check on the data directory before opening it.
///
/// A missing or empty directory is a fresh start. One that holds files but
/// no `data.mdb` most likely points at the wrong place.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    if path.join("data.mdb").exists() {
        return Ok(());
    }
    let occupied = std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    if occupied {
        return Err(format!(
            "directory {} holds files but no data.mdb",
            path.display()
        ));
    }
    Ok(())
}
