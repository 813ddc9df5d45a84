//! Audit job creation from storage items.
//!
//! One audit per pre-generated challenge, scheduled linearly across the
//! contract's active interval so the last audit lands on `store_end`.

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::{Audit, AuditPayload, StorageItem};

/// Build the audits for `item`, held by farmer `subject_id`.
///
/// With `n` challenges over `[begin, end]`, audit `i` is scheduled at
/// `begin + (end - begin) * (i + 1) / n`.
pub fn create_jobs_from_storage_item(subject_id: &str, item: &StorageItem) -> Vec<Audit> {
    let challenges = &item.challenges.challenges;
    let n = challenges.len();
    if n == 0 {
        return Vec::new();
    }

    let begin = item.contract.store_begin;
    let span_ms = (item.contract.store_end - begin).num_milliseconds();

    challenges
        .iter()
        .enumerate()
        .map(|(i, challenge)| {
            Audit::new(
                scheduled_at(begin, span_ms, i, n),
                AuditPayload {
                    subject_id: subject_id.to_string(),
                    merkle_root: item.challenges.root.clone(),
                    merkle_depth: item.challenges.depth,
                    challenge: challenge.clone(),
                    data_hash: item.data_hash.clone(),
                },
            )
        })
        .collect()
}

fn scheduled_at(begin: DateTime<Utc>, span_ms: i64, i: usize, n: usize) -> DateTime<Utc> {
    // i128 keeps span * (i + 1) exact for any realistic contract length
    let offset = i128::from(span_ms) * (i as i128 + 1) / n as i128;
    let offset = i64::try_from(offset).unwrap_or(span_ms);
    begin + Duration::milliseconds(offset)
}
