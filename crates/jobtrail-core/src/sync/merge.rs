use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::ApplicationRecord;

/// Merge the remote list with the local one, remote winning on id.
///
/// Every remote record is taken; a local record is kept only when no remote
/// record has its id. Local edits to a record the server also has are
/// dropped regardless of timestamps. Records without an id are kept as-is.
///
/// The result is ordered newest `created_at` first. Records whose
/// `created_at` is missing or unparseable sort last; ties keep their merge
/// order (remote before local).
pub fn merge_remote_wins(
    remote: Vec<ApplicationRecord>,
    local: Vec<ApplicationRecord>,
) -> Vec<ApplicationRecord> {
    let mut merged: Vec<ApplicationRecord> = Vec::with_capacity(remote.len() + local.len());
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for record in remote {
        match record.id {
            // A later remote duplicate overwrites an earlier one
            Some(id) => match positions.get(&id) {
                Some(&index) => merged[index] = record,
                None => {
                    positions.insert(id, merged.len());
                    merged.push(record);
                }
            },
            None => merged.push(record),
        }
    }

    for record in local {
        match record.id {
            Some(id) if positions.contains_key(&id) => {}
            Some(id) => {
                positions.insert(id, merged.len());
                merged.push(record);
            }
            None => merged.push(record),
        }
    }

    merged.sort_by_cached_key(|r| Reverse(r.created_at_parsed()));
    merged
}
