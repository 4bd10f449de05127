//! Field-level differences between two snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::snapshot::{is_bookkeeping, Snapshot};

/// Old and new value of one changed field
///
/// Stored as `{"anterior": .., "novo": ..}` in the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(rename = "anterior")]
    pub before: Option<String>,
    #[serde(rename = "novo")]
    pub after: Option<String>,
}

/// Changed fields keyed by name
pub type FieldDiff = BTreeMap<String, FieldChange>;

/// Fields of `after` whose value differs from `before`.
///
/// A field missing from `before` compares as null. Keys present only in
/// `before` and bookkeeping keys are ignored.
pub fn diff(before: &Snapshot, after: &Snapshot) -> FieldDiff {
    after
        .iter()
        .filter(|(key, _)| !is_bookkeeping(key))
        .filter_map(|(key, new)| {
            let old = before.get(key).map(str::to_string);
            if old.as_deref() == new.as_deref() {
                None
            } else {
                Some((
                    key.clone(),
                    FieldChange {
                        before: old,
                        after: new.clone(),
                    },
                ))
            }
        })
        .collect()
}
