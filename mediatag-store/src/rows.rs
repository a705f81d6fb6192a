//! Row-map mutations shared by the table backends.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::repository::Record;

pub(crate) type Rows<R> = BTreeMap<<R as Record>::Key, R>;

/// Insert or replace.
pub(crate) fn insert<R: Record>(rows: &mut Rows<R>, records: &[R]) {
    for record in records {
        rows.insert(record.key(), record.clone());
    }
}

/// Replace existing rows; fails without changing anything if any is missing.
pub(crate) fn update<R: Record>(rows: &mut Rows<R>, records: &[R]) -> Result<(), StoreError> {
    if let Some(missing) = records.iter().find(|r| !rows.contains_key(&r.key())) {
        return Err(StoreError::MissingRow {
            table: R::TABLE,
            key: format!("{:?}", missing.key()),
        });
    }
    insert(rows, records);
    Ok(())
}

/// Remove rows; absent keys are ignored. Returns how many rows went away.
pub(crate) fn remove<R: Record>(rows: &mut Rows<R>, keys: &[R::Key]) -> usize {
    keys.iter().filter(|key| rows.remove(key).is_some()).count()
}
