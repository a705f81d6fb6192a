//! In-process tables for embedding and tests.
//!
//! A [`FaultSwitch`] shared between tables makes every subsequent call fail
//! with [`StoreError::Unavailable`], which is how the daemon's handling of
//! persistence failures is exercised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::repository::{Record, Repository};
use crate::rows::{self, Rows};

#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    pub fn set(&self, failing: bool) {
        self.0.store(failing, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MemoryTable<R: Record> {
    rows: Mutex<Rows<R>>,
    fault: FaultSwitch,
}

impl<R: Record> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::with_fault(FaultSwitch::default())
    }
}

impl<R: Record> MemoryTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(fault: FaultSwitch) -> Self {
        Self {
            rows: Mutex::new(Rows::<R>::new()),
            fault,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows<R>>, StoreError> {
        if self.fault.is_set() {
            return Err(StoreError::Unavailable(format!("table '{}' is switched off", R::TABLE)));
        }
        Ok(self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl<R: Record> Repository<R> for MemoryTable<R> {
    fn insert(&self, record: &R) -> Result<(), StoreError> {
        self.insert_batch(std::slice::from_ref(record))
    }

    fn insert_batch(&self, records: &[R]) -> Result<(), StoreError> {
        rows::insert(&mut *self.lock()?, records);
        Ok(())
    }

    fn update(&self, record: &R) -> Result<(), StoreError> {
        self.update_batch(std::slice::from_ref(record))
    }

    fn update_batch(&self, records: &[R]) -> Result<(), StoreError> {
        rows::update(&mut *self.lock()?, records)
    }

    fn remove(&self, key: R::Key) -> Result<(), StoreError> {
        self.remove_batch(&[key])
    }

    fn remove_batch(&self, keys: &[R::Key]) -> Result<(), StoreError> {
        rows::remove(&mut *self.lock()?, keys);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::TagRecord;
    use mediatag_core::TagId;

    fn tag(id: u32, count: usize, name: &str) -> TagRecord {
        TagRecord {
            id: TagId(id),
            count,
            name: name.into(),
        }
    }

    #[test]
    fn rows_follow_insert_update_and_remove() {
        let table = MemoryTable::<TagRecord>::new();
        table.insert_batch(&[tag(0, 0, "a"), tag(1, 0, "b")]).expect("insert");
        table.update(&tag(1, 3, "b")).expect("update");
        table.remove(TagId(0)).expect("remove");
        assert_eq!(table.get_all().expect("get_all"), vec![tag(1, 3, "b")]);

        assert!(matches!(table.update(&tag(7, 0, "x")), Err(StoreError::MissingRow { .. })));
    }

    #[test]
    fn fault_switch_fails_every_call_until_cleared() {
        let fault = FaultSwitch::default();
        let table = MemoryTable::<TagRecord>::with_fault(fault.clone());
        let record = TagRecord {
            id: TagId(0),
            count: 0,
            name: "a".into(),
        };
        table.insert(&record).expect("insert");

        fault.set(true);
        assert!(matches!(table.insert(&record), Err(StoreError::Unavailable(_))));
        assert!(table.get_all().is_err());

        fault.set(false);
        assert_eq!(table.get_all().expect("get_all"), vec![record]);
    }
}
