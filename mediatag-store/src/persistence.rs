//! The three tables the daemon writes through, bundled.

use std::path::Path;

use mediatag_core::{MediaInfo, TagLink};

use crate::error::StoreError;
use crate::json_store::JsonTable;
use crate::memory::{FaultSwitch, MemoryTable};
use crate::repository::{Repository, TagRecord};

pub struct Persistence {
    pub tags: Box<dyn Repository<TagRecord>>,
    pub media: Box<dyn Repository<MediaInfo>>,
    pub links: Box<dyn Repository<TagLink>>,
}

impl Persistence {
    /// JSON tables under `dir` (created if absent).
    pub fn open_json(dir: &Path) -> Result<Self, StoreError> {
        let store = Self {
            tags: Box::new(JsonTable::<TagRecord>::open(dir)?),
            media: Box::new(JsonTable::<MediaInfo>::open(dir)?),
            links: Box::new(JsonTable::<TagLink>::open(dir)?),
        };
        tracing::info!(dir = %dir.display(), "store opened");
        Ok(store)
    }

    pub fn in_memory() -> Self {
        Self::in_memory_with_fault(FaultSwitch::default())
    }

    /// In-memory tables that all fail while `fault` is set.
    pub fn in_memory_with_fault(fault: FaultSwitch) -> Self {
        Self {
            tags: Box::new(MemoryTable::<TagRecord>::with_fault(fault.clone())),
            media: Box::new(MemoryTable::<MediaInfo>::with_fault(fault.clone())),
            links: Box::new(MemoryTable::<TagLink>::with_fault(fault)),
        }
    }
}
