//! In-memory health record store

use async_trait::async_trait;
use bridge_traits::{error::Result, DataQuery, HealthDataSource, HealthRecord};
use parking_lot::RwLock;
use tracing::debug;

/// Health records kept in memory, queried by type and time window.
#[derive(Debug, Default)]
pub struct InMemoryHealthStore {
    records: RwLock<Vec<HealthRecord>>,
}

impl InMemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<HealthRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn insert(&self, record: HealthRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn matches(query: &DataQuery, record: &HealthRecord) -> bool {
        if let Some(data_type) = &query.data_type {
            if &record.data_type != data_type {
                return false;
            }
        }
        if let Some(start) = query.start_time {
            if record.date_to < start {
                return false;
            }
        }
        if let Some(end) = query.end_time {
            if record.date_from > end {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl HealthDataSource for InMemoryHealthStore {
    async fn query(&self, query: &DataQuery) -> Result<Vec<HealthRecord>> {
        let mut found: Vec<HealthRecord> = self
            .records
            .read()
            .iter()
            .filter(|record| Self::matches(query, record))
            .cloned()
            .collect();
        found.sort_by_key(|record| record.date_from);
        debug!(count = found.len(), data_type = ?query.data_type, "In-memory query");
        Ok(found)
    }
}
