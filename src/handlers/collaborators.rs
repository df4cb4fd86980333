//! In-memory collaborator implementations.
//!
//! Process-local fakes for the seams in [`super`]: a register-if-absent
//! set, a CRM record store with equality-filter queries, and a task queue
//! that records jobs instead of running them. None survive restart;
//! production deployments bring their own implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{CollaboratorError, CrmClient, DedupOracle, TaskQueue};

/// Process-local register-if-absent set.
#[derive(Debug, Default)]
pub struct InMemoryDedupOracle {
    seen: Mutex<FxHashSet<String>>,
}

impl InMemoryDedupOracle {
    /// Number of keys registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[async_trait]
impl DedupOracle for InMemoryDedupOracle {
    async fn register_if_absent(&self, key: &str) -> Result<bool, CollaboratorError> {
        Ok(self.seen.lock().insert(key.to_owned()))
    }
}

/// Process-local record store keyed by object type.
#[derive(Debug, Default)]
pub struct InMemoryCrm {
    records: Mutex<FxHashMap<String, Vec<Map<String, Value>>>>,
}

impl InMemoryCrm {
    /// Number of stored records for `object`.
    #[must_use]
    pub fn count(&self, object: &str) -> usize {
        self.records.lock().get(object).map_or(0, Vec::len)
    }
}

impl CrmClient for InMemoryCrm {
    fn query_records(
        &self,
        object: &str,
        filters: &Map<String, Value>,
    ) -> Result<Vec<Value>, CollaboratorError> {
        let records = self.records.lock();
        let matches = records
            .get(object)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|(key, want)| row.get(key) == Some(want)))
                    .cloned()
                    .map(Value::Object)
                    .collect()
            })
            .unwrap_or_default();
        Ok(matches)
    }

    fn create_record(
        &self,
        object: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, CollaboratorError> {
        let mut record = fields.clone();
        record
            .entry("id".to_owned())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        self.records
            .lock()
            .entry(object.to_owned())
            .or_default()
            .push(record.clone());
        Ok(Value::Object(record))
    }

    fn update_record(
        &self,
        object: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, CollaboratorError> {
        let mut records = self.records.lock();
        let rows = records
            .get_mut(object)
            .ok_or_else(|| CollaboratorError::Rejected(format!("unknown object '{object}'")))?;
        let row = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(record_id))
            .ok_or_else(|| {
                CollaboratorError::Rejected(format!("no {object} record with id '{record_id}'"))
            })?;
        for (key, value) in fields {
            row.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(row.clone()))
    }
}

/// A job captured by [`InMemoryTaskQueue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub reference: String,
    pub job: String,
    pub payload: Value,
}

/// Process-local queue that records jobs instead of running them.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    jobs: Mutex<Vec<QueuedTask>>,
}

impl InMemoryTaskQueue {
    /// Everything enqueued so far, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedTask> {
        self.jobs.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, job: &str, payload: Value) -> Result<String, CollaboratorError> {
        let reference = Uuid::new_v4().to_string();
        self.jobs.lock().push(QueuedTask {
            reference: reference.clone(),
            job: job.to_owned(),
            payload,
        });
        Ok(reference)
    }
}
