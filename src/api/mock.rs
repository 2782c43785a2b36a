//! In-memory collaborators for tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ApiError, CatalogEntry, CatalogKind, CatalogSource, RecordSource, Saved, SubmissionGateway,
    SubmitError,
};
use crate::records::{Record, RecordKind};

/// Mock catalog source with per-kind entries and failures
#[derive(Default)]
pub struct MockCatalogSource {
    entries: Arc<Mutex<HashMap<CatalogKind, Vec<CatalogEntry>>>>,
    failing: Arc<Mutex<HashSet<CatalogKind>>>,
    /// Record of kinds fetched, in order
    pub calls: Arc<Mutex<Vec<CatalogKind>>>,
}

impl MockCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: CatalogKind, entries: Vec<CatalogEntry>) {
        self.entries.lock().unwrap().insert(kind, entries);
    }

    /// Make every fetch of `kind` fail with a network error
    pub fn fail(&self, kind: CatalogKind) {
        self.failing.lock().unwrap().insert(kind);
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ApiError> {
        self.calls.lock().unwrap().push(kind);

        if self.failing.lock().unwrap().contains(&kind) {
            return Err(ApiError::network(kind.api_path(), "connection refused"));
        }

        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }
}

/// A submission seen by [`MockGateway`]
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub kind: RecordKind,
    pub record: Record,
}

/// Mock API: scripted submission outcomes plus stored records for editing
#[derive(Default)]
pub struct MockGateway {
    responses: Arc<Mutex<VecDeque<Result<Saved, SubmitError>>>>,
    records: Arc<Mutex<HashMap<(RecordKind, i64), Record>>>,
    /// Simulated network latency for every submission
    pub delay: Arc<Mutex<Option<Duration>>>,
    /// Record of submissions received
    pub submissions: Arc<Mutex<Vec<MockSubmission>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next submission; unscripted ones succeed
    pub fn push_response(&self, response: Result<Saved, SubmitError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn insert_record(&self, kind: RecordKind, record: Record) {
        if let Some(id) = record.id {
            self.records.lock().unwrap().insert((kind, id), record);
        }
    }

    pub fn get_submissions(&self) -> Vec<MockSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionGateway for MockGateway {
    async fn submit(&self, kind: RecordKind, record: &Record) -> Result<Saved, SubmitError> {
        self.submissions.lock().unwrap().push(MockSubmission {
            kind,
            record: record.clone(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(Saved {
            id: record.id.or(Some(1)),
        }))
    }
}

#[async_trait]
impl RecordSource for MockGateway {
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> Result<Record, ApiError> {
        self.records
            .lock()
            .unwrap()
            .get(&(kind, id))
            .cloned()
            .ok_or_else(|| ApiError::http(kind.api_path(), 404, "Not found."))
    }
}
