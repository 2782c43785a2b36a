//! REST collaborators for the record forms
//!
//! This module provides:
//! - Collaborator traits for catalogs, record loading and submission
//! - The reqwest-backed [`HttpClient`] implementing all three
//! - Token-based session handling
//! - In-memory fakes for tests

pub mod auth;
pub mod catalog;
pub mod choices;
pub mod client;
pub mod error;
pub mod mock;

pub use auth::{AuthSession, SessionUser, Tokens};
pub use catalog::{CachedCatalogSource, CatalogEntry, CatalogKind, CatalogState, Catalogs};
pub use choices::{Choice, ChoiceMap};
pub use client::HttpClient;
pub use error::{ApiError, SubmitError};

use async_trait::async_trait;

use crate::records::{Record, RecordKind};

/// Outcome of a successful submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Saved {
    /// Identifier assigned or confirmed by the server, when it returned one
    pub id: Option<i64>,
}

/// Supplier of read-only reference lists
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ApiError>;
}

/// Loads an existing record for editing
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch and normalize record `id` into the canonical shape
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> Result<Record, ApiError>;
}

/// Consumer of validated records
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Create (`record.id == None`) or update the record
    async fn submit(&self, kind: RecordKind, record: &Record) -> Result<Saved, SubmitError>;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for std::sync::Arc<T> {
    async fn fetch(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ApiError> {
        (**self).fetch(kind).await
    }
}
