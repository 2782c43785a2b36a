//! Read-only reference catalogs (departments, positions, shifts, schedules).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiError, CatalogSource};

/// Catalog categories used by reference fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Departamentos,
    Puestos,
    Turnos,
    Horarios,
}

impl CatalogKind {
    pub fn all() -> &'static [CatalogKind] {
        &[
            CatalogKind::Departamentos,
            CatalogKind::Puestos,
            CatalogKind::Turnos,
            CatalogKind::Horarios,
        ]
    }

    pub fn api_path(&self) -> &'static str {
        match self {
            CatalogKind::Departamentos => "/v1/departamentos/",
            CatalogKind::Puestos => "/v1/puestos/",
            CatalogKind::Turnos => "/v1/turnos/",
            CatalogKind::Horarios => "/v1/horarios/",
        }
    }
}

/// One selectable reference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub label: String,
}

/// Extract catalog entries from a list response.
///
/// Accepts a bare array, `{ "results": [...] }` or `{ "data": [...] }`.
/// Items without a usable id are skipped; the label comes from `nombre`,
/// then `label`, then `name`, falling back to the id.
pub fn parse_catalog(body: &Value) -> Vec<CatalogEntry> {
    let items: &[Value] = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match (map.get("results"), map.get("data")) {
            (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let id = match item.get("id")? {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let label = ["nombre", "label", "name"]
                .iter()
                .find_map(|k| item.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string());
            Some(CatalogEntry { id, label })
        })
        .collect()
}

/// Load state of one catalog within a form session
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogState {
    Pending,
    Loaded(Vec<CatalogEntry>),
    Failed(String),
}

/// Catalog states for the current form session
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    states: HashMap<CatalogKind, CatalogState>,
}

impl Catalogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_pending(&mut self, kind: CatalogKind) {
        self.states.insert(kind, CatalogState::Pending);
    }

    /// Record a fetch result; a failure only degrades label resolution
    pub fn apply(&mut self, kind: CatalogKind, result: Result<Vec<CatalogEntry>, ApiError>) {
        let state = match result {
            Ok(entries) => {
                debug!(?kind, count = entries.len(), "catalog loaded");
                CatalogState::Loaded(entries)
            }
            Err(err) => {
                warn!(?kind, error = %err, "catalog unavailable, showing raw identifiers");
                CatalogState::Failed(err.to_string())
            }
        };
        self.states.insert(kind, state);
    }

    pub fn state(&self, kind: CatalogKind) -> Option<&CatalogState> {
        self.states.get(&kind)
    }

    pub fn is_pending(&self, kind: CatalogKind) -> bool {
        matches!(self.states.get(&kind), Some(CatalogState::Pending))
    }

    pub fn entries(&self, kind: CatalogKind) -> &[CatalogEntry] {
        match self.states.get(&kind) {
            Some(CatalogState::Loaded(entries)) => entries,
            _ => &[],
        }
    }

    /// Label for `id`, or the raw identifier when the catalog has no match
    pub fn resolve_label(&self, kind: CatalogKind, id: i64) -> String {
        self.entries(kind)
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Time-bounded cache of fetched catalogs
#[derive(Debug)]
pub struct CatalogCache {
    ttl: Duration,
    entries: HashMap<CatalogKind, (Instant, Vec<CatalogEntry>)>,
}

impl CatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, kind: CatalogKind, now: Instant) -> Option<Vec<CatalogEntry>> {
        self.entries
            .get(&kind)
            .filter(|(fetched_at, _)| now.saturating_duration_since(*fetched_at) < self.ttl)
            .map(|(_, entries)| entries.clone())
    }

    pub fn insert(&mut self, kind: CatalogKind, entries: Vec<CatalogEntry>, now: Instant) {
        self.entries.insert(kind, (now, entries));
    }
}

/// Wraps a catalog source with a [`CatalogCache`]
pub struct CachedCatalogSource<S> {
    inner: S,
    cache: Mutex<CatalogCache>,
}

impl<S: CatalogSource> CachedCatalogSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(CatalogCache::new(ttl)),
        }
    }
}

#[async_trait]
impl<S: CatalogSource> CatalogSource for CachedCatalogSource<S> {
    async fn fetch(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ApiError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(entries) = cache.get(kind, Instant::now()) {
                debug!(?kind, "catalog served from cache");
                return Ok(entries);
            }
        }

        let entries = self.inner.fetch(kind).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(kind, entries.clone(), Instant::now());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockCatalogSource;
    use serde_json::json;

    #[test]
    fn test_parse_catalog_shapes() {
        let bare = json!([{ "id": 1, "nombre": "Ventas" }]);
        let paged = json!({ "count": 1, "results": [{ "id": 2, "nombre": "Compras" }] });
        let wrapped = json!({ "data": [{ "id": "3", "label": "Matutino" }] });

        assert_eq!(parse_catalog(&bare)[0].label, "Ventas");
        assert_eq!(parse_catalog(&paged)[0].id, 2);
        assert_eq!(
            parse_catalog(&wrapped),
            vec![CatalogEntry {
                id: 3,
                label: "Matutino".into()
            }]
        );
        assert!(parse_catalog(&json!({ "detail": "nope" })).is_empty());
    }

    #[test]
    fn test_parse_catalog_skips_items_without_id() {
        let body = json!([{ "nombre": "Sin id" }, { "id": 4 }]);
        let entries = parse_catalog(&body);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "4");
    }

    #[test]
    fn test_failed_catalog_resolves_raw_id() {
        let mut catalogs = Catalogs::new();
        catalogs.mark_pending(CatalogKind::Puestos);
        assert!(catalogs.is_pending(CatalogKind::Puestos));

        catalogs.apply(CatalogKind::Puestos, Err(ApiError::network("/v1/puestos/", "timeout")));
        assert!(!catalogs.is_pending(CatalogKind::Puestos));
        assert_eq!(catalogs.resolve_label(CatalogKind::Puestos, 12), "12");
    }

    #[test]
    fn test_loaded_catalog_resolves_label() {
        let mut catalogs = Catalogs::new();
        catalogs.apply(
            CatalogKind::Departamentos,
            Ok(vec![CatalogEntry {
                id: 3,
                label: "Ventas".into(),
            }]),
        );
        assert_eq!(catalogs.resolve_label(CatalogKind::Departamentos, 3), "Ventas");
        assert_eq!(catalogs.resolve_label(CatalogKind::Departamentos, 8), "8");
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let start = Instant::now();
        let mut cache = CatalogCache::new(Duration::from_secs(300));
        cache.insert(CatalogKind::Turnos, vec![], start);

        assert!(cache.get(CatalogKind::Turnos, start + Duration::from_secs(299)).is_some());
        assert!(cache.get(CatalogKind::Turnos, start + Duration::from_secs(300)).is_none());
        assert!(cache.get(CatalogKind::Horarios, start).is_none());
    }

    #[tokio::test]
    async fn test_cached_source_fetches_once() {
        let source = MockCatalogSource::new();
        source.set(
            CatalogKind::Horarios,
            vec![CatalogEntry {
                id: 1,
                label: "9 a 18".into(),
            }],
        );
        let calls = source.calls.clone();
        let cached = CachedCatalogSource::new(source, Duration::from_secs(60));

        cached.fetch(CatalogKind::Horarios).await.unwrap();
        cached.fetch(CatalogKind::Horarios).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
