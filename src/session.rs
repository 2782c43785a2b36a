//! One open form: controller, draft persistence, catalogs and submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::api::{
    ApiError, CatalogEntry, CatalogKind, Catalogs, Saved, SubmissionGateway, SubmitError,
};
use crate::config::FormsConfig;
use crate::form::{Debouncer, DraftKey, DraftStore, FieldIssue, FormController, Snapshot};
use crate::records::{FieldKind, FieldValue, FormSchema, Record, RecordKind};
use crate::storage::KeyValueStore;

/// Shared "is the form still open" flag checked by in-flight work
#[derive(Debug, Clone)]
pub struct MountFlag(Arc<AtomicBool>);

impl MountFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for MountFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Editing,
    Submitting,
    Saved(Option<i64>),
    /// The server rejected specific fields; they are shown on their steps
    Rejected,
    /// Unclassified failure; the form is left as it was
    Failed(String),
}

/// A validated record on its way to the gateway
pub struct SubmitTicket {
    pub kind: RecordKind,
    pub record: Record,
    key: DraftKey,
    drafts: Option<DraftStore>,
    mount: MountFlag,
}

impl std::fmt::Debug for SubmitTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitTicket")
            .field("kind", &self.kind)
            .field("record", &self.record)
            .field("key", &self.key)
            .field("mount", &self.mount)
            .finish_non_exhaustive()
    }
}

impl SubmitTicket {
    /// Submit and hand back the result, or `None` if the form closed meanwhile.
    ///
    /// A successful save removes the draft even when the form is gone.
    pub async fn send(self, gateway: &dyn SubmissionGateway) -> Option<Result<Saved, SubmitError>> {
        let result = gateway.submit(self.kind, &self.record).await;

        if result.is_ok() {
            if let Some(drafts) = &self.drafts {
                drafts.discard(self.key);
            }
        }

        if self.mount.is_mounted() {
            Some(result)
        } else {
            debug!(kind = self.kind.label(), "form closed before submission finished, result ignored");
            None
        }
    }
}

pub struct FormSession {
    controller: FormController,
    drafts: Option<DraftStore>,
    draft_key: DraftKey,
    debouncer: Debouncer<Snapshot>,
    catalogs: Catalogs,
    mount: MountFlag,
    status: SessionStatus,
    flush_on_close: bool,
    /// Set once a create succeeded without returning an id; nothing can be re-sent
    locked: bool,
}

impl FormSession {
    /// Open a form for a new (`existing == None`) or loaded record.
    ///
    /// New records pick up the stored create draft, if any; existing records
    /// never consult drafts. Reference catalogs start out pending.
    pub fn mount(
        schema: FormSchema,
        existing: Option<Record>,
        store: Arc<dyn KeyValueStore>,
        forms: &FormsConfig,
    ) -> Self {
        let drafts = schema.drafts.then(|| DraftStore::new(store));

        let mut controller = FormController::new(schema);
        controller.initialize(existing);
        let draft_key = DraftKey::for_record(controller.record());

        if let (Some(drafts), DraftKey::Create) = (&drafts, draft_key) {
            if let Some(snapshot) = drafts.load(draft_key) {
                info!(key = %draft_key, "restoring draft");
                controller.merge_draft(&snapshot);
            }
        }

        let mut catalogs = Catalogs::new();
        for kind in catalog_kinds(controller.schema()) {
            catalogs.mark_pending(kind);
        }

        Self {
            controller,
            drafts,
            draft_key,
            debouncer: Debouncer::new(forms.draft_debounce()),
            catalogs,
            mount: MountFlag::new(),
            status: SessionStatus::Editing,
            flush_on_close: forms.flush_on_close,
            locked: false,
        }
    }

    pub fn controller(&self) -> &FormController {
        &self.controller
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn draft_key(&self) -> DraftKey {
        self.draft_key
    }

    pub fn mount_flag(&self) -> MountFlag {
        self.mount.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    /// Whether edits and submissions are refused
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn kind(&self) -> RecordKind {
        self.controller.schema().kind
    }

    /// Catalogs the form's reference fields need
    pub fn catalog_kinds(&self) -> Vec<CatalogKind> {
        catalog_kinds(self.controller.schema())
    }

    pub fn apply_catalog(&mut self, kind: CatalogKind, result: Result<Vec<CatalogEntry>, ApiError>) {
        if self.mount.is_mounted() {
            self.catalogs.apply(kind, result);
        }
    }

    /// Update a field and restart the draft timer
    pub fn set_field(&mut self, name: &str, value: FieldValue, now: Instant) {
        if self.locked {
            debug!(field = name, "form locked after save, edit ignored");
            return;
        }
        if !self.controller.set_field(name, value) {
            return;
        }
        if self.controller.take_dirty() && self.drafts.is_some() {
            self.debouncer.schedule(self.controller.snapshot(), now);
        }
        if matches!(self.status, SessionStatus::Saved(_) | SessionStatus::Failed(_)) {
            self.status = SessionStatus::Editing;
        }
    }

    /// Write the draft once the quiet period has passed
    pub fn tick(&mut self, now: Instant) {
        if let (Some(snapshot), Some(drafts)) = (self.debouncer.poll(now), &self.drafts) {
            drafts.save(self.draft_key, &snapshot);
        }
    }

    pub fn next_step(&mut self) -> Result<usize, Vec<String>> {
        self.controller.next_step()
    }

    pub fn prev_step(&mut self) -> usize {
        self.controller.prev_step()
    }

    pub fn go_to_step(&mut self, index: usize) -> bool {
        self.controller.go_to_step(index)
    }

    /// Validate the whole record and, if clean, produce a submission ticket.
    ///
    /// A locked form yields no ticket and no issues.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, Vec<FieldIssue>> {
        if self.locked {
            return Err(Vec::new());
        }
        self.controller.validate_for_submit()?;
        self.controller.clear_server_errors();
        self.status = SessionStatus::Submitting;

        Ok(SubmitTicket {
            kind: self.kind(),
            record: self.controller.record().clone(),
            key: self.draft_key,
            drafts: self.drafts.clone(),
            mount: self.mount.clone(),
        })
    }

    /// Apply a submission result; ignored once the form is closed
    pub fn finish_submit(&mut self, result: Result<Saved, SubmitError>) {
        if !self.mount.is_mounted() {
            debug!("ignoring submission result after close");
            return;
        }

        match result {
            Ok(saved) => {
                self.debouncer.cancel();
                if let Some(drafts) = &self.drafts {
                    drafts.discard(self.draft_key);
                }
                info!(kind = self.kind().label(), id = ?saved.id, "saved");
                if self.controller.record().is_new() {
                    self.adopt_created(saved.id);
                }
                self.status = SessionStatus::Saved(saved.id);
            }
            Err(SubmitError::Fields(errors)) => {
                self.controller.apply_server_errors(errors);
                self.status = SessionStatus::Rejected;
            }
            Err(SubmitError::Unexpected(message)) => {
                warn!(%message, "submission failed");
                self.status = SessionStatus::Failed(message);
            }
        }
    }

    /// A created record continues as an edit of the new id; later saves update
    /// it and drafts move off the create key.
    fn adopt_created(&mut self, id: Option<i64>) {
        match id {
            Some(id) => {
                self.controller.assign_id(id);
                self.draft_key = DraftKey::Edit(id);
                debug!(key = %self.draft_key, "form now edits the created record");
            }
            None => {
                self.locked = true;
                debug!("created record has no id, form locked");
            }
        }
    }

    /// Validate, submit and apply the result in one go
    pub async fn submit(&mut self, gateway: &dyn SubmissionGateway) -> Result<(), Vec<FieldIssue>> {
        let ticket = self.begin_submit()?;
        if let Some(result) = ticket.send(gateway).await {
            self.finish_submit(result);
        }
        Ok(())
    }

    /// Close the form: flush or drop the pending draft write, never both.
    ///
    /// Returns whether a pending draft was written.
    pub fn close(&mut self) -> bool {
        self.mount.unmount();

        let pending = if self.flush_on_close {
            self.debouncer.flush()
        } else {
            self.debouncer.cancel();
            None
        };

        match (pending, &self.drafts) {
            (Some(snapshot), Some(drafts)) => drafts.save(self.draft_key, &snapshot),
            _ => false,
        }
    }
}

fn catalog_kinds(schema: &FormSchema) -> Vec<CatalogKind> {
    let mut kinds = Vec::new();
    for field in &schema.fields {
        if let FieldKind::Reference(kind) = field.kind {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
    }
    kinds
}
