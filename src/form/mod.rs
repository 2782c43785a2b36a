//! Multi-step form state: values, step position, validation results and focus.
//!
//! [`FormController`] is the single owner of the live [`Record`] while a form
//! is open. It never performs I/O; drafts and submission are wired in by
//! [`crate::session::FormSession`].

pub mod debounce;
pub mod draft;
pub mod validator;

pub use debounce::Debouncer;
pub use draft::{DraftKey, DraftStore, Snapshot};
pub use validator::{can_advance, validate_field, validate_record, FieldIssue};

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::records::{FieldValue, FormSchema, Record};

/// Server keys that describe the whole record rather than a field
const RECORD_LEVEL_KEYS: &[&str] = &["non_field_errors", "detail"];

pub struct FormController {
    schema: FormSchema,
    record: Record,
    step: usize,
    /// Local validation failures by field
    errors: BTreeMap<String, String>,
    /// Server-reported failures by field
    server_errors: BTreeMap<String, Vec<String>>,
    /// Server messages not attributable to a field
    record_errors: Vec<String>,
    focus: Option<String>,
    dirty: bool,
}

impl FormController {
    pub fn new(schema: FormSchema) -> Self {
        let record = schema.defaults();
        Self {
            schema,
            record,
            step: 0,
            errors: BTreeMap::new(),
            server_errors: BTreeMap::new(),
            record_errors: Vec::new(),
            focus: None,
            dirty: false,
        }
    }

    /// Reset to the schema defaults overlaid with `existing`.
    ///
    /// Fields missing from `existing` (or `Unset` there) keep their documented
    /// default; keys outside the schema are dropped.
    pub fn initialize(&mut self, existing: Option<Record>) {
        let mut record = self.schema.defaults();

        if let Some(existing) = existing {
            record.id = existing.id;
            for (name, value) in existing.values {
                if self.schema.field(&name).is_none() {
                    continue;
                }
                if value != FieldValue::Unset {
                    record.set(name, value);
                }
            }
        }

        self.record = record;
        self.step = 0;
        self.errors.clear();
        self.server_errors.clear();
        self.record_errors.clear();
        self.focus = None;
        self.dirty = false;
        debug!(kind = ?self.schema.kind, id = ?self.record.id, "form initialized");
    }

    /// Overlay a restored draft field by field; unknown fields are ignored
    pub fn merge_draft(&mut self, snapshot: &Snapshot) {
        let mut restored = 0;
        for (name, value) in snapshot {
            if self.schema.field(name).is_some() {
                self.record.set(name.clone(), value.clone());
                restored += 1;
            }
        }
        debug!(restored, "draft merged");
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Give a newly created record the identifier the server assigned
    pub fn assign_id(&mut self, id: i64) {
        self.record.id = Some(id);
    }

    pub fn value(&self, name: &str) -> &FieldValue {
        self.record
            .get(name)
            .or_else(|| self.schema.field(name).map(|f| &f.default))
            .unwrap_or(&FieldValue::Unset)
    }

    /// Store a value without validating it.
    ///
    /// Text is passed through the field's sanitizer. Any error shown for the
    /// field is cleared. Returns false for names outside the schema.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        let Some(spec) = self.schema.field(name) else {
            debug!(field = name, "ignoring unknown field");
            return false;
        };

        let value = match (spec.sanitizer, value) {
            (Some(sanitizer), FieldValue::Text(text)) => FieldValue::Text(sanitizer.apply(&text)),
            (_, value) => value,
        };

        self.record.set(name, value);
        let cleared = self.errors.remove(name).is_some() | self.server_errors.remove(name).is_some();
        if cleared {
            self.refresh_focus();
        }
        self.dirty = true;
        true
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.schema.total_steps()
    }

    pub fn is_last_step(&self) -> bool {
        self.step == self.schema.last_step()
    }

    /// Jump to step `index`; out-of-range requests are ignored
    pub fn go_to_step(&mut self, index: usize) -> bool {
        if index >= self.schema.total_steps() {
            debug!(index, "ignoring out-of-range step");
            return false;
        }
        self.step = index;
        true
    }

    /// Advance if the current step's gating fields pass.
    ///
    /// On failure the invalid names are returned in declaration order, their
    /// messages become the field errors and the first one takes focus.
    pub fn next_step(&mut self) -> Result<usize, Vec<String>> {
        if let Err(invalid) = can_advance(&self.schema, &self.record, self.step) {
            for name in &invalid {
                if let Some(spec) = self.schema.field(name) {
                    let message = validate_field(spec, self.value(name))
                        .err()
                        .unwrap_or_default();
                    self.errors.insert(name.clone(), message);
                }
            }
            self.refresh_focus();
            debug!(step = self.step, ?invalid, "step gated");
            return Err(invalid);
        }

        if self.step < self.schema.last_step() {
            self.step += 1;
        }
        Ok(self.step)
    }

    /// Go back one step; never gated
    pub fn prev_step(&mut self) -> usize {
        self.step = self.step.saturating_sub(1);
        self.step
    }

    /// `round(100 * step / (total - 1))`; a single-step form is always complete
    pub fn progress_percent(&self) -> u8 {
        let last = self.schema.last_step();
        if last == 0 {
            return 100;
        }
        let percent = (100.0 * self.step as f64 / last as f64).round();
        percent.clamp(0.0, 100.0) as u8
    }

    /// Validate every field of every step before submission.
    ///
    /// On failure the form moves to the step owning the first invalid field.
    pub fn validate_for_submit(&mut self) -> Result<(), Vec<FieldIssue>> {
        let issues = validate_record(&self.schema, &self.record);
        self.errors = issues
            .iter()
            .map(|i| (i.field.clone(), i.message.clone()))
            .collect();
        self.refresh_focus();

        if issues.is_empty() {
            return Ok(());
        }
        if let Some(step) = issues.first().and_then(|i| self.schema.step_of(&i.field)) {
            self.step = step;
        }
        debug!(count = issues.len(), "submission blocked by validation");
        Err(issues)
    }

    /// Route server validation errors to their owning steps.
    ///
    /// Keys that are not form fields are kept as record-level messages.
    pub fn apply_server_errors(&mut self, errors: BTreeMap<String, Vec<String>>) {
        self.server_errors.clear();
        self.record_errors.clear();

        for (key, messages) in errors {
            if self.schema.step_of(&key).is_some() {
                self.server_errors.insert(key, messages);
            } else if RECORD_LEVEL_KEYS.contains(&key.as_str()) {
                self.record_errors.extend(messages);
            } else {
                self.record_errors
                    .extend(messages.into_iter().map(|m| format!("{}: {}", key, m)));
            }
        }

        self.refresh_focus();
        debug!(steps = ?self.steps_with_errors(), "server errors applied");
    }

    pub fn clear_server_errors(&mut self) {
        self.server_errors.clear();
        self.record_errors.clear();
        self.refresh_focus();
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn server_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.server_errors
    }

    pub fn record_errors(&self) -> &[String] {
        &self.record_errors
    }

    /// Message to show under a field: local error first, then the server's
    pub fn field_error(&self, name: &str) -> Option<String> {
        self.errors.get(name).cloned().or_else(|| {
            self.server_errors
                .get(name)
                .filter(|m| !m.is_empty())
                .map(|m| m.join(" "))
        })
    }

    /// First field with an error, by step then declaration order
    pub fn focus_target(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Steps that own at least one field with an error
    pub fn steps_with_errors(&self) -> BTreeSet<usize> {
        self.errors
            .keys()
            .chain(self.server_errors.keys())
            .filter_map(|name| self.schema.step_of(name))
            .collect()
    }

    /// Whether errors exist on steps other than the current one
    pub fn has_errors_elsewhere(&self) -> bool {
        self.steps_with_errors().iter().any(|s| *s != self.step)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and reset the change flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Copy of the current values for draft persistence
    pub fn snapshot(&self) -> Snapshot {
        self.record.values.clone()
    }

    fn refresh_focus(&mut self) {
        self.focus = self
            .schema
            .steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .find(|name| self.errors.contains_key(**name) || self.server_errors.contains_key(**name))
            .map(|name| name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{employee, RecordKind};

    fn employee_form() -> FormController {
        FormController::new(RecordKind::Employee.schema())
    }

    fn fill_step0(form: &mut FormController) {
        form.set_field("num_empleado", FieldValue::text("E-1"));
        form.set_field("nombres", FieldValue::text("Ana"));
        form.set_field("apellido_paterno", FieldValue::text("Ruiz"));
    }

    #[test]
    fn test_initialize_fills_missing_fields_with_defaults() {
        let mut form = employee_form();
        let existing = Record::with_id(5)
            .with("nombres", FieldValue::text("Luis"))
            .with("calle", FieldValue::Unset)
            .with("desconocido", FieldValue::text("x"));
        form.initialize(Some(existing));

        assert_eq!(form.record().id, Some(5));
        assert_eq!(form.value("nombres"), &FieldValue::text("Luis"));
        assert_eq!(form.value("calle"), &FieldValue::text(""));
        assert_eq!(form.value("activo"), &FieldValue::Bool(true));
        assert_eq!(form.value("departamento_id"), &FieldValue::Unset);
        assert!(form.record().get("desconocido").is_none());
        assert!(!form.is_dirty());
    }

    #[test]
    fn test_set_field_sanitizes_and_marks_dirty() {
        let mut form = employee_form();
        assert!(form.set_field("rfc", FieldValue::text("gode-561231-gr8")));
        assert_eq!(form.value("rfc"), &FieldValue::text("GODE561231GR8"));
        assert!(form.take_dirty());
        assert!(!form.is_dirty());
        assert!(!form.set_field("nope", FieldValue::text("x")));
    }

    #[test]
    fn test_go_to_step_out_of_range_is_noop() {
        let mut form = employee_form();
        assert!(form.go_to_step(3));
        assert!(!form.go_to_step(7));
        assert_eq!(form.current_step(), 3);
    }

    #[test]
    fn test_next_step_gates_and_focuses_first_invalid() {
        let mut form = employee_form();
        form.set_field("num_empleado", FieldValue::text("E-1"));
        form.set_field("apellido_paterno", FieldValue::text("Ruiz"));

        assert_eq!(form.next_step(), Err(vec!["nombres".to_string()]));
        assert_eq!(form.current_step(), 0);
        assert_eq!(form.focus_target(), Some("nombres"));
        assert!(form.field_error("nombres").is_some());

        form.set_field("nombres", FieldValue::text("Ana"));
        assert_eq!(form.focus_target(), None);
        assert_eq!(form.next_step(), Ok(1));
    }

    #[test]
    fn test_prev_step_never_gates() {
        let mut form = employee_form();
        form.go_to_step(2);
        assert_eq!(form.prev_step(), 1);
        assert_eq!(form.prev_step(), 0);
        assert_eq!(form.prev_step(), 0);
    }

    #[test]
    fn test_progress_percent() {
        let mut form = employee_form();
        let mut last = 0;
        for step in 0..form.total_steps() {
            form.go_to_step(step);
            let percent = form.progress_percent();
            assert!(percent >= last);
            last = percent;
        }
        form.go_to_step(0);
        assert_eq!(form.progress_percent(), 0);
        form.go_to_step(1);
        assert_eq!(form.progress_percent(), 17);
        form.go_to_step(employee::STEP_REVIEW);
        assert_eq!(form.progress_percent(), 100);

        let single = FormController::new(RecordKind::Department.schema());
        assert_eq!(single.progress_percent(), 100);
    }

    #[test]
    fn test_submit_validation_jumps_to_first_invalid_step() {
        let mut form = employee_form();
        fill_step0(&mut form);
        form.set_field("email", FieldValue::text("ana@"));
        form.go_to_step(employee::STEP_REVIEW);

        let issues = form.validate_for_submit().unwrap_err();
        assert_eq!(issues[0].field, "email");
        assert_eq!(form.current_step(), 1);
        assert_eq!(form.focus_target(), Some("email"));
    }

    #[test]
    fn test_server_errors_route_to_owning_step() {
        let mut form = employee_form();
        form.go_to_step(employee::STEP_REVIEW);

        let mut errors = BTreeMap::new();
        errors.insert("clabe".to_string(), vec!["CLABE inválida".to_string()]);
        errors.insert("non_field_errors".to_string(), vec!["Duplicado".to_string()]);
        errors.insert("foto".to_string(), vec!["Muy grande".to_string()]);
        form.apply_server_errors(errors);

        assert_eq!(
            form.steps_with_errors(),
            BTreeSet::from([employee::STEP_BANK])
        );
        assert!(form.has_errors_elsewhere());
        assert_eq!(form.focus_target(), Some("clabe"));
        assert_eq!(form.field_error("clabe").as_deref(), Some("CLABE inválida"));
        assert_eq!(form.record_errors(), &["foto: Muy grande", "Duplicado"]);

        form.set_field("clabe", FieldValue::text("012345678901234567"));
        assert!(form.steps_with_errors().is_empty());
        assert!(!form.has_errors_elsewhere());
    }

    #[test]
    fn test_merge_draft_keeps_defaults_for_absent_fields() {
        let mut form = employee_form();
        let mut draft = Snapshot::new();
        draft.insert("nombres".to_string(), FieldValue::text("Ana"));
        draft.insert("otro".to_string(), FieldValue::text("x"));
        form.merge_draft(&draft);

        assert_eq!(form.value("nombres"), &FieldValue::text("Ana"));
        assert_eq!(form.value("activo"), &FieldValue::Bool(true));
        assert!(form.record().get("otro").is_none());
    }
}
