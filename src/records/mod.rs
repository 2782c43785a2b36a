//! Record data model: field values, field specs, step layout and form schemas.
//!
//! A [`FormSchema`] describes one editable entity (employee, department or job
//! position): the ordered fields, which step owns each field, which fields gate
//! forward navigation, and the neutral default for every field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::catalog::CatalogKind;

pub mod department;
pub mod employee;
pub mod normalize;
pub mod payload;
pub mod position;

pub use normalize::normalize_record;
pub use payload::to_payload;

/// A single field value as held by the form.
///
/// Serialized untagged so drafts and payloads read like plain JSON
/// (`Unset` is `null`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Unset,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// True for `Unset` and for text that is blank after trimming
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Unset => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Coerce to an integer the way a numeric select input would
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Decimal(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Decimal(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => match s.trim() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// String form used by text inputs and the review page
    pub fn display(&self) -> String {
        match self {
            FieldValue::Unset => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Decimal(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// Which entity a schema edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Employee,
    Department,
    Position,
}

impl RecordKind {
    /// Collection path on the REST API (relative to the base URL)
    pub fn api_path(&self) -> &'static str {
        match self {
            RecordKind::Employee => "/v1/empleados/",
            RecordKind::Department => "/v1/departamentos/",
            RecordKind::Position => "/v1/puestos/",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Employee => "empleado",
            RecordKind::Department => "departamento",
            RecordKind::Position => "puesto",
        }
    }

    pub fn schema(&self) -> FormSchema {
        match self {
            RecordKind::Employee => employee::schema(),
            RecordKind::Department => department::schema(),
            RecordKind::Position => position::schema(),
        }
    }
}

/// Semantic type of a field, which selects its validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    ShortText,
    LongText,
    Email,
    /// ISO `YYYY-MM-DD`
    Date,
    Numeric,
    Flag,
    /// Numeric identifier into a catalog
    Reference(CatalogKind),
    /// One of the field's declared option values
    Choice,
}

/// A selectable value for choice fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Input cleanup applied on every edit of a text field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitizer {
    /// Uppercase, keep `A-Z0-9` only, cap at the given length
    UpperAlnum(usize),
    /// Keep ASCII digits only, cap at the given length
    Digits(usize),
}

impl Sanitizer {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            Sanitizer::UpperAlnum(max) => raw
                .to_uppercase()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(*max)
                .collect(),
            Sanitizer::Digits(max) => raw
                .chars()
                .filter(char::is_ascii_digit)
                .take(*max)
                .collect(),
        }
    }
}

/// Schema definition for a single form field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// API field name
    pub name: &'static str,
    /// Label shown next to the input
    pub label: &'static str,
    pub kind: FieldKind,
    /// Whether this field gates its step
    pub required: bool,
    /// Minimum trimmed length for required text (0 = non-empty only)
    pub min_len: usize,
    pub default: FieldValue,
    pub sanitizer: Option<Sanitizer>,
    pub options: &'static [ChoiceOption],
}

impl FieldSpec {
    fn new(name: &'static str, label: &'static str, kind: FieldKind, default: FieldValue) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            min_len: 0,
            default,
            sanitizer: None,
            options: &[],
        }
    }

    pub fn short_text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::ShortText, FieldValue::text(""))
    }

    pub fn long_text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::LongText, FieldValue::text(""))
    }

    pub fn email(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Email, FieldValue::text(""))
    }

    pub fn date(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Date, FieldValue::text(""))
    }

    pub fn numeric(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Numeric, FieldValue::text(""))
    }

    pub fn flag(name: &'static str, label: &'static str, default: bool) -> Self {
        Self::new(name, label, FieldKind::Flag, FieldValue::Bool(default))
    }

    pub fn reference(name: &'static str, label: &'static str, catalog: CatalogKind) -> Self {
        Self::new(name, label, FieldKind::Reference(catalog), FieldValue::Unset)
    }

    pub fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [ChoiceOption],
    ) -> Self {
        let mut spec = Self::new(name, label, FieldKind::Choice, FieldValue::text(""));
        spec.options = options;
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = len;
        self
    }

    pub fn sanitized(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Default that leaves no hole in rendered inputs
    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }

    /// Label for a choice value, if declared
    pub fn option_label(&self, value: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label)
    }
}

/// One section of a multi-part form
#[derive(Debug, Clone)]
pub struct StepDef {
    pub name: &'static str,
    /// Fields owned by this step, in declaration (focus) order
    pub fields: Vec<&'static str>,
}

impl StepDef {
    pub fn new(name: &'static str, fields: &[&'static str]) -> Self {
        Self {
            name,
            fields: fields.to_vec(),
        }
    }
}

/// Complete description of an editable record form
#[derive(Debug, Clone)]
pub struct FormSchema {
    pub kind: RecordKind,
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
    pub steps: Vec<StepDef>,
    /// Whether in-progress values are persisted as drafts
    pub drafts: bool,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Index of the step that owns `field`
    pub fn step_of(&self, field: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.fields.contains(&field))
    }

    /// Field specs owned by `step`, in declaration order
    pub fn step_fields(&self, step: usize) -> Vec<&FieldSpec> {
        self.steps
            .get(step)
            .map(|s| s.fields.iter().filter_map(|n| self.field(n)).collect())
            .unwrap_or_default()
    }

    /// Fields whose failure blocks leaving `step`
    pub fn gating_fields(&self, step: usize) -> Vec<&FieldSpec> {
        self.step_fields(step)
            .into_iter()
            .filter(|f| f.required)
            .collect()
    }

    /// A new record holding every field's default
    pub fn defaults(&self) -> Record {
        let mut record = Record::new();
        for field in &self.fields {
            record.values.insert(field.name.to_string(), field.default.clone());
        }
        record
    }

    /// Check that every field belongs to exactly one step
    pub fn check_layout(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for field in &self.fields {
            let owners = self
                .steps
                .iter()
                .filter(|s| s.fields.contains(&field.name))
                .count();
            if owners != 1 {
                errors.push(format!(
                    "Field '{}' is owned by {} steps",
                    field.name, owners
                ));
            }
        }

        for step in &self.steps {
            for name in &step.fields {
                if self.field(name).is_none() {
                    errors.push(format!("Step '{}' lists unknown field '{}'", step.name, name));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The entity being created or edited. `id == None` means "new".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            values: BTreeMap::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style setter used by tests and normalization
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }
}
