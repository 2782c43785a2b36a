//! Boundary normalization of fetched records.
//!
//! The API may return a reference as `departamento_id: 3`, `departamento: 3`
//! or a nested `departamento: { id, nombre }`, and may use `null` for empty
//! fields. Everything is folded into the schema's canonical shape here so the
//! form never has to branch on response shape.

use serde_json::Value;
use tracing::debug;

use super::{FieldKind, FieldSpec, FieldValue, FormSchema, Record};

/// Build a canonical record from an API response body
pub fn normalize_record(schema: &FormSchema, raw: &Value) -> Record {
    let mut record = schema.defaults();
    record.id = raw.get("id").and_then(value_as_id);

    for spec in &schema.fields {
        let value = match spec.kind {
            FieldKind::Reference(_) => reference_candidates(spec.name)
                .iter()
                .filter_map(|key| raw.get(key))
                .find_map(value_as_id)
                .map(FieldValue::Integer),
            _ => raw.get(spec.name).and_then(|v| scalar_for(spec, v)),
        };

        if let Some(value) = value {
            record.set(spec.name, value);
        }
    }

    debug!(kind = ?schema.kind, id = ?record.id, "normalized fetched record");
    record
}

/// Keys that may carry a reference: `x_id` also accepts `x`, and `x` also accepts `x_id`
fn reference_candidates(name: &str) -> Vec<String> {
    match name.strip_suffix("_id") {
        Some(stem) => vec![name.to_string(), stem.to_string()],
        None => vec![name.to_string(), format!("{}_id", name)],
    }
}

/// Extract an identifier from a number, a numeric string or an `{id}` object
fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map.get("id").and_then(value_as_id),
        _ => None,
    }
}

/// Convert a JSON scalar into the field's form value; `None` keeps the default
fn scalar_for(spec: &FieldSpec, value: &Value) -> Option<FieldValue> {
    match (spec.kind, value) {
        (_, Value::Null) => None,
        (FieldKind::Flag, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
        (FieldKind::Flag, other) => FieldValue::text(plain_text(other)).as_bool().map(FieldValue::Bool),
        (FieldKind::Numeric, Value::Number(n)) => Some(
            n.as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Decimal))?,
        ),
        (_, Value::Array(_) | Value::Object(_)) => None,
        (_, other) => Some(FieldValue::text(plain_text(other))),
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordKind;
    use serde_json::json;

    #[test]
    fn test_nested_reference_objects_are_flattened() {
        let schema = RecordKind::Employee.schema();
        let raw = json!({
            "id": 7,
            "num_empleado": "E-7",
            "departamento": { "id": 3, "nombre": "Ventas" },
            "puesto_id": 5,
            "turno": "2",
        });

        let record = normalize_record(&schema, &raw);
        assert_eq!(record.id, Some(7));
        assert_eq!(record.get("departamento_id"), Some(&FieldValue::Integer(3)));
        assert_eq!(record.get("puesto_id"), Some(&FieldValue::Integer(5)));
        assert_eq!(record.get("turno_id"), Some(&FieldValue::Integer(2)));
        assert_eq!(record.get("horario_id"), Some(&FieldValue::Unset));
    }

    #[test]
    fn test_nulls_and_missing_fields_keep_defaults() {
        let schema = RecordKind::Employee.schema();
        let raw = json!({ "id": 9, "nombres": null, "activo": null });

        let record = normalize_record(&schema, &raw);
        assert_eq!(record.get("nombres"), Some(&FieldValue::text("")));
        assert_eq!(record.get("activo"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("email"), Some(&FieldValue::text("")));
    }

    #[test]
    fn test_position_accepts_departamento_id_alias() {
        let schema = RecordKind::Position.schema();
        let raw = json!({ "id": 1, "nombre": "Analista", "departamento_id": 4, "activo": false });

        let record = normalize_record(&schema, &raw);
        assert_eq!(record.get("departamento"), Some(&FieldValue::Integer(4)));
        assert_eq!(record.get("activo"), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn test_numeric_salary_kept_as_number() {
        let schema = RecordKind::Employee.schema();
        let record = normalize_record(&schema, &json!({ "sueldo": 15000.5 }));
        assert_eq!(record.get("sueldo"), Some(&FieldValue::Decimal(15000.5)));

        let record = normalize_record(&schema, &json!({ "sueldo": "15000.50" }));
        assert_eq!(record.get("sueldo"), Some(&FieldValue::text("15000.50")));
    }
}
