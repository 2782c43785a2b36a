//! Shape a validated record into the JSON body the API expects.

use serde_json::{Map, Number, Value};

use super::{FieldKind, FieldValue, FormSchema, Record};
use crate::api::choices::{map_choice_value, ChoiceMap};

/// Convert `record` into a request body.
///
/// Empty references and dates become `null`, references are integers,
/// `activo`-style flags are solid booleans, numeric fields become numbers when
/// they parse, and choice values are mapped through the server's declared
/// choices when those are known. Unset text fields are omitted.
pub fn to_payload(schema: &FormSchema, record: &Record, choices: Option<&ChoiceMap>) -> Map<String, Value> {
    let mut body = Map::new();

    for spec in &schema.fields {
        let value = record.get(spec.name).unwrap_or(&spec.default);

        let json = match spec.kind {
            FieldKind::Reference(_) => value
                .as_integer()
                .map(|id| Value::Number(id.into()))
                .unwrap_or(Value::Null),
            FieldKind::Date => {
                if value.is_empty() {
                    Value::Null
                } else {
                    Value::String(value.display().trim().to_string())
                }
            }
            FieldKind::Flag => {
                let fallback = spec.default.as_bool().unwrap_or(false);
                Value::Bool(value.as_bool().unwrap_or(fallback))
            }
            FieldKind::Numeric => {
                if value.is_empty() {
                    Value::Null
                } else {
                    match value {
                        FieldValue::Integer(n) => Value::Number((*n).into()),
                        other => other
                            .as_decimal()
                            .and_then(Number::from_f64)
                            .map(Value::Number)
                            .unwrap_or_else(|| Value::String(other.display())),
                    }
                }
            }
            FieldKind::Choice => {
                let raw = value.display();
                let mapped = match choices {
                    Some(choices) => map_choice_value(spec.name, &raw, choices),
                    None => raw,
                };
                Value::String(mapped)
            }
            FieldKind::ShortText | FieldKind::LongText | FieldKind::Email => match value {
                FieldValue::Unset => continue,
                other => Value::String(other.display()),
            },
        };

        body.insert(spec.name.to_string(), json);
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::choices::Choice;
    use crate::records::RecordKind;

    fn filled_employee() -> Record {
        RecordKind::Employee
            .schema()
            .defaults()
            .with("num_empleado", FieldValue::text("E-1"))
            .with("nombres", FieldValue::text("Ana"))
            .with("apellido_paterno", FieldValue::text("López"))
    }

    #[test]
    fn test_empty_references_and_dates_become_null() {
        let schema = RecordKind::Employee.schema();
        let body = to_payload(&schema, &filled_employee(), None);

        assert_eq!(body["departamento_id"], Value::Null);
        assert_eq!(body["fecha_ingreso"], Value::Null);
        assert_eq!(body["sueldo"], Value::Null);
        assert_eq!(body["activo"], Value::Bool(true));
        assert_eq!(body["nombres"], Value::String("Ana".into()));
        assert!(!body.contains_key("apellido_materno"));
    }

    #[test]
    fn test_references_and_salary_are_numbers() {
        let schema = RecordKind::Employee.schema();
        let record = filled_employee()
            .with("puesto_id", FieldValue::text("12"))
            .with("sueldo", FieldValue::text("15000.50"))
            .with("fecha_ingreso", FieldValue::text("2024-01-15"));
        let body = to_payload(&schema, &record, None);

        assert_eq!(body["puesto_id"], serde_json::json!(12));
        assert_eq!(body["sueldo"], serde_json::json!(15000.5));
        assert_eq!(body["fecha_ingreso"], serde_json::json!("2024-01-15"));
    }

    #[test]
    fn test_choices_are_mapped_when_known() {
        let schema = RecordKind::Employee.schema();
        let mut choices = ChoiceMap::new();
        choices.insert(
            "estado_civil".to_string(),
            vec![
                Choice {
                    value: "CASADO".into(),
                    label: "Casado".into(),
                },
                Choice {
                    value: "SOLTERO".into(),
                    label: "Soltero".into(),
                },
            ],
        );
        let record = filled_employee().with("estado_civil", FieldValue::text("casado"));

        let body = to_payload(&schema, &record, Some(&choices));
        assert_eq!(body["estado_civil"], serde_json::json!("CASADO"));
        assert_eq!(body["genero"], serde_json::json!(""));
    }
}
