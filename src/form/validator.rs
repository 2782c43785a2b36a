//! Field rules, per-step gating and full-record validation.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::records::{FieldKind, FieldSpec, FieldValue, FormSchema, Record};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email pattern must be a valid regex")
});

/// A field that failed its rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Check `value` against the rule for the field's kind.
///
/// Emptiness only fails when the field is required; every other rule is a
/// format check applied when a value is present.
pub fn validate_field(spec: &FieldSpec, value: &FieldValue) -> Result<(), String> {
    if value.is_empty() {
        return if spec.required && spec.kind != FieldKind::Flag {
            Err("Requerido".to_string())
        } else {
            Ok(())
        };
    }

    match spec.kind {
        FieldKind::ShortText | FieldKind::LongText => {
            let len = value.display().trim().chars().count();
            if len < spec.min_len {
                Err(format!("Mínimo {} caracteres", spec.min_len))
            } else {
                Ok(())
            }
        }
        FieldKind::Email => {
            if EMAIL_RE.is_match(value.display().trim()) {
                Ok(())
            } else {
                Err("Email inválido".to_string())
            }
        }
        FieldKind::Date => {
            let text = value.display();
            let text = text.trim();
            if text.len() == 10 && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() {
                Ok(())
            } else {
                Err("Fecha inválida (AAAA-MM-DD)".to_string())
            }
        }
        FieldKind::Numeric => match value.as_decimal() {
            Some(_) => Ok(()),
            None => Err("Debe ser un número".to_string()),
        },
        FieldKind::Reference(_) => match value.as_integer() {
            Some(_) => Ok(()),
            None => Err("Selecciona una opción válida".to_string()),
        },
        FieldKind::Choice => {
            let text = value.display();
            if spec.options.is_empty() || spec.option_label(text.trim()).is_some() {
                Ok(())
            } else {
                Err("Opción no válida".to_string())
            }
        }
        FieldKind::Flag => Ok(()),
    }
}

fn value_of<'a>(spec: &'a FieldSpec, record: &'a Record) -> &'a FieldValue {
    record.get(spec.name).unwrap_or(&spec.default)
}

/// Gate leaving `step`: only that step's required fields are checked.
///
/// On failure returns the invalid field names in step declaration order.
pub fn can_advance(schema: &FormSchema, record: &Record, step: usize) -> Result<(), Vec<String>> {
    let invalid: Vec<String> = schema
        .gating_fields(step)
        .into_iter()
        .filter(|spec| validate_field(spec, value_of(spec, record)).is_err())
        .map(|spec| spec.name.to_string())
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(invalid)
    }
}

/// Issues for the fields owned by `step`, required or not
pub fn validate_step(schema: &FormSchema, record: &Record, step: usize) -> Vec<FieldIssue> {
    schema
        .step_fields(step)
        .into_iter()
        .filter_map(|spec| {
            validate_field(spec, value_of(spec, record))
                .err()
                .map(|message| FieldIssue {
                    field: spec.name.to_string(),
                    message,
                })
        })
        .collect()
}

/// Every rule of every step, ordered by step then field declaration
pub fn validate_record(schema: &FormSchema, record: &Record) -> Vec<FieldIssue> {
    (0..schema.total_steps())
        .flat_map(|step| validate_step(schema, record, step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::catalog::CatalogKind;
    use crate::records::{employee, RecordKind};

    fn step0_filled() -> Record {
        RecordKind::Employee
            .schema()
            .defaults()
            .with("num_empleado", FieldValue::text("E-1"))
            .with("nombres", FieldValue::text("Ana"))
            .with("apellido_paterno", FieldValue::text("Ruiz"))
    }

    #[test]
    fn test_required_text_trims() {
        let spec = FieldSpec::short_text("nombres", "Nombres").required();
        assert!(validate_field(&spec, &FieldValue::text("   ")).is_err());
        assert!(validate_field(&spec, &FieldValue::Unset).is_err());
        assert!(validate_field(&spec, &FieldValue::text(" Ana ")).is_ok());
    }

    #[test]
    fn test_min_len() {
        let spec = FieldSpec::short_text("nombre", "Nombre").required().min_len(2);
        assert!(validate_field(&spec, &FieldValue::text(" A ")).is_err());
        assert!(validate_field(&spec, &FieldValue::text("TI")).is_ok());
    }

    #[test]
    fn test_email_optional_but_checked() {
        let spec = FieldSpec::email("email", "Email");
        assert!(validate_field(&spec, &FieldValue::text("")).is_ok());
        assert!(validate_field(&spec, &FieldValue::text("ana@empresa.mx")).is_ok());
        assert!(validate_field(&spec, &FieldValue::text("ana@")).is_err());
        assert!(validate_field(&spec, &FieldValue::text("ana empresa.mx")).is_err());
    }

    #[test]
    fn test_dates_must_be_real_iso_dates() {
        let spec = FieldSpec::date("fecha_ingreso", "Ingreso");
        assert!(validate_field(&spec, &FieldValue::text("")).is_ok());
        assert!(validate_field(&spec, &FieldValue::text("2024-02-29")).is_ok());
        assert!(validate_field(&spec, &FieldValue::text("2023-02-29")).is_err());
        assert!(validate_field(&spec, &FieldValue::text("2024-2-1")).is_err());
        assert!(validate_field(&spec, &FieldValue::text("01/02/2024")).is_err());
    }

    #[test]
    fn test_references_coerce_to_integers() {
        let optional = FieldSpec::reference("puesto_id", "Puesto", CatalogKind::Puestos);
        assert!(validate_field(&optional, &FieldValue::Unset).is_ok());
        assert!(validate_field(&optional, &FieldValue::text("12")).is_ok());
        assert!(validate_field(&optional, &FieldValue::text("doce")).is_err());

        let required = optional.clone().required();
        assert!(validate_field(&required, &FieldValue::Unset).is_err());
    }

    #[test]
    fn test_numeric_and_choice() {
        let sueldo = FieldSpec::numeric("sueldo", "Sueldo");
        assert!(validate_field(&sueldo, &FieldValue::text("1500.75")).is_ok());
        assert!(validate_field(&sueldo, &FieldValue::text("mil")).is_err());

        let genero = FieldSpec::choice("genero", "Género", employee::GENEROS);
        assert!(validate_field(&genero, &FieldValue::text("F")).is_ok());
        assert!(validate_field(&genero, &FieldValue::text("X")).is_err());
        assert!(validate_field(&genero, &FieldValue::text("")).is_ok());
    }

    #[test]
    fn test_flags_always_valid() {
        let spec = FieldSpec::flag("activo", "Activo", true).required();
        assert!(validate_field(&spec, &FieldValue::Unset).is_ok());
        assert!(validate_field(&spec, &FieldValue::Bool(false)).is_ok());
    }

    #[test]
    fn test_can_advance_reports_in_declaration_order() {
        let schema = RecordKind::Employee.schema();
        let record = schema.defaults();
        assert_eq!(
            can_advance(&schema, &record, 0),
            Err(vec![
                "num_empleado".to_string(),
                "nombres".to_string(),
                "apellido_paterno".to_string()
            ])
        );
        assert_eq!(can_advance(&schema, &step0_filled(), 0), Ok(()));
    }

    #[test]
    fn test_can_advance_ignores_other_steps() {
        let schema = RecordKind::Employee.schema();
        let record = schema
            .defaults()
            .with("email", FieldValue::text("no-es-email"));
        // step 1's email is invalid but step 0 is only blocked by its own fields
        assert!(can_advance(&schema, &record, 0).is_err());
        assert_eq!(can_advance(&schema, &record, 1), Ok(()));
        assert_eq!(can_advance(&schema, &record, employee::STEP_REVIEW), Ok(()));
    }

    #[test]
    fn test_validate_record_catches_format_errors() {
        let schema = RecordKind::Employee.schema();
        let record = step0_filled()
            .with("email", FieldValue::text("ana@"))
            .with("sueldo", FieldValue::text("abc"));
        let fields: Vec<_> = validate_record(&schema, &record)
            .into_iter()
            .map(|i| i.field)
            .collect();
        assert_eq!(fields, vec!["email", "sueldo"]);
    }
}
