//! Department form: a single step, no drafts.

use super::{FieldSpec, FormSchema, RecordKind, StepDef};

pub fn schema() -> FormSchema {
    FormSchema {
        kind: RecordKind::Department,
        title: "Departamento",
        fields: vec![
            FieldSpec::short_text("nombre", "Nombre").required(),
            FieldSpec::short_text("clave", "Clave"),
            FieldSpec::long_text("descripcion", "Descripción"),
            FieldSpec::flag("activo", "Activo", true),
        ],
        steps: vec![StepDef::new(
            "Departamento",
            &["nombre", "clave", "descripcion", "activo"],
        )],
        drafts: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_nombre_gates() {
        let schema = schema();
        let gating: Vec<_> = schema.gating_fields(0).iter().map(|f| f.name).collect();
        assert_eq!(gating, vec!["nombre"]);
        assert!(!schema.drafts);
    }
}
