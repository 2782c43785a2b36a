//! Job position form: a single step, no drafts.

use super::{FieldSpec, FormSchema, RecordKind, StepDef};
use crate::api::catalog::CatalogKind;

pub fn schema() -> FormSchema {
    FormSchema {
        kind: RecordKind::Position,
        title: "Puesto",
        fields: vec![
            FieldSpec::short_text("nombre", "Nombre").required().min_len(2),
            FieldSpec::short_text("clave", "Clave").required(),
            FieldSpec::reference("departamento", "Departamento", CatalogKind::Departamentos),
            FieldSpec::flag("activo", "Activo", true),
            FieldSpec::long_text("descripcion", "Descripción"),
        ],
        steps: vec![StepDef::new(
            "Puesto",
            &["nombre", "clave", "departamento", "activo", "descripcion"],
        )],
        drafts: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nombre_requires_two_chars() {
        let schema = schema();
        let nombre = schema.field("nombre").unwrap();
        assert!(nombre.required);
        assert_eq!(nombre.min_len, 2);
        assert!(!schema.field("departamento").unwrap().required);
    }
}
