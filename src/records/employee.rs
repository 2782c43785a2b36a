//! Employee form: seven steps, drafts enabled.

use super::{ChoiceOption, FieldSpec, FormSchema, RecordKind, Sanitizer, StepDef};
use crate::api::catalog::CatalogKind;

pub const GENEROS: &[ChoiceOption] = &[
    ChoiceOption {
        value: "M",
        label: "Masculino",
    },
    ChoiceOption {
        value: "F",
        label: "Femenino",
    },
    ChoiceOption {
        value: "O",
        label: "Otro",
    },
];

pub const ESTADOS_CIVILES: &[ChoiceOption] = &[
    ChoiceOption {
        value: "S",
        label: "Soltero(a)",
    },
    ChoiceOption {
        value: "C",
        label: "Casado(a)",
    },
    ChoiceOption {
        value: "U",
        label: "Unión libre",
    },
    ChoiceOption {
        value: "D",
        label: "Divorciado(a)",
    },
    ChoiceOption {
        value: "V",
        label: "Viudo(a)",
    },
];

pub const TIPOS_CONTRATO: &[ChoiceOption] = &[
    ChoiceOption {
        value: "determinado",
        label: "Determinado",
    },
    ChoiceOption {
        value: "indeterminado",
        label: "Indeterminado",
    },
    ChoiceOption {
        value: "obra",
        label: "Obra o proyecto",
    },
];

pub const TIPOS_JORNADA: &[ChoiceOption] = &[
    ChoiceOption {
        value: "diurna",
        label: "Diurna",
    },
    ChoiceOption {
        value: "mixta",
        label: "Mixta",
    },
    ChoiceOption {
        value: "nocturna",
        label: "Nocturna",
    },
];

/// Index of the bank step, referenced when routing server errors
pub const STEP_BANK: usize = 4;
/// Index of the read-only review step
pub const STEP_REVIEW: usize = 6;

pub fn schema() -> FormSchema {
    let fields = vec![
        // Alta express
        FieldSpec::short_text("num_empleado", "No. empleado").required(),
        FieldSpec::short_text("nombres", "Nombres").required(),
        FieldSpec::short_text("apellido_paterno", "Apellido paterno").required(),
        FieldSpec::short_text("apellido_materno", "Apellido materno")
            .with_default(super::FieldValue::Unset),
        FieldSpec::reference("departamento_id", "Departamento", CatalogKind::Departamentos),
        FieldSpec::reference("puesto_id", "Puesto", CatalogKind::Puestos),
        FieldSpec::date("fecha_ingreso", "Fecha de ingreso"),
        FieldSpec::flag("activo", "Activo", true),
        // ID / Personales / Contacto
        FieldSpec::short_text("rfc", "RFC").sanitized(Sanitizer::UpperAlnum(13)),
        FieldSpec::short_text("curp", "CURP").sanitized(Sanitizer::UpperAlnum(18)),
        FieldSpec::short_text("nss", "NSS").sanitized(Sanitizer::Digits(11)),
        FieldSpec::date("fecha_nacimiento", "Fecha de nacimiento"),
        FieldSpec::choice("genero", "Género", GENEROS),
        FieldSpec::choice("estado_civil", "Estado civil", ESTADOS_CIVILES),
        FieldSpec::short_text("telefono", "Teléfono").sanitized(Sanitizer::Digits(10)),
        FieldSpec::short_text("celular", "Celular").sanitized(Sanitizer::Digits(10)),
        FieldSpec::email("email", "Email"),
        // Domicilio
        FieldSpec::short_text("calle", "Calle"),
        FieldSpec::short_text("numero", "Número"),
        FieldSpec::short_text("colonia", "Colonia"),
        FieldSpec::short_text("municipio", "Municipio"),
        FieldSpec::short_text("estado", "Estado"),
        FieldSpec::short_text("cp", "CP").sanitized(Sanitizer::Digits(5)),
        // Laboral
        FieldSpec::numeric("sueldo", "Sueldo (MXN)"),
        FieldSpec::choice("tipo_contrato", "Tipo de contrato", TIPOS_CONTRATO),
        FieldSpec::choice("tipo_jornada", "Tipo de jornada", TIPOS_JORNADA),
        FieldSpec::reference("turno_id", "Turno", CatalogKind::Turnos),
        FieldSpec::reference("horario_id", "Horario", CatalogKind::Horarios),
        // Bancario
        FieldSpec::short_text("banco", "Banco"),
        FieldSpec::short_text("clabe", "CLABE").sanitized(Sanitizer::Digits(18)),
        FieldSpec::short_text("cuenta", "Cuenta").sanitized(Sanitizer::Digits(20)),
        // Emergencia / Otros
        FieldSpec::short_text("contacto_emergencia_nombre", "Contacto"),
        FieldSpec::short_text("contacto_emergencia_parentesco", "Parentesco"),
        FieldSpec::short_text("contacto_emergencia_telefono", "Tel. emergencia")
            .sanitized(Sanitizer::Digits(10)),
        FieldSpec::short_text("escolaridad", "Escolaridad"),
        FieldSpec::long_text("notas", "Notas"),
    ];

    let steps = vec![
        StepDef::new(
            "Alta express",
            &[
                "num_empleado",
                "nombres",
                "apellido_paterno",
                "apellido_materno",
                "departamento_id",
                "puesto_id",
                "fecha_ingreso",
                "activo",
            ],
        ),
        StepDef::new(
            "ID / Personales",
            &[
                "rfc",
                "curp",
                "nss",
                "fecha_nacimiento",
                "genero",
                "estado_civil",
                "telefono",
                "celular",
                "email",
            ],
        ),
        StepDef::new(
            "Domicilio",
            &["calle", "numero", "colonia", "municipio", "estado", "cp"],
        ),
        StepDef::new(
            "Laboral",
            &[
                "sueldo",
                "tipo_contrato",
                "tipo_jornada",
                "turno_id",
                "horario_id",
            ],
        ),
        StepDef::new("Bancario", &["banco", "clabe", "cuenta"]),
        StepDef::new(
            "Emergencia & Otros",
            &[
                "contacto_emergencia_nombre",
                "contacto_emergencia_parentesco",
                "contacto_emergencia_telefono",
                "escolaridad",
                "notas",
            ],
        ),
        StepDef::new("Revisión", &[]),
    ];

    FormSchema {
        kind: RecordKind::Employee,
        title: "Empleado",
        fields,
        steps,
        drafts: true,
    }
}
