use std::{collections::HashMap, path::Path, sync::Arc};

use apache_avro::schema::{RecordField, RecordSchema, Schema};

use crate::error::{SchemaError, SchemaLoadError};

/// Scalar type a schema field coerces its text value into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Int,
    Long,
    Double,
    Boolean,
    Text,
}

impl PrimitiveKind {
    fn from_avro(schema: &Schema) -> Option<Self> {
        match schema {
            Schema::Int => Some(Self::Int),
            Schema::Long => Some(Self::Long),
            Schema::Double => Some(Self::Double),
            Schema::Boolean => Some(Self::Boolean),
            Schema::String => Some(Self::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Text => "string",
        };
        f.write_str(name)
    }
}

/// Whether a field accepts null, and if so, where the branches sit in its Avro union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Required,
    Nullable { null_branch: u32, value_branch: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: PrimitiveKind,
    pub nullability: Nullability,
}

/// The ordered output fields, parsed once from an Avro record schema.
#[derive(Debug)]
pub struct SchemaDefinition {
    avro: Schema,
    fields: Vec<FieldDefinition>,
    positions: HashMap<String, usize>,
}

impl SchemaDefinition {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaLoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_str(&raw)
    }

    pub fn parse_str(raw: &str) -> Result<Self, SchemaLoadError> {
        let avro = Schema::parse_str(raw).map_err(SchemaLoadError::Parse)?;

        let Schema::Record(RecordSchema { fields: record_fields, .. }) = &avro else {
            return Err(SchemaLoadError::NotARecord);
        };
        if record_fields.is_empty() {
            return Err(SchemaLoadError::NoFields);
        }

        let fields = record_fields
            .iter()
            .map(field_definition)
            .collect::<Result<Vec<_>, _>>()?;

        let positions = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();

        Ok(Self {
            avro,
            fields,
            positions,
        })
    }

    /// Fields in declaration order, which is also the binary encoding order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.positions.get(name).map(|idx| &self.fields[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn avro_schema(&self) -> &Schema {
        &self.avro
    }
}

fn field_definition(field: &RecordField) -> Result<FieldDefinition, SchemaLoadError> {
    let unsupported = |reason: &str| SchemaLoadError::UnsupportedField {
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    let (kind, nullability) = match &field.schema {
        Schema::Union(union) => {
            let variants = union.variants();
            let null_branch = variants.iter().position(|s| matches!(s, Schema::Null));
            let value_branch = variants.iter().position(|s| !matches!(s, Schema::Null));
            match (variants.len(), null_branch, value_branch) {
                (2, Some(null_branch), Some(value_branch)) => {
                    let kind = PrimitiveKind::from_avro(&variants[value_branch])
                        .ok_or_else(|| unsupported("union value branch is not a primitive"))?;
                    (
                        kind,
                        Nullability::Nullable {
                            null_branch: null_branch as u32,
                            value_branch: value_branch as u32,
                        },
                    )
                }
                _ => return Err(unsupported("only [\"null\", <primitive>] unions are supported")),
            }
        }
        other => {
            let kind = PrimitiveKind::from_avro(other)
                .ok_or_else(|| unsupported("type is not a supported primitive"))?;
            (kind, Nullability::Required)
        }
    };

    Ok(FieldDefinition {
        name: field.name.clone(),
        kind,
        nullability,
    })
}

/// Membership and kind lookups against the shared schema.
#[derive(Debug, Clone)]
pub struct SchemaFilter {
    schema: Arc<SchemaDefinition>,
}

impl SchemaFilter {
    pub fn new(schema: Arc<SchemaDefinition>) -> Self {
        Self { schema }
    }

    pub fn is_accepted(&self, name: &str) -> bool {
        self.schema.contains(name)
    }

    pub fn kind_of(&self, name: &str) -> Result<PrimitiveKind, SchemaError> {
        self.schema
            .field(name)
            .map(|field| field.kind)
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
    }
}
