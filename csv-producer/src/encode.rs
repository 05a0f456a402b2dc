use std::sync::Arc;

use apache_avro::types::Value;

use crate::{
    error::EncodingError,
    extract::NormalizedRow,
    schema::{FieldDefinition, Nullability, PrimitiveKind, SchemaDefinition},
};

/// A single Avro binary datum, ready to be used as a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(Vec<u8>);

impl EncodedMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for EncodedMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for EncodedMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Writes rows as schemaless Avro datums, one per row, fields in declaration order.
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    schema: Arc<SchemaDefinition>,
}

impl BatchEncoder {
    pub fn new(schema: Arc<SchemaDefinition>) -> Self {
        Self { schema }
    }

    pub fn encode(&self, row: &NormalizedRow) -> Result<EncodedMessage, EncodingError> {
        if let Some(unknown) = row.keys().find(|key| !self.schema.contains(key)) {
            return Err(EncodingError::UnknownField(unknown.to_string()));
        }

        let fields = self
            .schema
            .fields()
            .iter()
            .map(|field| {
                let text = row.get(&field.name).and_then(|v| v.as_deref());
                Ok((field.name.clone(), field_value(field, text)?))
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;

        apache_avro::to_avro_datum(self.schema.avro_schema(), Value::Record(fields))
            .map(EncodedMessage)
            .map_err(EncodingError::Avro)
    }

    /// Encodes a whole chunk, stopping at the first row that can't be written.
    pub fn encode_batch(
        &self,
        rows: &[NormalizedRow],
    ) -> Result<Vec<EncodedMessage>, EncodingError> {
        rows.iter().map(|row| self.encode(row)).collect()
    }
}

fn field_value(field: &FieldDefinition, text: Option<&str>) -> Result<Value, EncodingError> {
    match (text, field.nullability) {
        (None, Nullability::Required) => Err(EncodingError::MissingRequired {
            field: field.name.clone(),
        }),
        (None, Nullability::Nullable { null_branch, .. }) => {
            Ok(Value::Union(null_branch, Box::new(Value::Null)))
        }
        (Some(text), Nullability::Required) => coerce(field, text),
        (Some(text), Nullability::Nullable { value_branch, .. }) => {
            Ok(Value::Union(value_branch, Box::new(coerce(field, text)?)))
        }
    }
}

fn coerce(field: &FieldDefinition, text: &str) -> Result<Value, EncodingError> {
    let invalid = || EncodingError::Coercion {
        field: field.name.clone(),
        value: text.to_string(),
        kind: field.kind,
    };
    let trimmed = text.trim();

    match field.kind {
        PrimitiveKind::Text => Ok(Value::String(text.to_string())),
        PrimitiveKind::Int => trimmed.parse().map(Value::Int).map_err(|_| invalid()),
        PrimitiveKind::Long => trimmed.parse().map(Value::Long).map_err(|_| invalid()),
        PrimitiveKind::Double => {
            // Source files use a decimal comma
            let decimal = if trimmed.contains(',') && !trimmed.contains('.') {
                trimmed.replace(',', ".")
            } else {
                trimmed.to_string()
            };
            decimal.parse().map(Value::Double).map_err(|_| invalid())
        }
        PrimitiveKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid()),
        },
    }
}
