//! Schema Descriptor
//!
//! Declares the fixed-width record layout of a table: an ordered list of named
//! fields, each a scalar or fixed-length vector of one [`ScalarType`], with a
//! default value. Descriptors are validated once at build time and are
//! immutable afterwards.

use crate::error::TreeError;
use crate::types::ByteOrder;
use crate::value::{decode_scalar, encode_scalar, ScalarType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Field shape: a single element or a fixed-length vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldShape {
    Scalar,
    Vector(usize),
}

impl FieldShape {
    /// Number of scalar elements stored for the field
    pub fn elements(&self) -> usize {
        match self {
            FieldShape::Scalar => 1,
            FieldShape::Vector(n) => *n,
        }
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub scalar_type: ScalarType,
    pub shape: FieldShape,
    pub default: Value,
}

impl FieldSpec {
    /// Scalar field defaulting to the type's zero value
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            shape: FieldShape::Scalar,
            default: scalar_type.zero(),
        }
    }

    /// Make this a fixed-length vector field
    pub fn vector(mut self, len: usize) -> Self {
        self.shape = FieldShape::Vector(len);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Encoded width of the field in bytes
    pub fn width(&self) -> usize {
        self.scalar_type.width() * self.shape.elements()
    }

    /// Coerce `value` to this field's type and shape
    pub fn coerce(&self, value: &Value) -> Result<Value, TreeError> {
        let mismatch = || TreeError::mismatch(&self.name, self.describe_type(), value.kind_name());
        match (self.shape, value) {
            (FieldShape::Scalar, Value::Vector(_)) => Err(mismatch()),
            (FieldShape::Scalar, scalar) => {
                scalar.coerce_scalar(self.scalar_type).ok_or_else(mismatch)
            }
            (FieldShape::Vector(n), Value::Vector(items)) if items.len() == n => items
                .iter()
                .map(|item| item.coerce_scalar(self.scalar_type).ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Vector),
            (FieldShape::Vector(_), _) => Err(mismatch()),
        }
    }

    /// Human readable declared type, e.g. `Float32[2]`
    pub fn describe_type(&self) -> String {
        match self.shape {
            FieldShape::Scalar => self.scalar_type.to_string(),
            FieldShape::Vector(n) => format!("{}[{}]", self.scalar_type, n),
        }
    }

    fn encode(&self, value: &Value, order: ByteOrder, out: &mut Vec<u8>) -> Result<(), TreeError> {
        match (self.shape, value) {
            (FieldShape::Scalar, scalar) => encode_scalar(scalar, self.scalar_type, order, out),
            (FieldShape::Vector(n), Value::Vector(items)) if items.len() == n => {
                for item in items {
                    encode_scalar(item, self.scalar_type, order, out)?;
                }
                Ok(())
            }
            (_, other) => Err(TreeError::mismatch(
                &self.name,
                self.describe_type(),
                other.kind_name(),
            )),
        }
    }

    fn decode(&self, order: ByteOrder, bytes: &[u8]) -> Value {
        let width = self.scalar_type.width();
        match self.shape {
            FieldShape::Scalar => decode_scalar(self.scalar_type, order, bytes),
            FieldShape::Vector(n) => Value::Vector(
                (0..n)
                    .map(|i| decode_scalar(self.scalar_type, order, &bytes[i * width..(i + 1) * width]))
                    .collect(),
            ),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SchemaRepr {
    fields: Vec<FieldSpec>,
}

/// Validated, immutable record layout of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRepr", into = "SchemaRepr")]
pub struct SchemaDescriptor {
    fields: Vec<FieldSpec>,
    offsets: Vec<usize>,
    row_width: usize,
}

impl TryFrom<SchemaRepr> for SchemaDescriptor {
    type Error = TreeError;

    fn try_from(repr: SchemaRepr) -> Result<Self, Self::Error> {
        SchemaDescriptor::new(repr.fields)
    }
}

impl From<SchemaDescriptor> for SchemaRepr {
    fn from(schema: SchemaDescriptor) -> Self {
        SchemaRepr {
            fields: schema.fields,
        }
    }
}

impl SchemaDescriptor {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Validate `fields` and compute the row layout.
    ///
    /// Scalar defaults given for vector fields are broadcast to every element.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, TreeError> {
        if fields.is_empty() {
            return Err(TreeError::InvalidSchema(
                "a table needs at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(fields.len());
        for mut field in fields {
            if field.name.is_empty() {
                return Err(TreeError::InvalidSchema("field names must not be empty".to_string()));
            }
            if !seen.insert(field.name.clone()) {
                return Err(TreeError::NameConflict {
                    parent: "schema".to_string(),
                    name: field.name,
                });
            }
            if let FieldShape::Vector(0) = field.shape {
                return Err(TreeError::InvalidSchema(format!(
                    "vector field {} must have a non-zero length",
                    field.name
                )));
            }
            if let ScalarType::FixedString(0) = field.scalar_type {
                return Err(TreeError::InvalidSchema(format!(
                    "string field {} must have a non-zero width",
                    field.name
                )));
            }

            let default = match (field.shape, &field.default) {
                (FieldShape::Vector(n), scalar) if !matches!(scalar, Value::Vector(_)) => {
                    Value::Vector(vec![scalar.clone(); n])
                }
                (_, value) => value.clone(),
            };
            field.default = field.coerce(&default)?;
            validated.push(field);
        }

        let mut offsets = Vec::with_capacity(validated.len());
        let mut row_width = 0;
        for field in &validated {
            offsets.push(row_width);
            row_width += field.width();
        }

        Ok(Self {
            fields: validated,
            offsets,
            row_width,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Column names in declaration order
    pub fn colnames(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Encoded width of one row in bytes
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn defaults(&self) -> Vec<Value> {
        self.fields.iter().map(|f| f.default.clone()).collect()
    }

    /// Coerce a full record positionally against the schema
    pub fn coerce_row(&self, values: &[Value]) -> Result<Vec<Value>, TreeError> {
        if values.len() != self.fields.len() {
            return Err(TreeError::ShapeError(format!(
                "record has {} values, schema has {} fields",
                values.len(),
                self.fields.len()
            )));
        }
        self.fields
            .iter()
            .zip(values)
            .map(|(field, value)| field.coerce(value))
            .collect()
    }

    /// Append one encoded row to `out`; values must already be coerced
    pub(crate) fn encode_row(
        &self,
        values: &[Value],
        order: ByteOrder,
        out: &mut Vec<u8>,
    ) -> Result<(), TreeError> {
        let start = out.len();
        for (field, value) in self.fields.iter().zip(values) {
            if let Err(e) = field.encode(value, order, out) {
                out.truncate(start);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Decode a full row; `bytes` must be exactly `row_width` long
    pub(crate) fn decode_row(&self, bytes: &[u8], order: ByteOrder) -> Vec<Value> {
        (0..self.fields.len())
            .map(|i| self.decode_field(bytes, i, order))
            .collect()
    }

    /// Decode a single field of an encoded row
    pub(crate) fn decode_field(&self, bytes: &[u8], index: usize, order: ByteOrder) -> Value {
        let field = &self.fields[index];
        let offset = self.offsets[index];
        field.decode(order, &bytes[offset..offset + field.width()])
    }
}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for field in &self.fields {
            writeln!(
                f,
                "  \"{}\": {} (default {}),",
                field.name,
                field.describe_type(),
                field.default
            )?;
        }
        write!(f, "}}")
    }
}

/// Incremental builder for [`SchemaDescriptor`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    /// Add a scalar field with a zero default
    pub fn field(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.fields.push(FieldSpec::new(name, scalar_type));
        self
    }

    /// Add a fixed-length vector field with a zero default
    pub fn vector(mut self, name: impl Into<String>, scalar_type: ScalarType, len: usize) -> Self {
        self.fields.push(FieldSpec::new(name, scalar_type).vector(len));
        self
    }

    /// Add a fully specified field
    pub fn spec(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<SchemaDescriptor, TreeError> {
        SchemaDescriptor::new(self.fields)
    }
}
