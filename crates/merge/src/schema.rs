//! Structural record schemas and the schema compatibility gate.
//!
//! A [`Schema`] is an ordered list of named, typed top-level fields. Two
//! schemas of the same store are related by the superset relation: the stored
//! value's schema must contain every field of an incoming write's schema with
//! a compatible kind. Anything beyond that (renames, removals, type changes)
//! is rejected before a merge mutates anything.

#[cfg(test)]
#[path = "tests/schema.rs"]
mod tests;

use core::mem;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::value::FieldValue;

/// Kind of a field.
///
/// Collection kinds are not modelled: their merge semantics are not supported
/// by the engine, so such fields cannot be declared.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub enum FieldKind {
    /// `true` / `false`.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// UTF-8 string.
    String,
    /// Opaque bytes.
    Bytes,
    /// The inner kind or null.
    Optional(Box<FieldKind>),
    /// A nested record.
    Record(Schema),
}

impl FieldKind {
    /// Whether `value` is a valid instance of this kind.
    #[must_use]
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (&Self::Boolean, &FieldValue::Boolean(_))
            | (&Self::Int, &FieldValue::Int(_))
            | (&Self::Long, &FieldValue::Long(_))
            | (&Self::String, &FieldValue::String(_))
            | (&Self::Bytes, &FieldValue::Bytes(_))
            | (&Self::Optional(_), &FieldValue::Null) => true,
            (&Self::Optional(ref inner), other) => inner.accepts(other),
            (&Self::Record(ref schema), &FieldValue::Record(ref fields)) => {
                schema.accepts_fields(fields)
            }
            _ => false,
        }
    }

    /// The zero value of this kind, used when a field declares no default.
    #[must_use]
    pub fn zero_value(&self) -> FieldValue {
        match *self {
            Self::Boolean => FieldValue::Boolean(false),
            Self::Int => FieldValue::Int(0),
            Self::Long => FieldValue::Long(0),
            Self::String => FieldValue::String(String::new()),
            Self::Bytes => FieldValue::Bytes(Vec::new()),
            Self::Optional(_) => FieldValue::Null,
            Self::Record(ref schema) => FieldValue::Record(schema.default_fields()),
        }
    }

    /// Whether a value written under `new` can be stored in a field of this
    /// kind.
    fn is_superset_of(&self, new: &Self) -> bool {
        match (self, new) {
            (&Self::Optional(ref stored), &Self::Optional(ref incoming)) => {
                stored.is_superset_of(incoming)
            }
            (&Self::Record(ref stored), &Self::Record(ref incoming)) => {
                is_superset_schema(stored, incoming)
            }
            (stored, incoming) => stored == incoming,
        }
    }

    /// Re-expresses `value`, written under `source`, as a value of this kind.
    ///
    /// Only nested records change shape: fields unknown to `source` take
    /// their defaults. The kinds must already be known compatible.
    pub(crate) fn widen(&self, source: &Self, value: FieldValue) -> FieldValue {
        match (self, source, value) {
            (&Self::Optional(ref into), &Self::Optional(ref from), inner) => {
                if inner == FieldValue::Null {
                    FieldValue::Null
                } else {
                    into.widen(from, inner)
                }
            }
            (&Self::Record(ref into), &Self::Record(ref from), FieldValue::Record(fields)) => {
                FieldValue::Record(into.widen_fields(from, fields))
            }
            (_, _, other) => other,
        }
    }
}

/// A named, typed field of a record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Field name, unique within its schema.
    name: String,
    /// Declared kind.
    kind: FieldKind,
    /// Value the field takes when a write does not carry it.
    default: FieldValue,
}

impl FieldSchema {
    /// A field whose default is the zero value of its kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let default = kind.zero_value();
        Self {
            name: name.into(),
            kind,
            default,
        }
    }

    /// A field with an explicit default.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] if the default is not of the field's kind.
    pub fn with_default(
        name: impl Into<String>,
        kind: FieldKind,
        default: FieldValue,
    ) -> Result<Self, MergeError> {
        let name = name.into();
        if !kind.accepts(&default) {
            return Err(MergeError::mismatch(
                "(field default)",
                &name,
                "default does not match the declared kind",
            ));
        }
        Ok(Self {
            name,
            kind,
            default,
        })
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field kind.
    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Default value.
    #[must_use]
    pub const fn default_value(&self) -> &FieldValue {
        &self.default
    }
}

/// An ordered record schema.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Schema {
    /// Schema name, used in errors.
    name: String,
    /// Fields in positional order.
    fields: Vec<FieldSchema>,
}

impl Schema {
    /// Creates a schema.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] if two fields share a name.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Result<Self, MergeError> {
        let name = name.into();
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(MergeError::mismatch(&name, &field.name, "duplicate field name"));
            }
        }
        Ok(Self { name, fields })
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Default values of every field, in declaration order.
    #[must_use]
    pub fn default_fields(&self) -> Vec<FieldValue> {
        self.fields
            .iter()
            .map(|field| field.default.clone())
            .collect()
    }

    /// Whether `values` is a positional instance of this schema.
    #[must_use]
    pub fn accepts_fields(&self, values: &[FieldValue]) -> bool {
        values.len() == self.fields.len()
            && self
                .fields
                .iter()
                .zip(values)
                .all(|(field, value)| field.kind.accepts(value))
    }

    /// Re-expresses positional `values` of `source` under this schema.
    pub(crate) fn widen_fields(&self, source: &Self, mut values: Vec<FieldValue>) -> Vec<FieldValue> {
        self.fields
            .iter()
            .map(|field| {
                let Some(index) = source.position(&field.name) else {
                    return field.default.clone();
                };
                match (values.get_mut(index), source.fields.get(index)) {
                    (Some(slot), Some(source_field)) => {
                        let value = mem::replace(slot, FieldValue::Null);
                        field.kind.widen(&source_field.kind, value)
                    }
                    _ => field.default.clone(),
                }
            })
            .collect()
    }
}

/// Whether `old` is equal to, or a structural superset of, `new`.
///
/// Every field of `new` must exist in `old` under the same name with a
/// compatible kind: identical kinds, optionals of compatible kinds, or nested
/// records that are themselves in the superset relation. Schema names are not
/// compared, they change between versions of the same schema.
#[must_use]
pub fn is_superset_schema(old: &Schema, new: &Schema) -> bool {
    first_incompatible_field(old, new).is_none()
}

/// The first field of `new` without a compatible counterpart in `old`.
#[must_use]
pub fn first_incompatible_field<'new>(old: &Schema, new: &'new Schema) -> Option<&'new str> {
    new.fields
        .iter()
        .find(|new_field| {
            old.field(&new_field.name)
                .map_or(true, |old_field| !old_field.kind.is_superset_of(&new_field.kind))
        })
        .map(|field| field.name.as_str())
}

/// Gate applied before any put: fails with [`MergeError::SchemaIncompatible`]
/// unless `old` is a superset of `new`.
///
/// # Errors
///
/// See above.
pub fn ensure_superset(old: &Schema, new: &Schema) -> Result<(), MergeError> {
    match first_incompatible_field(old, new) {
        None => Ok(()),
        Some(field) => Err(MergeError::SchemaIncompatible {
            old: old.name.clone(),
            new: new.name.clone(),
            field: field.to_owned(),
        }),
    }
}
