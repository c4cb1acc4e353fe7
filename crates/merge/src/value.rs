//! Record values.
//!
//! A [`Record`] is a positional list of [`FieldValue`]s bound to the
//! [`Schema`] that describes them. Its canonical byte form is the borsh
//! encoding of the field list; that form is what replicas compare when two
//! writes carry the same timestamp, so it must never depend on anything but
//! the field contents.

#[cfg(test)]
#[path = "tests/value.rs"]
mod tests;

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::schema::Schema;

/// A single field value.
#[derive(
    BorshDeserialize, BorshSerialize, Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
#[non_exhaustive]
pub enum FieldValue {
    /// Absent value of an optional field.
    Null,
    /// Boolean.
    Boolean(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Nested record, positional by its schema.
    Record(Vec<FieldValue>),
}

impl FieldValue {
    /// Canonical encoding, used for content-based tie-breaks.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Writing into a Vec cannot fail.
        borsh::to_vec(self).unwrap_or_default()
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A record bound to its schema.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// Schema the fields conform to.
    schema: Arc<Schema>,
    /// Field values in schema order.
    fields: Vec<FieldValue>,
}

impl Record {
    /// Binds `fields` to `schema`.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] if the arity or a field's kind is wrong.
    pub fn new(schema: Arc<Schema>, fields: Vec<FieldValue>) -> Result<Self, MergeError> {
        if fields.len() != schema.fields().len() {
            return Err(MergeError::mismatch(
                schema.name(),
                "*",
                format!(
                    "expected {} fields, got {}",
                    schema.fields().len(),
                    fields.len()
                ),
            ));
        }
        if let Some((field, _)) = schema
            .fields()
            .iter()
            .zip(&fields)
            .find(|&(field, value)| !field.kind().accepts(value))
        {
            return Err(MergeError::mismatch(
                schema.name(),
                field.name(),
                "value does not match the declared kind",
            ));
        }
        Ok(Self { schema, fields })
    }

    /// Builds a record from `(name, value)` pairs; unnamed fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] on an unknown name or a mistyped value.
    pub fn from_pairs<I, K, V>(schema: Arc<Schema>, pairs: I) -> Result<Self, MergeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut record = Self::with_defaults(schema);
        for (name, value) in pairs {
            record.set(name.as_ref(), value.into())?;
        }
        Ok(record)
    }

    /// The record holding every field's default value.
    ///
    /// A put needs a base value; callers synthesise this one when the key has
    /// none yet.
    #[must_use]
    pub fn with_defaults(schema: Arc<Schema>) -> Self {
        let fields = schema.default_fields();
        Self { schema, fields }
    }

    /// Schema of this record.
    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Field values in schema order.
    #[must_use]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Reads a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema
            .position(name)
            .and_then(|index| self.fields.get(index))
    }

    /// Writes a field by name.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] on an unknown name or a mistyped value.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), MergeError> {
        let Some(index) = self.schema.position(name) else {
            return Err(MergeError::mismatch(self.schema.name(), name, "unknown field"));
        };
        let accepted = self
            .schema
            .fields()
            .get(index)
            .is_some_and(|field| field.kind().accepts(&value));
        if !accepted {
            return Err(MergeError::mismatch(
                self.schema.name(),
                name,
                "value does not match the declared kind",
            ));
        }
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
        Ok(())
    }

    /// Re-expresses this record under `target`, a superset of its schema.
    ///
    /// Fields `target` adds take their defaults, nested records are widened
    /// the same way. Compatibility is the caller's responsibility, see
    /// [`crate::schema::ensure_superset`].
    #[must_use]
    pub fn widen_to(&self, target: &Arc<Schema>) -> Self {
        if Arc::ptr_eq(&self.schema, target) || *self.schema == **target {
            return Self {
                schema: Arc::clone(target),
                fields: self.fields.clone(),
            };
        }
        Self {
            schema: Arc::clone(target),
            fields: target.widen_fields(&self.schema, self.fields.clone()),
        }
    }

    /// Canonical encoding of the field values.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Writing into a Vec cannot fail.
        borsh::to_vec(&self.fields).unwrap_or_default()
    }

    /// Decodes bytes produced by [`Record::to_bytes`] under `schema`.
    ///
    /// # Errors
    ///
    /// [`MergeError::SchemaMismatch`] if the bytes do not decode or do not fit
    /// the schema.
    pub fn from_bytes(schema: Arc<Schema>, bytes: &[u8]) -> Result<Self, MergeError> {
        let fields: Vec<FieldValue> = borsh::from_slice(bytes)
            .map_err(|err| MergeError::mismatch(schema.name(), "*", err.to_string()))?;
        Self::new(schema, fields)
    }

    /// Splits the record into its schema and field values.
    #[must_use]
    pub fn into_parts(self) -> (Arc<Schema>, Vec<FieldValue>) {
        (self.schema, self.fields)
    }

    /// Replaces a field value by position without re-checking its kind.
    pub(crate) fn set_unchecked(&mut self, index: usize, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }
}
