//! Named bags of typed, named fields.
//!
//! A [`Component`] is the unit of entity data: a name (copied from its schema
//! at birth) plus a `field name -> (type tag, value)` map. The same type
//! doubles as the schema itself -- a store's reference component carries the
//! default values that freshly subscribed entities are cloned from.
//!
//! Accessors are forgiving: a missing field or a variant mismatch logs a
//! diagnostic and hands back a default instead of failing, because systems
//! iterate component data optimistically.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as Json;
use tracing::warn;

use crate::value::{canonical_tag, FieldValue, Value};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// One typed, named field slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The textual type tag the field was declared with.
    pub tag: String,
    /// The current value.
    pub value: Value,
}

/// A named bag of typed fields.
///
/// The field set is fixed once the component leaves schema authoring;
/// [`Component::add`] exists only to build schemas before entities are
/// subscribed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Component {
    name: String,
    fields: HashMap<String, Field>,
}

impl Component {
    /// Builds a component from a schema document of shape
    /// `{"name": ..., "data": {"field": "type_tag", ...}}`, with every field
    /// at the default value of its tag.
    ///
    /// Fields with unknown tags are skipped with a diagnostic; a document
    /// missing the `name`/`data` structure is rejected.
    pub fn from_schema(doc: &Json) -> Result<Self, EcsError> {
        let shape_error = || EcsError::ValueShape {
            expected: "component schema".to_owned(),
            doc: doc.to_string(),
        };

        let name = doc
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(shape_error)?;
        let data = doc
            .get("data")
            .and_then(Json::as_object)
            .ok_or_else(shape_error)?;

        let mut fields = HashMap::new();
        for (field, tag_doc) in data {
            let Some(tag) = tag_doc.as_str() else {
                warn!(component = name, field = %field, "schema field type is not a string, skipping");
                continue;
            };
            match Value::default_for(tag) {
                Ok(value) => {
                    fields.insert(
                        field.clone(),
                        Field {
                            tag: tag.to_owned(),
                            value,
                        },
                    );
                }
                Err(err) => {
                    warn!(component = name, field = %field, %err, "skipping schema field");
                }
            }
        }

        Ok(Self {
            name: name.to_owned(),
            fields,
        })
    }

    /// Builds a component from an explicit name and field map.
    pub fn new(name: impl Into<String>, fields: HashMap<String, Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The names of every field.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// The declared type tag of a field, or `""` for an unknown field. Never
    /// fails.
    pub fn type_of(&self, field: &str) -> &str {
        self.fields.get(field).map(|f| f.tag.as_str()).unwrap_or("")
    }

    /// Raw access to the field map, for serialization and copying.
    pub fn fields(&self) -> &HashMap<String, Field> {
        &self.fields
    }

    /// Returns the value of `field` as `T`.
    ///
    /// A missing field or a request for the wrong variant logs a diagnostic
    /// and returns `T::default()`; it never aborts.
    pub fn get<T: FieldValue>(&self, field: &str) -> T {
        match self.fields.get(field) {
            None => {
                warn!(component = %self.name, field, "no field with this name");
                T::default()
            }
            Some(slot) => match T::from_value(&slot.value) {
                Some(value) => value,
                None => {
                    warn!(
                        component = %self.name,
                        field,
                        tag = %slot.tag,
                        "requested type does not match the field's tag"
                    );
                    T::default()
                }
            },
        }
    }

    /// Writes `value` into an existing field.
    ///
    /// A missing field, or a value whose variant does not match the field's
    /// declared tag, logs a diagnostic and leaves the field untouched.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.get_mut(field) {
            None => {
                warn!(component = %self.name, field, "no field with this name");
            }
            Some(slot) => {
                if canonical_tag(&slot.tag) == Some(value.tag()) {
                    slot.value = value;
                } else {
                    warn!(
                        component = %self.name,
                        field,
                        tag = %slot.tag,
                        given = value.tag(),
                        "value does not match the field's tag"
                    );
                }
            }
        }
    }

    /// Appends a new field holding the default value of `tag`. Existing
    /// fields are left untouched. Schema authoring only.
    pub fn add(&mut self, field: &str, tag: &str) -> Result<(), EcsError> {
        let value = Value::default_for(tag)?;
        self.fields.entry(field.to_owned()).or_insert(Field {
            tag: tag.to_owned(),
            value,
        });
        Ok(())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for (field, slot) in &self.fields {
            writeln!(
                f,
                "Name: {}, Type: {}, Value: {}",
                field, slot.tag, slot.value
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
