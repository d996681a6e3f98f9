//! Resolved field schema
//!
//! A `FieldSchema` is built from a `FieldDef` during the first pass of
//! schema construction and never changes afterwards.

use crate::errors::{StoreError, StoreResult};

use super::types::{ComputedValue, FieldDef, FieldType};

/// Role a field plays in its table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Attribute,
    PrimaryKey,
    ForeignKey,
    Modified,
}

/// Foreign key details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table
    pub references: String,
    /// Reverse relation name on the referenced table
    pub relation_name: Option<String>,
    pub cascade: bool,
    pub unique: bool,
    pub not_null: bool,
}

/// A single field of a table
#[derive(Debug, Clone)]
pub struct FieldSchema {
    name: String,
    field_name: String,
    prop_name: String,
    is_pk: bool,
    is_modified: bool,
    foreign: Option<ForeignKey>,
    computed: Option<ComputedValue>,
}

impl FieldSchema {
    /// Build a field from its declaration.
    ///
    /// Flags that only make sense on a foreign key are rejected on other
    /// fields.
    pub fn from_def(table: &str, name: &str, def: &FieldDef) -> StoreResult<Self> {
        if name.is_empty() {
            return Err(StoreError::argument(format!("table '{}' has an unnamed field", table)));
        }

        let is_pk = def.pk || def.field_type == Some(FieldType::Pk);
        let is_modified = def.field_type == Some(FieldType::Modified);

        if def.field_type == Some(FieldType::Fk) && def.references.is_none() {
            return Err(StoreError::argument(format!(
                "'{}.{}' is declared fk but references no table",
                table, name
            )));
        }

        if is_modified && (is_pk || def.references.is_some()) {
            return Err(StoreError::argument(format!(
                "'{}.{}' cannot be both a modified stamp and a key",
                table, name
            )));
        }

        let foreign = match &def.references {
            Some(target) if target.is_empty() => {
                return Err(StoreError::argument(format!(
                    "'{}.{}' references an empty table name",
                    table, name
                )));
            }
            Some(target) => Some(ForeignKey {
                references: target.clone(),
                relation_name: def.relation_name.clone(),
                cascade: def.cascade,
                unique: def.unique,
                not_null: def.not_null,
            }),
            None => {
                if def.relation_name.is_some() || def.cascade || def.unique || def.not_null {
                    return Err(StoreError::argument(format!(
                        "'{}.{}' declares relation options without `references`",
                        table, name
                    )));
                }
                None
            }
        };

        Ok(Self {
            name: name.to_string(),
            field_name: def.field_name.clone().unwrap_or_else(|| name.to_string()),
            prop_name: def.prop_name.clone().unwrap_or_else(|| name.to_string()),
            is_pk,
            is_modified,
            foreign,
            computed: def.value.clone(),
        })
    }

    /// Schema name; also the name of the field's index
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key in the stored row
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Record accessor name
    pub fn prop_name(&self) -> &str {
        &self.prop_name
    }

    pub fn role(&self) -> FieldRole {
        if self.is_pk {
            FieldRole::PrimaryKey
        } else if self.foreign.is_some() {
            FieldRole::ForeignKey
        } else if self.is_modified {
            FieldRole::Modified
        } else {
            FieldRole::Attribute
        }
    }

    pub fn is_pk(&self) -> bool {
        self.is_pk
    }

    pub fn is_fk(&self) -> bool {
        self.foreign.is_some()
    }

    pub fn is_modified_stamp(&self) -> bool {
        self.is_modified
    }

    pub fn foreign(&self) -> Option<&ForeignKey> {
        self.foreign.as_ref()
    }

    /// Referenced table name for foreign keys
    pub fn references(&self) -> Option<&str> {
        self.foreign.as_ref().map(|fk| fk.references.as_str())
    }

    pub fn is_unique(&self) -> bool {
        self.foreign.as_ref().is_some_and(|fk| fk.unique)
    }

    pub fn computed(&self) -> Option<&ComputedValue> {
        self.computed.as_ref()
    }
}
