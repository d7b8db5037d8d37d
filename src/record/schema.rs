use std::collections::HashMap;

use super::error::{RecordError, RecordResult};

/// Field types supported by the record layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 4-byte signed integer
    Integer,
    /// String of up to a fixed number of bytes
    Varchar,
}

#[derive(Debug, Clone, Copy)]
struct FieldInfo {
    ftype: FieldType,
    length: usize,
}

/// The record schema of a table: field names in insertion order, plus the
/// type and maximum length of each field.
///
/// Adding the same field name twice is a caller error: the metadata map is
/// overwritten while the ordered list keeps both entries.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<String>,
    info: HashMap<String, FieldInfo>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field of the given type; `length` only matters for `Varchar`
    pub fn add_field(&mut self, fldname: &str, ftype: FieldType, length: usize) {
        self.fields.push(fldname.to_string());
        self.info.insert(fldname.to_string(), FieldInfo { ftype, length });
    }

    /// Add an integer field
    pub fn add_int_field(&mut self, fldname: &str) {
        self.add_field(fldname, FieldType::Integer, 0);
    }

    /// Add a string field of up to `length` bytes
    pub fn add_string_field(&mut self, fldname: &str, length: usize) {
        self.add_field(fldname, FieldType::Varchar, length);
    }

    /// Copy one field definition from another schema
    pub fn add(&mut self, fldname: &str, sch: &Schema) -> RecordResult<()> {
        let info = sch
            .info
            .get(fldname)
            .ok_or_else(|| RecordError::UnknownField(fldname.to_string()))?;
        self.add_field(fldname, info.ftype, info.length);
        Ok(())
    }

    /// Copy every field definition from another schema
    pub fn add_all(&mut self, sch: &Schema) -> RecordResult<()> {
        for fldname in sch.fields() {
            self.add(fldname, sch)?;
        }
        Ok(())
    }

    /// Field names in insertion order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, fldname: &str) -> bool {
        self.info.contains_key(fldname)
    }

    pub fn field_type(&self, fldname: &str) -> Option<FieldType> {
        self.info.get(fldname).map(|i| i.ftype)
    }

    /// Maximum length of a `Varchar` field, in bytes
    pub fn length(&self, fldname: &str) -> Option<usize> {
        self.info.get(fldname).map(|i| i.length)
    }
}
