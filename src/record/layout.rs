use std::collections::HashMap;
use std::sync::Arc;

use super::schema::{FieldType, Schema};
use crate::file::Page;

/// Physical layout of the slots holding a schema's records.
///
/// A slot is a 4-byte used flag followed by the fields in schema insertion
/// order; integers take 4 bytes, strings take their length-prefixed
/// footprint. All slots of a table have the same size.
#[derive(Debug, Clone)]
pub struct Layout {
    schema: Arc<Schema>,
    offsets: HashMap<String, usize>,
    slot_size: usize,
}

impl Layout {
    /// Compute field offsets and slot size from a schema
    pub fn new(schema: Arc<Schema>) -> Self {
        let mut offsets = HashMap::new();
        let mut slot_size = 4; // used/empty flag
        for fldname in schema.fields() {
            offsets.insert(fldname.clone(), slot_size);
            slot_size += length_in_bytes(&schema, fldname);
        }
        Self {
            schema,
            offsets,
            slot_size,
        }
    }

    /// Rebuild a layout from offsets computed earlier, as stored in catalog
    /// metadata
    pub fn from_metadata(
        schema: Arc<Schema>,
        offsets: HashMap<String, usize>,
        slot_size: usize,
    ) -> Self {
        Self {
            schema,
            offsets,
            slot_size,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Byte offset of a field within its slot
    pub fn offset(&self, fldname: &str) -> Option<usize> {
        self.offsets.get(fldname).copied()
    }

    /// Size of one slot in bytes, flag included
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }
}

fn length_in_bytes(schema: &Schema, fldname: &str) -> usize {
    match schema.field_type(fldname) {
        Some(FieldType::Integer) => 4,
        Some(FieldType::Varchar) => Page::max_length(schema.length(fldname).unwrap_or(0)),
        None => 0,
    }
}
