use super::error::{RecordError, RecordResult};
use super::layout::Layout;
use super::schema::FieldType;
use super::SlotId;
use crate::buffer::{Buffer, TxId};
use crate::file::BlockId;

/// Slot flag: the slot holds no record
const EMPTY: i32 = 0;
/// Slot flag: the slot holds a record
const USED: i32 = 1;

/// Typed view over one pinned buffer under a layout.
///
/// The view is transient: callers build it over the frame for the duration
/// of one operation while they hold the buffer manager. Writes record the
/// modifying transaction on the underlying buffer.
pub struct RecordPage<'a> {
    buffer: &'a mut Buffer,
    layout: &'a Layout,
    tx: TxId,
}

impl<'a> RecordPage<'a> {
    pub fn new(buffer: &'a mut Buffer, layout: &'a Layout, tx: TxId) -> Self {
        Self { buffer, layout, tx }
    }

    pub fn get_int(&self, slot: SlotId, fldname: &str) -> RecordResult<i32> {
        let fldpos = self.field_pos(slot, fldname)?;
        Ok(self.buffer.contents().get_int(fldpos)?)
    }

    pub fn get_string(&self, slot: SlotId, fldname: &str) -> RecordResult<String> {
        let fldpos = self.field_pos(slot, fldname)?;
        Ok(self.buffer.contents().get_string(fldpos)?)
    }

    pub fn set_int(&mut self, slot: SlotId, fldname: &str, val: i32) -> RecordResult<()> {
        let fldpos = self.field_pos(slot, fldname)?;
        self.buffer.contents_mut().set_int(fldpos, val)?;
        self.buffer.set_modified(self.tx, None);
        Ok(())
    }

    pub fn set_string(&mut self, slot: SlotId, fldname: &str, val: &str) -> RecordResult<()> {
        let fldpos = self.field_pos(slot, fldname)?;
        self.buffer.contents_mut().set_string(fldpos, val)?;
        self.buffer.set_modified(self.tx, None);
        Ok(())
    }

    /// Mark the slot empty
    pub fn delete(&mut self, slot: SlotId) -> RecordResult<()> {
        self.set_flag(slot, EMPTY)?;
        self.buffer.set_modified(self.tx, None);
        Ok(())
    }

    /// Mark every valid slot empty and zero its fields.
    ///
    /// Called exactly once, right after a new block is appended.
    pub fn format(&mut self) -> RecordResult<()> {
        let layout = self.layout;
        let mut slot = 0;
        while self.is_valid_slot(slot) {
            self.set_flag(slot, EMPTY)?;
            for fldname in layout.schema().fields() {
                let fldpos = self.field_pos(slot, fldname)?;
                match layout.schema().field_type(fldname) {
                    Some(FieldType::Integer) => {
                        self.buffer.contents_mut().set_int(fldpos, 0)?;
                    }
                    Some(FieldType::Varchar) => {
                        self.buffer.contents_mut().set_string(fldpos, "")?;
                    }
                    None => return Err(RecordError::UnknownField(fldname.to_string())),
                }
            }
            slot += 1;
        }
        self.buffer.set_modified(self.tx, None);
        Ok(())
    }

    /// Next used slot strictly after `slot`, or from slot 0 for `None`
    pub fn next_after(&self, slot: Option<SlotId>) -> RecordResult<Option<SlotId>> {
        self.search_after(slot, USED)
    }

    /// Claim the next empty slot strictly after `slot`, marking it used
    pub fn insert_after(&mut self, slot: Option<SlotId>) -> RecordResult<Option<SlotId>> {
        let newslot = self.search_after(slot, EMPTY)?;
        if let Some(s) = newslot {
            self.set_flag(s, USED)?;
            self.buffer.set_modified(self.tx, None);
        }
        Ok(newslot)
    }

    /// The block this page is bound to
    pub fn block(&self) -> Option<&BlockId> {
        self.buffer.block()
    }

    fn search_after(&self, slot: Option<SlotId>, flag: i32) -> RecordResult<Option<SlotId>> {
        let mut current = slot.map_or(0, |s| s + 1);
        while self.is_valid_slot(current) {
            if self.flag(current)? == flag {
                return Ok(Some(current));
            }
            current += 1;
        }
        Ok(None)
    }

    fn flag(&self, slot: SlotId) -> RecordResult<i32> {
        Ok(self.buffer.contents().get_int(self.slot_offset(slot))?)
    }

    fn set_flag(&mut self, slot: SlotId, flag: i32) -> RecordResult<()> {
        let pos = self.slot_offset(slot);
        self.buffer.contents_mut().set_int(pos, flag)?;
        Ok(())
    }

    fn is_valid_slot(&self, slot: SlotId) -> bool {
        self.slot_offset(slot + 1) <= self.buffer.contents().size()
    }

    fn slot_offset(&self, slot: SlotId) -> usize {
        slot * self.layout.slot_size()
    }

    fn field_pos(&self, slot: SlotId, fldname: &str) -> RecordResult<usize> {
        let offset = self
            .layout
            .offset(fldname)
            .ok_or_else(|| RecordError::UnknownField(fldname.to_string()))?;
        Ok(self.slot_offset(slot) + offset)
    }
}
