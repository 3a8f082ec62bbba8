//! Table instances: growable vectors of reference values.

use super::value::Value;
use super::RuntimeError;
use crate::parser::module::TableType;

#[derive(Debug)]
pub struct TableInstance {
    table_type: TableType,
    elements: Vec<Value>,
}

impl TableInstance {
    /// Creates a table of `min` null references of the table's element type.
    pub fn new(table_type: TableType) -> TableInstance {
        let null = Value::default_for(table_type.ref_type);
        let elements = vec![null; table_type.limits.min as usize];
        TableInstance { table_type, elements }
    }

    pub fn table_type(&self) -> &TableType {
        &self.table_type
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, index: usize) -> Result<Value, RuntimeError> {
        self.elements
            .get(index)
            .copied()
            .ok_or(RuntimeError::OutOfBoundsTableAccess(index))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        match self.elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::OutOfBoundsTableAccess(index)),
        }
    }

    /// Grows the table by `delta` entries initialized to `init`. Returns the
    /// previous size, or -1 if the grow would exceed the declared maximum.
    pub fn grow(&mut self, delta: u32, init: Value) -> i32 {
        let current = self.elements.len();
        let Some(new_size) = (current as u32).checked_add(delta) else {
            return -1;
        };
        if let Some(max) = self.table_type.limits.max {
            if new_size > max {
                return -1;
            }
        }
        self.elements.resize(new_size as usize, init);
        current as i32
    }

    /// Fills `[offset, offset+len)` with `value`.
    pub fn fill(&mut self, offset: usize, value: Value, len: usize) -> Result<(), RuntimeError> {
        let end = offset
            .checked_add(len)
            .ok_or(RuntimeError::OutOfBoundsTableAccess(offset))?;
        if end > self.elements.len() {
            return Err(RuntimeError::OutOfBoundsTableAccess(end.saturating_sub(1)));
        }
        self.elements[offset..end].fill(value);
        Ok(())
    }

    /// A bounds-checked view of `[offset, offset+len)`.
    pub fn range(&self, offset: usize, len: usize) -> Result<&[Value], RuntimeError> {
        let end = offset
            .checked_add(len)
            .ok_or(RuntimeError::OutOfBoundsTableAccess(offset))?;
        if end > self.elements.len() {
            return Err(RuntimeError::OutOfBoundsTableAccess(end.saturating_sub(1)));
        }
        Ok(&self.elements[offset..end])
    }

    /// Overlapping-safe copy of `len` entries from `src` to `dst` within
    /// this table.
    pub fn copy_within(&mut self, dst: usize, src: usize, len: usize) -> Result<(), RuntimeError> {
        self.range(src, len)?;
        self.range(dst, len)?;
        self.elements.copy_within(src..src + len, dst);
        Ok(())
    }

    /// Copies `src` into the table at `offset` (used by active element
    /// segments and `table.init`).
    pub fn init(&mut self, offset: usize, src: &[Value]) -> Result<(), RuntimeError> {
        let end = offset
            .checked_add(src.len())
            .ok_or(RuntimeError::OutOfBoundsTableAccess(offset))?;
        if end > self.elements.len() {
            return Err(RuntimeError::OutOfBoundsTableAccess(end.saturating_sub(1)));
        }
        self.elements[offset..end].copy_from_slice(src);
        Ok(())
    }
}
