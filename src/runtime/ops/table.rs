//! Table instructions.

use super::{operand_u32, operand_u32x2, resolve_elemaddr, resolve_tableaddr};
use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

pub fn table_get(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let tableaddr = resolve_tableaddr(machine, operand_u32(instruction)?)?;
    let i = machine.pop_u32()? as usize;
    let value = machine.get_table(tableaddr)?.get(i)?;
    machine.push_value(value);
    machine.increment_pc()
}

pub fn table_set(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let tableaddr = resolve_tableaddr(machine, operand_u32(instruction)?)?;
    let value = machine.pop_value()?;
    let i = machine.pop_u32()? as usize;
    machine.get_table_mut(tableaddr)?.set(i, value)?;
    machine.increment_pc()
}

pub fn table_init(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (elem_idx, table_idx) = operand_u32x2(instruction)?;
    let tableaddr = resolve_tableaddr(machine, table_idx)?;
    let elemaddr = resolve_elemaddr(machine, elem_idx)?;
    let n = machine.pop_u32()? as usize;
    let s = machine.pop_u32()? as usize;
    let d = machine.pop_u32()? as usize;
    machine.table_init(tableaddr, elemaddr, d, s, n)?;
    machine.increment_pc()
}

pub fn elem_drop(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let elemaddr = resolve_elemaddr(machine, operand_u32(instruction)?)?;
    machine.drop_element(elemaddr)?;
    machine.increment_pc()
}

pub fn table_copy(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (dst_idx, src_idx) = operand_u32x2(instruction)?;
    let dst = resolve_tableaddr(machine, dst_idx)?;
    let src = resolve_tableaddr(machine, src_idx)?;
    let n = machine.pop_u32()? as usize;
    let s = machine.pop_u32()? as usize;
    let d = machine.pop_u32()? as usize;
    machine.table_copy(dst, src, d, s, n)?;
    machine.increment_pc()
}

/// Grows the table, pushing the previous size, or -1 if the grow was not
/// allowed.
pub fn table_grow(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let tableaddr = resolve_tableaddr(machine, operand_u32(instruction)?)?;
    let n = machine.pop_u32()?;
    let init = machine.pop_value()?;
    let previous = machine.get_table_mut(tableaddr)?.grow(n, init);
    machine.push_value(Value::I32(previous));
    machine.increment_pc()
}

pub fn table_size(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let tableaddr = resolve_tableaddr(machine, operand_u32(instruction)?)?;
    let size = machine.get_table(tableaddr)?.size();
    machine.push_value(Value::I32(size as i32));
    machine.increment_pc()
}

pub fn table_fill(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let tableaddr = resolve_tableaddr(machine, operand_u32(instruction)?)?;
    let n = machine.pop_u32()? as usize;
    let value = machine.pop_value()?;
    let i = machine.pop_u32()? as usize;
    machine.get_table_mut(tableaddr)?.fill(i, value, n)?;
    machine.increment_pc()
}
