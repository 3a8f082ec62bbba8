//! Memory instructions: loads, stores, size/grow, and the bulk-memory
//! family.
//!
//! Every access computes an effective address of popped base + the
//! instruction's static offset; the alignment operand is advisory only and
//! never checked. An access whose range exceeds the memory's current length
//! traps without performing a partial read or write.

use super::{operand_u32, operand_u32x2, resolve_dataaddr, resolve_memaddr};
use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

/// Effective address: popped base plus static offset. Both are 32-bit, so
/// the sum is overflow-free in usize arithmetic.
fn effective_addr(machine: &mut Store, instruction: &Instruction) -> Result<usize, RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let base = machine.pop_u32()?;
    Ok(base as usize + offset as usize)
}

pub fn i32_load(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u32(ea)?;
    machine.push_value(Value::I32(value as i32));
    machine.increment_pc()
}

pub fn i64_load(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u64(ea)?;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn f32_load(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_f32(ea)?;
    machine.push_value(Value::F32(value));
    machine.increment_pc()
}

pub fn f64_load(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_f64(ea)?;
    machine.push_value(Value::F64(value));
    machine.increment_pc()
}

pub fn i32_load8_s(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u8(ea)? as i8;
    machine.push_value(Value::I32(value as i32));
    machine.increment_pc()
}

pub fn i32_load8_u(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u8(ea)?;
    machine.push_value(Value::I32(value as i32));
    machine.increment_pc()
}

pub fn i32_load16_s(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u16(ea)? as i16;
    machine.push_value(Value::I32(value as i32));
    machine.increment_pc()
}

pub fn i32_load16_u(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u16(ea)?;
    machine.push_value(Value::I32(value as i32));
    machine.increment_pc()
}

pub fn i64_load8_s(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u8(ea)? as i8;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn i64_load8_u(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u8(ea)?;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn i64_load16_s(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u16(ea)? as i16;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn i64_load16_u(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u16(ea)?;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn i64_load32_s(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u32(ea)? as i32;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

pub fn i64_load32_u(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ea = effective_addr(machine, instruction)?;
    let memaddr = resolve_memaddr(machine, 0)?;
    let value = machine.get_mem(memaddr)?.read_u32(ea)?;
    machine.push_value(Value::I64(value as i64));
    machine.increment_pc()
}

/// Stores pop the value first, then the base address.
pub fn i32_store(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u32()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u32(ea, value)?;
    machine.increment_pc()
}

pub fn i64_store(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u64()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u64(ea, value)?;
    machine.increment_pc()
}

pub fn f32_store(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_f32()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_f32(ea, value)?;
    machine.increment_pc()
}

pub fn f64_store(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_f64()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_f64(ea, value)?;
    machine.increment_pc()
}

pub fn i32_store8(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u32()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u8(ea, value as u8)?;
    machine.increment_pc()
}

pub fn i32_store16(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u32()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u16(ea, value as u16)?;
    machine.increment_pc()
}

pub fn i64_store8(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u64()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u8(ea, value as u8)?;
    machine.increment_pc()
}

pub fn i64_store16(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u64()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u16(ea, value as u16)?;
    machine.increment_pc()
}

pub fn i64_store32(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_align, offset) = operand_u32x2(instruction)?;
    let value = machine.pop_u64()?;
    let base = machine.pop_u32()?;
    let ea = base as usize + offset as usize;
    let memaddr = resolve_memaddr(machine, 0)?;
    machine.get_mem_mut(memaddr)?.write_u32(ea, value as u32)?;
    machine.increment_pc()
}

pub fn memory_size(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let memaddr = resolve_memaddr(machine, operand_u32(instruction)?)?;
    let pages = machine.get_mem(memaddr)?.size_pages();
    machine.push_value(Value::I32(pages as i32));
    machine.increment_pc()
}

/// Grows the memory, pushing the previous size in pages, or -1 if the grow
/// was not allowed.
pub fn memory_grow(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let memaddr = resolve_memaddr(machine, operand_u32(instruction)?)?;
    let delta = machine.pop_u32()?;
    let previous = machine.get_mem_mut(memaddr)?.grow(delta);
    machine.push_value(Value::I32(previous));
    machine.increment_pc()
}

pub fn memory_init(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (data_idx, mem_idx) = operand_u32x2(instruction)?;
    let memaddr = resolve_memaddr(machine, mem_idx)?;
    let dataaddr = resolve_dataaddr(machine, data_idx)?;
    let n = machine.pop_u32()? as usize;
    let s = machine.pop_u32()? as usize;
    let d = machine.pop_u32()? as usize;
    machine.memory_init(memaddr, dataaddr, d, s, n)?;
    machine.increment_pc()
}

pub fn data_drop(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let dataaddr = resolve_dataaddr(machine, operand_u32(instruction)?)?;
    machine.drop_data(dataaddr)?;
    machine.increment_pc()
}

pub fn memory_copy(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (_dst_idx, src_idx) = operand_u32x2(instruction)?;
    let memaddr = resolve_memaddr(machine, src_idx)?;
    let n = machine.pop_u32()? as usize;
    let s = machine.pop_u32()? as usize;
    let d = machine.pop_u32()? as usize;
    machine.get_mem_mut(memaddr)?.copy_within(d, s, n)?;
    machine.increment_pc()
}

pub fn memory_fill(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let memaddr = resolve_memaddr(machine, operand_u32(instruction)?)?;
    let n = machine.pop_u32()? as usize;
    let value = machine.pop_u32()?;
    let d = machine.pop_u32()? as usize;
    machine.get_mem_mut(memaddr)?.fill(d, value as u8, n)?;
    machine.increment_pc()
}
