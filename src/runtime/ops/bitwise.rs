//! Bit-manipulation instructions. Shift and rotate counts are taken modulo
//! the type's bit width.

use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

fn binop_i32(machine: &mut Store, f: impl FnOnce(i32, i32) -> i32) -> Result<(), RuntimeError> {
    let c2 = machine.pop_i32()?;
    let c1 = machine.pop_i32()?;
    machine.push_value(Value::I32(f(c1, c2)));
    machine.increment_pc()
}

fn binop_i64(machine: &mut Store, f: impl FnOnce(i64, i64) -> i64) -> Result<(), RuntimeError> {
    let c2 = machine.pop_i64()?;
    let c1 = machine.pop_i64()?;
    machine.push_value(Value::I64(f(c1, c2)));
    machine.increment_pc()
}

pub fn i32_and(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| c1 & c2)
}

pub fn i32_or(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| c1 | c2)
}

pub fn i32_xor(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| c1 ^ c2)
}

pub fn i32_shl(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| c1.wrapping_shl(c2 as u32))
}

pub fn i32_shr_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| c1.wrapping_shr(c2 as u32))
}

pub fn i32_shr_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| ((c1 as u32).wrapping_shr(c2 as u32)) as i32)
}

pub fn i32_rotl(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| (c1 as u32).rotate_left(c2 as u32) as i32)
}

pub fn i32_rotr(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i32(machine, |c1, c2| (c1 as u32).rotate_right(c2 as u32) as i32)
}

pub fn i64_and(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| c1 & c2)
}

pub fn i64_or(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| c1 | c2)
}

pub fn i64_xor(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| c1 ^ c2)
}

pub fn i64_shl(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| c1.wrapping_shl(c2 as u32))
}

pub fn i64_shr_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| c1.wrapping_shr(c2 as u32))
}

pub fn i64_shr_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| ((c1 as u64).wrapping_shr(c2 as u32)) as i64)
}

pub fn i64_rotl(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| (c1 as u64).rotate_left(c2 as u32) as i64)
}

pub fn i64_rotr(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    binop_i64(machine, |c1, c2| (c1 as u64).rotate_right(c2 as u32) as i64)
}
