//! Comparison instructions. All comparisons push an i32 truth value.
//! Unsigned variants reinterpret the operand bits at the type's width.

use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

fn cmp_i32(machine: &mut Store, f: impl FnOnce(i32, i32) -> bool) -> Result<(), RuntimeError> {
    let c2 = machine.pop_i32()?;
    let c1 = machine.pop_i32()?;
    machine.push_value(Value::I32(f(c1, c2) as i32));
    machine.increment_pc()
}

fn cmp_u32(machine: &mut Store, f: impl FnOnce(u32, u32) -> bool) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| f(c1 as u32, c2 as u32))
}

fn cmp_i64(machine: &mut Store, f: impl FnOnce(i64, i64) -> bool) -> Result<(), RuntimeError> {
    let c2 = machine.pop_i64()?;
    let c1 = machine.pop_i64()?;
    machine.push_value(Value::I32(f(c1, c2) as i32));
    machine.increment_pc()
}

fn cmp_u64(machine: &mut Store, f: impl FnOnce(u64, u64) -> bool) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| f(c1 as u64, c2 as u64))
}

fn cmp_f32(machine: &mut Store, f: impl FnOnce(f32, f32) -> bool) -> Result<(), RuntimeError> {
    let c2 = machine.pop_f32()?;
    let c1 = machine.pop_f32()?;
    machine.push_value(Value::I32(f(c1, c2) as i32));
    machine.increment_pc()
}

fn cmp_f64(machine: &mut Store, f: impl FnOnce(f64, f64) -> bool) -> Result<(), RuntimeError> {
    let c2 = machine.pop_f64()?;
    let c1 = machine.pop_f64()?;
    machine.push_value(Value::I32(f(c1, c2) as i32));
    machine.increment_pc()
}

pub fn i32_eqz(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    let c1 = machine.pop_i32()?;
    machine.push_value(Value::I32((c1 == 0) as i32));
    machine.increment_pc()
}

pub fn i32_eq(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 == c2)
}

pub fn i32_ne(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 != c2)
}

pub fn i32_lt_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 < c2)
}

pub fn i32_lt_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u32(machine, |c1, c2| c1 < c2)
}

pub fn i32_gt_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 > c2)
}

pub fn i32_gt_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u32(machine, |c1, c2| c1 > c2)
}

pub fn i32_le_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 <= c2)
}

pub fn i32_le_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u32(machine, |c1, c2| c1 <= c2)
}

pub fn i32_ge_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i32(machine, |c1, c2| c1 >= c2)
}

pub fn i32_ge_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u32(machine, |c1, c2| c1 >= c2)
}

pub fn i64_eqz(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    let c1 = machine.pop_i64()?;
    machine.push_value(Value::I32((c1 == 0) as i32));
    machine.increment_pc()
}

pub fn i64_eq(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 == c2)
}

pub fn i64_ne(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 != c2)
}

pub fn i64_lt_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 < c2)
}

pub fn i64_lt_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u64(machine, |c1, c2| c1 < c2)
}

pub fn i64_gt_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 > c2)
}

pub fn i64_gt_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u64(machine, |c1, c2| c1 > c2)
}

pub fn i64_le_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 <= c2)
}

pub fn i64_le_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u64(machine, |c1, c2| c1 <= c2)
}

pub fn i64_ge_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_i64(machine, |c1, c2| c1 >= c2)
}

pub fn i64_ge_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_u64(machine, |c1, c2| c1 >= c2)
}

pub fn f32_eq(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 == c2)
}

pub fn f32_ne(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 != c2)
}

pub fn f32_lt(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 < c2)
}

pub fn f32_gt(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 > c2)
}

pub fn f32_le(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 <= c2)
}

pub fn f32_ge(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f32(machine, |c1, c2| c1 >= c2)
}

pub fn f64_eq(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 == c2)
}

pub fn f64_ne(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 != c2)
}

pub fn f64_lt(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 < c2)
}

pub fn f64_gt(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 > c2)
}

pub fn f64_le(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 <= c2)
}

pub fn f64_ge(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    cmp_f64(machine, |c1, c2| c1 >= c2)
}
