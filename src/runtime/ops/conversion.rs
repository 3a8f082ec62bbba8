//! Conversion instructions: wrap/extend, trapping and saturating float
//! truncation, int/float conversion, and bit reinterpretation.

use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

// Trapping truncation bounds are checked in f64, which represents every i32
// and the relevant power-of-two limits exactly. NaN traps as an invalid
// conversion; out-of-range values trap as integer overflow.

fn trunc_checked_i32(z: f64) -> Result<i32, RuntimeError> {
    if z.is_nan() {
        return Err(RuntimeError::InvalidConversionToInteger);
    }
    let t = z.trunc();
    if t < i32::MIN as f64 || t > i32::MAX as f64 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as i32)
}

fn trunc_checked_u32(z: f64) -> Result<u32, RuntimeError> {
    if z.is_nan() {
        return Err(RuntimeError::InvalidConversionToInteger);
    }
    let t = z.trunc();
    if t < 0.0 || t > u32::MAX as f64 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as u32)
}

fn trunc_checked_i64(z: f64) -> Result<i64, RuntimeError> {
    if z.is_nan() {
        return Err(RuntimeError::InvalidConversionToInteger);
    }
    let t = z.trunc();
    // The upper bound is 2^63 exactly; i64::MAX itself is not representable
    // in f64.
    if t < i64::MIN as f64 || t >= -(i64::MIN as f64) {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as i64)
}

fn trunc_checked_u64(z: f64) -> Result<u64, RuntimeError> {
    if z.is_nan() {
        return Err(RuntimeError::InvalidConversionToInteger);
    }
    let t = z.trunc();
    if t < 0.0 || t >= u64::MAX as f64 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as u64)
}

pub fn i32_wrap_i64(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::I32(c as i32));
    machine.increment_pc()
}

pub fn i32_trunc_f32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I32(trunc_checked_i32(z as f64)?));
    machine.increment_pc()
}

pub fn i32_trunc_f32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I32(trunc_checked_u32(z as f64)? as i32));
    machine.increment_pc()
}

pub fn i32_trunc_f64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I32(trunc_checked_i32(z)?));
    machine.increment_pc()
}

pub fn i32_trunc_f64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I32(trunc_checked_u32(z)? as i32));
    machine.increment_pc()
}

pub fn i64_extend_i32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::I64(c as i64));
    machine.increment_pc()
}

pub fn i64_extend_i32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::I64(c as u32 as i64));
    machine.increment_pc()
}

pub fn i64_trunc_f32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I64(trunc_checked_i64(z as f64)?));
    machine.increment_pc()
}

pub fn i64_trunc_f32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I64(trunc_checked_u64(z as f64)? as i64));
    machine.increment_pc()
}

pub fn i64_trunc_f64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I64(trunc_checked_i64(z)?));
    machine.increment_pc()
}

pub fn i64_trunc_f64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I64(trunc_checked_u64(z)? as i64));
    machine.increment_pc()
}

pub fn f32_convert_i32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::F32(c as f32));
    machine.increment_pc()
}

pub fn f32_convert_i32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::F32(c as u32 as f32));
    machine.increment_pc()
}

pub fn f32_convert_i64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::F32(c as f32));
    machine.increment_pc()
}

pub fn f32_convert_i64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::F32(c as u64 as f32));
    machine.increment_pc()
}

pub fn f32_demote_f64(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::F32(z as f32));
    machine.increment_pc()
}

pub fn f64_convert_i32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::F64(c as f64));
    machine.increment_pc()
}

pub fn f64_convert_i32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::F64(c as u32 as f64));
    machine.increment_pc()
}

pub fn f64_convert_i64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::F64(c as f64));
    machine.increment_pc()
}

pub fn f64_convert_i64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::F64(c as u64 as f64));
    machine.increment_pc()
}

pub fn f64_promote_f32(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::F64(z as f64));
    machine.increment_pc()
}

pub fn i32_reinterpret_f32(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I32(z.to_bits() as i32));
    machine.increment_pc()
}

pub fn i64_reinterpret_f64(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I64(z.to_bits() as i64));
    machine.increment_pc()
}

pub fn f32_reinterpret_i32(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::F32(f32::from_bits(c as u32)));
    machine.increment_pc()
}

pub fn f64_reinterpret_i64(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::F64(f64::from_bits(c as u64)));
    machine.increment_pc()
}

pub fn i32_extend8_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::I32(c as i8 as i32));
    machine.increment_pc()
}

pub fn i32_extend16_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i32()?;
    machine.push_value(Value::I32(c as i16 as i32));
    machine.increment_pc()
}

pub fn i64_extend8_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::I64(c as i8 as i64));
    machine.increment_pc()
}

pub fn i64_extend16_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::I64(c as i16 as i64));
    machine.increment_pc()
}

pub fn i64_extend32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let c = machine.pop_i64()?;
    machine.push_value(Value::I64(c as i32 as i64));
    machine.increment_pc()
}

// Saturating truncation leans on Rust's float-to-int casts, which saturate
// at the type bounds and map NaN to zero.

pub fn i32_trunc_sat_f32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I32(z as i32));
    machine.increment_pc()
}

pub fn i32_trunc_sat_f32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I32(z as u32 as i32));
    machine.increment_pc()
}

pub fn i32_trunc_sat_f64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I32(z as i32));
    machine.increment_pc()
}

pub fn i32_trunc_sat_f64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I32(z as u32 as i32));
    machine.increment_pc()
}

pub fn i64_trunc_sat_f32_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I64(z as i64));
    machine.increment_pc()
}

pub fn i64_trunc_sat_f32_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f32()?;
    machine.push_value(Value::I64(z as u64 as i64));
    machine.increment_pc()
}

pub fn i64_trunc_sat_f64_s(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I64(z as i64));
    machine.increment_pc()
}

pub fn i64_trunc_sat_f64_u(machine: &mut Store, _i: &Instruction) -> Result<(), RuntimeError> {
    let z = machine.pop_f64()?;
    machine.push_value(Value::I64(z as u64 as i64));
    machine.increment_pc()
}
