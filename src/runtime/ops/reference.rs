//! Reference instructions.

use super::{operand_u32, resolve_funcaddr};
use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

/// Pushes a null reference of the type given by the operand.
pub fn ref_null(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let ref_type = instruction
        .as_ref_type()
        .filter(|t| t.is_ref())
        .ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))?;
    machine.push_value(Value::default_for(ref_type));
    machine.increment_pc()
}

pub fn ref_is_null(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    let value = machine.pop_value()?;
    let is_null = match value {
        Value::FuncRef(r) => r.is_none(),
        Value::ExternRef(r) => r.is_none(),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "reference".to_string(),
                actual: other.typ().to_string(),
            })
        }
    };
    machine.push_value(Value::I32(is_null as i32));
    machine.increment_pc()
}

/// Pushes a function reference to the store address of the module's
/// `func_idx`-th function.
pub fn ref_func(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let func_idx = operand_u32(instruction)?;
    let funcaddr = resolve_funcaddr(machine, func_idx)?;
    machine.push_value(Value::FuncRef(Some(funcaddr)));
    machine.increment_pc()
}
