//! Variable instructions: locals of the current frame and globals of the
//! store.

use super::{operand_u32, resolve_globaladdr};
use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::value::StackEntry;
use crate::runtime::RuntimeError;

pub fn local_get(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let idx = operand_u32(instruction)?;
    let frame = machine.current_frame()?;
    let value = {
        let f = frame.borrow();
        f.locals.get(idx as usize).copied().ok_or(RuntimeError::LocalIndexOutOfBounds(idx))?
    };
    machine.push_value(value);
    machine.increment_pc()
}

pub fn local_set(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let idx = operand_u32(instruction)?;
    let value = machine.pop_value()?;
    let frame = machine.current_frame()?;
    let mut f = frame.borrow_mut();
    let slot = f.locals.get_mut(idx as usize).ok_or(RuntimeError::LocalIndexOutOfBounds(idx))?;
    *slot = value;
    drop(f);
    machine.increment_pc()
}

/// Like `local.set` but leaves the value on the stack.
pub fn local_tee(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let idx = operand_u32(instruction)?;
    let value = match machine.peek() {
        Some(StackEntry::Value(value)) => *value,
        Some(_) => {
            return Err(RuntimeError::TypeMismatch {
                expected: "value".to_string(),
                actual: "label or frame".to_string(),
            })
        }
        None => return Err(RuntimeError::StackUnderflow),
    };
    let frame = machine.current_frame()?;
    let mut f = frame.borrow_mut();
    let slot = f.locals.get_mut(idx as usize).ok_or(RuntimeError::LocalIndexOutOfBounds(idx))?;
    *slot = value;
    drop(f);
    machine.increment_pc()
}

pub fn global_get(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let idx = operand_u32(instruction)?;
    let globaladdr = resolve_globaladdr(machine, idx)?;
    let value = machine.get_global(globaladdr)?.value;
    machine.push_value(value);
    machine.increment_pc()
}

pub fn global_set(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let idx = operand_u32(instruction)?;
    let value = machine.pop_value()?;
    let globaladdr = resolve_globaladdr(machine, idx)?;
    machine.set_global(globaladdr, value)?;
    machine.increment_pc()
}
