//! Parametric instructions: drop and select.

use crate::parser::instruction::Instruction;
use crate::runtime::store::Store;
use crate::runtime::RuntimeError;

pub fn drop(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    machine.pop_value()?;
    machine.increment_pc()
}

pub fn select(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    let cond = machine.pop_i32()?;
    let val2 = machine.pop_value()?;
    let val1 = machine.pop_value()?;
    machine.push_value(if cond != 0 { val1 } else { val2 });
    machine.increment_pc()
}

/// The typed select's value-type annotation only matters to validation; the
/// selection itself is identical.
pub fn select_typed(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    select(machine, instruction)
}
