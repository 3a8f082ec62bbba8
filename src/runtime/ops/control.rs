//! Control-flow instructions: blocks, branches, calls, and returns.
//!
//! Entering a block parks a label under the block's parameter values; a
//! branch discards everything above (and including) its target label while
//! preserving only the values the branch carries forward. Branch targets are
//! the continuation program counters computed at flatten time.

use super::{operand_block, operand_u32, operand_u32x2, resolve_funcaddr, resolve_tableaddr};
use crate::parser::instruction::{BlockType, Instruction};
use crate::parser::module::FuncType;
use crate::runtime::store::Store;
use crate::runtime::value::{Label, StackEntry, Value};
use crate::runtime::RuntimeError;

pub fn unreachable(_machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    Err(RuntimeError::Unreachable)
}

pub fn nop(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    machine.increment_pc()
}

/// Resolves a block's type to a concrete signature: a function-type index,
/// a single bare result type, or no result.
fn block_func_type(machine: &mut Store, block_type: BlockType) -> Result<FuncType, RuntimeError> {
    match block_type {
        BlockType::TypeIndex(idx) => {
            let frame = machine.current_frame()?;
            let func_type = frame.borrow().module.func_types.get(idx as usize).cloned();
            func_type.ok_or(RuntimeError::TypeIndexOutOfBounds(idx))
        }
        BlockType::Value(value_type) => Ok(FuncType::new(Vec::new(), vec![value_type])),
        BlockType::Empty => Ok(FuncType::default()),
    }
}

/// Pops the block's parameter values, pushes a label, and pushes the
/// parameters back above it.
fn enter_block(
    machine: &mut Store,
    func_type: &FuncType,
    arity: usize,
    continuation: usize,
) -> Result<(), RuntimeError> {
    let mut params = Vec::with_capacity(func_type.parameters.len());
    for _ in 0..func_type.parameters.len() {
        params.push(machine.pop_value()?);
    }
    machine.push(StackEntry::Label(Label { arity, continuation }));
    for value in params.into_iter().rev() {
        machine.push_value(value);
    }
    Ok(())
}

pub fn block(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let block = operand_block(instruction)?;
    let func_type = block_func_type(machine, block.block_type)?;
    // A branch to a block exits it, carrying the block's results.
    enter_block(machine, &func_type, func_type.results.len(), instruction.continuation_pc)?;
    machine.increment_pc()
}

pub fn loop_(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let block = operand_block(instruction)?;
    let func_type = block_func_type(machine, block.block_type)?;
    // A branch to a loop re-enters it, carrying the loop's parameters.
    enter_block(machine, &func_type, func_type.parameters.len(), instruction.continuation_pc)?;
    machine.increment_pc()
}

pub fn if_(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let block = operand_block(instruction)?;
    let cond = machine.pop_i32()?;
    let func_type = block_func_type(machine, block.block_type)?;
    if cond != 0 {
        enter_block(machine, &func_type, func_type.results.len(), instruction.continuation_pc)?;
        machine.increment_pc()
    } else {
        // With no else clause the two continuations coincide and no block is
        // entered at all.
        if instruction.else_continuation_pc != instruction.continuation_pc {
            enter_block(machine, &func_type, func_type.results.len(), instruction.continuation_pc)?;
        }
        machine.set_pc(instruction.else_continuation_pc)
    }
}

/// Slides the nearest label out of the stack, preserving the values above
/// it, and returns it.
fn exit_to_label(machine: &mut Store) -> Result<Label, RuntimeError> {
    let mut values = Vec::new();
    loop {
        match machine.pop()? {
            StackEntry::Value(value) => values.push(value),
            StackEntry::Label(label) => {
                for value in values.into_iter().rev() {
                    machine.push_value(value);
                }
                return Ok(label);
            }
            StackEntry::Frame(_) => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "label".to_string(),
                    actual: "frame".to_string(),
                })
            }
        }
    }
}

/// End of a true branch reached without a jump: discard the if's label and
/// rejoin past the whole construct.
pub fn else_(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    let label = exit_to_label(machine)?;
    machine.set_pc(label.continuation)
}

/// End of a block reached without a jump: discard its label and continue.
pub fn end(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    exit_to_label(machine)?;
    machine.increment_pc()
}

/// Branches to the `depth`-th enclosing label: saves that label's arity of
/// values, pops everything up to and including the label (counting
/// intervening labels down), restores the saved values, and jumps to the
/// label's continuation.
pub(crate) fn do_br(machine: &mut Store, depth: usize) -> Result<(), RuntimeError> {
    let label = machine.nth_label(depth)?;
    let mut values = Vec::with_capacity(label.arity);
    for _ in 0..label.arity {
        values.push(machine.pop_value()?);
    }
    let mut remaining = depth as i64;
    while remaining >= 0 {
        if let StackEntry::Label(_) = machine.pop()? {
            remaining -= 1;
        }
    }
    for value in values.into_iter().rev() {
        machine.push_value(value);
    }
    machine.set_pc(label.continuation)
}

pub fn br(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    do_br(machine, operand_u32(instruction)? as usize)
}

pub fn br_if(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let depth = operand_u32(instruction)? as usize;
    if machine.pop_i32()? != 0 {
        do_br(machine, depth)
    } else {
        machine.increment_pc()
    }
}

pub fn br_table(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let labels = instruction
        .as_br_table()
        .ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))?;
    let idx = machine.pop_u32()? as usize;
    // The last entry is the default for any out-of-range index.
    let depth = if idx < labels.len() {
        labels[idx]
    } else {
        *labels.last().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))?
    };
    do_br(machine, depth as usize)
}

pub fn return_(machine: &mut Store, _instruction: &Instruction) -> Result<(), RuntimeError> {
    machine.unwind_frame()
}

pub fn call(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let func_idx = operand_u32(instruction)?;
    // Step past the call first, so the callee's return resumes correctly.
    machine.increment_pc()?;
    let funcaddr = resolve_funcaddr(machine, func_idx)?;
    machine.invoke_func(funcaddr)
}

/// Resolves a callee through a table's reference slot, trapping on an
/// out-of-range index, a null reference, or a signature mismatch with the
/// call site's declared type.
pub fn call_indirect(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    let (type_idx, table_idx) = operand_u32x2(instruction)?;
    let tableaddr = resolve_tableaddr(machine, table_idx)?;
    let expected = {
        let frame = machine.current_frame()?;
        let func_type = frame.borrow().module.func_types.get(type_idx as usize).cloned();
        func_type.ok_or(RuntimeError::TypeIndexOutOfBounds(type_idx))?
    };

    let i = machine.pop_u32()? as usize;
    let table = machine.get_table(tableaddr)?;
    if i >= table.size() {
        return Err(RuntimeError::UndefinedElement(i));
    }
    let funcaddr = match table.get(i)? {
        Value::FuncRef(Some(addr)) => addr,
        Value::FuncRef(None) => return Err(RuntimeError::UninitializedElement(i)),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "funcref".to_string(),
                actual: other.typ().to_string(),
            })
        }
    };

    let actual = machine.get_func(funcaddr)?.func_type().clone();
    if actual != expected {
        return Err(RuntimeError::IndirectCallTypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    machine.increment_pc()?;
    machine.invoke_func(funcaddr)
}
