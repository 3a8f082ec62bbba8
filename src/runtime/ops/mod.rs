//! The instruction evaluator: one handler per opcode, dispatched from
//! [`eval`] by a match over the closed instruction tag set, grouped into one
//! module per instruction family.
//!
//! Every handler leaves the program counter pointing at the next instruction
//! to execute: plain instructions step forward, control instructions jump to
//! their precomputed continuation.

pub mod bitwise;
pub mod comparison;
pub mod control;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod reference;
pub mod table;
pub mod variable;

use super::store::Store;
use super::RuntimeError;
use crate::parser::instruction::{Block, Instruction, InstructionType};

/// Evaluates one instruction against the store. Opcodes with no handler
/// (the vector instructions) fail with
/// [`RuntimeError::UnimplementedInstruction`], distinguishable from a trap.
pub fn eval(machine: &mut Store, instruction: &Instruction) -> Result<(), RuntimeError> {
    use InstructionType as I;
    match instruction.instruction_type {
        // Control
        I::Unreachable => control::unreachable(machine, instruction),
        I::Nop => control::nop(machine, instruction),
        I::Block => control::block(machine, instruction),
        I::Loop => control::loop_(machine, instruction),
        I::If => control::if_(machine, instruction),
        I::Else => control::else_(machine, instruction),
        I::End => control::end(machine, instruction),
        I::Br => control::br(machine, instruction),
        I::BrIf => control::br_if(machine, instruction),
        I::BrTable => control::br_table(machine, instruction),
        I::Return => control::return_(machine, instruction),
        I::Call => control::call(machine, instruction),
        I::CallIndirect => control::call_indirect(machine, instruction),

        // References
        I::RefNull => reference::ref_null(machine, instruction),
        I::RefIsNull => reference::ref_is_null(machine, instruction),
        I::RefFunc => reference::ref_func(machine, instruction),

        // Parametric
        I::Drop => parametric::drop(machine, instruction),
        I::Select => parametric::select(machine, instruction),
        I::SelectTyped => parametric::select_typed(machine, instruction),

        // Variables
        I::LocalGet => variable::local_get(machine, instruction),
        I::LocalSet => variable::local_set(machine, instruction),
        I::LocalTee => variable::local_tee(machine, instruction),
        I::GlobalGet => variable::global_get(machine, instruction),
        I::GlobalSet => variable::global_set(machine, instruction),

        // Tables
        I::TableGet => table::table_get(machine, instruction),
        I::TableSet => table::table_set(machine, instruction),
        I::TableInit => table::table_init(machine, instruction),
        I::ElemDrop => table::elem_drop(machine, instruction),
        I::TableCopy => table::table_copy(machine, instruction),
        I::TableGrow => table::table_grow(machine, instruction),
        I::TableSize => table::table_size(machine, instruction),
        I::TableFill => table::table_fill(machine, instruction),

        // Memory
        I::I32Load => memory::i32_load(machine, instruction),
        I::I64Load => memory::i64_load(machine, instruction),
        I::F32Load => memory::f32_load(machine, instruction),
        I::F64Load => memory::f64_load(machine, instruction),
        I::I32Load8S => memory::i32_load8_s(machine, instruction),
        I::I32Load8U => memory::i32_load8_u(machine, instruction),
        I::I32Load16S => memory::i32_load16_s(machine, instruction),
        I::I32Load16U => memory::i32_load16_u(machine, instruction),
        I::I64Load8S => memory::i64_load8_s(machine, instruction),
        I::I64Load8U => memory::i64_load8_u(machine, instruction),
        I::I64Load16S => memory::i64_load16_s(machine, instruction),
        I::I64Load16U => memory::i64_load16_u(machine, instruction),
        I::I64Load32S => memory::i64_load32_s(machine, instruction),
        I::I64Load32U => memory::i64_load32_u(machine, instruction),
        I::I32Store => memory::i32_store(machine, instruction),
        I::I64Store => memory::i64_store(machine, instruction),
        I::F32Store => memory::f32_store(machine, instruction),
        I::F64Store => memory::f64_store(machine, instruction),
        I::I32Store8 => memory::i32_store8(machine, instruction),
        I::I32Store16 => memory::i32_store16(machine, instruction),
        I::I64Store8 => memory::i64_store8(machine, instruction),
        I::I64Store16 => memory::i64_store16(machine, instruction),
        I::I64Store32 => memory::i64_store32(machine, instruction),
        I::MemorySize => memory::memory_size(machine, instruction),
        I::MemoryGrow => memory::memory_grow(machine, instruction),
        I::MemoryInit => memory::memory_init(machine, instruction),
        I::DataDrop => memory::data_drop(machine, instruction),
        I::MemoryCopy => memory::memory_copy(machine, instruction),
        I::MemoryFill => memory::memory_fill(machine, instruction),

        // Constants
        I::I32Const => numeric::i32_const(machine, instruction),
        I::I64Const => numeric::i64_const(machine, instruction),
        I::F32Const => numeric::f32_const(machine, instruction),
        I::F64Const => numeric::f64_const(machine, instruction),

        // Comparisons
        I::I32Eqz => comparison::i32_eqz(machine, instruction),
        I::I32Eq => comparison::i32_eq(machine, instruction),
        I::I32Ne => comparison::i32_ne(machine, instruction),
        I::I32LtS => comparison::i32_lt_s(machine, instruction),
        I::I32LtU => comparison::i32_lt_u(machine, instruction),
        I::I32GtS => comparison::i32_gt_s(machine, instruction),
        I::I32GtU => comparison::i32_gt_u(machine, instruction),
        I::I32LeS => comparison::i32_le_s(machine, instruction),
        I::I32LeU => comparison::i32_le_u(machine, instruction),
        I::I32GeS => comparison::i32_ge_s(machine, instruction),
        I::I32GeU => comparison::i32_ge_u(machine, instruction),
        I::I64Eqz => comparison::i64_eqz(machine, instruction),
        I::I64Eq => comparison::i64_eq(machine, instruction),
        I::I64Ne => comparison::i64_ne(machine, instruction),
        I::I64LtS => comparison::i64_lt_s(machine, instruction),
        I::I64LtU => comparison::i64_lt_u(machine, instruction),
        I::I64GtS => comparison::i64_gt_s(machine, instruction),
        I::I64GtU => comparison::i64_gt_u(machine, instruction),
        I::I64LeS => comparison::i64_le_s(machine, instruction),
        I::I64LeU => comparison::i64_le_u(machine, instruction),
        I::I64GeS => comparison::i64_ge_s(machine, instruction),
        I::I64GeU => comparison::i64_ge_u(machine, instruction),
        I::F32Eq => comparison::f32_eq(machine, instruction),
        I::F32Ne => comparison::f32_ne(machine, instruction),
        I::F32Lt => comparison::f32_lt(machine, instruction),
        I::F32Gt => comparison::f32_gt(machine, instruction),
        I::F32Le => comparison::f32_le(machine, instruction),
        I::F32Ge => comparison::f32_ge(machine, instruction),
        I::F64Eq => comparison::f64_eq(machine, instruction),
        I::F64Ne => comparison::f64_ne(machine, instruction),
        I::F64Lt => comparison::f64_lt(machine, instruction),
        I::F64Gt => comparison::f64_gt(machine, instruction),
        I::F64Le => comparison::f64_le(machine, instruction),
        I::F64Ge => comparison::f64_ge(machine, instruction),

        // Integer arithmetic
        I::I32Clz => numeric::i32_clz(machine, instruction),
        I::I32Ctz => numeric::i32_ctz(machine, instruction),
        I::I32Popcnt => numeric::i32_popcnt(machine, instruction),
        I::I32Add => numeric::i32_add(machine, instruction),
        I::I32Sub => numeric::i32_sub(machine, instruction),
        I::I32Mul => numeric::i32_mul(machine, instruction),
        I::I32DivS => numeric::i32_div_s(machine, instruction),
        I::I32DivU => numeric::i32_div_u(machine, instruction),
        I::I32RemS => numeric::i32_rem_s(machine, instruction),
        I::I32RemU => numeric::i32_rem_u(machine, instruction),
        I::I64Clz => numeric::i64_clz(machine, instruction),
        I::I64Ctz => numeric::i64_ctz(machine, instruction),
        I::I64Popcnt => numeric::i64_popcnt(machine, instruction),
        I::I64Add => numeric::i64_add(machine, instruction),
        I::I64Sub => numeric::i64_sub(machine, instruction),
        I::I64Mul => numeric::i64_mul(machine, instruction),
        I::I64DivS => numeric::i64_div_s(machine, instruction),
        I::I64DivU => numeric::i64_div_u(machine, instruction),
        I::I64RemS => numeric::i64_rem_s(machine, instruction),
        I::I64RemU => numeric::i64_rem_u(machine, instruction),

        // Bit manipulation
        I::I32And => bitwise::i32_and(machine, instruction),
        I::I32Or => bitwise::i32_or(machine, instruction),
        I::I32Xor => bitwise::i32_xor(machine, instruction),
        I::I32Shl => bitwise::i32_shl(machine, instruction),
        I::I32ShrS => bitwise::i32_shr_s(machine, instruction),
        I::I32ShrU => bitwise::i32_shr_u(machine, instruction),
        I::I32Rotl => bitwise::i32_rotl(machine, instruction),
        I::I32Rotr => bitwise::i32_rotr(machine, instruction),
        I::I64And => bitwise::i64_and(machine, instruction),
        I::I64Or => bitwise::i64_or(machine, instruction),
        I::I64Xor => bitwise::i64_xor(machine, instruction),
        I::I64Shl => bitwise::i64_shl(machine, instruction),
        I::I64ShrS => bitwise::i64_shr_s(machine, instruction),
        I::I64ShrU => bitwise::i64_shr_u(machine, instruction),
        I::I64Rotl => bitwise::i64_rotl(machine, instruction),
        I::I64Rotr => bitwise::i64_rotr(machine, instruction),

        // Float arithmetic
        I::F32Abs => numeric::f32_abs(machine, instruction),
        I::F32Neg => numeric::f32_neg(machine, instruction),
        I::F32Ceil => numeric::f32_ceil(machine, instruction),
        I::F32Floor => numeric::f32_floor(machine, instruction),
        I::F32Trunc => numeric::f32_trunc(machine, instruction),
        I::F32Nearest => numeric::f32_nearest(machine, instruction),
        I::F32Sqrt => numeric::f32_sqrt(machine, instruction),
        I::F32Add => numeric::f32_add(machine, instruction),
        I::F32Sub => numeric::f32_sub(machine, instruction),
        I::F32Mul => numeric::f32_mul(machine, instruction),
        I::F32Div => numeric::f32_div(machine, instruction),
        I::F32Min => numeric::f32_min(machine, instruction),
        I::F32Max => numeric::f32_max(machine, instruction),
        I::F32Copysign => numeric::f32_copysign(machine, instruction),
        I::F64Abs => numeric::f64_abs(machine, instruction),
        I::F64Neg => numeric::f64_neg(machine, instruction),
        I::F64Ceil => numeric::f64_ceil(machine, instruction),
        I::F64Floor => numeric::f64_floor(machine, instruction),
        I::F64Trunc => numeric::f64_trunc(machine, instruction),
        I::F64Nearest => numeric::f64_nearest(machine, instruction),
        I::F64Sqrt => numeric::f64_sqrt(machine, instruction),
        I::F64Add => numeric::f64_add(machine, instruction),
        I::F64Sub => numeric::f64_sub(machine, instruction),
        I::F64Mul => numeric::f64_mul(machine, instruction),
        I::F64Div => numeric::f64_div(machine, instruction),
        I::F64Min => numeric::f64_min(machine, instruction),
        I::F64Max => numeric::f64_max(machine, instruction),
        I::F64Copysign => numeric::f64_copysign(machine, instruction),

        // Conversions
        I::I32WrapI64 => conversion::i32_wrap_i64(machine, instruction),
        I::I32TruncF32S => conversion::i32_trunc_f32_s(machine, instruction),
        I::I32TruncF32U => conversion::i32_trunc_f32_u(machine, instruction),
        I::I32TruncF64S => conversion::i32_trunc_f64_s(machine, instruction),
        I::I32TruncF64U => conversion::i32_trunc_f64_u(machine, instruction),
        I::I64ExtendI32S => conversion::i64_extend_i32_s(machine, instruction),
        I::I64ExtendI32U => conversion::i64_extend_i32_u(machine, instruction),
        I::I64TruncF32S => conversion::i64_trunc_f32_s(machine, instruction),
        I::I64TruncF32U => conversion::i64_trunc_f32_u(machine, instruction),
        I::I64TruncF64S => conversion::i64_trunc_f64_s(machine, instruction),
        I::I64TruncF64U => conversion::i64_trunc_f64_u(machine, instruction),
        I::F32ConvertI32S => conversion::f32_convert_i32_s(machine, instruction),
        I::F32ConvertI32U => conversion::f32_convert_i32_u(machine, instruction),
        I::F32ConvertI64S => conversion::f32_convert_i64_s(machine, instruction),
        I::F32ConvertI64U => conversion::f32_convert_i64_u(machine, instruction),
        I::F32DemoteF64 => conversion::f32_demote_f64(machine, instruction),
        I::F64ConvertI32S => conversion::f64_convert_i32_s(machine, instruction),
        I::F64ConvertI32U => conversion::f64_convert_i32_u(machine, instruction),
        I::F64ConvertI64S => conversion::f64_convert_i64_s(machine, instruction),
        I::F64ConvertI64U => conversion::f64_convert_i64_u(machine, instruction),
        I::F64PromoteF32 => conversion::f64_promote_f32(machine, instruction),
        I::I32ReinterpretF32 => conversion::i32_reinterpret_f32(machine, instruction),
        I::I64ReinterpretF64 => conversion::i64_reinterpret_f64(machine, instruction),
        I::F32ReinterpretI32 => conversion::f32_reinterpret_i32(machine, instruction),
        I::F64ReinterpretI64 => conversion::f64_reinterpret_i64(machine, instruction),
        I::I32Extend8S => conversion::i32_extend8_s(machine, instruction),
        I::I32Extend16S => conversion::i32_extend16_s(machine, instruction),
        I::I64Extend8S => conversion::i64_extend8_s(machine, instruction),
        I::I64Extend16S => conversion::i64_extend16_s(machine, instruction),
        I::I64Extend32S => conversion::i64_extend32_s(machine, instruction),
        I::I32TruncSatF32S => conversion::i32_trunc_sat_f32_s(machine, instruction),
        I::I32TruncSatF32U => conversion::i32_trunc_sat_f32_u(machine, instruction),
        I::I32TruncSatF64S => conversion::i32_trunc_sat_f64_s(machine, instruction),
        I::I32TruncSatF64U => conversion::i32_trunc_sat_f64_u(machine, instruction),
        I::I64TruncSatF32S => conversion::i64_trunc_sat_f32_s(machine, instruction),
        I::I64TruncSatF32U => conversion::i64_trunc_sat_f32_u(machine, instruction),
        I::I64TruncSatF64S => conversion::i64_trunc_sat_f64_s(machine, instruction),
        I::I64TruncSatF64U => conversion::i64_trunc_sat_f64_u(machine, instruction),

        // Vector instructions are decoded but not evaluated.
        I::V128Load | I::V128Store | I::V128Const | I::I8x16Shuffle => {
            Err(RuntimeError::UnimplementedInstruction(instruction.instruction_type))
        }
    }
}

// Operand accessors: decode guarantees the shapes, so a mismatch here is an
// internal invariant violation, surfaced as an error rather than a panic.

pub(crate) fn operand_u32(instruction: &Instruction) -> Result<u32, RuntimeError> {
    instruction.as_u32().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_u32x2(instruction: &Instruction) -> Result<(u32, u32), RuntimeError> {
    instruction.as_u32x2().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_i32(instruction: &Instruction) -> Result<i32, RuntimeError> {
    instruction.as_i32().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_i64(instruction: &Instruction) -> Result<i64, RuntimeError> {
    instruction.as_i64().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_f32(instruction: &Instruction) -> Result<f32, RuntimeError> {
    instruction.as_f32().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_f64(instruction: &Instruction) -> Result<f64, RuntimeError> {
    instruction.as_f64().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

pub(crate) fn operand_block(instruction: &Instruction) -> Result<&Block, RuntimeError> {
    instruction.as_block().ok_or(RuntimeError::InvalidOperand(instruction.instruction_type))
}

// Index resolution through the current frame's module instance.

pub(crate) fn resolve_memaddr(machine: &mut Store, mem_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.memaddrs.get(mem_idx as usize).copied();
    addr.ok_or(RuntimeError::NoMemory)
}

pub(crate) fn resolve_tableaddr(machine: &mut Store, table_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.tableaddrs.get(table_idx as usize).copied();
    addr.ok_or(RuntimeError::TableIndexOutOfBounds(table_idx))
}

pub(crate) fn resolve_dataaddr(machine: &mut Store, data_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.dataaddrs.get(data_idx as usize).copied();
    addr.ok_or(RuntimeError::DataIndexOutOfBounds(data_idx))
}

pub(crate) fn resolve_elemaddr(machine: &mut Store, elem_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.elementaddrs.get(elem_idx as usize).copied();
    addr.ok_or(RuntimeError::ElementIndexOutOfBounds(elem_idx))
}

pub(crate) fn resolve_globaladdr(machine: &mut Store, global_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.globaladdrs.get(global_idx as usize).copied();
    addr.ok_or(RuntimeError::GlobalIndexOutOfBounds(global_idx))
}

pub(crate) fn resolve_funcaddr(machine: &mut Store, func_idx: u32) -> Result<usize, RuntimeError> {
    let frame = machine.current_frame()?;
    let addr = frame.borrow().module.funcaddrs.get(func_idx as usize).copied();
    addr.ok_or(RuntimeError::FunctionIndexOutOfBounds(func_idx))
}
