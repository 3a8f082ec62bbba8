//! Runtime: the store, module instantiation, and the instruction evaluator.
//!
//! Execution is single-threaded and strictly sequential: one [`Store`], one
//! call stack, no suspension points. The evaluator's instruction loop runs to
//! completion or to an error, and the store's contents at the point of a trap
//! are left as-is (no rollback).

pub mod imports;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
pub mod test_utils;
pub mod value;

pub use imports::ExternVal;
pub use instance::{InstantiationError, ModuleInstance};
pub use memory::MemInstance;
pub use store::{FuncInstance, Store};
pub use table::TableInstance;
pub use value::Value;

use crate::parser::instruction::InstructionType;

/// An error raised during execution.
///
/// Most variants are traps: the guest program did something invalid at run
/// time (out-of-bounds access, division by zero, an explicit `unreachable`).
/// [`RuntimeError::UnimplementedInstruction`] is distinct from a trap: it
/// signals an engine limitation, not a guest fault, and carries the
/// instruction tag so the gap is identifiable. Invariant-violation variants
/// (missing frame or label, operand shape mismatches) should never occur for
/// a well-formed body.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("no active frame on the stack")]
    NoActiveFrame,
    #[error("no label at depth {0} on the stack")]
    NoLabel(usize),
    #[error("invalid operands for {0}")]
    InvalidOperand(InstructionType),
    #[error("unimplemented instruction: {0}")]
    UnimplementedInstruction(InstructionType),
    #[error("unreachable executed")]
    Unreachable,
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access: [{offset}, {offset}+{len})")]
    OutOfBoundsMemoryAccess { offset: usize, len: usize },
    #[error("out of bounds table access at index {0}")]
    OutOfBoundsTableAccess(usize),
    #[error("undefined element at index {0}")]
    UndefinedElement(usize),
    #[error("uninitialized element at index {0}")]
    UninitializedElement(usize),
    #[error("indirect call type mismatch: expected {expected}, got {actual}")]
    IndirectCallTypeMismatch { expected: String, actual: String },
    #[error("no function at store address {0}")]
    InvalidFunctionAddress(usize),
    #[error("no table at store address {0}")]
    InvalidTableAddress(usize),
    #[error("no memory at store address {0}")]
    InvalidMemoryAddress(usize),
    #[error("no global at store address {0}")]
    InvalidGlobalAddress(usize),
    #[error("no data segment at store address {0}")]
    InvalidDataAddress(usize),
    #[error("no element segment at store address {0}")]
    InvalidElementAddress(usize),
    #[error("local index {0} out of bounds")]
    LocalIndexOutOfBounds(u32),
    #[error("global index {0} out of bounds")]
    GlobalIndexOutOfBounds(u32),
    #[error("function index {0} out of bounds")]
    FunctionIndexOutOfBounds(u32),
    #[error("table index {0} out of bounds")]
    TableIndexOutOfBounds(u32),
    #[error("data index {0} out of bounds")]
    DataIndexOutOfBounds(u32),
    #[error("element index {0} out of bounds")]
    ElementIndexOutOfBounds(u32),
    #[error("memory index {0} out of bounds")]
    MemoryIndexOutOfBounds(u32),
    #[error("type index {0} out of bounds")]
    TypeIndexOutOfBounds(u32),
    #[error("module has no memory")]
    NoMemory,
    #[error("memory limit exceeded: {0} pages")]
    MemoryLimitExceeded(u32),
    #[error("host function error: {0}")]
    Host(String),
}
