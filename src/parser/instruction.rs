//! Instruction representation, operand decoding, and control-flow flattening.
//!
//! The opcode space is a single byte except for the two escape bytes `0xFC`
//! and `0xFD`, which are followed by an unsigned LEB128 extension selecting
//! the real instruction. Operand decoding is table-driven by instruction
//! category ([`OperandKind`]).
//!
//! After decoding, function bodies and constant expressions are run through
//! [`flatten_instructions`], which turns the nested block tree into a single
//! flat list with an assigned linear program counter per instruction and
//! precomputed branch continuation targets. The evaluator treats branch
//! targets as plain indices into that list and never re-walks the tree.

use std::fmt;

use super::module::ValueType;
use super::reader::Reader;
use super::DecodeError;

/// The closed set of instruction tags. The discriminant is the wire opcode,
/// with `0xFC`/`0xFD`-escaped instructions packed as `(escape << 8) | ext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum InstructionType {
    // Control instructions
    Unreachable = 0x00,
    Nop = 0x01,
    Block = 0x02,
    Loop = 0x03,
    If = 0x04,
    // Not an instruction proper: terminates an if-block and starts its else-block.
    Else = 0x05,
    // Not an instruction proper: terminates blocks.
    End = 0x0B,
    Br = 0x0C,
    BrIf = 0x0D,
    BrTable = 0x0E,
    Return = 0x0F,
    Call = 0x10,
    CallIndirect = 0x11,

    // Reference instructions
    RefNull = 0xD0,
    RefIsNull = 0xD1,
    RefFunc = 0xD2,

    // Parametric instructions
    Drop = 0x1A,
    Select = 0x1B,
    SelectTyped = 0x1C,

    // Variable instructions
    LocalGet = 0x20,
    LocalSet = 0x21,
    LocalTee = 0x22,
    GlobalGet = 0x23,
    GlobalSet = 0x24,

    // Table instructions
    TableGet = 0x25,
    TableSet = 0x26,
    TableInit = 0xFC0C,
    ElemDrop = 0xFC0D,
    TableCopy = 0xFC0E,
    TableGrow = 0xFC0F,
    TableSize = 0xFC10,
    TableFill = 0xFC11,

    // Memory instructions
    I32Load = 0x28,
    I64Load = 0x29,
    F32Load = 0x2A,
    F64Load = 0x2B,
    I32Load8S = 0x2C,
    I32Load8U = 0x2D,
    I32Load16S = 0x2E,
    I32Load16U = 0x2F,
    I64Load8S = 0x30,
    I64Load8U = 0x31,
    I64Load16S = 0x32,
    I64Load16U = 0x33,
    I64Load32S = 0x34,
    I64Load32U = 0x35,
    I32Store = 0x36,
    I64Store = 0x37,
    F32Store = 0x38,
    F64Store = 0x39,
    I32Store8 = 0x3A,
    I32Store16 = 0x3B,
    I64Store8 = 0x3C,
    I64Store16 = 0x3D,
    I64Store32 = 0x3E,
    MemorySize = 0x3F,
    MemoryGrow = 0x40,
    MemoryInit = 0xFC08,
    DataDrop = 0xFC09,
    MemoryCopy = 0xFC0A,
    MemoryFill = 0xFC0B,

    // Numeric instructions
    I32Const = 0x41,
    I64Const = 0x42,
    F32Const = 0x43,
    F64Const = 0x44,

    I32Eqz = 0x45,
    I32Eq = 0x46,
    I32Ne = 0x47,
    I32LtS = 0x48,
    I32LtU = 0x49,
    I32GtS = 0x4A,
    I32GtU = 0x4B,
    I32LeS = 0x4C,
    I32LeU = 0x4D,
    I32GeS = 0x4E,
    I32GeU = 0x4F,

    I64Eqz = 0x50,
    I64Eq = 0x51,
    I64Ne = 0x52,
    I64LtS = 0x53,
    I64LtU = 0x54,
    I64GtS = 0x55,
    I64GtU = 0x56,
    I64LeS = 0x57,
    I64LeU = 0x58,
    I64GeS = 0x59,
    I64GeU = 0x5A,

    F32Eq = 0x5B,
    F32Ne = 0x5C,
    F32Lt = 0x5D,
    F32Gt = 0x5E,
    F32Le = 0x5F,
    F32Ge = 0x60,

    F64Eq = 0x61,
    F64Ne = 0x62,
    F64Lt = 0x63,
    F64Gt = 0x64,
    F64Le = 0x65,
    F64Ge = 0x66,

    I32Clz = 0x67,
    I32Ctz = 0x68,
    I32Popcnt = 0x69,
    I32Add = 0x6A,
    I32Sub = 0x6B,
    I32Mul = 0x6C,
    I32DivS = 0x6D,
    I32DivU = 0x6E,
    I32RemS = 0x6F,
    I32RemU = 0x70,
    I32And = 0x71,
    I32Or = 0x72,
    I32Xor = 0x73,
    I32Shl = 0x74,
    I32ShrS = 0x75,
    I32ShrU = 0x76,
    I32Rotl = 0x77,
    I32Rotr = 0x78,

    I64Clz = 0x79,
    I64Ctz = 0x7A,
    I64Popcnt = 0x7B,
    I64Add = 0x7C,
    I64Sub = 0x7D,
    I64Mul = 0x7E,
    I64DivS = 0x7F,
    I64DivU = 0x80,
    I64RemS = 0x81,
    I64RemU = 0x82,
    I64And = 0x83,
    I64Or = 0x84,
    I64Xor = 0x85,
    I64Shl = 0x86,
    I64ShrS = 0x87,
    I64ShrU = 0x88,
    I64Rotl = 0x89,
    I64Rotr = 0x8A,

    F32Abs = 0x8B,
    F32Neg = 0x8C,
    F32Ceil = 0x8D,
    F32Floor = 0x8E,
    F32Trunc = 0x8F,
    F32Nearest = 0x90,
    F32Sqrt = 0x91,
    F32Add = 0x92,
    F32Sub = 0x93,
    F32Mul = 0x94,
    F32Div = 0x95,
    F32Min = 0x96,
    F32Max = 0x97,
    F32Copysign = 0x98,

    F64Abs = 0x99,
    F64Neg = 0x9A,
    F64Ceil = 0x9B,
    F64Floor = 0x9C,
    F64Trunc = 0x9D,
    F64Nearest = 0x9E,
    F64Sqrt = 0x9F,
    F64Add = 0xA0,
    F64Sub = 0xA1,
    F64Mul = 0xA2,
    F64Div = 0xA3,
    F64Min = 0xA4,
    F64Max = 0xA5,
    F64Copysign = 0xA6,

    I32WrapI64 = 0xA7,
    I32TruncF32S = 0xA8,
    I32TruncF32U = 0xA9,
    I32TruncF64S = 0xAA,
    I32TruncF64U = 0xAB,
    I64ExtendI32S = 0xAC,
    I64ExtendI32U = 0xAD,
    I64TruncF32S = 0xAE,
    I64TruncF32U = 0xAF,
    I64TruncF64S = 0xB0,
    I64TruncF64U = 0xB1,
    F32ConvertI32S = 0xB2,
    F32ConvertI32U = 0xB3,
    F32ConvertI64S = 0xB4,
    F32ConvertI64U = 0xB5,
    F32DemoteF64 = 0xB6,
    F64ConvertI32S = 0xB7,
    F64ConvertI32U = 0xB8,
    F64ConvertI64S = 0xB9,
    F64ConvertI64U = 0xBA,
    F64PromoteF32 = 0xBB,
    I32ReinterpretF32 = 0xBC,
    I64ReinterpretF64 = 0xBD,
    F32ReinterpretI32 = 0xBE,
    F64ReinterpretI64 = 0xBF,

    I32Extend8S = 0xC0,
    I32Extend16S = 0xC1,
    I64Extend8S = 0xC2,
    I64Extend16S = 0xC3,
    I64Extend32S = 0xC4,

    I32TruncSatF32S = 0xFC00,
    I32TruncSatF32U = 0xFC01,
    I32TruncSatF64S = 0xFC02,
    I32TruncSatF64U = 0xFC03,
    I64TruncSatF32S = 0xFC04,
    I64TruncSatF32U = 0xFC05,
    I64TruncSatF64S = 0xFC06,
    I64TruncSatF64U = 0xFC07,

    // Vector instructions. Only the representative operand shapes are
    // decoded; none of these are evaluated.
    V128Load = 0xFD00,
    V128Store = 0xFD0B,
    V128Const = 0xFD0C,
    I8x16Shuffle = 0xFD0D,
}

/// The operand shape of an instruction category, driving decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No immediate operands.
    None,
    /// One reference-type tag byte.
    RefType,
    /// One 8-byte little-endian immediate.
    U64Imm,
    /// One LEB128 u32 (index or branch depth).
    U32,
    /// Two LEB128 u32s (memory alignment+offset, or two indices).
    U32x2,
    /// Sixteen raw bytes (lane-shuffle immediate).
    Lanes16,
    /// A LEB128-prefixed list of value-type bytes (typed select).
    ValueTypes,
    /// One LEB128 signed 32-bit immediate.
    I32Imm,
    /// One LEB128 signed 64-bit immediate.
    I64Imm,
    /// One little-endian IEEE-754 single.
    F32Imm,
    /// One little-endian IEEE-754 double.
    F64Imm,
    /// A nested block (structured instructions).
    Block,
    /// A branch table: LEB128 count n followed by n+1 label indices, the
    /// last being the default.
    BrTable,
}

impl InstructionType {
    /// Maps a (possibly escaped) opcode to its tag. Returns `None` for any
    /// opcode outside the known set.
    pub fn from_opcode(opcode: u16) -> Option<InstructionType> {
        use InstructionType::*;
        Some(match opcode {
            0x00 => Unreachable,
            0x01 => Nop,
            0x02 => Block,
            0x03 => Loop,
            0x04 => If,
            0x05 => Else,
            0x0B => End,
            0x0C => Br,
            0x0D => BrIf,
            0x0E => BrTable,
            0x0F => Return,
            0x10 => Call,
            0x11 => CallIndirect,
            0xD0 => RefNull,
            0xD1 => RefIsNull,
            0xD2 => RefFunc,
            0x1A => Drop,
            0x1B => Select,
            0x1C => SelectTyped,
            0x20 => LocalGet,
            0x21 => LocalSet,
            0x22 => LocalTee,
            0x23 => GlobalGet,
            0x24 => GlobalSet,
            0x25 => TableGet,
            0x26 => TableSet,
            0xFC0C => TableInit,
            0xFC0D => ElemDrop,
            0xFC0E => TableCopy,
            0xFC0F => TableGrow,
            0xFC10 => TableSize,
            0xFC11 => TableFill,
            0x28 => I32Load,
            0x29 => I64Load,
            0x2A => F32Load,
            0x2B => F64Load,
            0x2C => I32Load8S,
            0x2D => I32Load8U,
            0x2E => I32Load16S,
            0x2F => I32Load16U,
            0x30 => I64Load8S,
            0x31 => I64Load8U,
            0x32 => I64Load16S,
            0x33 => I64Load16U,
            0x34 => I64Load32S,
            0x35 => I64Load32U,
            0x36 => I32Store,
            0x37 => I64Store,
            0x38 => F32Store,
            0x39 => F64Store,
            0x3A => I32Store8,
            0x3B => I32Store16,
            0x3C => I64Store8,
            0x3D => I64Store16,
            0x3E => I64Store32,
            0x3F => MemorySize,
            0x40 => MemoryGrow,
            0xFC08 => MemoryInit,
            0xFC09 => DataDrop,
            0xFC0A => MemoryCopy,
            0xFC0B => MemoryFill,
            0x41 => I32Const,
            0x42 => I64Const,
            0x43 => F32Const,
            0x44 => F64Const,
            0x45 => I32Eqz,
            0x46 => I32Eq,
            0x47 => I32Ne,
            0x48 => I32LtS,
            0x49 => I32LtU,
            0x4A => I32GtS,
            0x4B => I32GtU,
            0x4C => I32LeS,
            0x4D => I32LeU,
            0x4E => I32GeS,
            0x4F => I32GeU,
            0x50 => I64Eqz,
            0x51 => I64Eq,
            0x52 => I64Ne,
            0x53 => I64LtS,
            0x54 => I64LtU,
            0x55 => I64GtS,
            0x56 => I64GtU,
            0x57 => I64LeS,
            0x58 => I64LeU,
            0x59 => I64GeS,
            0x5A => I64GeU,
            0x5B => F32Eq,
            0x5C => F32Ne,
            0x5D => F32Lt,
            0x5E => F32Gt,
            0x5F => F32Le,
            0x60 => F32Ge,
            0x61 => F64Eq,
            0x62 => F64Ne,
            0x63 => F64Lt,
            0x64 => F64Gt,
            0x65 => F64Le,
            0x66 => F64Ge,
            0x67 => I32Clz,
            0x68 => I32Ctz,
            0x69 => I32Popcnt,
            0x6A => I32Add,
            0x6B => I32Sub,
            0x6C => I32Mul,
            0x6D => I32DivS,
            0x6E => I32DivU,
            0x6F => I32RemS,
            0x70 => I32RemU,
            0x71 => I32And,
            0x72 => I32Or,
            0x73 => I32Xor,
            0x74 => I32Shl,
            0x75 => I32ShrS,
            0x76 => I32ShrU,
            0x77 => I32Rotl,
            0x78 => I32Rotr,
            0x79 => I64Clz,
            0x7A => I64Ctz,
            0x7B => I64Popcnt,
            0x7C => I64Add,
            0x7D => I64Sub,
            0x7E => I64Mul,
            0x7F => I64DivS,
            0x80 => I64DivU,
            0x81 => I64RemS,
            0x82 => I64RemU,
            0x83 => I64And,
            0x84 => I64Or,
            0x85 => I64Xor,
            0x86 => I64Shl,
            0x87 => I64ShrS,
            0x88 => I64ShrU,
            0x89 => I64Rotl,
            0x8A => I64Rotr,
            0x8B => F32Abs,
            0x8C => F32Neg,
            0x8D => F32Ceil,
            0x8E => F32Floor,
            0x8F => F32Trunc,
            0x90 => F32Nearest,
            0x91 => F32Sqrt,
            0x92 => F32Add,
            0x93 => F32Sub,
            0x94 => F32Mul,
            0x95 => F32Div,
            0x96 => F32Min,
            0x97 => F32Max,
            0x98 => F32Copysign,
            0x99 => F64Abs,
            0x9A => F64Neg,
            0x9B => F64Ceil,
            0x9C => F64Floor,
            0x9D => F64Trunc,
            0x9E => F64Nearest,
            0x9F => F64Sqrt,
            0xA0 => F64Add,
            0xA1 => F64Sub,
            0xA2 => F64Mul,
            0xA3 => F64Div,
            0xA4 => F64Min,
            0xA5 => F64Max,
            0xA6 => F64Copysign,
            0xA7 => I32WrapI64,
            0xA8 => I32TruncF32S,
            0xA9 => I32TruncF32U,
            0xAA => I32TruncF64S,
            0xAB => I32TruncF64U,
            0xAC => I64ExtendI32S,
            0xAD => I64ExtendI32U,
            0xAE => I64TruncF32S,
            0xAF => I64TruncF32U,
            0xB0 => I64TruncF64S,
            0xB1 => I64TruncF64U,
            0xB2 => F32ConvertI32S,
            0xB3 => F32ConvertI32U,
            0xB4 => F32ConvertI64S,
            0xB5 => F32ConvertI64U,
            0xB6 => F32DemoteF64,
            0xB7 => F64ConvertI32S,
            0xB8 => F64ConvertI32U,
            0xB9 => F64ConvertI64S,
            0xBA => F64ConvertI64U,
            0xBB => F64PromoteF32,
            0xBC => I32ReinterpretF32,
            0xBD => I64ReinterpretF64,
            0xBE => F32ReinterpretI32,
            0xBF => F64ReinterpretI64,
            0xC0 => I32Extend8S,
            0xC1 => I32Extend16S,
            0xC2 => I64Extend8S,
            0xC3 => I64Extend16S,
            0xC4 => I64Extend32S,
            0xFC00 => I32TruncSatF32S,
            0xFC01 => I32TruncSatF32U,
            0xFC02 => I32TruncSatF64S,
            0xFC03 => I32TruncSatF64U,
            0xFC04 => I64TruncSatF32S,
            0xFC05 => I64TruncSatF32U,
            0xFC06 => I64TruncSatF64S,
            0xFC07 => I64TruncSatF64U,
            0xFD00 => V128Load,
            0xFD0B => V128Store,
            0xFD0C => V128Const,
            0xFD0D => I8x16Shuffle,
            _ => return None,
        })
    }

    /// The operand shape for this instruction, driving table-driven decode.
    pub fn operand_kind(&self) -> OperandKind {
        use InstructionType::*;
        match self {
            RefNull => OperandKind::RefType,
            V128Const => OperandKind::U64Imm,
            RefFunc | LocalGet | LocalSet | LocalTee | GlobalGet | GlobalSet | TableGet
            | TableSet | ElemDrop | TableGrow | TableSize | TableFill | DataDrop | MemorySize
            | MemoryGrow | MemoryFill | Br | BrIf | Call => OperandKind::U32,
            TableInit | TableCopy | MemoryInit | MemoryCopy | CallIndirect | I32Load | I64Load
            | F32Load | F64Load | I32Load8S | I32Load8U | I32Load16S | I32Load16U | I64Load8S
            | I64Load8U | I64Load16S | I64Load16U | I64Load32S | I64Load32U | I32Store
            | I64Store | F32Store | F64Store | I32Store8 | I32Store16 | I64Store8 | I64Store16
            | I64Store32 | V128Load | V128Store => OperandKind::U32x2,
            I8x16Shuffle => OperandKind::Lanes16,
            SelectTyped => OperandKind::ValueTypes,
            I32Const => OperandKind::I32Imm,
            I64Const => OperandKind::I64Imm,
            F32Const => OperandKind::F32Imm,
            F64Const => OperandKind::F64Imm,
            Block | Loop | If => OperandKind::Block,
            BrTable => OperandKind::BrTable,
            _ => OperandKind::None,
        }
    }

    /// The instruction's text-format mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        use InstructionType::*;
        match self {
            Unreachable => "unreachable",
            Nop => "nop",
            Block => "block",
            Loop => "loop",
            If => "if",
            Else => "else",
            End => "end",
            Br => "br",
            BrIf => "br_if",
            BrTable => "br_table",
            Return => "return",
            Call => "call",
            CallIndirect => "call_indirect",
            RefNull => "ref.null",
            RefIsNull => "ref.is_null",
            RefFunc => "ref.func",
            Drop => "drop",
            Select | SelectTyped => "select",
            LocalGet => "local.get",
            LocalSet => "local.set",
            LocalTee => "local.tee",
            GlobalGet => "global.get",
            GlobalSet => "global.set",
            TableGet => "table.get",
            TableSet => "table.set",
            TableInit => "table.init",
            ElemDrop => "elem.drop",
            TableCopy => "table.copy",
            TableGrow => "table.grow",
            TableSize => "table.size",
            TableFill => "table.fill",
            I32Load => "i32.load",
            I64Load => "i64.load",
            F32Load => "f32.load",
            F64Load => "f64.load",
            I32Load8S => "i32.load8_s",
            I32Load8U => "i32.load8_u",
            I32Load16S => "i32.load16_s",
            I32Load16U => "i32.load16_u",
            I64Load8S => "i64.load8_s",
            I64Load8U => "i64.load8_u",
            I64Load16S => "i64.load16_s",
            I64Load16U => "i64.load16_u",
            I64Load32S => "i64.load32_s",
            I64Load32U => "i64.load32_u",
            I32Store => "i32.store",
            I64Store => "i64.store",
            F32Store => "f32.store",
            F64Store => "f64.store",
            I32Store8 => "i32.store8",
            I32Store16 => "i32.store16",
            I64Store8 => "i64.store8",
            I64Store16 => "i64.store16",
            I64Store32 => "i64.store32",
            MemorySize => "memory.size",
            MemoryGrow => "memory.grow",
            MemoryInit => "memory.init",
            DataDrop => "data.drop",
            MemoryCopy => "memory.copy",
            MemoryFill => "memory.fill",
            I32Const => "i32.const",
            I64Const => "i64.const",
            F32Const => "f32.const",
            F64Const => "f64.const",
            I32Eqz => "i32.eqz",
            I32Eq => "i32.eq",
            I32Ne => "i32.ne",
            I32LtS => "i32.lt_s",
            I32LtU => "i32.lt_u",
            I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u",
            I32LeS => "i32.le_s",
            I32LeU => "i32.le_u",
            I32GeS => "i32.ge_s",
            I32GeU => "i32.ge_u",
            I64Eqz => "i64.eqz",
            I64Eq => "i64.eq",
            I64Ne => "i64.ne",
            I64LtS => "i64.lt_s",
            I64LtU => "i64.lt_u",
            I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u",
            I64LeS => "i64.le_s",
            I64LeU => "i64.le_u",
            I64GeS => "i64.ge_s",
            I64GeU => "i64.ge_u",
            F32Eq => "f32.eq",
            F32Ne => "f32.ne",
            F32Lt => "f32.lt",
            F32Gt => "f32.gt",
            F32Le => "f32.le",
            F32Ge => "f32.ge",
            F64Eq => "f64.eq",
            F64Ne => "f64.ne",
            F64Lt => "f64.lt",
            F64Gt => "f64.gt",
            F64Le => "f64.le",
            F64Ge => "f64.ge",
            I32Clz => "i32.clz",
            I32Ctz => "i32.ctz",
            I32Popcnt => "i32.popcnt",
            I32Add => "i32.add",
            I32Sub => "i32.sub",
            I32Mul => "i32.mul",
            I32DivS => "i32.div_s",
            I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s",
            I32RemU => "i32.rem_u",
            I32And => "i32.and",
            I32Or => "i32.or",
            I32Xor => "i32.xor",
            I32Shl => "i32.shl",
            I32ShrS => "i32.shr_s",
            I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl",
            I32Rotr => "i32.rotr",
            I64Clz => "i64.clz",
            I64Ctz => "i64.ctz",
            I64Popcnt => "i64.popcnt",
            I64Add => "i64.add",
            I64Sub => "i64.sub",
            I64Mul => "i64.mul",
            I64DivS => "i64.div_s",
            I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s",
            I64RemU => "i64.rem_u",
            I64And => "i64.and",
            I64Or => "i64.or",
            I64Xor => "i64.xor",
            I64Shl => "i64.shl",
            I64ShrS => "i64.shr_s",
            I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl",
            I64Rotr => "i64.rotr",
            F32Abs => "f32.abs",
            F32Neg => "f32.neg",
            F32Ceil => "f32.ceil",
            F32Floor => "f32.floor",
            F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest",
            F32Sqrt => "f32.sqrt",
            F32Add => "f32.add",
            F32Sub => "f32.sub",
            F32Mul => "f32.mul",
            F32Div => "f32.div",
            F32Min => "f32.min",
            F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F64Abs => "f64.abs",
            F64Neg => "f64.neg",
            F64Ceil => "f64.ceil",
            F64Floor => "f64.floor",
            F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest",
            F64Sqrt => "f64.sqrt",
            F64Add => "f64.add",
            F64Sub => "f64.sub",
            F64Mul => "f64.mul",
            F64Div => "f64.div",
            F64Min => "f64.min",
            F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            I32WrapI64 => "i32.wrap_i64",
            I32TruncF32S => "i32.trunc_f32_s",
            I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s",
            I32TruncF64U => "i32.trunc_f64_u",
            I64ExtendI32S => "i64.extend_i32_s",
            I64ExtendI32U => "i64.extend_i32_u",
            I64TruncF32S => "i64.trunc_f32_s",
            I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s",
            I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI32S => "f32.convert_i32_s",
            F32ConvertI32U => "f32.convert_i32_u",
            F32ConvertI64S => "f32.convert_i64_s",
            F32ConvertI64U => "f32.convert_i64_u",
            F32DemoteF64 => "f32.demote_f64",
            F64ConvertI32S => "f64.convert_i32_s",
            F64ConvertI32U => "f64.convert_i32_u",
            F64ConvertI64S => "f64.convert_i64_s",
            F64ConvertI64U => "f64.convert_i64_u",
            F64PromoteF32 => "f64.promote_f32",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            F64ReinterpretI64 => "f64.reinterpret_i64",
            I32Extend8S => "i32.extend8_s",
            I32Extend16S => "i32.extend16_s",
            I64Extend8S => "i64.extend8_s",
            I64Extend16S => "i64.extend16_s",
            I64Extend32S => "i64.extend32_s",
            I32TruncSatF32S => "i32.trunc_sat_f32_s",
            I32TruncSatF32U => "i32.trunc_sat_f32_u",
            I32TruncSatF64S => "i32.trunc_sat_f64_s",
            I32TruncSatF64U => "i32.trunc_sat_f64_u",
            I64TruncSatF32S => "i64.trunc_sat_f32_s",
            I64TruncSatF32U => "i64.trunc_sat_f32_u",
            I64TruncSatF64S => "i64.trunc_sat_f64_s",
            I64TruncSatF64U => "i64.trunc_sat_f64_u",
            V128Load => "v128.load",
            V128Store => "v128.store",
            V128Const => "v128.const",
            I8x16Shuffle => "i8x16.shuffle",
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The block-type header of a structured instruction. On the wire this is a
/// single signed LEB128: a value `>= 0` is a function-type index, `-0x40`
/// (`0x40` as a 7-bit negative) means no result type, and any other negative
/// packs a single value-type byte into the unused 7-bit negative range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
    TypeIndex(u32),
}

impl BlockType {
    fn read(reader: &mut Reader) -> Result<BlockType, DecodeError> {
        let raw = reader.read_vs64()?;
        if raw >= 0 {
            return Ok(BlockType::TypeIndex(raw as u32));
        }
        let byte = (raw + 0x80) as u8;
        if byte == 0x40 {
            Ok(BlockType::Empty)
        } else {
            Ok(BlockType::Value(ValueType::decode(byte)?))
        }
    }
}

/// A block: a list of instructions terminated by END. Instructions can
/// themselves contain blocks, so the definition is recursive. Only IF blocks
/// may have a non-empty else list.
///
/// After flattening, both instruction lists are drained; the block survives
/// on its owning instruction solely to carry the `block_type`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub block_type: BlockType,
    pub instructions: Vec<Instruction>,
    pub else_instructions: Vec<Instruction>,
}

impl Default for BlockType {
    fn default() -> BlockType {
        BlockType::Empty
    }
}

impl Block {
    pub fn new(
        block_type: BlockType,
        instructions: Vec<Instruction>,
        else_instructions: Vec<Instruction>,
    ) -> Block {
        Block { block_type, instructions, else_instructions }
    }

    fn read(reader: &mut Reader) -> Result<Block, DecodeError> {
        let block_type = BlockType::read(reader)?;
        let mut instructions = Vec::new();
        let mut else_instructions = Vec::new();
        loop {
            let insn = Instruction::read(reader)?;
            let insn_type = insn.instruction_type;
            instructions.push(insn);
            if insn_type == InstructionType::End {
                break;
            }
            if insn_type == InstructionType::Else {
                loop {
                    let insn = Instruction::read(reader)?;
                    let insn_type = insn.instruction_type;
                    else_instructions.push(insn);
                    if insn_type == InstructionType::End {
                        break;
                    }
                }
                break;
            }
        }
        Ok(Block { block_type, instructions, else_instructions })
    }
}

/// The decoded immediate operands of one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    None,
    RefType(ValueType),
    U64(u64),
    U32(u32),
    U32x2(u32, u32),
    Lanes([u8; 16]),
    ValueTypes(Vec<ValueType>),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Block(Block),
    BrTable(Vec<u32>),
}

/// One decoded instruction.
///
/// `continuation_pc` is computed by flattening, not parsed. For BLOCK it is
/// the pc just past the block's END (the break target); for LOOP it is the
/// pc of the LOOP itself (a branch to a loop continues, it does not exit);
/// for IF it is the pc just past the END of the whole construct, with
/// `else_continuation_pc` the pc of the false branch (past ELSE, or past END
/// when there is no else). For every other instruction it is simply the next
/// pc.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub instruction_type: InstructionType,
    pub operands: Operands,
    pub continuation_pc: usize,
    pub else_continuation_pc: usize,
}

impl Instruction {
    pub fn new(instruction_type: InstructionType, operands: Operands) -> Instruction {
        Instruction { instruction_type, operands, continuation_pc: 0, else_continuation_pc: 0 }
    }

    /// Reads one instruction, including the `0xFC`/`0xFD` escape handling.
    /// Extension values above one byte are rejected as unknown.
    pub fn read(reader: &mut Reader) -> Result<Instruction, DecodeError> {
        let lead = reader.read_byte()?;
        let opcode: u16 = if lead == 0xFC || lead == 0xFD {
            let ext = reader.read_vu32()?;
            if ext > 0xFF {
                return Err(DecodeError::UnknownOpcode(((lead as u32) << 8) | ext));
            }
            (u16::from(lead) << 8) | ext as u16
        } else {
            u16::from(lead)
        };
        let instruction_type = InstructionType::from_opcode(opcode)
            .ok_or(DecodeError::UnknownOpcode(opcode as u32))?;

        let operands = match instruction_type.operand_kind() {
            OperandKind::None => Operands::None,
            OperandKind::RefType => Operands::RefType(ValueType::read(reader)?),
            OperandKind::U64Imm => Operands::U64(reader.read_u64_le()?),
            OperandKind::U32 => Operands::U32(reader.read_vu32()?),
            OperandKind::U32x2 => {
                let a = reader.read_vu32()?;
                let b = reader.read_vu32()?;
                Operands::U32x2(a, b)
            }
            OperandKind::Lanes16 => {
                let mut lanes = [0u8; 16];
                lanes.copy_from_slice(reader.read_bytes(16)?);
                Operands::Lanes(lanes)
            }
            OperandKind::ValueTypes => {
                let count = reader.read_vu32()?;
                let mut types = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    types.push(ValueType::read(reader)?);
                }
                Operands::ValueTypes(types)
            }
            OperandKind::I32Imm => Operands::I32(reader.read_vs32()?),
            OperandKind::I64Imm => Operands::I64(reader.read_vs64()?),
            OperandKind::F32Imm => Operands::F32(reader.read_f32()?),
            OperandKind::F64Imm => Operands::F64(reader.read_f64()?),
            OperandKind::Block => Operands::Block(Block::read(reader)?),
            OperandKind::BrTable => {
                let count = reader.read_vu32()?;
                let mut labels = Vec::with_capacity(count as usize + 1);
                for _ in 0..=count {
                    labels.push(reader.read_vu32()?);
                }
                Operands::BrTable(labels)
            }
        };

        Ok(Instruction::new(instruction_type, operands))
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self.operands {
            Operands::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32x2(&self) -> Option<(u32, u32)> {
        match self.operands {
            Operands::U32x2(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.operands {
            Operands::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.operands {
            Operands::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.operands {
            Operands::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.operands {
            Operands::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref_type(&self) -> Option<ValueType> {
        match self.operands {
            Operands::RefType(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match &self.operands {
            Operands::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_br_table(&self) -> Option<&[u32]> {
        match &self.operands {
            Operands::BrTable(labels) => Some(labels),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instruction_type)?;
        match &self.operands {
            Operands::U32(v) => write!(f, " {v}"),
            Operands::U32x2(a, b) => write!(f, " {a} {b}"),
            Operands::I32(v) => write!(f, " {v}"),
            Operands::I64(v) => write!(f, " {v}"),
            Operands::F32(v) => write!(f, " {}", fhex::ToHex::to_hex(*v)),
            Operands::F64(v) => write!(f, " {}", fhex::ToHex::to_hex(*v)),
            Operands::RefType(t) => write!(f, " {t}"),
            Operands::BrTable(labels) => {
                for l in labels {
                    write!(f, " {l}")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Reads an expression: a list of instructions terminated by END. The
/// returned list is flattened.
pub fn read_expr(reader: &mut Reader) -> Result<Vec<Instruction>, DecodeError> {
    let mut insns = Vec::new();
    loop {
        let insn = Instruction::read(reader)?;
        let done = insn.instruction_type == InstructionType::End;
        insns.push(insn);
        if done {
            break;
        }
    }
    Ok(flatten_instructions(insns, 0))
}

/// Flattens a nested instruction tree into one linear list, assigning each
/// instruction a program counter and rewriting the continuation fields of
/// structural instructions.
///
/// Nested blocks are flattened depth-first before their parent's following
/// siblings, so pc assignment is monotonic through the whole body and the
/// evaluator can treat every branch target as a plain index.
pub fn flatten_instructions(insns: Vec<Instruction>, mut pc: usize) -> Vec<Instruction> {
    let mut flattened = Vec::with_capacity(insns.len());
    for mut insn in insns {
        insn.else_continuation_pc = 0;
        match insn.instruction_type {
            InstructionType::Block => {
                let block = match &mut insn.operands {
                    Operands::Block(b) => b,
                    _ => unreachable!("block instruction without block operand"),
                };
                let body = std::mem::take(&mut block.instructions);
                let body = flatten_instructions(body, pc + 1);
                pc += body.len() + 1;
                // Break target: just past our own END.
                insn.continuation_pc = pc;
                flattened.push(insn);
                flattened.extend(body);
            }
            InstructionType::Loop => {
                let block = match &mut insn.operands {
                    Operands::Block(b) => b,
                    _ => unreachable!("loop instruction without block operand"),
                };
                let body = std::mem::take(&mut block.instructions);
                block.else_instructions.clear();
                let body = flatten_instructions(body, pc + 1);
                // Break target: the loop header itself. This is what makes a
                // br to a loop a continue, not an exit.
                insn.continuation_pc = pc;
                pc += body.len() + 1;
                flattened.push(insn);
                flattened.extend(body);
            }
            InstructionType::If => {
                let block = match &mut insn.operands {
                    Operands::Block(b) => b,
                    _ => unreachable!("if instruction without block operand"),
                };
                let true_body = std::mem::take(&mut block.instructions);
                let false_body = std::mem::take(&mut block.else_instructions);

                // The true branch ends in either ELSE or END. Taking the
                // false path jumps to else_continuation_pc; both paths rejoin
                // at continuation_pc, just past the construct's END.
                let mut true_body = flatten_instructions(true_body, pc + 1);
                pc += true_body.len() + 1;
                insn.else_continuation_pc = pc;

                let false_body = flatten_instructions(false_body, pc);
                pc += false_body.len();
                insn.continuation_pc = pc;

                // Falling into an ELSE from the true path rejoins after the
                // whole construct.
                if let Some(last) = true_body.last_mut() {
                    if last.instruction_type == InstructionType::Else {
                        last.continuation_pc = insn.continuation_pc;
                    }
                }

                flattened.push(insn);
                flattened.extend(true_body);
                flattened.extend(false_body);
            }
            _ => {
                pc += 1;
                insn.continuation_pc = pc;
                flattened.push(insn);
            }
        }
    }
    flattened
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Instruction {
        Instruction::read(&mut Reader::new(bytes)).expect("failed to decode instruction")
    }

    #[test]
    fn test_decode_const() {
        let insn = decode(&[0x41, 0x7F]); // i32.const -1
        assert_eq!(insn.instruction_type, InstructionType::I32Const);
        assert_eq!(insn.as_i32(), Some(-1));

        let insn = decode(&[0x44, 24, 45, 68, 84, 251, 33, 25, 64]);
        assert_eq!(insn.instruction_type, InstructionType::F64Const);
        assert_eq!(insn.as_f64(), Some(6.283185307179586));
    }

    #[test]
    fn test_decode_memarg() {
        let insn = decode(&[0x28, 0x02, 0x10]); // i32.load align=2 offset=16
        assert_eq!(insn.instruction_type, InstructionType::I32Load);
        assert_eq!(insn.as_u32x2(), Some((2, 16)));
    }

    #[test]
    fn test_decode_extended_opcode() {
        let insn = decode(&[0xFC, 0x0A, 0x00, 0x00]); // memory.copy
        assert_eq!(insn.instruction_type, InstructionType::MemoryCopy);
        assert_eq!(insn.as_u32x2(), Some((0, 0)));
    }

    #[test]
    fn test_decode_extended_opcode_too_large() {
        let mut reader = Reader::new(&[0xFC, 0x80, 0x02]); // extension 0x100
        assert!(matches!(
            Instruction::read(&mut reader),
            Err(DecodeError::UnknownOpcode(_))
        ));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let mut reader = Reader::new(&[0x06]);
        assert!(matches!(
            Instruction::read(&mut reader),
            Err(DecodeError::UnknownOpcode(0x06))
        ));
    }

    #[test]
    fn test_decode_br_table() {
        // br_table with entries [0, 1] and default 2
        let insn = decode(&[0x0E, 0x02, 0x00, 0x01, 0x02]);
        assert_eq!(insn.instruction_type, InstructionType::BrTable);
        assert_eq!(insn.as_br_table(), Some(&[0, 1, 2][..]));
    }

    #[test]
    fn test_decode_block_types() {
        // block (empty) end
        let insn = decode(&[0x02, 0x40, 0x0B]);
        let block = insn.as_block().unwrap();
        assert_eq!(block.block_type, BlockType::Empty);

        // block (result i32) end
        let insn = decode(&[0x02, 0x7F, 0x0B]);
        assert_eq!(insn.as_block().unwrap().block_type, BlockType::Value(ValueType::I32));

        // block (type 3) end
        let insn = decode(&[0x02, 0x03, 0x0B]);
        assert_eq!(insn.as_block().unwrap().block_type, BlockType::TypeIndex(3));
    }

    #[test]
    fn test_decode_if_else_block() {
        // if (empty) nop else nop nop end
        let insn = decode(&[0x04, 0x40, 0x01, 0x05, 0x01, 0x01, 0x0B]);
        let block = insn.as_block().unwrap();
        assert_eq!(block.instructions.len(), 2); // nop, else
        assert_eq!(block.else_instructions.len(), 3); // nop, nop, end
    }

    #[test]
    fn test_flatten_sequential() {
        let bytes = [0x41, 0x01, 0x41, 0x02, 0x6A, 0x0B]; // i32.const 1; i32.const 2; i32.add; end
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(insns.len(), 4);
        for (pc, insn) in insns.iter().enumerate() {
            assert_eq!(insn.continuation_pc, pc + 1);
        }
    }

    #[test]
    fn test_flatten_block_continuation() {
        // block (empty) nop nop end; end
        let bytes = [0x02, 0x40, 0x01, 0x01, 0x0B, 0x0B];
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        // [block, nop, nop, end, end] -- block's break target skips past its END.
        assert_eq!(insns.len(), 5);
        assert_eq!(insns[0].instruction_type, InstructionType::Block);
        assert_eq!(insns[0].continuation_pc, 4);
    }

    #[test]
    fn test_flatten_loop_continuation_is_header() {
        // loop (empty) nop end; end
        let bytes = [0x03, 0x40, 0x01, 0x0B, 0x0B];
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(insns[0].instruction_type, InstructionType::Loop);
        // A branch to a loop jumps back to the loop header.
        assert_eq!(insns[0].continuation_pc, 0);
    }

    #[test]
    fn test_flatten_if_else_continuations() {
        // if (empty) nop else nop nop end; end
        let bytes = [0x04, 0x40, 0x01, 0x05, 0x01, 0x01, 0x0B, 0x0B];
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        // [if, nop, else, nop, nop, end, end]
        assert_eq!(insns.len(), 7);
        assert_eq!(insns[0].instruction_type, InstructionType::If);
        assert_eq!(insns[0].else_continuation_pc, 3); // just past ELSE
        assert_eq!(insns[0].continuation_pc, 6); // just past END
        assert_eq!(insns[2].instruction_type, InstructionType::Else);
        // Falling into the else terminator rejoins after the construct.
        assert_eq!(insns[2].continuation_pc, 6);
    }

    #[test]
    fn test_flatten_if_without_else() {
        // if (empty) nop end; end
        let bytes = [0x04, 0x40, 0x01, 0x0B, 0x0B];
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        // [if, nop, end, end]
        assert_eq!(insns[0].else_continuation_pc, 3);
        assert_eq!(insns[0].continuation_pc, 3);
    }

    #[test]
    fn test_flatten_nested_blocks_monotonic() {
        // block (empty) block (empty) nop end nop end; end
        let bytes = [0x02, 0x40, 0x02, 0x40, 0x01, 0x0B, 0x01, 0x0B, 0x0B];
        let insns = read_expr(&mut Reader::new(&bytes)).unwrap();
        // [block, block, nop, end, nop, end, end]
        assert_eq!(insns.len(), 7);
        assert_eq!(insns[0].continuation_pc, 6);
        assert_eq!(insns[1].instruction_type, InstructionType::Block);
        assert_eq!(insns[1].continuation_pc, 4);
    }
}
