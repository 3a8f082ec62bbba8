//! The decoded module data model.
//!
//! These types are built once by the binary decoder and never mutated after
//! the post-read fixup pass. Runtime state lives in the store, never here.

use std::fmt;

use super::instruction::Instruction;
use super::reader::Reader;
use super::DecodeError;

/// A value type, whose discriminant is also its single-byte wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    I32 = 0x7F,
    I64 = 0x7E,
    F32 = 0x7D,
    F64 = 0x7C,
    V128 = 0x7B,
    FuncRef = 0x70,
    ExternRef = 0x6F,
}

impl ValueType {
    pub fn decode(byte: u8) -> Result<ValueType, DecodeError> {
        match byte {
            0x7F => Ok(ValueType::I32),
            0x7E => Ok(ValueType::I64),
            0x7D => Ok(ValueType::F32),
            0x7C => Ok(ValueType::F64),
            0x7B => Ok(ValueType::V128),
            0x70 => Ok(ValueType::FuncRef),
            0x6F => Ok(ValueType::ExternRef),
            _ => Err(DecodeError::InvalidValueType(byte)),
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, ValueType::FuncRef | ValueType::ExternRef)
    }

    pub(crate) fn read(reader: &mut Reader) -> Result<ValueType, DecodeError> {
        ValueType::decode(reader.read_byte()?)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
        };
        write!(f, "{name}")
    }
}

/// Size limits for tables and memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    fn read(reader: &mut Reader) -> Result<Limits, DecodeError> {
        let tag = reader.read_byte()?;
        let min = reader.read_vu32()?;
        let max = match tag {
            0x00 => None,
            0x01 => Some(reader.read_vu32()?),
            _ => return Err(DecodeError::InvalidTag { what: "limits", tag }),
        };
        Ok(Limits { min, max })
    }

    /// Whether an entity with these actual limits satisfies `expected` when
    /// linked as an import.
    pub fn satisfies(&self, expected: &Limits) -> bool {
        if self.min < expected.min {
            return false;
        }
        match expected.max {
            None => true,
            Some(expected_max) => matches!(self.max, Some(max) if max <= expected_max),
        }
    }
}

/// A function signature. Equality is structural: two types with identical
/// parameter and result sequences are interchangeable, which is what import
/// matching relies on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncType {
    pub parameters: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FuncType {
    pub fn new(parameters: Vec<ValueType>, results: Vec<ValueType>) -> FuncType {
        FuncType { parameters, results }
    }

    pub(crate) fn read(reader: &mut Reader) -> Result<FuncType, DecodeError> {
        let tag = reader.read_byte()?;
        if tag != 0x60 {
            return Err(DecodeError::InvalidTag { what: "functype", tag });
        }
        let parameters = read_value_types(reader)?;
        let results = read_value_types(reader)?;
        Ok(FuncType { parameters, results })
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, ")")
    }
}

fn read_value_types(reader: &mut Reader) -> Result<Vec<ValueType>, DecodeError> {
    let count = reader.read_vu32()?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        types.push(ValueType::read(reader)?);
    }
    Ok(types)
}

/// The type of a table: a reference type plus limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableType {
    pub ref_type: ValueType,
    pub limits: Limits,
}

impl TableType {
    pub(crate) fn read(reader: &mut Reader) -> Result<TableType, DecodeError> {
        let ref_type = ValueType::read(reader)?;
        if !ref_type.is_ref() {
            return Err(DecodeError::InvalidValueType(ref_type as u8));
        }
        let limits = Limits::read(reader)?;
        Ok(TableType { ref_type, limits })
    }
}

/// The type of a linear memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemType {
    pub limits: Limits,
}

impl MemType {
    pub(crate) fn read(reader: &mut Reader) -> Result<MemType, DecodeError> {
        Ok(MemType { limits: Limits::read(reader)? })
    }
}

/// The type of a global: a value type plus mutability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl GlobalType {
    pub(crate) fn read(reader: &mut Reader) -> Result<GlobalType, DecodeError> {
        let value_type = ValueType::read(reader)?;
        let mutable = match reader.read_byte()? {
            0x00 => false,
            0x01 => true,
            tag => return Err(DecodeError::InvalidTag { what: "global mutability", tag }),
        };
        Ok(GlobalType { value_type, mutable })
    }
}

/// The type of anything that can cross the import/export boundary. The kind
/// is always known from a tag byte at decode time, and consumers always
/// distinguish by kind before use.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalType {
    Func(FuncType),
    Table(TableType),
    Mem(MemType),
    Global(GlobalType),
}

/// An import descriptor. Function imports are read from the wire as a raw
/// type-section index ([`ImportDesc::FuncIdx`]) and rewritten in place to the
/// resolved [`FuncType`] by the post-read fixup pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    FuncIdx(u32),
    Func(FuncType),
    Table(TableType),
    Mem(MemType),
    Global(GlobalType),
}

/// An import: a two-level name plus a descriptor the supplied external value
/// must match at instantiation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

impl Import {
    pub(crate) fn read(reader: &mut Reader) -> Result<Import, DecodeError> {
        let module = reader.read_name()?;
        let name = reader.read_name()?;
        let desc = match reader.read_byte()? {
            0x00 => ImportDesc::FuncIdx(reader.read_vu32()?),
            0x01 => ImportDesc::Table(TableType::read(reader)?),
            0x02 => ImportDesc::Mem(MemType::read(reader)?),
            0x03 => ImportDesc::Global(GlobalType::read(reader)?),
            tag => return Err(DecodeError::InvalidTag { what: "import desc", tag }),
        };
        Ok(Import { module, name, desc })
    }
}

/// An export descriptor: the kind plus the module-local index of the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Mem(u32),
    Global(u32),
}

/// A named export.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

impl Export {
    pub(crate) fn read(reader: &mut Reader) -> Result<Export, DecodeError> {
        let name = reader.read_name()?;
        let tag = reader.read_byte()?;
        let idx = reader.read_vu32()?;
        let desc = match tag {
            0x00 => ExportDesc::Func(idx),
            0x01 => ExportDesc::Table(idx),
            0x02 => ExportDesc::Mem(idx),
            0x03 => ExportDesc::Global(idx),
            _ => return Err(DecodeError::InvalidTag { what: "export desc", tag }),
        };
        Ok(Export { name, desc })
    }
}

/// A global definition: its type and a constant initializer expression
/// (already flattened).
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: Vec<Instruction>,
}

/// How an element segment is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementMode {
    /// Copied into a table during instantiation at a computed offset.
    Active { table_idx: u32, offset: Vec<Instruction> },
    /// Available to `table.init` at run time.
    Passive,
    /// Only forward-declares function references; dropped at instantiation.
    Declarative,
}

/// The initializer list of an element segment: either function indices or
/// per-element constant expressions. The two encodings are mutually
/// exclusive on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementInit {
    FuncIndices(Vec<u32>),
    Exprs(Vec<Vec<Instruction>>),
}

impl ElementInit {
    pub fn len(&self) -> usize {
        match self {
            ElementInit::FuncIndices(v) => v.len(),
            ElementInit::Exprs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An element segment: a vector of references used to initialize a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub elem_type: ValueType,
    pub mode: ElementMode,
    pub init: ElementInit,
}

/// How a data segment is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    /// Copied into memory `mem_idx` during instantiation at a computed offset.
    Active { mem_idx: u32, offset: Vec<Instruction> },
    /// Available to `memory.init` at run time.
    Passive,
}

/// A data segment: a byte blob used to initialize linear memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub mode: DataMode,
    pub init: Vec<u8>,
}

/// A function definition. Only `type_idx` comes from the Function section;
/// `locals` and `body` are merged in from the Code section by the post-read
/// fixup pass, with run-length local declarations expanded to one entry per
/// local slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub type_idx: u32,
    pub locals: Vec<ValueType>,
    pub body: Vec<Instruction>,
}

/// An immutable decoded module: one field per section. Built once by
/// [`parse`](super::parse) and read-only thereafter.
#[derive(Debug, Default, PartialEq)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    pub functions: Vec<Func>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemType>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<Data>,
    pub data_count: Option<u32>,
}

impl Module {
    /// Looks up an export by name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_decode() {
        assert_eq!(ValueType::decode(0x7F).unwrap(), ValueType::I32);
        assert_eq!(ValueType::decode(0x7E).unwrap(), ValueType::I64);
        assert_eq!(ValueType::decode(0x70).unwrap(), ValueType::FuncRef);
        assert!(ValueType::decode(0x00).is_err());
    }

    #[test]
    fn test_func_type_read() {
        // (i32, i32) -> (i32)
        let bytes = [0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F];
        let ft = FuncType::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(ft.parameters, vec![ValueType::I32, ValueType::I32]);
        assert_eq!(ft.results, vec![ValueType::I32]);
    }

    #[test]
    fn test_func_type_structural_equality() {
        let a = FuncType::new(vec![ValueType::I32], vec![ValueType::F64]);
        let b = FuncType::new(vec![ValueType::I32], vec![ValueType::F64]);
        assert_eq!(a, b);
        let c = FuncType::new(vec![ValueType::I64], vec![ValueType::F64]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_func_type_bad_lead_tag() {
        let bytes = [0x61, 0x00, 0x00];
        assert!(matches!(
            FuncType::read(&mut Reader::new(&bytes)),
            Err(DecodeError::InvalidTag { what: "functype", .. })
        ));
    }

    #[test]
    fn test_table_type_read() {
        let bytes = [0x70, 0x01, 0x02, 0x10];
        let tt = TableType::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(tt.ref_type, ValueType::FuncRef);
        assert_eq!(tt.limits, Limits { min: 2, max: Some(16) });
    }

    #[test]
    fn test_mem_type_read_no_max() {
        let bytes = [0x00, 0x01];
        let mt = MemType::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(mt.limits, Limits { min: 1, max: None });
    }

    #[test]
    fn test_global_type_read() {
        let bytes = [0x7F, 0x01];
        let gt = GlobalType::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(gt.value_type, ValueType::I32);
        assert!(gt.mutable);
    }

    #[test]
    fn test_limits_satisfies() {
        let declared = Limits { min: 1, max: Some(4) };
        assert!(Limits { min: 2, max: Some(3) }.satisfies(&declared));
        assert!(!Limits { min: 0, max: Some(3) }.satisfies(&declared));
        assert!(!Limits { min: 2, max: None }.satisfies(&declared));
        assert!(Limits { min: 2, max: None }.satisfies(&Limits { min: 1, max: None }));
    }
}
