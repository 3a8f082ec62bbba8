//! Binary format decoder.
//!
//! [`parse`] reads `.wasm` bytes into a [`module::Module`]: it validates the
//! magic/version header, then loops over `[id][length][payload]` sections,
//! decoding each from its own length-bounded sub-reader. Custom sections are
//! recognized and discarded. After all sections are read, two fixups are
//! applied, because the wire format under-specifies structure until sections
//! are combined: import function-type indices are resolved to concrete
//! function types, and the Function and Code sections are zipped by position
//! into complete function definitions.

pub mod instruction;
pub mod module;
pub mod reader;

use thiserror::Error;

use instruction::read_expr;
use module::{
    Data, DataMode, ElementInit, ElementMode, ElementSegment, Export, Func, FuncType, Global,
    GlobalType, Import, ImportDesc, MemType, Module, TableType, ValueType,
};
use reader::Reader;

/// An error while decoding a module. Decode errors are unrecoverable for the
/// module being read; no partial [`Module`] is ever returned.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("magic number 0061736d not found (got {})", hex::encode(.0))]
    BadMagic([u8; 4]),
    #[error("unsupported version {} (expected 01000000)", hex::encode(.0))]
    UnsupportedVersion([u8; 4]),
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("unknown section id {0}")]
    UnknownSection(u8),
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u32),
    #[error("invalid value type 0x{0:02x}")]
    InvalidValueType(u8),
    #[error("invalid {what} tag 0x{tag:02x}")]
    InvalidTag { what: &'static str, tag: u8 },
    #[error("LEB128 integer exceeds its bit width")]
    IntegerTooLong,
    #[error("invalid utf-8 in name")]
    InvalidUtf8,
    #[error("function type index {0} out of range")]
    TypeIndexOutOfRange(u32),
    #[error("function count mismatch: {functions} function declarations, {bodies} bodies")]
    FunctionCountMismatch { functions: usize, bodies: usize },
}

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Decodes a binary module.
pub fn parse(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut reader = Reader::new(bytes);
    read_header(&mut reader)?;

    let mut module = Module::default();
    // Local declarations and bodies are held aside until the Function/Code
    // zip fixup below; the code section itself never becomes part of the
    // module.
    let mut code: Vec<(Vec<ValueType>, Vec<instruction::Instruction>)> = Vec::new();

    while !reader.is_empty() {
        let section_id = reader.read_byte()?;
        let section_len = reader.read_vu32()? as usize;
        let payload = reader.read_bytes(section_len)?;
        let mut section = Reader::new(payload);
        log::debug!("reading section id {section_id}, {section_len} bytes");
        read_section(section_id, &mut section, &mut module, &mut code)?;
    }

    // Fixup 1: resolve import function-type indices to concrete types.
    for import in &mut module.imports {
        if let ImportDesc::FuncIdx(idx) = import.desc {
            let func_type = module
                .types
                .get(idx as usize)
                .cloned()
                .ok_or(DecodeError::TypeIndexOutOfRange(idx))?;
            import.desc = ImportDesc::Func(func_type);
        }
    }

    // Fixup 2: zip the Function section (type indices) with the Code section
    // (locals + bodies) by position.
    if module.functions.len() != code.len() {
        return Err(DecodeError::FunctionCountMismatch {
            functions: module.functions.len(),
            bodies: code.len(),
        });
    }
    for (func, (locals, body)) in module.functions.iter_mut().zip(code) {
        if func.type_idx as usize >= module.types.len() {
            return Err(DecodeError::TypeIndexOutOfRange(func.type_idx));
        }
        func.locals = locals;
        func.body = body;
    }

    Ok(module)
}

fn read_header(reader: &mut Reader) -> Result<(), DecodeError> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(reader.read_bytes(4)?);
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(reader.read_bytes(4)?);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(())
}

fn read_section(
    section_id: u8,
    section: &mut Reader,
    module: &mut Module,
    code: &mut Vec<(Vec<ValueType>, Vec<instruction::Instruction>)>,
) -> Result<(), DecodeError> {
    match section_id {
        0 => read_custom_section(section),
        1 => read_type_section(section, &mut module.types),
        2 => read_import_section(section, &mut module.imports),
        3 => read_function_section(section, &mut module.functions),
        4 => read_table_section(section, &mut module.tables),
        5 => read_memory_section(section, &mut module.memories),
        6 => read_global_section(section, &mut module.globals),
        7 => read_export_section(section, &mut module.exports),
        8 => {
            module.start = Some(section.read_vu32()?);
            Ok(())
        }
        9 => read_element_section(section, &mut module.elements),
        10 => read_code_section(section, code),
        11 => read_data_section(section, &mut module.data),
        12 => {
            module.data_count = Some(section.read_vu32()?);
            Ok(())
        }
        _ => Err(DecodeError::UnknownSection(section_id)),
    }
}

/// Custom sections carry a name and opaque bytes; they are read and dropped.
fn read_custom_section(section: &mut Reader) -> Result<(), DecodeError> {
    let name = section.read_name()?;
    log::debug!("skipping custom section \"{name}\" ({} bytes)", section.remaining());
    Ok(())
}

fn read_type_section(section: &mut Reader, types: &mut Vec<FuncType>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        types.push(FuncType::read(section)?);
    }
    Ok(())
}

fn read_import_section(section: &mut Reader, imports: &mut Vec<Import>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        imports.push(Import::read(section)?);
    }
    Ok(())
}

fn read_function_section(section: &mut Reader, functions: &mut Vec<Func>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        let type_idx = section.read_vu32()?;
        functions.push(Func { type_idx, locals: Vec::new(), body: Vec::new() });
    }
    Ok(())
}

fn read_table_section(section: &mut Reader, tables: &mut Vec<TableType>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        tables.push(TableType::read(section)?);
    }
    Ok(())
}

fn read_memory_section(section: &mut Reader, memories: &mut Vec<MemType>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        memories.push(MemType::read(section)?);
    }
    Ok(())
}

fn read_global_section(section: &mut Reader, globals: &mut Vec<Global>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        let global_type = GlobalType::read(section)?;
        let init = read_expr(section)?;
        globals.push(Global { global_type, init });
    }
    Ok(())
}

fn read_export_section(section: &mut Reader, exports: &mut Vec<Export>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        exports.push(Export::read(section)?);
    }
    Ok(())
}

fn read_element_section(
    section: &mut Reader,
    elements: &mut Vec<ElementSegment>,
) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        elements.push(read_element_segment(section)?);
    }
    Ok(())
}

/// Element segments come in eight wire encodings selected by a leading tag:
/// bit 0 distinguishes active from passive/declarative, bit 1 selects
/// explicit table index (active) or declarative (otherwise), bit 2 selects
/// expression-encoded elements over function indices.
fn read_element_segment(section: &mut Reader) -> Result<ElementSegment, DecodeError> {
    let tag = section.read_vu32()?;

    fn read_func_indices(section: &mut Reader) -> Result<ElementInit, DecodeError> {
        let count = section.read_vu32()?;
        let mut indices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            indices.push(section.read_vu32()?);
        }
        Ok(ElementInit::FuncIndices(indices))
    }

    fn read_elem_exprs(section: &mut Reader) -> Result<ElementInit, DecodeError> {
        let count = section.read_vu32()?;
        let mut exprs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            exprs.push(read_expr(section)?);
        }
        Ok(ElementInit::Exprs(exprs))
    }

    fn read_elem_kind(section: &mut Reader) -> Result<ValueType, DecodeError> {
        match section.read_byte()? {
            0x00 => Ok(ValueType::FuncRef),
            tag => Err(DecodeError::InvalidTag { what: "elemkind", tag }),
        }
    }

    match tag {
        0x00 => {
            let offset = read_expr(section)?;
            Ok(ElementSegment {
                elem_type: ValueType::FuncRef,
                mode: ElementMode::Active { table_idx: 0, offset },
                init: read_func_indices(section)?,
            })
        }
        0x01 => {
            let elem_type = read_elem_kind(section)?;
            Ok(ElementSegment { elem_type, mode: ElementMode::Passive, init: read_func_indices(section)? })
        }
        0x02 => {
            let table_idx = section.read_vu32()?;
            let offset = read_expr(section)?;
            let elem_type = read_elem_kind(section)?;
            Ok(ElementSegment {
                elem_type,
                mode: ElementMode::Active { table_idx, offset },
                init: read_func_indices(section)?,
            })
        }
        0x03 => {
            let elem_type = read_elem_kind(section)?;
            Ok(ElementSegment { elem_type, mode: ElementMode::Declarative, init: read_func_indices(section)? })
        }
        0x04 => {
            let offset = read_expr(section)?;
            Ok(ElementSegment {
                elem_type: ValueType::FuncRef,
                mode: ElementMode::Active { table_idx: 0, offset },
                init: read_elem_exprs(section)?,
            })
        }
        0x05 => {
            let elem_type = ValueType::read(section)?;
            Ok(ElementSegment { elem_type, mode: ElementMode::Passive, init: read_elem_exprs(section)? })
        }
        0x06 => {
            let table_idx = section.read_vu32()?;
            let offset = read_expr(section)?;
            let elem_type = ValueType::read(section)?;
            Ok(ElementSegment {
                elem_type,
                mode: ElementMode::Active { table_idx, offset },
                init: read_elem_exprs(section)?,
            })
        }
        0x07 => {
            let elem_type = ValueType::read(section)?;
            Ok(ElementSegment { elem_type, mode: ElementMode::Declarative, init: read_elem_exprs(section)? })
        }
        _ => Err(DecodeError::InvalidTag { what: "element segment", tag: tag as u8 }),
    }
}

fn read_code_section(
    section: &mut Reader,
    code: &mut Vec<(Vec<ValueType>, Vec<instruction::Instruction>)>,
) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        let _size = section.read_vu32()?;
        // Local declarations are run-length pairs; expand them into one
        // entry per local slot.
        let num_locals = section.read_vu32()?;
        let mut locals = Vec::new();
        for _ in 0..num_locals {
            let n = section.read_vu32()?;
            let value_type = ValueType::read(section)?;
            locals.extend(std::iter::repeat(value_type).take(n as usize));
        }
        let body = read_expr(section)?;
        code.push((locals, body));
    }
    Ok(())
}

fn read_data_section(section: &mut Reader, data: &mut Vec<Data>) -> Result<(), DecodeError> {
    let count = section.read_vu32()?;
    for _ in 0..count {
        let tag = section.read_vu32()?;
        let mode = match tag {
            0x00 => DataMode::Active { mem_idx: 0, offset: read_expr(section)? },
            0x01 => DataMode::Passive,
            0x02 => {
                let mem_idx = section.read_vu32()?;
                DataMode::Active { mem_idx, offset: read_expr(section)? }
            }
            _ => return Err(DecodeError::InvalidTag { what: "data segment", tag: tag as u8 }),
        };
        let size = section.read_vu32()? as usize;
        let init = section.read_bytes(size)?.to_vec();
        data.push(Data { mode, init });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::instruction::InstructionType;
    use super::module::{ExportDesc, ImportDesc, ValueType};
    use super::*;

    /// A module exporting `add: (i32, i32) -> i32`.
    fn add_module_bytes() -> Vec<u8> {
        hex::decode(concat!(
            "0061736d01000000",       // magic + version
            "01070160027f7f017f",     // type: (i32, i32) -> (i32)
            "03020100",               // function: func 0 has type 0
            "070701036164640000",     // export: "add" -> func 0
            "0a09010700200020016a0b", // code: local.get 0; local.get 1; i32.add; end
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_add_module() {
        let module = parse(&add_module_bytes()).unwrap();
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.types[0].parameters, vec![ValueType::I32, ValueType::I32]);
        assert_eq!(module.types[0].results, vec![ValueType::I32]);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].type_idx, 0);
        assert!(module.functions[0].locals.is_empty());
        // local.get 0; local.get 1; i32.add; end
        assert_eq!(module.functions[0].body.len(), 4);
        assert_eq!(module.functions[0].body[2].instruction_type, InstructionType::I32Add);
        assert_eq!(module.export("add").unwrap().desc, ExportDesc::Func(0));
    }

    #[test]
    fn test_parse_bad_magic() {
        let bytes = hex::decode("0061736e01000000").unwrap();
        assert!(matches!(parse(&bytes), Err(DecodeError::BadMagic(_))));
    }

    #[test]
    fn test_parse_bad_version() {
        let bytes = hex::decode("0061736d02000000").unwrap();
        assert!(matches!(parse(&bytes), Err(DecodeError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_parse_unknown_section() {
        let bytes = hex::decode("0061736d010000000d0100").unwrap();
        assert_eq!(parse(&bytes), Err(DecodeError::UnknownSection(13)));
    }

    #[test]
    fn test_parse_custom_section_discarded() {
        let bytes = hex::decode(concat!(
            "0061736d01000000",
            "0007046d657461aabb", // custom section "meta" + 2 opaque bytes
            "010401600000",       // type: () -> ()
        ))
        .unwrap();
        let module = parse(&bytes).unwrap();
        assert_eq!(module.types.len(), 1);
    }

    #[test]
    fn test_parse_truncated_section() {
        let bytes = hex::decode("0061736d010000000110").unwrap();
        assert_eq!(parse(&bytes), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn test_parse_function_code_count_mismatch() {
        // One function declaration, no code section.
        let bytes = hex::decode(concat!(
            "0061736d01000000",
            "010401600000", // type: () -> ()
            "03020100",     // function: one entry
        ))
        .unwrap();
        assert_eq!(
            parse(&bytes),
            Err(DecodeError::FunctionCountMismatch { functions: 1, bodies: 0 })
        );
    }

    #[test]
    fn test_parse_import_fixup() {
        // One imported function of type 0, no local functions.
        let bytes = hex::decode(concat!(
            "0061736d01000000",
            "010401600000",         // type: () -> ()
            "020801026e7301690000", // import ns.i, func type 0
        ))
        .unwrap();
        let module = parse(&bytes).unwrap();
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].module, "ns");
        assert_eq!(module.imports[0].name, "i");
        match &module.imports[0].desc {
            ImportDesc::Func(ft) => {
                assert!(ft.parameters.is_empty());
                assert!(ft.results.is_empty());
            }
            other => panic!("import desc not resolved: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_section() {
        // One immutable i32 global initialized to 7.
        let bytes = hex::decode(concat!(
            "0061736d01000000",
            "0606017f0041070b", // global section: i32 const, init expr `i32.const 7; end`
        ))
        .unwrap();
        let module = parse(&bytes).unwrap();
        assert_eq!(module.globals.len(), 1);
        assert!(!module.globals[0].global_type.mutable);
        assert_eq!(module.globals[0].init.len(), 2);
        assert_eq!(module.globals[0].init[0].as_i32(), Some(7));
    }

    #[test]
    fn test_parse_data_count_section() {
        let bytes = hex::decode("0061736d010000000c0102").unwrap();
        let module = parse(&bytes).unwrap();
        assert_eq!(module.data_count, Some(2));
    }
}
