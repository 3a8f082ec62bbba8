//! Builders for hand-assembling instructions, functions, and stores in
//! tests. Bodies built here are flattened exactly as parsed bodies are.

use std::rc::Rc;

use crate::parser::instruction::{
    flatten_instructions, Block, BlockType, Instruction, InstructionType, Operands,
};
use crate::parser::module::{FuncType, GlobalType, Limits, TableType, ValueType};
use crate::runtime::instance::ModuleInstance;
use crate::runtime::memory::MemInstance;
use crate::runtime::store::{
    DataInstance, ElemInstance, FuncInstance, GlobalInstance, ModuleFunc, Store,
};
use crate::runtime::table::TableInstance;
use crate::runtime::value::Value;
use crate::runtime::RuntimeError;

pub fn noarg(instruction_type: InstructionType) -> Instruction {
    Instruction::new(instruction_type, Operands::None)
}

pub fn i32_const(value: i32) -> Instruction {
    Instruction::new(InstructionType::I32Const, Operands::I32(value))
}

pub fn i64_const(value: i64) -> Instruction {
    Instruction::new(InstructionType::I64Const, Operands::I64(value))
}

pub fn f32_const(value: f32) -> Instruction {
    Instruction::new(InstructionType::F32Const, Operands::F32(value))
}

pub fn f64_const(value: f64) -> Instruction {
    Instruction::new(InstructionType::F64Const, Operands::F64(value))
}

pub fn u32_op(instruction_type: InstructionType, value: u32) -> Instruction {
    Instruction::new(instruction_type, Operands::U32(value))
}

pub fn u32x2_op(instruction_type: InstructionType, a: u32, b: u32) -> Instruction {
    Instruction::new(instruction_type, Operands::U32x2(a, b))
}

pub fn local_get(idx: u32) -> Instruction {
    u32_op(InstructionType::LocalGet, idx)
}

pub fn local_set(idx: u32) -> Instruction {
    u32_op(InstructionType::LocalSet, idx)
}

pub fn local_tee(idx: u32) -> Instruction {
    u32_op(InstructionType::LocalTee, idx)
}

pub fn global_get(idx: u32) -> Instruction {
    u32_op(InstructionType::GlobalGet, idx)
}

pub fn global_set(idx: u32) -> Instruction {
    u32_op(InstructionType::GlobalSet, idx)
}

pub fn br(depth: u32) -> Instruction {
    u32_op(InstructionType::Br, depth)
}

pub fn br_if(depth: u32) -> Instruction {
    u32_op(InstructionType::BrIf, depth)
}

/// `labels` includes the default as its last entry.
pub fn br_table(labels: &[u32]) -> Instruction {
    Instruction::new(InstructionType::BrTable, Operands::BrTable(labels.to_vec()))
}

pub fn call(func_idx: u32) -> Instruction {
    u32_op(InstructionType::Call, func_idx)
}

pub fn call_indirect(type_idx: u32, table_idx: u32) -> Instruction {
    u32x2_op(InstructionType::CallIndirect, type_idx, table_idx)
}

pub fn end() -> Instruction {
    noarg(InstructionType::End)
}

fn else_() -> Instruction {
    noarg(InstructionType::Else)
}

fn block_op(
    instruction_type: InstructionType,
    block_type: BlockType,
    instructions: Vec<Instruction>,
    else_instructions: Vec<Instruction>,
) -> Instruction {
    Instruction::new(
        instruction_type,
        Operands::Block(Block::new(block_type, instructions, else_instructions)),
    )
}

/// A block with no results.
pub fn void_block(mut instructions: Vec<Instruction>) -> Instruction {
    instructions.push(end());
    block_op(InstructionType::Block, BlockType::Empty, instructions, Vec::new())
}

/// A block producing one i32.
pub fn i32_block(mut instructions: Vec<Instruction>) -> Instruction {
    instructions.push(end());
    block_op(InstructionType::Block, BlockType::Value(ValueType::I32), instructions, Vec::new())
}

/// A loop whose signature is the indexed function type.
pub fn typed_loop(type_idx: u32, mut instructions: Vec<Instruction>) -> Instruction {
    instructions.push(end());
    block_op(InstructionType::Loop, BlockType::TypeIndex(type_idx), instructions, Vec::new())
}

/// A loop with no parameters or results.
pub fn void_loop(mut instructions: Vec<Instruction>) -> Instruction {
    instructions.push(end());
    block_op(InstructionType::Loop, BlockType::Empty, instructions, Vec::new())
}

/// An if with no else clause and no results.
pub fn if_void(mut then_instructions: Vec<Instruction>) -> Instruction {
    then_instructions.push(end());
    block_op(InstructionType::If, BlockType::Empty, then_instructions, Vec::new())
}

/// An if/else producing one i32.
pub fn if_else_i32(
    mut then_instructions: Vec<Instruction>,
    mut else_instructions: Vec<Instruction>,
) -> Instruction {
    then_instructions.push(else_());
    else_instructions.push(end());
    block_op(
        InstructionType::If,
        BlockType::Value(ValueType::I32),
        then_instructions,
        else_instructions,
    )
}

/// Builds a store holding one hand-assembled module instance.
#[derive(Default)]
pub struct TestModuleBuilder {
    func_types: Vec<FuncType>,
    funcs: Vec<(u32, Vec<ValueType>, Vec<Instruction>)>,
    globals: Vec<GlobalInstance>,
    memory_pages: Option<u32>,
    table_min: Option<u32>,
    elements: Vec<Vec<Value>>,
    datas: Vec<Vec<u8>>,
}

impl TestModuleBuilder {
    pub fn new() -> TestModuleBuilder {
        TestModuleBuilder::default()
    }

    pub fn add_func_type(&mut self, parameters: Vec<ValueType>, results: Vec<ValueType>) -> u32 {
        self.func_types.push(FuncType::new(parameters, results));
        (self.func_types.len() - 1) as u32
    }

    /// Declares a function; returns its module-local index.
    pub fn add_func(
        &mut self,
        type_idx: u32,
        locals: Vec<ValueType>,
        body: Vec<Instruction>,
    ) -> u32 {
        self.funcs.push((type_idx, locals, body));
        (self.funcs.len() - 1) as u32
    }

    pub fn add_global(&mut self, value_type: ValueType, mutable: bool, value: Value) -> u32 {
        self.globals.push(GlobalInstance {
            global_type: GlobalType { value_type, mutable },
            value,
        });
        (self.globals.len() - 1) as u32
    }

    pub fn with_memory(&mut self, pages: u32) -> &mut TestModuleBuilder {
        self.memory_pages = Some(pages);
        self
    }

    pub fn with_table(&mut self, min: u32) -> &mut TestModuleBuilder {
        self.table_min = Some(min);
        self
    }

    /// Adds an element segment whose refs are module-local function indices.
    pub fn add_element(&mut self, func_indices: &[u32]) -> u32 {
        let refs = func_indices
            .iter()
            .map(|idx| Value::FuncRef(Some(*idx as usize)))
            .collect();
        self.elements.push(refs);
        (self.elements.len() - 1) as u32
    }

    pub fn add_data(&mut self, bytes: Vec<u8>) -> u32 {
        self.datas.push(bytes);
        (self.datas.len() - 1) as u32
    }

    pub fn build(self) -> TestMachine {
        let TestModuleBuilder {
            func_types,
            funcs,
            globals,
            memory_pages,
            table_min,
            elements,
            datas,
        } = self;

        let mut store = Store::new();
        let mut inst = ModuleInstance { func_types, ..Default::default() };

        let func_base = store.func_count();
        for i in 0..funcs.len() {
            inst.funcaddrs.push(func_base + i);
        }
        if let Some(pages) = memory_pages {
            inst.memaddrs
                .push(store.add_mem(MemInstance::new(pages, None).expect("test memory")));
        }
        if let Some(min) = table_min {
            inst.tableaddrs.push(store.add_table(TableInstance::new(TableType {
                ref_type: ValueType::FuncRef,
                limits: Limits { min, max: None },
            })));
        }
        for global in globals {
            inst.globaladdrs.push(store.add_global(global));
        }
        for refs in elements {
            inst.elementaddrs
                .push(store.add_element(ElemInstance { elem_type: ValueType::FuncRef, refs }));
        }
        for bytes in datas {
            inst.dataaddrs.push(store.add_data(DataInstance { bytes }));
        }

        let inst = Rc::new(inst);
        for (i, (type_idx, locals, body)) in funcs.into_iter().enumerate() {
            let func_type = inst.func_types[type_idx as usize].clone();
            let body = flatten_instructions(body, 0);
            let addr = store.add_func(FuncInstance::Module(ModuleFunc {
                func_type,
                module: inst.clone(),
                locals,
                body: Rc::from(body),
            }));
            debug_assert_eq!(addr, func_base + i);
        }

        TestMachine { store, instance: inst }
    }
}

/// A store plus the one instance built for it.
pub struct TestMachine {
    pub store: Store,
    pub instance: Rc<ModuleInstance>,
}

impl TestMachine {
    /// Pushes `args` and invokes the module-local function `func_idx`.
    pub fn invoke(&mut self, func_idx: u32, args: &[Value]) -> Result<(), RuntimeError> {
        for arg in args {
            self.store.push_value(*arg);
        }
        let addr = self.instance.funcaddrs[func_idx as usize];
        self.store.invoke_func(addr)
    }

    pub fn pop(&mut self) -> Value {
        self.store.pop_value().expect("expected a value on the stack")
    }
}
