//! Module instantiation: binding a decoded module plus the caller-supplied
//! external values into a live instance inside a store.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use super::imports::{extern_type, matches_import, ExternVal};
use super::memory::MemInstance;
use super::store::{DataInstance, ElemInstance, FuncInstance, GlobalInstance, ModuleFunc, Store};
use super::table::TableInstance;
use super::value::{Frame, Label, StackEntry, Value};
use super::RuntimeError;
use crate::parser::instruction::Instruction;
use crate::parser::module::{
    DataMode, ElementInit, ElementMode, ExportDesc, FuncType, ImportDesc, Module,
};

/// An error raised while instantiating a module. Instantiation errors are
/// setup failures visible to the caller, never runtime traps of the guest;
/// a module that failed to instantiate must not be executed.
#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("expected {expected} imports, got {actual} external values")]
    ImportCountMismatch { expected: usize, actual: usize },
    #[error("import {module}.{name} type mismatch: expected {expected}, got {actual}")]
    ImportTypeMismatch { module: String, name: String, expected: String, actual: String },
    #[error("import {module}.{name} has an unresolved descriptor")]
    UnresolvedImport { module: String, name: String },
    #[error("only memory 0 is supported, data segment targets memory {0}")]
    UnsupportedMemoryIndex(u32),
    #[error("constant expression produced a {0}, expected i32")]
    NonIntegerOffset(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Per-instantiation state: the module's resolved function types, the
/// address-translation arrays mapping its local indices to store addresses,
/// and its export map.
///
/// Invariant: in each translation array, imported addresses occupy the index
/// range `[0, k)` before any module-local definitions, where `k` is that
/// import kind's count.
#[derive(Debug, Default)]
pub struct ModuleInstance {
    pub func_types: Vec<FuncType>,
    pub funcaddrs: Vec<usize>,
    pub tableaddrs: Vec<usize>,
    pub memaddrs: Vec<usize>,
    pub globaladdrs: Vec<usize>,
    pub dataaddrs: Vec<usize>,
    pub elementaddrs: Vec<usize>,
    pub exports: HashMap<String, ExternVal>,
}

impl ModuleInstance {
    /// Looks up an exported entity by its declared name.
    pub fn export(&self, name: &str) -> Option<&ExternVal> {
        self.exports.get(name)
    }

    /// Instantiates `module` against `store`, linking `externvals` to the
    /// module's imports (one external value per import, in import
    /// declaration order).
    ///
    /// Verifies import counts and types before any allocation, allocates the
    /// module's own definitions, runs global initializers and active
    /// element/data copies, and finally invokes the start function if the
    /// module declares one.
    pub fn instantiate(
        module: &Module,
        externvals: &[ExternVal],
        store: &mut Store,
    ) -> Result<Rc<ModuleInstance>, InstantiationError> {
        if externvals.len() != module.imports.len() {
            return Err(InstantiationError::ImportCountMismatch {
                expected: module.imports.len(),
                actual: externvals.len(),
            });
        }
        for (import, externval) in module.imports.iter().zip(externvals) {
            if let ImportDesc::FuncIdx(_) = import.desc {
                return Err(InstantiationError::UnresolvedImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                });
            }
            let actual = extern_type(store, externval)?;
            if !matches_import(&actual, &import.desc) {
                return Err(InstantiationError::ImportTypeMismatch {
                    module: import.module.clone(),
                    name: import.name.clone(),
                    expected: format!("{:?}", import.desc),
                    actual: format!("{actual:?}"),
                });
            }
            log::debug!("linked import {}.{}", import.module, import.name);
        }

        let mut inst = ModuleInstance { func_types: module.types.clone(), ..Default::default() };

        // External addresses come first in every translation array, grouped
        // by kind in declaration order.
        for externval in externvals {
            match externval {
                ExternVal::Func(addr) => inst.funcaddrs.push(*addr),
                ExternVal::Table(addr) => inst.tableaddrs.push(*addr),
                ExternVal::Mem(addr) => inst.memaddrs.push(*addr),
                ExternVal::Global(addr) => inst.globaladdrs.push(*addr),
            }
        }

        // The module's own functions are added to the store only after the
        // instance is complete (they hold a reference to it), but the store
        // appends, so their addresses are known now.
        let func_base = store.func_count();
        for i in 0..module.functions.len() {
            inst.funcaddrs.push(func_base + i);
        }

        for table_type in &module.tables {
            inst.tableaddrs.push(store.add_table(TableInstance::new(table_type.clone())));
        }

        for mem_type in &module.memories {
            let mem = MemInstance::new(mem_type.limits.min, mem_type.limits.max)?;
            inst.memaddrs.push(store.add_mem(mem));
        }

        for global in &module.globals {
            inst.globaladdrs.push(store.add_global(GlobalInstance {
                global_type: global.global_type.clone(),
                value: Value::default_for(global.global_type.value_type),
            }));
        }

        for segment in &module.elements {
            let refs = match &segment.init {
                ElementInit::FuncIndices(indices) => {
                    let mut refs = Vec::with_capacity(indices.len());
                    for idx in indices {
                        let addr = *inst
                            .funcaddrs
                            .get(*idx as usize)
                            .ok_or(RuntimeError::FunctionIndexOutOfBounds(*idx))?;
                        refs.push(Value::FuncRef(Some(addr)));
                    }
                    refs
                }
                // Expression-encoded elements are evaluated below, once the
                // instance exists to run expressions against.
                ElementInit::Exprs(exprs) => {
                    vec![Value::default_for(segment.elem_type); exprs.len()]
                }
            };
            inst.elementaddrs
                .push(store.add_element(ElemInstance { elem_type: segment.elem_type, refs }));
        }

        for data in &module.data {
            inst.dataaddrs.push(store.add_data(DataInstance { bytes: data.init.clone() }));
        }

        for export in &module.exports {
            let val = match export.desc {
                ExportDesc::Func(idx) => ExternVal::Func(
                    *inst
                        .funcaddrs
                        .get(idx as usize)
                        .ok_or(RuntimeError::FunctionIndexOutOfBounds(idx))?,
                ),
                ExportDesc::Table(idx) => ExternVal::Table(
                    *inst
                        .tableaddrs
                        .get(idx as usize)
                        .ok_or(RuntimeError::TableIndexOutOfBounds(idx))?,
                ),
                ExportDesc::Mem(idx) => ExternVal::Mem(
                    *inst
                        .memaddrs
                        .get(idx as usize)
                        .ok_or(RuntimeError::MemoryIndexOutOfBounds(idx))?,
                ),
                ExportDesc::Global(idx) => ExternVal::Global(
                    *inst
                        .globaladdrs
                        .get(idx as usize)
                        .ok_or(RuntimeError::GlobalIndexOutOfBounds(idx))?,
                ),
            };
            inst.exports.insert(export.name.clone(), val);
        }

        let inst = Rc::new(inst);

        for (i, func) in module.functions.iter().enumerate() {
            let func_type = inst
                .func_types
                .get(func.type_idx as usize)
                .cloned()
                .ok_or(RuntimeError::TypeIndexOutOfBounds(func.type_idx))?;
            let addr = store.add_func(FuncInstance::Module(ModuleFunc {
                func_type,
                module: inst.clone(),
                locals: func.locals.clone(),
                body: Rc::from(func.body.clone()),
            }));
            debug_assert_eq!(addr, func_base + i);
        }

        // Global initializers run in declaration order; only imports and
        // earlier globals are visible to each.
        let imported_globals = externvals.iter().filter(|v| matches!(v, ExternVal::Global(_))).count();
        for (i, global) in module.globals.iter().enumerate() {
            let value = run_const_expr(store, &inst, &global.init)?;
            store.set_global(inst.globaladdrs[imported_globals + i], value)?;
        }

        // Expression-encoded element segments resolve their references now.
        for (i, segment) in module.elements.iter().enumerate() {
            if let ElementInit::Exprs(exprs) = &segment.init {
                let mut refs = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    refs.push(run_const_expr(store, &inst, expr)?);
                }
                store.get_element_mut(inst.elementaddrs[i])?.refs = refs;
            }
        }

        // Active element segments are copied into their tables and dropped;
        // declarative segments are just dropped.
        for (i, segment) in module.elements.iter().enumerate() {
            let elemaddr = inst.elementaddrs[i];
            match &segment.mode {
                ElementMode::Active { table_idx, offset } => {
                    let d = offset_value(run_const_expr(store, &inst, offset)?)?;
                    let tableaddr = *inst
                        .tableaddrs
                        .get(*table_idx as usize)
                        .ok_or(RuntimeError::TableIndexOutOfBounds(*table_idx))?;
                    let n = store.get_element(elemaddr)?.refs.len();
                    store.table_init(tableaddr, elemaddr, d, 0, n)?;
                    store.drop_element(elemaddr)?;
                }
                ElementMode::Declarative => store.drop_element(elemaddr)?,
                ElementMode::Passive => {}
            }
        }

        // Active data segments are bounds-checked, copied, and dropped.
        for (i, data) in module.data.iter().enumerate() {
            if let DataMode::Active { mem_idx, offset } = &data.mode {
                if *mem_idx != 0 {
                    return Err(InstantiationError::UnsupportedMemoryIndex(*mem_idx));
                }
                let d = offset_value(run_const_expr(store, &inst, offset)?)?;
                let memaddr = *inst.memaddrs.first().ok_or(RuntimeError::NoMemory)?;
                let dataaddr = inst.dataaddrs[i];
                let n = store.get_data(dataaddr)?.bytes.len();
                store.memory_init(memaddr, dataaddr, d, 0, n)?;
                store.drop_data(dataaddr)?;
            }
        }

        if let Some(start_idx) = module.start {
            let addr = *inst
                .funcaddrs
                .get(start_idx as usize)
                .ok_or(RuntimeError::FunctionIndexOutOfBounds(start_idx))?;
            log::debug!("invoking start function at addr {addr}");
            store.invoke_func(addr)?;
        }

        store.clear_stack();
        Ok(inst)
    }
}

/// Runs a constant expression in a transient zero-local frame and returns
/// its single result. Reuses the same sequential executor as function
/// bodies.
fn run_const_expr(
    store: &mut Store,
    inst: &Rc<ModuleInstance>,
    expr: &[Instruction],
) -> Result<Value, InstantiationError> {
    store.new_frame(Frame::new(1, Vec::new(), inst.clone()));
    store.push(StackEntry::Label(Label { arity: 1, continuation: expr.len() }));
    store.execute_seq(expr)?;
    let value = store.pop_value()?;
    store.clear_stack();
    Ok(value)
}

fn offset_value(value: Value) -> Result<usize, InstantiationError> {
    match value.as_i32() {
        Some(v) => Ok(v as u32 as usize),
        None => Err(InstantiationError::NonIntegerOffset(value.typ().to_string())),
    }
}
