//! External values: the runtime representation of anything that can cross
//! the import/export boundary, and the type matching applied when linking
//! imports.

use super::store::Store;
use super::RuntimeError;
use crate::parser::module::{ExternalType, ImportDesc, Limits, MemType};

/// The address of an importable/exportable entity in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    Func(usize),
    Table(usize),
    Mem(usize),
    Global(usize),
}

impl ExternVal {
    pub fn as_func(&self) -> Option<usize> {
        match self {
            ExternVal::Func(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_mem(&self) -> Option<usize> {
        match self {
            ExternVal::Mem(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<usize> {
        match self {
            ExternVal::Global(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<usize> {
        match self {
            ExternVal::Table(addr) => Some(*addr),
            _ => None,
        }
    }
}

/// Resolves the concrete external type of `val` by looking the entity up in
/// the store.
pub fn extern_type(store: &Store, val: &ExternVal) -> Result<ExternalType, RuntimeError> {
    match val {
        ExternVal::Func(addr) => Ok(ExternalType::Func(store.get_func(*addr)?.func_type().clone())),
        ExternVal::Table(addr) => {
            Ok(ExternalType::Table(store.get_table(*addr)?.table_type().clone()))
        }
        ExternVal::Mem(addr) => {
            let mem = store.get_mem(*addr)?;
            Ok(ExternalType::Mem(MemType {
                limits: Limits { min: mem.size_pages(), max: mem.max_pages() },
            }))
        }
        ExternVal::Global(addr) => {
            Ok(ExternalType::Global(store.get_global(*addr)?.global_type.clone()))
        }
    }
}

/// Whether an entity of resolved type `actual` satisfies the declared import
/// descriptor. Function and global types match structurally; table and
/// memory limits match when the actual minimum is at least the declared one
/// and the actual maximum fits under the declared one (if any).
pub fn matches_import(actual: &ExternalType, declared: &ImportDesc) -> bool {
    match (actual, declared) {
        (ExternalType::Func(actual), ImportDesc::Func(declared)) => actual == declared,
        (ExternalType::Table(actual), ImportDesc::Table(declared)) => {
            actual.ref_type == declared.ref_type && actual.limits.satisfies(&declared.limits)
        }
        (ExternalType::Mem(actual), ImportDesc::Mem(declared)) => {
            actual.limits.satisfies(&declared.limits)
        }
        (ExternalType::Global(actual), ImportDesc::Global(declared)) => actual == declared,
        _ => false,
    }
}
