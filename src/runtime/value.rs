//! Runtime values and the three stack-entry variants.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fhex::ToHex;

use super::instance::ModuleInstance;
use crate::parser::module::ValueType;

/// A runtime value: a scalar or a reference. References hold the store
/// address of the entity they denote, or `None` for a null reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    FuncRef(Option<usize>),
    ExternRef(Option<usize>),
    V128([u8; 16]),
}

impl Value {
    /// The value's type tag.
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::FuncRef(_) => ValueType::FuncRef,
            Value::ExternRef(_) => ValueType::ExternRef,
            Value::V128(_) => ValueType::V128,
        }
    }

    /// The default (zero / null) value for a type, used for declared locals
    /// and globals before initialization.
    pub fn default_for(value_type: ValueType) -> Value {
        match value_type {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
            ValueType::FuncRef => Value::FuncRef(None),
            ValueType::ExternRef => Value::ExternRef(None),
            ValueType::V128 => Value::V128([0; 16]),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is a null reference. `false` for non-reference values.
    pub fn is_null_ref(&self) -> bool {
        matches!(self, Value::FuncRef(None) | Value::ExternRef(None))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::FuncRef(Some(a)) => write!(f, "funcref:{a}"),
            Value::FuncRef(None) => write!(f, "funcref:null"),
            Value::ExternRef(Some(a)) => write!(f, "externref:{a}"),
            Value::ExternRef(None) => write!(f, "externref:null"),
            Value::V128(bytes) => write!(f, "v128:{}", hex::encode(bytes)),
        }
    }
}

/// A branch target marker on the stack: the number of values a branch to it
/// carries forward, and the program counter to continue at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub arity: usize,
    pub continuation: usize,
}

/// A function activation. A frame's lifetime spans exactly one activation:
/// it is pushed by `invoke_func` and removed when the function returns or
/// falls off the end of its body.
///
/// The same frame is reachable both from the stack and as the store's
/// current-frame cache, so it lives behind `Rc<RefCell<_>>`.
#[derive(Debug)]
pub struct Frame {
    /// The function's declared result count.
    pub arity: usize,
    /// Parameters followed by declared locals.
    pub locals: Vec<Value>,
    /// The instance whose address arrays resolve this function's indices.
    pub module: Rc<ModuleInstance>,
    /// The current program counter within the function body.
    pub pc: usize,
    /// The frame below this one, restored when this activation ends.
    pub prev: Option<SharedFrame>,
}

pub type SharedFrame = Rc<RefCell<Frame>>;

impl Frame {
    pub fn new(arity: usize, locals: Vec<Value>, module: Rc<ModuleInstance>) -> Frame {
        Frame { arity, locals, module, pc: 0, prev: None }
    }
}

/// One entry on the single heterogeneous stack.
#[derive(Debug, Clone)]
pub enum StackEntry {
    Value(Value),
    Label(Label),
    Frame(SharedFrame),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_typ() {
        assert_eq!(Value::I32(42).typ(), ValueType::I32);
        assert_eq!(Value::I64(42).typ(), ValueType::I64);
        assert_eq!(Value::F32(4.2).typ(), ValueType::F32);
        assert_eq!(Value::FuncRef(None).typ(), ValueType::FuncRef);
    }

    #[test]
    fn test_value_defaults() {
        assert_eq!(Value::default_for(ValueType::I32), Value::I32(0));
        assert_eq!(Value::default_for(ValueType::F64), Value::F64(0.0));
        assert_eq!(Value::default_for(ValueType::FuncRef), Value::FuncRef(None));
        assert_eq!(Value::default_for(ValueType::ExternRef), Value::ExternRef(None));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::I32(42).as_i32(), Some(42));
        assert_eq!(Value::I32(42).as_i64(), None);
        assert_eq!(Value::F64(2.5).as_f64(), Some(2.5));
    }

    #[test]
    fn test_is_null_ref() {
        assert!(Value::FuncRef(None).is_null_ref());
        assert!(!Value::FuncRef(Some(3)).is_null_ref());
        assert!(!Value::I32(0).is_null_ref());
    }
}
