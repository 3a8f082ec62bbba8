//! A WebAssembly binary decoder and stack-machine interpreter.
//!
//! wyrm reads a `.wasm` binary into an immutable [`parser::module::Module`],
//! instantiates it against a shared [`runtime::Store`], and executes its
//! functions deterministically with a single-threaded stack-machine
//! evaluator.
//!
//! # Modules
//!
//! - [`parser`] -- Binary format decoder: section reading, the instruction
//!   model, and the control-flow flattening pass that assigns every
//!   instruction a linear program counter with precomputed branch targets.
//! - [`runtime`] -- The store, module instantiation (import linking, global
//!   initializers, active segment copies), and the instruction evaluator.
//!
//! # Example
//!
//! Decode a module, instantiate it, and call an exported function:
//!
//! ```
//! use wyrm::parser;
//! use wyrm::runtime::{ExternVal, ModuleInstance, Store, Value};
//!
//! // (module
//! //   (func (export "add") (param i32 i32) (result i32)
//! //     local.get 0
//! //     local.get 1
//! //     i32.add))
//! let bytes = hex::decode(concat!(
//!     "0061736d01000000",
//!     "01070160027f7f017f",
//!     "03020100",
//!     "070701036164640000",
//!     "0a09010700200020016a0b",
//! ))
//! .unwrap();
//!
//! let module = parser::parse(&bytes).unwrap();
//! let mut store = Store::new();
//! let instance = ModuleInstance::instantiate(&module, &[], &mut store).unwrap();
//!
//! let ExternVal::Func(addr) = *instance.export("add").unwrap() else {
//!     panic!("add is not a function");
//! };
//! store.push_value(Value::I32(2));
//! store.push_value(Value::I32(3));
//! store.invoke_func(addr).unwrap();
//! assert_eq!(store.pop_value().unwrap(), Value::I32(5));
//! ```
//!
//! Host imports are bound by adding host functions to the store and passing
//! their addresses (one [`runtime::ExternVal`] per import, in import
//! declaration order) to [`runtime::ModuleInstance::instantiate`].

pub mod parser;
pub mod runtime;
