//! The store: owner of all runtime instances and the single operand/control
//! stack.
//!
//! Every instance (function, table, memory, global, data or element segment)
//! lives in one of the store's growable registries and is referenced
//! elsewhere only by its integer address: the index returned when it was
//! added. Addresses are never reused or invalidated while the store lives.
//!
//! The store also drives execution: [`Store::invoke_func`] sets up a frame
//! for one function activation and runs the sequential executor over its
//! flattened body.

use std::cell::RefCell;
use std::rc::Rc;

use super::instance::ModuleInstance;
use super::memory::MemInstance;
use super::ops;
use super::stack::Stack;
use super::table::TableInstance;
use super::value::{Frame, Label, SharedFrame, StackEntry, Value};
use super::RuntimeError;
use crate::parser::instruction::{Instruction, InstructionType};
use crate::parser::module::{FuncType, GlobalType, ValueType};

/// A host callback: receives the store and the call's popped argument values
/// (in parameter order) and pushes its own results.
pub type HostFn = dyn Fn(&mut Store, Vec<Value>) -> Result<(), RuntimeError>;

/// A function defined by a module: its signature, the instance whose address
/// arrays its body's indices resolve through, its declared local types, and
/// its flattened body.
pub struct ModuleFunc {
    pub func_type: FuncType,
    pub module: Rc<ModuleInstance>,
    pub locals: Vec<ValueType>,
    pub body: Rc<[Instruction]>,
}

/// A function supplied by the embedder.
pub struct HostFunc {
    pub func_type: FuncType,
    pub hostfunc: Rc<HostFn>,
}

/// A function instance in the store.
pub enum FuncInstance {
    Module(ModuleFunc),
    Host(HostFunc),
}

impl FuncInstance {
    pub fn func_type(&self) -> &FuncType {
        match self {
            FuncInstance::Module(f) => &f.func_type,
            FuncInstance::Host(f) => &f.func_type,
        }
    }

    /// Wraps a closure as a host function instance.
    pub fn host<F>(func_type: FuncType, f: F) -> FuncInstance
    where
        F: Fn(&mut Store, Vec<Value>) -> Result<(), RuntimeError> + 'static,
    {
        FuncInstance::Host(HostFunc { func_type, hostfunc: Rc::new(f) })
    }
}

/// A global variable instance. The value is only ever rewritten if the
/// declared type is mutable (enforced by validation, which is out of scope
/// here; the store itself does not police it).
#[derive(Debug, Clone)]
pub struct GlobalInstance {
    pub global_type: GlobalType,
    pub value: Value,
}

/// A data segment instance: a byte blob, droppable.
#[derive(Debug, Clone)]
pub struct DataInstance {
    pub bytes: Vec<u8>,
}

/// An element segment instance: a vector of reference values, droppable.
#[derive(Debug, Clone)]
pub struct ElemInstance {
    pub elem_type: ValueType,
    pub refs: Vec<Value>,
}

/// The shared runtime state one or more module instances execute against.
#[derive(Default)]
pub struct Store {
    stack: Stack,
    current_frame: Option<SharedFrame>,
    funcs: Vec<FuncInstance>,
    tables: Vec<TableInstance>,
    mems: Vec<MemInstance>,
    globals: Vec<GlobalInstance>,
    datas: Vec<DataInstance>,
    elements: Vec<ElemInstance>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            stack: Stack::new(),
            current_frame: None,
            funcs: Vec::new(),
            tables: Vec::new(),
            mems: Vec::new(),
            globals: Vec::new(),
            datas: Vec::new(),
            elements: Vec::new(),
        }
    }

    // ---- stack operations ----

    pub fn push(&mut self, entry: StackEntry) {
        self.stack.push(entry);
    }

    pub fn push_value(&mut self, value: Value) {
        self.stack.push(StackEntry::Value(value));
    }

    pub fn pop(&mut self) -> Result<StackEntry, RuntimeError> {
        self.stack.pop()
    }

    /// Pops an entry that must be a value.
    pub fn pop_value(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop()? {
            StackEntry::Value(v) => Ok(v),
            StackEntry::Label(_) => Err(RuntimeError::TypeMismatch {
                expected: "value".to_string(),
                actual: "label".to_string(),
            }),
            StackEntry::Frame(_) => Err(RuntimeError::TypeMismatch {
                expected: "value".to_string(),
                actual: "frame".to_string(),
            }),
        }
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        let value = self.pop_value()?;
        value.as_i32().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "i32".to_string(),
            actual: value.typ().to_string(),
        })
    }

    pub fn pop_u32(&mut self) -> Result<u32, RuntimeError> {
        Ok(self.pop_i32()? as u32)
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        let value = self.pop_value()?;
        value.as_i64().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "i64".to_string(),
            actual: value.typ().to_string(),
        })
    }

    pub fn pop_u64(&mut self) -> Result<u64, RuntimeError> {
        Ok(self.pop_i64()? as u64)
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        let value = self.pop_value()?;
        value.as_f32().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "f32".to_string(),
            actual: value.typ().to_string(),
        })
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        let value = self.pop_value()?;
        value.as_f64().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "f64".to_string(),
            actual: value.typ().to_string(),
        })
    }

    pub fn peek(&self) -> Option<&StackEntry> {
        self.stack.peek()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
        self.current_frame = None;
    }

    /// The n-th label from the top of the stack (0-based).
    pub fn nth_label(&self, n: usize) -> Result<Label, RuntimeError> {
        self.stack.nth_label(n)
    }

    // ---- frames ----

    /// The frame of the active function activation. Falls back to scanning
    /// the stack if no frame is cached.
    pub fn current_frame(&mut self) -> Result<SharedFrame, RuntimeError> {
        if self.current_frame.is_none() {
            self.current_frame = self.stack.topmost_frame();
        }
        self.current_frame.clone().ok_or(RuntimeError::NoActiveFrame)
    }

    /// Pushes `frame` onto the stack and makes it current, recording the
    /// previous frame as its back-reference.
    pub fn new_frame(&mut self, mut frame: Frame) {
        frame.prev = self.current_frame.clone();
        let frame = Rc::new(RefCell::new(frame));
        self.current_frame = Some(frame.clone());
        self.stack.push(StackEntry::Frame(frame));
    }

    pub(crate) fn increment_pc(&mut self) -> Result<(), RuntimeError> {
        self.current_frame()?.borrow_mut().pc += 1;
        Ok(())
    }

    pub(crate) fn set_pc(&mut self, pc: usize) -> Result<(), RuntimeError> {
        self.current_frame()?.borrow_mut().pc = pc;
        Ok(())
    }

    // ---- instance registries ----

    pub fn add_func(&mut self, func: FuncInstance) -> usize {
        self.funcs.push(func);
        self.funcs.len() - 1
    }

    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }

    pub fn get_func(&self, funcaddr: usize) -> Result<&FuncInstance, RuntimeError> {
        self.funcs.get(funcaddr).ok_or(RuntimeError::InvalidFunctionAddress(funcaddr))
    }

    pub fn add_table(&mut self, table: TableInstance) -> usize {
        self.tables.push(table);
        self.tables.len() - 1
    }

    pub fn get_table(&self, tableaddr: usize) -> Result<&TableInstance, RuntimeError> {
        self.tables.get(tableaddr).ok_or(RuntimeError::InvalidTableAddress(tableaddr))
    }

    pub fn get_table_mut(&mut self, tableaddr: usize) -> Result<&mut TableInstance, RuntimeError> {
        self.tables.get_mut(tableaddr).ok_or(RuntimeError::InvalidTableAddress(tableaddr))
    }

    pub fn add_mem(&mut self, mem: MemInstance) -> usize {
        self.mems.push(mem);
        self.mems.len() - 1
    }

    pub fn get_mem(&self, memaddr: usize) -> Result<&MemInstance, RuntimeError> {
        self.mems.get(memaddr).ok_or(RuntimeError::InvalidMemoryAddress(memaddr))
    }

    pub fn get_mem_mut(&mut self, memaddr: usize) -> Result<&mut MemInstance, RuntimeError> {
        self.mems.get_mut(memaddr).ok_or(RuntimeError::InvalidMemoryAddress(memaddr))
    }

    pub fn add_global(&mut self, global: GlobalInstance) -> usize {
        self.globals.push(global);
        self.globals.len() - 1
    }

    pub fn get_global(&self, globaladdr: usize) -> Result<&GlobalInstance, RuntimeError> {
        self.globals.get(globaladdr).ok_or(RuntimeError::InvalidGlobalAddress(globaladdr))
    }

    pub fn set_global(&mut self, globaladdr: usize, value: Value) -> Result<(), RuntimeError> {
        let global = self
            .globals
            .get_mut(globaladdr)
            .ok_or(RuntimeError::InvalidGlobalAddress(globaladdr))?;
        global.value = value;
        Ok(())
    }

    pub fn add_data(&mut self, data: DataInstance) -> usize {
        self.datas.push(data);
        self.datas.len() - 1
    }

    pub fn get_data(&self, dataaddr: usize) -> Result<&DataInstance, RuntimeError> {
        self.datas.get(dataaddr).ok_or(RuntimeError::InvalidDataAddress(dataaddr))
    }

    /// Drops a data segment, leaving an empty blob at its address.
    pub fn drop_data(&mut self, dataaddr: usize) -> Result<(), RuntimeError> {
        let data = self
            .datas
            .get_mut(dataaddr)
            .ok_or(RuntimeError::InvalidDataAddress(dataaddr))?;
        data.bytes = Vec::new();
        Ok(())
    }

    pub fn add_element(&mut self, element: ElemInstance) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn get_element(&self, elemaddr: usize) -> Result<&ElemInstance, RuntimeError> {
        self.elements.get(elemaddr).ok_or(RuntimeError::InvalidElementAddress(elemaddr))
    }

    pub fn get_element_mut(&mut self, elemaddr: usize) -> Result<&mut ElemInstance, RuntimeError> {
        self.elements.get_mut(elemaddr).ok_or(RuntimeError::InvalidElementAddress(elemaddr))
    }

    /// Drops an element segment, leaving an empty segment at its address.
    pub fn drop_element(&mut self, elemaddr: usize) -> Result<(), RuntimeError> {
        let element = self
            .elements
            .get_mut(elemaddr)
            .ok_or(RuntimeError::InvalidElementAddress(elemaddr))?;
        element.refs = Vec::new();
        Ok(())
    }

    // ---- bulk copies across registries ----

    /// Copies `[s, s+n)` of a data segment into memory at `d`. Bounds are
    /// checked on both sides before any byte is written.
    pub fn memory_init(
        &mut self,
        memaddr: usize,
        dataaddr: usize,
        d: usize,
        s: usize,
        n: usize,
    ) -> Result<(), RuntimeError> {
        let data = self.datas.get(dataaddr).ok_or(RuntimeError::InvalidDataAddress(dataaddr))?;
        let end = s.checked_add(n).ok_or(RuntimeError::OutOfBoundsMemoryAccess { offset: s, len: n })?;
        if end > data.bytes.len() {
            return Err(RuntimeError::OutOfBoundsMemoryAccess { offset: s, len: n });
        }
        let mem = self.mems.get_mut(memaddr).ok_or(RuntimeError::InvalidMemoryAddress(memaddr))?;
        mem.init(d, &data.bytes[s..end])
    }

    /// Copies `[s, s+n)` of an element segment into a table at `d`.
    pub fn table_init(
        &mut self,
        tableaddr: usize,
        elemaddr: usize,
        d: usize,
        s: usize,
        n: usize,
    ) -> Result<(), RuntimeError> {
        let element = self
            .elements
            .get(elemaddr)
            .ok_or(RuntimeError::InvalidElementAddress(elemaddr))?;
        let end = s.checked_add(n).ok_or(RuntimeError::OutOfBoundsTableAccess(s))?;
        if end > element.refs.len() {
            return Err(RuntimeError::OutOfBoundsTableAccess(end.saturating_sub(1)));
        }
        let table = self
            .tables
            .get_mut(tableaddr)
            .ok_or(RuntimeError::InvalidTableAddress(tableaddr))?;
        table.init(d, &element.refs[s..end])
    }

    /// Copies `n` entries from table `src` at `s` into table `dst` at `d`.
    pub fn table_copy(
        &mut self,
        dst: usize,
        src: usize,
        d: usize,
        s: usize,
        n: usize,
    ) -> Result<(), RuntimeError> {
        if dst == src {
            return self.get_table_mut(dst)?.copy_within(d, s, n);
        }
        let values = self.get_table(src)?.range(s, n)?.to_vec();
        self.get_table_mut(dst)?.init(d, &values)
    }

    // ---- execution ----

    /// Invokes the function at `funcaddr`, returning when it ends, returns,
    /// or traps. Exactly the function's declared result arity is left on top
    /// of the stack, with its frame and labels removed.
    ///
    /// Arguments are popped from the stack; the first (deepest) pushed
    /// argument binds to parameter 0. A host function's callback receives
    /// those arguments directly and pushes its own results.
    pub fn invoke_func(&mut self, funcaddr: usize) -> Result<(), RuntimeError> {
        enum Target {
            Host(Rc<HostFn>, usize),
            Module {
                module: Rc<ModuleInstance>,
                locals: Vec<ValueType>,
                body: Rc<[Instruction]>,
                n_params: usize,
                arity: usize,
            },
        }

        let target = match self.get_func(funcaddr)? {
            FuncInstance::Host(h) => Target::Host(h.hostfunc.clone(), h.func_type.parameters.len()),
            FuncInstance::Module(f) => Target::Module {
                module: f.module.clone(),
                locals: f.locals.clone(),
                body: f.body.clone(),
                n_params: f.func_type.parameters.len(),
                arity: f.func_type.results.len(),
            },
        };

        match target {
            Target::Host(hostfunc, n_params) => {
                log::trace!("invoking host func at addr {funcaddr}");
                let mut args = Vec::with_capacity(n_params);
                for _ in 0..n_params {
                    args.push(self.pop_value()?);
                }
                args.reverse();
                hostfunc(self, args)
            }
            Target::Module { module, locals, body, n_params, arity } => {
                log::trace!("invoking module func at addr {funcaddr}");
                let mut frame_locals = Vec::with_capacity(n_params + locals.len());
                for _ in 0..n_params {
                    frame_locals.push(self.pop_value()?);
                }
                frame_locals.reverse();
                frame_locals.extend(locals.iter().map(|t| Value::default_for(*t)));

                self.new_frame(Frame::new(arity, frame_locals, module));
                // Sentinel label: branching to it (or falling off the end)
                // lands one past the body.
                self.push(StackEntry::Label(Label { arity, continuation: body.len() }));
                self.execute_seq(&body)
            }
        }
    }

    /// Runs `body` until RETURN executes, the pc falls off the end, or an
    /// instruction errors; then unwinds the current activation.
    pub fn execute_seq(&mut self, body: &[Instruction]) -> Result<(), RuntimeError> {
        self.current_frame()?.borrow_mut().pc = 0;
        loop {
            let pc = self.current_frame()?.borrow().pc;
            if pc >= body.len() {
                break;
            }
            let instruction = &body[pc];
            if instruction.instruction_type == InstructionType::Return {
                break;
            }
            ops::eval(self, instruction)?;
        }
        self.unwind_frame()
    }

    /// Pops the current activation: saves the frame's arity of result
    /// values, discards everything up to and including the frame (any
    /// remaining labels included), restores the previous frame, and pushes
    /// the results back.
    pub(crate) fn unwind_frame(&mut self) -> Result<(), RuntimeError> {
        let frame = self.current_frame()?;
        let arity = frame.borrow().arity;
        let mut results = Vec::with_capacity(arity);
        for _ in 0..arity {
            results.push(self.pop_value()?);
        }
        loop {
            if let StackEntry::Frame(popped) = self.stack.pop()? {
                self.current_frame = popped.borrow().prev.clone();
                break;
            }
        }
        for value in results.into_iter().rev() {
            self.push_value(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_pops() {
        let mut store = Store::new();
        store.push_value(Value::I32(42));
        assert_eq!(store.pop_i32().unwrap(), 42);

        store.push_value(Value::I64(-1));
        assert_eq!(store.pop_u64().unwrap(), u64::MAX);

        store.push_value(Value::F32(1.5));
        assert!(matches!(store.pop_i32(), Err(RuntimeError::TypeMismatch { .. })));
    }

    #[test]
    fn test_addresses_are_append_only() {
        let mut store = Store::new();
        let a = store.add_global(GlobalInstance {
            global_type: GlobalType { value_type: crate::parser::module::ValueType::I32, mutable: true },
            value: Value::I32(1),
        });
        let b = store.add_global(GlobalInstance {
            global_type: GlobalType { value_type: crate::parser::module::ValueType::I32, mutable: true },
            value: Value::I32(2),
        });
        assert_eq!((a, b), (0, 1));
        store.set_global(a, Value::I32(10)).unwrap();
        assert_eq!(store.get_global(a).unwrap().value, Value::I32(10));
        assert_eq!(store.get_global(b).unwrap().value, Value::I32(2));
    }

    #[test]
    fn test_drop_data_leaves_empty_blob() {
        let mut store = Store::new();
        let addr = store.add_data(DataInstance { bytes: vec![1, 2, 3] });
        store.drop_data(addr).unwrap();
        assert!(store.get_data(addr).unwrap().bytes.is_empty());
        // A subsequent init from the dropped segment traps.
        store.add_mem(MemInstance::new(1, None).unwrap());
        assert!(store.memory_init(0, addr, 0, 0, 1).is_err());
    }

    #[test]
    fn test_memory_init_bounds_checked_before_write() {
        let mut store = Store::new();
        let data = store.add_data(DataInstance { bytes: vec![9, 9] });
        let mem = store.add_mem(MemInstance::new(1, None).unwrap());
        assert!(store.memory_init(mem, data, 0, 1, 2).is_err());
        assert_eq!(store.get_mem(mem).unwrap().read_u8(0).unwrap(), 0);
    }
}
