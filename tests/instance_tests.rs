#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use wyrm::parser::module::{FuncType, ValueType};
    use wyrm::parser::parse;
    use wyrm::runtime::{
        ExternVal, FuncInstance, InstantiationError, ModuleInstance, Store, Value,
    };

    fn module_bytes(hex_sections: &str) -> Vec<u8> {
        let mut full = String::from("0061736d01000000");
        full.push_str(hex_sections);
        hex::decode(full).expect("bad test module hex")
    }

    /// One imported `() -> ()` function plus one local one; the local one is
    /// exported as "f".
    fn import_module() -> Vec<u8> {
        module_bytes(concat!(
            "010401600000",         // type 0: () -> ()
            "020801026e7301690000", // import ns.i: func type 0
            "03020100",             // one local function of type 0
            "07050101660001",      // export "f" -> func 1
            "0a040102000b",         // body: end
        ))
    }

    #[test]
    fn test_imported_addresses_come_first() {
        let module = parse(&import_module()).unwrap();
        let mut store = Store::new();
        // Burn a few addresses first so the import address is distinctive.
        store.add_func(FuncInstance::host(FuncType::default(), |_, _| Ok(())));
        store.add_func(FuncInstance::host(FuncType::default(), |_, _| Ok(())));
        let host = store.add_func(FuncInstance::host(FuncType::default(), |_, _| Ok(())));

        let instance =
            ModuleInstance::instantiate(&module, &[ExternVal::Func(host)], &mut store).unwrap();

        assert_eq!(instance.funcaddrs[0], host);
        assert_eq!(instance.funcaddrs.len(), 2);
        assert!(instance.funcaddrs[1] > host);
        let ExternVal::Func(exported) = *instance.export("f").unwrap() else {
            panic!("f is not a function");
        };
        assert_eq!(exported, instance.funcaddrs[1]);
    }

    #[test]
    fn test_import_count_mismatch() {
        let module = parse(&import_module()).unwrap();
        let mut store = Store::new();
        let err = ModuleInstance::instantiate(&module, &[], &mut store).unwrap_err();
        assert!(matches!(
            err,
            InstantiationError::ImportCountMismatch { expected: 1, actual: 0 }
        ));
    }

    #[test]
    fn test_import_type_mismatch() {
        let module = parse(&import_module()).unwrap();
        let mut store = Store::new();
        let wrong_sig = FuncType::new(vec![ValueType::I32], vec![]);
        let host = store.add_func(FuncInstance::host(wrong_sig, |_, _| Ok(())));
        let err = ModuleInstance::instantiate(&module, &[ExternVal::Func(host)], &mut store)
            .unwrap_err();
        assert!(matches!(err, InstantiationError::ImportTypeMismatch { .. }));
    }

    #[test]
    fn test_import_kind_mismatch() {
        let module = parse(&import_module()).unwrap();
        let mut store = Store::new();
        let global = store.add_global(wyrm::runtime::store::GlobalInstance {
            global_type: wyrm::parser::module::GlobalType {
                value_type: ValueType::I32,
                mutable: false,
            },
            value: Value::I32(0),
        });
        let err = ModuleInstance::instantiate(&module, &[ExternVal::Global(global)], &mut store)
            .unwrap_err();
        assert!(matches!(err, InstantiationError::ImportTypeMismatch { .. }));
    }

    #[test]
    fn test_global_initializer_runs() {
        // One immutable i32 global initialized to 7, exported as "g".
        let bytes = module_bytes(concat!(
            "0606017f0041070b", // global: i32, init `i32.const 7`
            "07050101670300",  // export "g" -> global 0
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let instance = ModuleInstance::instantiate(&module, &[], &mut store).unwrap();

        let ExternVal::Global(addr) = *instance.export("g").unwrap() else {
            panic!("g is not a global");
        };
        assert_eq!(store.get_global(addr).unwrap().value, Value::I32(7));
    }

    #[test]
    fn test_global_initializer_sees_imported_global() {
        // Imports an i32 global and defines one initialized from it.
        let bytes = module_bytes(concat!(
            "020901026e730167037f00", // import ns.g: global i32 immutable
            "0606017f0023000b",       // global: i32, init `global.get 0`
            "07050101670301",        // export "g" -> global 1
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let imported = store.add_global(wyrm::runtime::store::GlobalInstance {
            global_type: wyrm::parser::module::GlobalType {
                value_type: ValueType::I32,
                mutable: false,
            },
            value: Value::I32(41),
        });
        let instance =
            ModuleInstance::instantiate(&module, &[ExternVal::Global(imported)], &mut store)
                .unwrap();

        let ExternVal::Global(own) = *instance.export("g").unwrap() else {
            panic!("g is not a global");
        };
        assert_ne!(own, imported);
        assert_eq!(store.get_global(own).unwrap().value, Value::I32(41));
    }

    #[test]
    fn test_active_data_segment_copied() {
        // One page of memory exported as "m"; active data "hi" at offset 16.
        let bytes = module_bytes(concat!(
            "0503010001",         // memory: min 1 page
            "070501016d0200",    // export "m" -> memory 0
            "0b08010041100b026869", // data: active, offset `i32.const 16`, "hi"
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let instance = ModuleInstance::instantiate(&module, &[], &mut store).unwrap();

        let ExternVal::Mem(addr) = *instance.export("m").unwrap() else {
            panic!("m is not a memory");
        };
        let mem = store.get_mem(addr).unwrap();
        assert_eq!(mem.slice(16, 2).unwrap(), b"hi");
        assert_eq!(mem.read_u8(15).unwrap(), 0);
        assert_eq!(mem.read_u8(18).unwrap(), 0);
        // The active segment is dropped after the copy.
        assert!(store.get_data(instance.dataaddrs[0]).unwrap().bytes.is_empty());
    }

    #[test]
    fn test_active_data_segment_out_of_bounds_fails() {
        // Offset 65535 with two bytes exceeds the single page.
        let bytes = module_bytes(concat!(
            "0503010001",
            "0b0a010041ffff030b026869", // offset `i32.const 65535`, "hi"
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        assert!(ModuleInstance::instantiate(&module, &[], &mut store).is_err());
    }

    #[test]
    fn test_start_function_runs() {
        // The start function is the imported one.
        let bytes = module_bytes(concat!(
            "010401600000",         // type 0: () -> ()
            "020801026e7301690000", // import ns.i: func type 0
            "080100",              // start: func 0
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let host = store.add_func(FuncInstance::host(FuncType::default(), move |_, _| {
            flag.set(true);
            Ok(())
        }));
        ModuleInstance::instantiate(&module, &[ExternVal::Func(host)], &mut store).unwrap();
        assert!(ran.get());
    }

    #[test]
    fn test_end_to_end_if_else() {
        // (func (export "pick") (param i32) (result i32)
        //   local.get 0
        //   if (result i32) i32.const 10 else i32.const 20 end)
        let bytes = module_bytes(concat!(
            "01060160017f017f",
            "03020100",
            "070801047069636b0000",
            "0a0e010c002000047f410a0541140b0b",
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let instance = ModuleInstance::instantiate(&module, &[], &mut store).unwrap();
        let ExternVal::Func(addr) = *instance.export("pick").unwrap() else {
            panic!("pick is not a function");
        };

        store.push_value(Value::I32(1));
        store.invoke_func(addr).unwrap();
        assert_eq!(store.pop_value().unwrap(), Value::I32(10));

        store.push_value(Value::I32(0));
        store.invoke_func(addr).unwrap();
        assert_eq!(store.pop_value().unwrap(), Value::I32(20));
    }

    #[test]
    fn test_end_to_end_active_element_segment() {
        // (table 2 funcref)
        // (elem (i32.const 0) $f)
        // (func $f (result i32) i32.const 11)
        // (export "call" (func $c))
        // (func $c (param i32) (result i32) local.get 0 call_indirect (result i32))
        let bytes = module_bytes(concat!(
            "010a026000017f60017f017f", // types: ()->i32, (i32)->i32
            "0303020001",                // funcs: $f type 0, $c type 1
            "040401700002",              // table: funcref, min 2
            "0708010463616c6c0001",      // export "call" -> func 1
            "0907010041000b0100",         // elem: active, offset 0, funcs [0]
            "0a0e020400410b0b070020001100000b", // bodies
        ));
        let module = parse(&bytes).unwrap();
        let mut store = Store::new();
        let instance = ModuleInstance::instantiate(&module, &[], &mut store).unwrap();
        let ExternVal::Func(addr) = *instance.export("call").unwrap() else {
            panic!("call is not a function");
        };

        store.push_value(Value::I32(0));
        store.invoke_func(addr).unwrap();
        assert_eq!(store.pop_value().unwrap(), Value::I32(11));

        // Slot 1 was never filled by the segment.
        store.push_value(Value::I32(1));
        assert!(store.invoke_func(addr).is_err());
    }
}
