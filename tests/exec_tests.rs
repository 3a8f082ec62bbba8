#[cfg(test)]
mod tests {
    use rstest::rstest;
    use wyrm::parser::instruction::{Instruction, InstructionType, Operands};
    use wyrm::parser::module::{FuncType, ValueType};
    use wyrm::runtime::test_utils::*;
    use wyrm::runtime::{FuncInstance, RuntimeError, Store, Value};

    /// Builds a machine with a single `() -> i32` function (one i32 local)
    /// and invokes it.
    fn run_i32_func(body: Vec<Instruction>) -> Result<(Value, usize), RuntimeError> {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(ty, vec![ValueType::I32], body);
        let mut machine = builder.build();
        machine.invoke(f, &[])?;
        let depth = machine.store.stack_depth();
        Ok((machine.pop(), depth))
    }

    #[rstest]
    #[case::add(InstructionType::I32Add, 2, 1, 3)]
    #[case::add_mods(InstructionType::I32Add, 0xFEDC0000u32 as i32, 0x56780000, 0x55540000)]
    #[case::mul(InstructionType::I32Mul, 2, 3, 6)]
    #[case::mul_mods(
        InstructionType::I32Mul,
        0xFEDC1234u32 as i32,
        0x56789ABCu32 as i32,
        0x8CF0A630u32 as i32
    )]
    #[case::sub(InstructionType::I32Sub, 2, 1, 1)]
    #[case::sub_mods(
        InstructionType::I32Sub,
        0x00001234,
        0x56789ABCu32 as i32,
        0xA9877778u32 as i32
    )]
    #[case::div_u(InstructionType::I32DivU, 6, 2, 3)]
    #[case::div_u_rounds_down(InstructionType::I32DivU, 99, 100, 0)]
    #[case::rem_u(InstructionType::I32RemU, 101, 100, 1)]
    #[case::div_s_neg(InstructionType::I32DivS, -6, 2, -3)]
    #[case::div_s_both_neg(InstructionType::I32DivS, -6, -2, 3)]
    #[case::rem_s_neg(InstructionType::I32RemS, -13, 3, -1)]
    #[case::rem_s_neg_divisor(InstructionType::I32RemS, 13, -3, 1)]
    #[case::and(InstructionType::I32And, 0xFF00FF00u32 as i32, 0x12345678, 0x12005600)]
    #[case::or(
        InstructionType::I32Or,
        0xFF00FF00u32 as i32,
        0x12345678,
        0xFF34FF78u32 as i32
    )]
    #[case::xor(
        InstructionType::I32Xor,
        0xFF00FF00u32 as i32,
        0xFFFF0000u32 as i32,
        0x00FFFF00
    )]
    #[case::shl(InstructionType::I32Shl, 1, 33, 2)]
    #[case::shr_s(InstructionType::I32ShrS, -8, 1, -4)]
    #[case::shr_u(InstructionType::I32ShrU, -8, 1, 0x7FFFFFFC)]
    #[case::rotl(InstructionType::I32Rotl, 0x80000001u32 as i32, 1, 3)]
    #[case::rotr(InstructionType::I32Rotr, 3, 1, 0x80000001u32 as i32)]
    fn test_i32_binops(
        #[case] op: InstructionType,
        #[case] c1: i32,
        #[case] c2: i32,
        #[case] expected: i32,
    ) {
        let (result, _) = run_i32_func(vec![i32_const(c1), i32_const(c2), noarg(op)]).unwrap();
        assert_eq!(result, Value::I32(expected));
    }

    #[rstest]
    #[case::lt_u_small(InstructionType::I32LtU, 1, 2, 1)]
    #[case::lt_u_eq(InstructionType::I32LtU, 1, 1, 0)]
    #[case::lt_u_negatives(InstructionType::I32LtU, -2, -1, 1)]
    #[case::lt_u_neg_vs_pos(InstructionType::I32LtU, -1, 1, 0)]
    #[case::gt_u(InstructionType::I32GtU, -1, 1, 1)]
    #[case::lt_s(InstructionType::I32LtS, -1, 1, 1)]
    #[case::ge_u(InstructionType::I32GeU, -1, -1, 1)]
    #[case::le_s(InstructionType::I32LeS, -2, -1, 1)]
    #[case::eq(InstructionType::I32Eq, 7, 7, 1)]
    #[case::ne(InstructionType::I32Ne, 7, 7, 0)]
    fn test_i32_comparisons(
        #[case] op: InstructionType,
        #[case] c1: i32,
        #[case] c2: i32,
        #[case] expected: i32,
    ) {
        let (result, _) = run_i32_func(vec![i32_const(c1), i32_const(c2), noarg(op)]).unwrap();
        assert_eq!(result, Value::I32(expected));
    }

    #[test]
    fn test_i32_eqz() {
        let (result, _) =
            run_i32_func(vec![i32_const(0), noarg(InstructionType::I32Eqz)]).unwrap();
        assert_eq!(result, Value::I32(1));
    }

    #[test]
    fn test_division_traps() {
        let err = run_i32_func(vec![i32_const(1), i32_const(0), noarg(InstructionType::I32DivS)])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));

        let err = run_i32_func(vec![
            i32_const(i32::MIN),
            i32_const(-1),
            noarg(InstructionType::I32DivS),
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::IntegerOverflow));
    }

    #[test]
    fn test_unreachable_traps() {
        let err = run_i32_func(vec![noarg(InstructionType::Unreachable)]).unwrap_err();
        assert!(matches!(err, RuntimeError::Unreachable));
    }

    #[test]
    fn test_i64_arith() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I64]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i64_const(0xFEDC000000000000u64 as i64),
                i64_const(0x5678000000000000),
                noarg(InstructionType::I64Add),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I64(0x5554000000000000));
    }

    #[test]
    fn test_f64_arith_and_compare() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                f64_const(1.5),
                f64_const(2.25),
                noarg(InstructionType::F64Add),
                f64_const(3.75),
                noarg(InstructionType::F64Eq),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(1));
    }

    #[test]
    fn test_f32_conversion_round_trip() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                f32_const(-2.75),
                noarg(InstructionType::I32TruncF32S),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(-2));
    }

    #[test]
    fn test_trunc_nan_traps_but_sat_does_not() {
        let err = run_i32_func(vec![f32_const(f32::NAN), noarg(InstructionType::I32TruncF32S)])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConversionToInteger));

        let (result, _) =
            run_i32_func(vec![f32_const(f32::NAN), noarg(InstructionType::I32TruncSatF32S)])
                .unwrap();
        assert_eq!(result, Value::I32(0));
    }

    #[test]
    fn test_locals_and_select() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i32_const(10),
                i32_const(20),
                local_get(0),
                noarg(InstructionType::Select),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[Value::I32(1)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(10));
        machine.invoke(f, &[Value::I32(0)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(20));
    }

    #[test]
    fn test_block_br_carries_result() {
        let (result, depth) = run_i32_func(vec![i32_block(vec![
            i32_const(1),
            br(0),
            i32_const(99),
        ])])
        .unwrap();
        assert_eq!(result, Value::I32(1));
        assert_eq!(depth, 1);
    }

    #[test]
    fn test_loop_br_exits_through_outer_block() {
        let mut builder = TestModuleBuilder::new();
        let loop_ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![i32_block(vec![
                i32_const(1),
                typed_loop(
                    loop_ty,
                    vec![i32_const(2), noarg(InstructionType::I32Add), br(1)],
                ),
            ])],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.store.stack_depth(), 1);
        assert_eq!(machine.pop(), Value::I32(3));
    }

    /// Increment a local by 2 starting at 1 until it reaches 10: the br_if
    /// target of a loop is the loop header, not its exit.
    #[test]
    fn test_loop_continue_targets_header() {
        let mut builder = TestModuleBuilder::new();
        let void_ty = builder.add_func_type(vec![], vec![]);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![ValueType::I32],
            vec![
                i32_const(1),
                local_set(0),
                typed_loop(
                    void_ty,
                    vec![
                        local_get(0),
                        i32_const(2),
                        noarg(InstructionType::I32Add),
                        local_tee(0),
                        i32_const(10),
                        noarg(InstructionType::I32LtU),
                        br_if(0),
                    ],
                ),
                local_get(0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.store.stack_depth(), 1);
        assert_eq!(machine.pop(), Value::I32(11));
    }

    #[test]
    fn test_loop_continue_from_inner_block() {
        let mut builder = TestModuleBuilder::new();
        let void_ty = builder.add_func_type(vec![], vec![]);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![ValueType::I32],
            vec![
                i32_const(1),
                local_set(0),
                typed_loop(
                    void_ty,
                    vec![
                        local_get(0),
                        i32_const(2),
                        noarg(InstructionType::I32Add),
                        local_set(0),
                        void_block(vec![
                            local_get(0),
                            i32_const(10),
                            noarg(InstructionType::I32LtU),
                            br_if(1),
                        ]),
                    ],
                ),
                local_get(0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(11));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(2, 3)]
    #[case(7, 3)]
    fn test_br_table_dispatch(#[case] selector: i32, #[case] expected: i32) {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                void_block(vec![
                    void_block(vec![
                        void_block(vec![local_get(0), br_table(&[0, 1, 2])]),
                        i32_const(1),
                        noarg(InstructionType::Return),
                    ]),
                    i32_const(2),
                    noarg(InstructionType::Return),
                ]),
                i32_const(3),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[Value::I32(selector)]).unwrap();
        assert_eq!(machine.store.stack_depth(), 1);
        assert_eq!(machine.pop(), Value::I32(expected));
    }

    #[test]
    fn test_if_else_both_paths() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                local_get(0),
                if_else_i32(vec![i32_const(10)], vec![i32_const(20)]),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[Value::I32(1)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(10));
        machine.invoke(f, &[Value::I32(0)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(20));
    }

    #[test]
    fn test_if_without_else_skips_body() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![ValueType::I32],
            vec![
                local_get(0),
                if_void(vec![i32_const(5), local_set(1)]),
                local_get(1),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[Value::I32(1)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(5));
        machine.invoke(f, &[Value::I32(0)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(0));
    }

    #[test]
    fn test_call_resumes_after_falling_off_callee_end() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let callee = builder.add_func(ty, vec![], vec![i32_const(1)]);
        let caller = builder.add_func(
            ty,
            vec![],
            vec![i32_const(2), call(callee), noarg(InstructionType::I32Add)],
        );
        let mut machine = builder.build();
        machine.invoke(caller, &[]).unwrap();
        assert_eq!(machine.store.stack_depth(), 1);
        assert_eq!(machine.pop(), Value::I32(3));
    }

    #[test]
    fn test_call_with_explicit_return() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let callee = builder.add_func(
            ty,
            vec![],
            vec![i32_const(1), noarg(InstructionType::Return), i32_const(99)],
        );
        let caller = builder.add_func(
            ty,
            vec![],
            vec![i32_const(2), call(callee), noarg(InstructionType::I32Add)],
        );
        let mut machine = builder.build();
        machine.invoke(caller, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(3));
    }

    /// local 0 binds the first pushed argument.
    #[test]
    fn test_call_args_ordered_correctly() {
        let mut builder = TestModuleBuilder::new();
        let binary_ty = builder.add_func_type(
            vec![ValueType::I32, ValueType::I32],
            vec![ValueType::I32],
        );
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let callee = builder.add_func(
            binary_ty,
            vec![],
            vec![local_get(0), local_get(1), noarg(InstructionType::I32Sub)],
        );
        let caller =
            builder.add_func(ty, vec![], vec![i32_const(3), i32_const(2), call(callee)]);
        let mut machine = builder.build();
        machine.invoke(caller, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(1));
    }

    #[test]
    fn test_callee_locals_do_not_leak() {
        let mut builder = TestModuleBuilder::new();
        let unary_ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let callee = builder.add_func(
            unary_ty,
            vec![ValueType::I32],
            vec![
                i32_const(1000),
                local_set(1),
                local_get(0),
                i32_const(1),
                noarg(InstructionType::I32Add),
            ],
        );
        let caller = builder.add_func(ty, vec![], vec![i32_const(2), call(callee)]);
        let mut machine = builder.build();
        machine.invoke(caller, &[]).unwrap();
        assert_eq!(machine.store.stack_depth(), 1);
        assert_eq!(machine.pop(), Value::I32(3));
    }

    #[test]
    fn test_memory_store_load_byte_exact() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i32_const(8),
                i32_const(0x12345678),
                u32x2_op(InstructionType::I32Store, 2, 0),
                i32_const(8),
                u32x2_op(InstructionType::I32Load8U, 0, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        // Little-endian: lowest byte first.
        assert_eq!(machine.pop(), Value::I32(0x78));
    }

    #[test]
    fn test_memory_load_sign_extension() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i32_const(0),
                i32_const(0x80),
                u32x2_op(InstructionType::I32Store8, 0, 0),
                i32_const(0),
                u32x2_op(InstructionType::I32Load8S, 0, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(-128));
    }

    #[test]
    fn test_memory_bounds() {
        // A 4-byte load at base 65535 straddles the end of a one-page memory.
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![i32_const(65535), u32x2_op(InstructionType::I32Load, 2, 0)],
        );
        let mut machine = builder.build();
        let err = machine.invoke(f, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::OutOfBoundsMemoryAccess { .. }));

        // The last valid 4-byte slot round-trips byte-exactly.
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i32_const(65532),
                i32_const(0x0A0B0C0Du32 as i32),
                u32x2_op(InstructionType::I32Store, 2, 0),
                i32_const(65532),
                u32x2_op(InstructionType::I32Load, 2, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(0x0A0B0C0D));
    }

    #[test]
    fn test_memory_effective_address_includes_static_offset() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        // base 65533 + offset 3 straddles the end even though both fit alone.
        let f = builder.add_func(
            ty,
            vec![],
            vec![i32_const(65533), u32x2_op(InstructionType::I32Load, 2, 3)],
        );
        let mut machine = builder.build();
        assert!(machine.invoke(f, &[]).is_err());
    }

    #[test]
    fn test_memory_size_and_grow() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                i32_const(2),
                u32_op(InstructionType::MemoryGrow, 0),
                noarg(InstructionType::Drop),
                u32_op(InstructionType::MemorySize, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(3));
    }

    #[test]
    fn test_memory_init_and_data_drop() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let data = builder.add_data(vec![0xAA, 0xBB, 0xCC]);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                // dest, src, len
                i32_const(4),
                i32_const(1),
                i32_const(2),
                u32x2_op(InstructionType::MemoryInit, data, 0),
                i32_const(4),
                u32x2_op(InstructionType::I32Load16U, 0, 0),
            ],
        );
        let dropper = builder.add_func(
            ty,
            vec![],
            vec![
                u32_op(InstructionType::DataDrop, data),
                i32_const(0),
                i32_const(0),
                i32_const(1),
                u32x2_op(InstructionType::MemoryInit, data, 0),
                i32_const(0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(0xCCBB));

        let err = machine.invoke(dropper, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::OutOfBoundsMemoryAccess { .. }));
    }

    #[test]
    fn test_memory_copy_and_fill() {
        let mut builder = TestModuleBuilder::new();
        builder.with_memory(1);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                // fill [0, 4) with 0x55
                i32_const(0),
                i32_const(0x55),
                i32_const(4),
                u32_op(InstructionType::MemoryFill, 0),
                // copy [0, 4) to [8, 12)
                i32_const(8),
                i32_const(0),
                i32_const(4),
                u32x2_op(InstructionType::MemoryCopy, 0, 0),
                i32_const(8),
                u32x2_op(InstructionType::I32Load, 2, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(0x55555555));
    }

    #[test]
    fn test_globals() {
        let mut builder = TestModuleBuilder::new();
        let g = builder.add_global(ValueType::I32, true, Value::I32(5));
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                global_get(g),
                i32_const(1),
                noarg(InstructionType::I32Add),
                global_set(g),
                global_get(g),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(6));
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(7));
    }

    #[test]
    fn test_ref_func_and_ref_is_null() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![u32_op(InstructionType::RefFunc, 0), noarg(InstructionType::RefIsNull)],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(0));
    }

    fn call_indirect_machine() -> (TestMachine, u32) {
        let mut builder = TestModuleBuilder::new();
        builder.with_table(4);
        let i32_ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let dispatch_ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f11 = builder.add_func(i32_ty, vec![], vec![i32_const(11)]);
        let f12 = builder.add_func(i32_ty, vec![], vec![i32_const(12)]);
        let elem = builder.add_element(&[f11, f12]);
        let dispatcher = builder.add_func(
            dispatch_ty,
            vec![],
            vec![
                // copy both refs into the table
                i32_const(0),
                i32_const(0),
                i32_const(2),
                u32x2_op(InstructionType::TableInit, elem, 0),
                local_get(0),
                call_indirect(i32_ty, 0),
            ],
        );
        (builder.build(), dispatcher)
    }

    #[test]
    fn test_call_indirect_dispatch() {
        let (mut machine, dispatcher) = call_indirect_machine();
        machine.invoke(dispatcher, &[Value::I32(0)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(11));
        machine.invoke(dispatcher, &[Value::I32(1)]).unwrap();
        assert_eq!(machine.pop(), Value::I32(12));
    }

    #[test]
    fn test_call_indirect_null_and_out_of_range() {
        let (mut machine, dispatcher) = call_indirect_machine();
        // Slot 2 was never initialized.
        let err = machine.invoke(dispatcher, &[Value::I32(2)]).unwrap_err();
        assert!(matches!(err, RuntimeError::UninitializedElement(2)));

        let (mut machine, dispatcher) = call_indirect_machine();
        let err = machine.invoke(dispatcher, &[Value::I32(9)]).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedElement(9)));
    }

    #[test]
    fn test_call_indirect_signature_mismatch() {
        let mut builder = TestModuleBuilder::new();
        builder.with_table(1);
        let i32_ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let other_ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(i32_ty, vec![], vec![i32_const(11)]);
        let elem = builder.add_element(&[f]);
        let caller = builder.add_func(
            i32_ty,
            vec![],
            vec![
                i32_const(0),
                i32_const(0),
                i32_const(1),
                u32x2_op(InstructionType::TableInit, elem, 0),
                i32_const(0), // dummy argument for the mismatched signature
                i32_const(0),
                call_indirect(other_ty, 0),
            ],
        );
        let mut machine = builder.build();
        let err = machine.invoke(caller, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::IndirectCallTypeMismatch { .. }));
    }

    #[test]
    fn test_table_grow_fill_get_size() {
        let mut builder = TestModuleBuilder::new();
        builder.with_table(2);
        let ty = builder.add_func_type(vec![], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![
                // grow by 2 with ref.func 0 as the fill value
                u32_op(InstructionType::RefFunc, 0),
                i32_const(2),
                u32_op(InstructionType::TableGrow, 0),
                noarg(InstructionType::Drop),
                // fill [0, 2) with ref.func 0
                i32_const(0),
                u32_op(InstructionType::RefFunc, 0),
                i32_const(2),
                u32_op(InstructionType::TableFill, 0),
                // a fetched entry is non-null now
                i32_const(3),
                u32_op(InstructionType::TableGet, 0),
                noarg(InstructionType::RefIsNull),
                noarg(InstructionType::Drop),
                u32_op(InstructionType::TableSize, 0),
            ],
        );
        let mut machine = builder.build();
        machine.invoke(f, &[]).unwrap();
        assert_eq!(machine.pop(), Value::I32(4));
    }

    #[test]
    fn test_host_function_receives_args_and_pushes_results() {
        let mut store = Store::new();
        let sig = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
        let addr = store.add_func(FuncInstance::host(sig, |store, args| {
            let a = args[0].as_i32().unwrap();
            let b = args[1].as_i32().unwrap();
            store.push_value(Value::I32(a * 10 + b));
            Ok(())
        }));

        store.push_value(Value::I32(3));
        store.push_value(Value::I32(4));
        store.invoke_func(addr).unwrap();
        assert_eq!(store.pop_value().unwrap(), Value::I32(34));
    }

    #[test]
    fn test_unimplemented_instruction_is_distinguishable() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![], vec![]);
        let f = builder.add_func(
            ty,
            vec![],
            vec![Instruction::new(InstructionType::V128Const, Operands::U64(0))],
        );
        let mut machine = builder.build();
        let err = machine.invoke(f, &[]).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UnimplementedInstruction(InstructionType::V128Const)
        ));
    }

    /// Any balanced body leaves exactly the declared result arity behind.
    #[test]
    fn test_stack_balanced_after_invoke() {
        let mut builder = TestModuleBuilder::new();
        let ty = builder.add_func_type(vec![ValueType::I32], vec![ValueType::I32]);
        let f = builder.add_func(
            ty,
            vec![ValueType::I32],
            vec![
                void_block(vec![void_block(vec![local_get(0), br_if(1)])]),
                local_get(0),
            ],
        );
        let mut machine = builder.build();
        let before = machine.store.stack_depth();
        machine.invoke(f, &[Value::I32(1)]).unwrap();
        assert_eq!(machine.store.stack_depth(), before + 1);
        machine.pop();
    }
}
