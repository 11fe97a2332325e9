//! End-to-end decompiler tests on complete programs

mod common;

use common::{divisor_sum, DIVISOR_SUM, DIVISOR_SUM_WITH_SETUP, DUPLICATED_STORE};
use elfcode::decompiler::{
    BinOp, BinaryExpr, DeadStorePolicy, Expr, LineNumbers, StructureRecovery,
    DEFAULT_VERIFY_STEP_LIMIT,
};
use elfcode::{
    DecompileOptions, DecompileResult, Decompiler, Error, Interpreter, IrExecutor, IrNode,
    Pattern, Program, Reg,
};

// ============================================================================
// Helpers
// ============================================================================

fn reg(index: u8) -> Expr {
    Expr::Register(Reg::new(index as usize).unwrap())
}

fn cond(op: BinOp, lhs: Expr, rhs: Expr) -> BinaryExpr {
    BinaryExpr::new(op, lhs, rhs)
}

fn compound(op: BinOp, dest: u8, value: Expr) -> IrNode {
    IrNode::CompoundAssignment {
        op,
        dest: Reg::new(dest as usize).unwrap(),
        value,
    }
}

fn assign(dest: u8, value: Expr) -> IrNode {
    IrNode::Assignment {
        dest: Reg::new(dest as usize).unwrap(),
        value,
    }
}

/// `for (r1 = 1; !(r1 > r2); r1++) for (r5 = 1; ...) { ... }`
fn divisor_loops() -> IrNode {
    IrNode::ForLoop {
        var: Reg::R1,
        init: Expr::Literal(1),
        cond: cond(BinOp::Gt, reg(1), reg(2)),
        body: vec![IrNode::ForLoop {
            var: Reg::R5,
            init: Expr::Literal(1),
            cond: cond(BinOp::Gt, reg(5), reg(2)),
            body: vec![
                assign(3, Expr::binary(BinOp::Mul, reg(1), reg(5))),
                IrNode::IfStatement {
                    cond: cond(BinOp::Eq, reg(3), reg(2)),
                    body: vec![compound(BinOp::Add, 0, reg(1))],
                },
            ],
        }],
    }
}

fn decompile(source: &str) -> (Program, DecompileResult) {
    let program = Program::parse(source).unwrap();
    let result = Decompiler::default().decompile(&program).unwrap();
    (program, result)
}

// ============================================================================
// Divisor sum
// ============================================================================

#[test]
fn test_divisor_sum_fully_structured() {
    let (_, result) = decompile(DIVISOR_SUM);

    assert_eq!(result.nodes, vec![divisor_loops(), IrNode::End]);
    assert!(result.is_fully_structured());
}

#[test]
fn test_divisor_sum_report() {
    let (_, result) = decompile(DIVISOR_SUM);

    assert_eq!(result.report.count(Pattern::IfElseFusion), 3);
    assert_eq!(result.report.count(Pattern::SingleIf), 1);
    assert_eq!(result.report.count(Pattern::DoWhile), 2);
    assert_eq!(result.report.count(Pattern::ForLoop), 2);
    assert_eq!(result.report.total(), 8);
    assert_eq!(result.report.passes, 9);
}

#[test]
fn test_divisor_sum_source() {
    let (_, result) = decompile(DIVISOR_SUM);

    assert_eq!(
        result.source,
        "// Decompiled elfcode (#ip 4)\n\
         for (r1 = 1; !(r1 > r2); r1++) {\n\
         \x20   for (r5 = 1; !(r5 > r2); r5++) {\n\
         \x20       r3 = r1 * r5;\n\
         \x20       if (r3 == r2) {\n\
         \x20           r0 += r1;\n\
         \x20       }\n\
         \x20   }\n\
         }\n\
         end;\n"
    );
}

#[test]
fn test_divisor_sum_warnings() {
    let (_, result) = decompile(DIVISOR_SUM);

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("mulr 4 4 4"));
}

#[test]
fn test_divisor_sum_equivalence() {
    let (program, result) = decompile(DIVISOR_SUM);
    let decompiler = Decompiler::default();

    for n in [1, 2, 7, 10, 12, 36] {
        assert!(decompiler
            .verify(&program, &result, [0, 0, n, 0, 0, 0])
            .unwrap());
        assert_eq!(
            IrExecutor::new(Reg::R4)
                .run_register_zero(&result.nodes, [0, 0, n, 0, 0, 0])
                .unwrap(),
            divisor_sum(n)
        );
    }
}

// ============================================================================
// Divisor sum behind a setup block
// ============================================================================

#[test]
fn test_setup_block_nodes() {
    let (_, result) = decompile(DIVISOR_SUM_WITH_SETUP);

    assert_eq!(
        result.nodes,
        vec![
            IrNode::UnconditionalJump { target: 3 },
            divisor_loops(),
            IrNode::End,
            compound(BinOp::Add, 2, Expr::Literal(2)),
            compound(BinOp::Mul, 2, reg(2)),
            compound(BinOp::Mul, 2, Expr::Literal(19)),
            IrNode::ConditionalJump {
                cond: cond(BinOp::Eq, reg(0), Expr::Literal(1)),
                if_true: 7,
                if_false: 1,
            },
            assign(3, Expr::Literal(10)),
            compound(BinOp::Add, 2, reg(3)),
            assign(0, Expr::Literal(0)),
            IrNode::UnconditionalJump { target: 1 },
        ]
    );
    assert!(!result.is_fully_structured());
}

#[test]
fn test_setup_block_report_and_warnings() {
    let (_, result) = decompile(DIVISOR_SUM_WITH_SETUP);

    assert_eq!(result.report.count(Pattern::IfElseFusion), 4);
    assert_eq!(result.report.count(Pattern::SingleIf), 1);
    assert_eq!(result.report.count(Pattern::DoWhile), 2);
    assert_eq!(result.report.count(Pattern::ForLoop), 2);

    assert_eq!(result.warnings.len(), 3);
    assert!(result.warnings.iter().any(|w| w.contains("mulr 4 4 4")));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("assumed to hold 0 or 1")));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("3 node(s) still transfer control")));
}

#[test]
fn test_setup_block_source_is_numbered() {
    let (_, result) = decompile(DIVISOR_SUM_WITH_SETUP);

    assert!(result.source.contains("0000: goto 3;\n"));
    assert!(result.source.contains("0001: for (r1 = 1; !(r1 > r2); r1++) {\n"));
    assert!(result
        .source
        .contains("0006: if (r0 == 1) goto 7; else goto 1;\n"));
    assert!(result.source.ends_with("0010: goto 1;\n"));
}

#[test]
fn test_setup_block_equivalence() {
    let (program, result) = decompile(DIVISOR_SUM_WITH_SETUP);
    let decompiler = Decompiler::default();

    assert!(decompiler.verify(&program, &result, [0; 6]).unwrap());
    assert!(decompiler
        .verify(&program, &result, [1, 0, 0, 0, 0, 0])
        .unwrap());

    let executor = IrExecutor::new(Reg::R4);
    assert_eq!(executor.run_register_zero(&result.nodes, [0; 6]).unwrap(), 140);
    assert_eq!(
        executor
            .run_register_zero(&result.nodes, [1, 0, 0, 0, 0, 0])
            .unwrap(),
        132
    );
}

#[test]
fn test_recovery_is_idempotent() {
    let (_, result) = decompile(DIVISOR_SUM_WITH_SETUP);
    let (again, report) = StructureRecovery::new(Reg::R4).recover(result.nodes.clone());

    assert_eq!(again, result.nodes);
    assert_eq!(report.total(), 0);
    assert_eq!(report.passes, 1);
}

// ============================================================================
// Redundant stores
// ============================================================================

#[test]
fn test_dead_store_preserving_targets() {
    let program = Program::parse(DUPLICATED_STORE).unwrap();
    let decompiler = Decompiler::new(DecompileOptions {
        step_limit: Some(10_000),
        ..Default::default()
    });
    let result = decompiler.decompile(&program).unwrap();

    assert_eq!(
        result.nodes,
        vec![
            assign(1, Expr::Literal(5)),
            compound(BinOp::Add, 0, Expr::Literal(1)),
            IrNode::ConditionalJump {
                cond: cond(BinOp::Gt, reg(0), Expr::Literal(9)),
                if_true: 3,
                if_false: 2,
            },
            compound(BinOp::Add, 0, reg(1)),
        ]
    );
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("without renumbering jump targets")));

    // the stale target spins on the branch
    assert_eq!(
        decompiler.verify(&program, &result, [0; 6]),
        Err(Error::ExecutionLimitExceeded { limit: 10_000 })
    );
}

#[test]
fn test_dead_store_renumbering() {
    let program = Program::parse(DUPLICATED_STORE).unwrap();
    let decompiler = Decompiler::new(DecompileOptions {
        dead_store_policy: DeadStorePolicy::Renumber,
        step_limit: Some(10_000),
        ..Default::default()
    });
    let result = decompiler.decompile(&program).unwrap();

    assert_eq!(
        result.nodes,
        vec![
            assign(1, Expr::Literal(5)),
            IrNode::DoWhile {
                cond: cond(BinOp::Gt, reg(0), Expr::Literal(9)),
                body: vec![compound(BinOp::Add, 0, Expr::Literal(1))],
            },
            compound(BinOp::Add, 0, reg(1)),
        ]
    );
    assert!(result.warnings.is_empty());
    assert!(decompiler.verify(&program, &result, [0; 6]).unwrap());
    assert_eq!(
        IrExecutor::new(Reg::R5)
            .run_register_zero(&result.nodes, [0; 6])
            .unwrap(),
        15
    );
}

#[test]
fn test_dead_store_default_verify_stops() {
    let program = Program::parse(DUPLICATED_STORE).unwrap();
    let decompiler = Decompiler::default();
    let result = decompiler.decompile(&program).unwrap();

    assert_eq!(
        decompiler.verify(&program, &result, [0; 6]),
        Err(Error::ExecutionLimitExceeded {
            limit: DEFAULT_VERIFY_STEP_LIMIT
        })
    );
}

// ============================================================================
// Verification limits
// ============================================================================

#[test]
fn test_verify_with_pointer_in_register_zero() {
    let program = Program::parse("#ip 0\nseti 5 0 1\naddi 1 2 3").unwrap();
    let decompiler = Decompiler::default();
    let result = decompiler.decompile(&program).unwrap();

    assert!(result.is_fully_structured());
    let err = decompiler.verify(&program, &result, [0; 6]).unwrap_err();
    assert!(matches!(err, Error::Unverifiable(_)));
    assert_eq!(
        err.to_string(),
        "Cannot verify program: register 0 is the instruction pointer"
    );

    // the interpreter leaves the exit position in r0
    assert_eq!(
        Interpreter::default()
            .run_register_zero(&program, [0; 6])
            .unwrap(),
        2
    );
}

#[test]
fn test_decompile_rejects_overflowing_jump() {
    for source in [
        "#ip 4\naddi 4 9223372036854775807 4",
        "#ip 4\nseti 9223372036854775807 0 4",
    ] {
        assert!(matches!(
            Decompiler::default().decompile_source(source),
            Err(Error::UnsupportedTranslation { line: 0, .. })
        ));
    }
}

// ============================================================================
// Options and output
// ============================================================================

#[test]
fn test_passes_disabled() {
    let decompiler = Decompiler::new(DecompileOptions {
        rewrite_operators: false,
        rewrite_pointer: false,
        recover_structure: false,
        line_numbers: LineNumbers::Never,
        ..Default::default()
    });
    let (program, _) = decompile(DIVISOR_SUM);
    let result = decompiler.decompile(&program).unwrap();

    assert_eq!(result.nodes.len(), program.len());
    assert_eq!(result.report.total(), 0);
    assert!(result.source.contains("\nr0 = r1 + r0;\n"));
    assert!(decompiler
        .verify(&program, &result, [0, 0, 10, 0, 0, 0])
        .unwrap());
}

#[test]
fn test_unsupported_pointer_write() {
    let err = Decompiler::default()
        .decompile_source("#ip 2\nseti 1 0 0\nbanr 0 1 2")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedTranslation { line: 1, .. }
    ));
}

#[test]
fn test_json_output() {
    let (_, result) = decompile(DIVISOR_SUM);
    let json = result.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["ip"], 4);
    assert_eq!(value["report"]["for_loops"], 2);
    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(value["nodes"][1], "End");
    assert!(value["source"].as_str().unwrap().starts_with("// Decompiled"));
}
