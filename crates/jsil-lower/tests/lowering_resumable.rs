//! Generator and async function lowering tests

mod common;

use common::{line_of, Fixture};
use jsil_lower::hir::{
    ArrayElement, BinaryOp, CatchClause, DeclKind, Expr, ForTarget, HirFunction, Param, Pattern,
    ScopeId, Stmt,
};
use jsil_lower::lir::{LirInstr, ResumeKind, SlotId};
use jsil_lower::{MethodBody, PrettyPrint, Unsupported};

fn await_expr(expr: Expr) -> Expr {
    Expr::Await(Box::new(expr))
}

fn async_function(fx: &Fixture, scope: ScopeId) -> HirFunction {
    let mut function = fx.function("f", scope);
    function.is_async = true;
    function
}

fn generator(fx: &Fixture, scope: ScopeId) -> HirFunction {
    let mut function = fx.function("g", scope);
    function.is_generator = true;
    function
}

fn intrinsic_call(name: &str) -> Expr {
    Expr::call(Expr::Intrinsic(name.into()), vec![])
}

fn slot_named(body: &MethodBody, name: &str) -> SlotId {
    let index = body
        .slots
        .iter()
        .position(|slot| slot.name == name)
        .unwrap_or_else(|| panic!("no slot `{}`", name));
    SlotId(index as u32)
}

/// `const r = yield* [1, 2]; return r;`
fn delegate_result_generator(fx: &mut Fixture) -> HirFunction {
    let g = fx.function_scope("g");
    let r = fx.constant(g, "r");
    let mut function = generator(fx, g);
    function.body = vec![
        Stmt::const_decl(
            r,
            Expr::Yield {
                argument: Some(Box::new(Expr::Array(vec![
                    ArrayElement::Item(Expr::num(1.0)),
                    ArrayElement::Item(Expr::num(2.0)),
                ]))),
                delegate: true,
            },
        ),
        Stmt::Return(Some(Expr::var(r))),
    ];
    function
}

// ============================================================================
// Await
// ============================================================================

mod await_points {
    use super::*;

    #[test]
    fn test_await_registers_resume_point() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = async_function(&fx, f);
        function.body = vec![Stmt::expr(await_expr(Expr::num(1.0)))];

        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(output.starts_with("async fn f {"));
        assert!(output.contains("dispatch [1 -> L2] else L0"));
        assert!(output.contains("t0 = ldleaf main/f::_started"));
        assert!(output.contains("brtrue t0, L1"));
        assert!(output.contains("t4 = await t3 state 1 -> L2"));
        assert_eq!(body.resume_points.len(), 1);
        assert_eq!(body.resume_points[0].kind, ResumeKind::Await);
        assert_eq!(body.state_fields, vec!["_started".to_string()]);
    }

    #[test]
    fn test_locals_live_on_state_object() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let x = fx.local(f, "x");
        let mut function = async_function(&fx, f);
        function.body = vec![
            Stmt::let_decl(x, Expr::num(1.0)),
            Stmt::expr(await_expr(Expr::num(0.0))),
            Stmt::Return(Some(Expr::var(x))),
        ];

        let output = fx.lower(&function).pretty_print();

        assert!(output.contains("stleaf main/f::x"));
        assert!(line_of(&output, "= await") < line_of(&output, "ldleaf main/f::x"));
        assert!(!output.contains("; slots"));
    }

    #[test]
    fn test_parameters_are_copied_once() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let p = fx.param(f, "p", 0);
        let mut function = async_function(&fx, f);
        function.params = vec![Param {
            target: Pattern::Binding(p),
            default: None,
        }];
        function.body = vec![Stmt::Return(Some(await_expr(Expr::var(p))))];

        let output = fx.lower(&function).pretty_print();

        // the copy sits between the started check and the body start label
        assert!(line_of(&output, "ldarg 0") < line_of(&output, "L1:"));
        assert!(output.contains("stleaf main/f::p"));
    }

    #[test]
    fn test_await_outside_async_is_declined() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = fx.function("f", f);
        function.body = vec![Stmt::expr(await_expr(Expr::num(1.0)))];
        assert_eq!(fx.try_lower(&function).unwrap_err(), Unsupported);
    }

    #[test]
    fn test_operand_held_across_await_is_declined() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.local(f, "a");
        let mut function = async_function(&fx, f);
        function.body = vec![
            Stmt::let_decl(a, Expr::num(1.0)),
            Stmt::Return(Some(Expr::binary(
                BinaryOp::Add,
                Expr::var(a),
                await_expr(Expr::num(2.0)),
            ))),
        ];
        assert_eq!(fx.try_lower(&function).unwrap_err(), Unsupported);
    }

    #[test]
    fn test_throw_outside_try_rejects() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = async_function(&fx, f);
        function.body = vec![Stmt::Throw(Expr::string("boom"))];

        let output = fx.lower(&function).pretty_print();
        assert!(output.lines().any(|line| line.trim().starts_with("reject t")));
        assert!(!output.contains("throw"));
    }
}

// ============================================================================
// Try Statements Around Suspend Points
// ============================================================================

mod routed_try {
    use super::*;

    #[test]
    fn test_try_finally_with_await_routes_through_state() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = async_function(&fx, f);
        function.body = vec![Stmt::Try {
            block: vec![Stmt::expr(await_expr(intrinsic_call("work")))],
            handler: None,
            finalizer: Some(vec![Stmt::expr(await_expr(intrinsic_call("cleanup")))]),
        }];

        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(body.exception_regions.is_empty());
        for field in [
            "_pendingException",
            "_hasPendingException",
            "_pendingReturn",
            "_hasPendingReturn",
        ] {
            assert!(body.state_fields.iter().any(|f| f == field), "{}", field);
        }

        let kinds: Vec<ResumeKind> = body.resume_points.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResumeKind::Reject,
                ResumeKind::Await,
                ResumeKind::Reject,
                ResumeKind::Await
            ]
        );
        assert!(output.contains("dispatch [1 -> L3, 2 -> L9, 3 -> L4, 4 -> L10] else L0"));
        assert!(output.contains("state 2 -> L9 reject 1 via main/f::_pendingException"));
        // the pending exception is re-raised after the finally block
        assert!(output.lines().any(|line| line.trim().starts_with("reject t")));
    }

    #[test]
    fn test_return_inside_routed_try_runs_finally() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = async_function(&fx, f);
        function.body = vec![Stmt::Try {
            block: vec![
                Stmt::expr(await_expr(intrinsic_call("work"))),
                Stmt::Return(Some(Expr::num(1.0))),
            ],
            handler: None,
            finalizer: Some(vec![Stmt::expr(intrinsic_call("cleanup"))]),
        }];

        let output = fx.lower(&function).pretty_print();

        assert!(output.contains("stleaf main/f::_pendingReturn"));
        // finally entry is the fourth label of the region
        assert!(line_of(&output, "stleaf main/f::_pendingReturn") < line_of(&output, "br L5"));
        assert!(line_of(&output, "L5:") < line_of(&output, "call.global cleanup()"));
    }

    #[test]
    fn test_catch_binds_pending_exception() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let e = fx.local(f, "e");
        let mut function = async_function(&fx, f);
        function.body = vec![Stmt::Try {
            block: vec![Stmt::expr(await_expr(intrinsic_call("work")))],
            handler: Some(CatchClause {
                scope: None,
                param: Some(Pattern::Binding(e)),
                body: vec![],
            }),
            finalizer: None,
        }];

        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(body.exception_regions.is_empty());
        assert!(
            line_of(&output, "ldleaf main/f::_pendingException")
                < line_of(&output, "stleaf main/f::e")
        );
    }
}

// ============================================================================
// Generators
// ============================================================================

mod generators {
    use super::*;

    #[test]
    fn test_yield_checks_driver_requests() {
        let mut fx = Fixture::new();
        let g = fx.function_scope("g");
        let mut function = generator(&fx, g);
        function.body = vec![Stmt::expr(Expr::Yield {
            argument: Some(Box::new(Expr::num(1.0))),
            delegate: false,
        })];

        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(output.starts_with("generator fn g {"));
        assert!(output.contains("= yield t"));
        assert_eq!(body.resume_points.len(), 1);
        assert_eq!(body.resume_points[0].kind, ResumeKind::Yield);
        assert_eq!(
            body.state_fields,
            vec![
                "_started".to_string(),
                "_hasReturn".to_string(),
                "_returnValue".to_string(),
                "_hasResumeException".to_string(),
                "_resumeException".to_string(),
            ]
        );
    }

    #[test]
    fn test_yield_delegate_handles_arrays_and_generators() {
        let mut fx = Fixture::new();
        let g = fx.function_scope("g");
        let mut function = generator(&fx, g);
        function.body = vec![Stmt::expr(Expr::Yield {
            argument: Some(Box::new(Expr::Array(vec![
                ArrayElement::Item(Expr::num(1.0)),
                ArrayElement::Item(Expr::num(2.0)),
            ]))),
            delegate: true,
        })];

        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(output.contains("isinstance"));
        assert!(output.contains("Generator"));
        assert!(output.contains("normalize.iter"));
        assert!(output.contains("call.member"));
        assert!(body.state_fields.iter().any(|f| f == "_yieldStarIndex"));
        assert!(body.state_fields.iter().any(|f| f == "_yieldStarMode"));
        assert_eq!(body.resume_points.len(), 2);
    }

    #[test]
    fn test_yield_delegate_over_array_evaluates_to_undefined() {
        let mut fx = Fixture::new();
        let function = delegate_result_generator(&mut fx);
        let body = fx.lower(&function);
        let result = slot_named(&body, "$yieldStar");

        // the exhausted array path completes with undefined
        let completes_undefined = body.instructions.windows(2).any(|pair| {
            matches!(
                pair,
                [
                    LirInstr::ConstUndefined { result: value },
                    LirInstr::StoreSlot { slot, value: stored },
                ] if *slot == result && stored == value
            )
        });
        assert!(completes_undefined);

        // the joined value is what `r` is initialized with
        let (load_at, loaded) = body
            .instructions
            .iter()
            .enumerate()
            .find_map(|(index, instr)| match instr {
                LirInstr::LoadSlot { slot, result: value } if *slot == result => {
                    Some((index, *value))
                }
                _ => None,
            })
            .expect("carrier load");
        assert!(body.instructions[load_at..].iter().any(|instr| matches!(
            instr,
            LirInstr::StoreLeafScopeField { field, value } if field.name == "r" && *value == loaded
        )));
    }

    #[test]
    fn test_returned_delegate_completion_returns() {
        let mut fx = Fixture::new();
        let function = delegate_result_generator(&mut fx);
        let body = fx.lower(&function);
        let was_return = slot_named(&body, "$yieldStarWasReturn");

        // forwarding `return()` to the inner generator marks the completion
        let marks_return = body.instructions.windows(2).any(|pair| {
            matches!(
                pair,
                [
                    LirInstr::ConstBool { value: true, result: flag },
                    LirInstr::StoreSlot { slot, value },
                ] if *slot == was_return && value == flag
            )
        });
        assert!(marks_return);

        // a marked completion returns instead of continuing with the expression
        let returns = body.instructions.windows(3).any(|triple| {
            matches!(
                triple,
                [
                    LirInstr::LoadSlot { slot, result: flag },
                    LirInstr::BranchIfFalse { condition, .. },
                    LirInstr::Return { .. },
                ] if *slot == was_return && condition == flag
            )
        });
        assert!(returns);
    }

    #[test]
    fn test_yield_outside_generator_is_declined() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let mut function = fx.function("f", f);
        function.body = vec![Stmt::expr(Expr::Yield {
            argument: None,
            delegate: false,
        })];
        assert_eq!(fx.try_lower(&function).unwrap_err(), Unsupported);
    }

    #[test]
    fn test_for_of_with_suspend_keeps_iterator_in_state() {
        let mut fx = Fixture::new();
        let g = fx.function_scope("g");
        let items = fx.param(g, "items", 0);
        let v = fx.local(g, "v");
        let mut function = generator(&fx, g);
        function.params = vec![Param {
            target: Pattern::Binding(items),
            default: None,
        }];
        function.body = vec![Stmt::ForOf {
            scope: None,
            target: ForTarget {
                pattern: Pattern::Binding(v),
                declaration: Some(DeclKind::Const),
            },
            iterable: Expr::var(items),
            body: Box::new(Stmt::expr(Expr::Yield {
                argument: Some(Box::new(Expr::var(v))),
                delegate: false,
            })),
        }];

        let body = fx.lower(&function);

        assert!(body.exception_regions.is_empty());
        assert!(body.state_fields.iter().any(|f| f.starts_with("$iterator")));
        assert_eq!(body.resume_points.len(), 1);
    }
}
