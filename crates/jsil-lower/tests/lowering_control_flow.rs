//! Control flow lowering tests
//!
//! Loops, labels, switch and native exception regions.

mod common;

use common::{line_of, Fixture};
use jsil_lower::hir::{
    BinaryOp, CatchClause, DeclKind, Expr, ForTarget, FunctionRef, Pattern, Stmt, SwitchCase,
    UpdateOp,
};
use jsil_lower::lir::{CallableId, RegionKind};
use jsil_lower::{PrettyPrint, Unsupported};

fn while_loop(test: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        test,
        body: Box::new(Stmt::block(body)),
    }
}

// ============================================================================
// Labels
// ============================================================================

mod labels {
    use super::*;

    #[test]
    fn test_labeled_break_leaves_outer_loop() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);
        let b = fx.param(f, "b", 1);

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::Labeled {
            label: "outer".into(),
            body: Box::new(while_loop(
                Expr::var(a),
                vec![while_loop(Expr::var(b), vec![Stmt::Break(Some("outer".into()))])],
            )),
        }];
        let output = fx.lower(&function).pretty_print();

        // outer loop: head L0, end L1; inner loop: head L2, end L3
        assert!(output.lines().any(|line| line.trim() == "br L1"));
        assert!(output.contains("brfalse t1, L1"));
        assert!(output.contains("brfalse t3, L3"));
    }

    #[test]
    fn test_labeled_continue_to_block_is_declined() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::Labeled {
            label: "outer".into(),
            body: Box::new(Stmt::block(vec![while_loop(
                Expr::Bool(true),
                vec![Stmt::Continue(Some("outer".into()))],
            )])),
        }];
        assert_eq!(fx.try_lower(&function).unwrap_err(), Unsupported);
    }

    #[test]
    fn test_unlabeled_break_in_labeled_block_exits_loop() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);

        let mut function = fx.function("f", f);
        function.body = vec![while_loop(
            Expr::var(a),
            vec![Stmt::Labeled {
                label: "inner".into(),
                body: Box::new(Stmt::block(vec![Stmt::Break(None)])),
            }],
        )];
        let output = fx.lower(&function).pretty_print();

        // loop: head L0, end L1; labeled block end L2
        assert!(output.lines().any(|line| line.trim() == "br L1"));
        assert!(!output.lines().any(|line| line.trim() == "br L2"));
    }

    #[test]
    fn test_break_out_of_labeled_block() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::Labeled {
            label: "done".into(),
            body: Box::new(Stmt::block(vec![
                Stmt::Break(Some("done".into())),
                Stmt::expr(Expr::call(Expr::Intrinsic("g".into()), vec![])),
            ])),
        }];
        let output = fx.lower(&function).pretty_print();

        assert!(line_of(&output, "br L0") < line_of(&output, "call.global g()"));
        assert!(line_of(&output, "call.global g()") < line_of(&output, "L0:"));
    }
}

// ============================================================================
// Loops
// ============================================================================

mod loops {
    use super::*;

    #[test]
    fn test_do_while_tests_after_body() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::DoWhile {
            body: Box::new(Stmt::expr(Expr::call(Expr::Intrinsic("g".into()), vec![]))),
            test: Expr::var(a),
        }];
        let output = fx.lower(&function).pretty_print();

        let top = line_of(&output, "L0:");
        assert!(top < line_of(&output, "call.global g()"));
        assert!(line_of(&output, "call.global g()") < line_of(&output, "brtrue"));
        assert!(output.contains("brtrue t2, L0"));
    }

    #[test]
    fn test_for_loop_renews_captured_head_binding() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let fns = fx.param(f, "fns", 0);
        let head = fx.block_scope(f, "for1");
        let i = fx.local(head, "i");
        let callback = fx.nested_function_scope(head, "cb");
        fx.capture(callback, i);

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::For {
            scope: Some(head),
            init: Some(Box::new(Stmt::let_decl(i, Expr::num(0.0)))),
            test: Some(Expr::binary(BinaryOp::Lt, Expr::var(i), Expr::num(3.0))),
            update: Some(Expr::update(UpdateOp::Increment, false, Expr::var(i))),
            body: Box::new(Stmt::block(vec![Stmt::expr(Expr::call(
                Expr::member(Expr::var(fns), "push"),
                vec![Expr::Function(FunctionRef {
                    callable: CallableId::new("cb"),
                    scope: callback,
                    is_arrow: true,
                })],
            ))])),
        }];
        let output = fx.lower(&function).pretty_print();

        let created: Vec<usize> = output
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains("newscope main/f/for1"))
            .map(|(index, _)| index)
            .collect();
        assert_eq!(created.len(), 2);
        // a fresh scope is created after the body and before the update runs
        assert!(created[1] > line_of(&output, "call.member"));
        assert!(created[1] < line_of(&output, "add.num"));
        assert!(output.contains("ldscope"));
        assert!(output.contains("arrow @cb scopes"));
        assert!(!output.contains("leafscope"));
    }

    #[test]
    fn test_for_in_walks_enumerated_keys() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let o = fx.param(f, "o", 0);
        let k = fx.local(f, "k");

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::ForIn {
            scope: None,
            target: ForTarget {
                pattern: Pattern::Binding(k),
                declaration: Some(DeclKind::Let),
            },
            object: Expr::var(o),
            body: Box::new(Stmt::Empty),
        }];
        let output = fx.lower(&function).pretty_print();

        assert!(output.contains("t1 = call.runtime EnumerateKeys(t0)"));
        assert!(output.contains("t2 = length t1"));
        assert!(output.contains("lt.num"));
        assert!(output.contains("getelem"));
        assert!(output.contains("$forInIndex"));
    }

    #[test]
    fn test_return_inside_for_of_uses_epilogue() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let xs = fx.param(f, "xs", 0);
        let v = fx.local(f, "v");

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::ForOf {
            scope: None,
            target: ForTarget {
                pattern: Pattern::Binding(v),
                declaration: Some(DeclKind::Const),
            },
            iterable: Expr::var(xs),
            body: Box::new(Stmt::Return(Some(Expr::var(v)))),
        }];
        let body = fx.lower(&function);
        let output = body.pretty_print();

        let kinds: Vec<_> = body.exception_regions.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RegionKind::Finally]);
        let epilogue = body.return_epilogue.expect("epilogue");
        assert!(output.contains(&format!("leave {}", epilogue.label)));
        assert!(output.contains("call.runtime IteratorClose"));
        assert!(output.contains("endfinally"));
    }
}

// ============================================================================
// Switch
// ============================================================================

mod switch {
    use super::*;

    #[test]
    fn test_continue_inside_switch_targets_loop() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);
        let b = fx.param(f, "b", 1);

        let mut function = fx.function("f", f);
        function.body = vec![while_loop(
            Expr::var(a),
            vec![Stmt::Switch {
                scope: None,
                discriminant: Expr::var(b),
                cases: vec![SwitchCase {
                    test: Some(Expr::num(1.0)),
                    body: vec![Stmt::Continue(None)],
                }],
            }],
        )];
        let output = fx.lower(&function).pretty_print();

        // the continue and the loop back-edge both branch to the loop head
        let back_edges = output.lines().filter(|line| line.trim() == "br L0").count();
        assert_eq!(back_edges, 2);
        assert!(output.contains("seq.dyn"));
    }

    #[test]
    fn test_break_inside_switch_leaves_switch_only() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::Switch {
            scope: None,
            discriminant: Expr::var(a),
            cases: vec![
                SwitchCase {
                    test: Some(Expr::num(1.0)),
                    body: vec![Stmt::Break(None)],
                },
                SwitchCase {
                    test: None,
                    body: vec![Stmt::expr(Expr::call(Expr::Intrinsic("g".into()), vec![]))],
                },
            ],
        }];
        let output = fx.lower(&function).pretty_print();

        // end label is allocated first
        assert!(output.lines().any(|line| line.trim() == "br L0"));
        assert!(line_of(&output, "call.global g()") < line_of(&output, "L0:"));
    }
}

// ============================================================================
// Exceptions
// ============================================================================

mod exceptions {
    use super::*;

    #[test]
    fn test_break_out_of_try_leaves_region() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let a = fx.param(f, "a", 0);

        let mut function = fx.function("f", f);
        function.body = vec![while_loop(
            Expr::var(a),
            vec![Stmt::Try {
                block: vec![Stmt::Break(None)],
                handler: Some(CatchClause {
                    scope: None,
                    param: None,
                    body: vec![],
                }),
                finalizer: None,
            }],
        )];
        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(output.contains("leave L1"));
        assert!(!output.lines().any(|line| line.trim() == "br L1"));
        assert_eq!(body.exception_regions.len(), 1);
        assert_eq!(body.exception_regions[0].kind, RegionKind::Catch);
    }

    #[test]
    fn test_throw_inside_try_stays_native() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");
        let e = fx.local(f, "e");

        let mut function = fx.function("f", f);
        function.body = vec![Stmt::Try {
            block: vec![Stmt::Throw(Expr::string("boom"))],
            handler: Some(CatchClause {
                scope: None,
                param: Some(Pattern::Binding(e)),
                body: vec![Stmt::expr(Expr::call(
                    Expr::Intrinsic("log".into()),
                    vec![Expr::var(e)],
                ))],
            }),
            finalizer: None,
        }];
        let body = fx.lower(&function);
        let output = body.pretty_print();

        assert!(line_of(&output, "throw") < line_of(&output, "= exception"));
        assert!(line_of(&output, "= exception") < line_of(&output, "call.global log"));
        assert!(output.contains("; catch region"));
        assert!(body.state_fields.is_empty());
    }

    #[test]
    fn test_break_out_of_finally_is_declined() {
        let mut fx = Fixture::new();
        let f = fx.function_scope("f");

        let mut function = fx.function("f", f);
        function.body = vec![while_loop(
            Expr::Bool(true),
            vec![Stmt::Try {
                block: vec![],
                handler: None,
                finalizer: Some(vec![Stmt::Break(None)]),
            }],
        )];
        assert_eq!(fx.try_lower(&function).unwrap_err(), Unsupported);
    }
}
