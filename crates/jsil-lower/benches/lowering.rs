use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jsil_lower::hir::{
    BinaryOp, BindingKind, CatchClause, ClassRegistry, Expr, FunctionKind, FunctionRef,
    HirFunction, Param, Pattern, ScopeKind, ScopeTree, Stmt, UpdateOp,
};
use jsil_lower::lir::CallableId;
use jsil_lower::{lower_function, LoweringOptions};

/// `function f(fns, n) { for (let i = 0; i < n; i++) { fns.push(() => i); } }`
fn closure_loop() -> (HirFunction, ScopeTree) {
    let mut scopes = ScopeTree::new("main");
    let global = scopes.global();
    let f = scopes.add_scope(global, ScopeKind::Function, "f");
    let fns = scopes.add_parameter(f, "fns", 0);
    let n = scopes.add_parameter(f, "n", 1);
    let head = scopes.add_scope(f, ScopeKind::Block, "for1");
    let i = scopes.add_binding(head, "i", BindingKind::Let);
    let callback = scopes.add_scope(head, ScopeKind::Function, "cb");
    scopes.note_reference(callback, i);

    let mut function = HirFunction::new("f", FunctionKind::Function, f);
    function.params = vec![
        Param {
            target: Pattern::Binding(fns),
            default: None,
        },
        Param {
            target: Pattern::Binding(n),
            default: None,
        },
    ];
    function.body = vec![Stmt::For {
        scope: Some(head),
        init: Some(Box::new(Stmt::let_decl(i, Expr::num(0.0)))),
        test: Some(Expr::binary(BinaryOp::Lt, Expr::var(i), Expr::var(n))),
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
    (function, scopes)
}

/// `async function f() { try { await work(); } catch (e) { log(e); } finally { await cleanup(); } }`
fn async_try() -> (HirFunction, ScopeTree) {
    let mut scopes = ScopeTree::new("main");
    let global = scopes.global();
    let f = scopes.add_scope(global, ScopeKind::Function, "f");
    let e = scopes.add_binding(f, "e", BindingKind::Let);

    let call = |name: &str, args: Vec<Expr>| Expr::call(Expr::Intrinsic(name.into()), args);
    let mut function = HirFunction::new("f", FunctionKind::Function, f);
    function.is_async = true;
    function.body = vec![Stmt::Try {
        block: vec![Stmt::expr(Expr::Await(Box::new(call("work", vec![]))))],
        handler: Some(CatchClause {
            scope: None,
            param: Some(Pattern::Binding(e)),
            body: vec![Stmt::expr(call("log", vec![Expr::var(e)]))],
        }),
        finalizer: Some(vec![Stmt::expr(Expr::Await(Box::new(call(
            "cleanup",
            vec![],
        ))))]),
    }];
    (function, scopes)
}

fn bench_closure_loop(c: &mut Criterion) {
    let (function, scopes) = closure_loop();
    let registry = ClassRegistry::new();
    let options = LoweringOptions::default();

    c.bench_function("lower_closure_loop", |b| {
        b.iter(|| lower_function(black_box(&function), &scopes, &registry, &options).unwrap());
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let registry = ClassRegistry::new();
    let (function, scopes) = async_try();

    for (name, options) in [
        ("unoptimized", LoweringOptions::unoptimized()),
        ("default", LoweringOptions::default()),
    ] {
        group.bench_with_input(
            BenchmarkId::new("async_try", name),
            &options,
            |b, options| {
                b.iter(|| {
                    lower_function(black_box(&function), &scopes, &registry, options).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_closure_loop, bench_pipeline);
criterion_main!(benches);
