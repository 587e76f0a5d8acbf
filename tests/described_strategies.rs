//! Strategies written as text and resolved through the interpreter.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use canopy::elevate::{
    IOp, InterpretError, Interpreter, StrategyRef, check_snapshot, parse_strategies, print_iop,
};
use canopy::ir::{IrContext, Symbol};
use common::*;

const STRATEGIES: &str = "
// traversals of the sample rewrites
strategy @commute_add_bottom_top = bottom_to_top(commute_add)
strategy @commute_add_bottom_top_twice = seq(@commute_add_bottom_top, @commute_add_bottom_top)
strategy @change_cst_to_42_top_down = top_to_bottom(change_constant_to_42)
strategy @inline_if_top_down = top_to_bottom(inline_if)
strategy @add_zero_top_down = top_to_bottom(add_zero)
strategy @remove_add_zero_top_down = top_to_bottom(remove_add_zero)
strategy @mul2shift_top_down = top_to_bottom(mul2_to_shift)

// folding until nothing changes, then cleaning up
strategy @fold_all = repeat(top_to_bottom(fold_constant_add))
strategy @fold_everywhere_and_cleanup = seq(@fold_all, try(garbage_collect))
strategy @fold_everywhere_and_inline = seq(try(@inline_if_top_down), @fold_everywhere_and_cleanup)
";

fn strategies() -> BTreeMap<String, StrategyRef> {
    let mut ctx = IrContext::new();
    let module = parse_strategies(&mut ctx, STRATEGIES).unwrap();
    interpreter().get_strategies(&ctx, module).unwrap()
}

fn run(name: &str, op: &Arc<IOp>) -> Arc<IOp> {
    let all = strategies();
    let s = all.get(name).unwrap_or_else(|| panic!("no strategy @{name}"));
    let out = s.apply(op).unwrap_op();
    check_snapshot(&out).unwrap();
    out
}

fn double_add(commuted: bool) -> Arc<IOp> {
    let c4 = constant(4);
    let c2 = constant(2);
    let c1 = constant(1);
    let inner = addi(c1.result(0), c2.result(0));
    let outer = if commuted {
        addi(c4.result(0), inner.result(0))
    } else {
        addi(inner.result(0), c4.result(0))
    };
    let r = ret([outer.result(0)]);
    module(vec![c4, c2, c1, inner, outer, r])
}

#[test]
fn every_definition_resolves() {
    let all = strategies();
    assert_eq!(all.len(), 10);
    assert_eq!(
        all["fold_everywhere_and_inline"].to_string(),
        "seq(try(top_to_bottom(inline_if)), \
         seq(repeat(top_to_bottom(fold_constant_add), 100), try(garbage_collect)))"
    );
}

#[test]
fn described_commute() {
    let before = double_add(false);
    assert_same_program(&run("commute_add_bottom_top", &before), &double_add(true));
    assert_same_program(&run("commute_add_bottom_top_twice", &before), &before);
}

#[test]
fn described_fold_and_cleanup() {
    let c1 = constant(1);
    let c2 = constant(2);
    let sum = addi(c1.result(0), c2.result(0));
    let c4 = constant(4);
    let total = addi(sum.result(0), c4.result(0));
    let r = ret([total.result(0)]);
    let before = module(vec![c1, c2, sum, c4, total, r]);

    let out = run("fold_everywhere_and_cleanup", &before);
    insta::assert_snapshot!(print_iop(&out), @r"
    core.module {sym_name = @m} {
      %0 = arith.constant {value = 7} : core.i32
      func.return %0
    }
    ");
}

#[test]
fn described_inline_and_fold() {
    let before = module(vec![func("test", vec![], |_| {
        let guard = constant_of(i1_ty(), 1);
        let c1 = constant(1);
        let c2 = constant(2);
        let sum = addi(c1.result(0), c2.result(0));
        let c4 = constant(4);
        let total = addi(sum.result(0), c4.result(0));
        let yielded = total.result(0);
        let cond = scf_if(guard.result(0), vec![c1, c2, sum, c4, total], yielded);
        let r = ret([cond.result(0)]);
        vec![guard, cond, r]
    })]);
    let expected = module(vec![func("test", vec![], |_| {
        let c7 = constant(7);
        let r = ret([c7.result(0)]);
        vec![c7, r]
    })]);
    assert_same_program(&run("fold_everywhere_and_inline", &before), &expected);
}

#[test]
fn described_single_site_rewrites() {
    let c1 = constant(1);
    let r = ret([c1.result(0)]);
    let out = run("add_zero_top_down", &module(vec![c1, r]));
    assert_eq!(out.regions[0].ops().len(), 4);

    let c1 = constant(1);
    let c0 = constant(0);
    let sum = addi(c0.result(0), c1.result(0));
    let r = ret([sum.result(0)]);
    let c1_value = c1.result(0);
    let out = run("remove_add_zero_top_down", &module(vec![c1, c0, sum, r]));
    let ops = out.regions[0].ops();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[2].operands, [c1_value]);

    let times_two = module(vec![func("times_2", vec![i32_ty()], |args| {
        let two = constant(2);
        let product = binary("muli", args[0].clone(), two.result(0));
        let r = ret([product.result(0)]);
        vec![two, product, r]
    })]);
    let out = run("mul2shift_top_down", &times_two);
    let body = out.regions[0].ops()[0].regions[0].ops();
    assert!(body[2].is("arith", "shli"));
}

#[test]
fn described_constant_in_region() {
    let build = |value| {
        module(vec![func("test", vec![i1_ty()], |args| {
            let c = constant(value);
            let cv = c.result(0);
            let cond = scf_if(args[0].clone(), vec![c], cv);
            let r = ret([cond.result(0)]);
            vec![cond, r]
        })])
    };
    assert_same_program(&run("change_cst_to_42_top_down", &build(0)), &build(42));
}

#[test]
fn missing_natives_are_reported_when_resolving() {
    let err = Interpreter::new()
        .load("strategy @s = bottom_to_top(commute_add)", "s")
        .unwrap_err();
    assert_eq!(err, InterpretError::UnknownNative("commute_add".into()));
    assert_eq!(
        err.to_string(),
        "no native strategy named `commute_add` is registered"
    );
}

#[test]
fn undefined_references_are_reported() {
    let err = interpreter()
        .load("strategy @s = seq(@t, id)", "s")
        .unwrap_err();
    assert_eq!(err, InterpretError::UnknownStrategy(Symbol::new("t")));
}

#[test]
fn described_collection_inside_a_traversal() {
    let collect = interpreter()
        .load("strategy @collect = bottom_to_top(garbage_collect)", "collect")
        .unwrap();
    let c1 = constant(1);
    let c0 = constant(0);
    let r = ret([c1.result(0)]);
    let out = collect.apply(&module(vec![c1, c0, r])).unwrap_op();
    check_snapshot(&out).unwrap();
    insta::assert_snapshot!(print_iop(&out), @r"
    core.module {sym_name = @m} {
      %0 = arith.constant {value = 1} : core.i32
      func.return %0
    }
    ");
    assert!(!collect.apply(&out).is_success());
}
