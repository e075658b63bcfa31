//! Pattern matching: `try`/`catch`/`finally` and standalone partial-function
//! expressions both bottom out in the same case-dispatch machinery (spec §4.4's
//! `visitAstPartialFunctionExpression`/`visitAstPartialFunctionCase`).
//!
//! A case is checked by duplicating the scrutinee's runtime type (fetched once via
//! `object.typeof` before the first case) and comparing it against the case
//! pattern's declared type with `type.is-subtype-of`. A case pattern leaves the
//! `[type, value, ...]` pair on the stack exactly as it found it whether or not it
//! binds a name, so every case body can uniformly drop both before compiling.

use crate::ast::{Expr, Info, Mode, Pattern, PartialFunctionCase};
use crate::bytecode::{BlockId, Instr};
use crate::cfg::builder::Builder;
use crate::error::CompileResult;
use crate::ir::Type;

/// Pushes a runtime `Type` value for `ty` onto the stack (spec §4.4's `buildType`).
pub(crate) fn build_type<I: Info>(builder: &mut Builder<'_, I>, ty: &Type) {
    match ty {
        Type::Variable(param) => builder.add(Instr::TyVs(*param)),
        Type::Class { class, type_arguments, .. } => {
            if type_arguments.is_empty() {
                builder.add(Instr::Cls(*class));
            } else {
                builder.add(Instr::TyCs(*class));
                for arg in type_arguments {
                    build_type(builder, arg);
                }
            }
        }
        _ => {
            let class = builder.builtins.class_for_primitive(ty);
            builder.add(Instr::Cls(class));
        }
    }
}

/// Binds the value beneath the top-of-stack `type` to `name`, without disturbing
/// the `[type, value, ...]` pair the caller (a case body, about to drop both) still
/// expects to find there.
fn bind_matched_value<I: Info>(builder: &mut Builder<'_, I>, node: crate::ast::NodeId) {
    let defn_info = builder
        .info
        .defn_info(node)
        .expect("a binding pattern must have defn info")
        .clone();
    builder.swap();
    builder.dup();
    builder.store_defn(&defn_info);
    builder.swap();
}

/// Lowers one case pattern in FOR-MATCH mode: on entry the stack is `[type, value,
/// ...]` (the scrutinee's runtime type fetched by the caller, and the scrutinee
/// itself beneath it); on a successful match, control reaches `success` with that
/// same pair intact and any bound name already holding the matched value. A failed
/// match branches straight to `fail` without touching the stack at all.
fn lower_pattern_match<I: Info>(
    builder: &mut Builder<'_, I>,
    pattern: &Pattern,
    success: BlockId,
    fail: BlockId,
) {
    match pattern {
        Pattern::Blank => {
            builder.branch(success);
            builder.set_current_block(success);
        }
        Pattern::Variable { id, .. } => {
            builder.branch(success);
            builder.set_current_block(success);
            bind_matched_value(builder, *id);
        }
        Pattern::Typed { id, ty, .. } => {
            builder.dup();
            build_type(builder, ty);
            let type_class = builder.builtins.type_class();
            let index = builder
                .builtins
                .find_method_index(type_class, "is-subtype-of")
                .expect("builtin type class declares is-subtype-of");
            builder.add(Instr::CallV(2, index));
            builder.branchif(success, fail);
            builder.set_current_block(success);
            bind_matched_value(builder, *id);
        }
    }
}

/// Lowers one case (pattern, optional guard, body): assumes the scrutinee's
/// `[type, value, ...]` pair is already on the stack, as set up by
/// `lower_cases_into`.
fn lower_case<I: Info>(
    builder: &mut Builder<'_, I>,
    case: &PartialFunctionCase,
    mode: Mode,
    done: BlockId,
    fail: BlockId,
) -> CompileResult<()> {
    let success = builder.new_block();
    lower_pattern_match(builder, &case.pattern, success, fail);
    if let Some(guard) = &case.guard {
        builder.lower(guard, Mode::ForValue)?;
        let guard_success = builder.new_block();
        builder.branchif(guard_success, fail);
        builder.set_current_block(guard_success);
    }
    builder.drop(); // type
    builder.drop(); // value
    builder.lower(&case.body, mode)?;
    builder.branch(done);
    Ok(())
}

/// Tries each case against the scrutinee (already on the stack as `[value, ...]`)
/// in order, branching to `done` on the first match and to `fail` if every case's
/// pattern (and guard) is exhausted. Leaves the builder's current block pointed at
/// whatever the last case's failure path set it to; the caller (`lower_try_catch`
/// or `lower_partial_function`) is responsible for giving `fail` its own
/// instructions.
fn lower_cases_into<I: Info>(
    builder: &mut Builder<'_, I>,
    cases: &[PartialFunctionCase],
    mode: Mode,
    done: BlockId,
    fail: BlockId,
) -> CompileResult<()> {
    builder.dup();
    let typeof_index = builder.builtins.typeof_index();
    builder.add(Instr::CallV(1, typeof_index));
    let last = cases.len() - 1;
    for (i, case) in cases.iter().enumerate() {
        let next_fail = if i == last { fail } else { builder.new_block() };
        // Scoped so a case whose body always returns/throws doesn't leave the
        // builder unreachable for the cases that follow it: without this, every
        // `new_block`/`set_current_block` for the remaining cases would silently
        // no-op and their control flow would vanish.
        let (result, _) = builder.unreachable_scope(|b| lower_case(b, case, mode, done, next_fail));
        result?;
        if i != last {
            builder.set_current_block(next_fail);
        }
    }
    Ok(())
}

/// A standalone `match`-like partial function expression (spec §4.4): the
/// scrutinee is already on the stack FOR-VALUE. Every case's pattern and guard
/// failing raises a fresh `exception` instance rather than rethrowing, since there
/// is no enclosing `try` to hand an unmatched value to.
pub fn lower_partial_function<I: Info>(
    builder: &mut Builder<'_, I>,
    cases: &[PartialFunctionCase],
    mode: Mode,
) -> CompileResult<()> {
    let done = builder.new_block();
    let fail = builder.new_block();
    lower_cases_into(builder, cases, mode, done, fail)?;

    builder.set_current_block(fail);
    builder.drop(); // type
    builder.drop(); // unmatched value
    let exception_class = builder.builtins.exception_class();
    let ctor = builder.builtins.class(exception_class).constructors[0];
    builder.add(Instr::AllocObj(exception_class));
    builder.dup();
    builder.add(Instr::CallG(1, ctor));
    builder.drop();
    builder.throw_();

    builder.set_current_block(done);
    Ok(())
}

/// `try`/`catch`/`finally` (spec §4.4's `visitAstTryCatchExpression`): which of
/// `successBlock`/`failBlock`/`finallyBlock` are distinct blocks, versus aliases of
/// the always-present `done`/`rethrow`, depends on which of `catch`/`finally` are
/// present. Three shapes:
///
/// - catch only: a caught exception that matches falls through to `done`; one that
///   doesn't falls through to `rethrow`.
/// - finally only: there's no catch handler, so the protected region's own
///   `catch_block` *is* the fail path straight into the finally's cleanup.
/// - both: the catch handles what it can and routes through the finally either
///   way, same as a normal (non-exceptional) exit does.
pub fn lower_try_catch<I: Info>(
    builder: &mut Builder<'_, I>,
    body: &Expr,
    catch: Option<&[PartialFunctionCase]>,
    finally: Option<&Expr>,
    mode: Mode,
) -> CompileResult<()> {
    debug_assert!(catch.is_some() || finally.is_some(), "a try with neither catch nor finally is meaningless");

    let try_block = builder.new_block();
    let catch_block = builder.new_block();
    let done = builder.new_block();
    let rethrow = builder.new_block();

    let (success_block, fail_block, finally_block) = match (catch.is_some(), finally.is_some()) {
        (_, false) => (done, rethrow, None),
        (false, true) => (builder.new_block(), catch_block, Some(builder.new_block())),
        (true, true) => (
            builder.new_block(),
            builder.new_block(),
            Some(builder.new_block()),
        ),
    };

    builder.add(Instr::PushTry(try_block, catch_block));
    builder.set_current_block(try_block);
    let (body_result, _) = builder.unreachable_scope(|b| -> CompileResult<()> {
        b.lower(body, mode)?;
        b.add(Instr::PopTry(success_block));
        Ok(())
    });
    body_result?;

    if let Some(cases) = catch {
        builder.set_current_block(catch_block);
        lower_cases_into(builder, cases, mode, success_block, fail_block)?;
        builder.set_current_block(fail_block);
        builder.drop(); // type; leaves the unmatched exception for rethrow/finally.
    }

    match finally {
        None => {
            builder.set_current_block(rethrow);
            builder.throw_();
            builder.set_current_block(done);
        }
        Some(finally_expr) => {
            let finally_block = finally_block.expect("finally present implies finally_block");

            builder.set_current_block(fail_block);
            // The swap only has something to pair the exception with when this
            // expression is for-value; for-effect leaves just the exception itself,
            // which the finally block's dup/null/eqp check handles either way.
            if mode == Mode::ForValue {
                builder.add(Instr::Uninitialized);
                builder.swap();
            }
            builder.branch(finally_block);

            builder.set_current_block(success_block);
            builder.add(Instr::Null);
            builder.branch(finally_block);

            builder.set_current_block(finally_block);
            builder.lower(finally_expr, Mode::ForEffect)?;
            builder.dup();
            builder.add(Instr::Null);
            builder.add(Instr::Eqp);
            builder.branchif(done, rethrow);

            builder.set_current_block(rethrow);
            builder.throw_();

            builder.set_current_block(done);
            builder.drop();
        }
    }
    Ok(())
}
