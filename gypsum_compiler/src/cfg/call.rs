//! Call lowering: the four call shapes (spec §4.4 "Call lowering") plus the unary
//! and binary operator calls that ultimately funnel through the same machinery,
//! since Gypsum operators are ordinary method calls resolved by declaration
//! analysis ahead of time (the use-info on an operator expression names the exact
//! `Function` it resolves to, same as any other call).

use crate::ast::{DefnInfo, Expr, Info, IrDefn, Mode};
use crate::bytecode::Instr;
use crate::cfg::builder::{Builder, LValue};
use crate::cfg::pattern::build_type;
use crate::error::{CompileError, CompileResult};
use crate::ir::{ClassId, Function, FunctionId, Type};

/// The receiver a call is dispatched against (spec §9's "duck-typed receiver"
/// redesign flag, made an exhaustive tagged union instead of the source's
/// isinstance checks): no receiver at all (an implicit `this`/closure chain walk),
/// an ordinary AST expression, `super`, or an already-resolved lvalue whose current
/// value is both the receiver and the target of a write-back once the call returns
/// (compound assignment).
enum Receiver<'e> {
    None,
    Expr(&'e Expr),
    Super,
    LValue(LValue),
}

pub fn build_call_expr<I: Info>(builder: &mut Builder<'_, I>, expr: &Expr, mode: Mode) -> CompileResult<()> {
    let Expr::Call { id, callee, type_arguments, arguments } = expr else {
        unreachable!("build_call_expr called with a non-Call expression")
    };
    let defn_info = builder
        .info
        .use_info(*id)
        .ok_or(CompileError::UncallableExpression)?
        .defn_info
        .clone();
    match defn_info.defn {
        IrDefn::Function(fid) => {
            let function = resolve_function(builder, fid);
            if function.is_method() || function.is_constructor() {
                let receiver = receiver_of(callee);
                build_method_call(builder, receiver, &defn_info, fid, type_arguments, arguments, mode)
            } else {
                build_global_call(builder, fid, type_arguments, arguments, mode)
            }
        }
        IrDefn::Class(cid) => build_constructor_call(builder, cid, type_arguments, arguments, mode),
        _ => Err(CompileError::UncallableExpression),
    }
}

fn receiver_of(callee: &Expr) -> Receiver<'_> {
    match callee {
        Expr::Property { receiver, .. } => {
            if matches!(receiver.as_ref(), Expr::Super { .. }) {
                Receiver::Super
            } else {
                Receiver::Expr(receiver)
            }
        }
        // Implicit receiver: a bare call resolves through whichever scope defines
        // the callee, walked the same way any other captured definition is.
        _ => Receiver::None,
    }
}

/// The call implied by a unary operator expression: the operand was already
/// compiled onto the stack by `expr::lower`, so this only needs to emit the call
/// itself.
pub fn build_operator_call<I: Info>(builder: &mut Builder<'_, I>, expr: &Expr, mode: Mode) -> CompileResult<()> {
    let Expr::Unary { id, .. } = expr else {
        unreachable!("build_operator_call called with a non-Unary expression")
    };
    dispatch_resolved_method_call(builder, *id, &[], mode)
}

/// `&&`/`||` are handled directly in `expr::lower_binary` (they short-circuit and
/// never reach here); every other binary operator is a two-argument method call on
/// the left operand, resolved by the use-info attached to the binary expression's
/// own node.
pub fn build_binary_operator_call<I: Info>(
    builder: &mut Builder<'_, I>,
    id: crate::ast::NodeId,
    left: &Expr,
    right: &Expr,
    mode: Mode,
) -> CompileResult<()> {
    builder.lower(left, Mode::ForValue)?;
    dispatch_resolved_method_call(builder, id, std::slice::from_ref(right), mode)
}

/// A compound-assignment binary operator (`e op= r`, spec §4.4): builds the lvalue
/// for `e` once, reads its current value as the operator method's receiver, evaluates
/// `r`, calls the resolved operator method, then writes the result back through the
/// same lvalue (spec's "saved receiver" requirement — `e`'s receiver expression, if
/// it has one, is only ever evaluated once).
pub fn build_compound_assignment_call<I: Info>(
    builder: &mut Builder<'_, I>,
    id: crate::ast::NodeId,
    lhs: &Expr,
    rhs: &Expr,
    mode: Mode,
) -> CompileResult<()> {
    let defn_info = builder
        .info
        .use_info(id)
        .ok_or(CompileError::UncallableExpression)?
        .defn_info
        .clone();
    let IrDefn::Function(fid) = defn_info.defn else {
        return Err(CompileError::UncallableExpression);
    };
    let lvalue = builder.compile_lvalue(lhs)?;
    build_method_call(
        builder,
        Receiver::LValue(lvalue),
        &defn_info,
        fid,
        &[],
        std::slice::from_ref(rhs),
        mode,
    )
}

fn dispatch_resolved_method_call<I: Info>(
    builder: &mut Builder<'_, I>,
    call_node: crate::ast::NodeId,
    extra_args: &[Expr],
    mode: Mode,
) -> CompileResult<()> {
    let use_info = builder
        .info
        .use_info(call_node)
        .ok_or(CompileError::UncallableExpression)?
        .defn_info
        .clone();
    let IrDefn::Function(fid) = use_info.defn else {
        return Err(CompileError::UncallableExpression);
    };
    for arg in extra_args {
        builder.lower(arg, Mode::ForValue)?;
    }
    emit_method_dispatch(builder, fid, 1 + extra_args.len() as u32, false);
    builder.drop_for_effect(mode);
    Ok(())
}

fn build_global_call<I: Info>(
    builder: &mut Builder<'_, I>,
    fid: FunctionId,
    type_arguments: &[Type],
    arguments: &[Expr],
    mode: Mode,
) -> CompileResult<()> {
    for arg in arguments {
        builder.lower(arg, Mode::ForValue)?;
    }
    for ty in type_arguments {
        build_type(builder, ty);
    }
    builder.add(Instr::CallG(arguments.len() as u32, fid));
    builder.drop_for_effect(mode);
    Ok(())
}

fn build_method_call<I: Info>(
    builder: &mut Builder<'_, I>,
    receiver: Receiver,
    defn_info: &DefnInfo,
    fid: FunctionId,
    type_arguments: &[Type],
    arguments: &[Expr],
    mode: Mode,
) -> CompileResult<()> {
    let is_super_call;
    let mut write_back = None;
    match receiver {
        Receiver::None => {
            builder.load_context(defn_info.scope_id);
            is_super_call = false;
        }
        Receiver::Super => {
            builder.load_this();
            is_super_call = true;
        }
        Receiver::Expr(e) => {
            builder.lower(e, Mode::ForValue)?;
            is_super_call = false;
        }
        Receiver::LValue(lvalue) => {
            builder.load_lvalue(&lvalue);
            write_back = Some(lvalue);
            is_super_call = false;
        }
    }
    for arg in arguments {
        builder.lower(arg, Mode::ForValue)?;
    }
    for ty in type_arguments {
        build_type(builder, ty);
    }
    let arity = arguments.len() as u32 + 1;
    emit_method_dispatch(builder, fid, arity, is_super_call);
    match write_back {
        Some(lvalue) => builder.build_assignment(&lvalue, mode),
        None => builder.drop_for_effect(mode),
    }
    Ok(())
}

fn emit_method_dispatch<I: Info>(builder: &mut Builder<'_, I>, fid: FunctionId, arity: u32, force_static: bool) {
    let function = resolve_function(builder, fid);
    // A catalogue method can carry a fixed instruction sequence in place of a real
    // body (`object.==` splicing a bare `eqp`, say); when it does, the receiver and
    // arguments already on the stack are consumed by that sequence directly and no
    // `callg`/`callv` is emitted at all.
    if !function.inline_instructions.is_empty() {
        for instr in function.inline_instructions.clone() {
            builder.add(instr);
        }
        return;
    }
    let owner = function.owner.expect("a method must have an owner class");
    let owner_is_primitive = if owner.is_builtin() {
        builder.builtins.class(owner).is_primitive
    } else {
        builder.package.class(owner).is_primitive
    };
    // Constructors, final overrides, and primitive-class methods (`i32.+`, `boolean.!`,
    // ...) are all known statically: primitive value types have no vtable to dispatch
    // through, so `callv` would be meaningless for them even though nothing marks
    // them `final` individually.
    if force_static || function.is_final() || function.is_constructor() || owner_is_primitive {
        builder.add(Instr::CallG(arity, fid));
        return;
    }
    let index = method_table_index(builder, owner, fid);
    builder.add(Instr::CallV(arity, index));
}

fn build_constructor_call<I: Info>(
    builder: &mut Builder<'_, I>,
    class: ClassId,
    type_arguments: &[Type],
    arguments: &[Expr],
    mode: Mode,
) -> CompileResult<()> {
    let ctor = resolve_constructor(builder, class, arguments.len());
    builder.add(Instr::AllocObj(class));
    if mode == Mode::ForValue {
        builder.dup();
    }
    for arg in arguments {
        builder.lower(arg, Mode::ForValue)?;
    }
    for ty in type_arguments {
        build_type(builder, ty);
    }
    builder.add(Instr::CallG(arguments.len() as u32 + 1, ctor));
    builder.drop();
    Ok(())
}

fn resolve_function<'p, I: Info>(builder: &Builder<'p, I>, fid: FunctionId) -> &'p Function {
    if fid.is_builtin() {
        builder.builtins.function(fid)
    } else {
        builder.package.function(fid)
    }
}

fn resolve_constructor<I: Info>(builder: &Builder<'_, I>, class: ClassId, arg_count: usize) -> FunctionId {
    let ctors: &[FunctionId] = if class.is_builtin() {
        &builder.builtins.class(class).constructors
    } else {
        &builder.package.class(class).constructors
    };
    for &ctor in ctors {
        let function = resolve_function(builder, ctor);
        if function.parameter_types.len() == arg_count + 1 {
            return ctor;
        }
    }
    ctors[0]
}

fn method_table_index<I: Info>(builder: &Builder<'_, I>, owner: ClassId, fid: FunctionId) -> u32 {
    let methods: &[FunctionId] = if owner.is_builtin() {
        &builder.builtins.class(owner).methods
    } else {
        &builder.package.class(owner).methods
    };
    methods
        .iter()
        .position(|&m| m == fid)
        .expect("a method's owner class must list it in its method table") as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnalysisInfo, NodeId, ScopeId, UseInfo};
    use crate::ir::{Class, Field, FunctionFlags, Package};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn setup() -> (Package, crate::builtins::BuiltinRegistry) {
        (Package::new("test"), crate::builtins::BuiltinRegistry::load().unwrap())
    }

    /// `obj.x = v`: the receiver must be evaluated onto the stack and the assigned
    /// value stored through it, never the context chain.
    #[test]
    fn property_assignment_evaluates_its_own_receiver() {
        let (mut package, builtins) = setup();
        let root = builtins.root_class();
        let mut class = Class::new("C");
        class.supertype = Some(Type::class(root, vec![]));
        class.fields = vec![Field { name: "x".to_string(), ty: Type::i32(), index: 0 }];
        let class_id = package.add_class(class);

        let mut info = AnalysisInfo::default();
        let receiver_node = NodeId(1);
        info.use_infos.insert(
            receiver_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Variable(0), scope_id: ScopeId(0) } },
        );
        let property_node = NodeId(2);
        info.use_infos.insert(
            property_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Field(class_id, 0), scope_id: ScopeId(0) } },
        );

        let lhs = Expr::Property {
            id: property_node,
            receiver: Box::new(Expr::Variable { id: receiver_node }),
            name: "x".to_string(),
        };
        let rhs = Expr::Literal { id: NodeId(3), value: crate::ast::Literal::Integer(5) };
        info.types.insert(NodeId(3), Type::i32());

        let mut function = crate::ir::Function::new("f", Type::Unit);
        function.owner = Some(class_id);
        function.flags = FunctionFlags::METHOD;
        function.add_parameter("this", Type::class(class_id, vec![]));
        let string_ids = HashMap::new();
        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);

        builder.lower(&Expr::Assign { id: NodeId(4), lhs: Box::new(lhs), rhs: Box::new(rhs) }, Mode::ForEffect).unwrap();
        let function = builder.finish();
        assert_eq!(
            function.blocks[0].instructions,
            vec![Instr::LdLocal(0), Instr::I32(5), Instr::Swap, Instr::St32(0)]
        );
    }

    /// A call site's static type arguments are pushed after the ordinary arguments
    /// and before `callg`, for a global function.
    #[test]
    fn global_call_emits_static_type_arguments_before_callg() {
        let (mut package, builtins) = setup();
        let root = builtins.root_class();
        let callee = package.add_function(crate::ir::Function::new("identity", Type::class(root, vec![])));

        let mut info = AnalysisInfo::default();
        let call_node = NodeId(1);
        info.use_infos.insert(
            call_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Function(callee), scope_id: ScopeId(0) } },
        );

        let callee_expr = Expr::Variable { id: NodeId(2) };
        info.use_infos.insert(
            NodeId(2),
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Function(callee), scope_id: ScopeId(0) } },
        );
        let call = Expr::Call {
            id: call_node,
            callee: Box::new(callee_expr),
            type_arguments: vec![Type::class(root, vec![])],
            arguments: vec![],
        };

        let function = crate::ir::Function::new("f", Type::Unit);
        let string_ids = HashMap::new();
        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);
        build_call_expr(&mut builder, &call, Mode::ForEffect).unwrap();
        let function = builder.finish();
        assert_eq!(
            function.blocks[0].instructions,
            vec![Instr::Cls(root), Instr::CallG(0, callee), Instr::Drop]
        );
    }
}
