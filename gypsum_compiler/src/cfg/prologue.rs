//! Function and constructor prologues (spec §4.4's `CompileVisitor.compile`):
//! everything that runs before a body's statements are lowered as ordinary
//! expressions, plus the canned bodies compile hints stand in for.
//!
//! Index assignment for locals and parameters happens when they're first added to
//! an `ir::Function` (`Function::add_local`/`add_parameter`), not as a separate pass
//! here, and a Gypsum parameter is always a plain binding (`ast::Param` carries no
//! destructuring pattern) — so unpacking a parameter list only ever does real work
//! for a primary constructor's `is_constructor_field` parameters, which also need
//! storing into their backing fields.

use crate::ast::{Expr, FunctionDefn, Info, IrDefn, Mode, NodeId, Param};
use crate::bytecode::Instr;
use crate::cfg::builder::Builder;
use crate::error::{CompileError, CompileResult};
use crate::ir::{ClassId, CompileHint, Type};

/// A nested function/class body, or a primary constructor's implicit one, reduced
/// to the statement list `compile_statements` wants (spec's "body is either a block
/// or a single expression" rule).
fn block_statements(body: &Expr) -> &[Expr] {
    match body {
        Expr::Block { statements, .. } => statements.as_slice(),
        other => std::slice::from_ref(other),
    }
}

/// Compiles an ordinary (non-constructor) function or method body FOR-VALUE.
pub fn compile_function<I: Info>(builder: &mut Builder<'_, I>, defn: &FunctionDefn) -> CompileResult<()> {
    let body = defn
        .body
        .as_ref()
        .ok_or_else(|| CompileError::MissingBody { name: defn.name.clone() })?;
    compile_statements(builder, defn.id.as_scope(), block_statements(body), Mode::ForValue)?;
    finish_function(builder, Mode::ForValue);
    Ok(())
}

/// Compiles a constructor body (spec §4.4, scenario 3): alt-ctor/super-ctor
/// delegation, primary-constructor field storage, the initializer call, then the
/// body itself FOR-EFFECT.
pub fn compile_constructor<I: Info>(
    builder: &mut Builder<'_, I>,
    owner: ClassId,
    ctor: &FunctionDefn,
) -> CompileResult<()> {
    let mut alt_ctor_called = false;
    let mut super_ctor_called = false;

    if let Some(call_expr) = &ctor.delegating_call {
        let Expr::Call { id, callee, arguments, .. } = call_expr else {
            unreachable!("a constructor's delegating call must be a call expression")
        };
        match callee.as_ref() {
            Expr::This { .. } => {
                compile_delegating_call(builder, *id, arguments)?;
                alt_ctor_called = true;
                super_ctor_called = true;
            }
            Expr::Super { .. } => {
                compile_delegating_call(builder, *id, arguments)?;
                super_ctor_called = true;
            }
            _ => unreachable!("a delegating call is always `this(...)` or `super(...)`"),
        }
    }

    if !super_ctor_called {
        compile_super_ctor_call(builder, owner, &[])?;
    }

    store_constructor_field_parameters(builder, owner, &ctor.parameters);

    if !alt_ctor_called {
        if let Some(initializer) = builder.package.class(owner).initializer {
            builder.load_this();
            builder.add(Instr::CallG(1, initializer));
            builder.drop();
        }
    }

    let statements = ctor.body.as_ref().map(block_statements).unwrap_or(&[]);
    compile_statements(builder, ctor.id.as_scope(), statements, Mode::ForEffect)?;
    finish_function(builder, Mode::ForEffect);
    Ok(())
}

/// Compiles a class's primary constructor (spec §4.3): its parameter list and
/// super-constructor arguments come straight from the `ClassDefn` rather than from
/// a `FunctionDefn` of its own, so there's no node id to resolve a delegating call
/// through the way `compile_constructor` does for an explicit alternate
/// constructor — the super call is resolved by arity instead, same as the implicit
/// default call `compile_constructor` falls back to when it has no arguments.
pub fn compile_primary_constructor<I: Info>(
    builder: &mut Builder<'_, I>,
    owner: ClassId,
    parameters: &[Param],
    supertype_ctor_arguments: &[Expr],
) -> CompileResult<()> {
    compile_super_ctor_call(builder, owner, supertype_ctor_arguments)?;
    store_constructor_field_parameters(builder, owner, parameters);
    if let Some(initializer) = builder.package.class(owner).initializer {
        builder.load_this();
        builder.add(Instr::CallG(1, initializer));
        builder.drop();
    }
    finish_function(builder, Mode::ForEffect);
    Ok(())
}

/// Compiles a class's initializer (GLOSSARY "Initializer"): assigns each of this
/// class's own fields that declared an initializer expression, in field order,
/// then returns. Inherited fields are the superclass's own initializer's concern;
/// `own_fields` only ever names fields declared directly on `owner`.
pub fn compile_initializer<I: Info>(
    builder: &mut Builder<'_, I>,
    owner: ClassId,
    own_fields: &[(u32, Expr)],
) -> CompileResult<()> {
    for (field_index, init_expr) in own_fields {
        builder.lower(init_expr, Mode::ForValue)?;
        builder.load_this();
        builder.store_field(owner, *field_index);
    }
    finish_function(builder, Mode::ForEffect);
    Ok(())
}

/// Emits one of the canned bodies a synthesized context/closure constructor gets
/// instead of an AST body (spec's compile hints).
pub fn compile_with_hint<I: Info>(builder: &mut Builder<'_, I>, hint: CompileHint, owner: ClassId) {
    match hint {
        CompileHint::ContextCtor => {
            // A context's fields are written by the scope that creates it, right
            // after allocation; the constructor itself has nothing to do.
            builder.unit();
            builder.ret();
        }
        CompileHint::ClosureCtor => {
            let fields = builder.package.class(owner).fields.clone();
            for (i, field) in fields.iter().enumerate() {
                let param_index = i as i32 + 1; // skip the receiver
                builder.ldlocal(param_index);
                builder.load_this();
                builder.store_field(owner, field.index);
            }
            builder.unit();
            builder.ret();
        }
    }
}

fn compile_delegating_call<I: Info>(
    builder: &mut Builder<'_, I>,
    call_id: NodeId,
    arguments: &[Expr],
) -> CompileResult<()> {
    let defn_info = builder
        .info
        .use_info(call_id)
        .expect("a delegating call must resolve to a constructor")
        .defn_info
        .clone();
    let IrDefn::Function(ctor) = defn_info.defn else {
        unreachable!("a delegating call always resolves to a constructor function")
    };
    builder.load_this();
    for arg in arguments {
        builder.lower(arg, Mode::ForValue)?;
    }
    builder.add(Instr::CallG(arguments.len() as u32 + 1, ctor));
    builder.drop();
    Ok(())
}

/// Calls the superclass constructor matching `arguments`' arity (receiver
/// included). With no arguments this is the implicit default super call every
/// constructor without its own `super(...)` gets; with some, it's a primary
/// constructor's `<: Super(...)` clause.
fn compile_super_ctor_call<I: Info>(
    builder: &mut Builder<'_, I>,
    owner: ClassId,
    arguments: &[Expr],
) -> CompileResult<()> {
    let superclass = builder
        .package
        .class(owner)
        .supertype
        .as_ref()
        .and_then(Type::class_id)
        .expect("every non-root class has a supertype");
    let ctors: &[crate::ir::FunctionId] = if superclass.is_builtin() {
        &builder.builtins.class(superclass).constructors
    } else {
        &builder.package.class(superclass).constructors
    };
    let arity = arguments.len() + 1;
    let ctor = ctors.iter().copied().find(|&ctor| {
        let f = if ctor.is_builtin() {
            builder.builtins.function(ctor)
        } else {
            builder.package.function(ctor)
        };
        f.parameter_types.len() == arity
    });
    let ctor = ctor.ok_or_else(|| {
        let name = if superclass.is_builtin() {
            builder.builtins.class(superclass).name.clone()
        } else {
            builder.package.class(superclass).name.clone()
        };
        CompileError::MissingDefaultSuperCtor { superclass: name }
    })?;
    builder.load_this();
    for arg in arguments {
        builder.lower(arg, Mode::ForValue)?;
    }
    builder.add(Instr::CallG(arity as u32, ctor));
    builder.drop();
    Ok(())
}

/// Stores each `is_constructor_field` parameter into its matching field (spec §4.3:
/// a primary-constructor parameter declared `var`/`val` is also a field,
/// initialized implicitly). Parameter indices aren't looked up through `Info` —
/// `ast::Param` has no node id of its own — but they don't need to be: positions in
/// `parameters` are exactly the positions `Function::add_parameter` assigned them,
/// offset by one for the receiver.
fn store_constructor_field_parameters<I: Info>(
    builder: &mut Builder<'_, I>,
    owner: ClassId,
    parameters: &[Param],
) {
    for (i, param) in parameters.iter().enumerate() {
        if !param.is_constructor_field {
            continue;
        }
        let field_index = builder
            .package
            .class(owner)
            .find_field(&param.name)
            .expect("a constructor-field parameter must have a matching field");
        builder.ldlocal(i as i32 + 1); // skip the receiver
        builder.load_this();
        builder.store_field(owner, field_index);
    }
}

/// Creates this scope's context (if anything inside it is captured), builds
/// closures for any nested function declarations, then lowers `statements` as a
/// block in `mode`.
fn compile_statements<I: Info>(
    builder: &mut Builder<'_, I>,
    scope_id: crate::ast::ScopeId,
    statements: &[Expr],
    mode: Mode,
) -> CompileResult<()> {
    if let Some(context_info) = builder.info.context_info(scope_id) {
        builder.create_context(context_info.id, context_info.context_class);
    }
    build_declarations(builder, statements)?;
    builder.lower_block(statements, mode)
}

/// Instantiates the closure object for each nested `FunctionDeclaration` statement
/// that captures something from this scope (spec §4.5). A declaration whose
/// function captures nothing has no `closure_class` and needs nothing built.
fn build_declarations<I: Info>(builder: &mut Builder<'_, I>, statements: &[Expr]) -> CompileResult<()> {
    for stmt in statements {
        let Expr::FunctionDeclaration { id, .. } = stmt else { continue };
        let closure_info = builder
            .info
            .closure_info(*id)
            .expect("a nested function declaration must have closure info");
        let Some(closure_class) = closure_info.closure_class else { continue };
        let closure_var = closure_info
            .closure_var
            .as_ref()
            .expect("a closure class implies a variable to hold the instance")
            .clone();
        let ctor = if closure_class.is_builtin() {
            builder.builtins.class(closure_class).constructors[0]
        } else {
            builder.package.class(closure_class).constructors[0]
        };
        builder.add(Instr::AllocObj(closure_class));
        builder.dup();
        for scope in &closure_info.captured_scopes {
            builder.load_context(*scope);
        }
        let arity = closure_info.captured_scopes.len() as u32 + 1;
        builder.add(Instr::CallG(arity, ctor));
        builder.drop();
        builder.store_defn(&closure_var);
    }
    Ok(())
}

fn finish_function<I: Info>(builder: &mut Builder<'_, I>, mode: Mode) {
    if !builder.unreachable {
        if mode == Mode::ForEffect {
            builder.unit();
        }
        builder.ret();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnalysisInfo, DefnInfo, ScopeId, UseInfo};
    use crate::builtins::BuiltinRegistry;
    use crate::ir::{Function, Package};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn setup() -> (Package, BuiltinRegistry) {
        (Package::new("test"), BuiltinRegistry::load().unwrap())
    }

    #[test]
    fn identity_function_compiles_to_one_block() {
        let (package, builtins) = setup();
        let mut info = AnalysisInfo::default();
        let param_node = NodeId(1);
        info.defn_infos.insert(
            param_node,
            DefnInfo { defn: IrDefn::Variable(0), scope_id: ScopeId(0) },
        );
        let var_node = NodeId(2);
        info.use_infos.insert(
            var_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Variable(0), scope_id: ScopeId(0) } },
        );

        let mut function = Function::new("f", Type::i32());
        function.add_parameter("x", Type::i32());
        let string_ids = HashMap::new();
        let defn = FunctionDefn {
            id: NodeId(0),
            name: "f".to_string(),
            return_type: Type::i32(),
            parameters: vec![Param { name: "x".to_string(), ty: Type::i32(), is_constructor_field: false }],
            body: Some(Expr::Variable { id: var_node }),
            is_constructor: false,
            delegating_call: None,
        };

        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);
        compile_function(&mut builder, &defn).unwrap();
        let function = builder.finish();
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].instructions, vec![Instr::LdLocal(0), Instr::Ret]);
    }

    #[test]
    fn function_with_no_statements_compiles_to_unit_ret() {
        let (package, builtins) = setup();
        let info = AnalysisInfo::default();
        let string_ids = HashMap::new();
        let function = Function::new("f", Type::Unit);
        let defn = FunctionDefn {
            id: NodeId(0),
            name: "f".to_string(),
            return_type: Type::Unit,
            parameters: vec![],
            body: Some(Expr::Block { id: NodeId(1), statements: vec![] }),
            is_constructor: false,
            delegating_call: None,
        };

        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);
        compile_function(&mut builder, &defn).unwrap();
        let function = builder.finish();
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.blocks[0].instructions, vec![Instr::Unit, Instr::Ret]);
    }

    #[test]
    fn missing_body_is_an_error() {
        let (package, builtins) = setup();
        let info = AnalysisInfo::default();
        let string_ids = HashMap::new();
        let function = Function::new("f", Type::Unit);
        let defn = FunctionDefn {
            id: NodeId(0),
            name: "f".to_string(),
            return_type: Type::Unit,
            parameters: vec![],
            body: None,
            is_constructor: false,
            delegating_call: None,
        };
        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);
        assert!(matches!(compile_function(&mut builder, &defn), Err(CompileError::MissingBody { .. })));
    }

    #[test]
    fn primary_constructor_stores_field_then_calls_initializer() {
        let (mut package, builtins) = setup();
        let root = builtins.root_class();
        let initializer = package.add_function(Function::new("$initializer", Type::Unit));

        let mut class = crate::ir::Class::new("C");
        class.supertype = Some(Type::class(root, vec![]));
        class.fields = vec![crate::ir::Field { name: "x".to_string(), ty: Type::i32(), index: 0 }];
        class.initializer = Some(initializer);
        let class_id = package.add_class(class);

        let mut ctor_function = Function::new("$constructor", Type::Unit);
        ctor_function.owner = Some(class_id);
        ctor_function.flags = crate::ir::FunctionFlags::CONSTRUCTOR;
        ctor_function.add_parameter("this", Type::class(class_id, vec![]));
        ctor_function.add_parameter("x", Type::i32());

        let ctor_defn = FunctionDefn {
            id: NodeId(0),
            name: "$constructor".to_string(),
            return_type: Type::Unit,
            parameters: vec![Param { name: "x".to_string(), ty: Type::i32(), is_constructor_field: true }],
            body: None,
            is_constructor: true,
            delegating_call: None,
        };

        let info = AnalysisInfo::default();
        let string_ids = HashMap::new();
        let mut builder = Builder::new(ctor_function, &package, &builtins, &info, NodeId(0), &string_ids);
        compile_constructor(&mut builder, class_id, &ctor_defn).unwrap();
        let function = builder.finish();

        let root_default_ctor = builtins.class(root).constructors[0];
        assert_eq!(
            function.blocks[0].instructions,
            vec![
                Instr::LdLocal(0),
                Instr::CallG(1, root_default_ctor),
                Instr::Drop,
                Instr::LdLocal(1),
                Instr::LdLocal(0),
                Instr::St32(0),
                Instr::LdLocal(0),
                Instr::CallG(1, initializer),
                Instr::Drop,
                Instr::Unit,
                Instr::Ret,
            ]
        );
    }

    #[test]
    fn missing_default_super_ctor_is_an_error() {
        let (mut package, builtins) = setup();
        let root = builtins.root_class();

        let mut superclass = crate::ir::Class::new("NoDefaultCtor");
        superclass.supertype = Some(Type::class(root, vec![]));
        let only_ctor = package.add_function({
            let mut f = Function::new("$constructor", Type::Unit);
            f.flags = crate::ir::FunctionFlags::CONSTRUCTOR;
            f.parameter_types = vec![Type::class(root, vec![]), Type::i32()];
            f
        });
        superclass.constructors = vec![only_ctor];
        let super_id = package.add_class(superclass);

        let mut class = crate::ir::Class::new("C");
        class.supertype = Some(Type::class(super_id, vec![]));
        let class_id = package.add_class(class);

        let mut ctor_function = Function::new("$constructor", Type::Unit);
        ctor_function.owner = Some(class_id);
        ctor_function.flags = crate::ir::FunctionFlags::CONSTRUCTOR;
        ctor_function.add_parameter("this", Type::class(class_id, vec![]));

        let ctor_defn = FunctionDefn {
            id: NodeId(0),
            name: "$constructor".to_string(),
            return_type: Type::Unit,
            parameters: vec![],
            body: None,
            is_constructor: true,
            delegating_call: None,
        };

        let info = AnalysisInfo::default();
        let string_ids = HashMap::new();
        let mut builder = Builder::new(ctor_function, &package, &builtins, &info, NodeId(0), &string_ids);
        let result = compile_constructor(&mut builder, class_id, &ctor_defn);
        assert!(matches!(result, Err(CompileError::MissingDefaultSuperCtor { .. })));
    }

    #[test]
    fn context_ctor_hint_is_unit_ret() {
        let (package, builtins) = setup();
        let info = AnalysisInfo::default();
        let string_ids = HashMap::new();
        let function = Function::new("$context_ctor", Type::Unit);
        let mut builder = Builder::new(function, &package, &builtins, &info, NodeId(0), &string_ids);
        compile_with_hint(&mut builder, CompileHint::ContextCtor, builtins.root_class());
        let function = builder.finish();
        assert_eq!(function.blocks[0].instructions, vec![Instr::Unit, Instr::Ret]);
    }

    #[test]
    fn primary_constructor_passes_its_argument_to_the_superclass_constructor() {
        let (mut package, builtins) = setup();
        let root = builtins.root_class();

        let mut superclass = crate::ir::Class::new("Super");
        superclass.supertype = Some(Type::class(root, vec![]));
        let super_ctor = package.add_function({
            let mut f = Function::new("$constructor", Type::Unit);
            f.flags = crate::ir::FunctionFlags::CONSTRUCTOR;
            f.parameter_types = vec![Type::class(root, vec![]), Type::i32()];
            f
        });
        superclass.constructors = vec![super_ctor];
        let super_id = package.add_class(superclass);

        let mut class = crate::ir::Class::new("Sub");
        class.supertype = Some(Type::class(super_id, vec![]));
        let class_id = package.add_class(class);

        let mut ctor_function = Function::new("$constructor", Type::Unit);
        ctor_function.owner = Some(class_id);
        ctor_function.flags = crate::ir::FunctionFlags::CONSTRUCTOR;
        ctor_function.add_parameter("this", Type::class(class_id, vec![]));
        ctor_function.add_parameter("x", Type::i32());

        let parameters = vec![Param { name: "x".to_string(), ty: Type::i32(), is_constructor_field: false }];
        let arg_node = NodeId(1);
        let mut info = AnalysisInfo::default();
        info.defn_infos.insert(
            arg_node,
            DefnInfo { defn: IrDefn::Variable(1), scope_id: ScopeId(0) },
        );
        info.use_infos.insert(
            arg_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Variable(1), scope_id: ScopeId(0) } },
        );
        let supertype_ctor_arguments = vec![Expr::Variable { id: arg_node }];

        let string_ids = HashMap::new();
        let mut builder = Builder::new(ctor_function, &package, &builtins, &info, NodeId(0), &string_ids);
        compile_primary_constructor(&mut builder, class_id, &parameters, &supertype_ctor_arguments).unwrap();
        let function = builder.finish();

        assert_eq!(
            function.blocks[0].instructions,
            vec![
                Instr::LdLocal(0),
                Instr::LdLocal(1),
                Instr::CallG(2, super_ctor),
                Instr::Drop,
                Instr::Unit,
                Instr::Ret,
            ]
        );
    }
}
