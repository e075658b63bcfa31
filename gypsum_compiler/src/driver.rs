//! The top-level compilation driver (spec §5, §6): turns one module's top-level
//! class and function declarations into a finished [`Package`] and serializes it.
//!
//! Three passes, in order:
//!
//! 1. *Declare*: every class and function gets its id by being appended to the
//!    package (`Package::add_class`/`add_function`), so cross-references baked
//!    into `Info` by upstream analysis resolve regardless of which order bodies
//!    are later lowered in. Synthesized context/closure classes, if any, are
//!    declared first; user classes and free functions follow, in the order the
//!    caller lists them — callers must list a superclass before its subclasses,
//!    since field/method layout for a class depends on its supertype's already
//!    being assigned.
//! 2. *Lay out*: `crate::layout` assigns each user class's field and method
//!    tables, and a class's initializer function — covering its own fields'
//!    initializer expressions — is synthesized and declared alongside it.
//! 3. *Lower*: `intern_string_literals` interns every string literal up front,
//!    then each function body (or compile hint) is lowered by a fresh
//!    `cfg::Builder` and its blocks reordered (`cfg::order_blocks`).
//!
//! Lowering a function's body only reads the by-then-immutable rest of the
//! package; nothing about it depends on the order functions are lowered in, so a
//! caller with a large module is free to fan step 3 out across threads (spec
//! §5). This driver runs it sequentially, which is simpler and keeps the binary
//! package's contents deterministic without having to sort a thread pool's
//! output back into declaration order.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::ast::{ClassDefn, Expr, FunctionDefn, Info, Literal, NodeId, Param, Pattern, PartialFunctionCase};
use crate::builtins::BuiltinRegistry;
use crate::cfg::{self, Builder};
use crate::error::CompileResult;
use crate::ir::{Class, ClassId, CompileHint, Function, FunctionFlags, FunctionId, Package, StringId, Type};
use crate::layout::{self, OwnMembers};

/// One synthesized context or closure class (spec §4.5): its fields and
/// constructor are already fully determined by upstream closure analysis, which
/// is why this carries finished `(name, type)` pairs rather than a `ClassDefn`
/// a declaration pass would still need to resolve.
#[derive(Debug, Clone)]
pub struct SyntheticClass {
    pub name: String,
    pub supertype: Type,
    pub fields: Vec<(String, Type)>,
    pub hint: CompileHint,
}

/// The top-level declarations one compilation unit contributes (spec §6's input
/// contract): already-parsed, already-typed AST, with no parser or source text
/// in sight. `functions` is flat and includes every nested function declaration
/// alongside top-level ones; a nested `FunctionDeclaration` statement refers
/// back into it by the `FunctionId` its entry is declared with.
#[derive(Debug, Default)]
pub struct SourceModule {
    pub name: String,
    pub synthetic_classes: Vec<SyntheticClass>,
    pub classes: Vec<ClassDefn>,
    pub functions: Vec<FunctionDefn>,
    /// The function this package should record as its entry point, if any.
    pub entry_function_name: Option<String>,
}

enum FunctionSource<'a> {
    Free(&'a FunctionDefn),
    Method(&'a FunctionDefn),
    Constructor { owner: ClassId, defn: &'a FunctionDefn },
    PrimaryConstructor {
        owner: ClassId,
        parameters: &'a [Param],
        supertype_ctor_arguments: &'a [Expr],
    },
    Initializer { owner: ClassId, own_fields: Vec<(u32, Expr)> },
    Hint(CompileHint, ClassId),
}

struct CompileUnit<'a> {
    function_id: FunctionId,
    scope_defn: NodeId,
    source: FunctionSource<'a>,
}

/// A placeholder for the wrapper around `NodeId` a compile hint's builder gets:
/// hint bodies never call `load_context`/`create_context`, so no real scope node
/// is needed to back it.
const NO_SCOPE: NodeId = NodeId(u32::MAX);

/// Builds a [`Package`] from `module`'s declarations and lowers every function
/// body into it. `builtins` is threaded through explicitly, same as
/// `cfg::Builder::new`, rather than reached for through the process-wide
/// accessor, so compiling two unrelated modules never contend on the same lock.
pub fn compile_module<I: Info>(
    module: &SourceModule,
    info: &I,
    builtins: &BuiltinRegistry,
) -> CompileResult<Package> {
    let mut package = Package::new(module.name.clone());
    let mut units: Vec<CompileUnit> = Vec::new();

    for synth in &module.synthetic_classes {
        declare_synthetic_class(&mut package, &mut units, synth);
    }

    let class_ids: Vec<ClassId> = module
        .classes
        .iter()
        .map(|class_defn| {
            let mut class = Class::new(class_defn.name.clone());
            class.supertype = class_defn.supertype.clone();
            package.add_class(class)
        })
        .collect();

    for (class_defn, &class_id) in module.classes.iter().zip(&class_ids) {
        declare_class_members(&mut package, info, &mut units, class_defn, class_id, builtins);
    }

    for defn in &module.functions {
        let function_id = declare_function(&mut package, info, defn, None, FunctionFlags::empty(), None);
        units.push(CompileUnit {
            function_id,
            scope_defn: defn.id,
            source: FunctionSource::Free(defn),
        });
    }

    if let Some(name) = &module.entry_function_name {
        package.entry_function = package.find_function_by_name(name);
    }

    let string_ids = intern_string_literals(&mut package, module);

    for unit in units {
        lower_unit(&mut package, builtins, info, &string_ids, unit)?;
    }

    Ok(package)
}

fn declare_synthetic_class<'a>(
    package: &mut Package,
    units: &mut Vec<CompileUnit<'a>>,
    synth: &SyntheticClass,
) {
    let mut class = Class::new(synth.name.clone());
    class.supertype = Some(synth.supertype.clone());
    let class_id = package.add_class(class);

    let mut ctor = Function::new("$constructor", Type::Unit);
    ctor.owner = Some(class_id);
    ctor.flags = FunctionFlags::METHOD | FunctionFlags::CONSTRUCTOR;
    ctor.compile_hint = Some(synth.hint);
    ctor.add_parameter("this", Type::class(class_id, vec![]));
    for (name, ty) in &synth.fields {
        ctor.add_parameter(name.clone(), ty.clone());
    }
    let ctor_id = package.add_function(ctor);
    units.push(CompileUnit {
        function_id: ctor_id,
        scope_defn: NO_SCOPE,
        source: FunctionSource::Hint(synth.hint, class_id),
    });

    let class = package.class_mut(class_id);
    for (name, ty) in &synth.fields {
        class.add_field(name.clone(), ty.clone());
    }
    class.constructors = vec![ctor_id];
}

fn declare_class_members<'a, I: Info>(
    package: &mut Package,
    info: &I,
    units: &mut Vec<CompileUnit<'a>>,
    class_defn: &'a ClassDefn,
    class_id: ClassId,
    builtins: &BuiltinRegistry,
) {
    let receiver_ty = Type::class(class_id, vec![]);

    let mut own_fields: Vec<(String, Type)> = Vec::new();
    if let Some(params) = &class_defn.primary_constructor_parameters {
        for param in params {
            if param.is_constructor_field {
                own_fields.push((param.name.clone(), param.ty.clone()));
            }
        }
    }
    for (name, ty, _) in &class_defn.fields {
        own_fields.push((name.clone(), ty.clone()));
    }

    let mut own_method_ids = Vec::with_capacity(class_defn.methods.len());
    for method_defn in &class_defn.methods {
        let function_id = declare_function(
            package,
            info,
            method_defn,
            Some(class_id),
            FunctionFlags::METHOD,
            Some(receiver_ty.clone()),
        );
        own_method_ids.push(function_id);
        units.push(CompileUnit {
            function_id,
            scope_defn: method_defn.id,
            source: FunctionSource::Method(method_defn),
        });
    }

    let mut ctor_ids = Vec::new();
    if let Some(parameters) = &class_defn.primary_constructor_parameters {
        let function_id = declare_constructor_shell(package, parameters, class_id, &receiver_ty);
        ctor_ids.push(function_id);
        units.push(CompileUnit {
            function_id,
            scope_defn: class_defn.id,
            source: FunctionSource::PrimaryConstructor {
                owner: class_id,
                parameters,
                supertype_ctor_arguments: &class_defn.supertype_ctor_arguments,
            },
        });
    }
    for ctor_defn in &class_defn.constructors {
        let function_id = declare_function(
            package,
            info,
            ctor_defn,
            Some(class_id),
            FunctionFlags::METHOD | FunctionFlags::CONSTRUCTOR,
            Some(receiver_ty.clone()),
        );
        ctor_ids.push(function_id);
        units.push(CompileUnit {
            function_id,
            scope_defn: ctor_defn.id,
            source: FunctionSource::Constructor { owner: class_id, defn: ctor_defn },
        });
    }

    let superclass = class_defn.supertype.as_ref().and_then(Type::class_id);
    let overrides = layout::resolve_overrides(package, builtins, superclass, &own_method_ids);
    let own = OwnMembers { fields: own_fields, methods: own_method_ids };
    {
        let mut class = package.class(class_id).clone();
        layout::assign_fields(package, builtins, &mut class, &own);
        layout::assign_methods(package, builtins, &mut class, &own, &overrides);
        class.constructors = ctor_ids;
        *package.class_mut(class_id) = class;
    }

    let mut initializer_fields = Vec::new();
    for (name, _, init_expr) in &class_defn.fields {
        if let Some(expr) = init_expr {
            let field_index = package
                .class(class_id)
                .find_field(name)
                .expect("a field with an initializer was just assigned an index above");
            initializer_fields.push((field_index, expr.clone()));
        }
    }
    let initializer_id = declare_initializer_shell(package, class_id, &receiver_ty);
    units.push(CompileUnit {
        function_id: initializer_id,
        scope_defn: class_defn.id,
        source: FunctionSource::Initializer { owner: class_id, own_fields: initializer_fields },
    });
    package.class_mut(class_id).initializer = Some(initializer_id);
}

fn declare_constructor_shell(
    package: &mut Package,
    parameters: &[Param],
    owner: ClassId,
    receiver_ty: &Type,
) -> FunctionId {
    let mut function = Function::new("$constructor", Type::Unit);
    function.owner = Some(owner);
    function.flags = FunctionFlags::METHOD | FunctionFlags::CONSTRUCTOR;
    function.add_parameter("this", receiver_ty.clone());
    for param in parameters {
        function.add_parameter(param.name.clone(), param.ty.clone());
    }
    package.add_function(function)
}

fn declare_initializer_shell(package: &mut Package, owner: ClassId, receiver_ty: &Type) -> FunctionId {
    let mut function = Function::new("$initializer", Type::Unit);
    function.owner = Some(owner);
    function.flags = FunctionFlags::METHOD;
    function.add_parameter("this", receiver_ty.clone());
    package.add_function(function)
}

/// Declares an ordinary function or method: adds its parameters (with a
/// receiver first, for methods and constructors), then walks its body
/// enumerating local-variable slots in the same declaration order `Info`'s
/// `Variable` indices were assigned in (spec §4.4's down-counter).
fn declare_function<I: Info>(
    package: &mut Package,
    info: &I,
    defn: &FunctionDefn,
    owner: Option<ClassId>,
    flags: FunctionFlags,
    receiver_ty: Option<Type>,
) -> FunctionId {
    let mut function = Function::new(defn.name.clone(), defn.return_type.clone());
    function.owner = owner;
    function.flags = flags;
    if let Some(ty) = receiver_ty {
        function.add_parameter("this", ty);
    }
    for param in &defn.parameters {
        function.add_parameter(param.name.clone(), param.ty.clone());
    }
    // `compile_statements` synthesizes this scope's context object, if it has one,
    // before lowering any of the body's own statements (`cfg::prologue`) — declaring
    // its local here first keeps the slot index this function's `add_local` calls
    // produce lined up with the index already baked into `ClosureInfo.contexts` by
    // upstream closure analysis.
    if let Some(context_info) = info.context_info(defn.id.as_scope()) {
        function.add_local("$context", Type::class(context_info.context_class, vec![]));
    }
    if let Some(call) = &defn.delegating_call {
        declare_locals(&mut function, info, call);
    }
    if let Some(body) = &defn.body {
        declare_locals(&mut function, info, body);
    }
    package.add_function(function)
}

fn declare_locals<I: Info>(function: &mut Function, info: &I, expr: &Expr) {
    match expr {
        Expr::Block { statements, .. } => {
            for stmt in statements {
                declare_locals(function, info, stmt);
            }
        }
        Expr::VariableDefinition { pattern, value, .. } => {
            if let Some(v) = value {
                declare_locals(function, info, v);
            }
            declare_pattern_local(function, info, pattern);
        }
        Expr::Assign { lhs, rhs, .. } | Expr::CompoundAssign { lhs, rhs, .. } => {
            declare_locals(function, info, lhs);
            declare_locals(function, info, rhs);
        }
        Expr::Property { receiver, .. } => declare_locals(function, info, receiver),
        Expr::Call { callee, arguments, .. } => {
            declare_locals(function, info, callee);
            for arg in arguments {
                declare_locals(function, info, arg);
            }
        }
        Expr::Unary { operand, .. } => declare_locals(function, info, operand),
        Expr::Binary { left, right, .. } => {
            declare_locals(function, info, left);
            declare_locals(function, info, right);
        }
        Expr::If { condition, then_branch, else_branch, .. } => {
            declare_locals(function, info, condition);
            declare_locals(function, info, then_branch);
            if let Some(e) = else_branch {
                declare_locals(function, info, e);
            }
        }
        Expr::While { condition, body, .. } => {
            declare_locals(function, info, condition);
            declare_locals(function, info, body);
        }
        Expr::Throw { exception, .. } => declare_locals(function, info, exception),
        Expr::TryCatch { body, catch, finally, .. } => {
            declare_locals(function, info, body);
            if let Some(cases) = catch {
                for case in cases {
                    declare_case_locals(function, info, case);
                }
            }
            if let Some(f) = finally {
                declare_locals(function, info, f);
            }
        }
        Expr::PartialFunction { scrutinee, cases, .. } => {
            declare_locals(function, info, scrutinee);
            for case in cases {
                declare_case_locals(function, info, case);
            }
        }
        Expr::Return { value, .. } => {
            if let Some(v) = value {
                declare_locals(function, info, v);
            }
        }
        // Its own scope; declared and lowered as a separate compile unit.
        Expr::FunctionDeclaration { .. } => {}
        Expr::Literal { .. } | Expr::Variable { .. } | Expr::This { .. } | Expr::Super { .. } => {}
    }
}

fn declare_case_locals<I: Info>(function: &mut Function, info: &I, case: &PartialFunctionCase) {
    declare_pattern_local(function, info, &case.pattern);
    if let Some(guard) = &case.guard {
        declare_locals(function, info, guard);
    }
    declare_locals(function, info, &case.body);
}

fn declare_pattern_local<I: Info>(function: &mut Function, info: &I, pattern: &Pattern) {
    match pattern {
        Pattern::Variable { id, name, ty } => {
            let resolved = ty.clone().or_else(|| info.get_type(*id).cloned()).unwrap_or(Type::Unit);
            function.add_local(name.clone(), resolved);
        }
        Pattern::Typed { name, ty, .. } => {
            function.add_local(name.clone(), ty.clone());
        }
        Pattern::Blank => {}
    }
}

/// Interns every string literal reachable from `module`'s functions and classes,
/// keyed by the literal's own node id (`crate::ast::NodeId`), into `package`'s
/// string table, before any function body is lowered against it. Kept as a
/// dedicated pass rather than interning lazily inside the builder itself so the
/// builder only ever needs a shared `&Package` (spec §5 — see
/// `cfg::Builder::string_ids`).
fn intern_string_literals(package: &mut Package, module: &SourceModule) -> HashMap<NodeId, StringId> {
    let mut ids = HashMap::new();
    let mut visit = |expr: &Expr, package: &mut Package, ids: &mut HashMap<NodeId, StringId>| {
        walk_string_literals(expr, package, ids);
    };
    for defn in &module.functions {
        if let Some(call) = &defn.delegating_call {
            visit(call, package, &mut ids);
        }
        if let Some(body) = &defn.body {
            visit(body, package, &mut ids);
        }
    }
    for class_defn in &module.classes {
        for (_, _, init) in &class_defn.fields {
            if let Some(expr) = init {
                visit(expr, package, &mut ids);
            }
        }
        for arg in &class_defn.supertype_ctor_arguments {
            visit(arg, package, &mut ids);
        }
        for method in &class_defn.methods {
            if let Some(call) = &method.delegating_call {
                visit(call, package, &mut ids);
            }
            if let Some(body) = &method.body {
                visit(body, package, &mut ids);
            }
        }
        for ctor in &class_defn.constructors {
            if let Some(call) = &ctor.delegating_call {
                visit(call, package, &mut ids);
            }
            if let Some(body) = &ctor.body {
                visit(body, package, &mut ids);
            }
        }
    }
    ids
}

fn walk_string_literals(expr: &Expr, package: &mut Package, ids: &mut HashMap<NodeId, StringId>) {
    match expr {
        Expr::Literal { id, value: Literal::String(s) } => {
            ids.insert(*id, package.find_or_add_string(s));
        }
        Expr::Literal { .. } | Expr::Variable { .. } | Expr::This { .. } | Expr::Super { .. } => {}
        Expr::Block { statements, .. } => {
            for stmt in statements {
                walk_string_literals(stmt, package, ids);
            }
        }
        Expr::VariableDefinition { value, .. } => {
            if let Some(v) = value {
                walk_string_literals(v, package, ids);
            }
        }
        Expr::Assign { lhs, rhs, .. } | Expr::CompoundAssign { lhs, rhs, .. } => {
            walk_string_literals(lhs, package, ids);
            walk_string_literals(rhs, package, ids);
        }
        Expr::Property { receiver, .. } => walk_string_literals(receiver, package, ids),
        Expr::Call { callee, arguments, .. } => {
            walk_string_literals(callee, package, ids);
            for arg in arguments {
                walk_string_literals(arg, package, ids);
            }
        }
        Expr::Unary { operand, .. } => walk_string_literals(operand, package, ids),
        Expr::Binary { left, right, .. } => {
            walk_string_literals(left, package, ids);
            walk_string_literals(right, package, ids);
        }
        Expr::If { condition, then_branch, else_branch, .. } => {
            walk_string_literals(condition, package, ids);
            walk_string_literals(then_branch, package, ids);
            if let Some(e) = else_branch {
                walk_string_literals(e, package, ids);
            }
        }
        Expr::While { condition, body, .. } => {
            walk_string_literals(condition, package, ids);
            walk_string_literals(body, package, ids);
        }
        Expr::Throw { exception, .. } => walk_string_literals(exception, package, ids),
        Expr::TryCatch { body, catch, finally, .. } => {
            walk_string_literals(body, package, ids);
            if let Some(cases) = catch {
                for case in cases {
                    walk_case_string_literals(case, package, ids);
                }
            }
            if let Some(f) = finally {
                walk_string_literals(f, package, ids);
            }
        }
        Expr::PartialFunction { scrutinee, cases, .. } => {
            walk_string_literals(scrutinee, package, ids);
            for case in cases {
                walk_case_string_literals(case, package, ids);
            }
        }
        Expr::Return { value, .. } => {
            if let Some(v) = value {
                walk_string_literals(v, package, ids);
            }
        }
        Expr::FunctionDeclaration { .. } => {}
    }
}

fn walk_case_string_literals(case: &PartialFunctionCase, package: &mut Package, ids: &mut HashMap<NodeId, StringId>) {
    if let Some(guard) = &case.guard {
        walk_string_literals(guard, package, ids);
    }
    walk_string_literals(&case.body, package, ids);
}

fn lower_unit<I: Info>(
    package: &mut Package,
    builtins: &BuiltinRegistry,
    info: &I,
    string_ids: &HashMap<NodeId, StringId>,
    unit: CompileUnit<'_>,
) -> CompileResult<()> {
    let placeholder = Function::new("", Type::Unit);
    let function = std::mem::replace(package.function_mut(unit.function_id), placeholder);
    let mut builder = Builder::new(function, package, builtins, info, unit.scope_defn, string_ids);

    match unit.source {
        FunctionSource::Free(defn) | FunctionSource::Method(defn) => {
            cfg::compile_function(&mut builder, defn)?;
        }
        FunctionSource::Constructor { owner, defn } => {
            cfg::compile_constructor(&mut builder, owner, defn)?;
        }
        FunctionSource::PrimaryConstructor { owner, parameters, supertype_ctor_arguments } => {
            cfg::compile_primary_constructor(&mut builder, owner, parameters, supertype_ctor_arguments)?;
        }
        FunctionSource::Initializer { owner, own_fields } => {
            cfg::compile_initializer(&mut builder, owner, &own_fields)?;
        }
        FunctionSource::Hint(hint, owner) => {
            cfg::compile_with_hint(&mut builder, hint, owner);
        }
    }

    let mut function = builder.finish();
    cfg::order_blocks(&mut function);
    *package.function_mut(unit.function_id) = function;
    Ok(())
}

/// Writes `package`'s serialized form to `path`, or to standard output when
/// `path` is `"-"` (spec §6). The file (when not stdout) is opened right before
/// the write and closed by the end of this call on every path, including an
/// error return, since `File` and `BufWriter` both drop at the end of scope
/// regardless of how the function exits.
pub fn write_to_path(package: &Package, builtins: &BuiltinRegistry, path: &str) -> CompileResult<()> {
    if path == "-" {
        let mut out = io::stdout().lock();
        crate::serialize::write_package(package, builtins, &mut out)?;
        out.flush()?;
    } else {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        crate::serialize::write_package(package, builtins, &mut out)?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnalysisInfo, DefnInfo, IrDefn, Mode, ScopeId, UseInfo};
    use crate::bytecode::Instr;

    fn registry() -> BuiltinRegistry {
        BuiltinRegistry::load().unwrap()
    }

    #[test]
    fn compiles_a_single_free_function_to_one_block() {
        let builtins = registry();
        let param_node = NodeId(1);
        let var_node = NodeId(2);
        let mut info = AnalysisInfo::default();
        info.defn_infos.insert(
            param_node,
            DefnInfo { defn: IrDefn::Variable(0), scope_id: ScopeId(0) },
        );
        info.use_infos.insert(
            var_node,
            UseInfo { defn_info: DefnInfo { defn: IrDefn::Variable(0), scope_id: ScopeId(0) } },
        );

        let defn = FunctionDefn {
            id: NodeId(0),
            name: "identity".to_string(),
            return_type: Type::i32(),
            parameters: vec![Param { name: "x".to_string(), ty: Type::i32(), is_constructor_field: false }],
            body: Some(Expr::Variable { id: var_node }),
            is_constructor: false,
            delegating_call: None,
        };
        let module = SourceModule {
            name: "test".to_string(),
            functions: vec![defn],
            entry_function_name: Some("identity".to_string()),
            ..Default::default()
        };

        let package = compile_module(&module, &info, &builtins).unwrap();
        assert_eq!(package.functions.len(), 1);
        let entry = package.entry_function.unwrap();
        assert_eq!(package.function(entry).name, "identity");
        assert_eq!(
            package.function(entry).blocks[0].instructions,
            vec![Instr::LdLocal(0), Instr::Ret]
        );
    }

    #[test]
    fn class_with_field_initializer_gets_a_nontrivial_initializer() {
        let builtins = registry();
        let mut info = AnalysisInfo::default();
        let literal_node = NodeId(10);
        info.types.insert(literal_node, Type::i32());
        let class_defn = ClassDefn {
            id: NodeId(0),
            name: "Counter".to_string(),
            supertype: Some(Type::class(builtins.root_class(), vec![])),
            supertype_ctor_arguments: vec![],
            primary_constructor_parameters: Some(vec![]),
            fields: vec![(
                "count".to_string(),
                Type::i32(),
                Some(Expr::Literal { id: literal_node, value: Literal::Integer(0) }),
            )],
            methods: vec![],
            constructors: vec![],
        };
        let module = SourceModule {
            name: "test".to_string(),
            classes: vec![class_defn],
            ..Default::default()
        };

        let package = compile_module(&module, &info, &builtins).unwrap();
        assert_eq!(package.classes.len(), 1);
        let class = &package.classes[0];
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.constructors.len(), 1);
        let initializer = class.initializer.expect("class declared a field initializer");
        let function = package.function(initializer);
        assert!(function.blocks[0].instructions.contains(&Instr::St32(0)));
        assert_eq!(*function.blocks[0].instructions.last().unwrap(), Instr::Ret);

        let ctor = package.function(class.constructors[0]);
        assert_eq!(ctor.blocks[0].instructions.last(), Some(&Instr::Ret));
    }

    #[test]
    fn mode_is_reexported_for_callers_building_their_own_info() {
        let _ = Mode::ForValue;
    }

    #[test]
    fn write_to_path_rejects_a_missing_directory() {
        let builtins = registry();
        let package = Package::new("empty");
        let result = write_to_path(&package, &builtins, "/no/such/directory/out.cs");
        assert!(result.is_err());
    }
}
