//! The IR object graph: packages, functions, classes, and their members.
//!
//! Every definition lives in exactly one `Package` and is assigned a monotonically
//! increasing id the first time it's appended to the package's table. Ids are stable
//! for the lifetime of the package and are what the serializer and bytecode operands
//! refer to (`callg <FunctionId>`, `cls <ClassId>`, and so on).

use crate::ir::types::Type;
use crate::bytecode::{BasicBlock, Instr};

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

/// An id that doubles as a reference into the builtin catalogue: non-negative values
/// index a package's own table, negative values name a builtin class or function
/// (spec §5 / the builtin catalogue's `id` fields), matching the single id
/// namespace used by `callg`/`cls`/`tycs` operands.
macro_rules! newtype_signed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub i32);

        impl $name {
            pub fn is_builtin(self) -> bool {
                self.0 < 0
            }

            pub fn index(self) -> usize {
                debug_assert!(!self.is_builtin());
                self.0 as usize
            }
        }
    };
}

newtype_signed_id!(FunctionId);
newtype_signed_id!(ClassId);
newtype_id!(TypeParameterId);
newtype_id!(GlobalId);
newtype_id!(StringId);

/// A package is the unit of compilation: one source file's worth of top-level
/// definitions plus everything pulled in by closures and contexts synthesized while
/// lowering it. Ids are assigned by table position, so appending is the only way to
/// add a definition; there is no removal.
#[derive(Debug, Default)]
pub struct Package {
    pub name: String,
    pub functions: Vec<Function>,
    pub classes: Vec<Class>,
    pub globals: Vec<Global>,
    pub type_parameters: Vec<TypeParameter>,
    pub strings: Vec<String>,
    /// Index into `functions` of the package's entry point, or `None` if this
    /// package is a library with no top-level executable entry.
    pub entry_function: Option<FunctionId>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Package {
        Package {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_function(&mut self, mut function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as i32);
        function.id = id;
        self.functions.push(function);
        id
    }

    pub fn add_class(&mut self, mut class: Class) -> ClassId {
        let id = ClassId(self.classes.len() as i32);
        class.id = id;
        self.classes.push(class);
        id
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(global);
        id
    }

    pub fn add_type_parameter(&mut self, param: TypeParameter) -> TypeParameterId {
        let id = TypeParameterId(self.type_parameters.len() as u32);
        self.type_parameters.push(param);
        id
    }

    /// Returns the id of `s` in the string table, appending it if it's not already
    /// present. Package-local string tables are small (identifiers and literals from
    /// one source file), so a linear scan is simpler than a `HashMap` and avoids
    /// rehashing on every insert.
    pub fn find_or_add_string(&mut self, s: &str) -> StringId {
        if let Some(pos) = self.strings.iter().position(|existing| existing == s) {
            return StringId(pos as u32);
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.index()]
    }

    pub fn find_function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FunctionId(i as i32))
    }

    pub fn find_class_by_name(&self, name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| ClassId(i as i32))
    }

    pub fn find_global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|g| g.name == name)
            .map(|i| GlobalId(i as u32))
    }

    /// Walks `class` and its ancestors, root-most last, without including `class`
    /// itself. Used for subtyping and for inheriting fields/methods onto a subclass.
    pub fn superclasses(&self, class: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut current = self.class(class).supertype.as_ref().and_then(Type::class_id);
        while let Some(id) = current {
            result.push(id);
            current = self.class(id).supertype.as_ref().and_then(Type::class_id);
        }
        result
    }

    pub fn is_subclass_of(&self, class: ClassId, other: ClassId) -> bool {
        class == other || self.superclasses(class).contains(&other)
    }

    /// The nearest class that both `a` and `b` derive from (or are themselves).
    /// Walks `a`'s own chain (closest ancestor first) and returns the first entry
    /// that also appears in `b`'s chain.
    pub fn find_common_base_class(&self, a: ClassId, b: ClassId) -> ClassId {
        if self.is_subclass_of(a, b) {
            return b;
        }
        let b_chain = self.superclasses(b);
        let mut a_chain = vec![a];
        a_chain.extend(self.superclasses(a));
        for candidate in a_chain {
            if candidate == b || b_chain.contains(&candidate) {
                return candidate;
            }
        }
        unreachable!("every class chain terminates at the root class")
    }
}

/// A global, package-level variable. Gypsum has no concept of a global with an
/// initializer expression evaluated outside of a function; globals are always
/// initialized by code emitted into the package's implicit init function.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: Type,
}

/// Where in the calling convention a variable's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// A local, stack-allocated slot. Indices count down from -1 to mirror the
    /// target VM's locals-grow-downward frame layout.
    Local,
    /// An incoming parameter. Index 0 is the receiver for methods and constructors;
    /// indices count up from there.
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub kind: VariableKind,
    pub index: i32,
}

/// A class type parameter or a function type parameter.
#[derive(Debug, Clone)]
pub struct TypeParameter {
    pub name: String,
    pub upper_bound: Option<Type>,
    pub lower_bound: Option<Type>,
}

/// Flags on a `Function`. `METHOD` and `CONSTRUCTOR` are mutually exclusive with
/// being a top-level function; `FINAL` only has meaning on a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionFlags(u8);

impl FunctionFlags {
    pub const METHOD: FunctionFlags = FunctionFlags(1 << 0);
    pub const CONSTRUCTOR: FunctionFlags = FunctionFlags(1 << 1);
    pub const FINAL: FunctionFlags = FunctionFlags(1 << 2);
    pub const ABSTRACT: FunctionFlags = FunctionFlags(1 << 3);
    pub const NATIVE: FunctionFlags = FunctionFlags(1 << 4);

    pub fn empty() -> FunctionFlags {
        FunctionFlags(0)
    }

    pub fn contains(self, flag: FunctionFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn insert(&mut self, flag: FunctionFlags) {
        self.0 |= flag.0;
    }
}

impl std::ops::BitOr for FunctionFlags {
    type Output = FunctionFlags;
    fn bitor(self, rhs: FunctionFlags) -> FunctionFlags {
        FunctionFlags(self.0 | rhs.0)
    }
}

/// A sentinel on a synthesized function whose body is a fixed, canned shape rather
/// than something lowered from an AST (spec §4.5, GLOSSARY "Compile hint").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileHint {
    /// `unit; ret` — a context's fields are written by the surrounding scope right
    /// after allocation, so the constructor itself does nothing.
    ContextCtor,
    /// For each field in order: load it from the matching parameter, store it into
    /// `this`; then `unit; ret`.
    ClosureCtor,
}

#[derive(Debug, Clone)]
pub struct Function {
    /// Assigned by `Package::add_function`; builtin functions set this directly to
    /// a negative value instead (see `crate::builtins`).
    pub id: FunctionId,
    pub name: String,
    pub return_type: Type,
    pub type_parameters: Vec<TypeParameterId>,
    pub parameter_types: Vec<Type>,
    pub variables: Vec<Variable>,
    pub blocks: Vec<BasicBlock>,
    pub flags: FunctionFlags,
    /// Set for methods and constructors: the class this function is defined on.
    pub owner: Option<ClassId>,
    /// Set only on synthesized context/closure constructors; `None` for every
    /// ordinary function and method compiled from an AST body.
    pub compile_hint: Option<CompileHint>,
    /// A fixed instruction sequence a call site splices in directly instead of
    /// emitting `callg`/`callv` (spec §4.4's "inline instruction hints"): how the
    /// builtin catalogue gives a primitive method like `object.==` a body without a
    /// real one to call into. Empty for every function compiled from an AST body.
    pub inline_instructions: Vec<Instr>,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type) -> Function {
        Function {
            id: FunctionId::default(),
            name: name.into(),
            return_type,
            type_parameters: Vec::new(),
            parameter_types: Vec::new(),
            variables: Vec::new(),
            blocks: Vec::new(),
            flags: FunctionFlags::empty(),
            owner: None,
            compile_hint: None,
            inline_instructions: Vec::new(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.flags.contains(FunctionFlags::METHOD)
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.contains(FunctionFlags::CONSTRUCTOR)
    }

    pub fn is_final(&self) -> bool {
        self.flags.contains(FunctionFlags::FINAL)
    }

    /// Whether `self` could legally receive a call made with `arg_types`, accounting
    /// for the receiver slot on methods and constructors.
    pub fn can_call_with(&self, arg_types: &[Type]) -> bool {
        self.parameter_types.len() == arg_types.len()
    }

    /// Whether `self`, defined on a subclass, is allowed to override `base`, defined
    /// on a superclass: same name, same arity, and the base isn't final.
    pub fn may_override(&self, base: &Function) -> bool {
        !base.is_final()
            && self.name == base.name
            && self.parameter_types.len() == base.parameter_types.len()
    }

    pub fn add_local(&mut self, name: impl Into<String>, ty: Type) -> i32 {
        let index = -(self.variables.iter().filter(|v| v.kind == VariableKind::Local).count() as i32) - 1;
        self.variables.push(Variable {
            name: name.into(),
            ty,
            kind: VariableKind::Local,
            index,
        });
        index
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, ty: Type) -> i32 {
        let index = self
            .variables
            .iter()
            .filter(|v| v.kind == VariableKind::Parameter)
            .count() as i32;
        self.parameter_types.push(ty.clone());
        self.variables.push(Variable {
            name: name.into(),
            ty,
            kind: VariableKind::Parameter,
            index,
        });
        index
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub index: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Class {
    /// Assigned by `Package::add_class`; builtin classes set this directly to a
    /// negative value instead (see `crate::builtins`).
    pub id: ClassId,
    pub name: String,
    pub type_parameters: Vec<TypeParameterId>,
    /// The direct supertype, if any. `None` only for the root builtin class; every
    /// other class (including user classes with no explicit `<:`) has one, inherited
    /// implicitly from the root.
    pub supertype: Option<Type>,
    pub fields: Vec<Field>,
    pub constructors: Vec<FunctionId>,
    pub methods: Vec<FunctionId>,
    /// Set once the function lowering the primary constructor's field initializers
    /// and `super`/`this` delegation has been built.
    pub initializer: Option<FunctionId>,
    /// True only for the builtin value classes (`i32`, `boolean`, ...); never set on
    /// a user-defined class.
    pub is_primitive: bool,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Class {
        Class {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, index: u32) -> &Field {
        &self.fields[index as usize]
    }

    /// Appends a field and returns its index. Callers are responsible for having
    /// already appended the superclass's fields (see `crate::layout`), so the index
    /// returned here is the final, serialized position.
    pub fn add_field(&mut self, name: impl Into<String>, ty: Type) -> u32 {
        let index = self.fields.len() as u32;
        self.fields.push(Field {
            name: name.into(),
            ty,
            index,
        });
        index
    }

    pub fn find_field(&self, name: &str) -> Option<u32> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.index)
    }

    /// Index into `self.methods` of the method named `name`, if present. Does not
    /// search supertypes; by the time layout has run, `methods` already contains
    /// every inherited slot (see `crate::layout::assign_method_table`).
    pub fn find_method_index(&self, package: &Package, name: &str) -> Option<u32> {
        self.methods
            .iter()
            .position(|&id| package.function(id).name == name)
            .map(|i| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_add_string_is_idempotent() {
        let mut pkg = Package::new("test");
        let a = pkg.find_or_add_string("foo");
        let b = pkg.find_or_add_string("bar");
        let c = pkg.find_or_add_string("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pkg.strings, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn locals_count_down_parameters_count_up() {
        let mut f = Function::new("f", Type::Unit);
        assert_eq!(f.add_parameter("this", Type::i64()), 0);
        assert_eq!(f.add_parameter("x", Type::i64()), 1);
        assert_eq!(f.add_local("tmp0", Type::i64()), -1);
        assert_eq!(f.add_local("tmp1", Type::i64()), -2);
    }

    #[test]
    fn superclasses_walks_to_root() {
        let mut pkg = Package::new("test");
        let root = pkg.add_class(Class::new("Object"));
        let mid = {
            let mut c = Class::new("Mid");
            c.supertype = Some(Type::class(root, vec![]));
            pkg.add_class(c)
        };
        let leaf = {
            let mut c = Class::new("Leaf");
            c.supertype = Some(Type::class(mid, vec![]));
            pkg.add_class(c)
        };
        assert_eq!(pkg.superclasses(leaf), vec![mid, root]);
        assert!(pkg.is_subclass_of(leaf, root));
        assert!(!pkg.is_subclass_of(root, leaf));
    }

    #[test]
    fn find_common_base_class_picks_nearest_shared_ancestor() {
        let mut pkg = Package::new("test");
        let root = pkg.add_class(Class::new("Object"));
        let mid = {
            let mut c = Class::new("Mid");
            c.supertype = Some(Type::class(root, vec![]));
            pkg.add_class(c)
        };
        let left = {
            let mut c = Class::new("Left");
            c.supertype = Some(Type::class(mid, vec![]));
            pkg.add_class(c)
        };
        let right = {
            let mut c = Class::new("Right");
            c.supertype = Some(Type::class(mid, vec![]));
            pkg.add_class(c)
        };
        assert_eq!(pkg.find_common_base_class(left, right), mid);
        assert_eq!(pkg.find_common_base_class(left, left), left);
    }
}
