//! The annotated AST surface the CFG builder consumes.
//!
//! Nothing here parses source or resolves names: every node already carries a
//! stable [`NodeId`], and every fact the builder needs about a node — its static
//! type, which declaration a variable reference resolves to, which scope a closure
//! captures — comes from the [`Info`] trait rather than from re-deriving it during
//! lowering. That split is deliberate: lexing, parsing, and declaration/scope/type
//! analysis all happen upstream of this crate.

use std::collections::HashMap;

use crate::ir::{ClassId, FunctionId, GlobalId, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The `ScopeId` of the scope this node itself introduces (a function body, a
    /// block, a class body): scope numbering mirrors node numbering one-to-one, so
    /// a scope-introducing node's own id doubles as the key `ClosureInfo`/
    /// `ContextInfo` index it by.
    pub fn as_scope(self) -> ScopeId {
        ScopeId(self.0)
    }
}

/// The four contexts an expression can be lowered in (spec §4.4). The same
/// expression tree is compiled differently depending on mode: a block's last
/// statement is for-value if the block itself is, but every earlier statement is
/// always for-effect; a pattern's scrutinee comparison is for-match; a variable
/// declared but not yet assigned is for-uninitialized only at its declaration site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ForValue,
    ForEffect,
    ForMatch,
    ForUninitialized,
}

/// A lexical scope's numeric identity, used to index into a `ClosureInfo`'s capture
/// table. Scope 0 is always the innermost (the function currently being compiled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// What a name lookup ultimately resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrDefn {
    /// A local variable or parameter slot in the function currently being
    /// compiled. Always paired with `scope_id == ScopeId(0)`: a variable captured
    /// from an enclosing scope is rewritten to `Field` during closure/context
    /// analysis, so it never reaches the builder still tagged `Variable`.
    Variable(i32),
    Field(ClassId, u32),
    Function(FunctionId),
    Class(ClassId),
    Global(GlobalId),
}

/// Attached to a definition site (a variable pattern, a parameter, `this`): which
/// scope the definition lives in and what it lowers to.
#[derive(Debug, Clone)]
pub struct DefnInfo {
    pub defn: IrDefn,
    pub scope_id: ScopeId,
}

/// Attached to a use site (a variable expression): which definition it resolves to.
#[derive(Debug, Clone)]
pub struct UseInfo {
    pub defn_info: DefnInfo,
}

/// Where a captured variable lives when accessed from within a closure or a nested
/// context: either still a local `Variable` (not yet captured into a context
/// object) or a `Field` on a context object reached through the closure chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturedLocation {
    /// Still a plain local slot in the scope that creates it (a newly allocated
    /// context is always stored here first; only a *deeper* nested closure sees it
    /// promoted to a `Field`).
    Variable(i32),
    Field(ClassId, u32),
    /// The scope is reached implicitly via `this`, with no intervening context hop.
    ThroughThis,
}

/// Attached to a function or class whose body refers to variables from an
/// enclosing scope: which scopes are captured and how to reach each one's context
/// from inside the closure (spec §4.4, §4.5 context/closure lowering).
#[derive(Debug, Clone)]
pub struct ClosureInfo {
    /// The anonymous class synthesized to hold this closure's captured contexts
    /// (spec's `irClosureClass`). `None` when this info describes a scope that
    /// merely *creates* a context for inner closures to capture, rather than being
    /// a closure itself (a top-level function with captured locals, for instance).
    pub closure_class: Option<ClassId>,
    /// Where the instantiated closure object is stored once built, so that a call
    /// to the function it wraps can load it back (spec's `irClosureVar`).
    pub closure_var: Option<DefnInfo>,
    pub captured_scopes: Vec<ScopeId>,
    pub contexts: HashMap<ScopeId, CapturedLocation>,
}

impl Default for ClosureInfo {
    fn default() -> ClosureInfo {
        ClosureInfo {
            closure_class: None,
            closure_var: None,
            captured_scopes: Vec::new(),
            contexts: HashMap::new(),
        }
    }
}

/// Attached to a scope (a block, a function body) that has at least one variable
/// captured by a nested closure: the context class synthesized to hold those
/// variables.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub id: ScopeId,
    pub context_class: ClassId,
}

/// Read-only access to everything declaration/scope/type analysis determined about
/// the AST being lowered. The CFG builder only ever reads through this trait; it
/// never mutates analysis results.
pub trait Info {
    fn defn_info(&self, node: NodeId) -> Option<&DefnInfo>;
    fn use_info(&self, node: NodeId) -> Option<&UseInfo>;
    fn get_type(&self, node: NodeId) -> Option<&Type>;
    fn closure_info(&self, node: NodeId) -> Option<&ClosureInfo>;
    fn context_info(&self, scope: ScopeId) -> Option<&ContextInfo>;
}

/// A straightforward in-memory `Info`, keyed by node id. Real drivers populate this
/// from the upstream analysis passes; tests build it directly.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInfo {
    pub defn_infos: HashMap<NodeId, DefnInfo>,
    pub use_infos: HashMap<NodeId, UseInfo>,
    pub types: HashMap<NodeId, Type>,
    pub closure_infos: HashMap<NodeId, ClosureInfo>,
    pub context_infos: HashMap<ScopeId, ContextInfo>,
}

impl Info for AnalysisInfo {
    fn defn_info(&self, node: NodeId) -> Option<&DefnInfo> {
        self.defn_infos.get(&node)
    }
    fn use_info(&self, node: NodeId) -> Option<&UseInfo> {
        self.use_infos.get(&node)
    }
    fn get_type(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }
    fn closure_info(&self, node: NodeId) -> Option<&ClosureInfo> {
        self.closure_infos.get(&node)
    }
    fn context_info(&self, scope: ScopeId) -> Option<&ContextInfo> {
        self.context_infos.get(&scope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    AndThen,
    OrElse,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// An irrefutable or refutable binding pattern, used by `let`, by function
/// parameters, and by `PartialFunctionCase`.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches anything and binds it to `name`, optionally asserting a type.
    Variable { id: NodeId, name: String, ty: Option<Type> },
    /// Matches a value only if it's an instance of `ty` (a `Type::is_subtype_of`
    /// check against the scrutinee's runtime class), then binds the narrowed value.
    Typed { id: NodeId, name: String, ty: Type },
    /// Matches anything, binds nothing.
    Blank,
}

#[derive(Debug, Clone)]
pub struct PartialFunctionCase {
    pub pattern: Pattern,
    pub guard: Option<Box<Expr>>,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal { id: NodeId, value: Literal },
    Variable { id: NodeId },
    This { id: NodeId },
    Super { id: NodeId },
    Block { id: NodeId, statements: Vec<Expr> },
    Assign { id: NodeId, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `lhs op= rhs` (spec §4.4): resolved ahead of time to the same operator method
    /// a plain `Binary` of `op` would use, but the left side's lvalue is only built
    /// once and its receiver, if any, is only ever evaluated once.
    CompoundAssign { id: NodeId, op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Property { id: NodeId, receiver: Box<Expr>, name: String },
    Call { id: NodeId, callee: Box<Expr>, type_arguments: Vec<Type>, arguments: Vec<Expr> },
    Unary { id: NodeId, op: UnaryOp, operand: Box<Expr> },
    Binary { id: NodeId, op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    If { id: NodeId, condition: Box<Expr>, then_branch: Box<Expr>, else_branch: Option<Box<Expr>> },
    While { id: NodeId, condition: Box<Expr>, body: Box<Expr> },
    Throw { id: NodeId, exception: Box<Expr> },
    TryCatch {
        id: NodeId,
        body: Box<Expr>,
        catch: Option<Vec<PartialFunctionCase>>,
        finally: Option<Box<Expr>>,
    },
    /// A standalone `match`-like partial function expression: evaluates `scrutinee`
    /// against each case's pattern in order, taking the first match's guard+body.
    PartialFunction { id: NodeId, scrutinee: Box<Expr>, cases: Vec<PartialFunctionCase> },
    Return { id: NodeId, value: Option<Box<Expr>> },
    VariableDefinition { id: NodeId, pattern: Pattern, value: Option<Box<Expr>> },
    /// A nested function declared as a block statement (spec §4.5): not itself a
    /// value-producing expression, but the point where the enclosing scope builds
    /// this function's closure object, if it captures anything from that scope.
    FunctionDeclaration { id: NodeId, function: FunctionId },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal { id, .. }
            | Expr::Variable { id }
            | Expr::This { id }
            | Expr::Super { id }
            | Expr::Block { id, .. }
            | Expr::Assign { id, .. }
            | Expr::CompoundAssign { id, .. }
            | Expr::Property { id, .. }
            | Expr::Call { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::If { id, .. }
            | Expr::While { id, .. }
            | Expr::Throw { id, .. }
            | Expr::TryCatch { id, .. }
            | Expr::PartialFunction { id, .. }
            | Expr::Return { id, .. }
            | Expr::VariableDefinition { id, .. }
            | Expr::FunctionDeclaration { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// Set when declared with `var`/`val` on a primary constructor parameter: the
    /// parameter also becomes a field, initialized implicitly (spec §4.3).
    pub is_constructor_field: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionDefn {
    pub id: NodeId,
    pub name: String,
    pub return_type: Type,
    pub parameters: Vec<Param>,
    /// `None` for an abstract or native method with no Gypsum body.
    pub body: Option<Expr>,
    pub is_constructor: bool,
    /// Set on a constructor whose first statement is an explicit `this(...)` or
    /// `super(...)` call; `None` means a default super-constructor call is implicit.
    pub delegating_call: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassDefn {
    pub id: NodeId,
    pub name: String,
    pub supertype: Option<Type>,
    /// Arguments passed to the supertype's constructor from the primary
    /// constructor, if this class declares one (`class Foo(x: i32) <: Bar(x)`).
    pub supertype_ctor_arguments: Vec<Expr>,
    pub primary_constructor_parameters: Option<Vec<Param>>,
    pub fields: Vec<(String, Type, Option<Expr>)>,
    pub methods: Vec<FunctionDefn>,
    pub constructors: Vec<FunctionDefn>,
}
