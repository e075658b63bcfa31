//! Compile-time error taxonomy.
//!
//! The core only raises one error kind for user-visible failures: `CompileError`.
//! Everything else (malformed use-info, double id assignment, scope/type errors from
//! upstream analyses) is either an upstream concern or an internal invariant, and
//! internal invariants are enforced with `assert!`/`debug_assert!` rather than this
//! error type.

use thiserror::Error;

/// A fatal error produced while lowering a function body or serializing a package.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The AST node for a function definition had no body, but a body was required
    /// (e.g. the definition is not `abstract` and has no compile hint).
    #[error("{name}: body must be specified")]
    MissingBody { name: String },

    /// A constructor's implicit call to the superclass default constructor could not
    /// be resolved because the superclass has no parameterless constructor.
    #[error("no default constructor in superclass {superclass}")]
    MissingDefaultSuperCtor { superclass: String },

    /// The left-hand side of an assignment was neither a variable nor a field access.
    #[error("left side of assignment is unassignable")]
    UnassignableLValue,

    /// `super` was used outside of a call expression (`super(...)` or `super.foo(...)`).
    #[error("`super` is only valid as part of a call")]
    SuperOutsideCall,

    /// The callee of a call expression was not a variable, property, `this`, or `super`.
    #[error("uncallable expression")]
    UncallableExpression,

    /// An I/O failure while writing the serialized package, with the underlying cause.
    #[error("failed to write package: {0}")]
    Io(#[from] std::io::Error),

    /// The builtin catalogue file could not be parsed.
    #[error("failed to load builtin catalogue: {0}")]
    BuiltinCatalogue(String),
}

/// Result alias used throughout the compiler core.
pub type CompileResult<T> = Result<T, CompileError>;
