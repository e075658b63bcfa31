//! The in-memory representation the CFG builder produces and the serializer
//! consumes: packages, functions, classes, and the type system they're expressed in.

pub mod graph;
pub mod types;

pub use graph::{
    Class, ClassId, CompileHint, Field, Function, FunctionFlags, FunctionId, Global, GlobalId,
    Package, StringId, TypeParameter, TypeParameterId, Variable, VariableKind,
};
pub use types::{FloatWidth, IntWidth, Type, TypeFlags};
