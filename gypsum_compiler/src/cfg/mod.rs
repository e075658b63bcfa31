//! Control-flow-graph construction: turns one function's annotated AST (or, for a
//! synthesized context/closure constructor, nothing at all) into a `Function`'s
//! `blocks` (spec §3, §4).

mod builder;
mod call;
mod expr;
mod order;
mod pattern;
mod prologue;

pub use builder::{Builder, LValue};
pub use order::order_blocks;
pub use prologue::{
    compile_constructor, compile_function, compile_initializer, compile_primary_constructor, compile_with_hint,
};
