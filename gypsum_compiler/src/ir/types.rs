//! IR type model and subtyping (spec §4.1).
//!
//! Types are a tagged variant over primitives, class references, and type-parameter
//! references. The only flag a type carries is nullability.

use crate::ir::graph::{ClassId, TypeParameterId};
use std::fmt;

/// Bit flags attached to a `Type`. Only one flag exists today; the set is modeled as
/// a struct of bools (rather than a `bitflags` crate) to mirror the single-flag reality
/// of the source system without over-generalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeFlags {
    pub nullable: bool,
}

impl TypeFlags {
    pub const NONE: TypeFlags = TypeFlags { nullable: false };
    pub const NULLABLE: TypeFlags = TypeFlags { nullable: true };
}

/// Integer width in bits. Gypsum only has signed fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

/// Floating point width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    W32,
    W64,
}

/// The IR type tagged union (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Unit,
    Boolean,
    Integer(IntWidth),
    Float(FloatWidth),
    Class {
        class: ClassId,
        type_arguments: Vec<Type>,
        flags: TypeFlags,
    },
    Variable(TypeParameterId),
}

impl Type {
    pub fn i8() -> Type {
        Type::Integer(IntWidth::W8)
    }
    pub fn i16() -> Type {
        Type::Integer(IntWidth::W16)
    }
    pub fn i32() -> Type {
        Type::Integer(IntWidth::W32)
    }
    pub fn i64() -> Type {
        Type::Integer(IntWidth::W64)
    }
    pub fn f32() -> Type {
        Type::Float(FloatWidth::W32)
    }
    pub fn f64() -> Type {
        Type::Float(FloatWidth::W64)
    }

    pub fn class(class: ClassId, type_arguments: Vec<Type>) -> Type {
        Type::Class {
            class,
            type_arguments,
            flags: TypeFlags::NONE,
        }
    }

    pub fn nullable_class(class: ClassId) -> Type {
        Type::Class {
            class,
            type_arguments: vec![],
            flags: TypeFlags::NULLABLE,
        }
    }

    /// Whether this type denotes a heap object (a class type, as opposed to a
    /// primitive value type). Used to choose load/store opcode width.
    pub fn is_object(&self) -> bool {
        matches!(self, Type::Class { .. } | Type::Variable(_))
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Class { flags, .. } => flags.nullable,
            _ => false,
        }
    }

    pub fn without_flags(&self) -> Type {
        match self {
            Type::Class {
                class,
                type_arguments,
                ..
            } => Type::Class {
                class: *class,
                type_arguments: type_arguments.clone(),
                flags: TypeFlags::NONE,
            },
            other => other.clone(),
        }
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Type::Class { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// Width in bytes for the value's in-memory representation. Object types are
    /// always pointer-sized (8 bytes on the target VM, matching `stp`/`ldp`).
    pub fn storage_width(&self) -> u32 {
        match self {
            Type::Unit => 0,
            Type::Boolean => 1,
            Type::Integer(w) => w.bits() / 8,
            Type::Float(FloatWidth::W32) => 4,
            Type::Float(FloatWidth::W64) => 8,
            Type::Class { .. } | Type::Variable(_) => 8,
        }
    }

    /// Substitute each `VariableType` referencing one of `params` with the
    /// corresponding entry in `args`; recurses into class type arguments.
    pub fn substitute(&self, params: &[TypeParameterId], args: &[Type]) -> Type {
        debug_assert_eq!(params.len(), args.len());
        match self {
            Type::Variable(p) => {
                if let Some(idx) = params.iter().position(|q| q == p) {
                    args[idx].clone()
                } else {
                    self.clone()
                }
            }
            Type::Class {
                class,
                type_arguments,
                flags,
            } => Type::Class {
                class: *class,
                type_arguments: type_arguments
                    .iter()
                    .map(|t| t.substitute(params, args))
                    .collect(),
                flags: *flags,
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => write!(f, "unit"),
            Type::Boolean => write!(f, "boolean"),
            Type::Integer(IntWidth::W8) => write!(f, "i8"),
            Type::Integer(IntWidth::W16) => write!(f, "i16"),
            Type::Integer(IntWidth::W32) => write!(f, "i32"),
            Type::Integer(IntWidth::W64) => write!(f, "i64"),
            Type::Float(FloatWidth::W32) => write!(f, "f32"),
            Type::Float(FloatWidth::W64) => write!(f, "f64"),
            Type::Variable(p) => write!(f, "tp#{}", p.0),
            Type::Class {
                class,
                type_arguments,
                flags,
            } => {
                write!(f, "class#{}", class.0)?;
                if !type_arguments.is_empty() {
                    write!(f, "[")?;
                    for (i, t) in type_arguments.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", t)?;
                    }
                    write!(f, "]")?;
                }
                if flags.nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
        }
    }
}

/// Subtyping over the class graph (spec §4.1). Requires access to the class table to
/// walk `superclasses()`. `nothing_class` and `root_class` are passed explicitly
/// rather than looked up globally so this function stays independent of the builtins
/// registry's init-once state.
pub fn is_subtype_of(
    sub: &Type,
    sup: &Type,
    superclasses: impl Fn(ClassId) -> Vec<ClassId>,
    nothing_class: ClassId,
    root_class: ClassId,
) -> bool {
    match (sub, sup) {
        (Type::Unit, Type::Unit) => true,
        (Type::Boolean, Type::Boolean) => true,
        (Type::Integer(a), Type::Integer(b)) => a == b,
        (Type::Float(a), Type::Float(b)) => a == b,
        (Type::Variable(a), Type::Variable(b)) => a == b,
        (
            Type::Class {
                class: sub_class,
                flags: sub_flags,
                ..
            },
            Type::Class {
                class: sup_class,
                flags: sup_flags,
                ..
            },
        ) => {
            if sub_flags.nullable && !sup_flags.nullable {
                return false;
            }
            if *sub_class == nothing_class {
                return true;
            }
            if *sup_class == root_class {
                return true;
            }
            if sub_class == sup_class {
                return true;
            }
            superclasses(*sub_class).contains(sup_class)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph::ClassId;

    #[test]
    fn structural_equality_ignores_nothing_but_fields() {
        assert_eq!(Type::i32(), Type::i32());
        assert_ne!(Type::i32(), Type::i64());
    }

    #[test]
    fn substitute_recurses_into_class_args() {
        let p = TypeParameterId(0);
        let c = ClassId(3);
        let ty = Type::class(c, vec![Type::Variable(p)]);
        let subst = ty.substitute(&[p], &[Type::i64()]);
        assert_eq!(subst, Type::class(c, vec![Type::i64()]));
    }

    #[test]
    fn nullable_supertype_accepts_non_nullable_subtype() {
        let root = ClassId(0);
        let nothing = ClassId(1);
        let c = ClassId(2);
        let sub = Type::class(c, vec![]);
        let sup = Type::Class {
            class: c,
            type_arguments: vec![],
            flags: TypeFlags::NULLABLE,
        };
        assert!(is_subtype_of(&sub, &sup, |_| vec![], nothing, root));
    }

    #[test]
    fn non_nullable_supertype_rejects_nullable_subtype() {
        let root = ClassId(0);
        let nothing = ClassId(1);
        let c = ClassId(2);
        let sub = Type::Class {
            class: c,
            type_arguments: vec![],
            flags: TypeFlags::NULLABLE,
        };
        let sup = Type::class(c, vec![]);
        assert!(!is_subtype_of(&sub, &sup, |_| vec![], nothing, root));
    }

    #[test]
    fn nothing_is_subtype_of_everything() {
        let root = ClassId(0);
        let nothing = ClassId(1);
        let other = ClassId(5);
        let sub = Type::class(nothing, vec![]);
        let sup = Type::class(other, vec![]);
        assert!(is_subtype_of(&sub, &sup, |_| vec![], nothing, root));
    }

    #[test]
    fn root_is_superclass_of_everything() {
        let root = ClassId(0);
        let nothing = ClassId(1);
        let other = ClassId(5);
        let sub = Type::class(other, vec![]);
        let sup = Type::class(root, vec![]);
        assert!(is_subtype_of(&sub, &sup, |_| vec![], nothing, root));
    }
}
