//! Field and method table layout: how a subclass's storage and dispatch table are
//! built from its superclass's (spec §4.3).
//!
//! Both rules are inheritance-by-prefix: a subclass's field list *starts with* its
//! superclass's fields, at the same indices, with the subclass's own fields appended
//! after; a subclass's method table starts with the superclass's methods, with an
//! override replacing its superclass's slot in place (same index) and a new method
//! appended. This file only assembles `Class.fields`/`Class.methods` from whatever
//! the CFG builder has already recorded as "this class's own members, unindexed";
//! it doesn't decide which methods override which by itself — see
//! `resolve_overrides`, which both `crate::cfg` and this module depend on.

use crate::builtins::BuiltinRegistry;
use crate::ir::{Class, ClassId, Field, FunctionId, Package};

/// A class's own fields and methods, gathered before layout has run. Field order
/// and method order here are source declaration order.
#[derive(Debug, Clone, Default)]
pub struct OwnMembers {
    pub fields: Vec<(String, crate::ir::Type)>,
    pub methods: Vec<FunctionId>,
}

fn superclass_fields_and_methods(
    package: &Package,
    builtins: &BuiltinRegistry,
    supertype_class: ClassId,
) -> (Vec<Field>, Vec<FunctionId>) {
    if supertype_class.is_builtin() {
        let c = builtins.class(supertype_class);
        (c.fields.clone(), c.methods.clone())
    } else {
        let c = package.class(supertype_class);
        (c.fields.clone(), c.methods.clone())
    }
}

/// Assigns `class.fields` as the superclass's fields (inherited, same indices)
/// followed by `own.fields` (newly appended, continuing the index sequence).
pub fn assign_fields(
    package: &Package,
    builtins: &BuiltinRegistry,
    class: &mut Class,
    own: &OwnMembers,
) {
    let mut fields = match class.supertype.as_ref().and_then(|t| t.class_id()) {
        Some(super_class) => superclass_fields_and_methods(package, builtins, super_class).0,
        None => Vec::new(),
    };
    for (name, ty) in &own.fields {
        let index = fields.len() as u32;
        fields.push(Field {
            name: name.clone(),
            ty: ty.clone(),
            index,
        });
    }
    class.fields = fields;
}

/// Assigns `class.methods`: the superclass's method table with each entry in
/// `overrides` replaced in place by the overriding function, then `own.methods`
/// (methods with no superclass counterpart) appended.
///
/// `overrides` maps a superclass method's table index to the subclass function that
/// overrides it; computing that map is `resolve_overrides`'s job, since it needs the
/// CFG builder's declaration-analysis info (`may_override`/name+arity matching) to
/// decide which declared method overrides which.
pub fn assign_methods(
    package: &Package,
    builtins: &BuiltinRegistry,
    class: &mut Class,
    own: &OwnMembers,
    overrides: &[(u32, FunctionId)],
) {
    let mut methods = match class.supertype.as_ref().and_then(|t| t.class_id()) {
        Some(super_class) => superclass_fields_and_methods(package, builtins, super_class).1,
        None => Vec::new(),
    };
    for &(index, overriding) in overrides {
        methods[index as usize] = overriding;
    }
    let overridden: std::collections::HashSet<FunctionId> =
        overrides.iter().map(|(_, f)| *f).collect();
    for &method in &own.methods {
        if !overridden.contains(&method) {
            methods.push(method);
        }
    }
    class.methods = methods;
}

/// Given the subclass's own declared methods and the superclass's method table,
/// resolves which declared methods override a superclass slot by name and arity
/// match (spec §4.3's "overrides share superclass index" rule). Returns the
/// `(superclass_index, overriding_function)` pairs `assign_methods` needs.
pub fn resolve_overrides(
    package: &Package,
    builtins: &BuiltinRegistry,
    superclass: Option<ClassId>,
    own_methods: &[FunctionId],
) -> Vec<(u32, FunctionId)> {
    let Some(superclass) = superclass else {
        return Vec::new();
    };
    let super_methods = if superclass.is_builtin() {
        builtins.class(superclass).methods.clone()
    } else {
        package.class(superclass).methods.clone()
    };
    let mut pairs = Vec::new();
    for &candidate in own_methods {
        let candidate_fn = package.function(candidate);
        for (index, &base_id) in super_methods.iter().enumerate() {
            let base_fn = if base_id.is_builtin() {
                builtins.function(base_id)
            } else {
                package.function(base_id)
            };
            if candidate_fn.may_override(base_fn) {
                pairs.push((index as u32, candidate));
                break;
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Type};

    #[test]
    fn subclass_fields_start_with_superclass_fields() {
        let builtins = BuiltinRegistry::load().unwrap();
        let mut package = Package::new("test");
        let root = builtins.root_class();

        let mut base = Class::new("Base");
        base.supertype = Some(Type::class(root, vec![]));
        let base_id = package.add_class(base);
        {
            let own = OwnMembers {
                fields: vec![("x".to_string(), Type::i32())],
                methods: vec![],
            };
            let mut class = package.class(base_id).clone();
            assign_fields(&package, &builtins, &mut class, &own);
            *package.class_mut(base_id) = class;
        }

        let mut sub = Class::new("Sub");
        sub.supertype = Some(Type::class(base_id, vec![]));
        let sub_id = package.add_class(sub);
        let own = OwnMembers {
            fields: vec![("y".to_string(), Type::i64())],
            methods: vec![],
        };
        let mut class = package.class(sub_id).clone();
        assign_fields(&package, &builtins, &mut class, &own);
        *package.class_mut(sub_id) = class;

        let sub_class = package.class(sub_id);
        assert_eq!(sub_class.fields.len(), 2);
        assert_eq!(sub_class.fields[0].name, "x");
        assert_eq!(sub_class.fields[0].index, 0);
        assert_eq!(sub_class.fields[1].name, "y");
        assert_eq!(sub_class.fields[1].index, 1);
    }

    #[test]
    fn overriding_method_keeps_superclass_index() {
        let builtins = BuiltinRegistry::load().unwrap();
        let mut package = Package::new("test");
        let root = builtins.root_class();

        let base_method = package.add_function(Function::new("greet", Type::Unit));
        let mut base = Class::new("Base");
        base.supertype = Some(Type::class(root, vec![]));
        base.methods = vec![base_method];
        let base_id = package.add_class(base);

        let override_method = package.add_function(Function::new("greet", Type::Unit));
        let overrides =
            resolve_overrides(&package, &builtins, Some(base_id), &[override_method]);
        assert_eq!(overrides, vec![(0, override_method)]);

        let mut sub = Class::new("Sub");
        sub.supertype = Some(Type::class(base_id, vec![]));
        let sub_id = package.add_class(sub);
        let own = OwnMembers {
            fields: vec![],
            methods: vec![override_method],
        };
        let mut class = package.class(sub_id).clone();
        assign_methods(&package, &builtins, &mut class, &own, &overrides);
        *package.class_mut(sub_id) = class;

        assert_eq!(package.class(sub_id).methods, vec![override_method]);
    }
}
