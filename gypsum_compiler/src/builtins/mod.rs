//! The builtin class and function catalogue: `Object`, `Nothing`, `Exception`,
//! `Type`, `String`, and the primitive value types, none of which are declared in
//! user source but all of which need stable ids for bytecode operands and the
//! binary package's type encoding.
//!
//! The catalogue loads once per process from an embedded data file and is cached in
//! a process-wide registry, mirroring how the target VM itself bootstraps these
//! classes before loading any user package.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::bytecode::Instr;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Class, Field, Function, FunctionFlags, FunctionId, Type, ClassId};

const CATALOGUE_TOML: &str = include_str!("catalogue.toml");

#[derive(Debug, Deserialize)]
struct CatalogueFile {
    #[serde(rename = "class")]
    classes: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    name: String,
    supertype: Option<String>,
    #[serde(default)]
    is_primitive: bool,
    #[serde(default)]
    fields: Vec<FieldEntry>,
    #[serde(default)]
    methods: Vec<FunctionEntry>,
    #[serde(default)]
    constructors: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize)]
struct FieldEntry {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    parameter_types: Vec<String>,
    /// A fixed instruction sequence spliced in at the call site instead of
    /// `callg`/`callv`, for a method with no real body of its own to call into.
    #[serde(default)]
    insts: Vec<String>,
}

fn parse_inline_instruction(name: &str) -> Instr {
    match name {
        "eqp" => Instr::Eqp,
        other => panic!("builtin catalogue references unknown inline instruction {other}"),
    }
}

fn parse_type_name(name: &str, by_name: &HashMap<String, ClassId>) -> Type {
    if let Some(inner) = name.strip_suffix('?') {
        let class = by_name
            .get(inner)
            .copied()
            .unwrap_or_else(|| panic!("builtin catalogue references unknown type {inner}"));
        return Type::nullable_class(class);
    }
    match name {
        "unit" => Type::Unit,
        "boolean" => Type::Boolean,
        "i8" => Type::i8(),
        "i16" => Type::i16(),
        "i32" => Type::i32(),
        "i64" => Type::i64(),
        "f32" => Type::f32(),
        "f64" => Type::f64(),
        other => {
            let class = by_name
                .get(other)
                .copied()
                .unwrap_or_else(|| panic!("builtin catalogue references unknown type {other}"));
            Type::class(class, vec![])
        }
    }
}

/// The loaded builtin catalogue: every class and function the target VM provides
/// without the user having declared it.
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    pub classes: Vec<Class>,
    pub functions: Vec<Function>,
    class_by_name: HashMap<String, ClassId>,
}

impl BuiltinRegistry {
    pub(crate) fn load() -> CompileResult<BuiltinRegistry> {
        let file: CatalogueFile = toml::from_str(CATALOGUE_TOML)
            .map_err(|e| CompileError::BuiltinCatalogue(e.to_string()))?;

        // Pass 1: declare every class by name so later entries can reference an
        // as-yet-undefined supertype or field type that appears after them.
        let mut classes: Vec<Class> = Vec::with_capacity(file.classes.len());
        let mut class_by_name = HashMap::new();
        for (i, entry) in file.classes.iter().enumerate() {
            let id = ClassId(-(i as i32) - 1);
            let mut class = Class::new(entry.name.clone());
            class.id = id;
            class_by_name.insert(entry.name.clone(), id);
            classes.push(class);
        }

        // Pass 2: populate supertypes, and inherit the superclass's fields and
        // methods before appending this class's own, just as user-class layout does
        // (see `crate::layout`).
        let mut functions = Vec::new();
        let mut next_function_id = -1i32;
        for (i, entry) in file.classes.iter().enumerate() {
            let (inherited_fields, inherited_methods) = match &entry.supertype {
                Some(super_name) => {
                    let super_id = class_by_name[super_name];
                    let super_class = &classes[(-super_id.0 - 1) as usize];
                    (super_class.fields.clone(), super_class.methods.clone())
                }
                None => (Vec::new(), Vec::new()),
            };

            let mut own_fields = Vec::new();
            for field in &entry.fields {
                let ty = parse_type_name(&field.ty, &class_by_name);
                own_fields.push(Field {
                    name: field.name.clone(),
                    ty,
                    index: 0,
                });
            }

            let mut ctor_ids = Vec::new();
            for ctor in &entry.constructors {
                let id = FunctionId(next_function_id);
                next_function_id -= 1;
                let mut f = Function::new("$constructor", Type::Unit);
                f.id = id;
                f.flags = FunctionFlags::CONSTRUCTOR;
                f.parameter_types = ctor
                    .parameter_types
                    .iter()
                    .map(|t| parse_type_name(t, &class_by_name))
                    .collect();
                f.inline_instructions = ctor.insts.iter().map(|s| parse_inline_instruction(s)).collect();
                functions.push(f);
                ctor_ids.push(id);
            }

            let mut own_method_ids = Vec::new();
            for method in &entry.methods {
                let id = FunctionId(next_function_id);
                next_function_id -= 1;
                let name = method.name.clone().unwrap_or_default();
                let return_type = method
                    .return_type
                    .as_deref()
                    .map(|t| parse_type_name(t, &class_by_name))
                    .unwrap_or(Type::Unit);
                let mut f = Function::new(name, return_type);
                f.id = id;
                f.flags = FunctionFlags::METHOD;
                f.parameter_types = method
                    .parameter_types
                    .iter()
                    .map(|t| parse_type_name(t, &class_by_name))
                    .collect();
                f.inline_instructions = method.insts.iter().map(|s| parse_inline_instruction(s)).collect();
                functions.push(f);
                own_method_ids.push(id);
            }

            let class = &mut classes[i];
            class.supertype = entry.supertype.as_ref().map(|n| Type::class(class_by_name[n], vec![]));
            class.fields = own_fields;
            // Re-index inherited + own fields in one contiguous run.
            let mut fields = inherited_fields;
            for f in &class.fields {
                fields.push(f.clone());
            }
            for (idx, f) in fields.iter_mut().enumerate() {
                f.index = idx as u32;
            }
            class.fields = fields;
            class.constructors = ctor_ids;
            let mut methods = inherited_methods;
            methods.extend(own_method_ids);
            class.methods = methods;
            class.is_primitive = entry.is_primitive;
        }

        Ok(BuiltinRegistry {
            classes,
            functions,
            class_by_name,
        })
    }

    pub fn class(&self, id: ClassId) -> &Class {
        debug_assert!(id.is_builtin());
        &self.classes[(-id.0 - 1) as usize]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        debug_assert!(id.is_builtin());
        self.functions
            .iter()
            .find(|f| f.id == id)
            .expect("builtin function id out of range")
    }

    pub fn class_by_name(&self, name: &str) -> ClassId {
        *self
            .class_by_name
            .get(name)
            .unwrap_or_else(|| panic!("no builtin class named {name}"))
    }

    pub fn root_class(&self) -> ClassId {
        self.class_by_name("object")
    }

    pub fn nothing_class(&self) -> ClassId {
        self.class_by_name("nothing")
    }

    pub fn exception_class(&self) -> ClassId {
        self.class_by_name("exception")
    }

    pub fn type_class(&self) -> ClassId {
        self.class_by_name("type")
    }

    pub fn type_constructor(&self) -> FunctionId {
        self.class(self.type_class()).constructors[0]
    }

    pub fn string_class(&self) -> ClassId {
        self.class_by_name("string")
    }

    /// The builtin class id a primitive type is tagged with in the serialized
    /// package (primitives have no `ClassId` of their own in the type system, but
    /// every type still needs a class code on the wire).
    pub fn class_for_primitive(&self, ty: &Type) -> ClassId {
        let name = match ty {
            Type::Unit => "unit",
            Type::Boolean => "boolean",
            Type::Integer(crate::ir::IntWidth::W8) => "i8",
            Type::Integer(crate::ir::IntWidth::W16) => "i16",
            Type::Integer(crate::ir::IntWidth::W32) => "i32",
            Type::Integer(crate::ir::IntWidth::W64) => "i64",
            Type::Float(crate::ir::FloatWidth::W32) => "f32",
            Type::Float(crate::ir::FloatWidth::W64) => "f64",
            Type::Class { .. } | Type::Variable(_) => {
                panic!("class_for_primitive called with a non-primitive type")
            }
        };
        self.class_by_name(name)
    }

    pub fn is_builtin_id(id: ClassId) -> bool {
        id.is_builtin()
    }

    /// Index into a builtin class's method table of the method named `name`, if
    /// present. Mirrors `ir::Class::find_method_index`, but builtin classes never
    /// need a `Package` to resolve a function name since every builtin function
    /// lives in `self.functions` instead.
    pub fn find_method_index(&self, class: ClassId, name: &str) -> Option<u32> {
        self.class(class)
            .methods
            .iter()
            .position(|&id| self.function(id).name == name)
            .map(|i| i as u32)
    }

    /// The id of the method named `name` on `class` itself. Panics if the catalogue
    /// doesn't declare it, since callers only ever ask for methods this crate's own
    /// lowering code depends on.
    fn function_named(&self, class: ClassId, name: &str) -> FunctionId {
        self.class(class)
            .methods
            .iter()
            .copied()
            .find(|&id| self.function(id).name == name)
            .unwrap_or_else(|| panic!("builtin class {:?} has no method named {name}", class))
    }

    /// `type.is-subtype-of(type) -> boolean`, used to dispatch a pattern match case
    /// against the scrutinee's runtime type.
    pub fn is_subtype_of_function(&self) -> FunctionId {
        self.function_named(self.type_class(), "is-subtype-of")
    }

    /// Index of `object.typeof` in the root class's own method table, used to fetch
    /// a value's runtime type before testing it against a pattern.
    pub fn typeof_index(&self) -> u32 {
        self.find_method_index(self.root_class(), "typeof")
            .expect("builtin object class declares typeof")
    }
}

static REGISTRY: Lazy<RwLock<Option<&'static BuiltinRegistry>>> = Lazy::new(|| RwLock::new(None));

/// Returns the process-wide builtin registry, loading it from the embedded
/// catalogue on first use. Subsequent calls reuse the same instance.
pub fn builtins() -> &'static BuiltinRegistry {
    if let Some(registry) = *REGISTRY.read().unwrap() {
        return registry;
    }
    let mut slot = REGISTRY.write().unwrap();
    if slot.is_none() {
        let loaded = BuiltinRegistry::load().expect("embedded builtin catalogue is well-formed");
        *slot = Some(Box::leak(Box::new(loaded)));
    }
    slot.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_without_error() {
        let reg = BuiltinRegistry::load().unwrap();
        assert!(!reg.classes.is_empty());
    }

    #[test]
    fn root_class_has_no_supertype() {
        let reg = BuiltinRegistry::load().unwrap();
        let root = reg.class(reg.root_class());
        assert!(root.supertype.is_none());
    }

    #[test]
    fn nothing_inherits_from_object() {
        let reg = BuiltinRegistry::load().unwrap();
        let nothing = reg.class(reg.nothing_class());
        assert_eq!(
            nothing.supertype.as_ref().and_then(Type::class_id),
            Some(reg.root_class())
        );
    }

    #[test]
    fn string_inherits_no_fields_from_object_but_keeps_its_own() {
        let reg = BuiltinRegistry::load().unwrap();
        let string_class = reg.class(reg.string_class());
        assert_eq!(string_class.fields.len(), 1);
        assert_eq!(string_class.fields[0].name, "length");
    }

    #[test]
    fn class_ids_are_negative_and_sequential() {
        let reg = BuiltinRegistry::load().unwrap();
        for (i, class) in reg.classes.iter().enumerate() {
            assert_eq!(class.id, ClassId(-(i as i32) - 1));
        }
    }

    #[test]
    fn global_accessor_caches_across_calls() {
        let a = builtins() as *const _;
        let b = builtins() as *const _;
        assert_eq!(a, b);
    }
}
