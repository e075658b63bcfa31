//! Core block management and function/constructor prologue (spec §4.2, §4.4).
//!
//! Mirrors a simple invariant: once the builder becomes unreachable (a `ret`,
//! `throw`, or both arms of an `if` having already terminated), every subsequent
//! `new_block`/`set_current_block`/`add` is a no-op until something calls
//! `reset_reachable` — which only ever happens at the natural join point after a
//! branch, via `unreachable_scope`. This keeps dead code from ever being appended to
//! a block and saves the lowering code from having to check reachability itself
//! before every single emit.

use std::collections::HashMap;

use crate::ast::{CapturedLocation, DefnInfo, Expr, Info, IrDefn, Mode, NodeId, ScopeId};
use crate::builtins::BuiltinRegistry;
use crate::bytecode::{BasicBlock, BlockId, Instr};
use crate::error::{CompileError, CompileResult};
use crate::ir::{ClassId, Function, Package, StringId};

/// A resolved assignment target (spec §4.4's `LValue`/`VarLValue`/`PropertyLValue`).
/// Built by `Builder::compile_lvalue` and consumed by `Builder::build_assignment`.
pub enum LValue {
    /// A local variable, a parameter, or a variable captured into a context,
    /// resolved through `defn_info`. Unlike a field lvalue, reaching the storage
    /// location (following the context chain if necessary) is folded into
    /// `load`/`store` themselves, so nothing needs to sit on the stack up front.
    Var { defn_info: DefnInfo },
    /// A field reached through an explicit receiver expression, which has already
    /// been evaluated onto the stack by the time this variant is constructed.
    Property { class: ClassId, field_index: u32 },
}

impl LValue {
    pub fn on_stack(&self) -> bool {
        matches!(self, LValue::Property { .. })
    }
}

pub struct Builder<'p, I: Info> {
    pub(crate) package: &'p Package,
    pub(crate) builtins: &'p BuiltinRegistry,
    pub(crate) info: &'p I,
    pub(crate) function: Function,
    /// The AST node whose `ClosureInfo` describes how to reach an enclosing scope's
    /// context from the function currently being compiled (the source's
    /// `getScopeAstDefn`): ordinarily the function/constructor's own node, except a
    /// primary constructor's body is compiled against its owning class's node
    /// instead, since that's where the class's closure analysis is attached.
    pub(crate) scope_defn: NodeId,
    /// String literal ids, interned into the package's string table by a
    /// preparatory pass before any function body is built (see
    /// `crate::driver::intern_string_literals`), keyed by the literal's AST node.
    /// Kept separate from `package` itself so that `package` can stay a plain shared
    /// reference and builders for independent functions can run concurrently
    /// (spec §5) without needing a lock around the string table.
    pub(crate) string_ids: &'p HashMap<NodeId, StringId>,
    next_block_id: u32,
    current_block: Option<usize>,
    pub(crate) unreachable: bool,
}

const UNREACHABLE_BLOCK: BlockId = BlockId(u32::MAX);

impl<'p, I: Info> Builder<'p, I> {
    pub fn new(
        function: Function,
        package: &'p Package,
        builtins: &'p BuiltinRegistry,
        info: &'p I,
        scope_defn: NodeId,
        string_ids: &'p HashMap<NodeId, StringId>,
    ) -> Self {
        let mut builder = Builder {
            package,
            builtins,
            info,
            function,
            scope_defn,
            string_ids,
            next_block_id: 0,
            current_block: None,
            unreachable: false,
        };
        let entry = builder.new_block();
        builder.set_current_block(entry);
        builder
    }

    pub fn finish(self) -> Function {
        self.function
    }

    /// Allocates a new block. Returns the sentinel id when the builder is currently
    /// unreachable, matching the "don't bother" behavior live code relies on: the
    /// caller branches/sets-current-block with this id just like any other, and
    /// those calls are themselves no-ops while unreachable.
    pub fn new_block(&mut self) -> BlockId {
        if self.unreachable {
            return UNREACHABLE_BLOCK;
        }
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.function.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        if self.unreachable {
            return;
        }
        self.current_block = Some(block.0 as usize);
    }

    pub fn add(&mut self, instr: Instr) {
        if self.unreachable {
            return;
        }
        let idx = self.current_block.expect("no current block set");
        self.function.blocks[idx].push(instr);
    }

    /// Runs `f`, then clears `unreachable` if (and only if) `f` is what made it
    /// true — mirrors the source's `UnreachableScope`: compiling one arm of a
    /// branch that always returns/throws shouldn't poison the rest of the function,
    /// but if the surrounding code was already unreachable, it stays that way.
    pub fn unreachable_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> (R, bool) {
        let was_unreachable = self.unreachable;
        let result = f(self);
        let became_unreachable = self.unreachable;
        if self.unreachable && !was_unreachable {
            self.unreachable = false;
        }
        (result, became_unreachable)
    }

    // --- literals and simple pushes, named to match the bytecode mnemonics ---

    pub fn unit(&mut self) {
        self.add(Instr::Unit);
    }
    pub fn dup(&mut self) {
        self.add(Instr::Dup);
    }
    pub fn drop(&mut self) {
        self.add(Instr::Drop);
    }
    pub fn swap(&mut self) {
        self.add(Instr::Swap);
    }
    pub fn swap2(&mut self) {
        self.add(Instr::Swap2);
    }
    pub fn ret(&mut self) {
        self.add(Instr::Ret);
        self.unreachable = true;
    }
    pub fn throw_(&mut self) {
        self.add(Instr::Throw);
        self.unreachable = true;
    }
    pub fn branch(&mut self, target: BlockId) {
        self.add(Instr::Branch(target));
    }
    pub fn branchif(&mut self, t: BlockId, f: BlockId) {
        self.add(Instr::BranchIf(t, f));
    }

    pub fn drop_for_effect(&mut self, mode: crate::ast::Mode) {
        if mode == crate::ast::Mode::ForEffect {
            self.drop();
        }
    }

    // --- locals, fields, contexts ---

    pub fn ldlocal(&mut self, index: i32) {
        self.add(Instr::LdLocal(index));
    }
    pub fn stlocal(&mut self, index: i32) {
        self.add(Instr::StLocal(index));
    }

    pub fn load_this(&mut self) {
        assert!(self.function.is_method() || self.function.is_constructor());
        self.ldlocal(0);
    }

    pub fn load_field(&mut self, class: ClassId, field_index: u32) {
        let field = self.resolve_field(class, field_index);
        let ty = field.ty.clone();
        let instr = if ty.is_object() {
            if ty.is_nullable() {
                Instr::LdP(field_index)
            } else {
                Instr::LdPc(field_index)
            }
        } else {
            match ty.storage_width() {
                1 => Instr::Ld8(field_index),
                2 => Instr::Ld16(field_index),
                4 => Instr::Ld32(field_index),
                _ => Instr::Ld64(field_index),
            }
        };
        self.add(instr);
    }

    pub fn store_field(&mut self, class: ClassId, field_index: u32) {
        let field = self.resolve_field(class, field_index);
        let ty = field.ty.clone();
        let instr = if ty.is_object() {
            Instr::StP(field_index)
        } else {
            match ty.storage_width() {
                1 => Instr::St8(field_index),
                2 => Instr::St16(field_index),
                4 => Instr::St32(field_index),
                _ => Instr::St64(field_index),
            }
        };
        self.add(instr);
    }

    fn resolve_field(&self, class: ClassId, field_index: u32) -> crate::ir::Field {
        if class.is_builtin() {
            self.builtins.class(class).field(field_index).clone()
        } else {
            self.package.class(class).field(field_index).clone()
        }
    }

    /// Loads the value of a resolved definition: a plain local/parameter, or a
    /// field reached by walking the closure context chain for `scope_id` first.
    pub fn load_defn(&mut self, defn_info: &DefnInfo) {
        match defn_info.defn {
            IrDefn::Variable(index) => {
                debug_assert_eq!(defn_info.scope_id.0, 0);
                self.ldlocal(index);
            }
            IrDefn::Field(class, index) => {
                self.load_context(defn_info.scope_id);
                self.load_field(class, index);
            }
            _ => unreachable!("load_defn called with a non-storage definition"),
        }
    }

    pub fn store_defn(&mut self, defn_info: &DefnInfo) {
        match defn_info.defn {
            IrDefn::Variable(index) => {
                debug_assert_eq!(defn_info.scope_id.0, 0);
                self.stlocal(index);
            }
            IrDefn::Field(class, index) => {
                self.load_context(defn_info.scope_id);
                self.store_field(class, index);
            }
            _ => unreachable!("store_defn called with a non-storage definition"),
        }
    }

    /// Loads the context object for `scope_id`, as seen from the function currently
    /// being compiled: looks up how `scope_defn`'s `ClosureInfo` reaches it (still a
    /// local in the same scope, a field reached through `this`, or `this` itself)
    /// and emits the corresponding load.
    pub fn load_context(&mut self, scope_id: ScopeId) {
        let closure_info = self
            .info
            .closure_info(self.scope_defn)
            .expect("a captured definition's enclosing scope must have closure info");
        match closure_info
            .contexts
            .get(&scope_id)
            .copied()
            .expect("scope_id must be one of this scope's known enclosing contexts")
        {
            CapturedLocation::Variable(index) => self.ldlocal(index),
            CapturedLocation::Field(class, field_index) => {
                self.load_this();
                self.load_field(class, field_index);
            }
            CapturedLocation::ThroughThis => self.load_this(),
        }
    }

    /// Allocates and initializes a context object for `context_id`, then stores it
    /// into the local slot `scope_defn`'s `ClosureInfo` says holds it. A freshly
    /// created context is always stored into a plain local in the scope that creates
    /// it (it's only ever seen as a `Field` from a deeper nested closure's point of
    /// view, never from its own).
    pub fn create_context(&mut self, context_id: ScopeId, context_class: ClassId) {
        let ctor = {
            let class = if context_class.is_builtin() {
                self.builtins.class(context_class)
            } else {
                self.package.class(context_class)
            };
            class.constructors[0]
        };
        self.add(Instr::AllocObj(context_class));
        self.dup();
        self.add(Instr::CallG(1, ctor));
        self.drop();
        let closure_info = self
            .info
            .closure_info(self.scope_defn)
            .expect("the scope creating a context must have closure info for it");
        match closure_info.contexts.get(&context_id) {
            Some(CapturedLocation::Variable(index)) => self.stlocal(*index),
            _ => unreachable!("a freshly created context always stores into a local variable"),
        }
    }

    /// Resolves an lvalue expression (spec §4.4): dispatches on the AST node's own
    /// shape, not just the resolved definition, since a captured variable (`IrDefn::
    /// Field` reached through a bare `Expr::Variable`) and an explicit property
    /// access onto a field (`Expr::Property` with a `Field` definition) need
    /// different storage — the former walks the context chain the same way
    /// `load_defn`/`store_defn` already do, the latter needs its own receiver
    /// expression evaluated onto the stack exactly once.
    pub fn compile_lvalue(&mut self, lhs: &Expr) -> CompileResult<LValue> {
        let use_info = self
            .info
            .use_info(lhs.id())
            .ok_or(CompileError::UnassignableLValue)?
            .defn_info
            .clone();
        match (lhs, use_info.defn) {
            (Expr::Property { receiver, .. }, IrDefn::Field(class, index)) => {
                self.lower(receiver, Mode::ForValue)?;
                Ok(LValue::Property { class, field_index: index })
            }
            (_, IrDefn::Variable(_)) | (_, IrDefn::Field(..)) => Ok(LValue::Var { defn_info: use_info }),
            _ => Err(CompileError::UnassignableLValue),
        }
    }

    pub fn load_lvalue(&mut self, lvalue: &LValue) {
        match lvalue {
            LValue::Var { defn_info } => self.load_defn(defn_info),
            LValue::Property { class, field_index } => {
                self.dup();
                self.load_field(*class, *field_index);
            }
        }
    }

    pub fn store_lvalue(&mut self, lvalue: &LValue) {
        match lvalue {
            LValue::Var { defn_info } => self.store_defn(defn_info),
            LValue::Property { class, field_index } => self.store_field(*class, *field_index),
        }
    }

    /// Assigns the value on top of the stack to `lvalue`, leaving the assigned
    /// value on the stack iff `mode` is for-value (spec §4.4's `buildAssignment`).
    pub fn build_assignment(&mut self, lvalue: &LValue, mode: crate::ast::Mode) {
        if mode == crate::ast::Mode::ForValue {
            self.dup();
            if lvalue.on_stack() {
                self.swap2();
            }
        } else if lvalue.on_stack() {
            self.swap();
        }
        self.store_lvalue(lvalue);
    }

    pub fn node_type(&self, node: NodeId) -> crate::ir::Type {
        self.info
            .get_type(node)
            .cloned()
            .expect("every expression node has a resolved type")
    }
}
