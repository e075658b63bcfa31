//! Expression lowering: one function per `Expr` shape, dispatched by `lower` (spec
//! §4.4).

use crate::ast::{BinaryOp, Expr, IrDefn, Literal, Mode, UnaryOp, Info};
use crate::cfg::builder::Builder;
use crate::cfg::call;
use crate::error::CompileResult;

impl<'p, I: Info> Builder<'p, I> {
    pub fn lower(&mut self, expr: &Expr, mode: Mode) -> CompileResult<()> {
        match expr {
            Expr::Literal { id, value } => self.lower_literal(*id, value, mode),
            Expr::Variable { id } => self.lower_variable(*id, mode)?,
            Expr::This { .. } => {
                self.load_this();
                self.drop_for_effect(mode);
            }
            Expr::Super { .. } => {
                // `super` only has meaning as the receiver of a call; reaching this
                // arm means it appeared somewhere else.
                return Err(crate::error::CompileError::SuperOutsideCall);
            }
            Expr::Block { statements, .. } => self.lower_block(statements, mode)?,
            Expr::Assign { lhs, rhs, .. } => self.lower_assign(lhs, rhs, mode)?,
            Expr::CompoundAssign { id, lhs, rhs, .. } => {
                call::build_compound_assignment_call(self, *id, lhs, rhs, mode)?
            }
            Expr::Property { id, receiver, name } => {
                self.lower_property(*id, receiver, name, mode)?
            }
            Expr::Call { .. } => call::build_call_expr(self, expr, mode)?,
            Expr::Unary { operand, .. } => {
                self.lower(operand, Mode::ForValue)?;
                call::build_operator_call(self, expr, mode)?;
            }
            Expr::Binary { id, op, left, right } => self.lower_binary(*id, *op, left, right, mode)?,
            Expr::If { condition, then_branch, else_branch, .. } => {
                self.lower_if(condition, then_branch, else_branch.as_deref(), mode)?
            }
            Expr::While { condition, body, .. } => self.lower_while(condition, body, mode)?,
            Expr::Throw { exception, .. } => {
                self.lower(exception, Mode::ForValue)?;
                self.throw_();
            }
            Expr::TryCatch { body, catch, finally, .. } => {
                crate::cfg::pattern::lower_try_catch(self, body, catch.as_deref(), finally.as_deref(), mode)?
            }
            Expr::PartialFunction { scrutinee, cases, .. } => {
                self.lower(scrutinee, Mode::ForValue)?;
                crate::cfg::pattern::lower_partial_function(self, cases, mode)?;
            }
            Expr::Return { value, .. } => {
                match value {
                    Some(v) => self.lower(v, Mode::ForValue)?,
                    None => self.unit(),
                }
                self.ret();
            }
            Expr::VariableDefinition { pattern, value, .. } => {
                self.lower_variable_definition(pattern, value.as_deref())?;
            }
            Expr::FunctionDeclaration { .. } => {
                // The closure object (if any) for this declaration is built up front
                // by `crate::cfg::prologue::build_declarations`, not here; as a
                // statement in its own right this node produces nothing.
            }
        }
        Ok(())
    }

    fn lower_literal(&mut self, node: crate::ast::NodeId, literal: &Literal, mode: Mode) {
        match literal {
            Literal::Integer(v) => {
                let instr = match self.node_type(node) {
                    crate::ir::Type::Integer(crate::ir::IntWidth::W8) => {
                        crate::bytecode::Instr::I8(*v as i8)
                    }
                    crate::ir::Type::Integer(crate::ir::IntWidth::W16) => {
                        crate::bytecode::Instr::I16(*v as i16)
                    }
                    crate::ir::Type::Integer(crate::ir::IntWidth::W32) => {
                        crate::bytecode::Instr::I32(*v as i32)
                    }
                    _ => crate::bytecode::Instr::I64(*v),
                };
                self.add(instr);
            }
            Literal::Float(v) => {
                let instr = match self.node_type(node) {
                    crate::ir::Type::Float(crate::ir::FloatWidth::W32) => {
                        crate::bytecode::Instr::F32(*v as f32)
                    }
                    _ => crate::bytecode::Instr::F64(*v),
                };
                self.add(instr);
            }
            Literal::String(_) => {
                // Interned up front by `crate::driver::intern_string_literals`, keyed
                // by this literal's own node id, so the same text reused at two call
                // sites still shares one string-table entry (spec's `findOrAddString`
                // idempotence law) without the builder needing mutable package access.
                let id = *self
                    .string_ids
                    .get(&node)
                    .expect("every string literal node is interned before its function is built");
                self.add(crate::bytecode::Instr::StringLit(id));
            }
            Literal::Boolean(true) => self.add(crate::bytecode::Instr::True),
            Literal::Boolean(false) => self.add(crate::bytecode::Instr::False),
            Literal::Null => self.add(crate::bytecode::Instr::Null),
        }
        self.drop_for_effect(mode);
    }

    fn lower_variable(&mut self, id: crate::ast::NodeId, mode: Mode) -> CompileResult<()> {
        let use_info = self
            .info
            .use_info(id)
            .expect("variable reference must have use info")
            .clone();
        self.load_defn(&use_info.defn_info);
        self.drop_for_effect(mode);
        Ok(())
    }

    pub(crate) fn lower_block(&mut self, statements: &[Expr], mode: Mode) -> CompileResult<()> {
        if statements.is_empty() {
            if mode == Mode::ForValue {
                self.unit();
            }
            return Ok(());
        }
        for stmt in &statements[..statements.len() - 1] {
            self.lower(stmt, Mode::ForEffect)?;
        }
        self.lower(&statements[statements.len() - 1], mode)
    }

    fn lower_assign(&mut self, lhs: &Expr, rhs: &Expr, mode: Mode) -> CompileResult<()> {
        let lvalue = self.compile_lvalue(lhs)?;
        self.lower(rhs, Mode::ForValue)?;
        self.build_assignment(&lvalue, mode);
        Ok(())
    }

    fn lower_property(
        &mut self,
        id: crate::ast::NodeId,
        receiver: &Expr,
        _name: &str,
        mode: Mode,
    ) -> CompileResult<()> {
        let use_info = self
            .info
            .use_info(id)
            .expect("property reference must have use info")
            .clone();
        match use_info.defn_info.defn {
            IrDefn::Field(class, index) => {
                self.lower(receiver, Mode::ForValue)?;
                self.load_field(class, index);
                self.drop_for_effect(mode);
                Ok(())
            }
            _ => {
                // Method-valued property access with no call around it isn't part
                // of this scope; every other property node is handled as a call
                // callee by `call::build_call_expr`.
                self.lower(receiver, Mode::ForEffect)?;
                Ok(())
            }
        }
    }

    fn lower_binary(
        &mut self,
        id: crate::ast::NodeId,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        mode: Mode,
    ) -> CompileResult<()> {
        match op {
            BinaryOp::AndThen | BinaryOp::OrElse => {
                let long_block = self.new_block();
                let join_block = self.new_block();
                self.lower(left, Mode::ForValue)?;
                self.dup();
                if op == BinaryOp::AndThen {
                    self.branchif(long_block, join_block);
                } else {
                    self.branchif(join_block, long_block);
                }
                self.set_current_block(long_block);
                self.drop();
                self.lower(right, Mode::ForValue)?;
                self.branch(join_block);
                self.set_current_block(join_block);
                self.drop_for_effect(mode);
                Ok(())
            }
            _ => call::build_binary_operator_call(self, id, left, right, mode),
        }
    }

    fn lower_if(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        mode: Mode,
    ) -> CompileResult<()> {
        self.lower(condition, Mode::ForValue)?;
        let true_block = self.new_block();
        match else_branch {
            None => {
                let join_block = self.new_block();
                self.branchif(true_block, join_block);
                self.set_current_block(true_block);
                let (result, _) = self.unreachable_scope(|b| -> CompileResult<()> {
                    b.lower(then_branch, Mode::ForEffect)?;
                    b.branch(join_block);
                    Ok(())
                });
                result?;
                self.set_current_block(join_block);
                if mode == Mode::ForValue {
                    self.unit();
                }
            }
            Some(else_expr) => {
                let false_block = self.new_block();
                let join_block = self.new_block();
                self.branchif(true_block, false_block);

                self.set_current_block(true_block);
                let (true_result, true_unreachable) = self.unreachable_scope(|b| -> CompileResult<()> {
                    b.lower(then_branch, mode)?;
                    b.branch(join_block);
                    Ok(())
                });
                true_result?;

                self.set_current_block(false_block);
                let (false_result, false_unreachable) = self.unreachable_scope(|b| -> CompileResult<()> {
                    b.lower(else_expr, mode)?;
                    b.branch(join_block);
                    Ok(())
                });
                false_result?;

                if true_unreachable && false_unreachable {
                    self.unreachable = true;
                }
                self.set_current_block(join_block);
            }
        }
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expr, body: &Expr, mode: Mode) -> CompileResult<()> {
        let cond_block = self.new_block();
        self.branch(cond_block);
        self.set_current_block(cond_block);
        self.lower(condition, Mode::ForValue)?;
        let body_block = self.new_block();
        let end_block = self.new_block();
        self.branchif(body_block, end_block);
        self.set_current_block(body_block);
        let (result, _) = self.unreachable_scope(|b| -> CompileResult<()> {
            b.lower(body, Mode::ForEffect)?;
            b.branch(cond_block);
            Ok(())
        });
        result?;
        self.set_current_block(end_block);
        if mode == Mode::ForValue {
            self.unit();
        }
        Ok(())
    }

    fn lower_variable_definition(
        &mut self,
        pattern: &crate::ast::Pattern,
        value: Option<&Expr>,
    ) -> CompileResult<()> {
        match value {
            Some(expr) => self.lower(expr, Mode::ForValue)?,
            None => self.add(crate::bytecode::Instr::Uninitialized),
        }
        self.lower_pattern_bind(pattern);
        Ok(())
    }

    /// Binds the value on top of the stack to an irrefutable pattern. Only
    /// `Pattern::Variable`/`Pattern::Blank` are irrefutable; a `Typed` pattern here
    /// would mean declaration analysis let a refutable pattern through a `let`,
    /// which is a bug upstream of this crate, not something the builder recovers
    /// from.
    fn lower_pattern_bind(&mut self, pattern: &crate::ast::Pattern) {
        match pattern {
            crate::ast::Pattern::Variable { id, .. } => {
                let defn_info = self
                    .info
                    .defn_info(*id)
                    .expect("bound variable must have defn info")
                    .clone();
                self.store_defn(&defn_info);
            }
            crate::ast::Pattern::Blank => self.drop(),
            crate::ast::Pattern::Typed { .. } => {
                unreachable!("a refutable pattern cannot appear in an irrefutable binding")
            }
        }
    }
}
