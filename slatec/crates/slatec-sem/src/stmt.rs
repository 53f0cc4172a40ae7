//! Statement elaboration.
//!
//! Control flow keeps one exit block per function and a stack of loop
//! exits; `break` and `return` emit destructors for every scope they
//! unwind before branching, and normal scope exit does the same, so no
//! variable is destroyed twice on any path.

use slatec_ast as ast;
use slatec_util::{Span, Symbol};

use crate::ctx::{GenCtx, LoopFrame};
use crate::entity::Variable;
use crate::error::{DiagKind, SemResult};
use crate::scope::ScopeOwner;
use crate::types::TypeKind;
use crate::value::{Value, ValueKind};

impl GenCtx<'_> {
    pub fn elaborate_stmt(&mut self, stmt: &ast::Stmt) -> SemResult<()> {
        match stmt {
            ast::Stmt::Expr(expr) => {
                self.elaborate_expr(expr)?;
                Ok(())
            }
            ast::Stmt::Let(decl) => self.stmt_let(decl),
            ast::Stmt::If(stmt) => self.stmt_if(stmt),
            ast::Stmt::While(stmt) => self.stmt_while(stmt),
            ast::Stmt::For(stmt) => self.stmt_for(stmt),
            ast::Stmt::Return(expr, span) => self.stmt_return(expr.as_ref(), *span),
            ast::Stmt::Break(span) => self.stmt_break(*span),
            ast::Stmt::Block(block) => self.stmt_block(block),
        }
    }

    fn stmt_block(&mut self, block: &ast::Block) -> SemResult<()> {
        self.enter_scope(ScopeOwner::Block);
        let result: SemResult<()> = (|| {
            for stmt in &block.stmts {
                self.elaborate_stmt(stmt)?;
            }
            Ok(())
        })();
        if result.is_ok() {
            self.exit_scope()?;
        }
        result
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn stmt_let(&mut self, decl: &ast::LetStmt) -> SemResult<()> {
        let declared = match &decl.ty {
            Some(texpr) => Some(self.resolve_type(texpr)?),
            None => None,
        };

        if decl.init.is_none() {
            if decl.is_const {
                self.report(DiagKind::UninitializedConst(decl.name), decl.span);
            }
            let Some(ty) = declared else {
                self.report(DiagKind::ExpectedType(decl.name), decl.span);
                return Ok(());
            };
            // Uninitialized storage.
            let slot = self.alloc_slot(ty, decl.name);
            self.bind_local(decl.name, ty, slot, decl.is_const, decl.span);
            return Ok(());
        }

        let init = decl.init.as_ref().expect("checked above");

        // Construct class initializers directly into the variable's
        // storage so the variable owns the object (and its destructor).
        if let ast::Expr::ClassInit(ci) = init {
            let constructed = self.class_init(ci)?;
            if self.is_poisoned(&constructed) {
                return Ok(());
            }
            let ty = declared.unwrap_or(constructed.ty);
            if !self.arena.types_equal(ty, constructed.ty) {
                let converted = self.convert_or_error(&constructed, ty, decl.span);
                let slot = self.alloc_slot(ty, decl.name);
                self.store_into(ty, slot, &converted, decl.span);
                self.bind_local(decl.name, ty, slot, decl.is_const, decl.span);
                return Ok(());
            }
            // Adopt the constructed storage as the variable itself.
            let mut value = constructed;
            value.name = decl.name;
            value.is_temporary = false;
            value.kind = ValueKind::Variable {
                is_const: decl.is_const,
            };
            let var = self.arena.vars.push(Variable {
                name: decl.name,
                value,
                is_const: decl.is_const,
                span: decl.span,
            });
            let scope = self.current_scope();
            if self
                .scopes
                .insert(
                    scope,
                    decl.name,
                    crate::scope::Binding::Entity(crate::entity::Entity::Var(var)),
                )
                .is_err()
            {
                self.report(DiagKind::RedeclaredName(decl.name), decl.span);
            }
            return Ok(());
        }

        let value = self.elaborate_expr(init)?;
        if self.is_poisoned(&value) {
            return Ok(());
        }

        // `const` with a folded literal stays in the constant domain and
        // needs no storage; assignment then fails naturally.
        if decl.is_const && declared.is_none() {
            if value.as_const().is_some() {
                let mut constant = value.clone();
                constant.name = decl.name;
                let var = self.arena.vars.push(Variable {
                    name: decl.name,
                    value: constant,
                    is_const: true,
                    span: decl.span,
                });
                let scope = self.current_scope();
                if self
                    .scopes
                    .insert(
                        scope,
                        decl.name,
                        crate::scope::Binding::Entity(crate::entity::Entity::Var(var)),
                    )
                    .is_err()
                {
                    self.report(DiagKind::RedeclaredName(decl.name), decl.span);
                }
                return Ok(());
            }
        }

        let ty = declared.unwrap_or_else(|| self.arena.strip_refs(value.ty));
        let slot = self.alloc_slot(ty, decl.name);
        self.store_into(ty, slot, &value, decl.span);
        self.bind_local(decl.name, ty, slot, decl.is_const, decl.span);
        Ok(())
    }

    fn bind_local(
        &mut self,
        name: Symbol,
        ty: crate::types::TypeId,
        slot: slatec_ssa::ValueRef,
        is_const: bool,
        span: Span,
    ) {
        let mut value = Value::place(name, ty, slot);
        value.kind = ValueKind::Variable { is_const };
        self.declare_var(
            name,
            Variable {
                name,
                value,
                is_const,
                span,
            },
            span,
            true,
        );
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn stmt_if(&mut self, stmt: &ast::IfStmt) -> SemResult<()> {
        let cond = self.elaborate_expr(&stmt.cond)?;
        let cond = self.to_bool(&cond, stmt.cond.span());

        let (then_block, else_block, merge) = {
            let mut b = self.bld();
            let then_block = b.new_basic_block("then");
            let else_block = stmt.else_branch.as_ref().map(|_| b.new_basic_block("else"));
            let merge = b.new_basic_block("endif");
            b.br_cond(cond.ssa, then_block, else_block.unwrap_or(merge));
            (then_block, else_block, merge)
        };

        self.set_block(then_block);
        self.stmt_block(&stmt.then_branch)?;
        if !self.bld().is_terminated() {
            self.bld().br(merge);
        }

        if let (Some(else_block), Some(else_branch)) = (else_block, &stmt.else_branch) {
            self.set_block(else_block);
            self.stmt_block(else_branch)?;
            if !self.bld().is_terminated() {
                self.bld().br(merge);
            }
        }

        self.set_block(merge);
        Ok(())
    }

    fn stmt_while(&mut self, stmt: &ast::WhileStmt) -> SemResult<()> {
        let (header, body_block, exit) = {
            let mut b = self.bld();
            let header = b.new_basic_block("while.cond");
            let body_block = b.new_basic_block("while.body");
            let exit = b.new_basic_block("while.end");
            b.br(header);
            (header, body_block, exit)
        };

        self.set_block(header);
        let cond = self.elaborate_expr(&stmt.cond)?;
        let cond = self.to_bool(&cond, stmt.cond.span());
        self.bld().br_cond(cond.ssa, body_block, exit);

        let depth = self.frame().scope_stack.len();
        self.frame_mut().loops.push(LoopFrame {
            exit,
            scope_depth: depth,
        });

        self.set_block(body_block);
        let body_result = self.stmt_block(&stmt.body);
        if body_result.is_ok() && !self.bld().is_terminated() {
            self.bld().br(header);
        }
        self.frame_mut().loops.pop();
        body_result?;

        self.set_block(exit);
        Ok(())
    }

    /// `for x in e`: `e` must expose `next()` returning a two-property
    /// class `(has_value, value)`. The `begin`/`end` iterator form is not
    /// part of the protocol and is rejected.
    fn stmt_for(&mut self, stmt: &ast::ForStmt) -> SemResult<()> {
        let iterable = self.elaborate_expr(&stmt.iter)?;
        if self.is_poisoned(&iterable) {
            return Ok(());
        }
        let shown = self.arena.display_type(iterable.ty);
        if self.arena.class_of(iterable.ty).is_none() {
            self.report(
                DiagKind::InvalidOperator {
                    op: "for".to_string(),
                    ty: shown,
                },
                stmt.span,
            );
            return Ok(());
        }
        let place = self.ensure_addressable(&iterable);
        let next_sym = Symbol::intern("next");
        let has_next = self
            .find_member_value(&place, next_sym, stmt.span)?
            .is_some();
        if !has_next {
            self.report(
                DiagKind::InvalidOperator {
                    op: "for".to_string(),
                    ty: shown,
                },
                stmt.span,
            );
            return Ok(());
        }

        let (header, body_block, exit) = {
            let mut b = self.bld();
            let header = b.new_basic_block("for.cond");
            let body_block = b.new_basic_block("for.body");
            let exit = b.new_basic_block("for.end");
            b.br(header);
            (header, body_block, exit)
        };

        // Header: step = iter.next(); branch on step's first property.
        self.set_block(header);
        let method = self
            .find_member_value(&place, next_sym, stmt.span)?
            .expect("checked above");
        let step = self.call_value(method, Vec::new(), stmt.span)?;
        if self.is_poisoned(&step) {
            self.set_block(exit);
            return Ok(());
        }
        let step_place = self.ensure_addressable(&step);
        let Some(step_class) = self.arena.class_of(step_place.ty) else {
            self.report(
                DiagKind::InvalidOperator {
                    op: "for".to_string(),
                    ty: self.arena.display_type(step.ty),
                },
                stmt.span,
            );
            self.set_block(exit);
            return Ok(());
        };
        if self.arena.classes[step_class].properties.len() < 2 {
            self.report(
                DiagKind::InvalidOperator {
                    op: "for".to_string(),
                    ty: self.arena.display_type(step.ty),
                },
                stmt.span,
            );
            self.set_block(exit);
            return Ok(());
        }
        let has_value = self.read_own_property(&step_place, step_class, 0);
        let has_value = self.to_bool(&has_value, stmt.span);
        self.bld().br_cond(has_value.ssa, body_block, exit);

        let depth = self.frame().scope_stack.len();
        self.frame_mut().loops.push(LoopFrame {
            exit,
            scope_depth: depth,
        });

        // Body: bind the element by copy, then the statements.
        self.set_block(body_block);
        self.enter_scope(ScopeOwner::Block);
        let body_result: SemResult<()> = (|| {
            let element = self.read_own_property(&step_place, step_class, 1);
            let elem_ty = self.arena.strip_refs(element.ty);
            let slot = self.alloc_slot(elem_ty, stmt.binding);
            self.store_into(elem_ty, slot, &element, stmt.span);
            self.bind_local(stmt.binding, elem_ty, slot, false, stmt.span);

            for s in &stmt.body.stmts {
                self.elaborate_stmt(s)?;
            }
            Ok(())
        })();
        if body_result.is_ok() {
            self.exit_scope()?;
            if !self.bld().is_terminated() {
                self.bld().br(header);
            }
        }
        self.frame_mut().loops.pop();
        body_result?;

        self.set_block(exit);
        Ok(())
    }

    fn stmt_return(&mut self, expr: Option<&ast::Expr>, span: Span) -> SemResult<()> {
        let ret_type = self.frame().ret_type;
        let is_void = matches!(self.arena.type_kind(ret_type), TypeKind::Void);

        match expr {
            Some(expr) => {
                let value = self.elaborate_expr(expr)?;
                if is_void {
                    self.report(
                        DiagKind::ReturnTypeMismatch(self.arena.display_type(ret_type)),
                        span,
                    );
                } else if !self.is_poisoned(&value) {
                    if !self.can_convert(value.ty, ret_type) {
                        self.report(
                            DiagKind::ReturnTypeMismatch(self.arena.display_type(ret_type)),
                            span,
                        );
                    } else if let Some(slot) = self.frame().ret_slot {
                        let converted = self.cast_value(&value, ret_type);
                        let loaded = self.load_for_read(&converted);
                        self.bld().store(loaded.ssa, slot);
                    }
                }
            }
            None => {
                if !is_void && !self.arena.is_error(ret_type) {
                    self.report(
                        DiagKind::ReturnTypeMismatch(self.arena.display_type(ret_type)),
                        span,
                    );
                }
            }
        }

        self.unwind_for_return()?;
        let exit = self.frame().exit_block;
        self.bld().br(exit);
        Ok(())
    }

    fn stmt_break(&mut self, span: Span) -> SemResult<()> {
        let Some(loop_frame) = self.frame().loops.last() else {
            self.report(DiagKind::BreakOutsideLoop, span);
            return Ok(());
        };
        let (exit, depth) = (loop_frame.exit, loop_frame.scope_depth);
        self.unwind_for_break(depth)?;
        self.bld().br(exit);
        Ok(())
    }

    /// Read property `index` of a class place as an l-value (no parent
    /// walk; protocol helpers know the property they want).
    pub(crate) fn read_own_property(
        &mut self,
        place: &Value,
        class: crate::entity::ClassId,
        index: usize,
    ) -> Value {
        let def = &self.arena.classes[class];
        let prop = def.properties[index].clone();
        let field_index = def.parents.len() + index;
        let class_ssa = def.ssa;
        let prop_ssa = self.arena.ssa_type(prop.ty);
        let ptr_ty = self.module.types.ptr(prop_ssa);

        let zero = slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(32, 0));
        let field = slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(32, field_index as u64));
        let ptr = self
            .bld()
            .gep(class_ssa, place.ssa, vec![zero, field], ptr_ty);
        Value::place(prop.name, prop.ty, ptr)
    }
}
