//! Expression elaboration.
//!
//! Each expression yields a [`Value`] bound to the SSA builder. The
//! conventions: reading an l-value loads unless a reference is wanted;
//! member access binds the receiver for a later call; calls follow the
//! original protocol (function-pointer auto-deref, receiver prepending,
//! per-parameter casts, reference materialization, variadic
//! load-and-pass, sret slot); `&&`/`||` build conditional blocks joined
//! by an `i1` phi, folding away entirely when the left side is a known
//! constant.

use slatec_ast as ast;
use slatec_util::{Span, Symbol};

use crate::ctx::GenCtx;
use crate::entity::{ClassId, Entity, FuncId, Variable};
use crate::error::{DiagKind, SemResult};
use crate::resolve::Resolved;
use crate::scope::Binding;
use crate::types::{TypeId, TypeKind};
use crate::value::{Value, ValueKind};

/// Where a member was found during the pure lookup phase.
struct MemberPath {
    /// Byte offset of the owning class inside the receiver.
    padding: u64,
    owner: ClassId,
    kind: MemberKind,
}

enum MemberKind {
    Property(usize),
    Methods(Vec<FuncId>),
}

impl GenCtx<'_> {
    pub fn elaborate_expr(&mut self, expr: &ast::Expr) -> SemResult<Value> {
        match expr {
            ast::Expr::Literal(lit) => Ok(self.literal(lit)),
            ast::Expr::Name(name) => self.name_expr(name),
            ast::Expr::Unary(unary) => self.unary_expr(unary),
            ast::Expr::Binary(binary) => self.binary_expr(binary),
            ast::Expr::Assign(assign) => self.assign_expr(assign),
            ast::Expr::Call(call) => self.call_expr(call),
            ast::Expr::Index(index) => self.index_expr(index),
            ast::Expr::Member(member) => self.member_expr(member),
            ast::Expr::Cast(cast) => self.cast_expr(cast),
            ast::Expr::ClassInit(init) => self.class_init(init),
            ast::Expr::Asm(asm) => self.asm_expr(asm),
        }
    }

    // ------------------------------------------------------------------
    // Literals and names
    // ------------------------------------------------------------------

    fn literal(&mut self, lit: &ast::Literal) -> Value {
        match &lit.kind {
            ast::LitKind::Str(text) => self.string_literal(*text),
            _ => self.literal_const_value(lit),
        }
    }

    fn name_expr(&mut self, name: &ast::ScopedName) -> SemResult<Value> {
        match self.resolve_name(name)? {
            None => Ok(self.poison()),
            Some(Resolved::Const(value)) => Ok(value),
            Some(Resolved::Overloads(set)) => Ok(self.overload_value(set)),
            Some(Resolved::Entity(entity)) => match entity {
                Entity::Var(var) => Ok(self.arena.vars[var].value.clone()),
                Entity::Func(func) => Ok(self.function_value(func)),
                _ => {
                    self.report(DiagKind::ExpectedValue, name.span);
                    Ok(self.poison())
                }
            },
        }
    }

    pub(crate) fn function_value(&self, func: FuncId) -> Value {
        let def = &self.arena.funcs[func];
        Value::plain(def.name, def.ty, slatec_ssa::ValueRef::Func(def.ssa))
    }

    fn overload_value(&self, set: Vec<FuncId>) -> Value {
        if set.len() == 1 {
            return self.function_value(set[0]);
        }
        let mut value = self.function_value(set[0]);
        value.kind = ValueKind::Overloads(set);
        value
    }

    // ------------------------------------------------------------------
    // Unary operators
    // ------------------------------------------------------------------

    fn unary_expr(&mut self, unary: &ast::UnaryExpr) -> SemResult<Value> {
        let operand = self.elaborate_expr(&unary.operand)?;
        if self.is_poisoned(&operand) {
            return Ok(self.poison());
        }
        let span = unary.span;
        match unary.op {
            ast::UnaryOp::AddrOf => self.address_of(&operand, span),
            ast::UnaryOp::Deref => self.deref(&operand, span),
            ast::UnaryOp::Neg => self.negate(&operand, span),
            ast::UnaryOp::Not => self.logical_not(&operand, span),
            ast::UnaryOp::BitNot => self.bit_not(&operand, span),
        }
    }

    /// `&x`: a pointer to the backing storage.
    fn address_of(&mut self, operand: &Value, span: Span) -> SemResult<Value> {
        if !operand.is_alloca {
            self.report(DiagKind::NotAssignable, span);
            return Ok(self.poison());
        }
        let ty = self.arena.ptr_type(self.module, operand.ty);
        Ok(Value::plain(operand.name, ty, operand.ssa))
    }

    /// `*p`: an l-value behind the pointer. `&*p` therefore hands back
    /// the original pointer unchanged.
    fn deref(&mut self, operand: &Value, span: Span) -> SemResult<Value> {
        let loaded = self.load_for_read(operand);
        match *self.arena.type_kind(loaded.ty) {
            TypeKind::Ptr { pointee } => Ok(Value::place(loaded.name, pointee, loaded.ssa)),
            _ => {
                self.report(
                    DiagKind::TypeMismatch {
                        expected: "pointer".to_string(),
                        found: self.arena.display_type(loaded.ty),
                    },
                    span,
                );
                Ok(self.poison())
            }
        }
    }

    fn negate(&mut self, operand: &Value, span: Span) -> SemResult<Value> {
        let stripped = self.arena.strip_refs(operand.ty);
        if self.arena.is_integer(stripped) {
            let loaded = self.load_for_read(operand);
            return Ok(self.negate_int(&loaded));
        }
        if self.arena.is_float(stripped) {
            let loaded = self.load_for_read(operand);
            if let Some(slatec_ssa::Const::Float { bits, value }) = loaded.as_const() {
                return Ok(Value::constant(
                    loaded.name,
                    loaded.ty,
                    slatec_ssa::Const::Float { bits, value: -value },
                ));
            }
            let zero = slatec_ssa::ValueRef::Const(slatec_ssa::Const::Float {
                bits: match self.arena.type_kind(loaded.ty) {
                    TypeKind::Float { bits } => *bits,
                    _ => 64,
                },
                value: 0.0,
            });
            let ty_ssa = self.arena.ssa_type(loaded.ty);
            let result = self
                .bld()
                .bin(slatec_ssa::BinOp::FSub, ty_ssa, zero, loaded.ssa);
            return Ok(Value::plain(loaded.name, loaded.ty, result));
        }
        if let Some(result) = self.unary_overload("-", operand, span)? {
            return Ok(result);
        }
        self.report(
            DiagKind::InvalidOperator {
                op: "-".to_string(),
                ty: self.arena.display_type(stripped),
            },
            span,
        );
        Ok(self.poison())
    }

    fn logical_not(&mut self, operand: &Value, span: Span) -> SemResult<Value> {
        let stripped = self.arena.strip_refs(operand.ty);
        if self.arena.is_integer(stripped) || self.arena.is_pointer(stripped) {
            let as_bool = self.to_bool(operand, span);
            if let Some(c) = as_bool.as_const() {
                let flipped = u64::from(c.is_zero_int());
                return Ok(Value::constant(
                    as_bool.name,
                    self.arena.bool_type,
                    slatec_ssa::Const::int(1, flipped),
                ));
            }
            let one = slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(1, 1));
            let bool_ssa = self.arena.ssa_type(self.arena.bool_type);
            let result = self
                .bld()
                .bin(slatec_ssa::BinOp::Xor, bool_ssa, as_bool.ssa, one);
            return Ok(Value::plain(as_bool.name, self.arena.bool_type, result));
        }
        if let Some(result) = self.unary_overload("!", operand, span)? {
            return Ok(result);
        }
        self.report(
            DiagKind::InvalidOperator {
                op: "!".to_string(),
                ty: self.arena.display_type(stripped),
            },
            span,
        );
        Ok(self.poison())
    }

    fn bit_not(&mut self, operand: &Value, span: Span) -> SemResult<Value> {
        let stripped = self.arena.strip_refs(operand.ty);
        if self.arena.is_integer(stripped) {
            let loaded = self.load_for_read(operand);
            let bits = match self.arena.type_kind(loaded.ty) {
                TypeKind::Int { bits, .. } => *bits,
                _ => 32,
            };
            let ones = slatec_ssa::Const::int(bits, u64::MAX);
            if let Some(c) = loaded.as_const() {
                if let Some(folded) =
                    slatec_ssa::fold::fold_bin(slatec_ssa::BinOp::Xor, c, ones)
                {
                    return Ok(Value::constant(loaded.name, loaded.ty, folded));
                }
            }
            let ty_ssa = self.arena.ssa_type(loaded.ty);
            let result = self.bld().bin(
                slatec_ssa::BinOp::Xor,
                ty_ssa,
                loaded.ssa,
                slatec_ssa::ValueRef::Const(ones),
            );
            return Ok(Value::plain(loaded.name, loaded.ty, result));
        }
        if let Some(result) = self.unary_overload("~", operand, span)? {
            return Ok(result);
        }
        self.report(
            DiagKind::InvalidOperator {
                op: "~".to_string(),
                ty: self.arena.display_type(stripped),
            },
            span,
        );
        Ok(self.poison())
    }

    /// Dispatch a unary operator to a user method with no arguments.
    fn unary_overload(
        &mut self,
        spelling: &str,
        operand: &Value,
        span: Span,
    ) -> SemResult<Option<Value>> {
        if self.arena.class_of(operand.ty).is_none() {
            return Ok(None);
        }
        let receiver = self.ensure_addressable(operand);
        let Some(method) = self.find_member_value(&receiver, Symbol::intern(spelling), span)?
        else {
            return Ok(None);
        };
        Ok(Some(self.call_value(method, Vec::new(), span)?))
    }

    // ------------------------------------------------------------------
    // Binary operators and assignment
    // ------------------------------------------------------------------

    fn binary_expr(&mut self, binary: &ast::BinaryExpr) -> SemResult<Value> {
        match binary.op {
            ast::BinaryOp::LogicalAnd | ast::BinaryOp::LogicalOr => {
                self.short_circuit(binary.op, &binary.lhs, &binary.rhs, binary.span)
            }
            op => {
                let lhs = self.elaborate_expr(&binary.lhs)?;
                let rhs = self.elaborate_expr(&binary.rhs)?;
                self.binary_op(op, &lhs, &rhs, binary.span)
            }
        }
    }

    /// Short-circuit `&&`/`||`: conditional blocks joined by an `i1`
    /// phi. A constant left side decides at compile time and the right
    /// side is then either the whole answer or never elaborated at all.
    fn short_circuit(
        &mut self,
        op: ast::BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        _span: Span,
    ) -> SemResult<Value> {
        let is_and = matches!(op, ast::BinaryOp::LogicalAnd);
        let left = self.elaborate_expr(lhs)?;
        if self.is_poisoned(&left) {
            return Ok(self.poison());
        }
        let left = self.to_bool(&left, lhs.span());

        if let Some(c) = left.as_const() {
            let decides = if is_and {
                c.is_zero_int()
            } else {
                !c.is_zero_int()
            };
            if decides {
                // `false && _` / `true || _`: the right side never runs.
                return Ok(self.bool_const(!is_and));
            }
            let right = self.elaborate_expr(rhs)?;
            return Ok(self.to_bool(&right, rhs.span()));
        }

        let entry_block = self.frame().block;
        let (rhs_block, merge) = {
            let mut b = self.bld();
            let rhs_block = b.new_basic_block(if is_and { "and.rhs" } else { "or.rhs" });
            let merge = b.new_basic_block(if is_and { "and.end" } else { "or.end" });
            if is_and {
                b.br_cond(left.ssa, rhs_block, merge);
            } else {
                b.br_cond(left.ssa, merge, rhs_block);
            }
            (rhs_block, merge)
        };

        self.set_block(rhs_block);
        let right = self.elaborate_expr(rhs)?;
        let right = self.to_bool(&right, rhs.span());
        // Nested short-circuits may have moved the insertion point.
        let rhs_end = self.frame().block;
        self.bld().br(merge);

        self.set_block(merge);
        let short_value =
            slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(1, u64::from(!is_and)));
        let bool_ssa = self.arena.ssa_type(self.arena.bool_type);
        let result = self.bld().phi(
            bool_ssa,
            vec![(short_value, entry_block), (right.ssa, rhs_end)],
        );
        Ok(Value::plain(
            Symbol::intern(if is_and { "and" } else { "or" }),
            self.arena.bool_type,
            result,
        ))
    }

    fn assign_expr(&mut self, assign: &ast::AssignExpr) -> SemResult<Value> {
        let target = self.elaborate_expr(&assign.target)?;
        let value = self.elaborate_expr(&assign.value)?;
        if self.is_poisoned(&target) || self.is_poisoned(&value) {
            return Ok(self.poison());
        }

        match assign.op {
            None => self.assign_into(&target, &value, assign.span),
            Some(op) => {
                // `lhs op= rhs` on a class dispatches to the compound
                // operator method when one exists.
                if self.arena.class_of(target.ty).is_some() {
                    if let Some(spelling) = op.compound_spelling() {
                        if let Some(result) =
                            self.operator_overload(spelling, &target, &value, assign.span)?
                        {
                            return Ok(result);
                        }
                    }
                }
                let combined = self.binary_op(op, &target, &value, assign.span)?;
                self.assign_into(&target, &combined, assign.span)
            }
        }
    }

    /// Store `value` into the l-value `target`; the result is `target`.
    pub(crate) fn assign_into(
        &mut self,
        target: &Value,
        value: &Value,
        span: Span,
    ) -> SemResult<Value> {
        let assignable = target.is_alloca
            && !matches!(target.kind, ValueKind::Constant(_))
            && !matches!(target.kind, ValueKind::Variable { is_const: true });
        if !assignable {
            self.report(DiagKind::NotAssignable, span);
            return Ok(self.poison());
        }

        if let TypeKind::Ref { pointee } = *self.arena.type_kind(target.ty) {
            // Assignment through a reference writes the referent.
            let ref_ssa = self.arena.ssa_type(target.ty);
            let address = self.bld().load(ref_ssa, target.ssa);
            let converted = self.convert_or_error(value, pointee, span);
            if self.is_poisoned(&converted) {
                return Ok(self.poison());
            }
            let loaded = self.load_for_read(&converted);
            self.bld().store(loaded.ssa, address);
        } else {
            self.store_into(target.ty, target.ssa, value, span);
        }
        Ok(target.clone())
    }

    /// Convert and store a value into a typed slot.
    pub(crate) fn store_into(
        &mut self,
        ty: TypeId,
        slot: slatec_ssa::ValueRef,
        value: &Value,
        span: Span,
    ) {
        let converted = self.convert_or_error(value, ty, span);
        if self.is_poisoned(&converted) {
            return;
        }
        if matches!(self.arena.type_kind(ty), TypeKind::Ref { .. }) {
            // The slot holds the address the reference was bound to.
            self.bld().store(converted.ssa, slot);
            return;
        }
        let loaded = self.load_for_read(&converted);
        self.bld().store(loaded.ssa, slot);
    }

    /// Convert a value to `bool` for conditions and logical operators.
    pub(crate) fn to_bool(&mut self, value: &Value, span: Span) -> Value {
        if self.is_poisoned(value) {
            return self.poison();
        }
        let bool_ty = self.arena.bool_type;
        if self.arena.types_equal(self.arena.strip_refs(value.ty), bool_ty) {
            return self.load_for_read(value);
        }
        self.convert_or_error(value, bool_ty, span)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call_expr(&mut self, call: &ast::CallExpr) -> SemResult<Value> {
        let callee = self.elaborate_expr(&call.callee)?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.elaborate_expr(arg)?);
        }
        self.call_value(callee, args, call.span)
    }

    /// The call protocol shared by explicit calls, operator dispatch,
    /// constructor forwarding, and the iteration protocol.
    pub fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: Span,
    ) -> SemResult<Value> {
        if self.is_poisoned(&callee) || args.iter().any(|a| self.is_poisoned(a)) {
            return Ok(self.poison());
        }

        // Overload narrowing by argument best-match.
        let mut callee = callee;
        if let ValueKind::Overloads(set) = &callee.kind {
            let set = set.clone();
            let Some(chosen) = self.select_overload(&set, &args, callee.receiver.is_some(), span)
            else {
                return Ok(self.poison());
            };
            let receiver = callee.receiver.take();
            callee = self.function_value(chosen);
            callee.receiver = receiver;
        }

        // A pointer to a function auto-dereferences.
        let mut fn_ty = self.arena.strip_refs(callee.ty);
        if let TypeKind::Ptr { pointee } = *self.arena.type_kind(fn_ty) {
            if matches!(self.arena.type_kind(pointee), TypeKind::Fn(_)) {
                callee = self.load_for_read(&callee);
                fn_ty = pointee;
            }
        }
        let TypeKind::Fn(sig_id) = *self.arena.type_kind(fn_ty) else {
            self.report(DiagKind::NotCallable, span);
            return Ok(self.poison());
        };
        let sig = self.arena.sigs[sig_id].clone();

        // Prepend the receiver for methods.
        let mut full_args: Vec<Value> = Vec::with_capacity(args.len() + 1);
        if sig.is_method {
            match &callee.receiver {
                Some(receiver) => full_args.push((**receiver).clone()),
                None => {
                    self.report(DiagKind::NotCallable, span);
                    return Ok(self.poison());
                }
            }
        }
        full_args.extend(args);

        let fixed = sig.params.len();
        let explicit_expected = fixed - usize::from(sig.is_method);
        let explicit_found = full_args.len() - usize::from(sig.is_method);
        let count_ok = if sig.variadic {
            full_args.len() >= fixed
        } else {
            full_args.len() == fixed
        };
        if !count_ok {
            self.report(
                DiagKind::WrongArgumentCount {
                    expected: explicit_expected,
                    found: explicit_found,
                },
                span,
            );
            return Ok(self.poison());
        }

        let mut ssa_args: Vec<slatec_ssa::ValueRef> = Vec::with_capacity(full_args.len() + 1);

        // Struct return: the caller allocates the slot and passes it
        // first.
        let ret_slot = if sig.is_sret {
            let slot = self.alloc_slot(sig.ret, Symbol::intern("sret.tmp"));
            ssa_args.push(slot);
            Some(slot)
        } else {
            None
        };

        for (i, arg) in full_args.iter().enumerate() {
            if i < fixed {
                let param_ty = sig.params[i].ty;
                let converted = self.convert_or_error(arg, param_ty, span);
                if self.is_poisoned(&converted) {
                    return Ok(self.poison());
                }
                if matches!(self.arena.type_kind(param_ty), TypeKind::Ref { .. }) {
                    // References pass the bound address.
                    ssa_args.push(converted.ssa);
                } else {
                    let loaded = self.load_for_read(&converted);
                    ssa_args.push(loaded.ssa);
                }
            } else {
                // Variadic tail: by value, after a load.
                let loaded = self.load_for_read(arg);
                ssa_args.push(loaded.ssa);
            }
        }

        if let Some(slot) = ret_slot {
            self.bld().call(callee.ssa, sig.ssa, ssa_args, true);
            let mut result = Value::place(Symbol::intern("tmp"), sig.ret, slot);
            result.is_temporary = true;
            result.can_be_taken = true;
            result.kind = ValueKind::Variable { is_const: false };
            // The temporary is a variable of the current scope so its
            // destructor runs exactly once at scope exit.
            self.declare_var(
                result.name,
                Variable {
                    name: result.name,
                    value: result.clone(),
                    is_const: false,
                    span,
                },
                span,
                false,
            );
            Ok(result)
        } else {
            let raw = self.bld().call(callee.ssa, sig.ssa, ssa_args, false);
            Ok(Value::plain(Symbol::intern("call"), sig.ret, raw))
        }
    }

    /// Pick the best overload: exact matches beat implicit-conversion
    /// matches; ties and empty candidate sets are an error.
    fn select_overload(
        &mut self,
        set: &[FuncId],
        args: &[Value],
        has_receiver: bool,
        span: Span,
    ) -> Option<FuncId> {
        let mut best: Option<(FuncId, u32)> = None;
        let mut tied = false;

        for &func in set {
            let sig = &self.arena.sigs[self.arena.funcs[func].sig];
            if sig.is_method && !has_receiver {
                continue;
            }
            let implicit = usize::from(sig.is_method);
            let explicit = &sig.params[implicit..];
            let arity_ok = if sig.variadic {
                args.len() >= explicit.len()
            } else {
                args.len() == explicit.len()
            };
            if !arity_ok {
                continue;
            }

            let mut score = 0u32;
            let mut viable = true;
            for (arg, param) in args.iter().zip(explicit) {
                let arg_ty = self.arena.strip_refs(arg.ty);
                let param_ty = self.arena.strip_refs(param.ty);
                if self.arena.types_equal(arg_ty, param_ty) {
                    score += 2;
                } else if self.can_convert(arg.ty, param.ty) {
                    score += 1;
                } else {
                    viable = false;
                    break;
                }
            }
            if !viable {
                continue;
            }
            match best {
                Some((_, best_score)) if score == best_score => tied = true,
                Some((_, best_score)) if score > best_score => {
                    best = Some((func, score));
                    tied = false;
                }
                None => best = Some((func, score)),
                _ => {}
            }
        }

        match (best, tied) {
            (Some((func, _)), false) => Some(func),
            _ => {
                let name = set
                    .first()
                    .map(|&f| self.arena.funcs[f].name)
                    .unwrap_or_else(|| Symbol::intern("?"));
                self.report(DiagKind::NoMatchingOverload(name), span);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Member access and indexing
    // ------------------------------------------------------------------

    fn member_expr(&mut self, member: &ast::MemberExpr) -> SemResult<Value> {
        let base = self.elaborate_expr(&member.base)?;
        if self.is_poisoned(&base) {
            return Ok(self.poison());
        }
        let span = member.span;
        let stripped = self.arena.strip_refs(base.ty);

        // `->` requires a pointer and derefs exactly once; `.` auto-
        // derefs a pointer receiver once. A class with a user `->`
        // supplies the pointer itself.
        let place = if let TypeKind::Ptr { pointee } = *self.arena.type_kind(stripped) {
            let loaded = self.load_for_read(&base);
            Value::place(loaded.name, pointee, loaded.ssa)
        } else if member.arrow {
            let user_arrow = if self.arena.class_of(stripped).is_some() {
                self.unary_overload("->", &base, span)?
            } else {
                None
            };
            let Some(derefed) = user_arrow else {
                self.report(
                    DiagKind::TypeMismatch {
                        expected: "pointer".to_string(),
                        found: self.arena.display_type(base.ty),
                    },
                    span,
                );
                return Ok(self.poison());
            };
            let loaded = self.load_for_read(&derefed);
            match *self.arena.type_kind(loaded.ty) {
                TypeKind::Ptr { pointee } => Value::place(loaded.name, pointee, loaded.ssa),
                _ => {
                    self.report(
                        DiagKind::TypeMismatch {
                            expected: "pointer".to_string(),
                            found: self.arena.display_type(loaded.ty),
                        },
                        span,
                    );
                    return Ok(self.poison());
                }
            }
        } else {
            self.ensure_addressable(&base)
        };

        if self.arena.class_of(place.ty).is_none() {
            self.report(
                DiagKind::ExpectedClass(self.arena.display_type(place.ty)),
                span,
            );
            return Ok(self.poison());
        }

        match self.find_member_value(&place, member.member, span)? {
            Some(value) => Ok(value),
            None => {
                self.report(DiagKind::UnknownName(member.member), span);
                Ok(self.poison())
            }
        }
    }

    /// Find `name` on the class of `place` (an addressable class value):
    /// own properties first, then methods, then parents left to right
    /// with upcasting. A member visible through several parents is
    /// ambiguous.
    pub(crate) fn find_member_value(
        &mut self,
        place: &Value,
        name: Symbol,
        span: Span,
    ) -> SemResult<Option<Value>> {
        let Some(class) = self.arena.class_of(place.ty) else {
            return Ok(None);
        };
        let path = match self.locate_member(class, name) {
            Ok(path) => path,
            Err(()) => {
                self.report(DiagKind::AmbiguousName(name), span);
                return Ok(Some(self.poison()));
            }
        };
        let Some(path) = path else {
            return Ok(None);
        };

        // Upcast the receiver to the owning class when the member was
        // inherited.
        let owner_place = if path.owner == class {
            place.clone()
        } else {
            let owner_ty = self.arena.classes[path.owner].ty;
            self.struct_cast(place, path.owner, path.padding, owner_ty)
        };

        match path.kind {
            MemberKind::Property(index) => {
                Ok(Some(self.read_own_property(&owner_place, path.owner, index)))
            }
            MemberKind::Methods(set) => {
                let class_ty = self.arena.classes[path.owner].ty;
                let recv_ty = self.arena.ptr_type(self.module, class_ty);
                let receiver = Value::plain(Symbol::intern("this"), recv_ty, owner_place.ssa);
                Ok(Some(self.overload_value(set).with_receiver(receiver)))
            }
        }
    }

    /// Pure lookup: no instructions are emitted. `Err(())` signals an
    /// ambiguous find through multiple parents.
    fn locate_member(&self, class: ClassId, name: Symbol) -> Result<Option<MemberPath>, ()> {
        if let Some((index, _)) = self.arena.find_property(class, name) {
            return Ok(Some(MemberPath {
                padding: 0,
                owner: class,
                kind: MemberKind::Property(index),
            }));
        }
        let scope = self.arena.classes[class].scope;
        if let Some(Binding::Overloads(set)) = self.scopes.lookup_local(scope, name) {
            return Ok(Some(MemberPath {
                padding: 0,
                owner: class,
                kind: MemberKind::Methods(set.clone()),
            }));
        }

        let mut found: Option<MemberPath> = None;
        let mut offset = 0u64;
        for &parent in &self.arena.classes[class].parents {
            if let Some(mut path) = self.locate_member(parent, name)? {
                path.padding += offset;
                if found.is_some() {
                    return Err(());
                }
                found = Some(path);
            }
            let parent_ssa = self.arena.classes[parent].ssa;
            offset += self
                .module
                .layout
                .size_of(&self.module.types, parent_ssa);
        }
        Ok(found)
    }

    fn index_expr(&mut self, index: &ast::IndexExpr) -> SemResult<Value> {
        let base = self.elaborate_expr(&index.base)?;
        let idx = self.elaborate_expr(&index.index)?;
        if self.is_poisoned(&base) || self.is_poisoned(&idx) {
            return Ok(self.poison());
        }
        let span = index.span;
        let stripped = self.arena.strip_refs(base.ty);

        match *self.arena.type_kind(stripped) {
            // `x[i]` on a pointer is `*(x + i)`.
            TypeKind::Ptr { pointee } => {
                let sum = self.binary_op(ast::BinaryOp::Add, &base, &idx, span)?;
                if self.is_poisoned(&sum) {
                    return Ok(self.poison());
                }
                Ok(Value::place(base.name, pointee, sum.ssa))
            }
            TypeKind::Array { elem, .. } => {
                let place = self.ensure_addressable(&base);
                let loaded_idx = self.load_for_read(&idx);
                let array_ssa = self.arena.ssa_type(stripped);
                let elem_ssa = self.arena.ssa_type(elem);
                let elem_ptr_ty = self.module.types.ptr(elem_ssa);
                let zero = slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(32, 0));
                let ptr = self.bld().gep(
                    array_ssa,
                    place.ssa,
                    vec![zero, loaded_idx.ssa],
                    elem_ptr_ty,
                );
                Ok(Value::place(base.name, elem, ptr))
            }
            TypeKind::Class(_) => {
                if let Some(result) = self.operator_overload("[]", &base, &idx, span)? {
                    return Ok(result);
                }
                self.report(
                    DiagKind::NotIndexable(self.arena.display_type(stripped)),
                    span,
                );
                Ok(self.poison())
            }
            _ => {
                self.report(
                    DiagKind::NotIndexable(self.arena.display_type(stripped)),
                    span,
                );
                Ok(self.poison())
            }
        }
    }

    // ------------------------------------------------------------------
    // Casts
    // ------------------------------------------------------------------

    /// `x as T`: implicit rules first, then a user `cast` method whose
    /// return type matches the target.
    fn cast_expr(&mut self, cast: &ast::CastExpr) -> SemResult<Value> {
        let operand = self.elaborate_expr(&cast.operand)?;
        let dest = self.resolve_type(&cast.target)?;
        if self.is_poisoned(&operand) || self.arena.is_error(dest) {
            return Ok(self.poison());
        }
        if self.can_convert(operand.ty, dest) {
            return Ok(self.cast_value(&operand, dest));
        }

        if let Some(class) = self.arena.class_of(operand.ty) {
            let scope = self.arena.classes[class].scope;
            let cast_sym = Symbol::intern("cast");
            if let Some(Binding::Overloads(set)) = self.scopes.lookup_local(scope, cast_sym) {
                let set = set.clone();
                let matching: Vec<FuncId> = set
                    .into_iter()
                    .filter(|&f| {
                        let sig = &self.arena.sigs[self.arena.funcs[f].sig];
                        self.arena.types_equal(sig.ret, dest)
                    })
                    .collect();
                if let Some(&chosen) = matching.first() {
                    let place = self.ensure_addressable(&operand);
                    let class_ty = self.arena.classes[class].ty;
                    let recv_ty = self.arena.ptr_type(self.module, class_ty);
                    let receiver =
                        Value::plain(Symbol::intern("this"), recv_ty, place.ssa);
                    let method = self.function_value(chosen).with_receiver(receiver);
                    return self.call_value(method, Vec::new(), cast.span);
                }
            }
        }

        self.report(
            DiagKind::NotCastable {
                from: self.arena.display_type(operand.ty),
                to: self.arena.display_type(dest),
            },
            cast.span,
        );
        Ok(self.poison())
    }

    // ------------------------------------------------------------------
    // Class instantiation
    // ------------------------------------------------------------------

    /// `T { f = v, ... }`: allocate storage, then either forward the
    /// listed values to the user constructor positionally, or zero-init
    /// and store each listed property. The result is a temporary
    /// variable; `let` bindings adopt it as their own storage.
    pub(crate) fn class_init(&mut self, init: &ast::ClassInitExpr) -> SemResult<Value> {
        let span = init.span;
        let resolved = self.resolve_name(&init.class)?;
        let class_ty = match resolved {
            Some(Resolved::Entity(Entity::Type(ty)))
                if matches!(self.arena.type_kind(ty), TypeKind::Class(_)) =>
            {
                ty
            }
            Some(Resolved::Entity(Entity::Type(ty))) => {
                self.report(
                    DiagKind::ExpectedClass(self.arena.display_type(ty)),
                    span,
                );
                return Ok(self.poison());
            }
            Some(_) => {
                self.report(
                    DiagKind::ExpectedClass(init.class.name.as_str().to_string()),
                    span,
                );
                return Ok(self.poison());
            }
            None => return Ok(self.poison()),
        };
        let TypeKind::Class(class) = *self.arena.type_kind(class_ty) else {
            unreachable!()
        };

        let slot = self.alloc_slot(class_ty, self.arena.classes[class].name);
        let mut place = Value::place(self.arena.classes[class].name, class_ty, slot);

        if !self.arena.classes[class].constructors.is_empty() {
            // Listed fields forward positionally to the constructor.
            let ctors = self.arena.classes[class].constructors.clone();
            let mut args = Vec::with_capacity(init.fields.len());
            for field in &init.fields {
                args.push(self.elaborate_expr(&field.value)?);
            }
            let recv_ty = self.arena.ptr_type(self.module, class_ty);
            let receiver = Value::plain(Symbol::intern("this"), recv_ty, slot);
            let mut callee = self.overload_value(ctors);
            callee = callee.with_receiver(receiver);
            self.call_value(callee, args, span)?;
        } else {
            // Zero-initialize, then store the listed properties.
            let class_ssa = self.arena.classes[class].ssa;
            let zero = slatec_ssa::ValueRef::Const(slatec_ssa::Const::Zero { ty: class_ssa });
            self.bld().store(zero, slot);

            for field in &init.fields {
                let value = self.elaborate_expr(&field.value)?;
                let found = self
                    .arena
                    .find_property(class, field.name)
                    .map(|(index, prop)| (index, prop.ty));
                let Some((index, prop_ty)) = found else {
                    self.report(DiagKind::UnknownName(field.name), field.span);
                    continue;
                };
                let field_place = self.read_own_property(&place, class, index);
                self.store_into(prop_ty, field_place.ssa, &value, field.span);
            }
        }

        place.is_temporary = true;
        place.can_be_taken = true;
        place.kind = ValueKind::Variable { is_const: false };

        // Track the temporary for destruction at scope exit.
        self.declare_var(
            place.name,
            Variable {
                name: place.name,
                value: place.clone(),
                is_const: false,
                span,
            },
            span,
            false,
        );
        Ok(place)
    }

    // ------------------------------------------------------------------
    // Inline assembly
    // ------------------------------------------------------------------

    /// Pass-through: template and constraints go to the builder
    /// unvalidated.
    fn asm_expr(&mut self, asm: &ast::AsmExpr) -> SemResult<Value> {
        let mut inputs = Vec::with_capacity(asm.inputs.len());
        for input in &asm.inputs {
            let value = self.elaborate_expr(input)?;
            let loaded = self.load_for_read(&value);
            inputs.push(loaded.ssa);
        }
        let void_ssa = self.arena.ssa_type(self.arena.void_type);
        let result = self.bld().inline_asm(
            asm.template.clone(),
            asm.constraints.clone(),
            inputs,
            void_ssa,
        );
        Ok(Value::plain(
            Symbol::intern("asm"),
            self.arena.void_type,
            result,
        ))
    }
}
