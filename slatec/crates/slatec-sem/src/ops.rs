//! Binary operator lowering.
//!
//! For each operator the ladder is: integer group, float group, pointer
//! arithmetic (for `+`/`-`), then operator overloading on class types,
//! then a diagnostic. The right operand is cast to the left operand's
//! type; literal-literal pairs fold in the constant domain with two's
//! complement wrapping.

use slatec_ast::BinaryOp;
use slatec_ssa::{fold, BinOp, Const, FloatPredicate, IntPredicate, ValueRef};
use slatec_util::{Span, Symbol};

use crate::ctx::GenCtx;
use crate::error::{DiagKind, SemResult};
use crate::types::TypeKind;
use crate::value::Value;

impl GenCtx<'_> {
    /// Lower any non-short-circuit binary operator.
    pub fn binary_op(
        &mut self,
        op: BinaryOp,
        lhs: &Value,
        rhs: &Value,
        span: Span,
    ) -> SemResult<Value> {
        if self.is_poisoned(lhs) || self.is_poisoned(rhs) {
            return Ok(self.poison());
        }
        match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem => self.arith(op, lhs, rhs, span),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => self.compare(op, lhs, rhs, span),
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                self.bitwise(op, lhs, rhs, span)
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => self.shift(op, lhs, rhs, span),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => Err(self.fatal(
                DiagKind::InternalInvariant("short-circuit operators lower via blocks"),
                span,
            )),
        }
    }

    fn arith(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> SemResult<Value> {
        let lk = self.arena.strip_refs(lhs.ty);
        let rk = self.arena.strip_refs(rhs.ty);

        if self.arena.is_integer(lk) || self.arena.is_float(lk) {
            if !self.arena.is_numeric(rk) {
                return Ok(self.operand_error(op.spelling(), rk, span));
            }
            let l = self.load_for_read(lhs);
            let r = self.cast_value(rhs, l.ty);
            let ssa_op = numeric_op(op, self.arena.is_float(lk));

            if matches!(op, BinaryOp::Div | BinaryOp::Rem)
                && self.arena.is_integer(lk)
                && r.as_const().is_some_and(|c| c.is_zero_int())
            {
                self.report(DiagKind::ArithmeticDomain, span);
                return Ok(self.poison());
            }
            if let (Some(a), Some(b)) = (l.as_const(), r.as_const()) {
                if let Some(c) = fold::fold_bin(ssa_op, a, b) {
                    return Ok(Value::constant(op_name(op), l.ty, c));
                }
            }
            let ty_ssa = self.arena.ssa_type(l.ty);
            let result = self.bld().bin(ssa_op, ty_ssa, l.ssa, r.ssa);
            return Ok(Value::plain(op_name(op), l.ty, result));
        }

        if self.arena.is_pointer(lk) && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            if !self.arena.is_integer(rk) {
                return Ok(self.operand_error(op.spelling(), rk, span));
            }
            return self.pointer_offset(op, lhs, rhs);
        }

        if let Some(result) = self.operator_overload(op.spelling(), lhs, rhs, span)? {
            return Ok(result);
        }
        Ok(self.operand_error(op.spelling(), lk, span))
    }

    /// `ptr + i` / `ptr - i` lower to a single GEP; the result is a plain
    /// pointer value, not an l-value.
    fn pointer_offset(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> SemResult<Value> {
        let l = self.load_for_read(lhs);
        let r = self.load_for_read(rhs);

        let index = if matches!(op, BinaryOp::Sub) {
            self.negate_int(&r)
        } else {
            r.clone()
        };

        let pointee = match *self.arena.type_kind(l.ty) {
            TypeKind::Ptr { pointee } => pointee,
            _ => return Ok(self.poison()),
        };
        let pointee_ssa = self.arena.ssa_type(pointee);
        let ptr_ssa_ty = self.arena.ssa_type(l.ty);
        let result = self
            .bld()
            .gep(pointee_ssa, l.ssa, vec![index.ssa], ptr_ssa_ty);
        Ok(Value::plain(op_name(op), l.ty, result))
    }

    /// Integer negation in the operand's own type.
    pub(crate) fn negate_int(&mut self, v: &Value) -> Value {
        if let Some(c) = v.as_const() {
            if let Some(folded) = fold::fold_bin(
                BinOp::Sub,
                Const::int(int_bits(self, v), 0),
                c,
            ) {
                return Value::constant(v.name, v.ty, folded);
            }
        }
        let bits = int_bits(self, v);
        let zero = ValueRef::Const(Const::int(bits, 0));
        let ty_ssa = self.arena.ssa_type(v.ty);
        let result = self.bld().bin(BinOp::Sub, ty_ssa, zero, v.ssa);
        Value::plain(v.name, v.ty, result)
    }

    fn compare(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> SemResult<Value> {
        let lk = self.arena.strip_refs(lhs.ty);
        let bool_ty = self.arena.bool_type;

        if self.arena.is_integer(lk) || self.arena.is_pointer(lk) {
            let l = self.load_for_read(lhs);
            let r = self.cast_value(rhs, l.ty);
            let pred = int_predicate(op);
            let result = self.bld().icmp(pred, l.ssa, r.ssa);
            return Ok(Value::plain(op_name(op), bool_ty, result));
        }
        if self.arena.is_float(lk) {
            let l = self.load_for_read(lhs);
            let r = self.cast_value(rhs, l.ty);
            let pred = float_predicate(op);
            let result = self.bld().fcmp(pred, l.ssa, r.ssa);
            return Ok(Value::plain(op_name(op), bool_ty, result));
        }
        if let Some(result) = self.operator_overload(op.spelling(), lhs, rhs, span)? {
            return Ok(result);
        }
        Ok(self.operand_error(op.spelling(), lk, span))
    }

    fn bitwise(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> SemResult<Value> {
        let lk = self.arena.strip_refs(lhs.ty);
        if self.arena.is_integer(lk) {
            let l = self.load_for_read(lhs);
            let r = self.cast_value(rhs, l.ty);
            let ssa_op = match op {
                BinaryOp::BitAnd => BinOp::And,
                BinaryOp::BitOr => BinOp::Or,
                _ => BinOp::Xor,
            };
            if let (Some(a), Some(b)) = (l.as_const(), r.as_const()) {
                if let Some(c) = fold::fold_bin(ssa_op, a, b) {
                    return Ok(Value::constant(op_name(op), l.ty, c));
                }
            }
            let ty_ssa = self.arena.ssa_type(l.ty);
            let result = self.bld().bin(ssa_op, ty_ssa, l.ssa, r.ssa);
            return Ok(Value::plain(op_name(op), l.ty, result));
        }
        if let Some(result) = self.operator_overload(op.spelling(), lhs, rhs, span)? {
            return Ok(result);
        }
        Ok(self.operand_error(op.spelling(), lk, span))
    }

    fn shift(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> SemResult<Value> {
        let lk = self.arena.strip_refs(lhs.ty);
        let rk = self.arena.strip_refs(rhs.ty);
        if !self.arena.is_integer(lk) || !self.arena.is_integer(rk) {
            if let Some(result) = self.operator_overload(op.spelling(), lhs, rhs, span)? {
                return Ok(result);
            }
            self.report(
                DiagKind::TypeMismatch {
                    expected: "integer".to_string(),
                    found: self.arena.display_type(if self.arena.is_integer(lk) {
                        rk
                    } else {
                        lk
                    }),
                },
                span,
            );
            return Ok(self.poison());
        }
        let l = self.load_for_read(lhs);
        let r = self.cast_value(rhs, l.ty);
        let ssa_op = match op {
            BinaryOp::Shl => BinOp::Shl,
            BinaryOp::Shr => BinOp::AShr,
            _ => BinOp::LShr,
        };
        if let (Some(a), Some(b)) = (l.as_const(), r.as_const()) {
            if let Some(c) = fold::fold_bin(ssa_op, a, b) {
                return Ok(Value::constant(op_name(op), l.ty, c));
            }
        }
        let ty_ssa = self.arena.ssa_type(l.ty);
        let result = self.bld().bin(ssa_op, ty_ssa, l.ssa, r.ssa);
        Ok(Value::plain(op_name(op), l.ty, result))
    }

    /// Dispatch `lhs op rhs` to a user-defined operator method on the
    /// left operand's class, if one exists.
    pub fn operator_overload(
        &mut self,
        spelling: &str,
        lhs: &Value,
        rhs: &Value,
        span: Span,
    ) -> SemResult<Option<Value>> {
        let Some(_) = self.arena.class_of(lhs.ty) else {
            return Ok(None);
        };
        let receiver = self.ensure_addressable(lhs);
        let Some(method) = self.find_member_value(&receiver, Symbol::intern(spelling), span)?
        else {
            return Ok(None);
        };
        Ok(Some(self.call_value(method, vec![rhs.clone()], span)?))
    }

    fn operand_error(&self, op: &str, ty: crate::types::TypeId, span: Span) -> Value {
        self.report(
            DiagKind::InvalidOperator {
                op: op.to_string(),
                ty: self.arena.display_type(ty),
            },
            span,
        );
        self.poison()
    }
}

fn int_bits(ctx: &GenCtx<'_>, v: &Value) -> u32 {
    match ctx.arena.type_kind(v.ty) {
        TypeKind::Int { bits, .. } => *bits,
        _ => 32,
    }
}

fn numeric_op(op: BinaryOp, is_float: bool) -> BinOp {
    match (op, is_float) {
        (BinaryOp::Add, false) => BinOp::Add,
        (BinaryOp::Sub, false) => BinOp::Sub,
        (BinaryOp::Mul, false) => BinOp::Mul,
        (BinaryOp::Div, false) => BinOp::SDiv,
        (BinaryOp::Rem, false) => BinOp::SRem,
        (BinaryOp::Add, true) => BinOp::FAdd,
        (BinaryOp::Sub, true) => BinOp::FSub,
        (BinaryOp::Mul, true) => BinOp::FMul,
        (BinaryOp::Div, true) => BinOp::FDiv,
        (BinaryOp::Rem, true) => BinOp::FRem,
        _ => unreachable!("not an arithmetic operator"),
    }
}

fn int_predicate(op: BinaryOp) -> IntPredicate {
    match op {
        BinaryOp::Eq => IntPredicate::Eq,
        BinaryOp::Ne => IntPredicate::Ne,
        BinaryOp::Lt => IntPredicate::Slt,
        BinaryOp::Le => IntPredicate::Sle,
        BinaryOp::Gt => IntPredicate::Sgt,
        _ => IntPredicate::Sge,
    }
}

fn float_predicate(op: BinaryOp) -> FloatPredicate {
    match op {
        BinaryOp::Eq => FloatPredicate::Oeq,
        BinaryOp::Ne => FloatPredicate::Une,
        BinaryOp::Lt => FloatPredicate::Olt,
        BinaryOp::Le => FloatPredicate::Ole,
        BinaryOp::Gt => FloatPredicate::Ogt,
        _ => FloatPredicate::Oge,
    }
}

fn op_name(op: BinaryOp) -> Symbol {
    Symbol::intern(match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Rem => "rem",
        BinaryOp::BitAnd => "and",
        BinaryOp::BitOr => "or",
        BinaryOp::BitXor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::Shr => "shr",
        BinaryOp::UShr => "ushr",
        BinaryOp::Eq => "eq",
        BinaryOp::Ne => "ne",
        BinaryOp::Lt => "lt",
        BinaryOp::Le => "le",
        BinaryOp::Gt => "gt",
        BinaryOp::Ge => "ge",
        BinaryOp::LogicalAnd => "land",
        BinaryOp::LogicalOr => "lor",
    })
}
