//! Implicit conversions and l-value reads.
//!
//! [`GenCtx::cast_value`] implements the conversion table: integer
//! resize/reinterpret, integer-float traffic, pointer punning, boolean
//! tests, reference binding and unwrapping, and struct upcasts along the
//! inheritance chain (byte offset = summed size of the preceding
//! parents, accumulated transitively). Conversions on folded literals
//! stay in the constant domain.
//!
//! Where no rule applies the value is returned unchanged; callers that
//! require convertibility go through [`GenCtx::convert_or_error`], which
//! checks [`GenCtx::can_convert`] first and poisons on failure.

use slatec_ssa::{CastOp, Const, IntPredicate, ValueRef};
use slatec_util::{Span, Symbol};

use crate::ctx::GenCtx;
use crate::entity::ClassId;
use crate::error::DiagKind;
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

impl GenCtx<'_> {
    /// Read a value in an r-value context: load the backing storage if
    /// the value is an l-value, then load through any reference layers.
    pub fn load_for_read(&mut self, value: &Value) -> Value {
        let mut v = value.clone();
        if v.is_alloca {
            let ssa_ty = self.arena.ssa_type(v.ty);
            v.ssa = self.bld().load(ssa_ty, v.ssa);
            v.is_alloca = false;
            v.kind = crate::value::ValueKind::Plain;
        }
        while let TypeKind::Ref { pointee } = *self.arena.type_kind(v.ty) {
            let pointee_ssa = self.arena.ssa_type(pointee);
            v.ssa = self.bld().load(pointee_ssa, v.ssa);
            v.ty = pointee;
        }
        v
    }

    /// Make sure the value has an address: an l-value keeps its own
    /// storage, anything else is spilled into a fresh temporary slot.
    pub fn ensure_addressable(&mut self, value: &Value) -> Value {
        if value.is_alloca {
            return value.clone();
        }
        let loaded = self.load_for_read(value);
        let slot = self.alloc_slot(loaded.ty, loaded.name);
        self.bld().store(loaded.ssa, slot);
        let mut place = Value::place(loaded.name, loaded.ty, slot);
        place.is_temporary = true;
        place.can_be_taken = true;
        place
    }

    /// Can `from` convert to `to` under the implicit rules?
    pub fn can_convert(&self, from: TypeId, to: TypeId) -> bool {
        if self.arena.is_error(from) || self.arena.is_error(to) {
            return true;
        }
        let f = self.arena.strip_refs(from);
        let t = self.arena.strip_refs(to);
        if self.arena.types_equal(f, t) {
            return true;
        }
        match (self.arena.type_kind(f), self.arena.type_kind(t)) {
            (TypeKind::Int { .. } | TypeKind::Float { .. }, TypeKind::Int { .. })
            | (TypeKind::Int { .. } | TypeKind::Float { .. }, TypeKind::Float { .. }) => true,
            (TypeKind::Int { .. }, TypeKind::Ptr { .. }) => true,
            (TypeKind::Ptr { .. }, TypeKind::Int { .. }) => true,
            // Any pointer reinterprets; parent-chain pointers also offset.
            (TypeKind::Ptr { .. }, TypeKind::Ptr { .. }) => true,
            (TypeKind::Class(from_class), TypeKind::Class(to_class)) => self
                .arena
                .upcast_padding(self.module, *from_class, *to_class)
                .is_some(),
            _ => false,
        }
    }

    /// Convert with a diagnostic on failure.
    pub fn convert_or_error(&mut self, value: &Value, dest: TypeId, span: Span) -> Value {
        if self.is_poisoned(value) || self.arena.is_error(dest) {
            return self.poison();
        }
        if !self.can_convert(value.ty, dest) {
            self.report(
                DiagKind::TypeMismatch {
                    expected: self.arena.display_type(dest),
                    found: self.arena.display_type(value.ty),
                },
                span,
            );
            return self.poison();
        }
        self.cast_value(value, dest)
    }

    /// Apply the implicit conversion rules. Returns the value unchanged
    /// when no rule matches; the caller is responsible for diagnosing.
    pub fn cast_value(&mut self, value: &Value, dest: TypeId) -> Value {
        if self.is_poisoned(value) || self.arena.is_error(dest) {
            return self.poison();
        }

        // Binding into a reference: the result is the operand's address.
        if let TypeKind::Ref { pointee } = *self.arena.type_kind(dest) {
            return self.bind_reference(value, pointee, dest);
        }

        let mut v = value.clone();

        // Struct-to-struct works on addresses; everything else reads the
        // operand first.
        let src_stripped = self.arena.strip_refs(v.ty);
        let both_classes = matches!(self.arena.type_kind(src_stripped), TypeKind::Class(_))
            && matches!(self.arena.type_kind(dest), TypeKind::Class(_));
        if both_classes {
            // Reduce to an addressable struct place: a reference already
            // holds the address, a reference in a slot needs one load.
            while let TypeKind::Ref { pointee } = *self.arena.type_kind(v.ty) {
                if v.is_alloca {
                    let ref_ssa = self.arena.ssa_type(v.ty);
                    v.ssa = self.bld().load(ref_ssa, v.ssa);
                }
                v.ty = pointee;
                v.is_alloca = true;
            }
            return self.cast_struct(&v, dest);
        }

        if v.is_alloca || matches!(self.arena.type_kind(v.ty), TypeKind::Ref { .. }) {
            v = self.load_for_read(&v);
        }
        if self.arena.types_equal(v.ty, dest) {
            v.ty = dest;
            return v;
        }

        match (
            self.arena.type_kind(v.ty).clone(),
            self.arena.type_kind(dest).clone(),
        ) {
            (TypeKind::Int { bits, signed }, TypeKind::Int { bits: dbits, .. }) => {
                self.cast_int_to_int(&v, bits, signed, dbits, dest)
            }
            (TypeKind::Int { signed, .. }, TypeKind::Float { .. }) => {
                if let Some(c) = v.as_const() {
                    let float = match (c.as_int_signed(), c.as_int_bits(), signed) {
                        (Some(s), _, true) => s as f64,
                        (_, Some(u), false) => u as f64,
                        _ => 0.0,
                    };
                    return self.float_const(v.name, dest, float);
                }
                let op = if signed { CastOp::SiToFp } else { CastOp::UiToFp };
                self.emit_cast(&v, op, dest)
            }
            (TypeKind::Int { .. }, TypeKind::Ptr { .. }) => {
                self.emit_cast(&v, CastOp::IntToPtr, dest)
            }
            (TypeKind::Float { bits }, TypeKind::Float { bits: dbits }) => {
                if let Some(Const::Float { value, .. }) = v.as_const() {
                    return self.float_const(v.name, dest, value);
                }
                let op = if dbits > bits {
                    CastOp::FpExt
                } else {
                    CastOp::FpTrunc
                };
                self.emit_cast(&v, op, dest)
            }
            (TypeKind::Float { .. }, TypeKind::Int { bits: dbits, signed: dsigned }) => {
                if let Some(Const::Float { value, .. }) = v.as_const() {
                    let raw = if dsigned {
                        (value as i64) as u64
                    } else {
                        value as u64
                    };
                    return Value::constant(v.name, dest, Const::int(dbits, raw));
                }
                let op = if dsigned {
                    CastOp::FpToSi
                } else {
                    CastOp::FpToUi
                };
                self.emit_cast(&v, op, dest)
            }
            (TypeKind::Ptr { .. }, TypeKind::Int { bits: 1, signed: false }) => {
                let ptr_ssa_ty = self.arena.ssa_type(v.ty);
                let null = ValueRef::Const(Const::Null { ty: ptr_ssa_ty });
                let result = self.bld().icmp(IntPredicate::Ne, v.ssa, null);
                Value::plain(v.name, dest, result)
            }
            (TypeKind::Ptr { .. }, TypeKind::Int { .. }) => {
                self.emit_cast(&v, CastOp::PtrToInt, dest)
            }
            (TypeKind::Ptr { pointee: from_p }, TypeKind::Ptr { pointee: to_p }) => {
                self.cast_ptr_to_ptr(&v, from_p, to_p, dest)
            }
            _ => v,
        }
    }

    fn cast_int_to_int(
        &mut self,
        v: &Value,
        bits: u32,
        signed: bool,
        dbits: u32,
        dest: TypeId,
    ) -> Value {
        if bits == dbits {
            // Reinterpretation only (signedness change); same bits.
            let mut out = v.clone();
            out.ty = dest;
            return out;
        }
        if let Some(c) = v.as_const() {
            let raw = if signed {
                c.as_int_signed().unwrap_or(0) as u64
            } else {
                c.as_int_bits().unwrap_or(0)
            };
            if self.arena.is_bool(dest) {
                return Value::constant(v.name, dest, Const::int(1, u64::from(raw != 0)));
            }
            return Value::constant(v.name, dest, Const::int(dbits, raw));
        }
        if self.arena.is_bool(dest) {
            let zero = ValueRef::Const(Const::int(bits, 0));
            let result = self.bld().icmp(IntPredicate::Ne, v.ssa, zero);
            return Value::plain(v.name, dest, result);
        }
        let op = if bits > dbits {
            CastOp::Trunc
        } else if signed {
            CastOp::SExt
        } else {
            CastOp::ZExt
        };
        self.emit_cast(v, op, dest)
    }

    fn cast_ptr_to_ptr(
        &mut self,
        v: &Value,
        from_pointee: TypeId,
        to_pointee: TypeId,
        dest: TypeId,
    ) -> Value {
        // Pointer into the inheritance chain: offset, then reinterpret.
        if let (TypeKind::Class(from_class), TypeKind::Class(to_class)) = (
            self.arena.type_kind(from_pointee).clone(),
            self.arena.type_kind(to_pointee).clone(),
        ) {
            if let Some(padding) =
                self.arena
                    .upcast_padding(self.module, from_class, to_class)
            {
                let ptr = self.offset_and_retag(v.ssa, padding, to_pointee);
                return Value::plain(v.name, dest, ptr);
            }
        }
        if self.arena.types_equal(from_pointee, to_pointee) {
            let mut out = v.clone();
            out.ty = dest;
            return out;
        }
        self.emit_cast(v, CastOp::Bitcast, dest)
    }

    /// Struct-to-struct conversion: upcast along the parent chain, on
    /// addresses. Values without backing storage are spilled first.
    fn cast_struct(&mut self, v: &Value, dest: TypeId) -> Value {
        let (Some(from_class), Some(to_class)) =
            (self.arena.class_of(v.ty), self.arena.class_of(dest))
        else {
            return v.clone();
        };
        if from_class == to_class {
            return v.clone();
        }
        let Some(padding) = self
            .arena
            .upcast_padding(self.module, from_class, to_class)
        else {
            // Not on the chain: unchanged, caller diagnoses.
            return v.clone();
        };
        self.struct_cast(v, to_class, padding, dest)
    }

    /// Reinterpret a struct place as a parent at `padding` bytes in.
    pub(crate) fn struct_cast(
        &mut self,
        v: &Value,
        _to_class: ClassId,
        padding: u64,
        dest: TypeId,
    ) -> Value {
        let place = self.ensure_addressable(v);
        let ptr = self.offset_and_retag(place.ssa, padding, dest);
        let mut out = Value::place(v.name, dest, ptr);
        out.is_temporary = place.is_temporary;
        out
    }

    /// `addr + padding` bytes, retyped as a pointer to `dest`.
    fn offset_and_retag(
        &mut self,
        addr: ValueRef,
        padding: u64,
        dest: TypeId,
    ) -> ValueRef {
        let dest_ssa = self.arena.ssa_type(dest);
        let dest_ptr = self.module.types.ptr(dest_ssa);
        if padding == 0 {
            return self.bld().cast(CastOp::Bitcast, addr, dest_ptr);
        }
        let i8_ssa = self.module.types.int(8);
        let i8_ptr = self.module.types.ptr(i8_ssa);
        let raw = self.bld().cast(CastOp::Bitcast, addr, i8_ptr);
        let offset = ValueRef::Const(Const::int(64, padding));
        let shifted = self.bld().gep(i8_ssa, raw, vec![offset], i8_ptr);
        self.bld().cast(CastOp::Bitcast, shifted, dest_ptr)
    }

    /// `T -> Reference(T)`: take the address, materializing a temporary
    /// when the operand has no backing storage.
    fn bind_reference(&mut self, value: &Value, pointee: TypeId, dest: TypeId) -> Value {
        // Already a reference of the right shape: hand over the pointer.
        if matches!(self.arena.type_kind(value.ty), TypeKind::Ref { .. }) {
            let inner = self.arena.strip_refs(value.ty);
            if self.arena.types_equal(inner, pointee) {
                let mut v = value.clone();
                if v.is_alloca {
                    let ref_ssa = self.arena.ssa_type(v.ty);
                    v.ssa = self.bld().load(ref_ssa, v.ssa);
                    v.is_alloca = false;
                }
                v.ty = dest;
                return v;
            }
        }

        let payload = if self.arena.types_equal(self.arena.strip_refs(value.ty), pointee) {
            value.clone()
        } else {
            self.cast_value(value, pointee)
        };

        if payload.is_alloca {
            let mut out = payload;
            out.ty = dest;
            out.is_alloca = false;
            return out;
        }

        let loaded = self.load_for_read(&payload);
        let slot = self.alloc_slot(pointee, Symbol::intern("ref"));
        self.bld().store(loaded.ssa, slot);
        let mut out = Value::plain(loaded.name, dest, slot);
        out.is_temporary = true;
        out
    }

    fn emit_cast(&mut self, v: &Value, op: CastOp, dest: TypeId) -> Value {
        let dest_ssa = self.arena.ssa_type(dest);
        let result = self.bld().cast(op, v.ssa, dest_ssa);
        Value::plain(v.name, dest, result)
    }

    fn float_const(&self, name: Symbol, dest: TypeId, value: f64) -> Value {
        let bits = match self.arena.type_kind(dest) {
            TypeKind::Float { bits } => *bits,
            _ => 64,
        };
        Value::constant(name, dest, Const::Float { bits, value })
    }
}
