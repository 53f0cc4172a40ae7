//! The elaborator's unit of result.
//!
//! Every elaborated expression yields a [`Value`]: a semantic type plus an
//! SSA handle plus the flags that drive l-value/r-value behavior. When
//! `is_alloca` is set the handle denotes backing storage (a pointer) and
//! reading the value in an r-value context implicitly loads; otherwise the
//! handle is an immediate SSA result.

use slatec_util::Symbol;

use crate::entity::FuncId;
use crate::types::TypeId;

/// An elaborated value.
#[derive(Clone, Debug)]
pub struct Value {
    /// Short debug name, used for SSA slot naming.
    pub name: Symbol,
    /// Semantic type.
    pub ty: TypeId,
    /// SSA handle; a memory address when `is_alloca` is set.
    pub ssa: slatec_ssa::ValueRef,
    /// The handle denotes backing storage rather than an immediate.
    pub is_alloca: bool,
    /// Ownership is retained by the current expression; a store may move
    /// out of it.
    pub is_temporary: bool,
    /// The lifetime may be extended by assignment.
    pub can_be_taken: bool,
    /// Payload classification.
    pub kind: ValueKind,
    /// Bound receiver for a method value; supplies `this` at the call.
    pub receiver: Option<Box<Value>>,
}

/// What a [`Value`] carries beyond its SSA handle.
#[derive(Clone, Debug)]
pub enum ValueKind {
    /// An ordinary intermediate result.
    Plain,
    /// A literal folded in the constant domain.
    Constant(slatec_ssa::Const),
    /// A named storage location with a scope-bound lifetime.
    Variable { is_const: bool },
    /// An overload set that has not been narrowed to one function yet.
    Overloads(Vec<FuncId>),
}

impl Value {
    /// An immediate SSA result.
    pub fn plain(name: Symbol, ty: TypeId, ssa: slatec_ssa::ValueRef) -> Self {
        Self {
            name,
            ty,
            ssa,
            is_alloca: false,
            is_temporary: false,
            can_be_taken: false,
            kind: ValueKind::Plain,
            receiver: None,
        }
    }

    /// A folded constant.
    pub fn constant(name: Symbol, ty: TypeId, c: slatec_ssa::Const) -> Self {
        Self {
            name,
            ty,
            ssa: slatec_ssa::ValueRef::Const(c),
            is_alloca: false,
            is_temporary: false,
            can_be_taken: false,
            kind: ValueKind::Constant(c),
            receiver: None,
        }
    }

    /// An l-value backed by storage at `ptr`.
    pub fn place(name: Symbol, ty: TypeId, ptr: slatec_ssa::ValueRef) -> Self {
        Self {
            name,
            ty,
            ssa: ptr,
            is_alloca: true,
            is_temporary: false,
            can_be_taken: false,
            kind: ValueKind::Plain,
            receiver: None,
        }
    }

    /// The folded literal, if this value lives in the constant domain.
    pub fn as_const(&self) -> Option<slatec_ssa::Const> {
        match &self.kind {
            ValueKind::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Attach a receiver (the implicit `this` for a later call).
    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = Some(Box::new(receiver));
        self
    }

    /// True iff the value is an l-value.
    pub fn is_lvalue(&self) -> bool {
        self.is_alloca
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slatec_ssa::{Const, ValueRef};
    use slatec_util::Idx;

    fn ty0() -> TypeId {
        TypeId::from_usize(0)
    }

    #[test]
    fn plain_values_are_rvalues() {
        let v = Value::plain(Symbol::intern("t"), ty0(), ValueRef::Param(0));
        assert!(!v.is_lvalue());
        assert!(v.as_const().is_none());
    }

    #[test]
    fn constants_remember_their_literal() {
        let c = Const::int(32, 7);
        let v = Value::constant(Symbol::intern("seven"), ty0(), c);
        assert_eq!(v.as_const(), Some(c));
        assert_eq!(v.ssa, ValueRef::Const(c));
    }

    #[test]
    fn places_are_lvalues() {
        let v = Value::place(Symbol::intern("slot"), ty0(), ValueRef::Param(0));
        assert!(v.is_lvalue());
    }

    #[test]
    fn receiver_travels_with_the_value() {
        let recv = Value::place(Symbol::intern("obj"), ty0(), ValueRef::Param(0));
        let method = Value::plain(Symbol::intern("m"), ty0(), ValueRef::Param(1)).with_receiver(recv);
        assert!(method.receiver.is_some());
    }
}
