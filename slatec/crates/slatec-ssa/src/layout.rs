//! Data layout queries.
//!
//! The elaborator needs exactly two questions answered: how many bytes a
//! type occupies, and at which byte offset a struct field sits. Layout is
//! naive left-to-right packing with no alignment padding, so a struct's
//! size is the sum of its field sizes and an upcast to parent *i* skips
//! exactly the summed size of parents `0..i`.

use crate::ty::{TyId, TyKind, TypeStore};

/// Target layout parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataLayout {
    /// Pointer width in bits.
    pub ptr_bits: u32,
}

impl DataLayout {
    pub fn new(ptr_bits: u32) -> Self {
        Self { ptr_bits }
    }

    /// Pointer size in bytes.
    pub fn ptr_size(&self) -> u64 {
        u64::from(self.ptr_bits) / 8
    }

    /// Size of a type in bytes.
    ///
    /// Integers round up to whole bytes (`i1` occupies one byte).
    pub fn size_of(&self, store: &TypeStore, ty: TyId) -> u64 {
        match store.kind(ty) {
            TyKind::Void => 0,
            TyKind::Int { bits } => u64::from(bits.div_ceil(8)),
            TyKind::Float { bits } => u64::from(bits / 8),
            TyKind::Ptr(_) | TyKind::Fn { .. } => self.ptr_size(),
            TyKind::Array { elem, len } => self.size_of(store, *elem) * len,
            TyKind::Struct { .. } => store
                .struct_fields(ty)
                .iter()
                .map(|&f| self.size_of(store, f))
                .sum(),
        }
    }

    /// Byte offset of field `index` inside a struct type.
    pub fn offset_of(&self, store: &TypeStore, strukt: TyId, index: usize) -> u64 {
        store.struct_fields(strukt)[..index]
            .iter()
            .map(|&f| self.size_of(store, f))
            .sum()
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { ptr_bits: 64 }
    }
}
