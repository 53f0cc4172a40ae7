//! SSA type store.
//!
//! Non-struct types are interned so that structurally equal types share a
//! [`TyId`]. Struct types are nominal: each `add_struct` call mints a new
//! id, and the body can be filled in later, which lets recursive classes
//! register an opaque struct before their members are known.

use rustc_hash::FxHashMap;
use slatec_util::{define_idx, IndexVec, Symbol};

define_idx!(TyId);

/// Shape of an SSA type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TyKind {
    Void,
    /// Integer of an arbitrary bit width; `i1` doubles as bool.
    Int { bits: u32 },
    /// IEEE float, 32 or 64 bits.
    Float { bits: u32 },
    /// Typed pointer.
    Ptr(TyId),
    /// Fixed-length array.
    Array { elem: TyId, len: u64 },
    /// Nominal struct; the body lives beside the kind table.
    Struct { name: Symbol },
    /// Function type.
    Fn {
        params: Vec<TyId>,
        ret: TyId,
        variadic: bool,
    },
}

/// Interning table for SSA types.
#[derive(Debug)]
pub struct TypeStore {
    tys: IndexVec<TyId, TyKind>,
    interned: FxHashMap<TyKind, TyId>,
    struct_bodies: FxHashMap<TyId, Vec<TyId>>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self {
            tys: IndexVec::new(),
            interned: FxHashMap::default(),
            struct_bodies: FxHashMap::default(),
        }
    }

    /// Intern a non-struct type.
    ///
    /// # Panics
    ///
    /// Panics on `TyKind::Struct`; structs are nominal and go through
    /// [`TypeStore::add_struct`].
    pub fn intern(&mut self, kind: TyKind) -> TyId {
        assert!(
            !matches!(kind, TyKind::Struct { .. }),
            "struct types are nominal; use add_struct"
        );
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = self.tys.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    /// Register a new named struct with an empty (opaque) body.
    pub fn add_struct(&mut self, name: Symbol) -> TyId {
        let id = self.tys.push(TyKind::Struct { name });
        self.struct_bodies.insert(id, Vec::new());
        id
    }

    /// Fill in the field list of a struct registered with `add_struct`.
    pub fn set_struct_body(&mut self, id: TyId, fields: Vec<TyId>) {
        debug_assert!(matches!(self.tys[id], TyKind::Struct { .. }));
        self.struct_bodies.insert(id, fields);
    }

    /// Fields of a struct type, in declaration order.
    pub fn struct_fields(&self, id: TyId) -> &[TyId] {
        self.struct_bodies
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn kind(&self, id: TyId) -> &TyKind {
        &self.tys[id]
    }

    pub fn is_struct(&self, id: TyId) -> bool {
        matches!(self.tys[id], TyKind::Struct { .. })
    }

    // Convenience constructors for the common shapes.

    pub fn void(&mut self) -> TyId {
        self.intern(TyKind::Void)
    }

    pub fn int(&mut self, bits: u32) -> TyId {
        self.intern(TyKind::Int { bits })
    }

    pub fn bool(&mut self) -> TyId {
        self.int(1)
    }

    pub fn float(&mut self, bits: u32) -> TyId {
        self.intern(TyKind::Float { bits })
    }

    pub fn ptr(&mut self, pointee: TyId) -> TyId {
        self.intern(TyKind::Ptr(pointee))
    }

    pub fn array(&mut self, elem: TyId, len: u64) -> TyId {
        self.intern(TyKind::Array { elem, len })
    }

    pub fn fn_type(&mut self, params: Vec<TyId>, ret: TyId, variadic: bool) -> TyId {
        self.intern(TyKind::Fn {
            params,
            ret,
            variadic,
        })
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}
