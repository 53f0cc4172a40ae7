//! Semantic type representation.
//!
//! Types are arena records addressed by [`TypeId`]. Interning keeps the
//! table deduplicated for structural kinds; class types are nominal (two
//! classes are the same type iff they are the same [`ClassId`]). Every
//! type carries a non-owning SSA type handle assigned at interning time.

use slatec_util::define_idx;

use crate::entity::{ClassId, EntityArena, SigId};

define_idx!(TypeId);

/// A semantic type: tagged kind plus its SSA lowering.
#[derive(Clone, Debug)]
pub struct Type {
    pub kind: TypeKind,
    /// Backend handle in the module's type store.
    pub ssa: slatec_ssa::TyId,
}

/// The tagged variant over all type shapes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Poison type of recovered errors; compares equal only to itself and
    /// suppresses downstream diagnostics.
    Error,
    Void,
    /// `bits == 1 && !signed` is the boolean type.
    Int { bits: u32, signed: bool },
    /// 32 or 64 bits.
    Float { bits: u32 },
    Ptr { pointee: TypeId },
    /// Reference; lowers to a pointer, reads see through it.
    Ref { pointee: TypeId },
    Array { elem: TypeId, len: u64 },
    /// Nominal class type.
    Class(ClassId),
    /// Function type; the signature carries the rest.
    Fn(SigId),
}

impl EntityArena {
    /// Intern a type, creating its SSA counterpart on first sight.
    pub fn intern_type(&mut self, module: &mut slatec_ssa::Module, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.type_cache.get(&kind) {
            return id;
        }
        let ssa = match &kind {
            TypeKind::Error | TypeKind::Void => module.types.void(),
            TypeKind::Int { bits, .. } => module.types.int(*bits),
            TypeKind::Float { bits } => module.types.float(*bits),
            TypeKind::Ptr { pointee } | TypeKind::Ref { pointee } => {
                let inner = self.types[*pointee].ssa;
                module.types.ptr(inner)
            }
            TypeKind::Array { elem, len } => {
                let inner = self.types[*elem].ssa;
                module.types.array(inner, *len)
            }
            TypeKind::Class(class) => self.classes[*class].ssa,
            TypeKind::Fn(sig) => self.sigs[*sig].ssa,
        };
        let id = self.types.push(Type {
            kind: kind.clone(),
            ssa,
        });
        self.type_cache.insert(kind, id);
        id
    }

    pub fn type_kind(&self, ty: TypeId) -> &TypeKind {
        &self.types[ty].kind
    }

    pub fn ssa_type(&self, ty: TypeId) -> slatec_ssa::TyId {
        self.types[ty].ssa
    }

    /// Structural type equality (aliases are resolved before types are
    /// built, so none appear here).
    pub fn types_equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (&self.types[a].kind, &self.types[b].kind) {
            (TypeKind::Error, TypeKind::Error) | (TypeKind::Void, TypeKind::Void) => true,
            (
                TypeKind::Int { bits: b1, signed: s1 },
                TypeKind::Int { bits: b2, signed: s2 },
            ) => b1 == b2 && s1 == s2,
            (TypeKind::Float { bits: b1 }, TypeKind::Float { bits: b2 }) => b1 == b2,
            (TypeKind::Ptr { pointee: p1 }, TypeKind::Ptr { pointee: p2 })
            | (TypeKind::Ref { pointee: p1 }, TypeKind::Ref { pointee: p2 }) => {
                self.types_equal(*p1, *p2)
            }
            (
                TypeKind::Array { elem: e1, len: l1 },
                TypeKind::Array { elem: e2, len: l2 },
            ) => l1 == l2 && self.types_equal(*e1, *e2),
            (TypeKind::Class(c1), TypeKind::Class(c2)) => c1 == c2,
            (TypeKind::Fn(s1), TypeKind::Fn(s2)) => {
                let (a, b) = (&self.sigs[*s1], &self.sigs[*s2]);
                a.variadic == b.variadic
                    && a.is_method == b.is_method
                    && a.params.len() == b.params.len()
                    && self.types_equal(a.ret, b.ret)
                    && a.params
                        .iter()
                        .zip(&b.params)
                        .all(|(x, y)| self.types_equal(x.ty, y.ty))
            }
            _ => false,
        }
    }

    /// Strip `Reference` layers.
    pub fn strip_refs(&self, mut ty: TypeId) -> TypeId {
        while let TypeKind::Ref { pointee } = self.types[ty].kind {
            ty = pointee;
        }
        ty
    }

    pub fn is_error(&self, ty: TypeId) -> bool {
        matches!(self.types[ty].kind, TypeKind::Error)
    }

    pub fn is_integer(&self, ty: TypeId) -> bool {
        matches!(self.types[ty].kind, TypeKind::Int { .. })
    }

    pub fn is_bool(&self, ty: TypeId) -> bool {
        matches!(self.types[ty].kind, TypeKind::Int { bits: 1, .. })
    }

    pub fn is_float(&self, ty: TypeId) -> bool {
        matches!(self.types[ty].kind, TypeKind::Float { .. })
    }

    pub fn is_numeric(&self, ty: TypeId) -> bool {
        self.is_integer(ty) || self.is_float(ty)
    }

    pub fn is_pointer(&self, ty: TypeId) -> bool {
        matches!(self.types[ty].kind, TypeKind::Ptr { .. })
    }

    /// The class behind a (possibly reference-wrapped) class type.
    pub fn class_of(&self, ty: TypeId) -> Option<ClassId> {
        match self.types[self.strip_refs(ty)].kind {
            TypeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Byte offset added when reinterpreting `from` as its (transitive)
    /// parent `to`; `None` when `to` is not on the inheritance chain.
    ///
    /// The offset of parent `i` is the summed size of parents `0..i`;
    /// chains of depth greater than one accumulate.
    pub fn upcast_padding(
        &self,
        module: &slatec_ssa::Module,
        from: ClassId,
        to: ClassId,
    ) -> Option<u64> {
        if from == to {
            return Some(0);
        }
        let mut padding = 0u64;
        for &parent in &self.classes[from].parents {
            if let Some(inner) = self.upcast_padding(module, parent, to) {
                return Some(padding + inner);
            }
            let parent_ssa = self.classes[parent].ssa;
            padding += module.layout.size_of(&module.types, parent_ssa);
        }
        None
    }

    /// Human-readable rendering for diagnostics.
    pub fn display_type(&self, ty: TypeId) -> String {
        match &self.types[ty].kind {
            TypeKind::Error => "<error>".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::Int { bits: 1, signed: false } => "bool".to_string(),
            TypeKind::Int { bits, signed } => {
                format!("{}{bits}", if *signed { "i" } else { "u" })
            }
            TypeKind::Float { bits } => format!("f{bits}"),
            TypeKind::Ptr { pointee } => format!("{}*", self.display_type(*pointee)),
            TypeKind::Ref { pointee } => format!("{}&", self.display_type(*pointee)),
            TypeKind::Array { elem, len } => {
                format!("{}[{len}]", self.display_type(*elem))
            }
            TypeKind::Class(class) => self.classes[*class].name.as_str().to_string(),
            TypeKind::Fn(sig) => {
                let sig = &self.sigs[*sig];
                let params: Vec<_> = sig
                    .params
                    .iter()
                    .map(|p| self.display_type(p.ty))
                    .collect();
                format!(
                    "fn({}{}): {}",
                    params.join(", "),
                    if sig.variadic { ", ..." } else { "" },
                    self.display_type(sig.ret)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slatec_ssa::{DataLayout, Module};
    use slatec_util::Symbol;

    fn setup() -> (Module, EntityArena) {
        let mut module = Module::new("t", DataLayout::default());
        let arena = EntityArena::new(&mut module);
        (module, arena)
    }

    #[test]
    fn interning_is_idempotent() {
        let (mut module, mut arena) = setup();
        let a = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let b = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        assert_eq!(a, b);
    }

    #[test]
    fn equality_is_reflexive_symmetric_transitive() {
        let (mut module, mut arena) = setup();
        let i32a = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let i32b = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let u32t = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: false,
            },
        );

        assert!(arena.types_equal(i32a, i32a));
        assert!(arena.types_equal(i32a, i32b));
        assert!(arena.types_equal(i32b, i32a));
        // Same width, different signedness: not equal.
        assert!(!arena.types_equal(i32a, u32t));
    }

    #[test]
    fn classes_are_nominal() {
        let (mut module, mut arena) = setup();
        let scope = crate::scope::ScopeId(0);
        let (c1, t1) = arena.register_class(&mut module, Symbol::intern("A"), scope);
        let (c2, t2) = arena.register_class(&mut module, Symbol::intern("A"), scope);
        assert_ne!(c1, c2);
        assert!(!arena.types_equal(t1, t2));
        assert!(arena.types_equal(t1, t1));
    }

    #[test]
    fn strip_refs_reaches_the_base() {
        let (mut module, mut arena) = setup();
        let i32t = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let r = arena.intern_type(&mut module, TypeKind::Ref { pointee: i32t });
        let rr = arena.intern_type(&mut module, TypeKind::Ref { pointee: r });
        assert_eq!(arena.strip_refs(rr), i32t);
        assert_eq!(arena.strip_refs(i32t), i32t);
    }

    #[test]
    fn display_renders_compactly() {
        let (mut module, mut arena) = setup();
        let i32t = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let p = arena.intern_type(&mut module, TypeKind::Ptr { pointee: i32t });
        let b = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 1,
                signed: false,
            },
        );
        assert_eq!(arena.display_type(i32t), "i32");
        assert_eq!(arena.display_type(p), "i32*");
        assert_eq!(arena.display_type(b), "bool");
    }

    #[test]
    fn upcast_padding_accumulates_across_depth() {
        let (mut module, mut arena) = setup();
        let scope = crate::scope::ScopeId(0);
        let i32t = arena.intern_type(
            &mut module,
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
        );
        let i32_ssa = arena.ssa_type(i32t);

        // grandparent { x: i32 }  parent extends grandparent { y: i32 }
        // child extends parent { z: i32 }
        let (gp, _) = arena.register_class(&mut module, Symbol::intern("GP"), scope);
        module.types.set_struct_body(arena.classes[gp].ssa, vec![i32_ssa]);

        let (parent, _) = arena.register_class(&mut module, Symbol::intern("P"), scope);
        arena.classes[parent].parents.push(gp);
        let gp_ssa = arena.classes[gp].ssa;
        module
            .types
            .set_struct_body(arena.classes[parent].ssa, vec![gp_ssa, i32_ssa]);

        let (sibling, _) = arena.register_class(&mut module, Symbol::intern("S"), scope);
        module
            .types
            .set_struct_body(arena.classes[sibling].ssa, vec![i32_ssa]);

        let (child, _) = arena.register_class(&mut module, Symbol::intern("C"), scope);
        arena.classes[child].parents.push(parent);
        arena.classes[child].parents.push(sibling);

        // Direct parent at offset 0; second parent behind the first.
        assert_eq!(arena.upcast_padding(&module, child, parent), Some(0));
        assert_eq!(arena.upcast_padding(&module, child, sibling), Some(8));
        // Transitive: grandparent sits at the front of parent.
        assert_eq!(arena.upcast_padding(&module, child, gp), Some(0));
        // Not on the chain.
        assert_eq!(arena.upcast_padding(&module, gp, child), None);
    }
}
