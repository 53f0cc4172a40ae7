//! The entity arena.
//!
//! All long-lived semantic objects (types, classes, signatures, functions,
//! aliases, namespaces, generics, variables) live in append-only tables
//! owned by one [`EntityArena`] per compilation. Entities reference each
//! other by typed indices, never by ownership, so recursive shapes (a
//! class whose methods mention the class) need no special lifetime
//! handling: a stub is pushed first and filled in place.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use slatec_util::{define_idx, IndexVec, Span, Symbol};

use crate::scope::ScopeId;
use crate::types::{Type, TypeId, TypeKind};
use crate::value::Value;

define_idx!(ClassId);
define_idx!(SigId);
define_idx!(FuncId);
define_idx!(AliasId);
define_idx!(NsId);
define_idx!(GenericId);
define_idx!(VarId);

/// An instance property of a class.
#[derive(Clone, Debug)]
pub struct Property {
    pub name: Symbol,
    pub ty: TypeId,
    pub span: Span,
}

/// A class definition.
///
/// Layout is `[parents..., properties...]` packed left to right; the
/// member scope owns bindings for methods, aliases, and nested types.
#[derive(Debug)]
pub struct ClassDef {
    pub name: Symbol,
    /// `TypeKind::Class(self)`; patched right after registration.
    pub ty: TypeId,
    /// The named SSA struct.
    pub ssa: slatec_ssa::TyId,
    /// Parent classes, left to right.
    pub parents: Vec<ClassId>,
    pub properties: Vec<Property>,
    /// Member scope (methods, aliases, nested types).
    pub scope: ScopeId,
    pub constructors: Vec<FuncId>,
    pub destructor: Option<FuncId>,
    /// False while the stub awaits its body (recursive references see the
    /// stub and must tolerate an empty member list).
    pub complete: bool,
}

/// One declared parameter.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: Symbol,
    pub ty: TypeId,
}

/// A function signature.
///
/// For methods the receiver is parameter 0, named `this`, typed as a
/// pointer to the owning class.
#[derive(Clone, Debug)]
pub struct Signature {
    pub params: Vec<Param>,
    pub variadic: bool,
    pub is_method: bool,
    /// Return by hidden pointer: the struct return exceeds twice the
    /// pointer width.
    pub is_sret: bool,
    pub ret: TypeId,
    /// The SSA function type (sret slot prepended, `void` return).
    pub ssa: slatec_ssa::TyId,
}

/// A function definition or declaration.
#[derive(Debug)]
pub struct FuncDef {
    pub name: Symbol,
    pub sig: SigId,
    /// `TypeKind::Fn(sig)`.
    pub ty: TypeId,
    pub ssa: slatec_ssa::FuncId,
    pub owner_class: Option<ClassId>,
}

/// What an alias binds its name to.
#[derive(Clone, Debug)]
pub enum AliasTarget {
    Type(TypeId),
    /// A compile-time constant.
    Const(Value),
    Alias(AliasId),
}

/// An alias definition.
#[derive(Clone, Debug)]
pub struct AliasDef {
    pub name: Symbol,
    pub target: AliasTarget,
}

/// A namespace: a name owning a scope.
#[derive(Clone, Debug)]
pub struct NsDef {
    pub name: Symbol,
    pub scope: ScopeId,
}

/// Kind of a generic parameter.
#[derive(Clone, Debug)]
pub enum GenericParamKind {
    Type,
    /// Value parameter with its declared type.
    Const(TypeId),
}

/// One generic parameter.
#[derive(Clone, Debug)]
pub struct GenericParam {
    pub name: Symbol,
    pub kind: GenericParamKind,
}

/// The stored syntax body of a generic entity.
#[derive(Clone, Debug)]
pub enum GenericBody {
    Class(Rc<slatec_ast::ClassDecl>),
    Function(Rc<slatec_ast::FunctionDecl>),
    Alias(Rc<slatec_ast::AliasDecl>),
}

/// A literal constant used as a generic argument.
///
/// Restricted to literals; equality is structural.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstLit {
    Int(i64),
    Str(Symbol),
    Char(u8),
}

/// One bound generic argument.
#[derive(Clone, Debug)]
pub enum GenericArgValue {
    Type(TypeId),
    Const(ConstLit),
}

/// A memoized monomorphization.
#[derive(Debug)]
pub struct GenericChild {
    pub args: Vec<GenericArgValue>,
    pub entity: Entity,
}

/// A generic entity: a factory for concrete classes, functions, or
/// aliases.
#[derive(Debug)]
pub struct GenericDef {
    pub name: Symbol,
    pub params: Vec<GenericParam>,
    pub body: GenericBody,
    /// Scope the generic was declared in; child scopes parent here.
    pub defining_scope: ScopeId,
    /// Child cache, searched newest-first so in-flight stubs win.
    pub children: Vec<GenericChild>,
}

/// A named storage location with a scope-bound lifetime.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Symbol,
    /// The backing value; `is_alloca` unless the variable is synthetic.
    pub value: Value,
    pub is_const: bool,
    pub span: Span,
}

/// Any first-class semantic object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Type(TypeId),
    Func(FuncId),
    Var(VarId),
    Alias(AliasId),
    Namespace(NsId),
    Generic(GenericId),
}

/// Owner of every long-lived semantic record of a compilation.
pub struct EntityArena {
    pub types: IndexVec<TypeId, Type>,
    pub(crate) type_cache: FxHashMap<TypeKind, TypeId>,
    pub classes: IndexVec<ClassId, ClassDef>,
    pub sigs: IndexVec<SigId, Signature>,
    pub funcs: IndexVec<FuncId, FuncDef>,
    pub aliases: IndexVec<AliasId, AliasDef>,
    pub namespaces: IndexVec<NsId, NsDef>,
    pub generics: IndexVec<GenericId, GenericDef>,
    pub vars: IndexVec<VarId, Variable>,

    // Well-known types, interned once at construction.
    pub error_type: TypeId,
    pub void_type: TypeId,
    pub bool_type: TypeId,
}

impl EntityArena {
    pub fn new(module: &mut slatec_ssa::Module) -> Self {
        let mut arena = Self {
            types: IndexVec::new(),
            type_cache: FxHashMap::default(),
            classes: IndexVec::new(),
            sigs: IndexVec::new(),
            funcs: IndexVec::new(),
            aliases: IndexVec::new(),
            namespaces: IndexVec::new(),
            generics: IndexVec::new(),
            vars: IndexVec::new(),
            error_type: TypeId(0),
            void_type: TypeId(0),
            bool_type: TypeId(0),
        };
        arena.error_type = arena.intern_type(module, TypeKind::Error);
        arena.void_type = arena.intern_type(module, TypeKind::Void);
        arena.bool_type = arena.intern_type(
            module,
            TypeKind::Int {
                bits: 1,
                signed: false,
            },
        );
        arena
    }

    /// Intern an integer type.
    pub fn int_type(&mut self, module: &mut slatec_ssa::Module, bits: u32, signed: bool) -> TypeId {
        self.intern_type(module, TypeKind::Int { bits, signed })
    }

    /// Intern a float type.
    pub fn float_type(&mut self, module: &mut slatec_ssa::Module, bits: u32) -> TypeId {
        self.intern_type(module, TypeKind::Float { bits })
    }

    /// Intern a pointer type.
    pub fn ptr_type(&mut self, module: &mut slatec_ssa::Module, pointee: TypeId) -> TypeId {
        self.intern_type(module, TypeKind::Ptr { pointee })
    }

    /// Intern a reference type.
    pub fn ref_type(&mut self, module: &mut slatec_ssa::Module, pointee: TypeId) -> TypeId {
        self.intern_type(module, TypeKind::Ref { pointee })
    }

    /// Register a class stub: named opaque SSA struct, empty member
    /// lists, `complete = false`. Members are filled in afterwards; the
    /// stub is already a usable type for recursive references.
    pub fn register_class(
        &mut self,
        module: &mut slatec_ssa::Module,
        name: Symbol,
        scope: ScopeId,
    ) -> (ClassId, TypeId) {
        let ssa = module.types.add_struct(name);
        let class = self.classes.push(ClassDef {
            name,
            ty: self.error_type, // patched below
            ssa,
            parents: Vec::new(),
            properties: Vec::new(),
            scope,
            constructors: Vec::new(),
            destructor: None,
            complete: false,
        });
        let ty = self.intern_type(module, TypeKind::Class(class));
        self.classes[class].ty = ty;
        (class, ty)
    }

    /// Build a signature and its function type.
    ///
    /// Computes `is_sret` from the data layout (struct return wider than
    /// two pointers) and lowers the SSA function type with the hidden
    /// return slot prepended when needed.
    pub fn make_signature(
        &mut self,
        module: &mut slatec_ssa::Module,
        params: Vec<Param>,
        variadic: bool,
        is_method: bool,
        ret: TypeId,
    ) -> (SigId, TypeId) {
        let ret_ssa = self.types[ret].ssa;
        let is_sret = matches!(self.types[ret].kind, TypeKind::Class(_))
            && module.layout.size_of(&module.types, ret_ssa)
                > 2 * module.layout.ptr_size();

        let mut ssa_params = Vec::with_capacity(params.len() + 1);
        if is_sret {
            ssa_params.push(module.types.ptr(ret_ssa));
        }
        for param in &params {
            ssa_params.push(self.types[param.ty].ssa);
        }
        let ssa_ret = if is_sret {
            module.types.void()
        } else {
            ret_ssa
        };
        let ssa = module.types.fn_type(ssa_params, ssa_ret, variadic);

        let sig = self.sigs.push(Signature {
            params,
            variadic,
            is_method,
            is_sret,
            ret,
            ssa,
        });
        let ty = self.intern_type(module, TypeKind::Fn(sig));
        (sig, ty)
    }

    /// Find a property of a class by name; own properties only.
    pub fn find_property(&self, class: ClassId, name: Symbol) -> Option<(usize, &Property)> {
        self.classes[class]
            .properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }

    /// Compare two generic argument tuples.
    pub fn generic_args_match(&self, a: &[GenericArgValue], b: &[GenericArgValue]) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| match (x, y) {
                (GenericArgValue::Type(t1), GenericArgValue::Type(t2)) => {
                    self.types_equal(*t1, *t2)
                }
                (GenericArgValue::Const(c1), GenericArgValue::Const(c2)) => c1 == c2,
                _ => false,
            })
    }
}
