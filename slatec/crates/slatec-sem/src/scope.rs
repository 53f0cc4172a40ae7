//! The scope graph.
//!
//! An ordered tree of scopes, each owning named bindings to entities.
//! Unqualified lookup walks child to parent until the first match;
//! qualified lookup restarts inside the named scope and does not walk.
//! Bindings are append-only within one elaboration pass: redeclaring a
//! name in the same scope is an error, except that functions accumulate
//! an overload set.

use indexmap::IndexMap;
use slatec_util::{define_idx, IndexVec, Symbol};

use crate::entity::{ClassId, Entity, FuncId, GenericId, NsId, VarId};

define_idx!(ScopeId);

/// The entity a scope belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeOwner {
    /// The root module scope.
    Root,
    Namespace(NsId),
    Class(ClassId),
    Function(crate::entity::FuncId),
    Block,
    /// Child scope of a generic instantiation, holding the bound
    /// parameters.
    Generic(GenericId),
}

/// What a name is bound to.
#[derive(Clone, Debug)]
pub enum Binding {
    Entity(Entity),
    /// Functions sharing one name in this scope.
    Overloads(Vec<FuncId>),
}

/// One scope: parent link, owned children, ordered bindings, owner, and
/// the local variables declared in it (in declaration order, which is
/// also destructor order reversed).
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub bindings: IndexMap<Symbol, Binding>,
    pub owner: ScopeOwner,
    pub locals: Vec<VarId>,
}

/// The scope tree of one compilation-unit group.
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    pub root: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        let root = scopes.push(Scope {
            parent: None,
            children: Vec::new(),
            bindings: IndexMap::new(),
            owner: ScopeOwner::Root,
            locals: Vec::new(),
        });
        Self { scopes, root }
    }

    /// Create a child scope.
    pub fn push(&mut self, parent: ScopeId, owner: ScopeOwner) -> ScopeId {
        let id = self.scopes.push(Scope {
            parent: Some(parent),
            children: Vec::new(),
            bindings: IndexMap::new(),
            owner,
            locals: Vec::new(),
        });
        self.scopes[parent].children.push(id);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }

    /// Look up a name in this scope only.
    pub fn lookup_local(&self, scope: ScopeId, name: Symbol) -> Option<&Binding> {
        self.scopes[scope].bindings.get(&name)
    }

    /// Look up a name walking from `scope` to the root; returns the
    /// nearest enclosing declaration.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<(ScopeId, &Binding)> {
        let mut current = scope;
        loop {
            if let Some(binding) = self.scopes[current].bindings.get(&name) {
                return Some((current, binding));
            }
            current = self.scopes[current].parent?;
        }
    }

    /// Bind a name. Fails if the name is already bound in this scope.
    pub fn insert(&mut self, scope: ScopeId, name: Symbol, binding: Binding) -> Result<(), ()> {
        let bindings = &mut self.scopes[scope].bindings;
        if bindings.contains_key(&name) {
            return Err(());
        }
        bindings.insert(name, binding);
        Ok(())
    }

    /// Register a function under `name`, growing the overload set if the
    /// name already binds functions. Fails if the name binds anything
    /// else.
    pub fn add_overload(&mut self, scope: ScopeId, name: Symbol, func: FuncId) -> Result<(), ()> {
        let bindings = &mut self.scopes[scope].bindings;
        match bindings.get_mut(&name) {
            None => {
                bindings.insert(name, Binding::Overloads(vec![func]));
                Ok(())
            }
            Some(Binding::Overloads(set)) => {
                set.push(func);
                Ok(())
            }
            Some(Binding::Entity(_)) => Err(()),
        }
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
