//! Name resolution.
//!
//! Unqualified lookup walks from the current scope to the root and stops
//! at the first scope containing the name. Qualified lookup (`A::B::C`)
//! resolves `A` unqualified, demands that each intermediate result is
//! scope-bearing (a namespace or a class), and resolves the following
//! segments inside that scope only. Aliases are transparent throughout.
//! A terminal with generic arguments hands off to the generic engine.

use slatec_ast as ast;
use slatec_util::Symbol;

use crate::ctx::GenCtx;
use crate::entity::{AliasTarget, Entity, FuncId};
use crate::error::{DiagKind, SemResult};
use crate::scope::{Binding, ScopeId};
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

/// Outcome of resolving a name: an entity, an overload set, or a
/// compile-time constant reached through an alias.
#[derive(Clone, Debug)]
pub enum Resolved {
    Entity(Entity),
    Overloads(Vec<FuncId>),
    Const(Value),
}

impl GenCtx<'_> {
    /// Resolve a scoped name. `Ok(None)` means a diagnostic was already
    /// reported and the caller should poison.
    pub fn resolve_name(&mut self, name: &ast::ScopedName) -> SemResult<Option<Resolved>> {
        let span = name.span;

        let first = name.qualifiers.first().copied().unwrap_or(name.name);
        let Some((_, binding)) = self.scopes.lookup(self.scope_cursor, first) else {
            self.report(DiagKind::UnknownName(first), span);
            return Ok(None);
        };
        let mut binding = binding.clone();
        let mut prev_segment = first;

        // Remaining segments resolve inside the named scope only.
        let tail: Vec<Symbol> = name
            .qualifiers
            .iter()
            .skip(1)
            .copied()
            .chain(
                if name.qualifiers.is_empty() {
                    None
                } else {
                    Some(name.name)
                },
            )
            .collect();

        for segment in tail {
            let Some(scope) = self.scope_of_binding(&binding) else {
                self.report(DiagKind::NotAScope(prev_segment), span);
                return Ok(None);
            };
            let Some(next) = self.scopes.lookup_local(scope, segment) else {
                self.report(DiagKind::UnknownName(segment), span);
                return Ok(None);
            };
            binding = next.clone();
            prev_segment = segment;
        }

        if !name.generic_args.is_empty() {
            let entity = self.binding_entity(&binding);
            let Some(Entity::Generic(generic)) = entity.map(|e| self.deref_alias_entity(e)) else {
                self.report(
                    DiagKind::GenericArityMismatch {
                        name: name.name,
                        expected: 0,
                        found: name.generic_args.len(),
                    },
                    span,
                );
                return Ok(None);
            };
            return self.instantiate(generic, &name.generic_args, span);
        }

        Ok(self.finish_binding(binding))
    }

    /// Resolve a type expression to a type, poisoning on failure.
    pub fn resolve_type(&mut self, texpr: &ast::TypeExpr) -> SemResult<TypeId> {
        match texpr {
            ast::TypeExpr::Named(name) => match self.resolve_name(name)? {
                Some(Resolved::Entity(Entity::Type(ty))) => Ok(ty),
                Some(_) => {
                    self.report(DiagKind::ExpectedType(name.name), name.span);
                    Ok(self.arena.error_type)
                }
                None => Ok(self.arena.error_type),
            },
            ast::TypeExpr::Pointer { pointee, .. } => {
                let inner = self.resolve_type(pointee)?;
                Ok(self.arena.ptr_type(self.module, inner))
            }
            ast::TypeExpr::Reference { pointee, .. } => {
                let inner = self.resolve_type(pointee)?;
                Ok(self.arena.ref_type(self.module, inner))
            }
            ast::TypeExpr::Array { elem, len, .. } => {
                let inner = self.resolve_type(elem)?;
                Ok(self
                    .arena
                    .intern_type(self.module, TypeKind::Array { elem: inner, len: *len }))
            }
        }
    }

    /// The scope an entity exposes for qualified lookup, if any.
    fn scope_of_binding(&self, binding: &Binding) -> Option<ScopeId> {
        let entity = self.binding_entity(binding)?;
        match self.deref_alias_entity(entity) {
            Entity::Namespace(ns) => Some(self.arena.namespaces[ns].scope),
            Entity::Type(ty) => match self.arena.type_kind(ty) {
                TypeKind::Class(class) => Some(self.arena.classes[*class].scope),
                _ => None,
            },
            _ => None,
        }
    }

    fn binding_entity(&self, binding: &Binding) -> Option<Entity> {
        match binding {
            Binding::Entity(entity) => Some(*entity),
            Binding::Overloads(_) => None,
        }
    }

    /// Follow alias links until a non-alias entity (alias chains are
    /// acyclic by construction: an alias can only reference entities
    /// that already exist).
    pub fn deref_alias_entity(&self, mut entity: Entity) -> Entity {
        while let Entity::Alias(alias) = entity {
            match &self.arena.aliases[alias].target {
                AliasTarget::Type(ty) => return Entity::Type(*ty),
                AliasTarget::Alias(next) => entity = Entity::Alias(*next),
                AliasTarget::Const(_) => return Entity::Alias(alias),
            }
        }
        entity
    }

    /// Turn a binding into the resolver's public result, seeing through
    /// aliases.
    pub fn finish_binding(&self, binding: Binding) -> Option<Resolved> {
        match binding {
            Binding::Overloads(set) => Some(Resolved::Overloads(set)),
            Binding::Entity(entity) => match self.deref_alias_entity(entity) {
                Entity::Alias(alias) => match &self.arena.aliases[alias].target {
                    AliasTarget::Const(value) => Some(Resolved::Const(value.clone())),
                    _ => Some(Resolved::Entity(Entity::Alias(alias))),
                },
                other => Some(Resolved::Entity(other)),
            },
        }
    }
}
