//! The generic instantiation engine.
//!
//! `instantiate(gen, args)` is memoized on the generic's child cache:
//! equal argument tuples return the identical entity. Arguments bind
//! positionally into a fresh child scope parented at the generic's
//! defining scope; for classes and functions a stub entity is pushed
//! into the cache *before* the body elaborates, so a recursive reference
//! from the body finds the in-progress entity instead of recursing. The
//! cache is searched newest-first for the same reason. Unbounded
//! recursion (a generic that never reaches a fixed point) trips the
//! depth guard and aborts the unit.

use std::fmt::Write;

use slatec_ast as ast;
use slatec_util::{Span, Symbol};

use crate::ctx::GenCtx;
use crate::entity::{
    AliasDef, AliasTarget, ConstLit, Entity, GenericArgValue, GenericChild, GenericId,
    GenericParamKind,
};
use crate::error::{DiagKind, SemResult};
use crate::resolve::Resolved;
use crate::scope::{Binding, ScopeOwner};
use crate::types::TypeKind;
use crate::value::Value;

/// Re-entrant instantiation deeper than this is a cycle.
const MAX_INSTANTIATION_DEPTH: usize = 128;

impl GenCtx<'_> {
    /// Monomorphize a generic entity for the given argument list.
    ///
    /// `Ok(None)` means a diagnostic was reported and the caller should
    /// poison; fatal cycles propagate as `Err`.
    pub fn instantiate(
        &mut self,
        generic: GenericId,
        args: &[ast::GenericArg],
        span: Span,
    ) -> SemResult<Option<Resolved>> {
        let name = self.arena.generics[generic].name;
        let expected = self.arena.generics[generic].params.len();
        if args.len() != expected {
            self.report(
                DiagKind::GenericArityMismatch {
                    name,
                    expected,
                    found: args.len(),
                },
                span,
            );
            return Ok(None);
        }

        let Some(values) = self.bind_argument_values(generic, args, span)? else {
            return Ok(None);
        };

        // Memoized (and in-progress) children, newest first.
        if let Some(entity) = self.find_child(generic, &values) {
            return Ok(self.finish_binding(Binding::Entity(entity)));
        }

        if self.generic_depth >= MAX_INSTANTIATION_DEPTH {
            return Err(self.fatal(DiagKind::GenericInstantiationCycle(name), span));
        }
        self.generic_depth += 1;
        let result = self.instantiate_fresh(generic, values, span);
        self.generic_depth -= 1;

        let entity = result?;
        Ok(entity.and_then(|e| self.finish_binding(Binding::Entity(e))))
    }

    fn find_child(&self, generic: GenericId, values: &[GenericArgValue]) -> Option<Entity> {
        self.arena.generics[generic]
            .children
            .iter()
            .rev()
            .find(|child| self.arena.generic_args_match(&child.args, values))
            .map(|child| child.entity)
    }

    /// Evaluate use-site arguments against the declared parameters.
    fn bind_argument_values(
        &mut self,
        generic: GenericId,
        args: &[ast::GenericArg],
        span: Span,
    ) -> SemResult<Option<Vec<GenericArgValue>>> {
        let params = self.arena.generics[generic].params.clone();
        let mut values = Vec::with_capacity(args.len());
        for (param, arg) in params.iter().zip(args) {
            match (&param.kind, arg) {
                (GenericParamKind::Type, ast::GenericArg::Type(texpr)) => {
                    values.push(GenericArgValue::Type(self.resolve_type(texpr)?));
                }
                (GenericParamKind::Const(declared), ast::GenericArg::Const(lit)) => {
                    let Some(value) = const_lit_for(declared, lit, self) else {
                        self.report(DiagKind::GenericArgumentKindMismatch(param.name), span);
                        return Ok(None);
                    };
                    values.push(GenericArgValue::Const(value));
                }
                _ => {
                    self.report(DiagKind::GenericArgumentKindMismatch(param.name), span);
                    return Ok(None);
                }
            }
        }
        Ok(Some(values))
    }

    fn instantiate_fresh(
        &mut self,
        generic: GenericId,
        values: Vec<GenericArgValue>,
        span: Span,
    ) -> SemResult<Option<Entity>> {
        let def = &self.arena.generics[generic];
        let defining_scope = def.defining_scope;
        let body = def.body.clone();
        let mangled = self.mangle_generic_name(generic, &values);

        // Fresh child scope holding the bound parameters.
        let child_scope = self.scopes.push(defining_scope, ScopeOwner::Generic(generic));
        self.bind_parameters(generic, child_scope, &values, span);

        let saved = self.enter_existing_scope(child_scope);
        match body {
            crate::entity::GenericBody::Class(decl) => {
                // Stub first: the child is findable before its body runs.
                let (class, ty) = self.declare_class_stub(mangled, &decl)?;
                self.push_child(generic, values, Entity::Type(ty));
                let result = self.elaborate_class_body(class, &decl);
                self.restore_scope(saved);
                result?;
                Ok(Some(Entity::Type(ty)))
            }
            crate::entity::GenericBody::Function(decl) => {
                match self.declare_concrete_function(mangled, &decl, None)? {
                    Some(func) => {
                        self.push_child(generic, values, Entity::Func(func));
                        let result = self.elaborate_function_body(func, &decl);
                        self.restore_scope(saved);
                        result?;
                        Ok(Some(Entity::Func(func)))
                    }
                    None => {
                        self.restore_scope(saved);
                        Ok(None)
                    }
                }
            }
            crate::entity::GenericBody::Alias(decl) => {
                let target = self.resolve_alias_target(&decl);
                self.restore_scope(saved);
                match target? {
                    Some(target) => {
                        let alias = self.arena.aliases.push(AliasDef {
                            name: mangled,
                            target,
                        });
                        let entity = Entity::Alias(alias);
                        self.push_child(generic, values, entity);
                        Ok(Some(entity))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn push_child(&mut self, generic: GenericId, args: Vec<GenericArgValue>, entity: Entity) {
        self.arena.generics[generic]
            .children
            .push(GenericChild { args, entity });
    }

    /// Bind `T = i32`-style parameters into the child scope.
    fn bind_parameters(
        &mut self,
        generic: GenericId,
        child_scope: crate::scope::ScopeId,
        values: &[GenericArgValue],
        span: Span,
    ) {
        let params = self.arena.generics[generic].params.clone();
        for (param, value) in params.iter().zip(values) {
            let binding = match value {
                GenericArgValue::Type(ty) => Binding::Entity(Entity::Type(*ty)),
                GenericArgValue::Const(lit) => {
                    let declared = match &param.kind {
                        GenericParamKind::Const(ty) => *ty,
                        GenericParamKind::Type => self.arena.error_type,
                    };
                    let value = self.const_lit_value(lit, declared);
                    let alias = self.arena.aliases.push(AliasDef {
                        name: param.name,
                        target: AliasTarget::Const(value),
                    });
                    Binding::Entity(Entity::Alias(alias))
                }
            };
            if self.scopes.insert(child_scope, param.name, binding).is_err() {
                self.report(DiagKind::RedeclaredName(param.name), span);
            }
        }
    }

    /// Materialize a literal generic argument as a constant value of the
    /// declared parameter type.
    fn const_lit_value(&mut self, lit: &ConstLit, declared: crate::types::TypeId) -> Value {
        match lit {
            ConstLit::Int(v) => {
                let bits = match self.arena.type_kind(declared) {
                    TypeKind::Int { bits, .. } => *bits,
                    _ => 32,
                };
                Value::constant(
                    Symbol::intern("genarg"),
                    declared,
                    slatec_ssa::Const::int(bits, *v as u64),
                )
            }
            ConstLit::Char(c) => Value::constant(
                Symbol::intern("genarg"),
                declared,
                slatec_ssa::Const::int(8, u64::from(*c)),
            ),
            ConstLit::Str(text) => {
                // A pointer to a private byte global; no insertion point
                // is needed so the global address stands in directly.
                let name = Symbol::intern(&format!("genstr{}", self.module.globals.len()));
                let mut bytes = text.as_str().as_bytes().to_vec();
                bytes.push(0);
                let global = self.module.add_global_bytes(name, bytes);
                let u8t = self.arena.int_type(self.module, 8, false);
                let ptr = self.arena.ptr_type(self.module, u8t);
                Value::plain(*text, ptr, slatec_ssa::ValueRef::Global(global))
            }
        }
    }

    /// `Stack<i32, 4>`-style display name for a monomorphized child.
    fn mangle_generic_name(&self, generic: GenericId, values: &[GenericArgValue]) -> Symbol {
        let mut out = String::new();
        let _ = write!(out, "{}<", self.arena.generics[generic].name);
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match value {
                GenericArgValue::Type(ty) => out.push_str(&self.arena.display_type(*ty)),
                GenericArgValue::Const(ConstLit::Int(v)) => {
                    let _ = write!(out, "{v}");
                }
                GenericArgValue::Const(ConstLit::Char(c)) => {
                    let _ = write!(out, "'{}'", *c as char);
                }
                GenericArgValue::Const(ConstLit::Str(s)) => {
                    let _ = write!(out, "{:?}", s.as_str());
                }
            }
        }
        out.push('>');
        Symbol::intern(&out)
    }
}

/// Check a literal against the declared parameter type and build the
/// structural constant used for memoization.
fn const_lit_for(
    declared: &crate::types::TypeId,
    lit: &ast::Literal,
    ctx: &GenCtx<'_>,
) -> Option<ConstLit> {
    match (&lit.kind, ctx.arena.type_kind(*declared)) {
        (ast::LitKind::Int(v), TypeKind::Int { .. }) => Some(ConstLit::Int(*v)),
        (ast::LitKind::Char(c), TypeKind::Int { .. }) => Some(ConstLit::Char(*c)),
        (ast::LitKind::Str(s), TypeKind::Ptr { .. }) => Some(ConstLit::Str(*s)),
        (_, TypeKind::Error) => match &lit.kind {
            ast::LitKind::Int(v) => Some(ConstLit::Int(*v)),
            ast::LitKind::Char(c) => Some(ConstLit::Char(*c)),
            ast::LitKind::Str(s) => Some(ConstLit::Str(*s)),
            _ => None,
        },
        _ => None,
    }
}
