//! Item elaboration: namespaces, classes, functions, aliases.
//!
//! The walk is depth-first in declaration order. Classes follow the
//! stub-then-fill protocol: the class type and its opaque SSA struct are
//! registered before parents, properties, and methods elaborate, so
//! members can mention their own class freely. Method signatures are all
//! declared before any body runs, giving mutual recursion inside one
//! class body.

use std::rc::Rc;

use slatec_ast as ast;
use slatec_util::{Span, Symbol};

use crate::ctx::{FunctionFrame, GenCtx};
use crate::entity::{
    AliasDef, AliasTarget, ClassId, Entity, FuncDef, FuncId, GenericBody, GenericDef,
    GenericParam, GenericParamKind, NsDef, Param, Variable,
};
use crate::error::{DiagKind, SemResult};
use crate::resolve::Resolved;
use crate::scope::{Binding, ScopeOwner};
use crate::types::{TypeId, TypeKind};
use crate::value::{Value, ValueKind};

impl GenCtx<'_> {
    /// Elaborate one parsed unit into the module.
    pub fn elaborate_unit(&mut self, unit: &ast::Unit) -> SemResult<()> {
        for item in &unit.items {
            self.elaborate_item(item)?;
        }
        Ok(())
    }

    pub fn elaborate_item(&mut self, item: &ast::Item) -> SemResult<()> {
        match item {
            ast::Item::Function(decl) => self.item_function(decl),
            ast::Item::Class(decl) => self.item_class(decl),
            ast::Item::Namespace(decl) => self.item_namespace(decl),
            ast::Item::Alias(decl) => self.item_alias(decl),
        }
    }

    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    fn item_namespace(&mut self, decl: &ast::NamespaceDecl) -> SemResult<()> {
        let scope = match self.scopes.lookup_local(self.current_scope(), decl.name) {
            // Re-opening adds to the existing scope.
            Some(Binding::Entity(Entity::Namespace(ns))) => self.arena.namespaces[*ns].scope,
            Some(_) => {
                self.report(DiagKind::RedeclaredName(decl.name), decl.span);
                return Ok(());
            }
            None => {
                let ns = self.arena.namespaces.next_index();
                let scope = self.scopes.push(self.current_scope(), ScopeOwner::Namespace(ns));
                self.arena.namespaces.push(NsDef {
                    name: decl.name,
                    scope,
                });
                self.scopes
                    .insert(
                        self.current_scope(),
                        decl.name,
                        Binding::Entity(Entity::Namespace(ns)),
                    )
                    .expect("checked for an existing binding above");
                scope
            }
        };

        let saved = self.enter_existing_scope(scope);
        let result: SemResult<()> = (|| {
            for item in &decl.items {
                self.elaborate_item(item)?;
            }
            Ok(())
        })();
        self.restore_scope(saved);
        result
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    fn item_class(&mut self, decl: &ast::ClassDecl) -> SemResult<()> {
        if !decl.generics.is_empty() {
            self.register_generic(
                decl.name,
                &decl.generics,
                GenericBody::Class(Rc::new(decl.clone())),
                decl.span,
            )?;
            return Ok(());
        }
        let (class, ty) = self.declare_class_stub(decl.name, decl)?;
        if self
            .scopes
            .insert(
                self.current_scope(),
                decl.name,
                Binding::Entity(Entity::Type(ty)),
            )
            .is_err()
        {
            self.report(DiagKind::RedeclaredName(decl.name), decl.span);
        }
        self.elaborate_class_body(class, decl)
    }

    /// Register the stub: class scope, opaque struct, incomplete def.
    pub(crate) fn declare_class_stub(
        &mut self,
        name: Symbol,
        _decl: &ast::ClassDecl,
    ) -> SemResult<(ClassId, TypeId)> {
        let class = self.arena.classes.next_index();
        let scope = self.scopes.push(self.current_scope(), ScopeOwner::Class(class));
        let (class, ty) = self.arena.register_class(self.module, name, scope);
        Ok((class, ty))
    }

    /// Fill a class stub: parents, properties, layout, members.
    pub(crate) fn elaborate_class_body(
        &mut self,
        class: ClassId,
        decl: &ast::ClassDecl,
    ) -> SemResult<()> {
        let class_scope = self.arena.classes[class].scope;

        // Parents resolve in the enclosing scope.
        for parent_name in &decl.parents {
            match self.resolve_name(parent_name)? {
                Some(Resolved::Entity(Entity::Type(ty)))
                    if matches!(self.arena.type_kind(ty), TypeKind::Class(_)) =>
                {
                    let TypeKind::Class(parent) = *self.arena.type_kind(ty) else {
                        unreachable!()
                    };
                    self.arena.classes[class].parents.push(parent);
                }
                Some(Resolved::Entity(Entity::Type(ty))) => {
                    let shown = self.arena.display_type(ty);
                    self.report(DiagKind::ExpectedClass(shown), parent_name.span);
                }
                Some(_) => {
                    self.report(
                        DiagKind::ExpectedClass(parent_name.name.as_str().to_string()),
                        parent_name.span,
                    );
                }
                None => {}
            }
        }

        // Members elaborate with the class scope current, so nested
        // aliases and generic parameters stay visible.
        let saved = self.enter_existing_scope(class_scope);
        let result = self.elaborate_class_members(class, decl);
        self.restore_scope(saved);
        result
    }

    fn elaborate_class_members(&mut self, class: ClassId, decl: &ast::ClassDecl) -> SemResult<()> {
        // Nested types and aliases first: property and method types may
        // use them.
        for member in &decl.members {
            match member {
                ast::ClassMember::Alias(alias) => self.item_alias(alias)?,
                ast::ClassMember::Class(nested) => self.item_class(nested)?,
                _ => {}
            }
        }

        // Properties, then the struct layout: parents first, own
        // properties after, packed left to right.
        for member in &decl.members {
            if let ast::ClassMember::Property(prop) = member {
                let ty = self.resolve_type(&prop.ty)?;
                self.arena.classes[class].properties.push(crate::entity::Property {
                    name: prop.name,
                    ty,
                    span: prop.span,
                });
            }
        }
        let mut fields: Vec<slatec_ssa::TyId> = Vec::new();
        for &parent in &self.arena.classes[class].parents {
            fields.push(self.arena.classes[parent].ssa);
        }
        for prop in &self.arena.classes[class].properties {
            fields.push(self.arena.ssa_type(prop.ty));
        }
        let class_ssa = self.arena.classes[class].ssa;
        self.module.types.set_struct_body(class_ssa, fields);
        self.arena.classes[class].complete = true;

        // Declare every method signature before any body elaborates.
        let mut declared: Vec<(FuncId, &ast::FunctionDecl)> = Vec::new();
        for member in &decl.members {
            if let ast::ClassMember::Method(method) = member {
                if !method.generics.is_empty() {
                    self.register_generic(
                        method.name,
                        &method.generics,
                        GenericBody::Function(Rc::new(method.clone())),
                        method.span,
                    )?;
                    continue;
                }
                let class_name = self.arena.classes[class].name;
                let ssa_name =
                    Symbol::intern(&format!("{}.{}", class_name, method.name));
                if let Some(func) =
                    self.declare_concrete_function(ssa_name, method, Some(class))?
                {
                    let class_scope = self.arena.classes[class].scope;
                    if method.name == Symbol::intern("@constructor") {
                        self.arena.classes[class].constructors.push(func);
                    }
                    if method.name == Symbol::intern("@destructor") {
                        if self.arena.classes[class].destructor.is_some() {
                            self.report(DiagKind::RedeclaredName(method.name), method.span);
                        } else {
                            self.arena.classes[class].destructor = Some(func);
                        }
                    }
                    if self.scopes.add_overload(class_scope, method.name, func).is_err() {
                        self.report(DiagKind::RedeclaredName(method.name), method.span);
                    }
                    declared.push((func, method));
                }
            }
        }
        for (func, method) in declared {
            if method.body.is_some() {
                self.elaborate_function_body(func, method)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn item_function(&mut self, decl: &ast::FunctionDecl) -> SemResult<()> {
        if !decl.generics.is_empty() {
            self.register_generic(
                decl.name,
                &decl.generics,
                GenericBody::Function(Rc::new(decl.clone())),
                decl.span,
            )?;
            return Ok(());
        }
        let Some(func) = self.declare_concrete_function(decl.name, decl, None)? else {
            return Ok(());
        };
        if self
            .scopes
            .add_overload(self.current_scope(), decl.name, func)
            .is_err()
        {
            self.report(DiagKind::RedeclaredName(decl.name), decl.span);
        }
        if decl.body.is_some() {
            self.elaborate_function_body(func, decl)?;
        }
        Ok(())
    }

    /// Build signature, SSA function, and arena record for a function.
    ///
    /// `owner_class` makes it a member: instance methods get `this`
    /// (pointer to the class) as parameter 0.
    pub(crate) fn declare_concrete_function(
        &mut self,
        ssa_name: Symbol,
        decl: &ast::FunctionDecl,
        owner_class: Option<ClassId>,
    ) -> SemResult<Option<FuncId>> {
        let mut params: Vec<Param> = Vec::new();
        let is_method = owner_class.is_some() && !decl.is_static;
        if let Some(class) = owner_class {
            if is_method {
                let class_ty = self.arena.classes[class].ty;
                let this_ty = self.arena.ptr_type(self.module, class_ty);
                params.push(Param {
                    name: Symbol::intern("this"),
                    ty: this_ty,
                });
            }
        }
        for param in &decl.params {
            let ty = self.resolve_type(&param.ty)?;
            params.push(Param {
                name: param.name,
                ty,
            });
        }
        let ret = match &decl.ret {
            Some(texpr) => self.resolve_type(texpr)?,
            None => self.arena.void_type,
        };

        let (sig, ty) = self
            .arena
            .make_signature(self.module, params, decl.variadic, is_method, ret);

        // Keep SSA names unique across overloads.
        let mut unique = ssa_name;
        let mut counter = 1;
        while self.module.find_function(unique.as_str()).is_some() {
            unique = Symbol::intern(&format!("{}.{}", ssa_name, counter));
            counter += 1;
        }

        let param_names: Vec<Symbol> = {
            let sig_ref = &self.arena.sigs[sig];
            let mut names = Vec::new();
            if sig_ref.is_sret {
                names.push(Symbol::intern("sret"));
            }
            names.extend(sig_ref.params.iter().map(|p| p.name));
            names
        };
        let ssa_ty = self.arena.sigs[sig].ssa;
        let ssa_func =
            self.module
                .add_function(unique, ssa_ty, param_names, decl.body.is_none());
        if self.arena.sigs[sig].is_sret {
            self.module.function_mut(ssa_func).sret = true;
        }

        let func = self.arena.funcs.push(FuncDef {
            name: decl.name,
            sig,
            ty,
            ssa: ssa_func,
            owner_class,
        });
        Ok(Some(func))
    }

    /// Elaborate a function body: frame, entry/exit blocks, parameter
    /// slots, statements, and the single-exit return protocol.
    pub(crate) fn elaborate_function_body(
        &mut self,
        func: FuncId,
        decl: &ast::FunctionDecl,
    ) -> SemResult<()> {
        let Some(body) = &decl.body else {
            return Ok(());
        };
        let def_sig = self.arena.funcs[func].sig;
        let ssa_func = self.arena.funcs[func].ssa;
        let sig = self.arena.sigs[def_sig].clone();

        let entry = {
            let builder = slatec_ssa::Builder::at_entry(self.module, ssa_func);
            builder.insert_block()
        };
        let exit_block = {
            let mut builder = slatec_ssa::Builder::at(self.module, ssa_func, entry);
            builder.new_basic_block("exit")
        };

        let is_void = matches!(self.arena.type_kind(sig.ret), TypeKind::Void);
        self.frames.push(FunctionFrame {
            func,
            ssa_func,
            block: entry,
            exit_block,
            ret_slot: None,
            ret_type: sig.ret,
            is_sret: sig.is_sret,
            param_offset: u32::from(sig.is_sret),
            loops: Vec::new(),
            scope_stack: Vec::new(),
        });

        let function_scope = self.enter_scope(ScopeOwner::Function(func));

        // Return slot: the hidden sret parameter, or a local alloca.
        if sig.is_sret {
            self.frame_mut().ret_slot = Some(slatec_ssa::ValueRef::Param(0));
        } else if !is_void && !self.arena.is_error(sig.ret) {
            let slot = self.alloc_slot(sig.ret, Symbol::intern("retval"));
            self.frame_mut().ret_slot = Some(slot);
        }

        // Parameters spill into slots so they are ordinary l-values;
        // `this` stays an immutable pointer.
        let offset = self.frame().param_offset;
        for (i, param) in sig.params.iter().enumerate() {
            let incoming = slatec_ssa::ValueRef::Param(i as u32 + offset);
            if sig.is_method && i == 0 {
                let mut value = Value::plain(param.name, param.ty, incoming);
                value.kind = ValueKind::Variable { is_const: true };
                let var = self.arena.vars.push(Variable {
                    name: param.name,
                    value,
                    is_const: true,
                    span: decl.span,
                });
                if self
                    .scopes
                    .insert(
                        function_scope,
                        param.name,
                        Binding::Entity(Entity::Var(var)),
                    )
                    .is_err()
                {
                    self.report(DiagKind::RedeclaredName(param.name), decl.span);
                }
                continue;
            }
            let slot = self.alloc_slot(param.ty, param.name);
            self.bld().store(incoming, slot);
            let mut value = Value::place(param.name, param.ty, slot);
            value.kind = ValueKind::Variable { is_const: false };
            self.declare_var(
                param.name,
                Variable {
                    name: param.name,
                    value,
                    is_const: false,
                    span: decl.span,
                },
                decl.span,
                true,
            );
        }

        let result: SemResult<()> = (|| {
            for stmt in &body.stmts {
                self.elaborate_stmt(stmt)?;
            }
            Ok(())
        })();

        // Fall-through: destructors, then branch to the exit block.
        if result.is_ok() {
            if !self.bld().is_terminated() {
                self.destroy_scope_locals(function_scope)?;
                let exit = self.frame().exit_block;
                self.bld().br(exit);
            }
            self.exit_scope()?;

            // Single exit: load and return the slot, or return void.
            self.set_block(exit_block);
            match (self.frame().ret_slot, sig.is_sret || is_void) {
                (Some(slot), false) => {
                    let ret_ssa = self.arena.ssa_type(sig.ret);
                    let loaded = self.bld().load(ret_ssa, slot);
                    self.bld().ret(Some(loaded));
                }
                _ => {
                    self.bld().ret(None);
                }
            }
        }
        self.frames.pop();
        result
    }

    // ------------------------------------------------------------------
    // Aliases and generics registration
    // ------------------------------------------------------------------

    fn item_alias(&mut self, decl: &ast::AliasDecl) -> SemResult<()> {
        if !decl.generics.is_empty() {
            self.register_generic(
                decl.name,
                &decl.generics,
                GenericBody::Alias(Rc::new(decl.clone())),
                decl.span,
            )?;
            return Ok(());
        }
        let Some(target) = self.resolve_alias_target(decl)? else {
            return Ok(());
        };
        let alias = self.arena.aliases.push(AliasDef {
            name: decl.name,
            target,
        });
        if self
            .scopes
            .insert(
                self.current_scope(),
                decl.name,
                Binding::Entity(Entity::Alias(alias)),
            )
            .is_err()
        {
            self.report(DiagKind::RedeclaredName(decl.name), decl.span);
        }
        Ok(())
    }

    /// Resolve what an alias refers to. Constant targets are restricted
    /// to literals.
    pub(crate) fn resolve_alias_target(
        &mut self,
        decl: &ast::AliasDecl,
    ) -> SemResult<Option<AliasTarget>> {
        match &decl.target {
            ast::AliasTarget::Type(texpr) => {
                // Alias-to-alias stays a link so the chain is observable;
                // everything else resolves to the type.
                if let ast::TypeExpr::Named(name) = texpr {
                    if name.generic_args.is_empty() && name.qualifiers.is_empty() {
                        if let Some((_, Binding::Entity(Entity::Alias(inner)))) =
                            self.scopes.lookup(self.current_scope(), name.name)
                        {
                            return Ok(Some(AliasTarget::Alias(*inner)));
                        }
                    }
                }
                let ty = self.resolve_type(texpr)?;
                Ok(Some(AliasTarget::Type(ty)))
            }
            ast::AliasTarget::Const(expr) => match expr {
                ast::Expr::Literal(lit) => {
                    let value = self.literal_const_value(lit);
                    Ok(Some(AliasTarget::Const(value)))
                }
                other => {
                    self.report(
                        DiagKind::TypeMismatch {
                            expected: "literal constant".to_string(),
                            found: "expression".to_string(),
                        },
                        other.span(),
                    );
                    Ok(None)
                }
            },
        }
    }

    /// Register a generic declaration (class, function, or alias).
    pub(crate) fn register_generic(
        &mut self,
        name: Symbol,
        generics: &[ast::GenericParamDecl],
        body: GenericBody,
        span: Span,
    ) -> SemResult<crate::entity::GenericId> {
        let mut params = Vec::with_capacity(generics.len());
        for g in generics {
            let kind = match &g.kind {
                ast::GenericParamKind::Type => GenericParamKind::Type,
                ast::GenericParamKind::Const(texpr) => {
                    GenericParamKind::Const(self.resolve_type(texpr)?)
                }
            };
            params.push(GenericParam { name: g.name, kind });
        }
        let generic = self.arena.generics.push(GenericDef {
            name,
            params,
            body,
            defining_scope: self.current_scope(),
            children: Vec::new(),
        });
        if self
            .scopes
            .insert(
                self.current_scope(),
                name,
                Binding::Entity(Entity::Generic(generic)),
            )
            .is_err()
        {
            self.report(DiagKind::RedeclaredName(name), span);
        }
        Ok(generic)
    }
}
