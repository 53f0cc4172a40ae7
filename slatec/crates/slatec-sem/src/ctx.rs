//! The generation context threaded through elaboration.
//!
//! [`GenCtx`] owns the entity arena and the scope tree, borrows the SSA
//! module and the diagnostic handler, and keeps the stack of function
//! frames. A frame tracks the insertion block, the single exit block, the
//! return slot, the loop exit stack, and the lexical scopes to unwind;
//! every path out of a scope (fall-through, `break`, `return`) releases
//! them in LIFO order.

use rustc_hash::FxHashMap;
use slatec_util::{Diagnostic, Handler, Span, Symbol};

use crate::entity::{Entity, EntityArena, FuncId, VarId, Variable};
use crate::error::{DiagKind, Fatal, SemResult};
use crate::scope::{Binding, ScopeId, ScopeOwner, ScopeTree};
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

/// One `break` target.
pub struct LoopFrame {
    pub exit: slatec_ssa::BlockId,
    /// Length of the frame's scope stack when the loop was entered;
    /// `break` unwinds everything above it.
    pub scope_depth: usize,
}

/// Per-function elaboration state.
pub struct FunctionFrame {
    pub func: FuncId,
    pub ssa_func: slatec_ssa::FuncId,
    /// Current insertion block.
    pub block: slatec_ssa::BlockId,
    /// The function's single exit block.
    pub exit_block: slatec_ssa::BlockId,
    /// Where `return` stores its value: an alloca, or the hidden sret
    /// parameter. `None` for `void`.
    pub ret_slot: Option<slatec_ssa::ValueRef>,
    pub ret_type: TypeId,
    pub is_sret: bool,
    /// SSA parameter index of semantic parameter 0 (1 when sret).
    pub param_offset: u32,
    pub loops: Vec<LoopFrame>,
    /// Lexical scopes entered inside this function, outermost first.
    pub scope_stack: Vec<ScopeId>,
}

/// The mutable context of one compilation.
pub struct GenCtx<'a> {
    pub module: &'a mut slatec_ssa::Module,
    pub handler: &'a Handler,
    pub arena: EntityArena,
    pub scopes: ScopeTree,
    /// The scope new declarations land in.
    pub scope_cursor: ScopeId,
    pub frames: Vec<FunctionFrame>,
    pub(crate) generic_depth: usize,
    string_globals: FxHashMap<Symbol, slatec_ssa::GlobalId>,
}

impl<'a> GenCtx<'a> {
    pub fn new(module: &'a mut slatec_ssa::Module, handler: &'a Handler) -> Self {
        let arena = EntityArena::new(module);
        let scopes = ScopeTree::new();
        let root = scopes.root;
        let mut ctx = Self {
            module,
            handler,
            arena,
            scopes,
            scope_cursor: root,
            frames: Vec::new(),
            generic_depth: 0,
            string_globals: FxHashMap::default(),
        };
        ctx.install_builtins();
        ctx
    }

    /// Bind the builtin type names in the root scope.
    fn install_builtins(&mut self) {
        let root = self.scopes.root;
        let mut bind = |ctx: &mut Self, name: &str, ty: TypeId| {
            ctx.scopes
                .insert(root, Symbol::intern(name), Binding::Entity(Entity::Type(ty)))
                .expect("builtin bound twice");
        };

        let void = self.arena.void_type;
        let boolean = self.arena.bool_type;
        bind(self, "void", void);
        bind(self, "bool", boolean);
        for bits in [8u32, 16, 32, 64] {
            let signed = self.arena.int_type(self.module, bits, true);
            bind(self, &format!("i{bits}"), signed);
            let unsigned = self.arena.int_type(self.module, bits, false);
            bind(self, &format!("u{bits}"), unsigned);
        }
        for bits in [32u32, 64] {
            let float = self.arena.float_type(self.module, bits);
            bind(self, &format!("f{bits}"), float);
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Record a recoverable diagnostic.
    pub fn report(&self, kind: DiagKind, span: Span) {
        debug_assert!(!kind.is_fatal());
        self.handler
            .emit(Diagnostic::error(kind.to_string(), span).with_code(kind.code()));
    }

    /// Record a fatal diagnostic and produce the abort marker.
    pub fn fatal(&self, kind: DiagKind, span: Span) -> Fatal {
        self.handler
            .emit(Diagnostic::error(kind.to_string(), span).with_code(kind.code()));
        Fatal::new(match kind {
            DiagKind::GenericInstantiationCycle(_) => "generic instantiation cycle",
            _ => "internal invariant violated",
        })
    }

    /// A poisoned value: error-typed, suppresses cascading diagnostics.
    pub fn poison(&self) -> Value {
        Value::constant(
            Symbol::intern("<error>"),
            self.arena.error_type,
            slatec_ssa::Const::int(32, 0),
        )
    }

    /// True if the value is poisoned; operations on poisoned operands
    /// return poison without reporting again.
    pub fn is_poisoned(&self, value: &Value) -> bool {
        self.arena.is_error(value.ty)
    }

    // ------------------------------------------------------------------
    // Frames and builders
    // ------------------------------------------------------------------

    pub fn frame(&self) -> &FunctionFrame {
        self.frames.last().expect("no active function frame")
    }

    pub fn frame_mut(&mut self) -> &mut FunctionFrame {
        self.frames.last_mut().expect("no active function frame")
    }

    /// A builder positioned at the frame's insertion block.
    pub fn bld(&mut self) -> slatec_ssa::Builder<'_> {
        let frame = self.frames.last().expect("no active function frame");
        slatec_ssa::Builder::at(self.module, frame.ssa_func, frame.block)
    }

    /// Move the frame's insertion point.
    pub fn set_block(&mut self, block: slatec_ssa::BlockId) {
        self.frame_mut().block = block;
    }

    /// Allocate a stack slot in the current function.
    pub fn alloc_slot(&mut self, ty: TypeId, name: Symbol) -> slatec_ssa::ValueRef {
        let ssa_ty = self.arena.ssa_type(ty);
        self.bld().alloca(ssa_ty, name)
    }

    // ------------------------------------------------------------------
    // Scope lifecycle
    // ------------------------------------------------------------------

    pub fn current_scope(&self) -> ScopeId {
        self.scope_cursor
    }

    /// Enter a child scope of the current one.
    pub fn enter_scope(&mut self, owner: ScopeOwner) -> ScopeId {
        let scope = self.scopes.push(self.scope_cursor, owner);
        self.scope_cursor = scope;
        if let Some(frame) = self.frames.last_mut() {
            frame.scope_stack.push(scope);
        }
        scope
    }

    /// Enter an existing scope (class scope, generic child scope).
    pub fn enter_existing_scope(&mut self, scope: ScopeId) -> ScopeId {
        let previous = self.scope_cursor;
        self.scope_cursor = scope;
        previous
    }

    /// Restore the cursor saved by [`GenCtx::enter_existing_scope`].
    pub fn restore_scope(&mut self, scope: ScopeId) {
        self.scope_cursor = scope;
    }

    /// Leave the current scope: run destructors in reverse declaration
    /// order (unless control already left the block) and pop.
    pub fn exit_scope(&mut self) -> SemResult<()> {
        let scope = self.scope_cursor;
        if !self.frames.is_empty() && !self.bld().is_terminated() {
            self.destroy_scope_locals(scope)?;
        }
        if let Some(frame) = self.frames.last_mut() {
            debug_assert_eq!(frame.scope_stack.last(), Some(&scope));
            frame.scope_stack.pop();
        }
        self.scope_cursor = self
            .scopes
            .get(scope)
            .parent
            .expect("exited the root scope");
        Ok(())
    }

    /// Emit destructor calls for one scope, last declaration first.
    pub fn destroy_scope_locals(&mut self, scope: ScopeId) -> SemResult<()> {
        let locals: Vec<VarId> = self.scopes.get(scope).locals.clone();
        for var in locals.into_iter().rev() {
            let value = self.arena.vars[var].value.clone();
            let Some(class) = self.arena.class_of(value.ty) else {
                continue;
            };
            let Some(dtor) = self.arena.classes[class].destructor else {
                continue;
            };
            self.emit_direct_call(dtor, vec![value.ssa]);
        }
        Ok(())
    }

    /// Unwind every scope of the current frame (for `return`): reverse
    /// order per scope, outermost last across scopes.
    pub fn unwind_for_return(&mut self) -> SemResult<()> {
        let stack = self.frame().scope_stack.clone();
        for scope in stack.into_iter().rev() {
            self.destroy_scope_locals(scope)?;
        }
        Ok(())
    }

    /// Unwind the scopes entered since the given loop frame (for
    /// `break`).
    pub fn unwind_for_break(&mut self, scope_depth: usize) -> SemResult<()> {
        let stack: Vec<ScopeId> = self.frame().scope_stack[scope_depth..].to_vec();
        for scope in stack.into_iter().rev() {
            self.destroy_scope_locals(scope)?;
        }
        Ok(())
    }

    /// Call a known function with raw SSA arguments (destructor calls and
    /// other synthesized calls that need no conversions).
    pub fn emit_direct_call(&mut self, func: FuncId, args: Vec<slatec_ssa::ValueRef>) {
        let def = &self.arena.funcs[func];
        let signature = self.arena.sigs[def.sig].ssa;
        let callee = slatec_ssa::ValueRef::Func(def.ssa);
        self.bld().call(callee, signature, args, false);
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Register a variable in the arena and the current scope.
    ///
    /// `bind` controls whether the name becomes visible; constructed
    /// temporaries are tracked for destruction without a binding.
    pub fn declare_var(
        &mut self,
        name: Symbol,
        variable: Variable,
        span: Span,
        bind: bool,
    ) -> VarId {
        let var = self.arena.vars.push(variable);
        let scope = self.scope_cursor;
        self.scopes.get_mut(scope).locals.push(var);
        if bind {
            if self
                .scopes
                .insert(scope, name, Binding::Entity(Entity::Var(var)))
                .is_err()
            {
                self.report(DiagKind::RedeclaredName(name), span);
            }
        }
        var
    }

    // ------------------------------------------------------------------
    // String literals
    // ------------------------------------------------------------------

    /// Lower a string literal to a private byte global and return an
    /// `i8*` into it. Identical literals share one global.
    pub fn string_literal(&mut self, text: Symbol) -> Value {
        let global = match self.string_globals.get(&text) {
            Some(&g) => g,
            None => {
                let name = Symbol::intern(&format!("str{}", self.string_globals.len()));
                let mut bytes = text.as_str().as_bytes().to_vec();
                bytes.push(0);
                let g = self.module.add_global_bytes(name, bytes);
                self.string_globals.insert(text, g);
                g
            }
        };
        let array_ty = self.module.globals[global].ty;
        let u8t = self.arena.int_type(self.module, 8, false);
        let ptr_sem = self.arena.ptr_type(self.module, u8t);
        let u8_ssa = self.arena.ssa_type(u8t);
        let result_ty = self.module.types.ptr(u8_ssa);

        let zero = slatec_ssa::ValueRef::Const(slatec_ssa::Const::int(32, 0));
        let ptr = self.bld().gep(
            array_ty,
            slatec_ssa::ValueRef::Global(global),
            vec![zero, zero],
            result_ty,
        );
        Value::plain(text, ptr_sem, ptr)
    }

    /// Build a literal value in the constant domain. String literals get
    /// a byte global and need no insertion point, so this also serves
    /// alias targets and generic arguments outside any function.
    pub fn literal_const_value(&mut self, lit: &slatec_ast::Literal) -> Value {
        match &lit.kind {
            slatec_ast::LitKind::Int(v) => {
                let ty = self.arena.int_type(self.module, 32, true);
                Value::constant(
                    Symbol::intern("int"),
                    ty,
                    slatec_ssa::Const::int(32, *v as u64),
                )
            }
            slatec_ast::LitKind::Float(f) => {
                let ty = self.arena.float_type(self.module, 64);
                Value::constant(
                    Symbol::intern("float"),
                    ty,
                    slatec_ssa::Const::Float {
                        bits: 64,
                        value: *f,
                    },
                )
            }
            slatec_ast::LitKind::Bool(b) => self.bool_const(*b),
            slatec_ast::LitKind::Char(c) => {
                let ty = self.arena.int_type(self.module, 8, false);
                Value::constant(
                    Symbol::intern("char"),
                    ty,
                    slatec_ssa::Const::int(8, u64::from(*c)),
                )
            }
            slatec_ast::LitKind::Null => {
                let u8t = self.arena.int_type(self.module, 8, false);
                let ty = self.arena.ptr_type(self.module, u8t);
                let ssa_ty = self.arena.ssa_type(ty);
                Value::constant(
                    Symbol::intern("null"),
                    ty,
                    slatec_ssa::Const::Null { ty: ssa_ty },
                )
            }
            slatec_ast::LitKind::Str(text) => {
                // Address of a private byte global; usable without a
                // builder.
                let name = Symbol::intern(&format!("cstr{}", self.module.globals.len()));
                let mut bytes = text.as_str().as_bytes().to_vec();
                bytes.push(0);
                let global = self.module.add_global_bytes(name, bytes);
                let u8t = self.arena.int_type(self.module, 8, false);
                let ty = self.arena.ptr_type(self.module, u8t);
                Value::plain(*text, ty, slatec_ssa::ValueRef::Global(global))
            }
        }
    }

    // ------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------

    /// The boolean-typed `true`/`false` constant.
    pub fn bool_const(&self, value: bool) -> Value {
        Value::constant(
            Symbol::intern(if value { "true" } else { "false" }),
            self.arena.bool_type,
            slatec_ssa::Const::int(1, u64::from(value)),
        )
    }

    /// Whether the type has (or inherits nothing that changes this) a
    /// class kind; used for member dispatch.
    pub fn type_is_class(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.type_kind(self.arena.strip_refs(ty)),
            TypeKind::Class(_)
        )
    }
}
