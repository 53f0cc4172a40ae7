//! Deterministic text emission.
//!
//! [`Module::emit`] renders the module as stable text: functions in id
//! order, blocks in id order, instructions numbered by their table index.
//! Elaborating the same syntax tree twice produces the same ids and hence
//! byte-identical output, which is what the driver's reproducibility
//! guarantee rests on.

use std::fmt::Write;

use crate::module::{
    Const, Function, GlobalInit, InstKind, Module, ValueRef,
};
use crate::ty::{TyId, TyKind};

impl Module {
    /// Render the whole module as text.
    pub fn emit(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; module '{}'", self.name);

        for (_, global) in self.globals.iter_enumerated() {
            let _ = write!(out, "@{} = private constant {}", global.name, self.ty(global.ty));
            match &global.init {
                GlobalInit::Bytes(bytes) => {
                    let _ = write!(out, " c\"");
                    for &b in bytes {
                        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
                            out.push(b as char);
                        } else {
                            let _ = write!(out, "\\{b:02x}");
                        }
                    }
                    let _ = writeln!(out, "\"");
                }
                GlobalInit::Zero => {
                    let _ = writeln!(out, " zeroinitializer");
                }
            }
        }

        for (_, function) in self.functions.iter_enumerated() {
            out.push('\n');
            self.emit_function(&mut out, function);
        }
        out
    }

    fn emit_function(&self, out: &mut String, function: &Function) {
        let (params, ret, variadic) = match self.types.kind(function.ty) {
            TyKind::Fn {
                params,
                ret,
                variadic,
            } => (params.clone(), *ret, *variadic),
            _ => (Vec::new(), function.ty, false),
        };

        let keyword = if function.is_declaration {
            "declare"
        } else {
            "define"
        };
        let _ = write!(out, "{keyword} {} @{}(", self.ty(ret), function.name);
        for (i, param_ty) in params.iter().enumerate() {
            if i > 0 {
                let _ = write!(out, ", ");
            }
            let sret = if function.sret && i == 0 { "sret " } else { "" };
            let name = function
                .params
                .get(i)
                .map(|s| s.as_str())
                .unwrap_or("arg");
            let _ = write!(out, "{sret}{} %{name}{i}", self.ty(*param_ty));
        }
        if variadic {
            if !params.is_empty() {
                let _ = write!(out, ", ");
            }
            let _ = write!(out, "...");
        }

        if function.is_declaration {
            let _ = writeln!(out, ")");
            return;
        }

        let _ = writeln!(out, ") {{");
        for (bb, block) in function.blocks.iter_enumerated() {
            let _ = writeln!(out, "bb{}: ; {}", bb.0, block.label);
            for &inst_id in &block.insts {
                let inst = &function.insts[inst_id];
                let _ = write!(out, "  ");
                if !matches!(self.types.kind(inst.ty), TyKind::Void) {
                    let _ = write!(out, "%{} = ", inst_id.0);
                }
                self.emit_inst(out, function, &inst.kind, inst.ty);
                out.push('\n');
            }
        }
        let _ = writeln!(out, "}}");
    }

    fn emit_inst(&self, out: &mut String, function: &Function, kind: &InstKind, ty: TyId) {
        match kind {
            InstKind::Alloca { allocated, name } => {
                let _ = write!(out, "alloca {} ; {}", self.ty(*allocated), name);
            }
            InstKind::Load { ptr } => {
                let _ = write!(out, "load {}, {}", self.ty(ty), self.val(function, *ptr));
            }
            InstKind::Store { value, ptr } => {
                let _ = write!(
                    out,
                    "store {}, {}",
                    self.val(function, *value),
                    self.val(function, *ptr)
                );
            }
            InstKind::Gep {
                pointee,
                ptr,
                indices,
            } => {
                let _ = write!(
                    out,
                    "getelementptr {}, {}",
                    self.ty(*pointee),
                    self.val(function, *ptr)
                );
                for index in indices {
                    let _ = write!(out, ", {}", self.val(function, *index));
                }
            }
            InstKind::Bin { op, lhs, rhs } => {
                let _ = write!(
                    out,
                    "{} {}, {}",
                    op.mnemonic(),
                    self.val(function, *lhs),
                    self.val(function, *rhs)
                );
            }
            InstKind::Icmp { pred, lhs, rhs } => {
                let _ = write!(
                    out,
                    "icmp {} {}, {}",
                    pred.mnemonic(),
                    self.val(function, *lhs),
                    self.val(function, *rhs)
                );
            }
            InstKind::Fcmp { pred, lhs, rhs } => {
                let _ = write!(
                    out,
                    "fcmp {} {}, {}",
                    pred.mnemonic(),
                    self.val(function, *lhs),
                    self.val(function, *rhs)
                );
            }
            InstKind::Cast { op, value } => {
                let _ = write!(
                    out,
                    "{} {} to {}",
                    op.mnemonic(),
                    self.val(function, *value),
                    self.ty(ty)
                );
            }
            InstKind::Call {
                callee,
                args,
                sret,
                ..
            } => {
                let _ = write!(out, "call {} {}(", self.ty(ty), self.val(function, *callee));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, ", ");
                    }
                    if *sret && i == 0 {
                        let _ = write!(out, "sret ");
                    }
                    let _ = write!(out, "{}", self.val(function, *arg));
                }
                let _ = write!(out, ")");
            }
            InstKind::Phi { incomings } => {
                let _ = write!(out, "phi {} ", self.ty(ty));
                for (i, (value, block)) in incomings.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, ", ");
                    }
                    let _ = write!(out, "[ {}, bb{} ]", self.val(function, *value), block.0);
                }
            }
            InstKind::InlineAsm {
                template,
                constraints,
                inputs,
            } => {
                let _ = write!(out, "asm {template:?}, {constraints:?}(");
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, ", ");
                    }
                    let _ = write!(out, "{}", self.val(function, *input));
                }
                let _ = write!(out, ")");
            }
            InstKind::Br { target } => {
                let _ = write!(out, "br bb{}", target.0);
            }
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                let _ = write!(
                    out,
                    "br {}, bb{}, bb{}",
                    self.val(function, *cond),
                    then_block.0,
                    else_block.0
                );
            }
            InstKind::Ret { value } => match value {
                Some(value) => {
                    let _ = write!(out, "ret {}", self.val(function, *value));
                }
                None => {
                    let _ = write!(out, "ret void");
                }
            },
            InstKind::Unreachable => {
                let _ = write!(out, "unreachable");
            }
        }
    }

    fn val(&self, function: &Function, value: ValueRef) -> String {
        match value {
            ValueRef::Const(c) => self.constant(c),
            ValueRef::Inst(id) => format!("%{}", id.0),
            ValueRef::Param(i) => {
                let name = function
                    .params
                    .get(i as usize)
                    .map(|s| s.as_str())
                    .unwrap_or("arg");
                format!("%{name}{i}")
            }
            ValueRef::Func(id) => format!("@{}", self.functions[id].name),
            ValueRef::Global(id) => format!("@{}", self.globals[id].name),
        }
    }

    fn constant(&self, c: Const) -> String {
        match c {
            Const::Int { bits, value } => {
                format!("i{bits} {}", crate::module::sign_extend(value, bits))
            }
            Const::Float { bits, value } => format!("f{bits} {value:?}"),
            Const::Null { .. } => "null".to_string(),
            Const::Zero { ty } => format!("{} zeroinitializer", self.ty(ty)),
        }
    }

    fn ty(&self, ty: TyId) -> String {
        match self.types.kind(ty) {
            TyKind::Void => "void".to_string(),
            TyKind::Int { bits } => format!("i{bits}"),
            TyKind::Float { bits } => format!("f{bits}"),
            TyKind::Ptr(pointee) => format!("{}*", self.ty(*pointee)),
            TyKind::Array { elem, len } => format!("[{len} x {}]", self.ty(*elem)),
            TyKind::Struct { name } => format!("%{name}"),
            TyKind::Fn {
                params,
                ret,
                variadic,
            } => {
                let mut s = format!("{} (", self.ty(*ret));
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    s.push_str(&self.ty(*p));
                }
                if *variadic {
                    if !params.is_empty() {
                        s.push_str(", ");
                    }
                    s.push_str("...");
                }
                s.push(')');
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::layout::DataLayout;
    use crate::module::BinOp;
    use slatec_util::Symbol;

    fn sample_module() -> Module {
        let mut module = Module::new("sample", DataLayout::default());
        let i32_ty = module.types.int(32);
        let fn_ty = module.types.fn_type(vec![i32_ty], i32_ty, false);
        let func = module.add_function(
            Symbol::intern("double"),
            fn_ty,
            vec![Symbol::intern("x")],
            false,
        );

        let mut b = Builder::at_entry(&mut module, func);
        let two = b.const_int(32, 2);
        let doubled = b.bin(BinOp::Mul, i32_ty, ValueRef::Param(0), two);
        b.ret(Some(doubled));
        module
    }

    #[test]
    fn emit_contains_structure() {
        let text = sample_module().emit();
        assert!(text.contains("define i32 @double(i32 %x0)"));
        assert!(text.contains("mul %x0, i32 2"));
        assert!(text.contains("ret %0"));
    }

    #[test]
    fn emit_is_deterministic() {
        assert_eq!(sample_module().emit(), sample_module().emit());
    }

    #[test]
    fn negative_constants_print_signed() {
        let module = Module::new("m", DataLayout::default());
        let c = Const::int(32, (-5i64) as u64);
        assert_eq!(module.constant(c), "i32 -5");
    }
}
