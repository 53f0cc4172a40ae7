//! Syntax-tree construction helpers for the end-to-end tests.
//!
//! The parser is an external collaborator, so tests assemble the trees
//! it would produce by hand.

use slatec_ast as ast;
use slatec_util::{FileId, Span, Symbol};

pub fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

pub fn named(s: &str) -> ast::TypeExpr {
    ast::TypeExpr::Named(ast::ScopedName::plain(sym(s), Span::DUMMY))
}

pub fn ptr_to(t: ast::TypeExpr) -> ast::TypeExpr {
    ast::TypeExpr::Pointer {
        pointee: Box::new(t),
        is_const: false,
        span: Span::DUMMY,
    }
}

pub fn int(v: i64) -> ast::Expr {
    ast::Expr::Literal(ast::Literal {
        kind: ast::LitKind::Int(v),
        span: Span::DUMMY,
    })
}

pub fn boolean(v: bool) -> ast::Expr {
    ast::Expr::Literal(ast::Literal {
        kind: ast::LitKind::Bool(v),
        span: Span::DUMMY,
    })
}

pub fn name(s: &str) -> ast::Expr {
    ast::Expr::Name(ast::ScopedName::plain(sym(s), Span::DUMMY))
}

pub fn generic_name_expr(s: &str, args: Vec<ast::GenericArg>) -> ast::Expr {
    ast::Expr::Name(ast::ScopedName {
        qualifiers: Vec::new(),
        name: sym(s),
        generic_args: args,
        span: Span::DUMMY,
    })
}

pub fn call(callee: ast::Expr, args: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::Call(ast::CallExpr {
        callee: Box::new(callee),
        args,
        span: Span::DUMMY,
    })
}

pub fn binary(op: ast::BinaryOp, lhs: ast::Expr, rhs: ast::Expr) -> ast::Expr {
    ast::Expr::Binary(ast::BinaryExpr {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span: Span::DUMMY,
    })
}

pub fn unary(op: ast::UnaryOp, operand: ast::Expr) -> ast::Expr {
    ast::Expr::Unary(ast::UnaryExpr {
        op,
        operand: Box::new(operand),
        span: Span::DUMMY,
    })
}

pub fn member(base: ast::Expr, field: &str) -> ast::Expr {
    ast::Expr::Member(ast::MemberExpr {
        base: Box::new(base),
        member: sym(field),
        arrow: false,
        span: Span::DUMMY,
    })
}

pub fn cast(operand: ast::Expr, target: ast::TypeExpr) -> ast::Expr {
    ast::Expr::Cast(ast::CastExpr {
        operand: Box::new(operand),
        target,
        span: Span::DUMMY,
    })
}

pub fn class_init(class: &str, fields: Vec<(&str, ast::Expr)>) -> ast::Expr {
    ast::Expr::ClassInit(ast::ClassInitExpr {
        class: ast::ScopedName::plain(sym(class), Span::DUMMY),
        fields: fields
            .into_iter()
            .map(|(name, value)| ast::FieldInit {
                name: sym(name),
                value,
                span: Span::DUMMY,
            })
            .collect(),
        span: Span::DUMMY,
    })
}

pub fn let_stmt(name: &str, ty: Option<ast::TypeExpr>, init: Option<ast::Expr>) -> ast::Stmt {
    ast::Stmt::Let(ast::LetStmt {
        name: sym(name),
        ty,
        init,
        is_const: false,
        span: Span::DUMMY,
    })
}

pub fn assign(target: ast::Expr, value: ast::Expr) -> ast::Stmt {
    ast::Stmt::Expr(ast::Expr::Assign(ast::AssignExpr {
        op: None,
        target: Box::new(target),
        value: Box::new(value),
        span: Span::DUMMY,
    }))
}

pub fn expr_stmt(expr: ast::Expr) -> ast::Stmt {
    ast::Stmt::Expr(expr)
}

pub fn ret(expr: Option<ast::Expr>) -> ast::Stmt {
    ast::Stmt::Return(expr, Span::DUMMY)
}

pub fn block(stmts: Vec<ast::Stmt>) -> ast::Block {
    ast::Block {
        stmts,
        span: Span::DUMMY,
    }
}

pub fn function(
    name: &str,
    params: Vec<(&str, ast::TypeExpr)>,
    ret_ty: Option<ast::TypeExpr>,
    body: Vec<ast::Stmt>,
) -> ast::FunctionDecl {
    ast::FunctionDecl {
        name: sym(name),
        generics: Vec::new(),
        params: params
            .into_iter()
            .map(|(name, ty)| ast::ParamDecl {
                name: sym(name),
                ty,
                span: Span::DUMMY,
            })
            .collect(),
        variadic: false,
        ret: ret_ty,
        body: Some(block(body)),
        is_static: false,
        span: Span::DUMMY,
    }
}

pub fn generic_function(
    name: &str,
    generics: Vec<&str>,
    params: Vec<(&str, ast::TypeExpr)>,
    ret_ty: Option<ast::TypeExpr>,
    body: Vec<ast::Stmt>,
) -> ast::FunctionDecl {
    let mut decl = function(name, params, ret_ty, body);
    decl.generics = generics
        .into_iter()
        .map(|g| ast::GenericParamDecl {
            name: sym(g),
            kind: ast::GenericParamKind::Type,
            span: Span::DUMMY,
        })
        .collect();
    decl
}

pub fn property(name: &str, ty: ast::TypeExpr) -> ast::ClassMember {
    ast::ClassMember::Property(ast::PropertyDecl {
        name: sym(name),
        ty,
        span: Span::DUMMY,
    })
}

pub fn method(decl: ast::FunctionDecl) -> ast::ClassMember {
    ast::ClassMember::Method(decl)
}

pub fn class(name: &str, parents: Vec<&str>, members: Vec<ast::ClassMember>) -> ast::ClassDecl {
    ast::ClassDecl {
        name: sym(name),
        generics: Vec::new(),
        parents: parents
            .into_iter()
            .map(|p| ast::ScopedName::plain(sym(p), Span::DUMMY))
            .collect(),
        members,
        span: Span::DUMMY,
    }
}

pub fn unit(items: Vec<ast::Item>) -> ast::Unit {
    ast::Unit {
        file: FileId(0),
        items,
    }
}
