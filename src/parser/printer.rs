//! AST 的缩进式打印器，供 `ecc debug` 模式输出诊断视图。
//! 只求可读，不求可重解析。

use super::ast::*;
use std::fmt::Write;

/// 把整个程序打印为缩进文本。
pub fn print_program(prog: &Program) -> String {
    let mut out = String::new();
    writeln!(out, "Program ({} decls)", prog.decls.len()).ok();
    for d in &prog.decls {
        print_decl(&mut out, d, 2);
    }
    out
}

fn pad(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push(' ');
    }
}

fn print_decl(out: &mut String, d: &Decl, indent: usize) {
    pad(out, indent);
    match d {
        Decl::Package(name) => {
            writeln!(out, "PackageDecl {}", name).ok();
        }
        Decl::Import { path, alias, .. } => match alias {
            Some(a) => {
                writeln!(out, "ImportDecl {} as {}", path, a).ok();
            }
            None => {
                writeln!(out, "ImportDecl {}", path).ok();
            }
        },
        Decl::Struct(sd) => print_struct(out, sd, indent),
        Decl::Func(fd) => {
            let recv = fd
                .receiver
                .as_ref()
                .map(|r| format!("{}.", r))
                .unwrap_or_default();
            writeln!(
                out,
                "FuncDecl {}{}{} ({} params){}",
                if fd.is_pub { "pub " } else { "" },
                recv,
                fd.name,
                fd.params.len(),
                fd.ret_type
                    .as_ref()
                    .map(|t| format!(" -> {}", type_str(t)))
                    .unwrap_or_default(),
            )
            .ok();
            for p in &fd.params {
                pad(out, indent + 2);
                writeln!(
                    out,
                    "Param {} {}{}",
                    p.name,
                    type_str(&p.ty),
                    if p.variadic { " ..." } else { "" }
                )
                .ok();
            }
            print_block(out, &fd.body, indent + 2);
        }
        Decl::Stmt(s) => {
            writeln!(out, "StmtDecl").ok();
            print_stmt(out, s, indent + 2);
        }
    }
}

fn print_struct(out: &mut String, sd: &StructDecl, indent: usize) {
    writeln!(
        out,
        "StructDecl {}{}",
        if sd.is_pub { "pub " } else { "" },
        if sd.name.is_empty() { "<inline>" } else { sd.name.as_str() }
    )
    .ok();
    for f in &sd.fields {
        pad(out, indent + 2);
        match (&f.ty, &f.inline_struct) {
            (Some(t), _) => {
                writeln!(out, "Field {} {}", f.name, type_str(t)).ok();
            }
            (None, Some(inner)) => {
                writeln!(out, "Field {} struct", f.name).ok();
                pad(out, indent + 4);
                print_struct(out, inner, indent + 4);
            }
            (None, None) => {
                writeln!(out, "Field {} <missing type>", f.name).ok();
            }
        }
    }
}

fn print_block(out: &mut String, blk: &Block, indent: usize) {
    pad(out, indent);
    writeln!(out, "Block ({} stmts)", blk.stmts.len()).ok();
    for s in &blk.stmts {
        print_stmt(out, s, indent + 2);
    }
}

fn print_stmt(out: &mut String, s: &Stmt, indent: usize) {
    pad(out, indent);
    match s {
        Stmt::Expr(e) => {
            writeln!(out, "ExprStmt {}", expr_str(e)).ok();
        }
        Stmt::Return(Some(e)) => {
            writeln!(out, "ReturnStmt {}", expr_str(e)).ok();
        }
        Stmt::Return(None) => {
            writeln!(out, "ReturnStmt").ok();
        }
        Stmt::VarDecl { name, ty, init } => {
            writeln!(
                out,
                "VarDecl {}{}{}",
                name,
                ty.as_ref()
                    .map(|t| format!(" : {}", type_str(t)))
                    .unwrap_or_default(),
                init.as_ref()
                    .map(|e| format!(" = {}", expr_str(e)))
                    .unwrap_or_default()
            )
            .ok();
        }
        Stmt::Assign { target, value } => {
            writeln!(out, "AssignStmt {} = {}", expr_str(target), expr_str(value)).ok();
        }
        Stmt::Block(b) => {
            writeln!(out, "BlockStmt").ok();
            for inner in &b.stmts {
                print_stmt(out, inner, indent + 2);
            }
        }
        Stmt::If {
            cond,
            then_blk,
            else_blk,
        } => {
            writeln!(out, "IfStmt {}", expr_str(cond)).ok();
            print_block(out, then_blk, indent + 2);
            if let Some(e) = else_blk {
                pad(out, indent);
                writeln!(out, "Else").ok();
                print_block(out, e, indent + 2);
            }
        }
        Stmt::ForIn {
            var, iterable, body, ..
        } => {
            writeln!(out, "ForInStmt {} in {}", var, expr_str(iterable)).ok();
            print_block(out, body, indent + 2);
        }
        Stmt::For { body } => {
            writeln!(out, "ForStmt").ok();
            print_block(out, body, indent + 2);
        }
        Stmt::ForC {
            init,
            cond,
            post,
            body,
        } => {
            writeln!(
                out,
                "ForCStyleStmt cond={}",
                cond.as_ref().map(expr_str).unwrap_or_else(|| "<true>".into())
            )
            .ok();
            if let Some(i) = init {
                print_stmt(out, i, indent + 2);
            }
            if let Some(p) = post {
                pad(out, indent + 2);
                writeln!(out, "Post {}", expr_str(p)).ok();
            }
            print_block(out, body, indent + 2);
        }
        Stmt::Break => {
            writeln!(out, "BreakStmt").ok();
        }
        Stmt::Continue => {
            writeln!(out, "ContinueStmt").ok();
        }
    }
}

pub fn type_str(t: &Type) -> String {
    match t {
        Type::Named(n) => n.clone(),
        Type::Pointer(inner) => format!("*{}", type_str(inner)),
        Type::Array { elem, .. } => format!("[]{}", type_str(elem)),
        Type::Func { params, ret } => {
            let ps: Vec<String> = params.iter().map(type_str).collect();
            format!(
                "fn({}){}",
                ps.join(", "),
                ret.as_ref()
                    .map(|r| format!(" {}", type_str(r)))
                    .unwrap_or_default()
            )
        }
    }
}

pub fn expr_str(e: &Expr) -> String {
    match e {
        Expr::Ident(n) => n.clone(),
        Expr::Literal { raw, .. } => {
            if raw.is_empty() {
                "<error>".to_string()
            } else {
                raw.clone()
            }
        }
        Expr::Unary { op, rhs } => format!("({}{})", op, expr_str(rhs)),
        Expr::Binary { op, left, right } => {
            format!("({} {} {})", expr_str(left), op, expr_str(right))
        }
        Expr::Call { callee, args } => {
            let a: Vec<String> = args.iter().map(expr_str).collect();
            format!("{}({})", expr_str(callee), a.join(", "))
        }
        Expr::Member { object, member } => format!("{}.{}", expr_str(object), member),
        Expr::Index { collection, index } => {
            format!("{}[{}]", expr_str(collection), expr_str(index))
        }
        Expr::Postfix { op, lhs } => format!("({}{})", expr_str(lhs), op),
        Expr::ArrayLiteral { ty, elements } => {
            let a: Vec<String> = elements.iter().map(expr_str).collect();
            match ty {
                Some(t) => format!("{}{{{}}}", type_str(t), a.join(", ")),
                None => format!("[{}]", a.join(", ")),
            }
        }
        Expr::ByteArrayLiteral { elems } => {
            format!("byte[{} elems]", elems.len())
        }
        Expr::StructLiteral { ty, inits } => {
            let a: Vec<String> = inits
                .iter()
                .map(|i| match &i.name {
                    Some(n) => format!("{}: {}", n, expr_str(&i.value)),
                    None => expr_str(&i.value),
                })
                .collect();
            format!("{}{{{}}}", type_str(ty), a.join(", "))
        }
    }
}
