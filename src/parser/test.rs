use super::ast::*;
use super::*;
use crate::diagnostics::DiagnosticBag;
use crate::lexer::{self, TokenKind};
use pretty_assertions::assert_eq;

/// 辅助函数：成功路径。词法 + 语法分析，任一阶段报错即 panic。
fn parse_source_ok(source: &str) -> Program {
    let mut bag = DiagnosticBag::new(source);
    let tokens = lexer::lex(source, &mut bag);
    assert!(!bag.has_errors(), "lexer failed unexpectedly for: {}", source);
    let prog = parse(&tokens, &mut bag);
    assert!(!bag.has_errors(), "parser failed unexpectedly for: {}", source);
    prog
}

/// 辅助函数：失败路径。返回 (Program, 错误条数)。
fn parse_source_fail(source: &str) -> (Program, usize) {
    let mut bag = DiagnosticBag::new(source);
    let tokens = lexer::lex(source, &mut bag);
    let prog = parse(&tokens, &mut bag);
    (prog, bag.len())
}

// --- 成功路径测试 (Happy Path) ---

#[test]
fn test_simple_function() {
    let prog = parse_source_ok("fn main() i32 { return 0 }");
    assert_eq!(prog.decls.len(), 1);

    let Decl::Func(f) = &prog.decls[0] else {
        panic!("expected a FuncDecl");
    };
    assert_eq!(f.name, "main");
    assert!(f.params.is_empty());
    assert_eq!(f.ret_type, Some(Type::Named("i32".into())));
    assert_eq!(f.body.stmts.len(), 1);
    assert!(matches!(&f.body.stmts[0], Stmt::Return(Some(_))));
}

#[test]
fn test_short_var_decl_forms() {
    // `x := e` → 无类型 VarDecl
    let prog = parse_source_ok("fn f() { x := 1 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert_eq!(
        f.body.stmts[0],
        Stmt::VarDecl {
            name: "x".into(),
            ty: None,
            init: Some(Expr::Literal {
                raw: "1".into(),
                kind: TokenKind::Int
            }),
        }
    );

    // `x : T = e` → 带类型 VarDecl
    let prog = parse_source_ok("fn f() { x : i64 = 1 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert!(matches!(
        &f.body.stmts[0],
        Stmt::VarDecl { name, ty: Some(Type::Named(t)), init: Some(_) }
            if name == "x" && t == "i64"
    ));

    // `x : T := e` 与 `=` 等价
    let prog = parse_source_ok("fn f() { x : i64 := 1 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert!(matches!(&f.body.stmts[0], Stmt::VarDecl { ty: Some(_), .. }));

    // `x = e` → AssignStmt
    let prog = parse_source_ok("fn f() { x = 1 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert!(matches!(
        &f.body.stmts[0],
        Stmt::Assign { target: Expr::Ident(n), .. } if n == "x"
    ));
}

#[test]
fn test_precedence_shape() {
    // 1 + 2 * 3 应解析为 1 + (2 * 3)
    let prog = parse_source_ok("fn f() { x := 1 + 2 * 3 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    let Stmt::VarDecl { init: Some(e), .. } = &f.body.stmts[0] else {
        panic!()
    };
    let Expr::Binary { op, right, .. } = e else { panic!() };
    assert_eq!(op, "+");
    assert!(matches!(&**right, Expr::Binary { op, .. } if op == "*"));
}

#[test]
fn test_deref_vs_multiply() {
    // 前缀 `*p` 是一元解引用
    let prog = parse_source_ok("fn f() { x := *p }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    let Stmt::VarDecl { init: Some(e), .. } = &f.body.stmts[0] else {
        panic!()
    };
    assert!(matches!(e, Expr::Unary { op, .. } if op == "*"));

    // `a * 2` 是乘法
    let prog = parse_source_ok("fn f() { x := a * 2 }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    let Stmt::VarDecl { init: Some(e), .. } = &f.body.stmts[0] else {
        panic!()
    };
    assert!(matches!(e, Expr::Binary { op, .. } if op == "*"));
}

#[test]
fn test_struct_decl_with_inline_struct() {
    let source = r#"
struct Conn {
    fd i32
    addr struct {
        host string
        port i32
    }
    next *Conn
}
"#;
    let prog = parse_source_ok(source);
    let Decl::Struct(sd) = &prog.decls[0] else { panic!() };
    assert_eq!(sd.name, "Conn");
    assert_eq!(sd.fields.len(), 3);

    // 普通字段与内联字段互斥
    assert!(sd.fields[0].ty.is_some() && sd.fields[0].inline_struct.is_none());
    assert!(sd.fields[1].ty.is_none() && sd.fields[1].inline_struct.is_some());
    assert_eq!(
        sd.fields[1].inline_struct.as_ref().unwrap().fields.len(),
        2
    );
    // 指针字段允许前向引用自身
    assert_eq!(
        sd.fields[2].ty,
        Some(Type::Pointer(Box::new(Type::Named("Conn".into()))))
    );
}

#[test]
fn test_struct_literal_named_and_positional() {
    let prog = parse_source_ok("fn f() { p := Point{1, 2}\n q := Point{y: 4, x: 3} }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };

    let Stmt::VarDecl { init: Some(Expr::StructLiteral { inits, .. }), .. } = &f.body.stmts[0]
    else {
        panic!()
    };
    assert!(inits.iter().all(|i| i.name.is_none()));

    let Stmt::VarDecl { init: Some(Expr::StructLiteral { inits, .. }), .. } = &f.body.stmts[1]
    else {
        panic!()
    };
    assert_eq!(inits[0].name.as_deref(), Some("y"));
    assert_eq!(inits[1].name.as_deref(), Some("x"));
}

#[test]
fn test_typed_array_literal() {
    let prog = parse_source_ok("fn f() { a := []i64{1, 2, 3} }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    let Stmt::VarDecl { init: Some(Expr::ArrayLiteral { ty: Some(t), elements }), .. } =
        &f.body.stmts[0]
    else {
        panic!()
    };
    assert_eq!(elements.len(), 3);
    assert!(matches!(t, Type::Array { is_slice: true, .. }));
}

#[test]
fn test_byte_array_literals() {
    let prog = parse_source_ok("fn f() { a := byte[1, 2, 255]\n b := byte\"hi\" }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };

    let Stmt::VarDecl { init: Some(Expr::ByteArrayLiteral { elems }), .. } = &f.body.stmts[0]
    else {
        panic!()
    };
    assert_eq!(elems.len(), 3);

    // 字符串形式展开为字节
    let Stmt::VarDecl { init: Some(Expr::ByteArrayLiteral { elems }), .. } = &f.body.stmts[1]
    else {
        panic!()
    };
    assert_eq!(elems.len(), 2);
    assert_eq!(
        elems[0],
        Expr::Literal {
            raw: "104".into(),
            kind: TokenKind::Int
        }
    );
}

#[test]
fn test_three_for_forms() {
    let source = r#"
fn f() {
    for (i := 0; i < 10; i++) { }
    for x in 5 { }
    for { break }
}
"#;
    let prog = parse_source_ok(source);
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert!(matches!(&f.body.stmts[0], Stmt::ForC { init: Some(_), cond: Some(_), post: Some(_), .. }));
    assert!(matches!(&f.body.stmts[1], Stmt::ForIn { var, .. } if var == "x"));
    assert!(matches!(&f.body.stmts[2], Stmt::For { .. }));
}

#[test]
fn test_member_chain_and_index_postfix() {
    let prog = parse_source_ok("fn f() { x := a.b.c[0] }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    let Stmt::VarDecl { init: Some(e), .. } = &f.body.stmts[0] else {
        panic!()
    };
    // 形状：Index(Member(Member(a, b), c), 0)
    let Expr::Index { collection, .. } = e else { panic!() };
    let Expr::Member { object, member } = &**collection else {
        panic!()
    };
    assert_eq!(member, "c");
    assert!(matches!(&**object, Expr::Member { member, .. } if member == "b"));
}

#[test]
fn test_variadic_function() {
    let prog = parse_source_ok("fn log(fmt string, args ...i32) { }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert_eq!(f.params.len(), 2);
    assert!(!f.params[0].variadic);
    assert!(f.params[1].variadic);
}

#[test]
fn test_method_receiver_form() {
    let prog = parse_source_ok("fn Server.start(port i32) { }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert_eq!(f.receiver.as_deref(), Some("Server"));
    assert_eq!(f.name, "start");
}

#[test]
fn test_package_and_import() {
    let prog = parse_source_ok("package net.server\nimport std.io as io\n");
    assert!(matches!(&prog.decls[0], Decl::Package(p) if p == "net.server"));
    let Decl::Import { path, parts, alias } = &prog.decls[1] else {
        panic!()
    };
    assert_eq!(path, "std.io");
    assert_eq!(parts, &vec!["std".to_string(), "io".to_string()]);
    assert_eq!(alias.as_deref(), Some("io"));
}

#[test]
fn test_bool_literals_parse() {
    let prog = parse_source_ok("fn f() { x := true\n y := false }");
    let Decl::Func(f) = &prog.decls[0] else { panic!() };
    assert!(matches!(
        &f.body.stmts[0],
        Stmt::VarDecl { init: Some(Expr::Literal { kind: TokenKind::KwTrue, .. }), .. }
    ));
}

// --- 失败路径测试 (Sad Path) ---

#[test]
fn test_variadic_not_last_reports_but_still_yields_decl() {
    let (prog, errors) = parse_source_fail("fn f(a ...i32, b i32) { }");
    assert!(errors >= 1, "expected at least one error");
    // 错误不致命：仍然产出 FuncDecl
    assert!(matches!(&prog.decls[0], Decl::Func(f) if f.name == "f"));
}

#[test]
fn test_walrus_requires_identifier_lhs() {
    let (_, errors) = parse_source_fail("fn f() { a[0] := 1 }");
    assert!(errors >= 1);
}

#[test]
fn test_missing_type_after_colon() {
    let (_, errors) = parse_source_fail("fn f() { x : = 1 }");
    assert!(errors >= 1);
}

#[test]
fn test_error_recovery_keeps_later_decls() {
    // 第一个函数的类型标注有语法错误，第二个应照常解析
    let (prog, errors) = parse_source_fail("fn bad() { x : = 1 }\nfn good() i32 { return 1 }");
    assert!(errors >= 1);
    assert!(prog
        .decls
        .iter()
        .any(|d| matches!(d, Decl::Func(f) if f.name == "good")));
}
