//! ec 语言的解析器。
//! 递归下降 + 显式优先级爬升（表达式），将 Token 流转换为 AST。
//!
//! 解析器持有一个缓冲好的 Token 切片（由 `lexer::lex` 产出），
//! `current` 指向当前待处理 Token；`peek_next(k)` 只是切片索引，
//! 没有词法器克隆的开销。
//!
//! 错误策略：报告诊断后合成占位节点并继续，绝不中途放弃——
//! 目标是一次调用尽可能多地暴露错误。

pub mod ast;
pub mod printer;
#[cfg(test)]
mod test;

use crate::diagnostics::{codes, Diagnostic, DiagnosticBag, Label, Phase};
use crate::lexer::{Token, TokenKind};
use ast::*;

// --- 1. 主解析器结构体 ---

/// 解析器结构体，持有解析过程所需的全部状态。
pub struct Parser<'a> {
    /// 从 Lexer 获取的 Token 流（恰以 EOF 结尾）。
    tokens: &'a [Token],
    /// 诊断信息收集器。
    diagnostics: &'a mut DiagnosticBag,
    /// 当前待处理 Token 在切片中的索引。
    current: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], diagnostics: &'a mut DiagnosticBag) -> Self {
        debug_assert!(
            tokens.last().map(|t| t.kind) == Some(TokenKind::Eof),
            "token stream must end with EOF"
        );
        Parser {
            tokens,
            diagnostics,
            current: 0,
        }
    }
}

/// 便捷入口：解析整个 Token 流。
pub fn parse(tokens: &[Token], diagnostics: &mut DiagnosticBag) -> Program {
    Parser::new(tokens, diagnostics).parse_program()
}

/// 解码字符串字面量词素：去掉引号并处理 `\n \t \\ \" \' \xHH` 转义；
/// 反引号原始字符串只去引号。未知转义按原样保留。
pub fn decode_string_literal_content(lexeme: &str) -> String {
    if lexeme.len() < 2 {
        return String::new();
    }
    let bytes = lexeme.as_bytes();
    let quote = bytes[0];
    let inner = &lexeme[1..lexeme.len() - 1];
    if quote == b'`' {
        return inner.to_string();
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('x') => {
                let mut val: u32 = 0;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            val = (val << 4) | h.to_digit(16).unwrap();
                            chars.next();
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push((val & 0xFF) as u8 as char);
            }
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

// --- 2. Token 流操作 ---

/// 解析过程中常用的一系列辅助函数。
trait Util {
    /// 当前 Token。
    fn cur(&self) -> &Token;
    /// 刚被消费的上一个 Token。
    fn prev(&self) -> &Token;
    /// 向前看第 k 个 Token（k=1 是 cur 的下一个）。
    fn peek_next(&self, k: usize) -> &Token;
    fn is_at_end(&self) -> bool;
    /// 前移一个 Token。
    fn advance(&mut self);
    fn check(&self, kind: TokenKind) -> bool;
    /// 若当前 Token 是指定种类则消费并返回 true。
    fn match_tok(&mut self, kind: TokenKind) -> bool;
    /// 消费一个指定种类的 Token；种类不符则报错并合成一个占位 Token。
    fn expect(&mut self, kind: TokenKind, msg: &str) -> Token;
    /// 在给定 Token 处报告一条语法诊断。
    fn emit_error(&mut self, at: &Token, msg: impl Into<String>);
    fn emit_error_with_code(
        &mut self,
        code: &'static codes::ErrorCode,
        at: &Token,
        msg: impl Into<String>,
    );
    /// 吞掉连续的 NEWLINE。
    fn skip_newlines(&mut self);
    /// 语法错误时的占位表达式。
    fn placeholder_expr(&self) -> Expr;
}

impl<'a> Util for Parser<'a> {
    fn cur(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn prev(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek_next(&self, k: usize) -> &Token {
        &self.tokens[(self.current + k).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn match_tok(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> Token {
        if self.check(kind) {
            let got = self.cur().clone();
            self.advance();
            return got;
        }
        let at = self.cur().clone();
        self.emit_error(&at, msg);
        Token {
            kind,
            lexeme: String::new(),
            start: at.start,
            end: at.end,
            span: at.span,
        }
    }

    fn emit_error(&mut self, at: &Token, msg: impl Into<String>) {
        self.emit_error_with_code(&codes::E0100_SYNTAX_ERROR, at, msg);
    }

    fn emit_error_with_code(
        &mut self,
        code: &'static codes::ErrorCode,
        at: &Token,
        msg: impl Into<String>,
    ) {
        let msg = msg.into();
        self.diagnostics.report(
            Diagnostic::error(code, Phase::Parser, at.start, Label::new(at.span, code.message))
                .with_dynamic_message(format!(
                    "{} (found {})",
                    msg,
                    at.kind.to_string_for_error()
                )),
        );
    }

    fn skip_newlines(&mut self) {
        while self.match_tok(TokenKind::Newline) {}
    }

    fn placeholder_expr(&self) -> Expr {
        Expr::Literal {
            raw: String::new(),
            kind: TokenKind::Illegal,
        }
    }
}

// --- 3. 声明解析 ---

trait DeclarationParser {
    fn parse_decl(&mut self) -> Option<Decl>;
    fn parse_package_decl(&mut self) -> Option<Decl>;
    fn parse_import_decl(&mut self) -> Option<Decl>;
    fn parse_struct_decl(&mut self, is_pub: bool) -> Option<Decl>;
    fn parse_function_decl(&mut self, is_pub: bool) -> Option<Decl>;
}

impl<'a> Parser<'a> {
    /// 消耗解析器并启动整个解析过程。
    pub fn parse_program(&mut self) -> Program {
        let mut prog = Program::default();

        while !self.is_at_end() {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }

            let before = self.current;

            let d = if self.check(TokenKind::KwPackage) {
                self.parse_package_decl()
            } else if self.check(TokenKind::KwImport) {
                self.parse_import_decl()
            } else {
                self.parse_decl()
            };

            if let Some(d) = d {
                prog.decls.push(d);
            }

            // 错误恢复兜底：任何路径都必须推进
            if self.current == before {
                self.advance();
            }
            self.skip_newlines();
        }
        prog
    }
}

impl<'a> DeclarationParser for Parser<'a> {
    fn parse_decl(&mut self) -> Option<Decl> {
        let mut is_pub = false;
        if self.check(TokenKind::KwPub) {
            is_pub = true;
            self.advance();
        }

        if self.check(TokenKind::KwStruct) {
            return self.parse_struct_decl(is_pub);
        }
        if self.check(TokenKind::KwFn) {
            return self.parse_function_decl(is_pub);
        }

        self.parse_stmt().map(Decl::Stmt)
    }

    fn parse_package_decl(&mut self) -> Option<Decl> {
        self.expect(TokenKind::KwPackage, "expected 'package'");

        let first = self.expect(TokenKind::Ident, "expected package name");
        let mut full = first.lexeme;
        while self.match_tok(TokenKind::Dot) {
            let part = self.expect(TokenKind::Ident, "expected identifier in package name");
            full.push('.');
            full.push_str(&part.lexeme);
        }
        self.match_tok(TokenKind::Newline);
        Some(Decl::Package(full))
    }

    fn parse_import_decl(&mut self) -> Option<Decl> {
        self.expect(TokenKind::KwImport, "expected 'import'");

        let first = self.expect(TokenKind::Ident, "expected import path");
        let mut full = first.lexeme.clone();
        let mut parts = vec![first.lexeme];

        while self.match_tok(TokenKind::Dot) {
            let p = self.expect(TokenKind::Ident, "expected identifier in import path");
            full.push('.');
            full.push_str(&p.lexeme);
            parts.push(p.lexeme);
        }

        let mut alias = None;
        if self.check(TokenKind::KwAs) {
            self.advance();
            let a = self.expect(TokenKind::Ident, "expected alias after 'as'");
            alias = Some(a.lexeme);
        }

        self.match_tok(TokenKind::Newline);
        Some(Decl::Import {
            path: full,
            parts,
            alias,
        })
    }

    fn parse_struct_decl(&mut self, is_pub: bool) -> Option<Decl> {
        self.expect(TokenKind::KwStruct, "expected 'struct'");
        let name_tk = self.expect(TokenKind::Ident, "expected struct name");

        self.expect(TokenKind::LBrace, "expected '{' after struct name");

        let mut sdecl = StructDecl {
            name: name_tk.lexeme,
            fields: Vec::new(),
            nested_decls: Vec::new(),
            is_pub,
        };

        self.skip_newlines();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let field_name = self.expect(TokenKind::Ident, "expected field name in struct");

            let mut field = StructField {
                name: field_name.lexeme,
                ty: None,
                inline_struct: None,
                is_pub: false,
            };

            if self.check(TokenKind::KwStruct) {
                // 内联匿名结构体字段：`pos struct { x i32  y i32 }`
                self.advance();
                self.expect(TokenKind::LBrace, "expected '{' for inline struct in field");
                let mut inner = StructDecl {
                    name: String::new(),
                    fields: Vec::new(),
                    nested_decls: Vec::new(),
                    is_pub: false,
                };
                self.skip_newlines();
                while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                    let fname = self.expect(TokenKind::Ident, "expected field name in inline struct");
                    let fty = self.parse_type();
                    inner.fields.push(StructField {
                        name: fname.lexeme,
                        ty: Some(fty),
                        inline_struct: None,
                        is_pub: false,
                    });
                    self.match_tok(TokenKind::Newline);
                    self.skip_newlines();
                }
                self.expect(TokenKind::RBrace, "expected '}' after inline struct");
                field.inline_struct = Some(inner);
            } else {
                field.ty = Some(self.parse_type());
            }

            sdecl.fields.push(field);

            self.match_tok(TokenKind::Newline);
            self.skip_newlines();
        }

        self.expect(TokenKind::RBrace, "expected '}' to close struct");
        Some(Decl::Struct(sdecl))
    }

    fn parse_function_decl(&mut self, is_pub: bool) -> Option<Decl> {
        self.expect(TokenKind::KwFn, "expected 'fn'");

        let first_tk = self.expect(TokenKind::Ident, "expected function or method name");
        let mut receiver = None;
        let func_name;

        if self.check(TokenKind::Dot) {
            // 方法形式：`fn Receiver.method(...)`
            receiver = Some(first_tk.lexeme);
            self.advance();
            let method_tk = self.expect(TokenKind::Ident, "expected method name after '.'");
            func_name = method_tk.lexeme;
        } else {
            func_name = first_tk.lexeme;
        }

        self.expect(TokenKind::LParen, "expected '(' after fn name");

        let mut params: Vec<Param> = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                // 参数名之前也允许 `*`/`&` 前缀（指针参数的简写）
                let mut prefix_depth = 0usize;
                while self.check(TokenKind::Deref) || self.check(TokenKind::AddressOf) {
                    prefix_depth += 1;
                    self.advance();
                }

                let id = self.expect(TokenKind::Ident, "expected parameter name");

                let mut is_variadic = false;
                if self.consume_ellipsis() {
                    is_variadic = true;
                }

                let ty = if self.check(TokenKind::LBrack)
                    || self.check(TokenKind::Ident)
                    || self.check(TokenKind::KwByte)
                    || self.check(TokenKind::Deref)
                    || self.check(TokenKind::AddressOf)
                {
                    self.parse_type()
                } else if is_variadic {
                    Type::Named("any".to_string())
                } else if prefix_depth > 0 {
                    let mut base = Type::Named("i32".to_string());
                    for _ in 0..prefix_depth {
                        base = Type::Pointer(Box::new(base));
                    }
                    base
                } else {
                    let at = self.cur().clone();
                    self.emit_error(
                        &at,
                        "expected parameter type after name (use: 'name type', e.g. 'x i32')",
                    );
                    Type::Named("i32".to_string())
                };

                params.push(Param {
                    name: id.lexeme,
                    ty,
                    variadic: is_variadic,
                });

                if is_variadic {
                    if self.match_tok(TokenKind::Comma) {
                        let at = self.cur().clone();
                        self.emit_error_with_code(
                            &codes::E0101_VARIADIC_NOT_LAST,
                            &at,
                            "variadic parameter must be the last parameter",
                        );
                        while !self.check(TokenKind::RParen) && !self.is_at_end() {
                            self.advance();
                        }
                    }
                    break;
                }

                if self.match_tok(TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "expected ')' after params");

        let ret_type = if self.check(TokenKind::Ident)
            || self.check(TokenKind::LBrack)
            || self.check(TokenKind::Deref)
            || self.check(TokenKind::AddressOf)
            || self.check(TokenKind::KwByte)
        {
            Some(self.parse_type())
        } else {
            None
        };

        let body = self.parse_block();
        Some(Decl::Func(FuncDecl {
            name: func_name,
            receiver,
            params,
            ret_type,
            is_pub,
            body,
        }))
    }
}

impl<'a> Parser<'a> {
    /// `...` 既可能是一个 ELLIPSIS token，也可能被写成三个 DOT。
    fn consume_ellipsis(&mut self) -> bool {
        if self.check(TokenKind::Ellipsis) {
            self.advance();
            return true;
        }
        if self.check(TokenKind::Dot)
            && self.peek_next(1).kind == TokenKind::Dot
            && self.peek_next(2).kind == TokenKind::Dot
        {
            self.advance();
            self.advance();
            self.advance();
            return true;
        }
        false
    }
}

// --- 4. 类型解析 ---

trait TypeParser {
    /// 类型 = `*`/`&` 前缀序列 + (`[]` 基础类型 | 基础类型)。
    fn parse_type(&mut self) -> Type;
}

impl<'a> TypeParser for Parser<'a> {
    fn parse_type(&mut self) -> Type {
        let mut ptr_depth = 0usize;
        while self.check(TokenKind::Deref) || self.check(TokenKind::AddressOf) {
            ptr_depth += 1;
            self.advance();
        }

        let mut base = if self.check(TokenKind::LBrack) {
            self.advance();
            self.expect(TokenKind::RBrack, "expected ']' in array type");
            let elem = if self.check(TokenKind::KwByte) {
                self.advance();
                Type::Named("byte".to_string())
            } else {
                let t = self.expect(TokenKind::Ident, "expected element type after '[]'");
                Type::Named(t.lexeme)
            };
            Type::slice_of(elem)
        } else if self.check(TokenKind::KwByte) {
            self.advance();
            Type::Named("byte".to_string())
        } else {
            let t = self.expect(TokenKind::Ident, "expected type name");
            Type::Named(t.lexeme)
        };

        for _ in 0..ptr_depth {
            base = Type::Pointer(Box::new(base));
        }
        base
    }
}

// --- 5. 语句解析 ---

trait StatementParser {
    fn parse_block(&mut self) -> Block;
    fn parse_stmt(&mut self) -> Option<Stmt>;
    fn parse_for_stmt(&mut self) -> Option<Stmt>;
}

impl<'a> StatementParser for Parser<'a> {
    fn parse_block(&mut self) -> Block {
        self.expect(TokenKind::LBrace, "expected '{' to start block");
        let mut blk = Block::default();
        self.skip_newlines();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let before = self.current;
            if let Some(s) = self.parse_stmt() {
                blk.stmts.push(s);
            }
            if self.current == before {
                self.advance();
            }
            self.skip_newlines();
        }
        self.expect(TokenKind::RBrace, "expected '}' to end block");
        blk
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        self.skip_newlines();

        if self.check(TokenKind::KwBreak) {
            self.advance();
            self.match_tok(TokenKind::Newline);
            return Some(Stmt::Break);
        }

        if self.check(TokenKind::KwContinue) {
            self.advance();
            self.match_tok(TokenKind::Newline);
            return Some(Stmt::Continue);
        }

        if self.check(TokenKind::KwReturn) {
            self.advance();
            let expr = if self.check(TokenKind::Newline)
                || self.check(TokenKind::RBrace)
                || self.check(TokenKind::Semicolon)
                || self.is_at_end()
            {
                None
            } else {
                Some(self.parse_expression())
            };
            self.match_tok(TokenKind::Newline);
            return Some(Stmt::Return(expr));
        }

        if self.check(TokenKind::KwIf) {
            self.advance();
            let cond = self.parse_expression();
            let then_blk = self.parse_block();
            let mut else_blk = None;
            if self.check(TokenKind::KwElse) {
                self.advance();
                if self.check(TokenKind::LBrace) {
                    else_blk = Some(self.parse_block());
                } else if self.check(TokenKind::KwIf) {
                    // `else if` 展开为包了一层块的嵌套 if
                    let nested = self.parse_stmt()?;
                    else_blk = Some(Block { stmts: vec![nested] });
                }
            }
            return Some(Stmt::If {
                cond,
                then_blk,
                else_blk,
            });
        }

        if self.check(TokenKind::KwFor) {
            return self.parse_for_stmt();
        }

        if self.check(TokenKind::LBrace) {
            return Some(Stmt::Block(self.parse_block()));
        }

        // 表达式开头的语句：根据后继 token 区分
        // 变量声明 / 赋值 / 纯表达式
        let lhs = self.parse_expression();

        if let Expr::Ident(ref name) = lhs {
            if self.check(TokenKind::Colon) {
                // `x : T = e` / `x : T := e`
                self.advance();
                let annotated = self.parse_type();

                if self.check(TokenKind::Assign)
                    && (self.cur().lexeme == ":=" || self.cur().lexeme == "=")
                {
                    self.advance();
                    let rhs = self.parse_expression();
                    self.match_tok(TokenKind::Newline);
                    return Some(Stmt::VarDecl {
                        name: name.clone(),
                        ty: Some(annotated),
                        init: Some(rhs),
                    });
                }
                let at = self.cur().clone();
                self.emit_error(
                    &at,
                    "expected ':=' or '=' after type annotation in variable declaration",
                );
                return None;
            }
        }

        if self.check(TokenKind::Assign) {
            let assign_tk = self.cur().clone();
            let op = assign_tk.lexeme.clone();
            self.advance();

            let rhs = self.parse_expression();
            self.match_tok(TokenKind::Newline);

            if op == ":=" {
                return if let Expr::Ident(name) = lhs {
                    Some(Stmt::VarDecl {
                        name,
                        ty: None,
                        init: Some(rhs),
                    })
                } else {
                    self.emit_error_with_code(
                        &codes::E0102_INVALID_DECL_TARGET,
                        &assign_tk,
                        "':=' can only be used with an identifier on the left-hand side",
                    );
                    None
                };
            }
            return Some(Stmt::Assign {
                target: lhs,
                value: rhs,
            });
        }

        self.match_tok(TokenKind::Newline);
        Some(Stmt::Expr(lhs))
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        self.expect(TokenKind::KwFor, "expected 'for'");

        if self.check(TokenKind::LParen) {
            // C 风格：for (init; cond; post) { ... }
            self.advance();

            let mut init: Option<Box<Stmt>> = None;
            if !self.check(TokenKind::Semicolon) {
                if self.check(TokenKind::Ident) && self.peek_next(1).kind == TokenKind::Colon {
                    // 带类型标注的 for-init：`i : i32 = 0`
                    let id = self.cur().clone();
                    self.advance();
                    self.advance();
                    let annotated = self.parse_type();
                    if self.check(TokenKind::Assign)
                        && (self.cur().lexeme == ":=" || self.cur().lexeme == "=")
                    {
                        self.advance();
                        let rhs = self.parse_expression();
                        init = Some(Box::new(Stmt::VarDecl {
                            name: id.lexeme,
                            ty: Some(annotated),
                            init: Some(rhs),
                        }));
                    } else {
                        let at = self.cur().clone();
                        self.emit_error(&at, "expected ':=' or '=' after type annotation in for-init");
                        init = Some(Box::new(Stmt::VarDecl {
                            name: id.lexeme,
                            ty: Some(annotated),
                            init: Some(self.placeholder_expr()),
                        }));
                    }
                } else if self.check(TokenKind::Ident)
                    && self.peek_next(1).kind == TokenKind::Assign
                    && self.peek_next(1).lexeme == ":="
                {
                    // 短声明 for-init：`i := 0`
                    let id = self.cur().clone();
                    self.advance();
                    self.advance();
                    let rhs = self.parse_expression();
                    init = Some(Box::new(Stmt::VarDecl {
                        name: id.lexeme,
                        ty: None,
                        init: Some(rhs),
                    }));
                } else {
                    let e = self.parse_expression();
                    init = Some(Box::new(Stmt::Expr(e)));
                }
            }
            self.expect(TokenKind::Semicolon, "expected ';' after for-init");

            let cond = if !self.check(TokenKind::Semicolon) {
                Some(self.parse_expression())
            } else {
                None
            };
            self.expect(TokenKind::Semicolon, "expected ';' after for-cond");

            let post = if !self.check(TokenKind::RParen) {
                Some(self.parse_expression())
            } else {
                None
            };
            self.expect(TokenKind::RParen, "expected ')' after for clauses");

            let body = self.parse_block();
            return Some(Stmt::ForC {
                init,
                cond,
                post,
                body,
            });
        }

        if self.check(TokenKind::Ident) {
            // 迭代形式：for x in expr { ... }
            let id = self.cur().clone();
            self.advance();
            self.expect(TokenKind::KwIn, "expected 'in' in for loop");
            let iterable = self.parse_expression();
            let body = self.parse_block();
            return Some(Stmt::ForIn {
                var: id.lexeme,
                var_type: None,
                iterable,
                body,
            });
        }

        // 无限循环：for { ... }
        let body = self.parse_block();
        Some(Stmt::For { body })
    }
}

// --- 6. 表达式解析（优先级爬升） ---

trait ExpressionParser {
    fn parse_expression(&mut self) -> Expr;
    fn parse_logical_or(&mut self) -> Expr;
    fn parse_logical_and(&mut self) -> Expr;
    fn parse_bitwise_and(&mut self) -> Expr;
    fn parse_equality(&mut self) -> Expr;
    fn parse_comparison(&mut self) -> Expr;
    fn parse_shift(&mut self) -> Expr;
    fn parse_additive(&mut self) -> Expr;
    fn parse_multiplicative(&mut self) -> Expr;
    fn parse_unary(&mut self) -> Expr;
    fn parse_postfix(&mut self, left: Expr) -> Expr;
    fn parse_primary(&mut self) -> Expr;
    fn parse_array_literal(&mut self) -> Expr;
    fn parse_byte_array_literal(&mut self) -> Expr;
}

/// 左结合二元层级的通用骨架。
macro_rules! binary_level {
    ($self:ident, $next:ident, $($kind:path)|+) => {{
        let mut left = $self.$next();
        while $($self.check($kind))||+ {
            let op_tok = $self.cur().clone();
            // DEREF 在二元位置就是乘号
            let op = if op_tok.kind == TokenKind::Deref {
                "*".to_string()
            } else {
                op_tok.lexeme.clone()
            };
            $self.advance();
            let right = $self.$next();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }};
}

impl<'a> ExpressionParser for Parser<'a> {
    fn parse_expression(&mut self) -> Expr {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Expr {
        binary_level!(self, parse_logical_and, TokenKind::OrOr)
    }

    fn parse_logical_and(&mut self) -> Expr {
        binary_level!(self, parse_bitwise_and, TokenKind::AndAnd)
    }

    fn parse_bitwise_and(&mut self) -> Expr {
        // 二元位置的 `&` 与前缀取址共用 AddressOf 种类（见 lexer）
        binary_level!(self, parse_equality, TokenKind::AddressOf | TokenKind::BitAnd)
    }

    fn parse_equality(&mut self) -> Expr {
        binary_level!(self, parse_comparison, TokenKind::Eq | TokenKind::NotEq)
    }

    fn parse_comparison(&mut self) -> Expr {
        binary_level!(
            self,
            parse_shift,
            TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge
        )
    }

    fn parse_shift(&mut self) -> Expr {
        binary_level!(self, parse_additive, TokenKind::Shl | TokenKind::Shr)
    }

    fn parse_additive(&mut self) -> Expr {
        binary_level!(self, parse_multiplicative, TokenKind::Plus | TokenKind::Minus)
    }

    fn parse_multiplicative(&mut self) -> Expr {
        binary_level!(
            self,
            parse_unary,
            TokenKind::Star | TokenKind::Deref | TokenKind::Slash | TokenKind::Percent
        )
    }

    fn parse_unary(&mut self) -> Expr {
        if self.check(TokenKind::Bang)
            || self.check(TokenKind::Minus)
            || self.check(TokenKind::Plus)
            || self.check(TokenKind::PlusPlus)
            || self.check(TokenKind::MinusMinus)
            || self.check(TokenKind::Deref)
            || self.check(TokenKind::AddressOf)
        {
            let op_tok = self.cur().clone();
            self.advance();
            let rhs = self.parse_unary();
            let op = match op_tok.kind {
                TokenKind::Deref => "*".to_string(),
                TokenKind::AddressOf => "&".to_string(),
                _ => op_tok.lexeme,
            };
            return Expr::Unary {
                op,
                rhs: Box::new(rhs),
            };
        }

        if self.check(TokenKind::LBrack) {
            // 带类型的数组字面量 `[]T{...}`：序列是 `[` `]` IDENT `{`
            if self.peek_next(1).kind == TokenKind::RBrack
                && self.peek_next(2).kind == TokenKind::Ident
                && self.peek_next(3).kind == TokenKind::LBrace
            {
                self.advance();
                self.advance();
                let type_tk = self.expect(
                    TokenKind::Ident,
                    "expected type name after '[]' in typed array literal",
                );
                self.expect(TokenKind::LBrace, "expected '{' to start typed array literal");

                let mut elems = Vec::new();
                self.skip_newlines();
                if !self.check(TokenKind::RBrace) {
                    loop {
                        self.skip_newlines();
                        elems.push(self.parse_expression());
                        self.skip_newlines();

                        if self.match_tok(TokenKind::Comma) {
                            self.skip_newlines();
                            if self.check(TokenKind::RBrace) {
                                break;
                            }
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "expected '}' to close typed array literal");

                let node = Expr::ArrayLiteral {
                    ty: Some(Type::slice_of(Type::Named(type_tk.lexeme))),
                    elements: elems,
                };
                return self.parse_postfix(node);
            }

            let arr = self.parse_array_literal();
            return self.parse_postfix(arr);
        }

        self.parse_primary()
    }

    fn parse_postfix(&mut self, mut left: Expr) -> Expr {
        loop {
            if self.check(TokenKind::LBrack) {
                self.advance();
                let idx = self.parse_expression();
                self.expect(TokenKind::RBrack, "expected ']' after index");
                left = Expr::Index {
                    collection: Box::new(left),
                    index: Box::new(idx),
                };
                continue;
            }

            if self.check(TokenKind::PlusPlus) || self.check(TokenKind::MinusMinus) {
                let op = self.cur().lexeme.clone();
                self.advance();
                left = Expr::Postfix {
                    op,
                    lhs: Box::new(left),
                };
                continue;
            }

            if self.check(TokenKind::Dot) {
                self.advance();
                let member_tk = self.expect(TokenKind::Ident, "expected member name after '.'");
                left = Expr::Member {
                    object: Box::new(left),
                    member: member_tk.lexeme,
                };
                continue;
            }

            break;
        }
        left
    }

    fn parse_primary(&mut self) -> Expr {
        if self.check(TokenKind::Int)
            || self.check(TokenKind::Float)
            || self.check(TokenKind::Str)
            || self.check(TokenKind::Char)
            || self.check(TokenKind::KwTrue)
            || self.check(TokenKind::KwFalse)
        {
            let tk = self.cur().clone();
            self.advance();
            let lit = Expr::Literal {
                raw: tk.lexeme,
                kind: tk.kind,
            };
            return self.parse_postfix(lit);
        }

        if self.check(TokenKind::LBrack) {
            let arr = self.parse_array_literal();
            return self.parse_postfix(arr);
        }

        if self.check(TokenKind::Ident) {
            let id = self.cur().clone();
            self.advance();

            let result = if self.check(TokenKind::LParen) {
                // 函数调用
                self.advance();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression());
                        if self.match_tok(TokenKind::Comma) {
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "expected ')' in call");
                Expr::Call {
                    callee: Box::new(Expr::Ident(id.lexeme)),
                    args,
                }
            } else if self.check(TokenKind::LBrace) {
                // 结构体字面量：命名或位置初始化的逗号表
                self.advance();
                let mut inits = Vec::new();
                self.skip_newlines();
                if !self.check(TokenKind::RBrace) {
                    loop {
                        self.skip_newlines();

                        if self.check(TokenKind::Ident)
                            && self.peek_next(1).kind == TokenKind::Colon
                        {
                            let name_tk = self.cur().clone();
                            self.advance();
                            self.expect(TokenKind::Colon, "expected ':' in struct field init");
                            let val = self.parse_expression();
                            inits.push(FieldInit {
                                name: Some(name_tk.lexeme),
                                value: val,
                            });
                        } else {
                            let val = self.parse_expression();
                            inits.push(FieldInit {
                                name: None,
                                value: val,
                            });
                        }

                        self.skip_newlines();
                        if self.match_tok(TokenKind::Comma) {
                            self.skip_newlines();
                            if self.check(TokenKind::RBrace) {
                                break;
                            }
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "expected '}' to close struct literal");

                Expr::StructLiteral {
                    ty: Type::Named(id.lexeme),
                    inits,
                }
            } else {
                Expr::Ident(id.lexeme)
            };

            return self.parse_postfix(result);
        }

        if self.check(TokenKind::LParen) {
            self.advance();
            let e = self.parse_expression();
            self.expect(TokenKind::RParen, "expected ')'");
            return self.parse_postfix(e);
        }

        if self.check(TokenKind::KwByte) {
            self.advance();

            if self.check(TokenKind::LBrack) {
                let arr = self.parse_byte_array_literal();
                return self.parse_postfix(arr);
            }

            if self.check(TokenKind::Str) {
                // `byte"..."`：字符串按字节展开
                let str_tk = self.cur().clone();
                self.advance();
                let content = decode_string_literal_content(&str_tk.lexeme);
                let elems = content
                    .bytes()
                    .map(|b| Expr::Literal {
                        raw: b.to_string(),
                        kind: TokenKind::Int,
                    })
                    .collect();
                return self.parse_postfix(Expr::ByteArrayLiteral { elems });
            }

            let at = self.cur().clone();
            self.emit_error(&at, "expected '[' or string literal after 'byte'");
            return self.parse_postfix(Expr::ByteArrayLiteral { elems: Vec::new() });
        }

        let at = self.cur().clone();
        self.emit_error(&at, "unexpected token in expression");
        self.advance();
        let ph = self.placeholder_expr();
        self.parse_postfix(ph)
    }

    fn parse_array_literal(&mut self) -> Expr {
        self.expect(TokenKind::LBrack, "expected '[' to start array literal");
        let mut elems = Vec::new();

        self.skip_newlines();
        if !self.check(TokenKind::RBrack) {
            loop {
                self.skip_newlines();
                elems.push(self.parse_expression());
                self.skip_newlines();

                if self.match_tok(TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(TokenKind::RBrack) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }

        self.expect(TokenKind::RBrack, "expected ']' to close array literal");
        Expr::ArrayLiteral {
            ty: None,
            elements: elems,
        }
    }

    fn parse_byte_array_literal(&mut self) -> Expr {
        self.expect(TokenKind::LBrack, "expected '[' to start byte array literal");
        let mut elems = Vec::new();

        self.skip_newlines();
        if !self.check(TokenKind::RBrack) {
            loop {
                self.skip_newlines();
                elems.push(self.parse_expression());
                self.skip_newlines();

                if self.match_tok(TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(TokenKind::RBrack) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }

        self.expect(TokenKind::RBrack, "expected ']' to close byte array literal");
        Expr::ByteArrayLiteral { elems }
    }
}
