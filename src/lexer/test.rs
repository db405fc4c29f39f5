// 导入父模块（也就是 lexer 模块）的所有内容
use super::*;
use crate::diagnostics::DiagnosticBag;
use pretty_assertions::assert_eq;

/// 辅助函数：对源代码做词法分析，只返回 Token 种类的向量（去掉结尾 EOF）。
/// 大多数测试只关心种类和顺序，而不是位置。
fn lex_kinds(source: &str) -> Vec<TokenKind> {
    let mut bag = DiagnosticBag::new(source);
    let tokens = lex(source, &mut bag);
    assert!(!bag.has_errors(), "lexer reported unexpected errors");
    tokens
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| *k != TokenKind::Eof)
        .collect()
}

/// 辅助函数：返回 (tokens, 错误条数)，用于失败路径测试。
fn lex_with_errors(source: &str) -> (Vec<Token>, usize) {
    let mut bag = DiagnosticBag::new(source);
    let tokens = lex(source, &mut bag);
    (tokens, bag.len())
}

// --- 成功案例 (Happy Path) ---

#[test]
fn test_keywords_and_identifiers() {
    let source = "fn main_loop(x i32) i32 { return x }";
    let expected = vec![
        TokenKind::KwFn,
        TokenKind::Ident,
        TokenKind::LParen,
        TokenKind::Ident,
        TokenKind::Ident,
        TokenKind::RParen,
        TokenKind::Ident,
        TokenKind::LBrace,
        TokenKind::KwReturn,
        TokenKind::Ident,
        TokenKind::RBrace,
    ];
    assert_eq!(lex_kinds(source), expected);
}

#[test]
fn test_multi_char_operators() {
    let source = "== != <= >= << >> -> => ++ -- += -= /= %= ...";
    let expected = vec![
        TokenKind::Eq,
        TokenKind::NotEq,
        TokenKind::Le,
        TokenKind::Ge,
        TokenKind::Shl,
        TokenKind::Shr,
        TokenKind::Arrow,
        TokenKind::FatArrow,
        TokenKind::PlusPlus,
        TokenKind::MinusMinus,
        TokenKind::PlusAssign,
        TokenKind::MinusAssign,
        TokenKind::DivAssign,
        TokenKind::ModAssign,
        TokenKind::Ellipsis,
    ];
    assert_eq!(lex_kinds(source), expected);
}

#[test]
fn test_walrus_and_assign_share_kind_but_not_lexeme() {
    let mut bag = DiagnosticBag::new("");
    let tokens = lex("x := 1\ny = 2", &mut bag);
    let assigns: Vec<&Token> = tokens.iter().filter(|t| t.kind == TokenKind::Assign).collect();
    assert_eq!(assigns.len(), 2);
    assert_eq!(assigns[0].lexeme, ":=");
    assert_eq!(assigns[1].lexeme, "=");
}

#[test]
fn test_newline_is_a_token() {
    let kinds = lex_kinds("a\nb");
    assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Newline, TokenKind::Ident]);
}

#[test]
fn test_comments_are_skipped_including_nested_blocks() {
    let kinds = lex_kinds("a // line comment\nb /* outer /* inner */ still outer */ c");
    assert_eq!(
        kinds,
        vec![TokenKind::Ident, TokenKind::Newline, TokenKind::Ident, TokenKind::Ident]
    );
}

#[test]
fn test_number_literals() {
    let kinds = lex_kinds("42 0x1F 0b1010 0755 3.25 1e10 2.5e-3");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Int,
            TokenKind::Int,
            TokenKind::Int,
            TokenKind::Int,
            TokenKind::Float,
            TokenKind::Float,
            TokenKind::Float,
        ]
    );
}

#[test]
fn test_member_dot_is_its_own_token() {
    // 小数点必须后随数字才属于数字；成员访问的点号独立成 token
    let kinds = lex_kinds("x.y");
    assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Dot, TokenKind::Ident]);
}

#[test]
fn test_string_char_and_raw_string() {
    let mut bag = DiagnosticBag::new("");
    let tokens = lex("\"hi\\n\" `raw \\n` 'a' '\\t'", &mut bag);
    assert!(!bag.has_errors());
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Str, TokenKind::Str, TokenKind::Char, TokenKind::Char, TokenKind::Eof]
    );
    // 词素保留原文（含引号与未解码的转义）
    assert_eq!(tokens[0].lexeme, "\"hi\\n\"");
    assert_eq!(tokens[1].lexeme, "`raw \\n`");
}

// --- `*` 与 `&` 的语境判定 ---

#[test]
fn test_star_disambiguation() {
    // `*p`：后随标识符，是解引用
    let kinds = lex_kinds("*p");
    assert_eq!(kinds[0], TokenKind::Deref);

    // `a * 1`：后随数字，是乘法
    let kinds = lex_kinds("a * 1");
    assert_eq!(kinds[1], TokenKind::Star);

    // 空白不影响判定：`*  p` 仍是解引用
    let kinds = lex_kinds("*  p");
    assert_eq!(kinds[0], TokenKind::Deref);

    // `* (x)`、`* [`、`**p` 都算前缀形态
    assert_eq!(lex_kinds("*(x)")[0], TokenKind::Deref);
    assert_eq!(lex_kinds("**p")[0], TokenKind::Deref);
}

#[test]
fn test_amp_disambiguation() {
    let kinds = lex_kinds("&x");
    assert_eq!(kinds[0], TokenKind::AddressOf);

    let kinds = lex_kinds("a & 1");
    assert_eq!(kinds[1], TokenKind::BitAnd);

    let kinds = lex_kinds("a && b");
    assert_eq!(kinds[1], TokenKind::AndAnd);
}

// --- peek 与 EOF 行为 ---

#[test]
fn test_peek_does_not_advance() {
    let mut bag = DiagnosticBag::new("");
    let mut lx = Lexer::new("a + b", &mut bag);

    let p1 = lx.peek(1);
    let p2 = lx.peek(2);
    let p3 = lx.peek(3);

    // peek(k) 后顺序取 token 应得到同一序列
    assert_eq!(lx.next_token(), p1);
    assert_eq!(lx.next_token(), p2);
    assert_eq!(lx.next_token(), p3);
}

#[test]
fn test_eof_is_sticky() {
    let mut bag = DiagnosticBag::new("");
    let mut lx = Lexer::new("x", &mut bag);
    assert_eq!(lx.next_token().kind, TokenKind::Ident);
    assert_eq!(lx.next_token().kind, TokenKind::Eof);
    assert_eq!(lx.next_token().kind, TokenKind::Eof);
    assert_eq!(lx.next_token().kind, TokenKind::Eof);
}

#[test]
fn test_lexeme_roundtrip() {
    let source = "fn main() i32 { x := 0x2A\n return x }";
    let mut bag = DiagnosticBag::new(source);
    let tokens = lex(source, &mut bag);
    for t in &tokens {
        if t.kind == TokenKind::Eof {
            continue;
        }
        assert_eq!(
            &source[t.span.start..t.span.end],
            t.lexeme,
            "lexeme should be the exact source slice"
        );
    }
}

// --- 失败案例 (Sad Path) ---

#[test]
fn test_unknown_character_emits_illegal_and_continues() {
    let (tokens, errors) = lex_with_errors("a @ b");
    assert_eq!(errors, 1, "expected exactly one lexer error");
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    // 流不中断：ILLEGAL 之后还能拿到 b 和 EOF
    assert_eq!(
        kinds,
        vec![TokenKind::Ident, TokenKind::Illegal, TokenKind::Ident, TokenKind::Eof]
    );
}

#[test]
fn test_unterminated_string_reports_and_yields_no_string_token() {
    let (tokens, errors) = lex_with_errors("\"never closed");
    assert!(errors >= 1);
    assert!(
        tokens.iter().all(|t| t.kind != TokenKind::Str),
        "no STRING token should be produced for an unterminated literal"
    );
}

#[test]
fn test_unclosed_block_comment_reports() {
    let (_, errors) = lex_with_errors("a /* never closed");
    assert!(errors >= 1);
}

#[test]
fn test_invalid_octal_digit_reports_but_continues() {
    let (tokens, errors) = lex_with_errors("079 b");
    assert_eq!(errors, 1);
    // 仍然产出 INT token 与后续内容
    assert_eq!(tokens[0].kind, TokenKind::Int);
    assert_eq!(tokens[1].kind, TokenKind::Ident);
}

#[test]
fn test_peek_never_reports_diagnostics() {
    let mut bag = DiagnosticBag::new("");
    let mut lx = Lexer::new("@", &mut bag);
    // 窥探一个会出错的 token：不得污染诊断背包
    let t = lx.peek(1);
    assert_eq!(t.kind, TokenKind::Illegal);
    assert_eq!(lx.diagnostics.len(), 0);
    // 真正消费时才报告
    let t = lx.next_token();
    assert_eq!(t.kind, TokenKind::Illegal);
    assert_eq!(lx.diagnostics.len(), 1);
}
