//! 主词法分析器模块。
//! 包含 Lexer 结构体和负责将源代码转换为 Token 流的所有逻辑。
//!
//! 两个值得注意的策略：
//! - `\n` 不被跳过，而是作为 NEWLINE token 发出（语句终结符）；
//! - `*` 与 `&` 各有两种含义。发出 token 前，词法器越过空白窥视
//!   下一个非空白字符：若它能开启一个标识符、或是 `*`/`&`/`(`/`[`，
//!   则发出前缀形态 `Deref`/`AddressOf`，否则发出二元形态
//!   `Star`/`BitAnd`。解析器只把前缀形态当一元算符用。

mod token;
#[cfg(test)]
mod test;

pub use token::{Token, TokenKind};

use crate::diagnostics::{codes, Diagnostic, DiagnosticBag, Label, Phase, Position, Span};
use codes::ErrorCode;

// --- 1. Lexer 定义 ---

/// 词法分析器，负责将源代码转换为 Token 流。
pub struct Lexer<'a> {
    /// 源代码的引用。
    source: &'a str,
    /// 诊断信息收集器的可变引用，用于报告错误。
    diagnostics: &'a mut DiagnosticBag,
    /// 当前扫描位置（字节索引）。
    current: usize,
    /// 当前行号（从 1 开始）。
    line: u32,
    /// 当前列号（从 1 开始，遇 `\n` 归 1）。
    column: u32,
    /// 当前 Token 的起始信息，由 scan_token 设置。
    tok_start: Position,
    tok_start_byte: usize,
    /// `peek` 期间置位：窥探产生的诊断一律吞掉，绝不污染主游标的报告。
    quiet: bool,
}

impl<'a> Lexer<'a> {
    /// 创建一个新的 Lexer 实例。
    pub fn new(source: &'a str, diagnostics: &'a mut DiagnosticBag) -> Self {
        Lexer {
            source,
            diagnostics,
            current: 0,
            line: 1,
            column: 1,
            tok_start: Position::new(1, 1),
            tok_start_byte: 0,
            quiet: false,
        }
    }

    /// 消费 Lexer 并扫描所有 Token（含结尾的 EOF）。
    pub fn tokenize_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    /// 返回未来第 k 个 Token（k >= 1），不推进主游标。
    /// 实现方式是快照游标状态、静默扫描、再恢复；代价是 O(k)。
    pub fn peek(&mut self, k: usize) -> Token {
        let saved = (self.current, self.line, self.column, self.quiet);
        self.quiet = true;
        let mut tok = self.make_eof();
        for _ in 0..k.max(1) {
            tok = self.next_token();
        }
        self.current = saved.0;
        self.line = saved.1;
        self.column = saved.2;
        self.quiet = saved.3;
        tok
    }
}

/// 对源代码做完整的词法分析，诊断全部进入 `diagnostics`。
/// 返回的向量恰好以一个 EOF 结尾。
pub fn lex(source: &str, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
    Lexer::new(source, diagnostics).tokenize_all()
}

// --- 2. 底层字符操作逻辑 ---

/// Lexer 的核心功能：底层字符操作和位置追踪。
trait LexerCore {
    /// 检查是否已到达源代码的末尾。
    fn is_at_end(&self) -> bool;
    /// 窥视当前位置之后第 `ahead` 个字符，不消费。
    fn peek_char(&self, ahead: usize) -> char;
    /// 越过空白，窥视下一个非空白字符。用于 `*`/`&` 的语境判定。
    fn peek_nonspace_char(&self) -> char;
    /// 消费当前字符并前进一个位置。
    fn advance(&mut self) -> char;
    /// 若当前字符与预期匹配则消费并返回 `true`。
    fn match_char(&mut self, expected: char) -> bool;
    /// 用给定种类和当前扫描范围创建一个 Token。
    fn make_token(&mut self, kind: TokenKind) -> Token;
    fn make_eof(&self) -> Token;
    /// 在给定位置报告一条词法诊断（peek 期间静默）。
    fn emit_error(&mut self, code: &'static ErrorCode, pos: Position, span: Span, msg: String);
}

impl<'a> LexerCore for Lexer<'a> {
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek_char(&self, ahead: usize) -> char {
        self.source[self.current..].chars().nth(ahead).unwrap_or('\0')
    }

    fn peek_nonspace_char(&self) -> char {
        for ch in self.source[self.current..].chars() {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                continue;
            }
            return ch;
        }
        '\0'
    }

    fn advance(&mut self) -> char {
        let Some(c) = self.source[self.current..].chars().next() else {
            return '\0';
        };
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_char(0) != expected || self.is_at_end() {
            return false;
        }
        self.advance();
        true
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        let span = Span::new(self.tok_start_byte, self.current);
        Token {
            kind,
            lexeme: self.source[self.tok_start_byte..self.current].to_string(),
            start: self.tok_start,
            end: Position::new(self.line, self.column),
            span,
        }
    }

    fn make_eof(&self) -> Token {
        let pos = Position::new(self.line, self.column);
        Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            start: pos,
            end: pos,
            span: Span::new(self.current, self.current),
        }
    }

    fn emit_error(&mut self, code: &'static ErrorCode, pos: Position, span: Span, msg: String) {
        if self.quiet {
            return;
        }
        self.diagnostics.report(
            Diagnostic::error(code, Phase::Lexer, pos, Label::new(span, code.message))
                .with_dynamic_message(msg),
        );
    }
}

// --- 3. 主要词法识别逻辑 ---

/// 高级的 Token 识别逻辑。
trait TokenScanner {
    /// 扫描并返回下一个 Token。空白与注释被跳过，`\n` 发出 NEWLINE。
    fn next_token(&mut self) -> Token;
    /// 在空白/注释处理完之后识别一个实质 Token。
    fn scan_token(&mut self) -> Token;
    /// 跳过空格、制表符、回车与注释。遇到 `\n` 返回 true（调用方发 NEWLINE）。
    fn skip_to_significant(&mut self) -> bool;
    /// 扫描标识符或关键字。
    fn scan_identifier(&mut self) -> Token;
    /// 扫描数字字面量（十进制、十六进制、二进制、八进制，小数与指数）。
    fn scan_number(&mut self) -> Token;
    /// 扫描字符串字面量（`"` 转义形式或反引号原始形式）。
    fn scan_string(&mut self, quote: char) -> Token;
    /// 扫描字符字面量。
    fn scan_char_literal(&mut self) -> Token;
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> TokenScanner for Lexer<'a> {
    fn next_token(&mut self) -> Token {
        loop {
            self.tok_start = Position::new(self.line, self.column);
            self.tok_start_byte = self.current;

            if self.skip_to_significant() {
                // `\n` 被消费，作为语句终结符发出
                return Token {
                    kind: TokenKind::Newline,
                    lexeme: "\n".to_string(),
                    start: self.tok_start,
                    end: Position::new(self.line, self.column),
                    span: Span::new(self.tok_start_byte, self.current),
                };
            }

            if self.is_at_end() {
                return self.make_eof();
            }

            // skip_to_significant 可能消费了注释，重新记录起点
            if self.current != self.tok_start_byte {
                continue;
            }

            return self.scan_token();
        }
    }

    fn skip_to_significant(&mut self) -> bool {
        loop {
            match self.peek_char(0) {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.tok_start = Position::new(self.line, self.column);
                    self.tok_start_byte = self.current;
                    self.advance();
                    return true;
                }
                '/' => {
                    if self.peek_char(1) == '/' {
                        self.advance();
                        self.advance();
                        while !self.is_at_end() && self.peek_char(0) != '\n' {
                            self.advance();
                        }
                    } else if self.peek_char(1) == '*' {
                        let open_pos = Position::new(self.line, self.column);
                        let open_byte = self.current;
                        self.advance();
                        self.advance();
                        // 块注释支持嵌套
                        let mut depth = 1;
                        while !self.is_at_end() && depth > 0 {
                            let ch = self.advance();
                            if ch == '/' && self.peek_char(0) == '*' {
                                self.advance();
                                depth += 1;
                            } else if ch == '*' && self.peek_char(0) == '/' {
                                self.advance();
                                depth -= 1;
                            }
                        }
                        if depth != 0 {
                            self.emit_error(
                                &codes::E0001_UNCLOSED_BLOCK_COMMENT,
                                open_pos,
                                Span::new(open_byte, open_byte + 2),
                                "unclosed block comment".to_string(),
                            );
                        }
                    } else {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        let c = self.advance();

        match c {
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            '{' => self.make_token(TokenKind::LBrace),
            '}' => self.make_token(TokenKind::RBrace),
            '[' => self.make_token(TokenKind::LBrack),
            ']' => self.make_token(TokenKind::RBrack),
            ',' => self.make_token(TokenKind::Comma),
            ';' => self.make_token(TokenKind::Semicolon),
            '?' => self.make_token(TokenKind::Question),
            '~' => self.make_token(TokenKind::Tilde),
            '^' => self.make_token(TokenKind::Caret),
            '.' => {
                if self.peek_char(0) == '.' && self.peek_char(1) == '.' {
                    self.advance();
                    self.advance();
                    self.make_token(TokenKind::Ellipsis)
                } else {
                    self.make_token(TokenKind::Dot)
                }
            }
            ':' => {
                if self.match_char('=') {
                    // `:=` 与 `=` 共用 Assign 种类，仅凭词素区分
                    self.make_token(TokenKind::Assign)
                } else {
                    self.make_token(TokenKind::Colon)
                }
            }
            '+' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::PlusAssign)
                } else if self.match_char('+') {
                    self.make_token(TokenKind::PlusPlus)
                } else {
                    self.make_token(TokenKind::Plus)
                }
            }
            '-' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::MinusAssign)
                } else if self.match_char('>') {
                    self.make_token(TokenKind::Arrow)
                } else if self.match_char('-') {
                    self.make_token(TokenKind::MinusMinus)
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }
            '*' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::MulAssign)
                } else {
                    let next = self.peek_nonspace_char();
                    if is_ident_start(next) || next == '*' || next == '&' || next == '(' || next == '[' {
                        self.make_token(TokenKind::Deref)
                    } else {
                        self.make_token(TokenKind::Star)
                    }
                }
            }
            '&' => {
                if self.match_char('&') {
                    self.make_token(TokenKind::AndAnd)
                } else {
                    let next = self.peek_nonspace_char();
                    if is_ident_start(next) || next == '*' || next == '&' || next == '(' || next == '[' {
                        self.make_token(TokenKind::AddressOf)
                    } else {
                        self.make_token(TokenKind::BitAnd)
                    }
                }
            }
            '/' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::DivAssign)
                } else {
                    self.make_token(TokenKind::Slash)
                }
            }
            '%' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::ModAssign)
                } else {
                    self.make_token(TokenKind::Percent)
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.make_token(TokenKind::OrOr)
                } else {
                    self.make_token(TokenKind::BitOr)
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::NotEq)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '=' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::Eq)
                } else if self.match_char('>') {
                    self.make_token(TokenKind::FatArrow)
                } else {
                    self.make_token(TokenKind::Assign)
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::Le)
                } else if self.match_char('<') {
                    self.make_token(TokenKind::Shl)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.make_token(TokenKind::Ge)
                } else if self.match_char('>') {
                    self.make_token(TokenKind::Shr)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }
            '\'' => self.scan_char_literal(),
            '"' | '`' => self.scan_string(c),
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c) => self.scan_identifier(),
            _ => {
                let pos = self.tok_start;
                let span = Span::new(self.tok_start_byte, self.current);
                self.emit_error(
                    &codes::E0000_UNRECOGNIZED_CHAR,
                    pos,
                    span,
                    format!("unexpected character '{}'", c),
                );
                self.make_token(TokenKind::Illegal)
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while is_ident_part(self.peek_char(0)) {
            self.advance();
        }
        let text = &self.source[self.tok_start_byte..self.current];
        let kind = TokenKind::lookup_keyword(text).unwrap_or(TokenKind::Ident);
        self.make_token(kind)
    }

    fn scan_number(&mut self) -> Token {
        // 第一个数字已被 scan_token 消费；按前缀分派进制
        let first = self.source[self.tok_start_byte..].chars().next().unwrap_or('0');

        if first == '0' && matches!(self.peek_char(0), 'x' | 'X') {
            self.advance();
            while self.peek_char(0).is_ascii_hexdigit() {
                self.advance();
            }
            return self.make_token(TokenKind::Int);
        }

        if first == '0' && matches!(self.peek_char(0), 'b' | 'B') {
            self.advance();
            while matches!(self.peek_char(0), '0' | '1') {
                self.advance();
            }
            return self.make_token(TokenKind::Int);
        }

        if first == '0' && self.peek_char(0).is_ascii_digit() {
            // 前导 0：八进制。非法数字报错但继续吃完整串
            let mut invalid = false;
            while self.peek_char(0).is_ascii_digit() {
                let p = self.peek_char(0);
                if ('0'..='7').contains(&p) {
                    self.advance();
                } else {
                    invalid = true;
                    while self.peek_char(0).is_ascii_digit() {
                        self.advance();
                    }
                    break;
                }
            }
            if invalid {
                let pos = self.tok_start;
                let span = Span::new(self.tok_start_byte, self.current);
                self.emit_error(
                    &codes::E0002_INVALID_OCTAL_DIGIT,
                    pos,
                    span,
                    "invalid digit in octal literal".to_string(),
                );
            }
            return self.make_token(TokenKind::Int);
        }

        let mut is_float = false;
        while self.peek_char(0).is_ascii_digit() {
            self.advance();
        }
        // 小数点必须后随数字，否则它属于后面的 token（如成员访问）
        if self.peek_char(0) == '.' && self.peek_char(1).is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek_char(0).is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek_char(0), 'e' | 'E') {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(0), '+' | '-') {
                self.advance();
            }
            if !self.peek_char(0).is_ascii_digit() {
                let pos = self.tok_start;
                let span = Span::new(self.tok_start_byte, self.current);
                self.emit_error(
                    &codes::E0003_MALFORMED_EXPONENT,
                    pos,
                    span,
                    "malformed exponent in number literal".to_string(),
                );
            }
            while self.peek_char(0).is_ascii_digit() {
                self.advance();
            }
        }

        self.make_token(if is_float { TokenKind::Float } else { TokenKind::Int })
    }

    fn scan_string(&mut self, quote: char) -> Token {
        if quote == '`' {
            while !self.is_at_end() && self.peek_char(0) != '`' {
                self.advance();
            }
            if self.is_at_end() {
                let pos = self.tok_start;
                let span = Span::new(self.tok_start_byte, self.current);
                self.emit_error(
                    &codes::E0005_UNTERMINATED_RAW_STRING,
                    pos,
                    span,
                    "unterminated raw string literal".to_string(),
                );
                return self.make_token(TokenKind::Illegal);
            }
            self.advance();
            return self.make_token(TokenKind::Str);
        }

        // 转义序列原样留在词素中，解码推迟到解析/代码生成阶段
        while !self.is_at_end() {
            let ch = self.advance();
            if ch == '\\' {
                if self.is_at_end() {
                    let pos = self.tok_start;
                    let span = Span::new(self.tok_start_byte, self.current);
                    self.emit_error(
                        &codes::E0007_UNTERMINATED_ESCAPE,
                        pos,
                        span,
                        "unterminated escape in string".to_string(),
                    );
                    break;
                }
                self.advance();
                continue;
            }
            if ch == '"' {
                return self.make_token(TokenKind::Str);
            }
        }
        let pos = self.tok_start;
        let span = Span::new(self.tok_start_byte, self.current);
        self.emit_error(
            &codes::E0004_UNTERMINATED_STRING,
            pos,
            span,
            "unterminated string literal".to_string(),
        );
        self.make_token(TokenKind::Illegal)
    }

    fn scan_char_literal(&mut self) -> Token {
        if self.is_at_end() {
            let pos = self.tok_start;
            let span = Span::new(self.tok_start_byte, self.current);
            self.emit_error(
                &codes::E0006_UNTERMINATED_CHAR,
                pos,
                span,
                "unterminated char literal".to_string(),
            );
            return self.make_token(TokenKind::Illegal);
        }
        let ch = self.advance();
        if ch == '\\' {
            if self.is_at_end() {
                let pos = self.tok_start;
                let span = Span::new(self.tok_start_byte, self.current);
                self.emit_error(
                    &codes::E0007_UNTERMINATED_ESCAPE,
                    pos,
                    span,
                    "unterminated char escape".to_string(),
                );
                return self.make_token(TokenKind::Illegal);
            }
            self.advance();
        }
        if self.peek_char(0) != '\'' {
            let pos = self.tok_start;
            let span = Span::new(self.tok_start_byte, self.current);
            self.emit_error(
                &codes::E0006_UNTERMINATED_CHAR,
                pos,
                span,
                "unterminated/invalid char literal".to_string(),
            );
            // 尝试恢复：跳过直到下一个单引号或空白
            while !self.is_at_end() && self.peek_char(0) != '\'' && !self.peek_char(0).is_whitespace()
            {
                self.advance();
            }
        }
        if self.peek_char(0) == '\'' {
            self.advance();
        }
        self.make_token(TokenKind::Char)
    }
}

// next_token 是 Lexer 的公共入口，但其实现挂在私有 trait 上；
// 在这里转发，保持外部调用面简洁。
impl<'a> Lexer<'a> {
    /// 返回下一个 Token。到达末尾后恒返回 EOF。
    pub fn next_token(&mut self) -> Token {
        TokenScanner::next_token(self)
    }
}
