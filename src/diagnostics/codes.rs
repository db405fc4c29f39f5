// src/diagnostics/codes.rs

use crate::diagnostics::DiagnosticLevel;

/// 一个具体的错误码及其关联信息。
/// 这个结构体是整个编译器诊断信息的唯一事实来源。
#[derive(Debug, Clone)]
pub struct ErrorCode {
    pub code: &'static str,
    pub level: DiagnosticLevel,
    pub message: &'static str,
    pub explanation: &'static str,
}

/*
E00xx: 词法分析 (Lexical Analysis) 错误。

E01xx: 语法分析 (Parsing / Syntax) 错误。

E03xx: 代码生成 (Code Generation) 错误。
*/

// --- E00xx: Lexical Analysis Errors ---

pub const E0000_UNRECOGNIZED_CHAR: ErrorCode = ErrorCode {
    code: "E0000",
    level: DiagnosticLevel::Error,
    message: "Unrecognized character",
    explanation: "The compiler encountered a character that is not part of the ec language definition. \
                  This can happen due to typos or trying to use unsupported symbols. The lexer emits an \
                  ILLEGAL token and keeps scanning.",
};

pub const E0001_UNCLOSED_BLOCK_COMMENT: ErrorCode = ErrorCode {
    code: "E0001",
    level: DiagnosticLevel::Error,
    message: "Unclosed block comment",
    explanation: "A `/*` comment was opened (possibly nested) but never closed with `*/` before the end \
                  of the file. The diagnostic points at the opening `/*`.",
};

pub const E0002_INVALID_OCTAL_DIGIT: ErrorCode = ErrorCode {
    code: "E0002",
    level: DiagnosticLevel::Error,
    message: "Invalid digit in octal literal",
    explanation: "A number literal starting with `0` is octal; only the digits 0-7 are allowed. \
                  Scanning continues past the offending digits so later errors are still reported.",
};

pub const E0003_MALFORMED_EXPONENT: ErrorCode = ErrorCode {
    code: "E0003",
    level: DiagnosticLevel::Error,
    message: "Malformed exponent in number literal",
    explanation: "After `e` or `E` (and an optional sign) at least one decimal digit is required, \
                  as in `1e10` or `2.5e-3`.",
};

pub const E0004_UNTERMINATED_STRING: ErrorCode = ErrorCode {
    code: "E0004",
    level: DiagnosticLevel::Error,
    message: "Unterminated string literal",
    explanation: "A `\"` string reached the end of the file without a closing quote. No STRING token \
                  is produced for the literal; an ILLEGAL token takes its place.",
};

pub const E0005_UNTERMINATED_RAW_STRING: ErrorCode = ErrorCode {
    code: "E0005",
    level: DiagnosticLevel::Error,
    message: "Unterminated raw string literal",
    explanation: "A backtick-quoted raw string reached the end of the file without a closing backtick.",
};

pub const E0006_UNTERMINATED_CHAR: ErrorCode = ErrorCode {
    code: "E0006",
    level: DiagnosticLevel::Error,
    message: "Unterminated or invalid char literal",
    explanation: "A char literal must contain exactly one character or escape sequence followed by a \
                  closing `'`.",
};

pub const E0007_UNTERMINATED_ESCAPE: ErrorCode = ErrorCode {
    code: "E0007",
    level: DiagnosticLevel::Error,
    message: "Unterminated escape sequence",
    explanation: "A `\\` escape was started but the file ended before the escaped character.",
};

// --- E01xx: Syntax Analysis (Parsing) Errors ---

pub const E0100_SYNTAX_ERROR: ErrorCode = ErrorCode {
    code: "E0100",
    level: DiagnosticLevel::Error,
    message: "Syntax error",
    explanation: "The arrangement of tokens does not match any known grammar rule. This is the \
                  general-purpose syntax error: check for mismatched brackets, missing type \
                  annotations, or misplaced operators. The parser fabricates a placeholder node and \
                  keeps going, so one mistake can produce follow-on errors.",
};

pub const E0101_VARIADIC_NOT_LAST: ErrorCode = ErrorCode {
    code: "E0101",
    level: DiagnosticLevel::Error,
    message: "Variadic parameter must be the last parameter",
    explanation: "A `...` parameter can only appear in the final position of a parameter list, \
                  e.g. `fn f(a i32, rest ...i32)`.",
};

pub const E0102_INVALID_DECL_TARGET: ErrorCode = ErrorCode {
    code: "E0102",
    level: DiagnosticLevel::Error,
    message: "`:=` requires an identifier on the left-hand side",
    explanation: "Short variable declarations bind a fresh name, so the left-hand side must be a \
                  plain identifier. To write through an index or member, use `=` instead.",
};

// --- E03xx: Code Generation Errors ---

pub const E0300_LLVM_VERIFICATION_FAILED: ErrorCode = ErrorCode {
    code: "E0300",
    level: DiagnosticLevel::Error,
    message: "LLVM module verification failed",
    explanation: "The generated LLVM IR is invalid. This indicates a bug in the ec compiler's code \
                  generation logic; the .ll file is not written.",
};
