//! `ecc`：ec 语言（`.ec`）的编译器前端与 LLVM-IR 生成器。
//!
//! 流水线：源文本 → 词法分析（Token 流，NEWLINE 作语句终结符）→
//! 递归下降解析（AST）→ 两遍代码生成（结构体/原型准备 + 函数体
//! 下放）→ LLVM-IR 文本。词法/语法错误进 `DiagnosticBag`，不中断
//! 流程；代码生成置 failed 标志，任何错误都会阻止 IR 输出。

pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod codegen;

use diagnostics::DiagnosticBag;

/// 编译一段 ec 源代码，返回 LLVM IR 文本。
///
/// 出错时返回收集到的全部错误消息（词法/语法错误是
/// `line:col message` 形式，代码生成错误是纯消息）。
pub fn compile(source: &str) -> Result<String, Vec<String>> {
    let mut diagnostics = DiagnosticBag::new(source);

    let tokens = lexer::lex(source, &mut diagnostics);
    let program = parser::parse(&tokens, &mut diagnostics);

    if diagnostics.has_errors() {
        return Err(diagnostics
            .iter()
            .map(|d| format!("{} {}", d.position(), d.message()))
            .collect());
    }

    codegen::codegen(&program).map_err(|errs| errs.iter().map(|e| e.to_string()).collect())
}
