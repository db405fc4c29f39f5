//! 编译器诊断系统。
//! `DiagnosticBag` 在词法和语法分析阶段收集所有结构化诊断，
//! 并用 `ariadne` 渲染为带标注的报告。每条报告之前还会打印一行
//! 机器可解析的前缀（`[lexer error] path:line:col msg` 等），
//! 方便脚本和测试直接匹配。

pub mod codes;

use ariadne::{Color, Label as AriadneLabel, Report, ReportKind, Source};
use codes::ErrorCode;
use std::fmt;
use thiserror::Error;

// --- 位置与范围 ---

/// 源代码中的一个位置，行列均从 1 开始；列在 `\n` 处归 1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 源代码中的一个字节范围（半开区间），供 ariadne 标注使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

// --- 诊断等级、阶段与标注 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// 产生诊断的编译阶段，决定机器可解析前缀中的标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexer,
    Parser,
}

impl Phase {
    fn tag(self) -> &'static str {
        match self {
            Phase::Lexer => "lexer error",
            Phase::Parser => "parser error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

// --- Diagnostic 结构体 ---

#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: &'static str,
    level: DiagnosticLevel,
    phase: Phase,
    // message 是可变的 String，以便插入动态信息（具体的字符、类型名等）
    message: String,
    // 机器可解析前缀所需的行列位置
    pos: Position,
    labels: Vec<Label>,
    notes: Vec<String>,
}

impl Diagnostic {
    /// 主构造函数，以一个 ErrorCode 引用作为核心输入。
    pub fn new(
        error_code: &'static ErrorCode,
        phase: Phase,
        pos: Position,
        primary_label: Label,
    ) -> Self {
        Self {
            code: error_code.code,
            level: error_code.level,
            phase,
            message: error_code.message.to_string(),
            pos,
            labels: vec![primary_label],
            notes: Vec::new(),
        }
    }

    pub fn error(
        error_code: &'static ErrorCode,
        phase: Phase,
        pos: Position,
        primary_label: Label,
    ) -> Self {
        assert!(
            matches!(error_code.level, DiagnosticLevel::Error),
            "Tried to create an error diagnostic with a non-error code."
        );
        Self::new(error_code, phase, pos, primary_label)
    }

    /// 覆盖默认消息，用于插入动态信息。
    pub fn with_dynamic_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn code(&self) -> &str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// 机器可解析的一行表示：`[lexer error] path:line:col msg`。
    pub fn oneline(&self, file_name: &str) -> String {
        format!(
            "[{}] {}:{}:{} {}",
            self.phase.tag(),
            file_name,
            self.pos.line,
            self.pos.column,
            self.message
        )
    }
}

// --- DiagnosticBag ---

/// 诊断背包：持有源代码副本与收集到的全部诊断。
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    source: String,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            diagnostics: Vec::new(),
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 将所有诊断打印到 stderr：先是一行机器可解析前缀，再是 ariadne 报告。
    pub fn print(&self, file_name: &str) {
        if self.diagnostics.is_empty() {
            return;
        }
        print_all(file_name, &self.source, &self.diagnostics);
    }
}

// --- Printer 打印逻辑 ---

fn print_all(file_name: &str, source_code: &str, diagnostics: &[Diagnostic]) {
    let cache = (file_name, Source::from(source_code.to_string()));

    for diag in diagnostics {
        eprintln!("{}", diag.oneline(file_name));

        if diag.labels.is_empty() {
            continue;
        }

        let kind = match diag.level {
            DiagnosticLevel::Error => ReportKind::Error,
            DiagnosticLevel::Warning => ReportKind::Warning,
        };

        let color = match diag.level {
            DiagnosticLevel::Error => Color::Red,
            DiagnosticLevel::Warning => Color::Yellow,
        };

        let primary = &diag.labels[0];

        let mut report = Report::build(kind, (file_name, primary.span.start..primary.span.end))
            .with_message(&diag.message)
            .with_code(diag.code);

        for (i, label_info) in diag.labels.iter().enumerate() {
            let label = AriadneLabel::new((file_name, label_info.span.start..label_info.span.end))
                .with_message(&label_info.message);

            let final_label = if i == 0 {
                label.with_color(color)
            } else {
                label.with_color(Color::Blue)
            };
            report.add_label(final_label);
        }

        for note in &diag.notes {
            report = report.with_note(note);
        }

        report.finish().eprint(cache.clone()).ok();
    }
}

// --- 代码生成错误 ---

/// 代码生成阶段的错误。与词法/语法诊断不同，它不携带源码位置，
/// 按 `[codegen error] <msg>` 的形状打印。
#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("{0}")]
    Message(String),

    #[error("module verification failed: {0}")]
    Verification(String),
}
