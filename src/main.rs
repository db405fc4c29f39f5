// src/main.rs — ecc 命令行驱动。
//
// 用法：ecc [ll|debug|help] [-o DIR] <file.ec | dir>...
// 输入可以是 .ec 文件或递归搜索的目录；多文件合并为一个编译单元
// （结构体声明重排到其余声明之前），输出单个 <stem>.ll。

use clap::Parser as ClapParser;
use ecc::codegen;
use ecc::diagnostics::DiagnosticBag;
use ecc::lexer;
use ecc::parser::{self, ast, printer};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use walkdir::WalkDir;

/// 一个用 Rust 编写的、基于 LLVM 的 ec 语言编译器
#[derive(ClapParser, Debug)]
#[command(name = "ecc", version, about, long_about = None)]
struct Cli {
    /// 模式与输入：`ll`（打印 LLVM IR）、`debug`（附带 token 与 AST
    /// 转储）、`help`，其余参数是 .ec 文件或目录
    #[arg(required = true)]
    args: Vec<String>,

    /// 输出目录（不存在则创建）
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

/// 收集输入里的全部 .ec 源文件（目录递归展开）。
fn collect_sources(inputs: &[String]) -> Vec<PathBuf> {
    let mut result = Vec::new();
    for arg in inputs {
        let p = Path::new(arg);
        if p.is_dir() {
            for entry in WalkDir::new(p).into_iter().filter_map(Result::ok) {
                let path = entry.path();
                if path.is_file() && path.extension().map(|e| e == "ec").unwrap_or(false) {
                    result.push(path.to_path_buf());
                }
            }
        } else if p.is_file() {
            if p.extension().map(|e| e == "ec").unwrap_or(false) {
                result.push(p.to_path_buf());
            }
        } else {
            eprintln!("No such file/dir: {}", p.display());
        }
    }
    result
}

fn main() {
    let cli = Cli::parse();

    let mut emit_ir_only = false;
    let mut debug = false;
    let mut inputs = Vec::new();
    for arg in &cli.args {
        match arg.as_str() {
            "ll" => emit_ir_only = true,
            "debug" => debug = true,
            "help" => {
                use clap::CommandFactory;
                Cli::command().print_help().ok();
                return;
            }
            other => inputs.push(other.to_string()),
        }
    }

    if inputs.is_empty() {
        eprintln!("No source files specified");
        process::exit(1);
    }

    if !cli.output.exists() {
        if let Err(e) = fs::create_dir_all(&cli.output) {
            eprintln!("Failed to create output dir {}: {}", cli.output.display(), e);
            process::exit(1);
        }
    }

    let src_files = collect_sources(&inputs);
    if src_files.is_empty() {
        eprintln!("No .ec source files found.");
        process::exit(1);
    }

    // 前端：逐文件词法+语法分析，合并为一个 Program。
    // 结构体声明排到最前，保证代码生成的准备遍先看到所有名字。
    let mut struct_decls = Vec::new();
    let mut other_decls = Vec::new();
    let mut frontend_failed = false;

    for path in &src_files {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open {}: {}", path.display(), e);
                process::exit(1);
            }
        };

        let mut diagnostics = DiagnosticBag::new(&source);
        let tokens = lexer::lex(&source, &mut diagnostics);

        if debug {
            println!("--- tokens ({}) ---", path.display());
            for t in &tokens {
                println!("{}", t);
            }
        }

        let file_prog = parser::parse(&tokens, &mut diagnostics);

        if diagnostics.has_errors() {
            diagnostics.print(&path.display().to_string());
            frontend_failed = true;
        }

        for d in file_prog.decls {
            match d {
                ast::Decl::Struct(_) => struct_decls.push(d),
                other => other_decls.push(other),
            }
        }
    }

    if frontend_failed {
        eprintln!("Compilation failed during parsing.");
        process::exit(1);
    }

    let mut merged = ast::Program::default();
    merged.decls.extend(struct_decls);
    merged.decls.extend(other_decls);

    if debug {
        println!("--- AST (merged) ---");
        print!("{}", printer::print_program(&merged));
    }

    // 代码生成
    let ir = match codegen::codegen(&merged) {
        Ok(ir) => ir,
        Err(errors) => {
            for e in errors {
                eprintln!("[codegen error] {}", e);
            }
            eprintln!("codegen failed");
            process::exit(1);
        }
    };

    if emit_ir_only || debug {
        println!("--- LLVM IR ---");
        println!("{}", ir);
    }

    let stem = if src_files.len() == 1 {
        src_files[0]
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("out")
            .to_string()
    } else {
        "merged".to_string()
    };
    let out_file = cli.output.join(format!("{}.ll", stem));

    if let Err(e) = fs::write(&out_file, &ir) {
        eprintln!("Failed to write {}: {}", out_file.display(), e);
        process::exit(1);
    }
    println!("Wrote IR to {}", out_file.display());
}
