// In src/codegen/test.rs

use crate::compile;

// --- Test Harness ---

/// 端到端辅助函数：源代码 → 词法 → 解析 → 代码生成 → LLVM IR 文本。
/// 任何一步失败都 panic 并带上错误，测试里这样处理是可接受的。
/// 走到这里说明模块已通过 `Module::verify`。
fn codegen_test_harness(source: &str) -> String {
    match compile(source) {
        Ok(ir) => ir,
        Err(errors) => panic!("compilation failed: {:#?}", errors),
    }
}

/// 失败路径辅助函数：期望编译报错，返回错误列表。
fn codegen_expect_errors(source: &str) -> Vec<String> {
    match compile(source) {
        Ok(ir) => panic!("expected compilation to fail, but got IR:\n{}", ir),
        Err(errors) => errors,
    }
}

// --- Test Cases ---

#[test]
fn test_return_integer_literal() {
    let llvm_ir = codegen_test_harness("fn main() i32 { return 0 }");
    println!("--- IR ---\n{}\n", llvm_ir);

    assert!(
        llvm_ir.contains("define i32 @main()"),
        "expected 'define i32 @main()'"
    );
    assert!(llvm_ir.contains("ret i32 0"), "expected 'ret i32 0'");
}

#[test]
fn test_short_var_decl_and_constant_fold() {
    let source = r#"
fn main() i32 {
    x := 40 + 2
    return x
}
"#;
    let llvm_ir = codegen_test_harness(source);
    println!("--- IR ---\n{}\n", llvm_ir);

    // 两个常量的加法被 IRBuilder 折叠，42 直接存进栈槽
    assert!(llvm_ir.contains("alloca i32"), "expected a stack slot for x");
    assert!(llvm_ir.contains("store i32 42"), "expected 'store i32 42'");
    assert!(llvm_ir.contains("ret i32"), "expected an i32 return");
}

#[test]
fn test_array_literal_and_bounds_checked_index() {
    let source = r#"
fn main() i32 {
    a := [10, 20, 30]
    return a[1]
}
"#;
    let llvm_ir = codegen_test_harness(source);
    println!("--- IR ---\n{}\n", llvm_ir);

    // 描述符 + 数据各一次 malloc；len 字段存 3
    assert!(
        llvm_ir.contains("%Array_internal = type { i8*, i64, i64, i64 }"),
        "expected the slice descriptor struct type"
    );
    assert!(llvm_ir.contains("call i8* @malloc"), "expected malloc calls");
    assert!(llvm_ir.contains("store i64 3"), "expected len=3 store");

    // 索引必须带对 len 字段的边界检查与陷阱分支
    assert!(
        llvm_ir.contains("icmp ult"),
        "expected an unsigned bounds check against len"
    );
    assert!(llvm_ir.contains("idx_oob"), "expected the out-of-bounds block");
    assert!(
        llvm_ir.contains("call void @abort"),
        "expected abort on out-of-bounds"
    );
    assert!(llvm_ir.contains("unreachable"), "expected unreachable after abort");
}

#[test]
fn test_append_growth_paths() {
    let source = r#"
fn main() i32 {
    a := [10]
    append(a, 20)
    append(a, 30)
    return a[2]
}
"#;
    let llvm_ir = codegen_test_harness(source);
    println!("--- IR ---\n{}\n", llvm_ir);

    // 快路径与增长路径都要在
    assert!(llvm_ir.contains("has_space"), "expected the fast-path check");
    assert!(llvm_ir.contains("append_grow"), "expected the grow path");
    // 增长时按 new_cap * elem_size 申请新缓冲
    assert!(llvm_ir.contains("new_cap"), "expected capacity doubling");
    assert!(llvm_ir.contains("new_bytes"), "expected new_cap * elem_size malloc size");
    assert!(
        llvm_ir.matches("call i8* @malloc").count() >= 3,
        "expected mallocs for literal and both growth paths"
    );
}

#[test]
fn test_struct_layout_and_member_access() {
    let source = r#"
struct P {
    x i32
    y i32
}

fn main() i32 {
    p := P{1, 2}
    return p.x + p.y
}
"#;
    let llvm_ir = codegen_test_harness(source);
    println!("--- IR ---\n{}\n", llvm_ir);

    assert!(
        llvm_ir.contains("%P = type { i32, i32 }"),
        "expected named struct type with body {{i32, i32}}"
    );
    // 两个字段各一次 GEP + load
    assert!(llvm_ir.contains("x.addr"), "expected GEP for field x");
    assert!(llvm_ir.contains("y.addr"), "expected GEP for field y");
    assert!(llvm_ir.contains("ret i32"), "expected an i32 return");
}

#[test]
fn test_struct_literal_named_inits_fill_by_name() {
    let source = r#"
struct P {
    x i32
    y i32
}

fn main() i32 {
    p := P{y: 2, x: 1}
    return p.x
}
"#;
    let llvm_ir = codegen_test_harness(source);

    // 命名初始化按名对位：两个槽位都被写入
    assert!(llvm_ir.contains("P.field0.addr"));
    assert!(llvm_ir.contains("P.field1.addr"));
}

#[test]
fn test_for_in_numeric_loop_shape() {
    let source = r#"
fn main() i32 {
    for i in 3 {
        printf("%d\n", i)
    }
    return 0
}
"#;
    let llvm_ir = codegen_test_harness(source);
    println!("--- IR ---\n{}\n", llvm_ir);

    assert!(llvm_ir.contains("forin.cond"), "expected a loop header block");
    assert!(llvm_ir.contains("forin.body"), "expected a loop body block");
    assert!(llvm_ir.contains("forin.incr"), "expected an increment block");
    assert!(llvm_ir.contains("@printf"), "expected a printf call");
}

#[test]
fn test_infinite_for_with_break() {
    let source = r#"
fn main() i32 {
    i := 0
    for {
        i = i + 1
        if i == 3 {
            break
        }
    }
    return i
}
"#;
    let llvm_ir = codegen_test_harness(source);

    assert!(llvm_ir.contains("for.loop"));
    assert!(llvm_ir.contains("for.end"));
    // break 之后的死代码仍有归属块
    assert!(llvm_ir.contains("after.break"));
}

#[test]
fn test_c_style_for() {
    let source = r#"
fn main() i32 {
    s := 0
    for (i := 0; i < 4; i++) {
        s = s + i
    }
    return s
}
"#;
    let llvm_ir = codegen_test_harness(source);

    assert!(llvm_ir.contains("for.cond"));
    assert!(llvm_ir.contains("for.inc"));
    assert!(llvm_ir.contains("for.after"));
}

#[test]
fn test_division_emits_zero_check() {
    let llvm_ir = codegen_test_harness("fn div(a i32, b i32) i32 { return a / b }");

    assert!(llvm_ir.contains("div_by_zero"), "expected a zero-check branch");
    assert!(llvm_ir.contains("call void @abort"));
    assert!(llvm_ir.contains("unreachable"));
    assert!(llvm_ir.contains("sdiv"));
}

#[test]
fn test_println_assembles_format_string() {
    let source = r#"
fn main() i32 {
    println("hi", 1, 2.5)
    return 0
}
"#;
    let llvm_ir = codegen_test_harness(source);

    // 指针 %s、整数 %lld（拓宽 i64）、浮点 %f，空格分隔 + 换行
    assert!(
        llvm_ir.contains("%s %lld %f"),
        "expected assembled printf format"
    );
    assert!(llvm_ir.contains("@printf"));
}

#[test]
fn test_deref_load_type_follows_pointee() {
    // `*p` 的加载类型由 p 的源类型导出，而不是硬编码 i32
    let llvm_ir = codegen_test_harness("fn f(p *i64) i64 { return *p }");
    assert!(
        llvm_ir.contains("load i64, i64*"),
        "deref of *i64 should load an i64"
    );
}

#[test]
fn test_len_on_string_uses_strlen() {
    let llvm_ir = codegen_test_harness("fn f(s string) i32 { return len(s) }");
    assert!(
        llvm_ir.contains("call i64 @strlen"),
        "expected a strlen call for strings"
    );
}

#[test]
fn test_len_on_slice_reads_descriptor() {
    let source = r#"
fn main() i32 {
    a := [1, 2]
    return len(a)
}
"#;
    let llvm_ir = codegen_test_harness(source);
    assert!(llvm_ir.contains("len_ptr"), "expected a GEP to the len field");
    assert!(
        !llvm_ir.contains("call i64 @strlen"),
        "slices must not go through strlen"
    );
}

#[test]
fn test_cast_string_to_int_uses_atoi() {
    let source = r#"
fn main() i32 {
    s := "42"
    return cast(i32, s)
}
"#;
    let llvm_ir = codegen_test_harness(source);
    assert!(llvm_ir.contains("call i32 @atoi"));
}

#[test]
fn test_new_allocates_empty_descriptor() {
    let source = r#"
fn main() i32 {
    a := new([]i32{})
    append(a, 7)
    return a[0]
}
"#;
    let llvm_ir = codegen_test_harness(source);

    // 空描述符：data=null，len/cap=0，elem_size=4
    assert!(llvm_ir.contains("store i8* null"));
    assert!(llvm_ir.contains("store i64 4"));
}

#[test]
fn test_string_indexing_bytes() {
    let source = r#"
fn f(s string) i32 {
    return s[0]
}
"#;
    let llvm_ir = codegen_test_harness(source);
    // 字符串按字节索引：i8 载入后零扩展为 i32，无边界检查
    assert!(llvm_ir.contains("load i8"));
    assert!(llvm_ir.contains("zext i8"));
}

#[test]
fn test_struct_pointer_field_chain() {
    let source = r#"
struct Inner {
    v i32
}

struct Outer {
    inner *Inner
}

fn f(o Outer) i32 {
    return o.inner.v
}
"#;
    let llvm_ir = codegen_test_harness(source);
    // 穿过指针字段需要一次加载，叶子再加载一次
    assert!(llvm_ir.contains("%Outer = type { %Inner* }"));
    assert!(llvm_ir.contains("inner.load"));
    assert!(llvm_ir.contains("v.val"));
}

#[test]
fn test_variadic_function_is_vararg_in_ir() {
    let source = r#"
fn log(fmt string, rest ...i32) {
}

fn main() i32 {
    log("x")
    return 0
}
"#;
    let llvm_ir = codegen_test_harness(source);
    assert!(
        llvm_ir.contains("define void @log(i8* %fmt, ...)"),
        "variadic last param should make the IR function vararg"
    );
}

#[test]
fn test_bool_literal_widens_into_slot() {
    let source = r#"
fn main() i32 {
    b := true
    if b == 1 {
        return 1
    }
    return 0
}
"#;
    let llvm_ir = codegen_test_harness(source);
    assert!(llvm_ir.contains("alloca i32"), "bool widens into the i32 slot");
}

// --- 失败路径 ---

#[test]
fn test_unknown_identifier_fails_closed() {
    let errors = codegen_expect_errors("fn main() i32 { return nope }");
    assert!(
        errors.iter().any(|e| e.contains("unknown identifier")),
        "expected an unknown-identifier error, got: {:?}",
        errors
    );
}

#[test]
fn test_unknown_struct_literal_fails() {
    let errors = codegen_expect_errors("fn main() i32 { p := Nope{1}\n return 0 }");
    assert!(errors.iter().any(|e| e.contains("Nope")));
}

#[test]
fn test_break_outside_loop_fails() {
    let errors = codegen_expect_errors("fn main() i32 { break\n return 0 }");
    assert!(errors.iter().any(|e| e.contains("break used outside of loop")));
}

#[test]
fn test_top_level_statement_rejected() {
    let errors = codegen_expect_errors("x := 1\nfn main() i32 { return 0 }");
    assert!(errors
        .iter()
        .any(|e| e.contains("top-level statements are not supported")));
}
