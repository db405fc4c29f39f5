//! 端到端编译场景：走公开的 `ecc::compile` 管道
//! （词法 → 解析 → 代码生成 → 验证过的 LLVM IR 文本）。
//! 单元测试盯各组件的细节，这里盯跨组件的整体行为。

use ecc::compile;

fn compile_ok(source: &str) -> String {
    match compile(source) {
        Ok(ir) => ir,
        Err(errors) => panic!("compilation failed: {:#?}\nsource:\n{}", errors, source),
    }
}

#[test]
fn minimal_main() {
    let ir = compile_ok("fn main() i32 { return 0 }");
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn struct_declared_after_use_still_resolves() {
    // 准备遍先注册全部结构体，所以声明顺序无关紧要
    let source = r#"
fn origin() i32 {
    p := Point{3, 4}
    return p.x + p.y
}

struct Point {
    x i32
    y i32
}
"#;
    let ir = compile_ok(source);
    assert!(ir.contains("%Point = type { i32, i32 }"));
    assert!(ir.contains("define i32 @origin()"));
}

#[test]
fn forward_function_reference() {
    // 函数原型预声明：先调用后定义
    let source = r#"
fn main() i32 {
    return helper(20)
}

fn helper(x i32) i32 {
    return x + 1
}
"#;
    let ir = compile_ok(source);
    assert!(ir.contains("call i32 @helper"));
}

#[test]
fn string_iteration_compiles_to_byte_loop() {
    let source = r#"
fn count(s string) i32 {
    n := 0
    for c in s {
        n = n + 1
    }
    return n
}
"#;
    let ir = compile_ok(source);
    assert!(ir.contains("forin.cond"));
    // 以 0 字节作为终止条件
    assert!(ir.contains("icmp ne i8"));
}

#[test]
fn typed_array_literal_sets_elem_size() {
    let source = r#"
fn main() i32 {
    a := []i64{1, 2, 3}
    return len(a)
}
"#;
    let ir = compile_ok(source);
    // i64 元素：elem_size = 8
    assert!(ir.contains("store i64 8"));
    assert!(ir.contains("%Array_internal = type { i8*, i64, i64, i64 }"));
}

#[test]
fn inline_struct_field_chain() {
    let source = r#"
struct Player {
    name string
    pos struct {
        x i32
        y i32
    }
}

fn f(p Player) i32 {
    return p.pos.x + p.pos.y
}
"#;
    let ir = compile_ok(source);
    // 外层命名结构体内嵌一个匿名结构体
    assert!(ir.contains("%Player = type { i8*, { i32, i32 } }"));
    assert!(ir.contains("pos.addr"));
    assert!(ir.contains("x.addr"));
}

#[test]
fn pointer_field_roundtrip() {
    let source = r#"
struct Node {
    value i32
    next *Node
}

fn advance(n *Node) *Node {
    return n.next
}
"#;
    let ir = compile_ok(source);
    // 指针字段允许结构体成环
    assert!(ir.contains("%Node = type { i32, %Node* }"));
    assert!(ir.contains("next.addr"));
}

#[test]
fn byte_string_literal_becomes_private_global() {
    let source = r#"
fn main() i32 {
    b := byte"GET "
    return len(b)
}
"#;
    let ir = compile_ok(source);
    assert!(ir.contains(".bytearr0"));
    assert!(ir.contains("private"));
}

#[test]
fn slice_of_strings() {
    let source = r#"
fn main() i32 {
    names := ["alice", "bob"]
    printf("%s\n", names[0])
    return 0
}
"#;
    let ir = compile_ok(source);
    // 元素是指针：索引按指针槽加载
    assert!(ir.contains("idx_ok"));
    assert!(ir.contains("@printf"));
}

#[test]
fn append_then_index_through_descriptor() {
    let source = r#"
fn main() i32 {
    a := new([]i32{})
    append(a, 1)
    append(a, 2)
    append(a, 3)
    return a[2]
}
"#;
    let ir = compile_ok(source);
    assert!(ir.contains("append_grow"));
    assert!(ir.contains("idx_in_range"));
}

#[test]
fn package_and_import_are_accepted_and_ignored() {
    let source = r#"
package demo.app
import std.io as io

fn main() i32 { return 0 }
"#;
    let ir = compile_ok(source);
    assert!(ir.contains("define i32 @main()"));
}

// --- 失败路径 ---

#[test]
fn parse_errors_block_compilation() {
    let err = compile("fn main() i32 { x : = 1 }").unwrap_err();
    assert!(!err.is_empty());
    // 词法/语法错误带 line:col 前缀
    assert!(err[0].contains(':'), "expected a positioned message, got {:?}", err);
}

#[test]
fn codegen_errors_block_emission() {
    let err = compile("fn main() i32 { return missing_var }").unwrap_err();
    assert!(err.iter().any(|e| e.contains("unknown identifier")));
}
