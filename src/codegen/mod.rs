//! 代码生成器：把解析好的 `Program` 两遍下放为 LLVM IR（经 inkwell）。
//!
//! 第一遍是准备遍：注册所有结构体（先声明不透明具名类型、再填充
//! 字段体）并预声明所有函数原型与固定的外部运行时符号表；
//! 第二遍逐个发射函数体。
//!
//! 运行时统一的数组表示是“切片”：一个堆分配的四字段描述符
//! `Array_internal { data, len, cap, elem_size }`，所有数组值都是指向
//! 它的指针。索引带边界检查，append 按容量翻倍增长。
//!
//! 每个绑定除 IR 值外还带一个 `SourceType` 标签记录（见 types 模块），
//! 用来回答 IR 类型答不了的问题：这个 `ptr` 是 C 字符串还是切片？
//! 解引用该加载成什么类型？

mod builtins;
mod expression;
mod function;
mod slice;
mod statement;
mod types;
#[cfg(test)]
mod test;

pub use types::SourceType;

use crate::diagnostics::CodeGenError;
use crate::parser::ast;
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::TargetData;
use inkwell::types::{BasicType, BasicTypeEnum, PointerType, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};
use inkwell::AddressSpace;
use std::collections::HashMap;

/// x86-64 System V 的数据布局；只用于回答类型尺寸/对齐问题，
/// 不牵扯目标机初始化。
const DATA_LAYOUT: &str = "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128";

// --- 绑定模型 ---

/// 名字绑定的存储形态。
#[derive(Debug, Clone, Copy)]
pub enum Slot<'ctx> {
    /// 栈槽：槽地址 + 槽中存放的 IR 类型（不透明指针下必须随身携带）。
    Stack {
        ptr: PointerValue<'ctx>,
        ir_ty: BasicTypeEnum<'ctx>,
    },
    /// 直接绑定到一个值，不经过栈槽（指针类型的参数）。
    Direct(BasicValueEnum<'ctx>),
}

/// 作用域中的一个绑定：存储 + 源语言类型标签 + 参数来源位。
#[derive(Debug, Clone)]
pub struct Binding<'ctx> {
    pub slot: Slot<'ctx>,
    pub ty: SourceType,
    pub from_param: bool,
}

// --- 代码生成器 ---

pub struct CodeGen<'ctx, 'ast> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    target_data: TargetData,

    // 并行的结构体表：IR 类型与 AST 声明，都以规范声明名为键。
    struct_types: HashMap<String, StructType<'ctx>>,
    struct_decls: HashMap<String, &'ast ast::StructDecl>,
    // 函数声明表（查询返回类型用）与已登记的原型。
    func_decls: HashMap<String, &'ast ast::FuncDecl>,
    function_protos: HashMap<String, FunctionValue<'ctx>>,

    scopes: Vec<HashMap<String, Binding<'ctx>>>,
    break_targets: Vec<BasicBlock<'ctx>>,
    continue_targets: Vec<BasicBlock<'ctx>>,
    current_function: Option<FunctionValue<'ctx>>,
    current_ret_type: Option<BasicTypeEnum<'ctx>>,

    // 模块级状态：切片描述符类型缓存与字节数组常量计数器。
    slice_type: Option<StructType<'ctx>>,
    byte_array_counter: u32,

    printf_fn: FunctionValue<'ctx>,

    errors: Vec<CodeGenError>,
    failed: bool,
}

/// 顶层入口：为整个程序生成 LLVM IR 文本。
pub fn codegen(program: &ast::Program) -> Result<String, Vec<CodeGenError>> {
    let context = Context::create();
    let cg = CodeGen::new(&context, "ec");
    cg.run(program)
}

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let target_data = TargetData::create(DATA_LAYOUT);
        let dl = target_data.get_data_layout();
        module.set_data_layout(&dl);

        // printf 始终预声明：println/printf 内建都落到它上面
        let i8ptr = context.i8_type().ptr_type(AddressSpace::default());
        let printf_ty = context
            .i32_type()
            .fn_type(&[i8ptr.into()], true);
        let printf_fn = module.add_function("printf", printf_ty, None);

        Self {
            context,
            module,
            builder,
            target_data,
            struct_types: HashMap::new(),
            struct_decls: HashMap::new(),
            func_decls: HashMap::new(),
            function_protos: HashMap::new(),
            scopes: Vec::new(),
            break_targets: Vec::new(),
            continue_targets: Vec::new(),
            current_function: None,
            current_ret_type: None,
            slice_type: None,
            byte_array_counter: 0,
            printf_fn,
            errors: Vec::new(),
            failed: false,
        }
    }

    /// 消费生成器，走完两遍流程，返回 IR 文本或全部错误。
    pub fn run(mut self, program: &'ast ast::Program) -> Result<String, Vec<CodeGenError>> {
        self.prepare_struct_types(program);

        let mut funcs: Vec<&'ast ast::FuncDecl> = Vec::new();
        for d in &program.decls {
            if let ast::Decl::Func(fd) = d {
                funcs.push(fd);
                self.func_decls.insert(fd.name.clone(), fd);
            }
        }

        self.predeclare_functions(&funcs);

        for fd in &funcs {
            self.emit_function(fd);
        }

        for d in &program.decls {
            if matches!(d, ast::Decl::Stmt(_)) {
                self.error("top-level statements are not supported (please define fn main)");
            }
        }

        if self.failed {
            return Err(self.errors);
        }

        if let Err(e) = self.module.verify() {
            self.errors
                .push(CodeGenError::Verification(e.to_string()));
            return Err(self.errors);
        }

        Ok(self.module.print_to_string().to_string())
    }

    // --- 错误与作用域 ---

    pub(super) fn error(&mut self, msg: impl Into<String>) {
        self.failed = true;
        self.errors.push(CodeGenError::Message(msg.into()));
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(super) fn bind_local(
        &mut self,
        name: &str,
        ty: SourceType,
        slot: Slot<'ctx>,
        from_param: bool,
    ) {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        self.scopes.last_mut().unwrap().insert(
            name.to_string(),
            Binding {
                slot,
                ty,
                from_param,
            },
        );
    }

    /// 自内向外查找一个局部绑定。
    pub(super) fn lookup_local(&self, name: &str) -> Option<Binding<'ctx>> {
        for scope in self.scopes.iter().rev() {
            if let Some(b) = scope.get(name) {
                return Some(b.clone());
            }
        }
        None
    }

    // --- 常用 IR 工具 ---

    /// 通用的 `i8*`（字符串与原始字节缓冲的指针类型）。
    pub(super) fn i8_ptr_ty(&self) -> PointerType<'ctx> {
        self.context.i8_type().ptr_type(AddressSpace::default())
    }

    /// 指向某个基础类型的指针类型。
    pub(super) fn ptr_to(&self, ty: BasicTypeEnum<'ctx>) -> PointerType<'ctx> {
        ty.ptr_type(AddressSpace::default())
    }

    /// 指针适配：类型已一致就原样返回，否则发一个 bitcast。
    pub(super) fn cast_ptr(
        &self,
        ptr: PointerValue<'ctx>,
        to: PointerType<'ctx>,
        name: &str,
    ) -> PointerValue<'ctx> {
        if ptr.get_type() == to {
            return ptr;
        }
        self.builder.build_pointer_cast(ptr, to, name).unwrap()
    }

    /// 按给定类型从指针加载；指针的指向类型不符时先 bitcast。
    pub(super) fn load_via(
        &self,
        ty: BasicTypeEnum<'ctx>,
        ptr: PointerValue<'ctx>,
        name: &str,
    ) -> BasicValueEnum<'ctx> {
        let p = self.cast_ptr(ptr, self.ptr_to(ty), "load.cast");
        self.builder.build_load(p, name).unwrap()
    }

    /// 往指针写入一个值；槽类型不符时先 bitcast 指针。
    pub(super) fn store_via(&self, ptr: PointerValue<'ctx>, v: BasicValueEnum<'ctx>) {
        let p = self.cast_ptr(ptr, self.ptr_to(v.get_type()), "store.cast");
        self.builder.build_store(p, v).unwrap();
    }

    /// 结构体字段地址；基指针不符时先 bitcast 到 `sty*`。
    pub(super) fn struct_gep_via(
        &self,
        sty: StructType<'ctx>,
        ptr: PointerValue<'ctx>,
        index: u32,
        name: &str,
    ) -> PointerValue<'ctx> {
        let p = self.cast_ptr(ptr, self.ptr_to(sty.as_basic_type_enum()), "gep.cast");
        self.builder.build_struct_gep(p, index, name).unwrap()
    }

    /// 以字节为单位的地址运算：bitcast 到 `i8*` 后 GEP。
    pub(super) fn gep_i8(
        &self,
        ptr: PointerValue<'ctx>,
        offset: IntValue<'ctx>,
        name: &str,
    ) -> PointerValue<'ctx> {
        let p = self.cast_ptr(ptr, self.i8_ptr_ty(), "i8.cast");
        unsafe {
            self.builder
                .build_in_bounds_gep(p, &[offset], name)
        }
        .unwrap()
    }

    /// 类型的 ABI 分配尺寸（字节）。
    pub(super) fn alloc_size(&self, ty: BasicTypeEnum<'ctx>) -> u64 {
        self.target_data.get_abi_size(&ty)
    }

    pub(super) fn ptr_size_bytes(&self) -> u64 {
        self.target_data.get_pointer_byte_size(None) as u64
    }

    /// 模块级缓存的切片描述符类型 `Array_internal { data, len, cap, elem_size }`。
    pub(super) fn slice_struct_type(&mut self) -> StructType<'ctx> {
        if let Some(st) = self.slice_type {
            return st;
        }
        let st = self.context.opaque_struct_type("Array_internal");
        let i64t = self.context.i64_type();
        st.set_body(
            &[
                self.i8_ptr_ty().into(),
                i64t.into(),
                i64t.into(),
                i64t.into(),
            ],
            false,
        );
        self.slice_type = Some(st);
        st
    }

    /// 指向切片描述符的指针类型。
    pub(super) fn slice_ptr_ty(&mut self) -> PointerType<'ctx> {
        let st = self.slice_struct_type();
        self.ptr_to(st.as_basic_type_enum())
    }

    /// 在当前函数的 entry 块开头分配一个栈槽，避免循环体内反复分配。
    pub(super) fn entry_alloca(
        &self,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> PointerValue<'ctx> {
        let tmp = self.context.create_builder();
        let function = self
            .current_function
            .expect("entry_alloca outside of a function");
        let entry = function.get_first_basic_block().expect("function has no entry block");
        match entry.get_first_instruction() {
            Some(first) => tmp.position_before(&first),
            None => tmp.position_at_end(entry),
        }
        tmp.build_alloca(ty, name).unwrap()
    }

    /// 类型的零值常量。
    pub(super) fn const_zero(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(t) => t.const_zero().into(),
            BasicTypeEnum::FloatType(t) => t.const_zero().into(),
            BasicTypeEnum::PointerType(t) => t.const_null().into(),
            BasicTypeEnum::StructType(t) => t.const_zero().into(),
            BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
            other => unreachable!("no zero value for {:?}", other),
        }
    }

    /// 把整数值调整到目标整数宽度（同宽直接返回）。
    /// i1 一律零扩展（布尔值没有符号），其余按有符号处理。
    pub(super) fn cast_to_same_int(
        &self,
        v: IntValue<'ctx>,
        target: inkwell::types::IntType<'ctx>,
    ) -> IntValue<'ctx> {
        if v.get_type() == target {
            return v;
        }
        if v.get_type().get_bit_width() == 1 {
            return self
                .builder
                .build_int_z_extend(v, target, "boolext")
                .unwrap();
        }
        self.builder
            .build_int_cast_sign_flag(v, target, true, "intcast")
            .unwrap()
    }

    /// 把索引值规整为 i64。非整数返回 None（调用方报错）。
    pub(super) fn index_to_i64(&mut self, v: BasicValueEnum<'ctx>) -> Option<IntValue<'ctx>> {
        if !v.is_int_value() {
            self.error("index is not an integer");
            return None;
        }
        Some(self.cast_to_same_int(v.into_int_value(), self.context.i64_type()))
    }

    /// 发射 `abort(); unreachable` 序列（运行期陷阱）。
    pub(super) fn build_trap(&mut self) {
        let abort_fn = self.get_abort();
        self.builder.build_call(abort_fn, &[], "").unwrap();
        self.builder.build_unreachable().unwrap();
    }

    /// 在当前函数上新开一个基本块。
    pub(super) fn append_block(&self, name: &str) -> BasicBlock<'ctx> {
        let f = self
            .current_function
            .expect("append_block outside of a function");
        self.context.append_basic_block(f, name)
    }

    /// 当前插入点所在块是否已被终结。
    pub(super) fn block_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|bb| bb.get_terminator())
            .is_some()
    }

    /// 值之间的存储适配：整数宽度、整/浮、指针与整数互转。
    /// 适配不了的组合报错并返回 None。
    pub(super) fn coerce_to(
        &mut self,
        v: BasicValueEnum<'ctx>,
        dest: BasicTypeEnum<'ctx>,
    ) -> Option<BasicValueEnum<'ctx>> {
        if v.get_type() == dest {
            return Some(v);
        }
        let b = &self.builder;
        match (v, dest) {
            (BasicValueEnum::IntValue(i), BasicTypeEnum::IntType(t)) => {
                Some(self.cast_to_same_int(i, t).into())
            }
            (BasicValueEnum::IntValue(i), BasicTypeEnum::FloatType(t)) => Some(
                b.build_signed_int_to_float(i, t, "i2fp").unwrap().into(),
            ),
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::IntType(t)) => Some(
                b.build_float_to_signed_int(f, t, "fp2i").unwrap().into(),
            ),
            (BasicValueEnum::FloatValue(f), BasicTypeEnum::FloatType(t)) => {
                Some(b.build_float_cast(f, t, "fpcast").unwrap().into())
            }
            (BasicValueEnum::IntValue(i), BasicTypeEnum::PointerType(t)) => {
                Some(b.build_int_to_ptr(i, t, "inttoptr").unwrap().into())
            }
            (BasicValueEnum::PointerValue(p), BasicTypeEnum::IntType(t)) => {
                Some(b.build_ptr_to_int(p, t, "ptrtoint").unwrap().into())
            }
            (BasicValueEnum::PointerValue(p), BasicTypeEnum::PointerType(t)) => {
                Some(b.build_pointer_cast(p, t, "ptrcast").unwrap().into())
            }
            (BasicValueEnum::PointerValue(p), BasicTypeEnum::StructType(_)) => {
                // 指向结构体的指针落到按值槽位：载入整个结构体
                Some(self.load_via(dest, p, "struct.byval"))
            }
            _ => {
                self.error(format!(
                    "unsupported store: value {:?} into slot of {:?}",
                    v.get_type(),
                    dest
                ));
                None
            }
        }
    }
}
