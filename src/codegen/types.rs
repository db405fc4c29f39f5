//! 源语言类型的解析与记录。
//!
//! `SourceType` 是随每个绑定携带的标签记录，承担两件事：
//! 在 IR 类型（不透明指针）答不了的时候回答“这个 ptr 指向什么”，
//! 以及在切片索引、len、cast 等处区分 C 字符串与切片。

use super::CodeGen;
use crate::parser::ast;
use inkwell::types::{BasicType, BasicTypeEnum};

/// 绑定携带的源语言类型标签。
#[derive(Debug, Clone, PartialEq)]
pub enum SourceType {
    I32,
    I64,
    F32,
    F64,
    Bool,
    Byte,
    /// C 字符串（`string`，IR 上是 `ptr`）。
    Str,
    Void,
    /// 具名结构体。
    Struct(String),
    /// 切片 `[]T`；运行时是指向描述符的指针。
    Slice(Box<SourceType>),
    /// 指针 `*T`。
    Pointer(Box<SourceType>),
    /// 推断不出来。落到保守的通用路径。
    Unknown,
}

impl SourceType {
    /// 按保留名解释一个具名类型。
    pub fn named(name: &str) -> SourceType {
        match name {
            "i32" => SourceType::I32,
            "i64" | "size_t" => SourceType::I64,
            "f32" | "float" => SourceType::F32,
            "f64" | "double" => SourceType::F64,
            "bool" => SourceType::Bool,
            "byte" | "char" => SourceType::Byte,
            "string" => SourceType::Str,
            "void" => SourceType::Void,
            "" | "any" => SourceType::Unknown,
            other => SourceType::Struct(other.to_string()),
        }
    }

    pub fn from_ast(t: &ast::Type) -> SourceType {
        match t {
            ast::Type::Named(n) => SourceType::named(n),
            ast::Type::Pointer(inner) => SourceType::Pointer(Box::new(SourceType::from_ast(inner))),
            ast::Type::Array { elem, .. } => SourceType::Slice(Box::new(SourceType::from_ast(elem))),
            ast::Type::Func { .. } => SourceType::Unknown,
        }
    }

    /// 最内层的结构体名（穿过指针与切片）。
    pub fn base_struct_name(&self) -> Option<&str> {
        match self {
            SourceType::Struct(n) => Some(n),
            SourceType::Pointer(inner) | SourceType::Slice(inner) => inner.base_struct_name(),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, SourceType::Str)
    }
}

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    /// 按名字解析一个类型。保留名映射到基础 IR 类型；`*`/`[]` 前缀
    /// 递归；其余名字查结构体表，查不到就新建一个不透明结构体
    /// （允许前向引用）。
    pub(super) fn resolve_type_by_name(&mut self, type_name: &str) -> Option<BasicTypeEnum<'ctx>> {
        if type_name.is_empty() {
            return None;
        }

        if let Some(rest) = type_name.strip_prefix('*') {
            let inner = self
                .resolve_type_by_name(rest)
                .unwrap_or_else(|| self.context.i32_type().into());
            return Some(self.ptr_to(inner).into());
        }
        if let Some(rest) = type_name.strip_prefix("[]") {
            // 切片的静态类型是“指向元素的指针”；运行时按需
            // bitcast 到描述符指针
            let elem = self
                .resolve_type_by_name(rest)
                .unwrap_or_else(|| self.context.i32_type().into());
            return Some(self.ptr_to(elem).into());
        }

        match type_name {
            "i32" => Some(self.context.i32_type().into()),
            "i64" | "size_t" => Some(self.context.i64_type().into()),
            "f32" | "float" => Some(self.context.f32_type().into()),
            "f64" | "double" => Some(self.context.f64_type().into()),
            "bool" => Some(self.context.bool_type().into()),
            "char" | "byte" => Some(self.context.i8_type().into()),
            "string" => Some(self.i8_ptr_ty().into()),
            "void" => None,
            _ => Some(self.get_or_create_named_struct(type_name).into()),
        }
    }

    pub(super) fn get_or_create_named_struct(
        &mut self,
        name: &str,
    ) -> inkwell::types::StructType<'ctx> {
        if let Some(st) = self.struct_types.get(name) {
            return *st;
        }
        let st = self.context.opaque_struct_type(name);
        self.struct_types.insert(name.to_string(), st);
        st
    }

    /// AST 类型 → IR 类型。指针指向解析后的内层类型；切片的静态
    /// 类型是指向元素的指针（运行时按需 bitcast 到描述符指针）。
    pub(super) fn resolve_type_from_ast(&mut self, t: &ast::Type) -> Option<BasicTypeEnum<'ctx>> {
        match t {
            ast::Type::Named(n) => self.resolve_type_by_name(n),
            ast::Type::Pointer(inner) => {
                let it = self
                    .resolve_type_from_ast(inner)
                    .unwrap_or_else(|| self.context.i32_type().into());
                Some(self.ptr_to(it).into())
            }
            ast::Type::Array { elem, .. } => {
                let et = self
                    .resolve_type_from_ast(elem)
                    .unwrap_or_else(|| self.context.i32_type().into());
                Some(self.ptr_to(et).into())
            }
            ast::Type::Func { .. } => Some(self.i8_ptr_ty().into()),
        }
    }

    /// SourceType → IR 类型（Unknown 落到 i32）。
    pub(super) fn source_type_ir(&mut self, st: &SourceType) -> BasicTypeEnum<'ctx> {
        match st {
            SourceType::I32 => self.context.i32_type().into(),
            SourceType::I64 => self.context.i64_type().into(),
            SourceType::F32 => self.context.f32_type().into(),
            SourceType::F64 => self.context.f64_type().into(),
            SourceType::Bool => self.context.bool_type().into(),
            SourceType::Byte => self.context.i8_type().into(),
            SourceType::Str => self.i8_ptr_ty().into(),
            SourceType::Slice(e) => {
                let et = self.source_type_ir(e);
                self.ptr_to(et).into()
            }
            SourceType::Pointer(inner) => {
                let it = self.source_type_ir(inner);
                self.ptr_to(it).into()
            }
            SourceType::Struct(n) => {
                let n = n.clone();
                self.get_or_create_named_struct(&n).into()
            }
            SourceType::Void | SourceType::Unknown => self.context.i32_type().into(),
        }
    }

    /// 准备遍：两阶段注册所有顶层结构体。
    /// 阶段一声明不透明具名类型（让前向引用与指针成环成立），
    /// 阶段二解析字段类型并填充结构体体；内联匿名结构体按值内嵌。
    pub(super) fn prepare_struct_types(&mut self, program: &'ast ast::Program) {
        self.struct_types.clear();
        self.struct_decls.clear();

        for d in &program.decls {
            if let ast::Decl::Struct(sd) = d {
                if sd.name.is_empty() {
                    continue;
                }
                self.struct_decls.insert(sd.name.clone(), sd);
                if !self.struct_types.contains_key(&sd.name) {
                    let st = self.context.opaque_struct_type(&sd.name);
                    self.struct_types.insert(sd.name.clone(), st);
                }
            }
        }

        let decls: Vec<(String, &'ast ast::StructDecl)> = self
            .struct_decls
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        for (name, sd) in decls {
            let st = self.get_or_create_named_struct(&name);
            if !st.is_opaque() {
                continue;
            }

            let mut elems: Vec<BasicTypeEnum<'ctx>> = Vec::with_capacity(sd.fields.len());
            for field in &sd.fields {
                if let Some(inner) = &field.inline_struct {
                    let mut inner_elems: Vec<BasicTypeEnum<'ctx>> = Vec::new();
                    for f in &inner.fields {
                        let t = f
                            .ty
                            .as_ref()
                            .and_then(|t| self.resolve_type_from_ast(t))
                            .unwrap_or_else(|| self.context.i32_type().into());
                        inner_elems.push(t);
                    }
                    let inner_st = self.context.struct_type(&inner_elems, false);
                    elems.push(inner_st.as_basic_type_enum());
                } else {
                    let t = field
                        .ty
                        .as_ref()
                        .and_then(|t| self.resolve_type_from_ast(t))
                        .unwrap_or_else(|| self.context.i32_type().into());
                    elems.push(t);
                }
            }

            st.set_body(&elems, false);
        }
    }

    /// 结构体声明里按名找字段下标。
    pub(super) fn field_index(sd: &ast::StructDecl, field_name: &str) -> Option<usize> {
        sd.fields.iter().position(|f| f.name == field_name)
    }
}
