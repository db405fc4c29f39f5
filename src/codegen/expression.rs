//! 表达式下放：字面量、标识符、一元/二元运算、调用分发、
//! 成员访问链与结构体字面量。

use super::{Binding, CodeGen, Slot, SourceType};
use crate::lexer::TokenKind;
use crate::parser::{ast, decode_string_literal_content};
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FloatValue, IntValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

/// 按进制前缀解码整数词素。
pub(super) fn parse_int_literal(raw: &str) -> Option<i64> {
    if let Some(h) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return i64::from_str_radix(h, 16).ok();
    }
    if let Some(b) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        return i64::from_str_radix(b, 2).ok();
    }
    if raw.len() > 1 && raw.starts_with('0') && raw.bytes().all(|b| b.is_ascii_digit()) {
        return i64::from_str_radix(&raw[1..], 8).ok();
    }
    raw.parse::<i64>().ok()
}

/// 形参元数据类型 → 基础类型（metadata 本身没有基础形态）。
fn meta_to_basic<'ctx>(
    m: inkwell::types::BasicMetadataTypeEnum<'ctx>,
) -> Option<BasicTypeEnum<'ctx>> {
    use inkwell::types::BasicMetadataTypeEnum as M;
    match m {
        M::IntType(t) => Some(t.into()),
        M::FloatType(t) => Some(t.into()),
        M::PointerType(t) => Some(t.into()),
        M::StructType(t) => Some(t.into()),
        M::ArrayType(t) => Some(t.into()),
        M::VectorType(t) => Some(t.into()),
        _ => None,
    }
}

/// 解码字符字面量词素（`'a'`、`'\n'` 等）。
fn decode_char_literal(raw: &str) -> u8 {
    let inner = raw.trim_start_matches('\'').trim_end_matches('\'');
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('\'') => b'\'',
            Some(other) => other as u8,
            None => b'?',
        },
        Some(c) => c as u8,
        None => b'?',
    }
}

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    /// 表达式下放的总分发。错误已就地报告；None 静默向上传播。
    pub(super) fn codegen_expr(&mut self, e: &'ast ast::Expr) -> Option<BasicValueEnum<'ctx>> {
        match e {
            ast::Expr::Literal { raw, kind } => self.codegen_literal(raw, *kind),
            ast::Expr::Ident(name) => self.codegen_ident(name),
            ast::Expr::Unary { op, rhs } => self.codegen_unary(op, rhs),
            ast::Expr::Binary { op, left, right } => self.codegen_binary(op, left, right),
            ast::Expr::Call { callee, args } => self.codegen_call(callee, args),
            ast::Expr::Member { object, member } => self.codegen_member(object, member),
            ast::Expr::Index { collection, index } => self.codegen_index(collection, index),
            ast::Expr::Postfix { op, lhs } => self.codegen_crement(lhs, op == "++", false),
            ast::Expr::ArrayLiteral { ty, elements } => {
                self.codegen_array_literal(ty.as_ref(), elements)
            }
            ast::Expr::ByteArrayLiteral { elems } => self.codegen_byte_array(elems),
            ast::Expr::StructLiteral { ty, inits } => self.codegen_struct_literal(ty, inits),
        }
    }

    // --- 字面量与标识符 ---

    fn codegen_literal(&mut self, raw: &str, kind: TokenKind) -> Option<BasicValueEnum<'ctx>> {
        match kind {
            TokenKind::Int => match parse_int_literal(raw) {
                Some(v) => Some(self.context.i32_type().const_int(v as u64, true).into()),
                None => {
                    self.error(format!("invalid integer literal: {}", raw));
                    None
                }
            },
            TokenKind::Float => match raw.parse::<f64>() {
                Ok(v) => Some(self.context.f64_type().const_float(v).into()),
                Err(_) => {
                    self.error(format!("invalid float literal: {}", raw));
                    None
                }
            },
            TokenKind::Str => {
                let s = decode_string_literal_content(raw);
                let gv = self
                    .builder
                    .build_global_string_ptr(&s, ".str")
                    .unwrap();
                Some(gv.as_pointer_value().into())
            }
            TokenKind::Char => {
                let v = decode_char_literal(raw) as u64;
                Some(self.context.i8_type().const_int(v, true).into())
            }
            TokenKind::KwTrue => Some(self.context.bool_type().const_int(1, false).into()),
            TokenKind::KwFalse => Some(self.context.bool_type().const_zero().into()),
            // 解析器合成的占位节点：错误早已报告过，静默跳过
            _ => None,
        }
    }

    fn codegen_ident(&mut self, name: &str) -> Option<BasicValueEnum<'ctx>> {
        if let Some(b) = self.lookup_local(name) {
            return Some(match b.slot {
                Slot::Stack { ptr, ir_ty } => self
                    .builder
                    .build_load(ptr, &format!("{}.val", name))
                    .unwrap(),
                Slot::Direct(v) => v,
            });
        }
        // 函数名：解析为函数指针
        if let Some(f) = self.function_protos.get(name) {
            return Some(f.as_global_value().as_pointer_value().into());
        }
        self.error(format!("unknown identifier: {}", name));
        None
    }

    // --- 一元运算 ---

    fn codegen_unary(&mut self, op: &str, rhs: &'ast ast::Expr) -> Option<BasicValueEnum<'ctx>> {
        match op {
            "++" | "--" => self.codegen_crement(rhs, op == "++", true),
            "&" => self.codegen_address_of(rhs),
            "*" => self.codegen_deref(rhs),
            "-" => {
                let v = self.codegen_expr(rhs)?;
                Some(if v.is_float_value() {
                    self.builder
                        .build_float_neg(v.into_float_value(), "negtmp")
                        .unwrap()
                        .into()
                } else {
                    self.builder
                        .build_int_neg(v.into_int_value(), "negtmp")
                        .unwrap()
                        .into()
                })
            }
            "+" => self.codegen_expr(rhs),
            "!" => {
                let v = self.codegen_expr(rhs)?;
                let cmp = if v.is_float_value() {
                    let fv = v.into_float_value();
                    let zero = fv.get_type().const_zero();
                    self.builder
                        .build_float_compare(FloatPredicate::UEQ, fv, zero, "notcmp")
                        .unwrap()
                } else {
                    let iv = v.into_int_value();
                    let zero = iv.get_type().const_zero();
                    self.builder
                        .build_int_compare(IntPredicate::EQ, iv, zero, "notcmp")
                        .unwrap()
                };
                Some(
                    self.builder
                        .build_int_z_extend(cmp, self.context.i32_type(), "notext")
                        .unwrap()
                        .into(),
                )
            }
            other => {
                self.error(format!("unsupported unary op: {}", other));
                None
            }
        }
    }

    /// `&e`：标识符取槽地址，索引取元素地址，成员取字段地址。
    fn codegen_address_of(&mut self, target: &'ast ast::Expr) -> Option<BasicValueEnum<'ctx>> {
        match target {
            ast::Expr::Ident(name) => match self.lookup_local(name) {
                Some(Binding {
                    slot: Slot::Stack { ptr, .. },
                    ..
                }) => Some(ptr.into()),
                Some(Binding {
                    slot: Slot::Direct(v),
                    ..
                }) => Some(v),
                None => {
                    self.error(format!("unknown identifier in &: {}", name));
                    None
                }
            },
            ast::Expr::Index { collection, index } => {
                self.codegen_index_addr(collection, index).map(Into::into)
            }
            ast::Expr::Member { object, member } => {
                self.member_addr(object, member).map(|(p, _, _)| p.into())
            }
            _ => {
                self.error("& operator requires an identifier, index, or member expression");
                None
            }
        }
    }

    /// `*e`：加载类型由操作数的源类型导出（`Pointer(inner)` → inner），
    /// 什么都不知道时才回退到 i32。
    fn codegen_deref(&mut self, target: &'ast ast::Expr) -> Option<BasicValueEnum<'ctx>> {
        let ptr_val = match target {
            ast::Expr::Ident(name) => {
                let Some(b) = self.lookup_local(name) else {
                    self.error(format!("unknown identifier in *: {}", name));
                    return None;
                };
                let v = match b.slot {
                    Slot::Stack { ptr, ir_ty } => self
                        .builder
                        .build_load(ptr, &format!("{}.ptrval", name))
                        .unwrap(),
                    Slot::Direct(v) => v,
                };
                if !v.is_pointer_value() {
                    self.error(format!(
                        "identifier does not refer to pointer storage for *: {}",
                        name
                    ));
                    return None;
                }
                v.into_pointer_value()
            }
            ast::Expr::Member { object, member } => {
                let (addr, field_ir, _) = self.member_addr(object, member)?;
                if !field_ir.is_pointer_type() {
                    self.error(format!(
                        "member is not a pointer, cannot apply * to it: {}",
                        member
                    ));
                    return None;
                }
                self.builder
                    .build_load(addr, &format!("{}.ptrval", member))
                    .unwrap()
                    .into_pointer_value()
            }
            other => {
                let v = self.codegen_expr(other)?;
                if !v.is_pointer_value() {
                    self.error("* operand expects a pointer value");
                    return None;
                }
                v.into_pointer_value()
            }
        };

        let load_ty = match self.infer_expr_type(target) {
            SourceType::Pointer(inner) => self.source_type_ir(&inner),
            SourceType::Str => self.context.i8_type().into(),
            _ => self.context.i32_type().into(),
        };
        Some(self.load_via(load_ty, ptr_val, "deref_load"))
    }

    /// `++`/`--`（前缀与后缀共用）：读、加减一、写回。
    /// 前缀返回新值，后缀返回旧值。
    fn codegen_crement(
        &mut self,
        target: &'ast ast::Expr,
        is_inc: bool,
        prefix: bool,
    ) -> Option<BasicValueEnum<'ctx>> {
        let (ptr, ty) = self.crement_target(target)?;

        let old = self.load_via(ty, ptr, "crement.old");
        let new = match ty {
            BasicTypeEnum::FloatType(ft) => {
                let one = ft.const_float(1.0);
                let o = old.into_float_value();
                if is_inc {
                    self.builder.build_float_add(o, one, "crement.inc").unwrap().into()
                } else {
                    self.builder.build_float_sub(o, one, "crement.dec").unwrap().into()
                }
            }
            BasicTypeEnum::IntType(it) => {
                let one = it.const_int(1, false);
                let o = old.into_int_value();
                let v: BasicValueEnum = if is_inc {
                    self.builder.build_int_add(o, one, "crement.inc").unwrap().into()
                } else {
                    self.builder.build_int_sub(o, one, "crement.dec").unwrap().into()
                };
                v
            }
            _ => {
                self.error("unsupported ++/-- element type");
                return None;
            }
        };
        self.store_via(ptr, new);
        Some(if prefix { new } else { old })
    }

    /// ++/-- 的目标地址与元素类型：只接受标识符与索引表达式。
    fn crement_target(
        &mut self,
        target: &'ast ast::Expr,
    ) -> Option<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)> {
        match target {
            ast::Expr::Ident(name) => match self.lookup_local(name) {
                Some(Binding {
                    slot: Slot::Stack { ptr, ir_ty },
                    ..
                }) => Some((ptr, ir_ty)),
                Some(_) => {
                    self.error(format!("unsupported ++/-- target: {}", name));
                    None
                }
                None => {
                    self.error(format!("unknown identifier in ++/--: {}", name));
                    None
                }
            },
            ast::Expr::Index { collection, index } => {
                let addr = self.codegen_index_addr(collection, index)?;
                let elem_ty = match self.infer_expr_type(collection) {
                    SourceType::Slice(e) => self.source_type_ir(&e),
                    SourceType::Str => self.context.i8_type().into(),
                    _ => {
                        self.error("cannot determine element type for ++/-- on index");
                        return None;
                    }
                };
                Some((addr, elem_ty))
            }
            _ => {
                self.error("++/-- requires an identifier or index expression");
                None
            }
        }
    }

    // --- 二元运算 ---

    pub(super) fn to_f64(&self, v: BasicValueEnum<'ctx>) -> FloatValue<'ctx> {
        let f64t = self.context.f64_type();
        match v {
            BasicValueEnum::FloatValue(f) => {
                if f.get_type() == f64t {
                    f
                } else {
                    self.builder.build_float_cast(f, f64t, "fp_widen").unwrap()
                }
            }
            BasicValueEnum::IntValue(i) => self
                .builder
                .build_signed_int_to_float(i, f64t, "sitofp")
                .unwrap(),
            _ => f64t.const_zero(),
        }
    }

    /// 任意值 → i1 条件：与 0 比较（浮点用有序不等）。
    pub(super) fn to_condition(&mut self, v: BasicValueEnum<'ctx>) -> IntValue<'ctx> {
        match v {
            BasicValueEnum::FloatValue(f) => {
                let zero = f.get_type().const_zero();
                self.builder
                    .build_float_compare(FloatPredicate::ONE, f, zero, "cond")
                    .unwrap()
            }
            BasicValueEnum::IntValue(i) => {
                if i.get_type().get_bit_width() == 1 {
                    return i;
                }
                let zero = i.get_type().const_zero();
                self.builder
                    .build_int_compare(IntPredicate::NE, i, zero, "cond")
                    .unwrap()
            }
            BasicValueEnum::PointerValue(p) => {
                self.builder.build_is_not_null(p, "cond").unwrap()
            }
            _ => self.context.bool_type().const_int(1, false),
        }
    }

    fn emit_int_div_zero_check(&mut self, r: IntValue<'ctx>) {
        let zero = r.get_type().const_zero();
        let is_zero = self
            .builder
            .build_int_compare(IntPredicate::EQ, r, zero, "div_zero_cmp")
            .unwrap();
        let bad = self.append_block("div_by_zero");
        let ok = self.append_block("div_ok");
        self.builder.build_conditional_branch(is_zero, bad, ok).unwrap();
        self.builder.position_at_end(bad);
        self.build_trap();
        self.builder.position_at_end(ok);
    }

    fn emit_fp_div_zero_check(&mut self, r: FloatValue<'ctx>) {
        let zero = self.context.f64_type().const_zero();
        let is_zero = self
            .builder
            .build_float_compare(FloatPredicate::UEQ, r, zero, "div_zero_cmp")
            .unwrap();
        let bad = self.append_block("div_by_zero");
        let ok = self.append_block("div_ok");
        self.builder.build_conditional_branch(is_zero, bad, ok).unwrap();
        self.builder.position_at_end(bad);
        self.build_trap();
        self.builder.position_at_end(ok);
    }

    fn codegen_binary(
        &mut self,
        op: &str,
        left: &'ast ast::Expr,
        right: &'ast ast::Expr,
    ) -> Option<BasicValueEnum<'ctx>> {
        let l = self.codegen_expr(left)?;
        let r = self.codegen_expr(right)?;
        let i32t = self.context.i32_type();

        if op == "&&" || op == "||" {
            let lb = self.to_condition(l);
            let rb = self.to_condition(r);
            let v = if op == "&&" {
                self.builder.build_and(lb, rb, "andtmp").unwrap()
            } else {
                self.builder.build_or(lb, rb, "ortmp").unwrap()
            };
            return Some(
                self.builder
                    .build_int_z_extend(v, i32t, "boolext")
                    .unwrap()
                    .into(),
            );
        }

        let is_fp = l.is_float_value() || r.is_float_value();
        if is_fp {
            // 一侧是浮点就把两侧都拓宽到 f64
            let lf = self.to_f64(l);
            let rf = self.to_f64(r);

            if op == "/" || op == "%" {
                self.emit_fp_div_zero_check(rf);
            }

            let b = &self.builder;
            return match op {
                "+" => Some(b.build_float_add(lf, rf, "addtmp").unwrap().into()),
                "-" => Some(b.build_float_sub(lf, rf, "subtmp").unwrap().into()),
                "*" => Some(b.build_float_mul(lf, rf, "multmp").unwrap().into()),
                "/" => Some(b.build_float_div(lf, rf, "divtmp").unwrap().into()),
                "%" => Some(b.build_float_rem(lf, rf, "remtmp").unwrap().into()),
                ">" | "<" | ">=" | "<=" | "==" | "!=" => {
                    let pred = match op {
                        ">" => FloatPredicate::UGT,
                        "<" => FloatPredicate::ULT,
                        ">=" => FloatPredicate::UGE,
                        "<=" => FloatPredicate::ULE,
                        "==" => FloatPredicate::UEQ,
                        _ => FloatPredicate::UNE,
                    };
                    let cmp = b.build_float_compare(pred, lf, rf, "cmptmp").unwrap();
                    Some(b.build_int_z_extend(cmp, i32t, "cmpext").unwrap().into())
                }
                other => {
                    self.error(format!("unsupported binary op on floats: {}", other));
                    None
                }
            };
        }

        if l.is_pointer_value() || r.is_pointer_value() {
            // 指针算术与比较
            if (op == "+" || op == "-") && l.is_pointer_value() && r.is_int_value() {
                let mut off = r.into_int_value();
                if op == "-" {
                    off = self.builder.build_int_neg(off, "ptroff.neg").unwrap();
                }
                let gep = self.gep_i8(l.into_pointer_value(), off, "ptraddtmp");
                return Some(gep.into());
            }
            if (op == "==" || op == "!=") && l.is_pointer_value() && r.is_pointer_value() {
                let pred = if op == "==" {
                    IntPredicate::EQ
                } else {
                    IntPredicate::NE
                };
                // 指针比较经 ptrtoint，回避两侧指向类型不同的情况
                let i64t = self.context.i64_type();
                let li = self
                    .builder
                    .build_ptr_to_int(l.into_pointer_value(), i64t, "cmp.lhs")
                    .unwrap();
                let ri = self
                    .builder
                    .build_ptr_to_int(r.into_pointer_value(), i64t, "cmp.rhs")
                    .unwrap();
                let cmp = self
                    .builder
                    .build_int_compare(pred, li, ri, "cmptmp")
                    .unwrap();
                return Some(
                    self.builder
                        .build_int_z_extend(cmp, i32t, "cmpext")
                        .unwrap()
                        .into(),
                );
            }
            self.error(format!("unsupported pointer operation: {}", op));
            return None;
        }

        // 整数路径：先检查除零，再提升到较宽的一侧
        if !l.is_int_value() || !r.is_int_value() {
            self.error(format!("unsupported operand type for binary operator {}", op));
            return None;
        }
        let mut li = l.into_int_value();
        let mut ri = r.into_int_value();

        if op == "/" || op == "%" {
            self.emit_int_div_zero_check(ri);
        }

        let target = if li.get_type().get_bit_width() >= ri.get_type().get_bit_width() {
            li.get_type()
        } else {
            ri.get_type()
        };
        li = self.cast_to_same_int(li, target);
        ri = self.cast_to_same_int(ri, target);

        let b = &self.builder;
        match op {
            "+" => Some(b.build_int_add(li, ri, "addtmp").unwrap().into()),
            "-" => Some(b.build_int_sub(li, ri, "subtmp").unwrap().into()),
            "*" => Some(b.build_int_mul(li, ri, "multmp").unwrap().into()),
            "/" => Some(b.build_int_signed_div(li, ri, "divtmp").unwrap().into()),
            "%" => Some(b.build_int_signed_rem(li, ri, "remtmp").unwrap().into()),
            "<<" => Some(b.build_left_shift(li, ri, "shltmp").unwrap().into()),
            ">>" => Some(b.build_right_shift(li, ri, true, "shrtmp").unwrap().into()),
            "&" => Some(b.build_and(li, ri, "andtmp").unwrap().into()),
            "|" => Some(b.build_or(li, ri, "ortmp").unwrap().into()),
            "^" => Some(b.build_xor(li, ri, "xortmp").unwrap().into()),
            ">" | "<" | ">=" | "<=" | "==" | "!=" => {
                let pred = match op {
                    ">" => IntPredicate::SGT,
                    "<" => IntPredicate::SLT,
                    ">=" => IntPredicate::SGE,
                    "<=" => IntPredicate::SLE,
                    "==" => IntPredicate::EQ,
                    _ => IntPredicate::NE,
                };
                let cmp = b.build_int_compare(pred, li, ri, "cmptmp").unwrap();
                Some(b.build_int_z_extend(cmp, i32t, "cmpext").unwrap().into())
            }
            other => {
                self.error(format!("unsupported binary op: {}", other));
                None
            }
        }
    }

    // --- 调用 ---

    fn codegen_call(
        &mut self,
        callee: &'ast ast::Expr,
        args: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        if let ast::Expr::Ident(name) = callee {
            // 内建调用在普通调用之前拦截
            match name.as_str() {
                "println" => return self.codegen_println(args),
                "printf" => return self.codegen_printf(args),
                "sprintf" => return self.codegen_sprintf(args),
                "len" => return self.codegen_len(args),
                "append" => return self.codegen_append(args),
                "cast" => return self.codegen_cast(args),
                "new" => return self.codegen_new(args),
                _ => {}
            }
        }

        let ast::Expr::Ident(name) = callee else {
            self.error("indirect calls are not supported");
            return None;
        };
        let Some(f) = self.function_protos.get(name).copied() else {
            self.error(format!("call to unknown function: {}", name));
            return None;
        };

        let param_tys = f.get_type().get_param_types();
        let mut call_args = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let mut v = self.codegen_expr(a)?;
            if i < param_tys.len() {
                if let Some(dest) = meta_to_basic(param_tys[i].into()) {
                    v = self.coerce_to(v, dest)?;
                }
            } else {
                v = self.promote_vararg(v);
            }
            call_args.push(v.into());
        }

        let call = self.builder.build_call(f, &call_args, "").unwrap();
        call.try_as_basic_value().left()
    }

    /// C 变参缺省提升：f32 → f64，窄整数 → i32。
    pub(super) fn promote_vararg(&mut self, v: BasicValueEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match v {
            BasicValueEnum::FloatValue(f) if f.get_type() == self.context.f32_type() => self
                .builder
                .build_float_cast(f, self.context.f64_type(), "vararg.fpext")
                .unwrap()
                .into(),
            BasicValueEnum::IntValue(i) if i.get_type().get_bit_width() < 32 => {
                self.cast_to_same_int(i, self.context.i32_type()).into()
            }
            other => other,
        }
    }

    // --- 成员访问 ---

    /// 解析成员链的“基底”：返回 (AST 结构体声明, IR 结构体类型, 基指针)。
    /// 每跳一层只发 GEP，加载只发生在叶子（或穿过指针字段时）。
    fn member_base(
        &mut self,
        e: &'ast ast::Expr,
    ) -> Option<(&'ast ast::StructDecl, StructType<'ctx>, PointerValue<'ctx>)> {
        match e {
            ast::Expr::Ident(name) => {
                let Some(b) = self.lookup_local(name) else {
                    self.error(format!("unknown identifier in member access: {}", name));
                    return None;
                };
                match &b.ty {
                    SourceType::Struct(n) => {
                        let n = n.clone();
                        let decl = self.require_struct_decl(&n)?;
                        let sty = self.get_or_create_named_struct(&n);
                        let base = match b.slot {
                            Slot::Stack { ptr, .. } => ptr,
                            Slot::Direct(v) if v.is_pointer_value() => v.into_pointer_value(),
                            _ => {
                                self.error(format!(
                                    "member access on non-addressable object: {}",
                                    name
                                ));
                                return None;
                            }
                        };
                        Some((decl, sty, base))
                    }
                    SourceType::Pointer(inner) if inner.base_struct_name().is_some() => {
                        let n = inner.base_struct_name().unwrap().to_string();
                        let decl = self.require_struct_decl(&n)?;
                        let sty = self.get_or_create_named_struct(&n);
                        let base = match b.slot {
                            Slot::Stack { ptr, ir_ty } => self
                                .builder
                                .build_load(ptr, &format!("{}.load", name))
                                .unwrap()
                                .into_pointer_value(),
                            Slot::Direct(v) => v.into_pointer_value(),
                        };
                        Some((decl, sty, base))
                    }
                    _ => {
                        self.error(format!("member access on non-struct object: {}", name));
                        None
                    }
                }
            }
            ast::Expr::Member { object, member } => {
                let (decl, sty, base) = self.member_base(object)?;
                let Some(idx) = Self::field_index(decl, member) else {
                    self.error(format!("no such field '{}' in struct {}", member, decl.name));
                    return None;
                };
                let field = &decl.fields[idx];
                let addr = self.struct_gep_via(sty, base, idx as u32, &format!("{}.addr", member));

                if let Some(inner) = &field.inline_struct {
                    let inner_ty = sty.get_field_type_at_index(idx as u32)?.into_struct_type();
                    return Some((inner, inner_ty, addr));
                }

                let fst = field
                    .ty
                    .as_ref()
                    .map(SourceType::from_ast)
                    .unwrap_or(SourceType::Unknown);
                match fst {
                    SourceType::Struct(n) => {
                        let decl2 = self.require_struct_decl(&n)?;
                        let sty2 = self.get_or_create_named_struct(&n);
                        Some((decl2, sty2, addr))
                    }
                    SourceType::Pointer(inner) if inner.base_struct_name().is_some() => {
                        // 穿过指针字段：这里必须加载
                        let n = inner.base_struct_name().unwrap().to_string();
                        let decl2 = self.require_struct_decl(&n)?;
                        let sty2 = self.get_or_create_named_struct(&n);
                        let field_ir = sty.get_field_type_at_index(idx as u32)?;
                        let loaded = self
                            .load_via(field_ir, addr, &format!("{}.load", member))
                            .into_pointer_value();
                        Some((decl2, sty2, loaded))
                    }
                    _ => {
                        self.error(format!(
                            "member access through non-struct field: {}",
                            member
                        ));
                        None
                    }
                }
            }
            other => {
                let v = self.codegen_expr(other)?;
                let st = self.infer_expr_type(other);
                let Some(n) = st.base_struct_name().map(str::to_string) else {
                    self.error("member access on non-struct expression");
                    return None;
                };
                let decl = self.require_struct_decl(&n)?;
                let sty = self.get_or_create_named_struct(&n);
                let base = if v.is_pointer_value() {
                    v.into_pointer_value()
                } else if v.is_struct_value() {
                    let tmp = self.entry_alloca(v.get_type(), "member.tmp");
                    self.builder.build_store(tmp, v).unwrap();
                    tmp
                } else {
                    self.error("unsupported base value for member access");
                    return None;
                };
                Some((decl, sty, base))
            }
        }
    }

    fn require_struct_decl(&mut self, name: &str) -> Option<&'ast ast::StructDecl> {
        match self.struct_decls.get(name).copied() {
            Some(d) => Some(d),
            None => {
                self.error(format!("unresolved struct type: {}", name));
                None
            }
        }
    }

    /// 成员的地址、IR 类型与源类型。
    pub(super) fn member_addr(
        &mut self,
        object: &'ast ast::Expr,
        member: &str,
    ) -> Option<(PointerValue<'ctx>, BasicTypeEnum<'ctx>, SourceType)> {
        let (decl, sty, base) = self.member_base(object)?;
        let Some(idx) = Self::field_index(decl, member) else {
            self.error(format!("no such field '{}' in struct {}", member, decl.name));
            return None;
        };
        let field = &decl.fields[idx];
        let addr = self.struct_gep_via(sty, base, idx as u32, &format!("{}.addr", member));
        let field_ir = sty.get_field_type_at_index(idx as u32)?;
        let field_st = if field.inline_struct.is_some() {
            SourceType::Unknown
        } else {
            field
                .ty
                .as_ref()
                .map(SourceType::from_ast)
                .unwrap_or(SourceType::Unknown)
        };
        Some((addr, field_ir, field_st))
    }

    fn codegen_member(
        &mut self,
        object: &'ast ast::Expr,
        member: &str,
    ) -> Option<BasicValueEnum<'ctx>> {
        let (addr, field_ir, _) = self.member_addr(object, member)?;
        Some(self.load_via(field_ir, addr, &format!("{}.val", member)))
    }

    // --- 结构体字面量 ---

    /// 在 entry 块分配一个结构体实例，按位置/命名初始化各字段。
    /// 未给出的字段不写入（保持栈上未初始化，与声明语义一致）。
    pub(super) fn codegen_struct_literal(
        &mut self,
        ty: &'ast ast::Type,
        inits: &'ast [ast::FieldInit],
    ) -> Option<BasicValueEnum<'ctx>> {
        let ast::Type::Named(type_name) = ty else {
            self.error("struct literal type must be a named type");
            return None;
        };
        let decl = self.require_struct_decl(type_name)?;
        let sty = self.get_or_create_named_struct(type_name);
        if sty.is_opaque() {
            self.error(format!("struct type '{}' has no body", type_name));
            return None;
        }

        let alloca = self.entry_alloca(sty.into(), &format!("{}.tmp", type_name));

        // 命名初始化按名对位，位置初始化填入首个空槽
        let mut slots: Vec<Option<&'ast ast::FieldInit>> = vec![None; decl.fields.len()];
        for init in inits {
            match &init.name {
                Some(n) => {
                    let Some(i) = Self::field_index(decl, n) else {
                        self.error(format!(
                            "unknown field '{}' in struct literal for {}",
                            n, type_name
                        ));
                        return None;
                    };
                    slots[i] = Some(init);
                }
                None => {
                    let Some(free) = slots.iter().position(|s| s.is_none()) else {
                        self.error(format!(
                            "too many positional initializers for struct {}",
                            type_name
                        ));
                        return None;
                    };
                    slots[free] = Some(init);
                }
            }
        }

        for (i, slot) in slots.clone().into_iter().enumerate() {
            let Some(init) = slot else { continue };
            let addr = self.struct_gep_via(
                sty,
                alloca,
                i as u32,
                &format!("{}.field{}.addr", type_name, i),
            );
            let v = self.codegen_expr(&init.value)?;
            let field_ty = sty.get_field_type_at_index(i as u32)?;

            let store_val = if field_ty.is_struct_type() && v.is_pointer_value() {
                // 指向同型结构体的指针：按值载入再存
                self.load_via(field_ty, v.into_pointer_value(), "field.load")
            } else {
                self.coerce_to(v, field_ty)?
            };
            self.builder.build_store(addr, store_val).unwrap();
        }

        Some(alloca.into())
    }

    // --- 字节数组字面量 ---

    /// 发一个私有的 `[N x i8]` 常量全局，返回指向首元素的指针。
    fn codegen_byte_array(&mut self, elems: &'ast [ast::Expr]) -> Option<BasicValueEnum<'ctx>> {
        let i8t = self.context.i8_type();
        let mut vals = Vec::with_capacity(elems.len());
        for e in elems {
            let ast::Expr::Literal { raw, kind: TokenKind::Int } = e else {
                self.error("byte array elements must be integer literals");
                return None;
            };
            let Some(v) = parse_int_literal(raw) else {
                self.error(format!("invalid byte literal: {}", raw));
                return None;
            };
            if !(0..=255).contains(&v) {
                self.error(format!("byte literal out of range (0..255): {}", raw));
                return None;
            }
            vals.push(i8t.const_int(v as u64, false));
        }

        let arr_ty = i8t.array_type(vals.len() as u32);
        let arr = i8t.const_array(&vals);

        let name = format!(".bytearr{}", self.byte_array_counter);
        self.byte_array_counter += 1;

        let gv = self.module.add_global(arr_ty, None, &name);
        gv.set_initializer(&arr);
        gv.set_constant(true);
        gv.set_linkage(inkwell::module::Linkage::Private);
        gv.set_unnamed_address(inkwell::values::UnnamedAddress::Global);
        gv.set_alignment(1);

        // 返回指向首元素的 `i8*`
        let first = self.cast_ptr(gv.as_pointer_value(), self.i8_ptr_ty(), "bytearr.ptr");
        Some(first.into())
    }

    // --- 类型推断（只读，不发 IR） ---

    /// 尽力推断一个表达式的源类型；推不出来给 Unknown。
    pub(super) fn infer_expr_type(&self, e: &'ast ast::Expr) -> SourceType {
        match e {
            ast::Expr::Ident(n) => self
                .lookup_local(n)
                .map(|b| b.ty)
                .unwrap_or(SourceType::Unknown),
            ast::Expr::Literal { kind, .. } => match kind {
                TokenKind::Int => SourceType::I32,
                TokenKind::Float => SourceType::F64,
                TokenKind::Str => SourceType::Str,
                TokenKind::Char => SourceType::Byte,
                TokenKind::KwTrue | TokenKind::KwFalse => SourceType::Bool,
                _ => SourceType::Unknown,
            },
            ast::Expr::Unary { op, rhs } => match op.as_str() {
                "*" => match self.infer_expr_type(rhs) {
                    SourceType::Pointer(inner) => *inner,
                    SourceType::Str => SourceType::Byte,
                    _ => SourceType::Unknown,
                },
                "&" => SourceType::Pointer(Box::new(self.infer_expr_type(rhs))),
                "!" => SourceType::I32,
                _ => self.infer_expr_type(rhs),
            },
            ast::Expr::Binary { op, left, right } => match op.as_str() {
                "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => SourceType::I32,
                _ => {
                    let lt = self.infer_expr_type(left);
                    if lt == SourceType::Unknown {
                        self.infer_expr_type(right)
                    } else {
                        lt
                    }
                }
            },
            ast::Expr::Call { callee, args } => {
                let ast::Expr::Ident(name) = callee.as_ref() else {
                    return SourceType::Unknown;
                };
                match name.as_str() {
                    "len" => SourceType::I32,
                    "append" => args
                        .first()
                        .map(|a| self.infer_expr_type(a))
                        .unwrap_or(SourceType::Unknown),
                    "new" => args
                        .first()
                        .map(|a| self.infer_expr_type(a))
                        .unwrap_or(SourceType::Unknown),
                    "cast" => match args.first() {
                        Some(ast::Expr::Ident(ty_name)) => SourceType::named(ty_name),
                        _ => SourceType::Unknown,
                    },
                    "strlen" => SourceType::I64,
                    _ => self
                        .func_decls
                        .get(name)
                        .and_then(|fd| fd.ret_type.as_ref())
                        .map(SourceType::from_ast)
                        .unwrap_or(SourceType::Unknown),
                }
            }
            ast::Expr::Member { object, member } => {
                let Some(decl) = self.struct_decl_of_expr(object) else {
                    return SourceType::Unknown;
                };
                let Some(i) = Self::field_index(decl, member) else {
                    return SourceType::Unknown;
                };
                let f = &decl.fields[i];
                if f.inline_struct.is_some() {
                    SourceType::Unknown
                } else {
                    f.ty
                        .as_ref()
                        .map(SourceType::from_ast)
                        .unwrap_or(SourceType::Unknown)
                }
            }
            ast::Expr::Index { collection, .. } => match self.infer_expr_type(collection) {
                SourceType::Slice(e) => *e,
                SourceType::Str => SourceType::I32,
                SourceType::Pointer(e) => *e,
                _ => SourceType::Unknown,
            },
            ast::Expr::Postfix { lhs, .. } => self.infer_expr_type(lhs),
            ast::Expr::ArrayLiteral { ty, elements } => {
                if let Some(t) = ty {
                    return SourceType::from_ast(t);
                }
                let elem = elements
                    .first()
                    .map(|e| self.infer_expr_type(e))
                    .unwrap_or(SourceType::Unknown);
                SourceType::Slice(Box::new(elem))
            }
            ast::Expr::ByteArrayLiteral { .. } => SourceType::Str,
            ast::Expr::StructLiteral { ty, .. } => SourceType::from_ast(ty),
        }
    }

    /// 找出一个表达式的结构体声明（用于成员类型推断，穿过内联结构体）。
    fn struct_decl_of_expr(&self, e: &'ast ast::Expr) -> Option<&'ast ast::StructDecl> {
        if let ast::Expr::Member { object, member } = e {
            let decl = self.struct_decl_of_expr(object)?;
            let i = Self::field_index(decl, member)?;
            let f = &decl.fields[i];
            if let Some(inner) = &f.inline_struct {
                return Some(inner);
            }
            let st = f.ty.as_ref().map(SourceType::from_ast)?;
            let name = st.base_struct_name()?.to_string();
            return self.struct_decls.get(&name).copied();
        }
        let st = self.infer_expr_type(e);
        let name = st.base_struct_name()?.to_string();
        self.struct_decls.get(&name).copied()
    }
}
