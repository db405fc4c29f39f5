//! 切片运行时：数组字面量、带边界检查的索引与 `append`。
//!
//! 所有数组值都是指向堆上描述符 `Array_internal { data, len, cap,
//! elem_size }` 的指针。元素按值存放在 data 缓冲区里（结构体元素
//! 整体内嵌，指针元素占一个指针槽），elem_size 在创建时定死。
//! 切片值的静态 IR 类型是“指向元素的指针”，进入运行时操作前统一
//! bitcast 成描述符指针。越界索引与除零一样走 `abort(); unreachable`。

use super::{CodeGen, Slot, SourceType};
use crate::parser::ast;
use inkwell::values::{BasicValueEnum, IntValue, PointerValue};
use inkwell::IntPredicate;

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    // --- 数组字面量 ---

    /// `[e1, ..., en]`：malloc 描述符与数据缓冲，逐元素写入。
    /// 空字面量仍分配一个元素的空间并写零值。
    pub(super) fn codegen_array_literal(
        &mut self,
        annotated: Option<&'ast ast::Type>,
        elements: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        let mut elem_vals = Vec::with_capacity(elements.len());
        for e in elements {
            let mut v = self.codegen_expr(e)?;
            // 结构体元素按值内嵌：字面量产出的是指针，这里载入
            if v.is_pointer_value() {
                if let SourceType::Struct(n) = self.infer_expr_type(e) {
                    let sty = self.get_or_create_named_struct(&n);
                    if !sty.is_opaque() {
                        v = self.load_via(sty.into(), v.into_pointer_value(), "elem.byval");
                    }
                }
            }
            elem_vals.push(v);
        }

        // 带类型的字面量以标注为准（元素做必要的拓宽/窄化），
        // 否则取第一个元素的 IR 类型；空且无标注时退到 i64
        let elem_ty = if let Some(ast::Type::Array { elem, .. }) = annotated {
            self.resolve_type_from_ast(elem)
                .unwrap_or_else(|| self.context.i64_type().into())
        } else if let Some(first) = elem_vals.first() {
            first.get_type()
        } else {
            self.context.i64_type().into()
        };

        let i64t = self.context.i64_type();
        let desc_ty = self.slice_struct_type();
        let desc_ptr_ty = self.slice_ptr_ty();

        let elem_size = i64t.const_int(self.alloc_size(elem_ty), false);
        let len = elem_vals.len() as u64;
        let len_val = i64t.const_int(len, false);
        let alloc_elems = i64t.const_int(len.max(1), false);
        let total_bytes = self
            .builder
            .build_int_mul(elem_size, alloc_elems, "total_bytes")
            .unwrap();

        let malloc = self.get_malloc();
        let desc_size = i64t.const_int(self.alloc_size(desc_ty.into()), false);
        let raw_desc = self
            .builder
            .build_call(malloc, &[desc_size.into()], "array_struct_raw")
            .unwrap()
            .try_as_basic_value()
            .left()?
            .into_pointer_value();
        let desc_ptr = self.cast_ptr(raw_desc, desc_ptr_ty, "array_struct");

        let data_ptr = self
            .builder
            .build_call(malloc, &[total_bytes.into()], "array_data_raw")
            .unwrap()
            .try_as_basic_value()
            .left()?
            .into_pointer_value();

        let data_slot = self.struct_gep_via(desc_ty, desc_ptr, 0, "data_ptr_ptr");
        let len_slot = self.struct_gep_via(desc_ty, desc_ptr, 1, "len_ptr");
        let cap_slot = self.struct_gep_via(desc_ty, desc_ptr, 2, "cap_ptr");
        let es_slot = self.struct_gep_via(desc_ty, desc_ptr, 3, "elem_size_ptr");
        self.store_via(data_slot, data_ptr.into());
        self.store_via(len_slot, len_val.into());
        self.store_via(cap_slot, alloc_elems.into());
        self.store_via(es_slot, elem_size.into());

        // 以元素类型看待数据缓冲
        let typed_data = self.cast_ptr(data_ptr, self.ptr_to(elem_ty), "typed_data");

        if elem_vals.is_empty() {
            let zero = self.const_zero(elem_ty);
            let slot0 = unsafe {
                self.builder
                    .build_in_bounds_gep(typed_data, &[i64t.const_zero()], "slot0")
            }
            .unwrap();
            self.builder.build_store(slot0, zero).unwrap();
        } else {
            for (i, v) in elem_vals.clone().into_iter().enumerate() {
                let idx = i64t.const_int(i as u64, false);
                let slot = unsafe {
                    self.builder
                        .build_in_bounds_gep(typed_data, &[idx], "slot_ptr")
                }
                .unwrap();
                let v = self.coerce_to(v, elem_ty)?;
                self.builder.build_store(slot, v).unwrap();
            }
        }

        Some(desc_ptr.into())
    }

    // --- 索引 ---

    /// 把集合值规整为描述符指针。
    fn collection_to_desc_ptr(
        &mut self,
        col: BasicValueEnum<'ctx>,
    ) -> Option<PointerValue<'ctx>> {
        let desc_ptr_ty = self.slice_ptr_ty();
        if col.is_pointer_value() {
            return Some(self.cast_ptr(col.into_pointer_value(), desc_ptr_ty, "arr_cast"));
        }
        if col.is_struct_value() {
            // 描述符按值出现（append 的返回值）：落到栈上取址
            let tmp = self.entry_alloca(col.get_type(), "arr.tmp");
            self.builder.build_store(tmp, col).unwrap();
            return Some(self.cast_ptr(tmp, desc_ptr_ty, "arr_tmp_cast"));
        }
        if col.is_int_value() {
            let iv = col.into_int_value();
            let expected = self.ptr_size_bytes() * 8;
            if iv.get_type().get_bit_width() as u64 != expected {
                self.error("collection integer has wrong width (not pointer-sized)");
                return None;
            }
            return Some(
                self.builder
                    .build_int_to_ptr(iv, desc_ptr_ty, "arr_from_intptr")
                    .unwrap(),
            );
        }
        self.error("unsupported collection value in index expression");
        None
    }

    /// 边界检查 + 元素字节地址。返回 (elem_ptr_i8, elem_size)。
    fn checked_elem_ptr(
        &mut self,
        desc_ptr: PointerValue<'ctx>,
        idx: IntValue<'ctx>,
    ) -> Option<(PointerValue<'ctx>, IntValue<'ctx>)> {
        let i64t = self.context.i64_type();
        let desc_ty = self.slice_struct_type();

        let len_slot = self.struct_gep_via(desc_ty, desc_ptr, 1, "len_ptr");
        let len = self.load_via(i64t.into(), len_slot, "len").into_int_value();
        let in_range = self
            .builder
            .build_int_compare(IntPredicate::ULT, idx, len, "idx_in_range")
            .unwrap();

        let ok = self.append_block("idx_ok");
        let oob = self.append_block("idx_oob");
        self.builder.build_conditional_branch(in_range, ok, oob).unwrap();

        self.builder.position_at_end(oob);
        self.build_trap();

        self.builder.position_at_end(ok);

        let data_slot = self.struct_gep_via(desc_ty, desc_ptr, 0, "data_field_ptr");
        let data = self
            .load_via(self.i8_ptr_ty().into(), data_slot, "data_ptr")
            .into_pointer_value();
        let es_slot = self.struct_gep_via(desc_ty, desc_ptr, 3, "elem_size_ptr");
        let elem_size = self
            .load_via(i64t.into(), es_slot, "elem_size")
            .into_int_value();

        let offset = self
            .builder
            .build_int_mul(idx, elem_size, "offset_bytes")
            .unwrap();
        let elem_ptr = self.gep_i8(data, offset, "elem_ptr_i8");
        Some((elem_ptr, elem_size))
    }

    /// `a[i]` 读取。C 字符串按字节取值；切片走边界检查后按元素
    /// 源类型做有类型加载，类型未知时退回 {8,4,2,1} 尺寸开关。
    pub(super) fn codegen_index(
        &mut self,
        collection: &'ast ast::Expr,
        index: &'ast ast::Expr,
    ) -> Option<BasicValueEnum<'ctx>> {
        let col_st = self.infer_expr_type(collection);

        // C 字符串：GEP 到第 i 字节，取 i8 零扩展为 i32
        if col_st.is_string() {
            let s = self.codegen_expr(collection)?;
            if !s.is_pointer_value() {
                self.error("string value expected for index");
                return None;
            }
            let idx = self.codegen_expr(index)?;
            let idx = self.index_to_i64(idx)?;
            let ch_ptr = self.gep_i8(s.into_pointer_value(), idx, "char_ptr");
            let ch = self
                .load_via(self.context.i8_type().into(), ch_ptr, "char")
                .into_int_value();
            return Some(
                self.builder
                    .build_int_z_extend(ch, self.context.i32_type(), "char_ext")
                    .unwrap()
                    .into(),
            );
        }

        let col = self.codegen_expr(collection)?;
        let idx = self.codegen_expr(index)?;
        let idx = self.index_to_i64(idx)?;
        let desc_ptr = self.collection_to_desc_ptr(col)?;
        let (elem_ptr, elem_size) = self.checked_elem_ptr(desc_ptr, idx)?;

        // 元素类型已知：有类型加载
        if let SourceType::Slice(elem_st) = col_st {
            match *elem_st {
                SourceType::I32
                | SourceType::I64
                | SourceType::F32
                | SourceType::F64
                | SourceType::Byte
                | SourceType::Bool => {
                    let ty = self.source_type_ir(&elem_st);
                    return Some(self.load_via(ty, elem_ptr, "elem"));
                }
                SourceType::Str | SourceType::Pointer(_) | SourceType::Slice(_) => {
                    let ty = self.source_type_ir(&elem_st);
                    return Some(self.load_via(ty, elem_ptr, "elem_ptr"));
                }
                SourceType::Struct(ref n) => {
                    // 结构体内嵌存放：元素地址本身就是结构体指针
                    let n = n.clone();
                    let sty = self.get_or_create_named_struct(&n);
                    let typed =
                        self.cast_ptr(elem_ptr, self.ptr_to(sty.into()), "elem_struct_ptr");
                    return Some(typed.into());
                }
                _ => {}
            }
        }

        // 类型未知：按 elem_size 的运行期开关取一个整数，拓宽为 i64
        self.codegen_index_size_switch(elem_ptr, elem_size)
    }

    /// `{8,4,2,1}` 尺寸开关：按 elem_size 加载对应宽度的整数并符号
    /// 扩展为 i64；都不匹配时按指针槽加载再 ptrtoint。
    fn codegen_index_size_switch(
        &mut self,
        elem_ptr: PointerValue<'ctx>,
        elem_size: IntValue<'ctx>,
    ) -> Option<BasicValueEnum<'ctx>> {
        let i64t = self.context.i64_type();

        let case8 = self.append_block("case8");
        let try4 = self.append_block("try4");
        let case4 = self.append_block("case4");
        let try2 = self.append_block("try2");
        let case2 = self.append_block("case2");
        let try1 = self.append_block("try1");
        let case1 = self.append_block("case1");
        let fallback = self.append_block("case_default");
        let after = self.append_block("idx_after");

        let is8 = self
            .builder
            .build_int_compare(IntPredicate::EQ, elem_size, i64t.const_int(8, false), "is8")
            .unwrap();
        self.builder.build_conditional_branch(is8, case8, try4).unwrap();

        self.builder.position_at_end(case8);
        let v8 = self.load_via(i64t.into(), elem_ptr, "load_i64").into_int_value();
        self.builder.build_unconditional_branch(after).unwrap();

        self.builder.position_at_end(try4);
        let is4 = self
            .builder
            .build_int_compare(IntPredicate::EQ, elem_size, i64t.const_int(4, false), "is4")
            .unwrap();
        self.builder.build_conditional_branch(is4, case4, try2).unwrap();

        self.builder.position_at_end(case4);
        let l4 = self
            .load_via(self.context.i32_type().into(), elem_ptr, "load_i32")
            .into_int_value();
        let v4 = self.builder.build_int_s_extend(l4, i64t, "sext_i32").unwrap();
        self.builder.build_unconditional_branch(after).unwrap();

        self.builder.position_at_end(try2);
        let is2 = self
            .builder
            .build_int_compare(IntPredicate::EQ, elem_size, i64t.const_int(2, false), "is2")
            .unwrap();
        self.builder.build_conditional_branch(is2, case2, try1).unwrap();

        self.builder.position_at_end(case2);
        let l2 = self
            .load_via(self.context.i16_type().into(), elem_ptr, "load_i16")
            .into_int_value();
        let v2 = self.builder.build_int_s_extend(l2, i64t, "sext_i16").unwrap();
        self.builder.build_unconditional_branch(after).unwrap();

        self.builder.position_at_end(try1);
        let is1 = self
            .builder
            .build_int_compare(IntPredicate::EQ, elem_size, i64t.const_int(1, false), "is1")
            .unwrap();
        self.builder
            .build_conditional_branch(is1, case1, fallback)
            .unwrap();

        self.builder.position_at_end(case1);
        let l1 = self
            .load_via(self.context.i8_type().into(), elem_ptr, "load_i8")
            .into_int_value();
        let v1 = self.builder.build_int_s_extend(l1, i64t, "sext_i8").unwrap();
        self.builder.build_unconditional_branch(after).unwrap();

        self.builder.position_at_end(fallback);
        let lp = self
            .load_via(self.i8_ptr_ty().into(), elem_ptr, "load_ptr_slot")
            .into_pointer_value();
        let vp = self
            .builder
            .build_ptr_to_int(lp, i64t, "ptrtoint_default")
            .unwrap();
        self.builder.build_unconditional_branch(after).unwrap();

        self.builder.position_at_end(after);
        let phi = self.builder.build_phi(i64t, "idx_result").unwrap();
        phi.add_incoming(&[
            (&v8, case8),
            (&v4, case4),
            (&v2, case2),
            (&v1, case1),
            (&vp, fallback),
        ]);
        Some(phi.as_basic_value())
    }

    /// `&a[i]`：同样的边界检查，返回元素地址但不加载。
    pub(super) fn codegen_index_addr(
        &mut self,
        collection: &'ast ast::Expr,
        index: &'ast ast::Expr,
    ) -> Option<PointerValue<'ctx>> {
        let col_st = self.infer_expr_type(collection);

        if col_st.is_string() {
            let s = self.codegen_expr(collection)?;
            if !s.is_pointer_value() {
                self.error("string value expected for index");
                return None;
            }
            let idx = self.codegen_expr(index)?;
            let idx = self.index_to_i64(idx)?;
            return Some(self.gep_i8(s.into_pointer_value(), idx, "char_ptr"));
        }

        let col = self.codegen_expr(collection)?;
        let idx = self.codegen_expr(index)?;
        let idx = self.index_to_i64(idx)?;
        let desc_ptr = self.collection_to_desc_ptr(col)?;
        let (elem_ptr, _) = self.checked_elem_ptr(desc_ptr, idx)?;
        Some(elem_ptr)
    }

    // --- append ---

    /// `append(a, e)`：len < cap 时走快路径写入槽位；否则容量翻倍
    /// （0 取 1），malloc 新缓冲 `new_cap * elem_size`，搬运旧字节，
    /// 再写入。目标是标识符/全局时返回载入的描述符值，否则返回
    /// 描述符指针。
    pub(super) fn codegen_append(
        &mut self,
        args: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        if args.len() != 2 {
            self.error("append expects 2 arguments (array, elem)");
            return None;
        }

        let i64t = self.context.i64_type();
        let desc_ty = self.slice_struct_type();
        let desc_ptr_ty = self.slice_ptr_ty();

        // 第一个实参解析为描述符指针
        let mut returns_loaded_struct = false;
        let desc_ptr: PointerValue<'ctx> = match &args[0] {
            ast::Expr::Ident(name) => {
                let Some(b) = self.lookup_local(name) else {
                    self.error(format!("unknown identifier in append: {}", name));
                    return None;
                };
                match b.slot {
                    Slot::Stack { ptr, ir_ty } => {
                        returns_loaded_struct = true;
                        let v = self
                            .builder
                            .build_load(ptr, "arr.loaded")
                            .unwrap();
                        if !v.is_pointer_value() {
                            self.error(format!("append target is not a slice: {}", name));
                            return None;
                        }
                        self.cast_ptr(v.into_pointer_value(), desc_ptr_ty, "arr.as_arrayptr")
                    }
                    Slot::Direct(v) => {
                        if !v.is_pointer_value() {
                            self.error(format!("append target is not a slice: {}", name));
                            return None;
                        }
                        self.cast_ptr(v.into_pointer_value(), desc_ptr_ty, "arr.as_arrayptr")
                    }
                }
            }
            ast::Expr::Index { collection, index } => {
                // 元素槽里存的是描述符指针，取出来
                let slot = self.codegen_index_addr(collection, index)?;
                self.load_via(desc_ptr_ty.into(), slot, "arr.from_elem")
                    .into_pointer_value()
            }
            ast::Expr::Unary { op, rhs } if op == "*" || op == "&" => {
                let v = self.codegen_expr(rhs)?;
                self.collection_to_desc_ptr(v)?
            }
            other => {
                let v = self.codegen_expr(other)?;
                self.collection_to_desc_ptr(v)?
            }
        };

        let mut elem = self.codegen_expr(&args[1])?;
        // 结构体元素按值写入
        if elem.is_pointer_value() {
            if let SourceType::Struct(n) = self.infer_expr_type(&args[1]) {
                let sty = self.get_or_create_named_struct(&n);
                if !sty.is_opaque() {
                    elem = self.load_via(sty.into(), elem.into_pointer_value(), "elem.byval");
                }
            }
        }

        let data_slot = self.struct_gep_via(desc_ty, desc_ptr, 0, "data_ptr_ptr");
        let len_slot = self.struct_gep_via(desc_ty, desc_ptr, 1, "len_ptr");
        let cap_slot = self.struct_gep_via(desc_ty, desc_ptr, 2, "cap_ptr");
        let es_slot = self.struct_gep_via(desc_ty, desc_ptr, 3, "elem_size_ptr");

        let len = self.load_via(i64t.into(), len_slot, "len").into_int_value();
        let cap = self.load_via(i64t.into(), cap_slot, "cap").into_int_value();
        let elem_size = self
            .load_via(i64t.into(), es_slot, "elem_size")
            .into_int_value();
        let data = self
            .load_via(self.i8_ptr_ty().into(), data_slot, "raw_data_ptr")
            .into_pointer_value();

        let has_space = self
            .builder
            .build_int_compare(IntPredicate::ULT, len, cap, "has_space")
            .unwrap();
        let bb_fast = self.append_block("append_has_space");
        let bb_grow = self.append_block("append_grow");
        let bb_cont = self.append_block("append_cont");
        self.builder
            .build_conditional_branch(has_space, bb_fast, bb_grow)
            .unwrap();

        // 快路径：直接写入 data[len]
        self.builder.position_at_end(bb_fast);
        {
            let offset = self
                .builder
                .build_int_mul(len, elem_size, "offset_bytes")
                .unwrap();
            let dest = self.gep_i8(data, offset, "slot_i8ptr");
            self.write_slice_elem(dest, elem, elem_size);

            let new_len = self
                .builder
                .build_int_add(len, i64t.const_int(1, false), "len_plus1")
                .unwrap();
            self.store_via(len_slot, new_len.into());
            self.builder.build_unconditional_branch(bb_cont).unwrap();
        }

        // 增长路径：容量翻倍（0 取 1），搬运旧数据
        self.builder.position_at_end(bb_grow);
        {
            let zero = i64t.const_zero();
            let one = i64t.const_int(1, false);

            let cap_is_zero = self
                .builder
                .build_int_compare(IntPredicate::EQ, cap, zero, "cap_is_zero")
                .unwrap();
            let cap_dbl = self
                .builder
                .build_int_mul(cap, i64t.const_int(2, false), "cap_dbl")
                .unwrap();
            let new_cap = self
                .builder
                .build_select(cap_is_zero, one, cap_dbl, "new_cap")
                .unwrap()
                .into_int_value();

            let new_bytes = self
                .builder
                .build_int_mul(new_cap, elem_size, "new_bytes")
                .unwrap();
            let malloc = self.get_malloc();
            let new_data = self
                .builder
                .build_call(malloc, &[new_bytes.into()], "new_data_raw")
                .unwrap()
                .try_as_basic_value()
                .left()?
                .into_pointer_value();

            let old_bytes = self
                .builder
                .build_int_mul(len, elem_size, "bytes_to_copy")
                .unwrap();
            let data_null = self.builder.build_is_null(data, "raw_data_is_null").unwrap();
            let len_nonzero = self
                .builder
                .build_int_compare(IntPredicate::NE, len, zero, "len_not_zero")
                .unwrap();
            let not_null = self.builder.build_not(data_null, "data_not_null").unwrap();
            let need_copy = self
                .builder
                .build_and(len_nonzero, not_null, "need_copy")
                .unwrap();

            let bb_copy = self.append_block("append_do_copy");
            let bb_nocopy = self.append_block("append_no_copy");
            self.builder
                .build_conditional_branch(need_copy, bb_copy, bb_nocopy)
                .unwrap();

            self.builder.position_at_end(bb_copy);
            self.builder
                .build_memcpy(new_data, 1, data, 1, old_bytes)
                .unwrap();
            self.builder.build_unconditional_branch(bb_nocopy).unwrap();

            self.builder.position_at_end(bb_nocopy);
            self.store_via(data_slot, new_data.into());
            self.store_via(cap_slot, new_cap.into());

            let offset = self
                .builder
                .build_int_mul(len, elem_size, "offset_bytes_new")
                .unwrap();
            let dest = self.gep_i8(new_data, offset, "slot_new_i8ptr");
            self.write_slice_elem(dest, elem, elem_size);

            let new_len = self
                .builder
                .build_int_add(len, one, "len_plus1_grow")
                .unwrap();
            self.store_via(len_slot, new_len.into());
            self.builder.build_unconditional_branch(bb_cont).unwrap();
        }

        self.builder.position_at_end(bb_cont);

        if returns_loaded_struct {
            let loaded = self.load_via(desc_ty.into(), desc_ptr, "append_return_struct");
            return Some(loaded);
        }
        Some(desc_ptr.into())
    }

    /// 把一个元素写进 data 缓冲的字节槽。
    /// 指针元素且 elem_size 恰为指针宽度时按指针槽存值；
    /// 其余情况经零填充的临时缓冲 memcpy `elem_size` 字节。
    fn write_slice_elem(
        &mut self,
        dest_i8: PointerValue<'ctx>,
        elem: BasicValueEnum<'ctx>,
        elem_size: IntValue<'ctx>,
    ) {
        let i64t = self.context.i64_type();
        let i8t = self.context.i8_type();

        if elem.is_pointer_value() {
            let ptr_size = i64t.const_int(self.ptr_size_bytes(), false);
            let is_ptr_slot = self
                .builder
                .build_int_compare(IntPredicate::EQ, elem_size, ptr_size, "is_ptr_array")
                .unwrap();

            let bb_ptr = self.append_block("append_ptr_mode");
            let bb_copy = self.append_block("append_copy_mode");
            let bb_after = self.append_block("append_after_mode");
            self.builder
                .build_conditional_branch(is_ptr_slot, bb_ptr, bb_copy)
                .unwrap();

            // 指针槽：把指针值本身存进槽
            self.builder.position_at_end(bb_ptr);
            let as_i8 = self.cast_ptr(elem.into_pointer_value(), self.i8_ptr_ty(), "elem_as_i8");
            let slot = self.cast_ptr(dest_i8, self.ptr_to(self.i8_ptr_ty().into()), "slot_ptrptr");
            self.builder.build_store(slot, as_i8).unwrap();
            self.builder.build_unconditional_branch(bb_after).unwrap();

            // 字节拷贝：把被指对象的 elem_size 字节拷进槽
            self.builder.position_at_end(bb_copy);
            self.builder
                .build_memcpy(dest_i8, 1, elem.into_pointer_value(), 1, elem_size)
                .unwrap();
            self.builder.build_unconditional_branch(bb_after).unwrap();

            self.builder.position_at_end(bb_after);
            return;
        }

        // 非指针元素：先落到零填充的临时缓冲，再整块拷贝，
        // 保证元素比槽窄时高位字节为零
        let tmp = self
            .builder
            .build_array_alloca(i8t, elem_size, "elem_tmp")
            .unwrap();
        self.builder
            .build_memset(tmp, 1, i8t.const_zero(), elem_size)
            .unwrap();

        let spill = self
            .builder
            .build_alloca(elem.get_type(), "elem_src_tmp")
            .unwrap();
        self.builder.build_store(spill, elem).unwrap();

        let val_size = i64t.const_int(self.alloc_size(elem.get_type()), false);
        let smaller = self
            .builder
            .build_int_compare(IntPredicate::ULT, elem_size, val_size, "cmp_elem_less")
            .unwrap();
        let copy_size = self
            .builder
            .build_select(smaller, elem_size, val_size, "copy_size")
            .unwrap()
            .into_int_value();
        self.builder
            .build_memcpy(tmp, 1, spill, 1, copy_size)
            .unwrap();
        self.builder
            .build_memcpy(dest_i8, 1, tmp, 1, elem_size)
            .unwrap();
    }

    // --- new ---

    /// `new([]T{})` / `new(T)`：分配一个空描述符
    /// `{data=null, len=0, cap=0, elem_size=sizeof(T)}`。
    pub(super) fn codegen_new(&mut self, args: &'ast [ast::Expr]) -> Option<BasicValueEnum<'ctx>> {
        if args.len() != 1 {
            self.error("new expects one type argument, e.g. new([]T{})");
            return None;
        }

        let elem_ty = match &args[0] {
            ast::Expr::ArrayLiteral {
                ty: Some(ast::Type::Array { elem, .. }),
                ..
            } => self.resolve_type_from_ast(elem),
            ast::Expr::Ident(name) => self.resolve_type_by_name(name),
            _ => {
                self.error("new currently supports an array type like new([]T{})");
                return None;
            }
        };
        let Some(elem_ty) = elem_ty else {
            self.error("cannot determine element type for new()");
            return None;
        };

        let i64t = self.context.i64_type();
        let desc_ty = self.slice_struct_type();
        let desc_ptr_ty = self.slice_ptr_ty();
        let malloc = self.get_malloc();

        let desc_size = i64t.const_int(self.alloc_size(desc_ty.into()), false);
        let raw = self
            .builder
            .build_call(malloc, &[desc_size.into()], "rawmem")
            .unwrap()
            .try_as_basic_value()
            .left()?
            .into_pointer_value();
        let desc_ptr = self.cast_ptr(raw, desc_ptr_ty, "sliceptr");

        let data_slot = self.struct_gep_via(desc_ty, desc_ptr, 0, "slice.data.gep");
        self.store_via(data_slot, self.i8_ptr_ty().const_null().into());
        let len_slot = self.struct_gep_via(desc_ty, desc_ptr, 1, "slice.len.gep");
        self.store_via(len_slot, i64t.const_zero().into());
        let cap_slot = self.struct_gep_via(desc_ty, desc_ptr, 2, "slice.cap.gep");
        self.store_via(cap_slot, i64t.const_zero().into());
        let es_slot = self.struct_gep_via(desc_ty, desc_ptr, 3, "slice.elem_size.gep");
        self.store_via(
            es_slot,
            i64t.const_int(self.alloc_size(elem_ty), false).into(),
        );

        Some(desc_ptr.into())
    }
}
