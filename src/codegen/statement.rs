//! 语句与控制流下放：变量声明、赋值、if、三种 for、
//! break/continue、return 与块作用域。

use super::{CodeGen, Slot, SourceType};
use crate::parser::ast;
use inkwell::types::BasicTypeEnum;
use inkwell::values::BasicValueEnum;

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    pub(super) fn codegen_block(&mut self, blk: &'ast ast::Block) {
        for s in &blk.stmts {
            self.codegen_stmt(s);
        }
    }

    pub(super) fn codegen_stmt(&mut self, s: &'ast ast::Stmt) {
        match s {
            ast::Stmt::Expr(e) => {
                // 只为副作用求值
                let _ = self.codegen_expr(e);
            }
            ast::Stmt::Return(expr) => self.codegen_return(expr.as_ref()),
            ast::Stmt::VarDecl { name, ty, init } => {
                self.codegen_vardecl(name, ty.as_ref(), init.as_ref());
            }
            ast::Stmt::Assign { target, value } => self.codegen_assign(target, value),
            ast::Stmt::Block(b) => {
                self.push_scope();
                self.codegen_block(b);
                self.pop_scope();
            }
            ast::Stmt::If {
                cond,
                then_blk,
                else_blk,
            } => self.codegen_if(cond, then_blk, else_blk.as_ref()),
            ast::Stmt::ForIn {
                var, iterable, body, ..
            } => self.codegen_for_in(var, iterable, body),
            ast::Stmt::For { body } => self.codegen_for_infinite(body),
            ast::Stmt::ForC {
                init,
                cond,
                post,
                body,
            } => self.codegen_for_c(init.as_deref(), cond.as_ref(), post.as_ref(), body),
            ast::Stmt::Break => {
                let Some(target) = self.break_targets.last().copied() else {
                    self.error("break used outside of loop");
                    return;
                };
                self.builder.build_unconditional_branch(target).unwrap();
                // 后续语句还需要一个归属块（它们是死代码）
                let cont = self.append_block("after.break");
                self.builder.position_at_end(cont);
            }
            ast::Stmt::Continue => {
                let Some(target) = self.continue_targets.last().copied() else {
                    self.error("continue used outside of loop");
                    return;
                };
                self.builder.build_unconditional_branch(target).unwrap();
                let cont = self.append_block("after.continue");
                self.builder.position_at_end(cont);
            }
        }
    }

    // --- 变量声明 ---

    /// 槽类型选取：有标注用标注；否则按初始化值的 IR 类型推
    /// （整数一律 i32，浮点 f64，指针/结构体用原类型）。
    fn codegen_vardecl(
        &mut self,
        name: &str,
        ty: Option<&'ast ast::Type>,
        init: Option<&'ast ast::Expr>,
    ) {
        let source_ty = match (ty, init) {
            (Some(t), _) => SourceType::from_ast(t),
            (None, Some(e)) => self.infer_expr_type(e),
            (None, None) => SourceType::Unknown,
        };

        let Some(init) = init else {
            // 无初始化：按标注分配并写零值
            let ir_ty = self.source_type_ir(&source_ty);
            let alloca = self.entry_alloca(ir_ty, name);
            let zero = self.const_zero(ir_ty);
            self.builder.build_store(alloca, zero).unwrap();
            self.bind_local(name, source_ty, Slot::Stack { ptr: alloca, ir_ty }, false);
            return;
        };

        // 结构体字面量：直接绑定字面量的栈槽
        if let ast::Expr::StructLiteral { ty: lit_ty, inits } = init {
            let Some(v) = self.codegen_struct_literal(lit_ty, inits) else {
                return;
            };
            let ptr = v.into_pointer_value();
            let ir_ty: BasicTypeEnum<'ctx> = match &source_ty {
                SourceType::Struct(n) => {
                    let n = n.clone();
                    self.get_or_create_named_struct(&n).into()
                }
                _ => self.context.i32_type().into(),
            };
            self.bind_local(name, source_ty, Slot::Stack { ptr, ir_ty }, false);
            return;
        }

        let Some(v) = self.codegen_expr(init) else {
            return;
        };

        let ir_ty: BasicTypeEnum<'ctx> = if ty.is_some() {
            self.source_type_ir(&source_ty)
        } else {
            match v {
                BasicValueEnum::IntValue(_) => self.context.i32_type().into(),
                BasicValueEnum::FloatValue(_) => self.context.f64_type().into(),
                other => other.get_type(),
            }
        };

        let alloca = self.entry_alloca(ir_ty, name);
        if let Some(store_val) = self.coerce_to(v, ir_ty) {
            self.builder.build_store(alloca, store_val).unwrap();
        }
        self.bind_local(name, source_ty, Slot::Stack { ptr: alloca, ir_ty }, false);
    }

    // --- 赋值 ---

    /// 目标解析为指针后做必要的窄化/拓宽再 store。
    fn codegen_assign(&mut self, target: &'ast ast::Expr, value: &'ast ast::Expr) {
        match target {
            ast::Expr::Ident(name) => {
                let Some(b) = self.lookup_local(name) else {
                    self.error(format!("assignment to unknown identifier: {}", name));
                    return;
                };
                let Some(v) = self.codegen_expr(value) else {
                    return;
                };
                match b.slot {
                    Slot::Stack { ptr, ir_ty } => {
                        if let Some(sv) = self.coerce_to(v, ir_ty) {
                            self.builder.build_store(ptr, sv).unwrap();
                        }
                    }
                    Slot::Direct(dv) => {
                        // 指针形参：写穿该指针
                        if dv.is_pointer_value() {
                            self.store_via(dv.into_pointer_value(), v);
                        } else {
                            self.error(format!("unsupported assignment target: {}", name));
                        }
                    }
                }
            }
            ast::Expr::Unary { op, rhs } if op == "&" => {
                // `&x = e`：写入 x 的槽
                let ptr = match rhs.as_ref() {
                    ast::Expr::Ident(name) => match self.lookup_local(name) {
                        Some(b) => match b.slot {
                            Slot::Stack { ptr, .. } => Some(ptr),
                            Slot::Direct(v) if v.is_pointer_value() => {
                                Some(v.into_pointer_value())
                            }
                            _ => None,
                        },
                        None => {
                            self.error(format!("unknown identifier in & LHS: {}", name));
                            None
                        }
                    },
                    ast::Expr::Index { collection, index } => {
                        self.codegen_index_addr(collection, index)
                    }
                    _ => {
                        self.error("& LHS requires an identifier or index expression");
                        None
                    }
                };
                let Some(ptr) = ptr else { return };
                if let Some(v) = self.codegen_expr(value) {
                    self.builder.build_store(ptr, v).unwrap();
                }
            }
            ast::Expr::Unary { op, rhs } if op == "*" => {
                // `*p = e`：p 求值得到地址，写穿
                let Some(pv) = self.codegen_expr(rhs) else { return };
                if !pv.is_pointer_value() {
                    self.error("* LHS requires a pointer value");
                    return;
                }
                let Some(v) = self.codegen_expr(value) else { return };
                // 写入宽度由指针的源类型决定
                let store_val = match self.infer_expr_type(rhs) {
                    SourceType::Pointer(inner) => {
                        let dest = self.source_type_ir(&inner);
                        match self.coerce_to(v, dest) {
                            Some(sv) => sv,
                            None => return,
                        }
                    }
                    _ => v,
                };
                self.store_via(pv.into_pointer_value(), store_val);
            }
            ast::Expr::Index { collection, index } => {
                let Some(addr) = self.codegen_index_addr(collection, index) else {
                    return;
                };
                let Some(v) = self.codegen_expr(value) else { return };
                let store_val = match self.infer_expr_type(collection) {
                    SourceType::Slice(elem) => {
                        let dest = self.source_type_ir(&elem);
                        match self.coerce_to(v, dest) {
                            Some(sv) => sv,
                            None => return,
                        }
                    }
                    SourceType::Str => {
                        let dest = self.context.i8_type().into();
                        match self.coerce_to(v, dest) {
                            Some(sv) => sv,
                            None => return,
                        }
                    }
                    _ => v,
                };
                self.store_via(addr, store_val);
            }
            ast::Expr::Member { object, member } => {
                let Some((addr, field_ir, _)) = self.member_addr(object, member) else {
                    return;
                };
                let Some(v) = self.codegen_expr(value) else { return };
                let store_val = if field_ir.is_struct_type() && v.is_pointer_value() {
                    self.load_via(field_ir, v.into_pointer_value(), "load_struct_for_store")
                } else {
                    match self.coerce_to(v, field_ir) {
                        Some(sv) => sv,
                        None => return,
                    }
                };
                self.store_via(addr, store_val);
            }
            _ => {
                self.error("unsupported assignment target");
            }
        }
    }

    // --- 控制流 ---

    fn codegen_if(
        &mut self,
        cond: &'ast ast::Expr,
        then_blk: &'ast ast::Block,
        else_blk: Option<&'ast ast::Block>,
    ) {
        let Some(cond_val) = self.codegen_expr(cond) else {
            return;
        };
        let cond_bool = self.to_condition(cond_val);

        let then_bb = self.append_block("then");
        let else_bb = else_blk.map(|_| self.append_block("else"));
        let merge_bb = self.append_block("ifcont");

        self.builder
            .build_conditional_branch(cond_bool, then_bb, else_bb.unwrap_or(merge_bb))
            .unwrap();

        self.builder.position_at_end(then_bb);
        self.push_scope();
        self.codegen_block(then_blk);
        self.pop_scope();
        if !self.block_terminated() {
            self.builder.build_unconditional_branch(merge_bb).unwrap();
        }

        if let (Some(blk), Some(bb)) = (else_blk, else_bb) {
            self.builder.position_at_end(bb);
            self.push_scope();
            self.codegen_block(blk);
            self.pop_scope();
            if !self.block_terminated() {
                self.builder.build_unconditional_branch(merge_bb).unwrap();
            }
        }

        self.builder.position_at_end(merge_bb);
    }

    /// `for (init; cond; post)`：cond/body/inc/after 四块。
    /// break → after，continue → inc；缺省条件视为恒真。
    fn codegen_for_c(
        &mut self,
        init: Option<&'ast ast::Stmt>,
        cond: Option<&'ast ast::Expr>,
        post: Option<&'ast ast::Expr>,
        body: &'ast ast::Block,
    ) {
        self.push_scope();
        if let Some(init) = init {
            self.codegen_stmt(init);
        }

        let cond_bb = self.append_block("for.cond");
        let body_bb = self.append_block("for.body");
        let inc_bb = self.append_block("for.inc");
        let after_bb = self.append_block("for.after");

        self.builder.build_unconditional_branch(cond_bb).unwrap();

        self.builder.position_at_end(cond_bb);
        match cond {
            Some(c) => {
                let Some(v) = self.codegen_expr(c) else {
                    self.pop_scope();
                    return;
                };
                let cmp = self.to_condition(v);
                self.builder
                    .build_conditional_branch(cmp, body_bb, after_bb)
                    .unwrap();
            }
            None => {
                self.builder.build_unconditional_branch(body_bb).unwrap();
            }
        }

        self.builder.position_at_end(body_bb);
        self.break_targets.push(after_bb);
        self.continue_targets.push(inc_bb);
        self.codegen_block(body);
        self.break_targets.pop();
        self.continue_targets.pop();
        if !self.block_terminated() {
            self.builder.build_unconditional_branch(inc_bb).unwrap();
        }

        self.builder.position_at_end(inc_bb);
        if let Some(p) = post {
            let _ = self.codegen_expr(p);
        }
        self.builder.build_unconditional_branch(cond_bb).unwrap();

        self.builder.position_at_end(after_bb);
        self.pop_scope();
    }

    /// `for x in iter`：字符串按字节迭代到 0 终止符；
    /// 数值从 0 数到上界（浮点先截断为整数）。
    fn codegen_for_in(&mut self, var: &str, iterable: &'ast ast::Expr, body: &'ast ast::Block) {
        let Some(iter_v) = self.codegen_expr(iterable) else {
            return;
        };
        let i32t = self.context.i32_type();
        let i8t = self.context.i8_type();

        if iter_v.is_pointer_value() {
            // C 字符串：逐字节循环直到 '\0'
            let str_ptr = self.cast_ptr(iter_v.into_pointer_value(), self.i8_ptr_ty(), "strptr_cast");
            let idx_slot = self.entry_alloca(i32t.into(), ".forin.idx");
            self.builder.build_store(idx_slot, i32t.const_zero()).unwrap();

            let cond_bb = self.append_block("forin.cond");
            let body_bb = self.append_block("forin.body");
            let inc_bb = self.append_block("forin.incr");
            let after_bb = self.append_block("forin.end");

            self.builder.build_unconditional_branch(cond_bb).unwrap();

            self.builder.position_at_end(cond_bb);
            let idx = self
                .builder
                .build_load(idx_slot, ".forin.idx.load")
                .unwrap()
                .into_int_value();
            let ch_ptr = unsafe {
                self.builder
                    .build_gep(str_ptr, &[idx], "forin.gep")
            }
            .unwrap();
            let ch = self
                .builder
                .build_load(ch_ptr, "forin.ch")
                .unwrap()
                .into_int_value();
            let nonzero = self
                .builder
                .build_int_compare(
                    inkwell::IntPredicate::NE,
                    ch,
                    i8t.const_zero(),
                    "forin.cond",
                )
                .unwrap();
            self.builder
                .build_conditional_branch(nonzero, body_bb, after_bb)
                .unwrap();

            let var_slot = self.entry_alloca(i32t.into(), var);

            self.break_targets.push(after_bb);
            self.continue_targets.push(inc_bb);

            self.builder.position_at_end(body_bb);
            self.push_scope();
            self.bind_local(
                var,
                SourceType::I32,
                Slot::Stack {
                    ptr: var_slot,
                    ir_ty: i32t.into(),
                },
                false,
            );
            let idx2 = self
                .builder
                .build_load(idx_slot, ".forin.idx.load2")
                .unwrap()
                .into_int_value();
            let ch_ptr2 = unsafe {
                self.builder
                    .build_gep(str_ptr, &[idx2], "forin.gep2")
            }
            .unwrap();
            let ch2 = self
                .builder
                .build_load(ch_ptr2, "forin.ch2")
                .unwrap()
                .into_int_value();
            let ch_ext = self
                .builder
                .build_int_z_extend(ch2, i32t, "forin.ch.ext")
                .unwrap();
            self.builder.build_store(var_slot, ch_ext).unwrap();

            self.codegen_block(body);
            self.pop_scope();
            if !self.block_terminated() {
                self.builder.build_unconditional_branch(inc_bb).unwrap();
            }

            self.builder.position_at_end(inc_bb);
            let old = self
                .builder
                .build_load(idx_slot, ".forin.idx.load3")
                .unwrap()
                .into_int_value();
            let new = self
                .builder
                .build_int_add(old, i32t.const_int(1, false), ".forin.idx.inc")
                .unwrap();
            self.builder.build_store(idx_slot, new).unwrap();
            self.builder.build_unconditional_branch(cond_bb).unwrap();

            self.break_targets.pop();
            self.continue_targets.pop();

            self.builder.position_at_end(after_bb);
            return;
        }

        if iter_v.is_int_value() || iter_v.is_float_value() {
            let end = match iter_v {
                BasicValueEnum::FloatValue(f) => self
                    .builder
                    .build_float_to_signed_int(f, i32t, "end_fp_to_i")
                    .unwrap(),
                BasicValueEnum::IntValue(i) => self.cast_to_same_int(i, i32t),
                _ => unreachable!(),
            };

            let idx_slot = self.entry_alloca(i32t.into(), ".forin.idx");
            self.builder.build_store(idx_slot, i32t.const_zero()).unwrap();

            let cond_bb = self.append_block("forin.cond");
            let body_bb = self.append_block("forin.body");
            let inc_bb = self.append_block("forin.incr");
            let after_bb = self.append_block("forin.end");

            self.builder.build_unconditional_branch(cond_bb).unwrap();

            self.builder.position_at_end(cond_bb);
            let idx = self
                .builder
                .build_load(idx_slot, ".forin.idx.load")
                .unwrap()
                .into_int_value();
            let cmp = self
                .builder
                .build_int_compare(inkwell::IntPredicate::SLT, idx, end, "forin.cmp")
                .unwrap();
            self.builder
                .build_conditional_branch(cmp, body_bb, after_bb)
                .unwrap();

            let var_slot = self.entry_alloca(i32t.into(), var);

            self.break_targets.push(after_bb);
            self.continue_targets.push(inc_bb);

            self.builder.position_at_end(body_bb);
            self.push_scope();
            self.bind_local(
                var,
                SourceType::I32,
                Slot::Stack {
                    ptr: var_slot,
                    ir_ty: i32t.into(),
                },
                false,
            );
            let idx2 = self
                .builder
                .build_load(idx_slot, ".forin.idx.load2")
                .unwrap()
                .into_int_value();
            self.builder.build_store(var_slot, idx2).unwrap();

            self.codegen_block(body);
            self.pop_scope();
            if !self.block_terminated() {
                self.builder.build_unconditional_branch(inc_bb).unwrap();
            }

            self.builder.position_at_end(inc_bb);
            let old = self
                .builder
                .build_load(idx_slot, ".forin.idx.load3")
                .unwrap()
                .into_int_value();
            let new = self
                .builder
                .build_int_add(old, i32t.const_int(1, false), ".forin.idx.inc")
                .unwrap();
            self.builder.build_store(idx_slot, new).unwrap();
            self.builder.build_unconditional_branch(cond_bb).unwrap();

            self.break_targets.pop();
            self.continue_targets.pop();

            self.builder.position_at_end(after_bb);
            return;
        }

        self.error("for-in only supports string (i8*), integer, or floating iterable");
    }

    /// `for { ... }`：无限循环。break → after，continue → header。
    fn codegen_for_infinite(&mut self, body: &'ast ast::Block) {
        let header_bb = self.append_block("for.loop");
        let body_bb = self.append_block("for.body");
        let after_bb = self.append_block("for.end");

        if !self.block_terminated() {
            self.builder.build_unconditional_branch(header_bb).unwrap();
        }

        self.builder.position_at_end(header_bb);
        self.builder.build_unconditional_branch(body_bb).unwrap();

        self.break_targets.push(after_bb);
        self.continue_targets.push(header_bb);

        self.builder.position_at_end(body_bb);
        self.push_scope();
        self.codegen_block(body);
        self.pop_scope();
        if !self.block_terminated() {
            self.builder.build_unconditional_branch(header_bb).unwrap();
        }

        self.break_targets.pop();
        self.continue_targets.pop();

        self.builder.position_at_end(after_bb);
    }

    // --- return ---

    fn codegen_return(&mut self, expr: Option<&'ast ast::Expr>) {
        match expr {
            Some(e) => {
                let Some(v) = self.codegen_expr(e) else {
                    // 占位/错误表达式：退化为 ret void（与空 return 一致）
                    self.builder.build_return(None).unwrap();
                    return;
                };
                match self.current_ret_type {
                    Some(ret_ty) => {
                        let Some(v) = self.coerce_to(v, ret_ty) else {
                            return;
                        };
                        self.builder.build_return(Some(&v)).unwrap();
                    }
                    None => {
                        self.error("return with a value in a void function");
                    }
                }
            }
            None => {
                self.builder.build_return(None).unwrap();
            }
        }
    }
}
