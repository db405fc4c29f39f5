//! 函数下放：先把所有函数预声明为外部原型（允许前向引用），
//! 再逐个发射函数体。

use super::{CodeGen, Slot, SourceType};
use crate::parser::ast;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::FunctionValue;

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    /// 依据参数/返回的 AST 类型构造 IR 函数类型。
    /// 变参参数不占固定形参位，只把函数标成 vararg。
    fn function_type_for(
        &mut self,
        fd: &'ast ast::FuncDecl,
    ) -> (FunctionType<'ctx>, Option<BasicTypeEnum<'ctx>>) {
        let is_vararg = fd.params.last().map(|p| p.variadic).unwrap_or(false);

        let mut arg_tys: Vec<BasicMetadataTypeEnum<'ctx>> = Vec::new();
        for p in &fd.params {
            if p.variadic {
                continue;
            }
            let t = self
                .resolve_type_from_ast(&p.ty)
                .unwrap_or_else(|| self.context.i32_type().into());
            arg_tys.push(t.into());
        }

        let ret = fd
            .ret_type
            .as_ref()
            .and_then(|t| self.resolve_type_from_ast(t));
        let fn_ty = match ret {
            Some(rt) => rt.fn_type(&arg_tys, is_vararg),
            None => self.context.void_type().fn_type(&arg_tys, is_vararg),
        };
        (fn_ty, ret)
    }

    /// 预声明遍：先登记外部运行时符号表，再为每个源函数建原型。
    pub(super) fn predeclare_functions(&mut self, funcs: &[&'ast ast::FuncDecl]) {
        self.register_builtin_ffi();

        for fd in funcs {
            if self.function_protos.contains_key(&fd.name) {
                continue;
            }

            // 变参只能在最后；解析器已报过错，这里兜底再查一遍
            for p in fd.params.iter().rev().skip(1) {
                if p.variadic {
                    self.error(format!(
                        "variadic parameter must be the last parameter in function: {}",
                        fd.name
                    ));
                }
            }

            let (fn_ty, _) = self.function_type_for(fd);

            if let Some(existing) = self.module.get_function(&fd.name) {
                self.function_protos.insert(fd.name.clone(), existing);
                continue;
            }

            let f = self.module.add_function(&fd.name, fn_ty, None);
            let mut concrete = fd.params.iter().filter(|p| !p.variadic);
            for arg in f.get_param_iter() {
                if let Some(p) = concrete.next() {
                    arg.set_name(&p.name);
                }
            }
            self.function_protos.insert(fd.name.clone(), f);
        }
    }

    /// 发射一个函数体。
    pub(super) fn emit_function(&mut self, fd: &'ast ast::FuncDecl) -> Option<FunctionValue<'ctx>> {
        let (fn_ty, ret_ty) = self.function_type_for(fd);

        let function = match self.module.get_function(&fd.name) {
            Some(f) => {
                if f.get_type() != fn_ty {
                    self.error(format!(
                        "function declaration/definition type mismatch for: {}",
                        fd.name
                    ));
                    return None;
                }
                if f.count_basic_blocks() > 0 {
                    self.error(format!("redefinition of function: {}", fd.name));
                    return None;
                }
                f
            }
            None => {
                let f = self.module.add_function(&fd.name, fn_ty, None);
                self.function_protos.insert(fd.name.clone(), f);
                f
            }
        };

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.current_function = Some(function);
        self.current_ret_type = ret_ty;

        // 参数作用域 + 函数体作用域
        self.scopes.clear();
        self.push_scope();

        let concrete: Vec<&ast::Param> = fd.params.iter().filter(|p| !p.variadic).collect();
        for (arg, p) in function.get_param_iter().zip(concrete.iter()) {
            arg.set_name(&p.name);
            let st = SourceType::from_ast(&p.ty);

            if arg.is_pointer_value() {
                // 指针参数直接绑定值本身
                self.bind_local(&p.name, st, Slot::Direct(arg), true);
            } else {
                let slot = self.entry_alloca(arg.get_type(), &p.name);
                self.builder.build_store(slot, arg).unwrap();
                self.bind_local(
                    &p.name,
                    st,
                    Slot::Stack {
                        ptr: slot,
                        ir_ty: arg.get_type(),
                    },
                    true,
                );
            }
        }

        if let Some(vparam) = fd.params.last().filter(|p| p.variadic) {
            // 变参：绑一个空指针占位槽，让名字在体内可见
            let elem_ty = self
                .resolve_type_from_ast(&vparam.ty)
                .unwrap_or_else(|| self.context.i32_type().into());
            let holder = self.ptr_to(elem_ty);
            let holder_ty: BasicTypeEnum = holder.into();
            let slot = self.entry_alloca(holder_ty, &vparam.name);
            self.builder
                .build_store(slot, holder.const_null())
                .unwrap();
            let st = SourceType::Pointer(Box::new(SourceType::from_ast(&vparam.ty)));
            self.bind_local(
                &vparam.name,
                st,
                Slot::Stack {
                    ptr: slot,
                    ir_ty: holder_ty,
                },
                true,
            );
        }

        self.push_scope();
        self.codegen_block(&fd.body);
        self.pop_scope();

        // 末块没有终结指令时补上默认返回
        if !self.block_terminated() {
            match ret_ty {
                None => {
                    self.builder.build_return(None).unwrap();
                }
                Some(rt) => {
                    let zero = self.const_zero(rt);
                    self.builder.build_return(Some(&zero)).unwrap();
                }
            }
        }

        self.pop_scope();
        self.current_function = None;
        self.current_ret_type = None;

        if !function.verify(true) {
            self.error(format!("function verification failed: {}", fd.name));
            return None;
        }

        Some(function)
    }
}
