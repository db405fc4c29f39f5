//! 内建调用与外部运行时符号表。
//!
//! `println`/`printf`/`sprintf`/`len`/`cast`/`new`/`append` 七个名字在
//! 普通调用之前被拦截；其余是一张封闭的 C 运行时原型表，预先声明好
//! 以便用户代码直接调用（libc、socket、pthread、数学库）。

use super::{CodeGen, SourceType};
use crate::parser::ast;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue};

impl<'ctx, 'ast> CodeGen<'ctx, 'ast> {
    // --- 运行时符号获取 ---

    /// `i8* malloc(i64)`；切片运行时的分配入口。
    pub(super) fn get_malloc(&mut self) -> FunctionValue<'ctx> {
        if let Some(f) = self.module.get_function("malloc") {
            return f;
        }
        let ty = self
            .i8_ptr_ty()
            .fn_type(&[self.context.i64_type().into()], false);
        let f = self.module.add_function("malloc", ty, None);
        self.function_protos.insert("malloc".to_string(), f);
        f
    }

    /// `void abort()`；越界与除零的陷阱出口。
    pub(super) fn get_abort(&mut self) -> FunctionValue<'ctx> {
        if let Some(f) = self.module.get_function("abort") {
            return f;
        }
        let ty = self.context.void_type().fn_type(&[], false);
        let f = self.module.add_function("abort", ty, None);
        f
    }

    fn declare_ffi(
        &mut self,
        name: &str,
        ret: Option<BasicTypeEnum<'ctx>>,
        args: &[BasicTypeEnum<'ctx>],
        vararg: bool,
    ) {
        if self.module.get_function(name).is_some() {
            return;
        }
        let meta: Vec<BasicMetadataTypeEnum> = args.iter().map(|t| (*t).into()).collect();
        let ty = match ret {
            Some(rt) => rt.fn_type(&meta, vararg),
            None => self.context.void_type().fn_type(&meta, vararg),
        };
        let f = self.module.add_function(name, ty, None);
        self.function_protos.insert(name.to_string(), f);
    }

    /// 固定的 C 运行时原型表。参数/返回按 C ABI 惯例：int 槽用
    /// i32，尺寸与分配用 i64（size_t），不透明指针一律 `i8*`。
    pub(super) fn register_builtin_ffi(&mut self) {
        let i = self.context.i32_type().as_basic_type_enum();
        let i64t = self.context.i64_type().as_basic_type_enum();
        let d = self.context.f64_type().as_basic_type_enum();
        let p = self.i8_ptr_ty().as_basic_type_enum();

        // 内存分配
        self.declare_ffi("malloc", Some(p), &[i64t], false);
        self.declare_ffi("calloc", Some(p), &[i64t, i64t], false);
        self.declare_ffi("realloc", Some(p), &[p, i64t], false);
        self.declare_ffi("free", None, &[p], false);

        self.declare_ffi("puts", Some(i), &[p], false);
        self.declare_ffi("putchar", Some(i), &[i], false);

        // 文件描述符
        self.declare_ffi("open", Some(i), &[p, i, i], false);
        self.declare_ffi("close", Some(i), &[i], false);
        self.declare_ffi("read", Some(i), &[i, p, i], false);
        self.declare_ffi("write", Some(i), &[i, p, i], false);
        self.declare_ffi("lseek", Some(i), &[i, i, i], false);
        self.declare_ffi("fsync", Some(i), &[i], false);
        self.declare_ffi("ftruncate", Some(i), &[i, i], false);
        self.declare_ffi("fchmod", Some(i), &[i, i], false);

        // socket
        self.declare_ffi("socket", Some(i), &[i, i, i], false);
        self.declare_ffi("bind", Some(i), &[i, p, i], false);
        self.declare_ffi("listen", Some(i), &[i, i], false);
        self.declare_ffi("accept", Some(i), &[i, p, p], false);
        self.declare_ffi("connect", Some(i), &[i, p, i], false);
        self.declare_ffi("send", Some(i), &[i, p, i, i], false);
        self.declare_ffi("recv", Some(i), &[i, p, i, i], false);
        self.declare_ffi("sendto", Some(i), &[i, p, i, i, p, i], false);
        self.declare_ffi("recvfrom", Some(i), &[i, p, i, i, p, p], false);
        self.declare_ffi("shutdown", Some(i), &[i, i], false);
        self.declare_ffi("setsockopt", Some(i), &[i, i, i, p, i], false);
        self.declare_ffi("getsockopt", Some(i), &[i, i, i, p, p], false);

        self.declare_ffi("inet_pton", Some(i), &[i, p, p], false);
        self.declare_ffi("inet_ntop", Some(p), &[i, p, p, i], false);
        self.declare_ffi("htons", Some(i), &[i], false);
        self.declare_ffi("ntohs", Some(i), &[i], false);
        self.declare_ffi("htonl", Some(i), &[i], false);
        self.declare_ffi("ntohl", Some(i), &[i], false);
        self.declare_ffi("getaddrinfo", Some(i), &[p, p, p, p], false);
        self.declare_ffi("freeaddrinfo", None, &[p], false);

        // 进程与环境
        self.declare_ffi("fork", Some(i), &[], false);
        self.declare_ffi("execve", Some(i), &[p, p, p], false);
        self.declare_ffi("waitpid", Some(i), &[i, p, i], false);
        self.declare_ffi("exit", None, &[i], false);
        self.declare_ffi("getpid", Some(i), &[], false);
        self.declare_ffi("kill", Some(i), &[i, i], false);
        self.declare_ffi("getenv", Some(p), &[p], false);
        self.declare_ffi("setenv", Some(i), &[p, p, i], false);
        self.declare_ffi("unsetenv", Some(i), &[p], false);
        self.declare_ffi("system", Some(i), &[p], false);
        self.declare_ffi("uname", Some(i), &[p], false);

        // 时间
        self.declare_ffi("time", Some(i), &[p], false);
        self.declare_ffi("gettimeofday", Some(i), &[p, p], false);
        self.declare_ffi("nanosleep", Some(i), &[p, p], false);

        // 内存映射
        self.declare_ffi("mmap", Some(p), &[p, i, i, i, i, i], false);
        self.declare_ffi("munmap", Some(i), &[p, i], false);
        self.declare_ffi("mprotect", Some(i), &[p, i, i], false);

        // pthread
        self.declare_ffi("pthread_create", Some(i), &[p, p, p, p], false);
        self.declare_ffi("pthread_join", Some(i), &[p, p], false);
        self.declare_ffi("pthread_mutex_init", Some(i), &[p, p], false);
        self.declare_ffi("pthread_mutex_lock", Some(i), &[p], false);
        self.declare_ffi("pthread_mutex_unlock", Some(i), &[p], false);
        self.declare_ffi("pthread_cond_wait", Some(i), &[p, p], false);
        self.declare_ffi("pthread_cond_signal", Some(i), &[p], false);

        // 数学库
        self.declare_ffi("sin", Some(d), &[d], false);
        self.declare_ffi("cos", Some(d), &[d], false);
        self.declare_ffi("tan", Some(d), &[d], false);
        self.declare_ffi("pow", Some(d), &[d, d], false);
        self.declare_ffi("exp", Some(d), &[d], false);
        self.declare_ffi("log", Some(d), &[d], false);
        self.declare_ffi("fabs", Some(d), &[d], false);

        // syscall 声明为变参
        self.declare_ffi("syscall", Some(i), &[i], true);

        // 字符串与内存
        self.declare_ffi("strlen", Some(i64t), &[p], false);
        self.declare_ffi("strcpy", Some(p), &[p, p], false);
        self.declare_ffi("strcmp", Some(i), &[p, p], false);
        self.declare_ffi("memcpy", Some(p), &[p, p, i], false);
        self.declare_ffi("memcmp", Some(i), &[p, p, i], false);
        self.declare_ffi("memmove", Some(p), &[p, p, i], false);
        self.declare_ffi("memset", Some(p), &[p, i, i], false);
        self.declare_ffi("strstr", Some(p), &[p, p], false);
        self.declare_ffi("strcat", Some(p), &[p, p], false);
        self.declare_ffi("strncpy", Some(p), &[p, p, i], false);
    }

    // --- println / printf / sprintf ---

    /// `println(args...)`：按实参 IR 类型拼 printf 格式串——指针 `%s`、
    /// 浮点 `%f`（拓宽 f64）、整数 `%lld`（拓宽 i64），空格分隔，
    /// 末尾换行。
    pub(super) fn codegen_println(
        &mut self,
        args: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        let printf = self.printf_fn;

        if args.is_empty() {
            let fmt = self
                .builder
                .build_global_string_ptr("\n", ".fmtln")
                .unwrap();
            let call = self
                .builder
                .build_call(printf, &[fmt.as_pointer_value().into()], "call_printf")
                .unwrap();
            return call.try_as_basic_value().left();
        }

        let mut fmt = String::new();
        let mut lowered: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len() + 1);
        lowered.push(self.context.bool_type().const_zero().into()); // 占位，稍后替换为格式串

        for (i, a) in args.iter().enumerate() {
            let v = self.codegen_expr(a)?;
            match v {
                BasicValueEnum::PointerValue(pv) => {
                    fmt.push_str("%s");
                    let pv = self.cast_ptr(pv, self.i8_ptr_ty(), "cast_to_i8ptr");
                    lowered.push(pv.into());
                }
                BasicValueEnum::FloatValue(fv) => {
                    fmt.push_str("%f");
                    let wide = self
                        .builder
                        .build_float_cast(fv, self.context.f64_type(), "cast_double")
                        .unwrap();
                    lowered.push(wide.into());
                }
                BasicValueEnum::IntValue(iv) => {
                    fmt.push_str("%lld");
                    let wide = self.cast_to_same_int(iv, self.context.i64_type());
                    lowered.push(wide.into());
                }
                other => {
                    fmt.push_str("%p");
                    lowered.push(other.into());
                }
            }
            if i + 1 != args.len() {
                fmt.push(' ');
            }
        }
        fmt.push('\n');

        let fmt_ptr = self.builder.build_global_string_ptr(&fmt, ".fmt").unwrap();
        lowered[0] = fmt_ptr.as_pointer_value().into();

        let call = self
            .builder
            .build_call(printf, &lowered, "call_printf")
            .unwrap();
        call.try_as_basic_value().left()
    }

    /// `printf(fmt, args...)`：直通，变参做 C 缺省提升。
    pub(super) fn codegen_printf(
        &mut self,
        args: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        if args.is_empty() {
            self.error("printf requires at least a format string");
            return None;
        }
        let printf = self.printf_fn;
        let mut lowered: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let mut v = self.codegen_expr(a)?;
            if i == 0 {
                if !v.is_pointer_value() {
                    self.error("printf: format argument must be a string");
                    return None;
                }
                v = self
                    .cast_ptr(v.into_pointer_value(), self.i8_ptr_ty(), "fmt.cast")
                    .into();
            } else {
                v = self.promote_vararg(v);
            }
            lowered.push(v.into());
        }
        let call = self
            .builder
            .build_call(printf, &lowered, "call_printf")
            .unwrap();
        call.try_as_basic_value().left()
    }

    /// `sprintf(dst, fmt, args...)`：直通到 C 的 sprintf。
    pub(super) fn codegen_sprintf(
        &mut self,
        args: &'ast [ast::Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        if args.len() < 2 {
            self.error("sprintf requires a destination buffer and a format string");
            return None;
        }

        let dest = self.codegen_expr(&args[0])?;
        if !dest.is_pointer_value() {
            self.error("sprintf: destination argument must be a pointer");
            return None;
        }
        let fmt = self.codegen_expr(&args[1])?;
        if !fmt.is_pointer_value() {
            self.error("sprintf: format argument must be a pointer");
            return None;
        }

        let sprintf = match self.module.get_function("sprintf") {
            Some(f) => f,
            None => {
                let p = self.i8_ptr_ty();
                let ty = self
                    .context
                    .i32_type()
                    .fn_type(&[p.into(), p.into()], true);
                self.module.add_function("sprintf", ty, None)
            }
        };

        let dest = self.cast_ptr(dest.into_pointer_value(), self.i8_ptr_ty(), "sprintf.dest.cast");
        let fmt = self.cast_ptr(fmt.into_pointer_value(), self.i8_ptr_ty(), "sprintf.fmt.cast");
        let mut lowered: Vec<BasicMetadataValueEnum> = vec![dest.into(), fmt.into()];
        for a in &args[2..] {
            let v = self.codegen_expr(a)?;
            let v = self.promote_vararg(v);
            lowered.push(v.into());
        }
        let call = self
            .builder
            .build_call(sprintf, &lowered, "call_sprintf")
            .unwrap();
        call.try_as_basic_value().left()
    }

    // --- len ---

    /// `len(x)`：C 字符串走 strlen 截断到 i32；切片读描述符的
    /// len 字段并截断到 i32。
    pub(super) fn codegen_len(&mut self, args: &'ast [ast::Expr]) -> Option<BasicValueEnum<'ctx>> {
        if args.len() != 1 {
            self.error("len expects 1 argument");
            return None;
        }
        let i32t = self.context.i32_type();
        let i64t = self.context.i64_type();

        let st = self.infer_expr_type(&args[0]);
        let v = self.codegen_expr(&args[0])?;

        if st.is_string() {
            if !v.is_pointer_value() {
                self.error("len: string argument is not a pointer");
                return None;
            }
            let strlen = self
                .module
                .get_function("strlen")
                .unwrap_or_else(|| {
                    let ty = i64t.fn_type(&[self.i8_ptr_ty().into()], false);
                    self.module.add_function("strlen", ty, None)
                });
            let s = self.cast_ptr(v.into_pointer_value(), self.i8_ptr_ty(), "str_cast");
            let n = self
                .builder
                .build_call(strlen, &[s.into()], "strlen_call")
                .unwrap()
                .try_as_basic_value()
                .left()?
                .into_int_value();
            return Some(self.cast_to_same_int(n, i32t).into());
        }

        let desc_ty = self.slice_struct_type();
        let desc_ptr_ty = self.slice_ptr_ty();
        let desc_ptr = if v.is_pointer_value() {
            self.cast_ptr(v.into_pointer_value(), desc_ptr_ty, "arr_cast")
        } else if v.is_struct_value() {
            let tmp = self.entry_alloca(v.get_type(), "arr_tmp_byval");
            self.builder.build_store(tmp, v).unwrap();
            self.cast_ptr(tmp, desc_ptr_ty, "arr_tmp_cast")
        } else if v.is_int_value() {
            let iv = v.into_int_value();
            if iv.get_type().get_bit_width() as u64 != self.ptr_size_bytes() * 8 {
                self.error("len: integer argument has wrong width (not pointer-sized)");
                return None;
            }
            self.builder
                .build_int_to_ptr(iv, desc_ptr_ty, "arr_inttoptr")
                .unwrap()
        } else {
            self.error("len: unsupported argument type");
            return None;
        };

        let len_slot = self.struct_gep_via(desc_ty, desc_ptr, 1, "len_ptr");
        let len = self.load_via(i64t.into(), len_slot, "len").into_int_value();
        Some(self.cast_to_same_int(len, i32t).into())
    }

    // --- cast ---

    /// `cast(T, v)`：字符串到数值经 atoi/atof；其余按 IR 类型选
    /// 合适的转换指令。
    pub(super) fn codegen_cast(&mut self, args: &'ast [ast::Expr]) -> Option<BasicValueEnum<'ctx>> {
        if args.len() != 2 {
            self.error("cast requires exactly two arguments: cast(TYPE, value)");
            return None;
        }

        let dst = match &args[0] {
            ast::Expr::Ident(name) => self.resolve_type_by_name(name),
            _ => {
                self.error("cast: first argument must be a type name");
                return None;
            }
        };
        let Some(dst) = dst else {
            self.error("cast: unknown/unsupported destination type");
            return None;
        };

        let src_st = self.infer_expr_type(&args[1]);
        let src = self.codegen_expr(&args[1])?;

        if src.get_type() == dst {
            return Some(src);
        }

        // 字符串来源到数值：atoi / atof
        if matches!(src_st, SourceType::Str) && src.is_pointer_value() {
            let cstr = self.cast_ptr(src.into_pointer_value(), self.i8_ptr_ty(), "cstr");
            if let BasicTypeEnum::IntType(it) = dst {
                let atoi = self.module.get_function("atoi").unwrap_or_else(|| {
                    let ty = self
                        .context
                        .i32_type()
                        .fn_type(&[self.i8_ptr_ty().into()], false);
                    self.module.add_function("atoi", ty, None)
                });
                let parsed = self
                    .builder
                    .build_call(atoi, &[cstr.into()], "atoi.res")
                    .unwrap()
                    .try_as_basic_value()
                    .left()?
                    .into_int_value();
                return Some(self.cast_to_same_int(parsed, it).into());
            }
            if let BasicTypeEnum::FloatType(ft) = dst {
                let atof = self.module.get_function("atof").unwrap_or_else(|| {
                    let ty = self
                        .context
                        .f64_type()
                        .fn_type(&[self.i8_ptr_ty().into()], false);
                    self.module.add_function("atof", ty, None)
                });
                let parsed = self
                    .builder
                    .build_call(atof, &[cstr.into()], "atof.res")
                    .unwrap()
                    .try_as_basic_value()
                    .left()?
                    .into_float_value();
                if ft == self.context.f64_type() {
                    return Some(parsed.into());
                }
                return Some(
                    self.builder
                        .build_float_cast(parsed, ft, "casttmp")
                        .unwrap()
                        .into(),
                );
            }
        }

        let b = &self.builder;
        match (src, dst) {
            (BasicValueEnum::PointerValue(pv), BasicTypeEnum::PointerType(pt)) => {
                Some(b.build_pointer_cast(pv, pt, "casttmp").unwrap().into())
            }
            (BasicValueEnum::IntValue(iv), BasicTypeEnum::IntType(it)) => {
                let sb = iv.get_type().get_bit_width();
                let db = it.get_bit_width();
                if db == sb {
                    Some(iv.into())
                } else if db > sb {
                    Some(b.build_int_z_extend(iv, it, "casttmp").unwrap().into())
                } else {
                    Some(b.build_int_truncate(iv, it, "casttmp").unwrap().into())
                }
            }
            (BasicValueEnum::IntValue(iv), BasicTypeEnum::PointerType(pt)) => {
                Some(b.build_int_to_ptr(iv, pt, "casttmp").unwrap().into())
            }
            (BasicValueEnum::PointerValue(pv), BasicTypeEnum::IntType(it)) => {
                Some(b.build_ptr_to_int(pv, it, "casttmp").unwrap().into())
            }
            (BasicValueEnum::FloatValue(fv), BasicTypeEnum::FloatType(ft)) => {
                Some(b.build_float_cast(fv, ft, "casttmp").unwrap().into())
            }
            (BasicValueEnum::FloatValue(fv), BasicTypeEnum::IntType(it)) => Some(
                b.build_float_to_signed_int(fv, it, "casttmp").unwrap().into(),
            ),
            (BasicValueEnum::IntValue(iv), BasicTypeEnum::FloatType(ft)) => Some(
                b.build_signed_int_to_float(iv, ft, "casttmp").unwrap().into(),
            ),
            (s, d) => {
                self.error(format!(
                    "unsupported cast from '{:?}' to '{:?}'",
                    s.get_type(),
                    d
                ));
                None
            }
        }
    }
}
