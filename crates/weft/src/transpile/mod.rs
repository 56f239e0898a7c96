//! The expression/statement walker.
//!
//! Transpiles one function body at a time against a lexical scope of
//! snippets, producing ordered WGSL statement lines plus the set of
//! return types seen. Operator dispatch, promotion, and constant folding
//! live in the `weft-types` combinators; this module owns scoping,
//! mutation legality, reference rules, call dispatch, and statement
//! rendering.

pub(crate) mod scope;

use weft_ast::{Block, Expr, Stmt};
use weft_types::{
    binary, scalar, unary, AccessMode, AddressSpace, ConstValue, DataType, Origin, Snippet,
    TypeError,
};

use crate::builtins;
use crate::error::{ErrorKind, ResolveError, ResolveResult};
use crate::program::External;
use crate::resolve::declarations::DeclId;
use crate::resolve::namespace::check_identifier;
use crate::resolve::Run;
use scope::{Scope, ScopeEntry};

const INDENT: &str = "    ";

/// Per-function transpilation state.
pub(crate) struct FnFrame {
    pub scope: Scope,
    pub lines: Vec<String>,
    pub indent: usize,
    pub deps: Vec<DeclId>,
    pub returns: Vec<DataType>,
}

/// One function body's walker, borrowing the shared resolution state.
pub(crate) struct Transpiler<'a, 'ns> {
    pub run: &'a mut Run<'ns>,
    pub frame: FnFrame,
}

impl<'a, 'ns> Transpiler<'a, 'ns> {
    /// Set up a walker with externals and parameters in the base scope.
    pub fn new(
        run: &'a mut Run<'ns>,
        externals: &indexmap::IndexMap<String, External>,
        params: Vec<(String, ScopeEntry)>,
    ) -> Self {
        let mut scope = Scope::new();
        for (name, external) in externals {
            scope.declare(name.clone(), ScopeEntry::Extern(external.clone()));
        }
        for (name, entry) in params {
            run.ns.block(&name);
            scope.declare(name, entry);
        }
        Self {
            run,
            frame: FnFrame {
                scope,
                lines: Vec::new(),
                indent: 1,
                deps: Vec::new(),
                returns: Vec::new(),
            },
        }
    }

    /// Tear down, handing the finished frame back.
    pub fn finish(self) -> FnFrame {
        self.frame
    }

    fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.frame
            .lines
            .push(format!("{}{}", INDENT.repeat(self.frame.indent), text));
    }

    fn err(&self, kind: ErrorKind, message: impl Into<String>) -> ResolveError {
        self.run.err(kind, message)
    }

    fn type_err(&self, e: TypeError) -> ResolveError {
        self.err(ErrorKind::TypeUnification, e.to_string())
    }

    /// Transpile a block in a fresh scope layer.
    pub fn block(&mut self, block: &Block) -> ResolveResult<()> {
        self.frame.scope.push();
        for stmt in block.stmts() {
            self.stmt(stmt)?;
        }
        self.frame.scope.pop();
        Ok(())
    }

    fn nested_block(&mut self, block: &Block) -> ResolveResult<()> {
        self.frame.indent += 1;
        self.block(block)?;
        self.frame.indent -= 1;
        Ok(())
    }

    // === Statements ===

    fn stmt(&mut self, stmt: &Stmt) -> ResolveResult<()> {
        match stmt {
            Stmt::Let { name, init } => self.stmt_let(name, init),
            Stmt::Var { name, init } => {
                let text = self.stmt_var(name, init)?;
                self.line(format!("{text};"));
                Ok(())
            }
            Stmt::Assign { target, op, value } => {
                let text = self.stmt_assign(target, *op, value)?;
                self.line(format!("{text};"));
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let c = self.expr(cond)?;
                if !c.ty.is_bool() {
                    return Err(self
                        .err(
                            ErrorKind::TypeUnification,
                            format!("if condition must be bool, got {}", c.ty),
                        )
                        .with_value(c.render()));
                }
                self.line(format!("if ({}) {{", c.render()));
                self.nested_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.line("} else {");
                    self.nested_block(else_block)?;
                }
                self.line("}");
                Ok(())
            }
            Stmt::While { cond, body } => {
                let c = self.expr(cond)?;
                if !c.ty.is_bool() {
                    return Err(self
                        .err(
                            ErrorKind::TypeUnification,
                            format!("while condition must be bool, got {}", c.ty),
                        )
                        .with_value(c.render()));
                }
                self.line(format!("while ({}) {{", c.render()));
                self.nested_block(body)?;
                self.line("}");
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                // The induction variable scopes over header and body.
                self.frame.scope.push();
                let init_text = match init {
                    Some(stmt) => self.inline_stmt(stmt)?,
                    None => String::new(),
                };
                let cond_text = match cond {
                    Some(expr) => {
                        let c = self.expr(expr)?;
                        if !c.ty.is_bool() {
                            return Err(self
                                .err(
                                    ErrorKind::TypeUnification,
                                    format!("for condition must be bool, got {}", c.ty),
                                )
                                .with_value(c.render()));
                        }
                        c.render()
                    }
                    None => String::new(),
                };
                let step_text = match step {
                    Some(stmt) => self.inline_stmt(stmt)?,
                    None => String::new(),
                };
                self.line(format!("for ({init_text}; {cond_text}; {step_text}) {{"));
                self.nested_block(body)?;
                self.line("}");
                self.frame.scope.pop();
                Ok(())
            }
            Stmt::Return(value) => self.stmt_return(value.as_ref()),
            Stmt::Expr(expr) => {
                let s = self.expr(expr)?;
                if s.comptime_const().is_some() || s.render().is_empty() {
                    // No effect at runtime; nothing to emit.
                    return Ok(());
                }
                if s.ty == DataType::Void {
                    self.line(format!("{};", s.render()));
                } else {
                    self.line(format!("_ = {};", s.render()));
                }
                Ok(())
            }
        }
    }

    /// Statements allowed inside a `for` header, rendered without `;`.
    fn inline_stmt(&mut self, stmt: &Stmt) -> ResolveResult<String> {
        match stmt {
            Stmt::Var { name, init } => self.stmt_var(name, init),
            Stmt::Assign { target, op, value } => self.stmt_assign(target, *op, value),
            Stmt::Expr(expr) => {
                let s = self.expr(expr)?;
                Ok(s.render())
            }
            other => Err(self.err(
                ErrorKind::UnsupportedConstruct,
                format!("statement not allowed in a loop header: {other:?}"),
            )),
        }
    }

    fn stmt_let(&mut self, name: &str, init: &Expr) -> ResolveResult<()> {
        self.check_local_name(name)?;
        let value = self.expr(init)?;

        if value.ty.is_ptr() {
            // References bind here and nowhere else, and only straight
            // from a ref(...) expression.
            if !matches!(init, Expr::Ref { .. }) {
                return Err(self
                    .err(
                        ErrorKind::IllegalMutation,
                        "references may only be created with ref(...)",
                    )
                    .with_value(value.render())
                    .with_note("take the reference directly: let r = ref(some_var);"));
            }
            self.run.ns.block(name);
            self.line(format!("let {name} = {};", value.render()));
            let ty = value.ty.clone();
            self.frame.scope.declare(
                name,
                ScopeEntry::Local {
                    snippet: Snippet::new(name, ty, value.origin),
                    mutable: false,
                    is_ref: true,
                },
            );
            return Ok(());
        }

        if value.ty == DataType::Void {
            return Err(self
                .err(ErrorKind::TypeUnification, "cannot bind a void value")
                .with_value(value.render()));
        }

        self.run.ns.block(name);

        // Comptime values stay in-process: the binding is scope-only and
        // the constant travels to each use site.
        if value.comptime_const().is_some() {
            self.frame.scope.declare(
                name,
                ScopeEntry::Local {
                    snippet: value,
                    mutable: false,
                    is_ref: false,
                },
            );
            return Ok(());
        }

        let ty = value.ty.concretize();
        self.line(format!("let {name} = {};", value.render()));
        self.frame.scope.declare(
            name,
            ScopeEntry::Local {
                snippet: Snippet::new(name, ty, Origin::Local),
                mutable: false,
                is_ref: false,
            },
        );
        Ok(())
    }

    fn stmt_var(&mut self, name: &str, init: &Expr) -> ResolveResult<String> {
        self.check_local_name(name)?;
        let value = self.expr(init)?;

        if value.ty.is_ptr() {
            return Err(self
                .err(
                    ErrorKind::IllegalMutation,
                    "references must be bound with let, not var",
                )
                .with_value(value.render())
                .with_note("write let r = ref(...); a reference itself is never reassigned"));
        }
        if value.ty == DataType::Void {
            return Err(self
                .err(ErrorKind::TypeUnification, "cannot bind a void value")
                .with_value(value.render()));
        }

        self.run.ns.block(name);
        let ty = value.ty.concretize();
        let text = format!("var {name} = {}", value.render());
        self.frame.scope.declare(
            name,
            ScopeEntry::Local {
                snippet: Snippet::new(name, ty, Origin::Local),
                mutable: true,
                is_ref: false,
            },
        );
        Ok(text)
    }

    fn stmt_assign(
        &mut self,
        target: &Expr,
        op: Option<weft_types::BinaryOp>,
        value: &Expr,
    ) -> ResolveResult<String> {
        let lv = self.lvalue(target)?;
        let val = self.expr(value)?;

        if val.ty.is_ptr() {
            return Err(self
                .err(
                    ErrorKind::IllegalMutation,
                    "cannot reassign a reference over an existing variable",
                )
                .with_value(val.render())
                .with_note("bind the reference once with let; assign through it with deref(...)"));
        }

        match op {
            None => {
                let (rendered, promoted) = self.convert_for_store(&val, &lv.ty)?;
                if promoted {
                    self.run.warn_once(
                        format!("assign-promote:{}:{}", val.ty, lv.ty),
                        format!(
                            "implicit promotion in assignment: {} value stored into {} target",
                            val.ty, lv.ty
                        ),
                    );
                }
                Ok(format!("{} = {rendered}", lv.text))
            }
            Some(op) => {
                let current = Snippet::new(lv.text.clone(), lv.ty.clone(), lv.origin);
                let out = binary(op, &current, &val).map_err(|e| self.type_err(e))?;
                if out.snippet.ty.concretize() != lv.ty.concretize() {
                    return Err(self
                        .err(
                            ErrorKind::TypeUnification,
                            format!(
                                "compound assignment would change the target type from {} to {}",
                                lv.ty, out.snippet.ty
                            ),
                        )
                        .with_value(val.render()));
                }
                Ok(format!("{} {}= {}", lv.text, op.token(), val.render()))
            }
        }
    }

    fn stmt_return(&mut self, value: Option<&Expr>) -> ResolveResult<()> {
        match value {
            None => {
                self.frame.returns.push(DataType::Void);
                self.line("return;");
                Ok(())
            }
            Some(expr) => {
                let s = self.expr(expr)?;
                if s.ty.is_ptr() {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            "references may not be returned from a function",
                        )
                        .with_value(s.render())
                        .with_note(
                            "return the value itself; the caller can take its own reference",
                        ));
                }
                self.frame.returns.push(s.ty.concretize());
                self.line(format!("return {};", s.render()));
                Ok(())
            }
        }
    }

    fn check_local_name(&self, name: &str) -> ResolveResult<()> {
        check_identifier(name).map_err(|reason| {
            self.err(ErrorKind::IllegalIdentifier, reason)
                .with_value(name)
        })
    }

    /// Render a value for storing into a location of `target` type.
    ///
    /// Abstract constants adapt silently; a concrete kind change inserts a
    /// conversion and reports `true` so the caller can warn once.
    fn convert_for_store(&self, value: &Snippet, target: &DataType) -> ResolveResult<(String, bool)> {
        let vt = value.ty.concretize();
        let tt = target.concretize();
        if vt == tt {
            return Ok((value.render(), false));
        }

        let mismatch = || {
            self.err(
                ErrorKind::TypeUnification,
                format!("cannot store a {} value into a {} target", value.ty, target),
            )
            .with_value(value.render())
        };

        let vk = value.ty.scalar_kind().ok_or_else(mismatch)?;
        let tk = tt.scalar_kind().ok_or_else(mismatch)?;
        if value.ty.component_count() != tt.component_count() {
            return Err(mismatch());
        }
        let unified = scalar::unify(vk, tk).ok_or_else(mismatch)?;
        if unified.kind.concretize() != tk {
            return Err(mismatch());
        }

        if vk.is_abstract() {
            // The literal adapts to the target in context.
            return Ok((value.render(), false));
        }
        let conversion = match &tt {
            DataType::Vector { size, scalar } => format!("vec{size}<{}>", scalar.wgsl()),
            other => other.to_string(),
        };
        Ok((format!("{conversion}({})", value.render()), true))
    }

    // === L-values ===

    fn lvalue(&mut self, target: &Expr) -> ResolveResult<LValue> {
        match target {
            Expr::Ident(name) => self.lvalue_ident(name),
            Expr::Member { object, member } => {
                let base = self.lvalue(object)?;
                match &base.ty {
                    DataType::Struct(handle) => {
                        let field = handle.field_named(member).ok_or_else(|| {
                            self.err(
                                ErrorKind::TypeUnification,
                                format!(
                                    "property '{member}' not found on '{}' of type {}",
                                    base.text, base.ty
                                ),
                            )
                        })?;
                        Ok(LValue {
                            text: format!("{}.{member}", base.text),
                            ty: field.ty.clone(),
                            origin: base.origin,
                        })
                    }
                    DataType::Vector { scalar, .. } => {
                        if member.len() != 1 {
                            return Err(self
                                .err(
                                    ErrorKind::IllegalMutation,
                                    "cannot assign to a multi-component swizzle",
                                )
                                .with_value(format!("{}.{member}", base.text))
                                .with_note("assign one component at a time"));
                        }
                        // Validate the single component against the size.
                        let probe =
                            Snippet::new(base.text.clone(), base.ty.clone(), base.origin);
                        weft_types::access_member(&probe, member)
                            .map_err(|e| self.type_err(e))?;
                        Ok(LValue {
                            text: format!("{}.{member}", base.text),
                            ty: DataType::Scalar(*scalar),
                            origin: base.origin,
                        })
                    }
                    other => Err(self.err(
                        ErrorKind::TypeUnification,
                        format!("cannot assign into a member of type {other}"),
                    )),
                }
            }
            Expr::Index { object, index } => {
                let base = self.lvalue(object)?;
                let idx = self.expr(index)?;
                if !idx.ty.scalar_kind().is_some_and(|k| k.is_integer()) {
                    return Err(self
                        .err(
                            ErrorKind::TypeUnification,
                            format!("index must be an integer, got {}", idx.ty),
                        )
                        .with_value(idx.render()));
                }
                let elem = match &base.ty {
                    DataType::Array { elem, .. } => (**elem).clone(),
                    DataType::Vector { scalar, .. } => DataType::Scalar(*scalar),
                    DataType::Matrix { rows, scalar, .. } => DataType::vec(*rows, *scalar),
                    other => {
                        return Err(self.err(
                            ErrorKind::TypeUnification,
                            format!("cannot index into {other}"),
                        ))
                    }
                };
                Ok(LValue {
                    text: format!("{}[{}]", base.text, idx.render()),
                    ty: elem,
                    origin: base.origin,
                })
            }
            Expr::Deref(inner) => {
                let ptr = self.expr(inner)?;
                match &ptr.ty {
                    DataType::Ptr {
                        access: AccessMode::ReadWrite,
                        inner: pointee,
                        space,
                    } => Ok(LValue {
                        text: format!("(*{})", ptr.render()),
                        ty: (**pointee).clone(),
                        origin: deref_origin(*space, AccessMode::ReadWrite, ptr.origin),
                    }),
                    DataType::Ptr { .. } => Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            "cannot assign through a read-only reference",
                        )
                        .with_value(ptr.render())),
                    other => Err(self
                        .err(
                            ErrorKind::TypeUnification,
                            format!("cannot dereference a value of type {other}"),
                        )
                        .with_value(ptr.render())),
                }
            }
            other => Err(self.err(
                ErrorKind::IllegalMutation,
                format!("invalid assignment target: {other:?}"),
            )),
        }
    }

    fn lvalue_ident(&mut self, name: &str) -> ResolveResult<LValue> {
        let entry = self
            .frame
            .scope
            .lookup(name)
            .cloned()
            .ok_or_else(|| {
                self.err(
                    ErrorKind::IllegalIdentifier,
                    format!("unresolved identifier '{name}'"),
                )
            })?;
        match entry {
            ScopeEntry::Local {
                snippet,
                mutable,
                is_ref,
            } => {
                if is_ref {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            format!("'{name}' is a reference; assign through it with deref"),
                        )
                        .with_value(name)
                        .with_note(format!("write deref({name}) as the assignment target")));
                }
                if !mutable {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            format!("'{name}' was declared with let and cannot be mutated"),
                        )
                        .with_value(name)
                        .with_note(format!("declare it with var: var {name} = ...;")));
                }
                Ok(LValue {
                    text: snippet.render(),
                    ty: snippet.ty,
                    origin: snippet.origin,
                })
            }
            ScopeEntry::Param { snippet } => Err(self
                .err(
                    ErrorKind::IllegalMutation,
                    format!("cannot mutate parameter '{name}'"),
                )
                .with_value(snippet.render())
                .with_note(format!(
                    "copy it into a mutable local first: var {name}_local = {name};"
                ))),
            ScopeEntry::Extern(External::Global(handle)) => {
                let mutable = matches!(
                    handle.ref_space(),
                    Some((_, AccessMode::ReadWrite))
                );
                if !mutable {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            format!("'{name}' is bound read-only and cannot be assigned"),
                        )
                        .with_value(name));
                }
                let (decl, final_name) = self.run.ensure_global(&handle)?;
                self.frame.deps.push(decl);
                Ok(LValue {
                    text: final_name,
                    ty: handle.ty().clone(),
                    origin: handle.origin(),
                })
            }
            ScopeEntry::Extern(_) => Err(self.err(
                ErrorKind::IllegalMutation,
                format!("'{name}' is not an assignable location"),
            )),
        }
    }

    // === Expressions ===

    pub fn expr(&mut self, expr: &Expr) -> ResolveResult<Snippet> {
        match expr {
            Expr::LitBool(v) => Ok(Snippet::constant(ConstValue::Bool(*v))),
            Expr::LitInt(v) => Ok(Snippet::constant(ConstValue::AbstractInt(*v))),
            Expr::LitFloat(v) => Ok(Snippet::constant(ConstValue::AbstractFloat(*v))),
            Expr::Ident(name) => self.expr_ident(name),
            Expr::Unary { op, operand } => {
                let s = self.expr(operand)?;
                unary(*op, &s).map_err(|e| self.type_err(e).with_value(s.render()))
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                let out = binary(*op, &l, &r)
                    .map_err(|e| self.type_err(e).with_value(format!("{} {op} {}", l.render(), r.render())))?;
                Ok(out.snippet)
            }
            Expr::Ternary {
                cond,
                then_value,
                else_value,
            } => self.expr_ternary(cond, then_value, else_value),
            Expr::Member { object, member } => {
                let mut obj = self.expr(object)?;
                if obj.ty.is_ptr() {
                    obj = self.deref(obj)?;
                }
                weft_types::access_member(&obj, member).map_err(|e| self.type_err(e))
            }
            Expr::Index { object, index } => self.expr_index(object, index),
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::ArrayLit(elems) => self.expr_array(elems),
            Expr::Ref { target } => self.expr_ref(target),
            Expr::Deref(inner) => {
                let ptr = self.expr(inner)?;
                self.deref(ptr)
            }
        }
    }

    fn expr_ident(&mut self, name: &str) -> ResolveResult<Snippet> {
        let entry = self
            .frame
            .scope
            .lookup(name)
            .cloned()
            .ok_or_else(|| {
                self.err(
                    ErrorKind::IllegalIdentifier,
                    format!("unresolved identifier '{name}'"),
                )
            })?;
        match entry {
            ScopeEntry::Local { snippet, .. } | ScopeEntry::Param { snippet } => Ok(snippet),
            ScopeEntry::Extern(External::Const(value)) => Ok(Snippet::constant(value)),
            ScopeEntry::Extern(External::Global(handle)) => {
                let (decl, final_name) = self.run.ensure_global(&handle)?;
                self.frame.deps.push(decl);
                Ok(Snippet::new(final_name, handle.ty().clone(), handle.origin()))
            }
            ScopeEntry::Extern(External::Slot(handle)) => {
                let value = self.run.slot_value(&handle).ok_or_else(|| {
                    self.err(
                        ErrorKind::UnsupportedConstruct,
                        format!("no value bound for slot '{}'", handle.name()),
                    )
                    .with_value(name)
                    .with_note("bind it through the resolution overrides or give the slot a default")
                })?;
                Ok(Snippet {
                    value: weft_types::SnippetValue::Const(value),
                    ty: DataType::Scalar(value.kind()),
                    origin: Origin::Comptime,
                })
            }
            ScopeEntry::Extern(External::Fn(_)) => Err(self.err(
                ErrorKind::UnsupportedConstruct,
                format!("function '{name}' used as a value; call it instead"),
            )),
            ScopeEntry::Extern(External::Struct(_)) => Err(self.err(
                ErrorKind::UnsupportedConstruct,
                format!("struct '{name}' used as a value; construct it instead"),
            )),
        }
    }

    fn expr_ternary(
        &mut self,
        cond: &Expr,
        then_value: &Expr,
        else_value: &Expr,
    ) -> ResolveResult<Snippet> {
        let c = self.expr(cond)?;
        if !c.ty.is_bool() {
            return Err(self
                .err(
                    ErrorKind::TypeUnification,
                    format!("ternary condition must be bool, got {}", c.ty),
                )
                .with_value(c.render()));
        }
        let Some(chosen_then) = c.comptime_const().and_then(ConstValue::as_bool) else {
            return Err(self
                .err(
                    ErrorKind::UnsupportedConstruct,
                    "ternary condition must be known at resolution time",
                )
                .with_value(c.render())
                .with_note(
                    "for runtime conditions use select(false_value, true_value, cond) \
                     or an if statement",
                ));
        };

        // Both branches are typed so unification is checked, but only the
        // chosen branch's declarations survive in the dependency set.
        let deps_before = self.frame.deps.len();
        let t = self.expr(then_value)?;
        let deps_after_then = self.frame.deps.len();
        let e = self.expr(else_value)?;

        let unified = self.unify_branches(&t, &e)?;

        if chosen_then {
            self.frame.deps.truncate(deps_after_then);
        } else {
            self.frame.deps.drain(deps_before..deps_after_then);
        }
        let chosen = if chosen_then { t } else { e };
        Ok(adapt_to(chosen, unified))
    }

    fn unify_branches(&self, t: &Snippet, e: &Snippet) -> ResolveResult<DataType> {
        if t.ty.concretize() == e.ty.concretize() {
            return Ok(t.ty.concretize());
        }
        let mismatch = || {
            self.err(
                ErrorKind::TypeUnification,
                format!("ternary branches do not unify: {} vs {}", t.ty, e.ty),
            )
        };
        let tk = t.ty.scalar_kind().ok_or_else(mismatch)?;
        let ek = e.ty.scalar_kind().ok_or_else(mismatch)?;
        if t.ty.component_count() != e.ty.component_count() {
            return Err(mismatch());
        }
        let unified = scalar::unify(tk, ek).ok_or_else(mismatch)?;
        let kind = unified.kind.concretize();
        Ok(match t.ty.component_count() {
            Some(1) => DataType::Scalar(kind),
            Some(n) => DataType::vec(n, kind),
            None => return Err(mismatch()),
        })
    }

    fn expr_index(&mut self, object: &Expr, index: &Expr) -> ResolveResult<Snippet> {
        let mut obj = self.expr(object)?;
        if obj.ty.is_ptr() {
            obj = self.deref(obj)?;
        }
        let idx = self.expr(index)?;
        if !idx.ty.scalar_kind().is_some_and(|k| k.is_integer()) {
            return Err(self
                .err(
                    ErrorKind::TypeUnification,
                    format!("index must be an integer, got {}", idx.ty),
                )
                .with_value(idx.render()));
        }
        let elem = match &obj.ty {
            DataType::Array { elem, .. } => (**elem).clone(),
            DataType::Vector { scalar, .. } => DataType::Scalar(*scalar),
            DataType::Matrix { rows, scalar, .. } => DataType::vec(*rows, *scalar),
            other => {
                return Err(self
                    .err(
                        ErrorKind::TypeUnification,
                        format!("cannot index into {other}"),
                    )
                    .with_value(obj.render()))
            }
        };
        Ok(Snippet::new(
            format!("{}[{}]", obj.render(), idx.render()),
            elem,
            obj.origin.join(idx.origin),
        ))
    }

    fn expr_array(&mut self, elems: &[Expr]) -> ResolveResult<Snippet> {
        if elems.is_empty() {
            return Err(self.err(
                ErrorKind::TypeUnification,
                "array literals need at least one element",
            ));
        }
        let mut snippets = Vec::with_capacity(elems.len());
        for elem in elems {
            snippets.push(self.expr(elem)?);
        }
        // All elements unify to one type.
        let mut elem_ty = snippets[0].ty.clone();
        for s in &snippets[1..] {
            elem_ty = self.unify_branches(
                &Snippet::new("", elem_ty.clone(), Origin::Constant),
                s,
            )?;
        }
        let elem_ty = elem_ty.concretize();

        let mut origin = Origin::Comptime;
        let rendered: Vec<String> = snippets
            .iter()
            .map(|s| {
                origin = origin.join(s.origin);
                s.render()
            })
            .collect();
        let ty_text = self.run.render_type(&elem_ty, &mut self.frame.deps)?;
        let n = snippets.len();
        Ok(Snippet::new(
            format!("array<{ty_text}, {n}>({})", rendered.join(", ")),
            DataType::array(elem_ty, n as u32),
            origin,
        ))
    }

    fn expr_ref(&mut self, target: &str) -> ResolveResult<Snippet> {
        let entry = self
            .frame
            .scope
            .lookup(target)
            .cloned()
            .ok_or_else(|| {
                self.err(
                    ErrorKind::IllegalIdentifier,
                    format!("unresolved identifier '{target}'"),
                )
            })?;
        match entry {
            ScopeEntry::Local {
                snippet,
                mutable,
                is_ref,
            } => {
                if is_ref {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            format!("'{target}' is already a reference"),
                        )
                        .with_value(target));
                }
                if !mutable {
                    return Err(self
                        .err(
                            ErrorKind::IllegalMutation,
                            format!("references require a fresh mutable copy; '{target}' is a let"),
                        )
                        .with_value(target)
                        .with_note(format!("declare it with var: var {target} = ...;")));
                }
                Ok(Snippet::new(
                    format!("(&{})", snippet.render()),
                    DataType::ptr(
                        AddressSpace::Function,
                        snippet.ty.clone(),
                        AccessMode::ReadWrite,
                    ),
                    Origin::Local,
                ))
            }
            ScopeEntry::Param { snippet } => Err(self
                .err(
                    ErrorKind::IllegalMutation,
                    format!("cannot take a reference directly to parameter '{target}'"),
                )
                .with_value(snippet.render())
                .with_note(format!(
                    "copy it first: var {target}_local = {target}; let r = ref({target}_local);"
                ))),
            ScopeEntry::Extern(External::Global(handle)) => {
                let Some((space, access)) = handle.ref_space() else {
                    return Err(self
                        .err(
                            ErrorKind::UnsupportedConstruct,
                            format!("references into '{target}' are not supported"),
                        )
                        .with_value(target)
                        .with_note("uniform and handle bindings cannot be referenced"));
                };
                let (decl, final_name) = self.run.ensure_global(&handle)?;
                self.frame.deps.push(decl);
                Ok(Snippet::new(
                    format!("(&{final_name})"),
                    DataType::ptr(space, handle.ty().clone(), access),
                    handle.origin(),
                ))
            }
            _ => Err(self
                .err(
                    ErrorKind::IllegalMutation,
                    format!("'{target}' is not a referenceable location"),
                )
                .with_value(target)),
        }
    }

    fn deref(&self, ptr: Snippet) -> ResolveResult<Snippet> {
        match &ptr.ty {
            DataType::Ptr {
                space,
                access,
                inner,
            } => Ok(Snippet::new(
                format!("(*{})", ptr.render()),
                (**inner).clone(),
                deref_origin(*space, *access, ptr.origin),
            )),
            other => Err(self
                .err(
                    ErrorKind::TypeUnification,
                    format!("cannot dereference a value of type {other}"),
                )
                .with_value(ptr.render())),
        }
    }

    // === Calls ===

    fn call(&mut self, callee: &str, args: &[Expr]) -> ResolveResult<Snippet> {
        if callee == "log" {
            return crate::log::log_call(self, args);
        }

        if let Some(entry) = self.frame.scope.lookup(callee).cloned() {
            return match entry {
                ScopeEntry::Extern(External::Fn(handle)) => self.call_user_fn(&handle, args),
                ScopeEntry::Extern(External::Struct(handle)) => {
                    self.call_struct_ctor(&handle, args)
                }
                _ => Err(self.err(
                    ErrorKind::UnsupportedConstruct,
                    format!("'{callee}' is not callable"),
                )),
            };
        }

        let mut snippets = Vec::with_capacity(args.len());
        for arg in args {
            snippets.push(self.expr(arg)?);
        }
        let tys: Vec<DataType> = snippets.iter().map(|s| s.ty.clone()).collect();

        if let Some(result) = builtins::constructor(callee, &tys) {
            let ty = result.map_err(|msg| {
                self.err(ErrorKind::TypeUnification, msg)
                    .with_value(render_call(callee, &snippets))
            })?;
            let spelling = builtins::constructor_spelling(callee)
                .ok_or_else(|| self.err(ErrorKind::Internal, "constructor without spelling"))?;
            let origin = Origin::Comptime.join(join_origins(&snippets));
            return Ok(Snippet::new(
                format!("{spelling}({})", render_args(&snippets)),
                ty,
                origin,
            ));
        }

        if let Some(found) = builtins::lookup(callee, args.len()) {
            let builtin = found.map_err(|msg| self.err(ErrorKind::TypeUnification, msg))?;
            let ty = (builtin.result)(&tys).map_err(|msg| {
                self.err(ErrorKind::TypeUnification, msg)
                    .with_value(render_call(callee, &snippets))
            })?;
            // arrayLength wants a pointer; accept the array and take the
            // address at the call site.
            let rendered = if builtin.name == "arrayLength" && !snippets[0].ty.is_ptr() {
                format!("arrayLength(&{})", snippets[0].render())
            } else {
                format!("{}({})", builtin.name, render_args(&snippets))
            };
            let origin = Origin::Local.join(join_origins(&snippets));
            return Ok(Snippet::new(rendered, ty, origin));
        }

        Err(self.err(
            ErrorKind::UnsupportedConstruct,
            format!("unknown function '{callee}'"),
        ))
    }

    fn call_user_fn(&mut self, handle: &crate::program::FnHandle, args: &[Expr]) -> ResolveResult<Snippet> {
        let mut snippets = Vec::with_capacity(args.len());
        for arg in args {
            snippets.push(self.expr(arg)?);
        }
        let fn_name = handle.def().name.clone();
        for (i, s) in snippets.iter().enumerate() {
            let passable = s.ty.is_constructible() || s.ty.is_ptr() || s.ty.is_opaque();
            if !passable {
                return Err(self
                    .err(
                        ErrorKind::TypeUnification,
                        format!(
                            "argument {} of '{fn_name}' is not a passable shader value (kind: {})",
                            i + 1,
                            s.ty
                        ),
                    )
                    .with_value(s.render()));
            }
        }

        let target = self.run.specialize(handle, &snippets)?;
        self.frame.deps.push(target.decl);

        let rendered: Vec<String> = snippets
            .iter()
            .zip(&target.keep)
            .filter(|(_, keep)| **keep)
            .map(|(s, _)| s.render())
            .collect();
        let origin = Origin::Local.join(join_origins(&snippets));
        Ok(Snippet::new(
            format!("{}({})", target.name, rendered.join(", ")),
            target.ret,
            origin,
        ))
    }

    fn call_struct_ctor(
        &mut self,
        handle: &weft_types::StructHandle,
        args: &[Expr],
    ) -> ResolveResult<Snippet> {
        let mut snippets = Vec::with_capacity(args.len());
        for arg in args {
            snippets.push(self.expr(arg)?);
        }
        let fields = handle.fields();
        if snippets.len() != fields.len() {
            return Err(self.err(
                ErrorKind::TypeUnification,
                format!(
                    "struct '{}' has {} field(s), constructor got {}",
                    handle.name(),
                    fields.len(),
                    snippets.len()
                ),
            ));
        }
        let mut rendered = Vec::with_capacity(snippets.len());
        for (s, field) in snippets.iter().zip(fields) {
            let (text, promoted) = self.convert_for_store(s, &field.ty).map_err(|e| {
                e.with_note(format!(
                    "while constructing field '{}' of '{}'",
                    field.name,
                    handle.name()
                ))
            })?;
            if promoted {
                self.run.warn_once(
                    format!("ctor-promote:{}:{}", s.ty, field.ty),
                    format!(
                        "implicit promotion in constructor: {} value stored into {} field '{}'",
                        s.ty, field.ty, field.name
                    ),
                );
            }
            rendered.push(text);
        }
        let (decl, final_name) = self.run.ensure_struct(handle)?;
        self.frame.deps.push(decl);
        let origin = Origin::Comptime.join(join_origins(&snippets));
        Ok(Snippet::new(
            format!("{final_name}({})", rendered.join(", ")),
            handle.ty(),
            origin,
        ))
    }
}

/// An assignable location.
struct LValue {
    text: String,
    ty: DataType,
    origin: Origin,
}

/// Origin of a value reached through a pointer.
fn deref_origin(space: AddressSpace, access: AccessMode, ptr_origin: Origin) -> Origin {
    match space {
        AddressSpace::Function => {
            if ptr_origin == Origin::SelfDeref {
                Origin::SelfDeref
            } else {
                Origin::Local
            }
        }
        AddressSpace::Private => Origin::Private,
        AddressSpace::Workgroup => Origin::Workgroup,
        AddressSpace::Uniform => Origin::Uniform,
        AddressSpace::Storage => match access {
            AccessMode::Read => Origin::StorageRead,
            AccessMode::ReadWrite => Origin::StorageReadWrite,
        },
    }
}

/// Widen a snippet to a unified type, casting constants in-process.
fn adapt_to(snippet: Snippet, ty: DataType) -> Snippet {
    if snippet.ty.concretize() == ty {
        return Snippet { ty, ..snippet };
    }
    if let (Some(v), Some(kind)) = (snippet.comptime_const().copied(), ty.scalar_kind()) {
        if let Some(cast) = v.cast(kind) {
            return Snippet {
                value: weft_types::SnippetValue::Const(cast),
                ty,
                origin: snippet.origin,
            };
        }
    }
    let conversion = match &ty {
        DataType::Vector { size, scalar } => format!("vec{size}<{}>", scalar.wgsl()),
        other => other.to_string(),
    };
    Snippet::new(
        format!("{conversion}({})", snippet.render()),
        ty,
        snippet.origin,
    )
}

fn join_origins(snippets: &[Snippet]) -> Origin {
    snippets
        .iter()
        .fold(Origin::Constant, |acc, s| acc.join(s.origin))
}

fn render_args(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(Snippet::render)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_call(callee: &str, snippets: &[Snippet]) -> String {
    format!("{callee}({})", render_args(snippets))
}
