//! By-reference parameter emulation.
//!
//! Declarations with parameters take a single container `__params`. ByRef
//! parameters are read and written through their container slot; ByVal
//! parameters are copied into locals on entry. Functions (and property
//! getters) return the local named after themselves on every exit.
//!
//! Call sites of declared procedures box their arguments:
//!
//! ```text
//! const __args0 = [tmp, 2];
//! vpmSetArray(__args0);
//! [tmp, ,] = __args0;
//! ```
//!
//! Packing is hoisted in front of the statement holding the call and the
//! write-back follows it; nested calls are packed and unpacked innermost first.

use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::error::CompileError;
use super::scope::{BindingKind, Scope, ScopeTracker};
use super::visit::{rewrite_block, rewrite_expr, Rewrite, Role, Visit};

/// Name of the container parameter.
pub const PARAMS_NAME: &str = "__params";

/// Prefix of boxed argument containers (`__args0`, `__args1`, ...).
pub const ARGS_PREFIX: &str = "__args";

/// Return local of a function that calls itself; the function's own name
/// stays free to reach the function.
pub const RESULT_NAME: &str = "__result";

pub struct ParameterTransformer<'s> {
    scope: &'s mut Scope,
    counter: usize,
    /// Lower-cased method names of the class being walked.
    class_methods: Option<HashSet<String>>,
    /// Lower-cased method names of every class in the program.
    instance_methods: HashSet<String>,
    /// Name of the procedure being walked.
    function: Option<String>,
}

impl<'s> ParameterTransformer<'s> {
    /// `scope` must hold the program frame.
    pub fn new(scope: &'s mut Scope) -> Self {
        Self {
            scope,
            counter: 0,
            class_methods: None,
            instance_methods: HashSet::new(),
            function: None,
        }
    }

    pub fn transform(mut self, mut program: Program) -> Result<Program, CompileError> {
        self.instance_methods = program
            .body
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Class(decl) => Some(boxed_methods(decl)),
                _ => None,
            })
            .flatten()
            .collect();
        self.transform_block(&mut program.body)?;
        tracing::debug!(containers = self.counter, "parameter pass finished");
        Ok(program)
    }

    fn transform_block(&mut self, stmts: &mut Vec<Stmt>) -> Result<(), CompileError> {
        let old = std::mem::take(stmts);
        for mut stmt in old {
            let (packs, unpacks) = self.box_calls(head_exprs(&mut stmt))?;
            let (test_packs, test_unpacks) = self.box_calls(loop_test(&mut stmt).into_iter().collect())?;

            self.transform_children(&mut stmt)?;
            if !test_packs.is_empty() {
                check_each_iteration(&mut stmt, test_packs, test_unpacks);
            }

            stmts.extend(packs);
            stmts.push(stmt);
            stmts.extend(unpacks);
        }
        Ok(())
    }

    /// Box the declared calls in `exprs`, returning the packing and
    /// write-back statements.
    fn box_calls(&mut self, exprs: Vec<&mut Expr>) -> Result<(Vec<Stmt>, Vec<Stmt>), CompileError> {
        let mut boxer = CallBoxer {
            scope: &*self.scope,
            class_methods: self.class_methods.as_ref(),
            instance_methods: &self.instance_methods,
            function: self.function.as_deref(),
            counter: &mut self.counter,
            open: Vec::new(),
            packs: Vec::new(),
            unpacks: Vec::new(),
        };
        for expr in exprs {
            rewrite_expr(expr, Role::Value, &mut boxer)?;
        }
        Ok((boxer.packs, boxer.unpacks))
    }

    fn transform_children(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match &mut stmt.kind {
            StmtKind::Function(decl) => self.transform_function(decl, MethodKind::Method),
            StmtKind::Class(decl) => {
                let methods = boxed_methods(decl).collect();
                let outer = self.class_methods.replace(methods);
                let result = self.transform_class(decl);
                self.class_methods = outer;
                result
            }
            StmtKind::If { consequent, alternate, .. } => {
                self.transform_block(consequent)?;
                if let Some(alt) = alternate {
                    self.transform_block(alt)?;
                }
                Ok(())
            }
            StmtKind::For { body, .. }
            | StmtKind::ForOf { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. } => self.transform_block(body),
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    self.transform_block(&mut case.body)?;
                }
                Ok(())
            }
            StmtKind::VarDecl { .. } | StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Break => Ok(()),
        }
    }

    fn transform_class(&mut self, decl: &mut ClassDecl) -> Result<(), CompileError> {
        self.transform_block(&mut decl.constructor)?;
        for member in &mut decl.members {
            self.transform_function(&mut member.function, member.kind)?;
        }
        Ok(())
    }

    fn transform_function(&mut self, decl: &mut FunctionDecl, kind: MethodKind) -> Result<(), CompileError> {
        self.scope.push(ScopeTracker::function_frame(decl)?);
        let outer = self.function.replace(decl.name.clone());
        let result = self.transform_block(&mut decl.body);
        self.function = outer;
        self.scope.pop();
        result?;

        let mut result_name = decl.name.clone();
        if decl.kind.returns_value() && calls_itself(decl)? {
            let mut renamer = ResultRenamer { name: &decl.name };
            rewrite_block(&mut decl.body, &mut renamer)?;
            result_name = RESULT_NAME.to_string();
        }

        let mut prologue = Vec::new();
        if decl.kind.returns_value() {
            prologue.push(Stmt::declare(
                VarKind::Let,
                result_name.clone(),
                Some(Expr::synthetic(ExprKind::Undefined)),
            ));
        }
        // Accessors keep their native parameters
        if kind == MethodKind::Method && !decl.params.is_empty() {
            prologue.extend(box_params(decl)?);
        }
        if decl.kind.returns_value() {
            let mut filler = ReturnFiller { name: &result_name };
            rewrite_block(&mut decl.body, &mut filler)?;
            decl.body.push(Stmt::synthetic(StmtKind::Return(Some(Expr::ident(result_name)))));
        }
        prologue.append(&mut decl.body);
        decl.body = prologue;
        Ok(())
    }
}

/// Lower-cased names of the members that take a container (accessors keep
/// their native parameters).
fn boxed_methods(decl: &ClassDecl) -> impl Iterator<Item = String> + '_ {
    decl.members
        .iter()
        .filter(|m| m.kind == MethodKind::Method)
        .map(|m| m.function.name.to_ascii_lowercase())
}

/// Replace the declared parameters with the container, rewrite ByRef
/// references to container slots, and return the ByVal copies.
fn box_params(decl: &mut FunctionDecl) -> Result<Vec<Stmt>, CompileError> {
    let mut slots = HashMap::new();
    let mut copies = Vec::new();
    for (index, param) in decl.params.iter().enumerate() {
        match param.mode {
            PassingMode::ByRef => {
                slots.insert(param.name.to_ascii_lowercase(), index);
            }
            PassingMode::ByVal => {
                copies.push(Stmt::declare(VarKind::Let, param.name.clone(), Some(param_slot(index))));
            }
        }
    }

    let mut rewriter = ByRefSlots { slots };
    rewrite_block(&mut decl.body, &mut rewriter)?;

    let span = decl.params.first().map(|p| p.span).unwrap_or(decl.span);
    decl.params = vec![Param {
        name: PARAMS_NAME.to_string(),
        mode: PassingMode::ByVal,
        span,
    }];
    Ok(copies)
}

#[allow(clippy::cast_precision_loss)]
fn param_slot(index: usize) -> Expr {
    Expr::index(Expr::ident(PARAMS_NAME), Expr::synthetic(ExprKind::Number(index as f64)))
}

/// The statement's own expressions; nested blocks are walked separately so
/// their packing lands inside them.
fn head_exprs(stmt: &mut Stmt) -> Vec<&mut Expr> {
    match &mut stmt.kind {
        StmtKind::VarDecl { declarators, .. } => declarators.iter_mut().filter_map(|d| d.init.as_mut()).collect(),
        StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => vec![expr],
        StmtKind::If { test, .. } => vec![test],
        StmtKind::For { init, update, .. } => vec![init, update],
        StmtKind::ForOf { iterable, .. } => vec![iterable],
        StmtKind::Switch { discriminant, cases } => {
            let mut exprs = vec![discriminant];
            exprs.extend(cases.iter_mut().filter_map(|c| c.test.as_mut()));
            exprs
        }
        StmtKind::While { .. }
        | StmtKind::DoWhile { .. }
        | StmtKind::Function(_)
        | StmtKind::Class(_)
        | StmtKind::Return(None)
        | StmtKind::Break => Vec::new(),
    }
}

/// The condition a loop re-evaluates on every iteration.
fn loop_test(stmt: &mut Stmt) -> Option<&mut Expr> {
    match &mut stmt.kind {
        StmtKind::While { test, .. } | StmtKind::DoWhile { test, .. } | StmtKind::For { test, .. } => Some(test),
        _ => None,
    }
}

/// Move a loop condition holding boxed calls into the body, so its
/// containers are packed and written back on every iteration:
///
/// ```text
/// while (true) {
///     const __args0 = [n];
///     if (!More(__args0)) {
///         [n] = __args0;
///         break;
///     }
///     [n] = __args0;
///     ...
/// }
/// ```
///
/// A trailing condition (`do ... while`) gets the same guard at the end of
/// the body.
fn check_each_iteration(stmt: &mut Stmt, packs: Vec<Stmt>, unpacks: Vec<Stmt>) {
    let guard = |test: &mut Expr| {
        let test = std::mem::replace(test, Expr::synthetic(ExprKind::Bool(true)));
        let mut exit = unpacks.clone();
        exit.push(Stmt::synthetic(StmtKind::Break));
        let mut stmts = packs.clone();
        stmts.push(Stmt::synthetic(StmtKind::If {
            test: Expr::not(test),
            consequent: exit,
            alternate: None,
        }));
        stmts.extend(unpacks.iter().cloned());
        stmts
    };
    match &mut stmt.kind {
        StmtKind::While { test, body } | StmtKind::For { test, body, .. } => {
            let rest = std::mem::replace(body, guard(test));
            body.extend(rest);
        }
        StmtKind::DoWhile { body, test } => {
            let stmts = guard(test);
            body.extend(stmts);
        }
        _ => {}
    }
}

/// Boxes the arguments of declared calls within one statement.
struct CallBoxer<'a> {
    scope: &'a Scope,
    class_methods: Option<&'a HashSet<String>>,
    instance_methods: &'a HashSet<String>,
    /// The enclosing procedure; inside a function its name is both the
    /// return local and a recursive call.
    function: Option<&'a str>,
    counter: &'a mut usize,
    /// Container number of each call entered but not yet left.
    open: Vec<Option<usize>>,
    packs: Vec<Stmt>,
    unpacks: Vec<Stmt>,
}

impl CallBoxer<'_> {
    fn is_own_name(&self, name: &str) -> bool {
        self.function.is_some_and(|f| f.eq_ignore_ascii_case(name))
    }

    fn is_declared(&self, callee: &Expr) -> bool {
        match &callee.kind {
            ExprKind::Ident(name) => {
                self.is_own_name(name)
                    || self
                        .scope
                        .lookup(name)
                        .is_some_and(|b| b.kind == BindingKind::Function)
            }
            ExprKind::Member { object, property } if object.kind == ExprKind::This => self
                .class_methods
                .is_some_and(|methods| methods.contains(&property.to_ascii_lowercase())),
            // `obj.Method x` on a script object
            ExprKind::Member { object, property } => {
                object.as_ident().is_some_and(|name| {
                    self.scope
                        .lookup(name)
                        .is_some_and(|b| matches!(b.kind, BindingKind::Variable | BindingKind::Parameter))
                }) && self.instance_methods.contains(&property.to_ascii_lowercase())
            }
            _ => false,
        }
    }

    /// Element written by an array read such as `arr(i)(j)`, which is still
    /// a call at this point.
    fn array_element(&self, expr: &Expr) -> Option<Expr> {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return None;
        };
        if args.is_empty() {
            return None;
        }
        let object = match &callee.kind {
            ExprKind::Ident(name) => {
                let is_array = !self.is_own_name(name)
                    && self
                        .scope
                        .lookup(name)
                        .is_some_and(|b| matches!(b.kind, BindingKind::Variable | BindingKind::Parameter));
                if !is_array {
                    return None;
                }
                callee.as_ref().clone()
            }
            _ => self.array_element(callee)?,
        };
        Some(Expr::index_chain(object, args.clone()))
    }
}

impl Rewrite for CallBoxer<'_> {
    fn enter_expr(&mut self, expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        if let ExprKind::Call { callee, args } = &expr.kind {
            let number = if !args.is_empty() && self.is_declared(callee) {
                let n = *self.counter;
                *self.counter += 1;
                Some(n)
            } else {
                None
            };
            self.open.push(number);
        }
        Ok(Visit::Keep)
    }

    fn leave_expr(&mut self, expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            return Ok(Visit::Keep);
        };
        let Some(number) = self.open.pop().flatten() else {
            return Ok(Visit::Keep);
        };

        let container = format!("{ARGS_PREFIX}{number}");
        let values = std::mem::take(args);
        let targets = values
            .iter()
            .map(|arg| {
                if arg.is_assignable() {
                    Some(arg.clone())
                } else {
                    self.array_element(arg)
                }
            })
            .collect();

        self.packs.push(Stmt::declare(
            VarKind::Const,
            container.clone(),
            Some(Expr::synthetic(ExprKind::Array(values))),
        ));
        self.unpacks.push(Stmt::expr(Expr::assign(
            Expr::synthetic(ExprKind::ArrayPattern(targets)),
            Expr::ident(container.clone()),
        )));
        args.push(Expr::ident(container));

        if let ExprKind::Ident(name) = &mut callee.kind {
            if let Some(binding) = self.scope.lookup(name) {
                name.clone_from(&binding.canonical);
            }
        }
        Ok(Visit::Keep)
    }
}

/// Rewrites ByRef parameter references to `__params[i]`.
struct ByRefSlots {
    slots: HashMap<String, usize>,
}

impl Rewrite for ByRefSlots {
    fn enter_expr(&mut self, expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        let Some(name) = expr.as_ident() else {
            return Ok(Visit::Keep);
        };
        Ok(match self.slots.get(&name.to_ascii_lowercase()) {
            Some(&index) => Visit::Replace(Expr {
                span: expr.span,
                ..param_slot(index)
            }),
            None => Visit::Keep,
        })
    }
}

/// Whether a function body calls the function by name.
fn calls_itself(decl: &mut FunctionDecl) -> Result<bool, CompileError> {
    let mut finder = SelfCallFinder {
        name: &decl.name,
        found: false,
    };
    rewrite_block(&mut decl.body, &mut finder)?;
    Ok(finder.found)
}

struct SelfCallFinder<'a> {
    name: &'a str,
    found: bool,
}

impl Rewrite for SelfCallFinder<'_> {
    fn enter_expr(&mut self, expr: &mut Expr, role: Role) -> Result<Visit<Expr>, CompileError> {
        if role == Role::Callee && expr.as_ident().is_some_and(|n| n.eq_ignore_ascii_case(self.name)) {
            self.found = true;
        }
        Ok(Visit::Keep)
    }
}

/// Moves reads and writes of a function's return value to [`RESULT_NAME`],
/// leaving calls on the function's name.
struct ResultRenamer<'a> {
    name: &'a str,
}

impl Rewrite for ResultRenamer<'_> {
    fn enter_expr(&mut self, expr: &mut Expr, role: Role) -> Result<Visit<Expr>, CompileError> {
        if role == Role::Value && expr.as_ident().is_some_and(|n| n.eq_ignore_ascii_case(self.name)) {
            return Ok(Visit::Replace(Expr {
                span: expr.span,
                ..Expr::ident(RESULT_NAME)
            }));
        }
        Ok(Visit::Keep)
    }
}

/// Turns every bare `return;` into `return <name>;`.
struct ReturnFiller<'a> {
    name: &'a str,
}

impl Rewrite for ReturnFiller<'_> {
    fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Visit<Stmt>, CompileError> {
        if matches!(stmt.kind, StmtKind::Return(None)) {
            return Ok(Visit::Replace(Stmt::new(
                StmtKind::Return(Some(Expr::ident(self.name))),
                stmt.span,
            )));
        }
        Ok(Visit::Keep)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::codegen::generate;
    use crate::script::error::ErrorKind;
    use crate::script::parse_source;

    fn run(vbs: &str) -> Result<Program, CompileError> {
        let program = parse_source(vbs)?;
        let mut scope = Scope::for_program(&program)?;
        ParameterTransformer::new(&mut scope).transform(program)
    }

    fn transform(vbs: &str) -> String {
        generate(&run(vbs).unwrap())
    }

    /// Transforms `vbs` after declaring `vpmSetArray` and `foo`; the
    /// declarations themselves are left out of the output.
    fn transform_calls(vbs: &str) -> String {
        let source = format!("Sub vpmSetArray(a, b)\nEnd Sub\nFunction foo(a)\nEnd Function\n{vbs}");
        let mut program = run(&source).unwrap();
        program.body.retain(|s| !matches!(s.kind, StmtKind::Function(_)));
        generate(&program)
    }

    #[test]
    fn sub_declaration_params() {
        let vbs = "Private Sub foo(ByRef x, ByVal y)\nx = \"returned\"\ny = 2\ny = y + 2\nx = x & \"Bar\"\nEnd Sub";
        assert_eq!(
            transform(vbs),
            "function foo(__params) {\n    let y = __params[1];\n    __params[0] = 'returned';\n    y = 2;\n    y = y + 2;\n    __params[0] = __params[0] + 'Bar';\n}"
        );
    }

    #[test]
    fn function_declaration_params() {
        let expected = "function foo(__params) {\n    let foo = undefined;\n    let y = __params[1];\n    __params[0] = 'returned';\n    y = 2;\n    y = y + 2;\n    __params[0] = __params[0] + 'Bar';\n    return foo;\n}";
        let vbs = "Private Function foo(ByRef x, ByVal y)\nx = \"returned\"\ny = 2\ny = y + 2\nx = x & \"Bar\"\nEnd Function";
        assert_eq!(transform(vbs), expected);

        // Unannotated parameters are ByRef
        let vbs = "Private Function foo(x, ByVal y)\nx = \"returned\"\ny = 2\ny = y + 2\nx = x & \"Bar\"\nEnd Function";
        assert_eq!(transform(vbs), expected);
    }

    #[test]
    fn no_params_is_untouched() {
        let vbs = "Private Sub foo\nx = \"returned\"\ny = 2\ny = y + 2\nx = x & \"Bar\"\nEnd Sub";
        assert_eq!(
            transform(vbs),
            "function foo() {\n    x = 'returned';\n    y = 2;\n    y = y + 2;\n    x = x + 'Bar';\n}"
        );
    }

    #[test]
    fn class_property_with_params() {
        let vbs = "Class cvpmTest\nPrivate mEnabled\nPublic Property Get Balls(test, ByVal test2):mEnabled=test:Balls=mEnabled:If Balls=1 Then Exit Property:End Property\nEnd Class";
        assert_eq!(
            transform(vbs),
            "class cvpmTest {\n    constructor() {\n        this.mEnabled = undefined;\n    }\n    Balls(__params) {\n        let Balls = undefined;\n        let test2 = __params[1];\n        this.mEnabled = __params[0];\n        Balls = this.mEnabled;\n        if (__vbs.equals(Balls, 1)) {\n            return Balls;\n        }\n        return Balls;\n    }\n}"
        );
    }

    #[test]
    fn accessors_keep_native_params() {
        let vbs = "Class C\nPrivate mV\nPublic Property Let V(value) : mV = value : End Property\nEnd Class";
        assert_eq!(
            transform(vbs),
            "class C {\n    constructor() {\n        this.mV = undefined;\n    }\n    set V(value) {\n        this.mV = value;\n    }\n}"
        );
    }

    #[test]
    fn packs_and_unpacks_identifiers() {
        assert_eq!(
            transform_calls("vpmSetArray tmp, aKicker"),
            "const __args0 = [\n    tmp,\n    aKicker\n];\nvpmSetArray(__args0);\n[tmp, aKicker] = __args0;"
        );
    }

    #[test]
    fn literals_are_holes() {
        assert_eq!(
            transform_calls("vpmSetArray tmp, 2, tmp2"),
            "const __args0 = [\n    tmp,\n    2,\n    tmp2\n];\nvpmSetArray(__args0);\n[tmp, , tmp2] = __args0;"
        );
        assert_eq!(
            transform_calls("vpmSetArray 1, \"a\""),
            "const __args0 = [\n    1,\n    'a'\n];\nvpmSetArray(__args0);\n[, ,] = __args0;"
        );
    }

    #[test]
    fn nested_calls_box_innermost_first() {
        assert_eq!(
            transform_calls("vpmSetArray tmp, foo(tmp2)"),
            "const __args1 = [tmp2];\nconst __args0 = [\n    tmp,\n    foo(__args1)\n];\nvpmSetArray(__args0);\n[tmp2] = __args1;\n[tmp, ,] = __args0;"
        );
    }

    #[test]
    fn condition_calls_are_hoisted() {
        assert_eq!(
            transform_calls("If foo(tmp) Then\nx = 1\nEnd If"),
            "const __args0 = [tmp];\nif (foo(__args0)) {\n    x = 1;\n}\n[tmp] = __args0;"
        );
    }

    #[test]
    fn member_and_index_arguments_are_written_back() {
        assert_eq!(
            transform_calls("vpmSetArray a.b, c(1)"),
            "const __args0 = [\n    a.b,\n    c(1)\n];\nvpmSetArray(__args0);\n[a.b, ,] = __args0;"
        );
    }

    #[test]
    fn undeclared_and_zero_arg_calls_are_untouched() {
        assert_eq!(transform_calls("PlaySound x, 1"), "PlaySound(x, 1);");
        assert_eq!(transform_calls("vpmSetArray"), "vpmSetArray();");
    }

    #[test]
    fn call_site_is_recased() {
        assert_eq!(
            transform_calls("VPMSETARRAY x, y"),
            "const __args0 = [\n    x,\n    y\n];\nvpmSetArray(__args0);\n[x, y] = __args0;"
        );
    }

    #[test]
    fn locals_shadowing_a_sub_are_not_boxed() {
        let vbs = "Sub Tick(n)\nEnd Sub\nFunction Run(Tick)\nTick 1\nEnd Function";
        let out = transform(vbs);
        assert!(out.contains("__params[0](1);"), "{out}");
        assert!(!out.contains("__args"), "{out}");
    }

    #[test]
    fn class_methods_are_boxed_through_this() {
        let vbs = "Class C\nSub Go(a)\nEnd Sub\nSub Run\nGo x\nEnd Sub\nEnd Class";
        let out = transform(vbs);
        assert!(out.contains("const __args0 = [x];\n        this.Go(__args0);\n        [x] = __args0;"), "{out}");
    }

    #[test]
    fn instance_method_calls_are_boxed() {
        let vbs = "Class Queue\nSub Add(item)\nEnd Sub\nEnd Class\nDim q\nq.add ball\nBallRelease.Add ball";
        let out = transform(vbs);
        assert!(out.ends_with("const __args0 = [ball];\nq.add(__args0);\n[ball] = __args0;\nBallRelease.Add(ball);"), "{out}");
    }

    #[test]
    fn property_methods_are_boxed_through_this() {
        let vbs = "Class C\nProperty Get Slot(i) : Slot = i : End Property\nSub Run : x = Slot(n) : End Sub\nEnd Class";
        let out = transform(vbs);
        assert!(out.contains("const __args0 = [n];\n        x = this.Slot(__args0);\n        [n] = __args0;"), "{out}");
    }

    #[test]
    fn recursive_calls_are_boxed() {
        assert_eq!(
            transform("Function Fact(n)\nFact = n * Fact(n - 1)\nEnd Function"),
            "function Fact(__params) {\n    let __result = undefined;\n    const __args0 = [__params[0] - 1];\n    __result = __params[0] * Fact(__args0);\n    [,] = __args0;\n    return __result;\n}"
        );
    }

    #[test]
    fn array_element_arguments_are_written_back() {
        let out = transform_calls("Dim arr(3)\nvpmSetArray arr(1), arr(1)(2)");
        assert!(out.ends_with("vpmSetArray(__args0);\n[arr[1], arr[1][2]] = __args0;"), "{out}");

        let out = transform("Sub S(a)\nEnd Sub\nSub T(list)\nS list(0)\nEnd Sub");
        assert!(out.contains("const __args0 = [__params[0](0)];\n    S(__args0);\n    [__params[0][0]] = __args0;"), "{out}");
    }

    #[test]
    fn while_conditions_repack_every_iteration() {
        assert_eq!(
            transform_calls("While foo(n)\nn = n + 1\nWend"),
            "while (true) {\n    const __args0 = [n];\n    if (!foo(__args0)) {\n        [n] = __args0;\n        break;\n    }\n    [n] = __args0;\n    n = n + 1;\n}"
        );
    }

    #[test]
    fn trailing_conditions_repack_at_the_end_of_the_body() {
        assert_eq!(
            transform_calls("Do\nn = n + 1\nLoop While foo(n)"),
            "do {\n    n = n + 1;\n    const __args0 = [n];\n    if (!foo(__args0)) {\n        [n] = __args0;\n        break;\n    }\n    [n] = __args0;\n} while (true);"
        );
    }

    #[test]
    fn for_bounds_repack_every_iteration() {
        let out = transform_calls("For i = 1 To foo(n)\nx = i\nNext");
        assert!(
            out.starts_with("for (i = 1; true; i += 1) {\n    const __args0 = [n];\n    if (!(i <= foo(__args0))) {"),
            "{out}"
        );
        assert!(out.ends_with("    [n] = __args0;\n    x = i;\n}"), "{out}");
    }

    #[test]
    fn counter_is_shared_across_the_program() {
        let out = transform("Sub S(a)\nEnd Sub\nS x\nSub Later\nS y\nEnd Sub");
        assert!(out.contains("const __args0 = [x];"), "{out}");
        assert!(out.contains("const __args1 = [y];"), "{out}");
    }

    #[test]
    fn dim_redeclaring_a_parameter_fails() {
        let err = run("Sub foo(x)\nDim x\nEnd Sub").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transform);

        let err = run("Sub foo(a, A)\nEnd Sub").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transform);
    }
}
