//! Host API reference resolution.
//!
//! Identifiers that are not bound by the script are looked up in the host
//! namespaces in priority order (items, enums, stdlib, global) and qualified
//! with the namespace alias, taking the host's canonical casing:
//!
//! ```text
//! ballrelease.createball        ->  items.BallRelease.CreateBall
//! x = ImageAlignment.World      ->  x = __enums.ImageAlignment.ImageAlignWorld
//! PlaySound "fx_flipper"        ->  __global.PlaySound('fx_flipper')
//! ```
//!
//! Script-bound names are re-cased to their declaration. A few stdlib
//! primitives get extra arguments: `GetRef` receives a handle on the calling
//! scope, `CreateObject` the player handle, and `ExecuteGlobal`-style calls are
//! routed through `eval` after inline transpilation.

use super::ast::*;
use super::error::CompileError;
use super::scope::{BindingKind, Scope, ScopeTracker};
use super::visit::{rewrite_program, Rewrite, Role, Visit};
use crate::host::{HostApi, Namespace, NamespaceKind};
use crate::settings::TranspilerSettings;

/// Parameter of the scope handle handed to `GetRef`.
const SCOPE_HANDLE_PARAM: &str = "__name";

pub struct ReferenceTransformer<'a> {
    api: &'a HostApi,
    settings: &'a TranspilerSettings,
    scope: &'a mut Scope,
    /// Names of the enclosing functions, innermost last.
    functions: Vec<String>,
    /// Expression nesting depth within the current statement.
    depth: usize,
    /// The current statement is a bare call, as in `cb 1`.
    call_statement: bool,
    rewritten: usize,
}

impl<'a> ReferenceTransformer<'a> {
    /// `scope` must hold the program frame.
    pub fn new(api: &'a HostApi, settings: &'a TranspilerSettings, scope: &'a mut Scope) -> Self {
        Self {
            api,
            settings,
            scope,
            functions: Vec::new(),
            depth: 0,
            call_statement: false,
            rewritten: 0,
        }
    }

    pub fn transform(mut self, mut program: Program) -> Result<Program, CompileError> {
        rewrite_program(&mut program, &mut self)?;
        tracing::debug!(references = self.rewritten, "reference pass finished");
        Ok(program)
    }

    fn alias(&self, kind: NamespaceKind) -> &'a str {
        let settings = self.settings;
        match kind {
            NamespaceKind::Items => &settings.items_alias,
            NamespaceKind::Enums => &settings.enums_alias,
            NamespaceKind::Stdlib => &settings.stdlib_alias,
            NamespaceKind::Global => &settings.global_alias,
        }
    }

    /// `<alias>.<canonical>`
    fn qualify(&mut self, kind: NamespaceKind, canonical: &str, span: Span) -> Expr {
        self.rewritten += 1;
        let alias = Expr::new(ExprKind::Ident(self.alias(kind).to_string()), span);
        Expr::new(
            ExprKind::Member {
                object: Box::new(alias),
                property: canonical.to_string(),
            },
            span,
        )
    }

    fn is_unbound(&self, name: &str) -> bool {
        !name.starts_with("__") && !self.scope.is_bound(name)
    }

    /// Resolve `name.property` where `name` is not bound by the script.
    fn resolve_member(&mut self, name: &str, property: &str, role: Role, span: Span) -> Option<Expr> {
        let api = self.api;
        for kind in NamespaceKind::PRIORITY {
            let table = api.namespace(kind);
            let Some(canonical) = table.resolve(name) else {
                continue;
            };
            if kind == NamespaceKind::Enums {
                // Enum values are never called
                if role == Role::Callee {
                    continue;
                }
                let Some(member) = table.resolve_property(canonical, property) else {
                    tracing::warn!("unknown value \"{property}\" of enum {canonical}");
                    return None;
                };
                return Some(Expr::member(self.qualify(kind, canonical, span), member));
            }
            let property = table.resolve_property(canonical, property).unwrap_or(property);
            return Some(Expr::member(self.qualify(kind, canonical, span), property));
        }
        None
    }

    /// Resolve a standalone name. Enums only resolve through a member.
    fn resolve_name(&mut self, name: &str, span: Span) -> Option<Expr> {
        let api = self.api;
        NamespaceKind::PRIORITY
            .into_iter()
            .filter(|kind| *kind != NamespaceKind::Enums)
            .find_map(|kind| api.namespace(kind).resolve(name).map(|canonical| (kind, canonical)))
            .map(|(kind, canonical)| self.qualify(kind, canonical, span))
    }

    /// Whether calling `callee` reads an array variable, as in `arr(1)`.
    fn is_array_read(&self, callee: &Expr) -> bool {
        let mut root = callee;
        while let ExprKind::Index { object, .. } = &root.kind {
            root = object;
        }
        let Some(name) = root.as_ident() else {
            return false;
        };
        // Inside a function its own name is a recursive call
        if self.functions.last().is_some_and(|f| f.eq_ignore_ascii_case(name)) {
            return false;
        }
        self.scope
            .lookup(name)
            .is_some_and(|b| matches!(b.kind, BindingKind::Variable | BindingKind::Parameter))
    }

    fn resolve(&mut self, expr: &mut Expr, role: Role) -> Visit<Expr> {
        match &mut expr.kind {
            ExprKind::Member { object, property } => {
                let Some(name) = object.as_ident() else {
                    return Visit::Keep;
                };
                if !self.is_unbound(name) {
                    return Visit::Keep;
                }
                let (name, property) = (name.to_string(), property.clone());
                match self.resolve_member(&name, &property, role, object.span) {
                    Some(resolved) => Visit::Replace(Expr {
                        span: expr.span,
                        ..resolved
                    }),
                    None => Visit::Keep,
                }
            }
            ExprKind::Ident(name) => {
                if name.starts_with("__") || (role == Role::Callee && self.settings.is_execute_global(name)) {
                    return Visit::Keep;
                }
                if let Some(binding) = self.scope.lookup(name) {
                    name.clone_from(&binding.canonical);
                    return Visit::Keep;
                }
                let name = name.clone();
                match self.resolve_name(&name, expr.span) {
                    Some(resolved) => Visit::Replace(resolved),
                    None => Visit::Keep,
                }
            }
            _ => Visit::Keep,
        }
    }

    fn stdlib_primitive<'e>(&self, callee: &'e Expr) -> Option<&'e str> {
        match &callee.kind {
            ExprKind::Member { object, property } if object.as_ident() == Some(self.settings.stdlib_alias.as_str()) => {
                Some(property)
            }
            _ => None,
        }
    }
}

impl Rewrite for ReferenceTransformer<'_> {
    fn enter_function(&mut self, decl: &FunctionDecl) -> Result<(), CompileError> {
        self.scope.push(ScopeTracker::function_frame(decl)?);
        self.functions.push(decl.name.clone());
        Ok(())
    }

    fn leave_function(&mut self, _decl: &FunctionDecl) -> Result<(), CompileError> {
        self.scope.pop();
        self.functions.pop();
        Ok(())
    }

    fn enter_stmt(&mut self, stmt: &mut Stmt) -> Result<Visit<Stmt>, CompileError> {
        self.call_statement = matches!(&stmt.kind, StmtKind::Expr(Expr { kind: ExprKind::Call { .. }, .. }));
        Ok(Visit::Keep)
    }

    fn leave_stmt(&mut self, _stmt: &mut Stmt) -> Result<Visit<Stmt>, CompileError> {
        self.call_statement = false;
        Ok(Visit::Keep)
    }

    fn enter_expr(&mut self, expr: &mut Expr, role: Role) -> Result<Visit<Expr>, CompileError> {
        let visit = self.resolve(expr, role);
        if matches!(visit, Visit::Keep) {
            self.depth += 1;
        }
        Ok(visit)
    }

    fn leave_expr(&mut self, expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        self.depth -= 1;
        // A statement-level call is never an array read
        let statement_level = self.call_statement && self.depth == 0;
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            return Ok(Visit::Keep);
        };

        if !args.is_empty() && !statement_level && self.is_array_read(callee) {
            let object = std::mem::replace(callee.as_mut(), Expr::synthetic(ExprKind::Undefined));
            let indices = std::mem::take(args);
            return Ok(Visit::Replace(Expr {
                span: expr.span,
                ..Expr::index_chain(object, indices)
            }));
        }

        if let Some(primitive) = self.stdlib_primitive(callee) {
            if self.settings.is_get_ref(primitive) {
                args.push(scope_handle());
            } else if self.settings.is_create_object(primitive) {
                args.push(Expr::ident(self.settings.player_alias.clone()));
            }
            return Ok(Visit::Keep);
        }

        if let ExprKind::Ident(name) = &mut callee.kind {
            if self.settings.is_execute_global(name) {
                if let Some(source) = args.first() {
                    let mut inline_args = vec![source.clone()];
                    inline_args.extend(text_file_name(source, self.settings));
                    *args = vec![Expr::helper_call("transpileInline", inline_args)];
                }
                *name = "eval".to_string();
            }
        }
        Ok(Visit::Keep)
    }
}

/// `__name => eval(__name)`: resolves a name in the scope it was created in.
fn scope_handle() -> Expr {
    Expr::synthetic(ExprKind::Arrow {
        params: vec![SCOPE_HANDLE_PARAM.to_string()],
        body: Box::new(Expr::call(Expr::ident("eval"), vec![Expr::ident(SCOPE_HANDLE_PARAM)])),
    })
}

/// The literal file name of a `GetTextFile("name")` call, if `source` is one.
fn text_file_name(source: &Expr, settings: &TranspilerSettings) -> Option<Expr> {
    let ExprKind::Call { callee, args } = &source.kind else {
        return None;
    };
    let name = match &callee.kind {
        ExprKind::Ident(name) | ExprKind::Member { property: name, .. } => name,
        _ => return None,
    };
    if !settings.is_get_text_file(name) {
        return None;
    }
    args.first().filter(|arg| matches!(arg.kind, ExprKind::Str(_))).cloned()
}
