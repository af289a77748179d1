//! Visit-and-replace traversal over the AST.
//!
//! A [`Rewrite`] is handed each node by mutable reference and answers with a
//! [`Visit`]: keep the node (and descend into it), replace it (the replacement
//! is not visited again), or remove it. Removal is only meaningful for
//! statements; an expression removal is a transform invariant violation.
//!
//! Traversal order is pre-order `enter_*`, children left to right, then
//! post-order `leave_*`. Function and class bodies are bracketed by
//! `enter_function`/`leave_function` and `enter_class`/`leave_class` so a
//! rewrite can push and pop lexical scope.

use super::ast::*;
use super::error::CompileError;

#[derive(Debug)]
pub enum Visit<T> {
    Keep,
    Replace(T),
    Remove,
}

/// Position of an expression relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Value,
    /// The callee of a call or `new` expression.
    Callee,
}

pub trait Rewrite {
    fn enter_stmt(&mut self, _stmt: &mut Stmt) -> Result<Visit<Stmt>, CompileError> {
        Ok(Visit::Keep)
    }

    fn leave_stmt(&mut self, _stmt: &mut Stmt) -> Result<Visit<Stmt>, CompileError> {
        Ok(Visit::Keep)
    }

    fn enter_expr(&mut self, _expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        Ok(Visit::Keep)
    }

    fn leave_expr(&mut self, _expr: &mut Expr, _role: Role) -> Result<Visit<Expr>, CompileError> {
        Ok(Visit::Keep)
    }

    fn enter_function(&mut self, _decl: &FunctionDecl) -> Result<(), CompileError> {
        Ok(())
    }

    fn leave_function(&mut self, _decl: &FunctionDecl) -> Result<(), CompileError> {
        Ok(())
    }

    fn enter_class(&mut self, _decl: &ClassDecl) -> Result<(), CompileError> {
        Ok(())
    }

    fn leave_class(&mut self, _decl: &ClassDecl) -> Result<(), CompileError> {
        Ok(())
    }
}

pub fn rewrite_program<R: Rewrite + ?Sized>(program: &mut Program, r: &mut R) -> Result<(), CompileError> {
    rewrite_block(&mut program.body, r)
}

/// Rewrite a statement list in place, dropping removed statements.
pub fn rewrite_block<R: Rewrite + ?Sized>(stmts: &mut Vec<Stmt>, r: &mut R) -> Result<(), CompileError> {
    let old = std::mem::take(stmts);
    for mut stmt in old {
        if rewrite_stmt(&mut stmt, r)? {
            stmts.push(stmt);
        }
    }
    Ok(())
}

/// Rewrite one statement. Returns `false` if the statement was removed.
pub fn rewrite_stmt<R: Rewrite + ?Sized>(stmt: &mut Stmt, r: &mut R) -> Result<bool, CompileError> {
    match r.enter_stmt(stmt)? {
        Visit::Keep => {}
        Visit::Replace(new) => {
            *stmt = new;
            return Ok(true);
        }
        Visit::Remove => return Ok(false),
    }

    rewrite_stmt_children(stmt, r)?;

    match r.leave_stmt(stmt)? {
        Visit::Keep => Ok(true),
        Visit::Replace(new) => {
            *stmt = new;
            Ok(true)
        }
        Visit::Remove => Ok(false),
    }
}

fn rewrite_stmt_children<R: Rewrite + ?Sized>(stmt: &mut Stmt, r: &mut R) -> Result<(), CompileError> {
    match &mut stmt.kind {
        StmtKind::VarDecl { declarators, .. } => {
            for d in declarators {
                if let Some(init) = &mut d.init {
                    rewrite_expr(init, Role::Value, r)?;
                }
            }
        }
        StmtKind::Function(decl) => rewrite_function(decl, r)?,
        StmtKind::Class(decl) => {
            r.enter_class(decl)?;
            rewrite_block(&mut decl.constructor, r)?;
            for member in &mut decl.members {
                rewrite_function(&mut member.function, r)?;
            }
            r.leave_class(decl)?;
        }
        StmtKind::Expr(expr) => rewrite_expr(expr, Role::Value, r)?,
        StmtKind::If { test, consequent, alternate } => {
            rewrite_expr(test, Role::Value, r)?;
            rewrite_block(consequent, r)?;
            if let Some(alt) = alternate {
                rewrite_block(alt, r)?;
            }
        }
        StmtKind::For { init, test, update, body } => {
            rewrite_expr(init, Role::Value, r)?;
            rewrite_expr(test, Role::Value, r)?;
            rewrite_expr(update, Role::Value, r)?;
            rewrite_block(body, r)?;
        }
        StmtKind::ForOf { target, iterable, body } => {
            rewrite_expr(target, Role::Value, r)?;
            rewrite_expr(iterable, Role::Value, r)?;
            rewrite_block(body, r)?;
        }
        StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
            rewrite_expr(test, Role::Value, r)?;
            rewrite_block(body, r)?;
        }
        StmtKind::Switch { discriminant, cases } => {
            rewrite_expr(discriminant, Role::Value, r)?;
            for case in cases {
                if let Some(test) = &mut case.test {
                    rewrite_expr(test, Role::Value, r)?;
                }
                rewrite_block(&mut case.body, r)?;
            }
        }
        StmtKind::Return(Some(expr)) => rewrite_expr(expr, Role::Value, r)?,
        StmtKind::Return(None) | StmtKind::Break => {}
    }
    Ok(())
}

fn rewrite_function<R: Rewrite + ?Sized>(decl: &mut FunctionDecl, r: &mut R) -> Result<(), CompileError> {
    r.enter_function(decl)?;
    rewrite_block(&mut decl.body, r)?;
    r.leave_function(decl)
}

/// Rewrite an expression tree in place.
pub fn rewrite_expr<R: Rewrite + ?Sized>(expr: &mut Expr, role: Role, r: &mut R) -> Result<(), CompileError> {
    match r.enter_expr(expr, role)? {
        Visit::Keep => {}
        Visit::Replace(new) => {
            *expr = new;
            return Ok(());
        }
        Visit::Remove => return Err(removed_expr(expr)),
    }

    match &mut expr.kind {
        ExprKind::Ident(_)
        | ExprKind::Number(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Undefined
        | ExprKind::This => {}
        ExprKind::Member { object, .. } => rewrite_expr(object, Role::Value, r)?,
        ExprKind::Index { object, index } => {
            rewrite_expr(object, Role::Value, r)?;
            rewrite_expr(index, Role::Value, r)?;
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            rewrite_expr(callee, Role::Callee, r)?;
            for arg in args {
                rewrite_expr(arg, Role::Value, r)?;
            }
        }
        ExprKind::Binary { left, right, .. } => {
            rewrite_expr(left, Role::Value, r)?;
            rewrite_expr(right, Role::Value, r)?;
        }
        ExprKind::Unary { operand, .. } => rewrite_expr(operand, Role::Value, r)?,
        ExprKind::Assign { target, value, .. } => {
            rewrite_expr(target, Role::Value, r)?;
            rewrite_expr(value, Role::Value, r)?;
        }
        ExprKind::Array(items) => {
            for item in items {
                rewrite_expr(item, Role::Value, r)?;
            }
        }
        ExprKind::ArrayPattern(items) => {
            for item in items.iter_mut().flatten() {
                rewrite_expr(item, Role::Value, r)?;
            }
        }
        ExprKind::Arrow { body, .. } => rewrite_expr(body, Role::Value, r)?,
    }

    match r.leave_expr(expr, role)? {
        Visit::Keep => Ok(()),
        Visit::Replace(new) => {
            *expr = new;
            Ok(())
        }
        Visit::Remove => Err(removed_expr(expr)),
    }
}

fn removed_expr(expr: &Expr) -> CompileError {
    CompileError::transform("An expression cannot be removed from its parent", expr.span)
}
