//! Lexical scope tracking.
//!
//! The dialect resolves names case-insensitively, so every frame is keyed by
//! the lower-cased name and remembers the declaration's canonical casing.
//! A [`Scope`] is an explicit value threaded through each pass; passes push a
//! frame built by [`ScopeTracker`] when they enter a function and pop it when
//! they leave.

use std::collections::HashMap;

use super::ast::*;
use super::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Variable,
    Parameter,
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub canonical: String,
    pub kind: BindingKind,
}

/// Declarations of one function, class or program body.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bindings: HashMap<String, Binding>,
}

impl Frame {
    /// Declare a name. Redeclaring a parameter as anything else is an error.
    pub fn declare(&mut self, name: &str, kind: BindingKind, span: Span) -> Result<(), CompileError> {
        let key = name.to_ascii_lowercase();
        if let Some(existing) = self.bindings.get(&key) {
            if existing.kind == BindingKind::Parameter || (kind == BindingKind::Parameter) {
                return Err(CompileError::transform(
                    format!("Name redefined: '{name}' is already declared as a parameter"),
                    span,
                ));
            }
        }
        self.bindings.insert(key, Binding { canonical: name.to_string(), kind });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(&name.to_ascii_lowercase())
    }
}

/// A stack of frames; the innermost binding wins.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope holding the program-level frame.
    pub fn for_program(program: &Program) -> Result<Self, CompileError> {
        let mut scope = Self::new();
        scope.push(ScopeTracker::program_frame(program)?);
        Ok(scope)
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// Collects declarations into frames.
pub struct ScopeTracker;

impl ScopeTracker {
    /// Program-level declarations: variables and constants anywhere outside
    /// functions, plus every sub, function and class (all hoisted).
    pub fn program_frame(program: &Program) -> Result<Frame, CompileError> {
        let mut frame = Frame::default();
        collect_block(&program.body, &mut frame)?;
        Ok(frame)
    }

    /// Parameters, locals, and for function kinds the implicit local that
    /// carries the return value.
    pub fn function_frame(decl: &FunctionDecl) -> Result<Frame, CompileError> {
        let mut frame = Frame::default();
        for param in &decl.params {
            frame.declare(&param.name, BindingKind::Parameter, param.span)?;
        }
        if decl.kind.returns_value() {
            frame.declare(&decl.name, BindingKind::Variable, decl.span)?;
        }
        collect_block(&decl.body, &mut frame)?;
        Ok(frame)
    }
}

fn collect_block(stmts: &[Stmt], frame: &mut Frame) -> Result<(), CompileError> {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::VarDecl { declarators, .. } => {
                for d in declarators {
                    frame.declare(&d.name, BindingKind::Variable, stmt.span)?;
                }
            }
            StmtKind::Function(decl) => frame.declare(&decl.name, BindingKind::Function, decl.span)?,
            StmtKind::Class(decl) => frame.declare(&decl.name, BindingKind::Class, decl.span)?,
            StmtKind::If { consequent, alternate, .. } => {
                collect_block(consequent, frame)?;
                if let Some(alt) = alternate {
                    collect_block(alt, frame)?;
                }
            }
            StmtKind::For { body, .. }
            | StmtKind::ForOf { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. } => collect_block(body, frame)?,
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    collect_block(&case.body, frame)?;
                }
            }
            StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Break => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::parse_source;

    #[test]
    fn program_frame_hoists_declarations() {
        let program = parse_source("x = Foo\nSub Foo\nEnd Sub\nIf x Then\nDim Bar\nEnd If").unwrap();
        let frame = ScopeTracker::program_frame(&program).unwrap();
        assert_eq!(frame.get("foo").unwrap().kind, BindingKind::Function);
        assert_eq!(frame.get("FOO").unwrap().canonical, "Foo");
        assert_eq!(frame.get("bar").unwrap().kind, BindingKind::Variable);
        assert!(frame.get("x").is_none());
    }

    #[test]
    fn locals_shadow_globals() {
        let program = parse_source("Dim speed\nFunction Calc(Speed)\nDim tmp\nEnd Function").unwrap();
        let mut scope = Scope::for_program(&program).unwrap();
        let StmtKind::Function(decl) = &program.body[1].kind else { panic!("expected function") };
        scope.push(ScopeTracker::function_frame(decl).unwrap());

        assert_eq!(scope.lookup("SPEED").unwrap().kind, BindingKind::Parameter);
        assert_eq!(scope.lookup("speed").unwrap().canonical, "Speed");
        assert_eq!(scope.lookup("calc").unwrap().kind, BindingKind::Variable);
        assert!(scope.is_bound("TMP"));

        scope.pop();
        assert_eq!(scope.lookup("speed").unwrap().kind, BindingKind::Variable);
        assert_eq!(scope.lookup("calc").unwrap().kind, BindingKind::Function);
    }

    #[test]
    fn dim_redeclaring_a_parameter_is_rejected() {
        let program = parse_source("Sub Foo(x)\nDim x\nEnd Sub").unwrap();
        let StmtKind::Function(decl) = &program.body[0].kind else { panic!("expected function") };
        let err = ScopeTracker::function_frame(decl).unwrap_err();
        assert_eq!(err.kind, crate::script::error::ErrorKind::Transform);
    }
}
