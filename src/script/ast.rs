//! AST node types shared by the VBScript grammar, the transformer passes and
//! the JavaScript code generator.
//!
//! The grammar emits JavaScript-shaped nodes directly, so every later stage
//! works on a single tree. Declaration targets (function, parameter, class and
//! variable names) are plain strings, never [`ExprKind::Ident`] nodes.

/// Alias of the runtime helper object that backs dialect semantics
/// (`__vbs.equals`, `__vbs.dim`, `__vbs.transpileInline`, ...).
pub const HELPER_NAME: &str = "__vbs";

/// Source span for error reporting. Synthesized nodes carry `Span::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A complete table script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `let a, b = 1;` or `const X = 1;`
    VarDecl {
        kind: VarKind,
        declarators: Vec<Declarator>,
    },
    Function(FunctionDecl),
    Class(ClassDecl),
    Expr(Expr),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Option<Vec<Stmt>>,
    },
    /// `for (i = a; i <= b; i += s) { ... }`
    For {
        init: Expr,
        test: Expr,
        update: Expr,
        body: Vec<Stmt>,
    },
    /// `for (x of coll) { ... }`
    ForOf {
        target: Expr,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        test: Expr,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Return(Option<Expr>),
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

/// One `case` label; `test == None` is the `default` label.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// The dialect construct a function declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Sub,
    Function,
    PropertyGet,
    PropertyLet,
    PropertySet,
}

impl ProcKind {
    /// Function kinds return the value assigned to their own name.
    pub fn returns_value(self) -> bool {
        matches!(self, ProcKind::Function | ProcKind::PropertyGet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassingMode {
    ByRef,
    ByVal,
}

/// A formal parameter in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub mode: PassingMode,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub kind: ProcKind,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub kind: MethodKind,
    pub function: FunctionDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub constructor: Vec<Stmt>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    This,
    /// `object.property`
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Array literal.
    Array(Vec<Expr>),
    /// Destructuring target; `None` is a hole.
    ArrayPattern(Vec<Option<Expr>>),
    /// `a => body` with an expression body.
    Arrow {
        params: Vec<String>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    StrictEq,
    And,
    Or,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn synthetic(kind: StmtKind) -> Self {
        Self { kind, span: Span::default() }
    }

    pub fn expr(expr: Expr) -> Self {
        let span = expr.span;
        Self { kind: StmtKind::Expr(expr), span }
    }

    /// `let name = init;` (or `const`)
    pub fn declare(kind: VarKind, name: impl Into<String>, init: Option<Expr>) -> Self {
        Self::synthetic(StmtKind::VarDecl {
            kind,
            declarators: vec![Declarator { name: name.into(), init }],
        })
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn synthetic(kind: ExprKind) -> Self {
        Self { kind, span: Span::default() }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::synthetic(ExprKind::Ident(name.into()))
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        let span = object.span;
        Self::new(
            ExprKind::Member {
                object: Box::new(object),
                property: property.into(),
            },
            span,
        )
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        let span = object.span.merge(index.span);
        Self::new(
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        )
    }

    /// `a(i)(j)` read as array access: `a[i][j]`.
    pub fn index_chain(object: Expr, indices: Vec<Expr>) -> Self {
        indices.into_iter().fold(object, Expr::index)
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        let span = callee.span;
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        )
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let span = target.span.merge(value.span);
        Self::new(
            ExprKind::Assign {
                op: AssignOp::Assign,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        )
    }

    pub fn not(operand: Expr) -> Self {
        let span = operand.span;
        Self::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            span,
        )
    }

    /// `__vbs.<method>(args)`
    pub fn helper_call(method: &str, args: Vec<Expr>) -> Self {
        Self::call(Expr::member(Expr::ident(HELPER_NAME), method), args)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a value can be written back into this expression.
    pub fn is_assignable(&self) -> bool {
        match &self.kind {
            ExprKind::Ident(_) | ExprKind::Index { .. } => true,
            ExprKind::Member { .. } => true,
            _ => false,
        }
    }
}
