//! JavaScript source generation.
//!
//! Output follows the conventional generator layout: four-space indentation,
//! single-quoted strings, multi-element array literals one element per line,
//! and parentheses only where operator precedence requires them.

use std::fmt::Write as _;

use super::ast::*;

const INDENT: &str = "    ";

// Operator precedence, loosest first.
const SEQUENCE: u8 = 0;
const ASSIGNMENT: u8 = 1;
const LOGICAL_OR: u8 = 3;
const LOGICAL_AND: u8 = 4;
const BITWISE_XOR: u8 = 6;
const EQUALITY: u8 = 8;
const RELATIONAL: u8 = 9;
const ADDITIVE: u8 = 11;
const MULTIPLICATIVE: u8 = 12;
const EXPONENTIATION: u8 = 13;
const UNARY: u8 = 14;
const POSTFIX: u8 = 16;
const PRIMARY: u8 = 20;

/// Generate a program with top-level statements at column zero.
pub fn generate(program: &Program) -> String {
    generate_body(&program.body, 0)
}

/// Generate a statement list with every line indented `level` times.
/// The first line carries its indentation too.
pub fn generate_body(stmts: &[Stmt], level: usize) -> String {
    let mut generator = Generator {
        out: String::new(),
        level,
    };
    generator.stmt_list(stmts);
    generator.out
}

/// Generate a single expression.
pub fn generate_expr(expr: &Expr) -> String {
    let mut generator = Generator {
        out: String::new(),
        level: 0,
    };
    generator.expr(expr, SEQUENCE);
    generator.out
}

struct Generator {
    out: String,
    level: usize,
}

impl Generator {
    fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push_str(INDENT);
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.indent();
    }

    fn stmt_list(&mut self, stmts: &[Stmt]) {
        for (i, stmt) in stmts.iter().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.indent();
            self.stmt(stmt);
        }
    }

    /// `{`, the statements one level deeper, then `}` on its own line.
    fn block(&mut self, stmts: &[Stmt]) {
        self.out.push_str("{\n");
        self.level += 1;
        for stmt in stmts {
            self.indent();
            self.stmt(stmt);
            self.out.push('\n');
        }
        self.level -= 1;
        self.indent();
        self.out.push('}');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { kind, declarators } => {
                self.out.push_str(match kind {
                    VarKind::Let => "let ",
                    VarKind::Const => "const ",
                });
                for (i, d) in declarators.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&d.name);
                    if let Some(init) = &d.init {
                        self.out.push_str(" = ");
                        self.expr(init, ASSIGNMENT);
                    }
                }
                self.out.push(';');
            }
            StmtKind::Function(decl) => {
                self.out.push_str("function ");
                self.function_tail(&decl.name, decl);
            }
            StmtKind::Class(decl) => self.class(decl),
            StmtKind::Expr(expr) => {
                self.expr(expr, SEQUENCE);
                self.out.push(';');
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => self.if_stmt(test, consequent, alternate.as_deref()),
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.out.push_str("for (");
                self.expr(init, SEQUENCE);
                self.out.push_str("; ");
                self.expr(test, SEQUENCE);
                self.out.push_str("; ");
                self.expr(update, SEQUENCE);
                self.out.push_str(") ");
                self.block(body);
            }
            StmtKind::ForOf { target, iterable, body } => {
                self.out.push_str("for (");
                self.expr(target, POSTFIX);
                self.out.push_str(" of ");
                self.expr(iterable, ASSIGNMENT);
                self.out.push_str(") ");
                self.block(body);
            }
            StmtKind::While { test, body } => {
                self.out.push_str("while (");
                self.expr(test, SEQUENCE);
                self.out.push_str(") ");
                self.block(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.out.push_str("do ");
                self.block(body);
                self.out.push_str(" while (");
                self.expr(test, SEQUENCE);
                self.out.push_str(");");
            }
            StmtKind::Switch { discriminant, cases } => {
                self.out.push_str("switch (");
                self.expr(discriminant, SEQUENCE);
                self.out.push_str(") {");
                for case in cases {
                    self.newline();
                    match &case.test {
                        Some(test) => {
                            self.out.push_str("case ");
                            self.expr(test, SEQUENCE);
                            self.out.push(':');
                        }
                        None => self.out.push_str("default:"),
                    }
                    self.level += 1;
                    for stmt in &case.body {
                        self.newline();
                        self.stmt(stmt);
                    }
                    self.level -= 1;
                }
                self.newline();
                self.out.push('}');
            }
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, SEQUENCE);
                }
                self.out.push(';');
            }
            StmtKind::Break => self.out.push_str("break;"),
        }
    }

    fn if_stmt(&mut self, test: &Expr, consequent: &[Stmt], alternate: Option<&[Stmt]>) {
        self.out.push_str("if (");
        self.expr(test, SEQUENCE);
        self.out.push_str(") ");
        self.block(consequent);
        match alternate {
            None => {}
            Some(
                [Stmt {
                    kind:
                        StmtKind::If {
                            test,
                            consequent,
                            alternate,
                        },
                    ..
                }],
            ) => {
                self.out.push_str(" else ");
                self.if_stmt(test, consequent, alternate.as_deref());
            }
            Some(alternate) => {
                self.out.push_str(" else ");
                self.block(alternate);
            }
        }
    }

    /// `name(params) { body }`
    fn function_tail(&mut self, name: &str, decl: &FunctionDecl) {
        self.out.push_str(name);
        self.out.push('(');
        for (i, param) in decl.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name);
        }
        self.out.push_str(") ");
        self.block(&decl.body);
    }

    fn class(&mut self, decl: &ClassDecl) {
        let _ = write!(self.out, "class {} {{", decl.name);
        self.level += 1;
        if !decl.constructor.is_empty() {
            self.newline();
            self.out.push_str("constructor() ");
            self.block(&decl.constructor);
        }
        for member in &decl.members {
            self.newline();
            match member.kind {
                MethodKind::Method => {}
                MethodKind::Getter => self.out.push_str("get "),
                MethodKind::Setter => self.out.push_str("set "),
            }
            self.function_tail(&member.function.name, &member.function);
        }
        self.level -= 1;
        self.newline();
        self.out.push('}');
    }

    fn expr(&mut self, expr: &Expr, min: u8) {
        let parens = precedence(expr) < min;
        if parens {
            self.out.push('(');
        }
        self.expr_inner(expr);
        if parens {
            self.out.push(')');
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => self.out.push_str(name),
            ExprKind::Number(n) => {
                let _ = write!(self.out, "{n}");
            }
            ExprKind::Str(s) => quote_into(&mut self.out, s),
            ExprKind::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            ExprKind::Null => self.out.push_str("null"),
            ExprKind::Undefined => self.out.push_str("undefined"),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Member { object, property } => {
                self.member_object(object);
                self.out.push('.');
                self.out.push_str(property);
            }
            ExprKind::Index { object, index } => {
                self.member_object(object);
                self.out.push('[');
                self.expr(index, SEQUENCE);
                self.out.push(']');
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, POSTFIX);
                self.args(args);
            }
            ExprKind::New { callee, args } => {
                self.out.push_str("new ");
                // `new (f())()` must not bind the inner call
                let min = if matches!(callee.kind, ExprKind::Call { .. }) {
                    PRIMARY
                } else {
                    POSTFIX
                };
                self.expr(callee, min);
                self.args(args);
            }
            ExprKind::Binary { op, left, right } => {
                let prec = binary_precedence(*op);
                let (left_min, right_min) = match op {
                    BinOp::Pow => (POSTFIX, UNARY),
                    _ => (prec, prec + 1),
                };
                self.expr(left, left_min);
                let _ = write!(self.out, " {} ", binary_operator(*op));
                self.expr(right, right_min);
            }
            ExprKind::Unary { op, operand } => {
                match op {
                    UnaryOp::Neg => {
                        self.out.push('-');
                        if matches!(operand.kind, ExprKind::Unary { op: UnaryOp::Neg, .. })
                            || matches!(operand.kind, ExprKind::Number(n) if n.is_sign_negative())
                        {
                            self.out.push(' ');
                        }
                    }
                    UnaryOp::Not => self.out.push('!'),
                }
                self.expr(operand, UNARY);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target, POSTFIX);
                self.out.push_str(match op {
                    AssignOp::Assign => " = ",
                    AssignOp::AddAssign => " += ",
                });
                self.expr(value, ASSIGNMENT);
            }
            ExprKind::Array(items) => match items.as_slice() {
                [] => self.out.push_str("[]"),
                [item] => {
                    self.out.push('[');
                    self.expr(item, ASSIGNMENT);
                    self.out.push(']');
                }
                items => {
                    self.out.push('[');
                    self.level += 1;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            self.out.push(',');
                        }
                        self.newline();
                        self.expr(item, ASSIGNMENT);
                    }
                    self.level -= 1;
                    self.newline();
                    self.out.push(']');
                }
            },
            ExprKind::ArrayPattern(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if let Some(item) = item {
                        self.expr(item, ASSIGNMENT);
                    }
                }
                // A trailing hole needs its own comma
                if matches!(items.last(), Some(None)) {
                    self.out.push(',');
                }
                self.out.push(']');
            }
            ExprKind::Arrow { params, body } => {
                match params.as_slice() {
                    [param] => self.out.push_str(param),
                    params => {
                        let _ = write!(self.out, "({})", params.join(", "));
                    }
                }
                self.out.push_str(" => ");
                self.expr(body, ASSIGNMENT);
            }
        }
    }

    /// Object of a member or index access. Number literals need parentheses
    /// so the dot is not read as a decimal point.
    fn member_object(&mut self, object: &Expr) {
        if matches!(object.kind, ExprKind::Number(_)) {
            self.out.push('(');
            self.expr_inner(object);
            self.out.push(')');
        } else {
            self.expr(object, POSTFIX);
        }
    }

    fn args(&mut self, args: &[Expr]) {
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg, ASSIGNMENT);
        }
        self.out.push(')');
    }
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Ident(_)
        | ExprKind::Number(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Undefined
        | ExprKind::This
        | ExprKind::Array(_)
        | ExprKind::ArrayPattern(_) => PRIMARY,
        ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } | ExprKind::New { .. } => POSTFIX,
        ExprKind::Binary { op, .. } => binary_precedence(*op),
        ExprKind::Unary { .. } => UNARY,
        ExprKind::Assign { .. } | ExprKind::Arrow { .. } => ASSIGNMENT,
    }
}

fn binary_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => LOGICAL_OR,
        BinOp::And => LOGICAL_AND,
        BinOp::BitXor => BITWISE_XOR,
        BinOp::StrictEq => EQUALITY,
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => RELATIONAL,
        BinOp::Add | BinOp::Sub => ADDITIVE,
        BinOp::Mul | BinOp::Div | BinOp::Mod => MULTIPLICATIVE,
        BinOp::Pow => EXPONENTIATION,
    }
}

fn binary_operator(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::StrictEq => "===",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitXor => "^",
    }
}

fn quote_into(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::parse_source;

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::synthetic(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn neg(operand: Expr) -> Expr {
        Expr::synthetic(ExprKind::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        })
    }

    fn num(n: f64) -> Expr {
        Expr::synthetic(ExprKind::Number(n))
    }

    #[test]
    fn parenthesises_by_precedence() {
        let a = || Expr::ident("a");
        let b = || Expr::ident("b");
        let c = || Expr::ident("c");

        let sum_times = binary(BinOp::Mul, binary(BinOp::Add, a(), b()), c());
        assert_eq!(generate_expr(&sum_times), "(a + b) * c");

        let left_assoc = binary(BinOp::Sub, binary(BinOp::Sub, a(), b()), c());
        assert_eq!(generate_expr(&left_assoc), "a - b - c");

        let right_nested = binary(BinOp::Sub, a(), binary(BinOp::Sub, b(), c()));
        assert_eq!(generate_expr(&right_nested), "a - (b - c)");

        let pow = binary(BinOp::Pow, binary(BinOp::Pow, a(), b()), c());
        assert_eq!(generate_expr(&pow), "(a ** b) ** c");

        let neg_pow = binary(BinOp::Pow, neg(a()), num(2.0));
        assert_eq!(generate_expr(&neg_pow), "(-a) ** 2");

        assert_eq!(generate_expr(&neg(neg(a()))), "- -a");
    }

    #[test]
    fn literals() {
        assert_eq!(generate_expr(&num(1.0)), "1");
        assert_eq!(generate_expr(&num(0.25)), "0.25");
        assert_eq!(generate_expr(&Expr::synthetic(ExprKind::Str("it's\n".into()))), "'it\\'s\\n'");
        assert_eq!(generate_expr(&Expr::member(num(1.0), "x")), "(1).x");
    }

    #[test]
    fn arrays_break_lines_past_one_element() {
        let one = Expr::synthetic(ExprKind::Array(vec![Expr::ident("tmp2")]));
        assert_eq!(generate_expr(&one), "[tmp2]");

        let two = Expr::synthetic(ExprKind::Array(vec![Expr::ident("tmp"), Expr::ident("aKicker")]));
        assert_eq!(generate_expr(&two), "[\n    tmp,\n    aKicker\n]");

        assert_eq!(generate_expr(&Expr::synthetic(ExprKind::Array(Vec::new()))), "[]");
    }

    #[test]
    fn array_patterns_keep_holes() {
        let pattern = |items: Vec<Option<Expr>>| generate_expr(&Expr::synthetic(ExprKind::ArrayPattern(items)));
        assert_eq!(
            pattern(vec![Some(Expr::ident("tmp")), None, Some(Expr::ident("tmp2"))]),
            "[tmp, , tmp2]"
        );
        assert_eq!(pattern(vec![Some(Expr::ident("tmp")), None]), "[tmp, ,]");
        assert_eq!(pattern(vec![None, None]), "[, ,]");
    }

    #[test]
    fn nested_arrays_follow_indentation() {
        let array = Expr::synthetic(ExprKind::Array(vec![num(1.0), num(2.0)]));
        let program = Program {
            body: vec![Stmt::synthetic(StmtKind::If {
                test: Expr::ident("x"),
                consequent: vec![Stmt::expr(Expr::call(Expr::ident("foo"), vec![array]))],
                alternate: None,
            })],
        };
        assert_eq!(generate(&program), "if (x) {\n    foo([\n        1,\n        2\n    ]);\n}");
    }

    #[test]
    fn else_if_chains_flatten() {
        let program = Program {
            body: vec![Stmt::synthetic(StmtKind::If {
                test: Expr::ident("a"),
                consequent: vec![Stmt::expr(Expr::call(Expr::ident("f"), Vec::new()))],
                alternate: Some(vec![Stmt::synthetic(StmtKind::If {
                    test: Expr::ident("b"),
                    consequent: Vec::new(),
                    alternate: Some(vec![Stmt::synthetic(StmtKind::Break)]),
                })]),
            })],
        };
        assert_eq!(
            generate(&program),
            "if (a) {\n    f();\n} else if (b) {\n} else {\n    break;\n}"
        );
    }

    #[test]
    fn switch_labels_align_with_switch() {
        let program = Program {
            body: vec![Stmt::synthetic(StmtKind::Switch {
                discriminant: Expr::ident("x"),
                cases: vec![
                    SwitchCase {
                        test: Some(num(1.0)),
                        body: vec![Stmt::synthetic(StmtKind::Break)],
                    },
                    SwitchCase {
                        test: None,
                        body: vec![
                            Stmt::expr(Expr::call(Expr::ident("f"), Vec::new())),
                            Stmt::synthetic(StmtKind::Break),
                        ],
                    },
                ],
            })],
        };
        assert_eq!(
            generate(&program),
            "switch (x) {\ncase 1:\n    break;\ndefault:\n    f();\n    break;\n}"
        );
    }

    #[test]
    fn loops() {
        let program = Program {
            body: vec![
                Stmt::synthetic(StmtKind::DoWhile {
                    body: vec![Stmt::synthetic(StmtKind::Break)],
                    test: Expr::synthetic(ExprKind::Bool(true)),
                }),
                Stmt::synthetic(StmtKind::ForOf {
                    target: Expr::ident("b"),
                    iterable: Expr::ident("balls"),
                    body: Vec::new(),
                }),
            ],
        };
        assert_eq!(
            generate(&program),
            "do {\n    break;\n} while (true);\nfor (b of balls) {\n}"
        );
    }

    #[test]
    fn classes_and_functions() {
        let getter = FunctionDecl {
            name: "Value".into(),
            kind: ProcKind::PropertyGet,
            params: Vec::new(),
            body: vec![Stmt::synthetic(StmtKind::Return(Some(Expr::ident("v"))))],
            span: Span::default(),
        };
        let method = FunctionDecl {
            name: "Reset".into(),
            kind: ProcKind::Sub,
            params: vec![Param {
                name: "__params".into(),
                mode: PassingMode::ByVal,
                span: Span::default(),
            }],
            body: Vec::new(),
            span: Span::default(),
        };
        let class = ClassDecl {
            name: "Counter".into(),
            constructor: Vec::new(),
            members: vec![
                ClassMember {
                    kind: MethodKind::Getter,
                    function: getter,
                },
                ClassMember {
                    kind: MethodKind::Method,
                    function: method.clone(),
                },
            ],
            span: Span::default(),
        };
        let program = Program {
            body: vec![
                Stmt::synthetic(StmtKind::Class(class)),
                Stmt::synthetic(StmtKind::Function(method)),
            ],
        };
        assert_eq!(
            generate(&program),
            "class Counter {\n    get Value() {\n        return v;\n    }\n    Reset(__params) {\n    }\n}\nfunction Reset(__params) {\n}"
        );
    }

    #[test]
    fn body_indentation() {
        let program = parse_source("Dim a\na = 1").unwrap();
        assert_eq!(generate_body(&program.body, 1), "    let a;\n    a = 1;");
    }

    #[test]
    fn scope_handle_arrow() {
        let arrow = Expr::synthetic(ExprKind::Arrow {
            params: vec!["n".into()],
            body: Box::new(Expr::call(Expr::ident("eval"), vec![Expr::ident("n")])),
        });
        let call = Expr::call(Expr::ident("f"), vec![Expr::synthetic(ExprKind::Str("x".into())), arrow]);
        assert_eq!(generate_expr(&call), "f('x', n => eval(n))");
    }
}
