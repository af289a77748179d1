use super::ast::Span;

/// A transpilation error with source location.
///
/// `Lexer` and `Parser` errors are parse errors (malformed source). `Transform`
/// errors mean a pass met an AST shape it cannot classify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexer,
    Parser,
    Transform,
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Lexer,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Parser,
        }
    }

    pub fn transform(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind: ErrorKind::Transform,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Lexer | ErrorKind::Parser)
    }

    /// 1-based line and column of the error start.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        offset_to_line_col(source, self.span.start)
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let (line, col) = self.line_col(source);
        let context = source.lines().nth(line - 1).unwrap_or_default().trim_end();
        format!(
            "[{}] line {}:{}: {}\n    {}",
            match self.kind {
                ErrorKind::Lexer => "lexer",
                ErrorKind::Parser => "parser",
                ErrorKind::Transform => "transform",
            },
            line,
            col,
            self.message,
            context,
        )
    }
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column_are_one_based() {
        let err = CompileError::parser("Unexpected token", Span::new(10, 11));
        assert_eq!(err.line_col("Dim a\nDim (b"), (2, 5));
    }

    #[test]
    fn formats_with_offending_line() {
        let source = "Dim a\nIf a Then\n";
        let err = CompileError::parser("Expected 'End If'", Span::new(source.len(), source.len()));
        let text = err.format_with_source(source);
        assert!(text.starts_with("[parser] line 3:1: Expected 'End If'"));
        assert!(err.is_parse_error());
    }
}
