#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod codegen;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod params;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod references;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod scope;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod visit;

use ast::{Program, Stmt};
use error::CompileError;
use params::ParameterTransformer;
use references::ReferenceTransformer;
use scope::Scope;

use crate::host::HostApi;
use crate::settings::TranspilerSettings;

/// Parse dialect source into the JavaScript-shaped AST.
///
/// source → lex → parse → `Program`
pub fn parse_source(source: &str) -> Result<Program, CompileError> {
    let tokens = lexer::lex(source)?;
    parser::parse(tokens)
}

/// Turns table scripts into JavaScript modules run against a host API.
///
/// Every call is independent: container numbering restarts at `__args0` and
/// the host API is only read.
pub struct Transpiler<'a> {
    api: &'a HostApi,
    settings: TranspilerSettings,
}

impl<'a> Transpiler<'a> {
    pub fn new(api: &'a HostApi) -> Self {
        Self {
            api,
            settings: TranspilerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: TranspilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &TranspilerSettings {
        &self.settings
    }

    /// Transpile a whole script into
    /// `[prefix.]exported = items => { ... };`.
    pub fn transpile(&self, source: &str, exported: &str, prefix: Option<&str>) -> Result<String, CompileError> {
        let program = self.compile(source)?;
        let body = codegen::generate_body(&program.body, 1);

        let target = match prefix {
            Some(prefix) => format!("{prefix}.{exported}"),
            None => exported.to_string(),
        };
        let items = &self.settings.items_alias;
        tracing::debug!(statements = program.body.len(), "transpiled {target}");
        if body.is_empty() {
            Ok(format!("{target} = {items} => {{\n}};"))
        } else {
            Ok(format!("{target} = {items} => {{\n{body}\n}};"))
        }
    }

    /// Transpile a fragment executed at runtime (`ExecuteGlobal`) into bare
    /// statements, evaluated in the caller's scope. A fragment that is not a
    /// statement list but a lone expression (`Eval`) becomes an expression
    /// statement.
    pub fn transpile_inline(&self, source: &str) -> Result<String, CompileError> {
        let program = match self.compile(source) {
            Ok(program) => program,
            Err(err) if err.is_parse_error() => {
                let Ok(expr) = lexer::lex(source).and_then(parser::parse_expression) else {
                    return Err(err);
                };
                self.transform(Program {
                    body: vec![Stmt::expr(expr)],
                })?
            }
            Err(err) => return Err(err),
        };
        Ok(codegen::generate(&program))
    }

    fn compile(&self, source: &str) -> Result<Program, CompileError> {
        self.transform(parse_source(source)?)
    }

    /// scope → parameter pass → reference pass
    fn transform(&self, program: Program) -> Result<Program, CompileError> {
        let mut scope = Scope::for_program(&program)?;
        let program = ParameterTransformer::new(&mut scope).transform(program)?;

        // The parameter pass declares containers; rebuild the program frame
        let mut scope = Scope::for_program(&program)?;
        ReferenceTransformer::new(self.api, &self.settings, &mut scope).transform(program)
    }
}
