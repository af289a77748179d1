//! VBScript table scripts to JavaScript.
//!
//! [`script::Transpiler`] runs a table script through the grammar, the
//! ByRef parameter pass and the host reference pass, and emits a JavaScript
//! module bound to the host API described by [`host::HostApi`].

pub mod error;
pub mod host;
pub mod script;
pub mod settings;

pub use host::HostApi;
pub use script::error::CompileError;
pub use script::Transpiler;
pub use settings::TranspilerSettings;
