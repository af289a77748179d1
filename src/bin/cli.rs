use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vpx_script::settings::{self, TranspilerSettings};
use vpx_script::{HostApi, Transpiler};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vbs-transpile", about = "Transpile VBScript table scripts to JavaScript", version)]
struct Cli {
    /// Table script to transpile
    script: PathBuf,

    /// Host API snapshot (JSON); without it no names are qualified
    #[arg(long)]
    api: Option<PathBuf>,

    /// Name the generated function is assigned to
    #[arg(long, default_value = "runTableScript")]
    export: String,

    /// Object the export is assigned on (e.g. "window")
    #[arg(long)]
    prefix: Option<String>,

    /// Transpiler settings (JSON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit bare statements instead of the wrapped export
    #[arg(long)]
    inline: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn read_script(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => fail(format!("cannot read {}: {e}", path.display())),
    }
}

fn main() {
    install_tracing();
    let cli = Cli::parse();

    let api = match &cli.api {
        Some(path) => HostApi::load(path).unwrap_or_else(|e| fail(e)),
        None => HostApi::default(),
    };
    let settings = match &cli.settings {
        Some(path) => settings::load_settings(path).unwrap_or_else(|e| fail(e)),
        None => TranspilerSettings::default(),
    };

    let source = read_script(&cli.script);
    let transpiler = Transpiler::new(&api).with_settings(settings);
    let result = if cli.inline {
        transpiler.transpile_inline(&source)
    } else {
        transpiler.transpile(&source, &cli.export, cli.prefix.as_deref())
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{}: {}", cli.script.display(), e.format_with_source(&source));
            process::exit(1);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, format!("{output}\n")) {
                fail(format!("cannot write {}: {e}", path.display()));
            }
            tracing::info!("wrote {}", path.display());
        }
        None => println!("{output}"),
    }
}
