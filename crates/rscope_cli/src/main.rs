//! rscope: Run scripts and inspect how their names resolve.
//!
//! Usage:
//!   rscope [--config FILE] [--strict] [-v] run <file>
//!   rscope [--config FILE] [--strict] [-v] scopes <file>
//!   rscope init

use clap::{Parser as ClapParser, Subcommand};
use miette::{miette, IntoDiagnostic, WrapErr};
use rscope_binder::VarRef;
use rscope_compiler::{CompileError, CompiledProgram, Compiler};
use rscope_core::LineMap;
use rscope_diagnostics::{Diagnostic, DiagnosticCollection};
use rscope_options::{CompilerOptions, RscopeConfig, CONFIG_FILE_NAME};
use rscope_runtime::{Interpreter, RuntimeError};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(name = "rscope", about = "rscope - scope resolution and execution for scripts", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to an rscope.json file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat every script as strict code.
    #[arg(long, global = true)]
    strict: bool,

    /// Log compiler and runtime activity.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and execute a script, printing its completion value.
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print every scope descriptor and how each identifier resolves.
    Scopes {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Write a default rscope.json to the current directory.
    Init,
}

// ANSI color codes
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match &cli.command {
        Command::Init => run_init()?,
        Command::Run { file } => run_file(&cli, file)?,
        Command::Scopes { file } => run_scopes(&cli, file)?,
    };
    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("RSCOPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Options from the config file (explicit or `rscope.json` in the current
/// directory), with command-line flags applied on top.
fn load_options(cli: &Cli) -> miette::Result<CompilerOptions> {
    let config = match &cli.config {
        Some(path) => rscope_options::parse_config_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read config '{}'", path.display()))?,
        None if Path::new(CONFIG_FILE_NAME).exists() => rscope_options::parse_config_file(CONFIG_FILE_NAME)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", CONFIG_FILE_NAME))?,
        None => RscopeConfig::default(),
    };

    let mut options = config.options();
    if cli.strict {
        options.merge(&CompilerOptions {
            strict: Some(true),
            ..CompilerOptions::default()
        });
    }
    options.validate().into_diagnostic().wrap_err("invalid compiler options")?;
    tracing::debug!(?options, "resolved compiler options");
    Ok(options)
}

fn read_source(file: &Path) -> miette::Result<String> {
    std::fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read '{}'", file.display()))
}

/// Compile `file`, printing its diagnostics. `None` means compilation
/// failed and the error has been reported.
fn compile(compiler: &Compiler, file: &Path) -> miette::Result<Option<(CompiledProgram, LineMap)>> {
    let source = read_source(file)?;
    let file_name = file.to_string_lossy();
    let line_map = LineMap::new(&source);
    match compiler.compile_script(&file_name, &source) {
        Ok(program) => {
            print_diagnostics(&program.diagnostics, &line_map);
            Ok(Some((program, line_map)))
        }
        Err(CompileError::Syntax(diagnostic)) => {
            print_diagnostic(&diagnostic, &line_map, use_color());
            Ok(None)
        }
        Err(err) => Err(miette!("failed to compile '{}': {}", file_name, err)),
    }
}

fn run_file(cli: &Cli, file: &Path) -> miette::Result<i32> {
    let options = load_options(cli)?;
    let mut interpreter = Interpreter::new(options).map_err(|err| miette!("{}", err))?;

    let Some((program, _)) = compile(interpreter.compiler(), file)? else {
        return Ok(2);
    };
    match interpreter.execute(&program.code) {
        Ok(value) => {
            println!("{}", value);
            Ok(0)
        }
        Err(RuntimeError::Uncaught(value)) => {
            print_error(&format!("Uncaught {}", value));
            Ok(1)
        }
        Err(err) => Err(miette!("{}", err)),
    }
}

fn run_scopes(cli: &Cli, file: &Path) -> miette::Result<i32> {
    let compiler = Compiler::new(load_options(cli)?);
    let Some((program, line_map)) = compile(&compiler, file)? else {
        return Ok(2);
    };
    let interner = compiler.interner();
    let bind = &program.bind;
    let color = use_color();

    for (id, scope) in bind.scopes.iter() {
        let names: Vec<&str> = scope
            .table()
            .names()
            .into_iter()
            .map(|name| interner.resolve(name))
            .collect();
        let parent = scope
            .parent()
            .map_or_else(|| "-".to_string(), |parent| parent.to_string());
        let marker = if bind.eval_scopes.contains(&id) { " (direct eval)" } else { "" };
        if color {
            println!(
                "{}{}{} {}{}{} parent={}{}: [{}]",
                BOLD, id, RESET, CYAN, scope.kind(), RESET, parent, marker,
                names.join(", ")
            );
        } else {
            println!("{} {} parent={}{}: [{}]", id, scope.kind(), parent, marker, names.join(", "));
        }
    }

    println!();
    for reference in &bind.reference_log {
        let name = interner.resolve(reference.name);
        let position = position(&line_map, reference.span.start);
        let target = match reference.var_ref {
            VarRef::Static { .. } => reference.var_ref.to_string(),
            VarRef::Dynamic(_) => format!("dynamic (by name from {})", reference.scope),
        };
        if color {
            println!(
                "{}{}{}{}({}){} -> {}",
                BOLD, name, RESET, GRAY, position, RESET, target
            );
        } else {
            println!("{}({}) -> {}", name, position, target);
        }
    }

    tracing::debug!(
        descriptors = bind.scopes.len(),
        references = bind.reference_log.len(),
        "scope report complete"
    );
    Ok(0)
}

fn run_init() -> miette::Result<i32> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() {
        print_error(&format!("A {} file already exists in the current directory.", CONFIG_FILE_NAME));
        return Ok(1);
    }
    std::fs::write(path, rscope_options::default_config_json())
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create {}", CONFIG_FILE_NAME))?;
    println!("Successfully created a {} file.", CONFIG_FILE_NAME);
    Ok(0)
}

/// 1-based `line,column` of a source position.
fn position(line_map: &LineMap, pos: u32) -> String {
    let lc = line_map.line_and_column_of(pos);
    format!("{},{}", lc.line + 1, lc.character + 1)
}

fn print_diagnostics(diagnostics: &DiagnosticCollection, line_map: &LineMap) {
    let color = use_color();
    for diagnostic in diagnostics.diagnostics() {
        print_diagnostic(diagnostic, line_map, color);
    }
}

fn print_diagnostic(diag: &Diagnostic, line_map: &LineMap, use_color: bool) {
    let location = diag.file.as_ref().map(|file| match diag.span {
        Some(span) => format!("{}({})", file, position(line_map, span.start)),
        None => file.clone(),
    });
    if use_color {
        let color = if diag.is_error() { RED } else { YELLOW };
        if let Some(location) = location {
            eprint!("{}{}{}: ", CYAN, location, RESET);
        }
        eprintln!(
            "{}{}{}{} {}RS{}{}: {}",
            BOLD, color, diag.category, RESET, CYAN, diag.code, RESET, diag.message_text
        );
    } else {
        if let Some(location) = location {
            eprint!("{}: ", location);
        }
        eprintln!("{} RS{}: {}", diag.category, diag.code, diag.message_text);
    }
}

fn print_error(msg: &str) {
    if use_color() {
        eprintln!("{}{}error{}: {}", BOLD, RED, RESET, msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

fn use_color() -> bool {
    std::io::stderr().is_terminal()
}
