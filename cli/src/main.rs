use clap::{Parser, ValueEnum};
use jlite::ast::ParsingError;
use jlite::error::CompileError;
use jlite::lexer::lex;
use jlite::pipeline::compile;
use jlite::span::Span;
use jlite::{emit, ir3, parser};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Compiles a JLite program to ARM assembly.
#[derive(Parser, Debug)]
#[command(name = "jlite", version, about, long_about = None)]
struct Args {
    /// Source file
    input: PathBuf,

    /// Write the artifact here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Artifact to produce
    #[arg(long, value_enum, default_value_t = Emit::Asm)]
    emit: Emit,

    /// Log filter, e.g. `debug` or `jlite=trace`; falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Emit {
    Asm,
    Ir3,
    Tables,
    Ast,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{location}: {error}")]
    Parse {
        location: String,
        error: ParsingError,
    },

    #[error("{location}: {error}")]
    Compile {
        location: String,
        error: CompileError,
    },
}

fn init_logging(level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// `path:line:col` for errors that carry a span, the bare path otherwise.
fn location(args: &Args, source: &str, span: Option<Span>) -> String {
    match span {
        Some(span) => {
            let (line, col) = span.line_col(source);
            format!("{}:{}:{}", args.input.display(), line, col)
        }
        None => args.input.display().to_string(),
    }
}

fn run(args: &Args) -> Result<String, CliError> {
    let source = std::fs::read_to_string(&args.input).map_err(|source| CliError::Read {
        path: args.input.clone(),
        source,
    })?;

    let mut lex = lex(&source);
    let ast = parser::parse_program(&mut lex).map_err(|error| CliError::Parse {
        location: location(args, &source, error.span()),
        error,
    })?;
    tracing::debug!(classes = ast.classes.len(), "parsed");

    if args.emit == Emit::Ast {
        return Ok(format!("{:#?}\n", ast));
    }

    let compilation = compile(ast).map_err(|error| CliError::Compile {
        location: location(args, &source, error.span()),
        error,
    })?;

    Ok(match args.emit {
        Emit::Asm => emit::emit(&compilation),
        Emit::Ir3 => ir3::dump(&compilation.ir3),
        Emit::Tables => format!("{}\n{}", compilation.class_tables, compilation.symbol_tables),
        Emit::Ast => unreachable!(),
    })
}

fn write_artifact(args: &Args, artifact: &str) -> Result<(), CliError> {
    match &args.output {
        Some(path) => std::fs::write(path, artifact).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        }),
        None => {
            print!("{}", artifact);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    match run(&args).and_then(|artifact| write_artifact(&args, &artifact)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}
