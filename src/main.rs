// p8lua: PICO-8 Lua checker, outliner and cross-reference tool

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use p8lua::analysis::symbols::Symbol;
use p8lua::parser::parse::DEFAULT_MAX_DEPTH;
use p8lua::parser::readable::readable;
use p8lua::{parse_with_options, Bounds, Chunk, EncodingMode, ParseOptions};

/// Error-recovering parser and cross-reference index for PICO-8 Lua
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// How string literals are decoded: identity, private-use or discard
    #[arg(long, global = true, default_value = "discard", value_parser = parse_encoding)]
    encoding: EncodingMode,

    /// Nesting ceiling for statements and expressions
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report syntax errors and warnings; fails if any file has errors
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the document outline
    Symbols { file: PathBuf },
    /// Show definitions and usages of the symbol at a position
    Lookup {
        file: PathBuf,
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
    },
    /// Print the syntax tree with readable locations
    Ast { file: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_encoding(name: &str) -> Result<EncodingMode, String> {
    EncodingMode::from_name(name).ok_or_else(|| format!("unknown encoding mode '{}'", name))
}

fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_env("P8LUA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = ParseOptions {
        encoding: args.encoding,
        max_depth: args.max_depth,
        ..ParseOptions::default()
    };

    match &args.command {
        Command::Check { files } => {
            let mut failed = false;
            for file in files {
                let chunk = load(file, &options)?;
                failed |= !chunk.errors.is_empty();
                report(&chunk, args.format)?;
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::Symbols { file } => {
            let chunk = load(file, &options)?;
            match args.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&chunk.symbols)?),
                Format::Text => print_outline(&chunk.symbols, 0),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Lookup { file, line, column } => {
            let chunk = load(file, &options)?;
            let Some(entry) = chunk.definitions_usages.lookup(*line, *column) else {
                eprintln!("no symbol at {}:{}", line, column);
                return Ok(ExitCode::FAILURE);
            };
            match args.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(entry)?),
                Format::Text => {
                    println!("{}", entry.symbol_name);
                    for def in &entry.definitions {
                        println!("  definition {}", location(&chunk, def));
                    }
                    for usage in &entry.usages {
                        println!("  usage      {}", location(&chunk, usage));
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Ast { file } => {
            let chunk = load(file, &options)?;
            let tree = readable(&chunk)?;
            match args.format {
                Format::Json => println!("{}", serde_json::to_string(&tree)?),
                Format::Text => println!("{}", serde_json::to_string_pretty(&tree)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(path: &Path, options: &ParseOptions) -> Result<Chunk> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    tracing::info!(file = %path.display(), "parsing");
    Ok(parse_with_options(&source, &path.to_string_lossy(), options.clone()))
}

#[derive(Serialize)]
struct Diagnostic<'a> {
    file: &'a str,
    severity: &'static str,
    message: &'a str,
    bounds: &'a Bounds,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    include_chain: &'a [String],
}

fn report(chunk: &Chunk, format: Format) -> Result<()> {
    let errors = chunk.errors.iter().map(|err| Diagnostic {
        file: file_name(chunk, &err.bounds),
        severity: "error",
        message: &err.message,
        bounds: &err.bounds,
        include_chain: &err.include_chain,
    });
    let warnings = chunk.warnings.iter().map(|warning| Diagnostic {
        file: file_name(chunk, &warning.bounds),
        severity: "warning",
        message: &warning.message,
        bounds: &warning.bounds,
        include_chain: &[],
    });

    for diagnostic in errors.chain(warnings) {
        match format {
            Format::Json => println!("{}", serde_json::to_string(&diagnostic)?),
            Format::Text => {
                println!(
                    "{}:{}:{}: {}: {}",
                    diagnostic.file,
                    diagnostic.bounds.start.line,
                    diagnostic.bounds.start.column,
                    diagnostic.severity,
                    diagnostic.message
                );
                for including in diagnostic.include_chain {
                    println!("    included from {}", including);
                }
            }
        }
    }
    Ok(())
}

fn print_outline(symbols: &[Symbol], indent: usize) {
    for symbol in symbols {
        println!(
            "{:indent$}{:?} {}{} [{}]",
            "",
            symbol.kind,
            symbol.name,
            symbol.detail.as_deref().unwrap_or(""),
            symbol.full_span,
            indent = indent * 2
        );
        print_outline(&symbol.children, indent + 1);
    }
}

fn file_name<'a>(chunk: &'a Chunk, bounds: &Bounds) -> &'a str {
    chunk.file_name(bounds.file()).unwrap_or("?")
}

fn location(chunk: &Chunk, bounds: &Bounds) -> String {
    format!("{}:{}", file_name(chunk, bounds), bounds)
}
