use std::io::{self, BufWriter, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

use tinyc::bytecode;
use tinyc::dump;
use tinyc::lexer::{self, Lexer};
use tinyc::parser::{ParseError, Parser};

fn main() -> ExitCode {
    install_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{}", report(&err));
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let mut bytes = Vec::new();
    io::stdin()
        .read_to_end(&mut bytes)
        .context("Reading stdin")?;
    let source = lexer::decode_source(bytes).map_err(ParseError::from)?;

    println!("Tokens:");
    let tokens = Lexer::new(&source).inspect(|token| {
        if let Ok(token) = token {
            println!("  {}", dump::format_token(token));
        }
    });
    let program = Parser::new(tokens)?.parse_program()?;

    let mut out = BufWriter::new(io::stdout().lock());
    writeln!(out, "Tree:")?;
    dump::write_tree(&mut out, &program).context("Writing tree")?;

    let bytecode = bytecode::compile(&program);
    if tracing::enabled!(Level::DEBUG) {
        let listing = bytecode.disassemble()?;
        debug!("disassembly:\n{listing}");
    }
    writeln!(out, "Bytecode:")?;
    writeln!(out, "{}", dump::format_bytecode(&bytecode))?;
    out.flush().context("Flushing stdout")?;
    Ok(())
}

fn report(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ParseError>() {
        Some(ParseError::Lex(err)) => format!("Lexer error: {err}"),
        Some(err) => format!("Parser error: {err}"),
        None => format!("Error: {err:#}"),
    }
}

/// Logs go to stderr so stdout carries only the dumps. `RUST_LOG` overrides
/// the default `warn` level.
fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
