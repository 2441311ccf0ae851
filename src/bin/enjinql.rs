//! Command-line tools for enjinql: grammar dumps and an interactive shell.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use enjinql::config::parse_config;
use enjinql::engine::EnjinQl;
use enjinql::parser::{lexer_json, SYNTAX_EBNF};

#[derive(Parser)]
#[command(name = "enjinql", about = "Enjin Query Language tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the EQL grammar in EBNF form.
    Ebnf,
    /// Print a JSON description of the lexer's token rules.
    Lexer,
    /// Run an interactive EQL shell against a sqlite database.
    Shell {
        /// Path to a JSON source configuration.
        #[arg(long)]
        config: PathBuf,
        /// Database DSN, e.g. sqlite://index.db or sqlite://:memory:
        #[arg(long)]
        dsn: String,
    },
}

fn open_dsn(dsn: &str) -> Result<Connection> {
    let Some(path) = dsn.strip_prefix("sqlite://") else {
        bail!("unsupported DSN {dsn:?}; expected sqlite://<path>");
    };
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    Ok(conn)
}

fn shell(config: PathBuf, dsn: String) -> Result<()> {
    let data = fs::read_to_string(&config)
        .with_context(|| format!("reading config {}", config.display()))?;
    let config = parse_config(&data)?;
    let conn = open_dsn(&dsn)?;
    let eql = EnjinQl::new(config, conn)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "eql> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit" | ".quit" | ".exit") {
            break;
        }

        match eql.perform(line, &[]) {
            Ok((columns, rows)) => {
                writeln!(stdout, "{}", columns.join("\t"))?;
                for row in &rows {
                    let cells: Vec<String> = columns
                        .iter()
                        .map(|c| match row.get(c) {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                            None => String::new(),
                        })
                        .collect();
                    writeln!(stdout, "{}", cells.join("\t"))?;
                }
                writeln!(stdout, "({} rows)", rows.len())?;
            }
            Err(e) => writeln!(stdout, "error: {e}")?,
        }
    }

    eql.close()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Ebnf => println!("{SYNTAX_EBNF}"),
        Command::Lexer => println!("{}", serde_json::to_string_pretty(&lexer_json())?),
        Command::Shell { config, dsn } => shell(config, dsn)?,
    }
    Ok(())
}
