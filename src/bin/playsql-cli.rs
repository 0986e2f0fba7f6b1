//! playsql interactive shell
//!
//! Runs SQL against an in-memory store.
//!
//! ```bash
//! # Start interactive REPL
//! playsql-cli
//!
//! # Execute a single command
//! playsql-cli -c "CREATE TABLE t (n INTEGER); INSERT INTO t (n) VALUES (1); SELECT * FROM t"
//!
//! # Execute a script, printing JSON envelopes
//! playsql-cli -f seed.sql --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use playsql::sql::token::TokenType;
use playsql::{tokenize, Engine, EngineConfig, MemoryStore, QueryResult, Value};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// playsql command-line interface
#[derive(Parser, Debug)]
#[command(name = "playsql-cli", version, about = "Interactive SQL shell over an in-memory store")]
struct Args {
    /// Execute the given SQL (statements separated by ';') and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Execute SQL statements from a file and exit
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Engine configuration as JSON (limits default to unlimited)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Caller identity charged by the rate limiter
    #[arg(long, default_value = playsql::DEFAULT_CALLER)]
    caller: String,

    /// Print results as JSON envelopes instead of tables
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::unlimited(),
    };
    let engine = Engine::new(MemoryStore::new(), config);
    let shell = Shell {
        engine,
        caller: args.caller.clone(),
        json: args.json,
    };

    if let Some(command) = &args.command {
        shell.run_script(command).await
    } else if let Some(file) = &args.file {
        let script = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        shell.run_script(&script).await
    } else {
        shell.repl().await
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("playsql=debug")
        } else {
            EnvFilter::new("playsql=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

struct Shell {
    engine: Engine<MemoryStore>,
    caller: String,
    json: bool,
}

impl Shell {
    async fn run_script(&self, script: &str) -> Result<()> {
        for sql in split_statements(script)? {
            self.execute(&sql).await?;
        }
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let result = self.engine.execute_as(&self.caller, sql).await;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            display_result(&result);
        }
        Ok(())
    }

    async fn repl(&self) -> Result<()> {
        println!("playsql v{}", VERSION);
        println!("Type '.help' for help, '.exit' to quit\n");
        info!("starting interactive shell");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        let mut pending = String::new();

        loop {
            let prompt = if pending.is_empty() { "playsql> " } else { "      -> " };
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => break,
            };
            let input = line.trim();

            if input.starts_with('.') {
                if !pending.is_empty() {
                    eprintln!("Warning: incomplete SQL statement discarded");
                    pending.clear();
                }
                match input {
                    ".exit" | ".quit" => break,
                    ".help" => print_interactive_help(),
                    ".tables" => self.execute("SHOW TABLES").await?,
                    cmd if cmd.starts_with(".schema ") => {
                        let table = cmd[".schema ".len()..].trim();
                        self.execute(&format!("DESCRIBE {}", table)).await?;
                    }
                    _ => {
                        eprintln!("Unknown command: {}", input);
                        println!("Type '.help' for available commands");
                    }
                }
                continue;
            }

            if input.is_empty() {
                continue;
            }

            pending.push_str(input);
            pending.push('\n');

            // Statements run once terminated by ';'
            if input.ends_with(';') {
                let script = std::mem::take(&mut pending);
                match split_statements(&script) {
                    Ok(statements) => {
                        for sql in statements {
                            self.execute(&sql).await?;
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }
}

/// Split a script on top-level ';' using token spans, so semicolons inside
/// string literals and comments are left alone
fn split_statements(script: &str) -> Result<Vec<String>> {
    let tokens = tokenize(script)?;
    let mut statements = Vec::new();
    let mut start = 0;

    for token in &tokens {
        if matches!(token.token_type, TokenType::Semicolon | TokenType::Eof) {
            let sql = script[start..token.offset].trim();
            if !sql.is_empty() {
                statements.push(sql.to_string());
            }
            start = token.end;
        }
    }

    Ok(statements)
}

fn display_result(result: &QueryResult) {
    if !result.success {
        let kind = result
            .error_kind
            .map(|k| format!("{:?}", k))
            .unwrap_or_else(|| "Error".into());
        eprintln!("{}: {}", kind, result.message.as_deref().unwrap_or(""));
        return;
    }

    if let (Some(columns), Some(rows)) = (&result.columns, &result.rows) {
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| format_value(row.get(c).unwrap_or(&Value::Null)))
                    .collect()
            })
            .collect();
        display_table(columns, &cells);
        println!("{} row(s) returned ({} ms)", rows.len(), result.execution_time_ms);
    } else if let Some(message) = &result.message {
        println!("{} ({} ms)", message, result.execution_time_ms);
    }

    if let Some(warning) = &result.warning {
        eprintln!("Warning: {}", warning);
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Real(f) => format!("{:.2}", f),
        Value::Text(s) if s.chars().count() > 50 => {
            let head: String = s.chars().take(47).collect();
            format!("{}...", head)
        }
        other => other.to_string(),
    }
}

fn display_table(columns: &[String], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("No results");
        return;
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let border = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        println!("{}{}{}", left, segments.join(mid), right);
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!(" {:width$} ", cell, width = width))
            .collect();
        println!("│{}│", padded.join("│"));
    };

    border("┌", "┬", "┐");
    line(columns);
    border("├", "┼", "┤");
    for row in rows {
        line(row);
    }
    border("└", "┴", "┘");
}

fn print_interactive_help() {
    println!(
        r#"
Special commands:
  .help              Show this help
  .exit, .quit       Leave the shell
  .tables            List all tables
  .schema <table>    Describe a table

SQL examples:
  CREATE TABLE users (name TEXT NOT NULL, email TEXT UNIQUE, age INTEGER);
  CREATE INDEX idx_email ON users (email);
  INSERT INTO users (name, email, age) VALUES ('Alice', 'alice@example.com', 30);
  SELECT name, age FROM users WHERE email LIKE '%@example.com' ORDER BY age DESC;
  SELECT age, COUNT(*) AS n FROM users GROUP BY age HAVING n > 1;
  UPDATE users SET age = 31 WHERE name = 'Alice';
  DELETE FROM users WHERE id = 1;
"#
    );
}
