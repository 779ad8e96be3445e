use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use context::{create_store, SpanStore, TraceQuery, WriteOutcome};
use otlp::{validate_request, ExportTraceRequest};
use provider::format_rows;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{error, warn};

/// Trace store SQL and trace query interface
#[derive(Parser, Debug)]
#[command(name = "tracestore-cli")]
#[command(about = "Trace store SQL and trace query interface", long_about = None)]
struct Args {
    /// Execute a single query and exit
    #[arg(short, long)]
    exec: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Ingest an OTLP/JSON payload file before running queries
    #[arg(short, long)]
    ingest: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=debug
    // rustyline is always set to ERROR level to reduce noise
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("rustyline=error".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    config.validate()?;
    let store = create_store(&config).context("Failed to open span store")?;

    for path in &args.ingest {
        ingest_file(&store, path).await?;
    }

    // If --exec flag is provided, execute the query and exit
    if let Some(line) = args.exec {
        let result = run_line(&store, &line).await?;
        println!("{}", result);
        return Ok(());
    }

    println!("Trace store REPL");
    println!("Type 'exit' or 'quit' to exit, '\\h' for help\n");

    let history_file = get_history_file_path();
    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    if history_file.exists() {
        rl.load_history(&history_file)
            .context("Failed to load history file")?;
    }

    loop {
        match rl.readline("tracestore> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    save_history(&mut rl, &history_file);
                    println!("Goodbye!");
                    break;
                }

                if line == "\\h" {
                    print_help();
                    continue;
                }

                match run_line(&store, line).await {
                    Ok(result) => println!("{}", result),
                    Err(e) => {
                        error!("Query execution failed: {:#}", e);
                        eprintln!("Error: {:#}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                save_history(&mut rl, &history_file);
                error!("Readline error: {:?}", err);
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    store.close();
    Ok(())
}

/// Read, validate and store one OTLP/JSON payload file
async fn ingest_file(store: &SpanStore, path: &PathBuf) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let request: ExportTraceRequest = serde_json::from_slice(&data)
        .with_context(|| format!("{} is not an OTLP/JSON payload", path.display()))?;
    validate_request(&request).with_context(|| format!("Invalid payload in {}", path.display()))?;

    match store.ingest(&request).await {
        WriteOutcome::Written { rows, segment } => {
            println!("Ingested {} spans from {} into {}", rows, path.display(), segment)
        }
        WriteOutcome::Dropped { rows, error } => {
            anyhow::bail!("Failed to store {} spans from {}: {}", rows, path.display(), error)
        }
        WriteOutcome::Skipped => println!("No spans in {}", path.display()),
    }
    Ok(())
}

/// Run one REPL line: `\t [service]`, `\d <trace_id>` or SQL
async fn run_line(store: &SpanStore, line: &str) -> Result<String> {
    if let Some(rest) = line.strip_prefix("\\t") {
        let service = rest.trim();
        let query = TraceQuery {
            service: (!service.is_empty()).then(|| service.to_string()),
            ..Default::default()
        };
        let page = store.search_traces(&query).await?;
        return Ok(serde_json::to_string_pretty(&page)?);
    }

    if let Some(trace_id) = line.strip_prefix("\\d") {
        let lookup = store.trace_detail(trace_id.trim()).await?;
        return Ok(serde_json::to_string_pretty(&lookup)?);
    }

    let result = store.execute_adhoc(line.trim_end_matches(';')).await?;
    let mut output = format_rows(&result.columns, &result.rows);
    if result.truncated {
        output.push_str(&format!("\n(truncated to {} rows)", result.row_count));
    }
    Ok(output)
}

fn get_history_file_path() -> PathBuf {
    // Try to use home directory, otherwise use current directory
    if let Some(home) = dirs::home_dir() {
        home.join(".tracestore_history")
    } else {
        PathBuf::from(".tracestore_history")
    }
}

fn save_history(rl: &mut DefaultEditor, history_file: &PathBuf) {
    rl.save_history(history_file)
        .context("Failed to save history file")
        .unwrap_or_else(|e| {
            warn!("Could not save history: {}", e);
            eprintln!("Warning: Could not save history: {}", e);
        });
}

fn print_help() {
    println!("Trace store REPL Help:");
    println!("  exit, quit       - Exit the REPL");
    println!("  \\h               - Show this help message");
    println!("  \\t [service]     - List the latest traces, optionally for one service");
    println!("  \\d <trace_id>    - Show every span of one trace");
    println!("  <SQL>            - Execute a read-only SQL statement against `spans`");
    println!("\nExample SQL queries:");
    println!("  SELECT * FROM spans LIMIT 10;");
    println!("  SELECT service_name, COUNT(*) FROM spans GROUP BY service_name;");
    println!("  SELECT name FROM spans WHERE attr_str(attributes, 'http.method') = 'GET';");
    println!("  SELECT name, attr_num(attributes, 'http.status_code') AS status FROM spans;");
}
