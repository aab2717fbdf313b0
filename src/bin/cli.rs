// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable, clippy::indexing_slicing)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use sheet_sense::assistant::Assistant;
use sheet_sense::document::workbook::Workbook;
use sheet_sense::document::DocumentContext;
use sheet_sense::error::AppError;
use sheet_sense::executor::{execute, ExecutionReport};
use sheet_sense::llm::HttpModelClient;
use sheet_sense::parser::{parse_response, ParsedBatch};
use sheet_sense::prompt::{compose, UserInput};
use sheet_sense::schema::catalog::{self, ActionCatalog};
use sheet_sense::settings::{self, AppSettings};
use sheet_sense::translate::Translator;
use sheet_sense::transport::{CommandTransport, HttpTransport};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sheetsense-cli", about = "SheetSense headless CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory override
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the action catalog as JSON
    Schema,
    /// Print the instruction that would be sent to the model
    Prompt {
        text: String,
        /// Active sheet name
        #[arg(long)]
        sheet: Option<String>,
        /// Selected range
        #[arg(long)]
        selection: Option<String>,
    },
    /// Parse a canned model reply ("-" reads stdin)
    Parse { file: String },
    /// Parse a canned reply and apply it to a workbook file
    Apply {
        #[arg(long)]
        reply: String,
        #[arg(long)]
        workbook: PathBuf,
        /// Write the workbook back after applying
        #[arg(long)]
        save: bool,
    },
    /// Full cycle: translate TEXT and apply it to a workbook file
    Run {
        text: String,
        #[arg(long)]
        workbook: PathBuf,
        /// Use a running command server instead of calling the model directly
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        save: bool,
    },
}

// ── Helpers ──────────────────────────────────────────────────────

fn fail(e: &AppError) -> ! {
    eprintln!("{}", e.user_message());
    process::exit(1);
}

fn read_input(file: &str) -> String {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fail(&e.into()));
        buf
    } else {
        std::fs::read_to_string(file).unwrap_or_else(|e| fail(&e.into()))
    }
}

fn load_workbook(path: &Path) -> Workbook {
    Workbook::load_or_new(path).unwrap_or_else(|e| fail(&e))
}

fn save_workbook(wb: &Workbook, path: &Path) {
    wb.save(path).unwrap_or_else(|e| fail(&e));
    eprintln!("Saved {}", path.display());
}

fn print_pretty(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn print_parsed(parsed: &ParsedBatch, raw: bool) {
    if raw {
        print_pretty(&serde_json::to_value(parsed).unwrap());
        return;
    }
    println!("{} action(s)", parsed.batch.len());
    for (i, action) in parsed.batch.iter().enumerate() {
        let target = action.target().unwrap_or("<selection>");
        println!("  {i:>2}. {} {target}", action.kind());
    }
    for w in &parsed.warnings {
        eprintln!(
            "  dropped #{} ({}): {}",
            w.index,
            w.raw_type.as_deref().unwrap_or("?"),
            w.message
        );
    }
}

fn print_report(report: &ExecutionReport, raw: bool) {
    if raw {
        print_pretty(&serde_json::to_value(report).unwrap());
        return;
    }
    println!(
        "Executed {} of {} action(s)",
        report.executed.len(),
        report.attempted
    );
    for outcome in &report.executed {
        println!("  ok   #{} {}: {}", outcome.index, outcome.kind, outcome.detail);
    }
    for failure in &report.failures {
        println!("  fail #{} {}: {}", failure.index, failure.kind, failure.message);
    }
    if let Some(e) = &report.commit_error {
        println!("  commit failed: {e}");
    }
}

fn transport_for(server: Option<&str>, loaded: &AppSettings) -> Arc<dyn CommandTransport> {
    let timeout = Duration::from_secs(loaded.request_timeout_secs);
    match server {
        Some(url) => Arc::new(HttpTransport::new(url, timeout).unwrap_or_else(|e| fail(&e))),
        None => {
            let model = HttpModelClient::new(&loaded.llm, timeout).unwrap_or_else(|e| fail(&e));
            Arc::new(Translator::new(Arc::new(model)))
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheet_sense=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let raw = cli.json;

    match cli.command {
        Commands::Schema => print_pretty(&catalog::to_json_schema()),
        Commands::Prompt {
            text,
            sheet,
            selection,
        } => {
            let ctx = DocumentContext {
                active_sheet: sheet,
                selection,
            };
            let payload = compose(&ActionCatalog::builtin(), &ctx, &UserInput::Text(text));
            if raw {
                print_pretty(&json!({ "instruction": payload.instruction }));
            } else {
                println!("{}", payload.instruction);
            }
        }
        Commands::Parse { file } => {
            let parsed = parse_response(&read_input(&file)).unwrap_or_else(|e| fail(&e));
            print_parsed(&parsed, raw);
        }
        Commands::Apply {
            reply,
            workbook,
            save,
        } => {
            let parsed = parse_response(&read_input(&reply)).unwrap_or_else(|e| fail(&e));
            let mut wb = load_workbook(&workbook);
            let ctx = DocumentContext::capture(&wb);
            let report = execute(&mut wb, &ctx, &parsed.batch);
            print_report(&report, raw);
            if save {
                save_workbook(&wb, &workbook);
            }
            if !report.success {
                process::exit(1);
            }
        }
        Commands::Run {
            text,
            workbook,
            server,
            save,
        } => {
            let app_config_dir = cli
                .config_dir
                .unwrap_or_else(sheet_sense::paths::default_config_dir);
            let loaded = settings::resolve_settings(&app_config_dir);
            let assistant = Assistant::new(transport_for(server.as_deref(), &loaded));
            let mut wb = load_workbook(&workbook);

            let outcome = assistant
                .submit(&mut wb, UserInput::Text(text))
                .await
                .unwrap_or_else(|e| fail(&e));
            println!("{}", outcome.summary);
            if let Some(report) = &outcome.report {
                if raw {
                    print_report(report, true);
                }
            }
            if save && outcome.report.is_some() {
                save_workbook(&wb, &workbook);
            }
            if !outcome.is_success() {
                process::exit(1);
            }
        }
    }
}
