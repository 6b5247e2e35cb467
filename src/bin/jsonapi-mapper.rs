//! JSON:API Mapper CLI
//!
//! Command-line interface for linting and inspecting JSON:API documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use jsonapi_mapper::{
    lint, load_document_auto, validate_document, AtomicDocument, Document, DocumentError,
    DocumentKind, FileStatus, Severity, ValidateError,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonapi-mapper")]
#[command(about = "Lint, validate and inspect JSON:API documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint document files (syntax, structure, linkage)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Validate a document against the JSON:API structure
    Validate {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Document grammar (detected from the document by default)
        #[arg(long, value_enum, default_value_t = KindArg::Auto)]
        kind: KindArg,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the HTTP status a document would be written with
    Status {
        /// Document source: file path or URL
        document: String,
    },

    /// Print relationship linkage aggregated over the primary data
    Relationships {
        /// Document source: file path or URL
        document: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the LID map of an atomic operations document
    Lids {
        /// Document source: file path or URL
        document: String,

        /// Assign a server id to a client LID (lid=id, repeatable)
        #[arg(long = "set", value_name = "LID=ID", value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,

        /// Print the updated document instead of the LID map
        #[arg(long)]
        rewrite: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Auto,
    Standard,
    Atomic,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
        Commands::Validate {
            document,
            kind,
            json,
        } => run_validate(&document, kind, json),
        Commands::Status { document } => run_status(&document),
        Commands::Relationships { document, pretty } => run_relationships(&document, pretty),
        Commands::Lids {
            document,
            assignments,
            rewrite,
            pretty,
        } => run_lids(&document, &assignments, rewrite, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((lid, id)) if !lid.is_empty() && !id.is_empty() => {
            Ok((lid.to_string(), id.to_string()))
        }
        _ => Err(format!("expected LID=ID, got \"{}\"", s)),
    }
}

fn load(source: &str) -> Result<Value, u8> {
    load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, u8> {
    serde_json::from_value(value).map_err(|source| {
        eprintln!("Error: {}", DocumentError::InvalidJson { source });
        2u8
    })
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_validate(source: &str, kind: KindArg, json_output: bool) -> Result<(), u8> {
    let doc = load(source)?;
    let kind = match kind {
        KindArg::Auto => DocumentKind::detect(&doc),
        KindArg::Standard => DocumentKind::Standard,
        KindArg::Atomic => DocumentKind::Atomic,
    };

    match validate_document(&doc, kind) {
        Ok(()) => {
            if json_output {
                println!("{}", serde_json::json!({"valid": true, "kind": kind}));
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "kind": kind,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            if json_output {
                println!("{}", serde_json::json!({"valid": false, "error": e.to_string()}));
            } else {
                eprintln!("Error: {}", e);
            }
            Err(e.exit_code() as u8)
        }
    }
}

fn run_status(source: &str) -> Result<(), u8> {
    let value = load(source)?;
    let status = match DocumentKind::detect(&value) {
        DocumentKind::Standard => decode::<Document>(value)?.status(),
        DocumentKind::Atomic => decode::<AtomicDocument>(value)?.status(),
    };
    println!("{}", status);
    Ok(())
}

fn run_relationships(source: &str, pretty: bool) -> Result<(), u8> {
    let doc: Document = decode(load(source)?)?;
    print_json(&doc.relationships(), pretty)
}

fn run_lids(
    source: &str,
    assignments: &[(String, String)],
    rewrite: bool,
    pretty: bool,
) -> Result<(), u8> {
    let mut doc: AtomicDocument = decode(load(source)?)?;

    let mut unknown = Vec::new();
    for (lid, id) in assignments {
        if !doc.update_lid(lid, id) {
            unknown.push(lid.as_str());
        }
    }

    if rewrite {
        print_json(&doc, pretty)?;
    } else {
        print_json(&doc.lid_cache(), pretty)?;
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        for lid in unknown {
            eprintln!("Error: unknown lid: {}", lid);
        }
        Err(1)
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        print_json(&result, true)?;
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
