//! Metal Shading Language Server.
//!
//! Usage:
//!   metalls              # Start LSP server (stdio)
//!   metalls --version    # Print version
//!   metalls --help       # Print help

use std::process::ExitCode;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse simple args (no clap needed for LSP server)
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("metalls {}", metalls_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Metal Shading Language Server");
        println!();
        println!("Usage: metalls [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG       Set log level (e.g., RUST_LOG=metalls=debug)");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var_os("RUST_LOG").is_some()))
        .with_writer(std::io::stderr)
        .init();

    match metalls_lsp::start_stdio() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("Session ended without shutdown");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` when set, otherwise `metalls=info`.
fn log_filter(rust_log_set: bool) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    if rust_log_set {
        return filter;
    }
    match "metalls=info".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}
