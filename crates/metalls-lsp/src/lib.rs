//! Language Server Protocol implementation for the Metal Shading Language.
//!
//! This crate provides an LSP server for `.metal` sources, enabling IDE features like:
//! - Compiler diagnostics, including errors reported in included headers
//! - Completion for keywords, builtins, attributes and struct members
//! - Go-to-definition and references across the workspace
//! - Hover, signature help and document symbols
//! - Semantic highlighting, folding, links, colors and formatting
//!
//! # Architecture
//!
//! - **Transport**: `Content-Length` framed JSON-RPC over any reader/writer
//! - **Main loop**: reads one message, handles it, flushes replies
//! - **Caches**: per-document analysis and compiler results, keyed by content hash
//! - **Handlers**: one module per request, pure functions over a document
//!
//! # Example
//!
//! ```no_run
//! use metalls_lsp::Server;
//!
//! let stdin = std::io::stdin();
//! let mut server = Server::new(stdin.lock(), std::io::stdout());
//! server.run().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod db;
pub mod handlers;
pub mod main_loop;
pub mod toolchain;
pub mod transport;
pub mod vfs;
pub mod workspace;

mod server;

pub use config::Config;
pub use main_loop::run_main_loop;
pub use server::{server_capabilities, start_stdio, Server};
pub use toolchain::Toolchain;
pub use vfs::Vfs;

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
