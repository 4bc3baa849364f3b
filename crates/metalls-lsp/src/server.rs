//! Main LSP server implementation.

use std::io::{self, BufRead, Write};

use crossbeam_channel::Receiver;
use lsp_types::{
    ColorProviderCapability, CompletionOptions, DocumentLinkOptions,
    FoldingRangeProviderCapability, HoverProviderCapability, OneOf, SaveOptions,
    ServerCapabilities, SignatureHelpOptions, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, TypeDefinitionProviderCapability,
};

use crate::handlers::semantic_tokens::get_capabilities as get_semantic_tokens_capabilities;
use crate::main_loop::{run_main_loop, MainLoopState};
use crate::toolchain::Toolchain;
use crate::transport::{Transport, TransportError};

/// Capabilities advertised in the `initialize` response.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(false),
            })),
            ..Default::default()
        })),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![
                ".".to_string(), // Struct members
                "[".to_string(), // Attributes
                ">".to_string(), // Pointer members
            ]),
            ..Default::default()
        }),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
            retrigger_characters: None,
            work_done_progress_options: Default::default(),
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_formatting_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        semantic_tokens_provider: Some(get_semantic_tokens_capabilities()),
        document_highlight_provider: Some(OneOf::Left(true)),
        document_link_provider: Some(DocumentLinkOptions {
            resolve_provider: Some(false),
            work_done_progress_options: Default::default(),
        }),
        folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
        color_provider: Some(ColorProviderCapability::Simple(true)),
        ..Default::default()
    }
}

/// The LSP server.
pub struct Server<R, W> {
    transport: Transport<R, W>,
    state: MainLoopState,
    receiver: Receiver<lsp_server::Message>,
}

impl<R: BufRead, W: Write> Server<R, W> {
    /// Create a server speaking over `reader`/`writer` with the default external tools.
    pub fn new(reader: R, writer: W) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            transport: Transport::new(reader, writer),
            state: MainLoopState::new(sender),
            receiver,
        }
    }

    /// Create a server with injected compiler and formatter.
    pub fn with_toolchain(reader: R, writer: W, toolchain: Toolchain) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            transport: Transport::new(reader, writer),
            state: MainLoopState::with_toolchain(sender, toolchain),
            receiver,
        }
    }

    /// Run the server's main loop until `exit` or end of input.
    pub fn run(&mut self) -> Result<(), TransportError> {
        tracing::info!("Starting Metal Language Server v{}", crate::VERSION);

        run_main_loop(&mut self.transport, &mut self.state, &self.receiver)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// The loop state, for inspection after [`Server::run`].
    pub const fn state(&self) -> &MainLoopState {
        &self.state
    }

    /// Consume the server and return the writer.
    pub fn into_writer(self) -> W {
        self.transport.into_writer()
    }
}

/// Start the LSP server using stdio transport.
///
/// Returns whether a `shutdown` request preceded the end of the session.
pub fn start_stdio() -> Result<bool, TransportError> {
    tracing::info!("Starting LSP server on stdio");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut server = Server::new(stdin.lock(), stdout.lock());
    server.run()?;

    Ok(server.state().shutdown_requested)
}
