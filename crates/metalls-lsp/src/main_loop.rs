//! Main event loop for the LSP server.
//!
//! One message is read, handled and answered before the next is read:
//! - Notifications mutate the document store and caches
//! - Requests run against the current documents and reply through the sender
//! - Outgoing messages queued by a handler are flushed after every message

use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use lsp_types::notification::{
    Cancel, DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument,
    DidOpenTextDocument, DidSaveTextDocument, Exit, Initialized, Notification, PublishDiagnostics,
    SetTrace,
};
use lsp_types::request::{
    ColorPresentationRequest, Completion, DocumentColor, DocumentHighlightRequest,
    DocumentLinkRequest, DocumentSymbolRequest, FoldingRangeRequest, Formatting, GotoDefinition,
    GotoTypeDefinition, GotoTypeDefinitionParams, HoverRequest, Initialize, References, Request,
    SemanticTokensFullDeltaRequest, SemanticTokensFullRequest, SemanticTokensRangeRequest,
    SemanticTokensRefresh, Shutdown, SignatureHelpRequest,
};
use lsp_types::{
    ColorPresentationParams, CompletionParams, DocumentColorParams, DocumentFormattingParams,
    DocumentHighlightParams, DocumentLinkParams, DocumentSymbolParams, FoldingRangeParams,
    GotoDefinitionParams, HoverParams, InitializeParams, InitializeResult,
    PublishDiagnosticsParams, ReferenceParams, SemanticTokensDeltaParams, SemanticTokensParams,
    SemanticTokensRangeParams, ServerInfo, SignatureHelpParams, Uri,
};
use metalls_syntax::SymbolKind;
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::Config;
use crate::db::{cache_key, AnalysisCache, DiagnosticsCache};
use crate::handlers::completion::handle_completion;
use crate::handlers::definition::handle_goto_definition;
use crate::handlers::diagnostics::{group_by_file, tool_failure_diagnostic};
use crate::handlers::document_color::{handle_color_presentation, handle_document_color};
use crate::handlers::document_highlight::handle_document_highlight;
use crate::handlers::document_links::handle_document_links;
use crate::handlers::folding::handle_folding_ranges;
use crate::handlers::formatting::handle_formatting;
use crate::handlers::hover::handle_hover;
use crate::handlers::references::handle_references;
use crate::handlers::semantic_tokens::{
    handle_semantic_tokens, handle_semantic_tokens_delta, handle_semantic_tokens_range,
};
use crate::handlers::signature_help::handle_signature_help;
use crate::handlers::symbols::handle_document_symbols;
use crate::handlers::type_definition::handle_type_definition;
use crate::handlers::utils::uri_to_path;
use crate::server::server_capabilities;
use crate::toolchain::Toolchain;
use crate::transport::{Transport, TransportError};
use crate::vfs::Vfs;
use crate::workspace::WorkspaceResolver;

/// State managed by the main loop.
pub struct MainLoopState {
    /// Virtual file system for open documents.
    pub vfs: Arc<RwLock<Vfs>>,
    /// Sender for outgoing LSP messages.
    pub sender: Sender<lsp_server::Message>,
    /// Per-document analysis results.
    analysis: AnalysisCache,
    /// Compiler results keyed by source and include fingerprint.
    diagnostics: DiagnosticsCache,
    /// Cross-file symbol lookup.
    workspace: WorkspaceResolver,
    config: Config,
    toolchain: Toolchain,
    /// Set when the toolchain was injected and must survive config changes.
    custom_toolchain: bool,
    /// Last semantic tokens result id handed out.
    semantic_result_id: u64,
    /// Whether shutdown was requested.
    pub shutdown_requested: bool,
    /// Whether the exit notification arrived.
    pub exit_requested: bool,
}

impl MainLoopState {
    /// Create a new main loop state using the external tools from the default config.
    pub fn new(sender: Sender<lsp_server::Message>) -> Self {
        let config = Config::default();
        let toolchain = Toolchain::from_config(&config, None);
        Self::build(sender, config, toolchain, false)
    }

    /// Create a state with injected collaborators.
    pub fn with_toolchain(sender: Sender<lsp_server::Message>, toolchain: Toolchain) -> Self {
        Self::build(sender, Config::default(), toolchain, true)
    }

    fn build(
        sender: Sender<lsp_server::Message>,
        config: Config,
        toolchain: Toolchain,
        custom_toolchain: bool,
    ) -> Self {
        Self {
            vfs: Arc::new(RwLock::new(Vfs::new())),
            sender,
            analysis: AnalysisCache::new(),
            diagnostics: DiagnosticsCache::new(),
            workspace: WorkspaceResolver::new(),
            config,
            toolchain,
            custom_toolchain,
            semantic_result_id: 0,
            shutdown_requested: false,
            exit_requested: false,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The workspace root, once known.
    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace.root()
    }

    /// Number of analysis passes run so far.
    pub const fn analysis_computations(&self) -> u64 {
        self.analysis.computations()
    }

    /// Number of workspace files read from disk so far.
    pub const fn disk_reads(&self) -> u64 {
        self.workspace.disk_reads()
    }

    fn next_result_id(&mut self) -> String {
        self.semantic_result_id += 1;
        self.semantic_result_id.to_string()
    }

    /// Handle an LSP message.
    pub fn handle_message(&mut self, msg: lsp_server::Message) {
        match msg {
            lsp_server::Message::Request(req) => self.handle_request(req),
            lsp_server::Message::Notification(notif) => self.handle_notification(notif),
            lsp_server::Message::Response(resp) => {
                // We don't send requests to the client
                tracing::debug!("Ignoring response {:?}", resp.id);
            }
        }
    }

    /// Handle an LSP request (expects response).
    fn handle_request(&mut self, req: lsp_server::Request) {
        let id = req.id.clone();

        if self.shutdown_requested {
            tracing::warn!("Request after shutdown: {}", req.method);
            let response = lsp_server::Response::new_err(
                id,
                lsp_server::ErrorCode::InvalidRequest as i32,
                format!("Server is shutting down, rejecting {}", req.method),
            );
            self.send(lsp_server::Message::Response(response));
            return;
        }

        let method = req.method.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(req)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                tracing::error!("Handler for {} panicked: {}", method, reason);
                Err(format!("Internal error in {method}: {reason}"))
            });

        let response = match result {
            Ok(value) => lsp_server::Response::new_ok(id, value),
            Err(msg) => {
                // Use MethodNotFound only for truly unknown methods,
                // InternalError for handler failures
                let error_code = if msg.starts_with("Unhandled request") {
                    lsp_server::ErrorCode::MethodNotFound
                } else {
                    lsp_server::ErrorCode::InternalError
                };
                lsp_server::Response::new_err(id, error_code as i32, msg)
            }
        };

        self.send(lsp_server::Message::Response(response));
    }

    fn dispatch(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        match req.method.as_str() {
            Initialize::METHOD => self.handle_initialize(req),
            Shutdown::METHOD => {
                tracing::info!("Shutdown requested");
                self.shutdown_requested = true;
                Ok(Value::Null)
            }
            Completion::METHOD => self.handle_completion_request(req),
            HoverRequest::METHOD => self.handle_hover_request(req),
            GotoDefinition::METHOD => self.handle_goto_definition_request(req),
            GotoTypeDefinition::METHOD => self.handle_type_definition_request(req),
            References::METHOD => self.handle_references_request(req),
            Formatting::METHOD => self.handle_formatting_request(req),
            DocumentSymbolRequest::METHOD => self.handle_document_symbols_request(req),
            SignatureHelpRequest::METHOD => self.handle_signature_help_request(req),
            SemanticTokensFullRequest::METHOD => self.handle_semantic_tokens_request(req),
            SemanticTokensFullDeltaRequest::METHOD => {
                self.handle_semantic_tokens_delta_request(req)
            }
            SemanticTokensRangeRequest::METHOD => self.handle_semantic_tokens_range_request(req),
            SemanticTokensRefresh::METHOD => Ok(Value::Null),
            DocumentHighlightRequest::METHOD => self.handle_document_highlight_request(req),
            DocumentLinkRequest::METHOD => self.handle_document_link_request(req),
            FoldingRangeRequest::METHOD => self.handle_folding_range_request(req),
            DocumentColor::METHOD => self.handle_document_color_request(req),
            ColorPresentationRequest::METHOD => self.handle_color_presentation_request(req),
            _ => {
                tracing::warn!("Unhandled request: {}", req.method);
                Err(format!("Unhandled request: {}", req.method))
            }
        }
    }

    /// Handle the initialize request.
    #[allow(deprecated)]
    fn handle_initialize(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: InitializeParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| uri_to_path(&folder.uri))
            .or_else(|| params.root_uri.as_ref().and_then(uri_to_path))
            .or_else(|| params.root_path.as_ref().map(PathBuf::from));

        match &root {
            Some(root) => tracing::info!("Workspace root: {}", root.display()),
            None => tracing::info!("No workspace root"),
        }

        self.config = Config::from_json(params.initialization_options.as_ref());
        self.workspace.set_root(root);
        self.rebuild_toolchain();

        let result = InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: "metalls".to_string(),
                version: Some(crate::VERSION.to_string()),
            }),
        };

        serde_json::to_value(result).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/completion request.
    fn handle_completion_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: CompletionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);

        let response = handle_completion(&params, doc, &analysis);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/hover request.
    fn handle_hover_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: HoverParams = serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);
        let workspace = &mut self.workspace;

        let response = handle_hover(&params, doc, &analysis, |name| {
            workspace.find_definition(&vfs, uri, name)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/definition request.
    fn handle_goto_definition_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: GotoDefinitionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let workspace = &mut self.workspace;

        let response = handle_goto_definition(&params, doc, |name| {
            workspace.find_definition(&vfs, uri, name)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/typeDefinition request.
    fn handle_type_definition_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: GotoTypeDefinitionParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let workspace = &mut self.workspace;

        let response = handle_type_definition(&params, doc, |name| {
            workspace
                .find_definition(&vfs, uri, name)
                .filter(|def| def.kind == SymbolKind::Struct)
                .map(|def| def.location)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/references request.
    fn handle_references_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: ReferenceParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let workspace = &mut self.workspace;

        let response = handle_references(&params, doc, |name, include_declaration| {
            workspace.find_references(&vfs, name, include_declaration)
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/formatting request.
    fn handle_formatting_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: DocumentFormattingParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let vfs = self.vfs.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };

        let response = handle_formatting(&params, doc, self.toolchain.formatter.as_ref());

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentSymbol request.
    fn handle_document_symbols_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<Value, String> {
        let params: DocumentSymbolParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);

        let response = handle_document_symbols(&params, doc, &analysis);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/signatureHelp request.
    fn handle_signature_help_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: SignatureHelpParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);
        let cache = &mut self.analysis;

        let response = handle_signature_help(&params, doc, &analysis, |name| {
            vfs.all_uris()
                .iter()
                .filter(|other| *other != uri)
                .filter_map(|other| vfs.get(other))
                .find_map(|other| cache.get(other).index.function_signatures.get(name).cloned())
        });

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/semanticTokens/full request.
    fn handle_semantic_tokens_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: SemanticTokensParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };
        let result_id = self.next_result_id();
        let analysis = self.analysis.get(doc);

        let response = handle_semantic_tokens(doc, &analysis.tokens, result_id);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/semanticTokens/full/delta request.
    fn handle_semantic_tokens_delta_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<Value, String> {
        let params: SemanticTokensDeltaParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };
        let result_id = self.next_result_id();
        let analysis = self.analysis.get(doc);

        // Previous results are not kept, so the answer is always the full token set.
        let response = handle_semantic_tokens_delta(doc, &analysis.tokens, result_id);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/semanticTokens/range request.
    fn handle_semantic_tokens_range_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<Value, String> {
        let params: SemanticTokensRangeParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);

        let response = handle_semantic_tokens_range(&params, doc, &analysis.tokens);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentHighlight request.
    fn handle_document_highlight_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<Value, String> {
        let params: DocumentHighlightParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let vfs = self.vfs.read();
        let uri = &params.text_document_position_params.text_document.uri;
        let Some(doc) = vfs.get(uri) else {
            return Ok(Value::Null);
        };

        let response = handle_document_highlight(&params, doc);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentLink request.
    fn handle_document_link_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: DocumentLinkParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let vfs = self.vfs.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };

        let response = handle_document_links(&params, doc);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/foldingRange request.
    fn handle_folding_range_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: FoldingRangeParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let store = Arc::clone(&self.vfs);
        let vfs = store.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Null);
        };
        let analysis = self.analysis.get(doc);

        let response = handle_folding_ranges(&params, doc, &analysis);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/documentColor request.
    fn handle_document_color_request(&mut self, req: lsp_server::Request) -> Result<Value, String> {
        let params: DocumentColorParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let vfs = self.vfs.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Array(Vec::new()));
        };

        let response = handle_document_color(&params, doc).unwrap_or_default();

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/colorPresentation request.
    fn handle_color_presentation_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<Value, String> {
        let params: ColorPresentationParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let vfs = self.vfs.read();
        let Some(doc) = vfs.get(&params.text_document.uri) else {
            return Ok(Value::Array(Vec::new()));
        };

        let response = handle_color_presentation(&params, doc);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle an LSP notification (no response expected).
    fn handle_notification(&mut self, notif: lsp_server::Notification) {
        let method = notif.method.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch_notification(notif)));
        if let Err(payload) = outcome {
            tracing::error!(
                "Notification {} panicked: {}",
                method,
                panic_message(payload.as_ref())
            );
        }
    }

    fn dispatch_notification(&mut self, notif: lsp_server::Notification) {
        // Notifications are handled synchronously, in arrival order
        match notif.method.as_str() {
            DidOpenTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidOpenTextDocumentParams>(notif.params)
                {
                    self.on_did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeTextDocumentParams>(notif.params)
                {
                    self.on_did_change(params);
                }
            }
            DidSaveTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidSaveTextDocumentParams>(notif.params)
                {
                    tracing::debug!("Document saved: {}", params.text_document.uri.as_str());
                    self.validate(&params.text_document.uri);
                }
            }
            DidCloseTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidCloseTextDocumentParams>(notif.params)
                {
                    self.on_did_close(params);
                }
            }
            DidChangeConfiguration::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeConfigurationParams>(notif.params)
                {
                    self.on_did_change_configuration(params);
                }
            }
            Initialized::METHOD => {
                tracing::info!("Client initialized");
            }
            Exit::METHOD => {
                tracing::info!("Exit notification received");
                self.exit_requested = true;
            }
            Cancel::METHOD | SetTrace::METHOD => {
                tracing::debug!("Ignoring notification: {}", notif.method);
            }
            _ => {
                tracing::debug!("Unhandled notification: {}", notif.method);
            }
        }
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&mut self, params: lsp_types::DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::info!("Document opened: {}", uri.as_str());

        self.vfs.write().open(
            uri.clone(),
            params.text_document.text,
            params.text_document.version,
        );

        self.validate(&uri);
    }

    /// Handle textDocument/didChange notification.
    fn on_did_change(&mut self, params: lsp_types::DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::debug!("Document changed: {}", uri.as_str());

        let applied =
            self.vfs
                .write()
                .update(&uri, params.content_changes, params.text_document.version);
        if !applied {
            tracing::warn!("Change for unopened document: {}", uri.as_str());
            return;
        }
        self.analysis.evict(&uri);

        if self.config.diagnostics_on_change {
            self.validate(&uri);
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&mut self, params: lsp_types::DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::info!("Document closed: {}", uri.as_str());

        self.vfs.write().close(&uri);
        self.analysis.evict(&uri);
        self.diagnostics.evict(&uri);

        self.send_diagnostics(&uri, Vec::new());
    }

    /// Handle workspace/didChangeConfiguration notification.
    fn on_did_change_configuration(&mut self, params: lsp_types::DidChangeConfigurationParams) {
        self.config = Config::from_json(Some(&params.settings));
        tracing::info!("Configuration changed: {:?}", self.config);

        self.rebuild_toolchain();
        self.workspace.invalidate_files();
        self.diagnostics.clear();
        self.revalidate_open_documents();
    }

    fn rebuild_toolchain(&mut self) {
        if !self.custom_toolchain {
            self.toolchain = Toolchain::from_config(&self.config, self.workspace.root());
        }
    }

    /// Re-validate all open documents.
    fn revalidate_open_documents(&mut self) {
        let uris = self.vfs.read().all_uris();
        for uri in uris {
            tracing::debug!("Revalidating: {}", uri.as_str());
            self.validate(&uri);
        }
    }

    /// Run the compiler over a document (or replay cached results) and publish.
    fn validate(&mut self, uri: &Uri) {
        if !self.config.diagnostics {
            self.send_diagnostics(uri, Vec::new());
            return;
        }

        let Some(text) = self.vfs.read().get_content(uri) else {
            return;
        };
        let base_dir = uri_to_path(uri).and_then(|path| path.parent().map(Path::to_path_buf));
        let key = cache_key(&text, base_dir.as_deref());

        let groups = match self.diagnostics.get(uri, &key) {
            Some(groups) => {
                tracing::debug!("Diagnostics cache hit: {}", uri.as_str());
                groups
            }
            None => {
                tracing::debug!("Diagnostics cache miss: {}", uri.as_str());
                match self.toolchain.compiler.check(&text, uri) {
                    Ok(found) => {
                        let groups = group_by_file(uri, &found);
                        self.diagnostics.store(uri.clone(), key, groups)
                    }
                    Err(e) => {
                        tracing::warn!("Compiler unavailable for {}: {}", uri.as_str(), e);
                        self.send_diagnostics(uri, vec![tool_failure_diagnostic(&e)]);
                        return;
                    }
                }
            }
        };

        for (file, diagnostics) in groups.iter() {
            tracing::debug!(
                "Publishing {} diagnostics for {}",
                diagnostics.len(),
                file.as_str()
            );
            self.send_diagnostics(file, diagnostics.clone());
        }
    }

    /// Send diagnostics to the client.
    fn send_diagnostics(&self, uri: &Uri, diagnostics: Vec<lsp_types::Diagnostic>) {
        let params = PublishDiagnosticsParams {
            uri: uri.clone(),
            diagnostics,
            version: None,
        };

        let notif = lsp_server::Notification::new(PublishDiagnostics::METHOD.to_string(), params);

        self.send(lsp_server::Message::Notification(notif));
    }

    /// Send a message to the client.
    fn send(&self, msg: lsp_server::Message) {
        if let Err(e) = self.sender.send(msg) {
            tracing::error!("Failed to send message: {}", e);
        }
    }
}

impl std::fmt::Debug for MainLoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoopState")
            .field("config", &self.config)
            .field("shutdown_requested", &self.shutdown_requested)
            .field("exit_requested", &self.exit_requested)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Encode an outgoing message, adding the `jsonrpc` member.
pub fn encode_message(msg: &lsp_server::Message) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(msg)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("jsonrpc".to_string(), Value::from("2.0"));
    }
    Ok(value)
}

/// Run the main event loop until `exit` or end of input.
///
/// Malformed frames and undecodable bodies are logged and dropped. Stream
/// failures end the loop with an error.
pub fn run_main_loop<R: BufRead, W: Write>(
    transport: &mut Transport<R, W>,
    state: &mut MainLoopState,
    receiver: &Receiver<lsp_server::Message>,
) -> Result<(), TransportError> {
    tracing::info!("Main loop started");

    while !state.exit_requested {
        let body = match transport.read_message() {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::info!("Input closed");
                break;
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Dropping malformed frame: {}", e);
                continue;
            }
            Err(e) => {
                tracing::error!("Transport failed: {}", e);
                return Err(e);
            }
        };

        match serde_json::from_slice::<lsp_server::Message>(&body) {
            Ok(msg) => state.handle_message(msg),
            Err(e) => tracing::warn!("Dropping undecodable message: {}", e),
        }

        for msg in receiver.try_iter() {
            let written = encode_message(&msg)
                .map_err(TransportError::from)
                .and_then(|value| transport.write_json(&value));
            match written {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => tracing::warn!("Dropping outgoing message: {}", e),
                Err(e) => {
                    tracing::error!("Transport failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    tracing::info!("Main loop ended");
    Ok(())
}
