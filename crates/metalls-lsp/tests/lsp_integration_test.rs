//! End-to-end tests driving the server through its framed transport.
//!
//! Each test scripts a client session into an in-memory buffer, runs the
//! server over it with fake collaborators and inspects the framed output.

use std::fs;
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lsp_types::{DiagnosticSeverity, Uri};
use metalls_lsp::handlers::utils::path_to_uri;
use metalls_lsp::main_loop::MainLoopState;
use metalls_lsp::toolchain::{Compiler, CompilerDiagnostic, Formatter, ToolError};
use metalls_lsp::transport::Transport;
use metalls_lsp::{Server, Toolchain};
use serde_json::{json, Value};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Clone, Default)]
struct FakeCompiler {
    calls: Arc<AtomicUsize>,
    report: Vec<CompilerDiagnostic>,
}

impl Compiler for FakeCompiler {
    fn check(&self, _source: &str, _uri: &Uri) -> Result<Vec<CompilerDiagnostic>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}

struct MissingCompiler;

impl Compiler for MissingCompiler {
    fn check(&self, _source: &str, _uri: &Uri) -> Result<Vec<CompilerDiagnostic>, ToolError> {
        Err(ToolError::Spawn {
            program: "xcrun".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        })
    }
}

struct NoFormatter;

impl Formatter for NoFormatter {
    fn format(&self, _source: &str, _tab_size: u32, _insert_spaces: bool) -> Option<String> {
        None
    }
}

fn toolchain(compiler: impl Compiler + 'static) -> Toolchain {
    Toolchain::new(Box::new(compiler), Box::new(NoFormatter))
}

// ============================================================================
// Session scripting
// ============================================================================

fn frame(value: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(value).unwrap();
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend(body);
    out
}

#[derive(Default)]
struct Session {
    input: Vec<u8>,
    next_id: i64,
}

impl Session {
    fn new() -> Self {
        Self::default()
    }

    fn initialize(&mut self, params: Value) -> i64 {
        let id = self.request("initialize", params);
        self.notify("initialized", json!({}));
        id
    }

    fn request(&mut self, method: &str, params: Value) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.input.extend(frame(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })));
        id
    }

    fn notify(&mut self, method: &str, params: Value) {
        self.input.extend(frame(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        })));
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    fn frame(&mut self, value: &Value) {
        self.input.extend(frame(value));
    }

    fn open(&mut self, uri: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": "metal",
                    "version": 1,
                    "text": text,
                }
            }),
        );
    }

    fn at(&mut self, method: &str, uri: &str, line: u32, character: u32) -> i64 {
        self.request(
            method,
            json!({
                "textDocument": { "uri": uri },
                "position": { "line": line, "character": character },
            }),
        )
    }

    fn shutdown_and_exit(&mut self) -> i64 {
        let id = self.request("shutdown", Value::Null);
        self.notify("exit", Value::Null);
        id
    }

    fn run(self, toolchain: Toolchain) -> Outcome {
        let mut server = Server::with_toolchain(Cursor::new(self.input), Vec::new(), toolchain);
        server.run().unwrap();

        let shutdown_requested = server.state().shutdown_requested;
        let exit_requested = server.state().exit_requested;
        let analysis_computations = server.state().analysis_computations();

        let mut reader = Transport::new(Cursor::new(server.into_writer()), io::sink());
        let mut messages = Vec::new();
        while let Some(body) = reader.read_message().unwrap() {
            messages.push(serde_json::from_slice(&body).unwrap());
        }

        Outcome {
            messages,
            shutdown_requested,
            exit_requested,
            analysis_computations,
        }
    }
}

struct Outcome {
    messages: Vec<Value>,
    shutdown_requested: bool,
    exit_requested: bool,
    analysis_computations: u64,
}

impl Outcome {
    fn response(&self, id: i64) -> Option<&Value> {
        self.messages
            .iter()
            .find(|m| m["id"] == id && (m.get("result").is_some() || m.get("error").is_some()))
    }

    fn result(&self, id: i64) -> &Value {
        let response = self.response(id).unwrap();
        assert!(response.get("error").is_none(), "error response: {response}");
        assert_eq!(response["jsonrpc"], "2.0");
        &response["result"]
    }

    fn error_code(&self, id: i64) -> i64 {
        self.response(id).unwrap()["error"]["code"].as_i64().unwrap()
    }

    /// Every `publishDiagnostics` payload for `uri`, in order.
    fn diagnostics_for(&self, uri: &str) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|m| m["method"] == "textDocument/publishDiagnostics")
            .filter(|m| m["params"]["uri"] == uri)
            .map(|m| &m["params"]["diagnostics"])
            .collect()
    }
}

fn file_uri(path: &Path) -> String {
    path_to_uri(path).unwrap().as_str().to_string()
}

const MAIN: &str = "file:///project/Main.metal";

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_document_symbols_struct_with_field() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(
        MAIN,
        "struct VertexIn { float3 position [[attribute(0)]]; };",
    );
    let id = session.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": MAIN } }),
    );
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let symbols = outcome.result(id).as_array().unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0]["name"], "VertexIn");
    assert_eq!(symbols[0]["kind"], 23); // Struct

    let children = symbols[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["name"], "position");
}

#[test]
fn test_signature_help_second_argument() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(
        MAIN,
        "float4 foo(float3 a, float b){ return float4(a,b); }\nvoid main0() { foo(float3(0.0), 1.0); }\n",
    );
    let id = session.at("textDocument/signatureHelp", MAIN, 1, 33);
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let help = outcome.result(id);
    assert_eq!(help["activeParameter"], 1);
    assert!(help["signatures"][0]["label"]
        .as_str()
        .unwrap()
        .contains("foo("));
}

#[test]
fn test_cross_file_definition_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let decl = dir.path().join("Decl.metal");
    let usage = dir.path().join("Use.metal");
    fs::write(&decl, "float foo(float x) {\n    return x * 2.0;\n}\n").unwrap();
    let use_text = "kernel void k(device float *out [[buffer(0)]]) {\n    out[0] = foo(1.0);\n}\n";
    fs::write(&usage, use_text).unwrap();

    let use_uri = file_uri(&usage);
    let mut session = Session::new();
    session.initialize(json!({
        "capabilities": {},
        "rootUri": file_uri(dir.path()),
    }));
    session.open(&use_uri, use_text);
    let id = session.at("textDocument/definition", &use_uri, 1, 14);
    let hover = session.at("textDocument/hover", &use_uri, 1, 14);
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let location = outcome.result(id);
    assert_eq!(location["uri"], file_uri(&decl));
    assert_eq!(location["range"]["start"]["line"], 0);

    let hover = outcome.result(hover)["contents"]["value"].as_str().unwrap();
    assert!(hover.contains("float foo(float x)"));
}

#[test]
fn test_cross_file_definition_through_binary_operators() {
    let dir = tempfile::tempdir().unwrap();
    let decl = dir.path().join("Decl.metal");
    let usage = dir.path().join("Use.metal");
    fs::write(&decl, "float foo(float x) {\n    return x * 2.0;\n}\n").unwrap();
    let use_text = "kernel void k(device float *out [[buffer(0)]], uint i [[thread_position_in_grid]]) {\n    \
                    float albedo = out[i];\n    \
                    out[i] = albedo * foo(1.0);\n    \
                    bool lit = albedo > foo(0.5);\n}\n";
    fs::write(&usage, use_text).unwrap();

    let use_uri = file_uri(&usage);
    let mut session = Session::new();
    session.initialize(json!({
        "capabilities": {},
        "rootUri": file_uri(dir.path()),
    }));
    session.open(&use_uri, use_text);
    let after_star = session.at("textDocument/definition", &use_uri, 2, 23);
    let after_gt = session.at("textDocument/definition", &use_uri, 3, 25);
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    for id in [after_star, after_gt] {
        let location = outcome.result(id);
        assert_eq!(location["uri"], file_uri(&decl));
        assert_eq!(location["range"]["start"]["line"], 0);
        assert_eq!(location["range"]["start"]["character"], 6);
    }
}

#[test]
fn test_definition_prefers_kernel_over_variable() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(
        MAIN,
        "float foo;\nkernel void foo() {}\nvoid use() { foo(); }\n",
    );
    let id = session.at("textDocument/definition", MAIN, 2, 14);
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    assert_eq!(outcome.result(id)["range"]["start"]["line"], 1);
}

#[test]
fn test_references_are_distinct() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(
        MAIN,
        "float counter;\nvoid a() { counter = 1; }\nvoid b() { counter += counter; }\n",
    );
    let id = session.request(
        "textDocument/references",
        json!({
            "textDocument": { "uri": MAIN },
            "position": { "line": 0, "character": 8 },
            "context": { "includeDeclaration": true },
        }),
    );
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let locations = outcome.result(id).as_array().unwrap();
    assert_eq!(locations.len(), 4);

    let mut starts: Vec<(i64, i64)> = locations
        .iter()
        .map(|l| {
            (
                l["range"]["start"]["line"].as_i64().unwrap(),
                l["range"]["start"]["character"].as_i64().unwrap(),
            )
        })
        .collect();
    starts.sort_unstable();
    starts.dedup();
    assert_eq!(starts.len(), 4);
}

#[test]
fn test_analysis_cache_hit_and_miss() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(MAIN, "struct A { float x; };\n");
    let symbols = json!({ "textDocument": { "uri": MAIN } });
    session.request("textDocument/documentSymbol", symbols.clone());
    session.request("textDocument/documentSymbol", symbols.clone());
    // Same length, different text.
    session.notify(
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": MAIN, "version": 2 },
            "contentChanges": [{
                "range": {
                    "start": { "line": 0, "character": 7 },
                    "end": { "line": 0, "character": 8 },
                },
                "text": "B",
            }],
        }),
    );
    let after = session.request("textDocument/documentSymbol", symbols);
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    assert_eq!(outcome.analysis_computations, 2);
    assert_eq!(outcome.result(after)[0]["name"], "B");
}

#[test]
fn test_diagnostics_cache_tracks_included_header() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("Main.metal");
    let header = dir.path().join("Common.h");
    let text = "#include \"Common.h\"\nkernel void k() {}\n";
    fs::write(&main, text).unwrap();
    fs::write(&header, "float x;\n").unwrap();

    let main_uri = file_uri(&main);
    let header_uri = file_uri(&header);
    let compiler = FakeCompiler {
        calls: Arc::default(),
        report: vec![CompilerDiagnostic {
            uri: header_uri.parse().unwrap(),
            line: 0,
            column: 6,
            severity: DiagnosticSeverity::ERROR,
            message: "redefinition of 'x'".to_string(),
        }],
    };
    let calls = Arc::clone(&compiler.calls);

    let (sender, receiver) = crossbeam_channel::unbounded();
    let mut state = MainLoopState::with_toolchain(sender, toolchain(compiler));
    let notify = |method: &str, params: Value| {
        lsp_server::Message::Notification(lsp_server::Notification::new(
            method.to_string(),
            params,
        ))
    };
    let saved = json!({ "textDocument": { "uri": main_uri } });

    state.handle_message(lsp_server::Message::Request(lsp_server::Request::new(
        1.into(),
        "initialize".to_string(),
        json!({ "capabilities": {}, "rootUri": file_uri(dir.path()) }),
    )));
    state.handle_message(notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {
                "uri": main_uri,
                "languageId": "metal",
                "version": 1,
                "text": text,
            }
        }),
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Nothing changed: replayed from the cache.
    state.handle_message(notify("textDocument/didSave", saved.clone()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Touching the header changes the key although the root text did not.
    fs::write(&header, "float x;\nfloat y;\n").unwrap();
    state.handle_message(notify("textDocument/didSave", saved));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let published: Vec<Value> = receiver
        .try_iter()
        .filter_map(|msg| match msg {
            lsp_server::Message::Notification(n) if n.method == "textDocument/publishDiagnostics" => {
                Some(n.params)
            }
            _ => None,
        })
        .collect();

    // The root document is cleared each time, the header carries the error.
    let root: Vec<&Value> = published.iter().filter(|p| p["uri"] == main_uri).collect();
    assert_eq!(root.len(), 3);
    assert!(root.iter().all(|p| p["diagnostics"].as_array().unwrap().is_empty()));

    let headers: Vec<&Value> = published.iter().filter(|p| p["uri"] == header_uri).collect();
    assert_eq!(headers.len(), 3);
    assert_eq!(headers[0]["diagnostics"][0]["message"], "redefinition of 'x'");
    assert_eq!(headers[0]["diagnostics"][0]["source"], "metal");
    assert_eq!(headers[0]["diagnostics"][0]["range"]["start"]["character"], 6);
}

#[test]
fn test_compiler_failure_becomes_warning() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(MAIN, "kernel void k() {}\n");
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(MissingCompiler));
    let published = outcome.diagnostics_for(MAIN);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0][0]["severity"], 2); // Warning
    assert!(published[0][0]["message"]
        .as_str()
        .unwrap()
        .contains("failed to run xcrun"));
}

#[test]
fn test_diagnostics_disabled_publishes_empty() {
    let compiler = FakeCompiler::default();
    let calls = Arc::clone(&compiler.calls);

    let mut session = Session::new();
    session.initialize(json!({
        "capabilities": {},
        "initializationOptions": { "diagnostics": false },
    }));
    session.open(MAIN, "kernel void k() {}\n");
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(compiler));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let published = outcome.diagnostics_for(MAIN);
    assert_eq!(published.len(), 1);
    assert!(published[0].as_array().unwrap().is_empty());
}

#[test]
fn test_formatting_falls_back_to_indentation() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(MAIN, "kernel void k() {\nfloat x = 1.0;\n}\n");
    let id = session.request(
        "textDocument/formatting",
        json!({
            "textDocument": { "uri": MAIN },
            "options": { "tabSize": 4, "insertSpaces": true },
        }),
    );
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let edits = outcome.result(id).as_array().unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(
        edits[0]["newText"],
        "kernel void k() {\n    float x = 1.0;\n}\n"
    );
}

#[test]
fn test_initialize_advertises_capabilities() {
    let mut session = Session::new();
    let id = session.initialize(json!({ "capabilities": {} }));
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let result = outcome.result(id);
    assert_eq!(result["serverInfo"]["name"], "metalls");
    assert_eq!(result["capabilities"]["textDocumentSync"]["change"], 2);
    assert!(result["capabilities"]["semanticTokensProvider"]["legend"].is_object());
}

#[test]
fn test_protocol_errors() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    let unknown = session.request("textDocument/notAThing", json!({}));
    // A frame with a broken header and no body, then an undecodable body.
    session.raw(b"Content-Length: abc\r\n\r\n");
    session.frame(&json!({ "foo": 1 }));
    let refresh = session.request("workspace/semanticTokens/refresh", Value::Null);
    let missing = session.at("textDocument/hover", "file:///nowhere.metal", 0, 0);
    let shutdown = session.request("shutdown", Value::Null);
    let late = session.request("textDocument/documentSymbol", json!({}));
    session.notify("exit", Value::Null);
    let after_exit = session.request("shutdown", Value::Null);

    let outcome = session.run(toolchain(FakeCompiler::default()));
    assert_eq!(outcome.error_code(unknown), -32601); // MethodNotFound
    assert_eq!(outcome.result(refresh), &Value::Null);
    assert_eq!(outcome.result(missing), &Value::Null);
    assert_eq!(outcome.result(shutdown), &Value::Null);
    assert_eq!(outcome.error_code(late), -32600); // InvalidRequest
    assert!(outcome.response(after_exit).is_none());
    assert!(outcome.shutdown_requested);
    assert!(outcome.exit_requested);
}

#[test]
fn test_exit_without_shutdown() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.notify("exit", Value::Null);

    let outcome = session.run(toolchain(FakeCompiler::default()));
    assert!(!outcome.shutdown_requested);
    assert!(outcome.exit_requested);
}

#[test]
fn test_close_clears_diagnostics() {
    let mut session = Session::new();
    session.initialize(json!({ "capabilities": {} }));
    session.open(MAIN, "kernel void k() {}\n");
    session.notify(
        "textDocument/didClose",
        json!({ "textDocument": { "uri": MAIN } }),
    );
    let id = session.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": MAIN } }),
    );
    session.shutdown_and_exit();

    let outcome = session.run(toolchain(FakeCompiler::default()));
    let published = outcome.diagnostics_for(MAIN);
    assert_eq!(published.len(), 2);
    assert!(published[1].as_array().unwrap().is_empty());
    assert_eq!(outcome.result(id), &Value::Null);
}
