//! Minimal HTTP/1.1 server standing in for Nexus in integration tests.
//!
//! Serves the search API under `/service/rest/v1/search*` and a single asset
//! body under `/repository/...`. Every request is recorded so tests can assert
//! what was (or was not) sent.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NexusServerOptions {
    /// Status returned by the search endpoint.
    pub search_status: u16,
    /// Content-Type of the search response.
    pub search_content_type: String,
    /// Number of assets reported by the search.
    pub item_count: usize,
    /// Checksum map entries reported for each asset.
    pub checksums: Vec<(String, String)>,
    /// Status returned by the download endpoint.
    pub download_status: u16,
    /// When set, requests must carry `Authorization: Basic <value>` or get 401.
    pub required_auth: Option<String>,
    /// Answer with the component (nested) search shape.
    pub nested: bool,
    /// Continuation token placed in the search response.
    pub continuation_token: Option<String>,
    /// Announce this many extra bytes in Content-Length, then close after the body.
    pub truncate_download_by: usize,
    /// Send the download body one byte per interval.
    pub trickle_download: Option<Duration>,
}

impl Default for NexusServerOptions {
    fn default() -> Self {
        Self {
            search_status: 200,
            search_content_type: "application/json".to_string(),
            item_count: 1,
            checksums: Vec::new(),
            download_status: 200,
            required_auth: None,
            nested: false,
            continuation_token: None,
            truncate_download_by: 0,
            trickle_download: None,
        }
    }
}

impl NexusServerOptions {
    pub fn with_md5(mut self, md5: &str) -> Self {
        self.checksums.push(("md5".to_string(), md5.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub authorization: Option<String>,
}

pub struct NexusServer {
    /// Base URL usable as a server value (e.g. "http://127.0.0.1:12345").
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl NexusServer {
    /// Starts a server in a background thread serving `body` as the asset.
    /// The server runs until the process exits.
    pub fn start(body: Vec<u8>, opts: NexusServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let ctx = Arc::new(Context {
            base_url: base_url.clone(),
            body,
            opts,
            requests: Arc::clone(&requests),
        });
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || handle(stream, &ctx));
            }
        });
        NexusServer { base_url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn search_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.starts_with("/service/rest/v1/search"))
            .collect()
    }

    pub fn download_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.starts_with("/repository/"))
            .collect()
    }
}

struct Context {
    base_url: String,
    body: Vec<u8>,
    opts: NexusServerOptions,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn asset_json(ctx: &Context, index: usize) -> String {
    let checksums: Vec<String> = ctx
        .opts
        .checksums
        .iter()
        .map(|(k, v)| format!("\"{}\": \"{}\"", k, v))
        .collect();
    format!(
        r#"{{"downloadUrl": "{base}/repository/raw-trusted/tool.tgz", "path": "tool.tgz", "id": "asset-{index}", "repository": "raw-trusted", "format": "raw", "checksum": {{{sums}}}, "contentType": "application/x-gzip"}}"#,
        base = ctx.base_url,
        index = index,
        sums = checksums.join(", ")
    )
}

fn search_json(ctx: &Context) -> String {
    let assets: Vec<String> = (0..ctx.opts.item_count).map(|i| asset_json(ctx, i)).collect();
    let items = if ctx.opts.nested {
        format!(r#"{{"name": "tool.tgz", "assets": [{}]}}"#, assets.join(", "))
    } else {
        assets.join(", ")
    };
    let token = match &ctx.opts.continuation_token {
        Some(t) => format!("\"{}\"", t),
        None => "null".to_string(),
    };
    format!(r#"{{"items": [{}], "continuationToken": {}}}"#, items, token)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn respond(stream: &mut std::net::TcpStream, status: u16, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn send_download(stream: &mut std::net::TcpStream, ctx: &Context) {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        ctx.body.len() + ctx.opts.truncate_download_by
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match ctx.opts.trickle_download {
        Some(interval) => {
            for byte in &ctx.body {
                if stream.write_all(std::slice::from_ref(byte)).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(interval);
            }
        }
        None => {
            let _ = stream.write_all(&ctx.body);
        }
    }
}

fn handle(mut stream: std::net::TcpStream, ctx: &Context) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let recorded = parse_request(request);
    ctx.requests.lock().unwrap().push(recorded.clone());

    if let Some(expected) = &ctx.opts.required_auth {
        let ok = recorded
            .authorization
            .as_deref()
            .and_then(|v| v.strip_prefix("Basic "))
            == Some(expected.as_str());
        if !ok {
            respond(&mut stream, 401, "text/plain", b"unauthorized");
            return;
        }
    }

    if recorded.target.starts_with("/service/rest/v1/search") {
        let body = search_json(ctx);
        respond(
            &mut stream,
            ctx.opts.search_status,
            &ctx.opts.search_content_type,
            body.as_bytes(),
        );
    } else if recorded.target.starts_with("/repository/") {
        if ctx.opts.download_status == 200 {
            send_download(&mut stream, ctx);
        } else {
            respond(&mut stream, ctx.opts.download_status, "text/plain", b"error page");
        }
    } else {
        respond(&mut stream, 404, "text/plain", b"not found");
    }
}

fn parse_request(request: &str) -> RecordedRequest {
    let mut lines = request.lines();
    let first = lines.next().unwrap_or("");
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();
    let mut authorization = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("authorization") {
                authorization = Some(value.trim().to_string());
            }
        }
    }
    RecordedRequest {
        method,
        target,
        authorization,
    }
}
