// crates/csig-canary-providers/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Local HTTP server and transport builders for provider tests.
// ============================================================================

//! Shared helpers for csig-canary-providers integration tests.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only helpers may panic on setup failure."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::thread;

use csig_canary_providers::HttpTransport;
use csig_canary_providers::HttpTransportConfig;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Canned route answered by the local server.
#[derive(Clone)]
pub struct Route {
    /// Status code.
    pub status: u16,
    /// Extra headers as (name, value).
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl Route {
    /// 200 with a body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Redirect to `location`.
    pub fn redirect(status: u16, location: &str) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.to_string())],
            body: Vec::new(),
        }
    }
}

/// Starts a server answering `routes` by path; unknown paths answer 404.
///
/// Returns the base URL and the thread handle. The server stops after
/// `requests` requests.
pub fn serve(routes: BTreeMap<String, Route>, requests: usize) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        for _ in 0 .. requests {
            let Ok(request) = server.recv() else {
                return;
            };
            let route = routes.get(request.url()).cloned().unwrap_or(Route {
                status: 404,
                headers: Vec::new(),
                body: b"not found".to_vec(),
            });
            let mut response = Response::from_data(route.body).with_status_code(route.status);
            for (name, value) in route.headers {
                response = response
                    .with_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
            }
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}"), handle)
}

/// Transport allowed to talk to the local server.
pub fn local_transport(config: HttpTransportConfig) -> HttpTransport {
    HttpTransport::new(HttpTransportConfig {
        allow_http: true,
        allowed_hosts: Some(BTreeSet::from(["127.0.0.1".to_string()])),
        ..config
    })
    .unwrap()
}
