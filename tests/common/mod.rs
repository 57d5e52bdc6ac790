//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use https_proxy::config::{ProxyConfig, TlsConfig};
use https_proxy::lifecycle::{prepare, Shutdown};
use https_proxy::net::ListenerError;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

/// A self-signed `localhost` credential on disk.
pub struct TestCerts {
    _dir: tempfile::TempDir,
    pub tls: TlsConfig,
    pub cert: CertificateDer<'static>,
}

pub fn generate_certs() -> TestCerts {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("localhost.crt");
    let key_path = dir.path().join("localhost.key");
    std::fs::write(&cert_path, generated.cert.pem()).unwrap();
    std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

    TestCerts {
        _dir: dir,
        tls: TlsConfig { cert_path, key_path },
        cert: generated.cert.der().clone(),
    }
}

/// A raw-socket upstream that records what it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
}

impl MockUpstream {
    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Raw requests received, in arrival order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    /// Header lines of the only request received, exactly as sent.
    pub fn request_lines(&self) -> Vec<String> {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        head_lines(&requests[0])
    }
}

/// Start an upstream that answers every request with `respond(raw_request)`.
/// An empty reply closes the connection without answering.
pub async fn start_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    start_programmable_upstream(move |request| {
        let respond = respond.clone();
        async move { respond(&request) }
    })
    .await
}

/// Start an upstream whose replies are produced asynchronously.
pub async fn start_programmable_upstream<F, Fut>(respond: F) -> MockUpstream
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    {
        let requests = requests.clone();
        let connections = connections.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                connections.fetch_add(1, Ordering::SeqCst);
                let requests = requests.clone();
                let respond = respond.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    requests.lock().unwrap().push(request.clone());
                    let reply = respond(request).await;
                    let _ = socket.write_all(&reply).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
    }

    MockUpstream {
        addr,
        requests,
        connections,
    }
}

/// Upstream that echoes the request body back with a 200.
pub async fn start_echo_upstream() -> MockUpstream {
    start_upstream(|request| {
        let body = body_of(request);
        let mut reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        reply.extend_from_slice(body);
        reply
    })
    .await
}

/// Read one request (head plus Content-Length body) from a raw socket.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find_head_end(&buf) {
            let wanted = end + content_length(&buf[..end]);
            if buf.len() >= wanted {
                return buf;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Head lines (request or status line first) of a raw message.
pub fn head_lines(raw: &[u8]) -> Vec<String> {
    let end = find_head_end(raw).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end])
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Body of a raw message.
pub fn body_of(raw: &[u8]) -> &[u8] {
    match find_head_end(raw) {
        Some(end) => &raw[end..],
        None => &[],
    }
}

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
    pub certs: TestCerts,
}

impl TestProxy {
    /// Send raw bytes over TLS and return everything the proxy writes back.
    pub async fn send(&self, request: &[u8]) -> Vec<u8> {
        send_tls(self.addr, &self.certs.cert, request).await
    }

    /// Send a request and parse the response.
    pub async fn exchange(&self, request: &[u8]) -> RawResponse {
        RawResponse::parse(&self.send(request).await)
    }
}

/// Start a proxy in front of `upstream_port`. `configure` may adjust the
/// configuration before startup.
pub async fn start_proxy(upstream_port: u16, configure: impl FnOnce(&mut ProxyConfig)) -> TestProxy {
    let certs = generate_certs();
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.tls = certs.tls.clone();
    config.upstream.host = "127.0.0.1".to_string();
    config.upstream.port = upstream_port;
    configure(&mut config);

    let (server, listener) = prepare(&config).await.map_err(|e| e.to_string()).unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, stop));

    TestProxy {
        addr,
        shutdown,
        handle,
        certs,
    }
}

/// A port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn tls_connector(cert: &CertificateDer<'static>) -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.add(cert.clone()).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Connect over TLS, write `request`, read until the proxy closes.
pub async fn send_tls(addr: SocketAddr, cert: &CertificateDer<'static>, request: &[u8]) -> Vec<u8> {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut tls = tls_connector(cert).connect(server_name, tcp).await.unwrap();
    tls.write_all(request).await.unwrap();
    tls.flush().await.unwrap();

    let mut response = Vec::new();
    match tokio::time::timeout(Duration::from_secs(10), tls.read_to_end(&mut response)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {}
        Ok(Err(e)) => panic!("read failed: {}", e),
        Err(_) => panic!("proxy did not close the connection"),
    }
    response
}

/// A response as it appeared on the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub status_line: String,
    /// Header lines verbatim, in order.
    pub lines: Vec<String>,
    pub body: Vec<u8>,
    /// Interim (1xx) status lines that preceded the final response.
    pub interim: Vec<String>,
}

impl RawResponse {
    pub fn parse(raw: &[u8]) -> Self {
        let mut rest = raw;
        let mut interim = Vec::new();
        loop {
            let mut lines = head_lines(rest);
            assert!(!lines.is_empty(), "empty response: {:?}", String::from_utf8_lossy(raw));
            let status_line = lines.remove(0);
            let status: u16 = status_line
                .split(' ')
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| panic!("bad status line: {}", status_line));
            if (100..200).contains(&status) {
                interim.push(status_line);
                rest = body_of(rest);
                continue;
            }
            return Self {
                status,
                status_line,
                lines,
                body: body_of(rest).to_vec(),
                interim,
            };
        }
    }

    /// Lines whose header name matches `name` (case-insensitive).
    pub fn header_lines(&self, name: &str) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| {
                line.split_once(':')
                    .map(|(n, _)| n.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
            .map(String::as_str)
            .collect()
    }
}
