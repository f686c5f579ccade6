//! Full-socket tests: a server instance on an ephemeral port, driven by
//! plain blocking clients.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camhttpd::config::ServerConfig;
use camhttpd::handlers::StaticCredentials;
use camhttpd::server::Server;

struct TestServer {
    addr: std::net::SocketAddr,
    flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    fn start(mut config: ServerConfig) -> Self {
        config.bind = "127.0.0.1".parse().unwrap();
        config.port = 0;
        let mut server = Server::bind(
            config,
            Box::new(StaticCredentials::new("admin", "admin")),
        )
        .unwrap();
        let addr = server.local_addr();
        let flag = server.running_flag();
        let handle = thread::spawn(move || server.run());
        Self { addr, flag, handle: Some(handle) }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
    }

    fn request(&self, raw: &[u8]) -> String {
        let mut stream = self.connect();
        stream.write_all(raw).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn post(path: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {path} HTTP/1.1\r\nHost: device\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

#[test]
fn login_roundtrip_over_the_wire() {
    let server = TestServer::start(ServerConfig::default());

    let reply = server.request(&post("/login", r#"{"username":"admin","password":"admin"}"#));
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
    assert!(reply.contains("Content-Type: application/json"));
    assert!(reply.contains(r#""error_code":0"#));
    assert!(reply.contains(r#""user":"admin""#));

    let reply = server.request(&post("/login", r#"{"username":"ghost","password":"x"}"#));
    assert!(reply.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{reply}");
    assert!(reply.contains(r#""error_code":-60502"#));
}

#[test]
fn response_framing_is_complete() {
    let server = TestServer::start(ServerConfig::default());
    let reply = server.request(b"GET /nothing-here HTTP/1.1\r\nHost: x\r\n\r\n");

    let head_end = reply.find("\r\n\r\n").expect("blank line present");
    let head = &reply[..head_end];
    let body = &reply[head_end + 4..];
    let content_length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(content_length, body.len());
    assert!(head.contains("Connection: close"));
    assert!(head.contains("X-Frame-Options: DENY"));
}

#[test]
fn request_split_across_writes_is_reassembled() {
    let server = TestServer::start(ServerConfig::default());
    let raw = post("/login", r#"{"username":"admin","password":"admin"}"#);
    let (first, second) = raw.split_at(raw.len() / 2);

    let mut stream = server.connect();
    stream.write_all(first).unwrap();
    stream.flush().unwrap();
    thread::sleep(Duration::from_millis(100));
    stream.write_all(second).unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    let reply = String::from_utf8_lossy(&out);
    assert!(reply.contains(r#""error_code":0"#), "{reply}");
}

#[test]
fn connection_over_capacity_is_closed_without_bytes() {
    let config = ServerConfig { max_connections: 1, ..ServerConfig::default() };
    let server = TestServer::start(config);

    // First connection takes the only slot.
    let mut first = server.connect();
    thread::sleep(Duration::from_millis(300));

    // Second one must bounce with nothing on the wire.
    let mut second = server.connect();
    let mut out = Vec::new();
    second.read_to_end(&mut out).unwrap();
    assert!(out.is_empty());

    // The occupant still gets serviced.
    first
        .write_all(&post("/login", r#"{"username":"admin","password":"admin"}"#))
        .unwrap();
    let mut reply = Vec::new();
    first.read_to_end(&mut reply).unwrap();
    assert!(String::from_utf8_lossy(&reply).contains(r#""error_code":0"#));
}

#[test]
fn silent_connection_is_evicted_without_a_response() {
    let config = ServerConfig { timeout: Duration::from_secs(1), ..ServerConfig::default() };
    let server = TestServer::start(config);

    let mut stream = server.connect();
    let started = Instant::now();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();

    assert!(out.is_empty());
    // Closed by the sweep, well before the client read timeout.
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[test]
fn incomplete_request_is_evicted_silently() {
    let config = ServerConfig { timeout: Duration::from_secs(1), ..ServerConfig::default() };
    let server = TestServer::start(config);

    let mut stream = server.connect();
    stream.write_all(b"POST /login HTTP/1.1\r\nContent-Le").unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn fallback_page_and_assets_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig { docroot: dir.path().to_path_buf(), ..ServerConfig::default() };
    let server = TestServer::start(config);

    let reply = server.request(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains("Device Login"));

    let reply = server.request(b"GET /func.js HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(reply.starts_with("HTTP/1.1 404"), "{reply}");

    std::fs::write(dir.path().join("func.js"), b"function poll() {}").unwrap();
    let reply = server.request(b"GET /func.js HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains("Content-Type: application/javascript"));
    assert!(reply.contains("function poll() {}"));
}

#[test]
fn single_read_mode_dispatches_first_packet() {
    let config = ServerConfig { single_read: true, ..ServerConfig::default() };
    let server = TestServer::start(config);

    // A complete request in one write still works in compatibility mode.
    let reply = server.request(&post("/login", r#"{"username":"admin","password":"admin"}"#));
    assert!(reply.contains(r#""error_code":0"#), "{reply}");
}
