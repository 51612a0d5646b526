//! Scripted HTTP server shared by the upload tests.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: u16,
    body: String,
    delay: Duration,
}

impl Reply {
    pub(crate) fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn after(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReceivedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    /// Header lines, lowercased.
    pub(crate) headers: Vec<String>,
    pub(crate) body: String,
}

impl ReceivedRequest {
    pub(crate) fn has_header(&self, line: &str) -> bool {
        let wanted = line.to_ascii_lowercase();
        self.headers.iter().any(|header| *header == wanted)
    }
}

/// Answers one connection per scripted reply, in order, then stops accepting.
pub(crate) struct StubServer {
    pub(crate) base_url: String,
    accepted: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl StubServer {
    pub(crate) fn spawn(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind stub server");
        let addr = listener.local_addr().expect("stub server addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let accepted_by_thread = Arc::clone(&accepted);
        let received_by_thread = Arc::clone(&received);
        thread::spawn(move || {
            for reply in replies {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                accepted_by_thread.fetch_add(1, Ordering::SeqCst);
                let received = Arc::clone(&received_by_thread);
                thread::spawn(move || serve(stream, reply, &received));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            accepted,
            received,
        }
    }

    pub(crate) fn request_count(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().expect("lock received").clone()
    }
}

fn serve(stream: TcpStream, reply: Reply, received: &Mutex<Vec<ReceivedRequest>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut reader = BufReader::new(&stream);
    if let Ok(request) = read_request(&mut reader) {
        received.lock().expect("lock received").push(request);
    }
    thread::sleep(reply.delay);

    let mut stream = &stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason_phrase(reply.status),
        reply.body.len(),
        reply.body
    );
    let _ = stream.flush();
}

fn read_request(reader: &mut impl BufRead) -> std::io::Result<ReceivedRequest> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end().to_ascii_lowercase();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
        headers.push(line);
    }

    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(ReceivedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
