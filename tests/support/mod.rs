#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};

/// Answers exactly one HTTP request with a canned response and hands back the
/// raw request text.
pub struct StubServer {
    pub addr: SocketAddr,
    handle: JoinHandle<String>,
}

impl StubServer {
    pub fn respond_once(status: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let status = status.to_string();
        let body = body.to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept should succeed");
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0usize;

            loop {
                let mut line = String::new();
                let read = reader.read_line(&mut line).expect("request should be readable");
                if read == 0 {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.trim().eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }

            let mut payload = vec![0u8; content_length];
            reader
                .read_exact(&mut payload)
                .expect("request body should be readable");
            request.push_str(&String::from_utf8_lossy(&payload));

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            stream
                .write_all(response.as_bytes())
                .expect("response should be written");
            stream.flush().expect("response should flush");
            request
        });

        Self { addr, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn captured_request(self) -> String {
        self.handle.join().expect("stub server thread should join")
    }
}

/// Runs a crate binary from `cwd` with every search setting cleared first.
pub fn run_bin(bin: &str, cwd: &Path, args: &[&str], vars: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(bin);
    cmd.args(args).current_dir(cwd);
    for key in [
        "XAI_API_KEY",
        "XAI_MODEL",
        "XAI_BASE_URL",
        "XAI_TIMEOUT_SECS",
        "XAI_IMAGE_UNDERSTANDING",
        "RUST_LOG",
        "LOG_FORMAT",
        "LOG_OUTPUT",
        "LOG_FILE_PATH",
    ] {
        cmd.env_remove(key);
    }
    for (key, value) in vars {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to run binary")
}
