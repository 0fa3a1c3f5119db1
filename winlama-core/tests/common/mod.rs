//! A bare HTTP/1.1 server that sends an NDJSON body one chunk at a time,
//! for timings the mock server cannot produce.
#![allow(dead_code)]

use std::time::Duration;

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
};

/// What the server does after the last line.
#[derive(Clone, Copy, Debug)]
pub enum Ending {
    /// Finish the chunked body.
    Close,
    /// Keep the connection open and send nothing more.
    Stall,
}

/// Serve a single request, writing each of `lines` as its own chunk `gap` apart.
/// Returns the base address.
pub async fn trickle_server(lines: &[&str], gap: Duration, ending: Ending) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let lines: Vec<String> = lines.iter().map(|line| format!("{line}\n")).collect();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = "HTTP/1.1 200 OK\r\n\
                    content-type: application/x-ndjson\r\n\
                    transfer-encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        for line in lines {
            let chunk = format!("{:x}\r\n{line}\r\n", line.len());
            if socket.write_all(chunk.as_bytes()).await.is_err() {
                return;
            }
            tokio::time::sleep(gap).await;
        }
        match ending {
            Ending::Close => {
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
            }
            Ending::Stall => tokio::time::sleep(Duration::from_secs(30)).await,
        }
    });

    format!("http://{address}")
}

/// Consume the request head and its body so the connection closes cleanly.
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
        let read = socket.read(&mut buffer).await.unwrap();
        if read == 0 {
            return;
        }
        request.extend_from_slice(&buffer[..read]);

        let Some(head_end) = request.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= head_end + 4 + body_len {
            return;
        }
    }
}
