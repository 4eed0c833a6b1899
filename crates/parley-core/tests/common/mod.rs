//! Hand-rolled HTTP server for streams wiremock cannot produce: paced
//! chunks and connections dropped mid-body

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the chunked body ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Zero-length terminating chunk
    Clean,
    /// Socket closed with the body unfinished
    Abort,
}

/// Serve one chunked `text/event-stream` response, waiting `pace` before
/// each chunk. Returns the base URL.
pub async fn serve_chunks(chunks: Vec<String>, pace: Duration, ending: Ending) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  content-type: text/event-stream\r\n\
                  transfer-encoding: chunked\r\n\
                  \r\n",
            )
            .await
            .unwrap();

        for chunk in chunks {
            tokio::time::sleep(pace).await;
            let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
            if socket.write_all(frame.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }

        if ending == Ending::Clean {
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.flush().await;
        }
    });

    format!("http://{}", addr)
}

/// Consume the request head and its `content-length` body
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}
