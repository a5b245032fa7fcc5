//! Minimal HTTP/1.1 server for exercising the fetch paths in tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned response: path, status code, body
pub type Route = (&'static str, u16, &'static str);

pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    /// Serve `routes` on an ephemeral local port; unknown paths get a 404
    pub async fn start(routes: &[Route]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<&'static str, (u16, &'static str)>> = Arc::new(
            routes
                .iter()
                .map(|&(path, status, body)| (path, (status, body)))
                .collect(),
        );

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(respond(stream, routes));
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn respond(mut stream: TcpStream, routes: Arc<HashMap<&'static str, (u16, &'static str)>>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let (status, body) = routes.get(path).copied().unwrap_or((404, "not found"));

    let response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
