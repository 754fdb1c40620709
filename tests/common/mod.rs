//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use response_rewrite::coding::{self, Selection};
use response_rewrite::{HttpServer, ProxyConfig, Shutdown};

/// Canned upstream response.
#[derive(Clone)]
pub struct Upstream {
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
    pub body: Vec<u8>,
}

/// Start a mock backend that answers every request with `upstream`.
pub async fn start_backend(addr: SocketAddr, upstream: Upstream) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let upstream = upstream.clone();
                    tokio::spawn(async move {
                        let mut request = [0u8; 4096];
                        let _ = socket.read(&mut request).await;

                        let mut head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            upstream.content_type,
                            upstream.body.len()
                        );
                        if let Some(encoding) = upstream.content_encoding {
                            head.push_str(&format!("Content-Encoding: {}\r\n", encoding));
                        }
                        head.push_str("\r\n");

                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&upstream.body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Run the proxy on `proxy_addr` in front of `backend_addr`.
pub async fn start_proxy(
    proxy_addr: SocketAddr,
    backend_addr: SocketAddr,
    tweak: impl FnOnce(&mut ProxyConfig),
) -> Shutdown {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy_addr.to_string();
    config.upstream.address = backend_addr.to_string();
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind(proxy_addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

/// Plain client that leaves content-coding alone.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn encode(tag: &str, input: &[u8]) -> Vec<u8> {
    let Selection::Coded { mut encoder, .. } = coding::select(Some(tag)) else {
        panic!("{} should be supported", tag);
    };
    let mut out = encoder.push(input).await.unwrap().to_vec();
    out.extend_from_slice(&encoder.finish().await.unwrap());
    out
}

pub async fn decode(tag: &str, input: &[u8]) -> Vec<u8> {
    let Selection::Coded { mut decoder, .. } = coding::select(Some(tag)) else {
        panic!("{} should be supported", tag);
    };
    let mut out = decoder.push(input).await.unwrap().to_vec();
    out.extend_from_slice(&decoder.finish().await.unwrap());
    out
}
