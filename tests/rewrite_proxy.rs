//! End-to-end rewrite tests through the proxy.

use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use serde_json::json;
use std::net::SocketAddr;

use response_rewrite::TransformErrorPolicy;

mod common;

use common::Upstream;

const UPSTREAM_JSON: &[u8] = br#"{"name":"node-http-proxy-json","age":1,"version":"1.0.0"}"#;
const REWRITTEN_JSON: &[u8] = br#"{"name":"node-http-proxy-json","age":2}"#;

fn addrs(base: u16) -> (SocketAddr, SocketAddr) {
    (
        format!("127.0.0.1:{}", base).parse().unwrap(),
        format!("127.0.0.1:{}", base + 1).parse().unwrap(),
    )
}

fn bump_age(config: &mut response_rewrite::ProxyConfig) {
    config.rules.set.insert("age".into(), json!(2));
    config.rules.remove.push("version".into());
}

async fn coded_round_trip(base: u16, tag: &'static str) {
    let (backend_addr, proxy_addr) = addrs(base);
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: Some(tag),
            body: common::encode(tag, UPSTREAM_JSON).await,
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get(CONTENT_ENCODING).unwrap(), tag);
    assert!(res.headers().get(CONTENT_LENGTH).is_none());

    let body = res.bytes().await.unwrap();
    assert_eq!(common::decode(tag, &body).await, REWRITTEN_JSON);

    shutdown.trigger();
}

#[tokio::test]
async fn test_gzip_response_rewritten() {
    coded_round_trip(28481, "gzip").await;
}

#[tokio::test]
async fn test_deflate_response_rewritten() {
    coded_round_trip(28483, "deflate").await;
}

#[cfg(feature = "brotli")]
#[tokio::test]
async fn test_brotli_response_rewritten() {
    coded_round_trip(28485, "br").await;
}

#[tokio::test]
async fn test_multi_member_gzip_rewritten() {
    let (backend_addr, proxy_addr) = addrs(28501);
    let (head, tail) = UPSTREAM_JSON.split_at(20);
    let mut body = common::encode("gzip", head).await;
    body.extend_from_slice(&common::encode("gzip", tail).await);

    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: Some("gzip"),
            body,
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    let body = res.bytes().await.unwrap();
    assert_eq!(common::decode("gzip", &body).await, REWRITTEN_JSON);

    shutdown.trigger();
}

#[tokio::test]
async fn test_uncompressed_response_rewritten() {
    let (backend_addr, proxy_addr) = addrs(28487);
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json; charset=utf-8",
            content_encoding: None,
            body: UPSTREAM_JSON.to_vec(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}/api/info", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.bytes().await.unwrap().as_ref(), REWRITTEN_JSON);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unsupported_coding_passes_through() {
    let (backend_addr, proxy_addr) = addrs(28489);
    let opaque = b"\x1f\x9d\x90opaque-compress-bytes".to_vec();
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: Some("compress"),
            body: opaque.clone(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.headers().get(CONTENT_ENCODING).unwrap(), "compress");
    assert_eq!(res.bytes().await.unwrap().as_ref(), opaque.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn test_other_media_types_not_intercepted() {
    let (backend_addr, proxy_addr) = addrs(28491);
    let html = br#"<p>{"age":1}</p>"#.to_vec();
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "text/html",
            content_encoding: None,
            body: html.clone(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.bytes().await.unwrap().as_ref(), html.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_gzip_ends_with_empty_body() {
    let (backend_addr, proxy_addr) = addrs(28493);
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: Some("gzip"),
            body: b"this was never gzip".to_vec(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        common::client().get(format!("http://{}", proxy_addr)).send(),
    )
    .await
    .expect("Proxy hung on malformed body")
    .expect("Proxy unreachable");

    let body = tokio::time::timeout(std::time::Duration::from_secs(5), res.bytes())
        .await
        .expect("Body hung on malformed upstream")
        .unwrap();
    assert!(body.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_body_limit_fails_closed() {
    let (backend_addr, proxy_addr) = addrs(28495);
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: None,
            body: UPSTREAM_JSON.to_vec(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, |config| {
        bump_age(config);
        config.intercept.max_body_bytes = Some(16);
        config.intercept.on_transform_error = TransformErrorPolicy::PassThrough;
    })
    .await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert!(res.bytes().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_intercept_disabled_forwards_verbatim() {
    let (backend_addr, proxy_addr) = addrs(28497);
    common::start_backend(
        backend_addr,
        Upstream {
            content_type: "application/json",
            content_encoding: None,
            body: UPSTREAM_JSON.to_vec(),
        },
    )
    .await;
    let shutdown = common::start_proxy(proxy_addr, backend_addr, |config| {
        bump_age(config);
        config.intercept.enabled = false;
    })
    .await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(
        res.headers().get(CONTENT_LENGTH).unwrap(),
        &UPSTREAM_JSON.len().to_string()
    );
    assert_eq!(res.bytes().await.unwrap().as_ref(), UPSTREAM_JSON);

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_down_returns_502() {
    let (backend_addr, proxy_addr) = addrs(28499);
    let shutdown = common::start_proxy(proxy_addr, backend_addr, bump_age).await;

    let res = common::client()
        .get(format!("http://{}", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 502);

    shutdown.trigger();
}
