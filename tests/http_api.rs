mod common;

use std::net::SocketAddr;

use ecotrack::server::{ServerConfig, router};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use common::{configuration, store};

async fn spawn_server() -> SocketAddr {
    let state = ServerConfig::new(&configuration(), store().await);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });
    addr
}

async fn send(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let body = body.unwrap_or("");
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, body.to_string())
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).expect("json body")
}

const HOUSEHOLD: &str = r#"{"qr_code":"HH7000001","address":"9 Canal Road","ward_number":"001","ward_name":"General Ward","resident_name":"Kavya"}"#;

#[tokio::test]
async fn register_record_and_read_back() {
    let addr = spawn_server().await;

    let (status, body) = send(addr, "POST", "/households", Some(HOUSEHOLD)).await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(json(&body)["outcome"], "created");

    let (status, body) = send(addr, "POST", "/households", Some(HOUSEHOLD)).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)["outcome"], "existing");

    for status_value in ["segregated", "segregated", "mixed"] {
        let submission = format!(r#"{{"collector_name":"Imran","status":"{status_value}"}}"#);
        let (status, body) = send(
            addr,
            "POST",
            "/households/HH7000001/collections",
            Some(&submission),
        )
        .await;
        assert_eq!(status, 201, "{body}");
    }

    let (status, body) = send(addr, "GET", "/households/HH7000001", None).await;
    assert_eq!(status, 200);
    let summary = json(&body);
    assert_eq!(summary["household"]["total_points"], 8);
    assert_eq!(summary["household"]["compliance_rate"], 67);
    assert_eq!(summary["recent_collections"].as_array().unwrap().len(), 3);
    assert_eq!(summary["daily"].as_array().unwrap().len(), 7);

    let (status, body) = send(addr, "POST", "/households/HH7000001/reconcile", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)["changed"], false);

    let (status, body) = send(addr, "GET", "/dashboard", None).await;
    assert_eq!(status, 200);
    let board = json(&body);
    assert_eq!(board["stats"]["total_collections"], 3);
    assert_eq!(board["ward_performance"][0]["name"], "Ward 001");
    assert_eq!(board["top_performers"][0]["qr_code"], "HH7000001");

    let (status, body) = send(addr, "GET", "/collections?sort=-collection_time", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)[0]["status"], "mixed");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let addr = spawn_server().await;

    let (status, _) = send(addr, "GET", "/households/HH0000000", None).await;
    assert_eq!(status, 404);

    let (status, _) = send(
        addr,
        "POST",
        "/households/HH0000000/collections",
        Some(r#"{"collector_name":"A","status":"mixed"}"#),
    )
    .await;
    assert_eq!(status, 404);

    send(addr, "POST", "/households", Some(HOUSEHOLD)).await;
    let (status, body) = send(
        addr,
        "POST",
        "/households/HH7000001/collections",
        Some(r#"{"collector_name":"A","status":"burnt"}"#),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body.contains("burnt"));

    let (status, _) = send(addr, "GET", "/households?sort=-favourite_colour", None).await;
    assert_eq!(status, 400);

    let (status, _) = send(addr, "POST", "/wards/999/reconcile", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn qr_codes_wards_and_search() {
    let addr = spawn_server().await;

    let (status, body) = send(addr, "GET", "/households/qr-code", None).await;
    assert_eq!(status, 200);
    let code = json(&body)["qr_code"].as_str().unwrap().to_string();
    assert!(code.starts_with("HH"));
    assert_eq!(code.len(), 9);

    send(addr, "POST", "/households", Some(HOUSEHOLD)).await;

    let (status, body) = send(addr, "GET", "/households?q=canal", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body).as_array().unwrap().len(), 1);

    let (status, body) = send(addr, "GET", "/wards", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)[0]["ward_number"], "001");

    let (status, body) = send(addr, "POST", "/wards/001/reconcile", None).await;
    assert_eq!(status, 200);
    let census = json(&body);
    assert_eq!(census["ward"]["total_households"], 1);
    assert_eq!(census["changed"], true);
}
