//! DeviceConnection against a local TCP listener acting as the printer

use marking_printer::{
    ConnectionConfig, ConnectionStatus, DeviceConnection, DeviceError, DeviceLink, RequestOptions,
    ResponseMatcher, Transport,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Reply to each `\r`-terminated request with `reply(request)`; `None` stays silent
async fn serve_one<F>(stream: TcpStream, reply: F, seen: mpsc::UnboundedSender<String>)
where
    F: Fn(&str) -> Option<String>,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\r', &mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let request = String::from_utf8_lossy(&buf).trim_end_matches('\r').to_string();
        let _ = seen.send(request.clone());
        if let Some(answer) = reply(&request) {
            if writer.write_all(answer.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

async fn fake_printer<F>(reply: F) -> (String, mpsc::UnboundedReceiver<String>)
where
    F: Fn(&str) -> Option<String> + Clone + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_one(stream, reply.clone(), tx.clone()));
        }
    });
    (addr, rx)
}

fn config(addr: &str) -> ConnectionConfig {
    ConnectionConfig::new(Transport::tcp(addr))
        .with_reconnect_interval(Duration::from_millis(100))
        .with_response_timeout(Duration::from_millis(300))
}

#[tokio::test]
async fn test_write_and_response_matches_reply() {
    let (addr, mut seen) = fake_printer(|req| match req {
        "^0?RS" => Some("^0!ACK\r^0=RS1\t6\t0\t0\t80\r".to_string()),
        _ => None,
    })
    .await;

    let conn = DeviceConnection::new(config(&addr));
    conn.connect().unwrap();
    conn.wait_open(Duration::from_secs(2)).await.unwrap();
    assert_eq!(conn.status(), ConnectionStatus::Open);

    let line = conn
        .write_and_response(
            "^0?RS",
            RequestOptions::expect(ResponseMatcher::Contains("=RS".into())),
        )
        .await
        .unwrap();
    assert_eq!(line, "^0=RS1\t6\t0\t0\t80");
    assert_eq!(seen.recv().await.unwrap(), "^0?RS");

    conn.disconnect().await;
    assert_eq!(conn.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn test_timeout_does_not_leak_into_next_request() {
    let (addr, _seen) = fake_printer(|req| match req {
        "^0!GO" => Some("^0!GO\r".to_string()),
        _ => None,
    })
    .await;

    let conn = DeviceConnection::new(config(&addr));
    conn.connect().unwrap();
    conn.wait_open(Duration::from_secs(2)).await.unwrap();

    let silent = conn
        .write_and_response("^0!NO", RequestOptions::default())
        .await;
    assert!(matches!(silent, Err(DeviceError::Timeout(_))));

    let answered = conn
        .write_and_response(
            "^0!GO",
            RequestOptions::expect(ResponseMatcher::Prefix("^0".into()))
                .with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(answered, "^0!GO");

    conn.disconnect().await;
}

#[tokio::test]
async fn test_subscribers_receive_unsolicited_lines() {
    let (addr, _seen) = fake_printer(|req| match req {
        "^0!W1" => Some("INK LOW\r\r^0!W1\r".to_string()),
        _ => None,
    })
    .await;

    let conn = DeviceConnection::new(config(&addr));
    let mut lines = conn.subscribe();
    conn.connect().unwrap();
    conn.wait_open(Duration::from_secs(2)).await.unwrap();

    conn.write("^0!W1").await;

    let first = tokio::time::timeout(Duration::from_secs(1), lines.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "INK LOW");
    // the empty frame in between is dropped
    let second = tokio::time::timeout(Duration::from_secs(1), lines.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "^0!W1");

    conn.disconnect().await;
}

#[tokio::test]
async fn test_reconnects_after_peer_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // First connection is dropped right away, the next one is kept
        let (first, _) = listener.accept().await.unwrap();
        drop(first);
        let _ = accepted_tx.send(1);
        let (second, _) = listener.accept().await.unwrap();
        let _ = accepted_tx.send(2);
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(second);
    });

    let conn = DeviceConnection::new(config(&addr));
    conn.connect().unwrap();

    let wait = Duration::from_secs(3);
    assert_eq!(tokio::time::timeout(wait, accepted.recv()).await.unwrap(), Some(1));
    assert_eq!(tokio::time::timeout(wait, accepted.recv()).await.unwrap(), Some(2));

    conn.wait_open(Duration::from_secs(2)).await.unwrap();
    assert!(conn.is_open());

    conn.disconnect().await;
    assert_eq!(conn.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn test_unreachable_device_keeps_retrying() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let conn = DeviceConnection::new(config(&addr));
    conn.connect().unwrap();

    let result = conn.wait_open(Duration::from_millis(400)).await;
    assert!(matches!(result, Err(DeviceError::Timeout(_))));
    assert!(matches!(
        conn.status(),
        ConnectionStatus::Connecting | ConnectionStatus::Error | ConnectionStatus::Closed
    ));

    conn.disconnect().await;
    assert_eq!(conn.status(), ConnectionStatus::Closed);
}
