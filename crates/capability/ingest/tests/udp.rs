use async_trait::async_trait;
use domain::InboundEvent;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tgw_ingest::{EventHandler, IngestError, UdpIngestor, UdpIngestorConfig};
use tgw_telemetry::metrics;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, Semaphore};

/// 记录收到的事件；可选的闸门让处理阻塞到测试放行。
#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<InboundEvent>>,
    entered: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingHandler {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    async fn count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: InboundEvent) -> Result<(), IngestError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| IngestError::Handler(e.to_string()))?;
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

fn local_config() -> UdpIngestorConfig {
    UdpIngestorConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

async fn send(addr: SocketAddr, payload: &str) {
    let client = UdpSocket::bind("127.0.0.1:0").await.expect("client bind");
    client.send_to(payload.as_bytes(), addr).await.expect("send");
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_events(handler: &RecordingHandler, expected: usize) {
    for _ in 0..200 {
        if handler.count().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn opcua_datagram_reaches_handler() {
    let handler = Arc::new(RecordingHandler::default());
    let ingestor = UdpIngestor::new(local_config(), handler.clone());
    let addr = ingestor.start().await.expect("start");

    send(
        addr,
        r#"{"type":"opcua","tag":"T1","path":"/a/b","value":42,"status_code":0,"namespace":"ns=2"}"#,
    )
    .await;
    wait_for_events(&handler, 1).await;
    ingestor.stop().await;

    let events = handler.events.lock().await;
    assert_eq!(events.len(), 1);
    let InboundEvent::Variable(update) = &events[0] else {
        panic!("expected variable update");
    };
    assert_eq!(update.tag, "T1");
    assert_eq!(update.path, "/a/b");
    assert_eq!(update.value, json!(42));
    assert_eq!(update.status_code, 0);
    assert_eq!(update.namespace, "ns=2");
}

#[tokio::test]
async fn rejected_datagrams_never_reach_handler() {
    let handler = Arc::new(RecordingHandler::default());
    let ingestor = UdpIngestor::new(local_config(), handler.clone());
    let addr = ingestor.start().await.expect("start");

    send(addr, r#"{"type":"unknown_x"}"#).await;
    send(addr, r#"{"tag":"no-type"}"#).await;
    send(addr, r#"{"type":5}"#).await;
    send(addr, "{broken json").await;
    send(addr, r#"{"type":"log","message":"still serving"}"#).await;

    wait_for_events(&handler, 1).await;
    // stop() 会等待所有逐包任务，之后计数是最终值
    ingestor.stop().await;

    let events = handler.events.lock().await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], InboundEvent::Log(_)));
}

#[tokio::test]
async fn start_twice_is_rejected_and_stop_is_idempotent() {
    let handler = Arc::new(RecordingHandler::default());
    let ingestor = UdpIngestor::new(local_config(), handler.clone());

    ingestor.stop().await;
    assert!(!ingestor.is_running());

    ingestor.start().await.expect("start");
    assert!(ingestor.local_addr().is_some());
    let err = ingestor.start().await.expect_err("already running");
    assert!(matches!(err, IngestError::AlreadyRunning));

    ingestor.stop().await;
    ingestor.stop().await;
    assert!(!ingestor.is_running());
    assert!(ingestor.local_addr().is_none());

    let addr = ingestor.start().await.expect("restart");
    send(addr, r#"{"type":"opcua_users","users":[]}"#).await;
    wait_for_events(&handler, 1).await;
    ingestor.stop().await;
    assert_eq!(handler.count().await, 1);
}

#[tokio::test]
async fn bind_conflict_is_reported() {
    let first = UdpIngestor::new(local_config(), Arc::new(RecordingHandler::default()));
    let addr = first.start().await.expect("start");

    let second = UdpIngestor::new(
        UdpIngestorConfig {
            port: addr.port(),
            ..local_config()
        },
        Arc::new(RecordingHandler::default()),
    );
    let err = second.start().await.expect_err("address in use");
    assert!(matches!(err, IngestError::Bind { .. }));
    assert!(!second.is_running());

    let invalid = UdpIngestor::new(
        UdpIngestorConfig {
            host: "192.0.2.1".to_string(),
            ..local_config()
        },
        Arc::new(RecordingHandler::default()),
    );
    assert!(matches!(
        invalid.start().await.expect_err("address not local"),
        IngestError::Bind { .. }
    ));

    first.stop().await;
}

#[tokio::test]
async fn stop_waits_for_in_flight_handlers() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(RecordingHandler::gated(gate.clone()));
    let ingestor = Arc::new(UdpIngestor::new(local_config(), handler.clone()));
    let addr = ingestor.start().await.expect("start");

    send(addr, r#"{"type":"log","message":"slow"}"#).await;
    wait_until(|| handler.entered.load(Ordering::SeqCst) == 1).await;

    let stopping = {
        let ingestor = ingestor.clone();
        tokio::spawn(async move { ingestor.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!stopping.is_finished());

    gate.add_permits(1);
    stopping.await.expect("stop task");
    assert_eq!(handler.count().await, 1);
}

#[tokio::test]
async fn full_worker_pool_rejects_new_datagrams() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(RecordingHandler::gated(gate.clone()));
    let ingestor = UdpIngestor::new(
        UdpIngestorConfig {
            max_in_flight: 1,
            ..local_config()
        },
        handler.clone(),
    );
    let addr = ingestor.start().await.expect("start");

    send(addr, r#"{"type":"log","message":"first"}"#).await;
    wait_until(|| handler.entered.load(Ordering::SeqCst) == 1).await;
    send(addr, r#"{"type":"log","message":"second"}"#).await;
    send(addr, r#"{"type":"log","message":"third"}"#).await;
    // 让接收循环读到后两个数据报（此时许可已被占满）
    tokio::time::sleep(Duration::from_millis(300)).await;

    gate.add_permits(3);
    ingestor.stop().await;

    assert_eq!(handler.entered.load(Ordering::SeqCst), 1);
    assert_eq!(handler.count().await, 1);
}

#[tokio::test]
async fn oversized_datagram_is_flagged_and_loop_keeps_serving() {
    let handler = Arc::new(RecordingHandler::default());
    let ingestor = UdpIngestor::new(
        UdpIngestorConfig {
            recv_buffer_bytes: 16,
            ..local_config()
        },
        handler.clone(),
    );
    let addr = ingestor.start().await.expect("start");
    let before = metrics().snapshot();

    send(addr, r#"{"type":"log","message":"longer than the buffer"}"#).await;
    wait_until(|| metrics().snapshot().datagrams_truncated > before.datagrams_truncated).await;
    send(addr, r#"{"type":"log"}"#).await;
    wait_for_events(&handler, 1).await;
    ingestor.stop().await;

    // 其他测试都不会填满接收缓冲区
    let after = metrics().snapshot();
    assert_eq!(after.datagrams_truncated, before.datagrams_truncated + 1);
    assert!(!ingestor.is_running());
    let events = handler.events.lock().await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], InboundEvent::Log(_)));
}
