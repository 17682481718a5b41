//! 丢弃路径的计数。计数器是进程级的，本文件只放一个测试，独占一个测试进程。

use async_trait::async_trait;
use domain::InboundEvent;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tgw_ingest::{EventHandler, IngestError, process_datagram};
use tgw_telemetry::{MetricsSnapshot, metrics};

#[derive(Default)]
struct CountingHandler {
    handled: AtomicUsize,
}

#[async_trait]
impl EventHandler for CountingHandler {
    async fn handle(&self, _event: InboundEvent) -> Result<(), IngestError> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// (缺少类型, 未知类型, 解码失败) 三个丢弃计数的增量
fn drop_delta(before: &MetricsSnapshot, after: &MetricsSnapshot) -> (u64, u64, u64) {
    (
        after.dropped_missing_type - before.dropped_missing_type,
        after.dropped_unknown_type - before.dropped_unknown_type,
        after.decode_failures - before.decode_failures,
    )
}

#[tokio::test]
async fn each_rejected_datagram_records_exactly_one_drop() {
    let handler = CountingHandler::default();
    let peer: SocketAddr = "127.0.0.1:40000".parse().expect("peer addr");

    let cases: [(&str, (u64, u64, u64)); 5] = [
        (r#"{"tag":"x"}"#, (1, 0, 0)),
        (r#"{"type":5}"#, (1, 0, 0)),
        (r#"{"type":null,"tag":"x"}"#, (1, 0, 0)),
        (r#"{"type":"unknown_x"}"#, (0, 1, 0)),
        ("not json", (0, 0, 1)),
    ];
    for (payload, expected) in cases {
        let before = metrics().snapshot();
        process_datagram(payload.as_bytes(), peer, &handler).await;
        let after = metrics().snapshot();
        assert_eq!(drop_delta(&before, &after), expected, "payload {payload}");
    }
    assert_eq!(handler.handled.load(Ordering::SeqCst), 0);

    let before = metrics().snapshot();
    process_datagram(br#"{"type":"log","message":"ok"}"#, peer, &handler).await;
    let after = metrics().snapshot();
    assert_eq!(drop_delta(&before, &after), (0, 0, 0));
    assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
}
