use async_trait::async_trait;
use domain::{LifecycleState, VariableUpdate};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tgw_protocol::{
    ProtocolError, ProtocolSink, ProtocolSinkConfig, VariableStore, VariableStoreConfig,
};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Default)]
struct RecordingSink {
    opened: AtomicUsize,
    closed: AtomicUsize,
    published: Mutex<Vec<String>>,
    refuse_open: bool,
}

#[async_trait]
impl ProtocolSink for RecordingSink {
    async fn open(&self, _config: &ProtocolSinkConfig) -> Result<(), ProtocolError> {
        if self.refuse_open {
            return Err(ProtocolError::Sink("port unavailable".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, update: &VariableUpdate) -> Result<(), ProtocolError> {
        self.published.lock().await.push(update.tag.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn update(tag: &str) -> VariableUpdate {
    VariableUpdate {
        tag: tag.to_string(),
        path: "/plant/line1".to_string(),
        value: json!(1.5),
        status_code: 0,
        namespace: "ns=2".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_monitor_reports_updates_once_per_interval() {
    let store = VariableStore::new(
        VariableStoreConfig::default(),
        Arc::new(RecordingSink::default()),
    );
    let mut rates = store.subscribe_rates();
    store.start().await.expect("start");

    for i in 0..5 {
        store.handle_variable_update(update(&format!("T{i}"))).await;
    }
    let observation = rates.recv().await.expect("observation");
    assert_eq!(observation.count, 5);
    assert_eq!(observation.interval, Duration::from_secs(1));
    assert_eq!(store.packet_count(), 0);

    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn idle_intervals_produce_no_observation() {
    let store = VariableStore::new(
        VariableStoreConfig::default(),
        Arc::new(RecordingSink::default()),
    );
    let mut rates = store.subscribe_rates();
    store.start().await.expect("start");

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(matches!(rates.try_recv(), Err(TryRecvError::Empty)));

    store.handle_variable_update(update("T1")).await;
    store.handle_variable_update(update("T2")).await;
    let observation = rates.recv().await.expect("observation");
    assert_eq!(observation.count, 2);

    store.stop().await;
}

#[tokio::test]
async fn concurrent_updates_are_all_counted() {
    let store = Arc::new(VariableStore::new(
        VariableStoreConfig {
            report_interval: Duration::from_secs(3600),
            ..Default::default()
        },
        Arc::new(RecordingSink::default()),
    ));
    store.start().await.expect("start");

    let tasks: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    store
                        .handle_variable_update(update(&format!("W{worker}-{i}")))
                        .await;
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("worker");
    }

    assert_eq!(store.packet_count(), 200);
    store.stop().await;
}

#[tokio::test]
async fn updates_are_forwarded_only_while_running() {
    let sink = Arc::new(RecordingSink::default());
    let store = VariableStore::new(VariableStoreConfig::default(), sink.clone());

    store.handle_variable_update(update("before")).await;
    store.start().await.expect("start");
    store.handle_variable_update(update("during")).await;
    store.stop().await;
    store.handle_variable_update(update("after")).await;

    assert_eq!(*sink.published.lock().await, vec!["during".to_string()]);
    assert_eq!(store.packet_count(), 3);
}

#[tokio::test]
async fn lifecycle_is_guarded() {
    let sink = Arc::new(RecordingSink::default());
    let store = VariableStore::new(VariableStoreConfig::default(), sink.clone());

    store.stop().await;
    assert_eq!(sink.closed.load(Ordering::SeqCst), 0);

    store.start().await.expect("start");
    assert_eq!(store.state(), LifecycleState::Running);
    assert!(matches!(
        store.start().await,
        Err(ProtocolError::AlreadyRunning)
    ));

    store.stop().await;
    store.stop().await;
    assert_eq!(store.state(), LifecycleState::Stopped);
    assert_eq!(sink.opened.load(Ordering::SeqCst), 1);
    assert_eq!(sink.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_open_leaves_store_stopped() {
    let sink = Arc::new(RecordingSink {
        refuse_open: true,
        ..Default::default()
    });
    let store = VariableStore::new(VariableStoreConfig::default(), sink);

    let err = store.start().await.expect_err("open refused");
    assert!(matches!(err, ProtocolError::Sink(_)));
    assert_eq!(store.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn zero_report_interval_is_rejected_before_open() {
    let sink = Arc::new(RecordingSink::default());
    let store = VariableStore::new(
        VariableStoreConfig {
            report_interval: Duration::ZERO,
            ..Default::default()
        },
        sink.clone(),
    );

    let err = store.start().await.expect_err("zero interval");
    assert!(matches!(err, ProtocolError::ZeroInterval));
    assert_eq!(store.state(), LifecycleState::Stopped);
    assert_eq!(sink.opened.load(Ordering::SeqCst), 0);

    // 未启动时更新仍被计数，但不转发
    store.handle_variable_update(update("T1")).await;
    assert_eq!(store.packet_count(), 1);
    assert!(sink.published.lock().await.is_empty());
}
