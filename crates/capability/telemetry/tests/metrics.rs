use tgw_telemetry::{
    GatewayMetrics, metrics, new_trace_id, record_datagram_received, record_packet_rate,
};

#[test]
fn trace_ids_are_unique() {
    let first = new_trace_id();
    let second = new_trace_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn fresh_metrics_start_at_zero() {
    let snapshot = GatewayMetrics::new().snapshot();
    assert_eq!(snapshot, Default::default());
}

#[test]
fn global_counters_accumulate() {
    let before = metrics().snapshot().datagrams_received;
    record_datagram_received();
    record_datagram_received();
    assert!(metrics().snapshot().datagrams_received >= before + 2);

    record_packet_rate(17);
    record_packet_rate(5);
    assert_eq!(metrics().snapshot().last_packet_rate, 5);
}
