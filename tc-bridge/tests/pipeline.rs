#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use tc_bridge::concurrency::shutdown::create_shutdown_channel;
use tc_bridge::forward::{
    Destination, ForwardingRouter, ForwardingRoutes, RecordSender, TcpSender,
};
use tc_bridge::parser::RecordParser;
use tc_bridge::pipeline::IngestionPipeline;
use tc_bridge::store::memory::MemoryCacheStore;
use tc_bridge::store::{CacheStore, DurableStore};
use tc_bridge::test_utils::durable::MemoryDurableStore;
use tc_bridge::test_utils::sender::RecordingSender;
use tc_bridge::types::{FieldValue, TcType};
use tc_bridge::workers::listener::ListenerWorker;
use tc_config::shared::{ForwardingConfig, ListenerConfig, ListenerRole};
use tc_telemetry::tracing::init_test_tracing;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

type MemoryPipeline<S> = IngestionPipeline<MemoryCacheStore, MemoryDurableStore, S>;

fn pipeline_with_sender<S>(
    durable: MemoryDurableStore,
    routes: ForwardingRoutes,
    sender: S,
) -> MemoryPipeline<S>
where
    S: RecordSender,
{
    IngestionPipeline::new(
        RecordParser::default(),
        MemoryCacheStore::new(),
        durable,
        ForwardingRouter::new(routes, sender),
    )
}

fn listener_config(name: &str, role: ListenerRole) -> ListenerConfig {
    ListenerConfig {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        role,
        max_message_bytes: ListenerConfig::DEFAULT_MAX_MESSAGE_BYTES,
    }
}

/// Polls `condition` until it holds or a second has passed.
async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(Duration::from_secs(1), async {
        while !condition().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn line_speed_is_stored_and_forwarded_verbatim() {
    init_test_tracing();

    let consumer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let consumer_port = consumer.local_addr().unwrap().port();
    let forwarding = ForwardingConfig {
        line_speed_port: Some(consumer_port),
        ..ForwardingConfig::default()
    };

    let durable = MemoryDurableStore::new();
    let pipeline = pipeline_with_sender(
        durable.clone(),
        ForwardingRoutes::from_config(&forwarding),
        TcpSender::from_config(&forwarding),
    );

    let raw = "4003,L1,0001,64,20240101,120000,,185";
    let received = tokio::spawn(async move {
        let (mut stream, _) = consumer.accept().await.unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        bytes
    });

    assert!(pipeline.process(raw, "dongkook_127.0.0.1:40000").await);

    let rows = durable.saved(TcType::LineSpeed).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].fields.get("line_speed"),
        Some(&FieldValue::Integer(185))
    );
    assert!(!rows[0].fields.contains_key("coil_number"));

    let bytes = timeout(Duration::from_secs(1), received).await.unwrap().unwrap();
    assert_eq!(bytes, raw.as_bytes());

    let stats = pipeline.stats();
    assert_eq!(stats.counters.total_received, 1);
    assert_eq!(stats.counters.cache_saved, 1);
    assert_eq!(stats.counters.durable_saved, 1);
    assert_eq!(stats.success_rate, 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_consumer_does_not_fail_processing() {
    init_test_tracing();

    // Reserve a port and release it so nothing listens there.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let forwarding = ForwardingConfig {
        schedule_port: Some(port),
        connect_timeout_ms: 200,
        ..ForwardingConfig::default()
    };

    let durable = MemoryDurableStore::new();
    let pipeline = pipeline_with_sender(
        durable.clone(),
        ForwardingRoutes::from_config(&forwarding),
        TcpSender::from_config(&forwarding),
    );

    assert!(pipeline.process("4000,L1,0002,120,20240101,120000,,C-1001", "test").await);
    assert_eq!(durable.saved(TcType::Schedule).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_failures_are_isolated_per_record() {
    init_test_tracing();

    let durable = MemoryDurableStore::new();
    let sender = RecordingSender::new();
    let pipeline =
        pipeline_with_sender(durable.clone(), ForwardingRoutes::default(), sender.clone());

    assert!(pipeline.process("4002,L1,1,0,d,t,,C-1", "test").await);

    durable.fail_saves(true).await;
    assert!(!pipeline.process("4003,L1,2,0,d,t,,190", "test").await);
    assert!(!pipeline.process("4001,L1,3,0,d,t,,C-1,1,20", "test").await);

    durable.fail_saves(false).await;
    assert!(!pipeline.process("garbage", "test").await);
    assert!(pipeline.process("4003,L1,4,0,d,t,,195", "test").await);

    let stats = pipeline.stats();
    assert_eq!(stats.counters.total_received, 5);
    assert_eq!(stats.counters.cache_saved, 4);
    assert_eq!(stats.counters.durable_saved, 2);
    assert_eq!(stats.counters.errors, 1);
    assert_eq!(stats.success_rate, 0.4);

    // Only the cut record is not routed, the failed line speed write is still forwarded.
    let destinations: Vec<Destination> = sender
        .sent()
        .await
        .into_iter()
        .map(|(destination, _)| destination)
        .collect();
    assert_eq!(
        destinations,
        vec![
            Destination::new("127.0.0.1", 9309),
            Destination::new("127.0.0.1", 9310),
            Destination::new("127.0.0.1", 9310),
        ]
    );
    assert_eq!(pipeline.cache().recent(TcType::Cut, 10).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn listener_feeds_every_line_into_the_pipeline() {
    init_test_tracing();

    let durable = MemoryDurableStore::new();
    let sender = RecordingSender::new();
    let pipeline = Arc::new(pipeline_with_sender(
        durable.clone(),
        ForwardingRoutes::default(),
        sender.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let handle = ListenerWorker::new(
        listener_config("dongkook", ListenerRole::Telemetry),
        pipeline.clone(),
        shutdown_rx,
    )
    .start()
    .await
    .unwrap();

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client
        .write_all(b"4000,L1,1,0,d,t,,C-7\r\n\n4003,L1,2,0,d,t,,185\n9999,bad\n")
        .await
        .unwrap();

    wait_until(|| {
        let pipeline = pipeline.clone();
        async move {
            let counters = pipeline.stats().counters;
            counters.total_received == 3 && counters.errors == 1
        }
    })
    .await;

    assert_eq!(durable.saved_count().await, 2);

    let records = pipeline.durable().query_latest_by_coil("C-7").await.unwrap();
    assert!(records.schedule.is_some());
    assert_eq!(records.line_speeds.len(), 1);

    let cached = pipeline.cache().recent(TcType::Schedule, 1).unwrap();
    assert!(cached[0].source_label().starts_with("dongkook_127.0.0.1:"));

    // An open but idle connection does not block shutdown.
    shutdown_tx.shutdown().unwrap();
    timeout(Duration::from_secs(1), handle.wait())
        .await
        .unwrap()
        .unwrap();
    drop(client);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_waits_for_records_being_saved() {
    init_test_tracing();

    let durable = MemoryDurableStore::new();
    durable.set_save_delay(Duration::from_millis(300)).await;
    let pipeline = Arc::new(pipeline_with_sender(
        durable.clone(),
        ForwardingRoutes::default(),
        RecordingSender::new(),
    ));
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let handle = ListenerWorker::new(
        listener_config("dongkook", ListenerRole::Telemetry),
        pipeline.clone(),
        shutdown_rx,
    )
    .start()
    .await
    .unwrap();

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client.write_all(b"4003,L1,1,0,d,t,,185\n").await.unwrap();

    wait_until(|| {
        let pipeline = pipeline.clone();
        async move { pipeline.stats().counters.total_received == 1 }
    })
    .await;

    // The durable write is still sleeping when shutdown is signalled.
    shutdown_tx.shutdown().unwrap();
    assert_eq!(durable.saved_count().await, 0);

    timeout(Duration::from_secs(2), handle.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(durable.saved_count().await, 1);
    let counters = pipeline.stats().counters;
    assert_eq!(counters.cache_saved, 1);
    assert_eq!(counters.durable_saved, 1);
    drop(client);
}

#[tokio::test(flavor = "multi_thread")]
async fn acknowledgement_listener_does_not_process() {
    init_test_tracing();

    let durable = MemoryDurableStore::new();
    let pipeline = Arc::new(pipeline_with_sender(
        durable.clone(),
        ForwardingRoutes::default(),
        RecordingSender::new(),
    ));
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let handle = ListenerWorker::new(
        listener_config("gogi_ack", ListenerRole::Acknowledgement),
        pipeline.clone(),
        shutdown_rx,
    )
    .start()
    .await
    .unwrap();

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client.write_all(b"4003,L1,2,0,d,t,,185\n").await.unwrap();
    client.shutdown().await.unwrap();
    drop(client);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.stats().counters.total_received, 0);
    assert_eq!(durable.saved_count().await, 0);

    shutdown_tx.shutdown().unwrap();
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_message_closes_the_connection() {
    init_test_tracing();

    let pipeline = Arc::new(pipeline_with_sender(
        MemoryDurableStore::new(),
        ForwardingRoutes::default(),
        RecordingSender::new(),
    ));
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let mut config = listener_config("dongkook", ListenerRole::Telemetry);
    config.max_message_bytes = 16;
    let handle = ListenerWorker::new(config, pipeline.clone(), shutdown_rx)
        .start()
        .await
        .unwrap();

    let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
    client
        .write_all(b"4003,L1,2,0,d,t,,185,way,too,long\n4003,L1,3,0,d,t,,1\n")
        .await
        .unwrap();

    let mut rest = Vec::new();
    let read = timeout(Duration::from_secs(1), client.read_to_end(&mut rest)).await;
    assert!(read.is_ok(), "connection should be closed by the listener");
    assert_eq!(pipeline.stats().counters.total_received, 0);

    shutdown_tx.shutdown().unwrap();
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn binding_a_taken_port_fails() {
    init_test_tracing();

    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = listener_config("dongkook", ListenerRole::Telemetry);
    config.port = taken.local_addr().unwrap().port();

    let pipeline = Arc::new(pipeline_with_sender(
        MemoryDurableStore::new(),
        ForwardingRoutes::default(),
        RecordingSender::new(),
    ));
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let err = ListenerWorker::new(config, pipeline, shutdown_rx)
        .start()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), tc_bridge::error::ErrorKind::ListenerBindFailed);
}
