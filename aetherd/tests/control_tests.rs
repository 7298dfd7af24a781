//! Control-protocol tests against an in-process daemon

use aether::consts::{DEFAULT_TOPIC_CAPACITY, SLOT_DATA_SIZE};
use aether::control::{
    ControlStatus, SubscribeRequest, SubscribeResponse, RESPONSE_WIRE_SIZE,
};
use aether_shm::{subscribe_at, Consumed, Cursor, Segment, ShmError, SubscribeError};
use aetherd::{Acceptor, TopicRegistry};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-process daemon: registry plus acceptor on a private socket path.
/// Each test gets a clean slate - no leftover topics.
struct TestDaemon {
    registry: Arc<TopicRegistry>,
    acceptor: Option<Acceptor>,
    socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("aetherd.sock");
        let registry = Arc::new(TopicRegistry::new());
        let acceptor = Acceptor::start(&socket_path, Arc::clone(&registry)).unwrap();
        Self {
            registry,
            acceptor: Some(acceptor),
            socket_path,
            _dir: dir,
        }
    }

    fn socket(&self) -> &Path {
        &self.socket_path
    }

    fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.stop();
            self.registry.shutdown();
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One raw request/response exchange, bypassing the client library.
fn raw_subscribe(socket_path: &Path, topic: &str) -> SubscribeResponse {
    let mut stream = UnixStream::connect(socket_path).unwrap();
    let request = SubscribeRequest::new(topic.as_bytes()).unwrap();
    stream.write_all(&request.encode()).unwrap();

    let mut buf = [0u8; RESPONSE_WIRE_SIZE];
    stream.read_exact(&mut buf).unwrap();
    SubscribeResponse::decode(&buf).unwrap()
}

#[test]
fn test_subscribe_returns_segment_for_new_topic() {
    let daemon = TestDaemon::start();

    let response = raw_subscribe(daemon.socket(), "prices");
    assert_eq!(response.status, ControlStatus::Ok);
    assert_eq!(response.capacity, DEFAULT_TOPIC_CAPACITY);
    assert_eq!(response.shm_name_str(), Some("/aether_prices"));

    // Subscribing again returns the same segment.
    let second = raw_subscribe(daemon.socket(), "prices");
    assert_eq!(second.status, ControlStatus::Ok);
    assert_eq!(second.shm_name_str(), Some("/aether_prices"));

    daemon.shutdown();
}

#[test]
fn test_client_subscribe_attaches_segment() {
    let daemon = TestDaemon::start();

    let sub = subscribe_at(daemon.socket(), "client-attach").unwrap();
    assert_eq!(sub.topic(), "client-attach");
    assert_eq!(sub.name(), "/aether_client-attach");
    assert_eq!(sub.capacity(), DEFAULT_TOPIC_CAPACITY);

    drop(sub);
    daemon.shutdown();
}

#[test]
fn test_end_to_end_publish_consume() {
    let daemon = TestDaemon::start();

    // Two subscriptions on the same topic: one publishes, both read.
    let publisher = subscribe_at(daemon.socket(), "e2e").unwrap();
    let consumer = subscribe_at(daemon.socket(), "e2e").unwrap();

    publisher.publish(b"hello aether").unwrap();

    let mut buf = [0u8; SLOT_DATA_SIZE];
    for sub in [&publisher, &consumer] {
        let mut cursor = Cursor::at(0);
        assert_eq!(
            sub.consume(&mut cursor, &mut buf),
            Consumed::Message { len: 12 }
        );
        assert_eq!(&buf[..12], b"hello aether");
    }

    drop(publisher);
    drop(consumer);
    daemon.shutdown();
}

#[test]
fn test_different_topics_are_isolated() {
    let daemon = TestDaemon::start();

    let ticks = subscribe_at(daemon.socket(), "iso-ticks").unwrap();
    let orders = subscribe_at(daemon.socket(), "iso-orders").unwrap();
    assert_ne!(ticks.name(), orders.name());

    ticks.publish(b"prices only").unwrap();

    // Nothing arrives on the other topic's segment.
    assert_eq!(orders.write_seq(), 0);
    let mut buf = [0u8; SLOT_DATA_SIZE];
    let mut cursor = Cursor::at(1);
    assert_eq!(orders.consume(&mut cursor, &mut buf), Consumed::Empty);
    let mut cursor = Cursor::at(0);
    assert_eq!(orders.consume(&mut cursor, &mut buf), Consumed::Empty);

    drop(ticks);
    drop(orders);
    daemon.shutdown();
}

#[test]
fn test_late_subscriber_reads_ring_history() {
    let daemon = TestDaemon::start();

    let publisher = subscribe_at(daemon.socket(), "late").unwrap();
    for i in 0u32..10 {
        publisher.publish(&i.to_ne_bytes()).unwrap();
    }

    // The late subscriber attaches after the fact; the messages are still
    // in the ring.
    let late = subscribe_at(daemon.socket(), "late").unwrap();
    let mut cursor = Cursor::at(0);
    let mut buf = [0u8; SLOT_DATA_SIZE];
    assert_eq!(
        late.consume(&mut cursor, &mut buf),
        Consumed::Message { len: 4 }
    );
    assert_eq!(u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]), 0);

    drop(publisher);
    drop(late);
    daemon.shutdown();
}

#[test]
fn test_lapped_subscriber_recovers() {
    let daemon = TestDaemon::start();

    let sub = subscribe_at(daemon.socket(), "lap-recovery").unwrap();
    let capacity = sub.capacity();

    // capacity + 1 messages wrap the ring past a consumer waiting at 0.
    for i in 0..=capacity {
        sub.publish(&i.to_ne_bytes()).unwrap();
    }

    let mut cursor = Cursor::at(0);
    let mut buf = [0u8; SLOT_DATA_SIZE];
    assert_eq!(sub.consume(&mut cursor, &mut buf), Consumed::Lapped);
    assert_eq!(
        sub.consume(&mut cursor, &mut buf),
        Consumed::Message { len: 4 }
    );

    drop(sub);
    daemon.shutdown();
}

#[test]
fn test_overlong_topic_reports_internal_error() {
    let daemon = TestDaemon::start();

    // Fits the request's 64-byte topic field, but "/aether_" + topic
    // overflows the segment name space.
    let topic = "t".repeat(60);
    let response = raw_subscribe(daemon.socket(), &topic);
    assert_eq!(response.status, ControlStatus::InternalError);

    // The client library surfaces the rejection without attaching.
    assert!(matches!(
        subscribe_at(daemon.socket(), &topic),
        Err(SubscribeError::Rejected {
            status: ControlStatus::InternalError
        })
    ));

    daemon.shutdown();
}

#[test]
fn test_short_request_drops_connection() {
    let daemon = TestDaemon::start();

    let mut stream = UnixStream::connect(daemon.socket()).unwrap();
    stream.write_all(&[1, 0, 0, 0]).unwrap(); // 4 of 68 bytes
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    // The daemon closes without answering.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    // And keeps serving subsequent well-formed clients.
    let response = raw_subscribe(daemon.socket(), "after-short");
    assert_eq!(response.status, ControlStatus::Ok);

    daemon.shutdown();
}

#[test]
fn test_zero_topic_len_drops_connection() {
    let daemon = TestDaemon::start();

    let mut request = SubscribeRequest::new(b"x").unwrap();
    request.topic_len = 0;

    let mut stream = UnixStream::connect(daemon.socket()).unwrap();
    stream.write_all(&request.encode()).unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    daemon.shutdown();
}

#[test]
fn test_shutdown_removes_socket_and_segments() {
    let daemon = TestDaemon::start();
    let socket_path = daemon.socket().to_path_buf();

    let response = raw_subscribe(&socket_path, "cleanup");
    let shm_name = response.shm_name_str().unwrap().to_string();
    assert!(Segment::attach(&shm_name).is_ok());

    daemon.shutdown();

    assert!(!socket_path.exists());
    assert!(matches!(
        Segment::attach(&shm_name),
        Err(ShmError::NotFound { .. })
    ));
}
