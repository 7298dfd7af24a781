//! Concurrent publisher stress test: per-producer ordering end to end

use aether::consts::SLOT_DATA_SIZE;
use aether_shm::{subscribe_at, Consumed, Cursor};
use aetherd::{Acceptor, TopicRegistry};
use std::sync::Arc;

const N_PUBLISHERS: u32 = 4;
const MSGS_PER_PUBLISHER: u32 = 200;
const TOTAL_MSGS: u32 = N_PUBLISHERS * MSGS_PER_PUBLISHER; // 800 < capacity 1024
const MAX_SPIN: u32 = TOTAL_MSGS * 1000; // safety: bail if stuck

/// Message layout inside the ring payload.
fn encode_msg(publisher_id: u32, msg_seq: u32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&publisher_id.to_ne_bytes());
    buf[4..].copy_from_slice(&msg_seq.to_ne_bytes());
    buf
}

fn decode_msg(buf: &[u8]) -> (u32, u32) {
    (
        u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
        u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
    )
}

#[test]
fn test_concurrent_publishers_ordered_per_producer() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("aetherd.sock");
    let registry = Arc::new(TopicRegistry::new());
    let acceptor = Acceptor::start(&socket_path, Arc::clone(&registry)).unwrap();

    // Subscribe before the publishers start - no message can be missed.
    let consumer = subscribe_at(&socket_path, "stress").unwrap();

    let publishers: Vec<_> = (0..N_PUBLISHERS)
        .map(|publisher_id| {
            let socket_path = socket_path.clone();
            std::thread::spawn(move || {
                // Each publisher runs its own subscribe handshake and owns
                // its own mapping, exactly as a separate process would.
                let publisher = subscribe_at(&socket_path, "stress").unwrap();
                for msg_seq in 0..MSGS_PER_PUBLISHER {
                    publisher
                        .publish(&encode_msg(publisher_id, msg_seq))
                        .unwrap();
                }
            })
        })
        .collect();

    // Consume concurrently with the publishers.
    let mut last_seq = [None::<u32>; N_PUBLISHERS as usize];
    let mut cursor = Cursor::at(0);
    let mut buf = [0u8; SLOT_DATA_SIZE];
    let mut received = 0u32;
    let mut spins = 0u32;

    while received < TOTAL_MSGS && spins < MAX_SPIN {
        match consumer.consume(&mut cursor, &mut buf) {
            Consumed::Message { len } => {
                assert_eq!(len, 8);
                let (publisher_id, msg_seq) = decode_msg(&buf);
                assert!(publisher_id < N_PUBLISHERS);

                // Messages from one publisher must arrive in publish order.
                match last_seq[publisher_id as usize] {
                    None => assert_eq!(msg_seq, 0),
                    Some(prev) => assert_eq!(msg_seq, prev + 1),
                }
                last_seq[publisher_id as usize] = Some(msg_seq);
                received += 1;
                spins = 0;
            }
            Consumed::Empty => {
                spins += 1;
                std::thread::yield_now();
            }
            // 800 messages never wrap a 1024-slot ring.
            Consumed::Lapped => panic!("consumer lapped despite spare capacity"),
        }
    }

    for publisher in publishers {
        publisher.join().unwrap();
    }

    assert_eq!(received, TOTAL_MSGS);
    for (publisher_id, last) in last_seq.iter().enumerate() {
        assert_eq!(
            last,
            &Some(MSGS_PER_PUBLISHER - 1),
            "publisher {publisher_id} incomplete"
        );
    }

    drop(consumer);
    acceptor.stop();
    registry.shutdown();
}
