//! Topic registry: one owned shared memory segment per topic.
//!
//! The daemon is the sole owner of every topic segment; subscribers only
//! hold mappings. A single mutex covers both the lookup and the segment
//! creation - creation is slow (ftruncate, mmap) but happens once per
//! topic, and keeping it inside the lock means two concurrent subscribes
//! for a new topic cannot race to create it.

use aether::consts::DEFAULT_TOPIC_CAPACITY;
use aether::control::segment_name_for_topic;
use aether_shm::{Segment, ShmError};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by registry lookups.
///
/// Both variants are reported to clients as
/// [`aether::control::ControlStatus::InternalError`]; the detail only
/// reaches the log.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The topic name does not fit the segment name space.
    #[error("topic name too long for segment name space: '{topic}'")]
    TopicNameTooLong {
        /// Offending topic name.
        topic: String,
    },

    /// Segment creation failed.
    #[error(transparent)]
    Shm(#[from] ShmError),
}

struct TopicEntry {
    shm_name: String,
    segment: Segment,
}

/// Mapping from topic name to its owned segment.
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, TopicEntry>>,
}

impl TopicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a topic, creating its segment on first reference.
    ///
    /// Returns the segment name and capacity to answer the subscribe
    /// request with. On creation failure nothing is registered - a later
    /// subscribe retries from scratch.
    pub fn subscribe(&self, topic: &str) -> Result<(String, u32), RegistryError> {
        let mut topics = self.topics.lock().unwrap();

        if let Some(entry) = topics.get(topic) {
            return Ok((entry.shm_name.clone(), entry.segment.capacity()));
        }

        let shm_name =
            segment_name_for_topic(topic).ok_or_else(|| RegistryError::TopicNameTooLong {
                topic: topic.to_string(),
            })?;

        // A previous daemon that crashed may have left the name behind;
        // create() insists on a fresh object.
        Segment::unlink_stale(&shm_name);
        let segment = Segment::create(&shm_name, DEFAULT_TOPIC_CAPACITY)?;
        let capacity = segment.capacity();

        info!("created topic '{}' -> {}", topic, shm_name);

        topics.insert(
            topic.to_string(),
            TopicEntry {
                shm_name: shm_name.clone(),
                segment,
            },
        );
        Ok((shm_name, capacity))
    }

    /// Number of registered topics.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap().len()
    }

    /// Log one stats line per live topic.
    pub fn dump_stats(&self) {
        let topics = self.topics.lock().unwrap();

        if topics.is_empty() {
            info!("stats: no topics");
            return;
        }
        for (topic, entry) in topics.iter() {
            info!(
                "stats: topic='{}' capacity={} messages_published={}",
                topic,
                entry.segment.capacity(),
                entry.segment.write_seq()
            );
        }
    }

    /// Detach and destroy every registered segment.
    ///
    /// Called once at daemon shutdown, after the acceptor has stopped.
    /// Mappings held by subscribers stay valid until they unmap.
    pub fn shutdown(&self) {
        let mut topics = self.topics.lock().unwrap();

        for (topic, entry) in topics.drain() {
            let TopicEntry { shm_name, segment } = entry;
            drop(segment); // detach before the name goes away
            match Segment::destroy(&shm_name) {
                Ok(()) => info!("destroyed topic '{}'", topic),
                Err(e) => warn!("failed to destroy segment for '{}': {}", topic, e),
            }
        }
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}
