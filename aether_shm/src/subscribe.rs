//! Subscriber client for the daemon's control socket.
//!
//! One blocking request/response exchange per subscription: send a
//! fixed-size [`SubscribeRequest`], receive a fixed-size
//! [`SubscribeResponse`], then attach the named segment directly. From
//! that point on, all data traffic bypasses the daemon.

use crate::error::ShmError;
use crate::segment::Segment;
use aether::consts::DAEMON_SOCKET_PATH;
use aether::control::{
    ControlStatus, SubscribeRequest, SubscribeResponse, RESPONSE_WIRE_SIZE,
};
use std::io::{self, Read, Write};
use std::ops::Deref;
use std::os::unix::net::UnixStream;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while subscribing to a topic.
#[derive(Error, Debug)]
pub enum SubscribeError {
    /// Topic name empty or longer than [`aether::consts::MAX_TOPIC_LEN`].
    #[error("invalid topic name length: {len} bytes (must be 1..=64)")]
    InvalidTopicLen {
        /// Rejected topic length in bytes.
        len: usize,
    },

    /// Socket-level IO failure (connect, send, receive).
    #[error("control socket IO: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: io::Error,
    },

    /// The daemon violated the fixed-size wire protocol.
    #[error("control protocol violation: {reason}")]
    Protocol {
        /// What was wrong with the exchange.
        reason: &'static str,
    },

    /// The daemon answered with a non-Ok status.
    #[error("daemon rejected subscription: {status:?}")]
    Rejected {
        /// Status byte from the response.
        status: ControlStatus,
    },

    /// Attaching the returned segment failed.
    #[error(transparent)]
    Shm(#[from] ShmError),
}

/// A live subscription: the topic name plus the mapped segment.
///
/// Dropping the subscription unmaps the segment (unsubscribe). The
/// segment name keeps existing - it belongs to the daemon.
pub struct Subscription {
    topic: String,
    segment: Segment,
}

impl Subscription {
    /// The topic this subscription was opened for.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The mapped segment.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Give up the handle but keep the mapping.
    pub fn into_segment(self) -> Segment {
        self.segment
    }
}

impl Deref for Subscription {
    type Target = Segment;

    fn deref(&self) -> &Segment {
        &self.segment
    }
}

/// Subscribe to a topic via the daemon at its well-known socket path.
///
/// Publishing and consuming both go through the returned subscription -
/// there is no separate publisher API; any attached process may write.
pub fn subscribe(topic: &str) -> Result<Subscription, SubscribeError> {
    subscribe_at(Path::new(DAEMON_SOCKET_PATH), topic)
}

/// Subscribe via a daemon listening on an explicit socket path.
pub fn subscribe_at(socket_path: &Path, topic: &str) -> Result<Subscription, SubscribeError> {
    let request = SubscribeRequest::new(topic.as_bytes()).ok_or(
        SubscribeError::InvalidTopicLen { len: topic.len() },
    )?;

    let mut stream = UnixStream::connect(socket_path)?;
    stream.write_all(&request.encode())?;

    let mut buf = [0u8; RESPONSE_WIRE_SIZE];
    stream.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SubscribeError::Protocol {
                reason: "short response from daemon",
            }
        } else {
            SubscribeError::Io { source: e }
        }
    })?;

    let response = SubscribeResponse::decode(&buf).ok_or(SubscribeError::Protocol {
        reason: "unknown status byte in response",
    })?;
    if response.status != ControlStatus::Ok {
        return Err(SubscribeError::Rejected {
            status: response.status,
        });
    }
    let shm_name = response.shm_name_str().ok_or(SubscribeError::Protocol {
        reason: "segment name not NUL-terminated UTF-8",
    })?;

    let segment = Segment::attach(shm_name)?;
    debug!("subscribed to '{}' -> {}", topic, shm_name);

    Ok(Subscription {
        topic: topic.to_string(),
        segment,
    })
}
