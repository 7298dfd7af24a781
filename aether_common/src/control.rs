//! Control-protocol wire format.
//!
//! The daemon and its clients exchange exactly one fixed-size request and
//! one fixed-size response per connection over a local stream socket. The
//! encoding uses native byte order with explicit field offsets - it is a
//! same-host protocol and deliberately not portable across machines.
//!
//! ## Wire Layout
//!
//! ```text
//! SubscribeRequest (68 bytes):
//!   [0..4]   topic_len: u32      valid range [1, 64]
//!   [4..68]  topic:     [u8; 64] only the first topic_len bytes meaningful
//!
//! SubscribeResponse (69 bytes):
//!   [0]      status:    u8       ControlStatus
//!   [1..5]   capacity:  u32      segment capacity on success
//!   [5..69]  shm_name:  [u8; 64] NUL-padded segment name on success
//! ```
//!
//! A short read or write on either side is a protocol error; the peer
//! closes the connection.

use crate::consts::{MAX_SHM_NAME_LEN, MAX_TOPIC_LEN, SHM_NAME_PREFIX};
use static_assertions::const_assert;

/// Size of an encoded [`SubscribeRequest`] on the wire.
pub const REQUEST_WIRE_SIZE: usize = 4 + MAX_TOPIC_LEN;

/// Size of an encoded [`SubscribeResponse`] on the wire.
pub const RESPONSE_WIRE_SIZE: usize = 1 + 4 + MAX_SHM_NAME_LEN;

// Field offsets within the encoded buffers.
const REQ_TOPIC_LEN_OFFSET: usize = 0;
const REQ_TOPIC_OFFSET: usize = 4;
const RESP_STATUS_OFFSET: usize = 0;
const RESP_CAPACITY_OFFSET: usize = 1;
const RESP_SHM_NAME_OFFSET: usize = 5;

const_assert!(REQ_TOPIC_OFFSET + MAX_TOPIC_LEN == REQUEST_WIRE_SIZE);
const_assert!(RESP_SHM_NAME_OFFSET + MAX_SHM_NAME_LEN == RESPONSE_WIRE_SIZE);

/// Status byte of a [`SubscribeResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlStatus {
    /// Subscription succeeded; `capacity` and `shm_name` are valid.
    Ok = 0,
    /// The topic does not exist and the daemon will not create it.
    TopicNotFound = 1,
    /// The daemon failed to create or look up the topic's segment.
    InternalError = 2,
}

impl ControlStatus {
    /// Convert from a raw wire byte. Returns `None` for unknown values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::TopicNotFound),
            2 => Some(Self::InternalError),
            _ => None,
        }
    }
}

/// Fixed-size subscribe request: a topic name sent to the daemon.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeRequest {
    /// Number of meaningful bytes in `topic`. Valid range `[1, 64]`.
    pub topic_len: u32,
    /// Topic name bytes; only the first `topic_len` are meaningful.
    pub topic: [u8; MAX_TOPIC_LEN],
}

impl SubscribeRequest {
    /// Build a request for the given topic name.
    ///
    /// Returns `None` when the name is empty or longer than
    /// [`MAX_TOPIC_LEN`].
    pub fn new(topic: &[u8]) -> Option<Self> {
        if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_TOPIC_LEN];
        buf[..topic.len()].copy_from_slice(topic);
        Some(Self {
            topic_len: topic.len() as u32,
            topic: buf,
        })
    }

    /// The topic name, if `topic_len` is within the valid range.
    pub fn topic(&self) -> Option<&[u8]> {
        let len = self.topic_len as usize;
        if len == 0 || len > MAX_TOPIC_LEN {
            return None;
        }
        Some(&self.topic[..len])
    }

    /// Encode into the fixed wire representation.
    pub fn encode(&self) -> [u8; REQUEST_WIRE_SIZE] {
        let mut buf = [0u8; REQUEST_WIRE_SIZE];
        buf[REQ_TOPIC_LEN_OFFSET..REQ_TOPIC_OFFSET]
            .copy_from_slice(&self.topic_len.to_ne_bytes());
        buf[REQ_TOPIC_OFFSET..].copy_from_slice(&self.topic);
        buf
    }

    /// Decode from the fixed wire representation.
    ///
    /// Decoding never fails - `topic_len` is validated on access via
    /// [`SubscribeRequest::topic`].
    pub fn decode(buf: &[u8; REQUEST_WIRE_SIZE]) -> Self {
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[REQ_TOPIC_LEN_OFFSET..REQ_TOPIC_OFFSET]);
        let mut topic = [0u8; MAX_TOPIC_LEN];
        topic.copy_from_slice(&buf[REQ_TOPIC_OFFSET..]);
        Self {
            topic_len: u32::from_ne_bytes(len_bytes),
            topic,
        }
    }
}

/// Fixed-size subscribe response: segment name and capacity on success.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeResponse {
    /// Outcome of the request.
    pub status: ControlStatus,
    /// Ring capacity of the topic's segment. Unspecified unless `status`
    /// is [`ControlStatus::Ok`].
    pub capacity: u32,
    /// NUL-padded segment name. Unspecified unless `status` is
    /// [`ControlStatus::Ok`].
    pub shm_name: [u8; MAX_SHM_NAME_LEN],
}

impl SubscribeResponse {
    /// Build a success response for a segment.
    ///
    /// Returns `None` when `shm_name` does not fit the name field with its
    /// reserved NUL byte.
    pub fn ok(shm_name: &str, capacity: u32) -> Option<Self> {
        let bytes = shm_name.as_bytes();
        if bytes.len() >= MAX_SHM_NAME_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_SHM_NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            status: ControlStatus::Ok,
            capacity,
            shm_name: buf,
        })
    }

    /// Build a failure response. `shm_name` and `capacity` are zeroed.
    pub fn failure(status: ControlStatus) -> Self {
        Self {
            status,
            capacity: 0,
            shm_name: [0u8; MAX_SHM_NAME_LEN],
        }
    }

    /// The segment name as a string slice, up to the first NUL byte.
    ///
    /// Returns `None` when the field is not valid UTF-8 or not
    /// NUL-terminated.
    pub fn shm_name_str(&self) -> Option<&str> {
        let end = self.shm_name.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&self.shm_name[..end]).ok()
    }

    /// Encode into the fixed wire representation.
    pub fn encode(&self) -> [u8; RESPONSE_WIRE_SIZE] {
        let mut buf = [0u8; RESPONSE_WIRE_SIZE];
        buf[RESP_STATUS_OFFSET] = self.status as u8;
        buf[RESP_CAPACITY_OFFSET..RESP_SHM_NAME_OFFSET]
            .copy_from_slice(&self.capacity.to_ne_bytes());
        buf[RESP_SHM_NAME_OFFSET..].copy_from_slice(&self.shm_name);
        buf
    }

    /// Decode from the fixed wire representation.
    ///
    /// Returns `None` when the status byte is unknown - the peer is
    /// speaking a different protocol version.
    pub fn decode(buf: &[u8; RESPONSE_WIRE_SIZE]) -> Option<Self> {
        let status = ControlStatus::from_u8(buf[RESP_STATUS_OFFSET])?;
        let mut cap_bytes = [0u8; 4];
        cap_bytes.copy_from_slice(&buf[RESP_CAPACITY_OFFSET..RESP_SHM_NAME_OFFSET]);
        let mut shm_name = [0u8; MAX_SHM_NAME_LEN];
        shm_name.copy_from_slice(&buf[RESP_SHM_NAME_OFFSET..]);
        Some(Self {
            status,
            capacity: u32::from_ne_bytes(cap_bytes),
            shm_name,
        })
    }
}

/// Build the segment name for a topic: `"/aether_" + topic`.
///
/// Returns `None` when the result would not fit [`MAX_SHM_NAME_LEN`] with
/// one byte reserved for the trailing NUL.
pub fn segment_name_for_topic(topic: &str) -> Option<String> {
    if SHM_NAME_PREFIX.len() + topic.len() >= MAX_SHM_NAME_LEN {
        return None;
    }
    Some(format!("{SHM_NAME_PREFIX}{topic}"))
}
