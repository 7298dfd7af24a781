//! Aether bus constants.
//!
//! These constants define the fundamental parameters of the aether message
//! bus. They are the single source of truth - all other crates import from
//! here.

/// Maximum payload bytes a single message can occupy in a ring slot.
///
/// 4KB = one memory page, a natural allocation unit. Publishing a larger
/// payload is rejected outright - there is no silent truncation.
pub const SLOT_DATA_SIZE: usize = 4096;

/// CPU cache line size in bytes.
///
/// Used for memory alignment so that adjacent ring slots never share a
/// cache line. 64 bytes is the standard line size on modern x86-64.
pub const CACHE_LINE_SIZE: usize = 64;

/// Maximum topic name length in bytes.
pub const MAX_TOPIC_LEN: usize = 64;

/// Maximum shared memory segment name length, including the NUL byte
/// reserved at the end.
pub const MAX_SHM_NAME_LEN: usize = 64;

/// Prefix for all per-topic segment names: `"/aether_" + topic`.
pub const SHM_NAME_PREFIX: &str = "/aether_";

/// Well-known path of the daemon's control socket.
pub const DAEMON_SOCKET_PATH: &str = "/tmp/aetherd.sock";

/// Ring capacity (slot count) the daemon uses for new topics.
pub const DEFAULT_TOPIC_CAPACITY: u32 = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_data_size_is_page_size() {
        assert_eq!(SLOT_DATA_SIZE, 4096);
    }

    #[test]
    fn test_cache_line_size() {
        assert_eq!(CACHE_LINE_SIZE, 64);
    }

    #[test]
    fn test_prefix_leaves_room_for_topic() {
        // The prefix plus at least a one-byte topic plus the NUL must fit.
        assert!(SHM_NAME_PREFIX.len() + 1 < MAX_SHM_NAME_LEN);
        assert!(SHM_NAME_PREFIX.starts_with('/'));
    }

    #[test]
    fn test_default_capacity_nonzero() {
        assert!(DEFAULT_TOPIC_CAPACITY > 0);
    }
}
