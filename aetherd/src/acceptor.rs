//! Control-socket acceptor.
//!
//! A dedicated thread accepts connections on a Unix stream socket and
//! serves exactly one fixed-size request/response per connection. Clients
//! that violate the framing are dropped without a response; the daemon
//! never terminates on a bad client.
//!
//! The listener runs non-blocking and the loop polls a shutdown flag
//! between accepts, so [`Acceptor::stop`] returns only after the thread
//! has exited and the socket file is gone.

use crate::registry::TopicRegistry;
use aether::control::{ControlStatus, SubscribeRequest, SubscribeResponse, REQUEST_WIRE_SIZE};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to the acceptor thread.
pub struct Acceptor {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    socket_path: PathBuf,
}

impl Acceptor {
    /// Bind the control socket and start the acceptor thread.
    ///
    /// A stale socket file from a previous run is removed first - binding
    /// would fail otherwise.
    pub fn start(
        socket_path: &Path,
        registry: Arc<TopicRegistry>,
    ) -> std::io::Result<Self> {
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        info!("acceptor listening on {}", socket_path.display());

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || accept_loop(listener, registry, flag));

        Ok(Self {
            shutdown,
            handle: Some(handle),
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Stop the acceptor thread, join it, and unlink the socket file.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!("acceptor stopped");
    }
}

fn accept_loop(listener: UnixListener, registry: Arc<TopicRegistry>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _addr)) => handle_client(stream, &registry),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!("accept failed: {}", e);
                break;
            }
        }
    }
}

/// Serve one connection: read one request, write one response, close.
fn handle_client(mut stream: UnixStream, registry: &TopicRegistry) {
    // The listener's non-blocking mode is inherited by accepted streams.
    if let Err(e) = stream.set_nonblocking(false) {
        warn!("dropping client: {}", e);
        return;
    }

    let mut buf = [0u8; REQUEST_WIRE_SIZE];
    if let Err(e) = stream.read_exact(&mut buf) {
        // Short request - protocol error, no response.
        warn!("dropping client: short request ({})", e);
        return;
    }

    let request = SubscribeRequest::decode(&buf);
    let Some(topic_bytes) = request.topic() else {
        warn!(
            "dropping client: topic_len {} out of range",
            request.topic_len
        );
        return;
    };

    let response = match std::str::from_utf8(topic_bytes) {
        Ok(topic) => match registry.subscribe(topic) {
            Ok((shm_name, capacity)) => SubscribeResponse::ok(&shm_name, capacity)
                .unwrap_or_else(|| SubscribeResponse::failure(ControlStatus::InternalError)),
            Err(e) => {
                warn!("subscribe failed: {}", e);
                SubscribeResponse::failure(ControlStatus::InternalError)
            }
        },
        Err(_) => {
            warn!("subscribe failed: topic is not UTF-8");
            SubscribeResponse::failure(ControlStatus::InternalError)
        }
    };

    if let Err(e) = stream.write_all(&response.encode()) {
        warn!("client went away before response: {}", e);
    }
}
