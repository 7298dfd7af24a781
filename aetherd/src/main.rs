//! # aetherd - the aether topic daemon
//!
//! Owns one shared memory ring segment per topic and hands segment names
//! to subscribers over the control socket. Data traffic never passes
//! through this process.
//!
//! Signals: `SIGTERM`/`SIGINT` trigger a graceful shutdown, `SIGUSR1`
//! dumps per-topic statistics to the log. Handlers only set a flag; the
//! main loop does the work.

use aether::consts::DAEMON_SOCKET_PATH;
use aetherd::{Acceptor, TopicRegistry};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::flag;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAIN_LOOP_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    info!("aetherd starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    let dump_stats = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    flag::register(SIGUSR1, Arc::clone(&dump_stats))?;

    let registry = Arc::new(TopicRegistry::new());
    let acceptor = Acceptor::start(Path::new(DAEMON_SOCKET_PATH), Arc::clone(&registry))?;

    info!("aetherd ready");

    while !shutdown.load(Ordering::Relaxed) {
        // Clear before acting so a signal arriving mid-dump is not lost.
        if dump_stats.swap(false, Ordering::Relaxed) {
            registry.dump_stats();
        }
        std::thread::sleep(MAIN_LOOP_INTERVAL);
    }

    info!("aetherd shutting down");

    // Acceptor first: no new topics can appear while the registry is torn
    // down.
    acceptor.stop();
    registry.shutdown();

    info!("aetherd stopped");
    Ok(())
}
