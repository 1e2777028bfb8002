// TCP listener, scheduler, and lifecycle for the arena server.
//
// Architecture: three kinds of threads around one shared `Coordinator`.
//
// - **Accept thread**: non-blocking `TcpListener::accept()` loop. Each new
//   stream is switched back to blocking mode, wrapped in a
//   `PlayerConnection`, and appended to the queue. Polls `keep_running`
//   between accepts.
// - **Scheduler thread**: wakes every `tick_ms` (a `recv_timeout` on the
//   shutdown channel doubles as the timer), pairs queued players into new
//   sessions up to `max_sessions`, then sends queue-position updates to
//   whoever is still waiting.
// - **Session workers**: a `WorkerPool` of `max_sessions` threads, each
//   running one `GameSession` to completion at a time.
//
// Sessions are constructed on the scheduler thread, so the opening `x`/`o`
// and board lines go out before the tick's position updates. Each session
// gets its own PRNG forked from the scheduler's, so a configured seed makes
// draw ordering reproducible.
//
// Shutdown: `ServerHandle::stop` clears `keep_running` and signals the
// scheduler. Sessions already in progress are left to finish on their own.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arena_prng::ArenaRng;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ArenaError, Result};
use crate::matchmaking::{Coordinator, MatchPair};
use crate::player::PlayerConnection;
use crate::pool::WorkerPool;
use crate::session::{GameSession, SessionId};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Handle returned by [`start_server`] to observe and stop the server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    accept_thread: Option<JoinHandle<()>>,
    scheduler_thread: Option<JoinHandle<()>>,
    coordinator: Arc<Coordinator>,
}

impl ServerHandle {
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Stop accepting players and stop scheduling, then wait for both
    /// threads to exit.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
        for handle in [self.accept_thread.take(), self.scheduler_thread.take()]
            .into_iter()
            .flatten()
        {
            let _ = handle.join();
        }
        info!("arena server stopped");
    }

    /// Block until the accept thread exits, which only happens after
    /// `stop` from elsewhere or a fatal listener error.
    pub fn wait(mut self) {
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.scheduler_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bind the listener and start the accept and scheduler threads.
/// Returns the handle and the bound address (useful with port 0).
pub fn start_server(config: ServerConfig) -> Result<(ServerHandle, SocketAddr)> {
    config.validate()?;
    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).map_err(|source| ArenaError::Bind {
        addr: bind_addr.clone(),
        source,
    })?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let coordinator = Arc::new(Coordinator::new(config.max_sessions));
    let pool = WorkerPool::new(config.max_sessions)?;
    let rng = match config.seed {
        Some(seed) => ArenaRng::new(seed),
        None => ArenaRng::from_entropy(),
    };
    let keep_running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    let accept_thread = {
        let coordinator = Arc::clone(&coordinator);
        let keep_running = Arc::clone(&keep_running);
        thread::Builder::new()
            .name("arena-accept".into())
            .spawn(move || accept_loop(listener, coordinator, keep_running))?
    };

    let scheduler = Scheduler {
        coordinator: Arc::clone(&coordinator),
        pool,
        rng,
        next_session: 1,
    };
    let tick = config.tick_interval();
    let scheduler_thread = thread::Builder::new()
        .name("arena-scheduler".into())
        .spawn(move || scheduler.run(tick, shutdown_rx))?;

    info!(
        %addr,
        tick_ms = config.tick_ms,
        max_sessions = config.max_sessions,
        seeded = config.seed.is_some(),
        "arena server listening"
    );

    Ok((
        ServerHandle {
            keep_running,
            shutdown_tx,
            accept_thread: Some(accept_thread),
            scheduler_thread: Some(scheduler_thread),
            coordinator,
        },
        addr,
    ))
}

fn accept_loop(listener: TcpListener, coordinator: Arc<Coordinator>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%peer, error = %e, "dropping connection: cannot make socket blocking");
                    continue;
                }
                match PlayerConnection::new(stream) {
                    Ok(conn) => {
                        info!(connection = %conn.id(), %peer, "player connected");
                        coordinator.enqueue(conn);
                    }
                    Err(e) => warn!(%peer, error = %e, "dropping connection"),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    debug!("accept loop exited");
}

struct Scheduler {
    coordinator: Arc<Coordinator>,
    pool: WorkerPool,
    rng: ArenaRng,
    next_session: u64,
}

impl Scheduler {
    fn run(mut self, tick: Duration, shutdown_rx: Receiver<()>) {
        loop {
            match shutdown_rx.recv_timeout(tick) {
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("scheduler exited");
    }

    /// Start every session the queue and cap allow, then refresh queue
    /// positions for everyone still waiting.
    fn tick(&mut self) {
        for pair in self.coordinator.take_ready_pairs() {
            self.start_session(pair);
        }
        let sent = self.coordinator.broadcast_positions();
        if sent > 0 {
            debug!(sent, queued = self.coordinator.queued_len(), "queue positions sent");
        }
    }

    fn start_session(&mut self, pair: MatchPair) {
        let MatchPair {
            first,
            second,
            slot,
        } = pair;
        let id = SessionId(self.next_session);
        self.next_session += 1;

        let session = GameSession::new(
            id,
            first,
            second,
            Arc::clone(&self.coordinator),
            self.rng.fork(),
        );
        let accepted = self.pool.execute(move || {
            let _slot = slot;
            let outcome = session.run();
            info!(session = %id, ?outcome, "session finished");
        });
        if !accepted {
            error!(session = %id, "worker pool closed, dropping session");
        }
    }
}
