// Matchmaking queue and session-slot accounting.
//
// `Coordinator` is the only state shared between threads: the accept
// thread enqueues new players, the scheduler pairs them and pushes queue
// position updates, and session workers requeue players when a game ends.
// Everything lives behind one mutex, so any compound operation (a draw
// requeueing two players, a pairing pass) is atomic with respect to the
// others. Sends happen while the lock is held. Every connection carries a
// write timeout (`player::WRITE_TIMEOUT`), so a peer that stops reading
// stalls the queue for at most that long before it is marked dead.
// Liveness checks use the non-blocking `PlayerConnection::probe()`.
//
// Queue-position bookkeeping: for every queued connection the coordinator
// remembers the last position it told that player. `broadcast_positions`
// only sends a `Q` line when the position changed, and a requeue records
// the notice it sends, so the next tick does not repeat it. An entry is
// dropped as soon as its connection leaves the queue.
//
// Active sessions are counted with an atomic decremented by `SessionSlot`'s
// `Drop`, so a session worker that panics still releases its slot.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arena_protocol::{QueuePosition, ServerMessage, WinStreak};
use tracing::{debug, info, warn};

use crate::player::{ConnectionId, PlayerConnection};

/// Two players taken off the queue, plus the slot their session occupies.
/// `first` was ahead in the queue and plays X.
#[derive(Debug)]
pub struct MatchPair {
    pub first: PlayerConnection,
    pub second: PlayerConnection,
    pub slot: SessionSlot,
}

/// Holds one unit of the active-session count until dropped.
#[derive(Debug)]
pub struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MatchQueue {
    waiting: VecDeque<PlayerConnection>,
    last_sent: HashMap<ConnectionId, QueuePosition>,
}

impl MatchQueue {
    fn contains(&self, id: ConnectionId) -> bool {
        self.waiting.iter().any(|c| c.id() == id)
    }

    /// Tell the connection at `index` its position and remember it.
    fn notify(&mut self, index: usize) -> Option<QueuePosition> {
        let position = QueuePosition::from_rank(index + 1)?;
        let conn = self.waiting.get_mut(index)?;
        conn.send(&ServerMessage::QueuePosition(position));
        self.last_sent.insert(conn.id(), position);
        Some(position)
    }

    /// Pop the front connection, discarding dead ones on the way. The
    /// survivor keeps its `last_sent` entry until it is actually paired.
    fn pop_live(&mut self) -> Option<PlayerConnection> {
        while let Some(mut conn) = self.waiting.pop_front() {
            if conn.probe() {
                return Some(conn);
            }
            self.last_sent.remove(&conn.id());
            info!(connection = %conn.id(), "dropping dead connection from queue");
        }
        None
    }

    fn prune_dead(&mut self) {
        let MatchQueue { waiting, last_sent } = self;
        waiting.retain_mut(|conn| {
            let alive = conn.probe();
            if !alive {
                last_sent.remove(&conn.id());
                info!(connection = %conn.id(), "dropping dead connection from queue");
            }
            alive
        });
    }

    /// Shared checks for requeueing a player who just finished a game.
    fn admit(&self, conn: &mut PlayerConnection) -> bool {
        if self.contains(conn.id()) {
            warn!(connection = %conn.id(), "refusing to queue a connection twice");
            return false;
        }
        if !conn.probe() {
            debug!(connection = %conn.id(), "not requeueing dead connection");
            return false;
        }
        conn.clear_assignment();
        true
    }
}

pub struct Coordinator {
    queue: Mutex<MatchQueue>,
    active: Arc<AtomicUsize>,
    max_sessions: usize,
}

impl Coordinator {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::default()),
            active: Arc::new(AtomicUsize::new(0)),
            max_sessions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MatchQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a newly accepted player at the tail. A player joining an empty
    /// queue is told it is waiting. Returns false if the connection is
    /// already queued.
    pub fn enqueue(&self, mut conn: PlayerConnection) -> bool {
        let mut queue = self.lock();
        if queue.contains(conn.id()) {
            warn!(connection = %conn.id(), "refusing to queue a connection twice");
            return false;
        }
        if queue.waiting.is_empty() {
            conn.send(&ServerMessage::Waiting);
        }
        info!(connection = %conn.id(), queued = queue.waiting.len() + 1, "player queued");
        queue.waiting.push_back(conn);
        true
    }

    /// Put a player at the head of the queue (a winner choosing to play
    /// again) and send it its new position. `None` if the player was not
    /// queued because it is gone or already present.
    pub fn requeue_front(&self, mut conn: PlayerConnection) -> Option<QueuePosition> {
        let mut queue = self.lock();
        if !queue.admit(&mut conn) {
            return None;
        }
        info!(connection = %conn.id(), "player requeued at front");
        queue.waiting.push_front(conn);
        queue.notify(0)
    }

    /// Append a player after a finished game and send it its position.
    pub fn requeue_back(&self, mut conn: PlayerConnection) -> Option<QueuePosition> {
        let mut queue = self.lock();
        if !queue.admit(&mut conn) {
            return None;
        }
        info!(connection = %conn.id(), "player requeued at back");
        queue.waiting.push_back(conn);
        let index = queue.waiting.len() - 1;
        queue.notify(index)
    }

    /// Append both players of a drawn game, `first` then `second`, in one
    /// critical section so nobody can join between them.
    pub fn requeue_draw_pair(
        &self,
        first: PlayerConnection,
        second: PlayerConnection,
    ) -> [Option<QueuePosition>; 2] {
        let mut queue = self.lock();
        let mut positions = [None, None];
        for (i, mut conn) in [first, second].into_iter().enumerate() {
            if !queue.admit(&mut conn) {
                continue;
            }
            info!(connection = %conn.id(), "player requeued after draw");
            queue.waiting.push_back(conn);
            let index = queue.waiting.len() - 1;
            positions[i] = queue.notify(index);
        }
        positions
    }

    /// Take as many pairs off the front as the session cap allows. Dead
    /// connections met on the way are discarded.
    pub fn take_ready_pairs(&self) -> Vec<MatchPair> {
        let mut pairs = Vec::new();
        let mut queue = self.lock();
        while self.active.load(Ordering::SeqCst) < self.max_sessions && queue.waiting.len() >= 2 {
            let Some(first) = queue.pop_live() else {
                break;
            };
            let Some(second) = queue.pop_live() else {
                queue.waiting.push_front(first);
                break;
            };
            queue.last_sent.remove(&first.id());
            queue.last_sent.remove(&second.id());
            self.active.fetch_add(1, Ordering::SeqCst);
            info!(x = %first.id(), o = %second.id(), "paired players");
            pairs.push(MatchPair {
                first,
                second,
                slot: SessionSlot {
                    active: Arc::clone(&self.active),
                },
            });
        }
        pairs
    }

    /// Drop dead queued connections, then send each remaining player its
    /// position if it changed since the last notice. Returns the number of
    /// notices sent.
    pub fn broadcast_positions(&self) -> usize {
        let mut queue = self.lock();
        queue.prune_dead();
        let MatchQueue { waiting, last_sent } = &mut *queue;
        let mut sent = 0;
        for (index, conn) in waiting.iter_mut().enumerate() {
            let Some(position) = QueuePosition::from_rank(index + 1) else {
                continue;
            };
            if last_sent.get(&conn.id()) == Some(&position) {
                continue;
            }
            conn.send(&ServerMessage::QueuePosition(position));
            last_sent.insert(conn.id(), position);
            sent += 1;
        }
        sent
    }

    pub fn queued_len(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Queued connection ids, front first.
    pub fn queued_ids(&self) -> Vec<ConnectionId> {
        self.lock().waiting.iter().map(PlayerConnection::id).collect()
    }

    /// Queued connections with their current streaks, front first.
    pub fn queued_players(&self) -> Vec<(ConnectionId, WinStreak)> {
        self.lock()
            .waiting
            .iter()
            .map(|c| (c.id(), c.streak()))
            .collect()
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

}
