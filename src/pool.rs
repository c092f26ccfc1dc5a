//! # Connection Pool
//!
//! Purpose: Share a bounded number of [`Connection`]s across every address
//! in the node list (§4.C), lazily dialing, recycling on success, and
//! closing on error. Generalizes `hkv-client::pool::ConnectionPool`'s shape
//! (idle free list behind a `Mutex`, RAII-released lease, live/in-use
//! counters) from a single fixed address to a randomized permutation over
//! `rkive/client.go`'s node list, replacing `rkive`'s fixed per-node channel
//! pool with one shared ceiling (spec §3/§6 REDESIGN: bounded pool across N
//! nodes, not N independent per-node tunnels).
//!
//! ## Design Principles
//! 1. **One Ceiling, Many Nodes**: `max_total` bounds the whole pool, not
//!    any one address; a busy address is simply skipped in favor of another.
//! 2. **Lazy Dial**: connections are opened on demand, never eagerly, except
//!    for the one startup `Ping` used to fail fast on a wholly unreachable
//!    cluster.
//! 3. **RAII Release**: a checked-out connection always returns to the pool
//!    (or is dropped on error) via `Drop`, mirroring the teacher's
//!    `PooledConnection`.
//! 4. **Idempotent Close**: closing twice, or acquiring after close, is an
//!    error (`RiakError::Closed`), never a panic.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::lookup_host;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{RiakError, RiakResult};

/// Fixed pool ceiling shared across every node address (spec §6).
pub const MAX_TOTAL: usize = 30;

/// How long `acquire` waits to be woken before re-checking capacity.
const WAIT_POLL: Duration = Duration::from_millis(50);

enum LifecycleState {
    Open,
    Closing,
    Closed,
}

struct PoolState {
    idle: VecDeque<Connection>,
    lifecycle: LifecycleState,
}

struct PoolInner {
    addrs: Vec<SocketAddr>,
    client_id: Option<Vec<u8>>,
    state: Mutex<PoolState>,
    live: AtomicUsize,
    in_use: AtomicUsize,
    notify: Notify,
}

/// A bounded pool of connections to a Riak-style cluster's nodes.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Resolves every address in `nodes`, dials one connection to confirm
    /// reachability, then returns a pool ready to lend connections.
    ///
    /// Mirrors `rkive::Dial`: DNS resolution happens eagerly and a failure
    /// here fails construction outright rather than surfacing later.
    pub async fn connect(nodes: &[String], client_id: Option<Vec<u8>>) -> RiakResult<Self> {
        let mut addrs = Vec::new();
        for node in nodes {
            let mut resolved = lookup_host(node).await?;
            let addr = resolved.next().ok_or(RiakError::Unavail)?;
            addrs.push(addr);
        }
        if addrs.is_empty() {
            return Err(RiakError::Unavail);
        }

        let inner = Arc::new(PoolInner {
            addrs,
            client_id,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                lifecycle: LifecycleState::Open,
            }),
            live: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
            notify: Notify::new(),
        });
        let pool = Pool { inner };

        // Startup probe: fail fast if nothing in the cluster answers.
        let probe = pool.acquire().await?;
        pool.release_ok(probe).await;

        Ok(pool)
    }

    /// Checks out a connection, reusing an idle one when available or
    /// dialing a fresh one against a random permutation of the node list.
    pub async fn acquire(&self) -> RiakResult<Connection> {
        loop {
            {
                let mut state = self.inner.state.lock().await;
                match state.lifecycle {
                    LifecycleState::Open => {}
                    LifecycleState::Closing | LifecycleState::Closed => {
                        return Err(RiakError::Closed);
                    }
                }
                if let Some(conn) = state.idle.pop_front() {
                    self.inner.in_use.fetch_add(1, Ordering::SeqCst);
                    return Ok(conn);
                }
                if self.inner.live.load(Ordering::SeqCst) < MAX_TOTAL {
                    self.inner.live.fetch_add(1, Ordering::SeqCst);
                    self.inner.in_use.fetch_add(1, Ordering::SeqCst);
                    drop(state);
                    return self.dial_any().await.map_err(|err| {
                        self.inner.live.fetch_sub(1, Ordering::SeqCst);
                        self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
                        err
                    });
                }
            }
            tokio::select! {
                _ = self.inner.notify.notified() => {}
                _ = tokio::time::sleep(WAIT_POLL) => {}
            }
        }
    }

    async fn dial_any(&self) -> RiakResult<Connection> {
        let mut order = self.inner.addrs.clone();
        order.shuffle(&mut rand::thread_rng());

        let mut last_err = RiakError::Unavail;
        for addr in order {
            match Connection::connect(addr, self.inner.client_id.as_deref()).await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    warn!(?addr, "dial failed, trying next node");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Returns a healthy connection to the idle list.
    pub async fn release_ok(&self, conn: Connection) {
        let mut state = self.inner.state.lock().await;
        match state.lifecycle {
            LifecycleState::Open => {
                state.idle.push_back(conn);
                self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
                drop(state);
                self.inner.notify.notify_one();
            }
            LifecycleState::Closing | LifecycleState::Closed => {
                drop(state);
                self.drop_dead(conn);
            }
        }
    }

    /// Tests a connection that errored mid-request with a lightweight ping
    /// before giving up on it (spec §4.C): a successful ping proves it's
    /// still healthy and it rejoins the idle list exactly like
    /// `release_ok`; a failed ping closes it, shrinking the live count so a
    /// future `acquire` can dial a replacement. Mirrors `rkive/client.go`'s
    /// `err(n)` (`Ping` then requeue-or-redial).
    pub async fn release_err(&self, mut conn: Connection) {
        if conn.ping().await.is_ok() {
            self.release_ok(conn).await;
            return;
        }
        self.drop_dead(conn);
        self.inner.notify.notify_one();
    }

    fn drop_dead(&self, mut conn: Connection) {
        conn.close();
        self.inner.live.fetch_sub(1, Ordering::SeqCst);
        self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
    }

    /// Closes the pool: new `acquire` calls fail immediately, idle
    /// connections are dropped, and the call waits (bounded) for in-flight
    /// connections to be released before returning.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock().await;
            match state.lifecycle {
                LifecycleState::Open => state.lifecycle = LifecycleState::Closing,
                LifecycleState::Closing | LifecycleState::Closed => return,
            }
            while let Some(mut conn) = state.idle.pop_front() {
                conn.close();
                self.inner.live.fetch_sub(1, Ordering::SeqCst);
            }
        }

        for _ in 0..20 {
            if self.inner.in_use.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut state = self.inner.state.lock().await;
        state.lifecycle = LifecycleState::Closed;
        debug!("pool closed");
    }

    pub fn live_count(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn in_use_count(&self) -> usize {
        self.inner.in_use.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    loop {
                        let mut header = [0u8; 5];
                        if sock.read_exact(&mut header).await.is_err() {
                            return;
                        }
                        let len =
                            u32::from_be_bytes([header[0], header[1], header[2], header[3]])
                                as usize
                                - 1;
                        let mut payload = vec![0u8; len];
                        if len > 0 && sock.read_exact(&mut payload).await.is_err() {
                            return;
                        }
                        let code = header[4];
                        let resp_code = if code == 1 { 2 } else { 6 };
                        if sock
                            .write_all(&[0, 0, 0, 1, resp_code])
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                });
            }
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn acquires_and_releases_a_connection() {
        let addr = spawn_echo_server().await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        assert_eq!(pool.live_count(), 1);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.in_use_count(), 1);
        pool.release_ok(conn).await;
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn close_rejects_further_acquires() {
        let addr = spawn_echo_server().await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        pool.close().await;
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, RiakError::Closed));
    }

    #[tokio::test]
    async fn connect_fails_fast_when_unreachable() {
        let err = Pool::connect(&["127.0.0.1:1".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, RiakError::Unavail | RiakError::Io(_)));
    }

    #[tokio::test]
    async fn release_err_recycles_a_connection_that_still_pings_healthy() {
        let addr = spawn_echo_server().await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        let conn = pool.acquire().await.unwrap();

        pool.release_err(conn).await;
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.live_count(), 1);

        // Reacquiring should come from the idle list the ping rejoined,
        // not a fresh dial.
        let _conn = pool.acquire().await.unwrap();
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn release_err_closes_a_connection_that_fails_the_ping() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // answer the handshake ping once, then hang up so the
            // `release_err` health probe finds a dead connection.
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            sock.write_all(&[0, 0, 0, 1, 2]).await.unwrap();
        });

        let pool = Pool::connect(&[addr], None).await.unwrap();
        let conn = pool.acquire().await.unwrap();

        pool.release_err(conn).await;
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.live_count(), 0);
    }
}
