//! # Connection
//!
//! Purpose: Own a single TCP session to one node: dial, handshake, carry
//! framed request/response traffic under a deadline, and close idempotently.
//! Grounded in `rkive/node.go`'s `node` type (`Dial`, deadlined `Write`/`Read`,
//! `Err`/`Drop`) and `rkive/client.go`'s `writeClientID` handshake, rewritten
//! against `tokio::net::TcpStream` instead of blocking `net.Conn`.
//!
//! ## Design Principles
//! 1. **One Session, One Struct**: no retry or pooling logic lives here —
//!    that's `pool.rs`'s job. A `Connection` either works or reports an error.
//! 2. **Deadlined I/O**: every request/response round trip is wrapped in
//!    [`tokio::time::timeout`] at the fixed 1,000 ms the server protocol uses.
//! 3. **Idempotent Close**: `close()` can be called more than once (e.g. once
//!    by the pool on error, once by `Drop`) without panicking.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec::SetClientIdReq;
use crate::error::{RiakError, RiakResult};
use crate::frame;

/// Deadline applied to every individual socket read/write (spec §6).
pub const IO_DEADLINE: Duration = Duration::from_millis(1000);

/// Message codes used by the handshake/liveness probe.
const CODE_PING_REQ: u8 = 1;
const CODE_PING_RESP: u8 = 2;
const CODE_SET_CLIENT_ID_REQ: u8 = 5;
const CODE_SET_CLIENT_ID_RESP: u8 = 6;

/// A single TCP session, handshaken and ready to carry framed requests.
///
/// Lifecycle: `connect` drives the socket through `FRESH -> HANDSHAKEN`; the
/// pool then cycles it between `IDLE` and `BUSY` by lending out `&mut`
/// access; `close` moves it to `CLOSED` for good.
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    closed: bool,
}

impl Connection {
    /// Dials `addr`, sets `TCP_NODELAY` and a keepalive, then performs the
    /// client-ID handshake (or a bare ping when no client ID is configured).
    pub async fn connect(addr: SocketAddr, client_id: Option<&[u8]>) -> RiakResult<Self> {
        let stream = timeout(IO_DEADLINE, TcpStream::connect(addr)).await??;
        stream.set_nodelay(true)?;
        apply_keepalive(&stream)?;

        let mut conn = Connection {
            stream,
            addr,
            closed: false,
        };

        match client_id {
            Some(id) => conn.write_client_id(id).await?,
            None => conn.handshake_ping().await?,
        }

        Ok(conn)
    }

    async fn write_client_id(&mut self, client_id: &[u8]) -> RiakResult<()> {
        let req = SetClientIdReq {
            client_id: client_id.to_vec(),
        };
        let mut buf = Vec::new();
        frame::reserve_header(&mut buf);
        buf.extend_from_slice(&req.encode());
        frame::finish_frame(&mut buf, CODE_SET_CLIENT_ID_REQ);

        timeout(IO_DEADLINE, frame::write_frame(&mut self.stream, &buf)).await??;

        let mut resp = Vec::new();
        let code = timeout(IO_DEADLINE, frame::read_frame(&mut self.stream, &mut resp)).await??;
        if code != CODE_SET_CLIENT_ID_RESP {
            return Err(RiakError::Unexpected);
        }
        Ok(())
    }

    /// Used when no client ID is configured: a bare ping round trip proves
    /// the connection is live, mirroring `rkive`'s fallback handshake path.
    async fn handshake_ping(&mut self) -> RiakResult<()> {
        self.ping().await
    }

    /// Sends a 5-byte ping frame and confirms the matching pong code.
    pub async fn ping(&mut self) -> RiakResult<()> {
        let mut buf = Vec::new();
        frame::reserve_header(&mut buf);
        frame::finish_frame(&mut buf, CODE_PING_REQ);
        debug_assert_eq!(buf.len(), frame::HEADER_LEN);

        timeout(IO_DEADLINE, frame::write_frame(&mut self.stream, &buf)).await??;

        let mut resp = Vec::new();
        let code = timeout(IO_DEADLINE, frame::read_frame(&mut self.stream, &mut resp)).await??;
        if code != CODE_PING_RESP {
            return Err(RiakError::Unexpected);
        }
        Ok(())
    }

    /// Writes a request frame under the fixed I/O deadline.
    pub async fn write_frame(&mut self, buf: &[u8]) -> RiakResult<()> {
        timeout(IO_DEADLINE, frame::write_frame(&mut self.stream, buf)).await?
    }

    /// Reads one response frame under the fixed I/O deadline.
    pub async fn read_frame(&mut self, buf: &mut Vec<u8>) -> RiakResult<u8> {
        timeout(IO_DEADLINE, frame::read_frame(&mut self.stream, buf)).await?
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shuts the socket down. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = SockRef::from(&self.stream).set_linger(Some(Duration::from_secs(0)));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_keepalive(stream: &TcpStream) -> RiakResult<()> {
    let sock_ref = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(60));
    sock_ref.set_tcp_keepalive(&keepalive)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_and_handshakes_via_ping() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            assert_eq!(header[4], CODE_PING_REQ);
            sock.write_all(&[0, 0, 0, 1, CODE_PING_RESP]).await.unwrap();
        });

        let conn = Connection::connect(addr, None).await.unwrap();
        assert!(!conn.is_closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn write_client_id_expects_matching_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            assert_eq!(header[4], CODE_SET_CLIENT_ID_REQ);
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize - 1;
            let mut payload = vec![0u8; len];
            sock.read_exact(&mut payload).await.unwrap();
            sock.write_all(&[0, 0, 0, 1, CODE_SET_CLIENT_ID_RESP])
                .await
                .unwrap();
        });

        let conn = Connection::connect(addr, Some(b"client-42")).await.unwrap();
        assert!(!conn.is_closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            sock.write_all(&[0, 0, 0, 1, CODE_PING_RESP]).await.unwrap();
        });
        let mut conn = Connection::connect(addr, None).await.unwrap();
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        server.await.unwrap();
    }
}
