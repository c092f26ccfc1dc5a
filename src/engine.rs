//! # Request Engine
//!
//! Purpose: Turn a pooled connection plus an encoded payload into a decoded
//! response, in one place, so `fetch`/`store`/`index`/`counter`/`bucket`
//! never touch pool checkout or frame I/O directly. Generalizes
//! `hkv-client::client`'s `execute_command` (acquire, send, read, release)
//! to this crate's TLV codec and server-error envelope.
//!
//! ## Design Principles
//! 1. **One Retry**: a write that fails on a pooled (possibly stale)
//!    connection is retried exactly once on a freshly dialed connection,
//!    mirroring `rkive/client.go`'s `redialLoop` philosophy without its
//!    unbounded retry.
//! 2. **Code Zero Is Always An Error**: before matching the expected
//!    response code, code 0 is decoded as [`crate::codec::ErrorResp`] and
//!    turned into `RiakError::Server`.
//! 3. **Release Exactly Once**: every path either calls `release_ok` or
//!    `release_err` on the connection it checked out — never both, never
//!    neither.

use crate::error::{RiakError, RiakResult};
use crate::frame;
use crate::pool::Pool;

const CODE_ERROR: u8 = 0;

/// Sends `payload` tagged with `req_code` and returns the raw response
/// payload, provided the response code equals `expect_code`.
///
/// `payload` must already have [`frame::HEADER_LEN`] bytes reserved at the
/// front (see [`frame::reserve_header`]); this function finishes the frame.
pub async fn unary(
    pool: &Pool,
    req_code: u8,
    expect_code: u8,
    mut payload: Vec<u8>,
) -> RiakResult<Vec<u8>> {
    frame::finish_frame(&mut payload, req_code);

    let mut conn = pool.acquire().await?;
    match conn.write_frame(&payload).await {
        Ok(()) => {}
        Err(first_err) => {
            pool.release_err(conn).await;
            tracing::debug!(error = %first_err, "write failed, retrying on a fresh connection");
            conn = pool.acquire().await?;
            if let Err(err) = conn.write_frame(&payload).await {
                pool.release_err(conn).await;
                return Err(err);
            }
        }
    }

    let mut resp = Vec::new();
    let code = match conn.read_frame(&mut resp).await {
        Ok(code) => code,
        Err(err) => {
            pool.release_err(conn).await;
            return Err(err);
        }
    };

    if code == CODE_ERROR {
        pool.release_ok(conn).await;
        let err = crate::codec::ErrorResp::decode(&resp)?;
        return Err(RiakError::Server {
            code: err.code,
            message: err.message,
        });
    }

    if code != expect_code {
        pool.release_err(conn).await;
        return Err(RiakError::Unexpected);
    }

    pool.release_ok(conn).await;
    Ok(resp)
}

/// A streaming response cursor (§4.I): repeatedly call [`StreamCursor::next`]
/// until it returns `Ok(None)`; the underlying connection is released back
/// to the pool on the first `done`/error/code-0 frame.
pub struct StreamCursor<'a> {
    pool: &'a Pool,
    conn: Option<crate::connection::Connection>,
    expect_code: u8,
    finished: bool,
}

impl<'a> StreamCursor<'a> {
    pub async fn open(
        pool: &'a Pool,
        req_code: u8,
        expect_code: u8,
        mut payload: Vec<u8>,
    ) -> RiakResult<Self> {
        frame::finish_frame(&mut payload, req_code);
        let mut conn = pool.acquire().await?;
        if let Err(err) = conn.write_frame(&payload).await {
            pool.release_err(conn).await;
            return Err(err);
        }
        Ok(StreamCursor {
            pool,
            conn: Some(conn),
            expect_code,
            finished: false,
        })
    }

    /// Reads the next frame. Returns `Ok(None)` once the stream completed
    /// cleanly and the connection has already been released.
    pub async fn next(&mut self) -> RiakResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Ok(None),
        };

        let mut resp = Vec::new();
        let code = match conn.read_frame(&mut resp).await {
            Ok(code) => code,
            Err(err) => {
                self.finish_err().await;
                return Err(err);
            }
        };

        if code == CODE_ERROR {
            let decoded = crate::codec::ErrorResp::decode(&resp);
            self.finish_ok().await;
            let err = decoded?;
            return Err(RiakError::Server {
                code: err.code,
                message: err.message,
            });
        }
        if code != self.expect_code {
            self.finish_err().await;
            return Err(RiakError::Unexpected);
        }

        Ok(Some(resp))
    }

    /// Marks the stream done (e.g. caller observed `IndexResp::done`) and
    /// releases the connection to the idle pool.
    pub async fn finish_ok(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release_ok(conn).await;
        }
        self.finished = true;
    }

    async fn finish_err(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release_err(conn).await;
        }
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_fixed_response(req_code: u8, resp_code: u8, resp_payload: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // startup ping from Pool::connect
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            sock.write_all(&[0, 0, 0, 1, 2]).await.unwrap();

            sock.read_exact(&mut header).await.unwrap();
            assert_eq!(header[4], req_code);
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize - 1;
            let mut payload = vec![0u8; len];
            if len > 0 {
                sock.read_exact(&mut payload).await.unwrap();
            }
            let mut resp = Vec::new();
            resp.extend_from_slice(&((resp_payload.len() + 1) as u32).to_be_bytes());
            resp.push(resp_code);
            resp.extend_from_slice(resp_payload);
            sock.write_all(&resp).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn unary_returns_payload_on_expected_code() {
        let addr = spawn_fixed_response(9, 10, b"hello").await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        let resp = unary(&pool, 9, 10, payload).await.unwrap();
        assert_eq!(resp, b"hello");
    }

    #[tokio::test]
    async fn unary_maps_code_zero_to_server_error() {
        let mut err_payload = Vec::new();
        // tag 48 = error code, tag 49 = message (see codec.rs)
        err_payload.push(48);
        err_payload.extend_from_slice(&4u32.to_be_bytes());
        err_payload.extend_from_slice(&7u32.to_be_bytes());
        err_payload.push(49);
        err_payload.extend_from_slice(&5u32.to_be_bytes());
        err_payload.extend_from_slice(b"nope!");

        let addr = spawn_fixed_response(9, 0, Box::leak(err_payload.into_boxed_slice())).await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        let err = unary(&pool, 9, 10, payload).await.unwrap_err();
        match err {
            RiakError::Server { code, message } => {
                assert_eq!(code, 7);
                assert_eq!(message, b"nope!");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unary_rejects_unexpected_code() {
        let addr = spawn_fixed_response(9, 99, b"").await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        let err = unary(&pool, 9, 10, payload).await.unwrap_err();
        assert!(matches!(err, RiakError::Unexpected));
    }
}
