//! # CRDT Counter
//!
//! Purpose: A server-resolved integer counter, immune to the sibling
//! divergence plain objects face. Grounded in `rkive/counter.go`'s
//! `Counter`/`Add`/`Refresh` and `rkive/bucket.go`'s `NewCounter`/`GetCounter`.
//!
//! ## Design Principles
//! 1. **No Vclock, No Merge**: the server resolves concurrent counter
//!    updates itself; this crate never attempts to merge counter values
//!    client-side.
//! 2. **`add` Always Round-Trips the New Total**: every `add` call sets
//!    `Returnvalue = true` so the counter's local `value` stays in sync
//!    with the server's resolved total without a separate `refresh`.
//! 3. **Construction Is A Round Trip**: unlike a plain object, a `Counter`
//!    handle is only ever produced by [`new_counter`] (an update with a
//!    starting amount) or [`get_counter`] (a plain read) — there is no bare
//!    local constructor, since a counter with no server-confirmed value
//!    isn't meaningful.

use crate::engine;
use crate::error::RiakResult;
use crate::frame;
use crate::pool::Pool;

const CODE_COUNTER_UPDATE_REQ: u8 = 50;
const CODE_COUNTER_UPDATE_RESP: u8 = 51;
const CODE_COUNTER_GET_REQ: u8 = 52;
const CODE_COUNTER_GET_RESP: u8 = 53;

/// A counter bound to a bucket/key, tracking the last value observed from
/// the server.
#[derive(Debug, Clone)]
pub struct Counter {
    bucket: Vec<u8>,
    key: Vec<u8>,
    value: i64,
}

/// Creates (or reinitializes) a counter at `bucket`/`key` with starting
/// value `start`, returning a handle tracking the server-confirmed total.
pub async fn new_counter(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    start: i64,
) -> RiakResult<Counter> {
    let mut counter = Counter {
        bucket: bucket.to_vec(),
        key: key.to_vec(),
        value: 0,
    };
    counter.add(pool, start).await?;
    Ok(counter)
}

/// Reads a counter's current value from the server (message codes 52/53).
pub async fn get_counter(pool: &Pool, bucket: &[u8], key: &[u8]) -> RiakResult<Counter> {
    let mut counter = Counter {
        bucket: bucket.to_vec(),
        key: key.to_vec(),
        value: 0,
    };
    counter.refresh(pool).await?;
    Ok(counter)
}

impl Counter {
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn bucket(&self) -> &[u8] {
        &self.bucket
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Applies `amount` (positive or negative) server-side and updates
    /// `self.value` to the server's resolved total.
    pub async fn add(&mut self, pool: &Pool, amount: i64) -> RiakResult<i64> {
        let req = crate::codec::CounterUpdateReq {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            amount,
            returnvalue: true,
        };
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        payload.extend_from_slice(&req.encode());

        let resp = engine::unary(
            pool,
            CODE_COUNTER_UPDATE_REQ,
            CODE_COUNTER_UPDATE_RESP,
            payload,
        )
        .await?;
        let decoded = crate::codec::CounterUpdateResp::decode(&resp)?;
        self.value = decoded.value;
        Ok(self.value)
    }

    /// Re-reads the counter's current value from the server.
    pub async fn refresh(&mut self, pool: &Pool) -> RiakResult<i64> {
        let req = crate::codec::CounterGetReq {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
        };
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        payload.extend_from_slice(&req.encode());

        let resp =
            engine::unary(pool, CODE_COUNTER_GET_REQ, CODE_COUNTER_GET_RESP, payload).await?;
        let decoded = crate::codec::CounterGetResp::decode(&resp)?;
        self.value = decoded.value;
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_counter_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // startup ping
            let mut header = [0u8; 5];
            sock.read_exact(&mut header).await.unwrap();
            sock.write_all(&[0, 0, 0, 1, 2]).await.unwrap();

            // counter update request
            sock.read_exact(&mut header).await.unwrap();
            assert_eq!(header[4], CODE_COUNTER_UPDATE_REQ);
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize - 1;
            let mut payload = vec![0u8; len];
            sock.read_exact(&mut payload).await.unwrap();

            let mut resp_payload = Vec::new();
            resp_payload.push(43); // tag 43 = counter value (see codec.rs)
            resp_payload.extend_from_slice(&8u32.to_be_bytes());
            resp_payload.extend_from_slice(&5i64.to_be_bytes());

            let mut resp = Vec::new();
            resp.extend_from_slice(&((resp_payload.len() + 1) as u32).to_be_bytes());
            resp.push(CODE_COUNTER_UPDATE_RESP);
            resp.extend_from_slice(&resp_payload);
            sock.write_all(&resp).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn new_counter_applies_starting_amount() {
        let addr = spawn_counter_server().await;
        let pool = Pool::connect(&[addr], None).await.unwrap();
        let counter = new_counter(&pool, b"b", b"c", 5).await.unwrap();
        assert_eq!(counter.value(), 5);
        assert_eq!(counter.bucket(), b"b");
        assert_eq!(counter.key(), b"c");
    }
}
