//! # Secondary Index Queries
//!
//! Purpose: Run equality (`_bin`) and range (`_int`) lookups against a
//! bucket's secondary indexes, and fan out concurrent fetches over the
//! matched keys. Grounded in `rkive/index.go`'s `IndexQueryRes`,
//! `FetchNext`/`Which`, and `FetchAsync` — goroutines and unbuffered
//! channels there become `tokio::spawn` tasks over bounded
//! `tokio::sync::mpsc` channels here (§2.5's async-runtime resolution).
//!
//! ## Design Principles
//! 1. **Streamed, Then Buffered**: the wire response streams one frame per
//!    batch of matched keys; `index_lookup`/`index_range` drain the stream
//!    fully into an in-memory [`IndexQueryRes`] before returning, matching
//!    `rkive`'s behavior of fully materializing `Keys()`.
//! 2. **Bounded Fan-Out**: `fetch_async` never holds more than
//!    `worker_count` fetches in flight at once, each worker pulling the next
//!    key from a shared channel rather than being handed a static slice.

use tokio::sync::mpsc;

use crate::codec::{IndexQueryType, IndexReq, IndexResp};
use crate::engine::StreamCursor;
use crate::error::RiakResult;
use crate::fetch::{self, ReadOpts};
use crate::frame;
use crate::object::Duplicator;
use crate::pool::Pool;

const CODE_INDEX_REQ: u8 = 25;
const CODE_INDEX_RESP: u8 = 26;

/// The materialized result of a secondary-index query: every matched key,
/// plus which of them have already been pulled through [`IndexQueryRes::fetch_next`].
#[derive(Debug, Clone, Default)]
pub struct IndexQueryRes {
    bucket: Vec<u8>,
    keys: Vec<Vec<u8>>,
    fetched: Vec<bool>,
    cursor: usize,
}

impl IndexQueryRes {
    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.iter().any(|k| k.as_slice() == key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Fetches the next not-yet-fetched key's object, advancing the cursor.
    /// Returns `Ok(None)` once every key has been fetched.
    pub async fn fetch_next<T: Duplicator>(
        &mut self,
        pool: &Pool,
        opts: &ReadOpts,
    ) -> RiakResult<Option<T>> {
        while self.cursor < self.keys.len() {
            let idx = self.cursor;
            self.cursor += 1;
            if self.fetched[idx] {
                continue;
            }
            self.fetched[idx] = true;
            let obj = fetch::fetch::<T>(pool, &self.bucket, &self.keys[idx], opts).await?;
            return Ok(Some(obj));
        }
        Ok(None)
    }

    /// Fetches every matched key's object in turn, reusing `obj` across
    /// fetches, and returns the keys for which every predicate in
    /// `predicates` accepted the fetched object (`rkive/index.go`'s `Which`).
    pub async fn which<T: Duplicator>(
        &self,
        pool: &Pool,
        obj: &mut T,
        opts: &ReadOpts,
        predicates: &[&dyn Fn(&T) -> bool],
    ) -> RiakResult<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for key in &self.keys {
            *obj = fetch::fetch::<T>(pool, &self.bucket, key, opts).await?;
            if predicates.iter().all(|pred| pred(obj)) {
                out.push(key.clone());
            }
        }
        Ok(out)
    }
}

async fn run_query(pool: &Pool, bucket: Vec<u8>, req: IndexReq) -> RiakResult<IndexQueryRes> {
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());

    let mut cursor = StreamCursor::open(pool, CODE_INDEX_REQ, CODE_INDEX_RESP, payload).await?;
    let mut keys = Vec::new();

    loop {
        match cursor.next().await? {
            Some(frame_bytes) => {
                let resp = IndexResp::decode(&frame_bytes)?;
                keys.extend(resp.keys);
                if resp.done {
                    cursor.finish_ok().await;
                    break;
                }
            }
            None => break,
        }
    }

    let fetched = vec![false; keys.len()];
    Ok(IndexQueryRes {
        bucket,
        keys,
        fetched,
        cursor: 0,
    })
}

/// Equality lookup against a `_bin` (string-valued) secondary index.
pub async fn index_lookup(
    pool: &Pool,
    bucket: &[u8],
    index: &[u8],
    value: &[u8],
    max_results: Option<u32>,
) -> RiakResult<IndexQueryRes> {
    let name = index_bin_name(index);
    let req = IndexReq {
        bucket: bucket.to_vec(),
        index: name,
        qtype: Some(IndexQueryType::Equality),
        key: Some(value.to_vec()),
        range_min: None,
        range_max: None,
        max_results,
    };
    run_query(pool, bucket.to_vec(), req).await
}

/// Inclusive range lookup against an `_int` (integer-valued) secondary
/// index. `min`/`max` are encoded as ASCII decimal, matching
/// `rkive/index.go`'s `IndexRange`.
pub async fn index_range(
    pool: &Pool,
    bucket: &[u8],
    index: &[u8],
    min: i64,
    max: i64,
    max_results: Option<u32>,
) -> RiakResult<IndexQueryRes> {
    let name = index_int_name(index);
    let req = IndexReq {
        bucket: bucket.to_vec(),
        index: name,
        qtype: Some(IndexQueryType::Range),
        key: None,
        range_min: Some(min.to_string().into_bytes()),
        range_max: Some(max.to_string().into_bytes()),
        max_results,
    };
    run_query(pool, bucket.to_vec(), req).await
}

fn index_bin_name(name: &[u8]) -> Vec<u8> {
    let mut out = name.to_ascii_lowercase();
    out.extend_from_slice(b"_bin");
    out
}

fn index_int_name(name: &[u8]) -> Vec<u8> {
    let mut out = name.to_ascii_lowercase();
    out.extend_from_slice(b"_int");
    out
}

/// One fetch's outcome from [`fetch_async`]: the key it was fetched for,
/// paired with the fetch's result.
pub struct AsyncFetch<T> {
    pub key: Vec<u8>,
    pub result: RiakResult<T>,
}

/// Fetches every key in `res` concurrently across `worker_count` tasks,
/// streaming results back as they complete rather than waiting for the
/// slowest one (`rkive/index.go`'s `FetchAsync`).
pub async fn fetch_async<T>(
    pool: Pool,
    res: &IndexQueryRes,
    worker_count: usize,
    opts: ReadOpts,
) -> mpsc::Receiver<AsyncFetch<T>>
where
    T: Duplicator + Send + 'static,
{
    let worker_count = worker_count.max(1);
    // Keys channel is bounded to the worker count (spec §5 backpressure), so
    // the producer below throttles to however fast workers drain it.
    let (key_tx, key_rx) = mpsc::channel::<Vec<u8>>(worker_count);
    let (out_tx, out_rx) = mpsc::channel::<AsyncFetch<T>>(worker_count);

    let keys = res.keys.clone();
    tokio::spawn(async move {
        for key in keys {
            if key_tx.send(key).await.is_err() {
                break;
            }
        }
    });

    let key_rx = std::sync::Arc::new(tokio::sync::Mutex::new(key_rx));
    let bucket = res.bucket.clone();

    for _ in 0..worker_count {
        let key_rx = key_rx.clone();
        let pool = pool.clone();
        let bucket = bucket.clone();
        let opts = opts.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                let key = {
                    let mut rx = key_rx.lock().await;
                    rx.recv().await
                };
                let key = match key {
                    Some(key) => key,
                    None => break,
                };
                let result = fetch::fetch::<T>(&pool, &bucket, &key, &opts).await;
                if out_tx.send(AsyncFetch { key, result }).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(out_tx);

    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_get_suffixed_and_lowercased() {
        assert_eq!(index_bin_name(b"Email"), b"email_bin");
        assert_eq!(index_int_name(b"Score"), b"score_int");
    }

    #[test]
    fn query_res_tracks_membership() {
        let res = IndexQueryRes {
            bucket: b"b".to_vec(),
            keys: vec![b"k1".to_vec(), b"k2".to_vec()],
            fetched: vec![false, false],
            cursor: 0,
        };
        assert!(res.contains(b"k1"));
        assert!(!res.contains(b"k3"));
        assert_eq!(res.keys()[1], b"k2");
        assert_eq!(res.len(), 2);
    }
}
