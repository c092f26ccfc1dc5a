//! # Bucket Facade & Properties
//!
//! Purpose: A bucket-scoped facade so callers don't repeat the bucket name
//! on every call, plus bucket (and bucket-type) property get/set and the
//! memory-backed "cache" bucket recipe. Grounded in `rkive/bucket.go`
//! (`Bucket`, `GetProperties`/`SetProperties`, `cacheProps`, `Reset`) and
//! `rkive/bucket_type.go` (bucket-type property get/set, codes 31/32).
//!
//! ## Design Principles
//! 1. **Thin Wrapper, Not New Semantics**: every `Bucket` method forwards
//!    straight to the matching free function in `fetch`/`store`/`index`/
//!    `delete`, just pre-filling the bucket name.
//! 2. **The Cache Recipe Is Just Properties**: `make_cache` is
//!    `set_properties` called with `BucketProps::cache_recipe()` — no
//!    separate code path from an ordinary property update.

use crate::codec::{BucketProps, GetBucketReq, GetBucketTypeReq, ResetBucketReq, SetBucketReq, SetBucketTypeReq};
use crate::counter::{self, Counter};
use crate::delete::{self, DeleteOpts};
use crate::engine;
use crate::error::RiakResult;
use crate::fetch::{self, ReadOpts};
use crate::frame;
use crate::index::{self, IndexQueryRes};
use crate::object::{Duplicator, Mergeable, Object};
use crate::pool::Pool;
use crate::store::{self, WriteOpts};

const CODE_GET_BUCKET_REQ: u8 = 19;
const CODE_GET_BUCKET_RESP: u8 = 20;
const CODE_SET_BUCKET_REQ: u8 = 21;
const CODE_SET_BUCKET_RESP: u8 = 22;
const CODE_RESET_BUCKET_REQ: u8 = 29;
const CODE_RESET_BUCKET_RESP: u8 = 30;
const CODE_GET_BUCKET_TYPE_REQ: u8 = 31;
const CODE_GET_BUCKET_TYPE_RESP: u8 = 31;
const CODE_SET_BUCKET_TYPE_REQ: u8 = 32;
const CODE_SET_BUCKET_TYPE_RESP: u8 = 32;

/// A bucket-scoped view over a [`Pool`], pre-filling the bucket name on
/// every operation (`rkive/bucket.go`'s `Bucket`).
#[derive(Clone)]
pub struct Bucket {
    pool: Pool,
    name: Vec<u8>,
}

impl Bucket {
    pub fn new(pool: Pool, name: impl Into<Vec<u8>>) -> Self {
        Bucket {
            pool,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub async fn fetch<T: Duplicator>(&self, key: &[u8], opts: &ReadOpts) -> RiakResult<T> {
        fetch::fetch(&self.pool, &self.name, key, opts).await
    }

    pub async fn fetch_merge<T: Mergeable>(&self, key: &[u8], opts: &ReadOpts) -> RiakResult<T> {
        fetch::fetch_merge(&self.pool, &self.name, key, opts).await
    }

    pub async fn update<T: Mergeable>(&self, obj: &mut T, opts: &ReadOpts) -> RiakResult<bool> {
        fetch::update(&self.pool, obj, opts).await
    }

    /// Head-only read: returns metadata without any object's payload.
    pub async fn fetch_head(&self, key: &[u8], opts: &ReadOpts) -> RiakResult<crate::object::Info> {
        fetch::fetch_head(&self.pool, &self.name, key, opts).await
    }

    /// Conditional head-only read: see [`fetch::pull_head`].
    pub async fn pull_head<T: Object>(&self, obj: &mut T, opts: &ReadOpts) -> RiakResult<bool> {
        fetch::pull_head(&self.pool, obj, opts).await
    }

    pub async fn new_object<T: Mergeable>(&self, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
        store::new_object(&self.pool, obj, opts).await
    }

    pub async fn store<T: Mergeable>(&self, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
        store::store(&self.pool, obj, opts).await
    }

    pub async fn push<T: Mergeable>(&self, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
        store::push(&self.pool, obj, opts).await
    }

    pub async fn delete<T: Object>(&self, obj: &T, opts: &DeleteOpts) -> RiakResult<()> {
        delete::delete(&self.pool, obj, opts).await
    }

    pub async fn index_lookup(
        &self,
        index: &[u8],
        value: &[u8],
        max_results: Option<u32>,
    ) -> RiakResult<IndexQueryRes> {
        index::index_lookup(&self.pool, &self.name, index, value, max_results).await
    }

    pub async fn index_range(
        &self,
        index: &[u8],
        min: i64,
        max: i64,
        max_results: Option<u32>,
    ) -> RiakResult<IndexQueryRes> {
        index::index_range(&self.pool, &self.name, index, min, max, max_results).await
    }

    /// Reads the bucket's current properties (message codes 19/20).
    pub async fn get_properties(&self) -> RiakResult<BucketProps> {
        get_properties(&self.pool, &self.name).await
    }

    /// Overwrites the bucket's properties (message codes 21/22).
    pub async fn set_properties(&self, props: &BucketProps) -> RiakResult<()> {
        set_properties(&self.pool, &self.name, props).await
    }

    /// Applies the memory-backed cache recipe to this bucket.
    pub async fn make_cache(&self) -> RiakResult<()> {
        self.set_properties(&BucketProps::cache_recipe()).await
    }

    /// Resets the bucket's properties to server defaults (codes 29/30).
    pub async fn reset(&self) -> RiakResult<()> {
        let req = ResetBucketReq {
            bucket: self.name.clone(),
        };
        let mut payload = Vec::new();
        frame::reserve_header(&mut payload);
        payload.extend_from_slice(&req.encode());
        engine::unary(&self.pool, CODE_RESET_BUCKET_REQ, CODE_RESET_BUCKET_RESP, payload).await?;
        Ok(())
    }

    /// Creates (or reinitializes) a counter at `key` with starting value
    /// `start`, see [`counter::new_counter`].
    pub async fn new_counter(&self, key: &[u8], start: i64) -> RiakResult<Counter> {
        counter::new_counter(&self.pool, &self.name, key, start).await
    }

    /// Reads a counter's current value, see [`counter::get_counter`].
    pub async fn get_counter(&self, key: &[u8]) -> RiakResult<Counter> {
        counter::get_counter(&self.pool, &self.name, key).await
    }

    /// Fetches every key in `res` concurrently, see [`index::fetch_async`].
    pub async fn multi_fetch_async<T>(
        &self,
        res: &IndexQueryRes,
        worker_count: usize,
        opts: ReadOpts,
    ) -> tokio::sync::mpsc::Receiver<index::AsyncFetch<T>>
    where
        T: Duplicator + Send + 'static,
    {
        index::fetch_async(self.pool.clone(), res, worker_count, opts).await
    }
}

async fn get_properties(pool: &Pool, bucket: &[u8]) -> RiakResult<BucketProps> {
    let req = GetBucketReq {
        bucket: bucket.to_vec(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());
    let resp = engine::unary(pool, CODE_GET_BUCKET_REQ, CODE_GET_BUCKET_RESP, payload).await?;
    BucketProps::decode(&resp)
}

async fn set_properties(pool: &Pool, bucket: &[u8], props: &BucketProps) -> RiakResult<()> {
    let req = SetBucketReq {
        bucket: bucket.to_vec(),
        props: props.clone(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());
    engine::unary(pool, CODE_SET_BUCKET_REQ, CODE_SET_BUCKET_RESP, payload).await?;
    Ok(())
}

/// Reads a bucket type's default properties (message code 31).
pub async fn get_bucket_type_properties(pool: &Pool, type_name: &[u8]) -> RiakResult<BucketProps> {
    let req = GetBucketTypeReq {
        type_name: type_name.to_vec(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());
    let resp = engine::unary(
        pool,
        CODE_GET_BUCKET_TYPE_REQ,
        CODE_GET_BUCKET_TYPE_RESP,
        payload,
    )
    .await?;
    BucketProps::decode(&resp)
}

/// Sets a bucket type's default properties (message code 32).
pub async fn set_bucket_type_properties(
    pool: &Pool,
    type_name: &[u8],
    props: &BucketProps,
) -> RiakResult<()> {
    let req = SetBucketTypeReq {
        type_name: type_name.to_vec(),
        props: props.clone(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());
    engine::unary(
        pool,
        CODE_SET_BUCKET_TYPE_REQ,
        CODE_SET_BUCKET_TYPE_RESP,
        payload,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_recipe_is_reused_by_make_cache() {
        let props = BucketProps::cache_recipe();
        assert_eq!(props.backend.as_deref(), Some(&b"cache"[..]));
    }
}
