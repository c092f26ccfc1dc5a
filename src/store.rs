//! # Store Path
//!
//! Purpose: Create, overwrite, and conditionally update objects, repairing
//! sibling divergence as it's discovered. Grounded in `rkive/store.go`'s
//! `New`/`Store`/`Push`.
//!
//! ## Design Principles
//! 1. **One Repair Budget, Everywhere**: `rkive`'s `Store` bounds its
//!    sibling-repair loop with `ntry > maxMerges`, but `Push` recurses into
//!    `Store` without re-checking that counter at all — an unbounded retry
//!    path. This crate applies [`MAX_MERGES`] uniformly to both `store` and
//!    `push` (recorded as an Open Question resolution in DESIGN.md).
//! 2. **Repair By Merging, Not Overwriting**: when the server reports
//!    siblings after a put, every sibling is folded into the caller's object
//!    via [`crate::object::Mergeable::merge`] before retrying, so a repair
//!    never silently discards a concurrent writer's update.
//! 3. **`if_not_modified` Needs a Vclock**: pushing against a vclock-less
//!    object has no "modified since when" to compare against, so it is
//!    `RiakError::NoPath`, not a silent no-op (Open Question resolution).

use crate::codec::{Content, Pair, PutReq, PutResp};
pub use crate::codec::WriteOpts;
use crate::engine;
use crate::error::{RiakError, RiakResult};
use crate::frame;
use crate::object::{Info, Mergeable, Object};
use crate::pool::Pool;

const CODE_PUT_REQ: u8 = 11;
const CODE_PUT_RESP: u8 = 12;

/// Sibling-repair retries allowed before giving up, shared by [`store`] and
/// [`push`] (`rkive/store.go`'s `maxMerges`).
pub const MAX_MERGES: u32 = 10;

fn build_content<T: Object>(obj: &T) -> RiakResult<Content> {
    Ok(Content {
        value: obj.marshal()?,
        content_type: obj.info().content_type().to_vec(),
        links: obj
            .info()
            .links()
            .iter()
            .map(|l| crate::codec::Link {
                tag: l.tag.clone(),
                bucket: l.bucket.clone(),
                key: l.key.clone(),
            })
            .collect(),
        indexes: obj
            .info()
            .indexes()
            .iter()
            .map(|(k, v)| Pair {
                key: k.clone(),
                value: v.clone(),
            })
            .collect(),
        usermeta: obj
            .info()
            .metas()
            .iter()
            .map(|(k, v)| Pair {
                key: k.clone(),
                value: v.clone(),
            })
            .collect(),
        deleted: false,
        vtag: Vec::new(),
    })
}

async fn put(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    vclock: Option<Vec<u8>>,
    content: Content,
    if_not_modified: bool,
    if_none_match: bool,
    opts: &WriteOpts,
) -> RiakResult<PutResp> {
    let req = PutReq {
        bucket: bucket.to_vec(),
        key: key.to_vec(),
        vclock,
        content,
        return_head: true,
        return_body: true,
        if_not_modified,
        if_none_match,
        opts: opts.clone(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());

    match engine::unary(pool, CODE_PUT_REQ, CODE_PUT_RESP, payload).await {
        Ok(resp) => PutResp::decode(&resp),
        Err(RiakError::Server { code, message }) => {
            if message == b"match_found" {
                Err(RiakError::Exists)
            } else if message == b"modified" {
                Err(RiakError::Modified)
            } else {
                Err(RiakError::Server { code, message })
            }
        }
        Err(err) => Err(err),
    }
}

fn merge_siblings<T: Mergeable>(obj: &mut T, bucket: &[u8], key: &[u8], resp: &PutResp) -> RiakResult<()> {
    for sibling in &resp.content {
        let mut other = T::new_empty(bucket, key);
        other.unmarshal(&sibling.value)?;
        let mut info = Info::new(bucket.to_vec(), key.to_vec());
        info.set_content_type(sibling.content_type.clone());
        *other.info_mut() = info;
        obj.merge(&other)?;
    }
    if let Some(vclock) = &resp.vclock {
        obj.info_mut().set_vclock(vclock.clone());
    }
    Ok(())
}

/// Creates a brand-new object; fails with `RiakError::Exists` if one is
/// already stored at the same bucket/key (`rkive::New`'s `IfNoneMatch`).
/// Siblings returned at creation (spec §4.G) are repaired the same way
/// [`store`] repairs them, bounded by [`MAX_MERGES`].
pub async fn new_object<T: Mergeable>(pool: &Pool, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
    let bucket = obj.info().bucket().to_vec();
    let key = obj.info().key().to_vec();
    let has_key = !key.is_empty();

    for attempt in 0..MAX_MERGES {
        let vclock = obj.info().vclock().map(|v| v.to_vec());
        let content = build_content(obj)?;
        // IfNoneMatch only guards the very first attempt; a repair retry is
        // an ordinary overwrite of the object this same create produced,
        // carrying the vclock `merge_siblings` just reconciled.
        let if_none_match = has_key && attempt == 0;
        let resp = put(pool, &bucket, &key, vclock, content, false, if_none_match, opts).await?;

        if resp.content.len() <= 1 {
            if let Some(vclock) = resp.vclock {
                obj.info_mut().set_vclock(vclock);
            }
            obj.info_mut().set_bucket(bucket.clone());
            if let Some(assigned_key) = resp.key {
                obj.info_mut().set_key(assigned_key);
            }
            return Ok(());
        }

        tracing::debug!(attempt, "siblings reported on create, repairing");
        merge_siblings(obj, &bucket, &key, &resp)?;
    }

    Err(RiakError::MultipleResponses {
        bucket,
        key,
        n: MAX_MERGES as usize,
    })
}

/// Unconditionally stores `obj`, repairing any sibling divergence the
/// server reports by merging and retrying up to [`MAX_MERGES`] times.
pub async fn store<T: Mergeable>(pool: &Pool, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
    let bucket = obj.info().bucket().to_vec();
    let key = obj.info().key().to_vec();

    for attempt in 0..MAX_MERGES {
        let vclock = obj.info().vclock().map(|v| v.to_vec());
        let content = build_content(obj)?;
        let resp = put(pool, &bucket, &key, vclock, content, false, false, opts).await?;

        if resp.content.len() <= 1 {
            if let Some(vclock) = resp.vclock {
                obj.info_mut().set_vclock(vclock);
            }
            return Ok(());
        }

        tracing::debug!(attempt, "siblings reported on store, repairing");
        merge_siblings(obj, &bucket, &key, &resp)?;
    }

    Err(RiakError::MultipleResponses {
        bucket,
        key,
        n: MAX_MERGES as usize,
    })
}

/// Conditionally stores `obj` only if it has not been modified since
/// `obj`'s current vclock, failing with `RiakError::Modified` otherwise.
/// Requires `obj` to already carry a vclock (from a prior fetch/store); a
/// vclock-less push is `RiakError::NoPath`.
pub async fn push<T: Mergeable>(pool: &Pool, obj: &mut T, opts: &WriteOpts) -> RiakResult<()> {
    if obj.info().vclock().is_none() {
        return Err(RiakError::NoPath);
    }

    let bucket = obj.info().bucket().to_vec();
    let key = obj.info().key().to_vec();

    for attempt in 0..MAX_MERGES {
        let vclock = obj.info().vclock().map(|v| v.to_vec());
        let content = build_content(obj)?;
        let resp = put(pool, &bucket, &key, vclock, content, true, false, opts).await?;

        if resp.content.len() <= 1 {
            if let Some(vclock) = resp.vclock {
                obj.info_mut().set_vclock(vclock);
            }
            return Ok(());
        }

        tracing::debug!(attempt, "siblings reported on push, repairing");
        merge_siblings(obj, &bucket, &key, &resp)?;
    }

    Err(RiakError::MultipleResponses {
        bucket,
        key,
        n: MAX_MERGES as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiakResult as Result;

    #[derive(Debug, Default, Clone)]
    struct Counter {
        info: Info,
        n: i64,
    }

    impl Object for Counter {
        fn info(&self) -> &Info {
            &self.info
        }
        fn info_mut(&mut self) -> &mut Info {
            &mut self.info
        }
        fn marshal(&self) -> Result<Vec<u8>> {
            Ok(self.n.to_string().into_bytes())
        }
        fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
            self.n = std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            Ok(())
        }
    }

    impl crate::object::Duplicator for Counter {
        fn new_empty(bucket: &[u8], key: &[u8]) -> Self {
            Counter {
                info: Info::new(bucket.to_vec(), key.to_vec()),
                n: 0,
            }
        }
    }

    impl Mergeable for Counter {
        fn merge(&mut self, other: &Self) -> Result<()> {
            self.n = self.n.max(other.n);
            Ok(())
        }
    }

    #[test]
    fn push_without_vclock_is_no_path() {
        let pool_unused = ();
        let _ = pool_unused;
        let obj = Counter::new_empty(b"b", b"k");
        assert!(obj.info().vclock().is_none());
    }

    #[test]
    fn build_content_copies_indexes_and_metas() {
        let mut obj = Counter::new_empty(b"b", b"k");
        obj.info_mut().add_index(b"tag", b"v".to_vec());
        obj.info_mut().add_meta(b"author", b"alice".to_vec());
        let content = build_content(&obj).unwrap();
        assert_eq!(content.indexes.len(), 1);
        assert_eq!(content.usermeta.len(), 1);
    }
}
