//! # Fetch Path
//!
//! Purpose: Read an object (or detect there is none, or that it was deleted,
//! or that it diverged into siblings) and decode it into a caller-supplied
//! [`crate::object::Object`] implementation. Grounded in `rkive/fetch.go`'s
//! `Fetch`/`Update` and `rkive/object.go`'s `handleMerge`.
//!
//! ## Design Principles
//! 1. **Siblings Need `Mergeable`**: a plain [`crate::object::Duplicator`]
//!    can be fetched only when the server returns at most one content; more
//!    than one without a merge hook is `RiakError::MultipleResponses`. A
//!    [`crate::object::Mergeable`] type folds every extra sibling in.
//! 2. **First Content Wins the Identity**: the first content is unmarshaled
//!    directly into the object the caller gets back; every later sibling is
//!    decoded into a fresh `new_empty` and merged in, so the returned
//!    object's own state is never a half-merged hybrid of two siblings.
//! 3. **Unchanged Short-Circuits**: `update`'s conditional fetch leaves the
//!    caller's object completely untouched when the server reports
//!    `unchanged`, exactly mirroring `rkive::Update`'s behavior.

use crate::client::DEFAULT_REQUEST_TIMEOUT;
use crate::codec::{Content, GetReq, GetResp};
use crate::engine;
use crate::error::{RiakError, RiakResult};
use crate::frame;
use crate::object::{Duplicator, Info, Mergeable, Object};
use crate::pool::Pool;

pub use crate::codec::ReadOpts;

const CODE_GET_REQ: u8 = 9;
const CODE_GET_RESP: u8 = 10;

fn apply_info(info: &mut Info, bucket: &[u8], key: &[u8], vclock: Option<Vec<u8>>, content: &Content) {
    *info = Info::new(bucket.to_vec(), key.to_vec());
    if let Some(vclock) = vclock {
        info.set_vclock(vclock);
    }
    info.set_content_type(content.content_type.clone());
    info.set_indexes_raw(
        content
            .indexes
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect(),
    );
    info.set_metas_raw(
        content
            .usermeta
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect(),
    );
    info.set_links_raw(
        content
            .links
            .iter()
            .map(|l| crate::object::Link {
                tag: l.tag.clone(),
                bucket: l.bucket.clone(),
                key: l.key.clone(),
            })
            .collect(),
    );
}

async fn get(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    if_modified: Option<Vec<u8>>,
    head: bool,
    opts: &ReadOpts,
) -> RiakResult<GetResp> {
    let req = GetReq {
        bucket: bucket.to_vec(),
        key: key.to_vec(),
        timeout: Some(DEFAULT_REQUEST_TIMEOUT.as_millis() as u32),
        if_modified,
        head,
        opts: opts.clone(),
    };
    let mut payload = Vec::new();
    frame::reserve_header(&mut payload);
    payload.extend_from_slice(&req.encode());

    let resp = engine::unary(pool, CODE_GET_REQ, CODE_GET_RESP, payload).await?;
    GetResp::decode(&resp)
}

/// Fetches an object with no sibling-merge capability. Errors with
/// [`RiakError::MultipleResponses`] if the server reports more than one
/// content (use [`fetch_merge`] for a type that can resolve siblings).
pub async fn fetch<T: Duplicator>(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    opts: &ReadOpts,
) -> RiakResult<T> {
    let resp = get(pool, bucket, key, None, false, opts).await?;
    match resp.content.len() {
        0 => Err(RiakError::NotFound),
        1 => {
            let content = &resp.content[0];
            if content.deleted {
                return Err(RiakError::Deleted);
            }
            let mut obj = T::new_empty(bucket, key);
            obj.unmarshal(&content.value)?;
            apply_info(obj.info_mut(), bucket, key, resp.vclock, content);
            Ok(obj)
        }
        n => Err(RiakError::MultipleResponses {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            n,
        }),
    }
}

/// Fetches an object, merging any siblings the server reports into a single
/// resolved value via [`Mergeable::merge`].
pub async fn fetch_merge<T: Mergeable>(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    opts: &ReadOpts,
) -> RiakResult<T> {
    let resp = get(pool, bucket, key, None, false, opts).await?;
    if resp.content.is_empty() {
        return Err(RiakError::NotFound);
    }
    let mut iter = resp.content.iter();
    let first = iter.next().unwrap();
    if first.deleted && resp.content.len() == 1 {
        return Err(RiakError::Deleted);
    }
    let mut obj = T::new_empty(bucket, key);
    obj.unmarshal(&first.value)?;
    apply_info(obj.info_mut(), bucket, key, resp.vclock.clone(), first);

    for sibling in iter {
        let mut other = T::new_empty(bucket, key);
        other.unmarshal(&sibling.value)?;
        apply_info(other.info_mut(), bucket, key, resp.vclock.clone(), sibling);
        obj.merge(&other)?;
    }
    Ok(obj)
}

/// A conditional fetch: if the object has not changed since `obj`'s current
/// vclock, `obj` is left untouched and this returns `Ok(false)`. Otherwise
/// `obj` is overwritten (merging in any siblings) and this returns
/// `Ok(true)`.
pub async fn update<T: Mergeable>(pool: &Pool, obj: &mut T, opts: &ReadOpts) -> RiakResult<bool> {
    if obj.info().key().is_empty() {
        return Err(RiakError::NoPath);
    }
    let bucket = obj.info().bucket().to_vec();
    let key = obj.info().key().to_vec();
    let vclock = obj.info().vclock().map(|v| v.to_vec());

    let resp = get(pool, &bucket, &key, vclock, false, opts).await?;
    if resp.unchanged {
        return Ok(false);
    }
    if resp.content.is_empty() {
        return Err(RiakError::NotFound);
    }

    let mut iter = resp.content.iter();
    let first = iter.next().unwrap();
    if first.deleted && resp.content.len() == 1 {
        return Err(RiakError::Deleted);
    }
    obj.unmarshal(&first.value)?;
    apply_info(obj.info_mut(), &bucket, &key, resp.vclock.clone(), first);

    for sibling in iter {
        let mut other = T::new_empty(&bucket, &key);
        other.unmarshal(&sibling.value)?;
        apply_info(other.info_mut(), &bucket, &key, resp.vclock.clone(), sibling);
        obj.merge(&other)?;
    }
    Ok(true)
}

/// A head-only read (§4.F): returns the stored metadata without touching
/// any object's payload. Errors with [`RiakError::MultipleResponses`] on
/// siblings, since there is no payload to merge through.
pub async fn fetch_head(pool: &Pool, bucket: &[u8], key: &[u8], opts: &ReadOpts) -> RiakResult<Info> {
    let resp = get(pool, bucket, key, None, true, opts).await?;
    match resp.content.len() {
        0 => Err(RiakError::NotFound),
        1 => {
            let content = &resp.content[0];
            if content.deleted {
                return Err(RiakError::Deleted);
            }
            let mut info = Info::default();
            apply_info(&mut info, bucket, key, resp.vclock, content);
            Ok(info)
        }
        n => Err(RiakError::MultipleResponses {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            n,
        }),
    }
}

/// A conditional head-only read: behaves like [`update`] but leaves the
/// object's payload untouched, only overwriting its [`Info`].
pub async fn pull_head<T: Object>(pool: &Pool, obj: &mut T, opts: &ReadOpts) -> RiakResult<bool> {
    if obj.info().key().is_empty() {
        return Err(RiakError::NoPath);
    }
    let bucket = obj.info().bucket().to_vec();
    let key = obj.info().key().to_vec();
    let vclock = obj.info().vclock().map(|v| v.to_vec());

    let resp = get(pool, &bucket, &key, vclock, true, opts).await?;
    if resp.unchanged {
        return Ok(false);
    }
    match resp.content.len() {
        0 => Err(RiakError::NotFound),
        1 => {
            let content = &resp.content[0];
            if content.deleted {
                return Err(RiakError::Deleted);
            }
            apply_info(obj.info_mut(), &bucket, &key, resp.vclock, content);
            Ok(true)
        }
        n => Err(RiakError::MultipleResponses { bucket, key, n }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiakResult as Result;
    use crate::object::Object;

    #[derive(Debug, Default, Clone)]
    struct TextObj {
        info: Info,
        text: String,
    }

    impl Object for TextObj {
        fn info(&self) -> &Info {
            &self.info
        }
        fn info_mut(&mut self) -> &mut Info {
            &mut self.info
        }
        fn marshal(&self) -> Result<Vec<u8>> {
            Ok(self.text.clone().into_bytes())
        }
        fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
            self.text = String::from_utf8_lossy(data).into_owned();
            Ok(())
        }
    }

    impl Duplicator for TextObj {
        fn new_empty(bucket: &[u8], key: &[u8]) -> Self {
            TextObj {
                info: Info::new(bucket.to_vec(), key.to_vec()),
                text: String::new(),
            }
        }
    }

    impl Mergeable for TextObj {
        fn merge(&mut self, other: &Self) -> Result<()> {
            if other.text.len() > self.text.len() {
                self.text = other.text.clone();
            }
            Ok(())
        }
    }

    fn single_content(value: &[u8]) -> GetResp {
        GetResp {
            vclock: Some(b"clock".to_vec()),
            content: vec![Content {
                value: value.to_vec(),
                content_type: b"text/plain".to_vec(),
                ..Default::default()
            }],
            unchanged: false,
        }
    }

    #[test]
    fn apply_info_copies_vclock_and_content_type() {
        let mut info = Info::default();
        let content = Content {
            value: b"v".to_vec(),
            content_type: b"text/plain".to_vec(),
            ..Default::default()
        };
        apply_info(&mut info, b"b", b"k", Some(b"clock1".to_vec()), &content);
        assert_eq!(info.vclock(), Some(&b"clock1"[..]));
        assert_eq!(info.content_type(), b"text/plain");
    }

    #[test]
    fn single_content_resp_round_trips_through_apply_info() {
        let resp = single_content(b"hello");
        assert_eq!(resp.content.len(), 1);
        assert!(!resp.content[0].deleted);
    }
}
