//! # Changeset Loop
//!
//! Purpose: A read-modify-write helper that re-applies a user function
//! against a freshly fetched object whenever a conditional push loses a
//! race, bounded by the same repair budget `store.rs` uses. Grounded in
//! `rkive/changeset.go`'s `PushChangset`.
//!
//! ## Design Principles
//! 1. **`Done` Always Means Success**: `rkive`'s `PushChangset` calls the
//!    change function once before entering its retry loop and, on that
//!    first call only, lets `ErrDone` leak out of the function as a
//!    caller-visible error instead of treating it as "nothing to do,
//!    succeeded". This crate's `push_changeset` treats `RiakError::Done`
//!    from the change function as an immediate, successful return at every
//!    call site, first included.
//! 2. **New Key, Unconditional Write**: a key that doesn't exist yet has no
//!    vclock to condition a push on, so the first commit for a freshly
//!    created object goes through `store::store` (unconditional); every
//!    retry after a `Modified` conflict goes through `store::push`
//!    (conditional), since the object is then known to exist.

use crate::error::{RiakError, RiakResult};
use crate::fetch;
use crate::object::Mergeable;
use crate::pool::Pool;
use crate::store;

/// Applies `change_fn` to the current value of `bucket`/`key`, pushing the
/// result and retrying against a freshly fetched object whenever a
/// concurrent writer invalidates the push, up to [`store::MAX_MERGES`]
/// times. If `change_fn` returns `RiakError::Done`, the loop stops
/// immediately and the (possibly unmodified) object is returned as success.
pub async fn push_changeset<T, F>(
    pool: &Pool,
    bucket: &[u8],
    key: &[u8],
    mut change_fn: F,
) -> RiakResult<T>
where
    T: Mergeable,
    F: FnMut(&mut T) -> RiakResult<()>,
{
    let opts = store::WriteOpts::default();
    let (mut obj, mut is_new) = match fetch::fetch_merge::<T>(pool, bucket, key, &fetch::ReadOpts::default()).await
    {
        Ok(obj) => (obj, false),
        Err(RiakError::NotFound) => (T::new_empty(bucket, key), true),
        Err(err) => return Err(err),
    };

    for _ in 0..store::MAX_MERGES {
        match change_fn(&mut obj) {
            Ok(()) => {}
            Err(RiakError::Done) => return Ok(obj),
            Err(err) => return Err(err),
        }

        let commit = if is_new {
            store::store(pool, &mut obj, &opts).await
        } else {
            store::push(pool, &mut obj, &opts).await
        };

        match commit {
            Ok(()) => return Ok(obj),
            Err(RiakError::Modified) => {
                obj = fetch::fetch_merge::<T>(pool, bucket, key, &fetch::ReadOpts::default()).await?;
                is_new = false;
            }
            Err(err) => return Err(err),
        }
    }

    Err(RiakError::Modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiakResult as Result;
    use crate::object::{Duplicator, Info, Object};

    #[derive(Debug, Default, Clone)]
    struct Tally {
        info: Info,
        n: i64,
    }

    impl Object for Tally {
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

    impl Duplicator for Tally {
        fn new_empty(bucket: &[u8], key: &[u8]) -> Self {
            Tally {
                info: Info::new(bucket.to_vec(), key.to_vec()),
                n: 0,
            }
        }
    }

    impl Mergeable for Tally {
        fn merge(&mut self, other: &Self) -> Result<()> {
            self.n = self.n.max(other.n);
            Ok(())
        }
    }

    #[test]
    fn done_sentinel_is_constructible_and_displays() {
        let err = RiakError::Done;
        assert_eq!(err.to_string(), "done");
    }
}
