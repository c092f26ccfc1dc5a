//! # Object Model
//!
//! Purpose: The `Info`/`Object`/`Duplicator`/`Mergeable` trait family user
//! types implement to be fetched, stored, and sibling-merged. Grounded in
//! `rkive/object.go`'s `Info` struct and `Object`/`Duplicator`/`ObjectM`
//! interfaces, reimplemented as safe Rust: where the original casts a
//! `string` to `[]byte` with `unsafe` (`ustr()`) to avoid a copy, this crate
//! always copies (per the Open Question resolution recorded in DESIGN.md).
//!
//! ## Design Principles
//! 1. **Info Is Plain Data**: every accessor on `Info` is a plain getter/
//!    setter over owned `Vec<u8>`/`Vec<(Vec<u8>, Vec<u8>)>` fields — no
//!    interior mutability, no borrowing tricks.
//! 2. **Index/Meta/Link Helpers Mirror `rkive`'s Pair-List Functions**: each
//!    name holds at most one value; `add` writes it only if the name is
//!    unoccupied or already holds that exact value (returning `false` on a
//!    conflict), `set` overwrites unconditionally, `get` returns the one
//!    stored value, `remove` deletes by name.
//! 3. **Suffix Normalization**: secondary index names are lowercased and
//!    suffixed with `_bin` (string-valued) or `_int` (integer-valued), same
//!    as `rkive/object.go`'s `fmtbin`/`fmtint`.

/// Metadata carried alongside every fetched/stored object: key, bucket,
/// vector clock, content type, links, secondary indexes, and user metadata.
#[derive(Debug, Clone, Default)]
pub struct Info {
    key: Vec<u8>,
    bucket: Vec<u8>,
    vclock: Option<Vec<u8>>,
    content_type: Vec<u8>,
    links: Vec<Link>,
    indexes: Vec<(Vec<u8>, Vec<u8>)>,
    user_meta: Vec<(Vec<u8>, Vec<u8>)>,
}

/// A link to another bucket/key, tagged with an application-defined name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub tag: Vec<u8>,
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
}

fn fmtbin(name: &[u8]) -> Vec<u8> {
    let mut out = name.to_ascii_lowercase();
    out.extend_from_slice(b"_bin");
    out
}

fn fmtint(name: &[u8]) -> Vec<u8> {
    let mut out = name.to_ascii_lowercase();
    out.extend_from_slice(b"_int");
    out
}

/// Single-valued association-list helpers mirroring `rkive/object.go`'s
/// `add`/`set`/`get`/`del` — `indexes` and `user_meta` store at most one
/// value per key as long as every mutation goes through these.
fn add_pair(list: &mut Vec<(Vec<u8>, Vec<u8>)>, key: Vec<u8>, value: Vec<u8>) -> bool {
    if let Some((_, existing)) = list.iter().find(|(k, _)| k == &key) {
        return existing == &value;
    }
    list.push((key, value));
    true
}

fn set_pair(list: &mut Vec<(Vec<u8>, Vec<u8>)>, key: Vec<u8>, value: Vec<u8>) {
    if let Some(entry) = list.iter_mut().find(|(k, _)| k == &key) {
        entry.1 = value;
        return;
    }
    list.push((key, value));
}

fn get_pair<'a>(list: &'a [(Vec<u8>, Vec<u8>)], key: &[u8]) -> Option<&'a [u8]> {
    list.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_slice())
}

fn del_pair(list: &mut Vec<(Vec<u8>, Vec<u8>)>, key: &[u8]) {
    list.retain(|(k, _)| k != key);
}

impl Info {
    pub fn new(bucket: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Info {
            key: key.into(),
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Sets the key, used once a server assigns one to a random-keyed create.
    pub fn set_key(&mut self, key: impl Into<Vec<u8>>) {
        self.key = key.into();
    }

    pub fn bucket(&self) -> &[u8] {
        &self.bucket
    }

    pub fn set_bucket(&mut self, bucket: impl Into<Vec<u8>>) {
        self.bucket = bucket.into();
    }

    pub fn vclock(&self) -> Option<&[u8]> {
        self.vclock.as_deref()
    }

    pub fn set_vclock(&mut self, vclock: Vec<u8>) {
        self.vclock = Some(vclock);
    }

    pub fn clear_vclock(&mut self) {
        self.vclock = None;
    }

    pub fn content_type(&self) -> &[u8] {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<Vec<u8>>) {
        self.content_type = content_type.into();
    }

    // -- secondary indexes (string-valued, `_bin`) --

    /// Adds `value` under `name` unless a different value is already stored
    /// there. Returns `true` if the pair is now (or already was) in place,
    /// `false` if a conflicting value blocked the write.
    pub fn add_index(&mut self, name: &[u8], value: impl Into<Vec<u8>>) -> bool {
        add_pair(&mut self.indexes, fmtbin(name), value.into())
    }

    pub fn set_index(&mut self, name: &[u8], value: impl Into<Vec<u8>>) {
        set_pair(&mut self.indexes, fmtbin(name), value.into());
    }

    pub fn get_index(&self, name: &[u8]) -> Option<&[u8]> {
        get_pair(&self.indexes, &fmtbin(name))
    }

    pub fn remove_index(&mut self, name: &[u8]) {
        del_pair(&mut self.indexes, &fmtbin(name));
    }

    // -- secondary indexes (integer-valued, `_int`) --

    pub fn add_index_int(&mut self, name: &[u8], value: i64) -> bool {
        add_pair(&mut self.indexes, fmtint(name), value.to_string().into_bytes())
    }

    pub fn set_index_int(&mut self, name: &[u8], value: i64) {
        set_pair(&mut self.indexes, fmtint(name), value.to_string().into_bytes());
    }

    pub fn get_index_int(&self, name: &[u8]) -> Option<i64> {
        let raw = get_pair(&self.indexes, &fmtint(name))?;
        std::str::from_utf8(raw).ok()?.parse().ok()
    }

    pub fn remove_index_int(&mut self, name: &[u8]) {
        del_pair(&mut self.indexes, &fmtint(name));
    }

    /// Every raw `(name, value)` index pair, suffix included — used to
    /// serialize the object for the wire.
    pub fn indexes(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.indexes
    }

    pub fn set_indexes_raw(&mut self, indexes: Vec<(Vec<u8>, Vec<u8>)>) {
        self.indexes = indexes;
    }

    // -- user metadata --

    /// Adds `value` under `key` unless a different value is already stored
    /// there (same contract as [`Info::add_index`]).
    pub fn add_meta(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> bool {
        add_pair(&mut self.user_meta, key.into(), value.into())
    }

    pub fn set_meta(&mut self, key: &[u8], value: impl Into<Vec<u8>>) {
        set_pair(&mut self.user_meta, key.to_vec(), value.into());
    }

    pub fn get_meta(&self, key: &[u8]) -> Option<&[u8]> {
        self.user_meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn remove_meta(&mut self, key: &[u8]) {
        self.user_meta.retain(|(k, _)| k != key);
    }

    pub fn metas(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.user_meta
    }

    pub fn set_metas_raw(&mut self, metas: Vec<(Vec<u8>, Vec<u8>)>) {
        self.user_meta = metas;
    }

    // -- links --

    /// Adds `link` unless a link is already tagged `link.tag`. Returns
    /// `false` if a link already occupies that tag (regardless of whether
    /// its bucket/key match), mirroring `rkive/object.go`'s `AddLink`.
    pub fn add_link(&mut self, link: Link) -> bool {
        if self.links.iter().any(|l| l.tag == link.tag) {
            return false;
        }
        self.links.push(link);
        true
    }

    pub fn set_link(&mut self, tag: &[u8], bucket: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) {
        self.links.retain(|l| l.tag != tag);
        self.links.push(Link {
            tag: tag.to_vec(),
            bucket: bucket.into(),
            key: key.into(),
        });
    }

    pub fn get_link(&self, tag: &[u8]) -> Option<&Link> {
        self.links.iter().find(|l| l.tag == tag)
    }

    pub fn remove_link(&mut self, tag: &[u8]) {
        self.links.retain(|l| l.tag != tag);
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn set_links_raw(&mut self, links: Vec<Link>) {
        self.links = links;
    }
}

/// A type that can be read from and written to a single stored value plus
/// its [`Info`]. Implemented by every user type that goes through `fetch`,
/// `store`, or `push`.
pub trait Object {
    /// Read-only access to the object's key/bucket/vclock/indexes/etc.
    fn info(&self) -> &Info;
    fn info_mut(&mut self) -> &mut Info;

    /// Serializes the value portion (not `Info`) to bytes.
    fn marshal(&self) -> crate::error::RiakResult<Vec<u8>>;
    /// Populates the value portion from bytes previously written by
    /// `marshal` (possibly by a different process).
    fn unmarshal(&mut self, data: &[u8]) -> crate::error::RiakResult<()>;
}

/// An [`Object`] that can produce a fresh, empty instance scoped to the same
/// bucket/key — needed to decode each sibling during a merge.
pub trait Duplicator: Object {
    fn new_empty(bucket: &[u8], key: &[u8]) -> Self
    where
        Self: Sized;
}

/// A [`Duplicator`] that knows how to fold another sibling's state into its
/// own, resolving the divergence a concurrent write produced.
pub trait Mergeable: Duplicator {
    fn merge(&mut self, other: &Self) -> crate::error::RiakResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_suffixes_are_normalized() {
        let mut info = Info::new("bucket", "key");
        info.add_index(b"TestIdx", b"value".to_vec());
        assert_eq!(info.indexes()[0].0, b"testidx_bin");
    }

    #[test]
    fn int_index_round_trips_as_decimal_ascii() {
        let mut info = Info::new("bucket", "key");
        info.add_index_int(b"score", 42);
        assert_eq!(info.get_index_int(b"score"), Some(42));
    }

    #[test]
    fn add_index_rejects_conflicting_value() {
        let mut info = Info::new("bucket", "key");
        assert!(info.add_index(b"tag", b"a".to_vec()));
        assert!(!info.add_index(b"tag", b"b".to_vec()));
        assert_eq!(info.get_index(b"tag"), Some(b"a".as_slice()));
    }

    #[test]
    fn add_index_same_value_twice_is_not_a_conflict() {
        let mut info = Info::new("bucket", "key");
        assert!(info.add_index(b"tag", b"a".to_vec()));
        assert!(info.add_index(b"tag", b"a".to_vec()));
        assert_eq!(info.indexes().len(), 1);
    }

    #[test]
    fn set_index_overwrites_then_remove_clears() {
        let mut info = Info::new("bucket", "key");
        info.add_index(b"tag", b"a".to_vec());
        info.set_index(b"tag", b"c".to_vec());
        assert_eq!(info.get_index(b"tag"), Some(b"c".as_slice()));
        info.remove_index(b"tag");
        assert_eq!(info.get_index(b"tag"), None);
    }

    #[test]
    fn links_are_keyed_by_tag() {
        let mut info = Info::new("bucket", "key");
        info.set_link(b"parent", "b", "k1");
        info.set_link(b"parent", "b", "k2");
        assert_eq!(info.links().len(), 1);
        assert_eq!(info.get_link(b"parent").unwrap().key, b"k2");
    }

    #[test]
    fn add_link_rejects_second_tag_write() {
        let mut info = Info::new("bucket", "key");
        assert!(info.add_link(Link {
            tag: b"parent".to_vec(),
            bucket: b"b".to_vec(),
            key: b"k1".to_vec(),
        }));
        assert!(!info.add_link(Link {
            tag: b"parent".to_vec(),
            bucket: b"b".to_vec(),
            key: b"k2".to_vec(),
        }));
        assert_eq!(info.get_link(b"parent").unwrap().key, b"k1");
    }
}
