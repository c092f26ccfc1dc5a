//! # Message Codec
//!
//! Purpose: Carry the semantic request/response fields this client actually
//! consumes (§3/§6 of the design notes) across the wire. The real protobuf
//! schema is an external collaborator out of this crate's scope (per the
//! governing spec); this module is the stand-in for it, in the same spirit
//! as `resp.rs` hand-rolling RESP2 instead of depending on a parser crate.
//!
//! ## Design Principles
//! 1. **Tag-Length-Value**: every field is `tag:u8, len:u32 BE, bytes`,
//!    letting unknown/absent fields be skipped without a schema.
//! 2. **Optional Means Absent**: an unset option field is simply not written,
//!    mirroring the pointer-style "unset means inherit bucket default"
//!    semantics from the governing spec's read/write options.
//! 3. **Binary-Safe**: bucket/key/value/vclock are raw bytes throughout.

use crate::error::{RiakError, RiakResult};

fn write_field(buf: &mut Vec<u8>, tag: u8, data: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn write_u32_field(buf: &mut Vec<u8>, tag: u8, value: u32) {
    write_field(buf, tag, &value.to_be_bytes());
}

fn write_bool_field(buf: &mut Vec<u8>, tag: u8, value: bool) {
    write_field(buf, tag, &[value as u8]);
}

fn read_u32(data: &[u8]) -> RiakResult<u32> {
    let arr: [u8; 4] = data.try_into().map_err(|_| RiakError::Protocol)?;
    Ok(u32::from_be_bytes(arr))
}

fn read_bool(data: &[u8]) -> RiakResult<bool> {
    data.first().map(|b| *b != 0).ok_or(RiakError::Protocol)
}

/// Walks a TLV-encoded payload one field at a time.
struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        FieldReader { data, pos: 0 }
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = RiakResult<(u8, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        if self.pos + 5 > self.data.len() {
            return Some(Err(RiakError::Protocol));
        }
        let tag = self.data[self.pos];
        let len = match read_u32(&self.data[self.pos + 1..self.pos + 5]) {
            Ok(len) => len as usize,
            Err(err) => return Some(Err(err)),
        };
        let start = self.pos + 5;
        let end = start + len;
        if end > self.data.len() {
            return Some(Err(RiakError::Protocol));
        }
        self.pos = end;
        Some(Ok((tag, &self.data[start..end])))
    }
}

// Field tags. Scoped per message type below; reused numbers across
// different structs are fine because decode context is always known.
const T_BUCKET: u8 = 1;
const T_KEY: u8 = 2;
const T_VCLOCK: u8 = 3;
const T_CONTENT: u8 = 4;
const T_TIMEOUT: u8 = 5;
const T_R: u8 = 6;
const T_PR: u8 = 7;
const T_BASIC_QUORUM: u8 = 8;
const T_SLOPPY_QUORUM: u8 = 9;
const T_NOTFOUND_OK: u8 = 10;
const T_N_VAL: u8 = 11;
const T_IF_MODIFIED: u8 = 12;
const T_HEAD: u8 = 13;
const T_UNCHANGED: u8 = 14;
const T_W: u8 = 15;
const T_DW: u8 = 16;
const T_PW: u8 = 17;
const T_RETURN_HEAD: u8 = 18;
const T_RETURN_BODY: u8 = 19;
const T_IF_NOT_MODIFIED: u8 = 20;
const T_IF_NONE_MATCH: u8 = 21;
const T_RW: u8 = 22;
const T_VALUE: u8 = 23;
const T_CONTENT_TYPE: u8 = 24;
const T_LINK: u8 = 25;
const T_INDEX: u8 = 26;
const T_USERMETA: u8 = 27;
const T_DELETED: u8 = 28;
const T_VTAG: u8 = 29;
const T_PAIR_KEY: u8 = 30;
const T_PAIR_VALUE: u8 = 31;
const T_LINK_TAG: u8 = 32;
const T_INDEX_NAME: u8 = 33;
const T_INDEX_VALUE: u8 = 34;
const T_QTYPE: u8 = 35;
const T_RANGE_MIN: u8 = 36;
const T_RANGE_MAX: u8 = 37;
const T_MAX_RESULTS: u8 = 38;
const T_KEYS: u8 = 39;
const T_DONE: u8 = 40;
const T_AMOUNT: u8 = 41;
const T_RETURNVALUE: u8 = 42;
const T_COUNTER_VALUE: u8 = 43;
const T_BACKEND: u8 = 44;
const T_ALLOW_MULT: u8 = 45;
const T_LAST_WRITE_WINS: u8 = 46;
const T_CLIENT_ID: u8 = 47;
const T_ERR_CODE: u8 = 48;
const T_ERR_MSG: u8 = 49;
const T_TYPE_NAME: u8 = 50;

/// A `{tag, bucket, key}` link, as carried in `Content.links`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Link {
    pub tag: Vec<u8>,
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
}

impl Link {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_LINK_TAG, &self.tag);
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        buf
    }

    fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut link = Link::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_LINK_TAG => link.tag = value.to_vec(),
                T_BUCKET => link.bucket = value.to_vec(),
                T_KEY => link.key = value.to_vec(),
                _ => {}
            }
        }
        Ok(link)
    }
}

/// A generic `{key, value}` pair, used for both secondary indexes and user
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Pair {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_PAIR_KEY, &self.key);
        write_field(&mut buf, T_PAIR_VALUE, &self.value);
        buf
    }

    fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut pair = Pair::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_PAIR_KEY => pair.key = value.to_vec(),
                T_PAIR_VALUE => pair.value = value.to_vec(),
                _ => {}
            }
        }
        Ok(pair)
    }
}

/// The object-content record carried inside get/put responses and requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Content {
    pub value: Vec<u8>,
    pub content_type: Vec<u8>,
    pub links: Vec<Link>,
    pub indexes: Vec<Pair>,
    pub usermeta: Vec<Pair>,
    pub deleted: bool,
    pub vtag: Vec<u8>,
}

impl Content {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_VALUE, &self.value);
        write_field(&mut buf, T_CONTENT_TYPE, &self.content_type);
        for link in &self.links {
            write_field(&mut buf, T_LINK, &link.encode());
        }
        for idx in &self.indexes {
            write_field(&mut buf, T_INDEX, &idx.encode());
        }
        for meta in &self.usermeta {
            write_field(&mut buf, T_USERMETA, &meta.encode());
        }
        if self.deleted {
            write_bool_field(&mut buf, T_DELETED, true);
        }
        write_field(&mut buf, T_VTAG, &self.vtag);
        buf
    }

    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut content = Content::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_VALUE => content.value = value.to_vec(),
                T_CONTENT_TYPE => content.content_type = value.to_vec(),
                T_LINK => content.links.push(Link::decode(value)?),
                T_INDEX => content.indexes.push(Pair::decode(value)?),
                T_USERMETA => content.usermeta.push(Pair::decode(value)?),
                T_DELETED => content.deleted = read_bool(value)?,
                T_VTAG => content.vtag = value.to_vec(),
                _ => {}
            }
        }
        Ok(content)
    }
}

/// Read options shared by fetch operations (§4.F / Section 6).
#[derive(Debug, Clone, Default)]
pub struct ReadOpts {
    pub r: Option<u32>,
    pub pr: Option<u32>,
    pub basic_quorum: Option<bool>,
    pub sloppy_quorum: Option<bool>,
    pub notfound_ok: Option<bool>,
    pub n_val: Option<u32>,
}

/// Write options shared by store operations (§4.G / Section 6).
#[derive(Debug, Clone, Default)]
pub struct WriteOpts {
    pub w: Option<u32>,
    pub dw: Option<u32>,
    pub pw: Option<u32>,
}

/// Delete options (§3.K).
#[derive(Debug, Clone, Default)]
pub struct DeleteOpts {
    pub r: Option<u32>,
    pub w: Option<u32>,
    pub pr: Option<u32>,
    pub pw: Option<u32>,
    pub rw: Option<u32>,
    pub dw: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct GetReq {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
    pub timeout: Option<u32>,
    pub if_modified: Option<Vec<u8>>,
    pub head: bool,
    pub opts: ReadOpts,
}

impl GetReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        if let Some(timeout) = self.timeout {
            write_u32_field(&mut buf, T_TIMEOUT, timeout);
        }
        if let Some(vclock) = &self.if_modified {
            write_field(&mut buf, T_IF_MODIFIED, vclock);
        }
        if self.head {
            write_bool_field(&mut buf, T_HEAD, true);
        }
        if let Some(r) = self.opts.r {
            write_u32_field(&mut buf, T_R, r);
        }
        if let Some(pr) = self.opts.pr {
            write_u32_field(&mut buf, T_PR, pr);
        }
        if let Some(v) = self.opts.basic_quorum {
            write_bool_field(&mut buf, T_BASIC_QUORUM, v);
        }
        if let Some(v) = self.opts.sloppy_quorum {
            write_bool_field(&mut buf, T_SLOPPY_QUORUM, v);
        }
        if let Some(v) = self.opts.notfound_ok {
            write_bool_field(&mut buf, T_NOTFOUND_OK, v);
        }
        if let Some(n) = self.opts.n_val {
            write_u32_field(&mut buf, T_N_VAL, n);
        }
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetResp {
    pub vclock: Option<Vec<u8>>,
    pub content: Vec<Content>,
    pub unchanged: bool,
}

impl GetResp {
    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut resp = GetResp::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_VCLOCK => resp.vclock = Some(value.to_vec()),
                T_CONTENT => resp.content.push(Content::decode(value)?),
                T_UNCHANGED => resp.unchanged = read_bool(value)?,
                _ => {}
            }
        }
        Ok(resp)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutReq {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
    pub vclock: Option<Vec<u8>>,
    pub content: Content,
    pub return_head: bool,
    pub return_body: bool,
    pub if_not_modified: bool,
    pub if_none_match: bool,
    pub opts: WriteOpts,
}

impl PutReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        if let Some(vclock) = &self.vclock {
            write_field(&mut buf, T_VCLOCK, vclock);
        }
        write_field(&mut buf, T_CONTENT, &self.content.encode());
        if self.return_head {
            write_bool_field(&mut buf, T_RETURN_HEAD, true);
        }
        if self.return_body {
            write_bool_field(&mut buf, T_RETURN_BODY, true);
        }
        if self.if_not_modified {
            write_bool_field(&mut buf, T_IF_NOT_MODIFIED, true);
        }
        if self.if_none_match {
            write_bool_field(&mut buf, T_IF_NONE_MATCH, true);
        }
        if let Some(w) = self.opts.w {
            write_u32_field(&mut buf, T_W, w);
        }
        if let Some(dw) = self.opts.dw {
            write_u32_field(&mut buf, T_DW, dw);
        }
        if let Some(pw) = self.opts.pw {
            write_u32_field(&mut buf, T_PW, pw);
        }
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutResp {
    pub vclock: Option<Vec<u8>>,
    pub content: Vec<Content>,
    pub key: Option<Vec<u8>>,
}

impl PutResp {
    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut resp = PutResp::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_VCLOCK => resp.vclock = Some(value.to_vec()),
                T_CONTENT => resp.content.push(Content::decode(value)?),
                T_KEY => resp.key = Some(value.to_vec()),
                _ => {}
            }
        }
        Ok(resp)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DelReq {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
    pub vclock: Option<Vec<u8>>,
    pub opts: DeleteOpts,
}

impl DelReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        if let Some(vclock) = &self.vclock {
            write_field(&mut buf, T_VCLOCK, vclock);
        }
        if let Some(r) = self.opts.r {
            write_u32_field(&mut buf, T_R, r);
        }
        if let Some(w) = self.opts.w {
            write_u32_field(&mut buf, T_W, w);
        }
        if let Some(pr) = self.opts.pr {
            write_u32_field(&mut buf, T_PR, pr);
        }
        if let Some(pw) = self.opts.pw {
            write_u32_field(&mut buf, T_PW, pw);
        }
        if let Some(rw) = self.opts.rw {
            write_u32_field(&mut buf, T_RW, rw);
        }
        if let Some(dw) = self.opts.dw {
            write_u32_field(&mut buf, T_DW, dw);
        }
        buf
    }
}

/// `0 = equality lookup (_bin)`, `1 = range query (_int)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexQueryType {
    Equality,
    Range,
}

#[derive(Debug, Clone, Default)]
pub struct IndexReq {
    pub bucket: Vec<u8>,
    pub index: Vec<u8>,
    pub qtype: Option<IndexQueryType>,
    pub key: Option<Vec<u8>>,
    pub range_min: Option<Vec<u8>>,
    pub range_max: Option<Vec<u8>>,
    pub max_results: Option<u32>,
}

impl IndexReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_INDEX_NAME, &self.index);
        let qtype = match self.qtype {
            Some(IndexQueryType::Equality) | None => 0u32,
            Some(IndexQueryType::Range) => 1u32,
        };
        write_u32_field(&mut buf, T_QTYPE, qtype);
        if let Some(key) = &self.key {
            write_field(&mut buf, T_INDEX_VALUE, key);
        }
        if let Some(min) = &self.range_min {
            write_field(&mut buf, T_RANGE_MIN, min);
        }
        if let Some(max) = &self.range_max {
            write_field(&mut buf, T_RANGE_MAX, max);
        }
        if let Some(max_results) = self.max_results {
            write_u32_field(&mut buf, T_MAX_RESULTS, max_results);
        }
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexResp {
    pub keys: Vec<Vec<u8>>,
    pub done: bool,
}

impl IndexResp {
    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut resp = IndexResp::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_KEYS => resp.keys.push(value.to_vec()),
                T_DONE => resp.done = read_bool(value)?,
                _ => {}
            }
        }
        Ok(resp)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CounterUpdateReq {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
    pub amount: i64,
    pub returnvalue: bool,
}

impl CounterUpdateReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        write_field(&mut buf, T_AMOUNT, &self.amount.to_be_bytes());
        write_bool_field(&mut buf, T_RETURNVALUE, self.returnvalue);
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct CounterUpdateResp {
    pub value: i64,
}

impl CounterUpdateResp {
    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut resp = CounterUpdateResp::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            if tag == T_COUNTER_VALUE {
                let arr: [u8; 8] = value.try_into().map_err(|_| RiakError::Protocol)?;
                resp.value = i64::from_be_bytes(arr);
            }
        }
        Ok(resp)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CounterGetReq {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
}

impl CounterGetReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_KEY, &self.key);
        buf
    }
}

pub type CounterGetResp = CounterUpdateResp;

/// Bucket properties (`§4.J`). Every field optional: unset means "leave the
/// server-side default in place" on a set, or "not reported" on a get.
#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    pub backend: Option<Vec<u8>>,
    pub notfound_ok: Option<bool>,
    pub allow_mult: Option<bool>,
    pub last_write_wins: Option<bool>,
    pub basic_quorum: Option<bool>,
    pub n_val: Option<u32>,
    pub r: Option<u32>,
    pub w: Option<u32>,
}

impl BucketProps {
    /// The recipe for a memory-backed cache bucket (§4.J `make_cache`).
    pub fn cache_recipe() -> Self {
        BucketProps {
            backend: Some(b"cache".to_vec()),
            notfound_ok: Some(true),
            allow_mult: Some(false),
            last_write_wins: Some(false),
            basic_quorum: Some(false),
            n_val: Some(1),
            r: Some(1),
            w: Some(1),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(backend) = &self.backend {
            write_field(&mut buf, T_BACKEND, backend);
        }
        if let Some(v) = self.notfound_ok {
            write_bool_field(&mut buf, T_NOTFOUND_OK, v);
        }
        if let Some(v) = self.allow_mult {
            write_bool_field(&mut buf, T_ALLOW_MULT, v);
        }
        if let Some(v) = self.last_write_wins {
            write_bool_field(&mut buf, T_LAST_WRITE_WINS, v);
        }
        if let Some(v) = self.basic_quorum {
            write_bool_field(&mut buf, T_BASIC_QUORUM, v);
        }
        if let Some(n) = self.n_val {
            write_u32_field(&mut buf, T_N_VAL, n);
        }
        if let Some(r) = self.r {
            write_u32_field(&mut buf, T_R, r);
        }
        if let Some(w) = self.w {
            write_u32_field(&mut buf, T_W, w);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut props = BucketProps::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_BACKEND => props.backend = Some(value.to_vec()),
                T_NOTFOUND_OK => props.notfound_ok = Some(read_bool(value)?),
                T_ALLOW_MULT => props.allow_mult = Some(read_bool(value)?),
                T_LAST_WRITE_WINS => props.last_write_wins = Some(read_bool(value)?),
                T_BASIC_QUORUM => props.basic_quorum = Some(read_bool(value)?),
                T_N_VAL => props.n_val = Some(read_u32(value)?),
                T_R => props.r = Some(read_u32(value)?),
                T_W => props.w = Some(read_u32(value)?),
                _ => {}
            }
        }
        Ok(props)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetBucketReq {
    pub bucket: Vec<u8>,
}

impl GetBucketReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetBucketReq {
    pub bucket: Vec<u8>,
    pub props: BucketProps,
}

impl SetBucketReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        write_field(&mut buf, T_CONTENT, &self.props.encode());
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetBucketReq {
    pub bucket: Vec<u8>,
}

impl ResetBucketReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_BUCKET, &self.bucket);
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetBucketTypeReq {
    pub type_name: Vec<u8>,
}

impl GetBucketTypeReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_TYPE_NAME, &self.type_name);
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetBucketTypeReq {
    pub type_name: Vec<u8>,
    pub props: BucketProps,
}

impl SetBucketTypeReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_TYPE_NAME, &self.type_name);
        write_field(&mut buf, T_CONTENT, &self.props.encode());
        buf
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetClientIdReq {
    pub client_id: Vec<u8>,
}

impl SetClientIdReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, T_CLIENT_ID, &self.client_id);
        buf
    }
}

/// The server error envelope carried on response code 0.
#[derive(Debug, Clone, Default)]
pub struct ErrorResp {
    pub code: u32,
    pub message: Vec<u8>,
}

impl ErrorResp {
    pub fn decode(data: &[u8]) -> RiakResult<Self> {
        let mut resp = ErrorResp::default();
        for field in FieldReader::new(data) {
            let (tag, value) = field?;
            match tag {
                T_ERR_CODE => resp.code = read_u32(value)?,
                T_ERR_MSG => resp.message = value.to_vec(),
                _ => {}
            }
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_content_with_nested_fields() {
        let content = Content {
            value: b"hello".to_vec(),
            content_type: b"text/plain".to_vec(),
            links: vec![Link {
                tag: b"parent".to_vec(),
                bucket: b"b".to_vec(),
                key: b"k".to_vec(),
            }],
            indexes: vec![Pair {
                key: b"testidx_bin".to_vec(),
                value: b"myvalue".to_vec(),
            }],
            usermeta: vec![Pair {
                key: b"author".to_vec(),
                value: b"alice".to_vec(),
            }],
            deleted: false,
            vtag: b"v1".to_vec(),
        };
        let encoded = content.encode();
        let decoded = Content::decode(&encoded).unwrap();
        assert_eq!(decoded, content);
    }

    #[test]
    fn round_trips_get_resp_with_siblings() {
        let mut buf = Vec::new();
        write_field(&mut buf, T_VCLOCK, b"clock1");
        write_field(
            &mut buf,
            T_CONTENT,
            &Content {
                value: b"a".to_vec(),
                ..Default::default()
            }
            .encode(),
        );
        write_field(
            &mut buf,
            T_CONTENT,
            &Content {
                value: b"b".to_vec(),
                ..Default::default()
            }
            .encode(),
        );
        let resp = GetResp::decode(&buf).unwrap();
        assert_eq!(resp.vclock, Some(b"clock1".to_vec()));
        assert_eq!(resp.content.len(), 2);
    }

    #[test]
    fn decodes_error_envelope() {
        let mut buf = Vec::new();
        write_field(&mut buf, T_ERR_CODE, &5u32.to_be_bytes());
        write_field(&mut buf, T_ERR_MSG, b"match_found");
        let err = ErrorResp::decode(&buf).unwrap();
        assert_eq!(err.code, 5);
        assert_eq!(err.message, b"match_found");
    }

    #[test]
    fn truncated_field_is_protocol_error() {
        let buf = vec![T_BUCKET, 0, 0, 0, 10, 1, 2];
        assert!(matches!(
            Content::decode(&buf).unwrap_err(),
            RiakError::Protocol
        ));
    }

    #[test]
    fn cache_recipe_matches_spec() {
        let props = BucketProps::cache_recipe();
        assert_eq!(props.backend.as_deref(), Some(&b"cache"[..]));
        assert_eq!(props.n_val, Some(1));
        assert_eq!(props.r, Some(1));
        assert_eq!(props.w, Some(1));
        assert_eq!(props.allow_mult, Some(false));
    }
}
