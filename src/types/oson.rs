//! OSON (Oracle's Binary JSON Format) encoding and decoding
//!
//! OSON is Oracle's binary representation of JSON data. An image is a
//! header, a dictionary of field names and a tree segment:
//!
//! ```text
//! FF 4A 5A | version | flags (u16)
//! field name count (u8/u16/u32) | name segment size (u16/u32)
//! tree segment size (u16/u32) | tiny node count (u16)
//! hash byte per name | name offsets | length-prefixed names
//! tree segment
//! ```
//!
//! Containers in the tree carry a child count, field ids (objects only)
//! and child offsets. Offsets are u16 until the tree outgrows 64 KiB; the
//! encoder then switches every container to u32 offsets.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as Json};

use super::binary::{decode_binary_double, decode_binary_float};
use super::date::decode_date;
use super::lob::{read_inline_image, write_inline_image};
use super::{mismatch, Number, TypeCoder, TypeDescriptor, Value, Vector, WireType};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{Error, Result};

const MAGIC: [u8; 3] = [0xFF, 0x4A, 0x5A];

const VERSION_MAX_FNAME_255: u8 = 1;
const VERSION_MAX_FNAME_65535: u8 = 3;

// Primary flags
const FLAG_REL_OFFSET_MODE: u16 = 0x0001;
const FLAG_INLINE_LEAF: u16 = 0x0002;
const FLAG_NUM_FNAMES_UINT32: u16 = 0x0008;
const FLAG_IS_SCALAR: u16 = 0x0010;
const FLAG_HASH_ID_UINT8: u16 = 0x0100;
const FLAG_NUM_FNAMES_UINT16: u16 = 0x0400;
const FLAG_FNAMES_SEG_UINT32: u16 = 0x0800;
const FLAG_TREE_SEG_UINT32: u16 = 0x1000;
const FLAG_TINY_NODES_STAT: u16 = 0x2000;

// Secondary flags (for long field names)
const FLAG_SEC_FNAMES_SEG_UINT16: u16 = 0x0100;

// Container node bits
const NODE_CONTAINER: u8 = 0x80;
const NODE_ARRAY: u8 = 0x40;
const NODE_WIDE_OFFSETS: u8 = 0x20;
const NODE_CHILDREN_MASK: u8 = 0x18;
const NODE_CHILDREN_UINT16: u8 = 0x08;
const NODE_CHILDREN_UINT32: u8 = 0x10;
const NODE_SHARED_FIELDS: u8 = 0x18;

// Node types
const TYPE_NULL: u8 = 0x30;
const TYPE_TRUE: u8 = 0x31;
const TYPE_FALSE: u8 = 0x32;
const TYPE_STRING_LEN_U8: u8 = 0x33;
const TYPE_NUMBER_LEN_U8: u8 = 0x34;
const TYPE_BINARY_DOUBLE: u8 = 0x36;
const TYPE_STRING_LEN_U16: u8 = 0x37;
const TYPE_STRING_LEN_U32: u8 = 0x38;
const TYPE_TIMESTAMP: u8 = 0x39;
const TYPE_BINARY_LEN_U16: u8 = 0x3a;
const TYPE_BINARY_LEN_U32: u8 = 0x3b;
const TYPE_DATE: u8 = 0x3c;
const TYPE_INTERVAL_YM: u8 = 0x3d;
const TYPE_INTERVAL_DS: u8 = 0x3e;
const TYPE_DECIMAL_LEN_U8: u8 = 0x74;
const TYPE_EXTENDED: u8 = 0x7b;
const TYPE_TIMESTAMP_TZ: u8 = 0x7c;
const TYPE_TIMESTAMP7: u8 = 0x7d;
const TYPE_ID: u8 = 0x7e;
const TYPE_BINARY_FLOAT: u8 = 0x7f;
const TYPE_OBJECT: u8 = 0x84;
const TYPE_ARRAY: u8 = 0xc0;
const TYPE_VECTOR: u8 = 0x01;

/// Largest inline string, written with the length in the node type
const MAX_INLINE_STRING: usize = 0x1e;
/// Largest NUMBER image written with the length in the node type
const MAX_INLINE_NUMBER: usize = 8;
const MAX_SHORT_FIELD_NAME: usize = 255;

fn corrupt(what: impl Into<String>) -> Error {
    Error::DataConversionError(format!("invalid OSON image: {}", what.into()))
}

/// OSON Decoder - parses OSON binary format to serde_json::Value
pub struct OsonDecoder {
    buf: ReadBuffer,
    field_names: Vec<String>,
    field_id_length: usize,
    tree_seg_pos: usize,
    relative_offsets: bool,
}

impl OsonDecoder {
    /// Decode OSON bytes to a JSON value
    pub fn decode(data: &[u8]) -> Result<Json> {
        let mut decoder = OsonDecoder {
            buf: ReadBuffer::from_slice(data),
            field_names: Vec::new(),
            field_id_length: 1,
            tree_seg_pos: 0,
            relative_offsets: false,
        };
        decoder.parse()
    }

    fn parse(&mut self) -> Result<Json> {
        let magic = self.buf.read_bytes_vec(3)?;
        if magic != MAGIC {
            return Err(corrupt("bad magic bytes"));
        }
        let version = self.buf.read_u8()?;
        if version != VERSION_MAX_FNAME_255 && version != VERSION_MAX_FNAME_65535 {
            return Err(Error::DataConversionError(format!(
                "unsupported OSON version {}",
                version
            )));
        }

        let flags = self.buf.read_u16_be()?;
        self.relative_offsets = flags & FLAG_REL_OFFSET_MODE != 0;

        if flags & FLAG_IS_SCALAR != 0 {
            self.skip_tree_size(flags)?;
            self.tree_seg_pos = self.buf.position();
            return self.decode_node();
        }

        let num_short_names = if flags & FLAG_NUM_FNAMES_UINT32 != 0 {
            self.field_id_length = 4;
            self.buf.read_u32_be()? as usize
        } else if flags & FLAG_NUM_FNAMES_UINT16 != 0 {
            self.field_id_length = 2;
            self.buf.read_u16_be()? as usize
        } else {
            self.field_id_length = 1;
            self.buf.read_u8()? as usize
        };

        let (short_offset_width, short_seg_size) = if flags & FLAG_FNAMES_SEG_UINT32 != 0 {
            (4, self.buf.read_u32_be()? as usize)
        } else {
            (2, self.buf.read_u16_be()? as usize)
        };

        let mut long_names = (0, 0, 0);
        if version == VERSION_MAX_FNAME_65535 {
            let secondary = self.buf.read_u16_be()?;
            let offset_width = if secondary & FLAG_SEC_FNAMES_SEG_UINT16 != 0 {
                2
            } else {
                4
            };
            let count = self.buf.read_u32_be()? as usize;
            let seg_size = self.buf.read_u32_be()? as usize;
            long_names = (count, offset_width, seg_size);
        }

        self.skip_tree_size(flags)?;
        let _num_tiny_nodes = self.buf.read_u16_be()?;

        if num_short_names > 0 {
            self.read_field_names(num_short_names, 1, short_offset_width, short_seg_size, 1)?;
        }
        let (count, offset_width, seg_size) = long_names;
        if count > 0 {
            self.read_field_names(count, 2, offset_width, seg_size, 2)?;
        }

        self.tree_seg_pos = self.buf.position();
        self.decode_node()
    }

    fn skip_tree_size(&mut self, flags: u16) -> Result<()> {
        let width = if flags & FLAG_TREE_SEG_UINT32 != 0 { 4 } else { 2 };
        self.buf.skip(width)
    }

    /// Hash ids, then offsets into the name segment, then the names
    fn read_field_names(
        &mut self,
        count: usize,
        hash_width: usize,
        offset_width: usize,
        seg_size: usize,
        length_width: usize,
    ) -> Result<()> {
        self.buf.skip(count * hash_width)?;
        let mut offsets = Vec::with_capacity(count.min(self.buf.remaining()));
        for _ in 0..count {
            offsets.push(self.read_width(offset_width)?);
        }

        let seg_start = self.buf.position();
        for offset in offsets {
            self.buf.set_position(seg_start + offset)?;
            let len = self.read_width(length_width)?;
            let name = self.buf.read_bytes_vec(len)?;
            self.field_names
                .push(String::from_utf8_lossy(&name).into_owned());
        }
        self.buf.set_position(seg_start + seg_size)
    }

    fn read_width(&mut self, width: usize) -> Result<usize> {
        Ok(match width {
            1 => self.buf.read_u8()? as usize,
            2 => self.buf.read_u16_be()? as usize,
            _ => self.buf.read_u32_be()? as usize,
        })
    }

    fn decode_node(&mut self) -> Result<Json> {
        let node_start = self.buf.position();
        let node_type = self.buf.read_u8()?;

        if node_type & NODE_CONTAINER != 0 {
            return self.decode_container(node_type, node_start);
        }

        match node_type {
            TYPE_NULL => Ok(Json::Null),
            TYPE_TRUE => Ok(Json::Bool(true)),
            TYPE_FALSE => Ok(Json::Bool(false)),

            TYPE_STRING_LEN_U8 => {
                let len = self.buf.read_u8()? as usize;
                self.read_string(len)
            }
            TYPE_STRING_LEN_U16 => {
                let len = self.buf.read_u16_be()? as usize;
                self.read_string(len)
            }
            TYPE_STRING_LEN_U32 => {
                let len = self.buf.read_u32_be()? as usize;
                self.read_string(len)
            }

            TYPE_NUMBER_LEN_U8 | TYPE_DECIMAL_LEN_U8 => {
                let len = self.buf.read_u8()? as usize;
                self.read_number(len)
            }

            TYPE_BINARY_DOUBLE => {
                let value = decode_binary_double(&self.buf.read_bytes_vec(8)?)?;
                Ok(serde_json::json!(value))
            }
            TYPE_BINARY_FLOAT => {
                let value = decode_binary_float(&self.buf.read_bytes_vec(4)?)?;
                Ok(serde_json::json!(value))
            }

            // Date types are rendered as ISO 8601 strings
            TYPE_DATE | TYPE_TIMESTAMP7 => {
                let value = decode_date(&self.buf.read_bytes_vec(7)?)?;
                Ok(Json::String(value.format("%Y-%m-%dT%H:%M:%S").to_string()))
            }
            TYPE_TIMESTAMP => {
                let value = decode_date(&self.buf.read_bytes_vec(11)?)?;
                Ok(Json::String(value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()))
            }
            TYPE_TIMESTAMP_TZ => {
                let image = self.buf.read_bytes_vec(13)?;
                let value = decode_date(&image[..11])?;
                Ok(Json::String(value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()))
            }

            // Binary data is rendered as hex
            TYPE_BINARY_LEN_U16 => {
                let len = self.buf.read_u16_be()? as usize;
                Ok(Json::String(hex::encode(self.buf.read_bytes_vec(len)?)))
            }
            TYPE_BINARY_LEN_U32 => {
                let len = self.buf.read_u32_be()? as usize;
                Ok(Json::String(hex::encode(self.buf.read_bytes_vec(len)?)))
            }
            TYPE_ID => {
                let len = self.buf.read_u8()? as usize;
                Ok(Json::String(hex::encode(self.buf.read_bytes_vec(len)?)))
            }

            TYPE_EXTENDED => match self.buf.read_u8()? {
                TYPE_VECTOR => {
                    let len = self.buf.read_u32_be()? as usize;
                    let vector = Vector::decode(&self.buf.read_bytes_vec(len)?)?;
                    Ok(vector_to_json(&vector))
                }
                other => Err(corrupt(format!("unsupported extended type 0x{:02x}", other))),
            },

            TYPE_INTERVAL_YM | TYPE_INTERVAL_DS => Err(Error::DataConversionError(
                "interval values are not supported in JSON".to_string(),
            )),

            // inline string, length in the node type
            n if n & 0xe0 == 0 => self.read_string(n as usize),
            // inline decimal, length - 1 in the low bits
            n if n & 0x60 == 0x60 => self.read_number((n & 0x1f) as usize + 1),
            n if n & 0xf0 == 0x20 => self.read_number((n & 0x0f) as usize + 1),
            // inline integers
            n if n & 0xf0 == 0x40 || n & 0xf0 == 0x50 => self.read_number((n & 0x0f) as usize),

            n => Err(corrupt(format!("unsupported node type 0x{:02x}", n))),
        }
    }

    fn decode_container(&mut self, node_type: u8, node_start: usize) -> Result<Json> {
        let is_array = node_type & NODE_ARRAY != 0;
        let wide = node_type & NODE_WIDE_OFFSETS != 0;

        let (count, field_ids) = if node_type & NODE_CHILDREN_MASK == NODE_SHARED_FIELDS {
            // the child count and field ids live in an earlier node
            let shared = self.read_offset(wide)?;
            let resume = self.buf.position();
            self.buf.set_position(self.resolve(shared, node_start))?;
            let shared_type = self.buf.read_u8()?;
            if shared_type & NODE_CHILDREN_MASK == NODE_SHARED_FIELDS {
                return Err(corrupt("shared field ids point at another shared node"));
            }
            let header = self.read_container_header(shared_type, is_array)?;
            self.buf.set_position(resume)?;
            header
        } else {
            self.read_container_header(node_type, is_array)?
        };

        let mut offsets = Vec::with_capacity(count.min(self.buf.remaining()));
        for _ in 0..count {
            offsets.push(self.read_offset(wide)?);
        }

        if is_array {
            let mut items = Vec::with_capacity(offsets.len());
            for offset in offsets {
                self.buf.set_position(self.resolve(offset, node_start))?;
                items.push(self.decode_node()?);
            }
            return Ok(Json::Array(items));
        }

        let mut map = Map::new();
        for (field_id, offset) in field_ids.into_iter().zip(offsets) {
            let name = field_id
                .checked_sub(1)
                .and_then(|i| self.field_names.get(i))
                .cloned()
                .ok_or_else(|| corrupt(format!("unknown field id {}", field_id)))?;
            self.buf.set_position(self.resolve(offset, node_start))?;
            map.insert(name, self.decode_node()?);
        }
        Ok(Json::Object(map))
    }

    fn read_container_header(&mut self, node_type: u8, is_array: bool) -> Result<(usize, Vec<usize>)> {
        let count = match node_type & NODE_CHILDREN_MASK {
            0 => self.buf.read_u8()? as usize,
            NODE_CHILDREN_UINT16 => self.buf.read_u16_be()? as usize,
            _ => self.buf.read_u32_be()? as usize,
        };
        let mut field_ids = Vec::new();
        if !is_array {
            field_ids.reserve(count.min(self.buf.remaining()));
            for _ in 0..count {
                field_ids.push(self.read_width(self.field_id_length)?);
            }
        }
        Ok((count, field_ids))
    }

    fn read_offset(&mut self, wide: bool) -> Result<usize> {
        self.read_width(if wide { 4 } else { 2 })
    }

    fn resolve(&self, offset: usize, node_start: usize) -> usize {
        if self.relative_offsets {
            node_start + offset
        } else {
            self.tree_seg_pos + offset
        }
    }

    fn read_string(&mut self, len: usize) -> Result<Json> {
        let bytes = self.buf.read_bytes_vec(len)?;
        Ok(Json::String(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn read_number(&mut self, len: usize) -> Result<Json> {
        let number = Number::from_bytes(self.buf.read_bytes_vec(len)?)?;
        Ok(number_to_json(&number))
    }
}

/// Integers stay exact; everything else goes through f64
fn number_to_json(number: &Number) -> Json {
    let text = number.to_string();
    if let Ok(i) = text.parse::<i64>() {
        return Json::from(i);
    }
    match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => Json::Number(n),
        None => Json::String(text),
    }
}

fn vector_to_json(vector: &Vector) -> Json {
    match vector {
        Vector::Float32(v) => Json::from(v.iter().map(|x| *x as f64).collect::<Vec<_>>()),
        Vector::Float64(v) => Json::from(v.clone()),
        Vector::Int8(v) => Json::from(v.iter().map(|x| *x as i64).collect::<Vec<_>>()),
    }
}

/// OSON Encoder - encodes serde_json::Value to OSON binary format
pub struct OsonEncoder {
    field_names: Vec<String>,
    field_ids: HashMap<String, u32>,
    wide: bool,
}

impl OsonEncoder {
    /// Encode a JSON value to OSON bytes
    pub fn encode(value: &Json) -> Result<Vec<u8>> {
        let mut encoder = OsonEncoder::new(value)?;
        let mut tree = Vec::new();
        encoder.encode_node(value, &mut tree)?;
        if tree.len() > u16::MAX as usize {
            encoder.wide = true;
            tree.clear();
            encoder.encode_node(value, &mut tree)?;
        }
        Ok(encoder.finish(value, &tree))
    }

    /// Collect the distinct field names, sorted by hash then length;
    /// field ids are 1-based positions in that order
    fn new(value: &Json) -> Result<Self> {
        let mut field_names = Vec::new();
        let mut seen = HashSet::new();
        collect_field_names(value, &mut field_names, &mut seen);
        if let Some(name) = field_names.iter().find(|n| n.len() > MAX_SHORT_FIELD_NAME) {
            return Err(Error::DataConversionError(format!(
                "JSON field name longer than {} bytes: {:.20}...",
                MAX_SHORT_FIELD_NAME, name
            )));
        }
        field_names.sort_by(|a, b| {
            field_name_hash(a)
                .cmp(&field_name_hash(b))
                .then_with(|| a.len().cmp(&b.len()))
                .then_with(|| a.cmp(b))
        });
        let field_ids = field_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32 + 1))
            .collect();
        Ok(Self {
            field_names,
            field_ids,
            wide: false,
        })
    }

    fn field_id_length(&self) -> usize {
        match self.field_names.len() {
            n if n > u16::MAX as usize => 4,
            n if n > u8::MAX as usize => 2,
            _ => 1,
        }
    }

    fn finish(&self, value: &Json, tree: &[u8]) -> Vec<u8> {
        let mut out = WriteBuffer::new();
        out.write_bytes(&MAGIC);
        out.write_u8(VERSION_MAX_FNAME_255);

        let is_scalar = !matches!(value, Json::Object(_) | Json::Array(_));
        let mut flags = FLAG_INLINE_LEAF;
        if self.wide {
            flags |= FLAG_TREE_SEG_UINT32;
        }

        if is_scalar {
            out.write_u16_be(flags | FLAG_IS_SCALAR);
            write_tree_size(&mut out, flags, tree.len());
            out.write_bytes(tree);
            return out.take().to_vec();
        }

        let mut hash_ids = Vec::with_capacity(self.field_names.len());
        let mut offsets = Vec::with_capacity(self.field_names.len());
        let mut names = Vec::new();
        for name in &self.field_names {
            hash_ids.push(field_name_hash(name));
            offsets.push(names.len());
            names.push(name.len() as u8);
            names.extend_from_slice(name.as_bytes());
        }

        flags |= FLAG_HASH_ID_UINT8 | FLAG_TINY_NODES_STAT;
        match self.field_id_length() {
            4 => flags |= FLAG_NUM_FNAMES_UINT32,
            2 => flags |= FLAG_NUM_FNAMES_UINT16,
            _ => {}
        }
        let wide_names = names.len() > u16::MAX as usize;
        if wide_names {
            flags |= FLAG_FNAMES_SEG_UINT32;
        }
        out.write_u16_be(flags);

        let count = self.field_names.len();
        match self.field_id_length() {
            4 => out.write_u32_be(count as u32),
            2 => out.write_u16_be(count as u16),
            _ => out.write_u8(count as u8),
        }
        if wide_names {
            out.write_u32_be(names.len() as u32);
        } else {
            out.write_u16_be(names.len() as u16);
        }
        write_tree_size(&mut out, flags, tree.len());
        // tiny node count
        out.write_u16_be(0);

        out.write_bytes(&hash_ids);
        for offset in offsets {
            if wide_names {
                out.write_u32_be(offset as u32);
            } else {
                out.write_u16_be(offset as u16);
            }
        }
        out.write_bytes(&names);
        out.write_bytes(tree);
        out.take().to_vec()
    }

    fn encode_node(&self, value: &Json, buf: &mut Vec<u8>) -> Result<()> {
        match value {
            Json::Null => buf.push(TYPE_NULL),
            Json::Bool(true) => buf.push(TYPE_TRUE),
            Json::Bool(false) => buf.push(TYPE_FALSE),
            Json::Number(n) => {
                let number = json_to_number(n)?;
                let image = number.as_bytes();
                if image.len() <= MAX_INLINE_NUMBER {
                    buf.push(0x60 | (image.len() as u8 - 1));
                } else {
                    buf.push(TYPE_DECIMAL_LEN_U8);
                    buf.push(image.len() as u8);
                }
                buf.extend_from_slice(image);
            }
            Json::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() <= MAX_INLINE_STRING {
                    buf.push(bytes.len() as u8);
                } else if bytes.len() <= u8::MAX as usize {
                    buf.push(TYPE_STRING_LEN_U8);
                    buf.push(bytes.len() as u8);
                } else if bytes.len() <= u16::MAX as usize {
                    buf.push(TYPE_STRING_LEN_U16);
                    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                } else {
                    buf.push(TYPE_STRING_LEN_U32);
                    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                }
                buf.extend_from_slice(bytes);
            }
            Json::Array(items) => {
                self.write_container_header(TYPE_ARRAY, items.len(), buf);
                let offsets_start = self.reserve_offsets(items.len(), buf);
                for (i, item) in items.iter().enumerate() {
                    self.patch_offset(buf, offsets_start, i);
                    self.encode_node(item, buf)?;
                }
            }
            Json::Object(map) => {
                self.write_container_header(TYPE_OBJECT, map.len(), buf);
                let id_length = self.field_id_length();
                for key in map.keys() {
                    let id = self.field_ids.get(key).copied().unwrap_or(0);
                    buf.extend_from_slice(&id.to_be_bytes()[4 - id_length..]);
                }
                let offsets_start = self.reserve_offsets(map.len(), buf);
                for (i, child) in map.values().enumerate() {
                    self.patch_offset(buf, offsets_start, i);
                    self.encode_node(child, buf)?;
                }
            }
        }
        Ok(())
    }

    fn write_container_header(&self, base: u8, count: usize, buf: &mut Vec<u8>) {
        let mut node_type = base;
        if self.wide {
            node_type |= NODE_WIDE_OFFSETS;
        }
        if count > u16::MAX as usize {
            node_type |= NODE_CHILDREN_UINT32;
        } else if count > u8::MAX as usize {
            node_type |= NODE_CHILDREN_UINT16;
        }
        buf.push(node_type);
        if count > u16::MAX as usize {
            buf.extend_from_slice(&(count as u32).to_be_bytes());
        } else if count > u8::MAX as usize {
            buf.extend_from_slice(&(count as u16).to_be_bytes());
        } else {
            buf.push(count as u8);
        }
    }

    fn offset_width(&self) -> usize {
        if self.wide {
            4
        } else {
            2
        }
    }

    fn reserve_offsets(&self, count: usize, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        buf.resize(start + count * self.offset_width(), 0);
        start
    }

    /// Point slot `index` at the current end of the tree. Narrow offsets
    /// past 0xFFFF are truncated; the tree is then re-encoded wide.
    fn patch_offset(&self, buf: &mut [u8], offsets_start: usize, index: usize) {
        let pos = buf.len();
        let width = self.offset_width();
        let slot = offsets_start + index * width;
        if self.wide {
            buf[slot..slot + 4].copy_from_slice(&(pos as u32).to_be_bytes());
        } else {
            buf[slot..slot + 2].copy_from_slice(&(pos as u16).to_be_bytes());
        }
    }
}

fn write_tree_size(out: &mut WriteBuffer, flags: u16, len: usize) {
    if flags & FLAG_TREE_SEG_UINT32 != 0 {
        out.write_u32_be(len as u32);
    } else {
        out.write_u16_be(len as u16);
    }
}

fn collect_field_names(value: &Json, names: &mut Vec<String>, seen: &mut HashSet<String>) {
    match value {
        Json::Object(map) => {
            for (key, child) in map {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
                collect_field_names(child, names, seen);
            }
        }
        Json::Array(items) => items
            .iter()
            .for_each(|item| collect_field_names(item, names, seen)),
        _ => {}
    }
}

fn json_to_number(n: &serde_json::Number) -> Result<Number> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from_i64(i));
    }
    if n.is_u64() {
        return Number::parse(&n.to_string());
    }
    match n.as_f64() {
        Some(f) => Number::from_f64(f),
        None => Number::parse(&n.to_string()),
    }
}

/// FNV-1a hash of a field name, low byte
fn field_name_hash(name: &str) -> u8 {
    let mut hash: u32 = 0x811C9DC5;
    for &b in name.as_bytes() {
        hash = (hash ^ b as u32).wrapping_mul(16777619);
    }
    hash as u8
}

/// Coder for JSON columns, exchanged as OSON images
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoder;

impl TypeCoder for JsonCoder {
    fn encode(&self, value: &Value, _desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Json(json) => OsonEncoder::encode(json),
            Value::Text(text) => {
                let json: Json = serde_json::from_str(text)
                    .map_err(|e| Error::DataConversionError(format!("invalid JSON text: {}", e)))?;
                OsonEncoder::encode(&json)
            }
            other => Err(mismatch(other, WireType::Json)),
        }
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        OsonDecoder::decode(data).map(Value::Json)
    }

    fn read(&self, buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
        match read_inline_image(buf)? {
            Some(image) => self.decode(&image, desc),
            None => Ok(Value::Null),
        }
    }

    fn write(&self, buf: &mut WriteBuffer, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        if value.is_null() {
            buf.write_u8(0);
            return Ok(());
        }
        write_inline_image(buf, &self.encode(value, desc)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oson_decode_scalars() {
        // magic + version + flags + tree_size + node
        let image = |node: u8| vec![0xFF, 0x4A, 0x5A, 0x01, 0x00, 0x12, 0x00, 0x01, node];
        assert_eq!(OsonDecoder::decode(&image(0x30)).unwrap(), Json::Null);
        assert_eq!(OsonDecoder::decode(&image(0x31)).unwrap(), json!(true));
        assert_eq!(OsonDecoder::decode(&image(0x32)).unwrap(), json!(false));
        assert_eq!(OsonDecoder::decode(&image(0x00)).unwrap(), json!(""));
    }

    #[test]
    fn test_oson_bad_magic() {
        assert!(OsonDecoder::decode(&[0xFF, 0x4A, 0x00, 0x01]).is_err());
        assert!(OsonDecoder::decode(&[0xFF, 0x4A, 0x5A, 0x09, 0, 0]).is_err());
    }

    #[test]
    fn test_oson_small_object_header() {
        let image = OsonEncoder::encode(&json!({"a": 1})).unwrap();
        assert_eq!(&image[..4], &[0xFF, 0x4A, 0x5A, 0x01]);
        assert_eq!(u16::from_be_bytes([image[4], image[5]]), 0x2102);
        // one field name, two bytes of names, tree size, no tiny nodes
        assert_eq!(image[6], 1);
        assert_eq!(&image[7..9], &[0, 2]);
        assert_eq!(&image[11..13], &[0, 0]);
        assert_eq!(image[13], field_name_hash("a"));
        assert_eq!(&image[14..16], &[0, 0]);
        assert_eq!(&image[16..18], &[1, b'a']);
        // object node: one child, field id 1, offset 5, NUMBER 1
        assert_eq!(&image[18..], &[0x84, 1, 1, 0, 5, 0x61, 0xC1, 0x02]);
    }

    #[test]
    fn test_oson_roundtrip_document() {
        let doc = json!({
            "name": "widget",
            "price": 12.5,
            "count": -40,
            "tags": ["a", "b", null, true],
            "nested": {"name": "inner", "empty": {}, "list": []},
            "description": "a string that is longer than thirty bytes"
        });
        let image = OsonEncoder::encode(&doc).unwrap();
        assert_eq!(OsonDecoder::decode(&image).unwrap(), doc);
    }

    #[test]
    fn test_oson_scalar_roundtrip() {
        for doc in [json!("text"), json!(42), json!(null), json!(false)] {
            let image = OsonEncoder::encode(&doc).unwrap();
            assert_eq!(u16::from_be_bytes([image[4], image[5]]) & FLAG_IS_SCALAR, FLAG_IS_SCALAR);
            assert_eq!(OsonDecoder::decode(&image).unwrap(), doc);
        }
    }

    #[test]
    fn test_oson_wide_offsets() {
        let long = "x".repeat(300);
        let doc = Json::Array((0..300).map(|_| Json::String(long.clone())).collect());
        let image = OsonEncoder::encode(&doc).unwrap();
        let flags = u16::from_be_bytes([image[4], image[5]]);
        assert_ne!(flags & FLAG_TREE_SEG_UINT32, 0);
        // no field names: count, names size, u32 tree size, tiny nodes
        let tree_start = 6 + 1 + 2 + 4 + 2;
        assert_eq!(image[tree_start], TYPE_ARRAY | NODE_WIDE_OFFSETS | NODE_CHILDREN_UINT16);
        assert_eq!(OsonDecoder::decode(&image).unwrap(), doc);

        let small = OsonEncoder::encode(&json!(["x"])).unwrap();
        assert_eq!(u16::from_be_bytes([small[4], small[5]]) & FLAG_TREE_SEG_UINT32, 0);
    }

    #[test]
    fn test_oson_many_field_names() {
        let mut map = Map::new();
        for i in 0..300 {
            map.insert(format!("field_{}", i), json!(i));
        }
        let doc = Json::Object(map);
        let image = OsonEncoder::encode(&doc).unwrap();
        let flags = u16::from_be_bytes([image[4], image[5]]);
        assert_ne!(flags & FLAG_NUM_FNAMES_UINT16, 0);
        assert_eq!(&image[6..8], &300u16.to_be_bytes());
        assert_eq!(OsonDecoder::decode(&image).unwrap(), doc);
    }

    fn image_with_tree(flags: u16, tree: &[u8]) -> Vec<u8> {
        let mut image = vec![0xFF, 0x4A, 0x5A, 0x01];
        image.extend_from_slice(&flags.to_be_bytes());
        image.push(1);
        image.extend_from_slice(&[0, 2]);
        image.extend_from_slice(&(tree.len() as u16).to_be_bytes());
        image.extend_from_slice(&[0, 0]);
        image.push(field_name_hash("a"));
        image.extend_from_slice(&[0, 0]);
        image.extend_from_slice(&[1, b'a']);
        image.extend_from_slice(tree);
        image
    }

    #[test]
    fn test_oson_relative_offsets() {
        // array at 0, object at 4, true at 9; offsets count from each node
        let tree = [0xC0, 1, 0, 4, 0x84, 1, 1, 0, 5, 0x31];
        let image = image_with_tree(0x2103, &tree);
        assert_eq!(OsonDecoder::decode(&image).unwrap(), json!([{"a": true}]));
    }

    #[test]
    fn test_oson_shared_field_ids() {
        let tree = [
            0xC0, 2, 0, 6, 0, 12, // array
            0x84, 1, 1, 0, 11, // first object
            0x31, // true
            0x9C, 0, 6, 0, 17, // second object, field ids from offset 6
            0x32, // false
        ];
        let image = image_with_tree(0x2102, &tree);
        assert_eq!(
            OsonDecoder::decode(&image).unwrap(),
            json!([{"a": true}, {"a": false}])
        );
    }

    #[test]
    fn test_json_coder_prefetched() {
        let desc = TypeDescriptor::new(WireType::Json);
        let doc = json!({"k": [1, 2]});
        let mut out = WriteBuffer::new();
        JsonCoder.write(&mut out, &Value::Json(doc.clone()), &desc).unwrap();
        assert_eq!(out.as_slice()[0], 1);

        let image = OsonEncoder::encode(&doc).unwrap();
        let mut w = WriteBuffer::new();
        w.write_ub4(image.len() as u32);
        w.write_ub8(image.len() as u64);
        w.write_ub4(8060);
        w.write_clr(&image);
        w.write_clr(&[0; 4]);
        w.write_ub4(0);
        let mut buf = ReadBuffer::from_vec(w.as_slice().to_vec());
        assert_eq!(JsonCoder.read(&mut buf, &desc).unwrap(), Value::Json(doc));
        assert_eq!(JsonCoder.read(&mut buf, &desc).unwrap(), Value::Null);
    }

    #[test]
    fn test_json_coder_text_input() {
        let desc = TypeDescriptor::new(WireType::Json);
        let image = JsonCoder.encode(&Value::Text("[1]".into()), &desc).unwrap();
        assert_eq!(JsonCoder.decode(&image, &desc).unwrap(), Value::Json(json!([1])));
        assert!(JsonCoder.encode(&Value::Text("{".into()), &desc).is_err());
        assert!(JsonCoder.encode(&Value::Integer(1), &desc).is_err());
    }
}
