//! Byte-level builder for synthetic MDF4 files.
#![allow(dead_code)]

use std::io::Write;

use miniz_oxide::deflate::compress_to_vec_zlib;
use tempfile::NamedTempFile;

pub const HD_OFFSET: u64 = 64;

/// Channel data type codes (`cn_data_type`).
pub mod dt {
    pub const UINT_LE: u8 = 0;
    pub const UINT_BE: u8 = 1;
    pub const INT_LE: u8 = 2;
    pub const FLOAT_LE: u8 = 4;
    pub const STRING_LATIN1: u8 = 6;
    pub const STRING_UTF16_LE: u8 = 8;
    pub const BYTE_ARRAY: u8 = 10;
}

pub struct ChannelDef {
    pub name: &'static str,
    pub data_type: u8,
    pub byte_offset: u32,
    pub bit_offset: u8,
    pub bit_count: u32,
    pub master: bool,
    /// Offset of a CC block, 0 for none.
    pub conversion: u64,
    pub channel_type: u8,
    /// Offset of an SI block, 0 for none.
    pub source: u64,
    pub unit: Option<&'static str>,
}

impl ChannelDef {
    pub fn new(name: &'static str, data_type: u8, byte_offset: u32, bit_count: u32) -> Self {
        Self {
            name,
            data_type,
            byte_offset,
            bit_offset: 0,
            bit_count,
            master: false,
            conversion: 0,
            channel_type: 0,
            source: 0,
            unit: None,
        }
    }

    pub fn master(mut self) -> Self {
        self.master = true;
        self.channel_type = 2;
        self
    }

    pub fn bits_at(mut self, bit_offset: u8) -> Self {
        self.bit_offset = bit_offset;
        self
    }

    pub fn converted(mut self, conversion: u64) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn kind(mut self, channel_type: u8) -> Self {
        self.channel_type = channel_type;
        self
    }

    pub fn sourced(mut self, source: u64) -> Self {
        self.source = source;
        self
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Appends blocks at 8-byte aligned offsets and patches links afterwards.
pub struct MdfBuilder {
    bytes: Vec<u8>,
    data_groups: Vec<u64>,
}

impl MdfBuilder {
    pub fn new() -> Self {
        Self::with_id(b"MDF     ", 410)
    }

    pub fn with_id(file_id: &[u8; 8], version: u16) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(file_id);
        bytes.extend_from_slice(b"4.10    ");
        bytes.extend_from_slice(b"synth   ");
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.resize(64, 0);
        let mut builder = Self {
            bytes,
            data_groups: Vec::new(),
        };
        let hd = builder.block(b"##HD", &[0; 6], &[0; 32]);
        assert_eq!(hd, HD_OFFSET);
        builder
    }

    /// Appends a block and returns its offset.
    pub fn block(&mut self, tag: &[u8; 4], links: &[u64], data: &[u8]) -> u64 {
        while self.bytes.len() % 8 != 0 {
            self.bytes.push(0);
        }
        let offset = self.bytes.len() as u64;
        let length = 24 + links.len() * 8 + data.len();
        self.bytes.extend_from_slice(tag);
        self.bytes.extend_from_slice(&[0; 4]);
        self.bytes.extend_from_slice(&(length as u64).to_le_bytes());
        self.bytes.extend_from_slice(&(links.len() as u64).to_le_bytes());
        for link in links {
            self.bytes.extend_from_slice(&link.to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        offset
    }

    pub fn patch_link(&mut self, block: u64, index: usize, target: u64) {
        let at = block as usize + 24 + index * 8;
        self.bytes[at..at + 8].copy_from_slice(&target.to_le_bytes());
    }

    pub fn text(&mut self, text: &str) -> u64 {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        self.block(b"##TX", &[], &data)
    }

    pub fn dt(&mut self, records: &[u8]) -> u64 {
        self.block(b"##DT", &[], records)
    }

    /// A DZ block holding `records`, transposed over `columns` if given.
    pub fn dz(&mut self, records: &[u8], columns: Option<u32>) -> u64 {
        let (zip_type, param, stored) = match columns {
            Some(columns) => (1u8, columns, transposed(records, columns as usize)),
            None => (0u8, 0, records.to_vec()),
        };
        let compressed = compress_to_vec_zlib(&stored, 6);
        let mut data = vec![b'D', b'T', zip_type, 0];
        data.extend_from_slice(&param.to_le_bytes());
        data.extend_from_slice(&(records.len() as u64).to_le_bytes());
        data.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
        data.extend_from_slice(&compressed);
        self.block(b"##DZ", &[], &data)
    }

    /// A DL block listing `blocks`, whose record byte lengths are `lengths`.
    pub fn dl(&mut self, next: u64, blocks: &[u64], lengths: &[u64]) -> u64 {
        self.dl_at(next, blocks, lengths, 0)
    }

    /// A DL block whose first listed block starts at stream byte `start`.
    pub fn dl_at(&mut self, next: u64, blocks: &[u64], lengths: &[u64], start: u64) -> u64 {
        let mut links = vec![next];
        links.extend_from_slice(blocks);
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        let mut position = start;
        for len in lengths {
            data.extend_from_slice(&position.to_le_bytes());
            position += len;
        }
        self.block(b"##DL", &links, &data)
    }

    /// Splits `records` at `cuts` into DT blocks chained by one DL.
    pub fn split_dt(&mut self, records: &[u8], cuts: &[usize]) -> u64 {
        let mut blocks = Vec::new();
        let mut lengths = Vec::new();
        let mut start = 0;
        for &end in cuts.iter().chain(std::iter::once(&records.len())) {
            blocks.push(self.dt(&records[start..end]));
            lengths.push((end - start) as u64);
            start = end;
        }
        self.dl(0, &blocks, &lengths)
    }

    pub fn hl(&mut self, first_dl: u64) -> u64 {
        self.block(b"##HL", &[first_dl], &[0, 0, 0, 0, 0, 0, 0, 0])
    }

    /// A linear conversion `raw * factor + offset`.
    pub fn linear(&mut self, offset: f64, factor: f64) -> u64 {
        self.conversion(1, &[], &[offset, factor])
    }

    pub fn conversion(&mut self, kind: u8, refs: &[u64], values: &[f64]) -> u64 {
        let mut data = vec![kind, 0, 0, 0];
        data.extend_from_slice(&(refs.len() as u16).to_le_bytes());
        data.extend_from_slice(&(values.len() as u16).to_le_bytes());
        for value in values {
            data.extend_from_slice(&value.to_le_bytes());
        }
        let mut links = vec![0; 4];
        links.extend_from_slice(refs);
        self.block(b"##CC", &links, &data)
    }

    pub fn source(&mut self, name: &str, path: &str) -> u64 {
        let name = self.text(name);
        let path = self.text(path);
        self.block(b"##SI", &[name, path, 0], &[2, 2, 0, 0, 0, 0, 0, 0])
    }

    fn channel(&mut self, def: &ChannelDef, next: u64) -> u64 {
        let name = self.text(def.name);
        let unit = match def.unit {
            Some(unit) => self.text(unit),
            None => 0,
        };
        let mut data = vec![0u8; 72];
        data[0] = def.channel_type;
        data[2] = def.data_type;
        data[3] = def.bit_offset;
        data[4..8].copy_from_slice(&def.byte_offset.to_le_bytes());
        data[8..12].copy_from_slice(&def.bit_count.to_le_bytes());
        self.block(
            b"##CN",
            &[next, 0, name, def.source, def.conversion, 0, unit, 0],
            &data,
        )
    }

    /// One data group with one channel group over `data_root`.
    pub fn group(
        &mut self,
        name: &str,
        channels: &[ChannelDef],
        record_bytes: u32,
        cycles: u64,
        data_root: u64,
    ) -> u64 {
        let dg = self.data_group(0, data_root);
        let cg = self.channel_group(name, channels, record_bytes, cycles);
        self.patch_link(dg, 1, cg);
        dg
    }

    /// A data group without channel groups; attach them with
    /// [`Self::channel_group`] and [`Self::patch_link`].
    pub fn data_group(&mut self, record_id_size: u8, data_root: u64) -> u64 {
        let mut data = vec![0u8; 8];
        data[0] = record_id_size;
        let dg = self.block(b"##DG", &[0, 0, data_root, 0], &data);
        self.data_groups.push(dg);
        dg
    }

    pub fn channel_group(
        &mut self,
        name: &str,
        channels: &[ChannelDef],
        record_bytes: u32,
        cycles: u64,
    ) -> u64 {
        let mut next = 0;
        for def in channels.iter().rev() {
            next = self.channel(def, next);
        }
        let acq_name = self.text(name);
        let mut data = vec![0u8; 32];
        data[8..16].copy_from_slice(&cycles.to_le_bytes());
        data[24..28].copy_from_slice(&record_bytes.to_le_bytes());
        self.block(b"##CG", &[0, next, acq_name, 0, 0, 0], &data)
    }

    pub fn finish(mut self) -> Vec<u8> {
        let groups = std::mem::take(&mut self.data_groups);
        for pair in groups.windows(2) {
            self.patch_link(pair[0], 0, pair[1]);
        }
        self.patch_link(HD_OFFSET, 0, groups.first().copied().unwrap_or(0));
        self.bytes
    }
}

pub fn transposed(records: &[u8], columns: usize) -> Vec<u8> {
    let rows = records.len() / columns;
    let mut out = records.to_vec();
    for row in 0..rows {
        for column in 0..columns {
            out[column * rows + row] = records[row * columns + column];
        }
    }
    out
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

/// Ten 5-byte records: UInt8 data at byte 0, UInt16 LE master at byte 1.
pub fn five_byte_records() -> Vec<u8> {
    let mut records = Vec::new();
    for i in 0..10u16 {
        records.push((i * 3) as u8);
        records.extend_from_slice(&(1000 + i * 10).to_le_bytes());
        records.extend_from_slice(&[0xAA, 0xBB]);
    }
    records
}

pub fn five_byte_channels() -> Vec<ChannelDef> {
    vec![
        ChannelDef::new("Time", dt::UINT_LE, 1, 16).master(),
        ChannelDef::new("Data", dt::UINT_LE, 0, 8),
    ]
}

/// `count` records of `width` bytes with a position dependent pattern.
pub fn patterned_records(count: usize, width: usize) -> Vec<u8> {
    (0..count * width)
        .map(|i| ((i / width) * 7 + (i % width) * 31) as u8)
        .collect()
}
