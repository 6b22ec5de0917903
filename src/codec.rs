//! Packed little-endian reads/writes of header and directory-entry fields at
//! fixed byte offsets. Grounded on the teacher's `page_buf.rs`
//! (`mach::mach_read_from_4/8` at hand-computed offsets into a page slab);
//! ZealFS is little-endian throughout, so this module uses
//! `byteorder::LittleEndian` where the teacher used `BigEndian`.

use byteorder::{ByteOrder, LittleEndian};

use crate::bcd::BcdDate;
use crate::layout::{ENTRY_SIZE, MAGIC, NAME_LEN, Variant};

pub const FLAG_OCCUPIED: u8 = 0x80;
pub const FLAG_DIR: u8 = 0x01;

// --- v1 header ---------------------------------------------------------

pub const V1_OFF_MAGIC: usize = 0;
pub const V1_OFF_VERSION: usize = 1;
pub const V1_OFF_BITMAP_SIZE: usize = 2;
pub const V1_OFF_FREE_PAGES: usize = 3;
pub const V1_OFF_BITMAP: usize = 4;

pub fn read_magic(buf: &[u8]) -> u8 {
    buf[V1_OFF_MAGIC]
}

pub fn read_version(buf: &[u8]) -> u8 {
    buf[V1_OFF_VERSION]
}

pub fn read_bitmap_size_v1(buf: &[u8]) -> u8 {
    buf[V1_OFF_BITMAP_SIZE]
}

pub fn read_free_pages_v1(buf: &[u8]) -> u8 {
    buf[V1_OFF_FREE_PAGES]
}

pub fn set_free_pages_v1(buf: &mut [u8], v: u8) {
    buf[V1_OFF_FREE_PAGES] = v;
}

pub fn bitmap_v1(buf: &[u8]) -> &[u8] {
    &buf[V1_OFF_BITMAP..V1_OFF_BITMAP + 32]
}

pub fn bitmap_v1_mut(buf: &mut [u8]) -> &mut [u8] {
    &mut buf[V1_OFF_BITMAP..V1_OFF_BITMAP + 32]
}

pub fn write_header_v1(buf: &mut [u8], bitmap_size: u8, free_pages: u8) {
    buf[V1_OFF_MAGIC] = MAGIC;
    buf[V1_OFF_VERSION] = Variant::V1.version_byte();
    buf[V1_OFF_BITMAP_SIZE] = bitmap_size;
    buf[V1_OFF_FREE_PAGES] = free_pages;
}

// --- v2 header -----------------------------------------------------------

pub const V2_OFF_MAGIC: usize = 0;
pub const V2_OFF_VERSION: usize = 1;
pub const V2_OFF_BITMAP_SIZE: usize = 2;
pub const V2_OFF_FREE_PAGES: usize = 4;
pub const V2_OFF_PAGE_SIZE_CODE: usize = 6;
pub const V2_OFF_BITMAP: usize = 7;

pub fn read_bitmap_size_v2(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(&buf[V2_OFF_BITMAP_SIZE..V2_OFF_BITMAP_SIZE + 2])
}

pub fn read_free_pages_v2(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(&buf[V2_OFF_FREE_PAGES..V2_OFF_FREE_PAGES + 2])
}

pub fn set_free_pages_v2(buf: &mut [u8], v: u16) {
    LittleEndian::write_u16(&mut buf[V2_OFF_FREE_PAGES..V2_OFF_FREE_PAGES + 2], v);
}

pub fn read_page_size_code_v2(buf: &[u8]) -> u8 {
    buf[V2_OFF_PAGE_SIZE_CODE]
}

pub fn bitmap_v2(buf: &[u8], bitmap_size: usize) -> &[u8] {
    &buf[V2_OFF_BITMAP..V2_OFF_BITMAP + bitmap_size]
}

pub fn bitmap_v2_mut(buf: &mut [u8], bitmap_size: usize) -> &mut [u8] {
    &mut buf[V2_OFF_BITMAP..V2_OFF_BITMAP + bitmap_size]
}

pub fn write_header_v2(buf: &mut [u8], bitmap_size: u16, free_pages: u16, page_size_code: u8) {
    buf[V2_OFF_MAGIC] = MAGIC;
    buf[V2_OFF_VERSION] = Variant::V2.version_byte();
    LittleEndian::write_u16(&mut buf[V2_OFF_BITMAP_SIZE..V2_OFF_BITMAP_SIZE + 2], bitmap_size);
    LittleEndian::write_u16(&mut buf[V2_OFF_FREE_PAGES..V2_OFF_FREE_PAGES + 2], free_pages);
    buf[V2_OFF_PAGE_SIZE_CODE] = page_size_code;
}

// --- directory entry -----------------------------------------------------

/// An in-memory view of one 32-byte directory slot, variant-independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub occupied: bool,
    pub is_dir: bool,
    pub name: [u8; NAME_LEN],
    pub start_page: u32,
    pub size: u32,
    pub date: BcdDate,
}

impl Entry {
    pub fn empty() -> Self {
        Entry {
            occupied: false,
            is_dir: false,
            name: [0; NAME_LEN],
            start_page: 0,
            size: 0,
            date: BcdDate {
                year: 0,
                month: 0,
                day: 0,
                weekday: 0,
                hour: 0,
                minute: 0,
                second: 0,
            },
        }
    }

    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..end]
    }

    pub fn name_str(&self) -> &str {
        std::str::from_utf8(self.name_bytes()).unwrap_or("")
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        let bytes = name.as_bytes();
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    pub fn decode(variant: Variant, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), ENTRY_SIZE);
        let flags = bytes[0];
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[1..17]);
        match variant {
            Variant::V1 => Entry {
                occupied: flags & FLAG_OCCUPIED != 0,
                is_dir: flags & FLAG_DIR != 0,
                name,
                start_page: bytes[17] as u32,
                size: LittleEndian::read_u16(&bytes[18..20]) as u32,
                date: BcdDate::decode(bytes[20..28].try_into().unwrap()),
            },
            Variant::V2 => Entry {
                occupied: flags & FLAG_OCCUPIED != 0,
                is_dir: flags & FLAG_DIR != 0,
                name,
                start_page: LittleEndian::read_u16(&bytes[17..19]) as u32,
                size: LittleEndian::read_u32(&bytes[19..23]),
                date: BcdDate::decode(bytes[23..31].try_into().unwrap()),
            },
        }
    }

    pub fn encode(&self, variant: Variant, bytes: &mut [u8]) {
        debug_assert_eq!(bytes.len(), ENTRY_SIZE);
        bytes.fill(0);
        let mut flags = 0u8;
        if self.occupied {
            flags |= FLAG_OCCUPIED;
        }
        if self.is_dir {
            flags |= FLAG_DIR;
        }
        bytes[0] = flags;
        bytes[1..17].copy_from_slice(&self.name);
        let date = self.date.encode();
        match variant {
            Variant::V1 => {
                bytes[17] = self.start_page as u8;
                LittleEndian::write_u16(&mut bytes[18..20], self.size as u16);
                bytes[20..28].copy_from_slice(&date);
            }
            Variant::V2 => {
                LittleEndian::write_u16(&mut bytes[17..19], self.start_page as u16);
                LittleEndian::write_u32(&mut bytes[19..23], self.size);
                bytes[23..31].copy_from_slice(&date);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_entry_round_trips() {
        let mut e = Entry::empty();
        e.occupied = true;
        e.is_dir = false;
        e.set_name("a.txt");
        e.start_page = 7;
        e.size = 5;
        e.date = BcdDate::now();

        let mut raw = [0u8; ENTRY_SIZE];
        e.encode(Variant::V1, &mut raw);
        let back = Entry::decode(Variant::V1, &raw);
        assert_eq!(back.name_str(), "a.txt");
        assert_eq!(back.start_page, 7);
        assert_eq!(back.size, 5);
        assert!(back.occupied && !back.is_dir);
    }

    #[test]
    fn v2_entry_supports_wide_fields() {
        let mut e = Entry::empty();
        e.occupied = true;
        e.is_dir = true;
        e.set_name("subdir");
        e.start_page = 70000 % 65536;
        e.size = 1_000_000;

        let mut raw = [0u8; ENTRY_SIZE];
        e.encode(Variant::V2, &mut raw);
        let back = Entry::decode(Variant::V2, &raw);
        assert_eq!(back.start_page, e.start_page);
        assert_eq!(back.size, 1_000_000);
        assert!(back.is_dir);
    }
}
