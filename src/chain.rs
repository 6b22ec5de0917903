//! Page-chain abstraction: two strategies for linking pages into a file or
//! directory's content, sharing one interface. Grounded on the teacher's
//! `fut0lst.rs` (list-node-size constants for a linked structure threaded
//! through fixed-size slabs) generalized to the two concrete ZealFS schemes
//! described in the layout's `fat_entry_width`.

use byteorder::{ByteOrder, LittleEndian};

use crate::layout::Layout;

/// Either v1's in-band next-byte or v2's FAT table, behind one interface.
/// `next`/`set_next` operate on the whole image buffer; the chain itself
/// does not own any bytes.
pub trait PageChain {
    fn payload_len(&self) -> usize;
    fn next(&self, image: &[u8], page: usize) -> usize;
    fn set_next(&self, image: &mut [u8], page: usize, next: usize);
    fn payload_offset(&self, page: usize) -> usize;

    /// Follow `steps` links from `start`. Undefined (returns whatever page
    /// is reached, possibly 0) if the chain is shorter than `steps`.
    fn walk_to(&self, image: &[u8], start: usize, steps: usize) -> usize {
        let mut page = start;
        for _ in 0..steps {
            let n = self.next(image, page);
            if n == 0 {
                return 0;
            }
            page = n;
        }
        page
    }
}

pub struct ChainV1;

impl PageChain for ChainV1 {
    fn payload_len(&self) -> usize {
        crate::layout::V1_PAYLOAD
    }

    fn next(&self, image: &[u8], page: usize) -> usize {
        image[page * crate::layout::V1_PAGE_SIZE] as usize
    }

    fn set_next(&self, image: &mut [u8], page: usize, next: usize) {
        image[page * crate::layout::V1_PAGE_SIZE] = next as u8;
    }

    fn payload_offset(&self, page: usize) -> usize {
        page * crate::layout::V1_PAGE_SIZE + 1
    }
}

pub struct ChainV2 {
    page_size: usize,
    fat_offset: usize,
    entry_width: usize,
}

impl ChainV2 {
    pub fn new(layout: &Layout) -> Self {
        ChainV2 {
            page_size: layout.page_size,
            fat_offset: layout.fat_offset(),
            entry_width: layout.fat_entry_width,
        }
    }

    fn entry_offset(&self, page: usize) -> usize {
        self.fat_offset + page * self.entry_width
    }
}

impl PageChain for ChainV2 {
    fn payload_len(&self) -> usize {
        self.page_size
    }

    fn next(&self, image: &[u8], page: usize) -> usize {
        let off = self.entry_offset(page);
        if self.entry_width == 1 {
            image[off] as usize
        } else {
            LittleEndian::read_u16(&image[off..off + 2]) as usize
        }
    }

    fn set_next(&self, image: &mut [u8], page: usize, next: usize) {
        let off = self.entry_offset(page);
        if self.entry_width == 1 {
            image[off] = next as u8;
        } else {
            LittleEndian::write_u16(&mut image[off..off + 2], next as u16);
        }
    }

    fn payload_offset(&self, page: usize) -> usize {
        page * self.page_size
    }
}

/// Construct the chain strategy for a layout's variant.
pub fn for_layout(layout: &Layout) -> Box<dyn PageChain> {
    match layout.variant {
        crate::layout::Variant::V1 => Box::new(ChainV1),
        crate::layout::Variant::V2 => Box::new(ChainV2::new(layout)),
    }
}
