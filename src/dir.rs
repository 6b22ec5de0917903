//! Directory model. Root and non-root directories are different shapes (a
//! handful of fixed slots in the header page's tail, versus a full page or
//! a growable chain of pages) unified behind `DirTarget`'s two constructors,
//! per the "single `Directory` abstraction" design note. Entry addresses are
//! `(page, slot)` descriptors (`EntrySlot`), never raw byte pointers,
//! matching the teacher's preference for typed offsets over raw addresses
//! (see `page0page.rs`'s `page_offset`/`page_get_page_no` helpers).

use crate::chain::PageChain;
use crate::codec::Entry;
use crate::layout::{ENTRY_SIZE, Layout, Variant};

/// A directory, identified by how its first page is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirTarget {
    Root,
    NonRoot { start_page: u32 },
}

/// One page within a directory's chain. `Header` is the root's slots living
/// in page 0's tail; `Page(n)` is an ordinary full content page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirPage {
    Header,
    Page(u32),
}

/// Address of one 32-byte directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySlot {
    Root(u16),
    Page(u32, u16),
}

impl EntrySlot {
    pub fn byte_offset(&self, layout: &Layout) -> usize {
        match self {
            EntrySlot::Root(slot) => layout.root_entries_offset + *slot as usize * ENTRY_SIZE,
            EntrySlot::Page(page, slot) => {
                *page as usize * layout.page_size + *slot as usize * ENTRY_SIZE
            }
        }
    }
}

pub fn read_entry(image: &[u8], layout: &Layout, slot: EntrySlot) -> Entry {
    let off = slot.byte_offset(layout);
    Entry::decode(layout.variant, &image[off..off + ENTRY_SIZE])
}

pub fn write_entry(image: &mut [u8], layout: &Layout, slot: EntrySlot, entry: &Entry) {
    let off = slot.byte_offset(layout);
    entry.encode(layout.variant, &mut image[off..off + ENTRY_SIZE]);
}

pub fn clear_entry(image: &mut [u8], layout: &Layout, slot: EntrySlot) {
    write_entry(image, layout, slot, &Entry::empty());
}

/// Every page making up a directory's content chain, in order. v1
/// directories never span more than one page (root's 6 header slots, or a
/// single 8-slot content page); v2 directories, root included, may continue
/// via the FAT — the root's continuation lives at `fat[0]`, a slot that can
/// never otherwise be used since page 0 is the header, never a link target.
pub fn chain_pages(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
) -> Vec<DirPage> {
    match (layout.variant, target) {
        (Variant::V1, DirTarget::Root) => vec![DirPage::Header],
        (Variant::V1, DirTarget::NonRoot { start_page }) => vec![DirPage::Page(start_page)],
        (Variant::V2, DirTarget::Root) => {
            let mut pages = vec![DirPage::Header];
            let mut cursor = 0usize;
            loop {
                let next = chain.next(image, cursor);
                if next == 0 {
                    break;
                }
                pages.push(DirPage::Page(next as u32));
                cursor = next;
            }
            pages
        }
        (Variant::V2, DirTarget::NonRoot { start_page }) => {
            let mut pages = vec![DirPage::Page(start_page)];
            let mut cursor = start_page as usize;
            loop {
                let next = chain.next(image, cursor);
                if next == 0 {
                    break;
                }
                pages.push(DirPage::Page(next as u32));
                cursor = next;
            }
            pages
        }
    }
}

pub fn slots_in_page(page: DirPage, layout: &Layout) -> Vec<EntrySlot> {
    match page {
        DirPage::Header => (0..layout.root_entry_count as u16)
            .map(EntrySlot::Root)
            .collect(),
        DirPage::Page(p) => (0..layout.entries_per_page() as u16)
            .map(|i| EntrySlot::Page(p, i))
            .collect(),
    }
}

/// The FAT index the chain-link for a page's continuation is stored under:
/// `0` for the root (header) page, the page number itself otherwise.
pub fn fat_link_index(page: DirPage) -> usize {
    match page {
        DirPage::Header => 0,
        DirPage::Page(p) => p as usize,
    }
}

pub fn all_slots(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
) -> Vec<EntrySlot> {
    chain_pages(image, layout, chain, target)
        .into_iter()
        .flat_map(|p| slots_in_page(p, layout))
        .collect()
}

pub fn list_occupied(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
) -> Vec<(EntrySlot, Entry)> {
    all_slots(image, layout, chain, target)
        .into_iter()
        .map(|slot| (slot, read_entry(image, layout, slot)))
        .filter(|(_, e)| e.occupied)
        .collect()
}

/// First unoccupied slot in the directory's *existing* chain, without
/// growing it. `None` means every page currently in the chain is full.
pub fn find_free_slot(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
) -> Option<EntrySlot> {
    all_slots(image, layout, chain, target)
        .into_iter()
        .find(|slot| !read_entry(image, layout, *slot).occupied)
}

/// The last page currently in the directory's chain, the one a new page
/// would be linked from.
pub fn last_page(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
) -> DirPage {
    *chain_pages(image, layout, chain, target)
        .last()
        .expect("a directory chain always has at least one page")
}

pub fn find_by_name(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    target: DirTarget,
    name: &str,
) -> Option<(EntrySlot, Entry)> {
    all_slots(image, layout, chain, target)
        .into_iter()
        .map(|slot| (slot, read_entry(image, layout, slot)))
        .find(|(_, e)| e.occupied && e.name_str() == name)
}
