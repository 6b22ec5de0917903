//! The filesystem engine: format, open, integrity check, and the POSIX-like
//! operation surface (§4.6). `Volume` is the engine-owned image cache with
//! an explicit lifetime, replacing the source's module-level global buffer
//! (§9 design note), grounded structurally on the teacher's
//! `MmapTablespaceReader`/`Writer` pairing in `tablespace.rs` plus its
//! `buf_page_is_corrupted`-style validation function in `buf0buf.rs`.

use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use log::{debug, info, warn};

use crate::bcd::BcdDate;
use crate::bitmap::Bitmap;
use crate::chain::{self, PageChain};
use crate::codec::{self, Entry};
use crate::dir::{self, DirTarget, EntrySlot};
use crate::error::{Result, ZealError};
use crate::image::Image;
use crate::layout::{self, Layout, Variant};
use crate::mbr;
use crate::resolve;

fn chain_for(layout: &Layout) -> Box<dyn PageChain> {
    chain::for_layout(layout)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    pub size: u64,
    pub kind: FileType,
    pub nlink: u32,
    pub mtime: BcdDate,
}

#[derive(Debug, Clone, Copy)]
pub struct FileHandle(EntrySlot);

#[derive(Debug, Clone, Copy)]
pub struct DirHandle(DirTarget);

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameFlags {
    None,
    NoReplace,
    Exchange,
}

pub struct Volume {
    image: Image,
    layout: Layout,
}

impl Volume {
    // --- lifecycle ---------------------------------------------------

    pub fn format(path: &Path, variant: Variant, size_kib: u64, mbr_wrap: bool) -> AnyResult<Volume> {
        let size = size_kib
            .checked_mul(1024)
            .context("size_kib overflows a byte count")?;
        match variant {
            Variant::V1 if size > 65536 => {
                anyhow::bail!("v1 images are limited to 64 KiB, requested {size} bytes")
            }
            Variant::V2 if size > 4u64 * 1024 * 1024 * 1024 => {
                anyhow::bail!("v2 images are limited to 4 GiB, requested {size} bytes")
            }
            _ => {}
        }
        if mbr_wrap && variant != Variant::V2 {
            anyhow::bail!("MBR wrapping is only defined for v2 images");
        }

        let (partition_offset, partition_len, total_len) = if mbr_wrap {
            (512u64, size, 512 + size)
        } else {
            (0u64, size, size)
        };

        let mut image = Image::create(path, total_len)?;
        if mbr_wrap {
            let mut sector = [0u8; mbr::SECTOR_SIZE];
            mbr::write_mbr(&mut sector, partition_offset, partition_len);
            image.whole_file_mut()[..mbr::SECTOR_SIZE].copy_from_slice(&sector);
        }
        image.set_window(partition_offset as usize, partition_len as usize)?;

        let layout = match variant {
            Variant::V1 => Layout::v1(partition_len as usize).map_err(anyhow::Error::from)?,
            Variant::V2 => {
                let code = Layout::recommended_v2_page_size_code(partition_len)
                    .map_err(anyhow::Error::from)?;
                Layout::v2(partition_len as usize, code).map_err(anyhow::Error::from)?
            }
        };

        Self::initialize_header(&mut image, &layout);
        image.flush().context("flushing freshly formatted image")?;
        info!(
            "formatted {:?} image at {} ({} bytes, page size {})",
            variant,
            path.display(),
            partition_len,
            layout.page_size
        );
        Ok(Volume { image, layout })
    }

    fn initialize_header(image: &mut Image, layout: &Layout) {
        match layout.variant {
            Variant::V1 => {
                let free = (layout.page_count - 1) as u8;
                codec::write_header_v1(image.as_mut_slice(), layout.bitmap_size as u8, free);
                let mut bitmap = Bitmap::new(codec::bitmap_v1_mut(image.as_mut_slice()));
                bitmap.set(0);
            }
            Variant::V2 => {
                let page_size_code = (layout.page_size.trailing_zeros() - 8) as u8;
                let free = (layout.page_count - 1 - layout.fat_pages) as u16;
                codec::write_header_v2(
                    image.as_mut_slice(),
                    layout.bitmap_size as u16,
                    free,
                    page_size_code,
                );
                let bitmap_size = layout.bitmap_size;
                let mut bitmap = Bitmap::new(codec::bitmap_v2_mut(image.as_mut_slice(), bitmap_size));
                bitmap.set(0);
                for i in 0..layout.fat_pages {
                    bitmap.set(1 + i);
                }
            }
        }
    }

    pub fn load(path: &Path, variant: Variant) -> AnyResult<Volume> {
        let mut image = Image::open(path)?;

        let mut offset = 0usize;
        let mut len = image.len();
        if variant == Variant::V2 {
            if let Some(loc) = mbr::find_partition(image.whole_file()) {
                offset = loc.offset as usize;
                len = loc.size as usize;
            }
        }
        image.set_window(offset, len)?;

        let buf = image.as_slice();
        if codec::read_magic(buf) != layout::MAGIC {
            return Err(anyhow::Error::from(ZealError::Corrupt));
        }
        let on_disk = Variant::from_version_byte(codec::read_version(buf))
            .map_err(anyhow::Error::from)?;
        if on_disk != variant {
            anyhow::bail!("image variant mismatch: expected {:?}, found {:?}", variant, on_disk);
        }

        let layout = match variant {
            Variant::V1 => Layout::v1(len).map_err(anyhow::Error::from)?,
            Variant::V2 => {
                let code = codec::read_page_size_code_v2(buf);
                Layout::v2(len, code).map_err(anyhow::Error::from)?
            }
        };

        let volume = Volume { image, layout };
        let warnings = volume.integrity_check().map_err(anyhow::Error::from)?;
        for w in &warnings {
            warn!("{w}");
        }
        info!("opened {:?} image at {}", variant, path.display());
        Ok(volume)
    }

    pub fn open_or_format(
        path: &Path,
        variant: Variant,
        size_kib: u64,
        mbr_wrap: bool,
    ) -> AnyResult<Volume> {
        if path.exists() {
            Volume::load(path, variant)
        } else {
            Volume::format(path, variant, size_kib, mbr_wrap)
        }
    }

    pub fn teardown(self) -> AnyResult<()> {
        self.image.flush()
    }

    pub fn integrity_check(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let buf = self.image.as_slice();
        if codec::read_magic(buf) != layout::MAGIC {
            return Err(ZealError::Corrupt);
        }
        if codec::read_version(buf) != self.layout.variant.version_byte() {
            return Err(ZealError::Corrupt);
        }
        if self.layout.bitmap_size == 0 {
            return Err(ZealError::Corrupt);
        }

        let implied_len = self.layout.bitmap_size * 8 * self.layout.page_size;
        if implied_len > self.image.len() {
            return Err(ZealError::Corrupt);
        } else if implied_len < self.image.len() {
            warnings.push(format!(
                "{} trailing bytes of the backing file are unreachable",
                self.image.len() - implied_len
            ));
        }

        let bitmap = match self.layout.variant {
            Variant::V1 => codec::bitmap_v1(buf),
            Variant::V2 => codec::bitmap_v2(buf, self.layout.bitmap_size),
        };
        let actual_zero_bits = (0..self.layout.page_count)
            .filter(|&p| (bitmap[p / 8] >> (p % 8)) & 1 == 0)
            .count();

        let stored_free = self.free_pages() as usize;
        let saturated = self.layout.variant == Variant::V2 && stored_free == 0xFFFF;
        if !saturated {
            if actual_zero_bits < stored_free {
                warnings.push(format!(
                    "free_pages ({stored_free}) overstates the {actual_zero_bits} actually free pages"
                ));
            } else if actual_zero_bits > stored_free {
                return Err(ZealError::Corrupt);
            }
        }

        Ok(warnings)
    }

    // --- allocator bridge ---------------------------------------------

    fn bitmap_mut(&mut self) -> Bitmap<'_> {
        match self.layout.variant {
            Variant::V1 => Bitmap::new(codec::bitmap_v1_mut(self.image.as_mut_slice())),
            Variant::V2 => {
                let size = self.layout.bitmap_size;
                Bitmap::new(codec::bitmap_v2_mut(self.image.as_mut_slice(), size))
            }
        }
    }

    pub fn free_pages(&self) -> u32 {
        match self.layout.variant {
            Variant::V1 => codec::read_free_pages_v1(self.image.as_slice()) as u32,
            Variant::V2 => codec::read_free_pages_v2(self.image.as_slice()) as u32,
        }
    }

    fn set_free_pages(&mut self, v: u32) {
        match self.layout.variant {
            Variant::V1 => codec::set_free_pages_v1(self.image.as_mut_slice(), v.min(255) as u8),
            Variant::V2 => codec::set_free_pages_v2(self.image.as_mut_slice(), v.min(0xFFFF) as u16),
        }
    }

    fn allocate_page(&mut self) -> Result<u32> {
        let page = self.bitmap_mut().allocate().ok_or(ZealError::NoSpace)?;
        let free = self.free_pages();
        self.set_free_pages(free.saturating_sub(1));
        debug!("allocated page {page}");
        Ok(page as u32)
    }

    fn free_page(&mut self, page: u32) {
        self.bitmap_mut().free(page as usize);
        let free = self.free_pages();
        self.set_free_pages(free.saturating_add(1));
        debug!("freed page {page}");
    }

    fn free_chain_from(&mut self, start_page: u32) {
        let layout = self.layout;
        let chain = chain_for(&layout);
        let mut page = start_page as usize;
        loop {
            let next = chain.next(self.image.as_slice(), page);
            self.free_page(page as u32);
            if next == 0 {
                break;
            }
            page = next;
        }
    }

    /// Claim a slot for a new entry in `parent`: reuse an existing free
    /// slot if one was found by the resolver, otherwise (v2 only) grow the
    /// directory's chain by one page. v1 directories, root included, cannot
    /// grow — a full v1 directory is permanently full.
    fn claim_slot(&mut self, parent: DirTarget, free_slot: Option<EntrySlot>) -> Result<EntrySlot> {
        if let Some(slot) = free_slot {
            return Ok(slot);
        }
        if self.layout.variant != Variant::V2 {
            return Err(ZealError::NoFreeDirent);
        }
        let layout = self.layout;
        let chain = chain_for(&layout);
        let last = dir::last_page(self.image.as_slice(), &layout, chain.as_ref(), parent);
        let new_page = self.allocate_page().map_err(|_| ZealError::NoFreeDirent)?;

        let start = new_page as usize * layout.page_size;
        self.image.as_mut_slice()[start..start + layout.page_size].fill(0);

        let link_index = dir::fat_link_index(last);
        chain.set_next(self.image.as_mut_slice(), link_index, new_page as usize);
        debug!("grew directory chain: linked page {new_page} after fat[{link_index}]");
        Ok(EntrySlot::Page(new_page, 0))
    }

    // --- engine operations (§4.6) ---------------------------------------

    pub fn getattr(&self, path: &str) -> Result<Attributes> {
        if path == "/" {
            return Ok(Attributes {
                size: self.layout.page_size as u64,
                kind: FileType::Directory,
                nlink: 2,
                mtime: BcdDate::now(),
            });
        }
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        let (_, entry) = res.entry.ok_or(ZealError::NotFound)?;
        Ok(Attributes {
            size: entry.size as u64,
            kind: if entry.is_dir { FileType::Directory } else { FileType::File },
            nlink: if entry.is_dir { 2 } else { 1 },
            mtime: entry.date,
        })
    }

    pub fn open(&self, path: &str) -> Result<FileHandle> {
        if path == "/" {
            return Err(ZealError::IsDirectory);
        }
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        let (slot, entry) = res.entry.ok_or(ZealError::NotFound)?;
        if entry.is_dir {
            return Err(ZealError::IsDirectory);
        }
        Ok(FileHandle(slot))
    }

    pub fn opendir(&self, path: &str) -> Result<DirHandle> {
        if path == "/" {
            return Ok(DirHandle(DirTarget::Root));
        }
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        let (_, entry) = res.entry.ok_or(ZealError::NotFound)?;
        if !entry.is_dir {
            return Err(ZealError::NotADirectory);
        }
        Ok(DirHandle(DirTarget::NonRoot { start_page: entry.start_page }))
    }

    pub fn readdir(&self, handle: &DirHandle) -> Vec<DirEntryInfo> {
        let layout = self.layout;
        let chain = chain_for(&layout);
        let mut out = vec![
            DirEntryInfo { name: ".".into(), is_dir: true },
            DirEntryInfo { name: "..".into(), is_dir: true },
        ];
        for (_, e) in dir::list_occupied(self.image.as_slice(), &layout, chain.as_ref(), handle.0) {
            out.push(DirEntryInfo { name: e.name_str().to_string(), is_dir: e.is_dir });
        }
        out
    }

    pub fn read(&self, handle: &FileHandle, offset: u64, n: usize) -> Result<Vec<u8>> {
        let layout = self.layout;
        let entry = dir::read_entry(self.image.as_slice(), &layout, handle.0);
        if entry.is_dir {
            return Err(ZealError::IsDirectory);
        }
        let size = entry.size as u64;
        if offset >= size {
            return Ok(Vec::new());
        }
        let to_read = n.min((size - offset) as usize);
        let payload = layout.payload_per_page();
        let chain = chain_for(&layout);
        let image = self.image.as_slice();

        let mut page = entry.start_page as usize;
        let mut skip = offset as usize / payload;
        while skip > 0 {
            page = chain.next(image, page);
            skip -= 1;
        }
        let mut within = offset as usize % payload;

        let mut out = Vec::with_capacity(to_read);
        while out.len() < to_read {
            let off = chain.payload_offset(page) + within;
            let take = (payload - within).min(to_read - out.len());
            out.extend_from_slice(&image[off..off + take]);
            within = 0;
            if out.len() < to_read {
                page = chain.next(image, page);
            }
        }
        Ok(out)
    }

    /// Allocate and link a new page after `page` in `chain`, or return `None`
    /// once the allocator is exhausted. Used by both the offset-seek and
    /// copy loops below, which must stop (not propagate an error) when this
    /// happens mid-write.
    fn extend_chain(&mut self, chain: &dyn PageChain, page: usize) -> Option<usize> {
        let new_page = self.allocate_page().ok()? as usize;
        chain.set_next(self.image.as_mut_slice(), page, new_page);
        Some(new_page)
    }

    pub fn write(&mut self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<usize> {
        let layout = self.layout;
        let max_size: u64 = match layout.variant {
            Variant::V1 => 0xFFFF,
            Variant::V2 => 0xFFFF_FFFF,
        };
        if offset.checked_add(buf.len() as u64).is_none_or(|end| end > max_size) {
            return Err(ZealError::TooLarge);
        }

        let mut entry = dir::read_entry(self.image.as_slice(), &layout, handle.0);
        if entry.is_dir {
            return Err(ZealError::IsDirectory);
        }

        let payload = layout.payload_per_page();
        let within_first = offset as usize % payload;
        let capacity = self.free_pages() as u64 * payload as u64 + (payload - within_first) as u64;
        if buf.len() as u64 > capacity {
            return Err(ZealError::TooLarge);
        }

        let chain = chain_for(&layout);

        let mut page = entry.start_page as usize;
        let mut steps = offset as usize / payload;
        while steps > 0 {
            let next = chain.next(self.image.as_slice(), page);
            page = match next {
                0 => match self.extend_chain(chain.as_ref(), page) {
                    Some(new_page) => new_page,
                    // Exhausted before even reaching the write offset: no
                    // bytes copied, nothing to advance size to.
                    None => return Ok(0),
                },
                next => next,
            };
            steps -= 1;
        }

        let mut written = 0usize;
        let mut within = within_first;
        'copy: while written < buf.len() {
            let off = chain.payload_offset(page);
            let take = (payload - within).min(buf.len() - written);
            self.image.as_mut_slice()[off + within..off + within + take]
                .copy_from_slice(&buf[written..written + take]);
            written += take;
            within = 0;
            if written < buf.len() {
                let next = chain.next(self.image.as_slice(), page);
                page = match next {
                    0 => match self.extend_chain(chain.as_ref(), page) {
                        Some(new_page) => new_page,
                        // Allocator exhausted mid-write: report the short
                        // write and the advanced size, per the documented
                        // behavior, rather than an error.
                        None => break 'copy,
                    },
                    next => next,
                };
            }
        }

        entry.size = ((offset as usize + written).max(entry.size as usize)) as u32;
        dir::write_entry(self.image.as_mut_slice(), &layout, handle.0, &entry);
        Ok(written)
    }

    pub fn create(&mut self, path: &str) -> Result<()> {
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        if res.entry.is_some() {
            return Err(ZealError::Exists);
        }
        let slot = self.claim_slot(res.parent, res.free_slot)?;
        let content_page = self.allocate_page()?;

        let mut entry = Entry::empty();
        entry.occupied = true;
        entry.is_dir = false;
        entry.set_name(&res.basename);
        entry.start_page = content_page;
        entry.size = 0;
        entry.date = BcdDate::now();
        dir::write_entry(self.image.as_mut_slice(), &layout, slot, &entry);
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        if res.entry.is_some() {
            return Err(ZealError::Exists);
        }
        let slot = self.claim_slot(res.parent, res.free_slot)?;
        let content_page = self.allocate_page()?;

        let start = content_page as usize * layout.page_size;
        self.image.as_mut_slice()[start..start + layout.page_size].fill(0);

        let mut entry = Entry::empty();
        entry.occupied = true;
        entry.is_dir = true;
        entry.set_name(&res.basename);
        entry.start_page = content_page;
        entry.size = layout.page_size as u32;
        entry.date = BcdDate::now();
        dir::write_entry(self.image.as_mut_slice(), &layout, slot, &entry);
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        let (slot, entry) = res.entry.ok_or(ZealError::NotFound)?;
        if entry.is_dir {
            return Err(ZealError::IsDirectory);
        }
        self.free_chain_from(entry.start_page);
        dir::clear_entry(self.image.as_mut_slice(), &layout, slot);
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(ZealError::Permission);
        }
        let layout = self.layout;
        let chain = chain_for(&layout);
        let res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), path)?;
        let (slot, entry) = res.entry.ok_or(ZealError::NotFound)?;
        if !entry.is_dir {
            return Err(ZealError::NotADirectory);
        }
        let target = DirTarget::NonRoot { start_page: entry.start_page };
        let occupied = dir::list_occupied(self.image.as_slice(), &layout, chain.as_ref(), target);
        if !occupied.is_empty() {
            return Err(ZealError::NotEmpty);
        }
        self.free_chain_from(entry.start_page);
        dir::clear_entry(self.image.as_mut_slice(), &layout, slot);
        Ok(())
    }

    /// Free and clear whatever currently occupies `slot`, if anything.
    /// Used by `rename` to replace an existing target before reusing or
    /// overwriting its slot.
    fn clear_slot(&mut self, slot: EntrySlot) {
        let layout = self.layout;
        let entry = dir::read_entry(self.image.as_slice(), &layout, slot);
        if entry.occupied {
            self.free_chain_from(entry.start_page);
            dir::clear_entry(self.image.as_mut_slice(), &layout, slot);
        }
    }

    pub fn rename(&mut self, from: &str, to: &str, flags: RenameFlags) -> Result<()> {
        let layout = self.layout;
        let chain = chain_for(&layout);

        let src_res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), from)?;
        let dst_res = resolve::resolve(self.image.as_slice(), &layout, chain.as_ref(), to)?;

        if flags == RenameFlags::Exchange {
            if src_res.entry.is_none() || dst_res.entry.is_none() {
                return Err(ZealError::NotFound);
            }
            return Err(ZealError::Unsupported);
        }

        let (src_slot, mut src_entry) = src_res.entry.ok_or(ZealError::NotFound)?;
        if flags == RenameFlags::NoReplace && dst_res.entry.is_some() {
            return Err(ZealError::Exists);
        }

        let same_dir = src_res.parent == dst_res.parent;

        if let Some((existing_slot, _)) = dst_res.entry {
            if existing_slot == src_slot {
                return Ok(());
            }
        }
        src_entry.set_name(&dst_res.basename);

        if same_dir {
            if let Some((existing_slot, _)) = dst_res.entry {
                self.clear_slot(existing_slot);
            }
            dir::write_entry(self.image.as_mut_slice(), &layout, src_slot, &src_entry);
        } else {
            let dest_slot = if let Some((existing_slot, _)) = dst_res.entry {
                self.clear_slot(existing_slot);
                existing_slot
            } else {
                self.claim_slot(dst_res.parent, dst_res.free_slot)?
            };
            dir::write_entry(self.image.as_mut_slice(), &layout, dest_slot, &src_entry);
            dir::clear_entry(self.image.as_mut_slice(), &layout, src_slot);
        }
        Ok(())
    }

    pub fn variant(&self) -> Variant {
        self.layout.variant
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}
