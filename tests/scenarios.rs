//! The seven literal end-to-end scenarios of §8.2, plus RoundTrip,
//! PersistenceRoundTrip, a ChainTermination/NoAlias check by content
//! isolation, and NameUniqueness.

use zealfs::error::ZealError;
use zealfs::layout::Variant;
use zealfs::volume::{RenameFlags, Volume};

#[test]
fn scenario_v1_format() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();
    assert_eq!(volume.free_pages(), 127);
    volume.teardown().unwrap();

    let bytes = std::fs::read(tmp.path()).unwrap();
    assert_eq!(bytes[0], 0x5A);
    assert_eq!(bytes[1], 1);
    assert_eq!(bytes[2], 16);
    assert_eq!(bytes[3], 127);
    assert_eq!(bytes[4], 0x01);
    assert!(bytes[5..64].iter().all(|&b| b == 0));
}

#[test]
fn scenario_v1_create_write_read() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();

    volume.create("/a.txt").unwrap();
    let handle = volume.open("/a.txt").unwrap();
    assert_eq!(volume.write(&handle, 0, b"Hello").unwrap(), 5);

    assert_eq!(volume.read(&handle, 0, 5).unwrap(), b"Hello");
    assert_eq!(volume.getattr("/a.txt").unwrap().size, 5);
    assert_eq!(volume.free_pages(), 126);
}

#[test]
fn scenario_v1_multi_page_write() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();

    volume.create("/big").unwrap();
    let handle = volume.open("/big").unwrap();
    let pattern: Vec<u8> = (0..512u32).map(|i| b'A' + (i % 26) as u8).collect();

    assert_eq!(volume.write(&handle, 0, &pattern).unwrap(), 512);
    assert_eq!(volume.read(&handle, 0, 512).unwrap(), pattern);
    assert_eq!(volume.free_pages(), 124);
}

#[test]
fn scenario_v1_unlink_reclaims() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();

    volume.create("/big").unwrap();
    let handle = volume.open("/big").unwrap();
    let pattern = vec![0u8; 512];
    volume.write(&handle, 0, &pattern).unwrap();
    assert_eq!(volume.free_pages(), 124);

    volume.unlink("/big").unwrap();
    assert_eq!(volume.free_pages(), 127);

    volume.create("/big").unwrap();
    let handle = volume.open("/big").unwrap();
    volume.write(&handle, 0, &pattern).unwrap();
    assert_eq!(volume.free_pages(), 124);
}

#[test]
fn scenario_v2_format_1mib() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let volume = Volume::format(tmp.path(), Variant::V2, 1024, false).unwrap();
    assert_eq!(volume.free_pages(), 1021);
    volume.teardown().unwrap();

    let bytes = std::fs::read(tmp.path()).unwrap();
    assert_eq!(bytes[0], 0x5A);
    assert_eq!(bytes[1], 2);
    assert_eq!(bytes[6], 2);
    assert_eq!(bytes[7], 0x07);
}

#[test]
fn scenario_v2_large_directory_grows_root_chain() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V2, 1024, false).unwrap();

    for i in 0..100 {
        volume.create(&format!("/f{i:03}")).unwrap();
    }

    let handle = volume.opendir("/").unwrap();
    let listing = volume.readdir(&handle);
    assert_eq!(listing.len(), 102);
    for i in 0..100 {
        let name = format!("f{i:03}");
        assert!(listing.iter().any(|e| e.name == name), "missing {name}");
    }
}

#[test]
fn scenario_rename_cross_directory() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();
    let free_before = volume.free_pages();

    volume.mkdir("/a").unwrap();
    volume.mkdir("/b").unwrap();
    volume.create("/a/x").unwrap();
    let handle = volume.open("/a/x").unwrap();
    volume.write(&handle, 0, b"hi").unwrap();

    volume.rename("/a/x", "/b/x", RenameFlags::None).unwrap();

    assert!(volume.getattr("/a/x").is_err());
    let handle = volume.open("/b/x").unwrap();
    assert_eq!(volume.read(&handle, 0, 2).unwrap(), b"hi");
    assert_eq!(volume.free_pages(), free_before - 3);
}

#[test]
fn round_trip_write_then_read() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();

    volume.create("/r").unwrap();
    let handle = volume.open("/r").unwrap();
    let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    volume.write(&handle, 0, &data).unwrap();

    assert_eq!(volume.read(&handle, 0, data.len()).unwrap(), data);
}

#[test]
fn persistence_round_trip() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    {
        let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();
        volume.mkdir("/docs").unwrap();
        volume.create("/docs/note").unwrap();
        let handle = volume.open("/docs/note").unwrap();
        volume.write(&handle, 0, b"persisted").unwrap();
        volume.teardown().unwrap();
    }

    let volume = Volume::load(tmp.path(), Variant::V1).unwrap();
    let handle = volume.open("/docs/note").unwrap();
    assert_eq!(volume.read(&handle, 0, 9).unwrap(), b"persisted");
    assert_eq!(volume.getattr("/docs/note").unwrap().size, 9);
}

/// ChainTermination and NoAlias by content isolation: two files written with
/// distinct, multi-page patterns must read back uncorrupted, and the
/// allocator delta must match exactly `ceil(size / payload)` extra pages
/// per file — either a cycle or a shared page would show up as corrupted
/// content or a mismatched free-page count.
#[test]
fn chain_termination_and_no_alias() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();

    volume.create("/one").unwrap();
    let h1 = volume.open("/one").unwrap();
    let pattern1 = vec![0xAAu8; 600];
    volume.write(&h1, 0, &pattern1).unwrap();

    volume.create("/two").unwrap();
    let h2 = volume.open("/two").unwrap();
    let pattern2 = vec![0x55u8; 600];
    volume.write(&h2, 0, &pattern2).unwrap();

    assert_eq!(volume.read(&h1, 0, 600).unwrap(), pattern1);
    assert_eq!(volume.read(&h2, 0, 600).unwrap(), pattern2);
    assert_eq!(volume.free_pages(), 127 - 3 - 3);
}

/// FreeIsZero (§8.1) at the engine level: once a v2 image's free pages hit
/// zero, `create`/`mkdir` that need to grow a directory see `NoFreeDirent`,
/// and a write whose offset lands exactly on an unextendable chain boundary
/// is reported as a short write rather than an error, per §4.6's documented
/// mid-write exhaustion behavior. Geometry: 3 KiB v2 image, page size 256 B,
/// 12 pages total, 1 FAT page, 10 free after format, 7-slot root.
#[test]
fn free_pages_exhaustion_surfaces_no_free_dirent_and_short_write() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V2, 3, false).unwrap();
    assert_eq!(volume.free_pages(), 10);

    for i in 0..7 {
        volume.create(&format!("/f{i}")).unwrap();
    }
    assert_eq!(volume.free_pages(), 3);

    let handle = volume.open("/f0").unwrap();
    let pattern = vec![0x42u8; 1024];
    assert_eq!(volume.write(&handle, 0, &pattern).unwrap(), 1024);
    assert_eq!(volume.free_pages(), 0);

    assert_eq!(volume.create("/f7"), Err(ZealError::NoFreeDirent));
    assert_eq!(volume.mkdir("/d7"), Err(ZealError::NoFreeDirent));

    // Plainly over capacity: rejected up front.
    assert_eq!(volume.write(&handle, 0, &vec![0u8; 2000]), Err(ZealError::TooLarge));

    // Offset sits exactly on the chain's current end; the pre-check's
    // capacity formula passes (it only accounts for the last page's
    // remaining room, not the seek needed to reach it), but walking to
    // offset 1024 needs one more page than the exhausted allocator has.
    // The documented behavior is a short write, not an error.
    assert_eq!(volume.write(&handle, 1024, &[1, 2, 3]).unwrap(), 0);
    assert_eq!(volume.getattr("/f0").unwrap().size, 1024);
    assert_eq!(volume.free_pages(), 0);
}

#[test]
fn name_uniqueness_rejects_duplicate_create() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut volume = Volume::format(tmp.path(), Variant::V1, 32, false).unwrap();
    volume.create("/dup").unwrap();
    assert_eq!(volume.create("/dup"), Err(ZealError::Exists));
}
