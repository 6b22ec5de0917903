//! BitmapConsistency and FreeIsZero (§8.1): for an arbitrary sequence of
//! allocate/free operations, the bitmap's count of 0-bits always matches an
//! independently tracked model, and once saturated the allocator never
//! hands out a page again.

use bolero::check;
use zealfs::bitmap::Bitmap;

fn main() {
    check!().with_type().for_each(|ops: &Vec<u16>| {
        const PAGE_COUNT: usize = 64;
        let mut bits = vec![0u8; PAGE_COUNT / 8];
        bits[0] |= 1; // page 0 reserved, as format() leaves it

        let mut allocated = vec![false; PAGE_COUNT];
        allocated[0] = true;

        for &raw in ops {
            let mut bitmap = Bitmap::new(&mut bits);
            if raw % 2 == 0 {
                if let Some(page) = bitmap.allocate() {
                    assert!(page < PAGE_COUNT, "allocate returned an out-of-range page");
                    assert!(!allocated[page], "allocate returned an already-allocated page");
                    allocated[page] = true;
                }
            } else {
                let page = 1 + (raw as usize / 2) % (PAGE_COUNT - 1);
                if allocated[page] {
                    bitmap.free(page);
                    allocated[page] = false;
                }
            }
            let expected_free = allocated.iter().filter(|&&a| !a).count();
            assert_eq!(bitmap.count_free(PAGE_COUNT), expected_free, "BitmapConsistency violated");
        }

        let mut bitmap = Bitmap::new(&mut bits);
        while bitmap.allocate().is_some() {}
        assert_eq!(bitmap.allocate(), None, "allocate must keep failing once saturated");
    });
}
