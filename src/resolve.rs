//! Absolute path resolution against a tree of directory chains. Grounded in
//! structure on the teacher's `tablespace.rs` parse flow (small, sequential,
//! `Result`-returning steps: `parse_first_page` -> `validate_first_page` ->
//! accessor methods) adapted to a recursive directory walk instead of a flat
//! page layout.

use crate::chain::PageChain;
use crate::codec::Entry;
use crate::dir::{self, DirTarget, EntrySlot};
use crate::error::{Result, ZealError};
use crate::layout::{Layout, NAME_LEN};

pub struct Resolution {
    pub entry: Option<(EntrySlot, Entry)>,
    pub parent: DirTarget,
    /// First free slot in the parent's *existing* chain pages, if any.
    pub free_slot: Option<EntrySlot>,
    pub basename: String,
}

/// Split `/a/b/c` into `["a","b","c"]`, rejecting components over 16 bytes
/// or containing a NUL, per §3.5.6 and §4.3 step 2.
pub fn split_components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(ZealError::NotFound);
    }
    let comps: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for c in &comps {
        if c.len() > NAME_LEN || c.as_bytes().contains(&0) {
            return Err(ZealError::NotFound);
        }
    }
    Ok(comps)
}

/// Resolve a non-root absolute path. Callers special-case `"/"` itself
/// (root has no entry slot of its own — it's synthesized by `getattr` and
/// addressed directly as `DirTarget::Root` by `opendir`).
pub fn resolve(
    image: &[u8],
    layout: &Layout,
    chain: &dyn PageChain,
    path: &str,
) -> Result<Resolution> {
    let comps = split_components(path)?;
    if comps.is_empty() {
        return Err(ZealError::NotFound);
    }

    let mut current = DirTarget::Root;
    for (i, name) in comps.iter().enumerate() {
        let is_last = i == comps.len() - 1;
        let found = dir::find_by_name(image, layout, chain, current, name);
        if is_last {
            let free_slot = dir::find_free_slot(image, layout, chain, current);
            return Ok(Resolution {
                entry: found,
                parent: current,
                free_slot,
                basename: name.to_string(),
            });
        }
        match found {
            Some((_, e)) if e.is_dir => {
                current = DirTarget::NonRoot {
                    start_page: e.start_page,
                };
            }
            _ => return Err(ZealError::NotFound),
        }
    }
    unreachable!("loop always returns on the last component")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert_eq!(split_components("a/b"), Err(ZealError::NotFound));
    }

    #[test]
    fn rejects_overlong_components() {
        assert_eq!(
            split_components("/aaaaaaaaaaaaaaaaa"),
            Err(ZealError::NotFound)
        );
    }

    #[test]
    fn splits_plain_paths() {
        assert_eq!(split_components("/a/b/c").unwrap(), vec!["a", "b", "c"]);
    }
}
