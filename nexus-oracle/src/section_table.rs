use std::cell::Cell;

use nexus_core::{Address, Section};

/// Sections ordered by `start_addr`, with a one-entry last-hit cache.
///
/// Trace decoding overwhelmingly re-reads the same section on consecutive
/// lookups (a tight loop, a straight-line run of instructions), so a single
/// cached index turns the common case into a branch instead of a binary
/// search, matching the last-hit pattern used for chunk lookups in a
/// file-content cache.
pub struct SectionTable {
    sections: Vec<Section>,
    last_hit: Cell<Option<usize>>,
}

impl SectionTable {
    /// `sections` need not be pre-sorted; they are sorted by `start_addr`
    /// here. Overlapping sections are rejected by the caller's ELF loader,
    /// not by this type.
    pub fn new(mut sections: Vec<Section>) -> SectionTable {
        sections.sort_by_key(|s| s.start_addr);
        SectionTable {
            sections,
            last_hit: Cell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Locate the section containing `addr`, returning its index and a
    /// reference. Updates the last-hit cache on success.
    pub fn find(&self, addr: Address) -> Option<(usize, &Section)> {
        if let Some(idx) = self.last_hit.get() {
            if let Some(sec) = self.sections.get(idx) {
                if sec.contains(addr) {
                    return Some((idx, sec));
                }
            }
        }

        let idx = self.sections.partition_point(|s| s.start_addr <= addr);
        // partition_point finds the first section whose start is past addr;
        // the containing section, if any, is the one just before it.
        if idx == 0 {
            return None;
        }
        let candidate = idx - 1;
        let sec = &self.sections[candidate];
        if sec.contains(addr) {
            self.last_hit.set(Some(candidate));
            Some((candidate, sec))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::SectionFlags;

    fn section(start: Address, end: Address) -> Section {
        let n = ((end - start) / 2) as usize;
        Section::new(
            start,
            end,
            SectionFlags::EXEC | SectionFlags::ALLOC,
            vec![0u16; n],
            vec![String::new(); n],
            vec![None; n],
            vec![None; n],
        )
    }

    #[test]
    fn finds_section_and_caches_last_hit() {
        let table = SectionTable::new(vec![section(0x1000, 0x2000), section(0x4000, 0x5000)]);
        let (idx, sec) = table.find(0x1800).unwrap();
        assert_eq!(idx, 0);
        assert!(sec.contains(0x1800));
        // Repeated lookup in the same section should hit the cache path.
        let (idx2, _) = table.find(0x1900).unwrap();
        assert_eq!(idx2, 0);
    }

    #[test]
    fn address_outside_any_section_is_not_found() {
        let table = SectionTable::new(vec![section(0x1000, 0x2000)]);
        assert!(table.find(0x3000).is_none());
        assert!(table.find(0x0fff).is_none());
    }
}
