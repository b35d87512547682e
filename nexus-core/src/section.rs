use crate::Address;
use std::cell::RefCell;

bitflags::bitflags! {
    /// Section flags as carried through from the ELF section header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const EXEC  = 0b0001;
        const WRITE = 0b0010;
        const ALLOC = 0b0100;
    }
}

/// A cached decode result for one half-word index within a section.
/// Populated on first access; never invalidated.
#[derive(Debug, Clone)]
pub struct CachedDecode {
    pub size: u8,
    pub raw: u32,
}

/// A contiguous code region of the ELF image.
///
/// Per-halfword data (`code`, `diss`, `file_name`, `line_number`,
/// `cached_decode`) is laid out as a struct-of-arrays owned directly by
/// the section, rather than a linked list of per-instruction nodes.
pub struct Section {
    pub start_addr: Address,
    pub end_addr: Address,
    pub flags: SectionFlags,
    /// 16-bit code words; a 32-bit instruction occupies two consecutive
    /// entries, low half-word first.
    pub code: Vec<u16>,
    pub diss: Vec<String>,
    pub file_name: Vec<Option<String>>,
    pub line_number: Vec<Option<u32>>,
    cached_decode: RefCell<Vec<Option<CachedDecode>>>,
}

impl Section {
    pub fn new(
        start_addr: Address,
        end_addr: Address,
        flags: SectionFlags,
        code: Vec<u16>,
        diss: Vec<String>,
        file_name: Vec<Option<String>>,
        line_number: Vec<Option<u32>>,
    ) -> Section {
        let n = code.len();
        Section {
            start_addr,
            end_addr,
            flags,
            code,
            diss,
            file_name,
            line_number,
            cached_decode: RefCell::new(vec![None; n]),
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start_addr && addr < self.end_addr
    }

    pub fn halfword_index(&self, addr: Address) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        Some(((addr - self.start_addr) / 2) as usize)
    }

    pub fn cached_decode(&self, halfword_index: usize) -> Option<CachedDecode> {
        self.cached_decode.borrow().get(halfword_index)?.clone()
    }

    pub fn store_cached_decode(&self, halfword_index: usize, decode: CachedDecode) {
        if let Some(slot) = self.cached_decode.borrow_mut().get_mut(halfword_index) {
            *slot = Some(decode);
        }
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("start_addr", &format_args!("{:#x}", self.start_addr))
            .field("end_addr", &format_args!("{:#x}", self.end_addr))
            .field("flags", &self.flags)
            .field("words", &self.code.len())
            .finish()
    }
}
