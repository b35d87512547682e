use crate::Address;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u32 {
        const LOCAL  = 0b0000_0001;
        const GLOBAL = 0b0000_0010;
        const WEAK   = 0b0000_0100;
        const DEBUG  = 0b0000_1000;
        const FUNC   = 0b0001_0000;
        const FILE   = 0b0010_0000;
        const OBJECT = 0b0100_0000;
    }
}

/// An ELF symbol-table entry, as resolved by the instruction oracle.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub address: Address,
    pub size: u64,
    pub flags: SymbolFlags,
    /// Index into the oracle's section table.
    pub section: Option<usize>,
    /// For a `FILE`-flagged symbol, the following local symbols it groups;
    /// for others, the index of the file-symbol that groups it, if known.
    pub src_file: Option<usize>,
}

impl Symbol {
    /// Whether this symbol's `[address, address + size)` range owns `addr`.
    pub fn owns(&self, addr: Address) -> bool {
        if self.size == 0 {
            return addr == self.address;
        }
        addr >= self.address && addr < self.address + self.size
    }
}

/// Total order used to sort the symbol table for binary search:
/// `(address, weak?, debug?, global?, func?, name)`.
pub fn symbol_sort_key(sym: &Symbol) -> (Address, bool, bool, bool, bool, &str) {
    (
        sym.address,
        sym.flags.contains(SymbolFlags::WEAK),
        sym.flags.contains(SymbolFlags::DEBUG),
        sym.flags.contains(SymbolFlags::GLOBAL),
        sym.flags.contains(SymbolFlags::FUNC),
        sym.name.as_str(),
    )
}
