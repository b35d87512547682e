use std::cell::Cell;

use nexus_core::{symbol_sort_key, Address, Symbol};

/// Symbols sorted for binary search by the composite key
/// (`address, weak?, debug?, global?, func?, name`), with a
/// one-entry last-hit cache mirroring [`crate::section_table::SectionTable`].
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    last_hit: Cell<Option<usize>>,
}

impl SymbolTable {
    pub fn new(mut symbols: Vec<Symbol>) -> SymbolTable {
        symbols.sort_by(|a, b| symbol_sort_key(a).cmp(&symbol_sort_key(b)));
        SymbolTable {
            symbols,
            last_hit: Cell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Find the symbol whose `[address, address + size)` range owns `addr`.
    /// When several symbols share an address (aliases), the one ranking
    /// highest under `symbol_sort_key` among the owning candidates wins —
    /// preferring a non-weak, non-debug, global, function symbol, matching
    /// the reference decoder's symbol-preference order.
    pub fn find(&self, addr: Address) -> Option<&Symbol> {
        if let Some(idx) = self.last_hit.get() {
            if let Some(sym) = self.symbols.get(idx) {
                if sym.owns(addr) {
                    return Some(sym);
                }
            }
        }

        // Symbols are sorted by address first, so the first candidate whose
        // address is <= addr starts the scan; binary_search_by narrows to
        // that neighborhood, then we scan outward for the best owner since
        // several symbols can legitimately share or straddle addr (aliases,
        // nested local/global pairs).
        let probe = self.symbols.partition_point(|s| s.address <= addr);
        let mut best: Option<usize> = None;
        for idx in (0..probe).rev() {
            let sym = &self.symbols[idx];
            if !sym.owns(addr) {
                // Symbols are sorted by address; once addr exceeds this
                // symbol's range and we are scanning backwards over
                // strictly decreasing addresses, any prior zero-size
                // symbol can still share addr exactly, so keep scanning
                // only a bounded window.
                if sym.address < addr && sym.size > 0 {
                    break;
                }
                continue;
            }
            match best {
                None => best = Some(idx),
                Some(b) if symbol_sort_key(sym) > symbol_sort_key(&self.symbols[b]) => {
                    best = Some(idx)
                }
                _ => {}
            }
        }

        if let Some(idx) = best {
            self.last_hit.set(Some(idx));
        }
        best.map(|idx| &self.symbols[idx])
    }
}
