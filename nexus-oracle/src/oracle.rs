use nexus_core::{Address, PathRewrite, PathStyle, Section, Symbol};

use crate::decode::{decode_in_section, DecodedInstruction};
use crate::error::{OracleError, Result};
use crate::path::normalize_path;
use crate::section_table::SectionTable;
use crate::source_cache::SourceFileCache;
use crate::symbol_table::SymbolTable;

/// A source line annotation for one instruction address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub path: String,
    pub line: u32,
    pub text: Option<String>,
}

/// The address oracle: everything the reconstruction state machine needs to
/// know about a PC that the bit-level protocol itself carries no opinion
/// on — what instruction lives there, whose function it belongs to, and
/// what source line produced it.
///
/// Building the `Section`/`Symbol` tables themselves (reading the ELF, the
/// object-file symbol table, and any embedded debug line tables) is
/// deliberately out of scope for this type; it only consumes the
/// already-materialized tables.
pub struct InstructionOracle {
    sections: SectionTable,
    symbols: SymbolTable,
    source_cache: SourceFileCache,
    path_rewrite: PathRewrite,
    path_style: PathStyle,
}

impl InstructionOracle {
    pub fn new(
        sections: Vec<Section>,
        symbols: Vec<Symbol>,
        path_rewrite: PathRewrite,
        path_style: PathStyle,
    ) -> InstructionOracle {
        InstructionOracle {
            sections: SectionTable::new(sections),
            symbols: SymbolTable::new(symbols),
            source_cache: SourceFileCache::new(),
            path_rewrite,
            path_style,
        }
    }

    pub fn decode(&self, addr: Address) -> Result<DecodedInstruction> {
        let (_, section) = self
            .sections
            .find(addr)
            .ok_or(OracleError::AddressNotMapped(addr))?;
        decode_in_section(section, addr)
    }

    pub fn symbol_at(&self, addr: Address) -> Option<&Symbol> {
        self.symbols.find(addr)
    }

    /// The disassembly text the external collaborator attached to this
    /// half-word, if any. The oracle surfaces but does not itself produce
    /// disassembly text.
    pub fn disassembly_at(&self, addr: Address) -> Option<&str> {
        let (_, section) = self.sections.find(addr)?;
        let idx = section.halfword_index(addr)?;
        section.diss.get(idx).map(|s| s.as_str())
    }

    pub fn source_line_at(&self, addr: Address) -> Option<SourceLine> {
        let (_, section) = self.sections.find(addr)?;
        let idx = section.halfword_index(addr)?;
        let raw_path = section.file_name.get(idx)?.as_ref()?;
        let line = (*section.line_number.get(idx)?)?;
        let path = normalize_path(raw_path, &self.path_rewrite, self.path_style);
        let text = self.source_cache.line(&path, line);
        Some(SourceLine { path, line, text })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}
