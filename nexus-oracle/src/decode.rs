use nexus_core::{Address, CachedDecode, Section};

use crate::error::{OracleError, Result};
use crate::section_table::SectionTable;

/// RISC-V vector-extension instruction groupings the oracle distinguishes
/// for call/return and control-flow bookkeeping purposes. The major opcodes
/// `LOAD-FP`/`STORE-FP`/`AMO`/`OP-V` also carry scalar floating-point and
/// integer-AMO encodings; this oracle only needs to know "not a branch, not
/// a call, not a return", so it classifies by major opcode rather than
/// fully disambiguating vector from scalar-FP forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorClass {
    Load,
    Store,
    Amo,
    Arith,
    Config,
}

/// Control-flow classification of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchClass {
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    CJ,
    CJal,
    CJr,
    CJalr,
    CBeqz,
    CBnez,
    Ecall,
    Ebreak,
    Uret,
    Sret,
    Mret,
    Vector(VectorClass),
    Other,
}

impl BranchClass {
    pub fn is_conditional_branch(self) -> bool {
        matches!(
            self,
            BranchClass::Beq
                | BranchClass::Bne
                | BranchClass::Blt
                | BranchClass::Bge
                | BranchClass::Bltu
                | BranchClass::Bgeu
                | BranchClass::CBeqz
                | BranchClass::CBnez
        )
    }

    pub fn is_direct_jump(self) -> bool {
        matches!(self, BranchClass::Jal | BranchClass::CJ | BranchClass::CJal)
    }

    pub fn is_indirect_jump(self) -> bool {
        matches!(self, BranchClass::Jalr | BranchClass::CJr | BranchClass::CJalr)
    }

    pub fn is_control_flow(self) -> bool {
        self.is_conditional_branch() || self.is_direct_jump() || self.is_indirect_jump()
    }
}

/// One decoded instruction at a given address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub address: Address,
    pub raw: u32,
    /// 2 for a compressed instruction, 4 otherwise.
    pub size: u8,
    pub class: BranchClass,
    /// Statically-known PC-relative branch/jump target; `None` for
    /// register-indirect forms (`JALR`, `C.JR`, `C.JALR`).
    pub target: Option<Address>,
    pub rd: Option<u8>,
    pub rs1: Option<u8>,
}

impl DecodedInstruction {
    /// Whether the reconstruction state machine's bounded LIFO call/return
    /// hint stack should push a return address for this instruction.
    pub fn is_inferable_call(&self) -> bool {
        match self.class {
            BranchClass::Jal | BranchClass::Jalr => self.rd == Some(1) || self.rd == Some(5),
            BranchClass::CJal => true, // C.JAL always targets x1
            BranchClass::CJalr => true, // C.JALR always targets x1
            _ => false,
        }
    }

    /// Whether this instruction looks like a function return: an indirect
    /// jump through the link register with no immediate offset.
    pub fn is_inferable_return(&self) -> bool {
        match self.class {
            BranchClass::Jalr => {
                self.rd == Some(0) && matches!(self.rs1, Some(1) | Some(5)) && self.target.is_none()
            }
            BranchClass::CJr => matches!(self.rs1, Some(1) | Some(5)),
            _ => false,
        }
    }
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn jal_imm(word: u32) -> i64 {
    let imm20 = (word >> 31) & 1;
    let imm19_12 = (word >> 12) & 0xFF;
    let imm11 = (word >> 20) & 1;
    let imm10_1 = (word >> 21) & 0x3FF;
    let imm = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
    sign_extend(imm as u64, 21)
}

fn b_imm(word: u32) -> i64 {
    let imm12 = (word >> 31) & 1;
    let imm11 = (word >> 7) & 1;
    let imm10_5 = (word >> 25) & 0x3F;
    let imm4_1 = (word >> 8) & 0xF;
    let imm = (imm12 << 12) | (imm11 << 11) | (imm10_5 << 5) | (imm4_1 << 1);
    sign_extend(imm as u64, 13)
}

fn cj_imm(hw: u16) -> i64 {
    let i = hw as u32;
    let imm11 = (i >> 12) & 1;
    let imm4 = (i >> 11) & 1;
    let imm9_8 = (i >> 9) & 0b11;
    let imm10 = (i >> 8) & 1;
    let imm6 = (i >> 7) & 1;
    let imm7 = (i >> 6) & 1;
    let imm3_1 = (i >> 3) & 0b111;
    let imm5 = (i >> 2) & 1;
    let imm = (imm11 << 11)
        | (imm10 << 10)
        | (imm9_8 << 8)
        | (imm7 << 7)
        | (imm6 << 6)
        | (imm5 << 5)
        | (imm4 << 4)
        | (imm3_1 << 1);
    sign_extend(imm as u64, 12)
}

fn cb_imm(hw: u16) -> i64 {
    let i = hw as u32;
    let imm8 = (i >> 12) & 1;
    let imm4_3 = (i >> 10) & 0b11;
    let imm7_6 = (i >> 5) & 0b11;
    let imm2_1 = (i >> 3) & 0b11;
    let imm5 = (i >> 2) & 1;
    let imm = (imm8 << 8) | (imm7_6 << 6) | (imm5 << 5) | (imm4_3 << 3) | (imm2_1 << 1);
    sign_extend(imm as u64, 9)
}

fn add_signed(addr: Address, delta: i64) -> Address {
    addr.wrapping_add(delta as u64)
}

/// Decode the instruction at `addr` within `section`. `addr` must already
/// be known to lie in `section` (callers go through [`SectionTable::find`]
/// first).
pub fn decode_in_section(section: &Section, addr: Address) -> Result<DecodedInstruction> {
    if addr % 2 != 0 {
        return Err(OracleError::UnalignedAccess(addr));
    }
    let idx = section
        .halfword_index(addr)
        .ok_or(OracleError::AddressNotMapped(addr))?;
    let lo = *section
        .code
        .get(idx)
        .ok_or(OracleError::AddressNotMapped(addr))?;

    if let Some(cached) = section.cached_decode(idx) {
        return Ok(build_decoded(addr, cached.raw, cached.size));
    }

    let low2 = lo & 0b11;
    let (size, raw) = if low2 == 0b11 {
        if lo & 0x1F == 0x1F {
            return Err(OracleError::InstructionTooLong(addr));
        }
        let hi = *section
            .code
            .get(idx + 1)
            .ok_or(OracleError::AddressNotMapped(addr))?;
        (4u8, (lo as u32) | ((hi as u32) << 16))
    } else {
        (2u8, lo as u32)
    };

    section.store_cached_decode(idx, CachedDecode { size, raw });
    Ok(build_decoded(addr, raw, size))
}

fn build_decoded(addr: Address, raw: u32, size: u8) -> DecodedInstruction {
    if size == 4 {
        decode_32(addr, raw)
    } else {
        decode_16(addr, raw as u16)
    }
}

fn decode_32(addr: Address, word: u32) -> DecodedInstruction {
    let opcode = word & 0x7F;
    let rd = ((word >> 7) & 0x1F) as u8;
    let funct3 = (word >> 12) & 0x7;
    let rs1 = ((word >> 15) & 0x1F) as u8;

    let (class, target) = match opcode {
        0x6F => {
            let imm = jal_imm(word);
            (BranchClass::Jal, Some(add_signed(addr, imm)))
        }
        0x67 if funct3 == 0 => (BranchClass::Jalr, None),
        0x63 => {
            let imm = b_imm(word);
            let target = Some(add_signed(addr, imm));
            let class = match funct3 {
                0 => BranchClass::Beq,
                1 => BranchClass::Bne,
                4 => BranchClass::Blt,
                5 => BranchClass::Bge,
                6 => BranchClass::Bltu,
                7 => BranchClass::Bgeu,
                _ => BranchClass::Other,
            };
            (class, target)
        }
        0x73 if funct3 == 0 && rd == 0 => {
            let imm12 = (word >> 20) & 0xFFF;
            let class = match (rs1, imm12) {
                (0, 0x000) => BranchClass::Ecall,
                (0, 0x001) => BranchClass::Ebreak,
                (0, 0x002) => BranchClass::Uret,
                (0, 0x102) => BranchClass::Sret,
                (0, 0x302) => BranchClass::Mret,
                _ => BranchClass::Other,
            };
            (class, None)
        }
        0x07 => (BranchClass::Vector(VectorClass::Load), None),
        0x27 => (BranchClass::Vector(VectorClass::Store), None),
        0x2F => (BranchClass::Vector(VectorClass::Amo), None),
        0x57 => {
            let class = if funct3 == 0b111 {
                VectorClass::Config
            } else {
                VectorClass::Arith
            };
            (BranchClass::Vector(class), None)
        }
        _ => (BranchClass::Other, None),
    };

    DecodedInstruction {
        address: addr,
        raw: word,
        size: 4,
        class,
        target,
        rd: Some(rd),
        rs1: Some(rs1),
    }
}

fn decode_16(addr: Address, hw: u16) -> DecodedInstruction {
    let quadrant = hw & 0b11;
    let funct3 = (hw >> 13) & 0b111;

    let (class, target, rd, rs1) = match (quadrant, funct3) {
        (0b01, 0b101) => (BranchClass::CJ, Some(add_signed(addr, cj_imm(hw))), None, None),
        (0b01, 0b001) => (BranchClass::CJal, Some(add_signed(addr, cj_imm(hw))), Some(1), None),
        (0b01, 0b110) => {
            let rs1p = 8 + ((hw >> 7) & 0b111) as u8;
            (
                BranchClass::CBeqz,
                Some(add_signed(addr, cb_imm(hw))),
                None,
                Some(rs1p),
            )
        }
        (0b01, 0b111) => {
            let rs1p = 8 + ((hw >> 7) & 0b111) as u8;
            (
                BranchClass::CBnez,
                Some(add_signed(addr, cb_imm(hw))),
                None,
                Some(rs1p),
            )
        }
        (0b10, 0b100) => {
            let bit12 = (hw >> 12) & 1;
            let rs2 = (hw >> 2) & 0x1F;
            let rs1v = ((hw >> 7) & 0x1F) as u8;
            if rs2 == 0 && rs1v != 0 {
                if bit12 == 0 {
                    (BranchClass::CJr, None, None, Some(rs1v))
                } else {
                    (BranchClass::CJalr, None, Some(1), Some(rs1v))
                }
            } else {
                (BranchClass::Other, None, None, None)
            }
        }
        _ => (BranchClass::Other, None, None, None),
    };

    DecodedInstruction {
        address: addr,
        raw: hw as u32,
        size: 2,
        class,
        target,
        rd,
        rs1,
    }
}

/// Convenience wrapper driving a full section lookup then decode.
pub fn decode_at(sections: &SectionTable, addr: Address) -> Result<DecodedInstruction> {
    let (_, section) = sections.find(addr).ok_or(OracleError::AddressNotMapped(addr))?;
    decode_in_section(section, addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::SectionFlags;

    fn section_with(code: Vec<u16>) -> Section {
        let n = code.len();
        Section::new(
            0x1000,
            0x1000 + (n as u64) * 2,
            SectionFlags::EXEC,
            code,
            vec![String::new(); n],
            vec![None; n],
            vec![None; n],
        )
    }

    #[test]
    fn decodes_jal_with_correct_target() {
        // jal ra, +8  -> rd=1(ra), opcode=0x6F, imm=8 encoded as imm[10:1]=4<<21.
        let word: u32 = (1 << 7) | 0x6F | (4 << 21);
        let sec = section_with(vec![(word & 0xFFFF) as u16, (word >> 16) as u16]);
        let inst = decode_in_section(&sec, 0x1000).unwrap();
        assert_eq!(inst.class, BranchClass::Jal);
        assert_eq!(inst.size, 4);
        assert_eq!(inst.target, Some(0x1008));
        assert!(inst.is_inferable_call());
    }

    #[test]
    fn decodes_c_jr_as_indirect_and_possible_return() {
        // c.jr ra: quadrant10, funct3=100, bit12=0, rs2=0, rs1=1.
        let hw: u16 = 0b100_0_00001_00000_10;
        let sec = section_with(vec![hw]);
        let inst = decode_in_section(&sec, 0x1000).unwrap();
        assert_eq!(inst.class, BranchClass::CJr);
        assert_eq!(inst.size, 2);
        assert!(inst.target.is_none());
        assert!(inst.is_inferable_return());
    }

    #[test]
    fn decodes_conditional_branch_target() {
        // beq x0, x0, +0  (funct3=0, opcode=0x63), imm bits all zero except trivial case.
        let word: u32 = 0x63;
        let sec = section_with(vec![(word & 0xFFFF) as u16, (word >> 16) as u16]);
        let inst = decode_in_section(&sec, 0x1000).unwrap();
        assert_eq!(inst.class, BranchClass::Beq);
        assert!(inst.class.is_conditional_branch());
    }

    #[test]
    fn caches_decode_result_on_first_access() {
        let word: u32 = 0x6F;
        let sec = section_with(vec![(word & 0xFFFF) as u16, (word >> 16) as u16]);
        assert!(sec.cached_decode(0).is_none());
        let _ = decode_in_section(&sec, 0x1000).unwrap();
        assert!(sec.cached_decode(0).is_some());
    }
}
