use nexus_core::Address;
use thiserror::Error;

/// Errors the instruction oracle can raise while resolving an address
/// against the ELF image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OracleError {
    #[error("address {0:#x} is not mapped by any known section")]
    AddressNotMapped(Address),

    #[error("instruction at {0:#x} claims a size longer than 32 bits")]
    InstructionTooLong(Address),

    #[error("address {0:#x} is not 2-byte aligned")]
    UnalignedAccess(Address),
}

pub type Result<T> = std::result::Result<T, OracleError>;
