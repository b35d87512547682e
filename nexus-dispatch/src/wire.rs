//! Big-endian frame wire protocol: a fixed 7-byte header
//! (`version | msg_type | opcode | payload_len`) followed by the payload
//! and a trailing 4-byte CRC-32 over the header and payload, every frame
//! awaiting a 4-byte ACK carrying the literal `0xDEADBEEF`.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use nexus_core::Error;

pub const PROTOCOL_VERSION: u8 = 1;
pub const MSG_TYPE_INTERNAL: u8 = 0;
pub const MSG_TYPE_RESPONSE: u8 = 1;
pub const OPCODE_BULK_WRITE: u8 = 0;
pub const ACK_LITERAL: u32 = 0xDEAD_BEEF;

fn io_err(e: std::io::Error) -> Error {
    Error::Err(format!("socket I/O error: {e}"))
}

/// CRC-32/ISO-HDLC (the zlib/PNG polynomial), computed bit by bit. Frames
/// are small and infrequent, so a precomputed lookup table buys nothing.
fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

pub fn write_frame<W: Write>(w: &mut W, msg_type: u8, opcode: u8, payload: &[u8]) -> Result<(), Error> {
    let mut header = Vec::with_capacity(7 + payload.len());
    header.push(PROTOCOL_VERSION);
    header.push(msg_type);
    header.push(opcode);
    header.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    header.extend_from_slice(payload);
    let crc = crc32(&header);
    w.write_all(&header).map_err(io_err)?;
    w.write_u32::<BigEndian>(crc).map_err(io_err)?;
    Ok(())
}

/// Build one ACK frame (`type=RESPONSE`, payload=`ACK_LITERAL`) as bytes,
/// CRC included. Exposed so callers feeding a fake transport in tests don't
/// need to duplicate the CRC algorithm by hand.
pub fn ack_frame_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    write_frame(&mut buf, MSG_TYPE_RESPONSE, OPCODE_BULK_WRITE, &ACK_LITERAL.to_be_bytes())
        .expect("writing to a Vec never fails");
    buf
}

/// Send the session's one control message: the decoder's worker thread id,
/// as a 4-byte big-endian payload.
pub fn send_control_message<W: Write>(w: &mut W, thread_id: u32) -> Result<(), Error> {
    let mut payload = [0u8; 4];
    BigEndian::write_u32(&mut payload, thread_id);
    write_frame(w, MSG_TYPE_INTERNAL, OPCODE_BULK_WRITE, &payload)
}

/// Announce how many raw bytes of PC samples follow.
pub fn write_length_frame<W: Write>(w: &mut W, byte_count: u32) -> Result<(), Error> {
    let mut payload = [0u8; 4];
    BigEndian::write_u32(&mut payload, byte_count);
    write_frame(w, MSG_TYPE_INTERNAL, OPCODE_BULK_WRITE, &payload)
}

/// Write the raw `u64` PC buffer directly, with no further framing.
pub fn write_raw_samples<W: Write>(w: &mut W, samples: &[u64]) -> Result<(), Error> {
    for pc in samples {
        w.write_u64::<BigEndian>(*pc).map_err(io_err)?;
    }
    Ok(())
}

/// Block for one ACK frame, validate its CRC, and check it carries
/// `ACK_LITERAL`.
pub fn read_ack<R: Read>(r: &mut R) -> Result<(), Error> {
    let version = r.read_u8().map_err(io_err)?;
    let msg_type = r.read_u8().map_err(io_err)?;
    let opcode = r.read_u8().map_err(io_err)?;
    let payload_len = r.read_u32::<BigEndian>().map_err(io_err)?;
    if msg_type != MSG_TYPE_RESPONSE || payload_len != 4 {
        return Err(Error::AckErr);
    }
    let mut payload = [0u8; 4];
    r.read_exact(&mut payload).map_err(io_err)?;
    let crc = r.read_u32::<BigEndian>().map_err(io_err)?;

    let mut header = Vec::with_capacity(7 + 4);
    header.push(version);
    header.push(msg_type);
    header.push(opcode);
    header.extend_from_slice(&payload_len.to_be_bytes());
    header.extend_from_slice(&payload);
    if crc32(&header) != crc {
        return Err(Error::AckErr);
    }

    let response = BigEndian::read_u32(&payload);
    if response != ACK_LITERAL {
        return Err(Error::AckErr);
    }
    Ok(())
}
