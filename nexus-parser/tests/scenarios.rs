use nexus_core::{NexusPayload, TCode};
use nexus_parser::{Parser, ParserStep};

fn byte(data6: u8, mseo: u8) -> u8 {
    (data6 << 2) | mseo
}

/// Sync (i_cnt=0, f_addr=0x80001000, no ts) followed by a
/// DirectBranch (i_cnt=3, no ts).
#[test]
fn s1_sync_then_direct_branch() {
    let mut p = Parser::new(0);

    // Sync: tcode=9, reason(4)=0, i_cnt(var)=0, f_addr(var)=0x80001000 (f_addr
    // is stored pre-shift; `current_address = f_addr << 1`, so we transmit
    // f_addr = 0x40000800).
    let mut bytes = Vec::new();
    bytes.push(byte(9, 0b00)); // tcode = 9 (Sync)
    bytes.push(byte(0, 0b00)); // reason(4) = 0, 2 leftover bits for i_cnt
    bytes.push(byte(0, 0b01)); // i_cnt var_end = 0
    let f_addr = 0x8000_1000u64 >> 1;
    // f_addr var field, split across enough 6-bit slices, terminated by END.
    let mut remaining = f_addr;
    loop {
        let chunk = (remaining & 0x3F) as u8;
        remaining >>= 6;
        if remaining == 0 {
            bytes.push(byte(chunk, 0b11)); // END: no timestamp follows
            break;
        } else {
            bytes.push(byte(chunk, 0b00));
        }
    }
    p.push_bytes(&bytes);

    let msg = match p.try_next() {
        ParserStep::Message(m) => m,
        other => panic!("expected sync message, got {other:?}"),
    };
    assert_eq!(msg.tcode, TCode::Sync);
    assert!(!msg.have_timestamp);
    match msg.payload {
        NexusPayload::Sync { i_cnt, f_addr: parsed_f_addr, .. } => {
            assert_eq!(i_cnt, 0);
            assert_eq!(parsed_f_addr << 1, 0x8000_1000);
        }
        other => panic!("unexpected payload {other:?}"),
    }

    // DirectBranch: tcode=3, i_cnt(var)=3, no ts.
    p.push_bytes(&[byte(3, 0b00), byte(3, 0b11)]);
    let msg = match p.try_next() {
        ParserStep::Message(m) => m,
        other => panic!("expected direct branch message, got {other:?}"),
    };
    assert_eq!(msg.tcode, TCode::DirectBranch);
    match msg.payload {
        NexusPayload::DirectBranch { i_cnt } => assert_eq!(i_cnt, 3),
        other => panic!("unexpected payload {other:?}"),
    }
}

/// An unknown TCode mid-stream is dropped with a diagnostic;
/// the next well-formed DirectBranch is decoded normally.
#[test]
fn s6_unknown_tcode_recovery() {
    let mut p = Parser::new(0);
    p.push_bytes(&[byte(34 + 3, 0b11)]); // reserved/undefined TCode
    p.push_bytes(&[byte(3, 0b00), byte(7, 0b11)]); // DirectBranch i_cnt=7

    assert!(matches!(p.try_next(), ParserStep::RecoverableError(_)));
    match p.try_next() {
        ParserStep::Message(m) => {
            assert_eq!(m.tcode, TCode::DirectBranch);
            assert_eq!(m.payload, NexusPayload::DirectBranch { i_cnt: 7 });
        }
        other => panic!("expected recovered direct branch, got {other:?}"),
    }
}
