use arq_lab_abstract::Packet;

/// Byte-sum term used in place of an empty payload, so that an empty packet
/// does not collapse to `seq + ack`.
pub const EMPTY_PAYLOAD_SUM: i32 = 100;

/// Integrity code over the three protected fields of a packet.
///
/// Sums the byte values of `payload` (or [`EMPTY_PAYLOAD_SUM`] when it is empty)
/// and adds `seq` and `ack`, wrapping on overflow.
pub fn checksum(seq: i32, ack: i32, payload: &str) -> i32 {
    let body = if payload.is_empty() {
        EMPTY_PAYLOAD_SUM
    } else {
        payload
            .bytes()
            .fold(0i32, |sum, byte| sum.wrapping_add(i32::from(byte)))
    };
    body.wrapping_add(seq).wrapping_add(ack)
}

/// `true` when the stored checksum disagrees with the one recomputed from the fields.
pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != checksum(packet.seq_num, packet.ack_num, &packet.payload)
}

/// Build a data packet stamped with its checksum.
pub fn make_packet(seq: i32, ack: i32, payload: &str) -> Packet {
    Packet::new(seq, ack, checksum(seq, ack, payload), payload)
}

/// Build an acknowledgment for `ack`, stamped over `(0, ack, "")`.
pub fn make_ack(ack: i32) -> Packet {
    Packet::new_ack(ack, checksum(0, ack, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_uses_constant() {
        assert_eq!(checksum(0, 0, ""), 100);
        assert_eq!(checksum(3, 4, ""), 107);
        assert_eq!(checksum(0, 7, ""), 100 + 7);
    }

    #[test]
    fn sums_payload_bytes_with_header_fields() {
        // 'A' = 65, 'B' = 66
        assert_eq!(checksum(0, 0, "A"), 65);
        assert_eq!(checksum(2, 1, "AB"), 65 + 66 + 3);
    }

    #[test]
    fn is_repeatable() {
        let a = checksum(5, 0, "hello world");
        let b = checksum(5, 0, "hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn detects_altered_fields() {
        let packet = make_packet(1, 0, "data");
        assert!(!is_corrupted(&packet));

        let mut payload = packet.clone();
        payload.payload = "Zata".to_string();
        assert!(is_corrupted(&payload));

        let mut seq = packet.clone();
        seq.seq_num = 999_999;
        assert!(is_corrupted(&seq));

        let mut stamp = packet;
        stamp.checksum = !stamp.checksum;
        assert!(is_corrupted(&stamp));
    }

    #[test]
    fn acks_are_stamped_over_empty_payload() {
        let ack = make_ack(4);
        assert_eq!(ack.checksum, 104);
        assert!(!is_corrupted(&ack));
    }

    #[test]
    fn wraps_instead_of_overflowing() {
        let _ = checksum(i32::MAX, i32::MAX, "zz");
    }
}
