use super::constants::*;
use super::snapshot::ScalerSnapshot;

/// Scan a raw word buffer for banks belonging to the crate identified by
/// `header` and copy their channel words into the snapshot.
///
/// A word opens a bank when its top 12 bits equal the header pattern and its
/// middle byte is zero. The word also encodes the slot and the number of
/// channel words that follow; a count of zero means 32 (the in-stream
/// encoding). The first matching bank in a scan rotates the snapshot and
/// clears the current half, so one call produces at most one new generation.
///
/// `dlen` of zero derives the event length from the self-describing first
/// word (`data[0] + 1`). Lengths above [`MAX_EVENT_LENGTH`] mark the event
/// as corrupted: the current half is cleared and no match is reported.
///
/// Channel writes that would land outside the store are dropped and the scan
/// continues; partial upstream data degrades results instead of halting the
/// pipeline.
///
/// Returns whether any bank of this crate was found in the buffer.
pub fn extract_raw(header: u32, data: &[u32], dlen: usize, snapshot: &mut ScalerSnapshot) -> bool {
    if data.is_empty() {
        return false;
    }
    let mut len = dlen;
    if dlen == 0 {
        len = data[0] as usize + 1;
    }
    if len > MAX_EVENT_LENGTH {
        log::warn!("Event length {len} is crazy; skipping corrupted scaler event");
        snapshot.clear();
        return false;
    }
    let ndat = len.min(data.len());
    let mut found = false;
    let mut first = true;
    let mut dropped: usize = 0;
    for i in 0..ndat {
        let word = data[i];
        if (word & HEADER_MASK) != header || (word & HEADER_RESERVED_MASK) != 0 {
            continue;
        }
        if first {
            first = false;
            snapshot.rotate();
            snapshot.clear();
        }
        let slot = ((word & HEADER_SLOT_MASK) >> HEADER_SLOT_SHIFT) as usize;
        let mut numchan = (word & HEADER_NCHAN_MASK) as usize;
        if numchan == 0 {
            numchan = CHANNELS_PER_SLOT; // in-stream banks omit the count
        }
        for j in (i + 1)..(i + numchan + 1).min(data.len()) {
            let k = slot * CHANNELS_PER_SLOT + j - i - 1;
            if !snapshot.write_raw(k, data[j]) {
                dropped += 1;
            }
        }
        found = true;
    }
    if dropped > 0 {
        log::debug!("Dropped {dropped} out-of-range channel words while scanning");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: u32 = 0xabc0_0000;

    /// Bank header word for this crate: slot in bits 16-19, count in bits 0-7.
    fn bank(slot: u32, numchan: u32) -> u32 {
        HEADER | (slot << 16) | numchan
    }

    #[test]
    fn test_single_bank_copied_exactly() {
        let mut snap = ScalerSnapshot::new();
        let data = [0x0000_0005, 0, 0, bank(6, 2), 0x11, 0x22];
        assert!(extract_raw(HEADER, &data, 0, &mut snap));
        assert_eq!(snap.get(6, 0, 0), 0x11);
        assert_eq!(snap.get(6, 1, 0), 0x22);
        assert_eq!(snap.get(6, 2, 0), 0);
    }

    #[test]
    fn test_wrong_header_ignored() {
        let mut snap = ScalerSnapshot::new();
        let data = [0xceb6_0002, 0x11, 0x22];
        assert!(!extract_raw(HEADER, &data, data.len(), &mut snap));
        assert_eq!(snap.get(6, 0, 0), 0);
    }

    #[test]
    fn test_reserved_byte_rejects_header() {
        let mut snap = ScalerSnapshot::new();
        // Slot and count fields fine, but the middle byte is nonzero
        let data = [bank(6, 2) | 0x1000, 0x11, 0x22];
        assert!(!extract_raw(HEADER, &data, data.len(), &mut snap));
    }

    #[test]
    fn test_zero_count_reads_thirty_two() {
        let mut snap = ScalerSnapshot::new();
        let mut data = vec![bank(3, 0)];
        data.extend((0..CHANNELS_PER_SLOT as u32).map(|k| 1000 + k));
        assert!(extract_raw(HEADER, &data, data.len(), &mut snap));
        assert_eq!(snap.get(3, 0, 0), 1000);
        assert_eq!(snap.get(3, 31, 0), 1031);
    }

    #[test]
    fn test_rotation_on_successive_extractions() {
        let mut snap = ScalerSnapshot::new();
        let ev1 = [bank(2, 1), 7];
        let ev2 = [bank(2, 1), 19];
        assert!(extract_raw(HEADER, &ev1, ev1.len(), &mut snap));
        assert!(extract_raw(HEADER, &ev2, ev2.len(), &mut snap));
        assert_eq!(snap.get(2, 0, 0), 19);
        assert_eq!(snap.get(2, 0, 1), 7);
    }

    #[test]
    fn test_crazy_length_clears_current() {
        let mut snap = ScalerSnapshot::new();
        let ev = [bank(2, 1), 7];
        assert!(extract_raw(HEADER, &ev, ev.len(), &mut snap));
        // Self-described length far past the sanity ceiling
        let bad = [u32::MAX, bank(2, 1), 9];
        assert!(!extract_raw(HEADER, &bad, 0, &mut snap));
        assert_eq!(snap.get(2, 0, 0), 0);
    }

    #[test]
    fn test_overlong_channel_count_is_tolerated() {
        let mut snap = ScalerSnapshot::new();
        // Slot 11 with 32 channels runs exactly to the end of the store;
        // the scan must neither overrun nor abort.
        let mut data = vec![bank(11, 0)];
        data.extend(std::iter::repeat(5u32).take(CHANNELS_PER_SLOT));
        assert!(extract_raw(HEADER, &data, data.len(), &mut snap));
        assert_eq!(snap.get(11, 31, 0), 5);

        // A bank claiming more channels than the buffer holds is clipped.
        let short = [bank(4, 8), 1, 2];
        assert!(extract_raw(HEADER, &short, short.len(), &mut snap));
        assert_eq!(snap.get(4, 0, 0), 1);
        assert_eq!(snap.get(4, 1, 0), 2);
        assert_eq!(snap.get(4, 2, 0), 0);
    }

    #[test]
    fn test_two_banks_in_one_event() {
        let mut snap = ScalerSnapshot::new();
        let data = [bank(1, 2), 10, 20, bank(8, 1), 30];
        assert!(extract_raw(HEADER, &data, data.len(), &mut snap));
        assert_eq!(snap.get(1, 0, 0), 10);
        assert_eq!(snap.get(1, 1, 0), 20);
        assert_eq!(snap.get(8, 0, 0), 30);
    }
}
