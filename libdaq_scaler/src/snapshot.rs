use super::constants::{CHANNELS_PER_SLOT, STORE_SIZE};

/// Double-buffered store of raw scaler counts.
///
/// `current` holds the counts of the most recent extraction, `previous` the
/// counts of the one before it, so that consumers can difference the two to
/// derive rates. Both halves are flat arrays indexed by
/// `slot * CHANNELS_PER_SLOT + channel`.
#[derive(Debug, Clone)]
pub struct ScalerSnapshot {
    current: Vec<u32>,
    previous: Vec<u32>,
}

impl Default for ScalerSnapshot {
    fn default() -> Self {
        ScalerSnapshot {
            current: vec![0; STORE_SIZE],
            previous: vec![0; STORE_SIZE],
        }
    }
}

impl ScalerSnapshot {
    pub fn new() -> Self {
        ScalerSnapshot::default()
    }

    /// Copy the current half onto the previous half.
    ///
    /// Called once at the start of every successful extraction, before the
    /// current half is overwritten.
    pub fn rotate(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }

    /// Zero the current half only. The previous half keeps the counts of the
    /// last extraction.
    pub fn clear(&mut self) {
        self.current.fill(0);
    }

    /// Zero both halves.
    pub fn clear_all(&mut self) {
        self.current.fill(0);
        self.previous.fill(0);
    }

    /// Write a raw value at a flat store index.
    ///
    /// Out-of-range indices are dropped without touching the store; the
    /// return value reports whether the write landed.
    pub fn write_raw(&mut self, index: usize, value: u32) -> bool {
        if index < STORE_SIZE {
            self.current[index] = value;
            true
        } else {
            false
        }
    }

    /// Read a count by slot and channel. `history` selects the current (0)
    /// or previous (1) half. Anything out of range reads as zero.
    pub fn get(&self, slot: usize, channel: usize, history: usize) -> u32 {
        let index = slot * CHANNELS_PER_SLOT + channel;
        if index >= STORE_SIZE {
            return 0;
        }
        match history {
            0 => self.current[index],
            1 => self.previous[index],
            _ => 0,
        }
    }

    /// Signed difference current − previous for one channel.
    pub fn delta(&self, slot: usize, channel: usize) -> i64 {
        self.get(slot, channel, 0) as i64 - self.get(slot, channel, 1) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_keeps_two_generations() {
        let mut snap = ScalerSnapshot::new();
        snap.write_raw(5, 100);
        snap.rotate();
        snap.clear();
        snap.write_raw(5, 250);
        assert_eq!(snap.get(0, 5, 0), 250);
        assert_eq!(snap.get(0, 5, 1), 100);
        assert_eq!(snap.delta(0, 5), 150);
    }

    #[test]
    fn test_out_of_range_reads_zero() {
        let snap = ScalerSnapshot::new();
        assert_eq!(snap.get(100, 0, 0), 0);
        assert_eq!(snap.get(0, 0, 7), 0);
    }

    #[test]
    fn test_out_of_range_write_dropped() {
        let mut snap = ScalerSnapshot::new();
        assert!(!snap.write_raw(STORE_SIZE, 1));
        assert!(!snap.write_raw(STORE_SIZE + 53, 1));
        assert!(snap.write_raw(STORE_SIZE - 1, 1));
    }

    #[test]
    fn test_clear_only_touches_current() {
        let mut snap = ScalerSnapshot::new();
        snap.write_raw(0, 42);
        snap.rotate();
        snap.clear();
        assert_eq!(snap.get(0, 0, 0), 0);
        assert_eq!(snap.get(0, 0, 1), 42);
        snap.clear_all();
        assert_eq!(snap.get(0, 0, 1), 0);
    }
}
