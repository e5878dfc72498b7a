use fxhash::FxHashMap;

use super::bank::bank_table;
use super::constants::CHANNELS_PER_SLOT;

/// The channel mapping collaborator.
///
/// Resolves logical channel names ("TS-accept", "bcm_u1", "clock", ...) to
/// hardware locations for a given crate, optionally shifted by a helicity
/// offset (−1 and +1 select the gated copies of a channel's slot). Lookup
/// failures are sentinels, never panics; callers degrade to zero returns.
pub trait ChannelDatabase {
    /// Slot carrying `name` in `crate_id`, shifted by `helicity_offset`.
    /// None when the database has no entry.
    fn slot(&self, crate_id: u8, name: &str, helicity_offset: i8) -> Option<u8>;

    /// Channel number of `name` within its slot. `hint` is returned
    /// unchanged when the database has no entry, so callers can pass a
    /// relative channel straight through.
    fn channel(&self, crate_id: u8, name: &str, helicity_offset: i8, hint: u8) -> u8;

    /// Every alias known for a hardware location. May contain the literal
    /// placeholder "none" for unnamed channels; consumers filter it.
    fn short_names(&self, crate_id: u8, slot: u8, channel: u8) -> Vec<String>;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct ChannelKey {
    crate_id: u8,
    name: String,
    helicity_offset: i8,
}

/// An in-memory [`ChannelDatabase`].
///
/// Backs the bundled driver and the test suite; a site-specific database
/// implementation can replace it behind the trait without touching the
/// decoding core.
#[derive(Debug, Clone, Default)]
pub struct MapDatabase {
    locations: FxHashMap<ChannelKey, (u8, u8)>,
    aliases: FxHashMap<(u8, u8, u8), Vec<String>>,
    crates: FxHashMap<String, u8>,
}

impl MapDatabase {
    pub fn new() -> Self {
        let mut db = MapDatabase::default();
        for bank in bank_table() {
            db.crates.insert(bank.name.to_string(), bank.crate_id);
        }
        db
    }

    /// Register `name` at (slot, channel) for all three helicity copies:
    /// the non-gated slot plus the gated slots one below and one above.
    pub fn insert_gated(&mut self, crate_id: u8, name: &str, slot: u8, channel: u8) {
        for (offset, gated_slot) in [
            (0i8, slot),
            (-1, slot.wrapping_sub(1)),
            (1, slot.wrapping_add(1)),
        ] {
            self.insert_at(crate_id, name, offset, gated_slot, channel);
        }
    }

    /// Register `name` at (slot, channel) for one helicity offset.
    pub fn insert_at(&mut self, crate_id: u8, name: &str, helicity_offset: i8, slot: u8, channel: u8) {
        self.locations.insert(
            ChannelKey {
                crate_id,
                name: name.to_string(),
                helicity_offset,
            },
            (slot, channel),
        );
        if helicity_offset == 0 {
            self.aliases
                .entry((crate_id, slot, channel))
                .or_default()
                .push(name.to_string());
        }
    }

    /// Crate number registered for a bank group name.
    pub fn crate_number(&self, bank_name: &str) -> Option<u8> {
        self.crates.get(bank_name).copied()
    }

    /// A conventional normalization scaler layout for one crate: triggers on
    /// the first channels, pulsers and charge monitors behind them, with
    /// helicity-gated copies in the neighboring slots.
    pub fn standard(crate_id: u8, norm_slot: u8) -> Self {
        let mut db = MapDatabase::new();
        for trig in 1..=5u8 {
            db.insert_gated(crate_id, &format!("trigger-{trig}"), norm_slot, trig - 1);
        }
        db.insert_gated(crate_id, "edt", norm_slot, 5);
        db.insert_gated(crate_id, "strobe", norm_slot, 6);
        db.insert_gated(crate_id, "clock", norm_slot, 7);
        for (k, bcm) in ["bcm_u1", "bcm_u3", "bcm_u10", "bcm_d1", "bcm_d3", "bcm_d10"]
            .iter()
            .enumerate()
        {
            db.insert_gated(crate_id, bcm, norm_slot, 8 + k as u8);
        }
        db.insert_gated(crate_id, "TS-accept", norm_slot, 14);
        db.insert_gated(crate_id, "unser", norm_slot, 15);
        db
    }
}

impl ChannelDatabase for MapDatabase {
    fn slot(&self, crate_id: u8, name: &str, helicity_offset: i8) -> Option<u8> {
        self.locations
            .get(&ChannelKey {
                crate_id,
                name: name.to_string(),
                helicity_offset,
            })
            .map(|(slot, _)| *slot)
    }

    fn channel(&self, crate_id: u8, name: &str, helicity_offset: i8, hint: u8) -> u8 {
        self.locations
            .get(&ChannelKey {
                crate_id,
                name: name.to_string(),
                helicity_offset,
            })
            .map(|(_, chan)| *chan)
            .unwrap_or(hint)
    }

    fn short_names(&self, crate_id: u8, slot: u8, channel: u8) -> Vec<String> {
        if channel as usize >= CHANNELS_PER_SLOT {
            return Vec::new();
        }
        self.aliases
            .get(&(crate_id, slot, channel))
            .cloned()
            .unwrap_or_else(|| vec![String::from("none")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout_lookup() {
        let db = MapDatabase::standard(8, 4);
        assert_eq!(db.slot(8, "TS-accept", 0), Some(4));
        assert_eq!(db.slot(8, "TS-accept", -1), Some(3));
        assert_eq!(db.slot(8, "TS-accept", 1), Some(5));
        assert_eq!(db.channel(8, "clock", 0, 99), 7);
        assert_eq!(db.slot(8, "nonexistent", 0), None);
        assert_eq!(db.channel(8, "nonexistent", 0, 3), 3);
    }

    #[test]
    fn test_unnamed_channels_report_placeholder() {
        let db = MapDatabase::standard(8, 4);
        assert_eq!(db.short_names(8, 4, 31), vec![String::from("none")]);
        assert_eq!(db.short_names(8, 4, 14), vec![String::from("TS-accept")]);
    }

    #[test]
    fn test_crate_registry_seeded_from_bank_table() {
        let db = MapDatabase::new();
        assert_eq!(db.crate_number("Left"), Some(8));
        assert_eq!(db.crate_number("evright"), Some(10));
        assert_eq!(db.crate_number("bogus"), None);
    }
}
