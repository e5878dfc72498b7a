use fxhash::FxHashMap;

use super::constants::CHANNELS_PER_SLOT;
use super::database::ChannelDatabase;

/// Helicity gating state of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helicity {
    Minus,
    /// Not helicity gated.
    None,
    Plus,
}

impl Helicity {
    /// Index into the resolved normalization slots: 0 non-gated, 1 minus,
    /// 2 plus.
    pub fn index(self) -> usize {
        match self {
            Helicity::None => 0,
            Helicity::Minus => 1,
            Helicity::Plus => 2,
        }
    }

    /// The legacy integer convention: −1 minus, 0 non-gated, +1 plus.
    /// Anything else reads as non-gated.
    pub fn from_sign(sign: i32) -> Self {
        match sign {
            -1 => Helicity::Minus,
            1 => Helicity::Plus,
            _ => Helicity::None,
        }
    }
}

/// Name lookup tables for the normalization scaler, built once at init.
///
/// The normalization scaler is the slot carrying the trigger-accept bank.
/// Its channels are reachable under every alias the channel database knows,
/// and its helicity-gated copies live in the slots the database resolves for
/// offsets −1 and +1. Building this once makes every subsequent name query a
/// single hash lookup.
#[derive(Debug, Clone, Default)]
pub struct NormalizationIndex {
    norm_slots: [Option<u8>; 3],
    clock_slot: Option<u8>,
    clock_chan: Option<u8>,
    name_map: FxHashMap<String, Vec<u8>>,
}

impl NormalizationIndex {
    /// Resolve the normalization slots and collect every channel alias.
    ///
    /// The database's answer for "TS-accept" wins; when it has no entry the
    /// descriptor default applies, with the gated copies at the neighboring
    /// slots. Aliases equal to the placeholder "none" are filtered. Multiple
    /// aliases may name the same channel and one alias may be inserted more
    /// than once; lookups return the first insertion.
    pub fn build(db: &dyn ChannelDatabase, crate_id: u8, default_slot: u8) -> Self {
        let base = db.slot(crate_id, "TS-accept", 0).unwrap_or(default_slot);
        let norm_slots = [
            Some(base),
            db.slot(crate_id, "TS-accept", -1)
                .or_else(|| base.checked_sub(1)),
            db.slot(crate_id, "TS-accept", 1).or(Some(base + 1)),
        ];
        let clock_slot = db.slot(crate_id, "clock", 0);
        let clock_chan = clock_slot.map(|_| db.channel(crate_id, "clock", 0, 0));

        let mut name_map: FxHashMap<String, Vec<u8>> = FxHashMap::default();
        for chan in 0..CHANNELS_PER_SLOT as u8 {
            for alias in db.short_names(crate_id, base, chan) {
                if alias != "none" {
                    name_map.entry(alias).or_default().push(chan);
                }
            }
        }

        NormalizationIndex {
            norm_slots,
            clock_slot,
            clock_chan,
            name_map,
        }
    }

    /// The normalization slot serving a helicity state, if resolved.
    pub fn norm_slot(&self, helicity: Helicity) -> Option<u8> {
        self.norm_slots[helicity.index()]
    }

    /// First channel registered under `name`, if any.
    pub fn channel(&self, name: &str) -> Option<u8> {
        self.name_map.get(name).and_then(|v| v.first().copied())
    }

    /// Clock location from the database, unless overridden by the caller.
    pub fn clock_location(&self) -> Option<(u8, u8)> {
        match (self.clock_slot, self.clock_chan) {
            (Some(slot), Some(chan)) => Some((slot, chan)),
            _ => None,
        }
    }
}
