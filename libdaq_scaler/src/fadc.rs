use super::constants::FADC_CHANNELS;
use super::error::EventError;

/// Operating mode of one FADC module, fixed by the trigger setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadcMode {
    /// Raw waveform samples over the acquisition window.
    Sampled,
    /// Firmware-integrated pulses, one sum per pulse.
    Integral,
    /// Raw waveform samples, several events per readout block.
    SampledMultiblock,
}

impl FadcMode {
    /// The mode codes used by the acquisition configuration.
    pub fn code(self) -> u8 {
        match self {
            FadcMode::Sampled => 1,
            FadcMode::Integral => 7,
            FadcMode::SampledMultiblock => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FadcMode::Sampled),
            7 => Some(FadcMode::Integral),
            8 => Some(FadcMode::SampledMultiblock),
            _ => None,
        }
    }

    pub fn emits_samples(self) -> bool {
        matches!(self, FadcMode::Sampled | FadcMode::SampledMultiblock)
    }
}

/// Which decoded quantity a data query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    SampledAdc,
    PulseIntegral,
}

/// One 32-bit word of the FADC data stream, decoded by type.
///
/// Type-defining words carry bit 31 with the type in bits 27-30; everything
/// else is a continuation word holding two 13-bit samples (bits 29 and 13
/// flag which halves are valid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadcWord {
    BlockHeader {
        slot: u8,
        block_num: u32,
        block_level: u8,
    },
    BlockTrailer {
        slot: u8,
        word_count: u32,
    },
    EventHeader {
        slot: u8,
        event_num: u32,
    },
    TriggerTime {
        time: u32,
    },
    WindowRaw {
        channel: u8,
        width: u16,
    },
    PulseIntegral {
        channel: u8,
        pulse_num: u8,
        sum: u32,
    },
    Filler,
    Invalid,
    /// Continuation word; interpretation depends on the preceding header.
    Raw(u32),
}

impl FadcWord {
    pub fn decode(word: u32) -> FadcWord {
        if word & 0x8000_0000 == 0 {
            return FadcWord::Raw(word);
        }
        let slot = ((word >> 22) & 0x1f) as u8;
        let channel = ((word >> 23) & 0xf) as u8;
        match (word >> 27) & 0xf {
            0x0 => FadcWord::BlockHeader {
                slot,
                block_num: (word >> 8) & 0x3fff,
                block_level: (word & 0xff) as u8,
            },
            0x1 => FadcWord::BlockTrailer {
                slot,
                word_count: word & 0x3f_ffff,
            },
            0x2 => FadcWord::EventHeader {
                slot,
                event_num: word & 0x3f_ffff,
            },
            0x3 => FadcWord::TriggerTime { time: word & 0xff_ffff },
            0x4 => FadcWord::WindowRaw {
                channel,
                width: (word & 0xfff) as u16,
            },
            0x7 => FadcWord::PulseIntegral {
                channel,
                pulse_num: ((word >> 21) & 0x3) as u8,
                sum: word & 0x7_ffff,
            },
            0xf => FadcWord::Filler,
            _ => FadcWord::Invalid,
        }
    }

    /// Both samples of a continuation word, in time order, None where the
    /// valid flag is clear.
    pub fn sample_pair(word: u32) -> [Option<u32>; 2] {
        let hi = (word >> 29 & 1 == 1).then_some((word >> 16) & 0x1fff);
        let lo = (word >> 13 & 1 == 1).then_some(word & 0x1fff);
        [hi, lo]
    }
}

/// Decoded data of one sub-event for one module.
#[derive(Debug, Clone)]
struct EventData {
    number: u32,
    samples: Vec<Vec<u32>>,
    pulses: Vec<Vec<u32>>,
}

impl EventData {
    fn new(number: u32) -> Self {
        EventData {
            number,
            samples: vec![Vec::new(); FADC_CHANNELS],
            pulses: vec![Vec::new(); FADC_CHANNELS],
        }
    }
}

/// One FADC module at a fixed (crate, slot) address.
///
/// Decoding fills per-channel stores for every sub-event of the readout
/// block; queries address the sub-event selected by the decoder's
/// multiblock cursor. The two retrieval paths (module handle and
/// address-based query on the decoder) read the same stores, so they cannot
/// disagree.
#[derive(Debug, Clone)]
pub struct FadcModule {
    crate_id: u8,
    slot: u8,
    mode: FadcMode,
    block_level: u8,
    events: Vec<EventData>,
    current: usize,
}

impl FadcModule {
    pub fn new(crate_id: u8, slot: u8, mode: FadcMode) -> Self {
        FadcModule {
            crate_id,
            slot,
            mode,
            block_level: 0,
            events: Vec::new(),
            current: 0,
        }
    }

    pub fn crate_id(&self) -> u8 {
        self.crate_id
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn mode(&self) -> FadcMode {
        self.mode
    }

    /// Events per readout block announced by the last block header.
    pub fn block_level(&self) -> u8 {
        self.block_level
    }

    /// Sub-events decoded from the last readout block.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn clear(&mut self) {
        self.block_level = 0;
        self.events.clear();
        self.current = 0;
    }

    pub(crate) fn set_current(&mut self, index: usize) {
        self.current = index;
    }

    /// Decode this module's block out of a crate payload.
    ///
    /// Words before our block header and words of other slots are skipped.
    /// A block header without a matching trailer is a structural error.
    pub(crate) fn decode_block(&mut self, payload: &[u32]) -> Result<(), EventError> {
        self.clear();
        let mut in_block = false;
        let mut window: Option<(u8, u16)> = None; // channel, samples still due
        for &raw in payload {
            let word = FadcWord::decode(raw);
            if !in_block {
                if let FadcWord::BlockHeader {
                    slot, block_level, ..
                } = word
                {
                    if slot == self.slot {
                        in_block = true;
                        self.block_level = block_level;
                    }
                }
                continue;
            }
            match word {
                FadcWord::BlockTrailer { slot, .. } if slot == self.slot => return Ok(()),
                FadcWord::EventHeader { slot, event_num } if slot == self.slot => {
                    self.events.push(EventData::new(event_num));
                    window = None;
                }
                FadcWord::TriggerTime { .. } | FadcWord::Filler => (),
                FadcWord::WindowRaw { channel, width } if self.mode.emits_samples() => {
                    window = Some((channel, width));
                }
                FadcWord::Raw(w) => {
                    if let Some((channel, due)) = window {
                        window = self.fill_samples(channel, due, w);
                    }
                }
                FadcWord::PulseIntegral { channel, sum, .. }
                    if self.mode == FadcMode::Integral =>
                {
                    if let Some(event) = self.events.last_mut() {
                        if (channel as usize) < FADC_CHANNELS {
                            event.pulses[channel as usize].push(sum);
                        }
                    }
                }
                // Words for other slots or modes are not ours to interpret
                _ => window = None,
            }
        }
        Err(EventError::UnterminatedBlock(self.slot))
    }

    /// Append the valid halves of one continuation word to a window,
    /// returning the still-open window if samples remain due.
    fn fill_samples(&mut self, channel: u8, due: u16, word: u32) -> Option<(u8, u16)> {
        let Some(event) = self.events.last_mut() else {
            return None;
        };
        if channel as usize >= FADC_CHANNELS {
            return None;
        }
        let mut remaining = due;
        for sample in FadcWord::sample_pair(word).into_iter().flatten() {
            if remaining == 0 {
                break;
            }
            event.samples[channel as usize].push(sample);
            remaining -= 1;
        }
        (remaining > 0).then_some((channel, remaining))
    }

    /// Number of entries for a channel in the current sub-event.
    pub fn num_events(&self, kind: DataKind, channel: u8) -> usize {
        let Some(event) = self.events.get(self.current) else {
            return 0;
        };
        if channel as usize >= FADC_CHANNELS {
            return 0;
        }
        match kind {
            DataKind::SampledAdc => event.samples[channel as usize].len(),
            DataKind::PulseIntegral => event.pulses[channel as usize].len(),
        }
    }

    /// One entry for a channel in the current sub-event; absent data reads
    /// as zero.
    pub fn data(&self, kind: DataKind, channel: u8, index: usize) -> u32 {
        let Some(event) = self.events.get(self.current) else {
            return 0;
        };
        if channel as usize >= FADC_CHANNELS {
            return 0;
        }
        let store = match kind {
            DataKind::SampledAdc => &event.samples[channel as usize],
            DataKind::PulseIntegral => &event.pulses[channel as usize],
        };
        store.get(index).copied().unwrap_or(0)
    }

    /// Trigger number of the current sub-event.
    pub fn event_number(&self) -> u32 {
        self.events.get(self.current).map(|e| e.number).unwrap_or(0)
    }
}
