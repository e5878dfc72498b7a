use fxhash::FxHashMap;

use super::constants::{PHYSICS_TRIGGER_MAX, PHYSICS_TRIGGER_MIN};
use super::error::EventError;
use super::fadc::{DataKind, FadcMode, FadcModule};

/// Decoder for one raw event buffer, with multiblock bookkeeping.
///
/// An event buffer is a self-describing run of words: `data[0]` holds the
/// length minus one, the event type tag sits in the top half of `data[1]`,
/// and crate segments follow from `data[2]` as `{payload length, crate id in
/// the top half, payload...}` pairs. Registered modules decode their blocks
/// out of their crate's payload.
///
/// In multiblock mode one readout block carries several sub-events. The
/// decoder owns the cursor: after a load, queries serve sub-event zero;
/// `load_from_multiblock` advances to the next sub-event, and the consumer
/// must check `block_is_done` before requesting another transport read.
#[derive(Debug, Default)]
pub struct EventDecoder {
    modules: Vec<FadcModule>,
    module_index: FxHashMap<(u8, u8), usize>,
    crate_segments: FxHashMap<u8, (usize, usize)>,
    buffer: Vec<u32>,
    event_type: u16,
    block_events: usize,
    cursor: usize,
    loaded: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        EventDecoder::default()
    }

    /// Register an FADC module to decode at a (crate, slot) address.
    pub fn add_module(&mut self, crate_id: u8, slot: u8, mode: FadcMode) {
        self.module_index
            .insert((crate_id, slot), self.modules.len());
        self.modules.push(FadcModule::new(crate_id, slot, mode));
    }

    /// Load one raw event buffer, decoding every registered module.
    pub fn load_event(&mut self, data: &[u32]) -> Result<(), EventError> {
        if data.is_empty() {
            return Err(EventError::Truncated {
                declared: 1,
                available: 0,
            });
        }
        let declared = data[0] as usize + 1;
        if declared > data.len() {
            return Err(EventError::Truncated {
                declared,
                available: data.len(),
            });
        }
        self.loaded = false;
        self.buffer = data[..declared].to_vec();
        self.event_type = match self.buffer.get(1) {
            Some(word) => (word >> 16) as u16,
            None => 0,
        };

        // Only physics events carry crate segments; dedicated scaler events
        // are a flat bank stream consumers scan through raw_buffer.
        self.crate_segments.clear();
        if self.is_physics_trigger() {
            let mut p = 2;
            while p + 1 < declared {
                let n = self.buffer[p] as usize;
                let crate_id = (self.buffer[p + 1] >> 16) as u8;
                if p + 2 + n > declared {
                    return Err(EventError::SegmentOverrun(crate_id));
                }
                self.crate_segments.insert(crate_id, (p + 2, p + 2 + n));
                p += 2 + n;
            }
        }

        for module in self.modules.iter_mut() {
            match self.crate_segments.get(&module.crate_id()) {
                Some(&(start, end)) => module.decode_block(&self.buffer[start..end])?,
                None => module.clear(),
            }
        }

        self.block_events = self
            .modules
            .iter()
            .map(|m| m.event_count())
            .max()
            .unwrap_or(0)
            .max(1);
        self.cursor = 0;
        self.loaded = true;
        Ok(())
    }

    /// Advance to the next sub-event of the loaded block.
    pub fn load_from_multiblock(&mut self) -> Result<(), EventError> {
        if !self.is_multiblock_mode() {
            return Err(EventError::NotMultiblock);
        }
        if self.block_is_done() {
            return Err(EventError::BlockExhausted);
        }
        self.cursor += 1;
        for module in self.modules.iter_mut() {
            module.set_current(self.cursor);
        }
        Ok(())
    }

    /// Whether the loaded block carries more than one sub-event.
    pub fn is_multiblock_mode(&self) -> bool {
        self.loaded && self.modules.iter().any(|m| m.block_level() > 1)
    }

    /// Whether every sub-event of the loaded block has been served. A
    /// consumer asks this before requesting a new buffer from transport.
    pub fn block_is_done(&self) -> bool {
        !self.is_multiblock_mode() || self.cursor + 1 >= self.block_events
    }

    pub fn event_type(&self) -> u16 {
        self.event_type
    }

    /// Trigger number of the current sub-event, from the first module that
    /// decoded one.
    pub fn event_number(&self) -> u32 {
        self.modules
            .iter()
            .map(|m| m.event_number())
            .find(|&n| n != 0)
            .unwrap_or(0)
    }

    pub fn event_length(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_physics_trigger(&self) -> bool {
        (PHYSICS_TRIGGER_MIN..=PHYSICS_TRIGGER_MAX).contains(&self.event_type)
    }

    /// Direct handle on a decoded module.
    pub fn module(&self, crate_id: u8, slot: u8) -> Option<&FadcModule> {
        self.module_index
            .get(&(crate_id, slot))
            .map(|&i| &self.modules[i])
    }

    /// Generic query path: entry count by full hardware address. Must agree
    /// with the module handle path for every address.
    pub fn num_events(&self, kind: DataKind, crate_id: u8, slot: u8, channel: u8) -> usize {
        self.module(crate_id, slot)
            .map(|m| m.num_events(kind, channel))
            .unwrap_or(0)
    }

    /// Generic query path: one entry by full hardware address.
    pub fn data(&self, kind: DataKind, crate_id: u8, slot: u8, channel: u8, index: usize) -> u32 {
        self.module(crate_id, slot)
            .map(|m| m.data(kind, channel, index))
            .unwrap_or(0)
    }

    /// The whole raw event buffer as loaded. Dedicated scaler events are
    /// scanned across the full buffer rather than per crate segment.
    pub fn raw_buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// Raw payload words of one crate's segment in the current event.
    /// Scaler banks riding in the physics stream are scanned out of this.
    pub fn crate_payload(&self, crate_id: u8) -> &[u32] {
        match self.crate_segments.get(&crate_id) {
            Some(&(start, end)) => &self.buffer[start..end],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_header(slot: u32, block_num: u32, block_level: u32) -> u32 {
        0x8000_0000 | (slot << 22) | (block_num << 8) | block_level
    }

    fn block_trailer(slot: u32, word_count: u32) -> u32 {
        0x8800_0000 | (slot << 22) | word_count
    }

    fn event_header(slot: u32, event_num: u32) -> u32 {
        0x9000_0000 | (slot << 22) | event_num
    }

    fn window_raw(channel: u32, width: u32) -> u32 {
        0xa000_0000 | (channel << 23) | width
    }

    fn sample_pair(first: u32, second: Option<u32>) -> u32 {
        let mut word = (1 << 29) | (first << 16);
        if let Some(s) = second {
            word |= (1 << 13) | s;
        }
        word
    }

    fn pulse_integral(channel: u32, pulse_num: u32, sum: u32) -> u32 {
        0xb800_0000 | (channel << 23) | (pulse_num << 21) | sum
    }

    /// Assemble an event buffer with one crate segment per entry.
    fn event(event_type: u32, segments: &[(u8, Vec<u32>)]) -> Vec<u32> {
        let mut words = vec![0, event_type << 16];
        for (crate_id, payload) in segments {
            words.push(payload.len() as u32);
            words.push((*crate_id as u32) << 16);
            words.extend_from_slice(payload);
        }
        words[0] = words.len() as u32 - 1;
        words
    }

    fn sampled_block(slot: u32, events: &[(u32, &[u32])]) -> Vec<u32> {
        let mut words = vec![block_header(slot, 1, events.len() as u32)];
        for (num, samples) in events {
            words.push(event_header(slot, *num));
            words.push(window_raw(10, samples.len() as u32));
            for pair in samples.chunks(2) {
                words.push(sample_pair(pair[0], pair.get(1).copied()));
            }
        }
        words.push(block_trailer(slot, 0));
        words
    }

    #[test]
    fn test_single_block_event() {
        let mut decoder = EventDecoder::new();
        decoder.add_module(31, 6, FadcMode::Sampled);
        let buffer = event(2, &[(31, sampled_block(6, &[(5, &[100, 200, 300])]))]);
        decoder.load_event(&buffer).unwrap();

        assert_eq!(decoder.event_type(), 2);
        assert_eq!(decoder.event_number(), 5);
        assert!(!decoder.is_multiblock_mode());
        assert!(decoder.block_is_done());
        assert_eq!(decoder.num_events(DataKind::SampledAdc, 31, 6, 10), 3);
        assert_eq!(decoder.data(DataKind::SampledAdc, 31, 6, 10, 2), 300);
        assert!(matches!(
            decoder.load_from_multiblock(),
            Err(EventError::NotMultiblock)
        ));
    }

    #[test]
    fn test_access_paths_agree() {
        let mut decoder = EventDecoder::new();
        decoder.add_module(31, 6, FadcMode::Sampled);
        let buffer = event(2, &[(31, sampled_block(6, &[(5, &[100, 200, 300, 400])]))]);
        decoder.load_event(&buffer).unwrap();

        let module = decoder.module(31, 6).expect("module should be registered");
        assert_eq!(
            module.num_events(DataKind::SampledAdc, 10),
            decoder.num_events(DataKind::SampledAdc, 31, 6, 10)
        );
        for i in 0..module.num_events(DataKind::SampledAdc, 10) {
            assert_eq!(
                module.data(DataKind::SampledAdc, 10, i),
                decoder.data(DataKind::SampledAdc, 31, 6, 10, i)
            );
        }
    }

    #[test]
    fn test_multiblock_sequencing() {
        let mut decoder = EventDecoder::new();
        decoder.add_module(31, 6, FadcMode::SampledMultiblock);
        let buffer = event(
            2,
            &[(31, sampled_block(6, &[(10, &[1, 2]), (11, &[3, 4]), (12, &[5, 6])]))],
        );
        decoder.load_event(&buffer).unwrap();

        assert!(decoder.is_multiblock_mode());
        assert!(!decoder.block_is_done());
        assert_eq!(decoder.event_number(), 10);
        assert_eq!(decoder.data(DataKind::SampledAdc, 31, 6, 10, 0), 1);

        decoder.load_from_multiblock().unwrap();
        assert_eq!(decoder.event_number(), 11);
        assert_eq!(decoder.data(DataKind::SampledAdc, 31, 6, 10, 0), 3);
        assert!(!decoder.block_is_done());

        decoder.load_from_multiblock().unwrap();
        assert_eq!(decoder.event_number(), 12);
        assert!(decoder.block_is_done());
        assert!(matches!(
            decoder.load_from_multiblock(),
            Err(EventError::BlockExhausted)
        ));
    }

    #[test]
    fn test_integral_module() {
        let mut decoder = EventDecoder::new();
        decoder.add_module(31, 6, FadcMode::Integral);
        let payload = vec![
            block_header(6, 1, 1),
            event_header(6, 9),
            pulse_integral(10, 0, 70000),
            block_trailer(6, 4),
        ];
        let buffer = event(2, &[(31, payload)]);
        decoder.load_event(&buffer).unwrap();
        assert_eq!(decoder.num_events(DataKind::PulseIntegral, 31, 6, 10), 1);
        assert_eq!(decoder.data(DataKind::PulseIntegral, 31, 6, 10, 0), 70000);
    }

    #[test]
    fn test_crate_payload_exposed() {
        let mut decoder = EventDecoder::new();
        let buffer = event(2, &[(8, vec![0xabc4_0002, 7, 9]), (7, vec![0xceb4_0001, 3])]);
        decoder.load_event(&buffer).unwrap();
        assert_eq!(decoder.crate_payload(8), &[0xabc4_0002, 7, 9]);
        assert_eq!(decoder.crate_payload(7), &[0xceb4_0001, 3]);
        assert!(decoder.crate_payload(9).is_empty());
    }

    #[test]
    fn test_dedicated_scaler_event_stays_flat() {
        let mut decoder = EventDecoder::new();
        let buffer = [3u32, 140 << 16, 0xabc4_0001, 55];
        decoder.load_event(&buffer).unwrap();
        assert_eq!(decoder.event_type(), 140);
        assert!(decoder.crate_payload(8).is_empty());
        assert_eq!(decoder.raw_buffer(), &buffer);
    }

    #[test]
    fn test_truncated_event_rejected() {
        let mut decoder = EventDecoder::new();
        let buffer = [10u32, 2 << 16, 0];
        assert!(matches!(
            decoder.load_event(&buffer),
            Err(EventError::Truncated {
                declared: 11,
                available: 3
            })
        ));
    }

    #[test]
    fn test_segment_overrun_rejected() {
        let mut decoder = EventDecoder::new();
        // Segment claims 50 payload words, event holds 1
        let buffer = [4u32, 2 << 16, 50, 31 << 16, 0];
        assert!(matches!(
            decoder.load_event(&buffer),
            Err(EventError::SegmentOverrun(31))
        ));
    }
}
