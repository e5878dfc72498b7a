use std::path::Path;

use time::{Date, Month, OffsetDateTime};

use super::bank::{resolve, BankDescriptor, StreamType};
use super::coda_file::CodaFile;
use super::constants::SCALER_EVENT_TYPE;
use super::database::ChannelDatabase;
use super::error::{BankGroupError, CodaFileError, ScalerError};
use super::event_decoder::EventDecoder;
use super::history;
use super::norm::{Helicity, NormalizationIndex};
use super::online;
use super::scanner::extract_raw;
use super::snapshot::ScalerSnapshot;

/// Parse an init date of the form `dd-mm-yyyy` (e.g. `21-05-1999`), or the
/// literal `now` for today.
pub fn parse_init_date(text: &str) -> Result<Date, BankGroupError> {
    if text == "now" {
        return Ok(OffsetDateTime::now_utc().date());
    }
    let bad = || BankGroupError::BadDate(text.to_string());
    let mut parts = text.split('-');
    let day: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let month: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let year: i32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let month = Month::try_from(month).map_err(|_| bad())?;
    Date::from_calendar_date(year, month, day).map_err(|_| bad())
}

/// Aggregator for one scaler bank group.
///
/// A `Scaler` owns the double-buffered snapshot of its crate's counters and
/// the name lookup tables built at init. Counts and rates are served by
/// logical channel name, split by helicity state, and differenced across the
/// two snapshot generations.
///
/// `init` must run once in the life of the object, with the calendar date
/// the channel mapping should be valid for. Before a successful init and at
/// least one successful load, every count and rate query returns zero; the
/// processing pipeline degrades rather than halts.
#[derive(Debug)]
pub struct Scaler {
    bank_group: String,
    descriptor: Option<&'static BankDescriptor>,
    snapshot: ScalerSnapshot,
    norm: NormalizationIndex,
    clock_rate: f64,
    use_clock: bool,
    clock_override: Option<(u8, u8)>,
    server: String,
    port: u16,
    did_init: bool,
    new_load: bool,
    one_load: bool,
}

impl Scaler {
    /// Create a scaler for a bank group ("Left", "Right", "evleft", ...).
    /// Nothing is resolved until `init`.
    pub fn new(bank_group: &str) -> Self {
        Scaler {
            bank_group: bank_group.to_string(),
            descriptor: None,
            snapshot: ScalerSnapshot::new(),
            norm: NormalizationIndex::default(),
            clock_rate: 1024.0, // a default
            use_clock: true,
            clock_override: None,
            server: String::new(),
            port: 0,
            did_init: false,
            new_load: false,
            one_load: false,
        }
    }

    /// Resolve the bank group for `date` and build the normalization map.
    ///
    /// Accuracy is one day; only the date matters. Failure leaves the
    /// object in its degraded zero-returning state, which is not fatal for
    /// the rest of the pipeline.
    pub fn init(&mut self, db: &dyn ChannelDatabase, date: Date) -> Result<(), BankGroupError> {
        let descriptor = match resolve(&self.bank_group, date) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Undefined crate; need to init for 'Left', 'Right' crate, etc.");
                return Err(e);
            }
        };
        self.descriptor = Some(descriptor);
        if self.use_clock {
            self.clock_rate = descriptor.clock_rate;
        }
        self.server = descriptor.server.to_string();
        self.port = descriptor.port;
        self.norm = NormalizationIndex::build(db, descriptor.crate_id, descriptor.norm_slot);
        self.did_init = true;
        Ok(())
    }

    /// `init` with a `dd-mm-yyyy` (or `now`) date string.
    pub fn init_from_str(
        &mut self,
        db: &dyn ChannelDatabase,
        date: &str,
    ) -> Result<(), BankGroupError> {
        let date = parse_init_date(date)?;
        self.init(db, date)
    }

    /// Address of the online server, from the bank table unless overridden.
    pub fn set_server(&mut self, server: &str, port: u16) {
        self.server = server.to_string();
        self.port = port;
    }

    /// Override the clock location. `slot` of None puts the clock in the
    /// normalization slot. Overrides take precedence over the "clock" entry
    /// of the channel map.
    pub fn set_clock_location(&mut self, slot: Option<u8>, chan: u8) {
        let slot = slot.or_else(|| self.norm.norm_slot(Helicity::None));
        if let Some(slot) = slot {
            self.clock_override = Some((slot, chan));
        }
    }

    pub fn set_clock_rate(&mut self, rate: f64) {
        self.clock_rate = rate;
    }

    /// Use a fixed time interval between extractions instead of a clock
    /// channel. Only sensible when the data stream carries no clock.
    pub fn set_time_interval(&mut self, interval: f64) {
        if interval <= 0.0 {
            log::error!("Nonsensical time interval {interval}; ignoring");
            return;
        }
        self.clock_rate = 1.0 / interval;
        self.use_clock = false;
    }

    /// Extract this crate's banks from a decoded event.
    ///
    /// In-stream bank groups take their counters out of their crate's
    /// segment of physics events; the others consume dedicated scaler
    /// events. Returns whether this event carried our data.
    pub fn load_event(&mut self, decoder: &EventDecoder) -> bool {
        self.new_load = false;
        let Some(descriptor) = self.descriptor else {
            return false;
        };
        if !self.did_init {
            return false;
        }
        match descriptor.stream {
            StreamType::InStream => {
                if !decoder.is_physics_trigger() {
                    return false;
                }
                let payload = decoder.crate_payload(descriptor.crate_id);
                let dlen = payload.len();
                self.extract(descriptor.header, payload, dlen)
            }
            StreamType::BankType => {
                if decoder.event_type() != SCALER_EVENT_TYPE {
                    return false;
                }
                let buffer = decoder.raw_buffer();
                let dlen = buffer.len();
                self.extract(descriptor.header, buffer, dlen)
            }
        }
    }

    /// Read events from a data file until one carries this crate's scaler
    /// bank. `Ok(true)` means data was loaded and more may follow;
    /// `Ok(false)` means the file is exhausted.
    pub fn load_coda_file(&mut self, file: &mut CodaFile) -> Result<bool, ScalerError> {
        self.new_load = false;
        self.check_init()?;
        let header = match self.descriptor {
            Some(d) => d.header,
            None => return Err(ScalerError::NotInitialized),
        };
        loop {
            match file.read() {
                Ok(()) => (),
                Err(CodaFileError::EndOfFile) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
            if file.event_type() != SCALER_EVENT_TYPE {
                continue;
            }
            if self.extract(header, file.buffer(), 0) {
                return Ok(true);
            }
        }
    }

    /// Load one run's counts from a scaler history file. History data has
    /// no previous generation; both snapshot halves are reset first.
    pub fn load_history(&mut self, path: &Path, run_number: u32) -> Result<(), ScalerError> {
        self.new_load = false;
        self.check_init()?;
        let header = match self.descriptor {
            Some(d) => d.header,
            None => return Err(ScalerError::NotInitialized),
        };
        self.snapshot.clear_all();
        history::load_run(path, run_number, header, &mut self.snapshot)?;
        self.new_load = true;
        self.one_load = true;
        Ok(())
    }

    /// Fetch a fresh set of counters from the online server configured for
    /// this bank group.
    pub fn load_online(&mut self) -> Result<(), ScalerError> {
        self.new_load = false;
        self.check_init()?;
        let Some(descriptor) = self.descriptor else {
            return Err(ScalerError::NotInitialized);
        };
        let reply = online::fetch(&self.server, self.port)?;
        self.snapshot.rotate();
        self.snapshot.clear();
        online::unpack(&reply, &descriptor.online_map, &mut self.snapshot);
        self.new_load = true;
        self.one_load = true;
        Ok(())
    }

    /// Raw count by slot and channel, the fastest access path. `history`
    /// selects the current (0) or previous (1) snapshot.
    pub fn counter(&self, slot: usize, chan: usize, history: usize) -> u32 {
        self.snapshot.get(slot, chan, history)
    }

    /// Count of a named normalization channel, by helicity state.
    ///
    /// Returns zero when the scaler was never initialized, never loaded,
    /// the helicity's slot is unresolved, or the name is unknown.
    pub fn normalized_count(&self, helicity: Helicity, name: &str, history: usize) -> u32 {
        if !self.did_init || !self.one_load {
            return 0;
        }
        let Some(slot) = self.norm.norm_slot(helicity) else {
            return 0;
        };
        let Some(chan) = self.norm.channel(name) else {
            return 0;
        };
        self.counter(slot as usize, chan as usize, history)
    }

    /// Count of a normalization channel by channel number rather than name.
    pub fn normalized_count_by_channel(
        &self,
        helicity: Helicity,
        chan: usize,
        history: usize,
    ) -> u32 {
        if !self.did_init || !self.one_load {
            return 0;
        }
        let Some(slot) = self.norm.norm_slot(helicity) else {
            return 0;
        };
        self.counter(slot as usize, chan, history)
    }

    /// Accumulated counts for trigger number 1, 2, 3, ...
    pub fn trigger_count(&self, helicity: Helicity, trigger: u32, history: usize) -> u32 {
        self.normalized_count(helicity, &format!("trigger-{trigger}"), history)
    }

    /// Elapsed seconds between the two snapshot generations.
    ///
    /// Derived from the clock channel's delta over the clock rate. With a
    /// fixed time interval configured instead of a clock, the interval is
    /// returned directly. An explicit clock location override wins over the
    /// channel map's "clock" entry; with neither, the named "clock" channel
    /// of the helicity's normalization slot is used.
    pub fn elapsed_time(&self, helicity: Helicity) -> f64 {
        if !self.use_clock {
            if self.clock_rate != 0.0 {
                return 1.0 / self.clock_rate;
            }
            return 0.0;
        }
        if self.clock_rate == 0.0 {
            return 0.0;
        }
        let location = self.clock_override.or_else(|| self.norm.clock_location());
        let ticks = match location {
            Some((slot, chan)) => self.snapshot.delta(slot as usize, chan as usize),
            None => {
                self.normalized_count(helicity, "clock", 0) as i64
                    - self.normalized_count(helicity, "clock", 1) as i64
            }
        };
        ticks as f64 / self.clock_rate
    }

    /// Rate of one raw counter in Hz since the last extraction. Zero when
    /// no time elapsed.
    pub fn counter_rate(&self, slot: usize, chan: usize) -> f64 {
        let etime = self.elapsed_time(Helicity::None);
        if etime > 0.0 {
            return self.snapshot.delta(slot, chan) as f64 / etime;
        }
        0.0
    }

    /// Rate of a named normalization channel in Hz, by helicity state.
    /// Reads mutate nothing, so repeated calls agree.
    pub fn rate(&self, helicity: Helicity, name: &str) -> f64 {
        let etime = self.elapsed_time(helicity);
        if etime > 0.0 {
            let delta = self.normalized_count(helicity, name, 0) as i64
                - self.normalized_count(helicity, name, 1) as i64;
            return delta as f64 / etime;
        }
        0.0
    }

    /// Rate for trigger number 1, 2, 3, ...
    pub fn trigger_rate(&self, helicity: Helicity, trigger: u32) -> f64 {
        let etime = self.elapsed_time(helicity);
        if etime > 0.0 {
            let delta = self.trigger_count(helicity, trigger, 0) as i64
                - self.trigger_count(helicity, trigger, 1) as i64;
            return delta as f64 / etime;
        }
        0.0
    }

    /// Whether any load has succeeded in the life of this object.
    pub fn has_loaded(&self) -> bool {
        self.one_load
    }

    /// Whether the most recent load call found this crate's data.
    pub fn is_new_load(&self) -> bool {
        self.new_load
    }

    pub fn bank_group(&self) -> &str {
        &self.bank_group
    }

    pub fn descriptor(&self) -> Option<&'static BankDescriptor> {
        self.descriptor
    }

    /// Zero the current snapshot half.
    pub fn clear(&mut self) {
        self.snapshot.clear();
    }

    /// Zero both snapshot halves.
    pub fn clear_all(&mut self) {
        self.snapshot.clear_all();
    }

    /// Log a summary of the important counters.
    pub fn log_summary(&self) {
        if !self.did_init {
            log::warn!("Summary requested for a scaler that was never initialized");
            return;
        }
        log::info!("Scaler bank {}", self.bank_group);
        let time_sec = self.normalized_count(Helicity::None, "clock", 0) as f64 / self.clock_rate;
        if time_sec == 0.0 {
            log::warn!("Time of run is zero; no clock counts yet");
            return;
        }
        log::info!("Time of run: {:.2} min", time_sec / 60.0);
        log::info!(
            "Triggers: 1 = {}  2 = {}  3 = {}  4 = {}  5 = {}",
            self.trigger_count(Helicity::None, 1, 0),
            self.trigger_count(Helicity::None, 2, 0),
            self.trigger_count(Helicity::None, 3, 0),
            self.trigger_count(Helicity::None, 4, 0),
            self.trigger_count(Helicity::None, 5, 0),
        );
        log::info!(
            "Accepted triggers: {}   by helicity: (-) = {}  (+) = {}",
            self.normalized_count(Helicity::None, "TS-accept", 0),
            self.normalized_count(Helicity::Minus, "TS-accept", 0),
            self.normalized_count(Helicity::Plus, "TS-accept", 0),
        );
        log::info!(
            "Accepted trigger rate: {:.2} Hz   upstream charge counts: {}",
            self.rate(Helicity::None, "TS-accept"),
            self.normalized_count(Helicity::None, "bcm_u1", 0),
        );
    }

    fn check_init(&self) -> Result<(), ScalerError> {
        if !self.did_init {
            log::warn!("Uninitialized scaler object; call init once in the life of the object");
            return Err(ScalerError::NotInitialized);
        }
        Ok(())
    }

    fn extract(&mut self, header: u32, data: &[u32], dlen: usize) -> bool {
        if extract_raw(header, data, dlen, &mut self.snapshot) {
            self.new_load = true;
            self.one_load = true;
            true
        } else {
            false
        }
    }
}
