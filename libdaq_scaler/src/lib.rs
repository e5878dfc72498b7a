//! # daq_scaler
//!
//! daq_scaler decodes and aggregates the fixed-format binary event records
//! produced by a spectrometer data-acquisition pipeline. It covers two jobs:
//! demultiplexing multiblock/triggered FADC event buffers into typed
//! per-channel measurements (waveform samples, pulse integrals) addressed by
//! crate, slot, and channel; and extracting the periodic counter ("scaler")
//! banks, mapping them to named logical channels, and differencing
//! consecutive snapshots into rates, split by helicity state.
//!
//! ## Data sources
//!
//! Scaler counts can come from four places, all feeding the same
//! double-buffered store:
//!
//! - dedicated scaler events inside a data file ([`coda_file::CodaFile`]),
//! - banks riding along in the physics event stream
//!   ([`event_decoder::EventDecoder`]),
//! - a scaler history file, one text block per run ([`history`]),
//! - the online server, one request/reply exchange per fetch ([`online`]).
//!
//! ## Terminology
//!
//! - *bank group*: the scaler banks of one crate, e.g. the Left arm.
//! - *bank*: a contiguous run of words belonging to one module.
//! - *slot*: a module position within a crate, up to 32 channels.
//! - *normalization scaler*: the slot carrying the trigger-accept signal,
//!   the denominator for rate and efficiency figures.
//! - *helicity*: three-valued gating of counts (non-gated, minus, plus).
//!
//! ## Usage
//!
//! ```no_run
//! use libdaq_scaler::database::MapDatabase;
//! use libdaq_scaler::norm::Helicity;
//! use libdaq_scaler::scaler::Scaler;
//!
//! let db = MapDatabase::standard(8, 4);
//! let mut scaler = Scaler::new("Left");
//! scaler.init_from_str(&db, "20-01-2003").unwrap();
//!
//! let mut file = libdaq_scaler::coda_file::CodaFile::open("run.dat".as_ref()).unwrap();
//! while scaler.load_coda_file(&mut file).unwrap() {
//!     println!(
//!         "accepted: {}  ({:.1} Hz)",
//!         scaler.normalized_count(Helicity::None, "TS-accept", 0),
//!         scaler.rate(Helicity::None, "TS-accept"),
//!     );
//! }
//! ```
//!
//! The channel mapping database is a collaborator behind the
//! [`database::ChannelDatabase`] trait; the bundled [`database::MapDatabase`]
//! serves standalone use and tests, and a site-specific implementation can
//! replace it without touching the decoding core.
//!
//! Malformed or partial data degrades results rather than halting the
//! pipeline: unresolved names and uninitialized objects read as zero, and
//! corrupted events are skipped with a warning. Only transport-level
//! failures surface as errors.
pub mod bank;
pub mod coda_file;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod event_decoder;
pub mod fadc;
pub mod history;
pub mod norm;
pub mod online;
pub mod scaler;
pub mod scanner;
pub mod snapshot;
