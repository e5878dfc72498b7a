use clap::{Arg, Command};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libdaq_scaler::bank;
use libdaq_scaler::coda_file::CodaFile;
use libdaq_scaler::config::Config;
use libdaq_scaler::database::MapDatabase;
use libdaq_scaler::error::{CodaFileError, ProcessorError};
use libdaq_scaler::event_decoder::EventDecoder;
use libdaq_scaler::fadc::{DataKind, FadcMode};
use libdaq_scaler::scaler::{parse_init_date, Scaler};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Build a scaler for the configured bank group, applying clock overrides.
fn setup_scaler(config: &Config, db: &MapDatabase) -> Result<Scaler, ProcessorError> {
    let mut scaler = Scaler::new(&config.bank_group);
    scaler.init_from_str(db, &config.map_date)?;
    if let Some(rate) = config.clock_rate {
        scaler.set_clock_rate(rate);
    }
    if let (Some(slot), Some(chan)) = (config.clock_slot, config.clock_chan) {
        scaler.set_clock_location(Some(slot), chan);
    }
    if let Some(interval) = config.time_interval {
        scaler.set_time_interval(interval);
    }
    if let (Some(server), Some(port)) = (config.server.as_ref(), config.port) {
        scaler.set_server(server, port);
    }
    Ok(scaler)
}

/// Replay a data file: scaler summaries per extraction, and optionally one
/// FADC module's decoded data per physics event.
fn replay(config: &Config, scaler: &mut Scaler) -> Result<(), ProcessorError> {
    let data_path = config
        .data_path
        .as_ref()
        .expect("Replay requires a data path");
    let mut file = CodaFile::open(data_path)?;

    let mut decoder = EventDecoder::new();
    let fadc = if config.wants_fadc() {
        let crate_id = config.fadc_crate.unwrap();
        let slot = config.fadc_slot.unwrap();
        let mode = config
            .fadc_mode
            .and_then(FadcMode::from_code)
            .unwrap_or(FadcMode::Sampled);
        decoder.add_module(crate_id, slot, mode);
        Some((crate_id, slot, config.fadc_channel.unwrap_or(0)))
    } else {
        None
    };

    let mut event_counter: u64 = 0;
    let mut scaler_counter: u64 = 0;
    loop {
        // Honor the multiblock cursor before asking transport for more
        if decoder.is_multiblock_mode() && !decoder.block_is_done() {
            decoder.load_from_multiblock()?;
        } else {
            match file.read() {
                Ok(()) => (),
                Err(CodaFileError::EndOfFile) => {
                    log::info!("Normal end of file");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = decoder.load_event(file.buffer()) {
                log::warn!("Skipping undecodable event: {e}");
                continue;
            }
        }
        event_counter += 1;

        if scaler.load_event(&decoder) {
            scaler_counter += 1;
            scaler.log_summary();
        }

        if let Some((crate_id, slot, channel)) = fadc {
            if decoder.is_physics_trigger() {
                log_fadc(&decoder, crate_id, slot, channel);
            }
        }
    }
    log::info!("Replayed {event_counter} events, {scaler_counter} scaler extractions.");
    Ok(())
}

/// Print one module's decoded data for the current (sub-)event.
fn log_fadc(decoder: &EventDecoder, crate_id: u8, slot: u8, channel: u8) {
    let Some(module) = decoder.module(crate_id, slot) else {
        return;
    };
    let kind = if module.mode().emits_samples() {
        DataKind::SampledAdc
    } else {
        DataKind::PulseIntegral
    };
    let n = decoder.num_events(kind, crate_id, slot, channel);
    log::info!(
        "Event {}: {} entries on ({}, {}, {})",
        decoder.event_number(),
        n,
        crate_id,
        slot,
        channel
    );
    for i in 0..n {
        log::debug!(
            "  data[{i}] = {}",
            decoder.data(kind, crate_id, slot, channel, i)
        );
    }
}

fn run(config: &Config) -> Result<(), ProcessorError> {
    let date = parse_init_date(&config.map_date)?;
    let descriptor = bank::resolve(&config.bank_group, date)?;
    let db = MapDatabase::standard(descriptor.crate_id, descriptor.norm_slot);
    let mut scaler = setup_scaler(config, &db)?;

    if config.has_history() {
        let path = config.history_path.as_ref().unwrap();
        let run_number = config.run_number.unwrap();
        log::info!("Loading run {run_number} from history file {path:?}...");
        scaler.load_history(path, run_number)?;
        scaler.log_summary();
    } else if config.online {
        log::info!("Fetching counters from the online server...");
        scaler.load_online()?;
        scaler.log_summary();
    } else if config.has_data_file() {
        replay(config, &mut scaler)?;
    } else {
        log::error!("Nothing to do: configure a data file, a history run, or online mode.");
    }
    Ok(())
}

fn main() {
    // Create a cli
    let matches = Command::new("daq_scaler_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the config file"),
        )
        .get_matches();

    // Initialize feedback
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("Could not create logging!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Bank group: {}", config.bank_group);
    log::info!("Map date: {}", config.map_date);

    match run(&config) {
        Ok(_) => log::info!("Done."),
        Err(e) => log::error!("Processing failed with error: {e}"),
    }
}
