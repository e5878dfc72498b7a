use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::constants::*;
use super::error::HistoryFileError;
use super::snapshot::ScalerSnapshot;

/// Decode a textual header line into a 32-bit header word.
///
/// Hexadecimal digits are collected left to right through an immutable
/// char-to-nibble table, any other character is skipped, and at most twelve
/// digits are taken per line. Digits past the width of the word wrap, which
/// matches the arithmetic of the stream this format comes from.
pub fn header_from_hex(line: &str) -> u32 {
    const LINESIZE: usize = 12;
    let mut nibbles: Vec<u32> = Vec::with_capacity(LINESIZE);
    for c in line.chars() {
        if let Some(v) = c.to_digit(16) {
            nibbles.push(v);
        }
        if nibbles.len() >= LINESIZE {
            break;
        }
    }
    let mut result: u32 = 0;
    let mut power: u32 = 1;
    for v in nibbles.iter().rev() {
        result = result.wrapping_add(v.wrapping_mul(power));
        power = power.wrapping_mul(16);
    }
    result
}

/// Load one run's counts from a scaler history file into the snapshot.
///
/// The file is a sequence of runs, each introduced by a `run number <N>`
/// line. Within the selected run, a hexadecimal header line announces a
/// bank (matched against `header` with the usual top-12-bit rule) and is
/// followed by one decimal count per channel. Counts land at
/// `slot * CHANNELS_PER_SLOT + channel` with the same out-of-range
/// tolerance as the buffer scanner. History data carries no previous
/// generation, so the caller clears both snapshot halves before this runs.
pub fn load_run(
    path: &Path,
    run_number: u32,
    header: u32,
    snapshot: &mut ScalerSnapshot,
) -> Result<(), HistoryFileError> {
    if !path.exists() {
        return Err(HistoryFileError::BadFilePath(path.to_path_buf()));
    }
    let run_marker = "run number";
    let wanted = format!("{run_marker} {run_number}");
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let mut found_run = false;
    while let Some(line) = lines.next() {
        if !line?.contains(&wanted) {
            continue;
        }
        found_run = true;
        'run: while let Some(line) = lines.next() {
            let line = line?;
            if line.contains(run_marker) {
                break 'run;
            }
            let decoded = header_from_hex(&line);
            if (decoded & HEADER_MASK) != header {
                continue;
            }
            let slot = ((decoded & HEADER_SLOT_MASK) >> HEADER_SLOT_SHIFT) as usize;
            let numchan = (decoded & HEADER_NCHAN_MASK) as usize;
            for j in 0..numchan {
                let Some(value_line) = lines.next() else {
                    break 'run;
                };
                let value: u32 = value_line?.trim().parse()?;
                snapshot.write_raw(slot * CHANNELS_PER_SLOT + j, value);
            }
        }
        break;
    }

    if !found_run {
        log::warn!("Did not find run {run_number} in scaler history file; hence, no data");
        return Err(HistoryFileError::RunNotFound(run_number));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_header_from_hex() {
        assert_eq!(header_from_hex("abc40003"), 0xabc4_0003);
        assert_eq!(header_from_hex("ABC40003"), 0xabc4_0003);
        // Non-hex characters are skipped
        assert_eq!(header_from_hex("  abc4 0003 trailing"), 0xabc4_0003);
        assert_eq!(header_from_hex(""), 0);
    }

    fn write_history(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("could not create temp file");
        file.write_all(contents.as_bytes())
            .expect("could not write history data");
        file
    }

    #[test]
    fn test_load_selected_run() {
        let file = write_history(
            "run number 1200\nabc40002\n11\n22\nrun number 1201\nabc40002\n77\n88\n",
        );
        let mut snap = ScalerSnapshot::new();
        load_run(file.path(), 1201, 0xabc0_0000, &mut snap).unwrap();
        assert_eq!(snap.get(4, 0, 0), 77);
        assert_eq!(snap.get(4, 1, 0), 88);
    }

    #[test]
    fn test_foreign_banks_skipped() {
        let file = write_history("run number 5\nceb40002\n11\n22\nabc30001\n99\n");
        let mut snap = ScalerSnapshot::new();
        load_run(file.path(), 5, 0xabc0_0000, &mut snap).unwrap();
        assert_eq!(snap.get(4, 0, 0), 0);
        assert_eq!(snap.get(3, 0, 0), 99);
    }

    #[test]
    fn test_missing_run_is_an_error() {
        let file = write_history("run number 7\nabc30001\n5\n");
        let mut snap = ScalerSnapshot::new();
        match load_run(file.path(), 8, 0xabc0_0000, &mut snap) {
            Err(HistoryFileError::RunNotFound(8)) => (),
            other => panic!("expected RunNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut snap = ScalerSnapshot::new();
        let result = load_run(Path::new("/no/such/history.dat"), 1, 0xabc0_0000, &mut snap);
        assert!(matches!(result, Err(HistoryFileError::BadFilePath(_))));
    }
}
