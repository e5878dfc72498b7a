use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, ReadBytesExt};

use super::constants::MAX_BUFFER_WORDS;
use super::error::CodaFileError;

/// Raw event buffer transport backed by a data file.
///
/// Events are self-describing runs of 32-bit words: the first word holds the
/// event length minus one, so an event occupies `data[0] + 1` words
/// including the length word itself. `read` replaces the current buffer with
/// the next event; end of file is a distinguished status, not an error.
#[derive(Debug)]
pub struct CodaFile {
    reader: BufReader<File>,
    buffer: Vec<u32>,
    path: PathBuf,
}

impl CodaFile {
    pub fn open(path: &Path) -> Result<Self, CodaFileError> {
        if !path.exists() {
            return Err(CodaFileError::BadFilePath(path.to_path_buf()));
        }
        Ok(CodaFile {
            reader: BufReader::new(File::open(path)?),
            buffer: Vec::new(),
            path: path.to_path_buf(),
        })
    }

    /// Read the next event into the internal buffer.
    ///
    /// `Err(CodaFileError::EndOfFile)` is the normal termination signal;
    /// any other error is a transport failure the caller decides on.
    pub fn read(&mut self) -> Result<(), CodaFileError> {
        let first = match self.reader.read_u32::<NativeEndian>() {
            Ok(word) => word,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(CodaFileError::EndOfFile)
            }
            Err(e) => return Err(CodaFileError::IOError(e)),
        };
        let len = first as usize + 1;
        if len > MAX_BUFFER_WORDS {
            return Err(CodaFileError::EventTooLong(len));
        }
        self.buffer.clear();
        self.buffer.resize(len, 0);
        self.buffer[0] = first;
        match self.reader.read_u32_into::<NativeEndian>(&mut self.buffer[1..]) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // A length word with no body: treat like end of data
                Err(CodaFileError::EndOfFile)
            }
            Err(e) => Err(CodaFileError::IOError(e)),
        }
    }

    /// The most recently read event.
    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// Upper bound on event length in words, the transport's buffer size.
    pub fn buffer_size(&self) -> usize {
        MAX_BUFFER_WORDS
    }

    /// Event type tag of the current event.
    pub fn event_type(&self) -> u16 {
        match self.buffer.get(1) {
            Some(word) => (word >> 16) as u16,
            None => 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_events(events: &[Vec<u32>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("could not create temp file");
        for event in events {
            for word in event {
                file.write_all(&word.to_ne_bytes())
                    .expect("could not write event data");
            }
        }
        file
    }

    fn event(event_type: u32, payload: &[u32]) -> Vec<u32> {
        let mut words = vec![payload.len() as u32 + 1, event_type << 16];
        words.extend_from_slice(payload);
        words
    }

    #[test]
    fn test_read_events_until_eof() {
        let file = write_events(&[event(140, &[1, 2, 3]), event(1, &[9])]);
        let mut coda = CodaFile::open(file.path()).unwrap();

        coda.read().unwrap();
        assert_eq!(coda.event_type(), 140);
        assert_eq!(coda.buffer().len(), 5);
        assert_eq!(coda.buffer()[2..], [1, 2, 3]);

        coda.read().unwrap();
        assert_eq!(coda.event_type(), 1);

        assert!(matches!(coda.read(), Err(CodaFileError::EndOfFile)));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CodaFile::open(Path::new("/no/such/run.dat")),
            Err(CodaFileError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_oversized_event_rejected() {
        let file = write_events(&[vec![MAX_BUFFER_WORDS as u32 + 10]]);
        let mut coda = CodaFile::open(file.path()).unwrap();
        assert!(matches!(coda.read(), Err(CodaFileError::EventTooLong(_))));
    }
}
