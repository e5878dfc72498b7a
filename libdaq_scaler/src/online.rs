use std::io::{Read, Write};
use std::net::TcpStream;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::constants::*;
use super::error::OnlineError;
use super::snapshot::ScalerSnapshot;

/// Size in bytes of one request or reply on the wire.
pub const EXCHANGE_SIZE: usize = 4 + 4 * ONLINE_NUM_COUNTS + ONLINE_MSG_SIZE + 4 + 4;

/// Request sent to the online scaler server.
///
/// The exchange is symmetric: the reply has the same shape, with the counter
/// block and the per-slot message filled in. All integers travel in network
/// byte order.
#[derive(Debug, Clone)]
pub struct OnlineRequest {
    pub reply: i32,
    pub clear: i32,
    pub check_end: i32,
}

impl Default for OnlineRequest {
    fn default() -> Self {
        OnlineRequest {
            reply: 1,
            clear: 0,
            check_end: 0,
        }
    }
}

impl OnlineRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EXCHANGE_SIZE);
        // The write targets are Vec<u8>, which cannot fail
        bytes.write_i32::<BigEndian>(self.reply).unwrap();
        bytes.resize(bytes.len() + 4 * ONLINE_NUM_COUNTS + ONLINE_MSG_SIZE, 0);
        bytes.write_i32::<BigEndian>(self.clear).unwrap();
        bytes.write_i32::<BigEndian>(self.check_end).unwrap();
        bytes
    }
}

/// Reply from the online scaler server.
#[derive(Debug, Clone)]
pub struct OnlineReply {
    pub counts: Vec<i32>,
    pub message: [u8; ONLINE_MSG_SIZE],
}

impl OnlineReply {
    pub fn decode(bytes: &[u8]) -> Result<Self, OnlineError> {
        if bytes.len() < EXCHANGE_SIZE {
            return Err(OnlineError::Truncated(bytes.len()));
        }
        let mut cursor = &bytes[4..]; // skip the echoed reply flag
        let mut counts = vec![0i32; ONLINE_NUM_COUNTS];
        cursor
            .read_i32_into::<BigEndian>(&mut counts)
            .map_err(OnlineError::Read)?;
        let mut message = [0u8; ONLINE_MSG_SIZE];
        cursor.read_exact(&mut message).map_err(OnlineError::Read)?;
        Ok(OnlineReply { counts, message })
    }

    /// Channel count encoded for one slot: '0' means a 16-channel module,
    /// '1' a 32-channel module, anything else ends the slot list.
    pub fn channels_in_slot(&self, slot: usize) -> usize {
        match self.message.get(slot) {
            Some(b'0') => 16,
            Some(b'1') => 32,
            _ => 0,
        }
    }
}

/// One full request/reply exchange with the online server.
///
/// Opens a fresh connection, sends the fixed-size request, accumulates the
/// fixed-size reply (looping until complete or the retry ceiling), then
/// closes the socket. There is no streaming mode.
pub fn fetch(server: &str, port: u16) -> Result<OnlineReply, OnlineError> {
    let mut stream = TcpStream::connect((server, port)).map_err(OnlineError::Connect)?;
    let request = OnlineRequest::default();
    stream
        .write_all(&request.encode())
        .map_err(OnlineError::Write)?;

    let mut bytes = vec![0u8; EXCHANGE_SIZE];
    let mut filled = 0;
    let mut attempts = 0;
    while filled < EXCHANGE_SIZE {
        if attempts > ONLINE_READ_RETRIES {
            return Err(OnlineError::Truncated(filled));
        }
        attempts += 1;
        let n = stream.read(&mut bytes[filled..]).map_err(OnlineError::Read)?;
        filled += n;
    }
    OnlineReply::decode(&bytes)
}

/// Unpack a server reply into the snapshot through the bank's online slot
/// map.
///
/// Counters are consumed in slot order, 16 or 32 per slot as the message
/// declares, and land at `online_map[slot] * CHANNELS_PER_SLOT + k`. Writes
/// past the store or reads past the counter block are dropped with a
/// warning; a slot with no declared channel count ends the unpacking.
pub fn unpack(reply: &OnlineReply, online_map: &[usize; NUM_SLOTS], snapshot: &mut ScalerSnapshot) {
    let mut ntot = 0;
    for slot in 0..NUM_SLOTS {
        let nchan = reply.channels_in_slot(slot);
        if nchan == 0 {
            break;
        }
        let jslot = online_map[slot];
        for k in 0..nchan {
            let index = jslot * CHANNELS_PER_SLOT + k;
            if index < STORE_SIZE && ntot < ONLINE_NUM_COUNTS {
                snapshot.write_raw(index, reply.counts[ntot] as u32);
                ntot += 1;
            } else {
                log::warn!("Truncation of data or improper array index in online unpack");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_with(counts: &[i32], message: &[u8]) -> OnlineReply {
        let mut full = vec![0i32; ONLINE_NUM_COUNTS];
        full[..counts.len()].copy_from_slice(counts);
        let mut msg = [0u8; ONLINE_MSG_SIZE];
        msg[..message.len()].copy_from_slice(message);
        OnlineReply {
            counts: full,
            message: msg,
        }
    }

    #[test]
    fn test_request_encode_size_and_flag() {
        let bytes = OnlineRequest::default().encode();
        assert_eq!(bytes.len(), EXCHANGE_SIZE);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_reply_roundtrip() {
        let mut bytes = vec![0u8; EXCHANGE_SIZE];
        // First counter word, big-endian 0x01020304
        bytes[4..8].copy_from_slice(&[1, 2, 3, 4]);
        bytes[4 + 4 * ONLINE_NUM_COUNTS] = b'1';
        let reply = OnlineReply::decode(&bytes).unwrap();
        assert_eq!(reply.counts[0], 0x0102_0304);
        assert_eq!(reply.channels_in_slot(0), 32);
        assert_eq!(reply.channels_in_slot(1), 0);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(matches!(
            OnlineReply::decode(&[0u8; 10]),
            Err(OnlineError::Truncated(10))
        ));
    }

    #[test]
    fn test_unpack_slot_mapping() {
        let counts: Vec<i32> = (0..48).collect();
        let reply = reply_with(&counts, b"01");
        let mut online_map = [0usize; NUM_SLOTS];
        for (i, m) in online_map.iter_mut().enumerate() {
            *m = i;
        }
        online_map[1] = 9; // second server block lands in slot 9
        let mut snap = ScalerSnapshot::new();
        unpack(&reply, &online_map, &mut snap);
        // Slot 0 declared 16 channels
        assert_eq!(snap.get(0, 0, 0), 0);
        assert_eq!(snap.get(0, 15, 0), 15);
        assert_eq!(snap.get(0, 16, 0), 0);
        // Remapped slot declared 32 channels, counters continue in order
        assert_eq!(snap.get(9, 0, 0), 16);
        assert_eq!(snap.get(9, 31, 0), 47);
    }

    #[test]
    fn test_unpack_stops_at_unknown_channel_code() {
        let counts: Vec<i32> = (100..200).collect();
        let reply = reply_with(&counts, b"0x0");
        let online_map: [usize; NUM_SLOTS] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        let mut snap = ScalerSnapshot::new();
        unpack(&reply, &online_map, &mut snap);
        assert_eq!(snap.get(0, 15, 0), 115);
        // Slot 1 had code 'x'; nothing after it is unpacked
        assert_eq!(snap.get(1, 0, 0), 0);
        assert_eq!(snap.get(2, 0, 0), 0);
    }
}
