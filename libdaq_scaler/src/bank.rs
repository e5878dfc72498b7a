use time::macros::date;
use time::Date;

use super::constants::NUM_SLOTS;
use super::error::BankGroupError;

/// Whether a bank group's counters ride along inside physics events or
/// arrive as a dedicated scaler event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// Banks embedded in the physics event stream.
    InStream,
    /// Banks delivered as their own event type.
    BankType,
}

/// Static description of one scaler bank group.
///
/// Built once from the table below and immutable afterwards. Exactly one
/// descriptor is active per [`Scaler`](crate::scaler::Scaler) after bank
/// group resolution.
#[derive(Debug)]
pub struct BankDescriptor {
    pub name: &'static str,
    /// Header pattern identifying this crate's banks; top 12 bits significant.
    pub header: u32,
    pub crate_id: u8,
    pub stream: StreamType,
    /// Default slot of the normalization scaler. The channel database may
    /// override this during normalization map construction.
    pub norm_slot: u8,
    pub clock_rate: f64,
    /// Address and port of the server for online data.
    pub server: &'static str,
    pub port: u16,
    /// Slot remapping applied when unpacking an online server reply.
    pub online_map: [usize; NUM_SLOTS],
}

/// The known scaler bank groups. To add a new bank group, add a row here.
static BANK_TABLE: [BankDescriptor; 6] = [
    // Dedicated scaler event types
    BankDescriptor {
        name: "Left",
        header: 0xabc0_0000,
        crate_id: 8,
        stream: StreamType::BankType,
        norm_slot: 4,
        clock_rate: 1024.0,
        server: "129.57.192.30",
        port: 5022,
        online_map: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    BankDescriptor {
        name: "Right",
        header: 0xceb0_0000,
        crate_id: 7,
        stream: StreamType::BankType,
        norm_slot: 8,
        clock_rate: 1024.0,
        server: "129.57.192.28",
        port: 5021,
        online_map: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    BankDescriptor {
        name: "dvcs",
        header: 0xd0c0_0000,
        crate_id: 9,
        stream: StreamType::BankType,
        norm_slot: 0,
        clock_rate: 105000.0,
        server: "129.57.192.51",
        port: 5064,
        online_map: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    BankDescriptor {
        name: "N20",
        header: 0xbba0_0000,
        crate_id: 6,
        stream: StreamType::BankType,
        norm_slot: 1,
        clock_rate: 2048.0,
        server: "129.57.192.51",
        port: 5064,
        online_map: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    // Banks that ride in the physics event stream
    BankDescriptor {
        name: "evleft",
        header: 0xabc0_0000,
        crate_id: 11,
        stream: StreamType::InStream,
        norm_slot: 4,
        clock_rate: 1024.0,
        server: "none",
        port: 0,
        online_map: [0; NUM_SLOTS],
    },
    BankDescriptor {
        name: "evright",
        header: 0xceb0_0000,
        crate_id: 10,
        stream: StreamType::InStream,
        norm_slot: 8,
        clock_rate: 1024.0,
        server: "none",
        port: 0,
        online_map: [0; NUM_SLOTS],
    },
];

/// Detector halves were cabled the other way around before this date, so
/// requests for one arm select the other arm's crate.
const LEFT_RIGHT_SWAP_CUTOFF: Date = date!(2000 - 09 - 15);

/// Case-insensitive substring containment, the matching rule for bank group
/// aliases.
pub fn find_no_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Iterate over all known bank groups (used to seed crate-number registries).
pub fn bank_table() -> &'static [BankDescriptor] {
    &BANK_TABLE
}

/// Resolve a requested bank group name into its descriptor for a given date.
///
/// Matching is case-insensitive substring containment over the known group
/// names, with "L" and "R" accepted as shortcuts for the two arms. Later
/// table entries win when several names are contained in the request, so
/// "evleft" resolves to the in-stream group even though it also contains
/// "left". Dates before the cutoff swap the Left and Right selections.
pub fn resolve(bank_group: &str, date: Date) -> Result<&'static BankDescriptor, BankGroupError> {
    let mut wanted: Option<&str> = None;
    if find_no_case(bank_group, "Left") || bank_group == "L" {
        wanted = Some("Left");
    }
    if find_no_case(bank_group, "Right") || bank_group == "R" {
        wanted = Some("Right");
    }
    if find_no_case(bank_group, "dvcs") {
        wanted = Some("dvcs");
    }
    if find_no_case(bank_group, "N20") {
        wanted = Some("N20");
    }
    if find_no_case(bank_group, "evleft") {
        wanted = Some("evleft");
    }
    if find_no_case(bank_group, "evright") {
        wanted = Some("evright");
    }

    let mut wanted = match wanted {
        Some(name) => name,
        None => return Err(BankGroupError::UndefinedCrate(bank_group.to_string())),
    };

    if date < LEFT_RIGHT_SWAP_CUTOFF {
        if wanted == "Left" {
            wanted = "Right";
        } else if wanted == "Right" {
            wanted = "Left";
        }
    }

    BANK_TABLE
        .iter()
        .find(|b| b.name == wanted)
        .ok_or_else(|| BankGroupError::UndefinedCrate(bank_group.to_string()))
}
