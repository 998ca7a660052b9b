// ── Camera identity ──
//
// Cameras announce themselves with their MAC address in heartbeat replies,
// and switches report the same addresses in their MAC tables, each in its
// own dialect. Everything is normalized to one canonical form so the
// camera table has a single key per device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Length of a colon-separated MAC address (`AA:BB:CC:DD:EE:FF`).
pub const MAC_TEXT_LEN: usize = 17;

/// Rejected MAC address text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid MAC address: {0:?}")]
pub struct MacParseError(pub String);

/// MAC address, normalized to uppercase colon-separated format
/// (`AA:BB:CC:DD:EE:FF`).
///
/// Parsing is strict: six hex pairs separated by `:` or `-`, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse and normalize `raw`.
    pub fn parse(raw: &str) -> Result<Self, MacParseError> {
        let bytes = raw.as_bytes();
        if bytes.len() != MAC_TEXT_LEN {
            return Err(MacParseError(raw.to_owned()));
        }

        let separator = bytes[2];
        if separator != b':' && separator != b'-' {
            return Err(MacParseError(raw.to_owned()));
        }
        let well_formed = bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == separator
            } else {
                b.is_ascii_hexdigit()
            }
        });
        if !well_formed {
            return Err(MacParseError(raw.to_owned()));
        }

        Ok(Self(raw.to_ascii_uppercase().replace('-', ":")))
    }

    /// Take the address from the leading bytes of a heartbeat payload.
    ///
    /// Anything after the first 17 bytes is ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self, MacParseError> {
        let head = payload
            .get(..MAC_TEXT_LEN)
            .ok_or_else(|| MacParseError(String::from_utf8_lossy(payload).into_owned()))?;
        let text = std::str::from_utf8(head)
            .map_err(|_| MacParseError(String::from_utf8_lossy(head).into_owned()))?;
        Self::parse(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_switch_dialects() {
        let colon = MacAddress::parse("aa:bb:cc:dd:ee:01").unwrap();
        let dash = MacAddress::parse("AA-BB-CC-DD-EE-01").unwrap();
        assert_eq!(colon, dash);
        assert_eq!(colon.as_str(), "AA:BB:CC:DD:EE:01");
    }

    #[test]
    fn rejects_mixed_separators_and_junk() {
        assert!(MacAddress::parse("AA:BB-CC:DD:EE:01").is_err());
        assert!(MacAddress::parse("AA:BB:CC:DD:EE:0G").is_err());
        assert!(MacAddress::parse("AABBCCDDEE01").is_err());
        assert!(MacAddress::parse("").is_err());
    }

    #[test]
    fn payload_uses_first_seventeen_bytes() {
        let mac = MacAddress::from_payload(b"AA:BB:CC:DD:EE:01 fw=2.1").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:01");
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(MacAddress::from_payload(b"AA:BB:CC").is_err());
        assert!(MacAddress::from_payload(&[0xff; 20]).is_err());
    }
}
