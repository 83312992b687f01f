//! Endpoint addressing shared by the framing stack and the processor.

use std::fmt;

/// Logical peer a frame is addressed to or from, used as the Network- and
/// Transport-tier TLV tag and as the processor's source/destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Device,
    Uhost,
    Platform,
    /// The UTIM instance itself; only ever a processor source/destination,
    /// never a wire tag.
    Utim,
}

impl Endpoint {
    /// Network-tier wire tag. `Utim` has no wire representation.
    pub fn wire_tag(self) -> Option<u8> {
        match self {
            Endpoint::Device => Some(0x00),
            Endpoint::Uhost => Some(0x01),
            Endpoint::Platform => Some(0x02),
            Endpoint::Utim => None,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Endpoint::Device),
            0x01 => Some(Endpoint::Uhost),
            0x02 => Some(Endpoint::Platform),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endpoint::Device => "DEVICE",
            Endpoint::Uhost => "UHOST",
            Endpoint::Platform => "PLATFORM",
            Endpoint::Utim => "UTIM",
        };
        f.write_str(s)
    }
}

/// Transport tier's parallel endpoint enumeration (mirrors `Endpoint` but is
/// kept distinct since the two tag spaces are not guaranteed to coincide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEndpoint {
    Device,
    UhostSocket,
    PlatformSocket,
}

impl TransportEndpoint {
    pub fn wire_tag(self) -> u8 {
        match self {
            TransportEndpoint::Device => 0x00,
            TransportEndpoint::UhostSocket => 0x01,
            TransportEndpoint::PlatformSocket => 0x02,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(TransportEndpoint::Device),
            0x01 => Some(TransportEndpoint::UhostSocket),
            0x02 => Some(TransportEndpoint::PlatformSocket),
            _ => None,
        }
    }
}

/// Status of a frame as it moves through the processor's re-entry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Process,
    ToSend,
    Finalized,
}
