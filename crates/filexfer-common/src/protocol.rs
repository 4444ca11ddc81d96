//! The two error-recovery protocols and the two transfer directions.

use std::fmt;
use std::str::FromStr;

/// Error-recovery protocol selected for a transfer.
///
/// `Protocol::next_seq` implements the sequence-number advance rule for
/// each protocol: Stop-and-Wait flips the single bit of a two-element
/// sequence space, Selective-Repeat counts up without bound (wrapping on
/// overflow, which at one packet per BUFSIZE is not reachable in practice
/// for any file this service is meant to move).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    StopWait,
    SelectiveRepeat,
}

impl Protocol {
    pub fn window_size(self) -> usize {
        match self {
            Protocol::StopWait => crate::constants::WINDOW_STOP_WAIT,
            Protocol::SelectiveRepeat => crate::constants::WINDOW_SELECTIVE_REPEAT,
        }
    }

    /// Advance a sequence number by one step under this protocol's sequence
    /// space. Stop-and-Wait toggles between 0 and 1; Selective-Repeat just
    /// increments.
    pub fn next_seq(self, seq: u32) -> u32 {
        match self {
            Protocol::StopWait => seq ^ 1,
            Protocol::SelectiveRepeat => seq.wrapping_add(1),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::StopWait => write!(f, "stop-wait"),
            Protocol::SelectiveRepeat => write!(f, "selective-repeat"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop-wait" | "stopwait" | "sw" | "0" => Ok(Protocol::StopWait),
            "selective-repeat" | "sr" | "1" => Ok(Protocol::SelectiveRepeat),
            other => Err(format!("unrecognized protocol: {other}")),
        }
    }
}

/// Direction of a transfer, carried in an `Init` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Client is sending a file to the server.
    Upload,
    /// Client is requesting a file from the server.
    Download,
}

impl Operation {
    pub fn tag(self) -> u8 {
        match self {
            Operation::Upload => 0,
            Operation::Download => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Operation::Upload),
            1 => Some(Operation::Download),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_wait_toggles() {
        assert_eq!(Protocol::StopWait.next_seq(0), 1);
        assert_eq!(Protocol::StopWait.next_seq(1), 0);
    }

    #[test]
    fn selective_repeat_counts_up() {
        assert_eq!(Protocol::SelectiveRepeat.next_seq(41), 42);
    }

    #[test]
    fn protocol_from_str_roundtrip() {
        assert_eq!("stop-wait".parse::<Protocol>().unwrap(), Protocol::StopWait);
        assert_eq!(
            "selective-repeat".parse::<Protocol>().unwrap(),
            Protocol::SelectiveRepeat
        );
        assert!("bogus".parse::<Protocol>().is_err());
    }

    #[test]
    fn operation_tag_roundtrip() {
        assert_eq!(Operation::from_tag(Operation::Upload.tag()), Some(Operation::Upload));
        assert_eq!(Operation::from_tag(Operation::Download.tag()), Some(Operation::Download));
        assert_eq!(Operation::from_tag(7), None);
    }
}
