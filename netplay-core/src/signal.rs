//! Signaling payloads relayed out-of-band before a link exists.
//!
//! Session descriptions and ICE candidates are opaque to this core; it
//! only routes them between the roles and the transport collaborator.

use crate::error::NetplayError;

// ── SignalKind ───────────────────────────────────────────────────

/// Discriminant of a signaling payload. The numeric values are part of
/// the signaling wire format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer = 0,
    Answer = 1,
    IceCandidate = 2,
}

impl TryFrom<u8> for SignalKind {
    type Error = NetplayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SignalKind::Offer),
            1 => Ok(SignalKind::Answer),
            2 => Ok(SignalKind::IceCandidate),
            _ => Err(NetplayError::UnknownVariant {
                type_name: "SignalKind",
                value: value as u64,
            }),
        }
    }
}

// ── Signal ───────────────────────────────────────────────────────

/// One signaling payload. `data` is an opaque blob produced and
/// consumed by the transport layer (an SDP body, a candidate line…).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub kind: SignalKind,
    pub data: String,
}

impl Signal {
    pub fn offer(data: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Offer,
            data: data.into(),
        }
    }

    pub fn answer(data: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Answer,
            data: data.into(),
        }
    }

    pub fn ice_candidate(data: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::IceCandidate,
            data: data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_discriminants_round_trip() {
        for kind in [SignalKind::Offer, SignalKind::Answer, SignalKind::IceCandidate] {
            assert_eq!(SignalKind::try_from(kind as u8).unwrap(), kind);
        }
        assert!(SignalKind::try_from(3).is_err());
    }
}
