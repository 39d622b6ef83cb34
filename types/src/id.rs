//! Identifiers for participants and proposals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::TypesError;

/// A numeric participant id, supplied by the (trusted) caller.
///
/// Participants are not registered anywhere; any integer is a valid id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(u32);

impl ParticipantId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ParticipantId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| TypesError::InvalidParticipantId(s.to_string()))
    }
}

/// A proposal identifier (random UUIDv4, rendered hyphenated).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Uuid);

impl ProposalId {
    /// Length of the binary form, used for storage keys.
    pub const LEN: usize = 16;

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProposalId({})", self.0.hyphenated())
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ProposalId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TypesError::InvalidProposalId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = ProposalId::generate();
        let b = ProposalId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn proposal_id_parses_its_display_form() {
        let id = ProposalId::generate();
        let parsed: ProposalId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn garbage_proposal_id_rejected() {
        let err = "not-a-proposal".parse::<ProposalId>().unwrap_err();
        assert_eq!(err, TypesError::InvalidProposalId("not-a-proposal".into()));
    }

    #[test]
    fn participant_id_rejects_negative() {
        assert!("-3".parse::<ParticipantId>().is_err());
        assert_eq!("42".parse::<ParticipantId>().unwrap(), ParticipantId::new(42));
    }

    #[test]
    fn ids_serialize_as_plain_json_values() {
        let p = ParticipantId::new(7);
        assert_eq!(serde_json::to_string(&p).unwrap(), "7");

        let id = ProposalId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
