use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::crypto::Pubkey;

/// Identifier of a general. The commander is always `1`, lieutenants follow in
/// order starting at `2`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneralId(pub u32);

impl GeneralId {
    pub const COMMANDER: GeneralId = GeneralId(1);

    pub fn lieutenant(index: usize) -> Self {
        GeneralId(index as u32 + 2)
    }

    pub fn is_commander(self) -> bool {
        self == Self::COMMANDER
    }

    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for GeneralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every general of one run and the key it signs relays with.
#[derive(Debug, Clone)]
pub struct Roster {
    members: Vec<(GeneralId, Pubkey)>,
}

impl Roster {
    pub fn new(mut members: Vec<(GeneralId, Pubkey)>) -> Self {
        members.sort_by_key(|(id, _)| *id);
        Roster { members }
    }

    pub fn pubkey(&self, id: GeneralId) -> Option<&Pubkey> {
        self.members
            .binary_search_by_key(&id, |(member, _)| *member)
            .ok()
            .map(|idx| &self.members[idx].1)
    }
}
