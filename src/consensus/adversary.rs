use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{order::Order, peers::GeneralId};

/// How traitors misreport, as chosen in the configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdversaryKind {
    /// Always send the opposite order.
    Flip,
    /// Send the opposite order to generals whose id parity differs from ours.
    #[default]
    ParityFlip,
    /// Toss a coin for every message.
    Random { seed: u64 },
}

/// Substitution policy owned by one general. Loyal generals get `None`.
#[derive(Clone, Debug)]
pub enum Adversary {
    None,
    Flip,
    ParityFlip,
    Random(StdRng),
}

impl Adversary {
    pub fn for_general(id: GeneralId, is_traitor: bool, kind: AdversaryKind) -> Self {
        if !is_traitor {
            return Adversary::None;
        }

        match kind {
            AdversaryKind::Flip => Adversary::Flip,
            AdversaryKind::ParityFlip => Adversary::ParityFlip,
            AdversaryKind::Random { seed } => {
                let mixed = seed ^ u64::from(id.0).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                Adversary::Random(StdRng::seed_from_u64(mixed))
            }
        }
    }

    pub fn is_loyal(&self) -> bool {
        matches!(self, Adversary::None)
    }

    /// Order actually sent from `sender` to `dest` in place of `order`.
    pub fn substitute(&mut self, sender: GeneralId, dest: GeneralId, order: Order) -> Order {
        match self {
            Adversary::None => order,
            Adversary::Flip => order.flip(),
            Adversary::ParityFlip => {
                if sender.is_even() != dest.is_even() {
                    order.flip()
                } else {
                    order
                }
            }
            Adversary::Random(rng) => {
                if rng.gen_bool(0.5) {
                    Order::Attack
                } else {
                    Order::Retreat
                }
            }
        }
    }
}
