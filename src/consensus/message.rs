use super::{peers::GeneralId, tree::MessageNode};
use crate::common::crypto::{Digest, Signature};

/*
    A1. Every message that is sent is delivered correctly.
    A2. The receiver of a message knows who sent it.
    A3. The absence of a message can be detected.

    Oral messages do not let a lieutenant prove what someone else told it,
    but A2 still holds for the hop it heard directly. Each relayed copy is
    signed by the general that forwards it, and that general must be the last
    entry of the copy's path.
*/

pub trait Hashable {
    fn hash(&self) -> Digest;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Envelope {
    pub node: MessageNode,
    pub sig: Signature,
}

impl Envelope {
    pub fn sender(&self) -> Option<GeneralId> {
        self.node.sender()
    }
}
