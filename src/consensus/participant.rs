use tracing::{debug, trace};

use super::{
    adversary::Adversary,
    message::{Envelope, Hashable},
    order::Order,
    peers::{GeneralId, Roster},
    tree::{MessageNode, MessageTree},
};
use crate::{common::crypto::Keypair, error::ProtocolError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Commander,
    Lieutenant,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Uninitialized,
    Rooted,
    Complete,
    Decided,
}

#[derive(Debug)]
pub struct Participant {
    pub id: GeneralId,
    pub role: Role,
    phase: Phase,
    initial_decision: Option<Order>,
    is_traitor: bool,
    adversary: Adversary,
    keypair: Keypair,
    roster: Roster,
    tree: Option<MessageTree>,
    last_round: Option<u32>,
    decision: Option<Order>,
}

impl Participant {
    pub fn commander(order: Order, adversary: Adversary, keypair: Keypair, roster: Roster) -> Self {
        Participant {
            id: GeneralId::COMMANDER,
            role: Role::Commander,
            phase: Phase::Uninitialized,
            initial_decision: Some(order),
            is_traitor: !adversary.is_loyal(),
            adversary,
            keypair,
            roster,
            tree: None,
            last_round: None,
            decision: None,
        }
    }

    pub fn lieutenant(id: GeneralId, adversary: Adversary, keypair: Keypair, roster: Roster) -> Self {
        Participant {
            id,
            role: Role::Lieutenant,
            phase: Phase::Uninitialized,
            initial_decision: None,
            is_traitor: !adversary.is_loyal(),
            adversary,
            keypair,
            roster,
            tree: None,
            last_round: None,
            decision: None,
        }
    }

    pub fn is_traitor(&self) -> bool {
        self.is_traitor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tree(&self) -> Option<&MessageTree> {
        self.tree.as_ref()
    }

    pub fn decision(&self) -> Option<Order> {
        self.decision
    }

    /// Relays every message heard at depth `round` that has not yet passed
    /// through this general to each of `peers`, signing every copy.
    ///
    /// Round 0 belongs to the commander, who sends its own order. Rounds from
    /// 1 on belong to lieutenants. When `peers` includes this general the copy
    /// addressed to itself is never substituted.
    pub fn broadcast(&mut self, round: u32, peers: &[GeneralId]) -> Result<Vec<(GeneralId, Envelope)>, ProtocolError> {
        let in_turn = match self.role {
            Role::Commander => round == 0,
            Role::Lieutenant => round >= 1,
        };
        let advances = self.last_round.map_or(true, |last| round > last);
        if !in_turn || !advances || self.phase == Phase::Decided {
            return Err(ProtocolError::OutOfTurn { id: self.id, role: self.role, round });
        }

        if self.tree.is_none() {
            match self.initial_decision {
                Some(order) => {
                    self.tree = Some(MessageTree::new(MessageNode::new(order)));
                    self.phase = Phase::Rooted;
                }
                None => return Err(ProtocolError::Unrooted(self.id)),
            }
        }
        self.last_round = Some(round);

        let relays: Vec<MessageNode> = match &self.tree {
            Some(tree) => tree
                .nodes_at_depth(round as usize)
                .into_iter()
                .filter(|node| !node.contains(self.id))
                .map(|node| node.append_to_path(self.id))
                .collect(),
            None => Vec::new(),
        };

        let mut outgoing = Vec::with_capacity(relays.len() * peers.len());
        for relay in &relays {
            for &peer in peers {
                let mut copy = relay.clone();
                if peer != self.id {
                    copy.decision = self.adversary.substitute(self.id, peer, copy.decision);
                }
                let sig = self.keypair.sign(&copy.hash());
                outgoing.push((peer, Envelope { node: copy, sig }));
            }
        }

        debug!(
            general = %self.id,
            round,
            relays = relays.len(),
            envelopes = outgoing.len(),
            traitor = self.is_traitor,
            "Broadcast"
        );

        Ok(outgoing)
    }

    pub fn receive(&mut self, envelope: Envelope) -> Result<(), ProtocolError> {
        if self.role == Role::Commander {
            return Err(ProtocolError::UnexpectedRecipient(self.id));
        }
        if self.phase == Phase::Decided {
            return Err(ProtocolError::AlreadyDecided(self.id));
        }

        // Check the envelope was signed by the hop it claims to come from
        let sender = envelope.sender().ok_or(ProtocolError::EmptyPath)?;
        let expected = self.roster.pubkey(sender).ok_or(ProtocolError::UnknownSender(sender))?;
        if envelope.sig.signer != *expected {
            return Err(ProtocolError::SenderMismatch(sender));
        }
        if !envelope.sig.verify(&envelope.node.hash()) {
            return Err(ProtocolError::BadSignature(sender));
        }

        trace!(general = %self.id, path = ?envelope.node.path, decision = %envelope.node.decision, "Received");

        match self.tree.as_mut() {
            Some(tree) => {
                tree.insert(envelope.node)?;
            }
            // Only the commander's order can root a tree
            None if !sender.is_commander() => return Err(ProtocolError::Unrooted(self.id)),
            None => {
                self.tree = Some(MessageTree::new(envelope.node));
                self.phase = Phase::Rooted;
            }
        }
        Ok(())
    }

    /// Marks the last round's deliveries as done.
    pub fn seal(&mut self) {
        if self.phase == Phase::Rooted {
            self.phase = Phase::Complete;
        }
    }

    /// Final decision. The commander reports its own order; a lieutenant folds
    /// its tree. Resolving again yields the same order.
    pub fn resolve(&mut self) -> Result<Order, ProtocolError> {
        if let (Role::Commander, Some(order)) = (self.role, self.initial_decision) {
            self.decision = Some(order);
            self.phase = Phase::Decided;
            return Ok(order);
        }

        match self.phase {
            Phase::Complete | Phase::Decided => {}
            Phase::Uninitialized => return Err(ProtocolError::Unrooted(self.id)),
            Phase::Rooted => return Err(ProtocolError::NotComplete(self.id)),
        }

        let tree = self.tree.as_mut().ok_or(ProtocolError::Unrooted(self.id))?;
        let order = tree.resolve();
        debug!(general = %self.id, nodes = tree.len(), decision = %order, "Resolved");

        self.decision = Some(order);
        self.phase = Phase::Decided;
        Ok(order)
    }
}
