use std::collections::HashMap;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::trace;

use super::{send, Wire};
use crate::{
    consensus::{GeneralId, Participant},
    error::{Error, ProtocolError, Result},
};

/// A lieutenant running as its own task.
pub struct MeshNode {
    participant: Participant,
    inbox: UnboundedReceiver<Wire>,
    outboxes: HashMap<GeneralId, UnboundedSender<Wire>>,
    peers: Vec<GeneralId>,
    // Messages of a later round that arrived before this one closed
    early: Vec<Wire>,
    ended: HashMap<u32, usize>,
    delivered: usize,
}

/// A lieutenant after its last round.
#[derive(Debug)]
pub struct Finished {
    pub participant: Participant,
    pub delivered: usize,
}

impl MeshNode {
    pub fn new(
        participant: Participant,
        inbox: UnboundedReceiver<Wire>,
        outboxes: &HashMap<GeneralId, UnboundedSender<Wire>>,
        peers: Vec<GeneralId>,
    ) -> Self {
        let outboxes = outboxes
            .iter()
            .filter(|(&id, _)| id != participant.id)
            .map(|(&id, tx)| (id, tx.clone()))
            .collect();

        MeshNode {
            participant,
            inbox,
            outboxes,
            peers,
            early: Vec::new(),
            ended: HashMap::new(),
            delivered: 0,
        }
    }

    pub async fn run(mut self, rounds: u32) -> Result<Finished> {
        // Round 0 has a single sender, the commander
        self.drain(0, 1).await?;

        let id = self.participant.id;
        let others: Vec<GeneralId> = self.peers.iter().copied().filter(|&peer| peer != id).collect();

        for round in 1..=rounds {
            for (to, envelope) in self.participant.broadcast(round, &self.peers)? {
                if to == id {
                    self.participant.receive(envelope)?;
                    self.delivered += 1;
                } else {
                    send(&self.outboxes, to, Wire::Relay { round, envelope })?;
                }
            }
            for &to in &others {
                send(&self.outboxes, to, Wire::EndOfRound { round, from: id })?;
            }

            self.drain(round, others.len()).await?;
        }

        self.participant.seal();
        self.participant.resolve()?;

        Ok(Finished {
            participant: self.participant,
            delivered: self.delivered,
        })
    }

    /// Processes messages until `expected` senders have closed `round`.
    async fn drain(&mut self, round: u32, expected: usize) -> Result<()> {
        for wire in std::mem::take(&mut self.early) {
            self.accept(round, wire)?;
        }

        while self.ended.get(&round).copied().unwrap_or(0) < expected {
            let wire = self
                .inbox
                .recv()
                .await
                .ok_or(Error::ChannelClosed(self.participant.id))?;
            self.accept(round, wire)?;
        }

        trace!(general = %self.participant.id, round, "Round closed");
        Ok(())
    }

    fn accept(&mut self, round: u32, wire: Wire) -> Result<()> {
        if wire.round() > round {
            self.early.push(wire);
            return Ok(());
        }
        if wire.round() < round {
            return Err(ProtocolError::StaleRound {
                id: self.participant.id,
                got: wire.round(),
                current: round,
            }
            .into());
        }

        match wire {
            Wire::Relay { envelope, .. } => {
                self.participant.receive(envelope)?;
                self.delivered += 1;
            }
            Wire::EndOfRound { round, .. } => {
                *self.ended.entry(round).or_default() += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        common::crypto::Keypair,
        consensus::{Adversary, Envelope, Hashable, MessageNode, Order, Phase, Roster},
    };

    #[tokio::test]
    async fn test_early_messages_wait_for_their_round() {
        // Arrange: lieutenants 2 and 3; drive lieutenant 2 by hand as if 3
        // raced ahead into round 1 before the commander's order arrived.
        let commander = Keypair::new_pair();
        let first = Keypair::new_pair();
        let second = Keypair::new_pair();
        let roster = Roster::new(vec![
            (GeneralId(1), commander.pubkey()),
            (GeneralId(2), first.pubkey()),
            (GeneralId(3), second.pubkey()),
        ]);
        let participant = Participant::lieutenant(GeneralId(2), Adversary::None, first, roster);

        let (tx, rx) = mpsc::unbounded_channel();
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        let outboxes = HashMap::from([(GeneralId(2), tx.clone()), (GeneralId(3), peer_tx)]);
        let node = MeshNode::new(participant, rx, &outboxes, vec![GeneralId(2), GeneralId(3)]);

        let order = MessageNode::new(Order::Attack).append_to_path(GeneralId(1));
        let relayed = order.append_to_path(GeneralId(3));

        // Act: round 1 traffic first, then round 0
        let early = Envelope { sig: second.sign(&relayed.hash()), node: relayed };
        let root = Envelope { sig: commander.sign(&order.hash()), node: order };
        tx.send(Wire::Relay { round: 1, envelope: early }).unwrap();
        tx.send(Wire::EndOfRound { round: 1, from: GeneralId(3) }).unwrap();
        tx.send(Wire::Relay { round: 0, envelope: root }).unwrap();
        tx.send(Wire::EndOfRound { round: 0, from: GeneralId(1) }).unwrap();

        let finished = node.run(1).await.unwrap();

        // Assert: root, own copy and the copy from 3
        let tree = finished.participant.tree().unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().path, vec![GeneralId(1)]);
        assert_eq!(finished.participant.phase(), Phase::Decided);
        assert_eq!(finished.participant.decision(), Some(Order::Attack));
        assert_eq!(finished.delivered, 3);

        // Lieutenant 3 got our relay followed by our end marker
        assert!(matches!(peer_rx.recv().await, Some(Wire::Relay { round: 1, .. })));
        assert!(matches!(peer_rx.recv().await, Some(Wire::EndOfRound { round: 1, from: GeneralId(2) })));
    }
}
