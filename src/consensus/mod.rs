pub mod adversary;
pub mod driver;
pub mod message;
pub mod order;
pub mod participant;
pub mod peers;
pub mod tree;

pub use adversary::*;
pub use driver::*;
pub use message::*;
pub use order::*;
pub use participant::*;
pub use peers::*;
pub use tree::*;

#[cfg(test)]
mod tests {
    use crate::common::crypto::Keypair;
    use super::*;

    #[test]
    fn test_end_to_end() {
        // Arrange: commander 1 loyal, lieutenant 4 lies to everyone
        let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::new_pair()).collect();
        let roster = Roster::new(
            keypairs
                .iter()
                .enumerate()
                .map(|(i, keypair)| (GeneralId(i as u32 + 1), keypair.pubkey()))
                .collect(),
        );
        let mut keypairs = keypairs.into_iter();

        let mut commander = Participant::commander(
            Order::Attack,
            Adversary::None,
            keypairs.next().unwrap(),
            roster.clone(),
        );
        let mut lieutenants: Vec<Participant> = keypairs
            .enumerate()
            .map(|(i, keypair)| {
                let id = GeneralId::lieutenant(i);
                let adversary = Adversary::for_general(id, id == GeneralId(4), AdversaryKind::Flip);
                Participant::lieutenant(id, adversary, keypair, roster.clone())
            })
            .collect();
        let ids: Vec<GeneralId> = lieutenants.iter().map(|lt| lt.id).collect();

        // ------------------------------------
        // 1. COMMANDER SENDS
        // ------------------------------------

        for (to, envelope) in commander.broadcast(0, &ids).unwrap() {
            let lieutenant = lieutenants.iter_mut().find(|lt| lt.id == to).unwrap();
            lieutenant.receive(envelope).unwrap();
        }

        // ------------------------------------
        // 2. LIEUTENANTS RELAY
        // ------------------------------------

        let mut outgoing = Vec::new();
        for lieutenant in lieutenants.iter_mut() {
            outgoing.extend(lieutenant.broadcast(1, &ids).unwrap());
        }
        for (to, envelope) in outgoing {
            let lieutenant = lieutenants.iter_mut().find(|lt| lt.id == to).unwrap();
            lieutenant.receive(envelope).unwrap();
        }

        // ------------------------------------
        // 3. DECIDE
        // ------------------------------------

        // Assert: the traitor's report is outvoted at both loyal lieutenants
        for lieutenant in lieutenants.iter_mut() {
            lieutenant.seal();
            let tree = lieutenant.tree().unwrap();
            assert_eq!(tree.len(), 4);

            let from_traitor = tree.find(&[GeneralId(1), GeneralId(4)]).unwrap();
            if lieutenant.is_traitor() {
                assert_eq!(from_traitor.decision, Order::Attack);
            } else {
                assert_eq!(from_traitor.decision, Order::Retreat);
                assert_eq!(lieutenant.resolve(), Ok(Order::Attack));
            }
        }
        assert_eq!(commander.resolve(), Ok(Order::Attack));
    }
}
