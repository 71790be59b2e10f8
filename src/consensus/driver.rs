use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    adversary::Adversary,
    message::Envelope,
    order::Order,
    participant::Participant,
    peers::{GeneralId, Roster},
};
use crate::{
    common::crypto::Keypair,
    config::SimulationConfig,
    error::{ProtocolError, Result},
};

/*
    Algorithm OM(0).
    (1) The commander sends his value to every lieutenant.
    (2) Each lieutenant uses the value he receives from the commander.

    Algorithm OM(m), m > 0.
    (1) The commander sends his value to every lieutenant.
    (2) For each i, let v_i be the value lieutenant i receives from the
        commander. Lieutenant i acts as the commander in OM(m - 1) to send
        v_i to each of the n - 2 other lieutenants.
    (3) For each i, and each j != i, let v_j be the value lieutenant i
        received from lieutenant j in step (2). Lieutenant i uses the value
        majority(v_1, ..., v_n-1).

    The recursion is unrolled into m synchronous rounds. In round r every
    lieutenant forwards each message it heard at depth r. With k lieutenants
    every path is full after round k, so at most k rounds run. A general's own
    copy counts as v_i, so relays go to every lieutenant including the sender.
*/

/// Decisions of one run, commander first, then lieutenants in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub order: Order,
    pub decisions: Vec<Order>,
    pub traitors: Vec<bool>,
    /// Envelopes delivered over the whole run.
    pub messages: usize,
}

impl Outcome {
    pub fn commander(&self) -> Option<Order> {
        self.decisions.first().copied()
    }

    pub fn loyal_lieutenants(&self) -> impl Iterator<Item = (GeneralId, Order)> + '_ {
        self.decisions
            .iter()
            .zip(&self.traitors)
            .enumerate()
            .skip(1)
            .filter(|(_, (_, traitor))| !**traitor)
            .map(|(i, (&order, _))| (GeneralId(i as u32 + 1), order))
    }

    /// Every loyal lieutenant reached the same decision.
    pub fn agreement(&self) -> bool {
        let mut decisions = self.loyal_lieutenants().map(|(_, order)| order);
        match decisions.next() {
            Some(first) => decisions.all(|order| order == first),
            None => true,
        }
    }

    /// Every loyal lieutenant followed a loyal commander. `None` when the
    /// commander is a traitor.
    pub fn validity(&self) -> Option<bool> {
        if self.traitors.first().copied().unwrap_or(true) {
            return None;
        }
        Some(self.loyal_lieutenants().all(|(_, order)| order == self.order))
    }

    /// Share of loyal generals, commander included, who chose the
    /// commander's order. `None` when every general is a traitor.
    pub fn loyal_success_ratio(&self) -> Option<f64> {
        let (loyal, correct) = self
            .decisions
            .iter()
            .zip(&self.traitors)
            .filter(|(_, traitor)| !**traitor)
            .fold((0usize, 0usize), |(loyal, correct), (&order, _)| {
                (loyal + 1, correct + usize::from(order == self.order))
            });

        if loyal == 0 {
            None
        } else {
            Some(correct as f64 / loyal as f64)
        }
    }
}

/// Builds the commander and lieutenants of a configuration, each with a fresh
/// keypair and a copy of the shared roster.
pub(crate) fn muster(config: &SimulationConfig) -> (Participant, Vec<Participant>) {
    let keypairs: Vec<Keypair> = config.traitors.iter().map(|_| Keypair::new_pair()).collect();
    let roster = Roster::new(
        keypairs
            .iter()
            .enumerate()
            .map(|(i, keypair)| (GeneralId(i as u32 + 1), keypair.pubkey()))
            .collect(),
    );

    let mut keypairs = keypairs.into_iter();
    let mut flags = config.traitors.iter().copied();

    let commander_keypair = keypairs.next().unwrap_or_else(Keypair::new_pair);
    let commander = Participant::commander(
        config.order,
        Adversary::for_general(GeneralId::COMMANDER, flags.next().unwrap_or(false), config.adversary),
        commander_keypair,
        roster.clone(),
    );

    let lieutenants = keypairs
        .zip(flags)
        .enumerate()
        .map(|(i, (keypair, traitor))| {
            let id = GeneralId::lieutenant(i);
            Participant::lieutenant(
                id,
                Adversary::for_general(id, traitor, config.adversary),
                keypair,
                roster.clone(),
            )
        })
        .collect();

    (commander, lieutenants)
}

/// Sequential round driver.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    commander: Participant,
    lieutenants: Vec<Participant>,
    messages: usize,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let (commander, lieutenants) = muster(&config);

        Ok(Simulation {
            config,
            commander,
            lieutenants,
            messages: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn commander(&self) -> &Participant {
        &self.commander
    }

    pub fn lieutenants(&self) -> &[Participant] {
        &self.lieutenants
    }

    pub fn run(&mut self) -> Result<Outcome> {
        let rounds = self.config.rounds();
        info!(
            generals = self.config.generals(),
            traitors = self.config.traitor_count(),
            recursion = self.config.recursion,
            rounds,
            order = %self.config.order,
            "Starting oral messages run"
        );
        if !self.config.safety_bound_holds() {
            warn!(
                generals = self.config.generals(),
                traitors = self.config.traitor_count(),
                recursion = self.config.recursion,
                "Safety bound does not hold, agreement is not guaranteed"
            );
        }

        let ids: Vec<GeneralId> = self.lieutenants.iter().map(|lt| lt.id).collect();

        // Round 0: the commander's order roots every lieutenant's tree
        let outgoing = self.commander.broadcast(0, &ids)?;
        self.deliver(outgoing)?;

        // Every broadcast of a round is collected before any delivery
        for round in 1..=rounds {
            let mut outgoing = Vec::new();
            for lieutenant in self.lieutenants.iter_mut() {
                outgoing.extend(lieutenant.broadcast(round, &ids)?);
            }
            debug!(round, envelopes = outgoing.len(), "Round sent");
            self.deliver(outgoing)?;
        }

        let mut decisions = Vec::with_capacity(self.config.generals());
        decisions.push(self.commander.resolve()?);
        for lieutenant in self.lieutenants.iter_mut() {
            lieutenant.seal();
            decisions.push(lieutenant.resolve()?);
        }

        let outcome = Outcome {
            order: self.config.order,
            decisions,
            traitors: self.config.traitors.clone(),
            messages: self.messages,
        };
        info!(
            messages = outcome.messages,
            agreement = outcome.agreement(),
            validity = ?outcome.validity(),
            "Run finished"
        );
        Ok(outcome)
    }

    fn deliver(&mut self, outgoing: Vec<(GeneralId, Envelope)>) -> Result<()> {
        for (to, envelope) in outgoing {
            let lieutenant = self
                .lieutenants
                .iter_mut()
                .find(|lt| lt.id == to)
                .ok_or(ProtocolError::UnknownRecipient(to))?;
            lieutenant.receive(envelope)?;
            self.messages += 1;
        }
        Ok(())
    }
}
