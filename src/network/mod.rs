pub mod node;

pub use node::{Finished, MeshNode};

use std::collections::HashMap;

use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinSet,
};
use tracing::{debug, info};

use crate::{
    config::SimulationConfig,
    consensus::{driver::muster, Envelope, GeneralId, Outcome, Participant},
    error::{Error, ProtocolError, Result},
};

/*
    Network communication is point-to-point, authenticated and reliable: a
    loyal general receives a message from another general if and only if the
    latter sent it. When we refer to a "broadcast", it involves the
    broadcaster sending the same point-to-point messages to all lieutenants,
    including itself.

    Rounds are synchronous. Every general closes a round by sending an
    end-of-round marker to each peer after its last envelope; a lieutenant
    moves on once it holds a marker from every sender of the round. Channels
    are FIFO per sender, so a marker is never seen before the envelopes that
    preceded it.
*/

#[derive(Debug)]
pub enum Wire {
    Relay { round: u32, envelope: Envelope },
    EndOfRound { round: u32, from: GeneralId },
}

impl Wire {
    pub fn round(&self) -> u32 {
        match self {
            Wire::Relay { round, .. } | Wire::EndOfRound { round, .. } => *round,
        }
    }
}

/// Result of a concurrent run: the outcome and every lieutenant with its tree.
#[derive(Debug)]
pub struct MeshRun {
    pub outcome: Outcome,
    pub lieutenants: Vec<Participant>,
}

/// Runs OM(m) with one tokio task per lieutenant.
pub async fn run_mesh(config: SimulationConfig) -> Result<MeshRun> {
    config.validate()?;
    let (mut commander, lieutenants) = muster(&config);
    let ids: Vec<GeneralId> = lieutenants.iter().map(|lt| lt.id).collect();

    info!(
        generals = config.generals(),
        traitors = config.traitor_count(),
        recursion = config.recursion,
        rounds = config.rounds(),
        "Starting mesh run"
    );

    let mut outboxes: HashMap<GeneralId, UnboundedSender<Wire>> = HashMap::new();
    let mut inboxes = Vec::with_capacity(ids.len());
    for &id in &ids {
        let (tx, rx) = mpsc::unbounded_channel();
        outboxes.insert(id, tx);
        inboxes.push(rx);
    }

    let mut tasks = JoinSet::new();
    for (lieutenant, inbox) in lieutenants.into_iter().zip(inboxes) {
        let node = MeshNode::new(lieutenant, inbox, &outboxes, ids.clone());
        tasks.spawn(node.run(config.rounds()));
    }

    // Round 0
    for (to, envelope) in commander.broadcast(0, &ids)? {
        send(&outboxes, to, Wire::Relay { round: 0, envelope })?;
    }
    for &to in &ids {
        send(&outboxes, to, Wire::EndOfRound { round: 0, from: GeneralId::COMMANDER })?;
    }
    drop(outboxes);

    let mut decisions = Vec::with_capacity(config.generals());
    decisions.push(commander.resolve()?);

    let mut messages = 0;
    let mut finished = Vec::with_capacity(ids.len());
    for done in gather(tasks).await? {
        debug!(general = %done.participant.id, delivered = done.delivered, "Lieutenant finished");
        messages += done.delivered;
        decisions.push(
            done.participant
                .decision()
                .ok_or(ProtocolError::NotComplete(done.participant.id))?,
        );
        finished.push(done.participant);
    }

    let outcome = Outcome {
        order: config.order,
        decisions,
        traitors: config.traitors.clone(),
        messages,
    };
    info!(messages, agreement = outcome.agreement(), "Mesh run finished");

    Ok(MeshRun {
        outcome,
        lieutenants: finished,
    })
}

/// Waits for every lieutenant task, in id order. The first failure aborts the
/// tasks still running.
async fn gather(mut tasks: JoinSet<Result<Finished>>) -> Result<Vec<Finished>> {
    let mut finished = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(done) => finished.push(done),
            Err(err) => {
                tasks.abort_all();
                return Err(err);
            }
        }
    }

    finished.sort_by_key(|done| done.participant.id);
    Ok(finished)
}

pub(crate) fn send(outboxes: &HashMap<GeneralId, UnboundedSender<Wire>>, to: GeneralId, wire: Wire) -> Result<()> {
    outboxes
        .get(&to)
        .ok_or(Error::ChannelClosed(to))?
        .send(wire)
        .map_err(|_| Error::ChannelClosed(to))
}
