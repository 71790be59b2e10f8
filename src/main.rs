/*
    The Byzantine Generals Problem. A commanding general must send an order
    to his n - 1 lieutenant generals such that

    IC1. All loyal lieutenants obey the same order.
    IC2. If the commanding general is loyal, then every loyal lieutenant
         obeys the order he sends.

    With oral messages this is solvable if and only if more than two-thirds
    of the generals are loyal. OM(m) solves it for at most m traitors by
    letting every lieutenant relay what it heard for m rounds and taking
    majorities bottom-up.

    This binary runs a few fixed rounds of OM(m), both on one thread and with
    a task per lieutenant, and logs the outcome. Set RUST_LOG=debug to follow
    individual broadcasts.
*/

use oral_generals::{run_mesh, AdversaryKind, Order, Simulation, SimulationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> oral_generals::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let scenarios = vec![
        ("all loyal", SimulationConfig::with_lieutenants(Order::Attack, 3, 0).with_recursion(1)),
        (
            "one traitor lieutenant",
            SimulationConfig::new(Order::Retreat, vec![false, false, false, true, false, false, false]),
        ),
        ("traitor commander", SimulationConfig::new(Order::Attack, vec![true, false, false, false])),
        (
            "two random traitors",
            SimulationConfig::with_lieutenants(Order::Attack, 4, 2)
                .with_adversary(AdversaryKind::Random { seed: 42 }),
        ),
    ];

    for (name, config) in scenarios {
        let outcome = Simulation::new(config.clone())?.run()?;
        info!(
            scenario = name,
            decisions = ?outcome.decisions,
            agreement = outcome.agreement(),
            validity = ?outcome.validity(),
            success = ?outcome.loyal_success_ratio(),
            "Sequential"
        );

        let mesh = run_mesh(config).await?;
        info!(
            scenario = name,
            decisions = ?mesh.outcome.decisions,
            matches_sequential = mesh.outcome == outcome,
            "Mesh"
        );
    }

    Ok(())
}
