// Example usage of the replica sync core
// Two replicas edit concurrently, then pull from each other

use oplog::{Replica, ReplicaId, SharedClock, SyncError};

fn main() -> Result<(), SyncError> {
    println!("=== Replica Sync Example ===\n");

    let clock = SharedClock::new();
    let mut alice = Replica::new(ReplicaId(1), clock.clone());
    let mut bob = Replica::new(ReplicaId(2), clock);

    alice.insert(0, "milk").expect("index 0 is always valid");
    bob.insert(0, "eggs").expect("index 0 is always valid");
    bob.insert(1, "bread").expect("index 1 follows eggs");

    println!("Before sync:");
    println!("  {}: {:?}", alice.id(), alice.list());
    println!("  {}: {:?}", bob.id(), bob.list());

    let report = alice.sync_from(&bob)?;
    println!("\n{} <- {}: {:?}", alice.id(), bob.id(), report);
    let report = bob.sync_from(&alice)?;
    println!("{} <- {}: {:?}", bob.id(), alice.id(), report);

    // concurrent replace of the same element: the later one wins everywhere
    alice.set(1, "brown eggs").expect("eggs is at 1");
    bob.set(1, "free-range eggs").expect("eggs is at 1");
    alice.sync_from(&bob)?;
    bob.sync_from(&alice)?;

    println!("\nAfter sync:");
    println!("  {}: {:?}", alice.id(), alice.list());
    println!("  {}: {:?}", bob.id(), bob.list());
    assert_eq!(alice.list(), bob.list());

    println!("\n{}'s log:", bob.id());
    for commit in bob.log() {
        println!(
            "  v{} t{} by {} ({:?}): {:?}",
            commit.local_version,
            commit.logical_time,
            commit.author,
            commit.provenance,
            commit.operation
        );
    }

    Ok(())
}
