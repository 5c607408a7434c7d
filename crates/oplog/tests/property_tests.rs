// Property tests for index translation and pairwise convergence

use oplog::{
    Checkpoint, Commit, Operation, Provenance, Replica, ReplicaId, SharedClock, Side,
    TransformIndexMap,
};
use proptest::prelude::*;

const LOCAL: ReplicaId = ReplicaId(1);
const SOURCE: ReplicaId = ReplicaId(2);
const OTHER: ReplicaId = ReplicaId(3);

#[derive(Debug, Clone, Copy)]
enum Entry {
    Local(usize),
    Shared(usize),
    Relayed(usize),
    Set(usize),
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        3 => (0..8usize).prop_map(Entry::Local),
        1 => (0..8usize).prop_map(Entry::Shared),
        1 => (0..8usize).prop_map(Entry::Relayed),
        1 => (0..8usize).prop_map(Entry::Set),
    ]
}

fn arb_window() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(arb_entry(), 0..12)
}

fn to_commits(entries: &[Entry]) -> Vec<Commit<u8>> {
    entries
        .iter()
        .zip(1u64..)
        .map(|(entry, version)| {
            let relayed = |source, index| Provenance::Relayed {
                source,
                origin_author: source,
                origin_version: version,
                origin_index: index,
                origin_time: version,
            };
            let insert = |index| Operation::Insert { index, value: 0 };
            let (provenance, operation) = match *entry {
                Entry::Local(index) => (Provenance::Local, insert(index)),
                Entry::Shared(index) => (relayed(SOURCE, index), insert(index)),
                Entry::Relayed(index) => (relayed(OTHER, index), insert(index)),
                Entry::Set(index) => (Provenance::Local, Operation::Set { index, value: 0 }),
            };
            Commit {
                author: LOCAL,
                local_version: version,
                logical_time: version,
                causal_checkpoint: Checkpoint::new(),
                provenance,
                operation,
            }
        })
        .collect()
}

proptest! {
    /// Property: an empty window maps every index to itself
    #[test]
    fn prop_empty_window_is_identity(index in 0..64usize) {
        let map = TransformIndexMap::build(&Vec::<Commit<u8>>::new(), SOURCE);
        prop_assert_eq!(map.transform(index), index);
        prop_assert_eq!(map.transform_insert(index), index);
    }

    /// Property: transform keeps distinct elements distinct and in order
    #[test]
    fn prop_transform_is_strictly_increasing(window in arb_window(), following in arb_window()) {
        let mut map = TransformIndexMap::build(&to_commits(&window), SOURCE);
        map.extend(&to_commits(&following), SOURCE, Side::Following);

        for i in 0..16 {
            prop_assert!(map.transform(i) < map.transform(i + 1));
            prop_assert!(map.transform(i) >= i);
        }
    }

    /// Property: an insertion lands between its neighbours
    #[test]
    fn prop_insert_lands_in_its_gap(window in arb_window(), following in arb_window()) {
        let mut map = TransformIndexMap::build(&to_commits(&window), SOURCE);
        map.extend(&to_commits(&following), SOURCE, Side::Following);

        prop_assert!(map.transform_insert(0) <= map.transform(0));
        for i in 1..16 {
            let at = map.transform_insert(i);
            prop_assert!(at > map.transform(i - 1));
            prop_assert!(at <= map.transform(i));
        }
    }

    /// Property: merging neighbouring runs never changes an answer
    #[test]
    fn prop_collapse_is_invisible(window in arb_window(), following in arb_window()) {
        let (window, following) = (to_commits(&window), to_commits(&following));

        let mut collapsed = TransformIndexMap::build(&window, SOURCE);
        collapsed.extend(&following, SOURCE, Side::Following);

        let mut raw = TransformIndexMap::uncollapsed();
        raw.extend(&window, SOURCE, Side::Preceding);
        raw.extend(&following, SOURCE, Side::Following);

        prop_assert!(collapsed.thresholds().len() <= raw.thresholds().len());
        for i in 0..24 {
            prop_assert_eq!(collapsed.transform(i), raw.transform(i));
            prop_assert_eq!(collapsed.transform_insert(i), raw.transform_insert(i));
        }
    }

    /// Property: when stamps follow log order, placing each commit by its
    /// stamp is the same as splitting the log at the remote edit's time
    #[test]
    fn prop_stamp_order_matches_log_split(window in arb_window(), cut in 0..14u64) {
        let commits = to_commits(&window);
        let split = commits.partition_point(|c| c.logical_time <= cut);

        let mut expected = TransformIndexMap::build(&commits[..split], SOURCE);
        expected.extend(&commits[split..], SOURCE, Side::Following);

        let around = TransformIndexMap::around(&commits, SOURCE, (cut, ReplicaId(u32::MAX)));
        prop_assert_eq!(around, expected);
    }

    /// Property: Set commits never move positions
    #[test]
    fn prop_sets_are_inert(window in arb_window()) {
        let without: Vec<Entry> = window
            .iter()
            .copied()
            .filter(|e| !matches!(e, Entry::Set(_)))
            .collect();

        let with_sets = TransformIndexMap::build(&to_commits(&window), SOURCE);
        let without = TransformIndexMap::build(&to_commits(&without), SOURCE);
        prop_assert_eq!(with_sets, without);
    }
}

#[derive(Debug, Clone, Copy)]
struct Edit {
    on_b: bool,
    insert: bool,
    seed: usize,
}

fn arb_round() -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(
        (any::<bool>(), prop::bool::weighted(0.75), 0..32usize)
            .prop_map(|(on_b, insert, seed)| Edit { on_b, insert, seed }),
        0..8,
    )
}

fn edit(replica: &mut Replica<u32>, edit: Edit, value: u32) {
    let len = replica.len();
    if edit.insert || len == 0 {
        replica.insert(edit.seed % (len + 1), value).unwrap();
    } else {
        replica.set(edit.seed % len, value).unwrap();
    }
}

proptest! {
    /// Property: two replicas that edit concurrently and then sync both ways
    /// end with the same list
    #[test]
    fn prop_pairwise_sync_converges(rounds in prop::collection::vec(arb_round(), 1..4)) {
        let clock = SharedClock::new();
        let mut a = Replica::new(LOCAL, clock.clone());
        let mut b = Replica::new(SOURCE, clock);
        let mut value = 0;

        for round in rounds {
            for e in round {
                value += 1;
                if e.on_b {
                    edit(&mut b, e, value);
                } else {
                    edit(&mut a, e, value);
                }
            }

            a.sync_from(&b).unwrap();
            b.sync_from(&a).unwrap();
            prop_assert_eq!(a.list(), b.list());
        }
    }
}
