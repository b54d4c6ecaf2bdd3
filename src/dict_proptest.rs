#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check table
// invariants through crate-private fields.

use crate::config::{DictConfig, ResizePolicy};
use crate::dict::Dict;
use crate::dict_type::{DictType, StringKeys};
use crate::error::DictError;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    Replace(usize, i32),
    Delete(usize),
    Find(usize),
    Rehash(usize),
    Resize(usize),
    Shrink,
    Iterate,
    SafeIterate,
    Scan,
    Sample(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            2 => idx.clone().prop_map(OpI::Delete),
            2 => idx.clone().prop_map(OpI::Find),
            1 => (1usize..8).prop_map(OpI::Rehash),
            1 => (0usize..300).prop_map(OpI::Resize),
            1 => Just(OpI::Shrink),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::SafeIterate),
            1 => Just(OpI::Scan),
            1 => (0usize..10).prop_map(OpI::Sample),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn check_structure<T: DictType>(d: &Dict<T>) -> Result<(), TestCaseError> {
    prop_assert_eq!(d.entries.len(), d.len());
    for t in 0..=1 {
        let ht = &d.ht[t];
        prop_assert_eq!(ht.table.len(), ht.size);
        prop_assert!(ht.size == 0 || ht.size.is_power_of_two());
        let chained: usize = ht.table.iter().map(|&h| d.chain(h).count()).sum();
        prop_assert_eq!(chained, ht.used);
    }
    match d.rehash_idx {
        Some(idx) => {
            prop_assert!(d.ht[1].size > 0);
            prop_assert!(d.ht[0].table[..idx].iter().all(Option::is_none));
        }
        None => prop_assert_eq!(d.ht[1].size, 0),
    }
    Ok(())
}

fn run<T>(mut sut: Dict<T>, pool: &[String], ops: Vec<OpI>) -> Result<(), TestCaseError>
where
    T: DictType<Key = String, Val = i32>,
{
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Add(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.add(k.clone(), v) {
                    Ok(id) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        prop_assert_eq!(id.val(&sut), Some(&v));
                        model.insert(k, v);
                    }
                    Err(e) => {
                        prop_assert_eq!(e, DictError::KeyExists);
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            OpI::Replace(i, v) => {
                let k = pool[i].clone();
                let before = sut.find(&k);
                let added = sut.replace(k.clone(), v);
                prop_assert_eq!(added, model.insert(k.clone(), v).is_none());
                if let Some(id) = before {
                    // Overwrite keeps the entry in place.
                    prop_assert_eq!(sut.find(&k), Some(id));
                }
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                let res = sut.delete(k);
                match model.remove(k) {
                    Some(_) => prop_assert_eq!(res, Ok(())),
                    None => prop_assert_eq!(res, Err(DictError::KeyNotFound)),
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.fetch_value(k), model.get(k));
            }
            OpI::Rehash(n) => {
                let was = sut.is_rehashing();
                let more = sut.rehash(n);
                prop_assert!(!more || was);
                prop_assert_eq!(more, sut.is_rehashing());
            }
            OpI::Resize(size) => {
                let was = sut.is_rehashing();
                match sut.resize(size) {
                    Ok(()) => prop_assert!(!was),
                    Err(e) => {
                        prop_assert_eq!(e, DictError::AlreadyRehashing);
                        prop_assert!(was);
                    }
                }
            }
            OpI::Shrink => {
                let was = sut.is_rehashing();
                prop_assert_eq!(sut.shrink_to_fit().is_err(), was);
            }
            OpI::Iterate => {
                let mut it = sut.iterator();
                let mut seen = BTreeMap::new();
                while let Some(id) = sut.next_entry(&mut it) {
                    let k = id.key(&sut).cloned();
                    let v = id.val(&sut).copied();
                    prop_assert!(seen.insert(k, v).is_none(), "entry yielded twice");
                }
                prop_assert_eq!(sut.release_iterator(it), Ok(()));
                let expected: BTreeMap<_, _> = model
                    .iter()
                    .map(|(k, v)| (Some(k.clone()), Some(*v)))
                    .collect();
                prop_assert_eq!(seen, expected);
            }
            OpI::SafeIterate => {
                // Delete every other entry while walking.
                let mut it = sut.safe_iterator();
                let mut seen = BTreeSet::new();
                let mut odd = false;
                while let Some(id) = sut.next_entry(&mut it) {
                    let k = id.key(&sut).cloned().unwrap_or_default();
                    prop_assert!(seen.insert(k.clone()), "entry yielded twice");
                    if odd {
                        prop_assert_eq!(sut.delete(&k), Ok(()));
                        model.remove(&k);
                    }
                    odd = !odd;
                }
                prop_assert_eq!(sut.release_iterator(it), Ok(()));
                prop_assert_eq!(sut.iterators(), 0);
            }
            OpI::Scan => {
                let mut seen = BTreeSet::new();
                let mut cursor = 0;
                loop {
                    cursor = sut.scan(cursor, |_, e| {
                        seen.insert(e.key().clone());
                    });
                    if cursor == 0 {
                        break;
                    }
                }
                let expected: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(seen, expected);
            }
            OpI::Sample(count) => {
                let ids = sut.get_some_keys(count);
                prop_assert!(ids.len() <= count.min(model.len()));
                for id in ids {
                    let k = id.key(&sut).cloned().unwrap_or_default();
                    prop_assert!(model.contains_key(&k));
                }
                match sut.get_random_key() {
                    Some(id) => {
                        let k = id.key(&sut).cloned().unwrap_or_default();
                        prop_assert!(model.contains_key(&k));
                    }
                    None => prop_assert!(model.is_empty()),
                }
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        check_structure(&sut)?;
    }
    Ok(())
}

fn enabled() -> DictConfig {
    DictConfig::default().with_resize(ResizePolicy::Enabled)
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate adds are rejected; replace reports whether the key was new.
// - Lookups agree with the model while rehashing and after resizes.
// - Iterators and full scans yield exactly the model's entries.
// - Per-table `used` matches chain contents; buckets below the rehash
//   index are empty; sizes are powers of two.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run(Dict::with_config(StringKeys::<i32>::new(), (), enabled()), &pool, ops)?;
    }
}

// Collision variant: every key hashes to the same value, so each table is
// one long chain and equality resolution does all the work.
struct Colliding;
impl DictType for Colliding {
    type Key = String;
    type Val = i32;
    type PrivData = ();
    fn hash(&self, _: &String) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(Dict::with_config(Colliding, (), enabled()), &pool, ops)?;
    }
}

// Resize disabled: growth only through the force ratio.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_forced_growth_keeps_load_bounded(n in 1usize..600, ratio in 1usize..8) {
        let config = DictConfig::default()
            .with_resize(ResizePolicy::Disabled)
            .with_force_resize_ratio(ratio);
        let mut d = Dict::with_config(StringKeys::<usize>::new(), (), config);
        for i in 0..n {
            d.add(format!("k{i}"), i).unwrap();
            while d.rehash(100) {}
            prop_assert!(d.len() <= (ratio + 1) * d.table_size(0));
        }
    }
}
