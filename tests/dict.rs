// Dict scenario suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Uniqueness: add on a present key fails without changing the entry.
// - Counting: len() == adds - deletes for any sequence of CRUD calls.
// - Rehash transparency: lookups succeed regardless of rehash progress.
// - Growth: the 5th insert into a 4-bucket table starts a rehash.
// - Descriptors: private data and destructors flow through every removal.
use rehash_dict::{
    AddRaw, CaseInsensitiveKeys, Dict, DictConfig, DictError, DictType, HashedKeys, ResizePolicy,
    StringKeys, Value,
};
use std::cell::RefCell;
use std::rc::Rc;

fn s(k: &str) -> String {
    k.to_string()
}

fn enabled() -> DictConfig {
    DictConfig::default().with_resize(ResizePolicy::Enabled)
}

// Test: add/replace/delete walkthrough.
// Assumes: add rejects duplicates; replace overwrites.
// Verifies: values and len after each step; a deleted key is gone.
#[test]
fn add_replace_delete_scenario() {
    let mut d = Dict::with_config(StringKeys::<i32>::new(), (), enabled());
    d.add(s("a"), 1).unwrap();
    d.add(s("b"), 2).unwrap();
    assert_eq!(d.add(s("a"), 3), Err(DictError::KeyExists));
    assert_eq!(d.fetch_value(&s("a")), Some(&1));

    assert!(!d.replace(s("a"), 3));
    assert_eq!(d.fetch_value(&s("a")), Some(&3));
    assert_eq!(d.len(), 2);

    d.delete(&s("b")).unwrap();
    assert_eq!(d.len(), 1);
    assert!(d.find(&s("b")).is_none());
}

// Test: explicit resize followed by timed rehashing.
// Assumes: resize rounds up to a power of two.
// Verifies: target table of 1024 while rehashing; after enough timed
// steps only the primary table remains at 1024.
#[test]
fn resize_then_timed_rehash() {
    let mut d = Dict::with_config(StringKeys::<i32>::new(), (), enabled());
    d.add(s("a"), 1).unwrap();
    d.add(s("b"), 2).unwrap();
    d.resize(1000).unwrap();
    assert!(d.is_rehashing());
    assert_eq!(d.table_size(1), 1024);

    while d.is_rehashing() {
        d.rehash_milliseconds(1);
    }
    assert_eq!(d.table_size(0), 1024);
    assert_eq!(d.table_size(1), 0);
    assert_eq!(d.slots(), 1024);
    assert_eq!(d.fetch_value(&s("a")), Some(&1));
    assert_eq!(d.fetch_value(&s("b")), Some(&2));
}

// Test: growth trigger.
// Verifies: inserts 1..=4 fit the initial table; the 5th starts a rehash
// into 8 buckets and every key stays reachable.
#[test]
fn fifth_insert_triggers_expansion() {
    let mut d = Dict::with_config(StringKeys::<i32>::new(), (), enabled());
    for (i, k) in ["w", "x", "y", "z"].iter().enumerate() {
        d.add(s(k), i as i32).unwrap();
        assert!(!d.is_rehashing());
    }
    d.add(s("v"), 4).unwrap();
    assert_eq!(d.len(), 5);
    assert!(d.is_rehashing());
    assert_eq!(d.table_size(1), 8);
    for k in ["v", "w", "x", "y", "z"] {
        assert!(d.find(&s(k)).is_some());
    }
}

// Test: double delete.
// Verifies: the second delete reports KeyNotFound and changes nothing.
#[test]
fn delete_twice_reports_not_found() {
    let mut d = Dict::with_config(StringKeys::<i32>::new(), (), enabled());
    d.add(s("k"), 1).unwrap();
    d.add(s("j"), 2).unwrap();
    assert_eq!(d.delete(&s("k")), Ok(()));
    assert_eq!(d.delete(&s("k")), Err(DictError::KeyNotFound));
    assert_eq!(d.delete(&s("k")), Err(DictError::KeyNotFound));
    assert_eq!(d.len(), 1);
    assert_eq!(d.fetch_value(&s("j")), Some(&2));
}

// Test: counting under a long deterministic workload.
// Verifies: len() tracks adds minus deletes and every live key is found
// after each batch, through several expansions.
#[test]
fn len_tracks_adds_minus_deletes() {
    let mut d = Dict::with_config(StringKeys::<u64>::new(), (), enabled());
    let mut live = std::collections::BTreeSet::new();
    let mut x = 1u64;
    for round in 0..5000u64 {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        let k = format!("k{}", (x >> 33) % 700);
        if round % 3 == 2 {
            let res = d.delete(&k);
            assert_eq!(res.is_ok(), live.remove(&k));
        } else {
            let res = d.add(k.clone(), round);
            assert_eq!(res.is_ok(), live.insert(k));
        }
        assert_eq!(d.len(), live.len());
    }
    for k in &live {
        assert!(d.contains_key(k), "{k} lost");
    }
}

// Test: raw insertion with scalar values.
// Verifies: add_raw leaves Value::Empty for the caller to fill, and the
// scalar setters round-trip through lookup.
#[test]
fn add_raw_with_scalar_values() {
    let mut d = Dict::with_config(StringKeys::<()>::new(), (), enabled());
    let counter = match d.add_raw(s("hits")) {
        AddRaw::New(id) => id,
        AddRaw::Existing(_) => panic!("fresh key reported existing"),
    };
    assert_eq!(counter.value(&d), Some(&Value::Empty));
    d.entry_mut(counter).unwrap().set_u64_val(41);
    let e = d.entry_mut(counter).unwrap();
    let n = e.value().as_u64().unwrap();
    e.set_u64_val(n + 1);
    assert_eq!(d.get(&s("hits")).unwrap().value().as_u64(), Some(42));

    let id = d.replace_raw(s("ratio"));
    d.entry_mut(id).unwrap().set_f64_val(0.5);
    assert_eq!(d.replace_raw(s("ratio")), id);
    assert_eq!(id.value(&d).and_then(Value::as_f64), Some(0.5));
}

// Test: case-insensitive command table.
// Verifies: lookups match regardless of ASCII case; the stored key keeps
// the spelling it was added with.
#[test]
fn case_insensitive_lookup() {
    let mut d = Dict::with_config(CaseInsensitiveKeys::<u8>::new(), (), enabled());
    d.add(s("GET"), 1).unwrap();
    d.add(s("Set"), 2).unwrap();
    assert_eq!(d.add(s("get"), 3), Err(DictError::KeyExists));
    assert_eq!(d.fetch_value(&s("gEt")), Some(&1));
    assert_eq!(d.get(&s("SET")).map(|e| e.key().as_str()), Some("Set"));
}

// Test: generic keys.
// Verifies: HashedKeys works for any Hash + Eq key across expansions.
#[test]
fn hashed_keys_with_integer_keys() {
    let mut d = Dict::with_config(HashedKeys::<u64, u64>::new(), (), enabled());
    for i in 0..1000 {
        d.add(i, i * i).unwrap();
    }
    while d.rehash(100) {}
    assert_eq!(d.table_size(0), 1024);
    for i in 0..1000 {
        assert_eq!(d.get(&i).and_then(|e| e.val()), Some(&(i * i)));
    }
}

// Descriptor whose private data counts live values.
struct Counted;
impl DictType for Counted {
    type Key = String;
    type Val = String;
    type PrivData = Rc<RefCell<isize>>;

    fn hash(&self, key: &String) -> u64 {
        rehash_dict::gen_hash_function(key.as_bytes()) as u64
    }
    fn val_dup(&self, live: &Self::PrivData, val: String) -> String {
        *live.borrow_mut() += 1;
        val
    }
    fn val_destructor(&self, live: &Self::PrivData, _: String) {
        *live.borrow_mut() -= 1;
    }
}

// Test: destructor accounting.
// Assumes: val_dup runs on every stored value, val_destructor on every
// value the dictionary discards.
// Verifies: replace, delete, delete_no_free, empty and drop keep the
// count balanced.
#[test]
fn value_lifecycle_is_balanced() {
    let live = Rc::new(RefCell::new(0isize));
    let mut d = Dict::new(Counted, live.clone());
    for i in 0..20 {
        d.add(format!("k{i}"), format!("v{i}")).unwrap();
    }
    assert_eq!(*live.borrow(), 20);

    d.replace(s("k0"), s("new"));
    assert_eq!(*live.borrow(), 20);

    d.delete(&s("k1")).unwrap();
    assert_eq!(*live.borrow(), 19);

    // Ownership moves out; the caller now accounts for it.
    let (_, v) = d.delete_no_free(&s("k2")).unwrap();
    assert_eq!(v.as_ptr().map(String::as_str), Some("v2"));
    assert_eq!(*live.borrow(), 19);
    assert_eq!(d.len(), 18);

    // The 18 remaining values are destroyed; v2 is still ours.
    d.empty(None);
    assert_eq!(*live.borrow(), 1);
    assert!(d.is_empty());

    d.add(s("again"), s("x")).unwrap();
    assert_eq!(*live.borrow(), 2);
    drop(d);
    assert_eq!(*live.borrow(), 1);
}
