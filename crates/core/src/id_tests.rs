// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// --- define_numeric_id! macro tests ---

crate::define_numeric_id! {
    /// Test ID type for macro verification.
    pub struct TestId(u32);
}

#[test]
fn define_numeric_id_new_and_get() {
    let id = TestId::new(42);
    assert_eq!(id.get(), 42);
}

#[test]
fn define_numeric_id_display() {
    let id = TestId::new(7);
    assert_eq!(format!("{}", id), "7");
    assert_eq!(id.to_string(), "7");
}

#[test]
fn define_numeric_id_from_repr() {
    let id: TestId = 99u32.into();
    assert_eq!(id.get(), 99);
}

#[test]
fn define_numeric_id_clone_copy_eq() {
    let id = TestId::new(5);
    let copied = id;
    assert_eq!(id, copied);
}

#[test]
fn define_numeric_id_ord() {
    assert!(TestId::new(1) < TestId::new(2));
}

#[test]
fn define_numeric_id_serde_roundtrip() {
    let id = TestId::new(123);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "123");
    let deserialized: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, id);
}

#[test]
fn define_numeric_id_hash_map_lookup() {
    use std::collections::HashMap;
    let mut map = HashMap::new();
    map.insert(TestId::new(3), "three");
    assert_eq!(map.get(&TestId::new(3)), Some(&"three"));
}

// --- short() tests ---

#[test]
fn define_id_short_truncates() {
    assert_eq!("abcdefghijklmnop".short(8), "abcdefgh");
}

#[test]
fn define_id_short_returns_full_when_shorter() {
    assert_eq!("abc".short(8), "abc");
}

#[test]
fn define_id_short_returns_full_when_exact() {
    assert_eq!("abcdefgh".short(8), "abcdefgh");
}

// --- SeqnumGen tests ---

#[test]
fn seqnum_gen_is_monotonic() {
    let gen = SeqnumGen::new();
    let a = gen.next();
    let b = gen.next();
    let c = gen.next();
    assert!(a < b);
    assert!(b < c);
}

#[test]
fn seqnum_gen_is_cloneable_and_shared() {
    let gen1 = SeqnumGen::new();
    let gen2 = gen1.clone();
    let a = gen1.next();
    let b = gen2.next();
    assert!(a < b);
}
