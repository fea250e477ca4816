//! Shared sessions under concurrent use, and value conservation under
//! randomized funding.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use beryl_core::memory_node::InMemoryNode;
use beryl_tests::helpers::*;
use beryl_wallet::{SelectionStrategy, Slate, TxStatus, WalletError};
use proptest::prelude::*;

#[test]
fn parallel_sends_lock_disjoint_inputs_and_all_confirm() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = Arc::new(TestWallet::open(&node, 2));
    for i in 0..6 {
        alice.fund(&node, i, 100);
    }
    let alice = Arc::new(alice);

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let (alice, bob) = (alice.clone(), bob.clone());
            thread::spawn(move || -> Result<Slate, WalletError> {
                let slate = alice.session.initiate(50, SelectionStrategy::SmallestFirst)?;
                let signed = bob.session.receive(&slate, Some(50))?;
                let finalized = alice.session.finalize(&signed)?;
                alice.session.post(&finalized.id)?;
                Ok(finalized)
            })
        })
        .collect();
    let slates: Vec<Slate> = workers.into_iter().map(|w| w.join().unwrap().unwrap()).collect();

    let mut inputs = HashSet::new();
    for slate in &slates {
        for input in &slate.inputs {
            assert!(inputs.insert(input.commitment), "input used by two sends");
        }
    }
    assert_eq!(node.pool_size(), 6);

    node.mine_blocks(2);
    alice.session.refresh().unwrap();
    bob.session.refresh().unwrap();
    assert_eq!(bob.session.balance().total, 300);
    // Each send: 100 in, 50 out, fee 8, change 42.
    assert_eq!(alice.session.balance().total, 6 * 42);
    assert!(alice.session.retrieve_txs(false).1.iter().all(|e| e.status == TxStatus::Confirmed));
}

#[test]
fn refresh_racing_with_sends_keeps_ledger_consistent() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    for i in 0..4 {
        alice.fund(&node, i, 200);
    }
    let alice = Arc::new(alice);

    let refresher = {
        let alice = alice.clone();
        let node = node.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                node.mine_blocks(1);
                alice.session.refresh().unwrap();
            }
        })
    };
    let senders: Vec<_> = (0..4)
        .map(|_| {
            let alice = alice.clone();
            thread::spawn(move || alice.session.initiate(120, SelectionStrategy::SmallestFirst).is_ok())
        })
        .collect();
    let started = senders.into_iter().map(|s| s.join()).filter(|r| matches!(r, Ok(true))).count();
    refresher.join().unwrap();

    assert_eq!(started, 4);
    let b = alice.session.balance();
    assert_eq!(b.locked, 800);
    assert_eq!(b.unconfirmed, 4 * (200 - 120 - 8));
    assert_eq!(b.total, b.spendable + b.awaiting_confirmation + b.unconfirmed + b.locked);
}

#[test]
fn concurrent_cancel_is_idempotent() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    alice.fund(&node, 0, 500);
    let alice = Arc::new(alice);
    let slate = alice.session.initiate(100, SelectionStrategy::SmallestFirst).unwrap();

    let cancels: Vec<_> = (0..8)
        .map(|_| {
            let alice = alice.clone();
            let id = slate.id;
            thread::spawn(move || alice.session.cancel(&id))
        })
        .collect();
    for c in cancels {
        c.join().unwrap().unwrap();
    }
    let b = alice.session.balance();
    assert_eq!((b.spendable, b.locked, b.unconfirmed), (500, 0, 0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Selected inputs always cover exactly amount, fee and change, and the
    /// finished transaction validates at the node.
    #[test]
    fn sends_conserve_value(
        values in prop::collection::vec(10u64..2_000, 1..6),
        amount in 1u64..3_000,
    ) {
        let node = Arc::new(InMemoryNode::new());
        let alice = TestWallet::open(&node, 1);
        let bob = TestWallet::open(&node, 2);
        for (i, v) in values.iter().enumerate() {
            alice.fund(&node, i as u32, *v);
        }
        let funded: u64 = values.iter().sum();

        match alice.session.initiate(amount, SelectionStrategy::SmallestFirst) {
            Err(WalletError::InsufficientFunds { available, .. }) => {
                prop_assert_eq!(available, funded);
                prop_assert_eq!(alice.session.balance().spendable, funded);
            }
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
            Ok(slate) => {
                let b = alice.session.balance();
                let spent: u64 = alice
                    .session
                    .outputs(false)
                    .iter()
                    .filter(|o| slate.inputs.iter().any(|i| i.commitment == o.commitment))
                    .map(|o| o.value)
                    .sum();
                prop_assert_eq!(spent, b.locked);
                prop_assert_eq!(spent, amount + slate.fee + b.unconfirmed);

                let signed = bob.session.receive(&slate, Some(amount)).unwrap();
                let finalized = alice.session.finalize(&signed).unwrap();
                prop_assert!(finalized.to_transaction().unwrap().validate().is_ok());
                alice.session.post(&finalized.id).unwrap();
                node.mine_blocks(2);
                alice.session.refresh().unwrap();
                prop_assert_eq!(alice.session.balance().total, funded - amount - slate.fee);
            }
        }
    }
}
