//! Multi-wallet payment scenarios against one in-memory node.
//!
//! Fee base is 1 throughout, so a one-input send with change costs
//! `4·2 + 1 − 1 = 8` and without change `4·1 + 1 − 1 = 4`.

use std::sync::Arc;

use beryl_core::memory_node::InMemoryNode;
use beryl_core::traits::NodeClient;
use beryl_tests::helpers::*;
use beryl_wallet::{
    OutputStatus, OwnerApi, SelectionStrategy, SlateStage, TxDirection, TxStatus, WalletError,
};

#[test]
fn payment_chain_across_three_wallets() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    let carol = TestWallet::open(&node, 3);
    alice.fund(&node, 0, 1_000);

    let first = send_and_confirm(&node, &alice.session, &bob.session, 300, 2);
    assert_eq!(first.fee, 8);
    assert_eq!(alice.session.balance().spendable, 692);
    assert_eq!(bob.session.balance().spendable, 300);

    // Bob spends what he just received.
    let second = send_and_confirm(&node, &bob.session, &carol.session, 100, 2);
    assert_eq!(bob.session.balance().total, 192);
    assert_eq!(carol.session.balance().total, 100);

    let bob_log = bob.session.retrieve_txs(false).1;
    let received = bob_log.iter().find(|e| e.slate_id == first.id).unwrap();
    let sent = bob_log.iter().find(|e| e.slate_id == second.id).unwrap();
    assert_eq!(received.direction, TxDirection::Received);
    assert_eq!(sent.direction, TxDirection::Sent);
    assert!(bob_log.iter().all(|e| e.status == TxStatus::Confirmed));

    // Coins are conserved up to fees.
    let total: u64 = [&alice, &bob, &carol].iter().map(|w| w.session.balance().total).sum();
    assert_eq!(total, 1_000 - 8 - 8);
}

#[test]
fn cancelled_send_frees_outputs_for_the_next_one() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    alice.fund(&node, 0, 500);

    let abandoned = alice.session.initiate(200, SelectionStrategy::SmallestFirst).unwrap();
    let err = alice.session.initiate(100, SelectionStrategy::SmallestFirst).unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { available: 0, .. }));

    alice.session.cancel(&abandoned.id).unwrap();
    let b = alice.session.balance();
    assert_eq!((b.spendable, b.locked, b.unconfirmed), (500, 0, 0));

    send_and_confirm(&node, &alice.session, &bob.session, 100, 2);
    assert_eq!(alice.session.balance().total, 392);

    let log = alice.session.retrieve_txs(false).1;
    let cancelled = log.iter().find(|e| e.slate_id == abandoned.id).unwrap();
    assert_eq!(cancelled.status, TxStatus::Cancelled);
    // Finishing the cancelled exchange is refused.
    let late = bob.session.receive(&abandoned, None).unwrap();
    assert!(alice.session.finalize(&late).is_err());
}

#[test]
fn exchange_survives_sender_restart() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    alice.fund(&node, 0, 500);

    let slate = alice.session.initiate(150, SelectionStrategy::SmallestFirst).unwrap();
    let alice = alice.reopen(&node);
    assert_eq!(alice.session.balance().locked, 500);

    let signed = bob.session.receive(&slate, Some(150)).unwrap();
    let finalized = alice.session.finalize(&signed).unwrap();
    assert_eq!(finalized.stage, SlateStage::Finalized);
    alice.session.post(&finalized.id).unwrap();
    node.mine_blocks(2);
    alice.session.refresh().unwrap();
    assert_eq!(alice.session.balance().total, 500 - 150 - 8);
}

#[test]
fn receiver_cannot_be_paid_twice_for_one_slate() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    alice.fund(&node, 0, 500);

    let slate = alice.session.initiate(200, SelectionStrategy::SmallestFirst).unwrap();
    bob.session.receive(&slate, Some(200)).unwrap();
    let err = bob.session.receive(&slate, Some(200)).unwrap_err();
    assert!(matches!(err, WalletError::InvalidSlate(_) | WalletError::InvalidTransition(_)));
    assert_eq!(bob.session.balance().unconfirmed, 200);
}

#[test]
fn outside_double_spend_is_reported_and_recoverable() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    alice.fund(&node, 0, 300);
    alice.fund(&node, 1, 400);

    let finalized = exchange(&alice.session, &bob.session, 250);
    assert_eq!(finalized.inputs.len(), 1);
    let spent_input = finalized.inputs[0].commitment;
    node.spend_output(&spent_input);

    let err = alice.session.post(&finalized.id).unwrap_err();
    assert!(matches!(err, WalletError::AlreadySpent(_)));
    alice.session.cancel(&finalized.id).unwrap();

    // The externally spent output drops out once the chain is re-read.
    alice.session.refresh().unwrap();
    let record = alice.session.outputs(true).into_iter().find(|o| o.commitment == spent_input).unwrap();
    assert_eq!(record.status, OutputStatus::Spent);
    assert_eq!(alice.session.balance().spendable, 400);
}

#[test]
fn coinbase_output_matures_before_spending() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);

    let keychain = beryl_wallet::KeyChain::new(&beryl_wallet::Seed::from_entropy(&[1; 32]).unwrap(), 0);
    let (_, reward) = keychain.build_output(&keychain.path(0), 600);
    node.add_output(reward.commitment, reward.proof, true);
    node.mine_blocks(2);
    alice.session.scan_outputs(Default::default(), None).unwrap();
    alice.session.refresh().unwrap();

    let b = alice.session.balance();
    assert_eq!((b.spendable, b.awaiting_confirmation), (0, 600));
    assert!(alice.session.initiate(100, SelectionStrategy::SmallestFirst).is_err());

    // Regtest maturity is 3 blocks.
    node.mine_blocks(1);
    alice.session.refresh().unwrap();
    assert_eq!(alice.session.balance().spendable, 600);
    send_and_confirm(&node, &alice.session, &bob.session, 100, 2);
    assert_eq!(bob.session.balance().total, 100);
}

#[test]
fn use_all_strategy_sweeps_every_output() {
    let node = Arc::new(InMemoryNode::new());
    let alice = TestWallet::open(&node, 1);
    let bob = TestWallet::open(&node, 2);
    for (i, value) in [50, 60, 70].into_iter().enumerate() {
        alice.fund(&node, i as u32, value);
    }

    let previews = alice.session.estimate(40).unwrap();
    assert_eq!(previews.len(), 2);

    let slate = alice.session.initiate(40, SelectionStrategy::UseAll).unwrap();
    assert_eq!(slate.inputs.len(), 3);
    // 4·2 + 1 − 3 = 6
    assert_eq!(slate.fee, 6);
    let signed = bob.session.receive(&slate, Some(40)).unwrap();
    let finalized = alice.session.finalize(&signed).unwrap();
    alice.session.post(&finalized.id).unwrap();
    node.mine_blocks(2);
    alice.session.refresh().unwrap();
    assert_eq!(alice.session.outputs(false).len(), 1);
    assert_eq!(alice.session.balance().total, 180 - 40 - 6);
}

#[test]
fn owner_api_drives_exchange_with_slatepacks() {
    let node = Arc::new(InMemoryNode::new());
    let factory_node = node.clone();
    let api = OwnerApi::new(Box::new(move |_cfg| Ok(factory_node.clone() as Arc<dyn NodeClient>)));

    let alice_dir = tempfile::TempDir::new().unwrap();
    let bob_dir = tempfile::TempDir::new().unwrap();
    let alice_cfg = serde_json::to_string(&test_config(&alice_dir)).unwrap();
    let bob_cfg = serde_json::to_string(&test_config(&bob_dir)).unwrap();
    assert!(api.wallet_init(&alice_cfg, &phrase(1), "pw").success);
    assert!(api.wallet_init(&bob_cfg, &phrase(2), "pw").success);

    let alice: u64 = serde_json::from_str(&api.open_wallet(&alice_cfg, "pw").payload).unwrap();
    let bob: u64 = serde_json::from_str(&api.open_wallet(&bob_cfg, "pw").payload).unwrap();
    assert_ne!(alice, bob);

    let keychain = beryl_wallet::KeyChain::new(&beryl_wallet::Seed::from_entropy(&[1; 32]).unwrap(), 0);
    let (_, out) = keychain.build_output(&keychain.path(0), 1_000);
    node.add_output(out.commitment, out.proof, false);
    node.mine_blocks(2);
    assert!(api.wallet_scan_outputs(alice, 0, None, None).success);

    let created: serde_json::Value = serde_json::from_str(&api.tx_create(alice, 400, "smallest_first").payload).unwrap();
    let slatepack = created["slatepack"].as_str().unwrap();
    let slate_id = created["slate_id"].as_str().unwrap();

    let response: serde_json::Value = serde_json::from_str(&api.tx_receive(bob, slatepack, Some(400)).payload).unwrap();
    let finalized = api.tx_finalize(alice, response["slatepack"].as_str().unwrap());
    assert!(finalized.success, "{}", finalized.payload);
    assert!(api.tx_post(alice, slate_id).success);

    // Posting twice reaches the node twice and is rejected there.
    let again = api.tx_post(alice, slate_id);
    assert!(!again.success);
    node.mine_blocks(2);

    let txs: serde_json::Value = serde_json::from_str(&api.txs_get(bob, true).payload).unwrap();
    assert_eq!(txs["refreshed"], true);
    assert_eq!(txs["balance"]["total"], 400);

    assert!(api.close_wallet(alice).success);
    assert_eq!(api.txs_get(alice, false).error_code().as_deref(), Some("invalid_handle"));
    assert_eq!(api.open_wallet(&bob_cfg, "pw").error_code().as_deref(), Some("wallet_locked"));
}
