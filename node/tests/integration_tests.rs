//! End-to-end scenarios driving the node worker through its public handle,
//! with deterministic time, in-memory storage and scripted peers.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use weave_gossip::{NoPeers, PeerId, PeerSource};
use weave_ledger::{Block, BlockIndex, Transaction, WalletEntry, WalletList};
use weave_node::memory::{FixedMemory, MemoryMonitor, UnlimitedMemory};
use weave_node::miner::build_candidate;
use weave_node::{Ack, Event, NodeConfig, WeaveNode};
use weave_nullables::{NullClock, ScriptedPeers};
use weave_store::{BlockStore, MemStore, WalletStore};
use weave_types::{
    Address, Clock, ProtocolParams, RewardAddress, Timestamp, TxId, Winston,
};
use weave_work::WorkGenerator;

const GENESIS_TS: u64 = 1_000_000;

fn test_config(seed: u64) -> NodeConfig {
    NodeConfig {
        rng_seed: Some(seed),
        initial_diff: 1,
        ..NodeConfig::default()
    }
}

fn params() -> ProtocolParams {
    ProtocolParams::default()
}

/// A wallet list with one funded owner keyed by `owner_byte`.
fn funded_wallets(owner_byte: u8, balance: u128) -> (WalletList, Address) {
    let probe = data_tx(owner_byte, b"probe", 0);
    let owner = probe.owner_address();
    let mut wallets = WalletList::new();
    wallets.insert(
        owner,
        WalletEntry {
            balance: Winston::new(balance),
            last_tx: TxId::ZERO,
        },
    );
    (wallets, owner)
}

fn data_tx(owner_byte: u8, data: &[u8], reward: u128) -> Transaction {
    Transaction::prepare(
        vec![owner_byte; 64],
        TxId::ZERO,
        Address::ZERO,
        Winston::ZERO,
        data.to_vec(),
        Winston::new(reward),
        Vec::new(),
    )
}

struct Harness {
    node: WeaveNode,
    store: Arc<MemStore>,
    clock: Arc<NullClock>,
}

fn spawn_node(
    config: NodeConfig,
    peers: Arc<dyn PeerSource>,
    memory: Arc<dyn MemoryMonitor>,
) -> Harness {
    let store = Arc::new(MemStore::new());
    let clock = Arc::new(NullClock::new(GENESIS_TS + 100));
    let node = WeaveNode::spawn(
        &config,
        params(),
        store.clone(),
        peers,
        clock.clone(),
        memory,
    )
    .expect("node spawns");
    Harness { node, store, clock }
}

/// Adopt a single-block chain so the node is joined.
async fn join_with_genesis(harness: &Harness, genesis: &Block, wallets: &WalletList) {
    harness
        .store
        .write_wallet_list(&genesis.wallet_root, wallets)
        .unwrap();
    let ack = harness
        .node
        .replace_block_index(vec![genesis.clone()])
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("replace_block_index"));
}

/// Push a no-op synchronous event through the queue so everything posted
/// before it has been handled.
async fn flush(node: &WeaveNode) {
    node.call(Event::Ignore([0xEE; 32])).await.unwrap();
}

async fn wait_for_joined_height(node: &WeaveNode, height: u64) {
    for _ in 0..500 {
        let snapshot = node.snapshot();
        if snapshot.chain.is_joined() && snapshot.height == height {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for height {height}");
}

/// Mine a valid successor for `prev` outside the node.
fn mine_successor(
    prev: &Block,
    txs: &[Transaction],
    wallets: &WalletList,
    recall: &Block,
    timestamp: u64,
    reward_addr: RewardAddress,
) -> (Block, WalletList) {
    let (mut candidate, confirmed) = build_candidate(
        &params(),
        prev,
        txs,
        wallets,
        &reward_addr,
        Vec::new(),
        recall,
        Timestamp::new(timestamp),
        None,
    )
    .unwrap();
    let cancel = AtomicBool::new(false);
    candidate.nonce = WorkGenerator
        .generate(
            &candidate.indep_hash,
            &recall.indep_hash,
            candidate.diff,
            &cancel,
            None,
        )
        .unwrap()
        .0;
    (candidate, confirmed)
}

/// Build a chain of `len` blocks (tip first) with its per-block wallet lists.
fn build_chain(len: usize, wallets0: &WalletList) -> (Vec<Block>, Vec<WalletList>) {
    let genesis = Block::genesis(wallets0, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    let mut blocks = vec![genesis.clone()];
    let mut wallet_lists = vec![wallets0.clone()];
    let mut index = BlockIndex::from_blocks(&[genesis]);

    for h in 1..len {
        let prev = blocks.last().unwrap().clone();
        let recall_entry = *index.recall_entry(&prev.indep_hash).unwrap();
        let recall = blocks
            .iter()
            .find(|b| b.indep_hash == recall_entry.indep_hash)
            .unwrap()
            .clone();
        let (block, wallets) = mine_successor(
            &prev,
            &[],
            wallet_lists.last().unwrap(),
            &recall,
            GENESIS_TS + h as u64 * 10,
            RewardAddress::Unclaimed,
        );
        index.push_tip(weave_ledger::BlockIndexEntry::from_block(&block));
        blocks.push(block);
        wallet_lists.push(wallets);
    }

    blocks.reverse();
    wallet_lists.reverse();
    (blocks, wallet_lists)
}

// ── S1: propagation delay ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tx_waits_out_its_propagation_delay() {
    let harness = spawn_node(test_config(1), Arc::new(NoPeers), Arc::new(UnlimitedMemory));
    let (wallets, owner) = funded_wallets(1, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    let tx = data_tx(1, b"", 10);
    let ack = harness.node.add_tx(tx.clone()).await.unwrap();
    assert_eq!(ack, Ack::Ok("add_waiting_tx"));

    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.waiting_txs.len(), 1);
    assert!(snapshot.txs.is_empty());

    // Zero data size: the delay is exactly the 30 s base.
    tokio::time::sleep(Duration::from_millis(30_001)).await;
    flush(&harness.node).await;

    let snapshot = harness.node.snapshot();
    assert!(snapshot.waiting_txs.is_empty());
    assert_eq!(snapshot.txs.len(), 1);
    assert_eq!(snapshot.txs[0].id, tx.id);
    assert_eq!(
        snapshot.floating_wallet_list.balance(&owner),
        Winston::new(990)
    );
    assert!(snapshot.pools_disjoint());
}

#[tokio::test(start_paused = true)]
async fn tx_is_not_promoted_early() {
    let harness = spawn_node(test_config(2), Arc::new(NoPeers), Arc::new(UnlimitedMemory));
    let (wallets, _) = funded_wallets(2, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    harness.node.add_tx(data_tx(2, b"", 10)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(29_000)).await;
    flush(&harness.node).await;
    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.waiting_txs.len(), 1);
    assert!(snapshot.txs.is_empty());
}

// ── S2: conflicts ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn conflicting_tx_routed_to_potential_with_diagnostics() {
    let harness = spawn_node(test_config(3), Arc::new(NoPeers), Arc::new(UnlimitedMemory));
    let (wallets, _) = funded_wallets(3, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    // Same owner, same last_tx, different payloads → different ids.
    let first = data_tx(3, b"first", 10);
    let second = data_tx(3, b"second", 10);

    assert_eq!(
        harness.node.add_tx(first.clone()).await.unwrap(),
        Ack::Ok("add_waiting_tx")
    );
    assert_eq!(
        harness.node.add_tx(second.clone()).await.unwrap(),
        Ack::Ok("add_potential_tx")
    );

    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.waiting_txs.len(), 1);
    assert_eq!(snapshot.potential_txs.len(), 1);
    assert_eq!(snapshot.potential_txs[0].id, second.id);
    assert_eq!(
        harness.node.diagnostics().get(&second.id),
        Some("last_tx_not_valid")
    );
    assert!(snapshot.pools_disjoint());
}

// ── Memory pressure ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn low_memory_drops_waiting_tx() {
    // 1 KiB payload needs > 4 KiB free; give exactly 4 KiB.
    let harness = spawn_node(test_config(4), Arc::new(NoPeers), Arc::new(FixedMemory(4096)));
    let (wallets, _) = funded_wallets(4, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    harness.node.add_tx(data_tx(4, &[0u8; 1024], 10)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;
    flush(&harness.node).await;

    let snapshot = harness.node.snapshot();
    assert!(snapshot.waiting_txs.is_empty());
    assert!(snapshot.txs.is_empty());
    assert!(snapshot.potential_txs.is_empty());
}

// ── S3: accept the next block ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn next_block_is_validated_and_integrated() {
    let harness = spawn_node(test_config(5), Arc::new(NoPeers), Arc::new(UnlimitedMemory));
    let (wallets, _) = funded_wallets(5, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::new(100));
    join_with_genesis(&harness, &genesis, &wallets).await;

    let reward_addr = RewardAddress::Wallet(Address::new([0x77; 32]));
    let (block, confirmed) = mine_successor(
        &genesis,
        &[],
        &wallets,
        &genesis,
        GENESIS_TS + 60,
        reward_addr,
    );

    let ack = harness
        .node
        .process_block(None, block.clone(), Some(genesis.clone()), None)
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("process_new_block"));

    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.height, 1);
    assert_eq!(snapshot.tip_hash(), Some(block.indep_hash));
    assert_eq!(snapshot.reward_pool, block.reward_pool);
    assert_eq!(snapshot.wallet_list, confirmed);
    assert!(snapshot.potential_txs.is_empty());
    assert!(harness.store.has_block(&block.indep_hash).unwrap());
}

// ── S4: lower blocks only touch the gossip cursor ───────────────────────

#[tokio::test(start_paused = true)]
async fn block_at_or_below_height_is_ignored() {
    let harness = spawn_node(test_config(6), Arc::new(NoPeers), Arc::new(UnlimitedMemory));
    let (wallets, _) = funded_wallets(6, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    let (block, _) = mine_successor(
        &genesis,
        &[],
        &wallets,
        &genesis,
        GENESIS_TS + 60,
        RewardAddress::Unclaimed,
    );
    harness
        .node
        .process_block(None, block.clone(), Some(genesis.clone()), None)
        .await
        .unwrap();

    let before = harness.node.snapshot();

    // Re-announcing the genesis block (height 0 ≤ ours) must not change
    // anything but the gossip cursor.
    let ack = harness
        .node
        .process_block(None, genesis.clone(), None, None)
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("ignore_old_block"));

    let after = harness.node.snapshot();
    assert_eq!(after.height, before.height);
    assert_eq!(after.wallet_list, before.wallet_list);
    assert_eq!(after.txs.len(), before.txs.len());
    assert_eq!(after.reward_pool, before.reward_pool);
    assert_eq!(after.tip_hash(), before.tip_hash());
}

// ── S5: a gap triggers fork recovery ────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn chain_gap_starts_fork_recovery_and_adopts_longer_chain() {
    let peers = Arc::new(ScriptedPeers::new());
    let harness = spawn_node(test_config(7), peers.clone(), Arc::new(UnlimitedMemory));

    let (wallets0, _) = funded_wallets(7, 1000);
    let (chain, wallet_lists) = build_chain(4, &wallets0);
    let genesis = chain.last().unwrap().clone();

    // We sit at genesis; the peer has height 3.
    join_with_genesis(&harness, &genesis, wallet_lists.last().unwrap()).await;

    let peer = PeerId::new("10.0.0.9:1984");
    peers.serve_chain(peer.clone(), chain.clone(), Vec::new(), wallet_lists.clone());

    let tip = chain.first().unwrap().clone();
    let ack = harness
        .node
        .process_block(Some(peer), tip.clone(), None, None)
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("fork_recovery"));

    // State is untouched until ForkRecovered arrives and is adopted.
    wait_for_joined_height(&harness.node, 3).await;
    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.tip_hash(), Some(tip.indep_hash));
    assert_eq!(snapshot.wallet_list, wallet_lists[0]);
    assert!(harness.store.has_block(&tip.indep_hash).unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn not_joined_node_joins_from_a_peer() {
    let peers = Arc::new(ScriptedPeers::new());
    let harness = spawn_node(test_config(8), peers.clone(), Arc::new(UnlimitedMemory));

    let (wallets0, _) = funded_wallets(8, 1000);
    let (chain, wallet_lists) = build_chain(3, &wallets0);
    let peer = PeerId::new("10.0.0.10:1984");
    peers.serve_chain(peer.clone(), chain.clone(), Vec::new(), wallet_lists.clone());

    assert!(!harness.node.snapshot().chain.is_joined());

    let tip = chain.first().unwrap().clone();
    let ack = harness
        .node
        .process_block(Some(peer), tip.clone(), None, None)
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("joining"));

    wait_for_joined_height(&harness.node, 2).await;
    assert_eq!(harness.node.snapshot().tip_hash(), Some(tip.indep_hash));
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_toward_unavailable_peer_leaves_state_unchanged() {
    let harness = spawn_node(test_config(9), Arc::new(ScriptedPeers::new()), Arc::new(UnlimitedMemory));
    let (wallets, _) = funded_wallets(9, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    // A block far ahead from a peer nobody scripted.
    let mut phantom = genesis.clone();
    phantom.height = 10;
    phantom.seal();
    let ack = harness
        .node
        .process_block(Some(PeerId::new("10.9.9.9:1984")), phantom, None, None)
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("fork_recovery"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.height, 0);
    assert_eq!(snapshot.tip_hash(), Some(genesis.indep_hash));
}

// ── S6: invalid mined block ─────────────────────────────────────────────

async fn run_bad_mined_block(seed: u64) -> (bool, usize, usize) {
    let harness = spawn_node(
        NodeConfig {
            fixed_propagation_delay_ms: Some(0),
            ..test_config(seed)
        },
        Arc::new(NoPeers),
        Arc::new(UnlimitedMemory),
    );
    let (wallets, _) = funded_wallets(10, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    harness.node.add_tx(data_tx(10, b"pooled", 10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    flush(&harness.node).await;
    assert_eq!(harness.node.snapshot().txs.len(), 1);

    // A nonsense mining result: difficulty 40 never matches the expected
    // retarget, so validation rejects the candidate.
    let ack = harness
        .node
        .call(Event::WorkComplete {
            txs: Vec::new(),
            diff: 40,
            nonce: 3,
            timestamp: harness.clock.now(),
        })
        .await
        .unwrap();
    assert_eq!(ack, Ack::Ok("work_rejected"));

    let snapshot = harness.node.snapshot();
    let wiped = snapshot.txs.is_empty();
    (wiped, snapshot.txs.len(), snapshot.potential_txs.len())
}

#[tokio::test(start_paused = true)]
async fn bad_mined_block_wipes_pools_with_probability_one_fifth() {
    for seed in [11u64, 12, 13, 14] {
        let expected_wipe = StdRng::seed_from_u64(seed).gen::<f64>() < 0.2;
        let (wiped, active, potential) = run_bad_mined_block(seed).await;
        assert_eq!(
            wiped, expected_wipe,
            "seed {seed}: wipe outcome must follow the worker's RNG"
        );
        if wiped {
            assert_eq!((active, potential), (0, 0));
        } else {
            assert_eq!(active, 1);
        }
    }
}

// ── Mining end-to-end ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn mine_produces_and_integrates_a_block() {
    let harness = spawn_node(
        NodeConfig {
            fixed_propagation_delay_ms: Some(0),
            reward_addr: Some("cd".repeat(32)),
            ..test_config(15)
        },
        Arc::new(NoPeers),
        Arc::new(UnlimitedMemory),
    );
    let (wallets, owner) = funded_wallets(11, 1000);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    harness.node.add_tx(data_tx(11, b"archive", 25)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    flush(&harness.node).await;
    assert_eq!(harness.node.snapshot().txs.len(), 1);

    let ack = harness.node.mine().await.unwrap();
    assert_eq!(ack, Ack::Ok("mining"));

    wait_for_joined_height(&harness.node, 1).await;
    let snapshot = harness.node.snapshot();
    // The pooled tx was confirmed: owner paid the fee, pools rotated.
    assert_eq!(snapshot.wallet_list.balance(&owner), Winston::new(975));
    assert!(snapshot.txs.is_empty());
    assert!(snapshot.potential_txs.is_empty());
    assert_eq!(
        snapshot.floating_wallet_list, snapshot.wallet_list,
        "floating list equals confirmed list when no txs are active"
    );
    assert_eq!(snapshot.weave_size, 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn mining_while_not_joined_is_rejected_and_worker_survives() {
    let harness = spawn_node(test_config(16), Arc::new(NoPeers), Arc::new(UnlimitedMemory));

    let ack = harness.node.mine().await.unwrap();
    assert!(matches!(ack, Ack::Rejected(_)));

    // The worker keeps serving events.
    let ack = harness.node.set_mining_delay(5).await.unwrap();
    assert_eq!(ack, Ack::Ok("set_mining_delay"));
    assert_eq!(harness.node.snapshot().mining_delay_ms, 5);
}

// ── Configuration events ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn configuration_events_update_state() {
    let harness = spawn_node(test_config(17), Arc::new(NoPeers), Arc::new(UnlimitedMemory));

    let addr = Address::new([0x42; 32]);
    assert_eq!(
        harness.node.set_reward_addr(RewardAddress::Wallet(addr)).await.unwrap(),
        Ack::Ok("set_reward_addr")
    );
    assert_eq!(
        harness.node.set_loss_probability(0.5).await.unwrap(),
        Ack::Ok("set_loss_probability")
    );
    assert!(matches!(
        harness.node.set_loss_probability(1.5).await.unwrap(),
        Ack::Rejected(_)
    ));
    assert_eq!(
        harness.node.set_delay(250).await.unwrap(),
        Ack::Ok("set_delay")
    );
    assert_eq!(
        harness.node.set_xfer_speed(1_000_000).await.unwrap(),
        Ack::Ok("set_xfer_speed")
    );
    assert_eq!(
        harness
            .node
            .add_peers(vec![PeerId::new("10.0.0.1:1984")])
            .await
            .unwrap(),
        Ack::Ok("add_peers")
    );

    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.reward_addr, RewardAddress::Wallet(addr));
    assert_eq!(snapshot.gossip.loss_probability(), 0.5);
    assert_eq!(snapshot.gossip.delay_ms(), 250);
    assert_eq!(snapshot.gossip.peer_count(), 1);
}

// ── Universal invariants over event sequences ───────────────────────────

#[tokio::test(start_paused = true)]
async fn pools_stay_disjoint_and_floating_list_consistent() {
    let harness = spawn_node(
        NodeConfig {
            fixed_propagation_delay_ms: Some(0),
            ..test_config(18)
        },
        Arc::new(NoPeers),
        Arc::new(UnlimitedMemory),
    );
    let (wallets, _) = funded_wallets(12, 500);
    let genesis = Block::genesis(&wallets, Timestamp::new(GENESIS_TS), 1, Winston::ZERO);
    join_with_genesis(&harness, &genesis, &wallets).await;

    // A mix of independent, conflicting and unaffordable transactions.
    let batch = vec![
        data_tx(12, b"a", 100),
        data_tx(12, b"b", 100), // conflicts with "a" (same owner, last_tx)
        data_tx(13, b"c", 50),  // unfunded owner → evicted at promotion
        data_tx(12, b"d", 100), // conflicts again
    ];

    for tx in batch {
        harness.node.add_tx(tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        flush(&harness.node).await;

        let snapshot = harness.node.snapshot();
        assert!(snapshot.pools_disjoint(), "pools must stay pairwise disjoint");
        let recomputed = snapshot
            .wallet_list
            .apply_txs(&snapshot.txs)
            .expect("active txs always apply");
        assert_eq!(
            snapshot.floating_wallet_list, recomputed,
            "floating list must equal wallet list + active txs"
        );
    }

    let snapshot = harness.node.snapshot();
    assert_eq!(snapshot.txs.len(), 1);
    assert_eq!(snapshot.potential_txs.len(), 3);
}
