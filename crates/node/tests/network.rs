//! Nodes talking to each other over the in-process peer substrate.

use std::{sync::Arc, time::Duration};

use assert_matches::assert_matches;
use libp2p::{Multiaddr, PeerId, identity::Keypair};
use shardline_api::{LocalChunkStore, PeerNetwork, PeerRequests};
use shardline_net_proto::{
    P2PRequest, P2PResponse, SignedRequest, read_response, write_request,
};
use shardline_node::{NodeConfig, ShardNode};
use shardline_primitives::{ChunkKey, DhtId, NodeRole};
use shardline_storage::MemoryChunkStore;
use shardline_tasks::TaskManager;
use shardline_test_utils::{
    MockChainLog, SimHub, SimNetwork, SimStream, bodies_for, chunk_key, chunk_record,
};

struct TestNode {
    peer: PeerId,
    network: Arc<SimNetwork>,
    store: Arc<MemoryChunkStore>,
    node: ShardNode<MockChainLog, MemoryChunkStore, SimNetwork>,
}

fn testnet() -> NodeConfig {
    NodeConfig {
        testnet: true,
        ..Default::default()
    }
}

fn spawn_node(
    hub: &Arc<SimHub>,
    network: Arc<SimNetwork>,
    config: NodeConfig,
    manager: &TaskManager,
) -> TestNode {
    let peer = network.local_peer_id();
    let chain = Arc::new(MockChainLog::new().with_last_height(100).with_chunks(0..=20));
    let store = Arc::new(MemoryChunkStore::new());
    let node = ShardNode::launch(
        config,
        chain,
        store.clone(),
        network.clone(),
        &manager.executor(),
    )
    .unwrap();
    hub.register(peer, Arc::new(node.stream_handler::<SimStream>()));
    TestNode {
        peer,
        network,
        store,
        node,
    }
}

/// Run a sync check on every node, then rebuild their routing tables.
async fn settle(nodes: &[&TestNode]) {
    for node in nodes {
        node.node.monitor.is_sync().await.unwrap();
    }
    // Let refreshes started at launch finish before the final one.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for node in nodes {
        node.node
            .routing
            .refresh(node.network.as_ref(), node.node.client.as_ref())
            .await;
    }
}

/// A chunk key nearer to `closer` than to `farther`.
fn key_nearer(closer: PeerId, farther: PeerId) -> ChunkKey {
    (0u32..)
        .map(|i| ChunkKey::new(format!("chunk-{i}").into_bytes(), 10, 19))
        .find(|key| {
            let target = key.dht_id();
            DhtId::from_peer(&closer).distance(&target)
                < DhtId::from_peer(&farther).distance(&target)
        })
        .unwrap()
}

async fn wait_for_len(store: &MemoryChunkStore, len: usize) {
    for _ in 0..200 {
        if store.len() == len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store holds {} chunks, expected {len}", store.len());
}

#[tokio::test]
async fn test_lookup_follows_redirects_across_nodes() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let a = spawn_node(&hub, hub.network(), testnet(), &manager);
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);
    let c = spawn_node(&hub, hub.network(), testnet(), &manager);
    a.network.set_connected(vec![b.peer]);
    b.network.set_connected(vec![c.peer]);
    c.network.set_connected(vec![b.peer]);
    settle(&[&a, &b, &c]).await;
    assert!(a.node.routing.contains(&b.peer));
    assert!(b.node.routing.contains(&c.peer));

    let key = key_nearer(c.peer, b.peer);
    c.store.put(&key, bodies_for(&key)).unwrap();

    let bodies = a.node.locator.locate(&key).await.unwrap();
    assert_eq!(bodies, bodies_for(&key));

    let dialed: Vec<PeerId> = hub
        .opened_streams()
        .into_iter()
        .filter(|(from, _, _)| *from == a.peer)
        .map(|(_, to, _)| to)
        .collect();
    assert!(dialed.contains(&b.peer));
    assert!(dialed.contains(&c.peer));
}

#[tokio::test]
async fn test_lookup_falls_back_to_full_node() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let full_network = hub.network();
    let full_peer = full_network.local_peer_id();
    let full = spawn_node(
        &hub,
        full_network,
        NodeConfig {
            role: NodeRole::Full,
            ..testnet()
        },
        &manager,
    );
    let full_addr: Multiaddr = format!("/memory/7/p2p/{full_peer}").parse().unwrap();

    let a = spawn_node(
        &hub,
        hub.network(),
        NodeConfig {
            full_nodes: vec![full_addr],
            ..testnet()
        },
        &manager,
    );
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);
    a.network.set_connected(vec![b.peer]);
    b.network.set_connected(vec![a.peer]);
    settle(&[&a, &b]).await;

    // only the full node's chain log holds the chunk
    let key = chunk_key(3);
    assert!(!full.store.exists(&key).unwrap());

    let bodies = a.node.locator.locate(&key).await.unwrap();
    assert_eq!(bodies, bodies_for(&key));

    let memory: Multiaddr = "/memory/7".parse().unwrap();
    let opened = hub.opened_streams();
    assert!(opened.contains(&(a.peer, b.peer, Vec::new())));
    assert!(opened.contains(&(a.peer, full.peer, vec![memory])));
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_lookup_budget_ends_without_peers() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let config = NodeConfig::from_toml(
        "testnet = true\n[locator]\nlookup_budget_secs = 9223372036854775807\n",
    )
    .unwrap();
    let node = spawn_node(&hub, hub.network(), config, &manager);

    let result = node.node.locator.locate(&chunk_key(3)).await;
    assert_matches!(result, Err(err) if err.is_not_found());
}

#[tokio::test]
async fn test_store_request_backfills_history() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let a = spawn_node(&hub, hub.network(), testnet(), &manager);
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);

    let accepted = a
        .node
        .client
        .store_chunk(b.peer, &chunk_record(15))
        .await
        .unwrap();
    assert!(accepted);

    let mut stored: Vec<u64> = b.store.records().iter().map(|r| r.key().index()).collect();
    stored.sort_unstable();
    assert_eq!(stored, (5..=15).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_replication_reaches_routing_peers() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let a = spawn_node(&hub, hub.network(), testnet(), &manager);
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);
    let c = spawn_node(&hub, hub.network(), testnet(), &manager);
    a.network.set_connected(vec![b.peer, c.peer]);
    b.network.set_connected(vec![a.peer]);
    c.network.set_connected(vec![a.peer]);
    settle(&[&a, &b, &c]).await;
    assert_eq!(a.node.routing.len(), 2);

    a.node
        .backfill
        .ensure_chunk_and_history(&chunk_key(15), true)
        .await
        .unwrap();
    assert_eq!(a.store.len(), 11);

    wait_for_len(&b.store, 11).await;
    wait_for_len(&c.store, 11).await;
}

#[tokio::test]
async fn test_health_queries_between_nodes() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let a = spawn_node(&hub, hub.network(), testnet(), &manager);
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);
    a.network.set_connected(vec![b.peer]);
    b.network.set_connected(vec![a.peer]);
    settle(&[&a, &b]).await;

    assert_eq!(a.node.client.last_header(b.peer).await.unwrap().height, 100);
    assert!(a.node.client.is_healthy(b.peer, 50).await.unwrap());
    assert!(a.node.client.is_sync(b.peer).await.unwrap());
}

#[tokio::test]
async fn test_forged_request_rejected() {
    let manager = TaskManager::current();
    let hub = SimHub::new();
    let a = spawn_node(&hub, hub.network(), testnet(), &manager);
    let b = spawn_node(&hub, hub.network(), testnet(), &manager);

    let request = P2PRequest::GetLastHeader;
    let forged = SignedRequest::sign(&request, &Keypair::generate_ed25519()).unwrap();
    let mut stream = a
        .network
        .open_stream(b.peer, Vec::new(), request.protocol())
        .await
        .unwrap();
    write_request(&mut stream, forged).await.unwrap();
    let response = read_response(&mut stream).await.unwrap();
    assert_matches!(response, P2PResponse::Error(_));
}
