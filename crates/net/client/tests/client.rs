//! Request client tests over the in-process peer substrate.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use assert_matches::assert_matches;
use libp2p::{Multiaddr, PeerId};
use shardline_api::{
    AddressBook, ExchangeError, ExchangeOutcome, LookupContext, PeerExchange, PeerNetwork,
    PeerRequests, Replicator, ShardError,
};
use shardline_net_client::{ExchangeConfig, NetworkClient, NetworkReplicator};
use shardline_net_peers::MemoryAddressBook;
use shardline_net_proto::{AddrInfo, P2PRequest, P2PResponse, ResponsePayload};
use shardline_primitives::{Header, HeightRange};
use shardline_test_utils::{
    SimHub, SimNetwork, StaticRoutingTable, bodies_for, chunk_key, chunk_record,
};

type TestClient = NetworkClient<SimNetwork, MemoryAddressBook, StaticRoutingTable>;

struct Harness {
    hub: Arc<SimHub>,
    address_book: Arc<MemoryAddressBook>,
    client: Arc<TestClient>,
    local: PeerId,
}

fn harness(table: Vec<PeerId>, config: ExchangeConfig) -> Harness {
    let hub = SimHub::new();
    let network = hub.network();
    let local = network.local_peer_id();
    let address_book = Arc::new(MemoryAddressBook::new());
    let client = Arc::new(NetworkClient::new(
        network,
        address_book.clone(),
        Arc::new(StaticRoutingTable::new(local, table)),
        config,
    ));
    Harness {
        hub,
        address_book,
        client,
        local,
    }
}

fn ctx() -> LookupContext {
    LookupContext::with_budget(Duration::from_secs(3600))
}

#[tokio::test]
async fn test_exchange_returns_body() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    let local = h.local;
    h.hub.register_responder(server, move |remote, request| {
        assert_eq!(remote, local);
        match request {
            P2PRequest::FetchChunk(key) => {
                P2PResponse::Payload(ResponsePayload::BlockBodies(bodies_for(&key)))
            }
            other => P2PResponse::error(format!("unexpected {}", other.kind())),
        }
    });

    let key = chunk_key(4);
    let outcome = h.client.exchange(&ctx(), server, &key).await.unwrap();
    assert_matches!(outcome, ExchangeOutcome::Body(bodies) if bodies == bodies_for(&key));
}

#[tokio::test]
async fn test_redirect_records_addresses() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    let closer = PeerId::random();
    let addr: Multiaddr = "/ip4/192.168.1.20/tcp/13803".parse().unwrap();
    let advertised = addr.clone();
    h.hub.register_responder(server, move |_, _| {
        P2PResponse::Payload(ResponsePayload::AddrInfos(vec![AddrInfo {
            peer_id: closer,
            addrs: vec![advertised.clone()],
        }]))
    });

    let outcome = h.client.exchange(&ctx(), server, &chunk_key(4)).await.unwrap();
    assert_matches!(outcome, ExchangeOutcome::Redirect(peers) if peers == vec![closer]);
    assert_eq!(h.address_book.addrs(&closer), vec![addr.clone()]);

    // The next request to the redirected peer dials the learned address.
    let err = h.client.exchange(&ctx(), closer, &chunk_key(4)).await.unwrap_err();
    assert_matches!(err, ExchangeError::Dial { peer, .. } if peer == closer);
    let opened = h.hub.opened_streams();
    assert_eq!(opened.last(), Some(&(h.local, closer, vec![addr])));
}

#[tokio::test]
async fn test_remote_error_surfaces() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    h.hub
        .register_responder(server, |_, _| P2PResponse::error("chunk not found"));

    let err = h.client.exchange(&ctx(), server, &chunk_key(1)).await.unwrap_err();
    assert_matches!(err, ExchangeError::Remote { message } if message == "chunk not found");
}

#[tokio::test]
async fn test_unexpected_payload_rejected() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    h.hub.register_responder(server, |_, _| P2PResponse::reply(true));

    let err = h.client.exchange(&ctx(), server, &chunk_key(1)).await.unwrap_err();
    assert_matches!(err, ExchangeError::UnexpectedResponse { .. });
}

#[tokio::test(start_paused = true)]
async fn test_stalled_dial_times_out() {
    let config = ExchangeConfig::default().with_dial_timeout(Duration::from_secs(5));
    let h = harness(Vec::new(), config);
    let server = PeerId::random();
    h.hub.stall(server);

    let start = tokio::time::Instant::now();
    let err = h.client.exchange(&ctx(), server, &chunk_key(1)).await.unwrap_err();
    assert_matches!(err, ExchangeError::DialTimeout { peer } if peer == server);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_lookup_deadline_wins_over_dial_timeout() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    h.hub.stall(server);

    let ctx = LookupContext::with_budget(Duration::from_secs(2));
    let err = h.client.exchange(&ctx, server, &chunk_key(1)).await.unwrap_err();
    assert_matches!(err, ExchangeError::DeadlineExceeded);
}

#[tokio::test]
async fn test_cancelled_context() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    h.hub.stall(server);

    let ctx = ctx();
    ctx.cancel();
    let err = h.client.exchange(&ctx, server, &chunk_key(1)).await.unwrap_err();
    assert!(err.is_interrupted());
    assert_matches!(err, ExchangeError::Cancelled);
}

#[tokio::test]
async fn test_health_requests() {
    let h = harness(Vec::new(), ExchangeConfig::default());
    let server = PeerId::random();
    h.hub.register_responder(server, |_, request| match request {
        P2PRequest::GetLastHeader => {
            P2PResponse::Payload(ResponsePayload::Header(Header::at_height(77)))
        }
        P2PRequest::IsHealthy { max_fall_behind } => P2PResponse::reply(max_fall_behind >= 10),
        P2PRequest::IsSync => P2PResponse::reply(false),
        other => P2PResponse::error(format!("unexpected {}", other.kind())),
    });

    assert_eq!(h.client.last_header(server).await.unwrap().height, 77);
    assert!(h.client.is_healthy(server, 50).await.unwrap());
    assert!(!h.client.is_healthy(server, 5).await.unwrap());
    assert!(!h.client.is_sync(server).await.unwrap());
}

#[tokio::test]
async fn test_range_query_falls_back_to_routing_table() {
    let unreachable = PeerId::random();
    let silent = PeerId::random();
    let good = PeerId::random();
    let h = harness(vec![silent, good], ExchangeConfig::default());
    h.hub
        .register_responder(silent, |_, _| P2PResponse::error("not synced"));
    h.hub.register_responder(good, |_, request| match request {
        P2PRequest::GetHeader(range) => P2PResponse::Payload(ResponsePayload::Headers(
            (range.start..=range.end).map(Header::at_height).collect(),
        )),
        P2PRequest::GetChunkRecord(range) => P2PResponse::Payload(
            ResponsePayload::ChunkRecords((range.start..=range.end).map(chunk_record).collect()),
        ),
        other => P2PResponse::error(format!("unexpected {}", other.kind())),
    });

    let headers = h
        .client
        .headers_from_peers(HeightRange::new(5, 7), &[unreachable])
        .await
        .unwrap();
    assert_eq!(headers.len(), 3);

    let records = h
        .client
        .chunk_records_from_peers(HeightRange::new(2, 3), &[])
        .await
        .unwrap();
    assert_eq!(records, vec![chunk_record(2), chunk_record(3)]);
}

#[tokio::test]
async fn test_range_query_without_answer() {
    let h = harness(vec![PeerId::random()], ExchangeConfig::default());
    let err = h
        .client
        .headers_from_peers(HeightRange::new(0, 1), &[PeerId::random()])
        .await
        .unwrap_err();
    assert_matches!(err, ShardError::NoPeerResponded { request: "GetHeader" });
}

#[tokio::test]
async fn test_replicator_pushes_to_nearest_peers() {
    let peers: Vec<PeerId> = (0..4).map(|_| PeerId::random()).collect();
    let h = harness(peers.clone(), ExchangeConfig::default());
    let stores = Arc::new(AtomicUsize::new(0));
    for peer in &peers {
        let stores = stores.clone();
        h.hub.register_responder(*peer, move |_, request| match request {
            P2PRequest::StoreChunk(_) => {
                stores.fetch_add(1, Ordering::SeqCst);
                P2PResponse::reply(true)
            }
            other => P2PResponse::error(format!("unexpected {}", other.kind())),
        });
    }

    let replicator = NetworkReplicator::new(h.client.clone(), 3);
    replicator.replicate(&chunk_record(6)).await.unwrap();
    assert_eq!(stores.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_replicator_fails_when_no_peer_accepts() {
    let peer = PeerId::random();
    let h = harness(vec![peer], ExchangeConfig::default());
    h.hub
        .register_responder(peer, |_, _| P2PResponse::error("store failed"));

    let replicator = NetworkReplicator::new(h.client.clone(), 3);
    let err = replicator.replicate(&chunk_record(6)).await.unwrap_err();
    assert_matches!(err, ShardError::NoPeerResponded { .. });

    let empty = harness(Vec::new(), ExchangeConfig::default());
    NetworkReplicator::new(empty.client.clone(), 3)
        .replicate(&chunk_record(6))
        .await
        .unwrap();
}
