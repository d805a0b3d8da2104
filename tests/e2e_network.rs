//! End-to-end tests for network membership, topologies and summaries.

use pretty_assertions::assert_eq;
use wallace::storage::memory::MemoryTx;
use wallace::{
    Error, GraphStore, Isolation, MemoryStore, Network, NetworkKind, Node, NodeKind, NodeStatus,
    TxMode,
};

async fn setup() -> (MemoryStore, MemoryTx) {
    let store = MemoryStore::new();
    let tx = store.begin_tx(TxMode::ReadWrite, Isolation::ReadCommitted).await.unwrap();
    (store, tx)
}

async fn network_of(
    store: &MemoryStore,
    tx: &mut MemoryTx,
    kind: NetworkKind,
    agents: usize,
) -> (Network, Vec<Node>) {
    let net = Network::create(store, tx, kind).await.unwrap();
    let mut members = Vec::new();
    for _ in 0..agents {
        let mut agent = Node::create(store, tx, NodeKind::agent()).await.unwrap();
        net.add_agent(store, tx, &mut agent).await.unwrap();
        members.push(agent);
    }
    (net, members)
}

// ============================================================================
// 1. Topologies
// ============================================================================

#[tokio::test]
async fn test_base_network_does_not_wire() {
    let (store, mut tx) = setup().await;
    let (net, _) = network_of(&store, &mut tx, NetworkKind::Base, 3).await;
    assert!(net.vectors(&store, &mut tx).await.unwrap().is_empty());
    assert_eq!(net.get_degrees(&store, &mut tx).await.unwrap(), vec![0, 0, 0]);
}

#[tokio::test]
async fn test_chain_links_consecutive_agents() {
    let (store, mut tx) = setup().await;
    let (net, agents) = network_of(&store, &mut tx, NetworkKind::Chain, 3).await;

    assert_eq!(net.get_degrees(&store, &mut tx).await.unwrap(), vec![1, 1, 0]);
    assert!(agents[0].has_connection_to(&store, &mut tx, &agents[1]).await.unwrap());
    assert!(agents[1].has_connection_to(&store, &mut tx, &agents[2]).await.unwrap());
    assert!(!agents[1].has_connection_from(&store, &mut tx, &agents[2]).await.unwrap());
}

#[tokio::test]
async fn test_fully_connected_links_every_pair() {
    let (store, mut tx) = setup().await;
    let (net, agents) = network_of(&store, &mut tx, NetworkKind::FullyConnected, 4).await;

    assert_eq!(net.vectors(&store, &mut tx).await.unwrap().len(), 12);
    assert_eq!(net.get_degrees(&store, &mut tx).await.unwrap(), vec![3, 3, 3, 3]);
    for agent in &agents {
        assert_eq!(agent.indegree(&store, &mut tx).await.unwrap(), 3);
    }
}

#[tokio::test]
async fn test_star_links_through_first_agent() {
    let (store, mut tx) = setup().await;
    let (net, agents) = network_of(&store, &mut tx, NetworkKind::Star, 4).await;

    assert_eq!(net.get_degrees(&store, &mut tx).await.unwrap(), vec![3, 1, 1, 1]);
    let hub = &agents[0];
    let spokes = hub.successors(&store, &mut tx, &wallace::NodeFilter::Any).await.unwrap();
    assert_eq!(spokes, agents[1..].to_vec());
}

#[tokio::test]
async fn test_vectors_sorted_by_endpoints() {
    let (store, mut tx) = setup().await;
    let (net, _) = network_of(&store, &mut tx, NetworkKind::FullyConnected, 5).await;

    let vectors = net.vectors(&store, &mut tx).await.unwrap();
    let keys: Vec<_> = vectors.iter().map(|v| (v.origin, v.destination)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

// ============================================================================
// 2. Sources
// ============================================================================

#[tokio::test]
async fn test_add_source_local_wires_one_agent() {
    let (store, mut tx) = setup().await;
    let (net, agents) = network_of(&store, &mut tx, NetworkKind::Base, 3).await;

    let mut source = Node::create(&store, &mut tx, NodeKind::source()).await.unwrap();
    let wired = net.add_source_local(&store, &mut tx, &mut source, &agents[1]).await.unwrap();
    assert_eq!(wired.len(), 1);
    assert_eq!(wired[0].destination, agents[1].id);
    assert_eq!(source.network, Some(net.id));
}

#[tokio::test]
async fn test_add_source_without_wiring() {
    let (store, mut tx) = setup().await;
    let (net, _) = network_of(&store, &mut tx, NetworkKind::Base, 2).await;

    let mut source = Node::create(&store, &mut tx, NodeKind::source()).await.unwrap();
    net.add_source(&store, &mut tx, &mut source).await.unwrap();
    assert_eq!(source.outdegree(&store, &mut tx).await.unwrap(), 0);
    assert_eq!(net.sources(&store, &mut tx).await.unwrap(), vec![source]);
}

// ============================================================================
// 3. Membership
// ============================================================================

#[tokio::test]
async fn test_membership_respects_status() {
    let (store, mut tx) = setup().await;
    let (net, mut agents) = network_of(&store, &mut tx, NetworkKind::Base, 3).await;
    let mut sources = Vec::new();
    for _ in 0..2 {
        let mut source = Node::create(&store, &mut tx, NodeKind::source()).await.unwrap();
        net.add_source(&store, &mut tx, &mut source).await.unwrap();
        sources.push(source);
    }

    agents[0].kill(&store, &mut tx).await.unwrap();
    agents[1].fail(&store, &mut tx).await.unwrap();
    sources[0].kill(&store, &mut tx).await.unwrap();
    sources[1].fail(&store, &mut tx).await.unwrap();

    let live_agents = net.agents(&store, &mut tx).await.unwrap();
    assert_eq!(live_agents, vec![agents[2].clone()]);

    // Dead sources still count; failed ones do not.
    let live_sources = net.sources(&store, &mut tx).await.unwrap();
    assert_eq!(live_sources.len(), 1);
    assert_eq!(live_sources[0].id, sources[0].id);
    assert_eq!(live_sources[0].status, NodeStatus::Dead);

    let nodes = net.nodes(&store, &mut tx).await.unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![sources[0].id, agents[2].id]);
}

#[tokio::test]
async fn test_has_participant_any_status() {
    let (store, mut tx) = setup().await;
    let net = Network::create(&store, &mut tx, NetworkKind::Base).await.unwrap();
    let mut agent = Node::new(NodeKind::agent(), store.now())
        .with_participant("worker-17")
        .insert(&store, &mut tx)
        .await
        .unwrap();
    net.add_agent(&store, &mut tx, &mut agent).await.unwrap();
    agent.fail(&store, &mut tx).await.unwrap();

    assert!(net.has_participant(&store, &mut tx, "worker-17").await.unwrap());
    assert!(!net.has_participant(&store, &mut tx, "worker-18").await.unwrap());

    let other = Network::create(&store, &mut tx, NetworkKind::Base).await.unwrap();
    assert!(!other.has_participant(&store, &mut tx, "worker-17").await.unwrap());
}

#[tokio::test]
async fn test_len_is_undefined() {
    let (store, mut tx) = setup().await;
    let (net, _) = network_of(&store, &mut tx, NetworkKind::Chain, 2).await;
    let err = net.len().unwrap_err();
    assert!(matches!(err, Error::Conceptual(_)));
    assert!(err.to_string().contains("agents()"));
}

#[tokio::test]
async fn test_summary_counts() {
    let (store, mut tx) = setup().await;
    let (net, _) = network_of(&store, &mut tx, NetworkKind::Star, 3).await;
    let mut source = Node::create(&store, &mut tx, NodeKind::source()).await.unwrap();
    net.add_source_global(&store, &mut tx, &mut source).await.unwrap();

    let summary = net.summary(&store, &mut tx).await.unwrap();
    assert_eq!((summary.agents, summary.sources, summary.vectors), (3, 1, 7));
    assert_eq!(
        summary.to_string(),
        format!("<Network-{}-star with 3 agents, 1 sources, 7 vectors>", net.id.short()),
    );
}

#[tokio::test]
async fn test_membership_survives_commit() {
    let store = MemoryStore::new();
    let mut tx = store.begin_tx(TxMode::ReadWrite, Isolation::ReadCommitted).await.unwrap();
    let (net, agents) = network_of(&store, &mut tx, NetworkKind::Chain, 2).await;
    store.commit_tx(tx).await.unwrap();

    let mut reader = store.begin_tx(TxMode::ReadOnly, Isolation::ReadCommitted).await.unwrap();
    let stored = store.require_network(&mut reader, net.id).await.unwrap();
    assert_eq!(stored.kind, NetworkKind::Chain);
    assert_eq!(stored.agents(&store, &mut reader).await.unwrap(), agents);
}
