//! JSON export: dump one network and its provenance as a single document.
//!
//! ```text
//! GraphStore → export_network_json() → { network, nodes, vectors, infos,
//!                                        transmissions, transformations }
//! ```
//!
//! Nodes are exported in every status, so dead and failed participants
//! still appear alongside the records they produced.

use std::io::Write;

use serde::Serialize;

use crate::model::*;
use crate::storage::{GraphStore, InfoQuery, NodeQuery, TransformationQuery, TransmissionQuery, VectorQuery};
use crate::tx::{Isolation, TxMode};
use crate::Result;

/// Everything recorded for one network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkExport {
    pub network: Network,
    pub nodes: Vec<Node>,
    pub vectors: Vec<Vector>,
    pub infos: Vec<Info>,
    pub transmissions: Vec<Transmission>,
    pub transformations: Vec<Transformation>,
}

/// Collect a network's rows inside the caller's transaction.
pub async fn collect_network<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    network_id: NetworkId,
) -> Result<NetworkExport> {
    let network = store.require_network(tx, network_id).await?;
    let nodes = store.nodes(tx, &NodeQuery::in_network(network_id)).await?;
    let vectors = store.vectors(tx, &VectorQuery::in_network(network_id)).await?;

    let mut infos = Vec::new();
    let mut transmissions = Vec::new();
    let mut transformations = Vec::new();
    for node in &nodes {
        infos.extend(store.infos(tx, &InfoQuery::by_origin(node.id)).await?);
        transmissions.extend(store.transmissions(tx, &TransmissionQuery::from(node.id)).await?);
        let query = TransformationQuery { node: Some(node.id), ..Default::default() };
        transformations.extend(store.transformations(tx, &query).await?);
    }

    Ok(NetworkExport { network, nodes, vectors, infos, transmissions, transformations })
}

/// Export a network as pretty-printed JSON in its own read-only transaction.
pub async fn export_network_json<S: GraphStore>(
    store: &S,
    network_id: NetworkId,
    writer: &mut dyn Write,
) -> Result<()> {
    let mut tx = store.begin_tx(TxMode::ReadOnly, Isolation::ReadCommitted).await?;
    let collected = collect_network(store, &mut tx, network_id).await;
    store.rollback_tx(tx).await?;
    let export = collected?;

    tracing::debug!(
        network = %network_id,
        nodes = export.nodes.len(),
        vectors = export.vectors.len(),
        infos = export.infos.len(),
        "exporting network"
    );

    serde_json::to_writer_pretty(&mut *writer, &export)?;
    writeln!(writer)?;
    Ok(())
}
