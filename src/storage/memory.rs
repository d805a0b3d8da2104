//! In-memory storage backend.
//!
//! This is the reference implementation of `GraphStore`.
//! Committed rows live in HashMaps behind one RwLock; every transaction
//! works on its own snapshot of them.
//!
//! ## Semantics
//!
//! - **Snapshot reads**: a transaction sees the rows committed before it
//!   began plus its own writes, nothing else.
//! - **Commit applies the write-set**: rows the transaction wrote are copied
//!   into the committed tables; rollback simply drops the snapshot.
//! - **Serializable conflicts**: a serializable commit fails if any row it
//!   read or wrote, or any table it queried, was committed by another
//!   transaction after it began. Detection is table-granular for queries,
//!   so it reports more conflicts than a real database would, never fewer.
//! - **Outbox**: queued messages are published to every subscribed
//!   [`Notifier`] after a successful commit, in queue order.
//!
//! Snapshots are full clones. Use this backend for tests and for embedding
//! small experiments, not for large graphs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::model::*;
use crate::tx::{Isolation, Message, Notifier, Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{
    GraphStore, InfoQuery, NodeQuery, Order, TransformationQuery, TransmissionQuery, VectorQuery,
};

// ============================================================================
// Row bookkeeping
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Networks,
    Nodes,
    Vectors,
    Infos,
    Transmissions,
    Transformations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Network(NetworkId),
    Node(NodeId),
    Vector(VectorId),
    Info(InfoId),
    Transmission(TransmissionId),
    Transformation(TransformationId),
}

impl RowKey {
    fn table(&self) -> Table {
        match self {
            RowKey::Network(_) => Table::Networks,
            RowKey::Node(_) => Table::Nodes,
            RowKey::Vector(_) => Table::Vectors,
            RowKey::Info(_) => Table::Infos,
            RowKey::Transmission(_) => Table::Transmissions,
            RowKey::Transformation(_) => Table::Transformations,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    networks: HashMap<NetworkId, Network>,
    nodes: HashMap<NodeId, Node>,
    vectors: HashMap<VectorId, Vector>,
    /// origin node → vector ids
    outgoing: HashMap<NodeId, SmallVec<[VectorId; 4]>>,
    /// destination node → vector ids
    incoming: HashMap<NodeId, SmallVec<[VectorId; 4]>>,
    infos: HashMap<InfoId, Info>,
    transmissions: HashMap<TransmissionId, Transmission>,
    transformations: HashMap<TransformationId, Transformation>,
}

impl Tables {
    fn put_vector(&mut self, vector: Vector) {
        if !self.vectors.contains_key(&vector.id) {
            self.outgoing.entry(vector.origin).or_default().push(vector.id);
            self.incoming.entry(vector.destination).or_default().push(vector.id);
        }
        self.vectors.insert(vector.id, vector);
    }

    /// Copy one row from `from` into `self`.
    fn copy_row(&mut self, key: RowKey, from: &Tables) {
        match key {
            RowKey::Network(id) => {
                if let Some(row) = from.networks.get(&id) {
                    self.networks.insert(id, row.clone());
                }
            }
            RowKey::Node(id) => {
                if let Some(row) = from.nodes.get(&id) {
                    self.nodes.insert(id, row.clone());
                }
            }
            RowKey::Vector(id) => {
                if let Some(row) = from.vectors.get(&id) {
                    self.put_vector(row.clone());
                }
            }
            RowKey::Info(id) => {
                if let Some(row) = from.infos.get(&id) {
                    self.infos.insert(id, row.clone());
                }
            }
            RowKey::Transmission(id) => {
                if let Some(row) = from.transmissions.get(&id) {
                    self.transmissions.insert(id, row.clone());
                }
            }
            RowKey::Transformation(id) => {
                if let Some(row) = from.transformations.get(&id) {
                    self.transformations.insert(id, row.clone());
                }
            }
        }
    }

    fn vector_ids(index: &HashMap<NodeId, SmallVec<[VectorId; 4]>>, node: NodeId) -> Vec<VectorId> {
        index.get(&node).map(|ids| ids.to_vec()).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Committed {
    tables: Tables,
    version: u64,
    row_versions: HashMap<RowKey, u64>,
    table_versions: HashMap<Table, u64>,
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory experiment graph storage. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: RwLock<Committed>,
    clock: Clock,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a receiver for committed messages.
    pub fn subscribe(&self, notifier: Arc<dyn Notifier>) {
        self.inner.notifiers.write().push(notifier);
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("MemoryStore")
            .field("version", &state.version)
            .field("nodes", &state.tables.nodes.len())
            .field("vectors", &state.tables.vectors.len())
            .field("infos", &state.tables.infos.len())
            .finish()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction: a private snapshot plus read/write bookkeeping.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    isolation: Isolation,
    begin_version: u64,
    view: Tables,
    reads: HashSet<RowKey>,
    writes: HashSet<RowKey>,
    scans: HashSet<Table>,
    outbox: Vec<Message>,
}

impl MemoryTx {
    fn writable(&self) -> Result<()> {
        match self.mode {
            TxMode::ReadWrite => Ok(()),
            TxMode::ReadOnly => Err(Error::TxError(format!("{} is read-only", self.id))),
        }
    }

    fn read(&mut self, key: RowKey) {
        self.reads.insert(key);
    }

    fn scan(&mut self, table: Table) {
        self.scans.insert(table);
    }

    fn write(&mut self, key: RowKey) -> Result<()> {
        self.writable()?;
        self.writes.insert(key);
        Ok(())
    }

    fn require_node(&self, id: NodeId) -> Result<()> {
        if self.view.nodes.contains_key(&id) { Ok(()) }
        else { Err(Error::NotFound(format!("Node {id}"))) }
    }

    fn require_info(&self, id: InfoId) -> Result<()> {
        if self.view.infos.contains_key(&id) { Ok(()) }
        else { Err(Error::NotFound(format!("Info {id}"))) }
    }

    fn require_network(&self, id: Option<NetworkId>) -> Result<()> {
        match id {
            Some(id) if !self.view.networks.contains_key(&id) => {
                Err(Error::NotFound(format!("Network {id}")))
            }
            _ => Ok(()),
        }
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn isolation(&self) -> Isolation { self.isolation }
    fn id(&self) -> TxId { self.id }

    fn queue_message(&mut self, channel: &str, payload: String) {
        self.outbox.push(Message { channel: channel.to_string(), payload });
    }

    fn outbox(&self) -> &[Message] {
        &self.outbox
    }
}

fn duplicate(what: &str, id: impl std::fmt::Display) -> Error {
    Error::ConstraintViolation(format!("{what} {id} already exists"))
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    type Tx = MemoryTx;

    fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    async fn begin_tx(&self, mode: TxMode, isolation: Isolation) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (view, begin_version) = {
            let state = self.inner.state.read();
            (state.tables.clone(), state.version)
        };
        debug!(tx = %id, ?mode, ?isolation, version = begin_version, "begin");
        Ok(MemoryTx {
            id,
            mode,
            isolation,
            begin_version,
            view,
            reads: HashSet::new(),
            writes: HashSet::new(),
            scans: HashSet::new(),
            outbox: Vec::new(),
        })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        let MemoryTx { id, isolation, begin_version, view, reads, writes, scans, outbox, .. } = tx;

        {
            let mut state = self.inner.state.write();

            if isolation == Isolation::Serializable {
                let newer = |v: Option<&u64>| v.is_some_and(|v| *v > begin_version);
                let stale_row = reads.iter().chain(writes.iter())
                    .any(|key| newer(state.row_versions.get(key)));
                let stale_table = scans.iter()
                    .any(|table| newer(state.table_versions.get(table)));
                if stale_row || stale_table {
                    warn!(tx = %id, dropped_messages = outbox.len(), "serializable commit conflict");
                    return Err(Error::Conflict(format!(
                        "{id} read data modified by a concurrent transaction"
                    )));
                }
            }

            if !writes.is_empty() {
                state.version += 1;
                let version = state.version;
                for key in &writes {
                    state.tables.copy_row(*key, &view);
                    state.row_versions.insert(*key, version);
                    state.table_versions.insert(key.table(), version);
                }
            }
        }

        debug!(tx = %id, writes = writes.len(), messages = outbox.len(), "commit");

        if !outbox.is_empty() {
            let notifiers = self.inner.notifiers.read().clone();
            for message in &outbox {
                debug!(channel = %message.channel, "publishing message");
                for notifier in &notifiers {
                    notifier.publish(message);
                }
            }
        }
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        debug!(tx = %tx.id, discarded_writes = tx.writes.len(), dropped_messages = tx.outbox.len(), "rollback");
        Ok(())
    }

    // ========================================================================
    // Networks
    // ========================================================================

    async fn insert_network(&self, tx: &mut MemoryTx, network: Network) -> Result<()> {
        if tx.view.networks.contains_key(&network.id) {
            return Err(duplicate("Network", network.id));
        }
        tx.write(RowKey::Network(network.id))?;
        tx.view.networks.insert(network.id, network);
        Ok(())
    }

    async fn get_network(&self, tx: &mut MemoryTx, id: NetworkId) -> Result<Option<Network>> {
        tx.read(RowKey::Network(id));
        Ok(tx.view.networks.get(&id).cloned())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn insert_node(&self, tx: &mut MemoryTx, node: Node) -> Result<()> {
        if tx.view.nodes.contains_key(&node.id) {
            return Err(duplicate("Node", node.id));
        }
        tx.require_network(node.network)?;
        tx.write(RowKey::Node(node.id))?;
        tx.view.nodes.insert(node.id, node);
        Ok(())
    }

    async fn update_node(&self, tx: &mut MemoryTx, node: Node) -> Result<()> {
        let existing = tx.view.nodes.get(&node.id)
            .ok_or_else(|| Error::NotFound(format!("Node {}", node.id)))?;
        if !existing.is_alive()
            && (existing.status != node.status || existing.time_of_death != node.time_of_death)
        {
            return Err(Error::InvalidState(format!(
                "{existing} is already {}, its status and time of death are final",
                existing.status
            )));
        }
        tx.require_network(node.network)?;
        tx.write(RowKey::Node(node.id))?;
        tx.view.nodes.insert(node.id, node);
        Ok(())
    }

    async fn get_node(&self, tx: &mut MemoryTx, id: NodeId) -> Result<Option<Node>> {
        tx.read(RowKey::Node(id));
        Ok(tx.view.nodes.get(&id).cloned())
    }

    async fn nodes(&self, tx: &mut MemoryTx, query: &NodeQuery) -> Result<Vec<Node>> {
        tx.scan(Table::Nodes);
        let mut result: Vec<Node> = tx.view.nodes.values()
            .filter(|n| query.matches(n))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.creation_time, a.id).cmp(&(&b.creation_time, b.id)));
        Ok(result)
    }

    // ========================================================================
    // Vectors
    // ========================================================================

    async fn insert_vector(&self, tx: &mut MemoryTx, vector: Vector) -> Result<()> {
        if tx.view.vectors.contains_key(&vector.id) {
            return Err(duplicate("Vector", vector.id));
        }
        tx.require_node(vector.origin)?;
        tx.require_node(vector.destination)?;
        tx.write(RowKey::Vector(vector.id))?;
        tx.view.put_vector(vector);
        Ok(())
    }

    async fn update_vector(&self, tx: &mut MemoryTx, vector: Vector) -> Result<()> {
        let existing = tx.view.vectors.get(&vector.id)
            .ok_or_else(|| Error::NotFound(format!("Vector {}", vector.id)))?;
        if existing.origin != vector.origin || existing.destination != vector.destination {
            return Err(Error::ConstraintViolation(format!(
                "endpoints of {} are immutable", vector.id
            )));
        }
        if !existing.is_alive()
            && (existing.status != vector.status || existing.time_of_death != vector.time_of_death)
        {
            return Err(Error::InvalidState(format!(
                "{existing} is already dead, its status and time of death are final"
            )));
        }
        tx.write(RowKey::Vector(vector.id))?;
        tx.view.put_vector(vector);
        Ok(())
    }

    async fn get_vector(&self, tx: &mut MemoryTx, id: VectorId) -> Result<Option<Vector>> {
        tx.read(RowKey::Vector(id));
        Ok(tx.view.vectors.get(&id).cloned())
    }

    async fn vectors(&self, tx: &mut MemoryTx, query: &VectorQuery) -> Result<Vec<Vector>> {
        tx.scan(Table::Vectors);
        if query.network.is_some() {
            tx.scan(Table::Nodes);
        }

        // Narrow through the adjacency index when an endpoint is given.
        let candidates: Vec<VectorId> = match (query.origin, query.destination) {
            (Some(origin), _) => Tables::vector_ids(&tx.view.outgoing, origin),
            (None, Some(destination)) => Tables::vector_ids(&tx.view.incoming, destination),
            (None, None) => tx.view.vectors.keys().copied().collect(),
        };

        let view = &tx.view;
        let mut result: Vec<Vector> = candidates.iter()
            .filter_map(|id| view.vectors.get(id))
            .filter(|v| query.origin.is_none_or(|o| v.origin == o))
            .filter(|v| query.destination.is_none_or(|d| v.destination == d))
            .filter(|v| query.status.is_none_or(|s| v.status == s))
            .filter(|v| query.network.is_none_or(|net| {
                view.nodes.get(&v.origin).is_some_and(|n| n.network == Some(net))
            }))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.creation_time, a.id).cmp(&(&b.creation_time, b.id)));
        Ok(result)
    }

    // ========================================================================
    // Info
    // ========================================================================

    async fn insert_info(&self, tx: &mut MemoryTx, info: Info) -> Result<()> {
        if tx.view.infos.contains_key(&info.id) {
            return Err(duplicate("Info", info.id));
        }
        tx.require_node(info.origin)?;
        tx.write(RowKey::Info(info.id))?;
        tx.view.infos.insert(info.id, info);
        Ok(())
    }

    async fn update_info(&self, tx: &mut MemoryTx, info: Info) -> Result<()> {
        let existing = tx.view.infos.get(&info.id)
            .ok_or_else(|| Error::NotFound(format!("Info {}", info.id)))?;
        if existing.origin != info.origin {
            return Err(Error::ConstraintViolation(format!("origin of {} is immutable", info.id)));
        }
        if existing.has_contents() {
            return Err(Error::WriteOnceViolation { info: info.id });
        }
        tx.write(RowKey::Info(info.id))?;
        tx.view.infos.insert(info.id, info);
        Ok(())
    }

    async fn get_info(&self, tx: &mut MemoryTx, id: InfoId) -> Result<Option<Info>> {
        tx.read(RowKey::Info(id));
        Ok(tx.view.infos.get(&id).cloned())
    }

    async fn infos(&self, tx: &mut MemoryTx, query: &InfoQuery) -> Result<Vec<Info>> {
        tx.scan(Table::Infos);
        let mut result: Vec<Info> = tx.view.infos.values()
            .filter(|i| query.origin.is_none_or(|o| i.origin == o))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.creation_time, a.id).cmp(&(&b.creation_time, b.id)));
        if query.order == Order::Descending {
            result.reverse();
        }
        Ok(result)
    }

    // ========================================================================
    // Transmissions
    // ========================================================================

    async fn insert_transmission(&self, tx: &mut MemoryTx, transmission: Transmission) -> Result<()> {
        if tx.view.transmissions.contains_key(&transmission.id) {
            return Err(duplicate("Transmission", transmission.id));
        }
        tx.require_info(transmission.info)?;
        tx.require_node(transmission.destination)?;
        tx.write(RowKey::Transmission(transmission.id))?;
        tx.view.transmissions.insert(transmission.id, transmission);
        Ok(())
    }

    async fn update_transmission(&self, tx: &mut MemoryTx, transmission: Transmission) -> Result<()> {
        let existing = tx.view.transmissions.get(&transmission.id)
            .ok_or_else(|| Error::NotFound(format!("Transmission {}", transmission.id)))?;
        if existing.info != transmission.info || existing.destination != transmission.destination {
            return Err(Error::ConstraintViolation(format!(
                "info and destination of {} are immutable", transmission.id
            )));
        }
        tx.write(RowKey::Transmission(transmission.id))?;
        tx.view.transmissions.insert(transmission.id, transmission);
        Ok(())
    }

    async fn get_transmission(
        &self,
        tx: &mut MemoryTx,
        id: TransmissionId,
    ) -> Result<Option<Transmission>> {
        tx.read(RowKey::Transmission(id));
        Ok(tx.view.transmissions.get(&id).cloned())
    }

    async fn transmissions(
        &self,
        tx: &mut MemoryTx,
        query: &TransmissionQuery,
    ) -> Result<Vec<Transmission>> {
        tx.scan(Table::Transmissions);
        if query.origin.is_some() {
            tx.scan(Table::Infos);
        }

        let view = &tx.view;
        let mut result: Vec<Transmission> = view.transmissions.values()
            .filter(|t| query.info.is_none_or(|i| t.info == i))
            .filter(|t| query.destination.is_none_or(|d| t.destination == d))
            .filter(|t| !query.pending_only || t.is_pending())
            .filter(|t| query.origin.is_none_or(|o| {
                view.infos.get(&t.info).is_some_and(|i| i.origin == o)
            }))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.transmit_time, a.id).cmp(&(&b.transmit_time, b.id)));
        Ok(result)
    }

    // ========================================================================
    // Transformations
    // ========================================================================

    async fn insert_transformation(
        &self,
        tx: &mut MemoryTx,
        transformation: Transformation,
    ) -> Result<()> {
        if tx.view.transformations.contains_key(&transformation.id) {
            return Err(duplicate("Transformation", transformation.id));
        }
        tx.require_node(transformation.node)?;
        tx.require_info(transformation.info_in)?;
        tx.require_info(transformation.info_out)?;
        tx.write(RowKey::Transformation(transformation.id))?;
        tx.view.transformations.insert(transformation.id, transformation);
        Ok(())
    }

    async fn get_transformation(
        &self,
        tx: &mut MemoryTx,
        id: TransformationId,
    ) -> Result<Option<Transformation>> {
        tx.read(RowKey::Transformation(id));
        Ok(tx.view.transformations.get(&id).cloned())
    }

    async fn transformations(
        &self,
        tx: &mut MemoryTx,
        query: &TransformationQuery,
    ) -> Result<Vec<Transformation>> {
        tx.scan(Table::Transformations);
        let mut result: Vec<Transformation> = tx.view.transformations.values()
            .filter(|t| query.node.is_none_or(|n| t.node == n))
            .filter(|t| query.info_in.is_none_or(|i| t.info_in == i))
            .filter(|t| query.info_out.is_none_or(|i| t.info_out == i))
            .cloned()
            .collect();
        result.sort_by(|a, b| (&a.transform_time, a.id).cmp(&(&b.transform_time, b.id)));
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
