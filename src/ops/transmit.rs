//! The `transmit` dispatch.
//!
//! Two independent axes get resolved, content and recipients, then the
//! cross product fans out into transmission records:
//!
//! ```text
//! What  ──► Info instances   (ownership checked)  ─┐
//!                                                  ├─► TransmitPlan ─► Transmissions
//! ToWhom ─► Node instances   (connection checked) ─┘
//! ```
//!
//! Resolution runs as an explicit worklist, so nested sequences cost no
//! stack depth, and every check runs before the first record is written:
//! a transmit that fails creates nothing.

use hashbrown::HashSet;
use tracing::debug;

use crate::behavior::NodeBehavior;
use crate::model::*;
use crate::storage::{GraphStore, InfoQuery};
use crate::{Error, Result};

/// What to transmit.
#[derive(Debug, Clone)]
pub enum What {
    /// A concrete info. The transmitting node must be its origin.
    Info(Info),
    /// Every info of this variant authored by the transmitting node,
    /// newest first.
    Type(InfoFilter),
    /// Each element in turn.
    Many(Vec<What>),
}

impl From<Info> for What {
    fn from(info: Info) -> Self {
        What::Info(info)
    }
}

impl From<InfoFilter> for What {
    fn from(filter: InfoFilter) -> Self {
        What::Type(filter)
    }
}

impl From<Vec<Info>> for What {
    fn from(infos: Vec<Info>) -> Self {
        What::Many(infos.into_iter().map(What::Info).collect())
    }
}

/// Whom to transmit to.
#[derive(Debug, Clone)]
pub enum ToWhom {
    /// A concrete node. An alive vector must lead there.
    Node(Node),
    /// Every successor of this variant.
    Type(NodeFilter),
    /// Each element in turn.
    Many(Vec<ToWhom>),
}

impl From<Node> for ToWhom {
    fn from(node: Node) -> Self {
        ToWhom::Node(node)
    }
}

impl From<NodeFilter> for ToWhom {
    fn from(filter: NodeFilter) -> Self {
        ToWhom::Type(filter)
    }
}

impl From<NodeRole> for ToWhom {
    fn from(role: NodeRole) -> Self {
        ToWhom::Type(NodeFilter::Role(role))
    }
}

impl From<Vec<Node>> for ToWhom {
    fn from(nodes: Vec<Node>) -> Self {
        ToWhom::Many(nodes.into_iter().map(ToWhom::Node).collect())
    }
}

/// Fully resolved and validated (info, destination) pairs, in resolution
/// order: info-major, recipients in the order they were resolved.
#[derive(Debug, Clone, Default)]
pub struct TransmitPlan {
    pairs: Vec<(Info, Node)>,
}

impl TransmitPlan {
    pub fn pairs(&self) -> &[(Info, Node)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Node {
    /// Resolve `what` and `to_whom` into a plan.
    ///
    /// `None` on either axis defers to the behavior's `what` / `to_whom`
    /// hook. Explicit content is checked first, then recipients, and only
    /// then the `what` hook, which is the one step allowed to write (a
    /// source creating the info it sends). Each (info, destination) pair
    /// appears at most once.
    pub async fn plan_transmission<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        behavior: &dyn NodeBehavior<S>,
        what: Option<What>,
        to_whom: Option<ToWhom>,
    ) -> Result<TransmitPlan> {
        let explicit = match what {
            Some(what) => Some(self.resolve_nonempty_content(store, tx, what).await?),
            None => None,
        };

        let to_whom = match to_whom {
            Some(to_whom) => to_whom,
            None => behavior.to_whom(store, tx, self).await?
                .ok_or(Error::EmptyRecipient { node: self.id })?,
        };
        let recipients = self.resolve_recipients(store, tx, to_whom).await?;
        if recipients.is_empty() {
            return Err(Error::EmptyRecipient { node: self.id });
        }

        // The content hook may create info, so it only runs once there is
        // somebody to send it to.
        let infos = match explicit {
            Some(infos) => infos,
            None => {
                let what = behavior.what(store, tx, self).await?
                    .ok_or(Error::EmptyContent { node: self.id })?;
                self.resolve_nonempty_content(store, tx, what).await?
            }
        };

        let pairs = infos.iter()
            .flat_map(|info| recipients.iter().map(move |node| (info.clone(), node.clone())))
            .collect();
        Ok(TransmitPlan { pairs })
    }

    /// Send `what` to `to_whom`, creating one transmission per resolved
    /// (info, destination) pair.
    ///
    /// Delivery is pulled: nothing happens on the receiving side until it
    /// calls `receive_all`.
    pub async fn transmit<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        behavior: &dyn NodeBehavior<S>,
        what: Option<What>,
        to_whom: Option<ToWhom>,
    ) -> Result<Vec<Transmission>> {
        let plan = self.plan_transmission(store, tx, behavior, what, to_whom).await?;

        let mut created = Vec::with_capacity(plan.len());
        for (info, destination) in plan.pairs {
            let transmission = Transmission::new(info.id, destination.id, store.now());
            store.insert_transmission(tx, transmission.clone()).await?;
            created.push(transmission);
        }

        debug!(node = %self, transmissions = created.len(), "transmit");
        Ok(created)
    }

    async fn resolve_nonempty_content<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        what: What,
    ) -> Result<Vec<Info>> {
        let infos = self.resolve_content(store, tx, what).await?;
        if infos.is_empty() {
            return Err(Error::EmptyContent { node: self.id });
        }
        Ok(infos)
    }

    async fn resolve_content<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        what: What,
    ) -> Result<Vec<Info>> {
        let mut seen = HashSet::new();
        let mut infos = Vec::new();
        // Stack of pending items; sequences are pushed reversed so they
        // pop in their original order.
        let mut work = vec![what];

        while let Some(item) = work.pop() {
            match item {
                What::Many(items) => work.extend(items.into_iter().rev()),
                What::Type(filter) => {
                    let authored = store.infos(tx, &InfoQuery::by_origin(self.id).newest_first()).await?;
                    work.extend(
                        authored.into_iter()
                            .filter(|i| filter.matches(i))
                            .map(What::Info)
                            .rev(),
                    );
                }
                What::Info(info) => {
                    if info.origin != self.id {
                        return Err(Error::Ownership { node: self.id, info: info.id });
                    }
                    if seen.insert(info.id) {
                        infos.push(info);
                    }
                }
            }
        }
        Ok(infos)
    }

    async fn resolve_recipients<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        to_whom: ToWhom,
    ) -> Result<Vec<Node>> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        let mut work = vec![to_whom];

        while let Some(item) = work.pop() {
            match item {
                ToWhom::Many(items) => work.extend(items.into_iter().rev()),
                ToWhom::Type(filter) => {
                    let successors = self.live_successors(store, tx, &filter).await?;
                    work.extend(successors.into_iter().map(ToWhom::Node).rev());
                }
                ToWhom::Node(node) => {
                    if !self.has_live_connection_to(store, tx, &node).await? {
                        return Err(Error::NoConnection { from: self.id, to: node.id });
                    }
                    if seen.insert(node.id) {
                        recipients.push(node);
                    }
                }
            }
        }
        Ok(recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::storage::memory::MemoryTx;
    use crate::tx::{Isolation, TxMode};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl NodeBehavior<MemoryStore> for Silent {
        async fn what(&self, _store: &MemoryStore, _tx: &mut MemoryTx, _node: &Node) -> Result<Option<What>> {
            Ok(None)
        }

        async fn to_whom(&self, _store: &MemoryStore, _tx: &mut MemoryTx, _node: &Node) -> Result<Option<ToWhom>> {
            Ok(None)
        }
    }

    struct Defaults;

    #[async_trait]
    impl NodeBehavior<MemoryStore> for Defaults {}

    async fn setup() -> (MemoryStore, MemoryTx) {
        let db = MemoryStore::new();
        let tx = db.begin_tx(TxMode::ReadWrite, Isolation::ReadCommitted).await.unwrap();
        (db, tx)
    }

    #[tokio::test]
    async fn test_hooks_returning_nothing() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        a.connect_to(&db, &mut tx, &b).await.unwrap();
        let info = Info::create(&db, &mut tx, &a, "x").await.unwrap();

        let err = a.transmit(&db, &mut tx, &Silent, None, Some(b.clone().into())).await.unwrap_err();
        assert!(matches!(err, Error::EmptyContent { .. }));

        let err = a.transmit(&db, &mut tx, &Silent, Some(info.into()), None).await.unwrap_err();
        assert!(matches!(err, Error::EmptyRecipient { .. }));
        assert!(a.outgoing_transmissions(&db, &mut tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_send_everything_to_everyone() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let c = Node::create(&db, &mut tx, NodeKind::source()).await.unwrap();
        a.connect_to(&db, &mut tx, &b).await.unwrap();
        a.connect_to(&db, &mut tx, &c).await.unwrap();
        Info::create(&db, &mut tx, &a, "one").await.unwrap();
        Info::create(&db, &mut tx, &a, "two").await.unwrap();

        let sent = a.transmit(&db, &mut tx, &Defaults, None, None).await.unwrap();
        assert_eq!(sent.len(), 4);
    }

    #[tokio::test]
    async fn test_type_resolution_is_newest_first() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        a.connect_to(&db, &mut tx, &b).await.unwrap();
        let old = Info::create(&db, &mut tx, &a, "old").await.unwrap();
        let new = Info::create(&db, &mut tx, &a, "new").await.unwrap();

        let plan = a
            .plan_transmission(&db, &mut tx, &Defaults, Some(InfoFilter::Any.into()), Some(b.into()))
            .await
            .unwrap();
        let order: Vec<InfoId> = plan.pairs().iter().map(|(i, _)| i.id).collect();
        assert_eq!(order, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_nested_sequences_flatten_in_order_without_duplicates() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let c = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        a.connect_to(&db, &mut tx, &b).await.unwrap();
        a.connect_to(&db, &mut tx, &c).await.unwrap();
        let i1 = Info::create(&db, &mut tx, &a, "1").await.unwrap();
        let i2 = Info::create(&db, &mut tx, &a, "2").await.unwrap();

        let what = What::Many(vec![
            What::Info(i2.clone()),
            What::Many(vec![What::Info(i1.clone()), What::Info(i2.clone())]),
        ]);
        let to_whom = ToWhom::Many(vec![c.clone().into(), ToWhom::Type(NodeFilter::Any)]);
        let plan = a.plan_transmission(&db, &mut tx, &Defaults, Some(what), Some(to_whom)).await.unwrap();

        let pairs: Vec<(InfoId, NodeId)> = plan.pairs().iter().map(|(i, n)| (i.id, n.id)).collect();
        assert_eq!(pairs, vec![
            (i2.id, c.id), (i2.id, b.id),
            (i1.id, c.id), (i1.id, b.id),
        ]);
    }

    #[tokio::test]
    async fn test_ownership_checked_before_anything_is_written() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        a.connect_to(&db, &mut tx, &b).await.unwrap();
        let mine = Info::create(&db, &mut tx, &a, "mine").await.unwrap();
        let theirs = Info::create(&db, &mut tx, &b, "theirs").await.unwrap();

        let err = a
            .transmit(&db, &mut tx, &Defaults, Some(vec![mine, theirs.clone()].into()), Some(b.clone().into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ownership { info, .. } if info == theirs.id));
        assert!(b.incoming_transmissions(&db, &mut tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_vector_is_no_connection() {
        let (db, mut tx) = setup().await;
        let a = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let b = Node::create(&db, &mut tx, NodeKind::agent()).await.unwrap();
        let mut v = a.connect_to(&db, &mut tx, &b).await.unwrap();
        v.kill(&db, &mut tx).await.unwrap();
        let info = Info::create(&db, &mut tx, &a, "x").await.unwrap();

        let err = a
            .transmit(&db, &mut tx, &Defaults, Some(info.clone().into()), Some(b.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoConnection { .. }));

        // Resolving by type skips dead edges, leaving nobody.
        let err = a
            .transmit(&db, &mut tx, &Defaults, Some(info.into()), Some(NodeRole::Agent.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyRecipient { .. }));
    }
}
