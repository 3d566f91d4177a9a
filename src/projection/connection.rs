use {
    crate::projection::subset::SubsetId,
    std::{
        fmt,
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc,
        },
    },
};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Whatever a connection releases itself against.
pub(crate) trait ConnectionTarget: Send + Sync {
    fn release_connection(&self, id: ConnectionId);
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Connection
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// One holder's interest in a subset staying connected.
///
/// Only a subset can mint a connection and it cannot be cloned, so the
/// holder is the only party able to give it back. An unreleased
/// connection keeps its subset alive, even when every `Subset` handle
/// has been dropped. Releasing twice does nothing.
pub struct Connection {
    id: ConnectionId,
    subset: SubsetId,
    target: Arc<dyn ConnectionTarget>,
    released: AtomicBool,
}

impl Connection {
    pub(crate) fn new(subset: SubsetId, target: Arc<dyn ConnectionTarget>) -> Self {
        Connection {
            id: ConnectionId::next(),
            subset,
            target,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn subset_id(&self) -> SubsetId {
        self.subset
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if self.mark_released() {
            self.target.release_connection(self.id);
        }
    }

    /// Returns true the first time only.
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("subset", &self.subset)
            .field("released", &self.is_released())
            .finish()
    }
}
