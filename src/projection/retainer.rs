use {
    crate::projection::{connection::Connection, subset::SubsetId},
    std::{collections::HashMap, sync::RwLock},
    tracing::trace,
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Anything that hands out connections.
pub trait Connectable: Send + Sync {
    fn subset_id(&self) -> SubsetId;
    fn connect(&self) -> Connection;
}

/// Candidate for `Retainer::retain`. Types that cannot be connected
/// keep the default and pass through `retain` untouched.
pub trait Retainable {
    fn connectable(&self) -> Option<&dyn Connectable> {
        None
    }
}

impl<T: Retainable + ?Sized> Retainable for &T {
    fn connectable(&self) -> Option<&dyn Connectable> {
        (**self).connectable()
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Retention
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// At most one connection per subset, released together.
#[derive(Default)]
pub struct Retention {
    connections: RwLock<HashMap<SubsetId, Connection>>,
}

impl Retention {
    pub fn new() -> Self {
        Self::default()
    }

    fn hold(&self, target: &dyn Connectable) {
        let id = target.subset_id();
        if self.connections.read().unwrap().contains_key(&id) {
            return;
        }

        // connect() refreshes and notifies, so it runs without the lock
        let connection = target.connect();
        let mut connections = self.connections.write().unwrap();
        if connections.contains_key(&id) {
            drop(connections);
            connection.release();
            return;
        }
        trace!(subset = %id, "retained");
        connections.insert(id, connection);
    }

    fn release_every(&self) {
        let drained: Vec<Connection> = self
            .connections
            .write()
            .unwrap()
            .drain()
            .map(|(_, connection)| connection)
            .collect();

        if !drained.is_empty() {
            trace!(released = drained.len(), "released all");
        }
        for connection in drained {
            connection.release();
        }
    }

    pub fn contains(&self, id: SubsetId) -> bool {
        self.connections.read().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Composed into any owner (a view, another collection, ...) that keeps
/// subsets connected for as long as it lives.
pub trait Retainer {
    fn retention(&self) -> &Retention;

    /// Connects `candidate` once per retainer and returns it. Repeated
    /// calls with the same subset are no-ops; non-subsets pass through.
    /// The held connection keeps the subset alive until `release_all`,
    /// so the returned handle may be dropped.
    fn retain<C: Retainable>(&self, candidate: C) -> C {
        if let Some(target) = candidate.connectable() {
            self.retention().hold(target);
        }
        candidate
    }

    fn release_all(&self) {
        self.retention().release_every();
    }

    fn is_retaining(&self, id: SubsetId) -> bool {
        self.retention().contains(id)
    }

    fn retained_count(&self) -> usize {
        self.retention().len()
    }
}

impl Retainer for Retention {
    fn retention(&self) -> &Retention {
        self
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
