use {
    crate::{
        buffer::{model::Record, transport::Transport},
        error::{LiveSetError, Result},
        view::collection::CollectionDiff,
    },
    serde::{Deserialize, Serialize},
    std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub score: i32,
}

impl Item {
    pub fn new(id: u32, score: i32) -> Self {
        Item { id, score }
    }
}

impl Record for Item {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }
}

pub fn items(ids: impl IntoIterator<Item = u32>) -> Vec<Item> {
    ids.into_iter().map(|id| Item::new(id, id as i32)).collect()
}

/// In-memory transport that records how often it was called.
#[derive(Default)]
pub struct MemoryTransport {
    pub remote: RwLock<Vec<Item>>,
    pub creates: AtomicUsize,
    pub failing: AtomicBool,
}

impl MemoryTransport {
    pub fn with_remote(remote: Vec<Item>) -> Self {
        MemoryTransport {
            remote: RwLock::new(remote),
            ..Default::default()
        }
    }
}

impl Transport<Item> for MemoryTransport {
    fn create(&self, record: &Item) -> Result<serde_json::Value> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LiveSetError::Transport("unreachable".into()));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.remote.write().unwrap().push(record.clone());
        Ok(serde_json::json!({ "created": record.id }))
    }

    fn fetch(&self) -> Result<Vec<Item>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LiveSetError::Transport("unreachable".into()));
        }
        Ok(self.remote.read().unwrap().clone())
    }
}

pub type DiffLog = Arc<RwLock<Vec<String>>>;

pub fn describe(diff: &CollectionDiff<Item>) -> String {
    match diff {
        CollectionDiff::Added(m) => format!("added {}", m.id()),
        CollectionDiff::Removed(m) => format!("removed {}", m.id()),
        CollectionDiff::Reset => "reset".to_string(),
        CollectionDiff::Changed(m) => format!("changed {}", m.id()),
        CollectionDiff::Sorted(options) => format!("sorted {}", options.sort_subsets),
        CollectionDiff::Synced { model, .. } => format!("synced {}", model.id()),
    }
}

pub fn log_diffs(log: &DiffLog) -> impl Fn(&CollectionDiff<Item>) + Send + Sync + 'static {
    let log = log.clone();
    move |diff: &CollectionDiff<Item>| log.write().unwrap().push(describe(diff))
}

/// Ids rebuilt from membership messages alone.
pub type Mirror = Arc<RwLock<Vec<u32>>>;

pub fn mirror(ids: &Mirror) -> impl Fn(&CollectionDiff<Item>) + Send + Sync + 'static {
    let ids = ids.clone();
    move |diff: &CollectionDiff<Item>| {
        let mut ids = ids.write().unwrap();
        match diff {
            CollectionDiff::Added(m) => ids.push(m.id()),
            CollectionDiff::Removed(m) => ids.retain(|id| *id != m.id()),
            CollectionDiff::Reset => ids.clear(),
            _ => {}
        }
    }
}
