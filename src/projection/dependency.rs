use {
    crate::view::Subscription,
    std::{
        collections::HashMap,
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Something a subset predicate may depend on.
pub trait DependencySource: Send + Sync {
    /// Calls `on_change` after every add, remove, reset, change or sort.
    fn watch(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Subscription;
}

/// Looks up dependency sources by name. Unknown names yield `None`.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn DependencySource>>;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Named sources shared between collections.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    sources: Arc<RwLock<HashMap<String, Arc<dyn DependencySource>>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, source: Arc<dyn DependencySource>) {
        self.sources.write().unwrap().insert(name.into(), source);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.sources.write().unwrap().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Resolve for ResourceRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn DependencySource>> {
        self.sources.read().unwrap().get(name).cloned()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
