use {
    crate::{
        buffer::{
            collection::{AddOptions, Collection, SetOptions},
            model::{Model, Record},
        },
        error::{LiveSetError, Result},
        projection::{
            connection::{Connection, ConnectionId, ConnectionTarget},
            dependency::{DependencySource, Resolve},
            retainer::{Connectable, Retainable},
        },
        view::{
            collection::{
                CollectionBroadcast, CollectionDiff, CollectionObserver, CollectionView,
                CollectionViewExt, SortOptions, SyncOptions,
            },
            DispatchQueue, NotifyFnObserver, ObserverBroadcast, Subscription, View,
        },
    },
    serde::{Deserialize, Serialize},
    std::{
        collections::{HashMap, HashSet},
        fmt,
        sync::{
            atomic::{AtomicU64, AtomicUsize, Ordering},
            Arc, RwLock,
        },
    },
    tracing::{debug, trace},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

static NEXT_SUBSET: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubsetId(u64);

impl SubsetId {
    fn next() -> Self {
        SubsetId(NEXT_SUBSET.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subset#{}", self.0)
    }
}

/// Refresh policy of a subset, loadable from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetOptions {
    /// Answer every collection message with a full rescan instead of the
    /// incremental update. Meant for cheap predicates, or predicates that
    /// look at rank or position.
    pub always_refresh: bool,

    /// Names passed to the resolver on connect. Any mutation of a
    /// resolved source forces a full rescan.
    pub dependencies: Vec<String>,
}

impl SubsetOptions {
    pub fn always_refresh() -> Self {
        SubsetOptions {
            always_refresh: true,
            ..Default::default()
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

pub type Predicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

pub struct SubsetConfig<R: Record> {
    pub superset: Collection<R>,
    pub predicate: Predicate<R>,
    pub options: SubsetOptions,
    pub resolver: Option<Arc<dyn Resolve>>,
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Subset
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
struct SubsetState<R: Record> {
    configured: bool,
    link: Option<Arc<SubsetConfig<R>>>,
    models: Vec<Model<R>>,
    connections: HashSet<ConnectionId>,
    subscriptions: Vec<Subscription>,
}

struct SubsetShared<R: Record> {
    id: SubsetId,
    state: RwLock<SubsetState<R>>,
    cast: CollectionBroadcast<R>,
    queue: DispatchQueue<dyn CollectionView<R>>,
    refreshes: AtomicUsize,
}

/// Live, filtered view of a `Collection`.
///
/// A subset owns no models, only membership. It holds subscriptions on
/// its collection only while at least one `Connection` is alive; the
/// first `connect()` subscribes and rescans, the last release
/// unsubscribes and clears the content with a single `Reset`.
///
/// Ordering is append-only: models entering through an incremental
/// update or a rescan are appended at the end, wherever they sit in the
/// collection. Only a `Sorted` message (with `sort_subsets`) restores
/// the collection order.
///
/// Writes (`add`, `remove`, `set`, `create`, `fetch`) go to the
/// collection, and come back through the regular messages.
pub struct Subset<R: Record>(Arc<SubsetShared<R>>);

impl<R: Record> Subset<R> {
    /// Unconfigured subset; see `configure`.
    pub fn new() -> Self {
        Subset(Arc::new(SubsetShared {
            id: SubsetId::next(),
            state: RwLock::new(SubsetState {
                configured: false,
                link: None,
                models: Vec::new(),
                connections: HashSet::new(),
                subscriptions: Vec::new(),
            }),
            cast: Arc::new(RwLock::new(ObserverBroadcast::new())),
            queue: DispatchQueue::new(),
            refreshes: AtomicUsize::new(0),
        }))
    }

    pub fn with_config(config: SubsetConfig<R>) -> Self {
        let subset = Subset::new();
        {
            let mut state = subset.0.state.write().unwrap();
            state.configured = true;
            state.link = Some(Arc::new(config));
        }
        subset
    }

    /// One-time initialization. A second call is rejected and leaves the
    /// subset as it was.
    pub fn configure(&self, config: SubsetConfig<R>) -> Result<()> {
        let connected = {
            let mut state = self.0.state.write().unwrap();
            if state.configured {
                return Err(LiveSetError::AlreadyConfigured(self.0.id));
            }
            state.configured = true;
            state.link = Some(Arc::new(config));
            !state.connections.is_empty()
        };

        if connected {
            self.0.attach();
            self.0.refresh();
        }
        Ok(())
    }

    pub fn id(&self) -> SubsetId {
        self.0.id
    }

    pub fn superset(&self) -> Option<Collection<R>> {
        self.0.link().map(|link| link.superset.clone())
    }

    pub fn options(&self) -> Option<SubsetOptions> {
        self.0.link().map(|link| link.options.clone())
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    pub fn connect(&self) -> Connection {
        self.0.connect()
    }

    /// Gives a connection back. Connections of other subsets and
    /// connections that were already released are ignored.
    pub fn release(&self, connection: &Connection) {
        if connection.subset_id() != self.0.id {
            return;
        }
        connection.mark_released();
        self.0.release_connection(connection.id());
    }

    pub fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    pub fn connection_count(&self) -> usize {
        self.0.state.read().unwrap().connections.len()
    }

    /// Full rescan. Does nothing while disconnected.
    pub fn refresh(&self) {
        self.0.refresh();
    }

    /// Number of full rescans performed so far.
    pub fn refresh_count(&self) -> usize {
        self.0.refreshes.load(Ordering::SeqCst)
    }

    /// Drops every connection and the link to the collection. Writes
    /// become no-ops afterwards and the subset cannot be configured again.
    pub fn detach(&self) {
        let was_connected = {
            let mut state = self.0.state.write().unwrap();
            state.link = None;
            let was_connected = !state.connections.is_empty();
            state.connections.clear();
            was_connected
        };

        if was_connected {
            self.0.disconnect();
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    pub fn add<M: Into<Model<R>>>(&self, models: impl IntoIterator<Item = M>) -> Vec<Model<R>> {
        match self.superset() {
            Some(superset) => superset.add(models, AddOptions::default()),
            None => Vec::new(),
        }
    }

    pub fn remove(&self, ids: impl IntoIterator<Item = R::Id>) -> Vec<Model<R>> {
        match self.superset() {
            Some(superset) => superset.remove(ids),
            None => Vec::new(),
        }
    }

    pub fn set<M: Into<Model<R>>>(&self, models: impl IntoIterator<Item = M>, options: SetOptions) {
        if let Some(superset) = self.superset() {
            superset.set(models, options);
        }
    }

    /// Creates through the collection, tagged with this subset so that
    /// only this subset re-emits the `Synced` message.
    pub fn create(&self, record: R) -> Option<Model<R>> {
        self.superset()?
            .create(record, SyncOptions::from_subset(self.0.id))
            .ok()
    }

    pub fn fetch(&self) -> Vec<Model<R>> {
        match self.superset() {
            Some(superset) => superset
                .fetch(SyncOptions::from_subset(self.0.id))
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Runs `f` while connected, connecting just for the call if needed.
    fn snapshot<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        if self.is_connected() {
            return f(self);
        }

        let connection = self.connect();
        let out = f(self);
        self.release(&connection);
        out
    }

    pub fn to_array(&self) -> Vec<R> {
        self.snapshot(|subset| subset.to_records())
    }

    pub fn to_json(&self) -> Result<serde_json::Value>
    where
        R: Serialize,
    {
        self.snapshot(|subset| Ok(serde_json::to_value(subset.models())?))
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    pub fn observe(&self, observer: CollectionObserver<R>) -> Subscription {
        ObserverBroadcast::subscribe(&self.0.cast, observer)
    }

    pub fn on_diff<F>(&self, f: F) -> Subscription
    where
        F: Fn(&CollectionDiff<R>) + Send + Sync + 'static,
    {
        self.observe(Arc::new(NotifyFnObserver::<dyn CollectionView<R>, _>::new(f)))
    }

    pub fn observer_count(&self) -> usize {
        self.0.cast.read().unwrap().len()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<R: Record> SubsetShared<R> {
    fn link(&self) -> Option<Arc<SubsetConfig<R>>> {
        self.state.read().unwrap().link.clone()
    }

    fn is_connected(&self) -> bool {
        !self.state.read().unwrap().connections.is_empty()
    }

    fn emit(&self, diffs: Vec<CollectionDiff<R>>) {
        self.queue.push(diffs);
        self.flush();
    }

    fn flush(&self) {
        self.queue.flush(&*self.cast);
    }

    fn matches(link: &SubsetConfig<R>, model: &Model<R>) -> bool {
        model.read(|record| (link.predicate)(record))
    }

    fn connect(self: &Arc<Self>) -> Connection {
        let target: Arc<dyn ConnectionTarget> = self.clone();
        let connection = Connection::new(self.id, target);

        let count = {
            let mut state = self.state.write().unwrap();
            state.connections.insert(connection.id());
            state.connections.len()
        };

        if count == 1 {
            debug!(subset = %self.id, "connected");
            self.attach();
            self.refresh();
        } else {
            trace!(subset = %self.id, count, "connection added");
        }
        connection
    }

    /// Subscribes to the collection and to every resolvable dependency.
    fn attach(self: &Arc<Self>) {
        let Some(link) = self.link() else {
            return;
        };

        let mut subscriptions = Vec::with_capacity(1 + link.options.dependencies.len());

        let weak = Arc::downgrade(self);
        subscriptions.push(link.superset.on_diff(move |diff| {
            if let Some(subset) = weak.upgrade() {
                subset.sync(diff);
            }
        }));

        for name in &link.options.dependencies {
            let Some(source) = link.resolver.as_ref().and_then(|r| r.resolve(name)) else {
                trace!(subset = %self.id, dependency = %name, "unresolved dependency");
                continue;
            };

            let weak = Arc::downgrade(self);
            let dependency = name.clone();
            subscriptions.push(source.watch(Arc::new(move || {
                if let Some(subset) = weak.upgrade() {
                    trace!(subset = %subset.id, %dependency, "dependency changed");
                    subset.refresh();
                }
            })));
        }

        self.state.write().unwrap().subscriptions.extend(subscriptions);
    }

    fn disconnect(&self) {
        let (subscriptions, cleared) = {
            let mut state = self.state.write().unwrap();
            self.queue.push([CollectionDiff::Reset]);
            (
                std::mem::take(&mut state.subscriptions),
                std::mem::take(&mut state.models),
            )
        };

        debug!(
            subset = %self.id,
            subscriptions = subscriptions.len(),
            cleared = cleared.len(),
            "disconnected"
        );
        for subscription in subscriptions {
            subscription.cancel();
        }
        self.flush();
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Full rescan: drops members that left the collection or fail the
    /// predicate, then appends matching models that are not present yet.
    /// Works on a snapshot of the collection, so observers may write to
    /// the collection while the resulting messages are delivered.
    fn refresh(&self) {
        let Some(link) = self.link() else {
            return;
        };
        if !self.is_connected() {
            return;
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        let candidates = link.superset.models();
        let current = self.state.read().unwrap().models.clone();

        let by_id: HashMap<&R::Id, &Model<R>> =
            candidates.iter().map(|m| (m.id_ref(), m)).collect();
        let (kept, dropped): (Vec<_>, Vec<_>) = current.into_iter().partition(|m| {
            by_id
                .get(m.id_ref())
                .map_or(false, |candidate| candidate.same_entity(m))
                && Self::matches(&link, m)
        });

        let added: Vec<Model<R>> = {
            let kept_ids: HashSet<&R::Id> = kept.iter().map(Model::id_ref).collect();
            candidates
                .iter()
                .filter(|m| !kept_ids.contains(m.id_ref()) && Self::matches(&link, m))
                .cloned()
                .collect()
        };

        trace!(
            subset = %self.id,
            added = added.len(),
            dropped = dropped.len(),
            "refreshed"
        );
        {
            let mut state = self.state.write().unwrap();
            state.models = kept;
            state.models.extend(added.iter().cloned());
            self.queue.push(
                dropped
                    .into_iter()
                    .map(CollectionDiff::Removed)
                    .chain(added.into_iter().map(CollectionDiff::Added)),
            );
        }
        self.flush();
    }

    /// Incremental update for one collection message.
    fn sync(&self, diff: &CollectionDiff<R>) {
        let Some(link) = self.link() else {
            return;
        };

        if link.options.always_refresh {
            self.refresh();
            self.forward_synced(diff);
            return;
        }

        match diff {
            CollectionDiff::Added(model) | CollectionDiff::Removed(model) => {
                self.reconcile(&link, model.id_ref(), false)
            }
            CollectionDiff::Changed(model) => self.reconcile(&link, model.id_ref(), true),
            CollectionDiff::Reset => self.refresh(),
            CollectionDiff::Sorted(options) => {
                if options.sort_subsets {
                    self.apply_sort(&link.superset, *options);
                }
            }
            CollectionDiff::Synced { .. } => self.forward_synced(diff),
        }
    }

    fn forward_synced(&self, diff: &CollectionDiff<R>) {
        if let CollectionDiff::Synced { options, .. } = diff {
            if options.originating_subset == Some(self.id) {
                self.emit(vec![diff.clone()]);
            }
        }
    }

    /// Brings the membership of one id in line with the handle the
    /// collection holds for it right now. The message that triggered the
    /// call may describe an older state when a write re-entered the
    /// collection's delivery, so only its id is trusted.
    fn reconcile(&self, link: &SubsetConfig<R>, id: &R::Id, changed: bool) {
        let wanted = link
            .superset
            .get(id)
            .filter(|current| Self::matches(link, current));

        let mut state = self.state.write().unwrap();
        let member = state.models.iter().position(|m| m.id_ref() == id);

        let diffs = match (member, wanted) {
            (Some(idx), Some(current)) if state.models[idx].same_entity(&current) => {
                if changed {
                    vec![CollectionDiff::Changed(current)]
                } else {
                    Vec::new()
                }
            }
            (Some(idx), wanted) => {
                let mut diffs = vec![CollectionDiff::Removed(state.models.remove(idx))];
                if let Some(current) = wanted {
                    state.models.push(current.clone());
                    diffs.push(CollectionDiff::Added(current));
                }
                diffs
            }
            (None, Some(current)) => {
                state.models.push(current.clone());
                vec![CollectionDiff::Added(current)]
            }
            (None, None) => Vec::new(),
        };

        if !diffs.is_empty() {
            trace!(subset = %self.id, diffs = diffs.len(), "local update");
        }
        self.queue.push(diffs);
        drop(state);
        self.flush();
    }

    fn apply_sort(&self, superset: &Collection<R>, options: SortOptions) {
        let order: HashMap<R::Id, usize> = superset
            .models()
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.id(), idx))
            .collect();

        {
            let mut state = self.state.write().unwrap();
            state
                .models
                .sort_by_key(|m| order.get(m.id_ref()).copied().unwrap_or(usize::MAX));
            self.queue.push([CollectionDiff::Sorted(options)]);
        }
        self.flush();
    }
}

impl<R: Record> ConnectionTarget for SubsetShared<R> {
    fn release_connection(&self, id: ConnectionId) {
        let remaining = {
            let mut state = self.state.write().unwrap();
            if !state.connections.remove(&id) {
                return;
            }
            state.connections.len()
        };

        if remaining == 0 {
            self.disconnect();
        } else {
            trace!(subset = %self.id, remaining, "connection released");
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<R: Record> Clone for Subset<R> {
    fn clone(&self) -> Self {
        Subset(self.0.clone())
    }
}

impl<R: Record> Default for Subset<R> {
    fn default() -> Self {
        Subset::new()
    }
}

impl<R: Record> fmt::Debug for Subset<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.read().unwrap();
        f.debug_struct("Subset")
            .field("id", &self.0.id)
            .field("connections", &state.connections.len())
            .field("len", &state.models.len())
            .finish()
    }
}

impl<R: Record> View for Subset<R> {
    type Msg = CollectionDiff<R>;
}

impl<R: Record> CollectionView<R> for Subset<R> {
    fn len(&self) -> usize {
        self.0.state.read().unwrap().models.len()
    }

    fn at(&self, idx: usize) -> Option<Model<R>> {
        self.0.state.read().unwrap().models.get(idx).cloned()
    }

    fn get(&self, id: &R::Id) -> Option<Model<R>> {
        self.0
            .state
            .read()
            .unwrap()
            .models
            .iter()
            .find(|m| m.id_ref() == id)
            .cloned()
    }

    fn index_of(&self, id: &R::Id) -> Option<usize> {
        self.0
            .state
            .read()
            .unwrap()
            .models
            .iter()
            .position(|m| m.id_ref() == id)
    }

    fn models(&self) -> Vec<Model<R>> {
        self.0.state.read().unwrap().models.clone()
    }
}

impl<R: Record> Connectable for Subset<R> {
    fn subset_id(&self) -> SubsetId {
        self.0.id
    }

    fn connect(&self) -> Connection {
        self.0.connect()
    }
}

impl<R: Record> Retainable for Subset<R> {
    fn connectable(&self) -> Option<&dyn Connectable> {
        Some(self)
    }
}

impl<R: Record> Retainable for Collection<R> {}

impl<R: Record> DependencySource for Subset<R> {
    fn watch(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Subscription {
        self.on_diff(move |diff| {
            if diff.is_mutation() {
                on_change();
            }
        })
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::{
            buffer::collection::{AddOptions, Collection, SetOptions},
            error::LiveSetError,
            fixtures::{items, log_diffs, mirror, DiffLog, Item, MemoryTransport, Mirror},
            projection::{
                connection::Connection,
                dependency::ResourceRegistry,
                subset::{Subset, SubsetConfig, SubsetOptions},
            },
            view::collection::{CollectionDiff, CollectionView, CollectionViewExt, SortOptions},
        },
        proptest::prelude::*,
        std::sync::Arc,
    };

    fn above_four(collection: &Collection<Item>) -> Subset<Item> {
        collection.subset(|item: &Item| item.id > 4, SubsetOptions::default())
    }

    #[test]
    fn scenario_connect_add_remove_release() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        assert!(!subset.is_connected());
        assert!(subset.is_empty());

        let connection = subset.connect();
        assert_eq!(subset.ids(), vec![5, 6, 7, 8, 9]);

        collection.add(items([11]), AddOptions::default());
        assert_eq!(subset.ids(), vec![5, 6, 7, 8, 9, 11]);

        collection.remove([5]);
        assert_eq!(subset.ids(), vec![6, 7, 8, 9, 11]);

        connection.release();
        assert_eq!(subset.len(), 0);
        assert_eq!(collection.len(), 10);
    }

    #[test]
    fn refcount_gates_connection() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);

        let connections: Vec<Connection> = (0..3).map(|_| subset.connect()).collect();
        assert_eq!(subset.connection_count(), 3);
        assert_eq!(subset.refresh_count(), 1);

        subset.release(&connections[0]);
        subset.release(&connections[1]);
        assert!(subset.is_connected());
        assert_eq!(subset.len(), 5);

        subset.release(&connections[2]);
        assert!(!subset.is_connected());
        assert!(subset.is_empty());
    }

    #[test]
    fn double_and_foreign_release_are_noops() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let other = above_four(&collection);

        let a = subset.connect();
        let b = subset.connect();
        let foreign = other.connect();

        subset.release(&a);
        subset.release(&a);
        a.release();
        subset.release(&foreign);

        assert_eq!(subset.connection_count(), 1);
        assert_eq!(other.connection_count(), 1);
        assert!(a.is_released());
        assert!(!foreign.is_released());

        b.release();
        b.release();
        assert!(!subset.is_connected());
    }

    #[test]
    fn incremental_add_skips_rescan() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _connection = subset.connect();
        let rescans = subset.refresh_count();

        collection.add(items([20, 2]), AddOptions::default());

        assert_eq!(subset.refresh_count(), rescans);
        assert!(subset.contains(&20));
        assert!(!subset.contains(&2));
    }

    #[test]
    fn predicate_exit_and_entry_on_change() {
        let collection = Collection::with_records(items(0..10));
        let subset = collection.subset(|item: &Item| item.score > 4, SubsetOptions::default());
        let _connection = subset.connect();
        let log = DiffLog::default();
        let _sub = subset.on_diff(log_diffs(&log));

        collection.modify(&7, |item| item.score = 0);
        collection.modify(&1, |item| item.score = 100);
        collection.modify(&8, |item| item.score = 50);

        assert!(!subset.contains(&7));
        assert!(subset.contains(&1));
        assert_eq!(subset.get(&8).unwrap().get().score, 50);
        assert_eq!(
            *log.read().unwrap(),
            vec!["removed 7", "added 1", "changed 8"]
        );
    }

    #[test]
    fn reset_forces_rescan() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _connection = subset.connect();
        let rescans = subset.refresh_count();

        collection.reset(vec![Item::new(3, 0), Item::new(6, 0), Item::new(42, 0)]);

        assert_eq!(subset.refresh_count(), rescans + 1);
        assert_eq!(subset.ids(), vec![6, 42]);
        assert!(subset.get(&6).unwrap().same_entity(&collection.get(&6).unwrap()));
    }

    #[test]
    fn writes_are_delegated() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _connection = subset.connect();

        subset.add(items([12, 1]));
        assert!(collection.contains(&12) && collection.contains(&1));
        assert!(subset.contains(&12));
        assert!(!subset.contains(&1));

        subset.remove([12, 6]);
        assert!(!collection.contains(&12));
        assert!(!collection.contains(&6));
        assert!(!subset.contains(&6));

        subset.set(items([5, 30]), SetOptions::default());
        assert_eq!(collection.ids(), vec![5, 30]);
        assert_eq!(subset.ids(), vec![5, 30]);
    }

    #[test]
    fn release_leaves_collection_untouched() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let observers = collection.observer_count();
        let log = DiffLog::default();
        let _sub = subset.on_diff(log_diffs(&log));

        let connection = subset.connect();
        assert_eq!(collection.observer_count(), observers + 1);
        log.write().unwrap().clear();

        subset.release(&connection);
        assert_eq!(collection.observer_count(), observers);
        assert_eq!(collection.ids(), (0..10).collect::<Vec<_>>());
        assert_eq!(*log.read().unwrap(), vec!["reset"]);

        collection.add(items([15]), AddOptions::default());
        assert!(subset.is_empty());
    }

    #[test]
    fn dependency_change_forces_rescan() {
        let limits = Collection::with_records(items(0..3));
        let registry = ResourceRegistry::new();
        registry.register("limits", Arc::new(limits.clone()));

        let collection = Collection::with_records(items(0..10)).with_resolver(Arc::new(registry));
        let subset = {
            let limits = limits.clone();
            collection.subset(
                move |item: &Item| item.score >= limits.len() as i32,
                SubsetOptions::default()
                    .depends_on("limits")
                    .depends_on("missing"),
            )
        };

        let connection = subset.connect();
        assert_eq!(subset.len(), 7);
        assert_eq!(limits.observer_count(), 1);

        limits.add(items([3]), AddOptions::default());
        assert_eq!(subset.ids(), vec![4, 5, 6, 7, 8, 9]);
        assert_eq!(subset.refresh_count(), 2);

        limits.sort_by(|a, b| b.id.cmp(&a.id), SortOptions::default());
        assert_eq!(subset.refresh_count(), 3);

        limits.modify(&0, |item| item.score = 9);
        assert_eq!(subset.refresh_count(), 4);

        limits.reset(items(0..2));
        assert_eq!(subset.refresh_count(), 5);
        assert_eq!(subset.ids(), vec![4, 5, 6, 7, 8, 9, 2, 3]);

        limits.remove([1]);
        assert_eq!(subset.refresh_count(), 6);
        assert_eq!(subset.ids(), vec![4, 5, 6, 7, 8, 9, 2, 3, 1]);

        connection.release();
        assert_eq!(limits.observer_count(), 0);
        limits.reset(items(0..1));
        assert_eq!(subset.refresh_count(), 6);
    }

    #[test]
    fn always_refresh_rescans_on_every_message() {
        let collection = Collection::with_records(items(0..10));
        let subset = collection.subset(|item: &Item| item.id > 4, SubsetOptions::always_refresh());
        let _connection = subset.connect();
        assert_eq!(subset.refresh_count(), 1);

        collection.add(items([11]), AddOptions::default());
        collection.remove([5]);
        collection.modify(&6, |item| item.score = 0);

        assert_eq!(subset.refresh_count(), 4);
        assert_eq!(subset.ids(), vec![6, 7, 8, 9, 11]);
    }

    #[test]
    fn incremental_add_appends() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _connection = subset.connect();

        collection.add(
            items([50]),
            AddOptions {
                merge: false,
                at: Some(0),
            },
        );
        assert_eq!(collection.index_of(&50), Some(0));
        assert_eq!(subset.index_of(&50), Some(5));

        collection.sort_by(|a, b| a.id.cmp(&b.id), SortOptions { sort_subsets: false });
        assert_eq!(subset.index_of(&50), Some(5));

        collection.sort_by(|a, b| b.id.cmp(&a.id), SortOptions::default());
        assert_eq!(subset.ids(), vec![50, 9, 8, 7, 6, 5]);
    }

    #[test]
    fn synced_is_forwarded_by_originating_subset_only() {
        let transport = Arc::new(MemoryTransport::default());
        let collection = Collection::with_records(items(0..10)).with_transport(transport);
        let a = above_four(&collection);
        let b = above_four(&collection);
        let _ca = a.connect();
        let _cb = b.connect();
        let log_a = DiffLog::default();
        let log_b = DiffLog::default();
        let _sa = a.on_diff(log_diffs(&log_a));
        let _sb = b.on_diff(log_diffs(&log_b));

        let model = a.create(Item::new(42, 42)).unwrap();

        assert_eq!(model.id(), 42);
        assert_eq!(*log_a.read().unwrap(), vec!["added 42", "synced 42"]);
        assert_eq!(*log_b.read().unwrap(), vec!["added 42"]);
    }

    #[test]
    fn fetch_is_delegated() {
        let transport = Arc::new(MemoryTransport::with_remote(items([3, 7, 8])));
        let collection = Collection::with_records(items(0..10)).with_transport(transport);
        let subset = above_four(&collection);
        let _connection = subset.connect();

        let fetched = subset.fetch();

        assert_eq!(fetched.len(), 3);
        assert_eq!(collection.ids(), vec![3, 7, 8]);
        assert_eq!(subset.ids(), vec![7, 8]);
    }

    #[test]
    fn snapshot_of_disconnected_subset() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);

        let json = subset.to_json().unwrap();
        let records = subset.to_array();

        assert_eq!(json.as_array().map(Vec::len), Some(5));
        assert_eq!(json[0]["id"], 5);
        assert_eq!(records.len(), 5);
        assert!(!subset.is_connected());
        assert!(subset.is_empty());
        assert_eq!(collection.observer_count(), 0);
    }

    #[test]
    fn unconfigured_subset_is_inert() {
        let subset = Subset::<Item>::new();

        assert!(subset.add(items([1])).is_empty());
        assert!(subset.remove([1]).is_empty());
        assert!(subset.create(Item::new(1, 1)).is_none());
        assert!(subset.fetch().is_empty());

        let connection = subset.connect();
        assert!(subset.is_connected());
        assert!(subset.is_empty());
        subset.release(&connection);
    }

    #[test]
    fn configure_once() {
        let collection = Collection::with_records(items(0..10));
        let subset = Subset::<Item>::new();
        let connection = subset.connect();

        let config = || SubsetConfig {
            superset: collection.clone(),
            predicate: Arc::new(|item: &Item| item.id < 3),
            options: SubsetOptions::default(),
            resolver: None,
        };

        subset.configure(config()).unwrap();
        assert_eq!(subset.ids(), vec![0, 1, 2]);

        assert!(matches!(
            subset.configure(config()),
            Err(LiveSetError::AlreadyConfigured(id)) if id == subset.id()
        ));
        subset.release(&connection);
    }

    #[test]
    fn detach_tears_down() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let connection = subset.connect();

        subset.detach();

        assert!(!subset.is_connected());
        assert!(subset.superset().is_none());
        assert_eq!(collection.observer_count(), 0);
        assert!(subset.add(items([30])).is_empty());
        assert!(!collection.contains(&30));

        connection.release();
        assert_eq!(subset.connection_count(), 0);
    }

    #[test]
    fn observers_may_write_during_rescan() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);

        let _sub = {
            let collection = collection.clone();
            subset.on_diff(move |diff| {
                if let CollectionDiff::Added(model) = diff {
                    if model.id() == 5 {
                        collection.add(items([20]), AddOptions::default());
                    }
                }
            })
        };

        let _connection = subset.connect();
        assert_eq!(subset.ids(), vec![5, 6, 7, 8, 9, 20]);
    }

    #[test]
    fn stale_added_is_not_adopted() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _remover = {
            let collection = collection.clone();
            collection.clone().on_diff(move |diff| {
                if let CollectionDiff::Added(model) = diff {
                    if model.id() == 20 {
                        collection.remove([21]);
                    }
                }
            })
        };
        let seen = Mirror::default();
        let _mirror = subset.on_diff(mirror(&seen));
        let _connection = subset.connect();

        collection.add(items([20, 21]), AddOptions::default());

        assert!(!collection.contains(&21));
        assert_eq!(subset.ids(), vec![5, 6, 7, 8, 9, 20]);
        assert_eq!(*seen.read().unwrap(), subset.ids());
    }

    #[test]
    fn changed_for_a_removed_model_drops_it() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _remover = {
            let collection = collection.clone();
            collection.clone().on_diff(move |diff| {
                if let CollectionDiff::Changed(model) = diff {
                    if model.id() == 6 {
                        collection.remove([7]);
                    }
                }
            })
        };
        let _connection = subset.connect();

        collection.set(
            vec![Item::new(6, 60), Item::new(7, 70)],
            SetOptions {
                add: false,
                merge: true,
                remove: false,
            },
        );

        assert!(!collection.contains(&7));
        assert_eq!(subset.ids(), vec![5, 6, 8, 9]);
        assert_eq!(subset.get(&6).unwrap().get().score, 60);
    }

    #[test]
    fn subset_messages_replay_to_contents() {
        let collection = Collection::with_records(items(0..10));
        let subset = above_four(&collection);
        let _writer = {
            let collection = collection.clone();
            subset.on_diff(move |diff| {
                if let CollectionDiff::Added(model) = diff {
                    if model.id() == 5 {
                        collection.remove([6]);
                    }
                }
            })
        };
        let seen = Mirror::default();
        let _mirror = subset.on_diff(mirror(&seen));
        let log = DiffLog::default();
        let _log = subset.on_diff(log_diffs(&log));

        let _connection = subset.connect();

        assert_eq!(subset.ids(), vec![5, 7, 8, 9]);
        assert_eq!(*seen.read().unwrap(), subset.ids());
        assert_eq!(
            *log.read().unwrap(),
            vec!["added 5", "added 6", "added 7", "added 8", "added 9", "removed 6"]
        );
    }

    #[test]
    fn subset_can_be_a_dependency() {
        let collection = Collection::with_records(items(0..10));
        let high = above_four(&collection);
        let _high = high.connect();

        let registry = ResourceRegistry::new();
        registry.register("high", Arc::new(high.clone()));
        let other = Collection::with_records(items(0..3)).with_resolver(Arc::new(registry));
        let watcher = {
            let high = high.clone();
            other.subset(
                move |item: &Item| (item.id as usize) < high.len(),
                SubsetOptions::default().depends_on("high"),
            )
        };
        let _watcher = watcher.connect();
        assert_eq!(watcher.len(), 3);

        collection.remove([5, 6, 7]);
        assert_eq!(watcher.ids(), vec![0, 1]);
    }

    #[test]
    fn options_from_json() {
        let options: SubsetOptions =
            serde_json::from_str(r#"{ "dependencies": ["teams"] }"#).unwrap();
        assert!(!options.always_refresh);
        assert_eq!(options.dependencies, vec!["teams".to_string()]);
    }

    proptest! {
        #[test]
        fn connected_subset_matches_filter(
            ids in prop::collection::vec(0u32..60, 0..40),
            threshold in 0u32..60,
        ) {
            let collection = Collection::with_records(items(ids));
            let subset = collection.subset(move |item: &Item| item.id >= threshold, SubsetOptions::default());
            let _connection = subset.connect();
            subset.refresh();

            let mut expected: Vec<u32> = collection.filter(|item| item.id >= threshold).iter().map(|m| m.id()).collect();
            let mut actual = subset.ids();
            expected.sort();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn reset_yields_filtered_replacement(
            before in prop::collection::vec(0u32..60, 0..30),
            after in prop::collection::vec(0u32..60, 0..30),
            added in prop::collection::vec(0u32..60, 0..10),
        ) {
            let collection = Collection::with_records(items(before));
            let subset = collection.subset(|item: &Item| item.id % 3 == 0, SubsetOptions::default());
            let _connection = subset.connect();
            collection.add(items(added), AddOptions::default());

            collection.reset(items(after.clone()));

            let mut expected: Vec<u32> = after.into_iter().filter(|id| id % 3 == 0).collect();
            expected.sort();
            expected.dedup();
            let mut actual = subset.ids();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }
    }
}
