use {
    crate::{
        buffer::{
            model::{Model, Record},
            transport::Transport,
        },
        error::Result,
        projection::{
            dependency::{DependencySource, Resolve},
            subset::{Subset, SubsetConfig, SubsetOptions},
        },
        view::{
            collection::{
                CollectionBroadcast, CollectionDiff, CollectionObserver, CollectionView,
                SortOptions, SyncOptions,
            },
            DispatchQueue, NotifyFnObserver, ObserverBroadcast, Subscription, View,
        },
    },
    serde::Serialize,
    std::{
        cmp::Ordering,
        collections::HashSet,
        sync::{Arc, RwLock},
    },
    tracing::{trace, warn},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Replace the attributes of models whose id is already present.
    pub merge: bool,
    /// Insert position; `None` appends.
    pub at: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetOptions {
    pub add: bool,
    pub merge: bool,
    pub remove: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        SetOptions {
            add: true,
            merge: true,
            remove: true,
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Collection
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
struct CollectionShared<R: Record> {
    models: RwLock<Vec<Model<R>>>,
    cast: CollectionBroadcast<R>,
    queue: DispatchQueue<dyn CollectionView<R>>,
    transport: RwLock<Option<Arc<dyn Transport<R>>>>,
    resolver: RwLock<Option<Arc<dyn Resolve>>>,
}

/// Ordered, id-unique collection owning its models.
///
/// Every write queues its `CollectionDiff` messages under the internal
/// lock and delivers them synchronously once the lock is released. A
/// write made by an observer during delivery is delivered after the
/// message being handled, so every observer sees the writes in the order
/// they were applied. Clones are handles to the same collection.
pub struct Collection<R: Record>(Arc<CollectionShared<R>>);

impl<R: Record> Collection<R> {
    pub fn new() -> Self {
        Collection(Arc::new(CollectionShared {
            models: RwLock::new(Vec::new()),
            cast: Arc::new(RwLock::new(ObserverBroadcast::new())),
            queue: DispatchQueue::new(),
            transport: RwLock::new(None),
            resolver: RwLock::new(None),
        }))
    }

    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        let collection = Collection::new();
        *collection.0.models.write().unwrap() = dedup(records);
        collection
    }

    pub fn with_transport(self, transport: Arc<dyn Transport<R>>) -> Self {
        *self.0.transport.write().unwrap() = Some(transport);
        self
    }

    /// Resolver handed to every subset created through `subset()`.
    pub fn with_resolver(self, resolver: Arc<dyn Resolve>) -> Self {
        *self.0.resolver.write().unwrap() = Some(resolver);
        self
    }

    pub(crate) fn resolver(&self) -> Option<Arc<dyn Resolve>> {
        self.0.resolver.read().unwrap().clone()
    }

    fn transport(&self) -> Option<Arc<dyn Transport<R>>> {
        self.0.transport.read().unwrap().clone()
    }

    pub fn same_collection(&self, other: &Collection<R>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
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

    /// Number of live observers, subsets included.
    pub fn observer_count(&self) -> usize {
        self.0.cast.read().unwrap().len()
    }

    fn emit(&self, diffs: Vec<CollectionDiff<R>>) {
        self.0.queue.push(diffs);
        self.flush();
    }

    fn flush(&self) {
        self.0.queue.flush(&*self.0.cast);
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Adds unseen models and returns them. Ids that are already present
    /// are skipped, or merged when `options.merge` is set.
    pub fn add<M: Into<Model<R>>>(
        &self,
        models: impl IntoIterator<Item = M>,
        options: AddOptions,
    ) -> Vec<Model<R>> {
        let mut added = Vec::new();
        let mut diffs = Vec::new();
        {
            let mut state = self.0.models.write().unwrap();
            let mut at = options.at.map(|i| i.min(state.len()));

            for model in models.into_iter().map(Into::into) {
                if let Some(existing) = state.iter().find(|m| **m == model) {
                    if options.merge && !existing.same_entity(&model) {
                        existing.replace(model.get());
                        diffs.push(CollectionDiff::Changed(existing.clone()));
                    }
                    continue;
                }

                match at.as_mut() {
                    Some(i) => {
                        state.insert(*i, model.clone());
                        *i += 1;
                    }
                    None => state.push(model.clone()),
                }
                added.push(model.clone());
                diffs.push(CollectionDiff::Added(model));
            }
            self.0.queue.push(diffs);
        }

        trace!(added = added.len(), "collection add");
        self.flush();
        added
    }

    /// Removes the models with the given ids; unknown ids are ignored.
    pub fn remove(&self, ids: impl IntoIterator<Item = R::Id>) -> Vec<Model<R>> {
        let removed: Vec<Model<R>> = {
            let mut state = self.0.models.write().unwrap();
            let removed: Vec<Model<R>> = ids
                .into_iter()
                .filter_map(|id| {
                    let idx = state.iter().position(|m| *m.id_ref() == id)?;
                    Some(state.remove(idx))
                })
                .collect();
            self.0
                .queue
                .push(removed.iter().cloned().map(CollectionDiff::Removed));
            removed
        };

        trace!(removed = removed.len(), "collection remove");
        self.flush();
        removed
    }

    /// Replaces the whole content and emits a single `Reset`.
    pub fn reset<M: Into<Model<R>>>(&self, models: impl IntoIterator<Item = M>) {
        let models = dedup(models);
        trace!(len = models.len(), "collection reset");
        {
            let mut state = self.0.models.write().unwrap();
            *state = models;
            self.0.queue.push([CollectionDiff::Reset]);
        }
        self.flush();
    }

    /// Smart update: adds new ids, merges known ones and removes the ones
    /// that are missing from `models`, each step gated by `options`.
    pub fn set<M: Into<Model<R>>>(&self, models: impl IntoIterator<Item = M>, options: SetOptions) {
        let incoming = dedup(models);
        {
            let mut removed = Vec::new();
            let mut added = Vec::new();
            let mut changed = Vec::new();
            let mut state = self.0.models.write().unwrap();

            if options.remove {
                let keep: HashSet<&R::Id> = incoming.iter().map(Model::id_ref).collect();
                let (stay, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut *state)
                    .into_iter()
                    .partition(|m| keep.contains(m.id_ref()));
                *state = stay;
                removed = gone;
            }

            for model in incoming.iter() {
                if let Some(existing) = state.iter().find(|m| *m == model) {
                    if options.merge && !existing.same_entity(model) {
                        existing.replace(model.get());
                        changed.push(existing.clone());
                    }
                } else if options.add {
                    state.push(model.clone());
                    added.push(model.clone());
                }
            }

            trace!(
                added = added.len(),
                removed = removed.len(),
                changed = changed.len(),
                "collection set"
            );
            self.0.queue.push(
                removed
                    .into_iter()
                    .map(CollectionDiff::Removed)
                    .chain(added.into_iter().map(CollectionDiff::Added))
                    .chain(changed.into_iter().map(CollectionDiff::Changed)),
            );
        }
        self.flush();
    }

    /// Mutates the attributes of one model in place and emits `Changed`.
    /// The id is fixed at construction, changes to it are not tracked.
    pub fn modify(&self, id: &R::Id, f: impl FnOnce(&mut R)) -> bool {
        match self.get(id) {
            Some(model) => {
                model.write(f);
                self.emit(vec![CollectionDiff::Changed(model)]);
                true
            }
            None => false,
        }
    }

    /// Stable reorder; subsets mirror it unless `options.sort_subsets`
    /// is false.
    pub fn sort_by(&self, mut cmp: impl FnMut(&R, &R) -> Ordering, options: SortOptions) {
        {
            let mut state = self.0.models.write().unwrap();
            state.sort_by(|a, b| {
                if a.same_entity(b) {
                    return Ordering::Equal;
                }
                a.read(|x| b.read(|y| cmp(x, y)))
            });
            self.0.queue.push([CollectionDiff::Sorted(options)]);
        }
        self.flush();
    }

    pub fn filter(&self, pred: impl Fn(&R) -> bool) -> Vec<Model<R>> {
        self.models()
            .into_iter()
            .filter(|m| m.read(|r| pred(r)))
            .collect()
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Persists `record` through the transport, adds (or merges) it and
    /// emits `Synced` with the transport response. Without a transport
    /// the record is added and the response is `null`. Nothing is added
    /// when the transport fails.
    pub fn create(&self, record: R, options: SyncOptions) -> Result<Model<R>> {
        let response = match self.transport() {
            Some(transport) => transport.create(&record).map_err(|err| {
                warn!(id = ?record.id(), %err, "create failed");
                err
            })?,
            None => serde_json::Value::Null,
        };

        let model = Model::new(record);
        self.add(
            vec![model.clone()],
            AddOptions {
                merge: true,
                at: None,
            },
        );
        let model = self.get(model.id_ref()).unwrap_or(model);

        self.emit(vec![CollectionDiff::Synced {
            model: model.clone(),
            response,
            options,
        }]);
        Ok(model)
    }

    /// Loads the canonical list from the transport and `set`s it, then
    /// emits one `Synced` per fetched model.
    pub fn fetch(&self, options: SyncOptions) -> Result<Vec<Model<R>>> {
        let Some(transport) = self.transport() else {
            return Ok(Vec::new());
        };

        let records = transport.fetch().map_err(|err| {
            warn!(%err, "fetch failed");
            err
        })?;
        let ids: Vec<R::Id> = records.iter().map(Record::id).collect();
        self.set(records, SetOptions::default());

        let models: Vec<Model<R>> = ids.iter().filter_map(|id| self.get(id)).collect();
        self.emit(
            models
                .iter()
                .map(|model| CollectionDiff::Synced {
                    model: model.clone(),
                    response: serde_json::Value::Null,
                    options,
                })
                .collect(),
        );
        Ok(models)
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Creates a live subset of this collection. It starts disconnected
    /// and empty.
    pub fn subset<P>(&self, predicate: P, options: SubsetOptions) -> Subset<R>
    where
        P: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Subset::with_config(SubsetConfig {
            superset: self.clone(),
            predicate: Arc::new(predicate),
            options,
            resolver: self.resolver(),
        })
    }

    pub fn to_json(&self) -> Result<serde_json::Value>
    where
        R: Serialize,
    {
        Ok(serde_json::to_value(self.models())?)
    }
}

fn dedup<R: Record, M: Into<Model<R>>>(models: impl IntoIterator<Item = M>) -> Vec<Model<R>> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .map(Into::into)
        .filter(|m: &Model<R>| seen.insert(m.id()))
        .collect()
}

impl<R: Record> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Collection(self.0.clone())
    }
}

impl<R: Record> Default for Collection<R> {
    fn default() -> Self {
        Collection::new()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<R: Record> View for Collection<R> {
    type Msg = CollectionDiff<R>;
}

impl<R: Record> CollectionView<R> for Collection<R> {
    fn len(&self) -> usize {
        self.0.models.read().unwrap().len()
    }

    fn at(&self, idx: usize) -> Option<Model<R>> {
        self.0.models.read().unwrap().get(idx).cloned()
    }

    fn get(&self, id: &R::Id) -> Option<Model<R>> {
        self.0
            .models
            .read()
            .unwrap()
            .iter()
            .find(|m| m.id_ref() == id)
            .cloned()
    }

    fn index_of(&self, id: &R::Id) -> Option<usize> {
        self.0
            .models
            .read()
            .unwrap()
            .iter()
            .position(|m| m.id_ref() == id)
    }

    fn models(&self) -> Vec<Model<R>> {
        self.0.models.read().unwrap().clone()
    }
}

impl<R: Record> DependencySource for Collection<R> {
    fn watch(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Subscription {
        self.on_diff(move |diff| {
            if diff.is_mutation() {
                on_change();
            }
        })
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
