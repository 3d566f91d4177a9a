use {
    crate::{
        buffer::model::{Model, Record},
        projection::subset::SubsetId,
        view::{Observer, ObserverBroadcast, View},
    },
    serde::{Deserialize, Serialize},
    std::sync::{Arc, RwLock},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Options carried by a `Sorted` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    /// When false, subsets keep their current order instead of
    /// mirroring the new collection order.
    pub sort_subsets: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions { sort_subsets: true }
    }
}

/// Options for operations that go through the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// The subset a request was issued through, if any. Only that
    /// subset re-emits the resulting `Synced` message.
    pub originating_subset: Option<SubsetId>,
}

impl SyncOptions {
    pub fn from_subset(id: SubsetId) -> Self {
        SyncOptions {
            originating_subset: Some(id),
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Debug)]
pub enum CollectionDiff<R: Record> {
    Added(Model<R>),
    Removed(Model<R>),
    Reset,
    Changed(Model<R>),
    Sorted(SortOptions),
    Synced {
        model: Model<R>,
        response: serde_json::Value,
        options: SyncOptions,
    },
}

impl<R: Record> CollectionDiff<R> {
    /// Everything except `Synced` changes membership, attributes or order.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, CollectionDiff::Synced { .. })
    }

    pub fn model(&self) -> Option<&Model<R>> {
        match self {
            CollectionDiff::Added(m)
            | CollectionDiff::Removed(m)
            | CollectionDiff::Changed(m)
            | CollectionDiff::Synced { model: m, .. } => Some(m),
            CollectionDiff::Reset | CollectionDiff::Sorted(_) => None,
        }
    }
}

pub type CollectionBroadcast<R> = Arc<RwLock<ObserverBroadcast<dyn CollectionView<R>>>>;
pub type CollectionObserver<R> = Arc<dyn Observer<dyn CollectionView<R>>>;

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Collection View
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Read access shared by collections and their subsets.
pub trait CollectionView<R: Record>: View<Msg = CollectionDiff<R>> {
    fn len(&self) -> usize;
    fn at(&self, idx: usize) -> Option<Model<R>>;
    fn get(&self, id: &R::Id) -> Option<Model<R>>;
    fn index_of(&self, id: &R::Id) -> Option<usize>;

    /// Snapshot of the current models, in order.
    fn models(&self) -> Vec<Model<R>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &R::Id) -> bool {
        self.index_of(id).is_some()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait CollectionViewExt<R: Record>: CollectionView<R> {
    fn iter(&self) -> CollectionViewIter<'_, R, Self> {
        CollectionViewIter {
            view: self,
            cur: 0,
            _phantom: std::marker::PhantomData,
        }
    }

    fn ids(&self) -> Vec<R::Id> {
        self.models().iter().map(Model::id).collect()
    }

    /// Attribute snapshot of every model, in order.
    fn to_records(&self) -> Vec<R> {
        self.models().iter().map(Model::get).collect()
    }
}

impl<R: Record, V: CollectionView<R> + ?Sized> CollectionViewExt<R> for V {}

pub struct CollectionViewIter<'a, R, V>
where
    R: Record,
    V: CollectionView<R> + ?Sized,
{
    view: &'a V,
    cur: usize,
    _phantom: std::marker::PhantomData<R>,
}

impl<'a, R, V> Iterator for CollectionViewIter<'a, R, V>
where
    R: Record,
    V: CollectionView<R> + ?Sized,
{
    type Item = Model<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur;
        self.cur += 1;
        self.view.at(i)
    }
}
