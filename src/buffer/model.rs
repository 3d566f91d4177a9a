use {
    serde::{Serialize, Serializer},
    std::{
        fmt::{self, Debug},
        hash::{Hash, Hasher},
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Attributes of an entity stored in a `Collection`.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Model
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Identity-bearing handle to one entity.
///
/// Clones share the same attribute cell, so an attribute change made
/// through the owning collection is seen by every subset holding the
/// model. The id is taken once on construction; equality and hashing
/// only look at the id.
pub struct Model<R: Record> {
    id: R::Id,
    attrs: Arc<RwLock<R>>,
}

impl<R: Record> Model<R> {
    pub fn new(record: R) -> Self {
        Model {
            id: record.id(),
            attrs: Arc::new(RwLock::new(record)),
        }
    }

    pub fn id(&self) -> R::Id {
        self.id.clone()
    }

    pub fn id_ref(&self) -> &R::Id {
        &self.id
    }

    /// Clone of the current attributes.
    pub fn get(&self) -> R {
        self.attrs.read().unwrap().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.attrs.read().unwrap())
    }

    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.attrs.write().unwrap())
    }

    pub(crate) fn replace(&self, record: R) {
        *self.attrs.write().unwrap() = record;
    }

    /// True if both handles point at the same attribute cell, which is
    /// stricter than `==` (same id).
    pub fn same_entity(&self, other: &Model<R>) -> bool {
        Arc::ptr_eq(&self.attrs, &other.attrs)
    }
}

impl<R: Record> Clone for Model<R> {
    fn clone(&self) -> Self {
        Model {
            id: self.id.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl<R: Record> From<R> for Model<R> {
    fn from(record: R) -> Self {
        Model::new(record)
    }
}

impl<R: Record> PartialEq for Model<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: Record> Eq for Model<R> {}

impl<R: Record> Hash for Model<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<R: Record> Debug for Model<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Model").field(&self.id).finish()
    }
}

impl<R: Record + Serialize> Serialize for Model<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attrs.read().unwrap().serialize(serializer)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
