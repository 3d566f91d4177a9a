
                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                   View
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait View: Send + Sync {
    /// Notification message for the observers
    type Msg: Send + Sync;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

use std::sync::{Arc, RwLock};

impl<V: View + ?Sized> View for RwLock<V> {
    type Msg = V::Msg;
}

impl<V: View + ?Sized> View for Arc<V> {
    type Msg = V::Msg;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub mod observer;
pub mod queue;
pub mod subscription;

pub use {
    observer::{NotifyFnObserver, Observer, ObserverBroadcast, ObserverExt},
    queue::DispatchQueue,
    subscription::{Subscription, SubscriptionId},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub mod collection;
