use {
    crate::view::{
        subscription::{Subscription, SubscriptionId},
        View,
    },
    std::sync::{Arc, RwLock, Weak},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Observer
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Receives the diff messages of a view.
///
/// Dispatch is synchronous and may re-enter: an observer is allowed to
/// write to the view it observes from inside `notify`. Implementations
/// keep their own state behind interior locks and must not hold them
/// while emitting further messages.
pub trait Observer<V: View + ?Sized>: Send + Sync {
    fn notify(&self, msg: &V::Msg);
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<V: View + ?Sized, O: Observer<V> + ?Sized> Observer<V> for Arc<O> {
    fn notify(&self, msg: &V::Msg) {
        (**self).notify(msg);
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait ObserverExt<V: View + ?Sized>: Observer<V> {
    fn notify_each(&self, it: impl IntoIterator<Item = V::Msg>);
}

impl<V: View + ?Sized, T: Observer<V> + ?Sized> ObserverExt<V> for T {
    fn notify_each(&self, it: impl IntoIterator<Item = V::Msg>) {
        for msg in it {
            self.notify(&msg);
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Broadcast
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub struct ObserverBroadcast<V: View + ?Sized> {
    next_id: u64,
    observers: Vec<(SubscriptionId, Weak<dyn Observer<V>>)>,
}

impl<V: View + ?Sized + 'static> ObserverBroadcast<V> {
    pub fn new() -> Self {
        ObserverBroadcast {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, obs: Weak<dyn Observer<V>>) -> SubscriptionId {
        self.cleanup();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, obs));
        id
    }

    pub fn remove_observer(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.cleanup();
        self.observers.len() != before
    }

    /// Number of observers that are still alive.
    pub fn len(&self) -> usize {
        self.observers
            .iter()
            .filter(|(_, o)| o.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cleanup(&mut self) {
        self.observers.retain(|(_, o)| o.strong_count() > 0);
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observer<V>>> {
        self.observers.iter().filter_map(|(_, o)| o.upgrade()).collect()
    }

    /// Registers `observer` on the shared broadcast and hands out the
    /// handle that owns it.
    pub fn subscribe(cast: &Arc<RwLock<Self>>, observer: Arc<dyn Observer<V>>) -> Subscription {
        let id = cast.write().unwrap().add_observer(Arc::downgrade(&observer));
        let cast = Arc::downgrade(cast);

        Subscription::new(id, move || {
            if let Some(cast) = cast.upgrade() {
                cast.write().unwrap().remove_observer(id);
            }
            drop(observer);
        })
    }
}

impl<V: View + ?Sized + 'static> Default for ObserverBroadcast<V> {
    fn default() -> Self {
        Self::new()
    }
}

// The observer list is copied before dispatch so that observers can
// subscribe, unsubscribe or emit while the message is being delivered.
impl<V: View + ?Sized + 'static> Observer<V> for RwLock<ObserverBroadcast<V>> {
    fn notify(&self, msg: &V::Msg) {
        let observers = self.read().unwrap().snapshot();
        for o in observers {
            o.notify(msg);
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub struct NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&V)>,
}

impl<V, F> NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        NotifyFnObserver {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<V, F> Observer<V> for NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    fn notify(&self, msg: &V::Msg) {
        (self.f)(msg);
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct Counter;

    impl View for Counter {
        type Msg = usize;
    }

    fn counting(total: &Arc<AtomicUsize>) -> Arc<dyn Observer<Counter>> {
        let total = total.clone();
        Arc::new(NotifyFnObserver::<Counter, _>::new(move |n: &usize| {
            total.fetch_add(*n, Ordering::SeqCst);
        }))
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let cast = Arc::new(RwLock::new(ObserverBroadcast::<Counter>::new()));
        let total = Arc::new(AtomicUsize::new(0));

        let _a = ObserverBroadcast::subscribe(&cast, counting(&total));
        let _b = ObserverBroadcast::subscribe(&cast, counting(&total));

        cast.notify(&3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
        assert_eq!(cast.read().unwrap().len(), 2);
    }

    #[test]
    fn cancelled_subscription_is_removed() {
        let cast = Arc::new(RwLock::new(ObserverBroadcast::<Counter>::new()));
        let total = Arc::new(AtomicUsize::new(0));

        let a = ObserverBroadcast::subscribe(&cast, counting(&total));
        let b = ObserverBroadcast::subscribe(&cast, counting(&total));
        assert_ne!(a.id(), b.id());

        a.cancel();
        cast.notify_each(vec![1, 1]);
        assert_eq!(total.load(Ordering::SeqCst), 2);
        assert_eq!(cast.read().unwrap().len(), 1);

        drop(b);
        assert!(cast.read().unwrap().is_empty());
    }

    #[test]
    fn observer_may_unsubscribe_during_dispatch() {
        let cast = Arc::new(RwLock::new(ObserverBroadcast::<Counter>::new()));
        let slot: Arc<RwLock<Option<Subscription>>> = Arc::new(RwLock::new(None));

        let observer = {
            let slot = slot.clone();
            Arc::new(NotifyFnObserver::<Counter, _>::new(move |_: &usize| {
                if let Some(sub) = slot.write().unwrap().take() {
                    sub.cancel();
                }
            }))
        };
        *slot.write().unwrap() = Some(ObserverBroadcast::subscribe(&cast, observer));

        cast.notify(&0);
        assert!(cast.read().unwrap().is_empty());
        assert!(slot.read().unwrap().is_none());
    }
}
