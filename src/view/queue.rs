use {
    crate::view::{Observer, View},
    std::{collections::VecDeque, sync::Mutex},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Dispatch Queue
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
struct QueueState<M> {
    pending: VecDeque<M>,
    draining: bool,
}

/// Outgoing messages of one view, delivered strictly in the order they
/// were pushed.
///
/// Writers push while still holding the lock that protects the state
/// the messages describe, then `flush` after releasing it. A flush that
/// starts while another one is running (an observer writing back into
/// the view it observes) returns immediately; the running loop picks up
/// the new messages after the one it is delivering. Observers thus never
/// see a message describing a state older than one they already saw.
pub struct DispatchQueue<V: View + ?Sized> {
    state: Mutex<QueueState<V::Msg>>,
}

impl<V: View + ?Sized> DispatchQueue<V> {
    pub fn new() -> Self {
        DispatchQueue {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    pub fn push(&self, msgs: impl IntoIterator<Item = V::Msg>) {
        self.state.lock().unwrap().pending.extend(msgs);
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().unwrap().draining
    }

    pub fn flush<O: Observer<V> + ?Sized>(&self, observer: &O) {
        {
            let mut state = self.state.lock().unwrap();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let mut guard = Draining {
            state: &self.state,
            armed: true,
        };
        loop {
            let msg = {
                let mut state = self.state.lock().unwrap();
                match state.pending.pop_front() {
                    Some(msg) => msg,
                    None => {
                        state.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            observer.notify(&msg);
        }
    }
}

impl<V: View + ?Sized> Default for DispatchQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Unblocks the queue when an observer panics mid-delivery.
struct Draining<'a, M> {
    state: &'a Mutex<QueueState<M>>,
    armed: bool,
}

impl<M> Drop for Draining<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.draining = false;
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
