//! # Signals
//!
//! The two completion sources intercal coordinates:
//!
//! - [`Once`]: a settle-once source. It transitions exactly once to resolved
//!   or rejected; callbacks registered afterwards run immediately with the
//!   stored value, and `settled()` can be awaited.
//! - [`Event`]: a repeatable signal. An ordered list of subscriber closures
//!   invoked synchronously, in registration order, once per `fire`.
//!
//! Both are cheap `Rc` handles: clones observe and drive the same signal.
//! They are single-threaded (`!Send`).
//!
//! ## Re-entrancy
//!
//! No internal borrow is held while user callbacks run, so callbacks may
//! subscribe, unsubscribe, fire or settle other signals. A listener that is
//! unsubscribed while an event is firing is skipped if it has not run yet.
//!
//! ```rust
//! use intercal_core::signal::{Event, Once};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let ready: Once = Once::new();
//! ready.on_done(|args| assert_eq!(args, &vec![json!("ok")]));
//! assert!(ready.resolve(vec![json!("ok")]));
//! assert!(!ready.reject(vec![]));
//!
//! let clicks: Event = Event::new();
//! let seen = Rc::new(Cell::new(0));
//! let counter = seen.clone();
//! let id = clicks.subscribe(move |_| counter.set(counter.get() + 1));
//! clicks.fire(vec![]);
//! clicks.unsubscribe(id);
//! clicks.fire(vec![]);
//! assert_eq!(seen.get(), 1);
//! assert_eq!(clicks.fire_count(), 2);
//! ```

use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Ordered argument list carried by signals.
pub type Args = Vec<Value>;

// ============================================================================
// Event
// ============================================================================

/// Identity of a subscription on an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<A> = Rc<RefCell<dyn FnMut(&A)>>;

struct EventState<A> {
    listeners: Vec<(ListenerId, Listener<A>)>,
    next_id: u64,
    fire_count: u64,
    retired: bool,
}

/// A repeatable signal.
pub struct Event<A = Args> {
    state: Rc<RefCell<EventState<A>>>,
}

/// Non-owning handle to an [`Event`], used by listeners that must
/// unsubscribe themselves without keeping the event alive.
pub struct WeakEvent<A = Args> {
    state: Weak<RefCell<EventState<A>>>,
}

impl<A> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<A> Clone for WeakEvent<A> {
    fn clone(&self) -> Self {
        Self {
            state: Weak::clone(&self.state),
        }
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Event<A> {
    /// Creates an event with no listeners.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EventState {
                listeners: Vec::new(),
                next_id: 0,
                fire_count: 0,
                retired: false,
            })),
        }
    }

    /// Appends a listener and returns its identity.
    ///
    /// Listeners added to a retired event are dropped immediately; the
    /// returned id is never reported by [`has_listener`](Self::has_listener).
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&A) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        if !state.retired {
            let listener: Listener<A> = Rc::new(RefCell::new(listener));
            state.listeners.push((id, listener));
        }
        id
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|(listener, _)| *listener != id);
        state.listeners.len() != before
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.state
            .borrow()
            .listeners
            .iter()
            .any(|(listener, _)| *listener == id)
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Invokes every listener subscribed at the moment of firing.
    ///
    /// Firing a retired event does nothing.
    pub fn fire(&self, args: A) {
        let snapshot: Vec<(ListenerId, Listener<A>)> = {
            let mut state = self.state.borrow_mut();
            if state.retired {
                return;
            }
            state.fire_count += 1;
            state.listeners.clone()
        };

        for (id, listener) in snapshot {
            if !self.has_listener(id) {
                continue;
            }
            // A listener that re-fires its own event is not re-entered.
            if let Ok(mut listener) = listener.try_borrow_mut() {
                (&mut *listener)(&args);
            }
        }
    }

    /// Whether the event has fired at least once.
    pub fn fired(&self) -> bool {
        self.fire_count() > 0
    }

    pub fn fire_count(&self) -> u64 {
        self.state.borrow().fire_count
    }

    /// Drops every listener and ignores all future `subscribe`/`fire` calls.
    pub fn retire(&self) {
        let listeners = {
            let mut state = self.state.borrow_mut();
            state.retired = true;
            std::mem::take(&mut state.listeners)
        };
        drop(listeners);
    }

    pub fn is_retired(&self) -> bool {
        self.state.borrow().retired
    }

    pub fn downgrade(&self) -> WeakEvent<A> {
        WeakEvent {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Whether both handles refer to the same event.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<A> WeakEvent<A> {
    pub fn upgrade(&self) -> Option<Event<A>> {
        self.state.upgrade().map(|state| Event { state })
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Event")
                .field("listeners", &state.listeners.len())
                .field("fire_count", &state.fire_count)
                .field("retired", &state.retired)
                .finish(),
            Err(_) => f.debug_struct("Event").finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Once
// ============================================================================

/// Observable state of a [`Once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceState {
    Pending,
    Resolved,
    Rejected,
}

type DoneCallback<T> = Box<dyn FnOnce(&T)>;
type FailCallback<E> = Box<dyn FnOnce(&E)>;

struct OnceInner<T, E> {
    outcome: Option<Rc<Result<T, E>>>,
    done: Vec<DoneCallback<T>>,
    fail: Vec<FailCallback<E>>,
    wakers: Vec<Waker>,
    retired: bool,
}

/// A settle-once source.
///
/// Defaults to argument lists on both paths, which is the shape watched
/// actions use. Barriers use `Once<(), BarrierFailure>` for their outcome.
pub struct Once<T = Args, E = Args> {
    inner: Rc<RefCell<OnceInner<T, E>>>,
}

impl<T, E> Clone for Once<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, E: 'static> Default for Once<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, E: 'static> Once<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(OnceInner {
                outcome: None,
                done: Vec::new(),
                fail: Vec::new(),
                wakers: Vec::new(),
                retired: false,
            })),
        }
    }

    /// Settles successfully. Returns `true` only for the call that settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settles with a failure. Returns `true` only for the call that settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, result: Result<T, E>) -> bool {
        let (outcome, done, fail, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() || inner.retired {
                return false;
            }
            let outcome = Rc::new(result);
            inner.outcome = Some(Rc::clone(&outcome));
            (
                outcome,
                std::mem::take(&mut inner.done),
                std::mem::take(&mut inner.fail),
                std::mem::take(&mut inner.wakers),
            )
        };

        match outcome.as_ref() {
            Ok(value) => done.into_iter().for_each(|callback| callback(value)),
            Err(error) => fail.into_iter().for_each(|callback| callback(error)),
        }
        wakers.into_iter().for_each(Waker::wake);
        true
    }

    /// Registers a success callback; runs immediately if already resolved.
    pub fn on_done<F>(&self, callback: F)
    where
        F: FnOnce(&T) + 'static,
    {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    if !inner.retired {
                        inner.done.push(Box::new(callback));
                    }
                    return;
                }
            }
        };
        if let Ok(value) = outcome.as_ref() {
            callback(value);
        }
    }

    /// Registers a failure callback; runs immediately if already rejected.
    pub fn on_fail<F>(&self, callback: F)
    where
        F: FnOnce(&E) + 'static,
    {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    if !inner.retired {
                        inner.fail.push(Box::new(callback));
                    }
                    return;
                }
            }
        };
        if let Err(error) = outcome.as_ref() {
            callback(error);
        }
    }

    /// Registers both paths at once.
    pub fn on_settled<D, F>(&self, done: D, fail: F)
    where
        D: FnOnce(&T) + 'static,
        F: FnOnce(&E) + 'static,
    {
        self.on_done(done);
        self.on_fail(fail);
    }

    pub fn state(&self) -> OnceState {
        match self.inner.borrow().outcome.as_deref() {
            None => OnceState::Pending,
            Some(Ok(_)) => OnceState::Resolved,
            Some(Err(_)) => OnceState::Rejected,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// Drops pending callbacks and refuses to settle from now on.
    ///
    /// Already-settled values stay observable.
    pub fn retire(&self) {
        let (done, fail) = {
            let mut inner = self.inner.borrow_mut();
            inner.retired = true;
            (
                std::mem::take(&mut inner.done),
                std::mem::take(&mut inner.fail),
            )
        };
        drop(done);
        drop(fail);
    }

    pub fn is_retired(&self) -> bool {
        self.inner.borrow().retired
    }

    /// Whether both handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Once<T, E> {
    /// The settled value, if any.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner
            .borrow()
            .outcome
            .as_deref()
            .cloned()
    }

    /// Waits until the signal settles.
    ///
    /// A retired signal that never settled keeps the future pending.
    pub fn settled(&self) -> Settled<T, E> {
        Settled { once: self.clone() }
    }
}

impl<T, E> fmt::Debug for Once<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => {
                let state = match inner.outcome.as_deref() {
                    None => OnceState::Pending,
                    Some(Ok(_)) => OnceState::Resolved,
                    Some(Err(_)) => OnceState::Rejected,
                };
                f.debug_struct("Once")
                    .field("state", &state)
                    .field("retired", &inner.retired)
                    .finish()
            }
            Err(_) => f.debug_struct("Once").finish_non_exhaustive(),
        }
    }
}

/// Future returned by [`Once::settled`].
pub struct Settled<T, E> {
    once: Once<T, E>,
}

impl<T: Clone, E: Clone> Future for Settled<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.once.inner.borrow_mut();

        if let Some(outcome) = inner.outcome.as_deref() {
            return Poll::Ready(outcome.clone());
        }

        let registered = inner.wakers.iter().any(|waker| waker.will_wake(cx.waker()));
        if !registered {
            inner.wakers.push(cx.waker().clone());
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_event_fires_in_registration_order() {
        let event: Event = Event::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            event.subscribe(move |_| order.borrow_mut().push(n));
        }
        event.fire(vec![]);

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(event.fired());
    }

    #[test]
    fn test_event_unsubscribe_leaves_other_listeners() {
        let event: Event = Event::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));

        let a_count = a.clone();
        let first = event.subscribe(move |_| a_count.set(a_count.get() + 1));
        let b_count = b.clone();
        event.subscribe(move |_| b_count.set(b_count.get() + 1));

        assert!(event.unsubscribe(first));
        assert!(!event.unsubscribe(first));
        event.fire(vec![]);
        event.fire(vec![]);

        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 2);
        assert_eq!(event.listener_count(), 1);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_while_firing() {
        let event: Event = Event::new();
        let calls = Rc::new(Cell::new(0));
        let id_slot = Rc::new(Cell::new(None));

        let weak = event.downgrade();
        let slot = id_slot.clone();
        let counter = calls.clone();
        let id = event.subscribe(move |_| {
            counter.set(counter.get() + 1);
            if let (Some(event), Some(id)) = (weak.upgrade(), slot.get()) {
                event.unsubscribe(id);
            }
        });
        id_slot.set(Some(id));

        event.fire(vec![]);
        event.fire(vec![]);

        assert_eq!(calls.get(), 1);
        assert!(!event.has_listener(id));
        assert_eq!(event.fire_count(), 2);
    }

    #[test]
    fn test_listener_removed_mid_fire_is_skipped() {
        let event: Event = Event::new();
        let second_ran = Rc::new(Cell::new(false));
        let second_id = Rc::new(Cell::new(None));

        let handle = event.clone();
        let target = second_id.clone();
        event.subscribe(move |_| {
            if let Some(id) = target.get() {
                handle.unsubscribe(id);
            }
        });
        let ran = second_ran.clone();
        second_id.set(Some(event.subscribe(move |_| ran.set(true))));

        event.fire(vec![]);
        assert!(!second_ran.get());
    }

    #[test]
    fn test_event_passes_args() {
        let event: Event = Event::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        event.subscribe(move |args| *sink.borrow_mut() = Some(args.clone()));

        event.fire(vec![json!(1), json!("two")]);
        assert_eq!(*seen.borrow(), Some(vec![json!(1), json!("two")]));
    }

    #[test]
    fn test_retired_event_ignores_fire_and_subscribe() {
        let event: Event = Event::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        event.subscribe(move |_| counter.set(counter.get() + 1));

        event.retire();
        event.fire(vec![]);
        let late = event.subscribe(|_| {});

        assert_eq!(calls.get(), 0);
        assert!(!event.fired());
        assert!(!event.has_listener(late));
        assert!(event.is_retired());
    }

    #[test]
    fn test_once_settles_only_once() {
        let once: Once = Once::new();
        assert_eq!(once.state(), OnceState::Pending);

        assert!(once.reject(vec![json!("boom")]));
        assert!(!once.resolve(vec![]));
        assert!(!once.reject(vec![]));

        assert_eq!(once.state(), OnceState::Rejected);
        assert_eq!(once.outcome(), Some(Err(vec![json!("boom")])));
    }

    #[test]
    fn test_once_late_callbacks_run_immediately() {
        let once: Once = Once::new();
        once.resolve(vec![json!(true)]);

        let done = Rc::new(Cell::new(false));
        let failed = Rc::new(Cell::new(false));
        let done_flag = done.clone();
        let fail_flag = failed.clone();
        once.on_settled(move |_| done_flag.set(true), move |_| fail_flag.set(true));

        assert!(done.get());
        assert!(!failed.get());
    }

    #[test]
    fn test_once_fail_callbacks_receive_payload() {
        let once: Once = Once::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        once.on_fail(move |args| sink.borrow_mut().extend(args.iter().cloned()));
        once.on_done(|_| panic!("must not resolve"));

        once.reject(vec![json!(404), json!("not found")]);
        assert_eq!(*seen.borrow(), vec![json!(404), json!("not found")]);
    }

    #[test]
    fn test_retired_once_refuses_to_settle() {
        let once: Once = Once::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        once.on_done(move |_| counter.set(counter.get() + 1));

        once.retire();
        assert!(!once.resolve(vec![]));
        assert_eq!(once.state(), OnceState::Pending);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_callback_may_settle_another_once() {
        let first: Once<(), ()> = Once::new();
        let second: Once<(), ()> = Once::new();

        let chained = second.clone();
        first.on_done(move |_| {
            chained.resolve(());
        });
        first.resolve(());

        assert_eq!(second.state(), OnceState::Resolved);
    }

    #[test]
    fn test_settled_future_resolves() {
        let once: Once<u32, String> = Once::new();
        let waiter = once.settled();
        once.resolve(7);

        let result = futures::executor::block_on(waiter);
        assert_eq!(result, Ok(7));
    }
}
