//! Watched actions: the uniform view a barrier has of its inputs.

use crate::signal::{Args, Event, ListenerId, Once};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// How a watched action completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    /// Carries the full argument list passed to the failure path.
    Failed(Args),
}

/// A completion source registered with a barrier.
#[derive(Clone)]
pub enum WatchedAction {
    /// Completes when the `Once` settles, with its failure payload if rejected.
    SettleOnce(Once),
    /// Completes on the first fire; later fires are not observed.
    Repeatable(Event),
}

impl WatchedAction {
    /// Calls `callback` exactly once, on the action's first completion.
    ///
    /// Sources that already completed (a settled `Once`, an `Event` that has
    /// fired) report synchronously, before this method returns.
    pub fn on_first_completion<F>(&self, callback: F)
    where
        F: FnOnce(Completion) + 'static,
    {
        let slot = Rc::new(Cell::new(Some(callback)));

        match self {
            WatchedAction::SettleOnce(once) => {
                let on_done = Rc::clone(&slot);
                let on_fail = slot;
                once.on_settled(
                    move |_| {
                        if let Some(callback) = on_done.take() {
                            callback(Completion::Succeeded);
                        }
                    },
                    move |args: &Args| {
                        if let Some(callback) = on_fail.take() {
                            callback(Completion::Failed(args.clone()));
                        }
                    },
                );
            }
            WatchedAction::Repeatable(event) => {
                if event.fired() {
                    if let Some(callback) = slot.take() {
                        callback(Completion::Succeeded);
                    }
                    return;
                }

                let own_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
                let listener_id = Rc::clone(&own_id);
                let weak = event.downgrade();
                let id = event.subscribe(move |_| {
                    if let (Some(event), Some(id)) = (weak.upgrade(), listener_id.get()) {
                        event.unsubscribe(id);
                    }
                    if let Some(callback) = slot.take() {
                        callback(Completion::Succeeded);
                    }
                });
                own_id.set(Some(id));
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WatchedAction::SettleOnce(_) => "once",
            WatchedAction::Repeatable(_) => "event",
        }
    }
}

impl From<Once> for WatchedAction {
    fn from(once: Once) -> Self {
        WatchedAction::SettleOnce(once)
    }
}

impl From<&Once> for WatchedAction {
    fn from(once: &Once) -> Self {
        WatchedAction::SettleOnce(once.clone())
    }
}

impl From<Event> for WatchedAction {
    fn from(event: Event) -> Self {
        WatchedAction::Repeatable(event)
    }
}

impl From<&Event> for WatchedAction {
    fn from(event: &Event) -> Self {
        WatchedAction::Repeatable(event.clone())
    }
}

impl fmt::Debug for WatchedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchedAction::SettleOnce(once) => f.debug_tuple("SettleOnce").field(once).finish(),
            WatchedAction::Repeatable(event) => f.debug_tuple("Repeatable").field(event).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<Completion>>>, impl FnOnce(Completion) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |completion| sink.borrow_mut().push(completion))
    }

    #[test]
    fn test_repeatable_reports_first_fire_only() {
        let event: Event = Event::new();
        let action = WatchedAction::from(&event);
        let (seen, callback) = recorder();

        action.on_first_completion(callback);
        assert_eq!(event.listener_count(), 1);

        event.fire(vec![]);
        event.fire(vec![]);
        event.fire(vec![]);

        assert_eq!(*seen.borrow(), vec![Completion::Succeeded]);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn test_repeatable_does_not_disturb_other_listeners() {
        let event: Event = Event::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let other = event.subscribe(move |_| counter.set(counter.get() + 1));

        let (seen, callback) = recorder();
        WatchedAction::from(&event).on_first_completion(callback);

        event.fire(vec![]);
        event.fire(vec![]);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(calls.get(), 2);
        assert!(event.has_listener(other));
    }

    #[test]
    fn test_already_fired_event_completes_immediately() {
        let event: Event = Event::new();
        event.fire(vec![]);

        let (seen, callback) = recorder();
        WatchedAction::from(&event).on_first_completion(callback);

        assert_eq!(*seen.borrow(), vec![Completion::Succeeded]);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn test_settle_once_success() {
        let once: Once = Once::new();
        let (seen, callback) = recorder();
        WatchedAction::from(&once).on_first_completion(callback);

        assert!(seen.borrow().is_empty());
        once.resolve(vec![json!("ignored")]);
        assert_eq!(*seen.borrow(), vec![Completion::Succeeded]);
    }

    #[test]
    fn test_settle_once_failure_carries_args() {
        let once: Once = Once::new();
        let (seen, callback) = recorder();
        WatchedAction::from(&once).on_first_completion(callback);

        once.reject(vec![json!(500), json!("server error")]);
        assert_eq!(
            *seen.borrow(),
            vec![Completion::Failed(vec![json!(500), json!("server error")])]
        );
    }

    #[test]
    fn test_settled_once_reports_synchronously() {
        let once: Once = Once::new();
        once.reject(vec![json!("early")]);

        let (seen, callback) = recorder();
        WatchedAction::from(once).on_first_completion(callback);
        assert_eq!(*seen.borrow(), vec![Completion::Failed(vec![json!("early")])]);
    }

    #[test]
    fn test_kind() {
        let once: Once = Once::new();
        let event: Event = Event::new();
        assert_eq!(WatchedAction::from(once).kind(), "once");
        assert_eq!(WatchedAction::from(event).kind(), "event");
    }
}
