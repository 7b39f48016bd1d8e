//! # Signal Trees
//!
//! Builds nested [`Once`] and [`Event`] signals from a plain JSON
//! configuration:
//!
//! ```json
//! {
//!   "once": { "page": { "ready": "", "fail": "horribly withStyle" } },
//!   "on":   { "user": "login logout" }
//! }
//! ```
//!
//! For every key under `once` / `on`:
//! - an object builds a nested group,
//! - `""` builds a single signal,
//! - a whitespace-separated string builds a group with one signal per name.
//!
//! `reset` may not be used as a top-level `once` key, and `any` may not be
//! used anywhere under `on`: every event group exposes an `any` event that
//! fires, with the original arguments, whenever one of its descendants fires.
//!
//! ## Generations
//!
//! [`Intercal::reset`] rebuilds every signal from the stored configuration and
//! advances the generation. Signals from earlier generations are retired:
//! their listeners are dropped and further fire/resolve calls are ignored,
//! even when a leaf of the same name exists in the new generation.
//!
//! ```rust
//! use intercal_core::tree::Intercal;
//! use serde_json::json;
//!
//! let mut ic = Intercal::new(&json!({
//!     "once": {"page": "ready close"},
//!     "on": {"user": "login"}
//! })).unwrap();
//!
//! let ready = ic.once("page.ready").unwrap();
//! ready.resolve(vec![]);
//!
//! ic.reset().unwrap();
//! assert_eq!(ic.generation(), 1);
//! assert!(!ic.once("page.ready").unwrap().is_settled());
//! ```

use crate::action::WatchedAction;
use crate::error::{Error, Result};
use crate::signal::{Args, Event, Once};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const ONCE_KEY: &str = "once";
const ON_KEY: &str = "on";
const RESERVED_ONCE: &str = "reset";
const RESERVED_EVENT: &str = "any";

/// A node of the `once` tree.
#[derive(Debug, Clone)]
pub enum OnceNode {
    Leaf(Once),
    Group(BTreeMap<String, OnceNode>),
}

/// A node of the `on` tree.
#[derive(Debug, Clone)]
pub enum EventNode {
    Leaf(Event),
    Group(EventGroup),
}

/// Named event children plus the group's `any` relay.
#[derive(Debug, Clone)]
pub struct EventGroup {
    children: BTreeMap<String, EventNode>,
    any: Event,
}

impl OnceNode {
    pub fn get(&self, path: &str) -> Option<&OnceNode> {
        segments(path).try_fold(self, |node, name| match node {
            OnceNode::Group(children) => children.get(name),
            OnceNode::Leaf(_) => None,
        })
    }

    pub fn as_leaf(&self) -> Option<&Once> {
        match self {
            OnceNode::Leaf(once) => Some(once),
            OnceNode::Group(_) => None,
        }
    }

    /// Every leaf below this node as watched actions, in key order.
    pub fn actions(&self) -> Vec<WatchedAction> {
        let mut actions = Vec::new();
        self.visit(&mut |once| actions.push(WatchedAction::from(once)));
        actions
    }

    fn visit(&self, f: &mut impl FnMut(&Once)) {
        match self {
            OnceNode::Leaf(once) => f(once),
            OnceNode::Group(children) => children.values().for_each(|child| child.visit(f)),
        }
    }
}

impl EventNode {
    pub fn get(&self, path: &str) -> Option<&EventNode> {
        segments(path).try_fold(self, |node, name| match node {
            EventNode::Group(group) => group.children.get(name),
            EventNode::Leaf(_) => None,
        })
    }

    pub fn as_leaf(&self) -> Option<&Event> {
        match self {
            EventNode::Leaf(event) => Some(event),
            EventNode::Group(_) => None,
        }
    }

    /// The group's `any` relay; `None` for leaves.
    pub fn any(&self) -> Option<&Event> {
        match self {
            EventNode::Group(group) => Some(&group.any),
            EventNode::Leaf(_) => None,
        }
    }

    /// Every leaf below this node as watched actions, in key order.
    pub fn actions(&self) -> Vec<WatchedAction> {
        let mut actions = Vec::new();
        self.visit(&mut |event| actions.push(WatchedAction::from(event)));
        actions
    }

    fn visit(&self, f: &mut impl FnMut(&Event)) {
        match self {
            EventNode::Leaf(event) => f(event),
            EventNode::Group(group) => group.children.values().for_each(|child| child.visit(f)),
        }
    }

    fn retire(&self) {
        match self {
            EventNode::Leaf(event) => event.retire(),
            EventNode::Group(group) => {
                group.any.retire();
                group.children.values().for_each(EventNode::retire);
            }
        }
    }
}

impl EventGroup {
    pub fn any(&self) -> &Event {
        &self.any
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

impl TryFrom<&OnceNode> for WatchedAction {
    type Error = Error;

    fn try_from(node: &OnceNode) -> Result<Self> {
        node.as_leaf()
            .map(WatchedAction::from)
            .ok_or_else(|| Error::MalformedAction("once group is not a signal".to_string()))
    }
}

impl TryFrom<&EventNode> for WatchedAction {
    type Error = Error;

    fn try_from(node: &EventNode) -> Result<Self> {
        node.as_leaf()
            .map(WatchedAction::from)
            .ok_or_else(|| Error::MalformedAction("event group is not a signal".to_string()))
    }
}

/// The signals declared by one configuration.
#[derive(Debug)]
pub struct Intercal {
    config: Value,
    once: OnceNode,
    on: EventNode,
    generation: u64,
}

impl Intercal {
    /// Builds every signal declared in `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for values that are neither objects nor strings
    /// - [`Error::ReservedName`] for `reset` at the top of `once` or `any`
    ///   anywhere under `on`
    pub fn new(config: &Value) -> Result<Self> {
        let (once, on) = build(config)?;
        Ok(Self {
            config: config.clone(),
            once,
            on,
            generation: 0,
        })
    }

    /// The `Once` at a dot-separated path.
    pub fn once(&self, path: &str) -> Option<Once> {
        self.once.get(path)?.as_leaf().cloned()
    }

    /// The `Event` at a dot-separated path.
    pub fn on(&self, path: &str) -> Option<Event> {
        self.on.get(path)?.as_leaf().cloned()
    }

    /// The `once` node at a path; `""` is the root group.
    pub fn once_node(&self, path: &str) -> Option<&OnceNode> {
        self.once.get(path)
    }

    /// The `on` node at a path; `""` is the root group.
    pub fn on_node(&self, path: &str) -> Option<&EventNode> {
        self.on.get(path)
    }

    /// Fires whenever any declared event fires.
    pub fn on_any(&self) -> &Event {
        match &self.on {
            EventNode::Group(group) => &group.any,
            EventNode::Leaf(event) => event,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rebuilds all signals and retires the previous generation.
    pub fn reset(&mut self) -> Result<()> {
        let (once, on) = build(&self.config)?;
        let previous_once = std::mem::replace(&mut self.once, once);
        let previous_on = std::mem::replace(&mut self.on, on);

        previous_once.visit(&mut |once| once.retire());
        previous_on.retire();

        self.generation += 1;
        debug!(generation = self.generation, "signal tree reset");
        Ok(())
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

fn build(config: &Value) -> Result<(OnceNode, EventNode)> {
    let root = match config {
        Value::Null => None,
        Value::Object(root) => Some(root),
        other => {
            return Err(Error::Config(format!(
                "signal configuration must be an object, got {}",
                type_name(other)
            )))
        }
    };

    let once = match root.and_then(|root| section(root, ONCE_KEY)).transpose()? {
        Some(onces) => {
            if onces.contains_key(RESERVED_ONCE) {
                return Err(Error::ReservedName {
                    name: RESERVED_ONCE.to_string(),
                });
            }
            build_onces(onces)?
        }
        None => BTreeMap::new(),
    };

    let relay = Event::new();
    let on = match root.and_then(|root| section(root, ON_KEY)).transpose()? {
        Some(events) => build_events(events, &[relay.clone()])?,
        None => BTreeMap::new(),
    };

    debug!(onces = once.len(), events = on.len(), "built signal tree");
    Ok((
        OnceNode::Group(once),
        EventNode::Group(EventGroup {
            children: on,
            any: relay,
        }),
    ))
}

fn section<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Option<Result<&'a Map<String, Value>>> {
    match root.get(key)? {
        Value::Null => None,
        Value::Object(section) => Some(Ok(section)),
        other => Some(Err(Error::Config(format!(
            "'{}' must be an object, got {}",
            key,
            type_name(other)
        )))),
    }
}

fn build_onces(definitions: &Map<String, Value>) -> Result<BTreeMap<String, OnceNode>> {
    let mut nodes = BTreeMap::new();

    for (key, value) in definitions {
        let node = match value {
            Value::Object(children) => OnceNode::Group(build_onces(children)?),
            Value::String(names) if names.is_empty() => OnceNode::Leaf(Once::new()),
            Value::String(names) => OnceNode::Group(
                names
                    .split_whitespace()
                    .map(|name| (name.to_string(), OnceNode::Leaf(Once::new())))
                    .collect(),
            ),
            other => return Err(invalid_definition(key, other)),
        };
        nodes.insert(key.clone(), node);
    }

    Ok(nodes)
}

fn build_events(
    definitions: &Map<String, Value>,
    relays: &[Event],
) -> Result<BTreeMap<String, EventNode>> {
    let mut nodes = BTreeMap::new();

    for (key, value) in definitions {
        reject_reserved_event(key)?;

        let node = match value {
            Value::Object(children) => {
                let any = Event::new();
                let relays = with_relay(relays, &any);
                EventNode::Group(EventGroup {
                    children: build_events(children, &relays)?,
                    any,
                })
            }
            Value::String(names) if names.is_empty() => EventNode::Leaf(relayed_event(relays)),
            Value::String(names) => {
                let any = Event::new();
                let relays = with_relay(relays, &any);
                let mut children = BTreeMap::new();
                for name in names.split_whitespace() {
                    reject_reserved_event(name)?;
                    children.insert(name.to_string(), EventNode::Leaf(relayed_event(&relays)));
                }
                EventNode::Group(EventGroup { children, any })
            }
            other => return Err(invalid_definition(key, other)),
        };
        nodes.insert(key.clone(), node);
    }

    Ok(nodes)
}

fn with_relay(relays: &[Event], any: &Event) -> Vec<Event> {
    let mut relays = relays.to_vec();
    relays.push(any.clone());
    relays
}

/// A leaf event that forwards every fire to the `any` relay of each ancestor.
fn relayed_event(relays: &[Event]) -> Event {
    let event = Event::new();
    let relays = relays.to_vec();
    event.subscribe(move |args: &Args| {
        for relay in &relays {
            relay.fire(args.clone());
        }
    });
    event
}

fn reject_reserved_event(name: &str) -> Result<()> {
    if name == RESERVED_EVENT {
        return Err(Error::ReservedName {
            name: RESERVED_EVENT.to_string(),
        });
    }
    Ok(())
}

fn invalid_definition(key: &str, value: &Value) -> Error {
    Error::Config(format!(
        "signal '{}' must be an object or a string of names, got {}",
        key,
        type_name(value)
    ))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
