//! Typed arguments for configuration broadcasts.
//!
//! A broadcast carries an ordered list of [`ConfigureArg`]s. A plugin matches
//! it by arity and by the kind of each position, using the exact-arity
//! accessors on [`ConfigureArgs`]. Nothing is dropped or reordered on the way.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// Result of offering a broadcast to one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    Handled,
    Ignored,
}

/// Callback taking a line of text, shared between host and plugins.
#[derive(Clone)]
pub struct TextCallback(Arc<dyn Fn(&str) + Send + Sync>);

impl TextCallback {
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, text: &str) {
        (self.0)(text)
    }
}

impl fmt::Debug for TextCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TextCallback")
    }
}

/// List of strings that plugins may append to.
#[derive(Debug, Clone, Default)]
pub struct SharedList(Arc<Mutex<Vec<String>>>);

impl SharedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind tag of a [`ConfigureArg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Text,
    Json,
    Callback,
    List,
    Object,
}

/// One positional argument of a broadcast.
#[derive(Clone)]
pub enum ConfigureArg {
    Text(String),
    Json(Value),
    Callback(TextCallback),
    List(SharedList),
    Object(Arc<dyn Any + Send + Sync>),
}

impl ConfigureArg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Text(_) => ArgKind::Text,
            Self::Json(_) => ArgKind::Json,
            Self::Callback(_) => ArgKind::Callback,
            Self::List(_) => ArgKind::List,
            Self::Object(_) => ArgKind::Object,
        }
    }
}

impl fmt::Debug for ConfigureArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Callback(_) => f.write_str("Callback"),
            Self::List(list) => f.debug_tuple("List").field(&list.snapshot()).finish(),
            Self::Object(_) => f.write_str("Object"),
        }
    }
}

impl From<String> for ConfigureArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ConfigureArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Value> for ConfigureArg {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<TextCallback> for ConfigureArg {
    fn from(value: TextCallback) -> Self {
        Self::Callback(value)
    }
}

impl From<SharedList> for ConfigureArg {
    fn from(value: SharedList) -> Self {
        Self::List(value)
    }
}

/// Types that can be borrowed out of a [`ConfigureArg`] of matching kind.
pub trait FromConfigureArg {
    const KIND: ArgKind;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self>;
}

impl FromConfigureArg for String {
    const KIND: ArgKind = ArgKind::Text;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self> {
        match arg {
            ConfigureArg::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl FromConfigureArg for Value {
    const KIND: ArgKind = ArgKind::Json;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self> {
        match arg {
            ConfigureArg::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl FromConfigureArg for TextCallback {
    const KIND: ArgKind = ArgKind::Callback;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self> {
        match arg {
            ConfigureArg::Callback(callback) => Some(callback),
            _ => None,
        }
    }
}

impl FromConfigureArg for SharedList {
    const KIND: ArgKind = ArgKind::List;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self> {
        match arg {
            ConfigureArg::List(list) => Some(list),
            _ => None,
        }
    }
}

impl FromConfigureArg for Arc<dyn Any + Send + Sync> {
    const KIND: ArgKind = ArgKind::Object;

    fn from_arg(arg: &ConfigureArg) -> Option<&Self> {
        match arg {
            ConfigureArg::Object(object) => Some(object),
            _ => None,
        }
    }
}

/// Ordered argument list of one broadcast.
#[derive(Debug, Clone, Default)]
pub struct ConfigureArgs {
    args: Vec<ConfigureArg>,
}

impl ConfigureArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument, builder style.
    pub fn with(mut self, arg: impl Into<ConfigureArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn push(&mut self, arg: impl Into<ConfigureArg>) {
        self.args.push(arg.into());
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn kinds(&self) -> Vec<ArgKind> {
        self.args.iter().map(ConfigureArg::kind).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigureArg> {
        self.args.iter()
    }

    /// Argument at `index` if it has the kind of `T`.
    pub fn get<T: FromConfigureArg>(&self, index: usize) -> Option<&T> {
        self.args.get(index).and_then(T::from_arg)
    }

    /// Matches a one-argument broadcast whose argument is a `A`.
    pub fn single<A: FromConfigureArg>(&self) -> Option<&A> {
        if self.args.len() != 1 {
            return None;
        }
        self.get(0)
    }

    /// Matches a two-argument broadcast of kinds `(A, B)`.
    pub fn pair<A: FromConfigureArg, B: FromConfigureArg>(&self) -> Option<(&A, &B)> {
        if self.args.len() != 2 {
            return None;
        }
        Some((self.get(0)?, self.get(1)?))
    }

    /// Matches a three-argument broadcast of kinds `(A, B, C)`.
    pub fn triple<A, B, C>(&self) -> Option<(&A, &B, &C)>
    where
        A: FromConfigureArg,
        B: FromConfigureArg,
        C: FromConfigureArg,
    {
        if self.args.len() != 3 {
            return None;
        }
        Some((self.get(0)?, self.get(1)?, self.get(2)?))
    }
}

impl From<Vec<ConfigureArg>> for ConfigureArgs {
    fn from(args: Vec<ConfigureArg>) -> Self {
        Self { args }
    }
}

impl FromIterator<ConfigureArg> for ConfigureArgs {
    fn from_iter<I: IntoIterator<Item = ConfigureArg>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn pair_matches_exact_kinds_in_order() {
        let list = SharedList::new();
        let args = ConfigureArgs::new()
            .with(TextCallback::new(|_| {}))
            .with(list.clone());

        assert!(args.pair::<TextCallback, SharedList>().is_some());
        assert!(args.pair::<SharedList, TextCallback>().is_none());
        assert!(args.single::<TextCallback>().is_none());
        assert!(args.triple::<TextCallback, SharedList, String>().is_none());
    }

    #[test]
    fn arity_mismatch_does_not_match() {
        let args = ConfigureArgs::new().with("a").with("b").with("c");
        assert!(args.pair::<String, String>().is_none());
        let (a, _, c) = args.triple::<String, String, String>().unwrap();
        assert_eq!((a.as_str(), c.as_str()), ("a", "c"));
    }

    #[test]
    fn kinds_reflect_positions() {
        let args = ConfigureArgs::new().with(json!({"k": 1})).with("text");
        assert_eq!(args.kinds(), vec![ArgKind::Json, ArgKind::Text]);
        assert_eq!(args.get::<Value>(0), Some(&json!({"k": 1})));
        assert!(args.get::<Value>(1).is_none());
    }

    #[test]
    fn shared_list_is_shared() {
        let list = SharedList::new();
        let args = ConfigureArgs::new().with(list.clone());
        args.single::<SharedList>().unwrap().push("from plugin");
        assert_eq!(list.snapshot(), vec!["from plugin".to_string()]);
    }

    #[test]
    fn callback_invokes_closure() {
        let seen = SharedList::new();
        let sink = seen.clone();
        let callback = TextCallback::new(move |text| sink.push(text));
        callback.call("ping");
        assert_eq!(seen.snapshot(), vec!["ping".to_string()]);
    }
}
