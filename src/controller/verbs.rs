use axum::http::Method;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

/// The four actions every controller starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CrudAction {
    Create,
    Read,
    Update,
    Delete,
}

impl CrudAction {
    /// Action name as used in paths: `create`, `read`, `update`, `delete`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn verb(self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Read => Method::GET,
            Self::Update => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

/// Action name to the HTTP verb required to invoke it.
///
/// Actions missing from the map are not verb-gated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerbMap {
    verbs: BTreeMap<String, Method>,
}

impl VerbMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create → POST`, `read → GET`, `update → PUT`, `delete → DELETE`.
    pub fn base() -> Self {
        let mut map = Self::new();
        for action in CrudAction::iter() {
            map.insert(action.name(), action.verb());
        }
        map
    }

    /// Case-insensitive verb parsing: `"post"`, `"Post"` and `"POST"` are the same verb.
    pub fn parse_verb(verb: &str) -> Option<Method> {
        let verb = verb.trim();
        if verb.is_empty() {
            return None;
        }
        Method::from_bytes(verb.to_ascii_uppercase().as_bytes()).ok()
    }

    pub fn insert(&mut self, action: impl Into<String>, verb: Method) {
        self.verbs.insert(action.into(), verb);
    }

    pub fn get(&self, action: &str) -> Option<&Method> {
        self.verbs.get(action)
    }

    /// Entries of `overrides` replace ours on collision.
    pub fn overlay(mut self, overrides: &VerbMap) -> Self {
        for (action, verb) in &overrides.verbs {
            self.verbs.insert(action.clone(), verb.clone());
        }
        self
    }

    /// Whether `method` may invoke `action`.
    pub fn permits(&self, action: &str, method: &Method) -> bool {
        self.get(action).is_none_or(|required| required == method)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Method)> {
        self.verbs.iter().map(|(action, verb)| (action.as_str(), verb))
    }
}
