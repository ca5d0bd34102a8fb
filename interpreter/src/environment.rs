use std::collections::{HashMap, HashSet};

use crate::runtime_value::Value;

/// The persistent variable scope shared by every block of one document.
///
/// Definitions made by one block stay visible to the blocks after it.
/// Builtins are not stored here; name lookup falls back to them.
#[derive(Debug, Default)]
pub struct Namespace {
    variables: HashMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }
}

/// The local scope of one function call.
#[derive(Debug, Default)]
pub struct Frame {
    variables: HashMap<String, Value>,
    /// Names declared `global` inside this call.
    globals: HashSet<String>,
}

impl Frame {
    pub fn new() -> Self {
        Frame::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

/// The namespace plus the stack of active call frames.
///
/// Lookup checks the innermost frame, then the namespace. Frames never see
/// each other, so a nested function reads its own locals and the globals only.
#[derive(Debug)]
pub struct Environment<'ns> {
    namespace: &'ns mut Namespace,
    frames: Vec<Frame>,
}

impl<'ns> Environment<'ns> {
    pub fn new(namespace: &'ns mut Namespace) -> Self {
        Environment {
            namespace,
            frames: Vec::new(),
        }
    }

    /// Number of active function calls.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// The frame that receives assignments to `name`, or `None` for the namespace.
    fn local_frame(&mut self, name: &str) -> Option<&mut Frame> {
        self.frames
            .last_mut()
            .filter(|frame| !frame.globals.contains(name))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if !frame.globals.contains(name) {
                if let Some(value) = frame.variables.get(name) {
                    return Some(value.clone());
                }
            }
        }
        self.namespace.get(name).cloned()
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        match self.local_frame(name) {
            Some(frame) => frame.bind(name, value),
            None => self.namespace.set(name, value),
        }
    }

    /// Remove a binding. Returns false when the name was not bound.
    pub fn delete(&mut self, name: &str) -> bool {
        match self.local_frame(name) {
            Some(frame) => frame.variables.remove(name).is_some(),
            None => self.namespace.remove(name).is_some(),
        }
    }

    /// `global name`: later assignments in this call go to the namespace.
    /// At the top level this is a no-op.
    pub fn declare_global(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.variables.remove(name);
            frame.globals.insert(name.to_string());
        }
    }
}
