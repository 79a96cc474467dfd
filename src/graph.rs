//! The provisional element graph populated during parsing.

use crate::classes::{ClassId, TUNNEL_TYPE};
use crate::Landmark;
use fxhash::FxHashMap;

///
/// A reference to one port of one element.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub element: usize,
    pub port: usize,
}

impl PortRef {
    pub fn new(element: usize, port: usize) -> Self {
        Self { element, port }
    }
}

///
/// The provisional graph: elements, their classes, configuration
/// strings and landmarks in lockstep vectors, plus the directed
/// hookup list.
///
/// Connection order is preserved; it is the only tie-break for
/// diagnostics during expansion.
///
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) elements: Vec<ClassId>,
    pub(crate) element_names: Vec<String>,
    pub(crate) element_configurations: Vec<String>,
    pub(crate) element_landmarks: Vec<Landmark>,
    pub(crate) element_map: FxHashMap<String, usize>,

    pub(crate) hookup_from: Vec<PortRef>,
    pub(crate) hookup_to: Vec<PortRef>,

    pub(crate) requirements: Vec<String>,

    /// Subtracted from the element count when generating anonymous
    /// names: 0 at top level, 2 inside a compound body to skip the
    /// `input`/`output` stubs.
    pub(crate) anonymous_offset: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.element_names.clear();
        self.element_configurations.clear();
        self.element_landmarks.clear();
        self.element_map.clear();
        self.hookup_from.clear();
        self.hookup_to.clear();
        self.requirements.clear();
        self.anonymous_offset = 0;
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    ///
    /// Returns the element bound to `name`, creating it if necessary.
    ///
    pub fn get_element(
        &mut self,
        name: String,
        class: ClassId,
        configuration: String,
        landmark: Landmark,
    ) -> usize {
        if let Some(&idx) = self.element_map.get(&name) {
            return idx;
        }

        let idx = self.elements.len();
        self.element_map.insert(name.clone(), idx);
        self.element_names.push(name);
        self.element_configurations.push(configuration);
        self.element_landmarks.push(landmark);
        self.elements.push(class);
        idx
    }

    ///
    /// Generates an unused `Class@N` name for an anonymous element.
    ///
    pub fn anon_element_name(&self, class_name: &str) -> String {
        let mut anonymizer = self.elements.len() - self.anonymous_offset + 1;
        let mut name = format!("{}@{}", class_name, anonymizer);
        while self.element_map.contains_key(&name) {
            anonymizer += 1;
            name = format!("{}@{}", class_name, anonymizer);
        }
        name
    }

    ///
    /// Appends a directed connection. Unspecified ports normalize to
    /// port 0.
    ///
    pub fn connect(&mut self, from: usize, from_port: Option<usize>, to: usize, to_port: Option<usize>) {
        self.connect_ports(
            PortRef::new(from, from_port.unwrap_or(0)),
            PortRef::new(to, to_port.unwrap_or(0)),
        );
    }

    pub(crate) fn connect_ports(&mut self, from: PortRef, to: PortRef) {
        debug_assert!(from.element < self.elements.len() && to.element < self.elements.len());
        self.hookup_from.push(from);
        self.hookup_to.push(to);
    }

    ///
    /// The name of an element, or a sentinel for invalid indices.
    ///
    pub fn element_name(&self, idx: usize) -> String {
        if idx >= self.elements.len() {
            "##no-such-element##".to_string()
        } else if !self.element_names[idx].is_empty() {
            self.element_names[idx].clone()
        } else if self.elements[idx] == TUNNEL_TYPE {
            format!("<tunnel@{}>", idx)
        } else {
            format!("<anon@{}>", idx)
        }
    }

    ///
    /// The landmark of an element, or the unknown landmark for invalid
    /// indices.
    ///
    pub fn element_landmark(&self, idx: usize) -> Landmark {
        if idx >= self.element_landmarks.len() {
            Landmark::unknown()
        } else {
            self.element_landmarks[idx].clone()
        }
    }

    ///
    /// Collects the far ends of every connection whose near end equals
    /// `this_end`; `is_out` selects which side of the hookup lists the
    /// near end lives on.
    ///
    pub(crate) fn find_connections(&self, this_end: PortRef, is_out: bool, into: &mut Vec<PortRef>) {
        let (hookup_this, hookup_that) = if is_out {
            (&self.hookup_from, &self.hookup_to)
        } else {
            (&self.hookup_to, &self.hookup_from)
        };
        for i in 0..hookup_this.len() {
            if hookup_this[i] == this_end {
                into.push(hookup_that[i]);
            }
        }
    }
}
