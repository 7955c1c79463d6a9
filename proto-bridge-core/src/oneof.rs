//! Oneof selection metadata emitted alongside decoded records
//!
//! The decoded record itself is schema-shaped: a populated oneof member
//! appears under its own field name. Which member of which group was set is
//! reported out-of-band through this tree, so the caller can attach it to
//! whatever metadata side channel it has.

use std::collections::BTreeMap;

/// Per-message oneof choices, nested along the message structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneofSelection {
    /// Group name → name of the member that was populated
    groups: BTreeMap<String, String>,
    /// Field name → selections inside that sub-message / list of sub-messages
    nested: BTreeMap<String, OneofNested>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OneofNested {
    Message(OneofSelection),
    List(Vec<OneofSelection>),
}

impl OneofSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither this level nor any nested level recorded a choice.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.nested.is_empty()
    }

    pub(crate) fn record_choice(&mut self, group: impl Into<String>, member: impl Into<String>) {
        self.groups.insert(group.into(), member.into());
    }

    /// Attach the selections of a nested message field. Empty children are
    /// dropped rather than stored.
    pub(crate) fn attach(&mut self, field: impl Into<String>, child: OneofSelection) {
        if !child.is_empty() {
            self.nested.insert(field.into(), OneofNested::Message(child));
        }
    }

    /// Attach the per-element selections of a repeated message field.
    /// Positions are kept so indices line up with the decoded list.
    pub(crate) fn attach_list(&mut self, field: impl Into<String>, children: Vec<OneofSelection>) {
        if children.iter().any(|c| !c.is_empty()) {
            self.nested.insert(field.into(), OneofNested::List(children));
        }
    }

    /// The member chosen for a group at this level, if any.
    pub fn chosen(&self, group: &str) -> Option<&str> {
        self.groups.get(group).map(String::as_str)
    }

    /// Selections inside a nested message field.
    pub fn nested(&self, field: &str) -> Option<&OneofSelection> {
        match self.nested.get(field) {
            Some(OneofNested::Message(child)) => Some(child),
            _ => None,
        }
    }

    /// Selections inside one element of a repeated message field.
    pub fn nested_at(&self, field: &str, index: usize) -> Option<&OneofSelection> {
        match self.nested.get(field) {
            Some(OneofNested::List(children)) => children.get(index),
            _ => None,
        }
    }

    /// JSON rendering for metadata emission: group choices and nested
    /// selections merged into one object, lists as arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (group, member) in &self.groups {
            map.insert(group.clone(), serde_json::Value::String(member.clone()));
        }
        for (field, nested) in &self.nested {
            let value = match nested {
                OneofNested::Message(child) => child.to_json(),
                OneofNested::List(children) => serde_json::Value::Array(
                    children.iter().map(OneofSelection::to_json).collect(),
                ),
            };
            map.insert(field.clone(), value);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_children_are_dropped() {
        let mut selection = OneofSelection::new();
        selection.attach("tail", OneofSelection::new());
        assert!(selection.is_empty());
    }

    #[test]
    fn test_nested_lookup() {
        let mut tail = OneofSelection::new();
        tail.record_choice("hair_type", "braided");

        let mut root = OneofSelection::new();
        root.record_choice("horse_type", "pegasus");
        root.attach("tail", tail);

        assert_eq!(root.chosen("horse_type"), Some("pegasus"));
        assert_eq!(
            root.nested("tail").and_then(|t| t.chosen("hair_type")),
            Some("braided")
        );
        assert_eq!(root.chosen("hair_type"), None);
    }

    #[test]
    fn test_list_positions_line_up() {
        let mut first = OneofSelection::new();
        first.record_choice("prefered_contact", "prefered_email");
        let second = OneofSelection::new();
        let mut third = OneofSelection::new();
        third.record_choice("prefered_contact", "prefered_fax");

        let mut root = OneofSelection::new();
        root.attach_list("contacts", vec![first, second, third]);

        assert_eq!(
            root.nested_at("contacts", 0).and_then(|c| c.chosen("prefered_contact")),
            Some("prefered_email")
        );
        assert_eq!(
            root.nested_at("contacts", 1).map(|c| c.is_empty()),
            Some(true)
        );
        assert_eq!(
            root.nested_at("contacts", 2).and_then(|c| c.chosen("prefered_contact")),
            Some("prefered_fax")
        );
    }

    #[test]
    fn test_to_json_shape() {
        let mut tail = OneofSelection::new();
        tail.record_choice("hair_type", "natural");
        let mut root = OneofSelection::new();
        root.record_choice("horse_type", "unicorn");
        root.attach("tail", tail);

        let json = root.to_json();
        assert_eq!(json["horse_type"], "unicorn");
        assert_eq!(json["tail"]["hair_type"], "natural");
    }
}
