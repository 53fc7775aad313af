//! Label filters deciding which events a silence covers.

use crate::types::LabelSet;

/// A single label matcher: the event's `name` label must equal `value`.
///
/// A missing label compares as the empty string, so a filter with an empty
/// value also matches events that lack the label entirely.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    pub name: String,
    pub value: String,
}

impl Filter {
    /// Filter requiring label `name` to equal `value`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether this filter applies to `event`.
    pub fn handles<E: LabelSet + ?Sized>(&self, event: &E) -> bool {
        event.label(&self.name).unwrap_or("") == self.value
    }
}

/// Ordered collection of filters, matched as a set.
///
/// An event is handled only if every filter handles it; an empty set
/// therefore handles every event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters(Vec<Filter>);

impl Filters {
    /// Wrap `filters` as a set.
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    /// Add one more filter the event must satisfy.
    pub fn push(&mut self, filter: Filter) {
        self.0.push(filter);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    /// Whether every filter in the set handles `event`.
    pub fn handles<E: LabelSet + ?Sized>(&self, event: &E) -> bool {
        self.0.iter().all(|filter| filter.handles(event))
    }
}

impl FromIterator<Filter> for Filters {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Filter>> for Filters {
    fn from(filters: Vec<Filter>) -> Self {
        Self(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    #[test]
    fn test_filter_equality_match() {
        let event = Event::new().with_label("job", "db").with_label("env", "prod");

        assert!(Filter::new("job", "db").handles(&event));
        assert!(!Filter::new("job", "web").handles(&event));
        assert!(!Filter::new("instance", "db-1").handles(&event));
    }

    #[test]
    fn test_missing_label_matches_empty_value() {
        let event = Event::new().with_label("job", "db");
        assert!(Filter::new("instance", "").handles(&event));
    }

    #[test]
    fn test_filters_require_all() {
        let event = Event::new().with_label("job", "db").with_label("env", "prod");

        let both: Filters = vec![Filter::new("job", "db"), Filter::new("env", "prod")].into();
        assert!(both.handles(&event));

        let one_wrong: Filters = vec![Filter::new("job", "db"), Filter::new("env", "dev")].into();
        assert!(!one_wrong.handles(&event));
    }

    #[test]
    fn test_order_does_not_affect_matching() {
        let event = Event::new().with_label("job", "db").with_label("env", "prod");

        let forward: Filters = vec![Filter::new("job", "db"), Filter::new("env", "prod")].into();
        let backward: Filters = forward.iter().rev().cloned().collect();
        assert_eq!(forward.handles(&event), backward.handles(&event));
    }

    #[test]
    fn test_empty_filters_handle_everything() {
        assert!(Filters::default().handles(&Event::new()));
        assert!(Filters::default().handles(&Event::new().with_label("job", "db")));
    }
}
