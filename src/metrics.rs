//! Hierarchical metrics keyed by name.
//!
//! A [`MetricsContainer`] stores named entries in insertion order. Each entry
//! may carry a value (or a nested container) and the name of its parent entry.
//! Producers can attach a metric to a parent that has not been declared yet:
//! the parent is created as an empty placeholder and picks up its own value
//! and parent once they are set. Names are unique within one container.
//!
//! The tree is read through [`MetricsContainer::walk`], which calls a
//! [`MetricsVisitor`] depth first. Reporters use it to build dotted keys such
//! as `GRADLE_BUILD.EXECUTION.COMPILATION_TASKS`.

use std::ops::Add;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("attaching '{name}' to '{parent}' would create a cycle")]
    Cycle { name: String, parent: String },

    #[error("'{parent}.{name}' is already defined by the container stored in '{parent}'")]
    DuplicatePath { name: String, parent: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Metric<T> {
    Value(T),
    Container(MetricsContainer<T>),
}

#[derive(Clone, Debug, PartialEq)]
struct Entry<T> {
    name: String,
    parent: Option<String>,
    metric: Option<Metric<T>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricsContainer<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for MetricsContainer<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

/// Callbacks for [`MetricsContainer::walk`].
pub trait MetricsVisitor<T> {
    /// Called before the children of `name` are visited.
    fn enter(&mut self, _name: &str) {}

    fn value(&mut self, name: &str, value: &T);

    fn exit(&mut self, _name: &str) {}
}

impl<T> MetricsContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries holding a value or a nested container.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.metric.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn has_children(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.parent.as_deref() == Some(name))
    }

    fn check_parent(&self, name: &str, parent: &str) -> Result<(), MetricsError> {
        let mut current = Some(parent);
        // Parent links are acyclic, so the chain is at most `entries.len()` long.
        for _ in 0..=self.entries.len() {
            let Some(ancestor) = current else {
                return Ok(());
            };
            if ancestor == name {
                return Err(MetricsError::Cycle {
                    name: name.to_string(),
                    parent: parent.to_string(),
                });
            }
            current = self
                .position(ancestor)
                .and_then(|i| self.entries[i].parent.as_deref());
        }
        Ok(())
    }

    fn has_root(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name == name && e.parent.is_none())
    }

    /// A nested container's root entries and the entries routed to the same
    /// parent share one path prefix, so their names must not overlap.
    fn check_paths(&self, name: &str, metric: &Metric<T>, parent: Option<&str>) -> Result<(), MetricsError> {
        let parent = parent.or_else(|| self.parent_of(name));
        if let Some(parent) = parent {
            if let Some(Metric::Container(nested)) = self.metric(parent) {
                if nested.has_root(name) {
                    return Err(MetricsError::DuplicatePath {
                        name: name.to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }
        if let Metric::Container(nested) = metric {
            let routed = self
                .entries
                .iter()
                .filter(|e| e.parent.as_deref() == Some(name));
            for child in routed {
                if nested.has_root(&child.name) {
                    return Err(MetricsError::DuplicatePath {
                        name: child.name.clone(),
                        parent: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Insert `metric` under `name`, or replace the existing entry in place.
    ///
    /// With `parent == None` an existing entry keeps its current parent.
    /// Fails without modifying the tree if the link would create a cycle or
    /// a second value at an existing dotted path.
    pub fn set(
        &mut self,
        name: &str,
        metric: Metric<T>,
        parent: Option<&str>,
    ) -> Result<(), MetricsError> {
        self.check_paths(name, &metric, parent)?;
        if let Some(parent) = parent {
            self.check_parent(name, parent)?;
            if self.position(parent).is_none() {
                self.entries.push(Entry {
                    name: parent.to_string(),
                    parent: None,
                    metric: None,
                });
            }
        }

        match self.position(name) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.metric = Some(metric);
                if let Some(parent) = parent {
                    entry.parent = Some(parent.to_string());
                }
            }
            None => self.entries.push(Entry {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                metric: Some(metric),
            }),
        }
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, value: T, parent: Option<&str>) -> Result<(), MetricsError> {
        self.set(name, Metric::Value(value), parent)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric<T>> {
        self.position(name)
            .and_then(|i| self.entries[i].metric.as_ref())
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.entries[i].parent.as_deref())
    }

    /// Depth-first walk in insertion order.
    ///
    /// For every entry its value is reported first; if it has a nested
    /// container or routed children it is then entered, the nested container
    /// is walked, followed by the routed children, and the entry is exited.
    pub fn walk<V: MetricsVisitor<T> + ?Sized>(&self, visitor: &mut V) {
        self.walk_children(None, visitor);
    }

    fn walk_children<V: MetricsVisitor<T> + ?Sized>(&self, parent: Option<&str>, visitor: &mut V) {
        for entry in self.entries.iter().filter(|e| e.parent.as_deref() == parent) {
            self.walk_entry(entry, visitor);
        }
    }

    fn walk_entry<V: MetricsVisitor<T> + ?Sized>(&self, entry: &Entry<T>, visitor: &mut V) {
        let nested = match &entry.metric {
            Some(Metric::Value(value)) => {
                visitor.value(&entry.name, value);
                None
            }
            Some(Metric::Container(container)) => Some(container),
            None => None,
        };

        let nested_has_entries = nested.is_some_and(|c| !c.entries.is_empty());
        if !nested_has_entries && !self.has_children(&entry.name) {
            return;
        }

        visitor.enter(&entry.name);
        if let Some(container) = nested {
            container.walk(visitor);
        }
        self.walk_children(Some(&entry.name), visitor);
        visitor.exit(&entry.name);
    }
}

impl<T: Copy + Add<Output = T>> MetricsContainer<T> {
    /// Add `value` to the value stored under `name`, inserting it if absent.
    pub fn add_value(&mut self, name: &str, value: T, parent: Option<&str>) -> Result<(), MetricsError> {
        let total = match self.metric(name) {
            Some(Metric::Value(existing)) => *existing + value,
            _ => value,
        };
        self.set_value(name, total, parent)
    }
}

impl<T: Copy + Add<Output = T> + Default> MetricsContainer<T> {
    /// Sum of every value in the tree, nested containers included.
    pub fn sum(&self) -> T {
        let mut total = SumVisitor(T::default());
        self.walk(&mut total);
        total.0
    }

    /// Sum of the values strictly below `name`, or `None` if `name` is absent.
    pub fn sum_below(&self, name: &str) -> Option<T> {
        let entry = &self.entries[self.position(name)?];
        let mut total = T::default();
        if let Some(Metric::Container(nested)) = &entry.metric {
            total = total + nested.sum();
        }
        for child in self.entries.iter().filter(|e| e.parent.as_deref() == Some(name)) {
            if let Some(Metric::Value(value)) = &child.metric {
                total = total + *value;
            }
            total = total + self.sum_below(&child.name).unwrap_or_default();
        }
        Some(total)
    }
}

struct SumVisitor<T>(T);

impl<T: Copy + Add<Output = T>> MetricsVisitor<T> for SumVisitor<T> {
    fn value(&mut self, _name: &str, value: &T) {
        self.0 = self.0 + *value;
    }
}

/// Collects `(dotted path, value)` pairs.
struct PathCollector<T> {
    prefix: Vec<String>,
    out: Vec<(String, T)>,
}

impl<T: Clone> MetricsVisitor<T> for PathCollector<T> {
    fn enter(&mut self, name: &str) {
        self.prefix.push(name.to_string());
    }

    fn value(&mut self, name: &str, value: &T) {
        let mut path = self.prefix.join(".");
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(name);
        self.out.push((path, value.clone()));
    }

    fn exit(&mut self, _name: &str) {
        self.prefix.pop();
    }
}

impl<T: Clone> MetricsContainer<T> {
    /// All values with their fully qualified dotted names, in walk order.
    pub fn flatten(&self) -> Vec<(String, T)> {
        let mut collector = PathCollector {
            prefix: Vec::new(),
            out: Vec::new(),
        };
        self.walk(&mut collector);
        collector.out
    }

    /// Value at a dotted path such as `GRADLE_BUILD.EXECUTION`.
    pub fn get(&self, path: &str) -> Option<T> {
        self.flatten()
            .into_iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl MetricsVisitor<u64> for Trace {
        fn enter(&mut self, name: &str) {
            self.0.push(format!("> {name}"));
        }

        fn value(&mut self, name: &str, value: &u64) {
            self.0.push(format!("{name}={value}"));
        }

        fn exit(&mut self, name: &str) {
            self.0.push(format!("< {name}"));
        }
    }

    #[test]
    fn test_walk_order_and_callbacks() {
        let mut m = MetricsContainer::new();
        m.set_value("BUILD", 10u64, None).unwrap();
        m.set_value("CONFIG", 3, Some("BUILD")).unwrap();
        m.set_value("EXEC", 7, Some("BUILD")).unwrap();
        m.set_value("OTHER", 1, None).unwrap();

        let mut trace = Trace::default();
        m.walk(&mut trace);
        assert_eq!(
            trace.0,
            vec!["BUILD=10", "> BUILD", "CONFIG=3", "EXEC=7", "< BUILD", "OTHER=1"]
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut m = MetricsContainer::new();
        m.set_value("A", 1u64, None).unwrap();
        m.set_value("B", 2, None).unwrap();
        m.set_value("A", 5, None).unwrap();

        assert_eq!(m.len(), 2);
        assert_eq!(m.flatten(), vec![("A".to_string(), 5), ("B".to_string(), 2)]);
    }

    #[test]
    fn test_missing_parent_is_created_and_rerouted_later() {
        let mut m = MetricsContainer::new();
        m.set_value("ROOT", 100u64, None).unwrap();
        m.set_value("JavaCompile", 4, Some("COMPILATION")).unwrap();
        assert_eq!(m.get("COMPILATION.JavaCompile"), Some(4));

        m.set_value("COMPILATION", 9, Some("ROOT")).unwrap();
        assert_eq!(m.get("ROOT.COMPILATION"), Some(9));
        assert_eq!(m.get("ROOT.COMPILATION.JavaCompile"), Some(4));
        assert_eq!(m.get("COMPILATION.JavaCompile"), None);
        assert!(m.contains("ROOT.COMPILATION"));
        assert!(!m.contains("COMPILATION"));
    }

    #[test]
    fn test_nested_container_is_walked_under_its_name() {
        let mut inner = MetricsContainer::new();
        inner.set_value("Run compilation", 3u64, None).unwrap();
        inner.set_value("Incremental analysis", 1, Some("Run compilation")).unwrap();

        let mut m = MetricsContainer::new();
        m.set_value("EXECUTION", 10u64, None).unwrap();
        m.set("KotlinCompile", Metric::Container(inner), Some("EXECUTION")).unwrap();

        let paths: Vec<String> = m.flatten().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "EXECUTION",
                "EXECUTION.KotlinCompile.Run compilation",
                "EXECUTION.KotlinCompile.Run compilation.Incremental analysis",
            ]
        );
        assert_eq!(m.sum(), 14);
        assert_eq!(m.sum_below("EXECUTION"), Some(4));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut m = MetricsContainer::new();
        m.set_value("A", 1u64, None).unwrap();
        m.set_value("B", 1, Some("A")).unwrap();

        assert!(matches!(m.set_value("A", 1, Some("B")), Err(MetricsError::Cycle { .. })));
        assert!(matches!(m.set_value("C", 1, Some("C")), Err(MetricsError::Cycle { .. })));
        assert_eq!(m.parent_of("A"), None);
    }

    #[test]
    fn test_routed_child_cannot_shadow_nested_container_entry() {
        let mut nested = MetricsContainer::new();
        nested.set_value("X", 1u64, None).unwrap();

        let mut m = MetricsContainer::new();
        m.set("K", Metric::Container(nested.clone()), None).unwrap();
        assert!(matches!(
            m.set_value("X", 2, Some("K")),
            Err(MetricsError::DuplicatePath { .. })
        ));
        assert_eq!(m.flatten(), vec![("K.X".to_string(), 1)]);
        assert_eq!(m.sum(), 1);

        // Other names may still be routed to K.
        m.set_value("Y", 3, Some("K")).unwrap();
        assert_eq!(m.get("K.Y"), Some(3));

        // Same clash, reached by storing the container after the child.
        let mut m = MetricsContainer::new();
        m.set_value("X", 2u64, Some("K")).unwrap();
        assert!(matches!(
            m.set("K", Metric::Container(nested), None),
            Err(MetricsError::DuplicatePath { .. })
        ));
        assert_eq!(m.flatten(), vec![("K.X".to_string(), 2)]);
    }

    #[test]
    fn test_add_value_accumulates() {
        let mut m = MetricsContainer::new();
        m.add_value("JavaCompile", 2u64, Some("TASKS")).unwrap();
        m.add_value("JavaCompile", 3, None).unwrap();
        assert_eq!(m.get("TASKS.JavaCompile"), Some(5));
    }

    #[test]
    fn test_sums_do_not_depend_on_insertion_order() {
        let inserts: Vec<(&str, u64, Option<&str>)> = vec![
            ("GRADLE_BUILD", 100, None),
            ("CONFIGURATION", 20, Some("GRADLE_BUILD")),
            ("EXECUTION", 80, Some("GRADLE_BUILD")),
            ("COMPILATION_TASKS", 50, Some("EXECUTION")),
            ("NON_COMPILATION_TASKS", 10, Some("EXECUTION")),
            ("JavaCompile", 30, Some("COMPILATION_TASKS")),
            ("KotlinCompile", 20, Some("COMPILATION_TASKS")),
            ("UP_TO_DATE_CHECKS", 5, Some("EXECUTION")),
            ("UP_TO_DATE_CHECKS_BEFORE_TASK", 2, Some("UP_TO_DATE_CHECKS")),
            ("UP_TO_DATE_CHECKS_AFTER_TASK", 3, Some("UP_TO_DATE_CHECKS")),
        ];

        let build = |order: &[(&str, u64, Option<&str>)]| {
            let mut m = MetricsContainer::new();
            for (name, value, parent) in order {
                m.set_value(name, *value, *parent).unwrap();
            }
            m
        };
        let reference = build(&inserts);
        let mut expected_paths: Vec<(String, u64)> = reference.flatten();
        expected_paths.sort();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let mut shuffled = inserts.clone();
            shuffled.shuffle(&mut rng);
            let m = build(&shuffled);

            assert_eq!(m.sum(), reference.sum());
            assert_eq!(m.sum_below("EXECUTION"), Some(50 + 10 + 30 + 20 + 5 + 2 + 3));
            assert_eq!(m.sum_below("COMPILATION_TASKS"), reference.sum_below("COMPILATION_TASKS"));

            let mut paths = m.flatten();
            paths.sort();
            assert_eq!(paths, expected_paths);
        }
    }
}
