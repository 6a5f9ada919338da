use crate::tree::NodeId;
use std::collections::BTreeMap;

/// Thresholds for switching a node's children between the two representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildThresholds {
    /// A sorted map shrinking below this many children turns back into a flat list.
    pub min: usize,
    /// A flat list growing beyond this many children turns into a sorted map.
    pub max: usize,
}

impl Default for ChildThresholds {
    fn default() -> Self {
        ChildThresholds { min: 16, max: 128 }
    }
}

/// Children of one node, keyed by name.
///
/// Small sets are a flat list in insertion order, large sets a sorted map. Enumeration is
/// always lexicographic by name whichever representation is in use.
#[derive(Clone, Debug)]
pub(crate) enum ChildMap {
    Flat(Vec<(String, NodeId)>),
    Sorted(BTreeMap<String, NodeId>),
}

impl Default for ChildMap {
    fn default() -> Self {
        ChildMap::Flat(Vec::new())
    }
}

impl ChildMap {
    pub(crate) fn len(&self) -> usize {
        match self {
            ChildMap::Flat(list) => list.len(),
            ChildMap::Sorted(map) => map.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_sorted(&self) -> bool {
        matches!(self, ChildMap::Sorted(_))
    }

    pub(crate) fn get(&self, name: &str) -> Option<NodeId> {
        match self {
            ChildMap::Flat(list) => list.iter().find(|(n, _)| n == name).map(|(_, id)| *id),
            ChildMap::Sorted(map) => map.get(name).copied(),
        }
    }

    /// Returns false when the name is already taken.
    pub(crate) fn insert(&mut self, name: String, id: NodeId, thresholds: ChildThresholds) -> bool {
        if self.get(&name).is_some() {
            return false;
        }
        match self {
            ChildMap::Flat(list) => list.push((name, id)),
            ChildMap::Sorted(map) => {
                map.insert(name, id);
            }
        }
        self.rebalance(thresholds);
        true
    }

    pub(crate) fn remove(&mut self, name: &str, thresholds: ChildThresholds) -> Option<NodeId> {
        let removed = match self {
            ChildMap::Flat(list) => {
                let position = list.iter().position(|(n, _)| n == name)?;
                Some(list.remove(position).1)
            }
            ChildMap::Sorted(map) => map.remove(name),
        };
        self.rebalance(thresholds);
        removed
    }

    fn rebalance(&mut self, thresholds: ChildThresholds) {
        let next = match self {
            ChildMap::Flat(list) if list.len() > thresholds.max => {
                ChildMap::Sorted(std::mem::take(list).into_iter().collect())
            }
            ChildMap::Sorted(map) if map.len() < thresholds.min => {
                ChildMap::Flat(std::mem::take(map).into_iter().collect())
            }
            _ => return,
        };
        *self = next;
    }

    /// Every child, sorted by name.
    pub(crate) fn sorted(&self) -> Vec<(&str, NodeId)> {
        match self {
            ChildMap::Flat(list) => {
                let mut sorted: Vec<_> = list.iter().map(|(n, id)| (n.as_str(), *id)).collect();
                sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));
                sorted
            }
            ChildMap::Sorted(map) => map.iter().map(|(n, id)| (n.as_str(), *id)).collect(),
        }
    }

    pub(crate) fn ids(&self) -> Vec<NodeId> {
        match self {
            ChildMap::Flat(list) => list.iter().map(|(_, id)| *id).collect(),
            ChildMap::Sorted(map) => map.values().copied().collect(),
        }
    }

    /// Up to `limit` names strictly after `start_after`, in lexicographic order.
    pub(crate) fn names_after(&self, start_after: Option<&str>, limit: usize) -> Vec<String> {
        match self {
            ChildMap::Flat(_) => self
                .sorted()
                .into_iter()
                .map(|(name, _)| name)
                .filter(|name| start_after.map_or(true, |after| *name > after))
                .take(limit)
                .map(str::to_string)
                .collect(),
            ChildMap::Sorted(map) => {
                use std::ops::Bound;
                let lower = match start_after {
                    Some(after) => Bound::Excluded(after),
                    None => Bound::Unbounded,
                };
                map.range::<str, _>((lower, Bound::Unbounded))
                    .take(limit)
                    .map(|(name, _)| name.clone())
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: ChildThresholds = ChildThresholds { min: 2, max: 4 };

    fn names(map: &ChildMap) -> Vec<String> {
        map.names_after(None, usize::MAX)
    }

    #[test]
    fn representation_switches_with_hysteresis() {
        let mut map = ChildMap::default();
        for (i, name) in ["e", "a", "d", "b"].iter().enumerate() {
            assert!(map.insert(name.to_string(), NodeId::new(i as u64 + 2), THRESHOLDS));
        }
        assert!(!map.is_sorted());

        assert!(map.insert("c".to_string(), NodeId::new(10), THRESHOLDS));
        assert!(map.is_sorted());

        map.remove("a", THRESHOLDS);
        map.remove("b", THRESHOLDS);
        assert!(map.is_sorted());
        map.remove("c", THRESHOLDS);
        assert!(map.is_sorted());
        map.remove("d", THRESHOLDS);
        assert!(!map.is_sorted());
        assert_eq!(names(&map), vec!["e"]);
    }

    #[test]
    fn ordering_does_not_depend_on_representation() {
        let mut flat = ChildMap::default();
        let mut sorted = ChildMap::default();
        let wide = ChildThresholds { min: 0, max: 1000 };
        for (i, name) in ["b", "aa", "c", "a", "ab"].iter().enumerate() {
            flat.insert(name.to_string(), NodeId::new(i as u64 + 2), wide);
            sorted.insert(name.to_string(), NodeId::new(i as u64 + 2), THRESHOLDS);
        }
        assert!(!flat.is_sorted());
        assert!(sorted.is_sorted());

        assert_eq!(names(&flat), names(&sorted));
        assert_eq!(flat.names_after(Some("aa"), 2), vec!["ab", "b"]);
        assert_eq!(sorted.names_after(Some("aa"), 2), vec!["ab", "b"]);
    }

    #[test]
    fn duplicate_names_are_refused() {
        let mut map = ChildMap::default();
        assert!(map.insert("a".to_string(), NodeId::new(2), THRESHOLDS));
        assert!(!map.insert("a".to_string(), NodeId::new(3), THRESHOLDS));
        assert_eq!(map.get("a"), Some(NodeId::new(2)));
        assert_eq!(map.remove("missing", THRESHOLDS), None);
    }
}
