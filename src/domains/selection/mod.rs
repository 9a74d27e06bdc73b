//! Ordered, bounded set of assets the user picked.

use serde::Serialize;

use crate::domains::asset::types::AssetRef;

/// Result of tapping an asset cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionChange {
    /// Asset appended; `number` is its 1-based position
    Selected { number: usize },
    /// Asset removed; later selections move up by one
    Deselected,
    /// Set is full; `count` is the current size
    LimitReached { count: usize },
}

#[derive(Debug, Clone)]
pub struct SelectionSet {
    assets: Vec<AssetRef>,
    max: usize,
}

impl SelectionSet {
    /// A zero limit is treated as 1.
    pub fn new(max: usize) -> Self {
        Self {
            assets: Vec::new(),
            max: max.max(1),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Lowering the limit below the current size keeps the earliest selections.
    pub fn set_max(&mut self, max: usize) {
        self.max = max.max(1);
        if self.assets.len() > self.max {
            let dropped = self.assets.len() - self.max;
            self.assets.truncate(self.max);
            log::debug!("Selection limit lowered to {}, dropped {} assets", self.max, dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.assets.len() >= self.max
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.assets.iter().any(|a| a.identifier == identifier)
    }

    /// 1-based selection number shown on the cell
    pub fn index_of(&self, identifier: &str) -> Option<usize> {
        self.assets
            .iter()
            .position(|a| a.identifier == identifier)
            .map(|i| i + 1)
    }

    /// Deselect when present, select when there is room, otherwise report the limit.
    pub fn toggle(&mut self, asset: AssetRef) -> SelectionChange {
        if self.contains(&asset.identifier) {
            self.deselect(&asset.identifier);
            SelectionChange::Deselected
        } else {
            self.select(asset)
        }
    }

    /// Selecting an asset that is already selected reports its current number.
    pub fn select(&mut self, asset: AssetRef) -> SelectionChange {
        if let Some(number) = self.index_of(&asset.identifier) {
            return SelectionChange::Selected { number };
        }
        if self.is_full() {
            return SelectionChange::LimitReached { count: self.assets.len() };
        }
        self.assets.push(asset);
        SelectionChange::Selected { number: self.assets.len() }
    }

    pub fn deselect(&mut self, identifier: &str) -> bool {
        let before = self.assets.len();
        self.assets.retain(|a| a.identifier != identifier);
        before != self.assets.len()
    }

    pub fn clear(&mut self) {
        self.assets.clear();
    }

    pub fn assets(&self) -> &[AssetRef] {
        &self.assets
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.identifier.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::asset::types::MediaKind;

    fn asset(id: &str) -> AssetRef {
        AssetRef::new(id, MediaKind::Image)
    }

    #[test]
    fn test_toggle_selects_then_deselects() {
        let mut set = SelectionSet::new(3);
        assert_eq!(set.toggle(asset("a")), SelectionChange::Selected { number: 1 });
        assert_eq!(set.toggle(asset("b")), SelectionChange::Selected { number: 2 });
        assert_eq!(set.toggle(asset("a")), SelectionChange::Deselected);
        assert_eq!(set.identifiers(), vec!["b".to_string()]);
        assert_eq!(set.index_of("b"), Some(1));
    }

    #[test]
    fn test_never_exceeds_limit() {
        let mut set = SelectionSet::new(2);
        set.toggle(asset("a"));
        set.toggle(asset("b"));
        assert_eq!(set.toggle(asset("c")), SelectionChange::LimitReached { count: 2 });
        assert_eq!(set.len(), 2);
        assert!(!set.contains("c"));
        assert!(set.is_full());
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut set = SelectionSet::new(5);
        set.select(asset("a"));
        set.select(asset("b"));
        assert_eq!(set.select(asset("a")), SelectionChange::Selected { number: 1 });
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_lowering_limit_keeps_earliest() {
        let mut set = SelectionSet::new(4);
        for id in ["a", "b", "c", "d"] {
            set.select(asset(id));
        }
        set.set_max(2);
        assert_eq!(set.identifiers(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_zero_limit_is_one() {
        let mut set = SelectionSet::new(0);
        assert_eq!(set.max(), 1);
        set.select(asset("a"));
        assert_eq!(set.select(asset("b")), SelectionChange::LimitReached { count: 1 });
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_change_serializes_with_tag() {
        let json = serde_json::to_string(&SelectionChange::LimitReached { count: 9 }).unwrap();
        assert_eq!(json, r#"{"outcome":"limit_reached","count":9}"#);
    }
}
