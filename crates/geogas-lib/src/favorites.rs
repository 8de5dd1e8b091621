//! Favorite station queries
//!
//! The pipeline only ever *reads* favorites through [`FavoritesQuery`]. Owners
//! of a favorites store (in memory, on disk, ...) implement [`Favorites`],
//! whose snapshots are always independent copies of the current state.

use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;

/// Read-only membership test over favorite station ids
pub trait FavoritesQuery {
    /// Check whether a station id is marked as favorite
    fn contains(&self, id: &str) -> bool;
}

/// A mutable favorites store
///
/// `toggle` is a single atomic operation: implementations must never expose a
/// state in which the id was removed but the change was not yet recorded.
pub trait Favorites: FavoritesQuery {
    type Error;

    /// Flip the favorite state of `id`, returning the new state
    fn toggle(&mut self, id: &str) -> Result<bool, Self::Error>;

    /// Snapshot of every favorite id
    fn all(&self) -> BTreeSet<String>;

    /// Remove every favorite
    fn clear(&mut self) -> Result<(), Self::Error>;
}

impl<T: FavoritesQuery + ?Sized> FavoritesQuery for &T {
    #[inline]
    fn contains(&self, id: &str) -> bool {
        (**self).contains(id)
    }
}

impl FavoritesQuery for HashSet<String> {
    #[inline]
    fn contains(&self, id: &str) -> bool {
        HashSet::contains(self, id)
    }
}

impl FavoritesQuery for BTreeSet<String> {
    #[inline]
    fn contains(&self, id: &str) -> bool {
        BTreeSet::contains(self, id)
    }
}

/// In-memory favorites store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FavoritesSet {
    ids: BTreeSet<String>,
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FavoritesSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl FavoritesQuery for FavoritesSet {
    #[inline]
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

impl Favorites for FavoritesSet {
    type Error = Infallible;

    fn toggle(&mut self, id: &str) -> Result<bool, Infallible> {
        if self.ids.remove(id) {
            Ok(false)
        } else {
            self.ids.insert(id.to_string());
            Ok(true)
        }
    }

    fn all(&self) -> BTreeSet<String> {
        self.ids.clone()
    }

    fn clear(&mut self) -> Result<(), Infallible> {
        self.ids.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        let mut favorites = FavoritesSet::new();
        assert_eq!(favorites.toggle("1"), Ok(true));
        assert!(favorites.contains("1"));
        assert_eq!(favorites.toggle("1"), Ok(false));
        assert!(!favorites.contains("1"));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut favorites: FavoritesSet = ["1", "2"].into_iter().collect();
        let snapshot = favorites.all();
        favorites.toggle("3").unwrap();
        favorites.clear().unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("1"));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_query_through_reference() {
        let ids: HashSet<String> = ["7".to_string()].into_iter().collect();
        fn check<F: FavoritesQuery>(favorites: F) -> bool {
            favorites.contains("7")
        }
        assert!(check(&ids));
        assert!(!check(&FavoritesSet::new()));
    }
}
