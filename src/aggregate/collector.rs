use std::collections::{BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};

/// Destination for list-valued task results.
///
/// `count` is what the result quota is measured against, so a set that
/// drops duplicates fills up more slowly than a `Vec` fed the same items.
pub trait Collector<T> {
    fn add_all<I: IntoIterator<Item = T>>(&mut self, items: I);

    fn count(&self) -> usize;
}

impl<T> Collector<T> for Vec<T> {
    fn add_all<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.extend(items);
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl<T: Eq + Hash, S: BuildHasher> Collector<T> for HashSet<T, S> {
    fn add_all<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.extend(items);
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl<T: Ord> Collector<T> for BTreeSet<T> {
    fn add_all<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.extend(items);
    }

    fn count(&self) -> usize {
        self.len()
    }
}
