use std::collections::HashSet;
use std::hash::Hash;

/// Sample input used when no numbers are given on the command line
pub const SAMPLE: [i64; 8] = [1, 2, 3, 4, 5, 4, 3, 7];

/// Return true if any two positions in `items` hold equal values
pub fn has_duplicate<T: Eq + Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().any(|item| !seen.insert(item))
}

/// Every value that repeats, listed once, in order of its first repetition
pub fn find_duplicates<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();

    for item in items {
        if !seen.insert(item) && reported.insert(item) {
            duplicates.push(item.clone());
        }
    }

    duplicates
}
