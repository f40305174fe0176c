//! Paging of query results.

use serde::{Deserialize, Serialize};

/// Which slice of a result set to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    /// Page number (0-indexed)
    #[serde(default)]
    pub page: usize,

    /// Results per page; `None` returns everything from `page` 0 on.
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl Default for Pager {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Pager {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size: Some(page_size) }
    }

    /// The first result only; used for single-entity resolution.
    pub fn single() -> Self {
        Self::new(0, 1)
    }

    pub fn unlimited() -> Self {
        Self { page: 0, page_size: None }
    }

    /// Index of the first item on this page, saturating at `usize::MAX`.
    pub fn offset(&self) -> usize {
        self.page_size.map_or(0, |size| self.page.saturating_mul(size))
    }

    /// Cut `items` down to this page, reporting the full count.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let items = match self.page_size {
            Some(size) => items.into_iter().skip(self.offset()).take(size).collect(),
            None => items,
        };
        Page { items, total }
    }
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), total: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), total: self.total }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pager_slices() {
        let page = Pager::new(1, 2).apply(vec![1, 2, 3, 4, 5]);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);

        let single = Pager::single().apply(vec!["a", "b"]);
        assert_eq!(single.into_first(), Some("a"));

        let all = Pager::unlimited().apply(vec![1, 2, 3]);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_past_the_end_is_empty() {
        let page = Pager::new(5, 10).apply(vec![1, 2, 3]);
        assert!(page.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_huge_page_number_does_not_overflow() {
        let pager = Pager::new(usize::MAX, 2);
        assert_eq!(pager.offset(), usize::MAX);

        let page = pager.apply(vec![1, 2, 3]);
        assert!(page.is_empty());
        assert_eq!(page.total, 3);
    }
}
