//! Tag index
//!
//! Frequency map from normalized tag to the number of posts carrying it.
//! A tag present in the index always has a count of at least one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Post;

/// Tag with its post count, as served in the tag cloud
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagWithCount {
    pub name: String,
    pub post_count: usize,
}

/// Usage counts per normalized tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    counts: BTreeMap<String, usize>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the index from scratch.
    pub fn rebuild<'a, I>(posts: I) -> Self
    where
        I: IntoIterator<Item = &'a Post>,
    {
        let mut index = Self::new();
        for post in posts {
            index.add_tags(&post.tags);
        }
        index
    }

    pub fn add_tags(&mut self, tags: &[String]) {
        for tag in tags {
            *self.counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    /// Decrements each tag, dropping entries that reach zero. Removing a tag
    /// that is not indexed leaves the index unchanged.
    pub fn remove_tags(&mut self, tags: &[String]) {
        for tag in tags {
            match self.counts.get_mut(tag) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    self.counts.remove(tag);
                }
                None => tracing::warn!(tag = %tag, "Removing tag that is not indexed"),
            }
        }
    }

    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Tags in name order with their counts
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    /// Tag cloud ordered by post count descending, then by name.
    pub fn cloud(&self) -> Vec<TagWithCount> {
        let mut tags: Vec<TagWithCount> = self
            .iter()
            .map(|(name, post_count)| TagWithCount {
                name: name.to_string(),
                post_count,
            })
            .collect();
        // BTreeMap order already sorts by name; a stable sort keeps it for ties.
        tags.sort_by(|a, b| b.post_count.cmp(&a.post_count));
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_and_remove() {
        let mut index = TagIndex::new();
        index.add_tags(&tags(&["rust", "web"]));
        index.add_tags(&tags(&["rust"]));

        assert_eq!(index.count("rust"), 2);
        assert_eq!(index.count("web"), 1);

        index.remove_tags(&tags(&["rust", "web"]));
        assert_eq!(index.count("rust"), 1);
        assert_eq!(index.count("web"), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_absent_tag_is_noop() {
        let mut index = TagIndex::new();
        index.add_tags(&tags(&["go"]));
        index.remove_tags(&tags(&["python"]));

        assert_eq!(index.len(), 1);
        assert_eq!(index.count("go"), 1);
    }

    #[test]
    fn test_cloud_order() {
        let mut index = TagIndex::new();
        index.add_tags(&tags(&["b", "a", "c"]));
        index.add_tags(&tags(&["c"]));

        let cloud: Vec<_> = index.cloud().into_iter().map(|t| (t.name, t.post_count)).collect();
        assert_eq!(
            cloud,
            vec![("c".to_string(), 2), ("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn tag_lists() -> impl Strategy<Value = Vec<Vec<String>>> {
            prop::collection::vec(prop::collection::vec("[a-e]", 0..4), 0..12)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Counts never drop to zero while the entry is kept.
            #[test]
            fn counts_stay_positive(lists in tag_lists(), removals in tag_lists()) {
                let mut index = TagIndex::new();
                for list in &lists {
                    index.add_tags(list);
                }
                for list in &removals {
                    index.remove_tags(list);
                }
                for (_, count) in index.iter() {
                    prop_assert!(count >= 1);
                }
            }

            /// Adding then removing the same lists returns to empty.
            #[test]
            fn add_then_remove_is_empty(lists in tag_lists()) {
                let mut index = TagIndex::new();
                for list in &lists {
                    index.add_tags(list);
                }
                for list in lists.iter().rev() {
                    index.remove_tags(list);
                }
                prop_assert!(index.is_empty());
            }
        }
    }
}
