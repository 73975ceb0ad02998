//! Title-based deduplication.
//!
//! Posts are keyed by their normalized title (lowercased, trimmed). One post
//! survives per key; the survivor is chosen by [`TieBreak`] and keeps the slot
//! where its title was first seen.

use crate::types::Post;
use std::collections::{HashMap, HashSet};

/// Rule for choosing between two posts that share a normalized title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The challenger replaces the kept post only with strictly more upvotes.
    #[default]
    Upvotes,
    /// As `Upvotes`, and on equal upvotes the earlier `created_at` wins.
    UpvotesThenEarliest,
}

impl TieBreak {
    fn prefers(self, challenger: &Post, kept: &Post) -> bool {
        match self {
            TieBreak::Upvotes => challenger.upvotes > kept.upvotes,
            TieBreak::UpvotesThenEarliest => {
                challenger.upvotes > kept.upvotes
                    || (challenger.upvotes == kept.upvotes
                        && challenger.created_at < kept.created_at)
            }
        }
    }
}

pub fn normalized_title(title: &str) -> String {
    title.trim().to_lowercase()
}

pub fn dedupe_posts(posts: Vec<Post>, tie_break: TieBreak) -> Vec<Post> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(posts.len());
    let mut unique: Vec<Post> = Vec::with_capacity(posts.len());

    for post in posts {
        let key = post.normalized_title();
        match slots.get(&key) {
            Some(&slot) => {
                if tie_break.prefers(&post, &unique[slot]) {
                    unique[slot] = post;
                }
            }
            None => {
                slots.insert(key, unique.len());
                unique.push(post);
            }
        }
    }

    unique
}

/// Seen-title accumulator used while collecting across sources.
#[derive(Debug, Default, Clone)]
pub struct TitleIndex {
    seen: HashSet<String>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the title had not been seen before.
    pub fn insert(&mut self, title: &str) -> bool {
        self.seen.insert(normalized_title(title))
    }

    pub fn contains(&self, title: &str) -> bool {
        self.seen.contains(&normalized_title(title))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<'a> FromIterator<&'a Post> for TitleIndex {
    fn from_iter<I: IntoIterator<Item = &'a Post>>(iter: I) -> Self {
        let mut index = TitleIndex::new();
        for post in iter {
            index.insert(&post.title);
        }
        index
    }
}

/// Drops every post of `current` whose title already appears in `previous`.
pub fn exclude_seen(current: Vec<Post>, previous: &[Post]) -> Vec<Post> {
    let published: TitleIndex = previous.iter().collect();
    current
        .into_iter()
        .filter(|post| !published.contains(&post.title))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(title: &str, upvotes: i64) -> Post {
        Post::new(title, "").with_upvotes(upvotes)
    }

    #[test]
    fn test_keeps_higher_upvoted_duplicate() {
        let posts = vec![post("Freight Delay", 5), post("freight delay", 12)];
        let unique = dedupe_posts(posts, TieBreak::Upvotes);

        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].upvotes, 12);
    }

    #[test]
    fn test_one_entry_per_normalized_title() {
        let posts = vec![
            post("Carrier rates", 1),
            post("  carrier RATES ", 3),
            post("Cross-docking tips", 7),
            post("Carrier Rates", 2),
            post("cross-docking tips", 7),
        ];
        let unique = dedupe_posts(posts, TieBreak::Upvotes);

        let titles: HashSet<String> = unique.iter().map(|p| p.normalized_title()).collect();
        assert_eq!(unique.len(), 2);
        assert_eq!(titles.len(), 2);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let posts = vec![
            post("B", 1),
            post("A", 1),
            post("b", 10),
            post("C", 1),
        ];
        let unique = dedupe_posts(posts, TieBreak::Upvotes);

        let titles: Vec<&str> = unique.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "A", "C"]);
    }

    #[test]
    fn test_equal_upvotes_keep_first_by_default() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let posts = vec![
            post("Dock scheduling", 4).with_created_at(late),
            post("dock scheduling", 4).with_created_at(early),
        ];

        let unique = dedupe_posts(posts.clone(), TieBreak::Upvotes);
        assert_eq!(unique[0].created_at, late);

        let unique = dedupe_posts(posts, TieBreak::UpvotesThenEarliest);
        assert_eq!(unique[0].created_at, early);
    }

    #[test]
    fn test_survivor_has_max_upvotes() {
        let posts: Vec<Post> = [3, 9, 1, 9, 4]
            .iter()
            .map(|&u| post("Route optimization", u))
            .collect();
        let unique = dedupe_posts(posts, TieBreak::UpvotesThenEarliest);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].upvotes, 9);
    }

    #[test]
    fn test_exclude_seen() {
        let previous = vec![post("Old News", 1)];
        let current = vec![post("old news ", 5), post("Fresh", 2)];
        let remaining = exclude_seen(current, &previous);

        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Fresh");
    }

    #[test]
    fn test_title_index() {
        let mut index = TitleIndex::new();
        assert!(index.insert("Freight"));
        assert!(!index.insert(" FREIGHT"));
        assert!(index.contains("freight "));
        assert_eq!(index.len(), 1);
    }
}
