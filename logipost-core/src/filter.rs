//! Keyword relevance filtering and category classification.

use crate::types::Post;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// `haystack` must already be lowercased.
    fn occurs_in(&self, haystack: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
    }
}

/// Ordered topic → keywords table. Order matters for classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    topics: Vec<Topic>,
}

impl KeywordTable {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_topic(text).is_some()
    }

    pub fn matches_post(&self, post: &Post) -> bool {
        self.matches(&post.title) || self.matches(&post.content)
    }

    pub fn first_topic(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let haystack = text.to_lowercase();
        self.topics
            .iter()
            .find(|topic| topic.occurs_in(&haystack))
            .map(|topic| topic.name.as_str())
    }
}

/// Keeps relevant posts, best first by `(upvotes, comment count)`, optionally
/// truncated to `limit`.
pub fn filter_relevant(posts: Vec<Post>, table: &KeywordTable, limit: Option<usize>) -> Vec<Post> {
    let mut relevant: Vec<Post> = posts
        .into_iter()
        .filter(|post| table.matches_post(post))
        .collect();

    relevant.sort_by(|a, b| {
        (b.upvotes, b.comment_count()).cmp(&(a.upvotes, a.comment_count()))
    });

    if let Some(limit) = limit {
        relevant.truncate(limit);
    }
    relevant
}

#[derive(Debug, Clone)]
pub struct Classifier {
    table: KeywordTable,
    default_label: String,
}

impl Classifier {
    pub fn new(table: KeywordTable, default_label: impl Into<String>) -> Self {
        Self {
            table,
            default_label: default_label.into(),
        }
    }

    pub fn classify(&self, title: &str) -> &str {
        self.table
            .first_topic(title)
            .unwrap_or(self.default_label.as_str())
    }

    pub fn classify_all(&self, posts: &mut [Post]) {
        for post in posts.iter_mut() {
            post.category = Some(self.classify(&post.title).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Comment;

    fn topics() -> KeywordTable {
        KeywordTable::new(vec![
            Topic::new("Parcel Shipping", &["parcel shipping", "parcel delivery"]),
            Topic::new("Third-Party Logistics (3PL)", &["3PL", "outsourced logistics"]),
        ])
    }

    #[test]
    fn test_case_insensitive_match_in_title_or_content() {
        let table = topics();
        assert!(table.matches_post(&Post::new("Choosing a 3pl partner", "")));
        assert!(table.matches_post(&Post::new("Question", "Any PARCEL DELIVERY tips?")));
        assert!(!table.matches_post(&Post::new("Truck maintenance", "Oil changes")));
    }

    #[test]
    fn test_empty_fields_never_match() {
        let table = topics();
        assert!(!table.matches_post(&Post::new("", "")));
        assert!(!KeywordTable::default().matches("parcel shipping"));
    }

    #[test]
    fn test_filter_sorts_by_upvotes_then_comments() {
        let table = topics();
        let posts = vec![
            Post::new("3PL a", "").with_upvotes(5),
            Post::new("3PL b", "")
                .with_upvotes(5)
                .with_comments(vec![Comment::new(None, "hi")]),
            Post::new("3PL c", "").with_upvotes(9),
            Post::new("irrelevant", "").with_upvotes(100),
        ];

        let filtered = filter_relevant(posts, &table, None);
        let titles: Vec<&str> = filtered.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["3PL c", "3PL b", "3PL a"]);

        let posts = vec![
            Post::new("3PL a", "").with_upvotes(1),
            Post::new("3PL b", "").with_upvotes(2),
        ];
        let filtered = filter_relevant(posts, &table, Some(1));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "3PL b");
    }

    #[test]
    fn test_classifier_first_match_wins() {
        let classifier = Classifier::new(
            KeywordTable::new(vec![
                Topic::new("logistics", &["logistics", "warehouse"]),
                Topic::new("freight", &["freight", "shipping"]),
            ]),
            DEFAULT_CATEGORY,
        );

        assert_eq!(classifier.classify("Warehouse freight rates"), "logistics");
        assert_eq!(classifier.classify("Shipping delays"), "freight");
        assert_eq!(classifier.classify("Hiring drivers"), "general");
        assert_eq!(classifier.classify(""), "general");
    }

    #[test]
    fn test_classify_all_sets_category() {
        let classifier = Classifier::new(topics(), "other");
        let mut posts = vec![Post::new("Parcel shipping costs", ""), Post::new("x", "")];
        classifier.classify_all(&mut posts);
        assert_eq!(posts[0].category.as_deref(), Some("Parcel Shipping"));
        assert_eq!(posts[1].category.as_deref(), Some("other"));
    }
}
