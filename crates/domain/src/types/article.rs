//! Article types
//!
//! The backend prefixes article columns with `a_`; the Rust field names drop
//! the prefix and serde restores it on the wire.

use serde::{Deserialize, Serialize};

/// A published article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "a_id")]
    pub id: i64,
    #[serde(rename = "a_title")]
    pub title: String,
    #[serde(rename = "a_content")]
    pub content: String,
    #[serde(rename = "a_slug")]
    pub slug: String,
}

/// Body for creating or replacing an article (everything but the id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    #[serde(rename = "a_title")]
    pub title: String,
    #[serde(rename = "a_content")]
    pub content: String,
    #[serde(rename = "a_slug")]
    pub slug: String,
}

impl From<Article> for ArticleDraft {
    fn from(article: Article) -> Self {
        Self { title: article.title, content: article.content, slug: article.slug }
    }
}
