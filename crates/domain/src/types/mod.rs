//! Domain types and models

pub mod article;
pub mod auth;
pub mod cache;
pub mod pagination;

pub use article::{Article, ArticleDraft};
pub use auth::{Credentials, NewUser, RefreshRequest, Role, TokenPair};
pub use cache::CacheEntry;
pub use pagination::{ApiResponse, PaginatedResponse, QueryParams, ResponseStatus, SortOrder};
