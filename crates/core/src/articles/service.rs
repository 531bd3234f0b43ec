//! Article CRUD operations

use std::sync::Arc;

use quire_domain::constants::ARTICLES_ENDPOINT;
use quire_domain::{ApiResult, Article, ArticleDraft, PaginatedResponse, QueryParams};
use serde_json::Value;

use crate::api::ApiClient;

/// Article operations on top of [`ApiClient`]
///
/// Reads go through the response cache; writes invalidate the cached
/// `/articles` entries.
#[derive(Debug, Clone)]
pub struct ArticleService {
    client: Arc<ApiClient>,
}

impl ArticleService {
    /// Create the service on a shared client.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// All articles (cached GET).
    pub async fn list(&self) -> ApiResult<Vec<Article>> {
        self.client.get(ARTICLES_ENDPOINT, None).await
    }

    /// One page of articles matching `query`.
    pub async fn page(&self, query: &QueryParams) -> ApiResult<PaginatedResponse<Article>> {
        let params = query.to_value();
        self.client.get(ARTICLES_ENDPOINT, Some(&params)).await
    }

    /// One article by id (cached GET).
    pub async fn get(&self, id: i64) -> ApiResult<Article> {
        self.client.get(&article_url(id), None).await
    }

    /// Create an article; invalidates cached article reads.
    pub async fn create(&self, draft: &ArticleDraft) -> ApiResult<Article> {
        self.client.post(ARTICLES_ENDPOINT, draft).await
    }

    /// Replace an article; invalidates cached article reads.
    pub async fn update(&self, id: i64, draft: &ArticleDraft) -> ApiResult<Article> {
        self.client.put(&article_url(id), draft).await
    }

    /// Delete an article. Whatever the server returns is discarded.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        self.client.delete::<Value>(&article_url(id)).await.map(|_| ())
    }
}

fn article_url(id: i64) -> String {
    format!("{ARTICLES_ENDPOINT}/{id}")
}

#[cfg(test)]
mod tests {
    use quire_domain::SortOrder;
    use serde_json::json;

    use super::*;
    use crate::api::ports::{HttpMethod, TransportResponse};
    use crate::api::ApiClientConfig;
    use crate::testing::{InMemoryKeyValueStore, InMemoryTokenStore, ScriptedTransport};

    fn article(id: i64) -> Value {
        json!({ "a_id": id, "a_title": "Title", "a_content": "Body", "a_slug": format!("a-{id}") })
    }

    fn service(transport: &ScriptedTransport) -> ArticleService {
        let client = ApiClient::builder()
            .config(ApiClientConfig::new("http://api.test"))
            .transport(Arc::new(transport.clone()))
            .token_store(Arc::new(InMemoryTokenStore::with_tokens("a1", "r1")))
            .cache_store(Arc::new(InMemoryKeyValueStore::new()))
            .build()
            .unwrap();
        ArticleService::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_crud_round() {
        let transport = ScriptedTransport::new(|request| {
            let path = request.path();
            match (request.method, path.as_str()) {
                (HttpMethod::Get, "/articles") => {
                    Ok(TransportResponse::json(200, &json!([article(1), article(2)])))
                }
                (HttpMethod::Get, "/articles/2") => Ok(TransportResponse::json(200, &article(2))),
                (HttpMethod::Post, "/articles") => Ok(TransportResponse::json(201, &article(3))),
                (HttpMethod::Put, "/articles/3") => Ok(TransportResponse::json(200, &article(3))),
                (HttpMethod::Delete, "/articles/3") => Ok(TransportResponse::new(204, "")),
                _ => Ok(TransportResponse::json(404, &json!({ "message": "Not found" }))),
            }
        });
        let articles = service(&transport);

        assert_eq!(articles.list().await.unwrap().len(), 2);
        assert_eq!(articles.get(2).await.unwrap().slug, "a-2");

        let draft = ArticleDraft {
            title: "Title".into(),
            content: "Body".into(),
            slug: "a-3".into(),
        };
        assert_eq!(articles.create(&draft).await.unwrap().id, 3);
        assert_eq!(articles.update(3, &draft).await.unwrap().id, 3);
        articles.delete(3).await.unwrap();

        let err = articles.get(99).await.unwrap_err();
        assert_eq!(err.status_code, 404);
        assert_eq!(err.message, "Not found");
    }

    #[tokio::test]
    async fn test_page_sends_query_params() {
        let transport = ScriptedTransport::new(|_| {
            Ok(TransportResponse::json(
                200,
                &json!({
                    "items": [article(11)],
                    "total": 21,
                    "page": 2,
                    "limit": 10,
                    "totalPages": 3
                }),
            ))
        });
        let articles = service(&transport);

        let query = QueryParams::new().page(2).limit(10).sort("a_title", SortOrder::Desc);
        let page = articles.page(&query).await.unwrap();

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].id, 11);
        let sent = &transport.requests()[0];
        assert_eq!(sent.query, Some(query.to_value()));
    }
}
