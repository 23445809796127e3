use chrono::{DateTime, Utc};
use nd_core::types::ArticleSource;
use nd_core::{FetchedBatch, Headline};
use serde::Deserialize;

/// Wire shape of both the `top-headlines` and `everything` endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub articles: Vec<ApiArticle>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiArticle {
    #[serde(default)]
    pub source: ApiSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl From<ApiArticle> for Headline {
    fn from(article: ApiArticle) -> Self {
        Headline {
            source: ArticleSource {
                id: article.source.id,
                name: article.source.name,
            },
            author: article.author,
            title: article.title,
            description: article.description,
            url: article.url,
            image_url: article.url_to_image,
            published_at: article.published_at,
            content: article.content,
        }
    }
}

impl From<ArticlesResponse> for FetchedBatch {
    fn from(response: ArticlesResponse) -> Self {
        FetchedBatch {
            total_results: response.total_results,
            articles: response.articles.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_headlines_page() {
        let raw = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": "the-verge", "name": "The Verge"},
                    "author": "Jane Doe",
                    "title": "A headline",
                    "description": "Something happened",
                    "url": "https://example.com/a",
                    "urlToImage": "https://example.com/a.jpg",
                    "publishedAt": "2024-05-01T12:30:00Z",
                    "content": "Body text"
                },
                {
                    "source": {"id": null, "name": "Wire"},
                    "author": null,
                    "title": "Another headline",
                    "description": null,
                    "url": "https://example.com/b",
                    "urlToImage": null,
                    "publishedAt": null,
                    "content": null
                }
            ]
        }"#;

        let response: ArticlesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.total_results, 2);

        let batch: FetchedBatch = response.into();
        assert_eq!(batch.articles.len(), 2);
        assert_eq!(batch.articles[0].image_url.as_deref(), Some("https://example.com/a.jpg"));
        assert!(batch.articles[1].published_at.is_none());
    }

    #[test]
    fn deserializes_an_error_body() {
        let raw = r#"{
            "status": "error",
            "code": "rateLimited",
            "message": "You have made too many requests."
        }"#;
        let response: ArticlesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.status, "error");
        assert_eq!(response.code.as_deref(), Some("rateLimited"));
        assert!(response.articles.is_empty());
    }
}
