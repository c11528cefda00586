mod fetcher;
mod mapper;

pub use fetcher::{ArticleSource, NewsApiClient};
pub use mapper::{parse_published_at, parse_response, to_records, RemoteArticle, RemoteSource};
