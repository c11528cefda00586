mod article;
mod settings;

pub use article::{into_articles, Article, ArticleRecord};
pub use settings::{Interval, Language, RefreshPolicy, Settings};
