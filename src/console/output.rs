use chrono::{DateTime, Local, Utc};

use news_sync::models::Article;

const WRAP_WIDTH: usize = 80;

pub fn print_topics(topics: &[String]) {
    if topics.is_empty() {
        println!("No subscriptions.");
        return;
    }
    for topic in topics {
        println!("  {}", topic);
    }
}

pub fn print_articles(articles: &[Article]) {
    if articles.is_empty() {
        println!("No cached articles.");
        return;
    }

    for article in articles {
        println!("{}", article.title);
        println!("  {} | {}", article.source, format_published(article.published_at));
        if !article.description.is_empty() {
            for line in textwrap::wrap(&article.description, WRAP_WIDTH - 2) {
                println!("  {}", line);
            }
        }
        println!("  {}", article.url);
        println!();
    }
}

fn format_published(epoch_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}
