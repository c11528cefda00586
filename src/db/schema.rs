pub const SCHEMA: &str = r#"
-- subscriptions table (rowid keeps insertion order)
CREATE TABLE IF NOT EXISTS subscriptions (
    topic TEXT NOT NULL PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- articles table, partitioned by topic
CREATE TABLE IF NOT EXISTS articles (
    url TEXT NOT NULL,
    topic TEXT NOT NULL REFERENCES subscriptions(topic) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    image_url TEXT,
    source TEXT NOT NULL,
    published_at INTEGER NOT NULL,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (url, topic)
);

CREATE INDEX IF NOT EXISTS idx_articles_topic ON articles(topic);
CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC);
"#;
