/// Cache schema. Safe to run on every open.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    url TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    updated TEXT NOT NULL,
    thumbnail TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
