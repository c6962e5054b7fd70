pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    slot INTEGER PRIMARY KEY NOT NULL CHECK(slot BETWEEN 0 AND 8 AND slot != 4),
    image_ref TEXT NOT NULL,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

// Simple key-value store for card-level state
pub const META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

pub async fn initialize_schema(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(PHOTOS_TABLE).execute(pool).await?;
    sqlx::query(META_TABLE).execute(pool).await?;
    Ok(())
}
