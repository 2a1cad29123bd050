//! Catalog schema (idempotent, `CREATE ... IF NOT EXISTS`)

use sqlx::SqlitePool;

use crate::Result;

/// Create every catalog table and index
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_items_table(pool).await?;
    create_tags_table(pool).await?;
    create_item_tags_table(pool).await?;
    create_item_relations_table(pool).await?;
    create_audit_logs_table(pool).await?;
    create_sellables_table(pool).await?;
    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    // search_text holds the folded "name code" used for free-text search
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            code TEXT UNIQUE,
            name TEXT NOT NULL,
            level TEXT NOT NULL CHECK (level IN ('Equipamento', 'Conjunto', 'Parte', 'Peça', 'Kit')),
            context TEXT NOT NULL DEFAULT '{}',
            attributes TEXT NOT NULL DEFAULT '{}',
            search_text TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_level ON items(level)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL DEFAULT 'free',
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_item_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_tags (
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (item_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_item_relations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_relations (
            parent_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            child_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            relation TEXT NOT NULL DEFAULT 'contains',
            created_at TIMESTAMP NOT NULL,
            PRIMARY KEY (parent_id, child_id),
            CHECK (parent_id <> child_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_relations_child ON item_relations(child_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_audit_logs_table(pool: &SqlitePool) -> Result<()> {
    // No foreign key: entries outlive the items they describe
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            item_code TEXT,
            action TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL CHECK (status IN ('success', 'error')),
            message TEXT,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_item_code ON audit_logs(item_code)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_sellables_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sellables (
            item_id TEXT PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
            price REAL NOT NULL CHECK (price >= 0),
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
