use anyhow::Result;
use sqlx::PgPool;

/// Tables in creation order; drops run in reverse.
pub const TABLES: &[&str] = &[
    "subjects",
    "users",
    "laws",
    "achievements",
    "user_progress",
    "user_achievements",
    "user_favorites",
    "user_notes",
    "user_markups",
    "comments",
    "announcements",
    "user_seen_announcements",
];

const TYPES_SQL: &[&str] = &[
    r#"
    DO $$ BEGIN
        CREATE TYPE user_role AS ENUM ('student', 'admin');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$;
    "#,
    r#"
    DO $$ BEGIN
        CREATE TYPE progress_status AS ENUM ('not_started', 'in_progress', 'completed');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$;
    "#,
];

const UPDATED_AT_FUNCTION_SQL: &str = r#"
CREATE OR REPLACE FUNCTION set_updated_at_unix_timestamp()
RETURNS TRIGGER AS $$
BEGIN NEW.updated_at = floor(extract(epoch from now())); RETURN NEW; END;
$$ language 'plpgsql';
"#;

const CREATE_TABLES_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL DEFAULT '',
        role user_role NOT NULL DEFAULT 'student',
        is_approved BOOLEAN NOT NULL DEFAULT FALSE,
        points BIGINT NOT NULL DEFAULT 0,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS laws (
        id UUID PRIMARY KEY,
        parent_id UUID REFERENCES laws(id),
        subject_id UUID REFERENCES subjects(id),
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS achievements (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        icon TEXT,
        points_threshold BIGINT,
        laws_completed_threshold BIGINT,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_progress (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        law_id UUID NOT NULL REFERENCES laws(id),
        status progress_status NOT NULL DEFAULT 'in_progress',
        last_read_position TEXT,
        completed_at BIGINT,
        last_accessed_at BIGINT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, law_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_achievements (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        achievement_id UUID NOT NULL REFERENCES achievements(id),
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, achievement_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_favorites (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        law_id UUID NOT NULL REFERENCES laws(id),
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, law_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_notes (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        law_id UUID NOT NULL REFERENCES laws(id),
        content TEXT NOT NULL DEFAULT '',
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, law_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_markups (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        law_id UUID NOT NULL REFERENCES laws(id),
        content TEXT NOT NULL DEFAULT '',
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, law_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id UUID PRIMARY KEY,
        seq BIGSERIAL,
        user_id UUID NOT NULL REFERENCES users(id),
        law_id UUID NOT NULL REFERENCES laws(id),
        anchor_paragraph_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS announcements (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_seen_announcements (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        announcement_id UUID NOT NULL REFERENCES announcements(id),
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (user_id, announcement_id)
    );
    "#,
];

const INDEXES_SQL: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_laws_parent_id ON laws (parent_id);",
    "CREATE INDEX IF NOT EXISTS idx_user_progress_user_id ON user_progress (user_id);",
    "CREATE INDEX IF NOT EXISTS idx_user_progress_law_id ON user_progress (law_id);",
    "CREATE INDEX IF NOT EXISTS idx_user_achievements_user_id ON user_achievements (user_id);",
    "CREATE INDEX IF NOT EXISTS idx_comments_law_id ON comments (law_id, seq);",
    "CREATE INDEX IF NOT EXISTS idx_user_seen_announcements_user_id ON user_seen_announcements (user_id);",
];

pub async fn create_schema(pool: &PgPool) -> Result<()> {
    for type_sql in TYPES_SQL {
        sqlx::query(type_sql).execute(pool).await?;
    }

    sqlx::query(UPDATED_AT_FUNCTION_SQL).execute(pool).await?;

    for create_sql in CREATE_TABLES_SQL {
        sqlx::query(create_sql).execute(pool).await?;
    }

    for table in TABLES {
        let drop_trigger = format!("DROP TRIGGER IF EXISTS set_updated_at_on_{table} ON {table};");
        let create_trigger = format!(
            "CREATE TRIGGER set_updated_at_on_{table} BEFORE UPDATE ON {table} \
             FOR EACH ROW EXECUTE FUNCTION set_updated_at_unix_timestamp();"
        );
        sqlx::query(&drop_trigger).execute(pool).await?;
        sqlx::query(&create_trigger).execute(pool).await?;
    }

    for index_sql in INDEXES_SQL {
        sqlx::query(index_sql).execute(pool).await?;
    }

    tracing::info!("[create_schema] schema is up to date");
    Ok(())
}

pub async fn drop_schema(pool: &PgPool) -> Result<()> {
    for table in TABLES.iter().rev() {
        let drop_sql = format!("DROP TABLE IF EXISTS {table} CASCADE;");
        sqlx::query(&drop_sql).execute(pool).await?;
    }
    Ok(())
}
