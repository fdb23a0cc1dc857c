//! Database migrations, reference-data seeding and initialization.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::info;

/// (name, min, max, percentage)
const DEFAULT_TIERS: &[(&str, &str, &str, &str)] = &[
    ("Tier A", "100000", "300000", "4"),
    ("Tier B", "50000", "99999.99", "5"),
    ("Tier C", "0", "49999.99", "6"),
];

/// Half-open bands of the legacy dynamic rate: (min, max, percentage).
const DEFAULT_DYNAMIC_RATES: &[(&str, &str, &str)] = &[
    ("0", "399.99", "0"),
    ("399.99", "699.99", "1"),
    ("699.99", "999.99", "2"),
    ("999.99", "999999", "3"),
];

struct RankSeed {
    name: &'static str,
    position: i64,
    min: &'static str,
    max: &'static str,
    emoji: &'static str,
    description: &'static str,
    rewards: &'static [&'static str],
}

const DEFAULT_RANKS: &[RankSeed] = &[
    RankSeed {
        name: "Rookie",
        position: 1,
        min: "0",
        max: "4999.99",
        emoji: "🐣",
        description: "Welcome! This is where everyone starts.",
        rewards: &["0"],
    },
    RankSeed {
        name: "Hustler",
        position: 2,
        min: "5000",
        max: "9999.99",
        emoji: "💪",
        description: "You're making progress. Keep the momentum.",
        rewards: &["10", "15", "20"],
    },
    RankSeed {
        name: "Closer",
        position: 3,
        min: "10000",
        max: "14999.99",
        emoji: "🎯",
        description: "Strong performance. You're closing deals.",
        rewards: &["20", "30", "40"],
    },
    RankSeed {
        name: "Shark",
        position: 4,
        min: "15000",
        max: "19999.99",
        emoji: "🦈",
        description: "Top performer driving serious revenue.",
        rewards: &["40", "50", "60"],
    },
    RankSeed {
        name: "King of Greed",
        position: 5,
        min: "20000",
        max: "29999.99",
        emoji: "👑",
        description: "Dominating the leaderboard.",
        rewards: &["75", "100", "125"],
    },
    RankSeed {
        name: "Chatting God",
        position: 6,
        min: "30000",
        max: "9999999.99",
        emoji: "⚡",
        description: "Legendary status.",
        rewards: &["150", "200", "250"],
    },
];

/// Initialize the SQLite database with schema, pragmas and default catalogs.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;
    seed_reference_data(&pool).await?;

    info!("Database initialized successfully at {}", db_path);
    Ok(pool)
}

/// Run all database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    let schema_sql = include_str!("schema.sql");

    for statement in schema_sql.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

async fn table_is_empty(conn: &mut SqliteConnection, table: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get::<i64, _>("n") == 0)
}

/// Seed default tiers, dynamic rates and ranks into empty tables only.
async fn seed_reference_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    if table_is_empty(&mut *tx, "commission_tiers").await? {
        for (name, min, max, pct) in DEFAULT_TIERS {
            sqlx::query(
                "INSERT INTO commission_tiers (name, min_sales, max_sales, percentage) VALUES (?, ?, ?, ?)",
            )
            .bind(*name)
            .bind(*min)
            .bind(*max)
            .bind(*pct)
            .execute(&mut *tx)
            .await?;
        }
        info!("Seeded {} default commission tiers", DEFAULT_TIERS.len());
    }

    if table_is_empty(&mut *tx, "dynamic_rates").await? {
        for (min, max, pct) in DEFAULT_DYNAMIC_RATES {
            sqlx::query("INSERT INTO dynamic_rates (min_sales, max_sales, percentage) VALUES (?, ?, ?)")
                .bind(*min)
                .bind(*max)
                .bind(*pct)
                .execute(&mut *tx)
                .await?;
        }
    }

    if table_is_empty(&mut *tx, "ranks").await? {
        for rank in DEFAULT_RANKS {
            let rank_id = sqlx::query(
                r#"
                INSERT INTO ranks (name, position, min_sales, max_sales, emoji, description)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(rank.name)
            .bind(rank.position)
            .bind(rank.min)
            .bind(rank.max)
            .bind(rank.emoji)
            .bind(rank.description)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for amount in rank.rewards {
                sqlx::query("INSERT INTO rank_rewards (rank_id, amount) VALUES (?, ?)")
                    .bind(rank_id)
                    .bind(*amount)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        info!("Seeded {} default ranks", DEFAULT_RANKS.len());
    }

    tx.commit().await?;
    Ok(())
}

/// Configure SQLite pragmas for reliability under concurrent settlements.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
