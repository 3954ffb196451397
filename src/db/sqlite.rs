use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    error::AppResult,
    models::CleanRecord,
    services::encoder::FeatureVector,
};

pub const RAW_TABLE: &str = "catalog_raw";
pub const FEATURES_TABLE: &str = "catalog_features";

/// Rows per INSERT statement, kept well under SQLite's bind limit
const INSERT_BATCH: usize = 500;

/// Opens (or creates) a SQLite connection pool
pub async fn open_pool(database_url: &str) -> AppResult<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let max_conns: u32 = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
        .max_connections(max_conns)
        .connect_with(connect_opts)
        .await?;

    Ok(pool)
}

/// Feature table rows paired with their target label
pub struct FeatureTable<'a> {
    pub columns: &'a [String],
    pub rows: &'a [FeatureVector],
    pub targets: &'a [String],
}

/// Replaces both snapshot tables inside one transaction
pub async fn write_snapshot(
    pool: &SqlitePool,
    records: &[CleanRecord],
    features: &FeatureTable<'_>,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    replace_raw_table(&mut tx, records).await?;
    replace_features_table(&mut tx, features).await?;

    tx.commit().await?;

    tracing::info!(
        raw_rows = records.len(),
        feature_rows = features.rows.len(),
        "Snapshot written"
    );
    Ok(())
}

async fn replace_raw_table(conn: &mut SqliteConnection, records: &[CleanRecord]) -> AppResult<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {RAW_TABLE}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {RAW_TABLE} (
            type TEXT NOT NULL,
            title TEXT,
            country TEXT NOT NULL,
            release_year INTEGER NOT NULL,
            rating TEXT NOT NULL,
            duration TEXT,
            listed_in TEXT NOT NULL,
            duration_num REAL
        )"
    ))
    .execute(&mut *conn)
    .await?;

    for chunk in records.chunks(INSERT_BATCH) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {RAW_TABLE} \
             (type, title, country, release_year, rating, duration, listed_in, duration_num) "
        ));
        qb.push_values(chunk, |mut b, record| {
            b.push_bind(record.kind.clone())
                .push_bind(record.title.clone())
                .push_bind(record.country.clone())
                .push_bind(record.release_year)
                .push_bind(record.rating.clone())
                .push_bind(record.duration.clone())
                .push_bind(record.listed_in.clone())
                .push_bind(record.duration_num);
        });
        qb.build().execute(&mut *conn).await?;
    }

    Ok(())
}

async fn replace_features_table(
    conn: &mut SqliteConnection,
    table: &FeatureTable<'_>,
) -> AppResult<()> {
    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} REAL NOT NULL", quote_ident(c)))
        .collect();
    definitions.push("type TEXT NOT NULL".to_string());

    let mut names: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
    names.push("type".to_string());

    sqlx::query(&format!("DROP TABLE IF EXISTS {FEATURES_TABLE}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {FEATURES_TABLE} ({})",
        definitions.join(", ")
    ))
    .execute(&mut *conn)
    .await?;

    let rows: Vec<(&FeatureVector, &String)> = table.rows.iter().zip(table.targets).collect();
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {FEATURES_TABLE} ({}) ",
            names.join(", ")
        ));
        qb.push_values(chunk, |mut b, (vector, target)| {
            for value in vector.values() {
                b.push_bind(*value);
            }
            b.push_bind(target.to_string());
        });
        qb.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Double-quotes a column name such as `country__United States`
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Row count of a snapshot table
pub async fn count_rows(pool: &SqlitePool, table: &str) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
