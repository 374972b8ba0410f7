//! Index statistics.
//!
//! `sage stats` summarises what the vector index holds: file size, entry
//! count, how many documents the hash cache tracks, and a per-source table
//! with the embedding model and when each source was last indexed.

use anyhow::Result;
use std::collections::BTreeSet;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::hash_cache::HashCache;

struct SourceStats {
    source: String,
    chunk_count: i64,
    model: String,
    last_indexed: i64,
}

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let path = &config.index.path;
    if !path.exists() {
        println!("No index at {}. Run `sage index` first.", path.display());
        return Ok(());
    }

    let pool = db::connect(path).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(&pool)
        .await?;
    let db_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let cache = HashCache::load(&config.index.hash_cache_path())?;

    println!("Sage — Index Stats");
    println!("==================");
    println!();
    println!("  Index:       {}", path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Chunks:      {}", total);
    println!("  Documents:   {} (hash cache)", cache.len());

    let rows = sqlx::query(
        r#"
        SELECT source,
               COUNT(*) AS chunk_count,
               MAX(model) AS model,
               MAX(created_at) AS last_indexed
        FROM embeddings
        GROUP BY source
        ORDER BY source
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let sources: Vec<SourceStats> = rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            chunk_count: row.get("chunk_count"),
            model: row.get("model"),
            last_indexed: row.get("last_indexed"),
        })
        .collect();

    if !sources.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<24} {:>8}   {:<20} {}",
            "SOURCE", "CHUNKS", "MODEL", "INDEXED"
        );
        println!("  {}", "-".repeat(70));
        for s in &sources {
            println!(
                "  {:<24} {:>8}   {:<20} {}",
                s.source,
                s.chunk_count,
                s.model,
                format_ts_relative(s.last_indexed)
            );
        }
    }

    let tracked: BTreeSet<&str> = cache.names().collect();
    let untracked: Vec<&str> = sources
        .iter()
        .map(|s| s.source.as_str())
        .filter(|s| !tracked.contains(s))
        .collect();
    if !untracked.is_empty() {
        println!();
        println!(
            "  {} source(s) not in the hash cache (removed documents?): {}",
            untracked.len(),
            untracked.join(", ")
        );
        println!("  Run `sage index --prune` to drop them.");
    }

    println!();
    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now ("3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
