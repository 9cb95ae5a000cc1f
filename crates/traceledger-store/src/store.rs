//! SQLite-backed log storage: exact lookup by `(agent_id, step_id)`, bulk
//! insert, filtered/paginated search, and aggregate stats.

use crate::error::map_sqlx;
use crate::filter::{LogFilter, LogQueryResult, LogStats, Pagination};
use crate::schema::{CREATE_LOGS_TABLE, CREATE_RETENTION_INDEX, CREATE_STATUS_INDEX, CREATE_TIMESTAMP_INDEX};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use traceledger_core::ids::LogKey;
use traceledger_core::log::{Log, LogStatus, ReviewUpdate, RetentionTier};
use traceledger_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Validation(format!("invalid store endpoint {database_url}: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx("connecting to log store", e))?;
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(CREATE_LOGS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("creating logs table", e))?;
        for index in [CREATE_TIMESTAMP_INDEX, CREATE_STATUS_INDEX, CREATE_RETENTION_INDEX] {
            sqlx::query(index).execute(&self.pool).await.map_err(|e| map_sqlx("creating index", e))?;
        }
        Ok(())
    }

    pub async fn insert(&self, log: &Log) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx("starting insert transaction", e))?;
        insert_one(&mut tx, log).await?;
        tx.commit().await.map_err(|e| map_sqlx("committing insert", e))?;
        Ok(())
    }

    pub async fn insert_bulk(&self, logs: &[Log]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx("starting bulk insert transaction", e))?;
        for log in logs {
            insert_one(&mut tx, log).await?;
        }
        tx.commit().await.map_err(|e| map_sqlx("committing bulk insert", e))?;
        Ok(())
    }

    pub async fn get(&self, key: &LogKey) -> Result<Log> {
        let row = sqlx::query("SELECT * FROM logs WHERE agent_id = ? AND step_id = ?")
            .bind(&key.agent_id)
            .bind(key.step_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("fetching log", e))?
            .ok_or_else(|| Error::NotFound(format!("log {key} not found")))?;
        row_to_log(&row)
    }

    pub async fn update_review(&self, key: &LogKey, update: &ReviewUpdate) -> Result<Log> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx("starting review update transaction", e))?;
        let row = sqlx::query("SELECT * FROM logs WHERE agent_id = ? AND step_id = ?")
            .bind(&key.agent_id)
            .bind(key.step_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx("fetching log for review update", e))?
            .ok_or_else(|| Error::NotFound(format!("log {key} not found")))?;
        let mut log = row_to_log(&row)?;

        if !log.is_mutation_eligible() {
            return Err(Error::Conflict(format!(
                "log {key} is not eligible for review update (already reviewed and not anomalous)"
            )));
        }

        log.reviewed = update.reviewed;
        log.review_comments = update.review_comments.clone();
        log.version += 1;
        log.content_hash = log.compute_content_hash();

        sqlx::query(
            "UPDATE logs SET reviewed = ?, review_comments = ?, version = ?, content_hash = ? \
             WHERE agent_id = ? AND step_id = ?",
        )
        .bind(log.reviewed)
        .bind(&log.review_comments)
        .bind(log.version)
        .bind(log.content_hash.to_vec())
        .bind(&key.agent_id)
        .bind(key.step_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx("updating log review fields", e))?;

        tx.commit().await.map_err(|e| map_sqlx("committing review update", e))?;
        Ok(log)
    }

    pub async fn query(&self, filter: &LogFilter, pagination: &Pagination) -> Result<LogQueryResult> {
        let mut conditions = Vec::new();
        let mut string_binds: Vec<String> = Vec::new();

        if let Some(agent_id) = &filter.agent_id {
            conditions.push("agent_id = ?".to_string());
            string_binds.push(agent_id.clone());
        }
        if let Some(status) = &filter.status {
            conditions.push("status = ?".to_string());
            string_binds.push(status.clone());
        }
        if let Some(tier) = &filter.retention_tier {
            conditions.push("retention_tier = ?".to_string());
            string_binds.push(tier.clone());
        }
        if let Some(reviewed) = filter.reviewed {
            conditions.push("reviewed = ?".to_string());
            string_binds.push(if reviewed { "1" } else { "0" }.to_string());
        }
        if let Some((start, end)) = filter.timestamp_range {
            conditions.push("timestamp >= ? AND timestamp <= ?".to_string());
            string_binds.push(start.to_rfc3339());
            string_binds.push(end.to_rfc3339());
        }

        let where_clause =
            if conditions.is_empty() { String::new() } else { format!("WHERE {}", conditions.join(" AND ")) };
        let order_clause =
            if pagination.ascending { "ORDER BY timestamp ASC" } else { "ORDER BY timestamp DESC" };

        let count_sql = format!("SELECT COUNT(*) FROM logs {where_clause}");
        let mut count_query = sqlx::query_scalar(&count_sql);
        for bind in &string_binds {
            count_query = count_query.bind(bind);
        }
        let total_count: i64 =
            count_query.fetch_one(&self.pool).await.map_err(|e| map_sqlx("counting logs", e))?;

        let select_sql = format!("SELECT * FROM logs {where_clause} {order_clause} LIMIT ? OFFSET ?");
        let mut select_query = sqlx::query(&select_sql);
        for bind in &string_binds {
            select_query = select_query.bind(bind);
        }
        select_query = select_query.bind(pagination.limit as i64).bind(pagination.offset as i64);

        let rows = select_query.fetch_all(&self.pool).await.map_err(|e| map_sqlx("querying logs", e))?;
        let mut logs = Vec::with_capacity(rows.len());
        for row in &rows {
            logs.push(row_to_log(row)?);
        }

        Ok(LogQueryResult {
            logs,
            total_count: total_count as u64,
            offset: pagination.offset,
            limit: pagination.limit,
            has_more: (pagination.offset as u64 + pagination.limit as u64) < total_count as u64,
        })
    }

    /// Aggregate stats for `agent_id`, optionally bounded to a `[start, end]`
    /// timestamp range. `None` aggregates the agent's full history.
    pub async fn stats(&self, agent_id: &str, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Result<LogStats> {
        let mut sql = "SELECT status, reviewed, retention_tier FROM logs WHERE agent_id = ?".to_string();
        if range.is_some() {
            sql.push_str(" AND timestamp >= ? AND timestamp <= ?");
        }
        let mut query = sqlx::query(&sql).bind(agent_id);
        if let Some((start, end)) = range {
            query = query.bind(start.to_rfc3339()).bind(end.to_rfc3339());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(|e| map_sqlx("aggregating log stats", e))?;

        let mut stats = LogStats {
            total_logs: 0,
            success_count: 0,
            failure_count: 0,
            anomaly_count: 0,
            reviewed_count: 0,
            unreviewed_anomaly_count: 0,
            by_retention_tier: HashMap::new(),
        };

        for row in rows {
            let status: String = row.try_get("status").map_err(|e| map_sqlx("reading status column", e))?;
            let reviewed: bool = row.try_get("reviewed").map_err(|e| map_sqlx("reading reviewed column", e))?;
            let tier: String =
                row.try_get("retention_tier").map_err(|e| map_sqlx("reading retention_tier column", e))?;

            stats.total_logs += 1;
            match status.as_str() {
                "success" => stats.success_count += 1,
                "failure" => stats.failure_count += 1,
                "anomaly" => {
                    stats.anomaly_count += 1;
                    if !reviewed {
                        stats.unreviewed_anomaly_count += 1;
                    }
                }
                _ => {}
            }
            if reviewed {
                stats.reviewed_count += 1;
            }
            *stats.by_retention_tier.entry(tier).or_insert(0) += 1;
        }

        Ok(stats)
    }
}

async fn insert_one(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, log: &Log) -> Result<()> {
    let input_data = serde_json::to_string(&log.input_data).map_err(Error::from)?;
    let output = serde_json::to_string(&log.output).map_err(Error::from)?;
    let metadata = serde_json::to_string(&log.metadata).map_err(Error::from)?;

    sqlx::query(
        "INSERT INTO logs \
         (agent_id, step_id, trace_id, user_id, timestamp, input_data, output, reasoning, \
          status, reviewed, review_comments, metadata, version, retention_tier, content_hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&log.agent_id)
    .bind(log.step_id)
    .bind(&log.trace_id)
    .bind(&log.user_id)
    .bind(log.timestamp.to_rfc3339())
    .bind(input_data)
    .bind(output)
    .bind(&log.reasoning)
    .bind(log.status.as_str())
    .bind(log.reviewed)
    .bind(&log.review_comments)
    .bind(metadata)
    .bind(log.version)
    .bind(log.retention_tier.as_str())
    .bind(log.content_hash.to_vec())
    .execute(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::Conflict(format!("log {}/{} already exists", log.agent_id, log.step_id))
        }
        other => map_sqlx("inserting log", other),
    })?;
    Ok(())
}

fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> Result<Log> {
    let status_str: String = row.try_get("status").map_err(|e| map_sqlx("reading status column", e))?;
    let status = match status_str.as_str() {
        "success" => LogStatus::Success,
        "failure" => LogStatus::Failure,
        "anomaly" => LogStatus::Anomaly,
        other => return Err(Error::Integrity(format!("unknown log status in storage: {other}"))),
    };

    let tier_str: String = row.try_get("retention_tier").map_err(|e| map_sqlx("reading retention_tier column", e))?;
    let retention_tier = match tier_str.as_str() {
        "hot" => RetentionTier::Hot,
        "warm" => RetentionTier::Warm,
        "cold" => RetentionTier::Cold,
        other => return Err(Error::Integrity(format!("unknown retention tier in storage: {other}"))),
    };

    let timestamp_str: String = row.try_get("timestamp").map_err(|e| map_sqlx("reading timestamp column", e))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map_err(|e| Error::Integrity(format!("corrupt timestamp in storage: {e}")))?
        .with_timezone(&Utc);

    let input_data_str: String = row.try_get("input_data").map_err(|e| map_sqlx("reading input_data column", e))?;
    let output_str: String = row.try_get("output").map_err(|e| map_sqlx("reading output column", e))?;
    let metadata_str: String = row.try_get("metadata").map_err(|e| map_sqlx("reading metadata column", e))?;

    let content_hash_vec: Vec<u8> = row.try_get("content_hash").map_err(|e| map_sqlx("reading content_hash column", e))?;
    let mut content_hash = [0u8; 32];
    if content_hash_vec.len() == 32 {
        content_hash.copy_from_slice(&content_hash_vec);
    } else {
        return Err(Error::Integrity("content_hash column is not 32 bytes".to_string()));
    }

    Ok(Log {
        agent_id: row.try_get("agent_id").map_err(|e| map_sqlx("reading agent_id column", e))?,
        step_id: row.try_get("step_id").map_err(|e| map_sqlx("reading step_id column", e))?,
        trace_id: row.try_get("trace_id").map_err(|e| map_sqlx("reading trace_id column", e))?,
        user_id: row.try_get("user_id").map_err(|e| map_sqlx("reading user_id column", e))?,
        timestamp,
        input_data: serde_json::from_str(&input_data_str).map_err(Error::from)?,
        output: serde_json::from_str(&output_str).map_err(Error::from)?,
        reasoning: row.try_get("reasoning").map_err(|e| map_sqlx("reading reasoning column", e))?,
        status,
        reviewed: row.try_get("reviewed").map_err(|e| map_sqlx("reading reviewed column", e))?,
        review_comments: row.try_get("review_comments").map_err(|e| map_sqlx("reading review_comments column", e))?,
        metadata: serde_json::from_str(&metadata_str).map_err(Error::from)?,
        version: row.try_get("version").map_err(|e| map_sqlx("reading version column", e))?,
        retention_tier,
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn sample_log(agent_id: &str, step_id: i64, status: LogStatus) -> Log {
        let mut log = Log {
            agent_id: agent_id.to_string(),
            step_id,
            trace_id: None,
            user_id: None,
            timestamp: Utc::now(),
            input_data: json!({"k": "v"}),
            output: json!({"ok": true}),
            reasoning: "a sufficiently long reasoning string".to_string(),
            status,
            reviewed: false,
            review_comments: None,
            metadata: Map::new(),
            version: 1,
            retention_tier: RetentionTier::Hot,
            content_hash: [0u8; 32],
        };
        log.content_hash = log.compute_content_hash();
        log
    }

    async fn memory_store() -> LogStore {
        LogStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_exactly() {
        let store = memory_store().await;
        let log = sample_log("agent-1", 1, LogStatus::Success);
        store.insert(&log).await.unwrap();

        let fetched = store.get(&LogKey::new("agent-1", 1)).await.unwrap();
        assert!(fetched.verify_content_hash());
        assert_eq!(fetched.agent_id, "agent-1");
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = memory_store().await;
        let log = sample_log("agent-1", 1, LogStatus::Success);
        store.insert(&log).await.unwrap();
        let err = store.insert(&log).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn review_update_is_rejected_for_reviewed_non_anomaly_logs() {
        let store = memory_store().await;
        let mut log = sample_log("agent-1", 1, LogStatus::Success);
        log.reviewed = true;
        log.content_hash = log.compute_content_hash();
        store.insert(&log).await.unwrap();

        let err = store
            .update_review(&LogKey::new("agent-1", 1), &ReviewUpdate { reviewed: true, review_comments: None })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn review_update_on_an_anomaly_bumps_version_and_hash() {
        let store = memory_store().await;
        let log = sample_log("agent-1", 1, LogStatus::Anomaly);
        store.insert(&log).await.unwrap();

        let updated = store
            .update_review(
                &LogKey::new("agent-1", 1),
                &ReviewUpdate { reviewed: true, review_comments: Some("looks fine".to_string()) },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert!(updated.reviewed);
        assert!(updated.verify_content_hash());
    }

    #[tokio::test]
    async fn query_filters_by_agent_and_paginates() {
        let store = memory_store().await;
        store.insert(&sample_log("agent-1", 1, LogStatus::Success)).await.unwrap();
        store.insert(&sample_log("agent-1", 2, LogStatus::Anomaly)).await.unwrap();
        store.insert(&sample_log("agent-2", 1, LogStatus::Success)).await.unwrap();

        let result = store
            .query(
                &LogFilter { agent_id: Some("agent-1".to_string()), ..Default::default() },
                &Pagination { limit: 1, offset: 0, ascending: true },
            )
            .await
            .unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.logs.len(), 1);
        assert!(result.has_more);
    }

    #[tokio::test]
    async fn stats_aggregates_by_status_and_retention_tier() {
        let store = memory_store().await;
        store.insert(&sample_log("agent-1", 1, LogStatus::Success)).await.unwrap();
        store.insert(&sample_log("agent-1", 2, LogStatus::Anomaly)).await.unwrap();

        let stats = store.stats("agent-1", None).await.unwrap();
        assert_eq!(stats.total_logs, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.anomaly_count, 1);
        assert_eq!(stats.unreviewed_anomaly_count, 1);
        assert_eq!(*stats.by_retention_tier.get("hot").unwrap(), 2);
    }

    #[tokio::test]
    async fn stats_can_be_bounded_to_a_timestamp_range() {
        let store = memory_store().await;
        let mut old_log = sample_log("agent-1", 1, LogStatus::Success);
        old_log.timestamp = Utc::now() - chrono::Duration::days(10);
        old_log.content_hash = old_log.compute_content_hash();
        store.insert(&old_log).await.unwrap();
        store.insert(&sample_log("agent-1", 2, LogStatus::Anomaly)).await.unwrap();

        let recent_only = store.stats("agent-1", Some((Utc::now() - chrono::Duration::days(1), Utc::now()))).await.unwrap();
        assert_eq!(recent_only.total_logs, 1);
        assert_eq!(recent_only.anomaly_count, 1);

        let full_history = store.stats("agent-1", None).await.unwrap();
        assert_eq!(full_history.total_logs, 2);
    }
}
