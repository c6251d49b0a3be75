use crate::config::DatabaseConfig;
use crate::error::{IngestError, IngestResult};
use crate::models::{
    AssetKey, AssetStat, AssetStatAccounts, AssetStatBalances, AssetStatQuery, AssetType, Order,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};

const SELECT_ASSET_STATS: &str = "SELECT asset_type, asset_code, asset_issuer, accounts, \
     balances, amount, num_accounts FROM exp_asset_stats";

/// Outcome of looking up a single asset stat row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStatLookup {
    Found(AssetStat),
    NotFound,
}

/// Persistent store of asset stat rows.
///
/// Mutations return the number of rows affected; callers decide what counts
/// as a consistent outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStatStore: Send + Sync {
    async fn get_asset_stat(&self, key: &AssetKey) -> IngestResult<AssetStatLookup>;

    async fn insert_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64>;

    async fn update_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64>;

    async fn remove_asset_stat(&self, key: &AssetKey) -> IngestResult<u64>;

    /// Insert many new rows, `batch_size` rows per statement
    async fn insert_asset_stats(&self, stats: &[AssetStat], batch_size: usize)
        -> IngestResult<u64>;
}

/// Repository for asset stats in PostgreSQL
#[derive(Clone)]
pub struct PgAssetStatRepository {
    pool: PgPool,
}

impl PgAssetStatRepository {
    /// Create a new repository over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with the configured limits
    pub async fn connect(config: &DatabaseConfig) -> IngestResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// List asset stats ordered by code then issuer
    ///
    /// # Arguments
    /// * `query` - Filters, cursor and page size
    ///
    /// # Returns
    /// One page of rows
    pub async fn list_asset_stats(&self, query: &AssetStatQuery) -> IngestResult<Vec<AssetStat>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_ASSET_STATS);
        builder.push(" WHERE TRUE");

        if let Some(code) = &query.asset_code {
            builder.push(" AND asset_code = ").push_bind(code.clone());
        }
        if let Some(issuer) = &query.asset_issuer {
            builder.push(" AND asset_issuer = ").push_bind(issuer.clone());
        }

        let (comparison, direction) = match query.order {
            Order::Asc => (">", "ASC"),
            Order::Desc => ("<", "DESC"),
        };

        if let Some(cursor) = query.cursor_key()? {
            builder
                .push(format!(" AND (asset_code, asset_issuer, asset_type) {} (", comparison))
                .push_bind(cursor.asset_code)
                .push(", ")
                .push_bind(cursor.asset_issuer)
                .push(", ")
                .push_bind(cursor.asset_type.as_i32())
                .push(")");
        }

        builder.push(format!(
            " ORDER BY asset_code {0}, asset_issuer {0}, asset_type {0} LIMIT ",
            direction
        ));
        builder.push_bind(query.limit);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(asset_stat_from_row).collect()
    }

    /// Total number of tracked assets
    pub async fn count_asset_stats(&self) -> IngestResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM exp_asset_stats")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }
}

#[async_trait]
impl AssetStatStore for PgAssetStatRepository {
    async fn get_asset_stat(&self, key: &AssetKey) -> IngestResult<AssetStatLookup> {
        let row = sqlx::query(&format!(
            "{} WHERE asset_type = $1 AND asset_code = $2 AND asset_issuer = $3",
            SELECT_ASSET_STATS
        ))
        .bind(key.asset_type.as_i32())
        .bind(&key.asset_code)
        .bind(&key.asset_issuer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(AssetStatLookup::Found(asset_stat_from_row(&row)?)),
            None => Ok(AssetStatLookup::NotFound),
        }
    }

    async fn insert_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64> {
        self.insert_asset_stats(std::slice::from_ref(stat), 1).await
    }

    async fn update_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE exp_asset_stats
            SET accounts = $4, balances = $5, amount = $6, num_accounts = $7
            WHERE asset_type = $1 AND asset_code = $2 AND asset_issuer = $3
            "#,
        )
        .bind(stat.asset_type.as_i32())
        .bind(&stat.asset_code)
        .bind(&stat.asset_issuer)
        .bind(Json(stat.accounts))
        .bind(Json(stat.balances.clone()))
        .bind(&stat.amount)
        .bind(stat.num_accounts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_asset_stat(&self, key: &AssetKey) -> IngestResult<u64> {
        let result = sqlx::query(
            "DELETE FROM exp_asset_stats \
             WHERE asset_type = $1 AND asset_code = $2 AND asset_issuer = $3",
        )
        .bind(key.asset_type.as_i32())
        .bind(&key.asset_code)
        .bind(&key.asset_issuer)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_asset_stats(&self, stats: &[AssetStat], batch_size: usize) -> IngestResult<u64> {
        if stats.is_empty() {
            return Ok(0);
        }
        if batch_size == 0 {
            return Err(IngestError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        let mut inserted = 0u64;

        for chunk in stats.chunks(batch_size) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO exp_asset_stats (asset_type, asset_code, asset_issuer, \
                 accounts, balances, amount, num_accounts) ",
            );

            query_builder.push_values(chunk, |mut b, stat| {
                b.push_bind(stat.asset_type.as_i32())
                    .push_bind(stat.asset_code.clone())
                    .push_bind(stat.asset_issuer.clone())
                    .push_bind(Json(stat.accounts))
                    .push_bind(Json(stat.balances.clone()))
                    .push_bind(stat.amount.clone())
                    .push_bind(stat.num_accounts);
            });

            let result = query_builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }
}

fn asset_stat_from_row(row: &PgRow) -> IngestResult<AssetStat> {
    let asset_type = AssetType::from_i32(row.try_get("asset_type")?)?;
    let Json(accounts): Json<AssetStatAccounts> = row.try_get("accounts")?;
    let Json(balances): Json<AssetStatBalances> = row.try_get("balances")?;

    Ok(AssetStat {
        asset_type,
        asset_code: row.try_get("asset_code")?,
        asset_issuer: row.try_get("asset_issuer")?,
        accounts,
        balances,
        amount: row.try_get("amount")?,
        num_accounts: row.try_get("num_accounts")?,
    })
}
