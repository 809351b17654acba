//! PostgreSQL datastore for property-ledger-service.

use crate::models::{
    Budget, Category, CategoryMatch, ConfirmedEntry, Entry, Group, NewEntry, Property,
    PropertyMatch, PropertySummary, Reference, CONFIRMED_SITUATION_ID,
    UNCATEGORIZED_CATEGORY_ID,
};
use crate::services::error::LedgerError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{LedgerStore, StoreTx};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};

/// `%term%` with the `LIKE` metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn db_error(operation: &str, err: sqlx::Error) -> LedgerError {
    LedgerError::Datastore(anyhow::anyhow!("Failed to {}: {}", operation, err))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "property-ledger-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, LedgerError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Datastore(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Add a budget group. Groups are managed outside the HTTP surface.
    #[instrument(skip(self))]
    pub async fn insert_group(&self, label: &str) -> Result<i64, LedgerError> {
        sqlx::query_scalar::<_, i64>("INSERT INTO grupos (grupo) VALUES ($1) RETURNING id")
            .bind(label)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("insert group", e))
    }
}

/// Open transaction on a pooled connection. sqlx rolls it back on drop.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn exists(&mut self, reference: Reference, id: i64) -> Result<bool, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["exists"])
            .start_timer();

        // Table names come from a closed enum, never from input.
        let sql = format!("SELECT 1 FROM {} WHERE id = $1", reference.table());
        let found = sqlx::query_scalar::<_, i32>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("check reference", e))?;

        timer.observe_duration();
        Ok(found.is_some())
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<i64, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_entry"])
            .start_timer();

        let date = entry.date.to_naive_date()?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO lancamentos (data, id_imovel, id_categoria, id_situacao, descricao, valor, ativo)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING id
            "#,
        )
        .bind(date)
        .bind(entry.property_id)
        .bind(entry.category_id)
        .bind(entry.situation_id)
        .bind(&entry.description)
        .bind(entry.amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert entry", e))?;

        timer.observe_duration();
        Ok(id)
    }

    async fn update_entry(&mut self, id: i64, entry: &NewEntry) -> Result<u64, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_entry"])
            .start_timer();

        let date = entry.date.to_naive_date()?;
        let result = sqlx::query(
            r#"
            UPDATE lancamentos
            SET data = $1, descricao = $2, valor = $3, id_categoria = $4, id_imovel = $5, id_situacao = $6
            WHERE id = $7
            "#,
        )
        .bind(date)
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(entry.category_id)
        .bind(entry.property_id)
        .bind(entry.situation_id)
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("update entry", e))?;

        timer.observe_duration();
        Ok(result.rows_affected())
    }

    async fn update_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            "UPDATE orcamentos SET orcamento = $1 WHERE id_imovel = $2 AND id_grupo = $3",
        )
        .bind(amount)
        .bind(property_id)
        .bind(group_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("update budget", e))?;

        Ok(result.rows_affected())
    }

    async fn insert_budget(
        &mut self,
        property_id: i64,
        group_id: i64,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO orcamentos (id_imovel, id_grupo, orcamento) VALUES ($1, $2, $3)")
            .bind(property_id)
            .bind(group_id)
            .bind(amount)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("insert budget", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let PgTx { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| db_error("commit transaction", e))
    }
}

#[async_trait]
impl LedgerStore for Database {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, LedgerError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;
        Ok(Box::new(PgTx { tx }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Datastore(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Property Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_properties(&self) -> Result<Vec<PropertySummary>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_properties"])
            .start_timer();

        let rows = sqlx::query_as::<_, PropertySummary>(
            r#"
            SELECT im.id, im.nome AS name, im.vendido AS sold,
                   COALESCE(SUM(l.valor), 0) AS total_entries
            FROM imoveis im
            LEFT JOIN lancamentos l ON im.id = l.id_imovel
            GROUP BY im.id, im.nome, im.vendido, im.created_at
            ORDER BY im.created_at DESC, im.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list properties", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_property(&self, id: i64) -> Result<Option<Property>, LedgerError> {
        sqlx::query_as::<_, Property>(
            r#"
            SELECT id, nome AS name, vendido AS sold, endereco AS address,
                   nome_ocupante AS occupant_name, cpf_ocupante AS occupant_cpf,
                   latitude, longitude, corretagem AS brokerage_fee,
                   ganho_capital AS capital_gain, valor_venda AS sale_value, created_at
            FROM imoveis
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get property", e))
    }

    #[instrument(skip(self))]
    async fn create_property(&self, name: &str, sold: bool) -> Result<i64, LedgerError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO imoveis (nome, vendido) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(sold)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create property", e))?;

        info!(property_id = id, "Property created");
        Ok(id)
    }

    #[instrument(skip(self, property), fields(property_id = property.id))]
    async fn update_property(&self, property: &Property) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE imoveis
            SET nome = $1, vendido = $2, endereco = $3, nome_ocupante = $4, cpf_ocupante = $5,
                latitude = $6, longitude = $7, corretagem = $8, ganho_capital = $9, valor_venda = $10
            WHERE id = $11
            "#,
        )
        .bind(&property.name)
        .bind(property.sold)
        .bind(&property.address)
        .bind(&property.occupant_name)
        .bind(&property.occupant_cpf)
        .bind(property.latitude)
        .bind(property.longitude)
        .bind(property.brokerage_fee)
        .bind(property.capital_gain)
        .bind(property.sale_value)
        .bind(property.id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update property", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_property(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM imoveis WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete property", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn search_properties(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PropertyMatch>, LedgerError> {
        let query = match term {
            Some(term) => sqlx::query_as::<_, PropertyMatch>(
                "SELECT id, nome AS name FROM imoveis WHERE nome ILIKE $1 ESCAPE '\\' \
                 ORDER BY nome, id LIMIT $2 OFFSET $3",
            )
            .bind(like_pattern(term)),
            None => sqlx::query_as::<_, PropertyMatch>(
                "SELECT id, nome AS name FROM imoveis \
                 ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            ),
        };
        query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("search properties", e))
    }

    // -------------------------------------------------------------------------
    // Category Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, LedgerError> {
        sqlx::query_as::<_, Category>(
            "SELECT id, categoria AS label, dc, created_at FROM categorias ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list categories", e))
    }

    #[instrument(skip(self))]
    async fn search_categories(
        &self,
        term: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CategoryMatch>, LedgerError> {
        let query = match term {
            Some(term) => sqlx::query_as::<_, CategoryMatch>(
                "SELECT id, categoria AS label FROM categorias WHERE categoria ILIKE $1 ESCAPE '\\' \
                 ORDER BY categoria, id LIMIT $2 OFFSET $3",
            )
            .bind(like_pattern(term)),
            None => sqlx::query_as::<_, CategoryMatch>(
                "SELECT id, categoria AS label FROM categorias \
                 ORDER BY categoria, id LIMIT $1 OFFSET $2",
            ),
        };
        query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("search categories", e))
    }

    #[instrument(skip(self))]
    async fn create_category(&self, label: &str, dc: &str) -> Result<i64, LedgerError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO categorias (categoria, dc) VALUES ($1, $2) RETURNING id",
        )
        .bind(label)
        .bind(dc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create category", e))
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM categorias WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete category", e))?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Entry Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_entries(&self) -> Result<Vec<Entry>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_entries"])
            .start_timer();

        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, data AS date, id_imovel AS property_id, id_categoria AS category_id,
                   id_situacao AS situation_id, descricao AS description, valor AS amount,
                   ativo AS active
            FROM lancamentos
            ORDER BY data DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list entries", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    async fn count_entries(&self) -> Result<i64, LedgerError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lancamentos")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count entries", e))
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM lancamentos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete entry", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn last_confirmed_entries(
        &self,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<ConfirmedEntry>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["last_confirmed_entries"])
            .start_timer();

        let rows = sqlx::query_as::<_, ConfirmedEntry>(
            r#"
            SELECT l.data AS date, l.descricao AS description, l.valor AS amount,
                   i.nome AS property, c.categoria AS category
            FROM lancamentos l
            JOIN imoveis i ON i.id = l.id_imovel
            JOIN categorias c ON c.id = l.id_categoria
            WHERE l.id_situacao = $1
              AND l.data <= $2
              AND l.id_categoria <> $3
            ORDER BY l.data DESC, l.id DESC
            LIMIT $4
            "#,
        )
        .bind(CONFIRMED_SITUATION_ID)
        .bind(as_of)
        .bind(UNCATEGORIZED_CATEGORY_ID)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list confirmed entries", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn last_confirmed_date(&self, as_of: NaiveDate) -> Result<Option<NaiveDate>, LedgerError> {
        sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(data) FROM lancamentos WHERE id_situacao = $1 AND data <= $2",
        )
        .bind(CONFIRMED_SITUATION_ID)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("read last confirmed date", e))
    }

    // -------------------------------------------------------------------------
    // Budget Operations
    // -------------------------------------------------------------------------

    async fn list_groups(&self) -> Result<Vec<Group>, LedgerError> {
        sqlx::query_as::<_, Group>("SELECT id, grupo AS label FROM grupos ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list groups", e))
    }

    #[instrument(skip(self))]
    async fn list_budgets(&self, property_id: i64) -> Result<Vec<Budget>, LedgerError> {
        sqlx::query_as::<_, Budget>(
            r#"
            SELECT id_imovel AS property_id, id_grupo AS group_id, orcamento AS amount
            FROM orcamentos
            WHERE id_imovel = $1
            ORDER BY id_grupo
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list budgets", e))
    }
}
