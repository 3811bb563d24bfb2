//! # TipoPago Repository
//!
//! Payment types of a branch ("Efectivo", "Tarjeta", "Nequi"...). The id is
//! supplied by the caller and must be unique. Deleting a payment type
//! detaches the orders that used it.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{require_sucursal, row_exists, UpdateBuilder};
use ventrix_core::{NuevoTipoPago, TipoPago, TipoPagoFilter, TipoPagoUpdate};

const SELECT_TIPO_PAGO: &str = "SELECT id, descripcion, id_sucursal FROM tipos_pago";

#[derive(Debug, Clone)]
pub struct TipoPagoRepository {
    pool: SqlitePool,
}

impl TipoPagoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TipoPagoRepository { pool }
    }

    /// Creates a payment type.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the id is taken
    /// - `NotFound` when the branch doesn't exist
    pub async fn create(&self, nuevo: NuevoTipoPago) -> DbResult<TipoPago> {
        nuevo.validate()?;

        let mut tx = self.pool.begin().await?;
        require_sucursal(&mut tx, &nuevo.id_sucursal).await?;
        if row_exists(&mut tx, "SELECT 1 FROM tipos_pago WHERE id = ?", nuevo.id).await? {
            return Err(DbError::duplicate("id", nuevo.id));
        }

        sqlx::query("INSERT INTO tipos_pago (id, descripcion, id_sucursal) VALUES (?, ?, ?)")
            .bind(nuevo.id)
            .bind(&nuevo.descripcion)
            .bind(&nuevo.id_sucursal)
            .execute(&mut *tx)
            .await?;

        let tipo_pago = fetch(&mut tx, nuevo.id)
            .await?
            .ok_or_else(|| DbError::not_found("TipoPago", nuevo.id))?;
        tx.commit().await?;

        debug!(id = tipo_pago.id, id_sucursal = %tipo_pago.id_sucursal, "TipoPago created");
        Ok(tipo_pago)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<TipoPago>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn list(&self, filter: &TipoPagoFilter) -> DbResult<Vec<TipoPago>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_TIPO_PAGO);
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" WHERE id_sucursal = ").push_bind(id_sucursal.clone());
        }
        query.push(" ORDER BY id");

        let tipos = query
            .build_query_as::<TipoPago>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tipos)
    }

    pub async fn update(&self, id: i64, update: TipoPagoUpdate) -> DbResult<TipoPago> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("TipoPago", id));
        }

        let mut builder = UpdateBuilder::new("tipos_pago");
        builder.patch("descripcion", update.descripcion);
        builder.execute(&mut tx, "id", id).await?;

        let tipo_pago = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("TipoPago", id))?;
        tx.commit().await?;
        Ok(tipo_pago)
    }

    /// Deletes a payment type. Orders keep existing with `id_tipo_pago = NULL`.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM tipos_pago WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TipoPago", id));
        }
        tx.commit().await?;

        info!(id = id, "TipoPago deleted");
        Ok(())
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<TipoPago>> {
    let sql = format!("{} WHERE id = ?", SELECT_TIPO_PAGO);
    let tipo_pago = sqlx::query_as::<_, TipoPago>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(tipo_pago)
}
