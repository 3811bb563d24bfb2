//! # Mesa Repository
//!
//! Tables of a branch. Names are unique per branch. Deleting a table
//! detaches the orders that referenced it; the orders themselves stay.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{ensure_name_free, require_sucursal, UpdateBuilder};
use ventrix_core::{Mesa, MesaFilter, MesaUpdate, NuevaMesa, Patch};

const SELECT_MESA: &str = "SELECT id, nombre, estado, id_sucursal FROM mesas";

/// Repository for tables.
#[derive(Debug, Clone)]
pub struct MesaRepository {
    pool: SqlitePool,
}

impl MesaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MesaRepository { pool }
    }

    pub async fn create(&self, nueva: NuevaMesa) -> DbResult<Mesa> {
        nueva.validate()?;

        let mut tx = self.pool.begin().await?;
        require_sucursal(&mut tx, &nueva.id_sucursal).await?;
        ensure_name_free(&mut tx, "mesas", "id", &nueva.id_sucursal, &nueva.nombre, None).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO mesas (nombre, estado, id_sucursal) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&nueva.nombre)
        .bind(nueva.estado)
        .bind(&nueva.id_sucursal)
        .fetch_one(&mut *tx)
        .await?;

        let mesa = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Mesa", id))?;
        tx.commit().await?;

        debug!(id = mesa.id, id_sucursal = %mesa.id_sucursal, "Mesa created");
        Ok(mesa)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Mesa>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Lists tables; `estado` separates physical tables from quick ones.
    pub async fn list(&self, filter: &MesaFilter) -> DbResult<Vec<Mesa>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_MESA);
        query.push(" WHERE 1 = 1");
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" AND id_sucursal = ").push_bind(id_sucursal.clone());
        }
        if let Some(estado) = filter.estado {
            query.push(" AND estado = ").push_bind(estado);
        }
        query.push(" ORDER BY id");

        let mesas = query.build_query_as::<Mesa>().fetch_all(&self.pool).await?;
        Ok(mesas)
    }

    pub async fn update(&self, id: i64, update: MesaUpdate) -> DbResult<Mesa> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        let actual = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Mesa", id))?;
        if let Patch::Value(nombre) = &update.nombre {
            ensure_name_free(&mut tx, "mesas", "id", &actual.id_sucursal, nombre, Some(id)).await?;
        }

        let mut builder = UpdateBuilder::new("mesas");
        builder
            .patch("nombre", update.nombre)
            .patch("estado", update.estado);
        builder.execute(&mut tx, "id", id).await?;

        let mesa = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Mesa", id))?;
        tx.commit().await?;
        Ok(mesa)
    }

    /// Deletes a table. Orders keep existing with `id_mesa = NULL`.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM mesas WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Mesa", id));
        }
        tx.commit().await?;

        info!(id = id, "Mesa deleted");
        Ok(())
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Mesa>> {
    let sql = format!("{} WHERE id = ?", SELECT_MESA);
    let mesa = sqlx::query_as::<_, Mesa>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(mesa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use ventrix_core::{ErrorKind, EstadoMesa};

    #[tokio::test]
    async fn test_name_unique_per_sucursal() {
        let db = seeded().await;
        mesa(&db, "centro", "Mesa 1").await;

        let err = db
            .mesas()
            .create(NuevaMesa {
                nombre: "Mesa 1".to_string(),
                estado: EstadoMesa::Rapida,
                id_sucursal: "centro".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // same name in another branch is fine
        mesa(&db, "norte", "Mesa 1").await;
    }

    #[tokio::test]
    async fn test_filter_by_estado() {
        let db = seeded().await;
        mesa(&db, "centro", "Mesa 1").await;
        db.mesas()
            .create(NuevaMesa {
                nombre: "Domicilios".to_string(),
                estado: EstadoMesa::Rapida,
                id_sucursal: "centro".to_string(),
            })
            .await
            .unwrap();

        let rapidas = db
            .mesas()
            .list(&MesaFilter {
                id_sucursal: Some("centro".to_string()),
                estado: Some(EstadoMesa::Rapida),
            })
            .await
            .unwrap();
        assert_eq!(rapidas.len(), 1);
        assert_eq!(rapidas[0].nombre, "Domicilios");
    }

    #[tokio::test]
    async fn test_rename_checks_conflict() {
        let db = seeded().await;
        let uno = mesa(&db, "centro", "Mesa 1").await;
        mesa(&db, "centro", "Mesa 2").await;

        let update = MesaUpdate {
            nombre: Patch::Value("Mesa 2".to_string()),
            ..Default::default()
        };
        let err = db.mesas().update(uno.id, update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // renaming to its own name is not a conflict
        let update = MesaUpdate {
            nombre: Patch::Value("Mesa 1".to_string()),
            estado: Patch::Value(EstadoMesa::Rapida),
        };
        let mesa = db.mesas().update(uno.id, update).await.unwrap();
        assert_eq!(mesa.estado, EstadoMesa::Rapida);
    }
}
