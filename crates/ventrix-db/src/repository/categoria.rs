//! # Categoria Repository
//!
//! Menu categories of a branch. A category that still has products cannot
//! be deleted.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{ensure_name_free, require_sucursal, row_exists, UpdateBuilder};
use ventrix_core::{Categoria, CategoriaFilter, CategoriaUpdate, NuevaCategoria, Patch};

const SELECT_CATEGORIA: &str = "SELECT id, nombre, id_sucursal FROM categorias";

#[derive(Debug, Clone)]
pub struct CategoriaRepository {
    pool: SqlitePool,
}

impl CategoriaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoriaRepository { pool }
    }

    pub async fn create(&self, nueva: NuevaCategoria) -> DbResult<Categoria> {
        nueva.validate()?;

        let mut tx = self.pool.begin().await?;
        require_sucursal(&mut tx, &nueva.id_sucursal).await?;
        ensure_name_free(&mut tx, "categorias", "id", &nueva.id_sucursal, &nueva.nombre, None).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categorias (nombre, id_sucursal) VALUES (?, ?) RETURNING id",
        )
        .bind(&nueva.nombre)
        .bind(&nueva.id_sucursal)
        .fetch_one(&mut *tx)
        .await?;

        let categoria = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Categoria", id))?;
        tx.commit().await?;
        Ok(categoria)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Categoria>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn list(&self, filter: &CategoriaFilter) -> DbResult<Vec<Categoria>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_CATEGORIA);
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" WHERE id_sucursal = ").push_bind(id_sucursal.clone());
        }
        query.push(" ORDER BY nombre");

        let categorias = query
            .build_query_as::<Categoria>()
            .fetch_all(&self.pool)
            .await?;
        Ok(categorias)
    }

    pub async fn update(&self, id: i64, update: CategoriaUpdate) -> DbResult<Categoria> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        let actual = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Categoria", id))?;
        if let Patch::Value(nombre) = &update.nombre {
            ensure_name_free(&mut tx, "categorias", "id", &actual.id_sucursal, nombre, Some(id)).await?;
        }

        let mut builder = UpdateBuilder::new("categorias");
        builder.patch("nombre", update.nombre);
        builder.execute(&mut tx, "id", id).await?;

        let categoria = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Categoria", id))?;
        tx.commit().await?;
        Ok(categoria)
    }

    /// Deletes a category.
    ///
    /// ## Errors
    /// - `InUse` while products still belong to it
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Categoria", id));
        }
        if row_exists(&mut tx, "SELECT 1 FROM productos WHERE id_categoria = ? LIMIT 1", id).await? {
            return Err(DbError::in_use("Categoria", id, "productos"));
        }

        sqlx::query("DELETE FROM categorias WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = id, "Categoria deleted");
        Ok(())
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Categoria>> {
    let sql = format!("{} WHERE id = ?", SELECT_CATEGORIA);
    let categoria = sqlx::query_as::<_, Categoria>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(categoria)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use ventrix_core::ErrorKind;

    #[tokio::test]
    async fn test_delete_with_products_is_conflict() {
        let db = seeded().await;
        let bebidas = categoria(&db, "centro", "Bebidas").await;
        let postres = categoria(&db, "centro", "Postres").await;
        producto(&db, "centro", bebidas.id, "Limonada", 400).await;

        let err = db.categorias().delete(bebidas.id).await.unwrap_err();
        assert!(matches!(err, DbError::InUse { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        db.categorias().delete(postres.id).await.unwrap();
        assert!(db.categorias().get(postres.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_sucursal() {
        let db = seeded().await;
        categoria(&db, "centro", "Bebidas").await;
        categoria(&db, "centro", "Almuerzos").await;
        categoria(&db, "norte", "Bebidas").await;

        let nombres: Vec<_> = db
            .categorias()
            .list(&CategoriaFilter {
                id_sucursal: Some("centro".to_string()),
            })
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.nombre)
            .collect();
        assert_eq!(nombres, vec!["Almuerzos", "Bebidas"]);

        let err = db
            .categorias()
            .create(NuevaCategoria {
                nombre: "Bebidas".to_string(),
                id_sucursal: "centro".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
