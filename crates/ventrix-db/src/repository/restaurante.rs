//! # Restaurante Repository
//!
//! Restaurants are the tenant root: deleting one cascades to its branches
//! and everything below them.
//!
//! Image handling lives in [`crate::lifecycle`]; this repository only
//! stores the URI it is given. Deletes go through
//! [`crate::lifecycle::LifecycleManager::delete_restaurant`] so the images
//! of the removed rows are cleaned up.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::sucursal;
use crate::repository::{require_usuario, row_exists, UpdateBuilder};
use ventrix_core::{
    NuevoRestaurante, Restaurante, RestauranteConSucursales, RestauranteFilter, RestauranteUpdate,
};

const SELECT_RESTAURANTE: &str = "SELECT id, nombre, descripcion, telefono, direccion, correo, imagen, \
     fecha_creacion, fecha_finalizacion, estado, id_usuario FROM restaurantes";

/// Repository for restaurants.
#[derive(Debug, Clone)]
pub struct RestauranteRepository {
    pool: SqlitePool,
}

impl RestauranteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RestauranteRepository { pool }
    }

    /// Creates a restaurant without an image.
    ///
    /// Use [`crate::lifecycle::LifecycleManager::register_restaurant`] to
    /// attach a logo in the same transaction.
    pub async fn create(&self, nuevo: NuevoRestaurante) -> DbResult<Restaurante> {
        nuevo.validate()?;
        let mut tx = self.pool.begin().await?;
        let restaurante = insert(&mut tx, &nuevo).await?;
        tx.commit().await?;
        Ok(restaurante)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Restaurante>> {
        debug!(id = %id, "Getting restaurante");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// The restaurant owned by a user, if any.
    pub async fn find_by_usuario(&self, id_usuario: &str) -> DbResult<Option<Restaurante>> {
        let sql = format!("{} WHERE id_usuario = ?", SELECT_RESTAURANTE);
        let restaurante = sqlx::query_as::<_, Restaurante>(&sql)
            .bind(id_usuario)
            .fetch_optional(&self.pool)
            .await?;
        Ok(restaurante)
    }

    pub async fn list(&self, filter: &RestauranteFilter) -> DbResult<Vec<Restaurante>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_RESTAURANTE);
        query.push(" WHERE 1 = 1");
        if let Some(estado) = filter.estado {
            query.push(" AND estado = ").push_bind(estado);
        }
        query.push(" ORDER BY nombre, id");

        let restaurantes = query
            .build_query_as::<Restaurante>()
            .fetch_all(&self.pool)
            .await?;
        Ok(restaurantes)
    }

    /// A restaurant with all its branches.
    pub async fn get_with_sucursales(&self, id: &str) -> DbResult<Option<RestauranteConSucursales>> {
        let mut conn = self.pool.acquire().await?;
        let Some(restaurante) = fetch(&mut conn, id).await? else {
            return Ok(None);
        };
        let sucursales = sucursal::fetch_by_restaurante(&mut conn, id).await?;
        Ok(Some(RestauranteConSucursales {
            restaurante,
            sucursales,
        }))
    }

    pub async fn update(&self, id: &str, update: RestauranteUpdate) -> DbResult<Restaurante> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Restaurante", id));
        }

        let mut builder = UpdateBuilder::new("restaurantes");
        builder
            .patch("nombre", update.nombre)
            .patch("descripcion", update.descripcion)
            .patch("telefono", update.telefono)
            .patch("direccion", update.direccion)
            .patch("correo", update.correo)
            .patch("fecha_finalizacion", update.fecha_finalizacion)
            .patch("estado", update.estado);
        builder.execute(&mut tx, "id", id.to_string()).await?;

        let restaurante = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Restaurante", id))?;
        tx.commit().await?;

        debug!(id = %id, "Restaurante updated");
        Ok(restaurante)
    }

}

// =============================================================================
// Connection-level steps (shared with the lifecycle manager)
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Restaurante>> {
    let sql = format!("{} WHERE id = ?", SELECT_RESTAURANTE);
    let restaurante = sqlx::query_as::<_, Restaurante>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(restaurante)
}

/// Inserts a restaurant, generating the id when none was supplied.
///
/// ## Errors
/// - `NotFound` when the owner doesn't exist
/// - `UniqueViolation` when the id is taken or the owner already has one
pub(crate) async fn insert(conn: &mut SqliteConnection, nuevo: &NuevoRestaurante) -> DbResult<Restaurante> {
    let id = nuevo
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    require_usuario(conn, &nuevo.id_usuario).await?;
    if row_exists(conn, "SELECT 1 FROM restaurantes WHERE id = ?", id.as_str()).await? {
        return Err(DbError::duplicate("id", &id));
    }
    if row_exists(conn, "SELECT 1 FROM restaurantes WHERE id_usuario = ?", nuevo.id_usuario.as_str()).await? {
        return Err(DbError::duplicate("id_usuario", &nuevo.id_usuario));
    }

    sqlx::query(
        r#"
        INSERT INTO restaurantes (
            id, nombre, descripcion, telefono, direccion, correo, imagen,
            fecha_creacion, fecha_finalizacion, estado, id_usuario
        ) VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&nuevo.nombre)
    .bind(&nuevo.descripcion)
    .bind(&nuevo.telefono)
    .bind(&nuevo.direccion)
    .bind(&nuevo.correo)
    .bind(Utc::now().date_naive())
    .bind(nuevo.fecha_finalizacion)
    .bind(nuevo.estado)
    .bind(&nuevo.id_usuario)
    .execute(&mut *conn)
    .await?;

    info!(id = %id, id_usuario = %nuevo.id_usuario, "Restaurante created");

    fetch(conn, &id)
        .await?
        .ok_or_else(|| DbError::not_found("Restaurante", &id))
}

pub(crate) async fn set_imagen(conn: &mut SqliteConnection, id: &str, imagen: Option<&str>) -> DbResult<()> {
    let result = sqlx::query("UPDATE restaurantes SET imagen = ? WHERE id = ?")
        .bind(imagen)
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Restaurante", id));
    }
    Ok(())
}

/// Deletes the row and returns the image URIs of everything removed with
/// it: the restaurant logo first, then the product images of its branches.
pub(crate) async fn delete_row(conn: &mut SqliteConnection, id: &str) -> DbResult<Vec<String>> {
    let restaurante = fetch(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Restaurante", id))?;

    let producto_imagenes: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT p.imagen
        FROM productos p
        INNER JOIN sucursales s ON s.id = p.id_sucursal
        WHERE s.id_restaurante = ? AND p.imagen IS NOT NULL
        ORDER BY p.id_producto
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM restaurantes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    info!(
        id = %id,
        producto_imagenes = producto_imagenes.len(),
        "Restaurante deleted"
    );

    Ok(restaurante
        .imagen
        .into_iter()
        .chain(producto_imagenes)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::repository::test_support::*;
    use ventrix_core::{ErrorKind, Patch};

    #[tokio::test]
    async fn test_create_generates_id() {
        let db = database().await;
        db.usuarios().create(nuevo_usuario("100", "ana@elfogon.co")).await.unwrap();

        let mut nuevo = nuevo_restaurante("ignored", "100");
        nuevo.id = None;
        let restaurante = db.restaurantes().create(nuevo).await.unwrap();
        assert!(Uuid::parse_str(&restaurante.id).is_ok());
        assert_eq!(restaurante.imagen, None);

        let found = db.restaurantes().find_by_usuario("100").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(restaurante.id));
    }

    #[tokio::test]
    async fn test_owner_must_exist_and_owns_one() {
        let db = database().await;
        let err = db
            .restaurantes()
            .create(nuevo_restaurante("r1", "999"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        db.usuarios().create(nuevo_usuario("100", "ana@elfogon.co")).await.unwrap();
        db.restaurantes().create(nuevo_restaurante("r1", "100")).await.unwrap();
        let err = db
            .restaurantes()
            .create(nuevo_restaurante("r2", "100"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_partial_update_unset_vs_null() {
        let db = seeded().await;

        let update = RestauranteUpdate {
            nombre: Patch::Value("El Fogón Gourmet".to_string()),
            ..Default::default()
        };
        let r = db.restaurantes().update("r1", update).await.unwrap();
        assert_eq!(r.nombre, "El Fogón Gourmet");
        assert_eq!(r.descripcion.as_deref(), Some("Comida típica"));

        let update = RestauranteUpdate {
            descripcion: Patch::Null,
            ..Default::default()
        };
        let r = db.restaurantes().update("r1", update).await.unwrap();
        assert_eq!(r.nombre, "El Fogón Gourmet");
        assert_eq!(r.descripcion, None);
    }

    #[tokio::test]
    async fn test_nested_and_cascade() {
        let db = seeded().await;

        let nested = db.restaurantes().get_with_sucursales("r1").await.unwrap().unwrap();
        assert_eq!(nested.sucursales.len(), 2);

        db.lifecycle(Arc::new(MemoryBlobStore::new()))
            .delete_restaurant("r1")
            .await
            .unwrap();
        assert!(db.sucursales().get("centro").await.unwrap().is_none());
        assert!(db.restaurantes().get_with_sucursales("r1").await.unwrap().is_none());

        // the owner can be removed once the restaurant is gone
        db.usuarios().delete("100").await.unwrap();
    }
}
