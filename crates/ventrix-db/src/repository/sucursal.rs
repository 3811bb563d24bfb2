//! # Sucursal Repository
//!
//! Branches. Deleting a branch cascades to its tables, categories,
//! products, payment types and orders; that runs through
//! [`crate::lifecycle::LifecycleManager::delete_sucursal`], which also
//! removes the product images.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{require_usuario, row_exists, UpdateBuilder};
use ventrix_core::{NuevaSucursal, Patch, Sucursal, SucursalFilter, SucursalUpdate};

const SELECT_SUCURSAL: &str = "SELECT id, nombre, direccion, ciudad, telefono, fecha_apertura, estado, \
     administrador, id_restaurante FROM sucursales";

/// Repository for branches.
#[derive(Debug, Clone)]
pub struct SucursalRepository {
    pool: SqlitePool,
}

impl SucursalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SucursalRepository { pool }
    }

    /// Creates a branch. The id is generated when absent and the opening
    /// date defaults to today.
    pub async fn create(&self, nueva: NuevaSucursal) -> DbResult<Sucursal> {
        nueva.validate()?;
        let id = nueva.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut tx = self.pool.begin().await?;
        if !row_exists(&mut tx, "SELECT 1 FROM restaurantes WHERE id = ?", nueva.id_restaurante.as_str()).await? {
            return Err(DbError::not_found("Restaurante", &nueva.id_restaurante));
        }
        if let Some(administrador) = &nueva.administrador {
            require_usuario(&mut tx, administrador).await?;
        }
        if row_exists(&mut tx, "SELECT 1 FROM sucursales WHERE id = ?", id.as_str()).await? {
            return Err(DbError::duplicate("id", &id));
        }

        sqlx::query(
            r#"
            INSERT INTO sucursales (
                id, nombre, direccion, ciudad, telefono, fecha_apertura, estado, administrador, id_restaurante
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&nueva.nombre)
        .bind(&nueva.direccion)
        .bind(&nueva.ciudad)
        .bind(&nueva.telefono)
        .bind(nueva.fecha_apertura.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(nueva.estado)
        .bind(&nueva.administrador)
        .bind(&nueva.id_restaurante)
        .execute(&mut *tx)
        .await?;

        let sucursal = fetch(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Sucursal", &id))?;
        tx.commit().await?;

        info!(id = %sucursal.id, id_restaurante = %sucursal.id_restaurante, "Sucursal created");
        Ok(sucursal)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Sucursal>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// The branch managed by a user, if any.
    pub async fn find_by_administrador(&self, documento: &str) -> DbResult<Option<Sucursal>> {
        let sql = format!("{} WHERE administrador = ? ORDER BY id LIMIT 1", SELECT_SUCURSAL);
        let sucursal = sqlx::query_as::<_, Sucursal>(&sql)
            .bind(documento)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sucursal)
    }

    pub async fn list(&self, filter: &SucursalFilter) -> DbResult<Vec<Sucursal>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_SUCURSAL);
        query.push(" WHERE 1 = 1");
        if let Some(id_restaurante) = &filter.id_restaurante {
            query.push(" AND id_restaurante = ").push_bind(id_restaurante.clone());
        }
        if let Some(estado) = filter.estado {
            query.push(" AND estado = ").push_bind(estado);
        }
        query.push(" ORDER BY nombre, id");

        let sucursales = query
            .build_query_as::<Sucursal>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = sucursales.len(), "Listed sucursales");
        Ok(sucursales)
    }

    pub async fn update(&self, id: &str, update: SucursalUpdate) -> DbResult<Sucursal> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Sucursal", id));
        }
        if let Patch::Value(administrador) = &update.administrador {
            require_usuario(&mut tx, administrador).await?;
        }

        let mut builder = UpdateBuilder::new("sucursales");
        builder
            .patch("nombre", update.nombre)
            .patch("direccion", update.direccion)
            .patch("ciudad", update.ciudad)
            .patch("telefono", update.telefono)
            .patch("fecha_apertura", update.fecha_apertura)
            .patch("estado", update.estado)
            .patch("administrador", update.administrador);
        builder.execute(&mut tx, "id", id.to_string()).await?;

        let sucursal = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sucursal", id))?;
        tx.commit().await?;
        Ok(sucursal)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sucursal>> {
    let sql = format!("{} WHERE id = ?", SELECT_SUCURSAL);
    let sucursal = sqlx::query_as::<_, Sucursal>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(sucursal)
}

pub(crate) async fn fetch_by_restaurante(
    conn: &mut SqliteConnection,
    id_restaurante: &str,
) -> DbResult<Vec<Sucursal>> {
    let sql = format!("{} WHERE id_restaurante = ? ORDER BY nombre, id", SELECT_SUCURSAL);
    let sucursales = sqlx::query_as::<_, Sucursal>(&sql)
        .bind(id_restaurante)
        .fetch_all(conn)
        .await?;
    Ok(sucursales)
}

/// Deletes the branch and everything it owns, returning the image URIs of
/// the products that went with it.
pub(crate) async fn delete_row(conn: &mut SqliteConnection, id: &str) -> DbResult<Vec<String>> {
    if !row_exists(conn, "SELECT 1 FROM sucursales WHERE id = ?", id).await? {
        return Err(DbError::not_found("Sucursal", id));
    }

    let imagenes: Vec<String> = sqlx::query_scalar(
        "SELECT imagen FROM productos WHERE id_sucursal = ? AND imagen IS NOT NULL ORDER BY id_producto",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM sucursales WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    info!(id = %id, producto_imagenes = imagenes.len(), "Sucursal deleted");
    Ok(imagenes)
}
