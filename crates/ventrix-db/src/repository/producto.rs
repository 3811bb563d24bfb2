//! # Producto Repository
//!
//! Menu items.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create / update                                                        │
//! │  ├── sucursal must exist                         → NotFound             │
//! │  ├── categoria must exist                        → NotFound             │
//! │  ├── categoria must be of the same sucursal      → ValidationError      │
//! │  └── nombre unique within the sucursal           → Conflict             │
//! │                                                                         │
//! │  delete                                                                 │
//! │  └── refused while order lines reference it      → Conflict             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deletes run through [`crate::lifecycle::LifecycleManager::delete_product`]
//! so the image goes with the row.
//!
//! Order lines keep a price snapshot, so changing `precio_cents` never
//! alters existing orders.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{ensure_name_free, require_sucursal, row_exists, sucursal_of, UpdateBuilder};
use ventrix_core::{
    NuevoProducto, Patch, Producto, ProductoFilter, ProductoUpdate, ValidationError,
};

const SELECT_PRODUCTO: &str = "SELECT id_producto, nombre, precio_cents, imagen, disponibilidad, \
     id_sucursal, id_categoria FROM productos";

/// Repository for products.
///
/// ## Usage
/// ```rust,ignore
/// let producto = db.productos().create(NuevoProducto { .. }).await?;
/// let carta = db.productos().list(&ProductoFilter {
///     id_sucursal: Some("centro".into()),
///     disponibilidad: Some(true),
///     ..Default::default()
/// }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductoRepository {
    pool: SqlitePool,
}

impl ProductoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductoRepository { pool }
    }

    /// Creates a product without an image.
    pub async fn create(&self, nuevo: NuevoProducto) -> DbResult<Producto> {
        nuevo.validate()?;
        let mut tx = self.pool.begin().await?;
        let producto = insert(&mut tx, &nuevo).await?;
        tx.commit().await?;
        Ok(producto)
    }

    pub async fn get(&self, id_producto: i64) -> DbResult<Option<Producto>> {
        debug!(id_producto = id_producto, "Getting producto");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id_producto).await
    }

    pub async fn list(&self, filter: &ProductoFilter) -> DbResult<Vec<Producto>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_PRODUCTO);
        query.push(" WHERE 1 = 1");
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" AND id_sucursal = ").push_bind(id_sucursal.clone());
        }
        if let Some(id_categoria) = filter.id_categoria {
            query.push(" AND id_categoria = ").push_bind(id_categoria);
        }
        if let Some(disponibilidad) = filter.disponibilidad {
            query.push(" AND disponibilidad = ").push_bind(disponibilidad);
        }
        query.push(" ORDER BY nombre");

        let productos = query
            .build_query_as::<Producto>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = productos.len(), "Listed productos");
        Ok(productos)
    }

    pub async fn update(&self, id_producto: i64, update: ProductoUpdate) -> DbResult<Producto> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        let actual = fetch(&mut tx, id_producto)
            .await?
            .ok_or_else(|| DbError::not_found("Producto", id_producto))?;

        if let Patch::Value(nombre) = &update.nombre {
            ensure_name_free(
                &mut tx,
                "productos",
                "id_producto",
                &actual.id_sucursal,
                nombre,
                Some(id_producto),
            )
            .await?;
        }
        if let Patch::Value(id_categoria) = update.id_categoria {
            require_categoria_of(&mut tx, id_categoria, &actual.id_sucursal).await?;
        }

        let mut builder = UpdateBuilder::new("productos");
        builder
            .patch("nombre", update.nombre)
            .patch("precio_cents", update.precio_cents)
            .patch("disponibilidad", update.disponibilidad)
            .patch("id_categoria", update.id_categoria);
        builder.execute(&mut tx, "id_producto", id_producto).await?;

        let producto = fetch(&mut tx, id_producto)
            .await?
            .ok_or_else(|| DbError::not_found("Producto", id_producto))?;
        tx.commit().await?;

        debug!(id_producto = id_producto, "Producto updated");
        Ok(producto)
    }
}

// =============================================================================
// Connection-level steps (shared with the lifecycle manager and aggregator)
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id_producto: i64) -> DbResult<Option<Producto>> {
    let sql = format!("{} WHERE id_producto = ?", SELECT_PRODUCTO);
    let producto = sqlx::query_as::<_, Producto>(&sql)
        .bind(id_producto)
        .fetch_optional(conn)
        .await?;
    Ok(producto)
}

/// Checks that a category exists and lives in `id_sucursal`.
async fn require_categoria_of(
    conn: &mut SqliteConnection,
    id_categoria: i64,
    id_sucursal: &str,
) -> DbResult<()> {
    let found = sucursal_of(conn, "SELECT id_sucursal FROM categorias WHERE id = ?", id_categoria)
        .await?
        .ok_or_else(|| DbError::not_found("Categoria", id_categoria))?;
    if found != id_sucursal {
        return Err(ValidationError::WrongSucursal {
            field: "id_categoria".to_string(),
            expected: id_sucursal.to_string(),
            found,
        }
        .into());
    }
    Ok(())
}

pub(crate) async fn insert(conn: &mut SqliteConnection, nuevo: &NuevoProducto) -> DbResult<Producto> {
    require_sucursal(conn, &nuevo.id_sucursal).await?;
    require_categoria_of(conn, nuevo.id_categoria, &nuevo.id_sucursal).await?;
    ensure_name_free(conn, "productos", "id_producto", &nuevo.id_sucursal, &nuevo.nombre, None).await?;

    let id_producto: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO productos (nombre, precio_cents, imagen, disponibilidad, id_sucursal, id_categoria)
        VALUES (?, ?, NULL, ?, ?, ?)
        RETURNING id_producto
        "#,
    )
    .bind(&nuevo.nombre)
    .bind(nuevo.precio_cents)
    .bind(nuevo.disponibilidad)
    .bind(&nuevo.id_sucursal)
    .bind(nuevo.id_categoria)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        id_producto = id_producto,
        id_sucursal = %nuevo.id_sucursal,
        precio_cents = nuevo.precio_cents,
        "Producto created"
    );

    fetch(conn, id_producto)
        .await?
        .ok_or_else(|| DbError::not_found("Producto", id_producto))
}

pub(crate) async fn set_imagen(
    conn: &mut SqliteConnection,
    id_producto: i64,
    imagen: Option<&str>,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE productos SET imagen = ? WHERE id_producto = ?")
        .bind(imagen)
        .bind(id_producto)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Producto", id_producto));
    }
    Ok(())
}

/// Deletes the row and returns its image URI, if it had one.
pub(crate) async fn delete_row(conn: &mut SqliteConnection, id_producto: i64) -> DbResult<Option<String>> {
    let producto = fetch(conn, id_producto)
        .await?
        .ok_or_else(|| DbError::not_found("Producto", id_producto))?;

    if row_exists(
        conn,
        "SELECT 1 FROM detalle_pedido WHERE id_producto = ? LIMIT 1",
        id_producto,
    )
    .await?
    {
        return Err(DbError::in_use("Producto", id_producto, "detalle_pedido"));
    }

    sqlx::query("DELETE FROM productos WHERE id_producto = ?")
        .bind(id_producto)
        .execute(&mut *conn)
        .await?;

    info!(id_producto = id_producto, "Producto deleted");
    Ok(producto.imagen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use ventrix_core::ErrorKind;

    #[tokio::test]
    async fn test_name_unique_per_sucursal() {
        let db = seeded().await;
        let centro = categoria(&db, "centro", "Bebidas").await;
        let norte = categoria(&db, "norte", "Bebidas").await;

        producto(&db, "centro", centro.id, "Limonada", 400).await;

        let err = db
            .productos()
            .create(nuevo_producto("centro", centro.id, "Limonada", 450))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let otro = producto(&db, "norte", norte.id, "Limonada", 450).await;
        assert_eq!(otro.precio_cents, 450);
    }

    #[tokio::test]
    async fn test_missing_references() {
        let db = seeded().await;
        let centro = categoria(&db, "centro", "Bebidas").await;

        let err = db
            .productos()
            .create(nuevo_producto("sur", centro.id, "Tinto", 200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db
            .productos()
            .create(nuevo_producto("centro", 9_999, "Tinto", 200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // category of another branch
        let err = db
            .productos()
            .create(nuevo_producto("norte", centro.id, "Tinto", 200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let db = seeded().await;
        let centro = categoria(&db, "centro", "Bebidas").await;
        let err = db
            .productos()
            .create(nuevo_producto("centro", centro.id, "Tinto", -1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_update_and_filters() {
        let db = seeded().await;
        let bebidas = categoria(&db, "centro", "Bebidas").await;
        let limonada = producto(&db, "centro", bebidas.id, "Limonada", 400).await;
        producto(&db, "centro", bebidas.id, "Tinto", 200).await;

        let update = ProductoUpdate {
            disponibilidad: Patch::Value(false),
            precio_cents: Patch::Value(500),
            ..Default::default()
        };
        let limonada = db.productos().update(limonada.id_producto, update).await.unwrap();
        assert!(!limonada.disponibilidad);
        assert_eq!(limonada.precio_cents, 500);
        assert_eq!(limonada.nombre, "Limonada");

        let disponibles = db
            .productos()
            .list(&ProductoFilter {
                id_sucursal: Some("centro".to_string()),
                disponibilidad: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(disponibles.len(), 1);
        assert_eq!(disponibles[0].nombre, "Tinto");

        let update = ProductoUpdate {
            nombre: Patch::Null,
            ..Default::default()
        };
        let err = db.productos().update(limonada.id_producto, update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
