//! # Lifecycle Manager
//!
//! Entity writes that carry an image. The row and its image reference are
//! written in one transaction, and the blob write happens inside that
//! boundary.
//!
//! ## Failure Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT row                      ── fails → rollback, no blob         │
//! │    blobs.store(key, bytes)         ── fails → rollback, no blob         │
//! │    UPDATE row SET imagen = uri     ── fails → rollback, delete blob     │
//! │  COMMIT                            ── fails → delete blob               │
//! │                                                                         │
//! │  after COMMIT: delete blobs the row no longer points at                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cleanup of a blob is best effort: a failed delete is logged with
//! `warn!` and never turns a committed operation into an error.

use std::sync::Arc;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{info, warn};

use ventrix_core::{ImagenUpload, NuevoProducto, NuevoRestaurante, Producto, Restaurante};

use crate::blob::{self, BlobStore};
use crate::error::{DbError, DbResult};
use crate::repository::{producto, restaurante, sucursal};

/// Row an image is attached to.
#[derive(Debug, Clone, Copy)]
enum Propietario<'a> {
    Restaurante(&'a str),
    Producto(i64),
}

impl Propietario<'_> {
    fn key(&self, extension: &str) -> String {
        match self {
            Propietario::Restaurante(id) => blob::restaurante_key(id, extension),
            Propietario::Producto(id) => blob::producto_key(*id, extension),
        }
    }

    async fn set_imagen(&self, conn: &mut SqliteConnection, uri: &str) -> DbResult<()> {
        match self {
            Propietario::Restaurante(id) => restaurante::set_imagen(conn, id, Some(uri)).await,
            Propietario::Producto(id) => producto::set_imagen(conn, *id, Some(uri)).await,
        }
    }
}

/// Coordinates database rows with blob storage.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

impl LifecycleManager {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        LifecycleManager { pool, blobs }
    }

    // =========================================================================
    // Restaurante
    // =========================================================================

    /// Creates a restaurant and, when given, stores its logo under
    /// `restaurante/{id}.{ext}`.
    ///
    /// ## Errors
    /// - `ValidationError` for bad fields or an unsupported image
    /// - `NotFound` / `Conflict` from the insert
    /// - `Blob` when the image can't be written; no row is left behind
    pub async fn register_restaurant(
        &self,
        nuevo: NuevoRestaurante,
        imagen: Option<ImagenUpload>,
    ) -> DbResult<Restaurante> {
        nuevo.validate()?;
        let extension = imagen.as_ref().map(ImagenUpload::validate).transpose()?;

        let mut tx = self.pool.begin().await?;
        let mut restaurante = restaurante::insert(&mut tx, &nuevo).await?;

        match (imagen, extension) {
            (Some(imagen), Some(extension)) => {
                let propietario = Propietario::Restaurante(&restaurante.id);
                let key = propietario.key(&extension);
                let uri = self
                    .attach_and_commit(tx, propietario, &key, &imagen.bytes, None)
                    .await?;
                restaurante.imagen = Some(uri);
            }
            _ => tx.commit().await?,
        }

        info!(id = %restaurante.id, imagen = ?restaurante.imagen, "Restaurante registered");
        Ok(restaurante)
    }

    /// Replaces the logo of a restaurant. The previous blob is removed once
    /// the new reference is committed.
    pub async fn replace_restaurant_image(&self, id: &str, imagen: ImagenUpload) -> DbResult<Restaurante> {
        let extension = imagen.validate()?;

        let mut tx = self.pool.begin().await?;
        let actual = restaurante::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Restaurante", id))?;
        let anterior = actual
            .imagen
            .as_deref()
            .and_then(|uri| self.blobs.key_from_uri(uri));

        let propietario = Propietario::Restaurante(id);
        let key = propietario.key(&extension);
        let uri = self
            .attach_and_commit(tx, propietario, &key, &imagen.bytes, anterior.as_deref())
            .await?;
        self.discard_replaced(anterior, &key).await;

        info!(id = %id, imagen = %uri, "Restaurante image replaced");
        Ok(Restaurante {
            imagen: Some(uri),
            ..actual
        })
    }

    /// Deletes a restaurant, its branches and everything below them, then
    /// removes the logo and the product images that went with them.
    pub async fn delete_restaurant(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let uris = restaurante::delete_row(&mut tx, id).await?;
        tx.commit().await?;

        for uri in &uris {
            self.discard_uri(uri).await;
        }

        info!(id = %id, blobs = uris.len(), "Restaurante deleted with its images");
        Ok(())
    }

    // =========================================================================
    // Sucursal
    // =========================================================================

    /// Deletes a branch with its tables, menu and orders, then removes the
    /// images of the products that went with it.
    pub async fn delete_sucursal(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let uris = sucursal::delete_row(&mut tx, id).await?;
        tx.commit().await?;

        for uri in &uris {
            self.discard_uri(uri).await;
        }

        info!(id = %id, blobs = uris.len(), "Sucursal deleted with its images");
        Ok(())
    }

    // =========================================================================
    // Producto
    // =========================================================================

    /// Creates a product and, when given, stores its image under
    /// `producto/{id}.{ext}`.
    pub async fn register_product(
        &self,
        nuevo: NuevoProducto,
        imagen: Option<ImagenUpload>,
    ) -> DbResult<Producto> {
        nuevo.validate()?;
        let extension = imagen.as_ref().map(ImagenUpload::validate).transpose()?;

        let mut tx = self.pool.begin().await?;
        let mut producto = producto::insert(&mut tx, &nuevo).await?;

        match (imagen, extension) {
            (Some(imagen), Some(extension)) => {
                let propietario = Propietario::Producto(producto.id_producto);
                let key = propietario.key(&extension);
                let uri = self
                    .attach_and_commit(tx, propietario, &key, &imagen.bytes, None)
                    .await?;
                producto.imagen = Some(uri);
            }
            _ => tx.commit().await?,
        }

        info!(
            id_producto = producto.id_producto,
            imagen = ?producto.imagen,
            "Producto registered"
        );
        Ok(producto)
    }

    pub async fn replace_product_image(&self, id_producto: i64, imagen: ImagenUpload) -> DbResult<Producto> {
        let extension = imagen.validate()?;

        let mut tx = self.pool.begin().await?;
        let actual = producto::fetch(&mut tx, id_producto)
            .await?
            .ok_or_else(|| DbError::not_found("Producto", id_producto))?;
        let anterior = actual
            .imagen
            .as_deref()
            .and_then(|uri| self.blobs.key_from_uri(uri));

        let propietario = Propietario::Producto(id_producto);
        let key = propietario.key(&extension);
        let uri = self
            .attach_and_commit(tx, propietario, &key, &imagen.bytes, anterior.as_deref())
            .await?;
        self.discard_replaced(anterior, &key).await;

        info!(id_producto = id_producto, imagen = %uri, "Producto image replaced");
        Ok(Producto {
            imagen: Some(uri),
            ..actual
        })
    }

    /// Deletes a product and its image.
    ///
    /// ## Errors
    /// - `InUse` while order lines reference the product; the image stays
    pub async fn delete_product(&self, id_producto: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let uri = producto::delete_row(&mut tx, id_producto).await?;
        tx.commit().await?;

        if let Some(uri) = uri {
            self.discard_uri(&uri).await;
        }
        Ok(())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Writes the blob, points the row at it and commits.
    ///
    /// When anything after the blob write fails, the blob is removed again
    /// unless `key` is the one the row already used (`anterior`).
    async fn attach_and_commit(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        propietario: Propietario<'_>,
        key: &str,
        bytes: &[u8],
        anterior: Option<&str>,
    ) -> DbResult<String> {
        let uri = self.blobs.store(key, bytes).await?;

        let result = match propietario.set_imagen(&mut tx, &uri).await {
            Ok(()) => tx.commit().await.map_err(DbError::from),
            Err(e) => {
                drop(tx);
                Err(e)
            }
        };

        if let Err(e) = result {
            if anterior != Some(key) {
                warn!(key = %key, error = %e, "Image reference not committed, removing blob");
                self.discard(key).await;
            }
            return Err(e);
        }
        Ok(uri)
    }

    async fn discard_replaced(&self, anterior: Option<String>, key: &str) {
        if let Some(anterior) = anterior.filter(|anterior| anterior != key) {
            self.discard(&anterior).await;
        }
    }

    async fn discard_uri(&self, uri: &str) {
        match self.blobs.key_from_uri(uri) {
            Some(key) => self.discard(&key).await,
            None => warn!(uri = %uri, "Image URI not owned by the blob store, left in place"),
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            warn!(key = %key, error = %e, "Failed to delete blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::pool::Database;
    use crate::repository::test_support::*;
    use async_trait::async_trait;
    use ventrix_core::{ErrorKind, NuevaLinea, NuevoPedido};

    #[derive(Debug)]
    struct FailingBlobStore;

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn store(&self, _key: &str, _bytes: &[u8]) -> DbResult<String> {
            Err(DbError::Blob("disk full".to_string()))
        }

        async fn delete(&self, _key: &str) -> DbResult<()> {
            Ok(())
        }

        fn key_from_uri(&self, _uri: &str) -> Option<String> {
            None
        }
    }

    fn png(bytes: &[u8]) -> ImagenUpload {
        ImagenUpload::new("logo.PNG", bytes.to_vec())
    }

    async fn owner_only() -> Database {
        let db = database().await;
        db.usuarios()
            .create(nuevo_usuario("100", "ana@elfogon.co"))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_register_restaurant_with_image() {
        let db = owner_only().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());

        let restaurante = lifecycle
            .register_restaurant(nuevo_restaurante("r1", "100"), Some(png(b"logo")))
            .await
            .unwrap();
        assert_eq!(restaurante.imagen.as_deref(), Some("memory://restaurante/r1.png"));
        assert_eq!(blobs.get("restaurante/r1.png").await, Some(b"logo".to_vec()));

        let stored = db.restaurantes().get("r1").await.unwrap().unwrap();
        assert_eq!(stored.imagen, restaurante.imagen);
    }

    #[tokio::test]
    async fn test_failed_blob_write_leaves_no_row() {
        let db = owner_only().await;
        let lifecycle = db.lifecycle(Arc::new(FailingBlobStore));

        let err = lifecycle
            .register_restaurant(nuevo_restaurante("r1", "100"), Some(png(b"logo")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Blob(_)));
        assert!(db.restaurantes().get("r1").await.unwrap().is_none());

        // without an image the store is never touched
        lifecycle
            .register_restaurant(nuevo_restaurante("r1", "100"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_image_rejected_before_writing() {
        let db = owner_only().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());

        let err = lifecycle
            .register_restaurant(
                nuevo_restaurante("r1", "100"),
                Some(ImagenUpload::new("logo.gif", b"GIF89a".to_vec())),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(db.restaurantes().get("r1").await.unwrap().is_none());
        assert!(blobs.is_empty().await);

        for id in ["../x", "a/b"] {
            let err = lifecycle
                .register_restaurant(nuevo_restaurante(id, "100"), Some(png(b"logo")))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
            assert!(db.restaurantes().get(id).await.unwrap().is_none());
        }
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_replace_product_image_removes_previous() {
        let db = seeded().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());
        let bebidas = categoria(&db, "centro", "Bebidas").await;

        let producto = lifecycle
            .register_product(
                nuevo_producto("centro", bebidas.id, "Limonada", 400),
                Some(png(b"v1")),
            )
            .await
            .unwrap();
        let key_png = format!("producto/{}.png", producto.id_producto);
        assert!(blobs.get(&key_png).await.is_some());

        let producto = lifecycle
            .replace_product_image(
                producto.id_producto,
                ImagenUpload::new("limonada.webp", b"v2".to_vec()),
            )
            .await
            .unwrap();
        let key_webp = format!("producto/{}.webp", producto.id_producto);
        assert_eq!(producto.imagen, Some(format!("memory://{}", key_webp)));
        assert_eq!(blobs.get(&key_webp).await, Some(b"v2".to_vec()));
        assert_eq!(blobs.get(&key_png).await, None);

        // same extension overwrites in place
        lifecycle
            .replace_product_image(
                producto.id_producto,
                ImagenUpload::new("otra.webp", b"v3".to_vec()),
            )
            .await
            .unwrap();
        assert_eq!(blobs.get(&key_webp).await, Some(b"v3".to_vec()));
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_restaurant_removes_cascaded_images() {
        let db = seeded().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());
        let bebidas = categoria(&db, "centro", "Bebidas").await;

        lifecycle
            .replace_restaurant_image("r1", png(b"logo"))
            .await
            .unwrap();
        lifecycle
            .register_product(
                nuevo_producto("centro", bebidas.id, "Limonada", 400),
                Some(png(b"foto")),
            )
            .await
            .unwrap();
        assert_eq!(blobs.len().await, 2);

        lifecycle.delete_restaurant("r1").await.unwrap();
        assert!(blobs.is_empty().await);
        assert!(db.sucursales().get("centro").await.unwrap().is_none());

        let err = lifecycle.delete_restaurant("r1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_sucursal_removes_product_images() {
        let db = seeded().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());
        let bebidas = categoria(&db, "centro", "Bebidas").await;
        let postres = categoria(&db, "norte", "Postres").await;

        lifecycle
            .replace_restaurant_image("r1", png(b"logo"))
            .await
            .unwrap();
        let limonada = lifecycle
            .register_product(
                nuevo_producto("centro", bebidas.id, "Limonada", 400),
                Some(png(b"foto")),
            )
            .await
            .unwrap();
        let flan = lifecycle
            .register_product(
                nuevo_producto("norte", postres.id, "Flan", 600),
                Some(png(b"flan")),
            )
            .await
            .unwrap();
        assert_eq!(blobs.len().await, 3);

        lifecycle.delete_sucursal("centro").await.unwrap();
        assert!(db.productos().get(limonada.id_producto).await.unwrap().is_none());
        assert_eq!(blobs.len().await, 2);
        assert!(blobs.get(&format!("producto/{}.png", limonada.id_producto)).await.is_none());
        assert!(blobs.get(&format!("producto/{}.png", flan.id_producto)).await.is_some());
        assert!(blobs.get("restaurante/r1.png").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_product_in_use_keeps_image() {
        let db = seeded().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = db.lifecycle(blobs.clone());
        let bebidas = categoria(&db, "centro", "Bebidas").await;
        let producto = lifecycle
            .register_product(
                nuevo_producto("centro", bebidas.id, "Limonada", 400),
                Some(png(b"foto")),
            )
            .await
            .unwrap();

        let pedido = db
            .orders()
            .create_order(NuevoPedido {
                id_sucursal: "centro".to_string(),
                id_mesa: None,
                nombre: None,
            })
            .await
            .unwrap();
        let linea = db
            .orders()
            .add_line(pedido.id_pedido, NuevaLinea::new(producto.id_producto, 1))
            .await
            .unwrap();

        let err = lifecycle.delete_product(producto.id_producto).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(blobs.len().await, 1);

        db.orders().remove_line(linea.id_detalle_pedido).await.unwrap();
        lifecycle.delete_product(producto.id_producto).await.unwrap();
        assert!(blobs.is_empty().await);
    }
}
