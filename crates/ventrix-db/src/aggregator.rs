//! # Order Aggregator
//!
//! The only writer of `pedidos` and `detalle_pedido`.
//!
//! ## Invariant
//! ```text
//! pedido.total_pedido_cents == Σ detalle_pedido.precio_total_cents
//! ```
//! holds after every committed operation of this module.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE pedidos SET version = version + 1 ... ← takes the write lock  │
//! │    SELECT pedido                                ← state checks          │
//! │    INSERT / UPDATE / DELETE detalle_pedido                              │
//! │    UPDATE pedidos SET total_pedido_cents = Σ lines                      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writing the parent row first means two concurrent `add_line` calls on
//! the same order serialize: the second one waits (up to `busy_timeout`)
//! and then reads the lines the first one committed. A wait that runs out
//! surfaces as [`DbError::Busy`], a transient error.
//!
//! ## State Machine
//! ```text
//! ORDENADO ──► COMANDADO ──► LISTO ──► PAGADO
//!     └──────────────┴──────────┴────────┘   (forward jumps allowed)
//! ```
//! Once PAGADO, lines and header are frozen.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use ventrix_core::order::{
    check_transition, ensure_available, ensure_lines_mutable, ensure_same_sucursal, line_total,
    order_total,
};
use ventrix_core::{
    DetallePedido, EstadoPedido, Money, NuevaLinea, NuevoPedido, Patch, Pedido, PedidoUpdate,
    ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::pedido::{fetch, fetch_detalle, fetch_linea};
use crate::repository::{producto, require_sucursal, sucursal_of, tipo_pago, UpdateBuilder};

/// Order and order-line mutations.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
/// let pedido = orders.create_order(NuevoPedido { id_sucursal: "centro".into(), .. }).await?;
/// orders.add_line(pedido.id_pedido, NuevaLinea::new(id_bandeja, 2)).await?;
/// orders.advance_state(pedido.id_pedido, EstadoPedido::Comandado).await?;
/// orders.pay(pedido.id_pedido, id_efectivo).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderAggregator {
    pool: SqlitePool,
}

impl OrderAggregator {
    pub fn new(pool: SqlitePool) -> Self {
        OrderAggregator { pool }
    }

    // =========================================================================
    // Order header
    // =========================================================================

    /// Opens a new order in ORDENADO with a zero total.
    ///
    /// ## Errors
    /// - `NotFound` when the branch or the table doesn't exist
    /// - `ValidationError` when the table belongs to another branch
    pub async fn create_order(&self, nuevo: NuevoPedido) -> DbResult<Pedido> {
        nuevo.validate()?;

        let mut tx = self.pool.begin().await?;
        require_sucursal(&mut tx, &nuevo.id_sucursal).await?;
        if let Some(id_mesa) = nuevo.id_mesa {
            require_in_sucursal(&mut tx, Referencia::Mesa, id_mesa, &nuevo.id_sucursal).await?;
        }

        let ahora = Utc::now();
        let id_pedido: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pedidos (
                id_sucursal, id_mesa, id_tipo_pago, nombre, estado,
                total_pedido_cents, fecha_pedido, actualizado_en, version
            ) VALUES (?, ?, NULL, ?, ?, 0, ?, ?, 0)
            RETURNING id_pedido
            "#,
        )
        .bind(&nuevo.id_sucursal)
        .bind(nuevo.id_mesa)
        .bind(&nuevo.nombre)
        .bind(EstadoPedido::Ordenado)
        .bind(ahora)
        .bind(ahora)
        .fetch_one(&mut *tx)
        .await?;

        let pedido = reload(&mut tx, id_pedido).await?;
        tx.commit().await?;

        info!(
            id_pedido = id_pedido,
            id_sucursal = %pedido.id_sucursal,
            id_mesa = ?pedido.id_mesa,
            "Pedido created"
        );
        Ok(pedido)
    }

    /// Edits table, payment type or customer label of an open order.
    pub async fn update_order(&self, id_pedido: i64, update: PedidoUpdate) -> DbResult<Pedido> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        if let Patch::Value(id_mesa) = update.id_mesa {
            require_in_sucursal(&mut tx, Referencia::Mesa, id_mesa, &pedido.id_sucursal).await?;
        }
        if let Patch::Value(id_tipo_pago) = update.id_tipo_pago {
            require_in_sucursal(&mut tx, Referencia::TipoPago, id_tipo_pago, &pedido.id_sucursal)
                .await?;
        }

        let mut builder = UpdateBuilder::new("pedidos");
        builder
            .patch("id_mesa", update.id_mesa)
            .patch("id_tipo_pago", update.id_tipo_pago)
            .patch("nombre", update.nombre);
        builder.execute(&mut tx, "id_pedido", id_pedido).await?;

        let pedido = reload(&mut tx, id_pedido).await?;
        tx.commit().await?;

        debug!(id_pedido = id_pedido, "Pedido updated");
        Ok(pedido)
    }

    /// Deletes an open order and its lines.
    pub async fn delete_order(&self, id_pedido: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        sqlx::query("DELETE FROM pedidos WHERE id_pedido = ?")
            .bind(id_pedido)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id_pedido = id_pedido, "Pedido deleted");
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Appends a line priced from the product's current price.
    ///
    /// ## Errors
    /// - `NotFound` when the order or the product doesn't exist
    /// - `InvalidState` when the order is PAGADO or the product unavailable
    /// - `ValidationError` for a bad quantity or a product of another branch
    pub async fn add_line(&self, id_pedido: i64, linea: NuevaLinea) -> DbResult<DetallePedido> {
        linea.validate()?;

        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        let producto = producto::fetch(&mut tx, linea.id_producto)
            .await?
            .ok_or_else(|| DbError::not_found("Producto", linea.id_producto))?;
        ensure_same_sucursal("id_producto", &pedido, &producto.id_sucursal)?;
        ensure_available(&producto)?;

        let precio_total = line_total(producto.precio(), linea.cantidad)?;

        let id_detalle_pedido: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO detalle_pedido (
                id_pedido, id_producto, cantidad, precio_unitario_cents,
                precio_total_cents, descripcion, hora_detalle
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id_detalle_pedido
            "#,
        )
        .bind(id_pedido)
        .bind(producto.id_producto)
        .bind(linea.cantidad)
        .bind(producto.precio_cents)
        .bind(precio_total.cents())
        .bind(&linea.descripcion)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let total = recompute_total(&mut tx, id_pedido).await?;
        let detalle = fetch_linea(&mut tx, id_detalle_pedido)
            .await?
            .ok_or_else(|| DbError::not_found("DetallePedido", id_detalle_pedido))?;
        tx.commit().await?;

        info!(
            id_pedido = id_pedido,
            id_detalle_pedido = id_detalle_pedido,
            id_producto = producto.id_producto,
            cantidad = linea.cantidad,
            total = %total,
            "Line added"
        );
        Ok(detalle)
    }

    /// Removes a line and returns the updated order.
    pub async fn remove_line(&self, id_detalle_pedido: i64) -> DbResult<Pedido> {
        let id_pedido = self.owning_pedido(id_detalle_pedido).await?;

        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        let result = sqlx::query("DELETE FROM detalle_pedido WHERE id_detalle_pedido = ?")
            .bind(id_detalle_pedido)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("DetallePedido", id_detalle_pedido));
        }

        let total = recompute_total(&mut tx, id_pedido).await?;
        let pedido = reload(&mut tx, id_pedido).await?;
        tx.commit().await?;

        info!(
            id_pedido = id_pedido,
            id_detalle_pedido = id_detalle_pedido,
            total = %total,
            "Line removed"
        );
        Ok(pedido)
    }

    /// Changes the quantity of a line. The unit price stays the one
    /// captured when the line was added.
    pub async fn update_line(&self, id_detalle_pedido: i64, cantidad: i64) -> DbResult<DetallePedido> {
        let id_pedido = self.owning_pedido(id_detalle_pedido).await?;

        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        let linea = fetch_linea(&mut tx, id_detalle_pedido)
            .await?
            .ok_or_else(|| DbError::not_found("DetallePedido", id_detalle_pedido))?;
        let precio_total = line_total(linea.precio_unitario(), cantidad)?;

        sqlx::query(
            "UPDATE detalle_pedido SET cantidad = ?, precio_total_cents = ? WHERE id_detalle_pedido = ?",
        )
        .bind(cantidad)
        .bind(precio_total.cents())
        .bind(id_detalle_pedido)
        .execute(&mut *tx)
        .await?;

        let total = recompute_total(&mut tx, id_pedido).await?;
        let linea = fetch_linea(&mut tx, id_detalle_pedido)
            .await?
            .ok_or_else(|| DbError::not_found("DetallePedido", id_detalle_pedido))?;
        tx.commit().await?;

        debug!(
            id_pedido = id_pedido,
            id_detalle_pedido = id_detalle_pedido,
            cantidad = cantidad,
            total = %total,
            "Line updated"
        );
        Ok(linea)
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Moves the order forward. Moving to the current state is accepted
    /// and changes nothing but the version.
    ///
    /// ## Errors
    /// - `NotFound` when the order doesn't exist
    /// - `InvalidState` when `estado` ranks below the current state
    pub async fn advance_state(&self, id_pedido: i64, estado: EstadoPedido) -> DbResult<Pedido> {
        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        check_transition(&pedido, estado)?;

        if pedido.estado != estado {
            sqlx::query("UPDATE pedidos SET estado = ? WHERE id_pedido = ?")
                .bind(estado)
                .bind(id_pedido)
                .execute(&mut *tx)
                .await?;
        }

        let actualizado = reload(&mut tx, id_pedido).await?;
        tx.commit().await?;

        info!(
            id_pedido = id_pedido,
            from = %pedido.estado,
            to = %estado,
            "Pedido state advanced"
        );
        Ok(actualizado)
    }

    /// Attaches a payment type and closes the order as PAGADO.
    ///
    /// ## Errors
    /// - `InvalidState` when the order is already paid
    /// - `NotFound` / `ValidationError` for a missing or foreign payment type
    pub async fn pay(&self, id_pedido: i64, id_tipo_pago: i64) -> DbResult<Pedido> {
        let mut tx = self.pool.begin().await?;
        let pedido = lock(&mut tx, id_pedido).await?;
        ensure_lines_mutable(&pedido)?;

        let tipo = tipo_pago::fetch(&mut tx, id_tipo_pago)
            .await?
            .ok_or_else(|| DbError::not_found("TipoPago", id_tipo_pago))?;
        ensure_same_sucursal("id_tipo_pago", &pedido, &tipo.id_sucursal)?;

        sqlx::query("UPDATE pedidos SET estado = ?, id_tipo_pago = ? WHERE id_pedido = ?")
            .bind(EstadoPedido::Pagado)
            .bind(id_tipo_pago)
            .bind(id_pedido)
            .execute(&mut *tx)
            .await?;

        let pagado = reload(&mut tx, id_pedido).await?;
        tx.commit().await?;

        info!(
            id_pedido = id_pedido,
            id_tipo_pago = id_tipo_pago,
            total = %pagado.total(),
            "Pedido paid"
        );
        Ok(pagado)
    }

    /// Looks up the order a line belongs to. Runs outside any transaction,
    /// a line never moves between orders.
    async fn owning_pedido(&self, id_detalle_pedido: i64) -> DbResult<i64> {
        let id_pedido: Option<i64> =
            sqlx::query_scalar("SELECT id_pedido FROM detalle_pedido WHERE id_detalle_pedido = ?")
                .bind(id_detalle_pedido)
                .fetch_optional(&self.pool)
                .await?;
        id_pedido.ok_or_else(|| DbError::not_found("DetallePedido", id_detalle_pedido))
    }
}

// =============================================================================
// Transaction steps
// =============================================================================

/// Bumps the order version, taking the write lock, and returns the row.
async fn lock(conn: &mut SqliteConnection, id_pedido: i64) -> DbResult<Pedido> {
    let result = sqlx::query(
        "UPDATE pedidos SET version = version + 1, actualizado_en = ? WHERE id_pedido = ?",
    )
    .bind(Utc::now())
    .bind(id_pedido)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Pedido", id_pedido));
    }
    reload(conn, id_pedido).await
}

async fn reload(conn: &mut SqliteConnection, id_pedido: i64) -> DbResult<Pedido> {
    fetch(conn, id_pedido)
        .await?
        .ok_or_else(|| DbError::not_found("Pedido", id_pedido))
}

/// Stores Σ line totals on the order.
async fn recompute_total(conn: &mut SqliteConnection, id_pedido: i64) -> DbResult<Money> {
    let lineas = fetch_detalle(conn, id_pedido).await?;
    let total = order_total(&lineas)?;

    sqlx::query("UPDATE pedidos SET total_pedido_cents = ? WHERE id_pedido = ?")
        .bind(total.cents())
        .bind(id_pedido)
        .execute(&mut *conn)
        .await?;
    Ok(total)
}

#[derive(Debug, Clone, Copy)]
enum Referencia {
    Mesa,
    TipoPago,
}

impl Referencia {
    fn entity(self) -> &'static str {
        match self {
            Referencia::Mesa => "Mesa",
            Referencia::TipoPago => "TipoPago",
        }
    }

    fn field(self) -> &'static str {
        match self {
            Referencia::Mesa => "id_mesa",
            Referencia::TipoPago => "id_tipo_pago",
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Referencia::Mesa => "SELECT id_sucursal FROM mesas WHERE id = ?",
            Referencia::TipoPago => "SELECT id_sucursal FROM tipos_pago WHERE id = ?",
        }
    }
}

/// Checks that a table or payment type exists and lives in `id_sucursal`.
async fn require_in_sucursal(
    conn: &mut SqliteConnection,
    referencia: Referencia,
    id: i64,
    id_sucursal: &str,
) -> DbResult<()> {
    let found = sucursal_of(conn, referencia.sql(), id)
        .await?
        .ok_or_else(|| DbError::not_found(referencia.entity(), id))?;
    if found != id_sucursal {
        return Err(ValidationError::WrongSucursal {
            field: referencia.field().to_string(),
            expected: id_sucursal.to_string(),
            found,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::*;
    use ventrix_core::{CoreError, ErrorKind, NuevoTipoPago, ProductoUpdate};

    fn nuevo_pedido(id_sucursal: &str) -> NuevoPedido {
        NuevoPedido {
            id_sucursal: id_sucursal.to_string(),
            id_mesa: None,
            nombre: None,
        }
    }

    /// Branch "centro" with a 12.50 and a 4.00 product.
    async fn carta(db: &Database) -> (i64, i64) {
        let platos = categoria(db, "centro", "Platos").await;
        let bandeja = producto(db, "centro", platos.id, "Bandeja paisa", 1250).await;
        let jugo = producto(db, "centro", platos.id, "Jugo de mora", 400).await;
        (bandeja.id_producto, jugo.id_producto)
    }

    async fn total(db: &Database, id_pedido: i64) -> i64 {
        db.pedidos()
            .get(id_pedido)
            .await
            .unwrap()
            .unwrap()
            .total_pedido_cents
    }

    #[tokio::test]
    async fn test_order_scenario() {
        let db = seeded().await;
        let (bandeja, jugo) = carta(&db).await;
        let orders = db.orders();

        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();
        assert_eq!(pedido.estado, EstadoPedido::Ordenado);
        assert_eq!(pedido.total_pedido_cents, 0);

        let linea = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(bandeja, 2))
            .await
            .unwrap();
        assert_eq!(linea.precio_unitario_cents, 1250);
        assert_eq!(linea.precio_total_cents, 2500);
        assert_eq!(total(&db, pedido.id_pedido).await, 2500);

        orders
            .add_line(pedido.id_pedido, NuevaLinea::new(jugo, 1))
            .await
            .unwrap();
        assert_eq!(total(&db, pedido.id_pedido).await, 2900);

        let comandado = orders
            .advance_state(pedido.id_pedido, EstadoPedido::Comandado)
            .await
            .unwrap();
        assert_eq!(comandado.estado, EstadoPedido::Comandado);

        let err = orders
            .advance_state(pedido.id_pedido, EstadoPedido::Ordenado)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(matches!(err, DbError::Domain(CoreError::BackwardTransition { .. })));

        let pedido = db.pedidos().get(pedido.id_pedido).await.unwrap().unwrap();
        assert_eq!(pedido.estado, EstadoPedido::Comandado);
        assert_eq!(pedido.total().to_string(), "$29.00");
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_total() {
        let db = seeded().await;
        let (bandeja, jugo) = carta(&db).await;
        let orders = db.orders();
        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();
        orders
            .add_line(pedido.id_pedido, NuevaLinea::new(bandeja, 1))
            .await
            .unwrap();
        let antes = total(&db, pedido.id_pedido).await;

        let linea = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(jugo, 3))
            .await
            .unwrap();
        assert_eq!(total(&db, pedido.id_pedido).await, antes + 1200);

        let pedido = orders.remove_line(linea.id_detalle_pedido).await.unwrap();
        assert_eq!(pedido.total_pedido_cents, antes);

        let err = orders.remove_line(linea.id_detalle_pedido).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_line_keeps_snapshot_price() {
        let db = seeded().await;
        let (bandeja, _) = carta(&db).await;
        let orders = db.orders();
        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();
        let linea = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(bandeja, 1))
            .await
            .unwrap();

        let update = ProductoUpdate {
            precio_cents: Patch::Value(2000),
            ..Default::default()
        };
        db.productos().update(bandeja, update).await.unwrap();

        let linea = orders.update_line(linea.id_detalle_pedido, 3).await.unwrap();
        assert_eq!(linea.precio_unitario_cents, 1250);
        assert_eq!(linea.precio_total_cents, 3750);
        assert_eq!(total(&db, pedido.id_pedido).await, 3750);

        let err = orders.update_line(linea.id_detalle_pedido, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(total(&db, pedido.id_pedido).await, 3750);
    }

    #[tokio::test]
    async fn test_total_overflow_rolls_back_line() {
        let db = seeded().await;
        let platos = categoria(&db, "centro", "Platos").await;
        let caro = producto(&db, "centro", platos.id, "Langosta", i64::MAX / 999).await;
        let orders = db.orders();
        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();

        let primera = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(caro.id_producto, 999))
            .await
            .unwrap();
        let antes = total(&db, pedido.id_pedido).await;
        assert_eq!(antes, primera.precio_total_cents);

        let err = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(caro.id_producto, 999))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let pedido = db
            .pedidos()
            .get_with_detalle(pedido.id_pedido)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pedido.detalle.len(), 1);
        assert_eq!(pedido.pedido.total_pedido_cents, antes);
    }

    #[tokio::test]
    async fn test_paid_order_is_frozen() {
        let db = seeded().await;
        let (bandeja, jugo) = carta(&db).await;
        db.tipos_pago()
            .create(NuevoTipoPago {
                id: 1,
                descripcion: "Efectivo".to_string(),
                id_sucursal: "centro".to_string(),
            })
            .await
            .unwrap();
        let orders = db.orders();
        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();
        let linea = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(bandeja, 2))
            .await
            .unwrap();

        let pagado = orders.pay(pedido.id_pedido, 1).await.unwrap();
        assert_eq!(pagado.estado, EstadoPedido::Pagado);
        assert_eq!(pagado.id_tipo_pago, Some(1));

        let err = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(jugo, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = orders.remove_line(linea.id_detalle_pedido).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = orders.update_line(linea.id_detalle_pedido, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = orders.delete_order(pedido.id_pedido).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = orders.pay(pedido.id_pedido, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        assert_eq!(total(&db, pedido.id_pedido).await, 2500);
        let detalle = db.pedidos().get_with_detalle(pedido.id_pedido).await.unwrap().unwrap();
        assert_eq!(detalle.detalle.len(), 1);

        // re-asserting the final state is a no-op
        let same = orders
            .advance_state(pedido.id_pedido, EstadoPedido::Pagado)
            .await
            .unwrap();
        assert_eq!(same.estado, EstadoPedido::Pagado);
    }

    #[tokio::test]
    async fn test_product_checks() {
        let db = seeded().await;
        let (bandeja, _) = carta(&db).await;
        let norte = categoria(&db, "norte", "Platos").await;
        let ajeno = producto(&db, "norte", norte.id, "Sancocho", 1500).await;
        let orders = db.orders();
        let pedido = orders.create_order(nuevo_pedido("centro")).await.unwrap();

        let err = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(ajeno.id_producto, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(9_999, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let update = ProductoUpdate {
            disponibilidad: Patch::Value(false),
            ..Default::default()
        };
        db.productos().update(bandeja, update).await.unwrap();
        let err = orders
            .add_line(pedido.id_pedido, NuevaLinea::new(bandeja, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = orders
            .add_line(404, NuevaLinea::new(bandeja, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(total(&db, pedido.id_pedido).await, 0);
    }

    #[tokio::test]
    async fn test_mesa_and_header_updates() {
        let db = seeded().await;
        let uno = mesa(&db, "centro", "Mesa 1").await;
        let ajena = mesa(&db, "norte", "Mesa 1").await;
        let orders = db.orders();

        let err = orders
            .create_order(NuevoPedido {
                id_sucursal: "centro".to_string(),
                id_mesa: Some(ajena.id),
                nombre: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let pedido = orders
            .create_order(NuevoPedido {
                id_sucursal: "centro".to_string(),
                id_mesa: Some(uno.id),
                nombre: None,
            })
            .await
            .unwrap();

        let update = PedidoUpdate {
            id_mesa: Patch::Null,
            nombre: Patch::Value("Domicilio Carlos".to_string()),
            ..Default::default()
        };
        let pedido = orders.update_order(pedido.id_pedido, update).await.unwrap();
        assert_eq!(pedido.id_mesa, None);
        assert_eq!(pedido.nombre.as_deref(), Some("Domicilio Carlos"));
        assert_eq!(pedido.version, 1);

        let en_mesa = db
            .pedidos()
            .list(&ventrix_core::PedidoFilter {
                id_mesa: Some(uno.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(en_mesa.is_empty());

        orders.delete_order(pedido.id_pedido).await.unwrap();
        assert!(db.pedidos().get(pedido.id_pedido).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_line_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("ventrix.db")).max_connections(4);
        let db = Database::new(config).await.unwrap();

        db.usuarios()
            .create(nuevo_usuario("100", "ana@elfogon.co"))
            .await
            .unwrap();
        db.restaurantes()
            .create(nuevo_restaurante("r1", "100"))
            .await
            .unwrap();
        db.sucursales()
            .create(nueva_sucursal("centro", "r1"))
            .await
            .unwrap();
        let (bandeja, jugo) = carta(&db).await;
        let pedido = db.orders().create_order(nuevo_pedido("centro")).await.unwrap();

        let mut handles = Vec::new();
        for (id_producto, cantidad) in [(bandeja, 2), (jugo, 1), (jugo, 2), (bandeja, 1)] {
            let orders = db.orders();
            let id_pedido = pedido.id_pedido;
            handles.push(tokio::spawn(async move {
                orders
                    .add_line(id_pedido, NuevaLinea::new(id_producto, cantidad))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let pedido = db.pedidos().get_with_detalle(pedido.id_pedido).await.unwrap().unwrap();
        assert_eq!(pedido.detalle.len(), 4);
        assert_eq!(pedido.pedido.total_pedido_cents, 2500 + 400 + 800 + 1250);
        assert_eq!(pedido.pedido.version, 4);

        db.close().await;
    }
}
