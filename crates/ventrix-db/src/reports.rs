//! # Sales Reports
//!
//! Read-only aggregates over the PAGADO orders of a branch. Open orders
//! never count.

use sqlx::SqlitePool;
use tracing::debug;

use ventrix_core::{EstadoPedido, ProductoVendido, VentaDiaria};

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Best sellers by quantity, then revenue.
    pub async fn top_products(&self, id_sucursal: &str, limit: u32) -> DbResult<Vec<ProductoVendido>> {
        let rows = sqlx::query_as::<_, ProductoVendido>(
            r#"
            SELECT
                pr.id_producto                  AS id_producto,
                pr.nombre                       AS nombre,
                c.nombre                        AS categoria,
                SUM(d.cantidad)                 AS cantidad_total,
                SUM(d.precio_total_cents)       AS ingresos_cents
            FROM detalle_pedido d
            INNER JOIN pedidos pe   ON pe.id_pedido = d.id_pedido
            INNER JOIN productos pr ON pr.id_producto = d.id_producto
            INNER JOIN categorias c ON c.id = pr.id_categoria
            WHERE pe.id_sucursal = ? AND pe.estado = ?
            GROUP BY pr.id_producto, pr.nombre, c.nombre
            ORDER BY cantidad_total DESC, ingresos_cents DESC, pr.id_producto
            LIMIT ?
            "#,
        )
        .bind(id_sucursal)
        .bind(EstadoPedido::Pagado)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        debug!(id_sucursal = %id_sucursal, count = rows.len(), "Top products computed");
        Ok(rows)
    }

    /// Paid orders and revenue per calendar day (UTC), oldest first.
    pub async fn daily_sales(&self, id_sucursal: &str) -> DbResult<Vec<VentaDiaria>> {
        let rows = sqlx::query_as::<_, VentaDiaria>(
            r#"
            SELECT
                substr(fecha_pedido, 1, 10)     AS fecha,
                COUNT(*)                        AS pedidos,
                SUM(total_pedido_cents)         AS ingresos_cents
            FROM pedidos
            WHERE id_sucursal = ? AND estado = ?
            GROUP BY substr(fecha_pedido, 1, 10)
            ORDER BY fecha
            "#,
        )
        .bind(id_sucursal)
        .bind(EstadoPedido::Pagado)
        .fetch_all(&self.pool)
        .await?;

        debug!(id_sucursal = %id_sucursal, days = rows.len(), "Daily sales computed");
        Ok(rows)
    }
}
