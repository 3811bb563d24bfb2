//! # Pedido Repository
//!
//! Read access to orders and their lines.
//!
//! Every write goes through [`crate::aggregator::OrderAggregator`], which
//! keeps `total_pedido_cents` equal to the sum of the line totals. This
//! repository never writes.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use ventrix_core::{DetallePedido, Pedido, PedidoConDetalle, PedidoFilter};

use crate::error::DbResult;

pub(crate) const SELECT_PEDIDO: &str = "SELECT id_pedido, id_sucursal, id_mesa, id_tipo_pago, nombre, estado, \
     total_pedido_cents, fecha_pedido, actualizado_en, version FROM pedidos";

pub(crate) const SELECT_DETALLE: &str = "SELECT id_detalle_pedido, id_pedido, id_producto, cantidad, \
     precio_unitario_cents, precio_total_cents, descripcion, hora_detalle FROM detalle_pedido";

#[derive(Debug, Clone)]
pub struct PedidoRepository {
    pool: SqlitePool,
}

impl PedidoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PedidoRepository { pool }
    }

    pub async fn get(&self, id_pedido: i64) -> DbResult<Option<Pedido>> {
        debug!(id_pedido = id_pedido, "Getting pedido");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id_pedido).await
    }

    /// Lists orders, newest first.
    pub async fn list(&self, filter: &PedidoFilter) -> DbResult<Vec<Pedido>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_PEDIDO);
        query.push(" WHERE 1 = 1");
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" AND id_sucursal = ").push_bind(id_sucursal.clone());
        }
        if let Some(id_mesa) = filter.id_mesa {
            query.push(" AND id_mesa = ").push_bind(id_mesa);
        }
        if let Some(estado) = filter.estado {
            query.push(" AND estado = ").push_bind(estado);
        }
        query.push(" ORDER BY fecha_pedido DESC, id_pedido DESC");

        let pedidos = query.build_query_as::<Pedido>().fetch_all(&self.pool).await?;
        debug!(count = pedidos.len(), "Listed pedidos");
        Ok(pedidos)
    }

    /// An order with its lines, oldest line first.
    pub async fn get_with_detalle(&self, id_pedido: i64) -> DbResult<Option<PedidoConDetalle>> {
        let mut conn = self.pool.acquire().await?;
        let Some(pedido) = fetch(&mut conn, id_pedido).await? else {
            return Ok(None);
        };
        let detalle = fetch_detalle(&mut conn, id_pedido).await?;
        Ok(Some(PedidoConDetalle { pedido, detalle }))
    }

    /// A single order line.
    pub async fn get_linea(&self, id_detalle_pedido: i64) -> DbResult<Option<DetallePedido>> {
        let mut conn = self.pool.acquire().await?;
        fetch_linea(&mut conn, id_detalle_pedido).await
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id_pedido: i64) -> DbResult<Option<Pedido>> {
    let sql = format!("{} WHERE id_pedido = ?", SELECT_PEDIDO);
    let pedido = sqlx::query_as::<_, Pedido>(&sql)
        .bind(id_pedido)
        .fetch_optional(conn)
        .await?;
    Ok(pedido)
}

pub(crate) async fn fetch_detalle(conn: &mut SqliteConnection, id_pedido: i64) -> DbResult<Vec<DetallePedido>> {
    let sql = format!("{} WHERE id_pedido = ? ORDER BY id_detalle_pedido", SELECT_DETALLE);
    let detalle = sqlx::query_as::<_, DetallePedido>(&sql)
        .bind(id_pedido)
        .fetch_all(conn)
        .await?;
    Ok(detalle)
}

pub(crate) async fn fetch_linea(
    conn: &mut SqliteConnection,
    id_detalle_pedido: i64,
) -> DbResult<Option<DetallePedido>> {
    let sql = format!("{} WHERE id_detalle_pedido = ?", SELECT_DETALLE);
    let linea = sqlx::query_as::<_, DetallePedido>(&sql)
        .bind(id_detalle_pedido)
        .fetch_optional(conn)
        .await?;
    Ok(linea)
}
