//! # Order Math
//!
//! Pure rules behind the order aggregator. The database layer loads rows,
//! asks these functions what is allowed and what the numbers are, then
//! writes the result.
//!
//! ```text
//! add_line(pedido, producto, cantidad)
//!      │
//!      ├── ensure_lines_mutable(pedido)         PAGADO? → OrderLocked
//!      ├── ensure_same_sucursal(pedido, prod)   other branch? → WrongSucursal
//!      ├── ensure_available(producto)           disponibilidad=false? → ProductUnavailable
//!      ├── line_total(precio, cantidad)         1250 × 2 = 2500
//!      └── order_total(lines)                   Σ precio_total
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DetallePedido, EstadoPedido, Pedido, Producto};
use crate::validation::validate_cantidad;

/// Total of one line: unit price times quantity.
///
/// ```rust
/// use ventrix_core::{order::line_total, Money};
///
/// assert_eq!(line_total(Money::from_cents(1250), 2).unwrap().cents(), 2500);
/// ```
pub fn line_total(precio_unitario: Money, cantidad: i64) -> Result<Money, ValidationError> {
    validate_cantidad(cantidad)?;
    precio_unitario
        .checked_multiply_quantity(cantidad)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "precio_total_cents".to_string(),
            min: 0,
            max: i64::MAX,
        })
}

/// Sum of line totals. An order without lines totals zero.
pub fn order_total<'a, I>(lines: I) -> Result<Money, ValidationError>
where
    I: IntoIterator<Item = &'a DetallePedido>,
{
    lines
        .into_iter()
        .try_fold(Money::zero(), |total, linea| total.checked_add(linea.precio_total()))
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "total_pedido_cents".to_string(),
            min: 0,
            max: i64::MAX,
        })
}

/// Fails once the order is paid.
pub fn ensure_lines_mutable(pedido: &Pedido) -> CoreResult<()> {
    if pedido.estado.is_final() {
        return Err(CoreError::OrderLocked {
            id_pedido: pedido.id_pedido,
            estado: pedido.estado,
        });
    }
    Ok(())
}

/// Fails when `next` ranks below the current state.
pub fn check_transition(pedido: &Pedido, next: EstadoPedido) -> CoreResult<()> {
    if !pedido.estado.can_advance_to(next) {
        return Err(CoreError::BackwardTransition {
            id_pedido: pedido.id_pedido,
            from: pedido.estado,
            to: next,
        });
    }
    Ok(())
}

/// Fails when the product is switched off.
pub fn ensure_available(producto: &Producto) -> CoreResult<()> {
    if !producto.disponibilidad {
        return Err(CoreError::ProductUnavailable {
            id_producto: producto.id_producto,
        });
    }
    Ok(())
}

/// Fails when a referenced row lives in another branch than the order.
pub fn ensure_same_sucursal(
    field: &str,
    pedido: &Pedido,
    found: &str,
) -> Result<(), ValidationError> {
    if pedido.id_sucursal != found {
        return Err(ValidationError::WrongSucursal {
            field: field.to_string(),
            expected: pedido.id_sucursal.clone(),
            found: found.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pedido(estado: EstadoPedido) -> Pedido {
        Pedido {
            id_pedido: 7,
            id_sucursal: "centro".to_string(),
            id_mesa: Some(1),
            id_tipo_pago: None,
            nombre: None,
            estado,
            total_pedido_cents: 0,
            fecha_pedido: Utc::now(),
            actualizado_en: Utc::now(),
            version: 0,
        }
    }

    fn linea(id: i64, precio: i64, cantidad: i64) -> DetallePedido {
        DetallePedido {
            id_detalle_pedido: id,
            id_pedido: 7,
            id_producto: id,
            cantidad,
            precio_unitario_cents: precio,
            precio_total_cents: precio * cantidad,
            descripcion: None,
            hora_detalle: Utc::now(),
        }
    }

    #[test]
    fn test_order_total_is_sum_of_lines() {
        let lines = vec![linea(1, 1250, 2), linea(2, 400, 1)];
        assert_eq!(order_total(&lines).unwrap().cents(), 2900);
        assert_eq!(order_total(Vec::<DetallePedido>::new().iter()).unwrap().cents(), 0);
    }

    #[test]
    fn test_order_total_rejects_overflow() {
        let precio = i64::MAX / 999;
        let lines = vec![linea(1, precio, 999), linea(2, precio, 999)];
        let err = order_total(&lines).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_line_total_rejects_bad_quantity() {
        assert!(line_total(Money::from_cents(100), 0).is_err());
        assert_eq!(line_total(Money::from_cents(0), 3).unwrap(), Money::zero());
    }

    #[test]
    fn test_paid_order_is_locked() {
        assert!(ensure_lines_mutable(&pedido(EstadoPedido::Listo)).is_ok());
        let err = ensure_lines_mutable(&pedido(EstadoPedido::Pagado)).unwrap_err();
        assert!(matches!(err, CoreError::OrderLocked { id_pedido: 7, .. }));
    }

    #[test]
    fn test_transition_rank() {
        let p = pedido(EstadoPedido::Comandado);
        assert!(check_transition(&p, EstadoPedido::Comandado).is_ok());
        assert!(check_transition(&p, EstadoPedido::Pagado).is_ok());
        assert!(matches!(
            check_transition(&p, EstadoPedido::Ordenado),
            Err(CoreError::BackwardTransition { .. })
        ));
    }

    #[test]
    fn test_cross_sucursal_reference() {
        let p = pedido(EstadoPedido::Ordenado);
        assert!(ensure_same_sucursal("id_producto", &p, "centro").is_ok());
        assert!(matches!(
            ensure_same_sucursal("id_producto", &p, "norte"),
            Err(ValidationError::WrongSucursal { .. })
        ));
    }
}
