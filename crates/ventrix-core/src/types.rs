//! # Domain Types
//!
//! Entities, closed enums and nested read models used throughout VenTrix.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │   Usuario ──owns 0..1──► Restaurante ──has many──► Sucursal            │
//! │                                                       │                 │
//! │        ┌──────────────┬──────────────┬───────────────┼────────────┐    │
//! │        ▼              ▼              ▼               ▼            ▼    │
//! │      Mesa         Categoria      Producto        TipoPago      Pedido  │
//! │        │              │              │               │            │    │
//! │        │              └──────►───────┘               │            │    │
//! │        └──────────────── 0..1 ──────►────────────────┴─ 0..1 ─────┤    │
//! │                                      │                            │    │
//! │                                      └────◄──── DetallePedido ◄───┘    │
//! │                                                 (owned by Pedido)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Closed Enums
//! Every enum here has a fixed set of SCREAMING_SNAKE_CASE values. The same
//! spelling is used in JSON (serde), in SQLite (sqlx) and by `FromStr`.
//! Unknown values are rejected at the boundary rather than stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Closed Enum Helper
// =============================================================================

/// Declares a closed enum with matching serde, sqlx, Display and FromStr
/// spellings. `$text` must equal the SCREAMING_SNAKE_CASE form of the variant.
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[ts(export)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire spelling of the value.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: Self::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Enums
// =============================================================================

closed_enum! {
    /// Role of a user account.
    pub enum RolUsuario ("rol") {
        /// Restaurant owner.
        Administrador => "ADMINISTRADOR",
        Cajero => "CAJERO",
        Mesero => "MESERO",
        Cocina => "COCINA",
        /// Manager of a single branch.
        AdministradorSucursal => "ADMINISTRADOR_SUCURSAL",
    }
}

closed_enum! {
    /// Active flag shared by Usuario, Restaurante and Sucursal.
    pub enum Estado ("estado") {
        Activo => "ACTIVO",
        Inactivo => "INACTIVO",
    }
}

impl Default for Estado {
    fn default() -> Self {
        Estado::Activo
    }
}

closed_enum! {
    /// Kind of table: a physical table in the room, or a quick counter/takeaway slot.
    pub enum EstadoMesa ("estado") {
        Fisica => "FISICA",
        Rapida => "RAPIDA",
    }
}

closed_enum! {
    /// Order lifecycle state.
    ///
    /// ## State Machine
    /// ```text
    /// ORDENADO ──► COMANDADO ──► LISTO ──► PAGADO
    ///  (open)     (sent to       (ready)    (closed,
    ///              kitchen)                  immutable)
    /// ```
    /// Moves only forward. Staying in the same state is allowed.
    pub enum EstadoPedido ("estado") {
        Ordenado => "ORDENADO",
        Comandado => "COMANDADO",
        Listo => "LISTO",
        Pagado => "PAGADO",
    }
}

impl EstadoPedido {
    /// Position in the forward-only ordering.
    pub const fn rank(&self) -> u8 {
        match self {
            EstadoPedido::Ordenado => 0,
            EstadoPedido::Comandado => 1,
            EstadoPedido::Listo => 2,
            EstadoPedido::Pagado => 3,
        }
    }

    /// Whether `next` is the same state or a later one.
    pub const fn can_advance_to(&self, next: EstadoPedido) -> bool {
        next.rank() >= self.rank()
    }

    /// Paid orders accept no further changes.
    pub const fn is_final(&self) -> bool {
        matches!(self, EstadoPedido::Pagado)
    }
}

impl Default for EstadoPedido {
    fn default() -> Self {
        EstadoPedido::Ordenado
    }
}

// =============================================================================
// Usuario
// =============================================================================

/// A user account. The password hash is never part of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Usuario {
    /// National id document, primary key.
    pub documento: String,
    pub nombre: String,
    pub correo: String,
    pub rol: RolUsuario,
    pub estado: Estado,
    /// Branch a staff member works at.
    pub id_sucursal: Option<String>,
    #[ts(as = "String")]
    pub fecha_creacion: NaiveDate,
}

// =============================================================================
// Restaurante
// =============================================================================

/// A restaurant (tenant root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Restaurante {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub telefono: String,
    pub direccion: String,
    pub correo: String,
    /// Blob URI of the logo.
    pub imagen: Option<String>,
    #[ts(as = "String")]
    pub fecha_creacion: NaiveDate,
    #[ts(as = "Option<String>")]
    pub fecha_finalizacion: Option<NaiveDate>,
    pub estado: Estado,
    /// Owner (Usuario.documento). A user owns at most one restaurant.
    pub id_usuario: String,
}

// =============================================================================
// Sucursal
// =============================================================================

/// A branch of a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sucursal {
    pub id: String,
    pub nombre: String,
    pub direccion: String,
    pub ciudad: String,
    pub telefono: String,
    #[ts(as = "String")]
    pub fecha_apertura: NaiveDate,
    pub estado: Estado,
    /// Documento of the managing Usuario.
    pub administrador: Option<String>,
    pub id_restaurante: String,
}

// =============================================================================
// Mesa / Categoria / TipoPago
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Mesa {
    pub id: i64,
    pub nombre: String,
    pub estado: EstadoMesa,
    pub id_sucursal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Categoria {
    pub id: i64,
    pub nombre: String,
    pub id_sucursal: String,
}

/// A payment type offered by a branch. The id is chosen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TipoPago {
    pub id: i64,
    pub descripcion: String,
    pub id_sucursal: String,
}

// =============================================================================
// Producto
// =============================================================================

/// A menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Producto {
    pub id_producto: i64,
    /// Unique within its sucursal.
    pub nombre: String,
    /// Current price in cents. Order lines snapshot this value.
    pub precio_cents: i64,
    pub imagen: Option<String>,
    /// `false` hides the product from new order lines.
    pub disponibilidad: bool,
    pub id_sucursal: String,
    pub id_categoria: i64,
}

impl Producto {
    /// Returns the price as Money.
    #[inline]
    pub fn precio(&self) -> Money {
        Money::from_cents(self.precio_cents)
    }
}

// =============================================================================
// Pedido
// =============================================================================

/// An order.
///
/// `total_pedido_cents` is derived: it always equals the sum of
/// `precio_total_cents` over the order's lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Pedido {
    pub id_pedido: i64,
    pub id_sucursal: String,
    pub id_mesa: Option<i64>,
    pub id_tipo_pago: Option<i64>,
    /// Customer label, used for quick tables.
    pub nombre: Option<String>,
    pub estado: EstadoPedido,
    pub total_pedido_cents: i64,
    #[ts(as = "String")]
    pub fecha_pedido: DateTime<Utc>,
    #[ts(as = "String")]
    pub actualizado_en: DateTime<Utc>,
    /// Bumped by every write to the order or its lines.
    pub version: i64,
}

impl Pedido {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_pedido_cents)
    }
}

// =============================================================================
// DetallePedido
// =============================================================================

/// An order line. Uses the snapshot pattern: the unit price is frozen when
/// the line is created, later price changes on the product don't touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DetallePedido {
    pub id_detalle_pedido: i64,
    pub id_pedido: i64,
    pub id_producto: i64,
    pub cantidad: i64,
    /// Product price at time of insertion (frozen).
    pub precio_unitario_cents: i64,
    /// cantidad × precio_unitario_cents.
    pub precio_total_cents: i64,
    /// Kitchen note ("sin cebolla").
    pub descripcion: Option<String>,
    #[ts(as = "String")]
    pub hora_detalle: DateTime<Utc>,
}

impl DetallePedido {
    #[inline]
    pub fn precio_unitario(&self) -> Money {
        Money::from_cents(self.precio_unitario_cents)
    }

    #[inline]
    pub fn precio_total(&self) -> Money {
        Money::from_cents(self.precio_total_cents)
    }
}

// =============================================================================
// Nested Read Models
// =============================================================================

/// A restaurant together with its branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RestauranteConSucursales {
    pub restaurante: Restaurante,
    pub sucursales: Vec<Sucursal>,
}

/// An order together with its lines, oldest line first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PedidoConDetalle {
    pub pedido: Pedido,
    pub detalle: Vec<DetallePedido>,
}

// =============================================================================
// Report Rows
// =============================================================================

/// Best-selling product of a branch, over paid orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductoVendido {
    pub id_producto: i64,
    pub nombre: String,
    pub categoria: String,
    pub cantidad_total: i64,
    pub ingresos_cents: i64,
}

/// Paid orders and revenue of a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct VentaDiaria {
    #[ts(as = "String")]
    pub fecha: NaiveDate,
    pub pedidos: i64,
    pub ingresos_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estado_pedido_ranks_forward() {
        use EstadoPedido::*;
        assert!(Ordenado.can_advance_to(Comandado));
        assert!(Comandado.can_advance_to(Pagado));
        assert!(Comandado.can_advance_to(Comandado));
        assert!(!Comandado.can_advance_to(Ordenado));
        assert!(!Pagado.can_advance_to(Listo));
        assert!(Pagado.is_final());
        assert!(!Listo.is_final());
    }

    #[test]
    fn test_closed_enum_spellings_agree() {
        for rol in RolUsuario::ALL {
            let json = serde_json::to_string(rol).unwrap();
            assert_eq!(json, format!("\"{}\"", rol.as_str()));
            assert_eq!(rol.as_str().parse::<RolUsuario>().unwrap(), *rol);
        }
        assert_eq!(
            RolUsuario::AdministradorSucursal.to_string(),
            "ADMINISTRADOR_SUCURSAL"
        );
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let err = "CANCELADO".parse::<EstadoPedido>().unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { ref field, .. } if field == "estado"));

        assert!(serde_json::from_str::<EstadoMesa>("\"VIRTUAL\"").is_err());
        assert!(serde_json::from_str::<Estado>("\"activo\"").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(EstadoPedido::default(), EstadoPedido::Ordenado);
        assert_eq!(Estado::default(), Estado::Activo);
    }
}
