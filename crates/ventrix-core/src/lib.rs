//! # ventrix-core: Pure Domain Logic for VenTrix
//!
//! Entities, closed enums, money, partial updates and order rules for the
//! VenTrix restaurant backend. Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        VenTrix Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           HTTP / UI layer (outside this workspace)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ request records                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    ventrix-db                                   │   │
//! │  │   repositories • OrderAggregator • LifecycleManager • reports   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ventrix-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌────────┐ ┌────────┐ ┌─────────┐ ┌───────────┐  │   │
//! │  │   │ types   │ │ money  │ │ patch  │ │ records │ │  order    │  │   │
//! │  │   │ Pedido  │ │ Money  │ │Patch<T>│ │ Nuevo*  │ │ totals,   │  │   │
//! │  │   │ Mesa .. │ │        │ │        │ │ *Update │ │ state     │  │   │
//! │  │   └─────────┘ └────────┘ └────────┘ └─────────┘ └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities, closed enums and nested read models
//! - [`money`] - Money type with integer arithmetic
//! - [`patch`] - Three-state field for partial updates
//! - [`records`] - Inbound create/update/filter records
//! - [`order`] - Order totals and state rules
//! - [`error`] - Domain error types and the error taxonomy
//! - [`validation`] - Field validation
//!
//! ## Example Usage
//!
//! ```rust
//! use ventrix_core::{order, EstadoPedido, Money};
//!
//! let linea = order::line_total(Money::from_cents(1250), 2).unwrap();
//! assert_eq!(linea.to_string(), "$25.00");
//!
//! assert!(EstadoPedido::Ordenado.can_advance_to(EstadoPedido::Comandado));
//! assert!(!EstadoPedido::Pagado.can_advance_to(EstadoPedido::Listo));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod order;
pub mod patch;
pub mod records;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use patch::Patch;
pub use records::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single order line.
///
/// ## Business Reason
/// Catches typos like 100 instead of 10 at the table.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Largest accepted image upload (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted image extensions, lower case.
pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
