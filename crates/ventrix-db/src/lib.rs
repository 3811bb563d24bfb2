//! # ventrix-db: Persistence Layer for VenTrix
//!
//! SQLite storage for the multi-tenant restaurant backend: entity CRUD,
//! the order aggregator, image-aware entity lifecycle and sales reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        VenTrix Data Flow                                │
//! │                                                                         │
//! │  HTTP handler / CLI                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   ventrix-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌───────────────┐  ┌─────────────────────┐ │   │
//! │  │   │  Database    │  │ Repositories  │  │ OrderAggregator     │ │   │
//! │  │   │  (pool.rs)   │◄─│ usuario ...   │  │ lines, totals,      │ │   │
//! │  │   │              │  │ producto      │  │ state machine       │ │   │
//! │  │   │ SqlitePool   │  │ pedido (read) │  └─────────────────────┘ │   │
//! │  │   └──────────────┘  └───────────────┘  ┌─────────────────────┐ │   │
//! │  │                                        │ LifecycleManager    │ │   │
//! │  │   ┌──────────────┐  ┌───────────────┐  │ rows + BlobStore    │ │   │
//! │  │   │ Migrations   │  │ Reports       │  └─────────────────────┘ │   │
//! │  │   │ (embedded)   │  │ top, daily    │                          │   │
//! │  │   └──────────────┘  └───────────────┘                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  SQLite (WAL, foreign keys)          image directory / memory          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`pool`] - Connection pool creation and repository access
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-entity CRUD
//! - [`aggregator`] - Order and order-line mutations
//! - [`lifecycle`] - Entity writes that carry images
//! - [`blob`] - Image storage backends
//! - [`reports`] - Sales aggregates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ventrix_db::{AppConfig, Database, DbConfig};
//!
//! let config = AppConfig::from_env()?;
//! let db = Database::new(DbConfig::from_app_config(&config)).await?;
//!
//! let pedido = db.orders().create_order(nuevo).await?;
//! db.orders().add_line(pedido.id_pedido, NuevaLinea::new(id_producto, 2)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregator;
pub mod blob;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod migrations;
pub mod pool;
pub mod reports;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregator::OrderAggregator;
pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use lifecycle::LifecycleManager;
pub use pool::{Database, DbConfig};
pub use reports::ReportRepository;

// Repository re-exports for convenience
pub use repository::{
    CategoriaRepository, MesaRepository, PedidoRepository, ProductoRepository, RestauranteRepository,
    SucursalRepository, TipoPagoRepository, UsuarioRepository,
};
