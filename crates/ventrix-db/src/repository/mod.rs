//! # Repository Module
//!
//! Durable CRUD for every VenTrix entity.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Contract                                  │
//! │                                                                         │
//! │  caller                                                                 │
//! │       │  db.productos().create(NuevoProducto { .. })                   │
//! │       ▼                                                                 │
//! │  ProductoRepository                                                    │
//! │  ├── create(record)        → Conflict | NotFound | Validation          │
//! │  ├── get(id)               → Option<Producto>                          │
//! │  ├── list(filter)          → Vec<Producto>                             │
//! │  ├── update(id, partial)   → NotFound | Conflict | Validation          │
//! │  └── delete(id)            → NotFound | Conflict                       │
//! │       │                                                                 │
//! │       │  one transaction per mutation                                  │
//! │       ▼                                                                 │
//! │  SQLite (foreign_keys = ON)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations check parents and uniqueness inside their transaction before
//! writing, so the caller gets a precise `NotFound`/`UniqueViolation`
//! instead of a bare constraint failure. The schema constraints stay as the
//! last line.
//!
//! Insert/delete steps that the lifecycle manager composes into its own
//! transactions are exposed as `pub(crate)` functions taking a connection.
//!
//! ## Available Repositories
//!
//! - [`UsuarioRepository`] - Accounts and credential checks
//! - [`RestauranteRepository`] - Restaurants, nested with branches
//! - [`SucursalRepository`] - Branches
//! - [`MesaRepository`] - Tables
//! - [`CategoriaRepository`] - Menu categories
//! - [`ProductoRepository`] - Menu items
//! - [`TipoPagoRepository`] - Payment types
//! - [`PedidoRepository`] - Order reads (writes go through the aggregator)

pub mod categoria;
pub mod mesa;
pub mod pedido;
pub mod producto;
pub mod restaurante;
pub mod sucursal;
pub mod tipo_pago;
pub mod usuario;

pub use categoria::CategoriaRepository;
pub use mesa::MesaRepository;
pub use pedido::PedidoRepository;
pub use producto::ProductoRepository;
pub use restaurante::RestauranteRepository;
pub use sucursal::SucursalRepository;
pub use tipo_pago::TipoPagoRepository;
pub use usuario::UsuarioRepository;

use sqlx::{Encode, QueryBuilder, Sqlite, SqliteConnection, Type};
use ventrix_core::Patch;

use crate::error::{DbError, DbResult};

// =============================================================================
// Partial Update Builder
// =============================================================================

/// Builds `UPDATE <table> SET ... WHERE <key> = ?` from [`Patch`] fields.
///
/// ```text
/// ProductoUpdate { nombre: Value("Tinto"), precio_cents: Unset, .. }
///      │
///      ▼
/// UPDATE productos SET nombre = ? WHERE id_producto = ?
/// ```
pub(crate) struct UpdateBuilder<'a> {
    builder: QueryBuilder<'a, Sqlite>,
    assigned: usize,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(table: &str) -> Self {
        UpdateBuilder {
            builder: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            assigned: 0,
        }
    }

    fn column(&mut self, column: &str) {
        if self.assigned > 0 {
            self.builder.push(", ");
        }
        self.builder.push(column).push(" = ");
        self.assigned += 1;
    }

    /// Assigns a value unconditionally.
    pub(crate) fn set<T>(&mut self, column: &str, value: T) -> &mut Self
    where
        T: 'a + Encode<'a, Sqlite> + Type<Sqlite>,
    {
        self.column(column);
        self.builder.push_bind(value);
        self
    }

    /// Applies one patch field: unset is skipped, null writes NULL.
    pub(crate) fn patch<T>(&mut self, column: &str, patch: Patch<T>) -> &mut Self
    where
        T: 'a + Encode<'a, Sqlite> + Type<Sqlite>,
    {
        match patch {
            Patch::Unset => {}
            Patch::Null => {
                self.column(column);
                self.builder.push("NULL");
            }
            Patch::Value(value) => {
                self.set(column, value);
            }
        }
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Runs the update against one row. Returns the number of rows touched.
    pub(crate) async fn execute<K>(
        mut self,
        conn: &mut SqliteConnection,
        key_column: &str,
        key: K,
    ) -> DbResult<u64>
    where
        K: 'a + Encode<'a, Sqlite> + Type<Sqlite>,
    {
        if self.is_empty() {
            return Ok(0);
        }
        self.builder.push(" WHERE ").push(key_column).push(" = ");
        self.builder.push_bind(key);
        let result = self.builder.build().execute(conn).await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Existence Checks
// =============================================================================

/// Runs a `SELECT 1 ... WHERE key = ?` probe.
pub(crate) async fn row_exists<'q, T>(
    conn: &mut SqliteConnection,
    sql: &'q str,
    key: T,
) -> DbResult<bool>
where
    T: 'q + Send + Encode<'q, Sqlite> + Type<Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar(sql)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn require_sucursal(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    if !row_exists(conn, "SELECT 1 FROM sucursales WHERE id = ?", id).await? {
        return Err(DbError::not_found("Sucursal", id));
    }
    Ok(())
}

pub(crate) async fn require_usuario(conn: &mut SqliteConnection, documento: &str) -> DbResult<()> {
    if !row_exists(conn, "SELECT 1 FROM usuarios WHERE documento = ?", documento).await? {
        return Err(DbError::not_found("Usuario", documento));
    }
    Ok(())
}

/// Returns the sucursal a row belongs to, `None` when the row is absent.
pub(crate) async fn sucursal_of(
    conn: &mut SqliteConnection,
    sql: &str,
    id: i64,
) -> DbResult<Option<String>> {
    let found: Option<String> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found)
}

/// Checks that a `(id_sucursal, nombre)` pair is free, ignoring `except_id`.
pub(crate) async fn ensure_name_free(
    conn: &mut SqliteConnection,
    table: &str,
    key_column: &str,
    id_sucursal: &str,
    nombre: &str,
    except_id: Option<i64>,
) -> DbResult<()> {
    let sql = format!(
        "SELECT {key} FROM {table} WHERE id_sucursal = ? AND nombre = ?",
        key = key_column,
        table = table
    );
    let existing: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id_sucursal)
        .bind(nombre)
        .fetch_optional(conn)
        .await?;

    match existing {
        Some(id) if Some(id) != except_id => Err(DbError::duplicate("nombre", nombre)),
        _ => Ok(()),
    }
}
