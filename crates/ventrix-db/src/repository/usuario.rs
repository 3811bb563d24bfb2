//! # Usuario Repository
//!
//! User accounts. Passwords are hashed with argon2 before they reach the
//! database and the hash never leaves this module.
//!
//! ## Login Flow
//! ```text
//! verify_credentials(correo, password)
//!      │
//!      ├── no user with that correo      → Ok(None)
//!      ├── argon2 verify fails           → Ok(None)
//!      ├── estado = INACTIVO             → Ok(None)
//!      └── otherwise                     → Ok(Some(Usuario))
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{require_sucursal, row_exists, UpdateBuilder};
use ventrix_core::{Estado, NuevoUsuario, Patch, Usuario, UsuarioFilter, UsuarioUpdate};

const SELECT_USUARIO: &str = "SELECT documento, nombre, correo, rol, estado, id_sucursal, fecha_creacion FROM usuarios";

/// Row used only for credential checks.
#[derive(sqlx::FromRow)]
struct UsuarioConHash {
    #[sqlx(flatten)]
    usuario: Usuario,
    password_hash: String,
}

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UsuarioRepository {
    pool: SqlitePool,
}

impl UsuarioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UsuarioRepository { pool }
    }

    /// Creates a user.
    ///
    /// ## Errors
    /// - `UniqueViolation` on a repeated documento or correo
    /// - `NotFound` when `id_sucursal` names a missing branch
    pub async fn create(&self, nuevo: NuevoUsuario) -> DbResult<Usuario> {
        nuevo.validate()?;
        let password_hash = hash_password(&nuevo.password)?;

        let mut tx = self.pool.begin().await?;

        if row_exists(&mut tx, "SELECT 1 FROM usuarios WHERE documento = ?", nuevo.documento.as_str()).await? {
            return Err(DbError::duplicate("documento", &nuevo.documento));
        }
        ensure_correo_free(&mut tx, &nuevo.correo, None).await?;
        if let Some(id_sucursal) = &nuevo.id_sucursal {
            require_sucursal(&mut tx, id_sucursal).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO usuarios (documento, nombre, correo, password_hash, rol, estado, id_sucursal, fecha_creacion)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&nuevo.documento)
        .bind(&nuevo.nombre)
        .bind(&nuevo.correo)
        .bind(&password_hash)
        .bind(nuevo.rol)
        .bind(nuevo.estado)
        .bind(&nuevo.id_sucursal)
        .bind(Utc::now().date_naive())
        .execute(&mut *tx)
        .await?;

        let usuario = fetch(&mut tx, &nuevo.documento)
            .await?
            .ok_or_else(|| DbError::not_found("Usuario", &nuevo.documento))?;
        tx.commit().await?;

        info!(documento = %usuario.documento, rol = %usuario.rol, "Usuario created");
        Ok(usuario)
    }

    /// Gets a user by documento.
    pub async fn get(&self, documento: &str) -> DbResult<Option<Usuario>> {
        debug!(documento = %documento, "Getting usuario");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, documento).await
    }

    /// Gets a user by email.
    pub async fn find_by_correo(&self, correo: &str) -> DbResult<Option<Usuario>> {
        let sql = format!("{} WHERE correo = ?", SELECT_USUARIO);
        let usuario = sqlx::query_as::<_, Usuario>(&sql)
            .bind(correo)
            .fetch_optional(&self.pool)
            .await?;
        Ok(usuario)
    }

    /// Lists users, optionally narrowed by rol, estado and branch.
    pub async fn list(&self, filter: &UsuarioFilter) -> DbResult<Vec<Usuario>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_USUARIO);
        query.push(" WHERE 1 = 1");
        if let Some(rol) = filter.rol {
            query.push(" AND rol = ").push_bind(rol);
        }
        if let Some(estado) = filter.estado {
            query.push(" AND estado = ").push_bind(estado);
        }
        if let Some(id_sucursal) = &filter.id_sucursal {
            query.push(" AND id_sucursal = ").push_bind(id_sucursal.clone());
        }
        query.push(" ORDER BY nombre, documento");

        let usuarios = query
            .build_query_as::<Usuario>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = usuarios.len(), "Listed usuarios");
        Ok(usuarios)
    }

    /// Applies a partial update. A new password is re-hashed.
    pub async fn update(&self, documento: &str, update: UsuarioUpdate) -> DbResult<Usuario> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, documento).await?.is_none() {
            return Err(DbError::not_found("Usuario", documento));
        }
        if let Patch::Value(correo) = &update.correo {
            ensure_correo_free(&mut tx, correo, Some(documento)).await?;
        }
        if let Patch::Value(id_sucursal) = &update.id_sucursal {
            require_sucursal(&mut tx, id_sucursal).await?;
        }

        let mut builder = UpdateBuilder::new("usuarios");
        builder
            .patch("nombre", update.nombre)
            .patch("correo", update.correo)
            .patch("rol", update.rol)
            .patch("estado", update.estado)
            .patch("id_sucursal", update.id_sucursal);
        if let Patch::Value(password) = &update.password {
            builder.set("password_hash", hash_password(password)?);
        }
        builder
            .execute(&mut tx, "documento", documento.to_string())
            .await?;

        let usuario = fetch(&mut tx, documento)
            .await?
            .ok_or_else(|| DbError::not_found("Usuario", documento))?;
        tx.commit().await?;

        debug!(documento = %documento, "Usuario updated");
        Ok(usuario)
    }

    /// Deletes a user.
    ///
    /// ## Errors
    /// - `InUse` while the user owns a restaurant
    pub async fn delete(&self, documento: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        if fetch(&mut tx, documento).await?.is_none() {
            return Err(DbError::not_found("Usuario", documento));
        }
        if row_exists(&mut tx, "SELECT 1 FROM restaurantes WHERE id_usuario = ?", documento).await? {
            return Err(DbError::in_use("Usuario", documento, "restaurantes"));
        }

        sqlx::query("DELETE FROM usuarios WHERE documento = ?")
            .bind(documento)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(documento = %documento, "Usuario deleted");
        Ok(())
    }

    /// Checks a login attempt.
    ///
    /// Returns the user only when the password matches and the account is
    /// ACTIVO. A wrong password and an unknown correo look the same.
    pub async fn verify_credentials(&self, correo: &str, password: &str) -> DbResult<Option<Usuario>> {
        let row = sqlx::query_as::<_, UsuarioConHash>(
            "SELECT documento, nombre, correo, rol, estado, id_sucursal, fecha_creacion, password_hash \
             FROM usuarios WHERE correo = ?",
        )
        .bind(correo)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("Login rejected: unknown correo");
            return Ok(None);
        };

        if !verify_password(password, &row.password_hash) {
            debug!(documento = %row.usuario.documento, "Login rejected: bad password");
            return Ok(None);
        }
        if row.usuario.estado != Estado::Activo {
            debug!(documento = %row.usuario.documento, "Login rejected: inactive account");
            return Ok(None);
        }

        Ok(Some(row.usuario))
    }
}

async fn fetch(conn: &mut SqliteConnection, documento: &str) -> DbResult<Option<Usuario>> {
    let sql = format!("{} WHERE documento = ?", SELECT_USUARIO);
    let usuario = sqlx::query_as::<_, Usuario>(&sql)
        .bind(documento)
        .fetch_optional(conn)
        .await?;
    Ok(usuario)
}

async fn ensure_correo_free(
    conn: &mut SqliteConnection,
    correo: &str,
    except_documento: Option<&str>,
) -> DbResult<()> {
    let owner: Option<String> = sqlx::query_scalar("SELECT documento FROM usuarios WHERE correo = ?")
        .bind(correo)
        .fetch_optional(conn)
        .await?;
    match owner {
        Some(doc) if Some(doc.as_str()) != except_documento => Err(DbError::duplicate("correo", correo)),
        _ => Ok(()),
    }
}

/// Hashes a password for storage.
fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
