//! # Request Records
//!
//! Inbound data-transfer records: one `Nuevo*` record per entity for
//! creation, one `*Update` record of [`Patch`] fields for partial updates,
//! and one `*Filter` record for listing.
//!
//! ```text
//! caller JSON ──serde──► NuevoProducto ──validate()──► ProductoRepository::create
//!                        ProductoUpdate ──validate()──► ProductoRepository::update
//!                        ProductoFilter ─────────────► ProductoRepository::list
//! ```
//!
//! `validate()` checks everything that can be checked without the
//! database. Existence and uniqueness are the repository's job.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::patch::Patch;
use crate::types::{Estado, EstadoMesa, EstadoPedido, RolUsuario};
use crate::validation::{
    validate_cantidad, validate_correo, validate_documento, validate_id, validate_image,
    validate_optional_text, validate_password, validate_precio_cents, validate_telefono,
    validate_text, validate_text_id, ValidationResult,
};

/// Column length limits shared with the schema.
pub mod limits {
    pub const NOMBRE: usize = 100;
    pub const DESCRIPCION: usize = 200;
    pub const DIRECCION: usize = 200;
    pub const CIUDAD: usize = 100;
    pub const ID: usize = 100;
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Usuario
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevoUsuario {
    pub documento: String,
    pub nombre: String,
    pub correo: String,
    /// Plaintext, hashed before storage.
    pub password: String,
    pub rol: RolUsuario,
    #[serde(default)]
    pub estado: Estado,
    #[serde(default)]
    pub id_sucursal: Option<String>,
}

impl NuevoUsuario {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_documento(&self.documento)?;
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_correo(&self.correo)?;
        validate_password(&self.password)?;
        validate_optional_text("id_sucursal", self.id_sucursal.as_deref(), limits::ID)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsuarioUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub correo: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub password: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub rol: Patch<RolUsuario>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub estado: Patch<Estado>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub id_sucursal: Patch<String>,
}

impl UsuarioUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        if let Some(correo) = self.correo.as_ref().require("correo")? {
            validate_correo(correo)?;
        }
        if let Some(password) = self.password.as_ref().require("password")? {
            validate_password(password)?;
        }
        self.rol.as_ref().require("rol")?;
        self.estado.as_ref().require("estado")?;
        if let Patch::Value(id) = &self.id_sucursal {
            validate_text("id_sucursal", id, limits::ID)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsuarioFilter {
    pub rol: Option<RolUsuario>,
    pub estado: Option<Estado>,
    pub id_sucursal: Option<String>,
}

/// Login attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct Credenciales {
    pub correo: String,
    pub password: String,
}

// =============================================================================
// Restaurante
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevoRestaurante {
    /// Generated (UUID v4) when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub telefono: String,
    pub direccion: String,
    pub correo: String,
    #[serde(default)]
    pub fecha_finalizacion: Option<NaiveDate>,
    #[serde(default)]
    pub estado: Estado,
    pub id_usuario: String,
}

impl NuevoRestaurante {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(id) = &self.id {
            validate_text_id("id", id, limits::ID)?;
        }
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_optional_text("descripcion", self.descripcion.as_deref(), limits::DESCRIPCION)?;
        validate_telefono(&self.telefono)?;
        validate_text("direccion", &self.direccion, limits::DIRECCION)?;
        validate_correo(&self.correo)?;
        validate_documento(&self.id_usuario)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RestauranteUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub descripcion: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub telefono: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub direccion: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub correo: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub fecha_finalizacion: Patch<NaiveDate>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub estado: Patch<Estado>,
}

impl RestauranteUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        if let Patch::Value(descripcion) = &self.descripcion {
            validate_optional_text("descripcion", Some(descripcion), limits::DESCRIPCION)?;
        }
        if let Some(telefono) = self.telefono.as_ref().require("telefono")? {
            validate_telefono(telefono)?;
        }
        if let Some(direccion) = self.direccion.as_ref().require("direccion")? {
            validate_text("direccion", direccion, limits::DIRECCION)?;
        }
        if let Some(correo) = self.correo.as_ref().require("correo")? {
            validate_correo(correo)?;
        }
        self.estado.as_ref().require("estado")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RestauranteFilter {
    pub estado: Option<Estado>,
}

// =============================================================================
// Sucursal
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevaSucursal {
    /// Generated (UUID v4) when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub nombre: String,
    pub direccion: String,
    pub ciudad: String,
    pub telefono: String,
    /// Today when absent.
    #[serde(default)]
    pub fecha_apertura: Option<NaiveDate>,
    #[serde(default)]
    pub estado: Estado,
    #[serde(default)]
    pub administrador: Option<String>,
    pub id_restaurante: String,
}

impl NuevaSucursal {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(id) = &self.id {
            validate_text_id("id", id, limits::ID)?;
        }
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_text("direccion", &self.direccion, limits::DIRECCION)?;
        validate_text("ciudad", &self.ciudad, limits::CIUDAD)?;
        validate_telefono(&self.telefono)?;
        if let Some(administrador) = &self.administrador {
            validate_documento(administrador)?;
        }
        validate_text("id_restaurante", &self.id_restaurante, limits::ID)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SucursalUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub direccion: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub ciudad: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub telefono: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub fecha_apertura: Patch<NaiveDate>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub estado: Patch<Estado>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub administrador: Patch<String>,
}

impl SucursalUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        if let Some(direccion) = self.direccion.as_ref().require("direccion")? {
            validate_text("direccion", direccion, limits::DIRECCION)?;
        }
        if let Some(ciudad) = self.ciudad.as_ref().require("ciudad")? {
            validate_text("ciudad", ciudad, limits::CIUDAD)?;
        }
        if let Some(telefono) = self.telefono.as_ref().require("telefono")? {
            validate_telefono(telefono)?;
        }
        self.fecha_apertura.as_ref().require("fecha_apertura")?;
        self.estado.as_ref().require("estado")?;
        if let Patch::Value(administrador) = &self.administrador {
            validate_documento(administrador)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SucursalFilter {
    pub id_restaurante: Option<String>,
    pub estado: Option<Estado>,
}

// =============================================================================
// Mesa
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevaMesa {
    pub nombre: String,
    pub estado: EstadoMesa,
    pub id_sucursal: String,
}

impl NuevaMesa {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_text("id_sucursal", &self.id_sucursal, limits::ID)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MesaUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub estado: Patch<EstadoMesa>,
}

impl MesaUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        self.estado.as_ref().require("estado")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MesaFilter {
    pub id_sucursal: Option<String>,
    pub estado: Option<EstadoMesa>,
}

// =============================================================================
// Categoria
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevaCategoria {
    pub nombre: String,
    pub id_sucursal: String,
}

impl NuevaCategoria {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_text("id_sucursal", &self.id_sucursal, limits::ID)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CategoriaUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
}

impl CategoriaUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CategoriaFilter {
    pub id_sucursal: Option<String>,
}

// =============================================================================
// Producto
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevoProducto {
    pub nombre: String,
    pub precio_cents: i64,
    #[serde(default = "default_true")]
    pub disponibilidad: bool,
    pub id_sucursal: String,
    pub id_categoria: i64,
}

impl NuevoProducto {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_text("nombre", &self.nombre, limits::NOMBRE)?;
        validate_precio_cents(self.precio_cents)?;
        validate_text("id_sucursal", &self.id_sucursal, limits::ID)?;
        validate_id("id_categoria", self.id_categoria)
    }
}

/// Partial update of a product. The image is replaced through the
/// lifecycle manager, not here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductoUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub precio_cents: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub disponibilidad: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub id_categoria: Patch<i64>,
}

impl ProductoUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(nombre) = self.nombre.as_ref().require("nombre")? {
            validate_text("nombre", nombre, limits::NOMBRE)?;
        }
        if let Some(precio) = self.precio_cents.as_ref().require("precio_cents")? {
            validate_precio_cents(*precio)?;
        }
        self.disponibilidad.as_ref().require("disponibilidad")?;
        if let Some(id) = self.id_categoria.as_ref().require("id_categoria")? {
            validate_id("id_categoria", *id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductoFilter {
    pub id_sucursal: Option<String>,
    pub id_categoria: Option<i64>,
    pub disponibilidad: Option<bool>,
}

// =============================================================================
// TipoPago
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevoTipoPago {
    /// Caller-chosen id, unique across all branches.
    pub id: i64,
    pub descripcion: String,
    pub id_sucursal: String,
}

impl NuevoTipoPago {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("id", self.id)?;
        validate_text("descripcion", &self.descripcion, limits::DESCRIPCION)?;
        validate_text("id_sucursal", &self.id_sucursal, limits::ID)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TipoPagoUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub descripcion: Patch<String>,
}

impl TipoPagoUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(descripcion) = self.descripcion.as_ref().require("descripcion")? {
            validate_text("descripcion", descripcion, limits::DESCRIPCION)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TipoPagoFilter {
    pub id_sucursal: Option<String>,
}

// =============================================================================
// Pedido / DetallePedido
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevoPedido {
    pub id_sucursal: String,
    #[serde(default)]
    pub id_mesa: Option<i64>,
    /// Customer label for quick tables.
    #[serde(default)]
    pub nombre: Option<String>,
}

impl NuevoPedido {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_text("id_sucursal", &self.id_sucursal, limits::ID)?;
        validate_optional_text("nombre", self.nombre.as_deref(), limits::NOMBRE)
    }
}

/// Editable order header fields. State and total are never patched directly.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PedidoUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub id_mesa: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub id_tipo_pago: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub nombre: Patch<String>,
}

impl PedidoUpdate {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Patch::Value(nombre) = &self.nombre {
            validate_optional_text("nombre", Some(nombre), limits::NOMBRE)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.id_mesa.is_unset() && self.id_tipo_pago.is_unset() && self.nombre.is_unset()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PedidoFilter {
    pub id_sucursal: Option<String>,
    pub id_mesa: Option<i64>,
    pub estado: Option<EstadoPedido>,
}

/// A line to append to an order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NuevaLinea {
    pub id_producto: i64,
    pub cantidad: i64,
    /// Kitchen note.
    #[serde(default)]
    pub descripcion: Option<String>,
}

impl NuevaLinea {
    pub fn new(id_producto: i64, cantidad: i64) -> Self {
        Self {
            id_producto,
            cantidad,
            descripcion: None,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_cantidad(self.cantidad)?;
        validate_optional_text("descripcion", self.descripcion.as_deref(), limits::DESCRIPCION)
    }
}

// =============================================================================
// Image Upload
// =============================================================================

/// An uploaded image. The bytes are handed to blob storage untouched.
#[derive(Debug, Clone)]
pub struct ImagenUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImagenUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Validates extension and size, returning the normalised extension.
    pub fn validate(&self) -> Result<String, ValidationError> {
        validate_image(&self.filename, self.bytes.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_rejects_null_on_required_field() {
        let update: ProductoUpdate = serde_json::from_str(r#"{"precio_cents": null}"#).unwrap();
        assert_eq!(
            update.validate().unwrap_err(),
            ValidationError::NotNullable {
                field: "precio_cents".to_string()
            }
        );
    }

    #[test]
    fn test_update_accepts_null_on_nullable_field() {
        let update: RestauranteUpdate =
            serde_json::from_str(r#"{"descripcion": null, "fecha_finalizacion": null}"#).unwrap();
        assert!(update.validate().is_ok());
        assert!(update.descripcion.is_null());
        assert!(update.nombre.is_unset());
    }

    #[test]
    fn test_caller_ids_must_be_key_safe() {
        let restaurante: NuevoRestaurante = serde_json::from_str(
            r#"{"id": "../x", "nombre": "El Fogón", "telefono": "3001234567",
                "direccion": "Calle 10", "correo": "a@b.co", "id_usuario": "100"}"#,
        )
        .unwrap();
        assert!(matches!(
            restaurante.validate().unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));

        let sucursal: NuevaSucursal = serde_json::from_str(
            r#"{"id": "a/b", "nombre": "Centro", "direccion": "Calle 1", "ciudad": "Cali",
                "telefono": "6041234", "id_restaurante": "r1"}"#,
        )
        .unwrap();
        assert!(matches!(
            sucursal.validate().unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn test_nuevo_producto_defaults_available() {
        let nuevo: NuevoProducto = serde_json::from_str(
            r#"{"nombre": "Arepa", "precio_cents": 500, "id_sucursal": "s1", "id_categoria": 1}"#,
        )
        .unwrap();
        assert!(nuevo.disponibilidad);
        assert!(nuevo.validate().is_ok());
    }

    #[test]
    fn test_nuevo_usuario_rejects_bad_role() {
        let parsed = serde_json::from_str::<NuevoUsuario>(
            r#"{"documento": "1", "nombre": "A", "correo": "a@b.co", "password": "x", "rol": "GERENTE"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_nueva_linea_validation() {
        assert!(NuevaLinea::new(1, 2).validate().is_ok());
        assert!(NuevaLinea::new(1, 0).validate().is_err());
    }

    #[test]
    fn test_pedido_update_is_empty() {
        assert!(PedidoUpdate::default().is_empty());
        let update: PedidoUpdate = serde_json::from_str(r#"{"id_mesa": null}"#).unwrap();
        assert!(!update.is_empty());
    }
}
