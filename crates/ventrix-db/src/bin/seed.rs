//! # Seed Data Generator
//!
//! Populates the database with a demo restaurant for development.
//!
//! ## Usage
//! ```bash
//! # Uses VENTRIX_DB_PATH (default ./ventrix.db)
//! cargo run -p ventrix-db --bin seed
//!
//! # Specify database path
//! cargo run -p ventrix-db --bin seed -- --db ./data/ventrix.db
//! ```
//!
//! ## Generated Data
//! - Owner `1000000001` (admin@elfogon.co / `demo-1234`)
//! - Restaurant "El Fogón" with the branch "centro"
//! - Physical and quick tables, payment types
//! - A small menu across three categories
//! - One paid order and one open order

use std::env;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ventrix_core::{
    Estado, EstadoMesa, EstadoPedido, NuevaCategoria, NuevaLinea, NuevaMesa, NuevaSucursal,
    NuevoPedido, NuevoProducto, NuevoRestaurante, NuevoTipoPago, NuevoUsuario, RolUsuario,
};
use ventrix_db::{AppConfig, Database, DbConfig, FsBlobStore};

const OWNER: &str = "1000000001";
const SUCURSAL: &str = "centro";

/// Menu: category → (product, price in cents)
const MENU: &[(&str, &[(&str, i64)])] = &[
    (
        "Platos fuertes",
        &[
            ("Bandeja paisa", 32_000),
            ("Sancocho de gallina", 28_000),
            ("Ajiaco santafereño", 26_000),
            ("Mojarra frita", 35_000),
        ],
    ),
    (
        "Entradas",
        &[
            ("Empanadas x3", 9_000),
            ("Patacones con hogao", 12_000),
            ("Arepa de choclo", 8_500),
        ],
    ),
    (
        "Bebidas",
        &[
            ("Limonada de coco", 9_500),
            ("Jugo de mora", 7_000),
            ("Aguapanela", 4_000),
            ("Tinto", 2_500),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = AppConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("VenTrix Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $VENTRIX_DB_PATH)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %config.database_path.display(), "Seeding database");
    let db = Database::new(DbConfig::from_app_config(&config)).await?;

    if db.usuarios().get(OWNER).await?.is_some() {
        warn!("Demo owner already exists, skipping seed. Delete the database file to regenerate");
        db.close().await;
        return Ok(());
    }

    // Owner, restaurant, branch
    db.usuarios()
        .create(NuevoUsuario {
            documento: OWNER.to_string(),
            nombre: "Administrador Demo".to_string(),
            correo: "admin@elfogon.co".to_string(),
            password: "demo-1234".to_string(),
            rol: RolUsuario::Administrador,
            estado: Estado::Activo,
            id_sucursal: None,
        })
        .await?;

    let blobs = Arc::new(FsBlobStore::new(&config.images_dir, "/imagenes"));
    let restaurante = db
        .lifecycle(blobs)
        .register_restaurant(
            NuevoRestaurante {
                id: None,
                nombre: "El Fogón".to_string(),
                descripcion: Some("Cocina típica colombiana".to_string()),
                telefono: "3001234567".to_string(),
                direccion: "Calle 10 # 5-20".to_string(),
                correo: "contacto@elfogon.co".to_string(),
                fecha_finalizacion: None,
                estado: Estado::Activo,
                id_usuario: OWNER.to_string(),
            },
            None,
        )
        .await?;

    db.sucursales()
        .create(NuevaSucursal {
            id: Some(SUCURSAL.to_string()),
            nombre: "Sede Centro".to_string(),
            direccion: "Carrera 7 # 12-40".to_string(),
            ciudad: "Medellín".to_string(),
            telefono: "6045551234".to_string(),
            fecha_apertura: None,
            estado: Estado::Activo,
            administrador: Some(OWNER.to_string()),
            id_restaurante: restaurante.id.clone(),
        })
        .await?;

    // Tables
    let mut mesas = Vec::new();
    for n in 1..=6 {
        let mesa = db
            .mesas()
            .create(NuevaMesa {
                nombre: format!("Mesa {}", n),
                estado: EstadoMesa::Fisica,
                id_sucursal: SUCURSAL.to_string(),
            })
            .await?;
        mesas.push(mesa);
    }
    db.mesas()
        .create(NuevaMesa {
            nombre: "Domicilios".to_string(),
            estado: EstadoMesa::Rapida,
            id_sucursal: SUCURSAL.to_string(),
        })
        .await?;

    // Payment types
    for (id, descripcion) in [(1, "Efectivo"), (2, "Tarjeta"), (3, "Transferencia")] {
        db.tipos_pago()
            .create(NuevoTipoPago {
                id,
                descripcion: descripcion.to_string(),
                id_sucursal: SUCURSAL.to_string(),
            })
            .await?;
    }

    // Menu
    let mut productos = Vec::new();
    for (categoria, items) in MENU {
        let categoria = db
            .categorias()
            .create(NuevaCategoria {
                nombre: categoria.to_string(),
                id_sucursal: SUCURSAL.to_string(),
            })
            .await?;

        for (nombre, precio_cents) in items.iter() {
            let producto = db
                .productos()
                .create(NuevoProducto {
                    nombre: nombre.to_string(),
                    precio_cents: *precio_cents,
                    disponibilidad: true,
                    id_sucursal: SUCURSAL.to_string(),
                    id_categoria: categoria.id,
                })
                .await?;
            productos.push(producto);
        }
    }
    info!(productos = productos.len(), "Menu created");

    // Orders
    let orders = db.orders();
    let primera_mesa = mesas.first().map(|mesa| mesa.id);

    let pagado = orders
        .create_order(NuevoPedido {
            id_sucursal: SUCURSAL.to_string(),
            id_mesa: primera_mesa,
            nombre: None,
        })
        .await?;
    for (producto, cantidad) in productos.iter().step_by(3).zip([2, 1, 3, 1]) {
        orders
            .add_line(pagado.id_pedido, NuevaLinea::new(producto.id_producto, cantidad))
            .await?;
    }
    orders
        .advance_state(pagado.id_pedido, EstadoPedido::Comandado)
        .await?;
    let pagado = orders.pay(pagado.id_pedido, 1).await?;

    let abierto = orders
        .create_order(NuevoPedido {
            id_sucursal: SUCURSAL.to_string(),
            id_mesa: None,
            nombre: Some("Domicilio Carlos".to_string()),
        })
        .await?;
    if let Some(producto) = productos.first() {
        orders
            .add_line(abierto.id_pedido, NuevaLinea::new(producto.id_producto, 1))
            .await?;
    }

    info!(
        restaurante = %restaurante.id,
        pedido_pagado = pagado.id_pedido,
        total = %pagado.total(),
        pedido_abierto = abierto.id_pedido,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=ventrix=trace` - Show trace for ventrix crates only
/// - Default: `info,ventrix=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ventrix=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
