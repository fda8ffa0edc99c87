//! story-adapters: los 11 pasos concretos del pipeline snowflake.
//!
//! Cada paso implementa el contrato neutral de `story-core` (prompt → parse
//! → validate → fallback) sobre los esquemas de `story-domain`. El registro
//! completo se arma en `registry::snowflake_registry`. También viven acá los
//! proveedores de prueba/demostración (`providers`).

pub mod providers;
pub mod registry;
pub mod steps;

pub use registry::snowflake_registry;
