//! Database access for triptych-curator
//!
//! Stores are plain async functions over a shared `SqlitePool`. The schema
//! itself lives in `triptych_common::db::init`.

pub mod arcs;
pub mod bundles;
pub mod exposures;
pub mod insights;
pub mod settings;

use sqlx::SqlitePool;
use std::path::Path;
use triptych_common::Result;

/// Open the curator database, creating file and schema when missing
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = triptych_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (settings, arcs, bundles, exposures, insights)");
    Ok(pool)
}
