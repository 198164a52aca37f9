use anyhow::Result;

use crate::core::AppConfig;
use crate::core::db::{async_db, migrate_db};

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Migrating db at {}...", config.db_path);
    config.ensure_storage_dir()?;
    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        migrate_db(conn)?;
        Ok(())
    })
    .await?;
    println!("Finished migrating db");
    Ok(())
}
