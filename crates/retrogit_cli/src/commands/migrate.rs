use retrogit::migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;

use crate::MigrateAction;

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(db).await?.len();
            Migrator::up(db, None).await?;
            println!("Applied {pending} migration(s).");
        }
        MigrateAction::Down => {
            Migrator::down(db, Some(1)).await?;
            println!("Rolled back the last migration.");
        }
        MigrateAction::Status => {
            let applied = Migrator::get_applied_migrations(db).await?;
            let pending = Migrator::get_pending_migrations(db).await?;
            for migration in &applied {
                println!("applied  {}", migration.name());
            }
            for migration in &pending {
                println!("pending  {}", migration.name());
            }
        }
        MigrateAction::Fresh => {
            // Drops the vintage records and the response cache.
            Migrator::fresh(db).await?;
            println!("Recreated the schema from scratch.");
        }
    }

    Ok(())
}
