use std::sync::Arc;

use dungeon::{StoreError, WorldStore};
use rusqlite::OptionalExtension;
use space::World;

use crate::db::WorldDb;
use crate::error::{backend, WorldDbError};

impl WorldStore for WorldDb {
    fn get_world(&self, id: &str) -> Result<Option<Arc<World>>, StoreError> {
        let row = self
            .conn
            .lock()
            .query_row(
                "SELECT width, height, layout FROM worlds WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        let Some((width, height, layout)) = row else {
            return Ok(None);
        };
        let world = World::with_dimensions(id, width as usize, height as usize, layout.split('\n'))
            .map_err(|source| WorldDbError::CorruptWorld {
                id: id.to_string(),
                source,
            })?;
        Ok(Some(Arc::new(world)))
    }

    fn save_world(&self, world: World) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO worlds (id, width, height, layout) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    world.id(),
                    world.width() as i64,
                    world.height() as i64,
                    world.to_text()
                ],
            )
            .map_err(backend)?;
        Ok(())
    }
}
