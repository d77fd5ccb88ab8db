use dungeon::mob::MOB_GLYPH;
use dungeon::{Mob, MobStore, StoreError};
use rusqlite::{ErrorCode, OptionalExtension, Row};

use crate::db::WorldDb;
use crate::error::backend;

const COLUMNS: &str =
    "id, name, world_id, kind, x, y, health, attack, defense, attack_speed, glyph";
const INSERT: &str = "INTO mobs (id, name, world_id, kind, x, y, health, attack, defense, attack_speed, glyph) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

fn mob_from_row(row: &Row<'_>) -> rusqlite::Result<Mob> {
    let glyph: String = row.get(10)?;
    Ok(Mob {
        id: row.get(0)?,
        name: row.get(1)?,
        world_id: row.get(2)?,
        kind: row.get(3)?,
        x: row.get(4)?,
        y: row.get(5)?,
        health: row.get(6)?,
        attack: row.get(7)?,
        defense: row.get(8)?,
        attack_speed: row.get(9)?,
        glyph: glyph.chars().next().unwrap_or(MOB_GLYPH),
    })
}

fn insert(conn: &rusqlite::Connection, verb: &str, mob: &Mob) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("{verb} {INSERT}"),
        rusqlite::params![
            mob.id,
            mob.name,
            mob.world_id,
            mob.kind,
            mob.x,
            mob.y,
            mob.health,
            mob.attack,
            mob.defense,
            mob.attack_speed,
            mob.glyph.to_string()
        ],
    )
}

impl MobStore for WorldDb {
    fn get_mob(&self, id: &str) -> Result<Option<Mob>, StoreError> {
        self.conn
            .lock()
            .query_row(
                &format!("SELECT {COLUMNS} FROM mobs WHERE id = ?1"),
                rusqlite::params![id],
                mob_from_row,
            )
            .optional()
            .map_err(backend)
    }

    fn save_mob(&self, mob: &Mob) -> Result<(), StoreError> {
        insert(&self.conn.lock(), "INSERT OR REPLACE", mob).map_err(backend)?;
        Ok(())
    }

    fn create_mob(&self, mob: &Mob) -> Result<(), StoreError> {
        match insert(&self.conn.lock(), "INSERT", mob) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::AlreadyExists(mob.id.clone()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    fn delete_mob(&self, id: &str) -> Result<Option<Mob>, StoreError> {
        let conn = self.conn.lock();
        let existing = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM mobs WHERE id = ?1"),
                rusqlite::params![id],
                mob_from_row,
            )
            .optional()
            .map_err(backend)?;
        if existing.is_some() {
            conn.execute("DELETE FROM mobs WHERE id = ?1", rusqlite::params![id])
                .map_err(backend)?;
        }
        Ok(existing)
    }

    fn count_mobs_in_world(&self, world_id: &str) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM mobs WHERE world_id = ?1",
                rusqlite::params![world_id],
                |row| row.get(0),
            )
            .map_err(backend)?;
        Ok(count as usize)
    }

    fn list_mobs_by_world(&self, world_id: &str) -> Result<Vec<Mob>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM mobs WHERE world_id = ?1 ORDER BY id"
            ))
            .map_err(backend)?;
        let mobs = stmt
            .query_map(rusqlite::params![world_id], mob_from_row)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(mobs)
    }
}
