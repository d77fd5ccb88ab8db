use dungeon::{Player, PlayerStore, StoreError};
use rusqlite::{OptionalExtension, Row};

use crate::db::WorldDb;
use crate::error::backend;

const COLUMNS: &str = "id, world_id, x, y, health, attack, defense, attack_range";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        world_id: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        health: row.get(4)?,
        attack: row.get(5)?,
        defense: row.get(6)?,
        range: row.get(7)?,
    })
}

impl PlayerStore for WorldDb {
    fn get_player(&self, id: &str) -> Result<Option<Player>, StoreError> {
        self.conn
            .lock()
            .query_row(
                &format!("SELECT {COLUMNS} FROM players WHERE id = ?1"),
                rusqlite::params![id],
                player_from_row,
            )
            .optional()
            .map_err(backend)
    }

    fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                &format!("INSERT OR REPLACE INTO players ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                rusqlite::params![
                    player.id,
                    player.world_id,
                    player.x,
                    player.y,
                    player.health,
                    player.attack,
                    player.defense,
                    player.range
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn list_players_by_world(&self, world_id: &str) -> Result<Vec<Player>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM players WHERE world_id = ?1 ORDER BY id"
            ))
            .map_err(backend)?;
        let players = stmt
            .query_map(rusqlite::params![world_id], player_from_row)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(players)
    }
}
