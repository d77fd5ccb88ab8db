use rusqlite::Connection;

use crate::error::WorldDbError;

pub fn create_tables(conn: &Connection) -> Result<(), WorldDbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS worlds (
            id      TEXT PRIMARY KEY,
            width   INTEGER NOT NULL,
            height  INTEGER NOT NULL,
            layout  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id           TEXT PRIMARY KEY,
            world_id     TEXT NOT NULL,
            x            INTEGER NOT NULL,
            y            INTEGER NOT NULL,
            health       INTEGER NOT NULL,
            attack       INTEGER NOT NULL,
            defense      INTEGER NOT NULL,
            attack_range INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS players_by_world ON players(world_id);

        CREATE TABLE IF NOT EXISTS mobs (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            world_id     TEXT NOT NULL,
            kind         TEXT NOT NULL,
            x            INTEGER NOT NULL,
            y            INTEGER NOT NULL,
            health       INTEGER NOT NULL,
            attack       INTEGER NOT NULL,
            defense      INTEGER NOT NULL,
            attack_speed INTEGER NOT NULL,
            glyph        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS mobs_by_world ON mobs(world_id);
        ",
    )?;
    Ok(())
}
