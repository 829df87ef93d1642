//! Generation management: open, enumerate and delete whole stores.

use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::entries::GenerationStore;
use crate::Error;

impl CacheDb {
    /// Handle to a generation without touching the database.
    ///
    /// The generation row is created lazily by the first write.
    pub fn generation(&self, name: &str) -> GenerationStore {
        GenerationStore::new(self.clone(), name)
    }

    /// Open (create-if-absent) a generation.
    ///
    /// Returns the handle and whether this call created it.
    pub async fn open_generation(&self, name: &str) -> Result<(GenerationStore, bool), Error> {
        let owned = name.to_string();
        let created = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)?;

        Ok((self.generation(name), created))
    }

    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every generation, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and, by cascade, all of its entries.
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
