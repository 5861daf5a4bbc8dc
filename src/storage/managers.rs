use anyhow::{Context, Result};
use uuid::Uuid;

use super::LeadStore;

/// A manager leads can be routed to. `group_chat_id` is the supergroup the
/// bot posts lead cards into once bound with /bindgroup.
#[derive(Debug, Clone)]
pub struct Manager {
    pub id: String,
    pub name: String,
    pub telegram_id: Option<i64>,
    pub group_chat_id: Option<i64>,
    pub active: bool,
}

impl LeadStore {
    pub async fn add_manager(&self, name: &str) -> Result<Manager> {
        let manager = Manager {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            telegram_id: None,
            group_chat_id: None,
            active: true,
        };

        let conn = self.connection();
        let conn = conn.lock().await;
        conn.execute(
            "INSERT INTO managers (id, name, telegram_id, group_chat_id, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            rusqlite::params![
                manager.id,
                manager.name,
                manager.telegram_id,
                manager.group_chat_id
            ],
        )
        .context("Failed to insert manager")?;

        Ok(manager)
    }

    pub async fn list_active_managers(&self) -> Result<Vec<Manager>> {
        let conn = self.connection();
        let conn = conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, telegram_id, group_chat_id, active
                 FROM managers WHERE active = 1 ORDER BY name",
            )
            .context("Failed to prepare manager query")?;

        let managers = stmt
            .query_map([], parse_manager_row)
            .context("Failed to query managers")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to collect managers")?;

        Ok(managers)
    }

    pub async fn get_manager(&self, id: &str) -> Result<Option<Manager>> {
        let conn = self.connection();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, telegram_id, group_chat_id, active
             FROM managers WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], parse_manager_row)?;
        match rows.next() {
            Some(Ok(manager)) => Ok(Some(manager)),
            Some(Err(e)) => Err(e).context("Failed to read manager"),
            None => Ok(None),
        }
    }

    /// Bind the given chat as the group of the named manager. Returns false
    /// when no active manager has that name.
    pub async fn bind_manager_group(&self, name: &str, chat_id: i64) -> Result<bool> {
        let conn = self.connection();
        let conn = conn.lock().await;
        let rows = conn
            .execute(
                "UPDATE managers SET group_chat_id = ?1 WHERE name = ?2 AND active = 1",
                rusqlite::params![chat_id, name],
            )
            .context("Failed to bind manager group")?;
        Ok(rows > 0)
    }
}

fn parse_manager_row(row: &rusqlite::Row) -> rusqlite::Result<Manager> {
    Ok(Manager {
        id: row.get(0)?,
        name: row.get(1)?,
        telegram_id: row.get(2)?,
        group_chat_id: row.get(3)?,
        active: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_list_managers() {
        let store = LeadStore::open_in_memory().unwrap();
        store.add_manager("Марина").await.unwrap();
        store.add_manager("Людмила").await.unwrap();

        let managers = store.list_active_managers().await.unwrap();
        assert_eq!(managers.len(), 2);
        // Ordered by name.
        assert_eq!(managers[0].name, "Людмила");
        assert_eq!(managers[1].name, "Марина");
    }

    #[tokio::test]
    async fn test_bind_group() {
        let store = LeadStore::open_in_memory().unwrap();
        let manager = store.add_manager("Марина").await.unwrap();

        assert!(store.bind_manager_group("Марина", -1001234).await.unwrap());
        let bound = store.get_manager(&manager.id).await.unwrap().unwrap();
        assert_eq!(bound.group_chat_id, Some(-1001234));

        assert!(!store.bind_manager_group("Нет Такой", -1).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_unknown_manager() {
        let store = LeadStore::open_in_memory().unwrap();
        assert!(store.get_manager("missing").await.unwrap().is_none());
    }
}
