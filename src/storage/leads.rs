use anyhow::{Context, Result};

use super::LeadStore;
use crate::lead::{Lead, LeadStatus};

impl LeadStore {
    pub async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        let conn = self.connection();
        let conn = conn.lock().await;
        conn.execute(
            "INSERT INTO leads
             (id, created_at, source, name, phone, telegram, whatsapp,
              messenger_max, vk, email, weight_kg, height_cm, bmi, lead_type,
              manager_id, status, comment, created_by, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?2)",
            rusqlite::params![
                lead.id,
                lead.created_at,
                lead.source,
                lead.name,
                lead.phone,
                lead.telegram,
                lead.whatsapp,
                lead.max,
                lead.vk,
                lead.email,
                lead.weight_kg,
                lead.height_cm,
                lead.bmi,
                lead.lead_type,
                lead.manager_id,
                lead.status.code(),
                lead.comment,
                lead.created_by,
            ],
        )
        .context("Failed to insert lead")?;
        Ok(())
    }

    pub async fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let conn = self.connection();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, source, name, phone, telegram, whatsapp,
                    messenger_max, vk, email, weight_kg, height_cm, bmi,
                    lead_type, manager_id, status, comment, created_by
             FROM leads WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], parse_lead_row)?;
        match rows.next() {
            Some(Ok(lead)) => Ok(Some(lead)),
            Some(Err(e)) => Err(e).context("Failed to read lead"),
            None => Ok(None),
        }
    }

    /// Returns false when the lead does not exist.
    pub async fn set_lead_status(&self, id: &str, status: LeadStatus) -> Result<bool> {
        let conn = self.connection();
        let conn = conn.lock().await;
        let rows = conn
            .execute(
                "UPDATE leads SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![status.code(), id],
            )
            .context("Failed to update lead status")?;
        Ok(rows > 0)
    }
}

fn parse_lead_row(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
    let status_code: String = row.get(15)?;
    let status = LeadStatus::from_code(&status_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            15,
            rusqlite::types::Type::Text,
            format!("unknown lead status: {status_code}").into(),
        )
    })?;

    Ok(Lead {
        id: row.get(0)?,
        created_at: row.get(1)?,
        source: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        telegram: row.get(5)?,
        whatsapp: row.get(6)?,
        max: row.get(7)?,
        vk: row.get(8)?,
        email: row.get(9)?,
        weight_kg: row.get(10)?,
        height_cm: row.get(11)?,
        bmi: row.get(12)?,
        lead_type: row.get(13)?,
        manager_id: row.get(14)?,
        status,
        comment: row.get(16)?,
        created_by: row.get(17)?,
    })
}
