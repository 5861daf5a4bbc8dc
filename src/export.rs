use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::info;

use crate::lead::{Lead, LeadStatus};

const HEADERS: [&str; 17] = [
    "id",
    "created_at",
    "name",
    "phone",
    "telegram",
    "whatsapp",
    "max",
    "vk",
    "email",
    "weight_kg",
    "height_cm",
    "bmi",
    "lead_type",
    "manager",
    "status",
    "comment",
    "tg_link",
];

/// Append-mostly CSV ledger of every saved lead. Kept flat so it opens
/// directly in any spreadsheet tool.
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append_lead(
        &self,
        lead: &Lead,
        manager_name: Option<&str>,
        tg_link: Option<&str>,
    ) -> Result<()> {
        let is_new = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open export file: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(HEADERS)?;
        }
        writer.write_record(lead_record(lead, manager_name, tg_link))?;
        writer.flush().context("Failed to flush export file")?;

        info!("Exported lead {} to {}", lead.id, self.path.display());
        Ok(())
    }

    /// Rewrite the status column of the matching row. Returns false when the
    /// lead has never been exported.
    pub fn update_status(&self, lead_id: &str, status: LeadStatus) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to read export file: {}", self.path.display()))?;
        let mut records: Vec<csv::StringRecord> = Vec::new();
        let mut found = false;
        for record in reader.records() {
            let mut record = record.context("Failed to read export row")?;
            if record.get(0) == Some(lead_id) {
                let mut fields: Vec<String> =
                    record.iter().map(|field| field.to_string()).collect();
                if let Some(slot) = fields.get_mut(14) {
                    *slot = status.code().to_string();
                }
                record = csv::StringRecord::from(fields);
                found = true;
            }
            records.push(record);
        }

        if !found {
            return Ok(false);
        }

        // Rewrite through a sibling temp file so a crash mid-write cannot
        // truncate the ledger.
        let tmp = self.path.with_extension("tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Failed to rewrite export file: {}", tmp.display()))?;
            writer.write_record(HEADERS)?;
            for record in &records {
                writer.write_record(record)?;
            }
            writer.flush().context("Failed to flush export file")?;
        }
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace export file: {}", self.path.display()))?;
        Ok(true)
    }
}

fn lead_record(lead: &Lead, manager_name: Option<&str>, tg_link: Option<&str>) -> Vec<String> {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let num = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

    vec![
        lead.id.clone(),
        lead.created_at.clone(),
        lead.name.clone(),
        opt(&lead.phone),
        opt(&lead.telegram),
        opt(&lead.whatsapp),
        opt(&lead.max),
        opt(&lead.vk),
        opt(&lead.email),
        num(lead.weight_kg),
        num(lead.height_cm),
        num(lead.bmi),
        lead.lead_type.clone(),
        manager_name.unwrap_or_default().to_string(),
        lead.status.code().to_string(),
        lead.comment.clone().unwrap_or_default(),
        tg_link.unwrap_or_default().to_string(),
    ]
}
