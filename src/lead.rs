use chrono::Utc;
use uuid::Uuid;

use crate::parser::{ContactChannel, ExtractionResult};

/// Manager-facing lead status. `code()` is the stable form used in the
/// database, CSV and callback data; `label()` is what managers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    New,
    InWork,
    CallbackLater,
    NoAnswer,
    Rejected,
    ConsultScheduled,
    SurgeryScheduled,
    Operated,
}

/// Statuses a manager can move a lead into from the group card.
pub const MANAGER_STATUSES: [LeadStatus; 7] = [
    LeadStatus::InWork,
    LeadStatus::CallbackLater,
    LeadStatus::NoAnswer,
    LeadStatus::Rejected,
    LeadStatus::ConsultScheduled,
    LeadStatus::SurgeryScheduled,
    LeadStatus::Operated,
];

impl LeadStatus {
    pub fn code(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::InWork => "in_work",
            LeadStatus::CallbackLater => "callback_later",
            LeadStatus::NoAnswer => "no_answer",
            LeadStatus::Rejected => "rejected",
            LeadStatus::ConsultScheduled => "consult_scheduled",
            LeadStatus::SurgeryScheduled => "surgery_scheduled",
            LeadStatus::Operated => "operated",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "new" => Some(LeadStatus::New),
            "in_work" => Some(LeadStatus::InWork),
            "callback_later" => Some(LeadStatus::CallbackLater),
            "no_answer" => Some(LeadStatus::NoAnswer),
            "rejected" => Some(LeadStatus::Rejected),
            "consult_scheduled" => Some(LeadStatus::ConsultScheduled),
            "surgery_scheduled" => Some(LeadStatus::SurgeryScheduled),
            "operated" => Some(LeadStatus::Operated),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::New => "Новый",
            LeadStatus::InWork => "🔵 В работе",
            LeadStatus::CallbackLater => "📅 Перезвонить",
            LeadStatus::NoAnswer => "📞 Нет ответа",
            LeadStatus::Rejected => "❌ Отказ",
            LeadStatus::ConsultScheduled => "🩺 Консультация",
            LeadStatus::SurgeryScheduled => "🏥 Операция",
            LeadStatus::Operated => "✅ Прооперирован",
        }
    }
}

/// BMI from weight in kilograms and height in centimeters, rounded to two
/// decimal places. Absent when either input is absent or the computation is
/// undefined.
pub fn calculate_bmi(weight_kg: Option<f64>, height_cm: Option<f64>) -> Option<f64> {
    let (weight, height) = (weight_kg?, height_cm?);
    if weight <= 0.0 || height <= 0.0 {
        return None;
    }
    let height_m = height / 100.0;
    let bmi = weight / (height_m * height_m);
    if !bmi.is_finite() {
        return None;
    }
    Some((bmi * 100.0).round() / 100.0)
}

/// What the admin sees before a lead is confirmed and saved.
#[derive(Debug, Clone)]
pub struct LeadDraft {
    pub id: String,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub channel: Option<ContactChannel>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub bmi: Option<f64>,
}

impl LeadDraft {
    pub fn from_extraction(result: &ExtractionResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: result.name.clone(),
            contact: result.contact.clone(),
            channel: result.channel,
            weight_kg: result.weight_kg,
            height_cm: result.height_cm,
            bmi: calculate_bmi(result.weight_kg, result.height_cm),
        }
    }

    /// A lead with any contact at all is "hot" and gets a manager.
    pub fn is_hot(&self) -> bool {
        self.contact.is_some()
    }

    pub fn card_text(&self) -> String {
        format!(
            "Имя: {}\nКонтакт ({}): {}\nВес: {}\nРост: {}\nBMI: {}",
            self.name.as_deref().unwrap_or("-"),
            self.channel
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.contact.as_deref().unwrap_or("-"),
            format_number(self.weight_kg),
            format_number(self.height_cm),
            format_number(self.bmi),
        )
    }
}

fn format_number(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// The persisted record. The single extracted identifier is mirrored into
/// the column of its channel; the other channel columns stay empty.
#[derive(Debug, Clone)]
pub struct Lead {
    pub id: String,
    pub created_at: String,
    pub source: String,
    pub name: String,
    pub phone: Option<String>,
    pub telegram: Option<String>,
    pub whatsapp: Option<String>,
    pub max: Option<String>,
    pub vk: Option<String>,
    pub email: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub bmi: Option<f64>,
    pub lead_type: String,
    pub manager_id: Option<String>,
    pub status: LeadStatus,
    pub comment: Option<String>,
    pub created_by: i64,
}

impl Lead {
    pub fn from_draft(
        draft: &LeadDraft,
        manager_id: Option<String>,
        comment: Option<String>,
        created_by: i64,
    ) -> Self {
        let contact = draft.contact.clone();
        let slot = |channel| (draft.channel == Some(channel)).then(|| contact.clone()).flatten();

        let hot = draft.is_hot();
        Self {
            id: draft.id.clone(),
            created_at: Utc::now().to_rfc3339(),
            source: "telegram".to_string(),
            name: draft.name.clone().unwrap_or_else(|| "-".to_string()),
            phone: slot(ContactChannel::Phone),
            telegram: slot(ContactChannel::Telegram),
            whatsapp: slot(ContactChannel::WhatsApp),
            max: slot(ContactChannel::Max),
            vk: slot(ContactChannel::Vk),
            email: slot(ContactChannel::Email),
            weight_kg: draft.weight_kg,
            height_cm: draft.height_cm,
            bmi: draft.bmi,
            lead_type: if hot { "hot" } else { "cold" }.to_string(),
            manager_id: if hot { manager_id } else { None },
            status: LeadStatus::New,
            comment,
            created_by,
        }
    }

    /// The contacts block for the manager-group card.
    pub fn contact_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(phone) = &self.phone {
            lines.push(format!("📞 Телефон: {phone}"));
        }
        if let Some(telegram) = &self.telegram {
            lines.push(format!("💬 Telegram: {telegram}"));
        }
        if let Some(whatsapp) = &self.whatsapp {
            lines.push(format!("🟢 WhatsApp: {whatsapp}"));
        }
        if let Some(max) = &self.max {
            lines.push(format!("🔵 MAX: {max}"));
        }
        if let Some(vk) = &self.vk {
            lines.push(format!("🌐 VK: {vk}"));
        }
        if let Some(email) = &self.email {
            lines.push(format!("✉️ Email: {email}"));
        }
        lines
    }
}
