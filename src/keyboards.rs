use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::lead::MANAGER_STATUSES;
use crate::storage::managers::Manager;

/// One manager per row, plus a cancel row for cold leads.
pub fn managers_keyboard(managers: &[Manager]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = managers
        .iter()
        .map(|manager| {
            vec![InlineKeyboardButton::callback(
                manager.name.clone(),
                format!("manager:{}", manager.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "Отмена",
        "manager:cancel",
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Status buttons for the group card, two per row.
pub fn lead_status_keyboard(lead_id: &str) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = MANAGER_STATUSES
        .iter()
        .map(|status| {
            InlineKeyboardButton::callback(
                status.label(),
                format!("status:{}:{}", lead_id, status.code()),
            )
        })
        .collect();
    let rows: Vec<Vec<InlineKeyboardButton>> =
        buttons.chunks(2).map(|chunk| chunk.to_vec()).collect();
    InlineKeyboardMarkup::new(rows)
}
