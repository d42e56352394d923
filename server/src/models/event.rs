use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    /// Free-form start time as entered by organisers, e.g. "7:00 PM".
    pub time: Option<String>,
    pub date: DateTime<Utc>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn display_date(&self) -> String {
        self.date.format("%d %b %Y").to_string()
    }

    pub fn display_time(&self) -> &str {
        self.time.as_deref().unwrap_or("TBA")
    }
}
