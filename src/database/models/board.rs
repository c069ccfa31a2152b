use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub board_idx: i64,
    pub board_code: i32,
    pub title: String,
    pub content: String,
    pub writer_idx: i64,
    pub writer_name: String,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub board_code: i32,
    pub title: String,
    pub content: String,
    pub writer_idx: i64,
    pub writer_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPage {
    pub boards: Vec<Board>,
    pub total_elements: i64,
}
