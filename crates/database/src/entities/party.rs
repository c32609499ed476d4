//! Party entity definitions
//!
//! Parties (buyers and sellers) are created by the account system; the
//! messaging core references them and never mutates them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: i64,
}
