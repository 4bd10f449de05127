//! Projects created by signed-in clients.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::{ServiceType, Urgency};

code_enum! {
    pub enum ProjectStatus {
        Planning => "planejando",
        InProgress => "em_andamento",
        Completed => "concluido",
        Paused => "pausado",
        Cancelled => "cancelado",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub client_account_id: i64,
    pub title: String,
    pub description: String,
    pub service_type: ServiceType,
    pub urgency: Urgency,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub area: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub estimated_budget: Option<Decimal>,
    pub desired_start: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        id: i64,
        client_account_id: i64,
        title: impl Into<String>,
        service_type: ServiceType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            client_account_id,
            title: title.into(),
            description: String::new(),
            service_type,
            urgency: Urgency::Normal,
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            area: None,
            estimated_budget: None,
            desired_start: None,
            status: ProjectStatus::Planning,
            created_at,
        }
    }
}
