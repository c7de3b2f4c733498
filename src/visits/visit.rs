use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MAX_DESCRIPTION_LEN: usize = 8192;

/// A recorded visit to the clinic.
///
/// Serialized with camelCase keys (`petId`) to match the clinic's REST API.
/// `date` defaults to today when omitted from a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub pet_id: u32,
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
}

impl Visit {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            id: None,
            pet_id: 0,
            date,
            description: description.into(),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
