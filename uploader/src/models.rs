use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal ids come back as numbers from queries and as uuid strings from creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawId")]
pub struct ItemId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for ItemId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => ItemId(n.to_string()),
            RawId::Text(s) => ItemId(s),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response to any create call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedId {
    pub id: ItemId,
}

/// The parts of a launch or item we read back.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRef {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub content: Vec<ItemRef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunchRq {
    pub name: String,
    pub start_time: i64,
    pub rerun: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartItemRq {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub launch_uuid: String,
    pub description: String,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishItemRq {
    pub end_time: i64,
    pub launch_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishLaunchRq {
    pub end_time: i64,
}

/// A log entry; an empty `item_uuid` attaches it to the launch itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLogRq {
    pub launch_uuid: String,
    pub item_uuid: String,
    pub time: String,
    pub message: String,
    pub level: String,
}
