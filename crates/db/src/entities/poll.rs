//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Poll categories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PollCategory {
    #[sea_orm(string_value = "politics")]
    Politics,
    #[sea_orm(string_value = "sports")]
    Sports,
    #[sea_orm(string_value = "entertainment")]
    Entertainment,
    #[default]
    #[sea_orm(string_value = "other")]
    Other,
}

impl PollCategory {
    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Politics => "Politics",
            Self::Sports => "Sports",
            Self::Entertainment => "Entertainment",
            Self::Other => "Other",
        }
    }
}

/// A single answer a voter can pick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Unique within the poll (`option_<index>`).
    pub id: String,
    /// Display text.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Ordered options (JSON array of `{id, text}`)
    #[sea_orm(column_type = "Json")]
    pub options: JsonValue,

    /// Creator user ID
    #[sea_orm(indexed)]
    pub created_by: String,

    pub category: PollCategory,

    /// Image reference (URL, data URI or raw base64)
    #[sea_orm(column_type = "Text", nullable)]
    pub image: Option<String>,

    /// Aggregate vote count tracked alongside the vote store
    pub total_votes: i32,

    #[sea_orm(indexed)]
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Decode the stored option list, preserving its order.
    pub fn parsed_options(&self) -> Result<Vec<PollOption>, serde_json::Error> {
        serde_json::from_value(self.options.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
