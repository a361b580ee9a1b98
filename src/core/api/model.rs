use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, macros::format_description};

/// Length of a server-assigned identifier (document-store object id).
pub const OBJECT_ID_LEN: usize = 24;

/// Whether `id` has the shape the server assigns to its entities:
/// exactly 24 hexadecimal characters.
pub fn is_object_id(id: &str) -> bool {
    id.len() == OBJECT_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Pick the server id out of a body that may carry `_id`, `id` or both.
/// `_id` wins when both are present.
pub(crate) fn pick_id(object_id: Option<String>, id: Option<String>) -> Option<String> {
    object_id.or(id)
}

/// Dates travel as `YYYY-MM-DD`. A full timestamp is accepted on the way in
/// and truncated to its date part.
pub mod iso_date {
    use super::*;

    pub fn format(date: &Date) -> Result<String, time::error::Format> {
        date.format(format_description!("[year]-[month]-[day]"))
    }

    pub fn parse(value: &str) -> Result<Date, time::error::Parse> {
        let day = value.split('T').next().unwrap_or(value);
        Date::parse(day, format_description!("[year]-[month]-[day]"))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => {
                    let text = super::format(date).map_err(serde::ser::Error::custom)?;
                    s.serialize_some(&text)
                }
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(text) if !text.is_empty() => super::parse(&text)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

/// A reference from a child entity to its project. Servers send either the
/// bare id or the populated project object, which exposes its id as `_id`
/// or `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    Id(String),
    Object {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        object_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ProjectRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            ProjectRef::Id(id) => Some(id.as_str()),
            ProjectRef::Object { object_id, id } => object_id.as_deref().or(id.as_deref()),
        }
    }

    pub fn points_to(&self, project_id: &str) -> bool {
        match self {
            ProjectRef::Id(id) => id == project_id,
            ProjectRef::Object { object_id, id } => {
                object_id.as_deref() == Some(project_id) || id.as_deref() == Some(project_id)
            }
        }
    }
}
