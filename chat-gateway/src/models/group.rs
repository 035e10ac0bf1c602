use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chat group. Only `id` is interpreted; every other column is passed
/// through to clients untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    #[serde(deserialize_with = "super::id_as_string")]
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Group {
    pub fn named(id: &str, name: &str) -> Self {
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), Value::String(name.to_string()));
        Self {
            id: id.to_string(),
            attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMember {
    #[serde(deserialize_with = "super::id_as_string")]
    pub group_id: String,
    pub user_id: i64,
}
