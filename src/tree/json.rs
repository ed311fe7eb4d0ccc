use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Tree, trim_holes};

impl<L: DeserializeOwned> Tree<L> {
    /// Objects become maps and arrays become sequences; everything else is
    /// deserialized as a leaf. `null` array items are holes and `null` object
    /// members are skipped.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(members) => {
                let mut entries = indexmap::IndexMap::with_capacity(members.len());
                for (key, member) in members {
                    if member.is_null() {
                        continue;
                    }
                    entries.insert(key, Arc::new(Self::from_json(member)?));
                }
                Ok(Self::Map(entries))
            }
            Value::Array(items) => {
                let mut slots = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Null => Ok(None),
                        item => Self::from_json(item).map(|node| Some(Arc::new(node))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                trim_holes(&mut slots);
                Ok(Self::Seq(slots))
            }
            leaf => serde_json::from_value(leaf).map(Self::Leaf),
        }
    }
}

impl<L: Serialize> Tree<L> {
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl<L: Serialize> Serialize for Tree<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, child) in entries {
                    map.serialize_entry(key, child.as_ref())?;
                }
                map.end()
            }
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&item.as_deref())?;
                }
                seq.end()
            }
            Self::Leaf(value) => value.serialize(serializer),
        }
    }
}

impl<'de, L: DeserializeOwned> Deserialize<'de> for Tree<L> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}
