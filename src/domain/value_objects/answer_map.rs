use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// 質問ID → 回答値。スキーマはアンケートごとに異なるため丸ごと1つのJSONとして保存する
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, Value>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid answer map: {e}"))
    }

    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            _ => Err("Answer map must be a JSON object".to_string()),
        }
    }

    pub fn insert(&mut self, question_id: impl Into<String>, value: Value) {
        self.0.insert(question_id.into(), value);
    }

    pub fn get(&self, question_id: &str) -> Option<&Value> {
        self.0.get(question_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Keys are sorted, so the hash is stable for equal maps.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let canonical = self.to_json_string()?;
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(format!("{:x}", digest))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
