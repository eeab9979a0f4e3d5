//! ResponseEnvelope - ツール呼び出しの統一レスポンス
//!
//! 全オペレーションが同じ形を返します：
//! - operation: オペレーションのタグ
//! - message: 人間向けの要約
//! - data: エンティティ（単体または一覧）
//! - metadata: オペレーションごとに異なるキー（`timestamp` は常に含む）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::date::format_wire;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub operation: String,
    pub message: String,
    pub data: Value,
    pub metadata: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn new(
        operation: impl Into<String>,
        message: impl Into<String>,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("timestamp".to_string(), Value::String(format_wire(&timestamp)));
        Self {
            operation: operation.into(),
            message: message.into(),
            data,
            metadata,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn metadata_always_has_timestamp() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let env = ResponseEnvelope::new("get", "ok", Value::Null, t).with_meta("count", 3);

        assert_eq!(env.meta("timestamp"), Some(&Value::from("2025-01-02T03:04:05.000Z")));
        assert_eq!(env.meta("count"), Some(&Value::from(3)));
    }
}
