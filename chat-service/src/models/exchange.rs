//! Persisted record of one prompt/reply pair.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// A prompt paired with the reply it produced. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub prompt: String,
    pub reply: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ChatExchange {
    pub fn new(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reply: reply.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn serializes_created_at_as_bson_date() {
        let exchange = ChatExchange::new("Hello", "Hi there");
        let doc = bson::to_document(&exchange).unwrap();

        assert_eq!(doc.get_str("prompt").unwrap(), "Hello");
        assert_eq!(doc.get_str("reply").unwrap(), "Hi there");
        assert!(doc.get_datetime("created_at").is_ok());
    }
}
