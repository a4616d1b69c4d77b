use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{GameId, Scalar};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeComment {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub comment: String,
}

/// A game flagged by one or more schools and awaiting adjudication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeRecord {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
    #[serde(rename = "gameType", default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub week: Option<Scalar>,
    #[serde(default)]
    pub game_number: Option<Scalar>,
    #[serde(default)]
    pub w_points: Option<Scalar>,
    #[serde(default)]
    pub l_points: Option<Scalar>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub disputes: Vec<DisputeComment>,
}

impl DisputeRecord {
    pub fn new(game_id: impl Into<GameId>) -> Self {
        Self {
            game_id: game_id.into(),
            game_type: None,
            map: None,
            code: None,
            school: None,
            opponent: None,
            week: None,
            game_number: None,
            w_points: None,
            l_points: None,
            image_url: None,
            disputes: Vec::new(),
        }
    }

    /// Map name when one was recorded, otherwise the match code.
    pub fn map_or_code(&self) -> Option<&str> {
        non_empty(self.map.as_deref()).or_else(|| non_empty(self.code.as_deref()))
    }

    pub fn opponent_name(&self) -> Option<&str> {
        non_empty(self.opponent.as_deref())
    }

    /// Winner and loser points, when both were recorded.
    ///
    /// Only the literal empty string counts as "not recorded"; a score of zero is kept.
    pub fn score(&self) -> Option<(&Scalar, &Scalar)> {
        match (&self.w_points, &self.l_points) {
            (Some(won), Some(lost)) if !won.is_empty_text() && !lost.is_empty_text() => {
                Some((won, lost))
            }
            _ => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        non_empty(self.image_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// One row of a stats response. Field order follows the backend payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatRow(pub Map<String, Value>);

impl StatRow {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Display text for a field. Missing fields and nulls have no text.
    pub fn display(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(match number.as_f64() {
                Some(value) if number.is_f64() => Scalar::Float(value).to_string(),
                _ => number.to_string(),
            }),
            Value::Bool(flag) => Some(flag.to_string()),
            other => Some(other.to_string()),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StatRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
