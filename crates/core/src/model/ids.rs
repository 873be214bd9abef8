use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const QUESTION_SUFFIX_LEN: usize = 9;

/// Unique identifier for a generated question.
///
/// Shaped `q_<unix-millis>_<suffix>`; the random suffix keeps ids distinct
/// within a batch generated in the same millisecond.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds a fresh identifier from a timestamp and the given random source.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, at: DateTime<Utc>) -> Self {
        let suffix: String = rng
            .sample_iter(&Alphanumeric)
            .take(QUESTION_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("q_{}_{suffix}", at.timestamp_millis()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a learning session.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random `session_<uuid>` identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("session_{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn question_id_embeds_timestamp_and_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = QuestionId::generate(&mut rng, fixed_now());
        let expected_prefix = format!("q_{}_", fixed_now().timestamp_millis());
        assert!(id.as_str().starts_with(&expected_prefix));
        assert_eq!(id.as_str().len(), expected_prefix.len() + QUESTION_SUFFIX_LEN);
    }

    #[test]
    fn question_ids_differ_within_the_same_millisecond() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = QuestionId::generate(&mut rng, fixed_now());
        let b = QuestionId::generate(&mut rng, fixed_now());
        assert_ne!(a, b);
    }

    #[test]
    fn session_ids_are_prefixed() {
        assert!(SessionId::random().as_str().starts_with("session_"));
    }
}
