use thiserror::Error;

use crate::model::{AgeGroupError, AnswerError, DifficultyError, LearningSessionError};

/// Any error raised by the core crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    AgeGroup(#[from] AgeGroupError),
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Session(#[from] LearningSessionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgeGroup, Difficulty};

    fn parse_settings(group: &str, level: u8) -> Result<(AgeGroup, Difficulty), Error> {
        Ok((group.parse()?, Difficulty::new(level)?))
    }

    #[test]
    fn layer_errors_convert_with_question_mark() {
        assert!(parse_settings("6-8", 2).is_ok());
        assert!(matches!(
            parse_settings("adult", 2),
            Err(Error::AgeGroup(_))
        ));
        let err = parse_settings("3-5", 9).unwrap_err();
        assert!(matches!(err, Error::Difficulty(_)));
        assert_eq!(err.to_string(), "difficulty must be between 1 and 5, got 9");
    }
}
