//! Key layout shared by every backend.

use mathkids_core::model::AgeGroup;

/// Flat list of every saved session.
pub const SESSIONS_KEY: &str = "sessions";

const PROGRESS_KEY_PREFIX: &str = "progress_";

/// Key holding one age group's cumulative progress, e.g. `progress_6-8`.
#[must_use]
pub fn progress_key(age_group: AgeGroup) -> String {
    format!("{PROGRESS_KEY_PREFIX}{}", age_group.id())
}

/// Every key the progress store owns.
#[must_use]
pub fn all_keys() -> Vec<String> {
    std::iter::once(SESSIONS_KEY.to_owned())
        .chain(AgeGroup::ALL.into_iter().map(progress_key))
        .collect()
}
