use serde::{Deserialize, Serialize};
use strum::Display;

/// Shorter names than this never count as contained in another name.
pub const MIN_SUBSTRING_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Similarity {
    /// Same name once case and whitespace are ignored.
    Equivalent,
    /// One name contains the other. A hint only: "Pomodoro" and
    /// "Pomodoro secco" are different ingredients.
    Substring,
}

/// Lowercase with inner whitespace runs collapsed to one space.
pub fn comparison_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn similarity(a: &str, b: &str) -> Option<Similarity> {
    let a = comparison_key(a);
    let b = comparison_key(b);

    if a.is_empty() || b.is_empty() {
        return None;
    }

    if a == b {
        return Some(Similarity::Equivalent);
    }

    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };

    (shorter.chars().count() >= MIN_SUBSTRING_LEN && longer.contains(shorter.as_str()))
        .then_some(Similarity::Substring)
}
