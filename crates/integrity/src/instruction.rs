//! Spots catalog ingredients that are really recipe steps captured as
//! ingredient names ("soffriggere nell'olio il sedano", "100 gr di farina").

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::Display;

const MAX_NAME_LEN: usize = 50;

static COOKING_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(frullare|soffriggere|grigliare|pulire|bollire|unire|cuocere|tagliare|mescolare|aggiungere|stendere|infornare|marinare|tostare|sbucciare|lavare|rosolare|saltare|condire|versare)\b",
    )
    .expect("cooking verb pattern")
});

static LEADING_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+([.,]\d+)?\s*(gr|g|grammi|kg|ml|cl|l|bicchier[ei]|cucchia[il]n?[oi])\b")
        .expect("leading quantity pattern")
});

static LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L} ]+:\s*\S").expect("label prefix pattern"));

static LEADING_ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(il|lo|la|i|gli|le)\s+\p{L}").expect("leading article pattern")
});

static COOKING_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(nell'olio|con olio|a crudo|a fette|senza buccia|q\.b\.|a piacere)")
        .expect("cooking phrase pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum InstructionSignal {
    CookingVerb,
    LeadingQuantity,
    LabelPrefix,
    LeadingArticle,
    CookingPhrase,
    TooLong,
}

pub fn instruction_signal(name: &str) -> Option<InstructionSignal> {
    let name = name.trim();

    if COOKING_VERB.is_match(name) {
        Some(InstructionSignal::CookingVerb)
    } else if LEADING_QUANTITY.is_match(name) {
        Some(InstructionSignal::LeadingQuantity)
    } else if LABEL_PREFIX.is_match(name) {
        Some(InstructionSignal::LabelPrefix)
    } else if LEADING_ARTICLE.is_match(name) {
        Some(InstructionSignal::LeadingArticle)
    } else if COOKING_PHRASE.is_match(name) {
        Some(InstructionSignal::CookingPhrase)
    } else if name.chars().count() > MAX_NAME_LEN {
        Some(InstructionSignal::TooLong)
    } else {
        None
    }
}
