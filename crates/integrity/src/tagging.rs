use antigravipizza_catalog::{
    CatalogError, name_key,
    store::{IngredientFilter, ingredient},
};
use serde::{Deserialize, Serialize};

use crate::{IntegrityError, IntegrityResult, Session, normalizer::Failure};

/// Removes and adds tags on every ingredient whose name contains
/// `name_contains`, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRule {
    pub name_contains: String,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub add: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retagged {
    pub id: String,
    pub name: String,
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetagOutcome {
    pub matched: usize,
    pub changed: Vec<Retagged>,
    pub failures: Vec<Failure>,
    pub dry_run: bool,
}

impl TagRule {
    pub fn new(name_contains: &str) -> Self {
        Self {
            name_contains: name_contains.to_owned(),
            remove: vec![],
            add: vec![],
        }
    }

    pub fn remove(mut self, tag: &str) -> Self {
        self.remove.push(tag.to_owned());
        self
    }

    pub fn add(mut self, tag: &str) -> Self {
        self.add.push(tag.to_owned());
        self
    }

    pub async fn apply(&self, session: &mut Session) -> IntegrityResult<RetagOutcome> {
        let needle = name_key(&self.name_contains);
        if needle.is_empty() {
            return Err(CatalogError::Validation("tag rule needs a non-blank name filter".to_owned()).into());
        }

        let filter = IngredientFilter {
            name_contains: Some(needle),
            ..Default::default()
        };
        let matches = ingredient::list(session.conn(), &filter).await?;

        let mut outcome = RetagOutcome {
            matched: matches.len(),
            dry_run: session.is_dry_run(),
            ..Default::default()
        };

        for mut ingredient in matches {
            let removed: Vec<String> = self
                .remove
                .iter()
                .map(|t| t.trim())
                .filter(|t| ingredient.tags.remove(*t))
                .map(str::to_owned)
                .collect();
            let added: Vec<String> = self
                .add
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty() && ingredient.tags.insert((*t).to_owned()))
                .map(str::to_owned)
                .collect();

            if removed.is_empty() && added.is_empty() {
                continue;
            }

            let result = async {
                let mut tx = session.unit().await?;
                ingredient::upsert(&mut tx, &ingredient).await?;
                tx.commit().await?;
                Ok::<_, IntegrityError>(())
            }
            .await;

            match result {
                Ok(()) => {
                    tracing::debug!(name = ingredient.name, ?removed, ?added, "ingredient retagged");
                    outcome.changed.push(Retagged {
                        id: ingredient.id,
                        name: ingredient.name,
                        removed,
                        added,
                    });
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!(name = ingredient.name, "retag failed: {err}");
                    outcome.failures.push(Failure {
                        target: ingredient.name,
                        error: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            rule = self.name_contains,
            matched = outcome.matched,
            changed = outcome.changed.len(),
            dry_run = outcome.dry_run,
            "tag rule applied"
        );

        Ok(outcome)
    }
}
