//! Moves usage lists toward the canonical referenced form.
//!
//! Promotion turns an embedded usage into a reference, creating the registry
//! entry when no ingredient has that name yet. Normalizing also drops the
//! denormalized `name`/`category` labels that referenced usages still carry,
//! since the registry entry is authoritative. Both are idempotent: a second
//! pass over normalized data writes nothing.

use std::collections::{BTreeSet, HashSet};

use antigravipizza_catalog::{
    Ingredient, IngredientUsage, Owner, Resolution, Resolver, UsageSource,
    store::{self, category, ingredient},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};

use crate::{
    IntegrityError, IntegrityResult, Session,
    alias::CategoryAliases,
    similarity::{Similarity, similarity},
};

pub const DEFAULT_UNIT: &str = "g";

#[derive(Debug, Clone, PartialEq)]
pub enum Promotion {
    /// Now points at an existing or freshly created registry entry.
    Promoted {
        usage: IngredientUsage,
        ingredient_id: String,
        created: bool,
    },
    /// Nothing to promote: already referenced, dangling or malformed.
    Unchanged(IngredientUsage),
}

impl Promotion {
    pub fn into_usage(self) -> IngredientUsage {
        match self {
            Promotion::Promoted { usage, .. } | Promotion::Unchanged(usage) => usage,
        }
    }
}

enum Step {
    Clean,
    Promote,
    Keep,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerChanges {
    pub promoted: usize,
    pub cleaned: usize,
    pub created: usize,
}

impl OwnerChanges {
    pub fn is_empty(&self) -> bool {
        self.promoted == 0 && self.cleaned == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub target: String,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeSummary {
    pub owners_scanned: usize,
    pub owners_rewritten: usize,
    pub usages_promoted: usize,
    pub usages_cleaned: usize,
    pub ingredients_created: usize,
    pub failures: Vec<Failure>,
    pub dry_run: bool,
}

impl NormalizeSummary {
    pub fn writes(&self) -> usize {
        self.owners_rewritten + self.ingredients_created
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub winner: Ingredient,
    pub removed: Vec<String>,
    pub repointed: usize,
    pub owners_rewritten: usize,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: CategoryAliases,
    default_unit: String,
}

impl Normalizer {
    pub fn new(aliases: CategoryAliases) -> Self {
        Self {
            aliases,
            default_unit: DEFAULT_UNIT.to_owned(),
        }
    }

    pub fn with_default_unit(mut self, unit: &str) -> Self {
        if !unit.trim().is_empty() {
            self.default_unit = unit.trim().to_owned();
        }

        self
    }

    pub fn aliases(&self) -> &CategoryAliases {
        &self.aliases
    }

    pub fn default_unit(&self) -> &str {
        &self.default_unit
    }

    /// Checks that every category the alias table can produce exists.
    pub async fn verify_categories(&self, conn: &mut SqliteConnection) -> IntegrityResult<()> {
        let categories = category::list(conn).await?;
        self.aliases.verify(&categories)
    }

    /// Rewrites an embedded usage to reference form. The amounts are carried
    /// over untouched; the inline labels are dropped.
    pub async fn promote(
        &self,
        conn: &mut SqliteConnection,
        resolver: &mut Resolver,
        usage: IngredientUsage,
    ) -> IntegrityResult<Promotion> {
        let UsageSource::Embedded { name, category } = &usage.source else {
            return Ok(Promotion::Unchanged(usage));
        };

        if let Some(existing) = resolver.find_by_name(name) {
            let ingredient_id = existing.id.to_owned();
            tracing::debug!(name, ingredient_id, "embedded usage matched registry entry");

            return Ok(Promotion::Promoted {
                usage: usage.into_reference(ingredient_id.to_owned()),
                ingredient_id,
                created: false,
            });
        }

        let canonical = self.aliases.category_for(name, category.as_deref());
        let target = self.aliases.find_category(conn, canonical).await?;

        let unit = usage
            .unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty() && u.chars().count() <= 20)
            .unwrap_or(self.default_unit.as_str());

        let created = Ingredient::new(name.to_owned(), target.id.to_owned(), unit);
        ingredient::upsert(conn, &created).await?;

        tracing::info!(
            name = created.name,
            category = target.name,
            legacy_category = category.as_deref().unwrap_or_default(),
            "ingredient created from embedded usage"
        );

        let ingredient_id = created.id.to_owned();
        resolver.insert(created);

        Ok(Promotion::Promoted {
            usage: usage.into_reference(ingredient_id.to_owned()),
            ingredient_id,
            created: true,
        })
    }

    /// Promotes embedded usages and strips stale labels from resolved ones,
    /// in every list of the owner. Dangling and malformed usages are left for
    /// the repair executor.
    pub async fn normalize_owner(
        &self,
        conn: &mut SqliteConnection,
        resolver: &mut Resolver,
        owner: &mut Owner,
    ) -> IntegrityResult<OwnerChanges> {
        let mut changes = OwnerChanges::default();

        for (_, usages) in owner.lists_mut() {
            let current = std::mem::take(usages);
            let mut rewritten = Vec::with_capacity(current.len());

            for usage in current {
                let step = match resolver.resolve(&usage) {
                    Resolution::Resolved(_) if !usage.is_canonical() => Step::Clean,
                    Resolution::Embedded { .. } => Step::Promote,
                    _ => Step::Keep,
                };

                match step {
                    Step::Clean => {
                        let id = usage.ingredient_id().unwrap_or_default().to_owned();
                        rewritten.push(usage.into_reference(id));
                        changes.cleaned += 1;
                    }
                    Step::Promote => match self.promote(conn, resolver, usage).await? {
                        Promotion::Promoted { usage, created, .. } => {
                            changes.promoted += 1;
                            changes.created += usize::from(created);
                            rewritten.push(usage);
                        }
                        Promotion::Unchanged(usage) => rewritten.push(usage),
                    },
                    Step::Keep => rewritten.push(usage),
                }
            }

            *usages = rewritten;
        }

        Ok(changes)
    }

    /// Normalizes every preparation and recipe, one owner per unit of work.
    pub async fn normalize_catalog(&self, session: &mut Session) -> IntegrityResult<NormalizeSummary> {
        self.verify_categories(session.conn()).await?;

        let mut resolver = Resolver::load(session.conn()).await?;
        let owners = store::load_owners(session.conn()).await?;
        let mut summary = NormalizeSummary {
            dry_run: session.is_dry_run(),
            ..Default::default()
        };

        for mut owner in owners {
            summary.owners_scanned += 1;

            let result = async {
                let mut tx = session.unit().await?;
                let changes = self
                    .normalize_owner(&mut tx, &mut resolver, &mut owner)
                    .await?;

                if !changes.is_empty() {
                    store::save_owner(&mut tx, &owner).await?;
                }
                tx.commit().await?;

                Ok::<_, IntegrityError>(changes)
            }
            .await;

            match result {
                Ok(changes) if changes.is_empty() => {}
                Ok(changes) => {
                    tracing::debug!(
                        owner = owner.name(),
                        promoted = changes.promoted,
                        cleaned = changes.cleaned,
                        "owner normalized"
                    );
                    summary.owners_rewritten += 1;
                    summary.usages_promoted += changes.promoted;
                    summary.usages_cleaned += changes.cleaned;
                    summary.ingredients_created += changes.created;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!(owner = owner.name(), "normalization failed: {err}");
                    summary.failures.push(Failure {
                        target: format!("{} {}", owner.kind(), owner.id()),
                        error: err.to_string(),
                    });
                    resolver = Resolver::load(session.conn()).await?;
                }
            }
        }

        tracing::info!(
            scanned = summary.owners_scanned,
            rewritten = summary.owners_rewritten,
            created = summary.ingredients_created,
            dry_run = summary.dry_run,
            "catalog normalized"
        );

        Ok(summary)
    }

    /// Repoints every usage of `loser_ids` at `winner_id`, checks that nothing
    /// references a loser anymore, then deletes the losers. All of it commits
    /// together or not at all. Loser tags are folded into the winner.
    pub async fn merge_ingredients(
        &self,
        conn: &mut SqliteConnection,
        winner_id: &str,
        loser_ids: &[String],
    ) -> IntegrityResult<MergeOutcome> {
        let losers: BTreeSet<&str> = loser_ids.iter().map(String::as_str).collect();
        if losers.is_empty() {
            return Err(IntegrityError::InvalidMerge("no ingredient to merge".to_owned()));
        }
        if losers.contains(winner_id) {
            return Err(IntegrityError::InvalidMerge(format!(
                "{winner_id} is both winner and loser"
            )));
        }

        let mut tx = conn.begin().await?;

        let mut winner = ingredient::find_by_id(&mut tx, winner_id)
            .await?
            .ok_or_else(|| IntegrityError::IngredientNotFound {
                id: winner_id.to_owned(),
            })?;

        for loser_id in &losers {
            let loser = ingredient::find_by_id(&mut tx, loser_id)
                .await?
                .ok_or_else(|| IntegrityError::IngredientNotFound {
                    id: (*loser_id).to_owned(),
                })?;
            winner.tags.extend(loser.tags);
        }

        let mut repointed = 0;
        let mut owners_rewritten = 0;

        for mut owner in store::load_owners(&mut tx).await? {
            let mut owner_repointed = 0;

            for (_, usages) in owner.lists_mut() {
                for usage in usages.iter_mut() {
                    if usage.ingredient_id().is_some_and(|id| losers.contains(id)) {
                        *usage = usage.clone().into_reference(winner.id.to_owned());
                        owner_repointed += 1;
                    }
                }
            }

            if owner_repointed > 0 {
                store::save_owner(&mut tx, &owner).await?;
                repointed += owner_repointed;
                owners_rewritten += 1;
            }
        }

        let counts = store::count_references(&store::load_owners(&mut tx).await?);
        for loser_id in &losers {
            if let Some(references) = counts.get(*loser_id).copied().filter(|c| *c > 0) {
                return Err(IntegrityError::StillReferenced {
                    id: (*loser_id).to_owned(),
                    references,
                });
            }
        }

        ingredient::upsert(&mut tx, &winner).await?;
        for loser_id in &losers {
            ingredient::delete(&mut tx, loser_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            winner = winner.name,
            removed = losers.len(),
            repointed,
            "ingredients merged"
        );

        Ok(MergeOutcome {
            winner,
            removed: losers.into_iter().map(str::to_owned).collect(),
            repointed,
            owners_rewritten,
        })
    }

    /// Merges candidates the caller believes are the same ingredient, picking
    /// the winner automatically: most referenced, then oldest. Fails with
    /// [`IntegrityError::AmbiguousMerge`] when the names are only substring
    /// similar or no single winner stands out.
    pub async fn merge_equivalent(
        &self,
        conn: &mut SqliteConnection,
        candidate_ids: &[String],
    ) -> IntegrityResult<MergeOutcome> {
        let unique: Vec<&String> = {
            let mut seen = HashSet::new();
            candidate_ids.iter().filter(|id| seen.insert(id.as_str())).collect()
        };
        if unique.len() < 2 {
            return Err(IntegrityError::InvalidMerge(
                "at least two distinct ingredients are needed".to_owned(),
            ));
        }

        let mut candidates = Vec::with_capacity(unique.len());
        for id in &unique {
            let found = ingredient::find_by_id(conn, id)
                .await?
                .ok_or_else(|| IntegrityError::IngredientNotFound {
                    id: (*id).to_owned(),
                })?;
            candidates.push(found);
        }

        let ambiguous = |reason: String| IntegrityError::AmbiguousMerge {
            candidates: candidates.iter().map(|c| c.name.to_owned()).collect(),
            reason,
        };

        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                match similarity(&a.name, &b.name) {
                    Some(Similarity::Equivalent) => {}
                    Some(Similarity::Substring) => {
                        return Err(ambiguous(format!(
                            "\"{}\" and \"{}\" are only substring similar",
                            a.name, b.name
                        )));
                    }
                    None => {
                        return Err(ambiguous(format!(
                            "\"{}\" and \"{}\" are not similar",
                            a.name, b.name
                        )));
                    }
                }
            }
        }

        let counts = store::count_references(&store::load_owners(conn).await?);
        let rank = |i: &Ingredient| {
            (
                counts.get(&i.id).copied().unwrap_or(0),
                std::cmp::Reverse(i.date_added),
            )
        };

        let best = candidates.iter().map(|c| rank(c)).max();
        let leaders: Vec<&Ingredient> = candidates
            .iter()
            .filter(|c| Some(rank(*c)) == best)
            .collect();

        let [winner] = leaders.as_slice() else {
            return Err(ambiguous(
                "candidates tie on references and age".to_owned(),
            ));
        };

        let winner_id = winner.id.to_owned();
        let losers: Vec<String> = candidates
            .iter()
            .filter(|c| c.id != winner_id)
            .map(|c| c.id.to_owned())
            .collect();

        self.merge_ingredients(conn, &winner_id, &losers).await
    }
}
