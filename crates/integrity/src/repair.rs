//! Applies operator-selected corrections from an audit [`Report`].
//!
//! Actions are grouped by owner. Each owner is re-read, every action is
//! checked against what is stored now, and the surviving edits are written
//! back in one update inside the owner's own unit of work. A failed owner is
//! rolled back and reported; owners already written stay written.

use std::collections::{BTreeMap, HashSet};

use antigravipizza_catalog::{
    CatalogError, IngredientUsage, OwnerKind, Resolver, UsageList, UsageSource, name_key,
    store::{self, ingredient},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};

use crate::{
    IntegrityError, IntegrityResult, Session,
    audit::{CategoryMismatch, DanglingReference, EmbeddedUsage, MalformedUsage, Report, UsageLocation},
    normalizer::{Failure, MergeOutcome, Normalizer},
};

/// Report groups the operator approved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selections {
    pub remove_dangling: bool,
    pub remove_malformed: bool,
    pub promote_embedded: bool,
    pub fix_mismatches: bool,
}

impl Selections {
    pub fn all() -> Self {
        Self {
            remove_dangling: true,
            remove_malformed: true,
            promote_embedded: true,
            fix_mismatches: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerChange {
    pub kind: OwnerKind,
    pub id: String,
    pub name: String,
    pub usages_before: usize,
    pub usages_after: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub applied: usize,
    /// Report entries in groups the operator did not select.
    pub skipped: usize,
    pub failures: Vec<Failure>,
    pub dry_run: bool,
    pub owners: Vec<OwnerChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RemoveDangling {
        location: UsageLocation,
        ingredient_id: String,
    },
    RemoveMalformed {
        location: UsageLocation,
    },
    PromoteEmbedded {
        location: UsageLocation,
        name: String,
    },
    FixMismatch {
        location: UsageLocation,
        ingredient_id: String,
    },
}

impl Action {
    pub fn location(&self) -> &UsageLocation {
        match self {
            Action::RemoveDangling { location, .. }
            | Action::RemoveMalformed { location }
            | Action::PromoteEmbedded { location, .. }
            | Action::FixMismatch { location, .. } => location,
        }
    }

    pub fn describe(&self) -> String {
        let location = self.location();
        let what = match self {
            Action::RemoveDangling { ingredient_id, .. } => {
                format!("remove dangling reference {ingredient_id}")
            }
            Action::RemoveMalformed { .. } => "remove malformed usage".to_owned(),
            Action::PromoteEmbedded { name, .. } => format!("promote \"{name}\""),
            Action::FixMismatch { ingredient_id, .. } => {
                format!("drop stale labels of {ingredient_id}")
            }
        };

        format!(
            "{what} at {} {} ({}) {}[{}]",
            location.owner_kind,
            location.owner_id,
            location.owner_name,
            location.list,
            location.position
        )
    }

    fn removes(&self) -> bool {
        matches!(
            self,
            Action::RemoveDangling { .. } | Action::RemoveMalformed { .. }
        )
    }

    /// Whether the stored usage is still the one the report described.
    fn still_applies(&self, usage: &IngredientUsage, resolver: &Resolver) -> bool {
        match self {
            Action::RemoveDangling { ingredient_id, .. } => {
                usage.ingredient_id() == Some(ingredient_id.as_str())
                    && resolver.get(ingredient_id).is_none()
            }
            Action::RemoveMalformed { .. } => {
                matches!(usage.source, UsageSource::Malformed { .. })
            }
            Action::PromoteEmbedded { name, .. } => matches!(
                &usage.source,
                UsageSource::Embedded { name: stored, .. } if name_key(stored) == name_key(name)
            ),
            Action::FixMismatch { ingredient_id, .. } => {
                usage.ingredient_id() == Some(ingredient_id.as_str())
                    && resolver.get(ingredient_id).is_some()
                    && !usage.is_canonical()
            }
        }
    }
}

impl From<&DanglingReference> for Action {
    fn from(entry: &DanglingReference) -> Self {
        Action::RemoveDangling {
            location: entry.location.to_owned(),
            ingredient_id: entry.ingredient_id.to_owned(),
        }
    }
}

impl From<&MalformedUsage> for Action {
    fn from(entry: &MalformedUsage) -> Self {
        Action::RemoveMalformed {
            location: entry.location.to_owned(),
        }
    }
}

impl From<&EmbeddedUsage> for Action {
    fn from(entry: &EmbeddedUsage) -> Self {
        Action::PromoteEmbedded {
            location: entry.location.to_owned(),
            name: entry.name.to_owned(),
        }
    }
}

impl From<&CategoryMismatch> for Action {
    fn from(entry: &CategoryMismatch) -> Self {
        Action::FixMismatch {
            location: entry.location.to_owned(),
            ingredient_id: entry.ingredient_id.to_owned(),
        }
    }
}

/// The selected report entries as actions, and how many were left out.
pub fn plan(report: &Report, selections: Selections) -> (Vec<Action>, usize) {
    let mut actions = vec![];
    let mut skipped = 0;

    let mut take = |selected: bool, group: Vec<Action>| {
        if selected {
            actions.extend(group);
        } else {
            skipped += group.len();
        }
    };

    take(
        selections.remove_dangling,
        report.dangling_references.iter().map(Action::from).collect(),
    );
    take(
        selections.remove_malformed,
        report.malformed_usages.iter().map(Action::from).collect(),
    );
    take(
        selections.promote_embedded,
        report.embedded_unpromoted.iter().map(Action::from).collect(),
    );
    take(
        selections.fix_mismatches,
        report.category_mismatches.iter().map(Action::from).collect(),
    );

    (actions, skipped)
}

struct OwnerRepair {
    change: Option<OwnerChange>,
    applied: usize,
    failures: Vec<(String, IntegrityError)>,
}

#[derive(Debug, Clone)]
pub struct RepairExecutor {
    normalizer: Normalizer,
}

impl RepairExecutor {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Deletes one usage entry; its siblings keep their order.
    pub async fn remove_dangling_reference(
        &self,
        conn: &mut SqliteConnection,
        entry: &DanglingReference,
    ) -> IntegrityResult<OwnerChange> {
        self.apply_single(conn, Action::from(entry)).await
    }

    pub async fn remove_malformed(
        &self,
        conn: &mut SqliteConnection,
        entry: &MalformedUsage,
    ) -> IntegrityResult<OwnerChange> {
        self.apply_single(conn, Action::from(entry)).await
    }

    /// Replaces the embedded usage in place with its promoted form.
    pub async fn promote_embedded(
        &self,
        conn: &mut SqliteConnection,
        entry: &EmbeddedUsage,
    ) -> IntegrityResult<OwnerChange> {
        self.apply_single(conn, Action::from(entry)).await
    }

    pub async fn fix_mismatch(
        &self,
        conn: &mut SqliteConnection,
        entry: &CategoryMismatch,
    ) -> IntegrityResult<OwnerChange> {
        self.apply_single(conn, Action::from(entry)).await
    }

    /// Operator-chosen winner.
    pub async fn merge_ingredients(
        &self,
        conn: &mut SqliteConnection,
        winner_id: &str,
        loser_ids: &[String],
    ) -> IntegrityResult<MergeOutcome> {
        self.normalizer
            .merge_ingredients(conn, winner_id, loser_ids)
            .await
    }

    /// Removes an erroneous registry entry. Refused while referenced.
    pub async fn delete_ingredient(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> IntegrityResult<()> {
        match ingredient::delete(conn, id).await {
            Ok(true) => {
                tracing::info!(id, "ingredient deleted");
                Ok(())
            }
            Ok(false) => Err(IntegrityError::IngredientNotFound { id: id.to_owned() }),
            Err(CatalogError::IngredientInUse { id, references }) => {
                Err(IntegrityError::StillReferenced { id, references })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn apply_report(
        &self,
        session: &mut Session,
        report: &Report,
        selections: Selections,
    ) -> IntegrityResult<Outcome> {
        let (actions, skipped) = plan(report, selections);
        let mut outcome = Outcome {
            skipped,
            dry_run: session.is_dry_run(),
            ..Default::default()
        };

        if selections.promote_embedded {
            self.normalizer.verify_categories(session.conn()).await?;
        }

        let mut groups: BTreeMap<(OwnerKind, String), Vec<Action>> = BTreeMap::new();
        for action in actions {
            let location = action.location();
            groups
                .entry((location.owner_kind, location.owner_id.to_owned()))
                .or_default()
                .push(action);
        }

        let mut resolver = Resolver::load(session.conn()).await?;

        for ((kind, id), actions) in groups {
            let targets: Vec<String> = actions.iter().map(Action::describe).collect();

            let result = async {
                let mut tx = session.unit().await?;
                let repair = self
                    .repair_owner(&mut tx, &mut resolver, kind, &id, actions)
                    .await?;
                tx.commit().await?;

                Ok::<_, IntegrityError>(repair)
            }
            .await;

            match result {
                Ok(repair) => {
                    outcome.applied += repair.applied;
                    outcome.owners.extend(repair.change);
                    outcome
                        .failures
                        .extend(repair.failures.into_iter().map(|(target, err)| {
                            tracing::warn!("{target}: {err}");
                            Failure {
                                target,
                                error: err.to_string(),
                            }
                        }));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!(%kind, id, "repair failed: {err}");
                    outcome
                        .failures
                        .extend(targets.into_iter().map(|target| Failure {
                            target,
                            error: err.to_string(),
                        }));
                    resolver = Resolver::load(session.conn()).await?;
                }
            }
        }

        tracing::info!(
            applied = outcome.applied,
            skipped = outcome.skipped,
            failed = outcome.failures.len(),
            dry_run = outcome.dry_run,
            "report applied"
        );

        Ok(outcome)
    }

    async fn apply_single(
        &self,
        conn: &mut SqliteConnection,
        action: Action,
    ) -> IntegrityResult<OwnerChange> {
        let mut resolver = Resolver::load(conn).await?;
        let kind = action.location().owner_kind;
        let id = action.location().owner_id.to_owned();
        let target = action.describe();

        let mut tx = conn.begin().await?;
        let mut repair = self
            .repair_owner(&mut tx, &mut resolver, kind, &id, vec![action])
            .await?;

        if let Some((_, err)) = repair.failures.pop() {
            return Err(err);
        }

        tx.commit().await?;

        repair.change.ok_or(IntegrityError::StaleTarget(target))
    }

    async fn repair_owner(
        &self,
        conn: &mut SqliteConnection,
        resolver: &mut Resolver,
        kind: OwnerKind,
        id: &str,
        actions: Vec<Action>,
    ) -> IntegrityResult<OwnerRepair> {
        let mut owner = store::find_owner(conn, kind, id)
            .await?
            .ok_or_else(|| IntegrityError::OwnerNotFound {
                kind,
                id: id.to_owned(),
            })?;

        let usages_before = owner.usage_count();
        let mut removals: BTreeMap<UsageList, Vec<usize>> = BTreeMap::new();
        let mut touched = HashSet::new();
        let mut failures = vec![];
        let mut applied = 0;

        for action in actions {
            let UsageLocation { list, position, .. } = *action.location();
            let current = owner.usages(list).and_then(|usages| usages.get(position));

            let valid = touched.insert((list, position))
                && current.is_some_and(|usage| action.still_applies(usage, resolver));
            if !valid {
                let target = action.describe();
                failures.push((target.to_owned(), IntegrityError::StaleTarget(target)));
                continue;
            }

            if action.removes() {
                removals.entry(list).or_default().push(position);
            } else if let Some(slot) = owner
                .usages_mut(list)
                .and_then(|usages| usages.get_mut(position))
            {
                *slot = match &action {
                    Action::FixMismatch { ingredient_id, .. } => {
                        slot.to_owned().into_reference(ingredient_id.to_owned())
                    }
                    _ => self
                        .normalizer
                        .promote(conn, resolver, slot.to_owned())
                        .await?
                        .into_usage(),
                };
            }

            tracing::debug!(owner = owner.name(), "{}", action.describe());
            applied += 1;
        }

        for (list, mut positions) in removals {
            positions.sort_unstable_by(|a, b| b.cmp(a));
            if let Some(usages) = owner.usages_mut(list) {
                for position in positions {
                    usages.remove(position);
                }
            }
        }

        let change = if applied > 0 {
            store::save_owner(conn, &owner).await?;

            Some(OwnerChange {
                kind,
                id: id.to_owned(),
                name: owner.name().to_owned(),
                usages_before,
                usages_after: owner.usage_count(),
            })
        } else {
            None
        };

        Ok(OwnerRepair {
            change,
            applied,
            failures,
        })
    }
}
