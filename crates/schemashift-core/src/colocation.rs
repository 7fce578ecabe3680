//! Colocation groups from `co_locate_with` declarations.
//!
//! Every declaration names an anchor in the declaring collection's database.
//! The anchor must exist in the source, but it does not have to be migrated.
//! Chains are allowed; cycles are not, including a collection naming itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ResolvedCollectionConfig;
use crate::error::ColocationError;
use crate::model::{CollectionId, SourceSnapshot};
use crate::plan::Dependency;

/// An anchor and the collections placed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColocationGroup {
    /// Anchor collection.
    pub anchor: CollectionId,
    /// Collections declaring the anchor, ordered.
    pub members: BTreeSet<CollectionId>,
}

impl ColocationGroup {
    /// True if `id` is the anchor or a member.
    #[must_use]
    pub fn contains(&self, id: &CollectionId) -> bool {
        self.anchor == *id || self.members.contains(id)
    }
}

/// Groups and validation failures of one planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColocationPlan {
    /// Groups ordered by anchor.
    pub groups: Vec<ColocationGroup>,
    /// Missing anchors first, then cycles.
    pub errors: Vec<ColocationError>,
}

impl ColocationPlan {
    /// True when no declaration failed validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Direct anchor of `member`, if it declared one.
    #[must_use]
    pub fn anchor_of(&self, member: &CollectionId) -> Option<&CollectionId> {
        self.groups
            .iter()
            .find(|group| group.members.contains(member))
            .map(|group| &group.anchor)
    }

    /// Creation constraints between collections that are both in `scheduled`.
    ///
    /// An anchor outside `scheduled` already exists on its own and imposes
    /// nothing.
    #[must_use]
    pub fn dependencies(&self, scheduled: &BTreeSet<CollectionId>) -> Vec<Dependency> {
        let mut dependencies: Vec<Dependency> = self
            .groups
            .iter()
            .filter(|group| scheduled.contains(&group.anchor))
            .flat_map(|group| {
                group
                    .members
                    .iter()
                    .filter(|member| scheduled.contains(*member))
                    .map(|member| Dependency {
                        before: group.anchor.clone(),
                        after: member.clone(),
                    })
            })
            .collect();
        dependencies.sort();
        dependencies
    }
}

/// Validates colocation declarations against a source snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ColocationPlanner<'a> {
    snapshot: &'a SourceSnapshot,
}

impl<'a> ColocationPlanner<'a> {
    /// Planner resolving anchors against `snapshot`.
    #[must_use]
    pub fn new(snapshot: &'a SourceSnapshot) -> Self {
        Self { snapshot }
    }

    /// Builds groups and collects every validation failure.
    #[must_use]
    pub fn plan(&self, resolved: &[ResolvedCollectionConfig]) -> ColocationPlan {
        let references: BTreeMap<&CollectionId, CollectionId> = resolved
            .iter()
            .filter_map(|config| config.anchor().map(|anchor| (&config.id, anchor)))
            .collect();

        let mut plan = ColocationPlan::default();
        let mut groups: BTreeMap<CollectionId, BTreeSet<CollectionId>> = BTreeMap::new();
        for (member, anchor) in &references {
            if !self.snapshot.contains(anchor) {
                tracing::warn!(collection = %member, anchor = %anchor, "co-location anchor not found");
                plan.errors.push(ColocationError::MissingAnchor {
                    collection: (*member).clone(),
                    anchor: anchor.clone(),
                });
                continue;
            }
            groups
                .entry(anchor.clone())
                .or_default()
                .insert((*member).clone());
        }

        plan.errors.extend(find_cycles(&references));
        plan.groups = groups
            .into_iter()
            .map(|(anchor, members)| ColocationGroup { anchor, members })
            .collect();
        plan
    }
}

/// Plans colocation for `resolved` against `snapshot`.
#[must_use]
pub fn plan(resolved: &[ResolvedCollectionConfig], snapshot: &SourceSnapshot) -> ColocationPlan {
    ColocationPlanner::new(snapshot).plan(resolved)
}

/// Each cycle is reported once, starting from its smallest member.
fn find_cycles(references: &BTreeMap<&CollectionId, CollectionId>) -> Vec<ColocationError> {
    let mut cycles = Vec::new();
    for &start in references.keys() {
        let mut path = vec![start];
        let mut current = start;
        while let Some(next) = references.get(current) {
            if next == start {
                if path.iter().all(|member| start <= *member) {
                    path.push(start);
                    cycles.push(ColocationError::Cycle {
                        path: path.into_iter().cloned().collect(),
                    });
                }
                break;
            }
            if path.contains(&next) {
                break;
            }
            path.push(next);
            current = next;
        }
    }
    cycles
}
