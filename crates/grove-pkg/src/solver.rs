//! Dependency version resolution.
//!
//! Resolution is a depth-first backtracking search over the versions
//! present in the local package store:
//!
//! 1. Pick the first package (in name order) with an unresolved constraint.
//! 2. Try its candidate versions newest first.
//! 3. A tentative pick adds the candidate's own constraints to the working
//!    set; an empty intersection or an exhausted candidate list rejects the
//!    pick and backtracks.
//!
//! The search is deterministic: identical stores and inputs always produce
//! identical resolutions. Search failure means the constraints are
//! genuinely unsatisfiable; missing packages surface as store errors
//! instead of being treated as dead ends.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

use crate::store::{PackageStore, StoreError};
use crate::version::{Constraint, Version};

/// Label used for constraints that come straight from the root manifest.
const ROOT_ORIGIN: &str = "elm.json";

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("{}", unsatisfiable_report(.name, .demands))]
    Unsatisfiable {
        name: String,
        demands: Vec<(String, Constraint)>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn unsatisfiable_report(name: &str, demands: &[(String, Constraint)]) -> String {
    let mut report = format!("no version of `{name}` satisfies all constraints:");
    for (origin, constraint) in demands {
        let _ = write!(report, "\n  {origin}: {constraint}");
    }
    report
}

/// The output of a successful solve: one pinned version per package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    versions: BTreeMap<String, Version>,
}

impl Resolution {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Version> {
        self.versions.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.versions.contains_key(name)
    }

    /// Iterates `(name, version)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Version)> {
        self.versions
            .iter()
            .map(|(name, version)| (name.as_str(), *version))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl FromIterator<(String, Version)> for Resolution {
    fn from_iter<I: IntoIterator<Item = (String, Version)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

/// The merged constraint for one package plus every origin that demanded
/// something of it.
#[derive(Debug, Clone)]
struct Requirement {
    merged: Constraint,
    demands: Vec<(String, Constraint)>,
}

impl Requirement {
    fn new(origin: String, constraint: Constraint) -> Self {
        Self {
            merged: constraint,
            demands: vec![(origin, constraint)],
        }
    }

    /// Narrows the requirement; `None` means the demands are disjoint.
    fn narrow(&self, origin: String, constraint: Constraint) -> Option<Self> {
        let merged = self.merged.intersect(&constraint)?;
        let mut demands = self.demands.clone();
        demands.push((origin, constraint));
        Some(Self { merged, demands })
    }

    fn rejected(&self, name: &str, origin: String, constraint: Constraint) -> SolveError {
        let mut demands = self.demands.clone();
        demands.push((origin, constraint));
        SolveError::Unsatisfiable {
            name: name.to_string(),
            demands,
        }
    }
}

/// Solves package constraints against one [`PackageStore`].
pub struct Resolver<'a> {
    store: &'a PackageStore,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(store: &'a PackageStore) -> Self {
        Self { store }
    }

    /// Finds one version per package such that every constraint declared by
    /// the root and by every selected package holds.
    pub fn solve(&self, wanted: &BTreeMap<String, Constraint>) -> Result<Resolution, SolveError> {
        let mut requirements = BTreeMap::new();
        for (name, constraint) in wanted {
            requirements.insert(
                name.clone(),
                Requirement::new(ROOT_ORIGIN.to_string(), *constraint),
            );
        }
        let assigned = self.search(&BTreeMap::new(), &requirements)?;
        Ok(Resolution { versions: assigned })
    }

    fn search(
        &self,
        assigned: &BTreeMap<String, Version>,
        requirements: &BTreeMap<String, Requirement>,
    ) -> Result<BTreeMap<String, Version>, SolveError> {
        let Some((name, requirement)) = requirements
            .iter()
            .find(|(name, _)| !assigned.contains_key(*name))
        else {
            return Ok(assigned.clone());
        };

        let known = self.store.versions(name)?;
        let mut candidates: Vec<_> = known
            .iter()
            .filter(|candidate| requirement.merged.satisfies(&candidate.version))
            .collect();
        candidates.sort_by(|a, b| b.version.cmp(&a.version));

        if candidates.is_empty() {
            return Err(SolveError::Unsatisfiable {
                name: name.clone(),
                demands: requirement.demands.clone(),
            });
        }

        let mut first_dead_end: Option<SolveError> = None;
        for candidate in candidates {
            let origin = format!("{name} {}", candidate.version);
            let mut next_assigned = assigned.clone();
            next_assigned.insert(name.clone(), candidate.version);
            let mut next_requirements = requirements.clone();
            let mut viable = true;

            for (dep_name, dep_constraint) in candidate.dependencies() {
                let narrowed = match next_requirements.get(dep_name) {
                    Some(existing) => match existing.narrow(origin.clone(), *dep_constraint) {
                        Some(narrowed) => narrowed,
                        None => {
                            if first_dead_end.is_none() {
                                first_dead_end =
                                    Some(existing.rejected(dep_name, origin.clone(), *dep_constraint));
                            }
                            viable = false;
                            break;
                        }
                    },
                    None => Requirement::new(origin.clone(), *dep_constraint),
                };
                if let Some(pinned) = next_assigned.get(dep_name) {
                    if !narrowed.merged.satisfies(pinned) {
                        if first_dead_end.is_none() {
                            first_dead_end = Some(narrowed.rejected(
                                dep_name,
                                "already selected".to_string(),
                                Constraint::from_exact(*pinned),
                            ));
                        }
                        viable = false;
                        break;
                    }
                }
                next_requirements.insert(dep_name.clone(), narrowed);
            }
            if !viable {
                continue;
            }

            match self.search(&next_assigned, &next_requirements) {
                Ok(resolution) => return Ok(resolution),
                Err(err @ SolveError::Unsatisfiable { .. }) => {
                    first_dead_end.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(first_dead_end.unwrap_or_else(|| SolveError::Unsatisfiable {
            name: name.clone(),
            demands: requirement.demands.clone(),
        }))
    }
}
