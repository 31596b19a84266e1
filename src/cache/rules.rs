// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use super::key::{QueryKey, Resource};

/// A successful write, described by what it changed on the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Change {
    PatientCreated,
    PatientUpdated { id: String },
    PatientDeleted { id: String },
    StudyUploaded { patient_id: String },
    AnalysisCreated,
    ReportCreated,
    ReportFinalized { id: String },
    ConfigUpdated,
}

/// One stale region of the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Invalidation {
    /// Every key of this resource, whatever its parameters.
    Resource(Resource),
    /// Exactly this key.
    Key(QueryKey),
}

impl Invalidation {
    pub(crate) fn matches(&self, key: &QueryKey) -> bool {
        match *self {
            Self::Resource(resource) => key.resource() == resource,
            Self::Key(ref target) => target == key,
        }
    }
}

impl Change {
    /// The cache entries made stale by this change. This table is the only
    /// place that relates writes to reads.
    pub(crate) fn invalidations(&self) -> Vec<Invalidation> {
        use Invalidation::{Key, Resource as All};

        match *self {
            Self::PatientCreated => vec![All(Resource::Patients)],
            Self::PatientUpdated { ref id } | Self::PatientDeleted { ref id } => vec![
                All(Resource::Patients),
                Key(QueryKey::with_id(Resource::Patient, id)),
                Key(QueryKey::with_id(Resource::PatientHistory, id)),
            ],
            Self::StudyUploaded { ref patient_id } => vec![
                All(Resource::Studies),
                Key(QueryKey::with_id(Resource::PatientHistory, patient_id)),
            ],
            Self::AnalysisCreated => vec![All(Resource::Analyses)],
            Self::ReportCreated => vec![All(Resource::Reports)],
            Self::ReportFinalized { ref id } => vec![
                All(Resource::Reports),
                Key(QueryKey::with_id(Resource::Report, id)),
                Key(QueryKey::with_id(Resource::ReportExport, id)),
            ],
            Self::ConfigUpdated => vec![All(Resource::Config)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(change: &Change, key: &QueryKey) -> bool {
        change
            .invalidations()
            .iter()
            .any(|invalidation| invalidation.matches(key))
    }

    #[test]
    fn patient_writes_invalidate_every_listing() {
        let listing = QueryKey::with_params(Resource::Patients, &("smith", 0));
        for change in [
            Change::PatientCreated,
            Change::PatientUpdated {
                id: "p-1".to_owned(),
            },
            Change::PatientDeleted {
                id: "p-1".to_owned(),
            },
        ] {
            assert!(stale(&change, &listing), "{change:?}");
            assert!(stale(&change, &QueryKey::new(Resource::Patients)), "{change:?}");
        }
    }

    #[test]
    fn detail_invalidation_is_exact() {
        let change = Change::PatientUpdated {
            id: "p-1".to_owned(),
        };

        assert!(stale(&change, &QueryKey::with_id(Resource::Patient, "p-1")));
        assert!(stale(&change, &QueryKey::with_id(Resource::PatientHistory, "p-1")));
        assert!(!stale(&change, &QueryKey::with_id(Resource::Patient, "p-2")));
    }

    #[test]
    fn each_write_invalidates_its_own_listing() {
        let cases = [
            (
                Change::StudyUploaded {
                    patient_id: "p-1".to_owned(),
                },
                Resource::Studies,
            ),
            (Change::AnalysisCreated, Resource::Analyses),
            (Change::ReportCreated, Resource::Reports),
            (
                Change::ReportFinalized {
                    id: "r-1".to_owned(),
                },
                Resource::Reports,
            ),
            (Change::ConfigUpdated, Resource::Config),
        ];

        for (change, resource) in cases {
            assert!(
                change
                    .invalidations()
                    .contains(&Invalidation::Resource(resource)),
                "{change:?}"
            );
        }
    }

    #[test]
    fn unrelated_reads_survive() {
        let health = QueryKey::new(Resource::Health);
        let study = QueryKey::with_id(Resource::Study, "s-1");

        for change in [
            Change::PatientCreated,
            Change::AnalysisCreated,
            Change::ReportCreated,
            Change::ConfigUpdated,
        ] {
            assert!(!stale(&change, &health));
            assert!(!stale(&change, &study));
        }
    }
}
