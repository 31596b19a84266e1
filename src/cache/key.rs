// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::Serialize;

/// The kinds of cached reads. Invalidating a resource invalidates every key
/// built from it, whatever its parameters.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) enum Resource {
    Health,
    Config,
    Patients,
    Patient,
    PatientHistory,
    Studies,
    Study,
    Analyses,
    Analysis,
    Reports,
    Report,
    ReportExport,
}

impl Resource {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Config => "config",
            Self::Patients => "patients",
            Self::Patient => "patient",
            Self::PatientHistory => "patient-history",
            Self::Studies => "studies",
            Self::Study => "study",
            Self::Analyses => "analyses",
            Self::Analysis => "analysis",
            Self::Reports => "reports",
            Self::Report => "report",
            Self::ReportExport => "report-export",
        }
    }
}

/// Identifies one cached read. Parameters are held in canonical JSON form so
/// that structurally equal parameters compare equal.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct QueryKey {
    resource: Resource,
    params: Option<String>,
}

impl QueryKey {
    pub(crate) const fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: None,
        }
    }

    pub(crate) fn with_params<P: Serialize>(resource: Resource, params: &P) -> Self {
        // `serde_json::Value` objects keep their keys sorted.
        let params = serde_json::to_value(params)
            .map_or_else(|e| format!("!{e}"), |value| value.to_string());
        Self {
            resource,
            params: Some(params),
        }
    }

    pub(crate) fn with_id(resource: Resource, id: &str) -> Self {
        Self::with_params(resource, &id)
    }

    pub(crate) const fn resource(&self) -> Resource {
        self.resource
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params {
            Some(ref params) => write!(f, "{}{}", self.resource.name(), params),
            None => f.write_str(self.resource.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::gateway::model::PatientQuery;

    #[test]
    fn equal_parameters_make_equal_keys() {
        let search = |term: &str| PatientQuery {
            search: Some(term.to_owned()),
            ..PatientQuery::default()
        };

        assert_eq!(
            QueryKey::with_params(Resource::Patients, &search("smith")),
            QueryKey::with_params(Resource::Patients, &search("smith"))
        );
        assert_ne!(
            QueryKey::with_params(Resource::Patients, &search("smith")),
            QueryKey::with_params(Resource::Patients, &search("jones"))
        );
        assert_ne!(
            QueryKey::with_id(Resource::Patient, "p-1"),
            QueryKey::with_id(Resource::PatientHistory, "p-1")
        );
    }

    #[test]
    fn map_parameters_are_order_independent() {
        let forward: BTreeMap<_, _> = [("a", 1), ("b", 2)].into_iter().collect();
        let mut reverse = serde_json::Map::new();
        _ = reverse.insert("b".to_owned(), 2.into());
        _ = reverse.insert("a".to_owned(), 1.into());

        assert_eq!(
            QueryKey::with_params(Resource::Config, &forward),
            QueryKey::with_params(Resource::Config, &reverse)
        );
    }

    #[test]
    fn displays_resource_and_parameters() {
        assert_eq!(QueryKey::new(Resource::Health).to_string(), "health");
        assert_eq!(
            QueryKey::with_id(Resource::Study, "s-1").to_string(),
            r#"study"s-1""#
        );
    }
}
