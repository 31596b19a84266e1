// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use reqwest::Method;
use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};

use super::{
    model::{
        Analysis, AnalysisRequest, AnalysisSummary, Config, ConfigUpdate, ConfigUpdateAck, Health,
        NewPatient, Patient, PatientHistory as History, PatientQuery, PatientUpdate, Registration,
        Report, ReportExport, ReportRequest, Study, User,
    },
    transport::Body,
};
use crate::error::Result;

/// One backend capability: where it lives, how its request is encoded, and
/// what it answers with.
pub(crate) trait Endpoint {
    type Response: DeserializeOwned;

    fn method(&self) -> Method {
        Method::GET
    }

    /// The route as path segments. Each segment is percent-encoded when the
    /// URL is built, so an identifier always stays within its own segment.
    fn path(&self) -> Vec<&str>;

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![]
    }

    fn body(&self) -> Result<Body> {
        Ok(Body::Empty)
    }
}

fn json<T: Serialize>(value: &T) -> Result<Body> {
    Ok(Body::Json(serde_json::to_vec(value)?))
}

pub(crate) struct Me;

impl Endpoint for Me {
    type Response = User;

    fn path(&self) -> Vec<&str> {
        vec!["api", "auth", "me"]
    }
}

pub(crate) struct Register<'reg>(pub(crate) &'reg Registration);

impl Endpoint for Register<'_> {
    type Response = User;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "auth", "register"]
    }

    fn body(&self) -> Result<Body> {
        json(self.0)
    }
}

pub(crate) struct ListPatients<'query>(pub(crate) &'query PatientQuery);

impl Endpoint for ListPatients<'_> {
    type Response = Vec<Patient>;

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients"]
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![];
        if let Some(skip) = self.0.skip.filter(|skip| *skip > 0) {
            query.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.0.limit.filter(|limit| *limit > 0) {
            query.push(("limit", limit.to_string()));
        }
        if let Some(search) = self.0.search.as_ref().filter(|search| !search.is_empty()) {
            query.push(("search", search.clone()));
        }
        query
    }
}

pub(crate) struct GetPatient<'id>(pub(crate) &'id str);

impl Endpoint for GetPatient<'_> {
    type Response = Patient;

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients", self.0]
    }
}

pub(crate) struct PatientHistory<'id>(pub(crate) &'id str);

impl Endpoint for PatientHistory<'_> {
    type Response = History;

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients", self.0, "history"]
    }
}

pub(crate) struct CreatePatient<'patient>(pub(crate) &'patient NewPatient);

impl Endpoint for CreatePatient<'_> {
    type Response = Patient;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients"]
    }

    fn body(&self) -> Result<Body> {
        json(self.0)
    }
}

pub(crate) struct UpdatePatient<'req> {
    pub(crate) id: &'req str,
    pub(crate) update: &'req PatientUpdate,
}

impl Endpoint for UpdatePatient<'_> {
    type Response = Patient;

    fn method(&self) -> Method {
        Method::PATCH
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients", self.id]
    }

    fn body(&self) -> Result<Body> {
        json(self.update)
    }
}

/// Answers 204 with no body.
pub(crate) struct DeletePatient<'id>(pub(crate) &'id str);

impl Endpoint for DeletePatient<'_> {
    type Response = IgnoredAny;

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "patients", self.0]
    }
}

pub(crate) struct GetStudy<'id>(pub(crate) &'id str);

impl Endpoint for GetStudy<'_> {
    type Response = Study;

    fn path(&self) -> Vec<&str> {
        vec!["api", "studies", self.0]
    }
}

pub(crate) struct StudiesByPatient<'id>(pub(crate) &'id str);

impl Endpoint for StudiesByPatient<'_> {
    type Response = Vec<Study>;

    fn path(&self) -> Vec<&str> {
        vec!["api", "studies", "patient", self.0]
    }
}

pub(crate) struct CreateAnalysis<'req>(pub(crate) &'req AnalysisRequest);

impl Endpoint for CreateAnalysis<'_> {
    type Response = AnalysisSummary;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "analysis"]
    }

    fn body(&self) -> Result<Body> {
        json(self.0)
    }
}

pub(crate) struct GetAnalysis<'id>(pub(crate) &'id str);

impl Endpoint for GetAnalysis<'_> {
    type Response = Analysis;

    fn path(&self) -> Vec<&str> {
        vec!["api", "analysis", self.0]
    }
}

pub(crate) struct AnalysesByStudy<'id>(pub(crate) &'id str);

impl Endpoint for AnalysesByStudy<'_> {
    type Response = Vec<Analysis>;

    fn path(&self) -> Vec<&str> {
        vec!["api", "analysis", "study", self.0, "analyses"]
    }
}

pub(crate) struct CreateReport<'req>(pub(crate) &'req ReportRequest);

impl Endpoint for CreateReport<'_> {
    type Response = Report;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "reports"]
    }

    fn body(&self) -> Result<Body> {
        json(self.0)
    }
}

pub(crate) struct GetReport<'id>(pub(crate) &'id str);

impl Endpoint for GetReport<'_> {
    type Response = Report;

    fn path(&self) -> Vec<&str> {
        vec!["api", "reports", self.0]
    }
}

pub(crate) struct ReportsByStudy<'id>(pub(crate) &'id str);

impl Endpoint for ReportsByStudy<'_> {
    type Response = Vec<Report>;

    fn path(&self) -> Vec<&str> {
        vec!["api", "reports", "study", self.0]
    }
}

pub(crate) struct FinalizeReport<'id>(pub(crate) &'id str);

impl Endpoint for FinalizeReport<'_> {
    type Response = Report;

    fn method(&self) -> Method {
        Method::PATCH
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "reports", self.0, "finalize"]
    }
}

pub(crate) struct ExportReportJson<'id>(pub(crate) &'id str);

impl Endpoint for ExportReportJson<'_> {
    type Response = ReportExport;

    fn path(&self) -> Vec<&str> {
        vec!["api", "export", "report", self.0, "json"]
    }
}

pub(crate) struct GetConfig;

impl Endpoint for GetConfig {
    type Response = Config;

    fn path(&self) -> Vec<&str> {
        vec!["api", "config"]
    }
}

pub(crate) struct UpdateConfig<'update>(pub(crate) &'update ConfigUpdate);

impl Endpoint for UpdateConfig<'_> {
    type Response = ConfigUpdateAck;

    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> Vec<&str> {
        vec!["api", "config"]
    }

    fn body(&self) -> Result<Body> {
        json(self.0)
    }
}

pub(crate) struct GetHealth;

impl Endpoint for GetHealth {
    type Response = Health;

    fn path(&self) -> Vec<&str> {
        vec!["health"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_meaningful_listing_parameters_are_sent() {
        assert!(ListPatients(&PatientQuery::default()).query().is_empty());

        let query = PatientQuery {
            skip: Some(0),
            limit: Some(25),
            search: Some(String::new()),
        };
        assert_eq!(ListPatients(&query).query(), [("limit", "25".to_owned())]);

        let query = PatientQuery {
            skip: Some(50),
            limit: None,
            search: Some("smith".to_owned()),
        };
        assert_eq!(
            ListPatients(&query).query(),
            [("skip", "50".to_owned()), ("search", "smith".to_owned())]
        );
    }

    #[test]
    fn writes_use_the_backend_verbs() {
        let update = PatientUpdate::default();
        assert_eq!(
            UpdatePatient {
                id: "p-1",
                update: &update
            }
            .method(),
            Method::PATCH
        );
        assert_eq!(DeletePatient("p-1").method(), Method::DELETE);
        assert_eq!(FinalizeReport("r-1").method(), Method::PATCH);
        assert_eq!(UpdateConfig(&ConfigUpdate::new()).method(), Method::PUT);
        assert_eq!(FinalizeReport("r-1").path(), ["api", "reports", "r-1", "finalize"]);
        assert_eq!(
            AnalysesByStudy("s-1").path(),
            ["api", "analysis", "study", "s-1", "analyses"]
        );
    }

    #[test]
    fn bodies_are_json() {
        let request = ReportRequest {
            study_id: "s-1".to_owned(),
            analysis_id: "a-1".to_owned(),
            include_ai_disclaimer: true,
        };

        match CreateReport(&request).body().expect("encodable") {
            Body::Json(data) => {
                let value: serde_json::Value = serde_json::from_slice(&data).expect("JSON");
                assert_eq!(value["include_ai_disclaimer"], true);
            }
            other => panic!("expected JSON, got {other:?}"),
        }
    }
}
