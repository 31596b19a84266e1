// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Request and response records exchanged with the backend.
//!
//! Responses tolerate extra fields but reject missing required ones, so a
//! backend that changes shape fails at the gateway rather than somewhere
//! downstream.

use std::{collections::BTreeMap, fmt};

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize, Serializer};

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

const fn yes() -> bool {
    true
}

/// Displays a unit-variant enum under the name it has on the wire.
macro_rules! display_as_serialized {
    ($($ty:ty),* $(,)?) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
                f.write_str(value.as_str().ok_or(fmt::Error)?)
            }
        }
    )*};
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Admin,
    Radiologist,
    Technician,
    Viewer,
}

fn fmt_value_enum<T: ValueEnum>(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(value.to_possible_value().ok_or(fmt::Error)?.get_name())
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value_enum(self, f)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<Role>,
    #[serde(default = "yes")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct Registration {
    pub(crate) username: String,
    pub(crate) email: String,
    #[serde(serialize_with = "expose")]
    pub(crate) password: SecretString,
    pub(crate) full_name: String,
    pub(crate) role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: SecretString,
    #[serde(default = "TokenResponse::default_token_type")]
    pub(crate) token_type: String,
}

impl TokenResponse {
    fn default_token_type() -> String {
        "bearer".to_owned()
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Patient {
    pub(crate) id: String,
    pub(crate) patient_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) date_of_birth: NaiveDate,
    #[serde(default)]
    pub(crate) gender: Gender,
    pub(crate) contact_phone: Option<String>,
    pub(crate) contact_email: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) medical_record_number: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) updated_at: NaiveDateTime,
    #[serde(default)]
    pub(crate) study_count: u32,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value_enum(self, f)
    }
}

impl Patient {
    pub(crate) fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct NewPatient {
    pub(crate) patient_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) date_of_birth: NaiveDate,
    pub(crate) gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) medical_record_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notes: Option<String>,
}

/// A partial update. Fields left unset are not sent, so the backend keeps
/// their current values.
#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) medical_record_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notes: Option<String>,
}

impl PatientUpdate {
    pub(crate) fn is_empty(&self) -> bool {
        serde_json::to_value(self).map_or(true, |value| {
            value.as_object().map_or(true, serde_json::Map::is_empty)
        })
    }
}

/// Listing parameters. These also identify the cached listing, so two
/// structurally equal queries share one entry.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct PatientQuery {
    pub(crate) skip: Option<u32>,
    pub(crate) limit: Option<u32>,
    pub(crate) search: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct PatientHistory {
    #[serde(flatten)]
    pub(crate) patient: Patient,
    pub(crate) total_studies: u32,
    pub(crate) latest_study_date: Option<NaiveDateTime>,
    pub(crate) modalities: Vec<String>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub(crate) enum Modality {
    #[serde(rename = "CT")]
    Ct,
    #[serde(rename = "MR")]
    Mr,
    #[serde(rename = "XR")]
    Xr,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "OTHER")]
    Other,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::Ct => "CT",
            Self::Mr => "MR",
            Self::Xr => "XR",
            Self::Us => "US",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StudyStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Archived,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Series {
    pub(crate) id: String,
    pub(crate) series_instance_uid: String,
    #[serde(default)]
    pub(crate) series_number: Option<i32>,
    #[serde(default)]
    pub(crate) series_description: Option<String>,
    #[serde(default)]
    pub(crate) modality: Option<String>,
    #[serde(default)]
    pub(crate) body_part_examined: Option<String>,
    #[serde(default)]
    pub(crate) image_count: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Study {
    pub(crate) id: String,
    pub(crate) study_instance_uid: String,
    pub(crate) patient_id: String,
    #[serde(default)]
    pub(crate) accession_number: Option<String>,
    pub(crate) study_date: NaiveDateTime,
    #[serde(default)]
    pub(crate) study_description: Option<String>,
    pub(crate) modality: Modality,
    #[serde(default)]
    pub(crate) referring_physician: Option<String>,
    #[serde(default)]
    pub(crate) institution_name: Option<String>,
    #[serde(default)]
    pub(crate) clinical_indication: Option<String>,
    pub(crate) status: StudyStatus,
    #[serde(default)]
    pub(crate) prior_study_id: Option<String>,
    #[serde(default)]
    pub(crate) series: Vec<Series>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct UploadResult {
    pub(crate) study_id: String,
    pub(crate) study_instance_uid: String,
    pub(crate) series_count: u32,
    pub(crate) total_images: u32,
    pub(crate) status: String,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AnalysisType {
    #[default]
    Primary,
    Comparison,
    Focused,
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value_enum(self, f)
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct AnalysisRequest {
    pub(crate) study_id: String,
    pub(crate) clinical_indication: String,
    pub(crate) analysis_type: AnalysisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) prior_study_id: Option<String>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AnalysisStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Reviewed,
}

/// The acknowledgement returned when an analysis is started.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct AnalysisSummary {
    pub(crate) analysis_id: String,
    pub(crate) status: AnalysisStatus,
    pub(crate) findings_count: u32,
    pub(crate) measurements_count: u32,
    pub(crate) confidence_score: Option<f64>,
    pub(crate) processing_time: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Finding {
    #[serde(rename = "type", alias = "finding_type")]
    pub(crate) kind: String,
    #[serde(default, alias = "anatomical_location")]
    pub(crate) location: Option<String>,
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) severity: Option<String>,
    #[serde(default, alias = "confidence_score")]
    pub(crate) confidence: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Measurement {
    #[serde(rename = "type", alias = "measurement_type")]
    pub(crate) kind: String,
    pub(crate) value: f64,
    pub(crate) unit: String,
    #[serde(default)]
    pub(crate) location: Option<String>,
}

/// An analysis as returned by the detail endpoint, or the bare record as
/// returned by the per-study listing (which carries no findings).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Analysis {
    pub(crate) id: String,
    pub(crate) study_id: String,
    pub(crate) status: AnalysisStatus,
    pub(crate) analysis_type: String,
    #[serde(default)]
    pub(crate) raw_response: Option<String>,
    #[serde(default)]
    pub(crate) structured_findings: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) confidence_score: Option<f64>,
    #[serde(default, alias = "processing_time_seconds")]
    pub(crate) processing_time: Option<f64>,
    #[serde(default)]
    pub(crate) findings: Vec<Finding>,
    #[serde(default)]
    pub(crate) measurements: Vec<Measurement>,
    pub(crate) created_at: NaiveDateTime,
    #[serde(default)]
    pub(crate) completed_at: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ReportRequest {
    pub(crate) study_id: String,
    pub(crate) analysis_id: String,
    pub(crate) include_ai_disclaimer: bool,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ReportStatus {
    Draft,
    Final,
    Amended,
    Archived,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Report {
    pub(crate) id: String,
    pub(crate) study_id: String,
    #[serde(default)]
    pub(crate) analysis_id: Option<String>,
    #[serde(default)]
    pub(crate) report_type: Option<String>,
    pub(crate) status: ReportStatus,
    #[serde(default = "Report::first_version")]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) clinical_indication: Option<String>,
    #[serde(default)]
    pub(crate) technique: Option<String>,
    pub(crate) findings_narrative: String,
    pub(crate) impression: String,
    #[serde(default)]
    pub(crate) recommendations: Option<String>,
    #[serde(default)]
    pub(crate) comparison_notes: Option<String>,
    #[serde(default)]
    pub(crate) structured_findings: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) measurements_table: Option<serde_json::Value>,
    #[serde(default = "yes")]
    pub(crate) ai_generated: bool,
    #[serde(default)]
    pub(crate) disclaimer: Option<String>,
    pub(crate) created_at: NaiveDateTime,
    #[serde(default)]
    pub(crate) approved_at: Option<NaiveDateTime>,
}

impl Report {
    const fn first_version() -> u32 {
        1
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub(crate) struct ExportedPatient {
    pub(crate) patient_id: String,
    pub(crate) name: String,
    pub(crate) date_of_birth: String,
    pub(crate) gender: Gender,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub(crate) struct ExportedStudy {
    pub(crate) study_id: String,
    pub(crate) study_instance_uid: String,
    #[serde(default)]
    pub(crate) accession_number: Option<String>,
    pub(crate) study_date: String,
    pub(crate) modality: Modality,
    #[serde(default)]
    pub(crate) study_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub(crate) struct ExportedContent {
    #[serde(default)]
    pub(crate) clinical_indication: Option<String>,
    #[serde(default)]
    pub(crate) technique: Option<String>,
    pub(crate) findings: String,
    pub(crate) impression: String,
    #[serde(default)]
    pub(crate) recommendations: Option<String>,
    #[serde(default)]
    pub(crate) comparison_notes: Option<String>,
}

/// The self-contained document produced by the JSON report export.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub(crate) struct ReportExport {
    pub(crate) report_id: String,
    pub(crate) version: u32,
    pub(crate) status: ReportStatus,
    pub(crate) generated_at: String,
    pub(crate) ai_generated: bool,
    pub(crate) patient: ExportedPatient,
    pub(crate) study: ExportedStudy,
    pub(crate) content: ExportedContent,
    #[serde(default)]
    pub(crate) structured_data: serde_json::Value,
    #[serde(default)]
    pub(crate) disclaimer: Option<String>,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Mode {
    Offline,
    Online,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub(crate) struct Features {
    pub(crate) pacs_integration: bool,
    pub(crate) ris_integration: bool,
    pub(crate) fhir_integration: bool,
    pub(crate) offline_sync: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) mode: Mode,
    pub(crate) features: Features,
    pub(crate) supported_modalities: Vec<String>,
    pub(crate) max_upload_size: u64,
}

pub(crate) type ConfigUpdate = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct ConfigUpdateAck {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) applied: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub(crate) struct Health {
    pub(crate) status: String,
    pub(crate) mode: Mode,
    #[serde(default)]
    pub(crate) components: BTreeMap<String, bool>,
}

display_as_serialized!(StudyStatus, AnalysisStatus, ReportStatus, Mode);

impl Health {
    pub(crate) fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.components.values().all(|up| *up)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub(crate) fn user(username: &str) -> Value {
        json!({
            "id": "4c7c1e0e-7b0b-4a55-9a57-1f0e0e7f0a01",
            "username": username,
            "email": format!("{username}@example.org"),
            "full_name": "Dr. Example",
            "role": "radiologist",
            "is_active": true,
        })
    }

    pub(crate) fn patient(id: &str, last_name: &str) -> Value {
        json!({
            "id": id,
            "patient_id": format!("MRN-{id}"),
            "first_name": "Jane",
            "last_name": last_name,
            "date_of_birth": "1971-03-04",
            "gender": "female",
            "contact_phone": null,
            "contact_email": null,
            "address": null,
            "medical_record_number": null,
            "notes": null,
            "created_at": "2024-05-01T09:30:00.123456",
            "updated_at": "2024-05-01T09:30:00.123456",
            "study_count": 0,
        })
    }

    pub(crate) fn study(id: &str, patient_id: &str) -> Value {
        json!({
            "id": id,
            "study_instance_uid": format!("1.2.840.{id}"),
            "patient_id": patient_id,
            "study_date": "2024-05-02T00:00:00",
            "modality": "CT",
            "status": "completed",
        })
    }

    pub(crate) fn report(id: &str, study_id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "study_id": study_id,
            "analysis_id": "a-1",
            "status": status,
            "version": 1,
            "findings_narrative": "No acute findings.",
            "impression": "Normal study.",
            "created_at": "2024-05-02T10:00:00",
        })
    }

    pub(crate) fn health() -> Value {
        json!({
            "status": "healthy",
            "mode": "offline",
            "components": { "medgemma": true, "database": true, "storage": true },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_test::{assert_ser_tokens, Token};

    use super::*;

    #[test]
    fn patient_update_only_sends_set_fields() {
        let update = PatientUpdate {
            last_name: Some("Smith".to_owned()),
            gender: Some(Gender::Female),
            ..PatientUpdate::default()
        };

        assert_ser_tokens(
            &update,
            &[
                Token::Struct {
                    name: "PatientUpdate",
                    len: 2,
                },
                Token::Str("last_name"),
                Token::Some,
                Token::Str("Smith"),
                Token::Str("gender"),
                Token::Some,
                Token::UnitVariant {
                    name: "Gender",
                    variant: "female",
                },
                Token::StructEnd,
            ],
        );
        assert!(!update.is_empty());
        assert!(PatientUpdate::default().is_empty());
    }

    #[test]
    fn registration_sends_the_password_in_clear() {
        let registration = Registration {
            username: "doctor1".to_owned(),
            email: "doctor1@example.org".to_owned(),
            password: SecretString::new("test123".to_owned()),
            full_name: "Doctor One".to_owned(),
            role: Role::Radiologist,
        };

        let value = serde_json::to_value(&registration).expect("serializable");
        assert_eq!(value["password"], "test123");
        assert_eq!(value["role"], "radiologist");
        assert!(!format!("{registration:?}").contains("test123"));
    }

    #[test]
    fn history_flattens_the_patient() {
        let mut value = fixtures::patient("p-1", "Smith");
        let object = value.as_object_mut().expect("object");
        _ = object.insert("total_studies".to_owned(), 2.into());
        _ = object.insert("latest_study_date".to_owned(), "2024-05-02T00:00:00".into());
        _ = object.insert("modalities".to_owned(), serde_json::json!(["CT", "MR"]));

        let history: PatientHistory = serde_json::from_value(value).expect("valid history");
        assert_eq!(history.patient.last_name, "Smith");
        assert_eq!(history.total_studies, 2);
        assert_eq!(history.modalities, ["CT", "MR"]);
    }

    #[test]
    fn listed_analyses_accept_raw_column_names() {
        let analysis: Analysis = serde_json::from_value(serde_json::json!({
            "id": "a-1",
            "study_id": "s-1",
            "status": "completed",
            "analysis_type": "primary",
            "processing_time_seconds": 4.5,
            "created_at": "2024-05-02T10:00:00",
        }))
        .expect("valid analysis");

        assert_eq!(analysis.processing_time, Some(4.5));
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let result = serde_json::from_value::<Patient>(serde_json::json!({
            "id": "p-1",
            "first_name": "Jane",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn health_requires_every_component() {
        let mut health: Health = serde_json::from_value(fixtures::health()).expect("valid health");
        assert!(health.is_healthy());

        _ = health.components.insert("medgemma".to_owned(), false);
        assert!(!health.is_healthy());
    }
}
