// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Subcommand;
use tabled::Tabled;

use super::{or_dash, print_details, print_rows, Context};
use crate::{
    error::Result,
    gateway::model::{Analysis, AnalysisRequest, AnalysisType, Finding, Measurement},
};

fn percent(score: Option<f64>) -> Option<String> {
    score.map(|score| format!("{:.0}%", score * 100.0))
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&Analysis> for Row {
    fn from(value: &Analysis) -> Self {
        Self {
            id: value.id.clone(),
            kind: value.analysis_type.clone(),
            status: value.status.to_string(),
            confidence: or_dash(percent(value.confidence_score).as_deref()),
            created: value.created_at.to_string(),
        }
    }
}

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Finding")]
    kind: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Finding> for FindingRow {
    fn from(value: &Finding) -> Self {
        Self {
            kind: value.kind.clone(),
            location: or_dash(value.location.as_deref()),
            severity: or_dash(value.severity.as_deref()),
            description: value.description.clone(),
        }
    }
}

#[derive(Tabled)]
struct MeasurementRow {
    #[tabled(rename = "Measurement")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Location")]
    location: String,
}

impl From<&Measurement> for MeasurementRow {
    fn from(value: &Measurement) -> Self {
        Self {
            kind: value.kind.clone(),
            value: format!("{} {}", value.value, value.unit),
            location: or_dash(value.location.as_deref()),
        }
    }
}

/// Work with AI analyses of studies.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Start an analysis of a study.
    Create {
        /// The study to analyse.
        #[arg(long, short)]
        study: String,

        /// Why the study was ordered.
        #[arg(long, short)]
        indication: String,

        #[arg(long = "type", value_enum, default_value_t = AnalysisType::Primary)]
        analysis_type: AnalysisType,

        /// An earlier study to compare against.
        #[arg(long)]
        prior: Option<String>,
    },
    /// Show one analysis with its findings and measurements.
    Get { id: String },
    /// List the analyses of a study.
    List {
        /// The study whose analyses to list.
        study: String,
    },
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let dashboard = &ctx.dashboard;

        match self {
            Self::Create {
                study,
                indication,
                analysis_type,
                prior,
            } => {
                let summary = dashboard
                    .create_analysis(AnalysisRequest {
                        study_id: study,
                        clinical_indication: indication,
                        analysis_type,
                        prior_study_id: prior,
                    })
                    .await?;
                print_details([
                    ("Analysis", Some(summary.analysis_id)),
                    ("Status", Some(summary.status.to_string())),
                    ("Findings", Some(summary.findings_count.to_string())),
                    ("Measurements", Some(summary.measurements_count.to_string())),
                    ("Confidence", percent(summary.confidence_score)),
                    ("Time", Some(format!("{:.1} s", summary.processing_time))),
                ]);
            }
            Self::Get { id } => {
                if let Some(analysis) = dashboard.analysis(&id).await? {
                    print_details([
                        ("ID", Some(analysis.id.clone())),
                        ("Study", Some(analysis.study_id.clone())),
                        ("Type", Some(analysis.analysis_type.clone())),
                        ("Status", Some(analysis.status.to_string())),
                        ("Confidence", percent(analysis.confidence_score)),
                        (
                            "Time",
                            analysis.processing_time.map(|time| format!("{time:.1} s")),
                        ),
                        ("Completed", analysis.completed_at.map(|at| at.to_string())),
                    ]);
                    print_rows(analysis.findings.iter().map(FindingRow::from), "No findings");
                    print_rows(
                        analysis.measurements.iter().map(MeasurementRow::from),
                        "No measurements",
                    );
                }
            }
            Self::List { study } => {
                if let Some(analyses) = dashboard.analyses_by_study(&study).await? {
                    print_rows(analyses.iter().map(Row::from), "No analyses found");
                }
            }
        }
        Ok(())
    }
}
