// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Subcommand;
use tabled::Tabled;

use super::{or_dash, print_details, print_rows, Context};
use crate::{
    error::Result,
    gateway::model::{Report, ReportRequest},
};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Impression")]
    impression: String,
    #[tabled(rename = "Approved")]
    approved: String,
}

impl From<&Report> for Row {
    fn from(value: &Report) -> Self {
        Self {
            id: value.id.clone(),
            version: value.version,
            status: value.status.to_string(),
            impression: value.impression.clone(),
            approved: or_dash(value.approved_at.map(|at| at.to_string()).as_deref()),
        }
    }
}

fn print_report(report: &Report) {
    print_details([
        ("ID", Some(report.id.clone())),
        ("Study", Some(report.study_id.clone())),
        ("Analysis", report.analysis_id.clone()),
        ("Status", Some(report.status.to_string())),
        ("Version", Some(report.version.to_string())),
        ("Indication", report.clinical_indication.clone()),
        ("Technique", report.technique.clone()),
        ("Findings", Some(report.findings_narrative.clone())),
        ("Impression", Some(report.impression.clone())),
        ("Recommendations", report.recommendations.clone()),
        ("Comparison", report.comparison_notes.clone()),
        ("Disclaimer", report.disclaimer.clone()),
        ("Approved", report.approved_at.map(|at| at.to_string())),
    ]);
}

/// Work with radiology reports.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Draft a report from a completed analysis.
    Create {
        #[arg(long, short)]
        study: String,

        #[arg(long, short)]
        analysis: String,

        /// Leave the AI-generated content disclaimer out of the report.
        #[arg(long)]
        no_disclaimer: bool,
    },
    /// Show one report.
    Get { id: String },
    /// List the reports for a study.
    List {
        /// The study whose reports to list.
        study: String,
    },
    /// Mark a draft report as final.
    Finalize { id: String },
    /// Save a report as a PDF file.
    ExportPdf {
        id: String,

        /// The directory to save into.
        #[arg(long, short, default_value = ".", value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,
    },
    /// Print a report as a structured JSON document.
    ExportJson { id: String },
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let dashboard = &ctx.dashboard;

        match self {
            Self::Create {
                study,
                analysis,
                no_disclaimer,
            } => {
                let report = dashboard
                    .create_report(ReportRequest {
                        study_id: study,
                        analysis_id: analysis,
                        include_ai_disclaimer: !no_disclaimer,
                    })
                    .await?;
                print_report(&report);
            }
            Self::Get { id } => {
                if let Some(report) = dashboard.report(&id).await? {
                    print_report(&report);
                }
            }
            Self::List { study } => {
                if let Some(reports) = dashboard.reports_by_study(&study).await? {
                    print_rows(reports.iter().map(Row::from), "No reports found");
                }
            }
            Self::Finalize { id } => {
                let report = dashboard.finalize_report(&id).await?;
                println!("Report {} is now {}", report.id, report.status);
            }
            Self::ExportPdf { id, dir } => {
                let path = dashboard.export_report_pdf(&id, &dir).await?;
                println!("Saved {}", path.display());
            }
            Self::ExportJson { id } => {
                if let Some(export) = dashboard.report_export(&id).await? {
                    println!("{}", serde_json::to_string_pretty(&*export)?);
                }
            }
        }
        Ok(())
    }
}
