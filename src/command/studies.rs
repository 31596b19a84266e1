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
    gateway::model::{Series, Study},
};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Modality")]
    modality: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Study> for Row {
    fn from(value: &Study) -> Self {
        Self {
            id: value.id.clone(),
            date: value.study_date.date().to_string(),
            modality: value.modality.to_string(),
            description: or_dash(value.study_description.as_deref()),
            status: value.status.to_string(),
        }
    }
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Series UID")]
    uid: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Body part")]
    body_part: String,
    #[tabled(rename = "Images")]
    images: String,
}

impl From<&Series> for SeriesRow {
    fn from(value: &Series) -> Self {
        Self {
            uid: value.series_instance_uid.clone(),
            description: or_dash(value.series_description.as_deref()),
            body_part: or_dash(value.body_part_examined.as_deref()),
            images: value
                .image_count
                .map_or_else(|| "-".to_owned(), |count| count.to_string()),
        }
    }
}

/// Work with imaging studies.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upload DICOM files as a new study.
    Upload {
        /// The patient the study belongs to.
        #[arg(long, short)]
        patient: String,

        /// The DICOM files making up the study.
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },
    /// Show one study and its series.
    Get { id: String },
    /// List the studies of a patient.
    List {
        /// The patient whose studies to list.
        patient: String,
    },
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let dashboard = &ctx.dashboard;

        match self {
            Self::Upload { patient, files } => {
                let result = dashboard.upload_study(&patient, files).await?;
                print_details([
                    ("Study", Some(result.study_id)),
                    ("Study UID", Some(result.study_instance_uid)),
                    ("Series", Some(result.series_count.to_string())),
                    ("Images", Some(result.total_images.to_string())),
                    ("Status", Some(result.status)),
                ]);
            }
            Self::Get { id } => {
                if let Some(study) = dashboard.study(&id).await? {
                    print_details([
                        ("ID", Some(study.id.clone())),
                        ("Study UID", Some(study.study_instance_uid.clone())),
                        ("Patient", Some(study.patient_id.clone())),
                        ("Accession", study.accession_number.clone()),
                        ("Date", Some(study.study_date.to_string())),
                        ("Modality", Some(study.modality.to_string())),
                        ("Description", study.study_description.clone()),
                        ("Indication", study.clinical_indication.clone()),
                        ("Referrer", study.referring_physician.clone()),
                        ("Institution", study.institution_name.clone()),
                        ("Prior study", study.prior_study_id.clone()),
                    ]);
                    print_rows(study.series.iter().map(SeriesRow::from), "No series");
                }
            }
            Self::List { patient } => {
                if let Some(studies) = dashboard.studies_by_patient(&patient).await? {
                    print_rows(studies.iter().map(Row::from), "No studies found");
                }
            }
        }
        Ok(())
    }
}
