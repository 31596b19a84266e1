// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use log::error;
use tabled::Tabled;

use super::{print_details, print_rows, Context};
use crate::{
    error::{self, Result},
    gateway::model::{Gender, NewPatient, Patient, PatientQuery, PatientUpdate},
};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Patient ID")]
    patient_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Born")]
    date_of_birth: NaiveDate,
    #[tabled(rename = "Gender")]
    gender: Gender,
    #[tabled(rename = "Studies")]
    study_count: u32,
}

impl From<&Patient> for Row {
    fn from(value: &Patient) -> Self {
        Self {
            id: value.id.clone(),
            patient_id: value.patient_id.clone(),
            name: value.full_name(),
            date_of_birth: value.date_of_birth,
            gender: value.gender,
            study_count: value.study_count,
        }
    }
}

fn print_patient(patient: &Patient) {
    print_details([
        ("ID", Some(patient.id.clone())),
        ("Patient ID", Some(patient.patient_id.clone())),
        ("Name", Some(patient.full_name())),
        ("Born", Some(patient.date_of_birth.to_string())),
        ("Gender", Some(patient.gender.to_string())),
        ("MRN", patient.medical_record_number.clone()),
        ("Phone", patient.contact_phone.clone()),
        ("Email", patient.contact_email.clone()),
        ("Address", patient.address.clone()),
        ("Notes", patient.notes.clone()),
        ("Studies", Some(patient.study_count.to_string())),
        ("Updated", Some(patient.updated_at.to_string())),
    ]);
}

/// Optional contact and record details shared by `create` and `update`.
#[derive(Debug, Args)]
pub(crate) struct Contact {
    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    address: Option<String>,

    /// The medical record number assigned by the hospital.
    #[arg(long)]
    mrn: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

/// Work with patient records.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List patients, optionally filtered by a search term.
    List {
        /// Match against names and patient identifiers.
        #[arg(long, short)]
        search: Option<String>,

        /// The number of records to skip.
        #[arg(long)]
        skip: Option<u32>,

        /// The maximum number of records to return.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one patient.
    Get { id: String },
    /// Show a patient together with a summary of their imaging history.
    History { id: String },
    /// Register a new patient.
    Create {
        /// The patient identifier used by the imaging department.
        #[arg(long)]
        patient_id: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// In YYYY-MM-DD form.
        #[arg(long)]
        date_of_birth: NaiveDate,

        #[arg(long, value_enum, default_value_t = Gender::Unknown)]
        gender: Gender,

        #[command(flatten)]
        contact: Contact,
    },
    /// Change some fields of a patient. Fields not given are left as they are.
    Update {
        id: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        date_of_birth: Option<NaiveDate>,

        #[arg(long, value_enum)]
        gender: Option<Gender>,

        #[command(flatten)]
        contact: Contact,
    },
    /// Delete a patient.
    Delete { id: String },
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let dashboard = &ctx.dashboard;

        match self {
            Self::List {
                search,
                skip,
                limit,
            } => {
                let patients = dashboard
                    .patients(&PatientQuery {
                        skip,
                        limit,
                        search,
                    })
                    .await?;
                print_rows(patients.iter().map(Row::from), "No patients found");
            }
            Self::Get { id } => {
                if let Some(patient) = dashboard.patient(&id).await? {
                    print_patient(&patient);
                }
            }
            Self::History { id } => {
                if let Some(history) = dashboard.patient_history(&id).await? {
                    print_patient(&history.patient);
                    print_details([
                        ("Total studies", Some(history.total_studies.to_string())),
                        (
                            "Latest study",
                            history.latest_study_date.map(|date| date.to_string()),
                        ),
                        ("Modalities", Some(history.modalities.join(", "))),
                    ]);
                }
            }
            Self::Create {
                patient_id,
                first_name,
                last_name,
                date_of_birth,
                gender,
                contact,
            } => {
                let patient = dashboard
                    .create_patient(NewPatient {
                        patient_id,
                        first_name,
                        last_name,
                        date_of_birth,
                        gender,
                        contact_phone: contact.phone,
                        contact_email: contact.email,
                        address: contact.address,
                        medical_record_number: contact.mrn,
                        notes: contact.notes,
                    })
                    .await?;
                println!("Created patient {} ({})", patient.full_name(), patient.id);
            }
            Self::Update {
                id,
                first_name,
                last_name,
                date_of_birth,
                gender,
                contact,
            } => {
                let update = PatientUpdate {
                    first_name,
                    last_name,
                    date_of_birth,
                    gender,
                    contact_phone: contact.phone,
                    contact_email: contact.email,
                    address: contact.address,
                    medical_record_number: contact.mrn,
                    notes: contact.notes,
                };
                if update.is_empty() {
                    error!("Nothing to update for patient {}", id);
                    return Err(error::Error::Command);
                }

                let patient = dashboard.update_patient(&id, update).await?;
                print_patient(&patient);
            }
            Self::Delete { id } => {
                dashboard.delete_patient(&id).await?;
                println!("Deleted patient {id}");
            }
        }
        Ok(())
    }
}
