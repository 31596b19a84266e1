// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Cached reads and declared writes for every backend capability.
//!
//! Reads go through the query cache under a key naming the resource and its
//! parameters. Writes are mutations tagged with the [`Change`] they make, and
//! the cache's rule table decides which reads that change makes stale.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::{Change, Observed, Options, Query, QueryClient, QueryKey, Resource},
    error::Result,
    gateway::{
        endpoint::{
            AnalysesByStudy, CreateAnalysis, CreatePatient, CreateReport, DeletePatient,
            ExportReportJson, FinalizeReport, GetAnalysis, GetConfig, GetHealth, GetPatient,
            GetReport, GetStudy, ListPatients, PatientHistory, ReportsByStudy, StudiesByPatient,
            UpdateConfig, UpdatePatient,
        },
        model::{
            self, Analysis, AnalysisRequest, AnalysisSummary, Config, ConfigUpdate,
            ConfigUpdateAck, Health, NewPatient, Patient, PatientQuery, PatientUpdate, Report,
            ReportExport, ReportRequest, Study, UploadResult,
        },
        transfer, CredentialStore, Gateway,
    },
};

pub(crate) struct Dashboard {
    gateway: Gateway,
    queries: QueryClient,
    consumer: CancellationToken,
}

impl Dashboard {
    /// Reads made through this dashboard stop waiting once `consumer` is
    /// cancelled. Writes are not affected by it.
    pub(crate) fn new(gateway: Gateway, options: Options, consumer: CancellationToken) -> Self {
        Self {
            gateway,
            queries: QueryClient::new(options),
            consumer,
        }
    }

    pub(crate) fn credentials(&self) -> &CredentialStore {
        self.gateway.credentials()
    }

    fn producer<T, F, Fut>(
        &self,
        produce: F,
    ) -> impl Fn() -> Fut + Send + Sync + 'static
    where
        F: Fn(Gateway) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let gateway = self.gateway.clone();
        move || produce(gateway.clone())
    }

    async fn fetch<T, F, Fut>(&self, key: QueryKey, produce: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn(Gateway) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.queries
            .fetch(&key, &self.consumer, self.producer(produce))
            .await
    }

    /// A read keyed by one identifier, skipped while the identifier is empty.
    async fn detail<T, F, Fut>(&self, resource: Resource, id: &str, produce: F) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: Fn(Gateway, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let owned = id.to_owned();
        let query = Query::new(
            QueryKey::with_id(resource, id),
            self.producer(move |gateway| produce(gateway, owned.clone())),
        )
        .enabled(!id.is_empty());
        self.queries.read(query, &self.consumer).await
    }

    pub(crate) async fn health(&self) -> Result<Arc<Health>> {
        self.fetch(QueryKey::new(Resource::Health), |gateway| async move {
            gateway.execute(GetHealth).await
        })
        .await
    }

    pub(crate) async fn config(&self) -> Result<Arc<Config>> {
        self.fetch(QueryKey::new(Resource::Config), |gateway| async move {
            gateway.execute(GetConfig).await
        })
        .await
    }

    pub(crate) async fn patients(&self, query: &PatientQuery) -> Result<Arc<Vec<Patient>>> {
        let owned = query.clone();
        self.fetch(
            QueryKey::with_params(Resource::Patients, query),
            move |gateway| {
                let query = owned.clone();
                async move { gateway.execute(ListPatients(&query)).await }
            },
        )
        .await
    }

    pub(crate) async fn patient(&self, id: &str) -> Result<Option<Arc<Patient>>> {
        self.detail(Resource::Patient, id, |gateway, id| async move {
            gateway.execute(GetPatient(&id)).await
        })
        .await
    }

    pub(crate) async fn patient_history(
        &self,
        id: &str,
    ) -> Result<Option<Arc<model::PatientHistory>>> {
        self.detail(Resource::PatientHistory, id, |gateway, id| async move {
            gateway.execute(PatientHistory(&id)).await
        })
        .await
    }

    pub(crate) async fn studies_by_patient(
        &self,
        patient_id: &str,
    ) -> Result<Option<Arc<Vec<Study>>>> {
        self.detail(Resource::Studies, patient_id, |gateway, id| async move {
            gateway.execute(StudiesByPatient(&id)).await
        })
        .await
    }

    pub(crate) async fn study(&self, id: &str) -> Result<Option<Arc<Study>>> {
        self.detail(Resource::Study, id, |gateway, id| async move {
            gateway.execute(GetStudy(&id)).await
        })
        .await
    }

    pub(crate) async fn analyses_by_study(
        &self,
        study_id: &str,
    ) -> Result<Option<Arc<Vec<Analysis>>>> {
        self.detail(Resource::Analyses, study_id, |gateway, id| async move {
            gateway.execute(AnalysesByStudy(&id)).await
        })
        .await
    }

    pub(crate) async fn analysis(&self, id: &str) -> Result<Option<Arc<Analysis>>> {
        self.detail(Resource::Analysis, id, |gateway, id| async move {
            gateway.execute(GetAnalysis(&id)).await
        })
        .await
    }

    pub(crate) async fn reports_by_study(
        &self,
        study_id: &str,
    ) -> Result<Option<Arc<Vec<Report>>>> {
        self.detail(Resource::Reports, study_id, |gateway, id| async move {
            gateway.execute(ReportsByStudy(&id)).await
        })
        .await
    }

    pub(crate) async fn report(&self, id: &str) -> Result<Option<Arc<Report>>> {
        self.detail(Resource::Report, id, |gateway, id| async move {
            gateway.execute(GetReport(&id)).await
        })
        .await
    }

    pub(crate) async fn report_export(&self, id: &str) -> Result<Option<Arc<ReportExport>>> {
        self.detail(Resource::ReportExport, id, |gateway, id| async move {
            gateway.execute(ExportReportJson(&id)).await
        })
        .await
    }

    pub(crate) async fn create_patient(&self, patient: NewPatient) -> Result<Patient> {
        let gateway = self.gateway.clone();
        self.queries
            .mutate(Change::PatientCreated, async move {
                gateway.execute(CreatePatient(&patient)).await
            })
            .await
    }

    pub(crate) async fn update_patient(&self, id: &str, update: PatientUpdate) -> Result<Patient> {
        let gateway = self.gateway.clone();
        let owned = id.to_owned();
        self.queries
            .mutate(
                Change::PatientUpdated { id: id.to_owned() },
                async move {
                    gateway
                        .execute(UpdatePatient {
                            id: &owned,
                            update: &update,
                        })
                        .await
                },
            )
            .await
    }

    pub(crate) async fn delete_patient(&self, id: &str) -> Result<()> {
        let gateway = self.gateway.clone();
        let owned = id.to_owned();
        self.queries
            .mutate(Change::PatientDeleted { id: id.to_owned() }, async move {
                _ = gateway.execute(DeletePatient(&owned)).await?;
                Ok(())
            })
            .await
    }

    pub(crate) async fn upload_study(
        &self,
        patient_id: &str,
        files: Vec<PathBuf>,
    ) -> Result<UploadResult> {
        let gateway = self.gateway.clone();
        let owned = patient_id.to_owned();
        self.queries
            .mutate(
                Change::StudyUploaded {
                    patient_id: patient_id.to_owned(),
                },
                async move { transfer::upload_study(&gateway, &owned, &files).await },
            )
            .await
    }

    pub(crate) async fn create_analysis(&self, request: AnalysisRequest) -> Result<AnalysisSummary> {
        let gateway = self.gateway.clone();
        self.queries
            .mutate(Change::AnalysisCreated, async move {
                gateway.execute(CreateAnalysis(&request)).await
            })
            .await
    }

    pub(crate) async fn create_report(&self, request: ReportRequest) -> Result<Report> {
        let gateway = self.gateway.clone();
        self.queries
            .mutate(Change::ReportCreated, async move {
                gateway.execute(CreateReport(&request)).await
            })
            .await
    }

    pub(crate) async fn finalize_report(&self, id: &str) -> Result<Report> {
        let gateway = self.gateway.clone();
        let owned = id.to_owned();
        self.queries
            .mutate(Change::ReportFinalized { id: id.to_owned() }, async move {
                gateway.execute(FinalizeReport(&owned)).await
            })
            .await
    }

    pub(crate) async fn update_config(&self, update: ConfigUpdate) -> Result<ConfigUpdateAck> {
        let gateway = self.gateway.clone();
        self.queries
            .mutate(Change::ConfigUpdated, async move {
                gateway.execute(UpdateConfig(&update)).await
            })
            .await
    }

    /// Saves the PDF rendering of a report into `dir`. Nothing is cached.
    pub(crate) async fn export_report_pdf(&self, id: &str, dir: &Path) -> Result<PathBuf> {
        transfer::export_report_pdf(&self.gateway, id, dir).await
    }

    /// Keeps the health read current by re-issuing it every `every` until the
    /// consumer is cancelled.
    pub(crate) fn watch_health(&self, every: Duration) -> watch::Receiver<Observed<Health>> {
        self.queries.poll(
            QueryKey::new(Resource::Health),
            every,
            self.consumer.child_token(),
            self.producer(|gateway| async move { gateway.execute(GetHealth).await }),
        )
    }
}
