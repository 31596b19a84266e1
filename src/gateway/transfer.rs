// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Calls that carry binary payloads instead of JSON.

use std::path::{Path, PathBuf};

use log::{debug, info};
use reqwest::Method;
use tokio::fs;

use super::{
    decode,
    model::UploadResult,
    transport::{Body, Field},
    Gateway,
};
use crate::error::Result;

const UPLOAD_PATH: &[&str] = &["api", "studies", "upload"];

/// Uploads a set of DICOM files as one study for the given patient.
pub(crate) async fn upload_study<P: AsRef<Path>>(
    gateway: &Gateway,
    patient_id: &str,
    files: &[P],
) -> Result<UploadResult> {
    let mut fields = Vec::with_capacity(files.len() + 1);
    fields.push(Field::Text {
        name: "patient_id".to_owned(),
        value: patient_id.to_owned(),
    });
    for file in files {
        let file = file.as_ref();
        fields.push(Field::File {
            name: "files".to_owned(),
            file_name: file
                .file_name()
                .map_or_else(|| "upload.dcm".to_owned(), |name| name.to_string_lossy().into_owned()),
            content: fs::read(file).await?,
        });
    }
    debug!("Uploading {} file(s) for patient {}", files.len(), patient_id);

    let resp = gateway
        .send(
            Method::POST,
            UPLOAD_PATH,
            &[],
            Body::Multipart(fields),
            "Upload failed",
        )
        .await?;
    decode(UPLOAD_PATH, &resp.body)
}

pub(crate) fn pdf_file_name(report_id: &str) -> String {
    format!("radiology_report_{report_id}.pdf")
}

/// Downloads a report as PDF and saves it into `dir`, returning the path
/// written.
pub(crate) async fn export_report_pdf(
    gateway: &Gateway,
    report_id: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let resp = gateway
        .send(
            Method::GET,
            &["api", "export", "report", report_id, "pdf"],
            &[],
            Body::Empty,
            "Export failed",
        )
        .await?;

    let target = dir.join(pdf_file_name(report_id));
    fs::write(&target, &resp.body).await?;
    info!("Saved report {} to {}", report_id, target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{error::ErrorClass, gateway::testing};

    #[tokio::test]
    async fn upload_sends_patient_and_every_file() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let first = dir.path().join("IM0001.dcm");
        let second = dir.path().join("IM0002.dcm");
        std::fs::write(&first, b"DICM-1").expect("written");
        std::fs::write(&second, b"DICM-2").expect("written");

        let (gateway, server) = testing::signed_in("abc").await;
        server.reply(
            Method::POST,
            "/api/studies/upload",
            200,
            json!({
                "study_id": "s-1",
                "study_instance_uid": "1.2.840.1",
                "series_count": 1,
                "total_images": 2,
                "status": "completed",
            }),
        );

        let result = upload_study(&gateway, "p-1", &[&first, &second])
            .await
            .expect("uploaded");
        assert_eq!(result.total_images, 2);

        let seen = server.requests();
        let Body::Multipart(ref fields) = seen[0].body else {
            panic!("expected multipart, got {:?}", seen[0].body);
        };
        assert!(matches!(
            fields[0],
            Field::Text { ref name, ref value } if name == "patient_id" && value == "p-1"
        ));
        let files: Vec<_> = fields[1..]
            .iter()
            .filter_map(|field| match *field {
                Field::File {
                    ref name,
                    ref file_name,
                    ref content,
                } if name == "files" => Some((file_name.as_str(), content.as_slice())),
                Field::File { .. } | Field::Text { .. } => None,
            })
            .collect();
        assert_eq!(
            files,
            [
                ("IM0001.dcm", b"DICM-1".as_slice()),
                ("IM0002.dcm", b"DICM-2".as_slice())
            ]
        );
    }

    #[tokio::test]
    async fn upload_failure_uses_its_own_fallback() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply_raw(Method::POST, "/api/studies/upload", 500, b"");

        let err = upload_study::<PathBuf>(&gateway, "p-1", &[])
            .await
            .expect_err("server error");
        assert_eq!(err.class(), ErrorClass::Server);
        assert!(err.to_string().ends_with("Upload failed"));
    }

    #[tokio::test]
    async fn pdf_export_is_saved_to_disk() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply_raw(Method::GET, "/api/export/report/r-1/pdf", 200, b"%PDF-1.4");

        let path = export_report_pdf(&gateway, "r-1", dir.path())
            .await
            .expect("exported");
        assert_eq!(path, dir.path().join("radiology_report_r-1.pdf"));
        assert_eq!(std::fs::read(&path).expect("saved"), b"%PDF-1.4");
    }
}
