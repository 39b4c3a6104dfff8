use std::time::Duration;

use async_trait::async_trait;
use bulk_processing_data::HospitalRow;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use uuid::Uuid;

use super::{CreateHospitalPayload, DirectoryError, DirectoryHospital, HospitalDirectory};

/// Reqwest-backed hospital directory client
#[derive(Debug, Clone)]
pub struct HospitalApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl HospitalApiClient {
    /// Build a client for `base_url` with the given connect and read timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(120))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "*****Hospital API session initialized.*****");
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn any non-200 answer into `DirectoryError::Http`, keeping the body for the log
    async fn expect_ok(response: Response, action: &str) -> Result<Response, DirectoryError> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), error = %body, "Failed to {}", action);
        Err(DirectoryError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}

fn transport_error(action: &str, e: reqwest::Error) -> DirectoryError {
    error!(error = %e, "Network error {}", action);
    DirectoryError::Transport(e.to_string())
}

#[async_trait]
impl HospitalDirectory for HospitalApiClient {
    async fn create_hospital(&self, row: &HospitalRow, batch_id: Uuid) -> Result<DirectoryHospital, DirectoryError> {
        let payload = CreateHospitalPayload::new(row, batch_id);
        let response = self
            .client
            .post(self.endpoint("/hospitals/"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("creating hospital", e))?;

        let response = Self::expect_ok(response, "create hospital").await?;
        let hospital: DirectoryHospital = Self::decode(response).await?;
        info!(hospital_id = hospital.id, %batch_id, "Created hospital");
        Ok(hospital)
    }

    async fn activate_batch(&self, batch_id: Uuid) -> Result<(), DirectoryError> {
        let response = self
            .client
            .patch(self.endpoint(&format!("/hospitals/batch/{}/activate", batch_id)))
            .send()
            .await
            .map_err(|e| transport_error("activating batch", e))?;

        Self::expect_ok(response, "activate batch").await?;
        info!(%batch_id, "Activated batch");
        Ok(())
    }

    async fn get_batch_hospitals(&self, batch_id: Uuid) -> Result<Vec<DirectoryHospital>, DirectoryError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/hospitals/batch/{}", batch_id)))
            .send()
            .await
            .map_err(|e| transport_error("getting batch hospitals", e))?;

        let response = Self::expect_ok(response, "get batch hospitals").await?;
        let hospitals: Vec<DirectoryHospital> = Self::decode(response).await?;
        info!(count = hospitals.len(), %batch_id, "Retrieved batch hospitals");
        Ok(hospitals)
    }
}
