//! Fallback request/response client.
//!
//! Every request carries the session credential as a bearer token. Non-2xx
//! responses become [`Error::Api`] with the server's `detail` text.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::request::{ASSIGNED_RIDES_PATH, MY_RIDES_PATH, RIDES_PATH};
use crate::protocol::{FallbackRequest, HttpMethod, Ride, RideCommand, RideStatus};
use crate::router::RefreshTarget;
use crate::session::{Role, Session};

use super::Fallback;

// ============================================================================
// RideApi
// ============================================================================

/// Client for the ride service's request/response surface.
#[derive(Debug, Clone)]
pub struct RideApi {
    /// Pooled HTTP client.
    http: HttpClient,
    /// Service root, always ending in `/`.
    base_url: Url,
    /// Credential source.
    session: Session,
}

impl RideApi {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, session: Session, request_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(request_timeout).build()?;

        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    /// Returns the service root.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends `request` and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredential`] if the session has no credential
    /// - [`Error::Api`] for a non-2xx response
    /// - [`Error::Network`] if no response arrived or it was not valid JSON
    pub async fn send<T: DeserializeOwned>(&self, request: &FallbackRequest) -> Result<T> {
        let response = self.execute_raw(request).await?;
        let status = response.status();

        if !status.is_success() {
            let detail = extract_detail(response).await;
            warn!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                detail = detail.as_deref().unwrap_or(""),
                "Fallback request rejected"
            );
            return Err(Error::api(status.as_u16(), detail));
        }

        Ok(response.json::<T>().await?)
    }

    /// Lists rides requested by the caller.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn my_rides(&self) -> Result<Vec<Ride>> {
        self.send(&FallbackRequest::get(MY_RIDES_PATH)).await
    }

    /// Lists rides still waiting for a driver.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn open_requests(&self) -> Result<Vec<Ride>> {
        let rides: Vec<Ride> = self.send(&FallbackRequest::get(RIDES_PATH)).await?;
        Ok(rides
            .into_iter()
            .filter(|ride| ride.status == RideStatus::Requested)
            .collect())
    }

    /// Lists rides assigned to the calling driver.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send). Riders get [`Error::Api`] with status 403.
    pub async fn assigned_rides(&self) -> Result<Vec<Ride>> {
        self.send(&FallbackRequest::get(ASSIGNED_RIDES_PATH)).await
    }

    /// Loads the list behind `target`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn list(&self, target: RefreshTarget) -> Result<Vec<Ride>> {
        match target {
            RefreshTarget::MyRides => self.my_rides().await,
            RefreshTarget::RideRequests => self.open_requests().await,
            RefreshTarget::AssignedRides => self.assigned_rides().await,
        }
    }

    /// Guesses the caller's role from access to the driver-only list.
    ///
    /// A heuristic for when no handshake identity is known. Returns `None`
    /// if the status is neither 200 nor 403.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredential`] if the session has no credential
    /// - [`Error::Network`] if no response arrived
    pub async fn detect_role(&self) -> Result<Option<Role>> {
        let response = self
            .execute_raw(&FallbackRequest::get(ASSIGNED_RIDES_PATH))
            .await?;
        let status = response.status().as_u16();
        let role = Role::infer_from_status(status);

        debug!(status, ?role, "Role detection finished");
        Ok(role)
    }

    /// Sends `request` with authentication and returns the raw response.
    async fn execute_raw(&self, request: &FallbackRequest) -> Result<Response> {
        let credential = self.session.credential().ok_or(Error::MissingCredential)?;
        let url = self.base_url.join(&request.path)?;

        trace!(method = %request.method, %url, "Fallback request");

        let builder: RequestBuilder = match request.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
        };
        let builder = builder.bearer_auth(credential.expose());
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        Ok(builder.send().await?)
    }
}

#[async_trait]
impl Fallback for RideApi {
    async fn execute(&self, command: &RideCommand) -> Result<Ride> {
        self.send(&FallbackRequest::from(command)).await
    }
}

/// Reads the `detail` field of an error body.
async fn extract_detail(response: Response) -> Option<String> {
    let body: Value = response.json().await.ok()?;
    match body.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
