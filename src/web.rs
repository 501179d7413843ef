use crate::agencies::Agency;
use crate::configuration::Configuration;
use crate::service::{
    AgencyService, CalculateRequest, CalculateResponse, DetailService, ReachabilityService,
    ServiceError,
};
use crate::trip_details::{parse_detail_response, DetailResult, GetDetailsRequest};
use futures::future::{AbortRegistration, Abortable, BoxFuture};
use futures::FutureExt;
use log::{debug, info};

/// `reqwest` client for the reachability server's `/hello`, `/details` and
/// `/agencies` routes.
#[derive(Clone)]
pub struct HttpService {
    client: reqwest::Client,
    hello_url: String,
    details_url: String,
    agencies_url: String,
    client_id: String,
}

impl HttpService {
    pub fn new(config: &Configuration) -> Self {
        HttpService {
            client: reqwest::Client::new(),
            hello_url: config.endpoint("hello"),
            details_url: config.endpoint("details"),
            agencies_url: config.endpoint("agencies"),
            client_id: config.client_id.clone(),
        }
    }
}

async fn post_hello(
    client: reqwest::Client,
    url: String,
    request: CalculateRequest,
) -> Result<CalculateResponse, ServiceError> {
    info!(
        "Requesting edge times for ({}, {})",
        request.latitude, request.longitude
    );
    let response = client
        .post(url)
        .header("Accept", "application/json")
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    let parsed: CalculateResponse = serde_json::from_slice(&body)?;
    debug!("Got {} edge times", parsed.edge_times.len());
    Ok(parsed)
}

async fn post_details(
    client: reqwest::Client,
    url: String,
    request: GetDetailsRequest,
) -> Result<Option<DetailResult>, ServiceError> {
    debug!(
        "Making details request at ({}, {})",
        request.latlng.latitude, request.latlng.longitude
    );
    let response = client
        .post(url)
        .header("Accept", "application/json")
        .json(&request)
        .send()
        .await?;

    debug!("Got details response: {}", response.status());
    // An error page fails the parse below, which is how a protocol mismatch
    // surfaces to the user.
    let body = response.text().await?;
    Ok(parse_detail_response(&body)?)
}

impl ReachabilityService for HttpService {
    fn calculate(
        &self,
        request: CalculateRequest,
    ) -> BoxFuture<'static, Result<CalculateResponse, ServiceError>> {
        post_hello(self.client.clone(), self.hello_url.clone(), request).boxed()
    }
}

impl DetailService for HttpService {
    fn details(
        &self,
        request: GetDetailsRequest,
        abort: AbortRegistration,
    ) -> BoxFuture<'static, Result<Option<DetailResult>, ServiceError>> {
        let call = post_details(self.client.clone(), self.details_url.clone(), request);
        Abortable::new(call, abort)
            .map(|outcome| match outcome {
                Ok(result) => result,
                Err(_aborted) => Err(ServiceError::Cancelled),
            })
            .boxed()
    }
}

impl AgencyService for HttpService {
    fn agencies(&self) -> BoxFuture<'static, Result<Vec<Agency>, ServiceError>> {
        let client = self.client.clone();
        let url = self.agencies_url.clone();
        let id = self.client_id.clone();
        async move {
            let response = client.get(url).query(&[("id", id)]).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ServiceError::Status(status.as_u16()));
            }
            let body = response.bytes().await?;
            let agencies: Vec<Agency> = serde_json::from_slice(&body)?;
            info!("Loaded {} agencies", agencies.len());
            Ok(agencies)
        }
        .boxed()
    }
}
