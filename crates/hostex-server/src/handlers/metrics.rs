use std::sync::Arc;

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use hostex_collector::ScrapeContext;
use hostex_common::error::{HostexError, Result};
use hostex_metrics::{CONTENT_TYPE, render_prometheus};
use tracing::{debug, warn};

use crate::{handlers::ApiError, router::ExporterState};

/// Query parameters of a scrape: `collect[]=<name>` and `filter[]=<label>=<value>`,
/// both repeatable.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScrapeParams {
    pub collectors: Vec<String>,
    pub label_filters: Vec<(String, String)>,
}

impl ScrapeParams {
    pub fn parse(query: Option<&str>) -> Result<Self> {
        let mut params = Self::default();
        let Some(query) = query else {
            return Ok(params);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "collect[]" | "collect" => {
                    let name = value.trim();
                    if !name.is_empty() && !params.collectors.iter().any(|known| known == name) {
                        params.collectors.push(name.to_string());
                    }
                }
                "filter[]" | "filter" => {
                    let (label, expected) = value.split_once('=').ok_or_else(|| {
                        HostexError::InvalidArgument(format!(
                            "filter must be <label>=<value>: {value}"
                        ))
                    })?;
                    if label.trim().is_empty() {
                        return Err(HostexError::InvalidArgument(format!(
                            "filter label must not be empty: {value}"
                        )));
                    }
                    params
                        .label_filters
                        .push((label.trim().to_string(), expected.to_string()));
                }
                _ => {}
            }
        }

        Ok(params)
    }
}

pub async fn scrape_metrics(
    State(state): State<Arc<ExporterState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let Ok(_permit) = state.in_flight.try_acquire() else {
        warn!("rejecting scrape, too many concurrent requests");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many concurrent scrapes\n").into_response();
    };

    match scrape(&state, &headers, query.as_deref()).await {
        Ok(response) => response,
        Err(err) => ApiError(err).into_response(),
    }
}

async fn scrape(
    state: &ExporterState,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<Response> {
    let params = ScrapeParams::parse(query)?;
    if let Some(unknown) = params
        .collectors
        .iter()
        .find(|name| !state.registry.contains(name))
    {
        return Err(HostexError::UnknownCollector(unknown.clone()));
    }

    let ctx = ScrapeContext::new(state.settings.timeout_for(headers))
        .with_label_filters(params.label_filters);
    let selection = (!params.collectors.is_empty()).then_some(params.collectors.as_slice());

    let report = state.scraper.scrape(&ctx, selection).await?;
    debug!(
        samples = report.samples.len(),
        collectors = report.statuses.len(),
        "scrape finished"
    );

    let status = if report.all_failed() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut response = Response::new(Body::from(render_prometheus(&report.samples)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));

    Ok(response)
}
