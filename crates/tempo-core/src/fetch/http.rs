//! curl-backed client for the upstream HTTP API.
//!
//! `GET {endpoint}?bbox=W,S,E,N&date=YYYY-MM-DD&hours=H0-H1&products=..&min_quality=..`
//! with `Authorization: Bearer <key|anonymous>`. The body is streamed into the
//! session's scratch directory and read back once the transfer completes.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{ClientFactory, DayRequest, FetchClient, FetchError, SessionContext};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`HttpFetchClient`] sessions against one endpoint.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    endpoint: Url,
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid endpoint URL: {endpoint}"))?;
        Ok(Self { endpoint, timeout })
    }
}

impl ClientFactory for HttpClientFactory {
    fn open_session(&self, ctx: &SessionContext) -> Result<Box<dyn FetchClient>, FetchError> {
        let mut easy = curl::easy::Easy::new();
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(CONNECT_TIMEOUT)?;
        easy.timeout(self.timeout)?;
        easy.progress(true)?;
        Ok(Box::new(HttpFetchClient {
            easy,
            endpoint: self.endpoint.clone(),
            workdir: ctx.workdir.clone(),
            cancel: ctx.cancel.clone(),
        }))
    }
}

/// One curl handle bound to one scratch directory.
pub struct HttpFetchClient {
    easy: curl::easy::Easy,
    endpoint: Url,
    workdir: PathBuf,
    cancel: CancellationToken,
}

impl HttpFetchClient {
    /// Query URL for a day request.
    pub fn request_url(endpoint: &Url, req: &DayRequest) -> Url {
        let [w, s, e, n] = req.region.bbox();
        let first = req.hours.first().copied().unwrap_or(0);
        let last = req.hours.last().copied().unwrap_or(23);
        let products = req
            .selection
            .products()
            .iter()
            .map(|p| p.remote_id())
            .collect::<Vec<_>>()
            .join(",");
        let filters = req.selection.filters();

        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("bbox", &format!("{w},{s},{e},{n}"))
            .append_pair("date", &req.date.format("%Y-%m-%d").to_string())
            .append_pair("hours", &format!("{first:02}-{last:02}"))
            .append_pair("products", &products)
            .append_pair("min_quality", filters.min_quality.as_str())
            .append_pair("max_cloud", &filters.max_cloud_pct.to_string())
            .append_pair("max_sza", &filters.max_sza_deg.to_string());
        url
    }
}

impl FetchClient for HttpFetchClient {
    fn fetch_day(&mut self, req: &DayRequest) -> Result<Vec<u8>, FetchError> {
        let url = Self::request_url(&self.endpoint, req);
        let body_path = self.workdir.join(format!("{}.payload", req.date.format("%Y-%m-%d")));
        let mut body = File::create(&body_path)?;

        self.easy.url(url.as_str())?;
        let mut headers = curl::easy::List::new();
        headers.append(&format!("Authorization: Bearer {}", req.auth.token()))?;
        headers.append("Accept: application/json")?;
        self.easy.http_headers(headers)?;

        let mut write_err: Option<std::io::Error> = None;
        let cancel = self.cancel.clone();
        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.write_function(|data| match body.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_err = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.progress_function(move |_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };
        if let Some(e) = write_err {
            return Err(FetchError::Io(e));
        }
        if let Err(e) = performed {
            if e.is_aborted_by_callback() && self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            return Err(FetchError::Curl(e));
        }

        let code = self.easy.response_code()?;
        match code {
            200..=299 => {}
            401 | 403 => {
                return Err(FetchError::Rejected(format!(
                    "upstream refused credentials (HTTP {code})"
                )))
            }
            _ => return Err(FetchError::Http(code)),
        }

        body.sync_all()?;
        drop(body);
        let bytes = fs::read(&body_path)?;
        tracing::debug!(date = %req.date, bytes = bytes.len(), "fetched daily payload");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{AuthMode, Product, ProductSelection, QualityFilters, Region};

    fn request() -> DayRequest {
        DayRequest {
            job_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
            hours: vec![14, 15, 23],
            region: Region::from_bbox([-119.5, 32.0, -116.5, 35.5]).unwrap(),
            selection: ProductSelection::new([Product::No2, Product::Hcho], QualityFilters::default())
                .unwrap(),
            auth: AuthMode::Anonymous,
        }
    }

    #[test]
    fn query_carries_all_parameters() {
        let endpoint = Url::parse("https://example.invalid/api/v1/daily").unwrap();
        let url = HttpFetchClient::request_url(&endpoint, &request());
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["bbox"], "-119.5,32,-116.5,35.5");
        assert_eq!(pairs["date"], "2024-06-14");
        assert_eq!(pairs["hours"], "14-23");
        assert_eq!(
            pairs["products"],
            "tempo.l2.no2.vertical_column_troposphere,tempo.l2.hcho.vertical_column"
        );
        assert_eq!(pairs["min_quality"], "normal");
        assert_eq!(pairs["max_cloud"], "50");
        assert_eq!(pairs["max_sza"], "70");
        assert_eq!(url.path(), "/api/v1/daily");
    }

    #[test]
    fn factory_rejects_bad_endpoint() {
        assert!(HttpClientFactory::new("not a url", Duration::from_secs(1)).is_err());
    }
}
