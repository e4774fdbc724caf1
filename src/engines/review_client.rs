// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, ORIGIN, PRAGMA, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::settings::{RetrySettings, UpstreamSettings};
use crate::domain::models::query_type::QueryType;
use crate::domain::models::review::{
    first_review_page, Review, ReviewQuery, ReviewResponse, ReviewResponses,
};
use crate::engines::planner::IterationPlan;
use crate::utils::errors::{PlanError, UpstreamError};
use crate::utils::retry_policy::RetryPolicy;

/// 默认评论接口地址
pub const DEFAULT_ENDPOINT: &str = "https://www.tripadvisor.com/data/graphql/ids";

const ORIGIN_VALUE: &str = "https://www.tripadvisor.com";
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_0_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.101 Safari/537.36";
const REQUESTED_BY_VALUE: &str = "someone-special";
const COOKIE_PLACEHOLDER: &str = "asdasdsa";

/// 评论接口客户端
///
/// 每次调用发送一个单元素批量查询，并对结果进行分类：
/// 200 解析为响应，429 为限流，其余状态为通用上游错误。
/// 客户端本身无状态，可以在多个任务之间共享。
pub struct ReviewClient {
    client: reqwest::Client,
    endpoint: String,
    page_size: u32,
    retry_policy: RetryPolicy,
}

impl ReviewClient {
    /// 创建新的评论接口客户端
    ///
    /// # 参数
    ///
    /// * `endpoint` - 接口地址
    /// * `page_size` - 每页评论数，必须大于 0
    /// * `retry_policy` - 限流后的退避策略
    /// * `timeout` - 单次请求超时
    pub fn new(
        endpoint: impl Into<String>,
        page_size: u32,
        retry_policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        if page_size == 0 {
            return Err(PlanError::ZeroPageSize.into());
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            page_size,
            retry_policy,
        })
    }

    pub fn from_settings(
        upstream: &UpstreamSettings,
        retry: &RetrySettings,
    ) -> Result<Self, UpstreamError> {
        Self::new(
            upstream.endpoint.clone(),
            upstream.page_size,
            RetryPolicy::from(retry),
            Duration::from_secs(upstream.timeout_secs),
        )
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static(ORIGIN_VALUE));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert("x-requested-by", HeaderValue::from_static(REQUESTED_BY_VALUE));
        headers.insert(COOKIE, HeaderValue::from_static(COOKIE_PLACEHOLDER));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf-8"),
        );
        headers
    }

    /// 请求一页评论
    #[instrument(skip(self, query_id))]
    pub async fn fetch_page(
        &self,
        location_id: u32,
        language: &str,
        offset: u32,
        limit: u32,
        query_id: &str,
    ) -> Result<ReviewResponses, UpstreamError> {
        let payload = ReviewQuery::new(query_id, language, location_id, offset, limit).into_batch();
        let body = serde_json::to_vec(&payload)?;

        let response = self
            .client
            .post(&self.endpoint)
            .headers(Self::headers())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        counter!("upstream_requests_total", "status" => status.as_u16().to_string()).increment(1);

        if status == StatusCode::TOO_MANY_REQUESTS {
            counter!("upstream_rate_limited_total").increment(1);
            warn!("Rate limit detected for location {}", location_id);
            return Err(UpstreamError::RateLimited {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        parse_responses(&bytes, location_id)
    }

    /// 请求一页评论，限流或瞬时网络错误时按策略退避重试
    pub async fn fetch_page_with_retry(
        &self,
        location_id: u32,
        language: &str,
        offset: u32,
        limit: u32,
        query_id: &str,
    ) -> Result<ReviewResponses, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self
                .fetch_page(location_id, language, offset, limit, query_id)
                .await
            {
                Ok(responses) => return Ok(responses),
                Err(e) if e.is_retryable() && self.retry_policy.should_retry(attempt) => {
                    attempt += 1;
                    let delay = self.retry_policy.calculate_backoff(attempt);
                    warn!(
                        "Page fetch for location {} offset {} failed ({}), retry {} in {:?}",
                        location_id, offset, e, attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 获取地点的评论总数
    ///
    /// 以 offset 0、limit 1 发送一次请求，读取首个地点的 `totalCount`。
    /// 批量为空或没有地点时返回 `NotFound`，响应体为 `null` 时返回 `NilResponse`。
    pub async fn fetch_review_count(
        &self,
        location_id: u32,
        query_type: QueryType,
    ) -> Result<u32, UpstreamError> {
        let responses = self
            .fetch_page(location_id, "en", 0, 1, query_type.query_id())
            .await?;
        total_count(&responses, location_id)
    }

    /// 按分页计划抓取地点的全部评论
    ///
    /// 每一页都带限流重试，页按偏移量顺序请求。
    pub async fn fetch_all_pages(
        &self,
        location_id: u32,
        language: &str,
        query_type: QueryType,
    ) -> Result<Vec<Review>, UpstreamError> {
        let query_id = query_type.query_id();
        let count_responses = self
            .fetch_page_with_retry(location_id, language, 0, 1, query_id)
            .await?;
        let count = total_count(&count_responses, location_id)?;

        let plan = IterationPlan::new(count, self.page_size)?;
        info!(
            "Location {} has {} reviews, {} pages of {}",
            location_id, plan.total_count, plan.iterations, plan.page_size
        );

        let mut reviews = Vec::new();
        for offset in plan.offsets() {
            let responses = self
                .fetch_page_with_retry(location_id, language, offset, plan.page_size, query_id)
                .await?;
            let page = responses
                .into_iter()
                .next()
                .and_then(|response| response.data.locations.into_iter().next())
                .map(|location| location.review_list_page.reviews)
                .unwrap_or_default();
            debug!("Fetched {} reviews at offset {}", page.len(), offset);
            reviews.extend(page);
        }

        Ok(reviews)
    }
}

fn parse_responses(body: &[u8], location_id: u32) -> Result<ReviewResponses, UpstreamError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(UpstreamError::NilResponse(location_id));
    }

    let parsed: Option<ReviewResponses> = serde_json::from_slice(body)?;
    parsed.ok_or(UpstreamError::NilResponse(location_id))
}

fn total_count(responses: &[ReviewResponse], location_id: u32) -> Result<u32, UpstreamError> {
    first_review_page(responses)
        .map(|page| page.total_count)
        .ok_or(UpstreamError::NotFound(location_id))
}
