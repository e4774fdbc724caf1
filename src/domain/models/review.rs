// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 评论接口的请求与响应结构
//!
//! 请求体与响应体都是单元素的批量数组。

use serde::{Deserialize, Serialize};

/// 语言过滤器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub axis: String,
    pub selections: Vec<String>,
}

impl Filter {
    pub fn language(language: &str) -> Self {
        Self {
            axis: "LANGUAGE".to_string(),
            selections: vec![language.to_string()],
        }
    }
}

/// 空对象，序列化为 `{}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialPrefs {}

/// 查询变量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variables {
    #[serde(rename = "locationId")]
    pub location_id: u32,
    pub offset: u32,
    pub filters: Vec<Filter>,
    pub limit: u32,
    pub need_keywords: bool,
    pub prefs_cache_key: String,
    pub keyword_variant: String,
    pub initial_prefs: InitialPrefs,
    pub filter_cache_key: Option<String>,
    pub prefs: Option<serde_json::Value>,
}

/// 请求扩展字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(rename = "preRegisteredQueryId")]
    pub pre_registered_query_id: String,
}

/// 单个查询请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewQuery {
    pub variables: Variables,
    pub extensions: Extensions,
}

impl ReviewQuery {
    /// 构建一次分页查询
    pub fn new(query_id: &str, language: &str, location_id: u32, offset: u32, limit: u32) -> Self {
        Self {
            variables: Variables {
                location_id,
                offset,
                filters: vec![Filter::language(language)],
                limit,
                need_keywords: false,
                prefs_cache_key: format!("locationReviewPrefs_{}", location_id),
                keyword_variant: "location_keywords_v2_llr_order_30_en".to_string(),
                initial_prefs: InitialPrefs::default(),
                filter_cache_key: None,
                prefs: None,
            },
            extensions: Extensions {
                pre_registered_query_id: query_id.to_string(),
            },
        }
    }

    /// 包装为单元素批量请求体
    pub fn into_batch(self) -> Vec<ReviewQuery> {
        vec![self]
    }
}

/// 批量响应，正常情况下只有一个元素
pub type ReviewResponses = Vec<ReviewResponse>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    #[serde(default)]
    pub data: ResponseData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, rename = "locationId")]
    pub location_id: Option<u32>,
    #[serde(default)]
    pub review_list_page: ReviewListPage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListPage {
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub preferred_review_ids: Vec<i64>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// 单条评论
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub publish_platform: Option<String>,
    #[serde(default)]
    pub trip_info: Option<TripInfo>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInfo {
    #[serde(default)]
    pub stay_date: Option<String>,
    #[serde(default)]
    pub trip_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// 取出首个响应中首个地点的评论页
pub fn first_review_page(responses: &[ReviewResponse]) -> Option<&ReviewListPage> {
    responses
        .first()
        .and_then(|response| response.data.locations.first())
        .map(|location| &location.review_list_page)
}
