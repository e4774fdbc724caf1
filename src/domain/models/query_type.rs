// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 酒店评论查询的预注册查询ID
pub const HOTEL_QUERY_ID: &str = "ef1a9f94012220d3";

/// 航空公司评论查询的预注册查询ID
pub const AIRLINE_QUERY_ID: &str = "83003f8a5e4ba8ac";

/// 查询类型
///
/// 决定请求使用哪一个预注册查询ID。未知类型回退到酒店。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    #[default]
    Hotel,
    Airline,
}

impl QueryType {
    /// 从标签解析，大小写不敏感，未知值返回默认的 `Hotel`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "AIRLINE" => QueryType::Airline,
            _ => QueryType::Hotel,
        }
    }

    pub fn query_id(&self) -> &'static str {
        match self {
            QueryType::Hotel => HOTEL_QUERY_ID,
            QueryType::Airline => AIRLINE_QUERY_ID,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Hotel => write!(f, "HOTEL"),
            QueryType::Airline => write!(f, "AIRLINE"),
        }
    }
}
