// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::workers::preconditions::QueueProbe;

/// Redis客户端
///
/// 任务队列所在的 Redis，启动时用于连通性检查
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(anyhow::Error)` - URL 无效
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 发送 PING 并确认返回 PONG
    pub async fn ping(&self) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut con).await?;
        if reply != "PONG" {
            bail!("Unexpected PING reply from redis: {}", reply);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueProbe for RedisClient {
    async fn check_connection(&self) -> Result<()> {
        self.ping().await
    }
}
