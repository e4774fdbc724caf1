// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 查询地点的评论总数并打印分页计划
//!
//! 用法：`review-count <location_id> [HOTEL|AIRLINE]`

use anyhow::{bail, Context};
use review_provisioner::config::settings::Settings;
use review_provisioner::domain::models::query_type::QueryType;
use review_provisioner::engines::planner::IterationPlan;
use review_provisioner::engines::review_client::ReviewClient;
use review_provisioner::utils::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();

    let mut args = std::env::args().skip(1);
    let Some(location) = args.next() else {
        bail!("usage: review-count <location_id> [HOTEL|AIRLINE]");
    };
    let location_id: u32 = location
        .parse()
        .with_context(|| format!("Invalid location id: {}", location))?;
    let query_type = args
        .next()
        .map(|label| QueryType::from_label(&label))
        .unwrap_or_default();

    let settings = Settings::new()?;
    settings.validate()?;

    let client = ReviewClient::from_settings(&settings.upstream, &settings.retry)?;
    let count = client.fetch_review_count(location_id, query_type).await?;
    let plan = IterationPlan::new(count, client.page_size())?;

    println!("location:   {}", location_id);
    println!("query type: {}", query_type);
    println!("reviews:    {}", plan.total_count);
    println!("page size:  {}", plan.page_size);
    println!("iterations: {}", plan.iterations);
    Ok(())
}
