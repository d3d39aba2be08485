use anyhow::Context;
use metlink_relay::{web, Configuration, FeedService};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Configuration::from_env();
    config.log_summary();

    let rt = tokio::runtime::Runtime::new().context("Cannot start the tokio runtime")?;
    rt.block_on(async {
        let service = FeedService::new(config).context("Cannot build the upstream client")?;
        web::serve(Arc::new(service)).await;
        Ok::<_, anyhow::Error>(())
    })
}
