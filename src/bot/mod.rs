mod event;
mod followup;
mod membership;
mod orchestrator;
mod outbound;
mod session;
mod telegram;

use crate::config::Config;
use anyhow::Result;

pub async fn run(config: &Config) -> Result<()> {
    telegram::run(config).await
}
