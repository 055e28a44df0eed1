//! `forgecmms-sync`: one-shot alert sync, meant to be run by a scheduler.
//!
//! ```text
//! forgecmms-sync                       # sync every company (default)
//! forgecmms-sync sync <company-id>     # sync one company
//! forgecmms-sync generate <company-id> # print current alerts, no writes
//! forgecmms-sync trends <company-id> [days]
//! ```
//!
//! Output is JSON on stdout; logs go to stderr-compatible tracing output.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

use forgecmms_core::CompanyId;
use forgecmms_infra::{
    Collaborators, EngineConfig, PostgresAlertHistoryStore, PostgresPlatform, PredictiveMaintenanceEngine,
};

#[derive(Debug)]
enum Command {
    SyncAll,
    Sync(CompanyId),
    Generate(CompanyId),
    Trends(CompanyId, u32),
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let company = |i: usize| -> anyhow::Result<CompanyId> {
        let raw = args.get(i).context("missing <company-id>")?;
        raw.parse::<CompanyId>()
            .map_err(|e| anyhow::anyhow!("invalid company id {raw:?}: {e}"))
    };

    match args.first().map(String::as_str) {
        None | Some("sync-all") => Ok(Command::SyncAll),
        Some("sync") => Ok(Command::Sync(company(1)?)),
        Some("generate") => Ok(Command::Generate(company(1)?)),
        Some("trends") => {
            let days = match args.get(2) {
                Some(d) => d.parse::<u32>().with_context(|| format!("invalid days {d:?}"))?,
                None => 30,
            };
            Ok(Command::Trends(company(1)?, days))
        }
        Some(other) => bail!("unknown command {other:?} (expected sync-all, sync, generate or trends)"),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forgecmms_observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = EngineConfig::from_env();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(u32::try_from(config.max_concurrent_tenants.saturating_mul(2)).unwrap_or(u32::MAX).max(2))
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = Arc::new(PredictiveMaintenanceEngine::new(
        Collaborators::from_platform(Arc::new(PostgresPlatform::new(pool.clone()))),
        Arc::new(PostgresAlertHistoryStore::new(pool)),
        config,
    ));

    tracing::info!(command = ?command, "forgecmms-sync starting");

    match command {
        Command::SyncAll => {
            let summary = engine.sync_all_companies().await.context("alert sync batch failed")?;
            print_json(&summary)
        }
        Command::Sync(company_id) => print_json(&engine.sync_alerts(company_id).await?),
        Command::Generate(company_id) => print_json(&engine.generate_alerts(company_id).await?),
        Command::Trends(company_id, days) => print_json(&engine.get_trends(company_id, days).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_sync_all() {
        assert!(matches!(parse_args(&[]).unwrap(), Command::SyncAll));
    }

    #[test]
    fn parses_company_commands() {
        let id = CompanyId::new();
        let cmd = parse_args(&args(&["trends", &id.to_string(), "14"])).unwrap();
        assert!(matches!(cmd, Command::Trends(c, 14) if c == id));

        let cmd = parse_args(&args(&["generate", &id.to_string()])).unwrap();
        assert!(matches!(cmd, Command::Generate(c) if c == id));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["sync"])).is_err());
        assert!(parse_args(&args(&["sync", "not-a-uuid"])).is_err());
        assert!(parse_args(&args(&["rebuild"])).is_err());
    }
}
