use anyhow::Context;
use clap::{Parser, Subcommand};
use referra_core::{
    CoreConfig, DashboardBucket, ReconciledReferral, ReferralForm, ReferralService, ReferralStatus,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "referra")]
#[command(about = "Referra referral case-management CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that both stores are reachable
    Health,
    /// List a case manager's referrals, with client names where PHI is found
    List {
        /// Case manager user id
        #[arg(long)]
        user: String,
    },
    /// Show the dashboard for a case manager
    Dashboard {
        /// Case manager user id
        #[arg(long)]
        user: String,
        /// Search text (id, client name, service, waiver or plan)
        #[arg(long)]
        search: Option<String>,
        /// Bucket: all, pending, active or urgent
        #[arg(long, default_value = "all")]
        bucket: String,
    },
    /// Submit a referral form read from a JSON file
    Submit {
        /// Case manager user id
        #[arg(long)]
        user: String,
        /// Path to the form JSON (camelCase fields)
        payload: PathBuf,
    },
    /// Move a referral to a new status
    SetStatus {
        /// Referral id
        id: i64,
        /// pending, in-progress, matched, completed or cancelled
        status: String,
        /// Case manager who owns the referral
        #[arg(long)]
        user: String,
    },
}

fn describe(item: &ReconciledReferral) -> String {
    let referral = &item.referral;
    format!(
        "{}  {:<11}  {:<6}  {:<5}  {}  {}",
        referral.formatted_id(),
        referral.status,
        referral.urgency,
        referral.waiver_type,
        item.client_name().unwrap_or_else(|| "(no PHI)".into()),
        referral.service_type,
    )
}

async fn run(service: ReferralService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Health => {
            let health = service.health().await;
            println!("PHI store:      {}", if health.phi_store { "ok" } else { "unreachable" });
            println!(
                "Workflow store: {}",
                if health.workflow_store { "ok" } else { "unreachable" }
            );
            if !health.all_ok() {
                anyhow::bail!("one or more stores are unreachable");
            }
        }
        Commands::List { user } => {
            let items = service.reconciled_referrals(&user).await?;
            if items.is_empty() {
                println!("No referrals found.");
            }
            for item in &items {
                println!("{}", describe(item));
            }
        }
        Commands::Dashboard {
            user,
            search,
            bucket,
        } => {
            let bucket: DashboardBucket = bucket.parse()?;
            let view = service.dashboard(&user, search.as_deref(), bucket).await?;
            println!(
                "All: {}  Pending: {}  Active: {}  Urgent: {}",
                view.counts.all, view.counts.pending, view.counts.active, view.counts.urgent
            );
            for card in &view.cards {
                println!(
                    "{}  {:<15}  {:<5}  {}{}  {}",
                    card.formatted_id,
                    card.display_status,
                    card.category,
                    card.client_name.as_deref().unwrap_or("(no PHI)"),
                    if card.is_urgent { " [urgent]" } else { "" },
                    card.service_label,
                );
            }
        }
        Commands::Submit { user, payload } => {
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let form: ReferralForm = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", payload.display()))?;

            let submitted = service.submit(&form, &user).await?;
            println!(
                "Submitted {} (PHI {})",
                submitted.referral.formatted_id(),
                submitted.phi.id
            );
        }
        Commands::SetStatus { id, status, user } => {
            let status: ReferralStatus = status.parse()?;
            let updated = service.update_status(id, status, &user).await?;
            println!(
                "{} is now {}",
                updated.formatted_id(),
                updated.status.display_label()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("referra=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Run `referra --help` for usage.");
        return Ok(());
    };

    let cfg = CoreConfig::from_lookup(|key| std::env::var(key).ok())?;
    let service = ReferralService::from_config(&cfg)?;
    run(service, command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use referra_core::namespace_from_env_value;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ReferralService {
        let cfg = CoreConfig::new(
            dir.path().join("data"),
            None,
            namespace_from_env_value(None).unwrap(),
        )
        .unwrap();
        ReferralService::from_config(&cfg).unwrap()
    }

    const FORM: &str = r#"{
        "serviceType": "Individualized Home Supports",
        "firstName": "Jane",
        "lastName": "Doe",
        "dateOfBirth": "1990-01-01",
        "pmiNumber": "PMI-0001",
        "waiverType": "CADI"
    }"#;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["referra", "set-status", "3", "matched", "--user", "cm-1"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::SetStatus { id: 3, ref status, ref user }) if status == "matched" && user == "cm-1"
        ));

        let cli = Cli::try_parse_from(["referra", "dashboard", "--user", "cm-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Dashboard { ref bucket, search: None, .. }) if bucket == "all"
        ));
    }

    #[tokio::test]
    async fn test_submit_then_set_status() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("form.json");
        std::fs::write(&payload, FORM).unwrap();

        run(
            service(&dir),
            Commands::Submit {
                user: "cm-1".into(),
                payload,
            },
        )
        .await
        .unwrap();

        let items = service(&dir).reconciled_referrals("cm-1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(describe(&items[0]).contains("Jane Doe"));

        run(
            service(&dir),
            Commands::SetStatus {
                id: items[0].referral.id,
                status: "completed".into(),
                user: "cm-1".into(),
            },
        )
        .await
        .unwrap();

        let items = service(&dir).reconciled_referrals("cm-1").await.unwrap();
        assert_eq!(items[0].referral.status, ReferralStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_bucket_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = run(
            service(&dir),
            Commands::Dashboard {
                user: "cm-1".into(),
                search: None,
                bucket: "later".into(),
            },
        )
        .await;
        assert!(result.is_err());
    }
}
