//! Operator tool for push notification schedules.
//!
//! Usage:
//!   schedule-tool status                 : show AWS settings and whether scheduling is enabled
//!   schedule-tool info --notice-id 42    : print the remote schedule of a notice
//!   schedule-tool delete --notice-id 42  : remove the remote schedule of a notice
//!   schedule-tool s3-check               : verify the icon bucket is reachable

use clap::{Parser, Subcommand};

use notices_api::config::AwsConfig;
use notices_api::routes::aws::settings_report;
use notices_api::services::icons::IconStorage;
use notices_api::services::scheduler::{schedule_name, ScheduleCoordinator};

#[derive(Parser)]
#[command(name = "schedule-tool", about = "Inspect AWS integrations and clean up notice push schedules")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the AWS configuration as the API sees it
    Status,
    /// Print the remote schedule of a notice
    Info {
        #[arg(long)]
        notice_id: i64,
    },
    /// Delete the remote schedule of a notice (missing schedules count as deleted)
    Delete {
        #[arg(long)]
        notice_id: i64,
    },
    /// Check that the icon bucket exists and the credentials can list it
    S3Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let aws = AwsConfig::from_env();
    let scheduler = ScheduleCoordinator::from_config(&aws.scheduler());

    match args.command {
        Command::Status => {
            for (name, value) in settings_report(&aws) {
                match value {
                    Some(v) => println!("  ok   {name}: {v}"),
                    None => println!("  --   {name}: not set"),
                }
            }
            if scheduler.is_configured() {
                println!("scheduler: enabled");
            } else {
                println!(
                    "scheduler: disabled (missing {})",
                    scheduler.missing_settings().join(", ")
                );
            }
        }
        Command::Info { notice_id } => match scheduler.schedule_info(notice_id).await {
            Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
            None => println!("{}: no schedule", schedule_name(notice_id)),
        },
        Command::Delete { notice_id } => {
            scheduler.on_delete(notice_id).await?;
            println!("{}: deleted", schedule_name(notice_id));
        }
        Command::S3Check => {
            let Some(settings) = aws.s3() else {
                anyhow::bail!(
                    "S3 is disabled: set USE_S3, AWS_STORAGE_BUCKET_NAME and the AWS credentials"
                );
            };
            let check = IconStorage::s3(&settings).check_access().await;
            if let Some(count) = check.sampled_objects {
                println!("  objects sampled: {count}");
            }
            if !check.ok {
                anyhow::bail!(check.message);
            }
            println!("s3: {}", check.message);
        }
    }

    Ok(())
}
