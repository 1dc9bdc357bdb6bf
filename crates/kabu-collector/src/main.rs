//! データ収集 CLI。

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kabu_collector::modules::{self, SyncMode, SyncOptions};
use kabu_collector::{CollectorConfig, CollectorError, RunReport};
use kabu_core::MarketCalendar;
use kabu_jquants::{today_tokyo, JQuantsClient};
use kabu_notify::{CompanyDiff, LineSender, NotificationSink, SnapshotArchive};
use kabu_store::DatasetStore;

#[derive(Parser)]
#[command(name = "kabu-collector")]
#[command(about = "日本株データ収集エンジン (J-Quants → CSV)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// ログレベル (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 上場銘柄一覧の同期 (廃止検出・スナップショット保存を含む)
    SyncListed,

    /// 日次株価の同期
    SyncPrices {
        /// 同期モード (incremental | bulk)
        #[arg(long, default_value = "incremental")]
        mode: SyncMode,

        /// 明示的な開始日 (YYYY-MM-DD、モードより優先)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// 明示的な終了日 (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// 財務諸表の同期 (開示日ベース)
    SyncStatements {
        /// 同期モード (incremental | bulk)
        #[arg(long, default_value = "incremental")]
        mode: SyncMode,

        /// 明示的な開始日 (YYYY-MM-DD、モードより優先)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// 明示的な終了日 (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// 全種別の同期 (銘柄 → 株価・財務は並行)
    RunAll {
        /// 同期モード (incremental | bulk)
        #[arg(long, default_value = "incremental")]
        mode: SyncMode,
    },

    /// 直近 2 スナップショットの銘柄差分を LINE 通知
    NotifyDiff,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "kabu_collector={},kabu_jquants={},kabu_store={},kabu_notify={}",
                    cli.log_level, cli.log_level, cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("kabu-collector 開始");

    let config = CollectorConfig::from_env()?;
    config.validate()?;
    tracing::debug!(config = ?config, "設定読込完了");

    let store = DatasetStore::new(&config.output_dir).with_sjis_copy(config.sync.write_sjis_copy);
    let calendar = MarketCalendar::tokyo().with_skip_weekends(config.sync.skip_weekends);
    let client = JQuantsClient::new(config.jquants_config(), config.credentials())
        .map_err(CollectorError::Fetch)?;

    // Ctrl+C で日の区切りまで処理してから停止
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::warn!("中断要求を受信、区切りの良いところで停止します");
            cancel.cancel();
        });
    }

    let today = today_tokyo();

    match cli.command {
        Commands::SyncListed => {
            let report = modules::sync_listed(&client, &store).await?;
            report.log_summary();
            save_snapshot(&config, today, &report);
        }
        Commands::SyncPrices { mode, from, to } => {
            let options = SyncOptions {
                mode,
                from,
                to,
                history_days: config.sync.history_days,
            };
            let report =
                modules::sync_prices(&client, &store, &calendar, &options, today, &cancel).await?;
            report.log_summary();
        }
        Commands::SyncStatements { mode, from, to } => {
            let options = SyncOptions {
                mode,
                from,
                to,
                history_days: config.sync.history_days,
            };
            let report =
                modules::sync_statements(&client, &store, &calendar, &options, today, &cancel)
                    .await?;
            report.log_summary();
        }
        Commands::RunAll { mode } => {
            let listed = modules::sync_listed(&client, &store).await?;
            listed.log_summary();
            save_snapshot(&config, today, &listed);

            let options = SyncOptions {
                mode,
                from: None,
                to: None,
                history_days: config.sync.history_days,
            };
            // 株価と財務は独立しているので並行実行。スロットルは
            // クライアント内で共有されるため API 間隔は守られる
            let (prices, statements) = tokio::join!(
                modules::sync_prices(&client, &store, &calendar, &options, today, &cancel),
                modules::sync_statements(&client, &store, &calendar, &options, today, &cancel),
            );
            prices?.log_summary();
            statements?.log_summary();
        }
        Commands::NotifyDiff => {
            notify_diff(&config, &store).await?;
        }
    }

    tracing::info!("kabu-collector 終了");
    Ok(())
}

/// 銘柄同期の観測コード一覧をスナップショットとして保存。
fn save_snapshot(config: &CollectorConfig, today: NaiveDate, report: &RunReport) {
    let Some(codes) = &report.snapshot else {
        return;
    };
    let archive = SnapshotArchive::new(config.snapshot_dir());
    match archive.save(today, codes) {
        Ok(()) => tracing::info!(date = %today, codes = codes.len(), "スナップショット保存"),
        Err(e) => tracing::error!(error = %e, "スナップショット保存に失敗"),
    }
}

/// 直近 2 スナップショットを比較して差分を LINE へ送信。
async fn notify_diff(config: &CollectorConfig, store: &DatasetStore) -> Result<(), CollectorError> {
    let archive = SnapshotArchive::new(config.snapshot_dir());

    let Some((previous_date, current_date)) = archive.latest_pair()? else {
        tracing::info!("比較対象のスナップショットが 2 日分揃っていません");
        return Ok(());
    };
    let (Some(previous), Some(current)) =
        (archive.load(previous_date)?, archive.load(current_date)?)
    else {
        tracing::warn!("スナップショットの読込に失敗しました");
        return Ok(());
    };

    let diff = CompanyDiff::between(previous_date, &previous, current_date, &current);
    tracing::info!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        "銘柄差分を計算"
    );

    let companies = if diff.has_changes() {
        store.load_companies()?
    } else {
        Vec::new()
    };
    let message = diff.format_message(&companies);

    match LineSender::from_env() {
        Some(sender) if sender.is_enabled() => {
            sender.send_text(&message).await?;
            tracing::info!(sink = sender.name(), "差分通知を送信");
        }
        _ => {
            tracing::warn!("LINE 設定が無効のため通知をスキップします");
            println!("{message}");
        }
    }

    Ok(())
}
