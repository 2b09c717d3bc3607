//! # Media Vault CLI
//!
//! 稼働中のGatewayに対して解決・キャッシュ操作を行う。

mod client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use vault_types::{
    BatchResolveRequest, EvictRequest, PrimeRequest, PrimedEntry, ResolutionOptions,
    ResolveRequest,
};

use client::GatewayClient;

#[derive(Parser)]
#[command(name = "vault-cli")]
#[command(about = "Media Vault access-URL resolution client")]
#[command(version)]
struct Cli {
    /// GatewayのベースURL
    #[arg(long, global = true, default_value = "http://localhost:3000")]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 1件のパスを署名付きURLへ解決する
    Resolve {
        /// コンテナ名
        #[arg(short, long)]
        container: String,

        /// 要求する有効期限（秒）
        #[arg(long)]
        ttl: Option<u64>,

        /// 制約付きクライアント（モバイル）として要求する
        #[arg(long)]
        constrained: bool,

        /// コンテナ内パス、または絶対URL
        path: String,
    },

    /// 複数パスをまとめて解決する
    Batch {
        #[arg(short, long)]
        container: String,

        #[arg(long)]
        ttl: Option<u64>,

        #[arg(long)]
        constrained: bool,

        /// 解決対象パス
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// 解決済みエントリ（JSON配列ファイル）をキャッシュへ投入する
    Prime {
        /// PrimedEntryのJSON配列を含むファイル
        file: String,
    },

    /// キャッシュからエントリを削除する
    Evict {
        /// コンテナ名（省略時は全コンテナのパス一致削除。Gateway側で許可が必要）
        #[arg(short, long)]
        container: Option<String>,

        path: String,
    },

    /// 期限切れエントリを掃除する
    Cleanup,

    /// Gatewayの稼働状態を表示する
    Health,
}

/// 指定がない項目はGatewayの既定値に任せる。
fn options(ttl: Option<u64>, constrained: bool) -> Option<ResolutionOptions> {
    if ttl.is_none() && !constrained {
        return None;
    }
    let mut options = ResolutionOptions::default().constrained(constrained);
    if let Some(ttl) = ttl {
        options = options.with_ttl(ttl);
    }
    Some(options)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_primed_entries(file: &str) -> Result<Vec<PrimedEntry>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("ファイルを読み込めません: {file}"))?;
    serde_json::from_str(&raw).with_context(|| format!("PrimedEntryの配列として解釈できません: {file}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = GatewayClient::new(&cli.gateway);
    tracing::debug!(gateway = %cli.gateway, "Gatewayへ接続");

    match cli.command {
        Commands::Resolve {
            container,
            ttl,
            constrained,
            path,
        } => {
            let response = client
                .resolve(&ResolveRequest {
                    path,
                    container,
                    options: options(ttl, constrained),
                })
                .await?;
            println!("{}", response.url);
        }
        Commands::Batch {
            container,
            ttl,
            constrained,
            paths,
        } => {
            let requested = paths.len();
            let response = client
                .resolve_batch(&BatchResolveRequest {
                    paths,
                    container,
                    options: options(ttl, constrained),
                })
                .await?;
            if response.urls.len() < requested {
                tracing::warn!(
                    requested,
                    resolved = response.urls.len(),
                    "一部のパスを解決できませんでした"
                );
            }
            print_json(&response.urls)?;
        }
        Commands::Prime { file } => {
            let entries = read_primed_entries(&file)?;
            print_json(&client.prime(&PrimeRequest { entries }).await?)?;
        }
        Commands::Evict { container, path } => {
            print_json(&client.evict(&EvictRequest { path, container }).await?)?;
        }
        Commands::Cleanup => print_json(&client.cleanup().await?)?,
        Commands::Health => print_json(&client.health().await?)?,
    }

    Ok(())
}
