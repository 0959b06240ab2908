//! `linkbird` command-line client.
//!
//! Reads `~/.linkbird/config.json`, optionally signs in, and prints the
//! leads table, campaigns table, dashboard overview or a route decision.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use linkbird_lib::config::{load_config, ui_snapshot_path, Config};
use linkbird_lib::error::ErrorPayload;
use linkbird_lib::routes::{resolve, Resolution, Route};
use linkbird_lib::state::{CampaignFiltersPatch, LeadFiltersPatch, UiStore};
use linkbird_lib::supabase::rest::AccessToken;
use linkbird_lib::supabase::{AuthProvider, RestDataService, SupabaseAuth};
use linkbird_lib::views::{AppContext, CampaignsView, DashboardView, LeadsView, ViewState};
use linkbird_lib::DashboardError;

#[derive(Parser, Debug)]
#[command(name = "linkbird")]
#[command(version)]
#[command(about = "LinkedIn outreach dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Sign in as this user before running the command
    #[arg(long, env = "LINKBIRD_EMAIL", global = true)]
    email: Option<String>,

    #[arg(long, env = "LINKBIRD_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Print JSON instead of tab-separated rows
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List leads, newest first
    Leads {
        #[arg(long)]
        search: Option<String>,
        /// pending, contacted, responded or converted; "all" clears
        #[arg(long)]
        status: Option<String>,
        /// Campaign id; "all" clears
        #[arg(long)]
        campaign: Option<String>,
        /// Extra pages to load after the first
        #[arg(long, default_value_t = 0)]
        more: usize,
    },
    /// List campaigns with lead counts
    Campaigns {
        #[arg(long)]
        search: Option<String>,
        /// draft, active, paused or completed; "all" clears
        #[arg(long)]
        status: Option<String>,
    },
    /// Overview numbers and recent activity
    Dashboard,
    /// Show which page a path renders, applying the sign-in guard
    Route { path: String },
}

/// `"all"` is the dropdown's clear option.
fn optional_filter(value: &str) -> Option<&str> {
    if value.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(value)
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<UiStore>> {
    if !config.persist_ui_state {
        return Ok(Arc::new(UiStore::new()));
    }
    let path = ui_snapshot_path()?;
    if !path.exists() {
        return Ok(Arc::new(UiStore::new()));
    }
    match UiStore::load_snapshot(&path) {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => {
            log::warn!("Ignoring unreadable UI snapshot {}: {}", path.display(), e);
            Ok(Arc::new(UiStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Err(err) = run(&cli).await else {
        return Ok(());
    };
    let Some(dashboard_err) = err.downcast_ref::<DashboardError>() else {
        return Err(err);
    };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ErrorPayload::from(dashboard_err))?);
    } else {
        eprintln!("Error: {:#}", err);
        eprintln!("{}", dashboard_err.recovery_suggestion());
    }
    std::process::exit(1);
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config().context("Failed to load LinkBird config")?;
    config.validate()?;

    let token = AccessToken::default();
    let auth = Arc::new(SupabaseAuth::new(
        &config.supabase_url,
        &config.anon_key,
        config.request_timeout_secs,
        token.clone(),
    )?);
    let data = Arc::new(RestDataService::new(
        &config.supabase_url,
        &config.anon_key,
        config.request_timeout_secs,
        token,
    )?);

    if let (Some(email), Some(password)) = (&cli.email, &cli.password) {
        auth.sign_in(email, password)
            .await
            .context("Sign-in failed")?;
    }

    let store = open_store(&config)?;
    let ctx = AppContext::new(data, auth.clone())
        .with_store(Arc::clone(&store))
        .with_page_size(config.page_size);

    let outcome = run_command(cli, &ctx, auth.as_ref()).await;

    if config.persist_ui_state {
        let path = ui_snapshot_path()?;
        if let Err(e) = store.save_snapshot(&path) {
            log::warn!("Failed to save UI snapshot: {}", e);
        }
    }
    outcome
}

async fn run_command(cli: &Cli, ctx: &AppContext, auth: &dyn AuthProvider) -> anyhow::Result<()> {
    let store = &ctx.store;
    match &cli.command {
        Command::Leads {
            search,
            status,
            campaign,
            more,
        } => {
            let mut patch = LeadFiltersPatch::default();
            if let Some(search) = search {
                patch = patch.search(search.as_str());
            }
            if let Some(status) = status {
                patch = patch.status(optional_filter(status));
            }
            if let Some(campaign) = campaign {
                patch = patch.campaign(optional_filter(campaign));
            }
            store.set_lead_filters(patch);

            let view = LeadsView::new(ctx.clone());
            let mut failure = view.load().await.err();
            if failure.is_none() {
                for _ in 0..*more {
                    if !view.has_next_page() {
                        break;
                    }
                    if let Err(e) = view.load_more().await {
                        failure = Some(e);
                        break;
                    }
                }
            }
            match view.view_state() {
                ViewState::Ready(rows) if cli.json => {
                    println!("{}", serde_json::to_string_pretty(&rows)?)
                }
                ViewState::Ready(rows) => {
                    for row in &rows {
                        println!(
                            "{}\t{}\t{}\t{}\t{}\t{}",
                            row.id,
                            row.full_name(),
                            row.email,
                            row.company.as_deref().unwrap_or("-"),
                            row.status.label(),
                            row.campaign_name().unwrap_or("-"),
                        );
                    }
                    if let Some(e) = &failure {
                        eprintln!("Could not load more leads: {}", e);
                    } else if view.has_next_page() {
                        eprintln!("More leads available; pass --more to load them.");
                    }
                }
                ViewState::Empty(message) => eprintln!("{}", message),
                ViewState::Error(message) => {
                    eprintln!("{}", message);
                    return match failure {
                        Some(e) => Err(e.into()),
                        None => Err(anyhow::anyhow!(message)),
                    };
                }
                ViewState::Loading => {}
            }
        }
        Command::Campaigns { search, status } => {
            let mut patch = CampaignFiltersPatch::default();
            if let Some(search) = search {
                patch = patch.search(search.as_str());
            }
            if let Some(status) = status {
                patch = patch.status(optional_filter(status));
            }
            store.set_campaign_filters(patch);

            let view = CampaignsView::new(ctx.clone());
            let list = view.load().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&*list)?);
            } else {
                let s = &list.summary;
                println!(
                    "{} campaigns ({} active), {} leads, {}% avg conversion",
                    s.total_campaigns, s.active_campaigns, s.total_leads, s.avg_conversion_rate
                );
                for row in &list.campaigns {
                    println!(
                        "{}\t{}\t{}\t{} leads\t{}%",
                        row.campaign.id,
                        row.campaign.name,
                        row.campaign.status,
                        row.lead_count,
                        row.progress_percentage(),
                    );
                }
            }
        }
        Command::Dashboard => {
            let stats = DashboardView::new(ctx.clone()).load().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&*stats)?);
            } else {
                println!("Campaigns:      {} ({} active)", stats.total_campaigns, stats.active_campaigns);
                println!("Leads:          {}", stats.total_leads);
                println!("Contacted:      {}", stats.contacted_leads);
                println!("Responded:      {}", stats.responded_leads);
                println!("Response rate:  {}%", stats.response_rate);
                println!();
                println!("Recent campaigns:");
                for campaign in &stats.recent_campaigns {
                    println!("  {}\t{}", campaign.name, campaign.status);
                }
                println!("Recent leads:");
                for lead in &stats.recent_leads {
                    println!("  {}\t{}", lead.full_name(), lead.status.label());
                }
            }
        }
        Command::Route { path } => {
            let route = Route::parse(path);
            match resolve(route, auth.is_authenticated().await) {
                Resolution::Render(route) => println!("render {} ({})", route.title(), route),
                Resolution::Redirect(to) => println!("redirect {}", to),
            }
        }
    }
    Ok(())
}
