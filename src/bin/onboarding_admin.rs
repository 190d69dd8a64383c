use clap::{Parser, Subcommand};
use playerparent_onboarding::{
    config::Config,
    onboarding::models::{Profile, UserId, onboarding_complete},
    onboarding::{OnboardingService, Resolution, resolve::Action, sequencer::Step},
    session::Session,
    store::{self, ProfileStore},
};
use prettytable::{Table, row};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onboarding-admin")]
#[command(about = "Inspect player/parent onboarding state", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Row counts per role and parent link count
    Status,
    /// Profile, linked player and resolved step for one user
    Show {
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },
    /// Player profiles matching a name or username
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// The resolved profile, or an error when the store could not be read.
fn shown_profile<'a>(
    user: &UserId,
    resolution: &'a Resolution,
) -> anyhow::Result<Option<&'a Profile>> {
    if let Action::Hold { .. } = resolution.action {
        anyhow::bail!("could not read the profile for {user}; the store is unavailable");
    }
    Ok(resolution.profile.as_ref())
}

fn profile_rows(table: &mut Table, label: &str, p: &Profile) {
    table.add_row(row![format!("{label} user_id"), p.user_id]);
    table.add_row(row!["role", p.role.as_str()]);
    table.add_row(row!["username", dash(p.username.as_deref())]);
    table.add_row(row!["full_name", dash(p.full_name.as_deref())]);
    table.add_row(row!["hudl_link", dash(p.hudl_link.as_deref())]);
    table.add_row(row!["position", dash(p.position.as_deref())]);
    table.add_row(row!["school", dash(p.school.as_deref())]);
    table.add_row(row![
        "graduation_year",
        p.graduation_year.map(|y| y.to_string()).unwrap_or_else(|| "-".into())
    ]);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load()?;
    let store = store::open(&cfg).await?;

    match cli.command {
        Commands::Status => {
            let stats = store.stats().await?;
            let mut table = Table::new();
            table.add_row(row!["table", "rows"]);
            table.add_row(row!["profiles", stats.profiles]);
            table.add_row(row!["players", stats.players]);
            table.add_row(row!["parents", stats.parents]);
            table.add_row(row!["parent_children", stats.parent_links]);
            table.printstd();
        }
        Commands::Show { user_id } => {
            let user = UserId(user_id);
            let service = OnboardingService::from_config(store.clone(), &cfg);
            let resolution = service
                .resolve(Some(&Session::new(user.as_str())), Step::FIRST)
                .await;
            let Some(profile) = shown_profile(&user, &resolution)? else {
                println!("no profile for {user}; resolves to step 2");
                return Ok(());
            };
            let mut table = Table::new();
            profile_rows(&mut table, "own", profile);
            if let Some(player) = resolution.player.as_ref() {
                profile_rows(&mut table, "linked", player);
            }
            let step = resolution
                .action
                .step()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "exit".into());
            table.add_row(row!["resolved step", step]);
            table.add_row(row![
                "complete",
                onboarding_complete(profile, resolution.player.as_ref())
            ]);
            table.printstd();
        }
        Commands::Search { query, limit } => {
            let hits = store.search_players(&query, limit.clamp(1, 50)).await?;
            let mut table = Table::new();
            table.add_row(row!["user_id", "username", "full_name", "school"]);
            for p in &hits {
                table.add_row(row![
                    p.user_id,
                    dash(p.username.as_deref()),
                    dash(p.full_name.as_deref()),
                    dash(p.school.as_deref())
                ]);
            }
            table.printstd();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use playerparent_onboarding::onboarding::models::AccountType;

    fn resolution(action: Action) -> Resolution {
        Resolution {
            action,
            account: AccountType::Undetermined,
            steps: Vec::new(),
            skipped: false,
            complete: false,
            profile: None,
            player: None,
        }
    }

    #[test]
    fn store_outage_is_an_error_not_a_missing_profile() {
        let user = UserId("u1".into());
        let held = resolution(Action::Hold { step: Step::FIRST });
        let err = shown_profile(&user, &held).unwrap_err();
        assert!(err.to_string().contains("store is unavailable"));

        let fresh = resolution(Action::Render {
            step: Step::new(2).unwrap(),
        });
        assert!(shown_profile(&user, &fresh).unwrap().is_none());
    }
}
