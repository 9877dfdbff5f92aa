//! Operator CLI: resolve on-call identities and review the ticket ledger
//! from a terminal, using the same clients the bot runs with.

use std::process;
use std::sync::Arc;

use frontdesk::clients::chat::ChatClient;
use frontdesk::clients::schedule::ScheduleClient;
use frontdesk::config::{self, Config};
use frontdesk::db::TicketDb;
use frontdesk::ledger::LedgerStore;
use frontdesk::routing::OnCallResolver;
use frontdesk::teams::TeamRoster;

fn print_usage() {
    eprintln!("Usage: frontdesk <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  resolve <team-id>   Resolve the current on-call identity for a team");
    eprintln!("  teams               List the configured team roster");
    eprintln!("  unanswered          List tickets that never received a reply");
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("resolve") => match args.get(1) {
            Some(team_id) => cmd_resolve(team_id).await,
            None => {
                print_usage();
                process::exit(2);
            }
        },
        Some("teams") => cmd_teams(),
        Some("unanswered") => cmd_unanswered().await,
        _ => {
            print_usage();
            process::exit(2);
        }
    };

    if let Err(message) = result {
        eprintln!("{}", message);
        process::exit(1);
    }
}

fn build_resolver(config: &Config) -> OnCallResolver {
    let chat = Arc::new(ChatClient::new(&config.chat.base_url, &config.chat.token));
    let schedule = Arc::new(ScheduleClient::new(
        &config.schedule.base_url,
        &config.schedule.api_key,
    ));
    let roster = Arc::new(TeamRoster::new(config.teams.clone()));

    OnCallResolver::new(
        roster,
        chat.clone(),
        schedule,
        chat,
        config.chat.support_channel.clone(),
    )
    .with_step_timeout(config.step_timeout())
}

async fn cmd_resolve(team_id: &str) -> Result<(), String> {
    let config = config::load_config()?;
    let resolver = build_resolver(&config);

    let identity = resolver
        .resolve(team_id)
        .await
        .map_err(|e| e.to_string())?;

    match identity.mention() {
        Some(mention) => println!("{}", mention),
        None => println!("unresolved: no on-call identity could be determined"),
    }
    Ok(())
}

fn cmd_teams() -> Result<(), String> {
    let config = config::load_config()?;

    if config.teams.is_empty() {
        println!("No teams configured.");
        return Ok(());
    }

    for team in &config.teams {
        println!(
            "{:<16} {:<24} schedule={:<10} group={}",
            team.id,
            team.title,
            team.schedule_ref.as_deref().unwrap_or("-"),
            team.fallback_group.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_unanswered() -> Result<(), String> {
    let db = TicketDb::open().map_err(|e| e.to_string())?;
    let open = db.find_unanswered().await.map_err(|e| e.to_string())?;

    if open.is_empty() {
        println!("Every tracked ticket has a reply.");
        return Ok(());
    }

    for ticket in &open {
        println!(
            "{}  [{}] {}  {}",
            ticket.created_at, ticket.team, ticket.summary, ticket.message_link
        );
    }
    println!("{} unanswered ticket(s)", open.len());
    Ok(())
}
