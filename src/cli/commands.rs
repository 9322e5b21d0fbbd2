//! Command handlers for the `volkeeper` binary.

use std::fmt::Write as _;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::backend::ActionRequest;
use crate::config::{Verbosity, VolkeeperConfig};
use crate::coordinator::Snapshot;
use crate::error::VolError;
use crate::progress::bar::create_busy_spinner;
use crate::session::{ReconnectPolicy, Session, VolumeRow};

use super::args::{Commands, WatchArgs};

/// Execute a dispatched command other than `completions`.
pub async fn run(command: Commands, config: VolkeeperConfig, verbosity: Verbosity) -> Result<(), VolError> {
    let session = Session::from_config(&config)?;
    let quiet = verbosity.is_quiet();

    match command {
        Commands::Ls => {
            busy("Loading volumes", quiet, session.bootstrap()).await?;
            print!("{}", format_rows(&session.rows()));
            Ok(())
        }
        Commands::Progress => {
            busy(
                "Fetching actions in progress",
                quiet,
                session.coordinator().refresh_actions(),
            )
            .await?;
            print!("{}", format_snapshot(&session.coordinator().current_actions()));
            Ok(())
        }
        Commands::Size(args) => {
            let size = busy("Calculating size", quiet, session.recompute_size(&args.volume)).await?;
            println!("{}\t{}\t{} bytes", args.volume, size.display(), size.bytes);
            Ok(())
        }
        Commands::Watch(args) => watch(session, &config, args, quiet).await,
        Commands::Completions(_) => Ok(()),
        other => {
            let (volume, request) = action_request(other)?;
            let message = format!("Requesting {} of {}", request.kind(), volume);
            busy(&message, quiet, session.perform(&volume, &request)).await?;
            if !quiet {
                eprintln!("{} of volume {} accepted", capitalize(request.kind().as_str()), volume);
            }
            Ok(())
        }
    }
}

/// Map an action subcommand to the volume and request it targets.
fn action_request(command: Commands) -> Result<(String, ActionRequest), VolError> {
    let pair = match command {
        Commands::Clone(a) => (a.volume, ActionRequest::Clone { dest_volume: a.dest }),
        Commands::Export(a) => (a.volume, ActionRequest::Export { path: a.path }),
        Commands::Import(a) => (a.volume, ActionRequest::Import { path: a.path }),
        Commands::Save(a) => (a.volume, ActionRequest::Save { image: a.image }),
        Commands::Load(a) => (a.volume, ActionRequest::Load { image: a.image }),
        Commands::Push(a) => (a.volume, ActionRequest::Push { reference: a.reference }),
        Commands::Pull(a) => (a.volume, ActionRequest::Pull { reference: a.reference }),
        Commands::Transfer(a) => {
            let dest_volume = a.dest_volume.unwrap_or_else(|| a.volume.clone());
            (
                a.volume,
                ActionRequest::Transfer {
                    dest_host: a.host,
                    dest_volume,
                },
            )
        }
        Commands::Empty(a) => (a.volume, ActionRequest::Empty),
        Commands::Delete(a) => {
            if !a.yes {
                return Err(VolError::InvalidRequest(format!(
                    "deleting '{}' cannot be undone; pass --yes to confirm",
                    a.volume
                )));
            }
            (a.volume, ActionRequest::Delete)
        }
        other => {
            return Err(VolError::InvalidRequest(format!("{:?} is not an action", other)));
        }
    };
    Ok(pair)
}

/// Await `fut` with a spinner on stderr.
async fn busy<T, E>(message: &str, quiet: bool, fut: impl Future<Output = Result<T, E>>) -> Result<T, E> {
    let spinner = create_busy_spinner(message.to_string(), quiet);
    let result = fut.await;
    spinner.finish_and_clear();
    result
}

async fn watch(mut session: Session, config: &VolkeeperConfig, args: WatchArgs, quiet: bool) -> Result<(), VolError> {
    if let Some(secs) = args.interval {
        session = session.with_poll_interval((secs > 0).then(|| std::time::Duration::from_secs(secs)));
    }
    if args.no_reconnect || !config.events.reconnect {
        session = session.with_reconnect(ReconnectPolicy::disabled());
    }

    busy("Loading volumes", quiet, session.bootstrap()).await?;
    print!("{}", format_rows(&session.rows()));

    let shutdown = CancellationToken::new();
    let mut actions = session.coordinator().subscribe();
    let mut volumes = session.directory().subscribe();
    let mut notices = session.notifier().subscribe();

    let live = session.run_live(shutdown.clone());
    tokio::pin!(live);

    loop {
        tokio::select! {
            result = &mut live => return result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping live updates");
                shutdown.cancel();
            }
            Ok(()) = actions.changed() => {
                let stamp = chrono::Local::now().format("%H:%M:%S");
                let revision = actions.borrow_and_update().revision();
                println!("[{}] actions updated (revision {})", stamp, revision);
                print!("{}", format_rows(&session.rows()));
            }
            Ok(()) = volumes.changed() => {
                let _ = volumes.borrow_and_update();
                let stamp = chrono::Local::now().format("%H:%M:%S");
                println!("[{}] volumes updated", stamp);
                print!("{}", format_rows(&session.rows()));
            }
            Ok(notice) = notices.recv() => {
                if !quiet {
                    eprintln!("{}", notice);
                }
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render rows as an aligned table.
pub fn format_rows(rows: &[VolumeRow]) -> String {
    if rows.is_empty() {
        return "No volumes.\n".to_string();
    }

    let name_width = rows
        .iter()
        .map(|r| r.volume.name.len())
        .max()
        .unwrap_or(0)
        .max("VOLUME".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$}  {:<8}  {:<10}  {:<24}  STATUS",
        "VOLUME", "DRIVER", "SIZE", "CONTAINERS"
    );
    for row in rows {
        let size = if row.volume.size_loading {
            "...".to_string()
        } else {
            row.volume.size.clone().unwrap_or_else(|| "-".to_string())
        };
        let containers = if row.volume.containers.is_empty() {
            "-".to_string()
        } else {
            row.volume.containers.join(",")
        };
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<8}  {:<10}  {:<24}  {}",
            row.volume.name, row.volume.driver, size, containers, row.state
        );
    }
    out
}

/// Render the action snapshot, one volume per line.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    if snapshot.is_empty() {
        return "No actions in progress.\n".to_string();
    }
    let mut out = String::new();
    for (volume, record) in snapshot.actions() {
        let _ = writeln!(out, "{}\t{}", volume, record.describe());
    }
    out
}
