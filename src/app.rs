use crate::console::{self, ConsoleCommand};
use crate::env::Env;
use crate::{export, render};
use anyhow::Context;
use log::{debug, info, warn};
use pingboard_client::{Dashboard, DashboardHandle, HostApi, RestClient, WebSocketTransport};
use pingboard_common::protocol::{HostCandidate, HostRecord};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

const DEFAULT_IMPORT_NAME: &str = "hosts.csv";

fn rest_client(config: &Env) -> anyhow::Result<RestClient> {
    let endpoints = config.endpoints()?;
    let timeout = config.dashboard_config().request_timeout;
    Ok(RestClient::new(endpoints, timeout)?)
}

pub(crate) async fn start(config: Env) -> anyhow::Result<()> {
    let endpoints = config.endpoints()?;
    let dashboard_config = config.dashboard_config();
    let api = Arc::new(RestClient::new(
        endpoints.clone(),
        dashboard_config.request_timeout,
    )?);

    let (handle, task) = Dashboard::spawn(
        dashboard_config,
        endpoints,
        Arc::new(WebSocketTransport),
        api,
    );

    let mut views = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut shown = views.borrow_and_update().clone();
    print!("{}", render::view(&shown, None));
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("dashboard task ended");
                    break;
                }
                let current = views.borrow_and_update().clone();
                print!("\n{}", render::view(&current, Some(&*shown.hosts)));
                shown = current;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !dispatch(&handle, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, console disabled");
                    stdin_open = false;
                }
                Err(err) => {
                    warn!("failed to read console input: {err}");
                    stdin_open = false;
                }
            },
            _ = signal::ctrl_c() => {
                info!("ctrl+c pressed, shutting down");
                break;
            }
        }
    }

    handle.shutdown();
    task.await.context("dashboard task panicked")?;

    Ok(())
}

/// Runs one console line. Returns `false` when the user asked to quit.
fn dispatch(handle: &DashboardHandle, line: &str) -> bool {
    let command = match console::parse(line) {
        Ok(command) => command,
        Err(usage) => {
            println!("{usage}");
            return true;
        }
    };

    match command {
        ConsoleCommand::Add(address) => match HostCandidate::parse(&address) {
            Ok(candidate) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    // failures are already shown as notices
                    if let Err(err) = handle.add_host(candidate).await {
                        debug!("add host failed: {err}");
                    }
                });
            }
            Err(err) => println!("{err}"),
        },
        ConsoleCommand::Import(path) => {
            let handle = handle.clone();
            tokio::spawn(async move {
                let contents = match tokio::fs::read(&path).await {
                    Ok(contents) => contents,
                    Err(err) => {
                        warn!("failed to read {}: {err}", path.display());
                        return;
                    }
                };
                if let Err(err) = handle.import(file_name(&path), contents).await {
                    debug!("import failed: {err}");
                }
            });
        }
        ConsoleCommand::Export(path) => {
            let hosts = handle.view().hosts;
            if let Err(err) = write_export(&hosts, path.as_deref()) {
                warn!("export failed: {err:#}");
            }
        }
        ConsoleCommand::Refresh => send(handle, Action::Refresh),
        ConsoleCommand::Reload => send(handle, Action::Reload),
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Empty => {}
    }

    true
}

enum Action {
    Refresh,
    Reload,
}

fn send(handle: &DashboardHandle, action: Action) {
    let handle = handle.clone();
    tokio::spawn(async move {
        let result = match action {
            Action::Refresh => handle.refresh().await,
            Action::Reload => handle.fetch_all().await,
        };
        if let Err(err) = result {
            warn!("{err}");
        }
    });
}

pub(crate) async fn add(config: Env, address: &str) -> anyhow::Result<()> {
    let candidate = HostCandidate::parse(address)?;
    let api = rest_client(&config)?;

    let record = api.create_host(&candidate).await?;
    info!("host {} added", record.address);
    print!("{}", render::table(std::slice::from_ref(&record)));

    Ok(())
}

pub(crate) async fn import(config: Env, path: &Path) -> anyhow::Result<()> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let api = rest_client(&config)?;

    let summary = api.import_hosts(&file_name(path), contents).await?;
    info!("hosts imported from {}", path.display());
    if !summary.trim().is_empty() {
        println!("{}", summary.trim());
    }

    Ok(())
}

pub(crate) async fn export(config: Env, output: Option<&Path>) -> anyhow::Result<()> {
    let api = rest_client(&config)?;
    let hosts = api.fetch_all().await?;
    write_export(&hosts, output)?;
    info!("exported {} hosts", hosts.len());
    Ok(())
}

fn write_export(hosts: &[HostRecord], output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            export::write_csv(hosts, BufWriter::new(file))?;
            info!("wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            export::write_csv(hosts, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_IMPORT_NAME.to_string())
}
