use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ptpconsole::config::ClientSettings;
use ptpconsole::controller::{ApplyOutcome, Controller, ServiceAction};
use ptpconsole::gateway::HttpGateway;
use ptpconsole::instance::{ClockInstanceConfig, InstanceId};
use ptpconsole::status::{SyncMode, SyncModeState};
use ptpconsole::view;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the config API
    #[arg(long, default_value = "http://localhost:8001")]
    api_url: String,

    /// Status poll period in seconds
    #[arg(long, default_value_t = 1)]
    interval: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live status console (default)
    Watch,
    /// Apply configuration changes to one clock instance
    Apply {
        #[arg(long, value_parser = parse_instance)]
        instance: InstanceId,
        #[arg(long)]
        domain: Option<u8>,
        #[arg(long)]
        priority1: Option<u8>,
        #[arg(long)]
        priority2: Option<u8>,
        #[arg(long)]
        log_announce_interval: Option<i8>,
        #[arg(long)]
        announce_receipt_timeout: Option<u8>,
        #[arg(long)]
        log_sync_interval: Option<i8>,
        #[arg(long)]
        sync_receipt_timeout: Option<u8>,
        /// Interface to bind; repeat to bind two. Replaces the current set.
        #[arg(long = "interface")]
        interfaces: Vec<String>,
    },
    /// Show or change the system sync mode
    Mode {
        #[arg(long, value_parser = parse_mode)]
        set: Option<SyncMode>,
        /// Primary clock, meaningful in PTP mode only
        #[arg(long, value_parser = parse_instance)]
        primary: Option<InstanceId>,
    },
    /// Control one instance's daemon
    Service {
        #[arg(value_parser = parse_verb)]
        action: ServiceVerb,
        #[arg(value_parser = parse_instance)]
        instance: InstanceId,
    },
    /// Tail one instance's daemon logs
    Logs {
        #[arg(value_parser = parse_instance)]
        instance: InstanceId,
        #[arg(long, default_value_t = 100)]
        lines: u32,
    },
    /// List host network interfaces
    Interfaces {
        /// Persist the snapshot server-side
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy)]
enum ServiceVerb {
    Start,
    Stop,
    Restart,
    Status,
}

fn parse_instance(s: &str) -> Result<InstanceId, String> {
    InstanceId::from_label(s).ok_or_else(|| format!("unknown instance '{}', expected ptp1 or ptp2", s))
}

fn parse_mode(s: &str) -> Result<SyncMode, String> {
    SyncMode::parse(s).ok_or_else(|| format!("unknown mode '{}', expected internal, BB or PTP", s))
}

fn parse_verb(s: &str) -> Result<ServiceVerb, String> {
    match s.to_ascii_lowercase().as_str() {
        "start" => Ok(ServiceVerb::Start),
        "stop" => Ok(ServiceVerb::Stop),
        "restart" => Ok(ServiceVerb::Restart),
        "status" => Ok(ServiceVerb::Status),
        _ => Err(format!("unknown action '{}', expected start, stop, restart or status", s)),
    }
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let settings = ClientSettings {
        api_base: args.api_url.clone(),
        poll_interval_secs: args.interval,
        ..ClientSettings::default()
    };
    let gateway = Arc::new(HttpGateway::new(&settings)?);
    let mut controller = Controller::connect(gateway, settings).await?;

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => run_watch(&mut controller).await,
        Command::Apply {
            instance,
            domain,
            priority1,
            priority2,
            log_announce_interval,
            announce_receipt_timeout,
            log_sync_interval,
            sync_receipt_timeout,
            interfaces,
        } => {
            let mut desired = instance_config(&controller, instance)?;
            if let Some(v) = domain {
                desired.domain_number = v;
            }
            if let Some(v) = priority1 {
                desired.priority1 = v;
            }
            if let Some(v) = priority2 {
                desired.priority2 = v;
            }
            if let Some(v) = log_announce_interval {
                desired.log_announce_interval = v;
            }
            if let Some(v) = announce_receipt_timeout {
                desired.announce_receipt_timeout = v;
            }
            if let Some(v) = log_sync_interval {
                desired.log_sync_interval = v;
            }
            if let Some(v) = sync_receipt_timeout {
                desired.sync_receipt_timeout = v;
            }
            if !interfaces.is_empty() {
                desired.bound_interfaces = interfaces;
            }
            run_apply(&controller, instance, desired).await
        }
        Command::Mode { set, primary } => run_mode(&controller, set, primary).await,
        Command::Service { action, instance } => run_service(&controller, action, instance).await,
        Command::Logs { instance, lines } => {
            let logs = controller.service_logs(instance, lines).await?;
            print!("{}", logs);
            Ok(())
        }
        Command::Interfaces { save } => run_interfaces(&mut controller, save).await,
    }
}

fn instance_config(
    controller: &Controller<HttpGateway>,
    id: InstanceId,
) -> Result<ClockInstanceConfig> {
    let snapshot = controller.view_snapshot()?;
    let instance = snapshot
        .instances
        .iter()
        .find(|instance| instance.id == id)
        .ok_or_else(|| anyhow::anyhow!("instance {} is not tracked", id))?;
    Ok(instance.last_applied.clone())
}

async fn run_watch(controller: &mut Controller<HttpGateway>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    controller.start_polling();

    let mut last_rendered: Option<view::ViewModel> = None;
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = controller.view_snapshot()?;
        let vm = view::project(&snapshot);
        if last_rendered.as_ref() != Some(&vm) {
            println!();
            for line in view::render_lines(&vm) {
                println!("{}", line);
            }
            last_rendered = Some(vm);
        }
    }

    controller.stop_polling();
    info!("Exiting.");
    Ok(())
}

async fn run_apply(
    controller: &Controller<HttpGateway>,
    id: InstanceId,
    desired: ClockInstanceConfig,
) -> Result<()> {
    match controller.apply_instance(id, desired).await? {
        ApplyOutcome::NoChanges => {
            println!("{}: no changes", id);
        }
        ApplyOutcome::Applied(plan) => {
            let steps: Vec<String> = plan.steps.iter().map(ToString::to_string).collect();
            println!("{}: applied ({})", id, steps.join(", "));

            controller.settle_and_refresh(id).await;
            let snapshot = controller.view_snapshot()?;
            for line in view::render_lines(&view::project(&snapshot)) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn run_mode(
    controller: &Controller<HttpGateway>,
    set: Option<SyncMode>,
    primary: Option<InstanceId>,
) -> Result<()> {
    match (set, primary) {
        (None, None) => {
            let snapshot = controller.view_snapshot()?;
            let mode = snapshot.mode.mode();
            if mode == SyncMode::Ptp {
                match controller.current_primary_clock().await? {
                    Some(id) => println!("{} (primary clock {})", mode.as_wire(), id),
                    None => println!("{}", mode.as_wire()),
                }
            } else {
                println!("{}", mode.as_wire());
            }
        }
        (None, Some(id)) => {
            controller.set_primary_clock(id).await?;
            println!("Primary clock set to {}", id);
        }
        (Some(mode), primary) => {
            if primary.is_some() && mode != SyncMode::Ptp {
                warn!("--primary is only meaningful in PTP mode, ignoring");
            }
            let state = SyncModeState::new(mode, primary);
            controller.set_sync_mode(state).await?;
            println!("Sync mode set to {}", mode.as_wire());
        }
    }
    Ok(())
}

async fn run_service(
    controller: &Controller<HttpGateway>,
    action: ServiceVerb,
    id: InstanceId,
) -> Result<()> {
    match action {
        ServiceVerb::Status => {
            let text = controller.service_status_text(id).await?;
            print!("{}", text);
        }
        ServiceVerb::Start => {
            controller.service_action(id, ServiceAction::Start).await?;
            println!("{} started", id.service_name());
        }
        ServiceVerb::Stop => {
            controller.service_action(id, ServiceAction::Stop).await?;
            println!("{} stopped", id.service_name());
        }
        ServiceVerb::Restart => {
            controller.service_action(id, ServiceAction::Restart).await?;
            println!("{} restarted", id.service_name());
        }
    }
    Ok(())
}

async fn run_interfaces(controller: &mut Controller<HttpGateway>, save: bool) -> Result<()> {
    controller.refresh_interfaces().await?;
    for iface in controller.interfaces() {
        let ip = iface.ip.as_deref().unwrap_or("-");
        let state = if iface.is_up { "UP" } else { "DOWN" };
        println!("{:<16} {:<16} {}", iface.name, ip, state);
    }
    if save {
        match controller.save_interfaces().await? {
            Some(file) => println!("Snapshot saved to {}", file),
            None => println!("Snapshot saved"),
        }
    }
    Ok(())
}
