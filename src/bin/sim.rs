// CrabCapture session simulator
// Runs the capture-session pipeline against the scripted in-memory camera

use anyhow::{anyhow, bail, Context, Result};
use crabcapture::testing::{native, MockDevice, MockNetwork};
use crabcapture::{
    CaptureAction, CrabCaptureConfig, PipelineEvent, SessionError, SessionOrchestrator,
    SettingKind, SwitchEvent,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

struct Options {
    command: String,
    operands: Vec<String>,
    config: Option<PathBuf>,
    json: bool,
    legacy: bool,
    version: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        command: String::new(),
        operands: Vec::new(),
        config: None,
        json: false,
        legacy: false,
        version: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.get(i).context("--config requires a path")?;
                options.config = Some(PathBuf::from(path));
            }
            "--json" => options.json = true,
            "--legacy" => options.legacy = true,
            "--version" => options.version = true,
            other if options.command.is_empty() => options.command = other.to_string(),
            other => options.operands.push(other.to_string()),
        }
        i += 1;
    }

    if options.command.is_empty() && !options.version {
        bail!("Usage: crabcapture-sim <init|switch|set|values|capture> [args] [--config <path>] [--legacy] [--json] [--version]");
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    crabcapture::init_logging();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;
    if options.version {
        println!("crabcapture-sim {}", crabcapture::VERSION);
        return Ok(());
    }

    let config = match &options.config {
        Some(path) => CrabCaptureConfig::load_from_file(path)?,
        None => CrabCaptureConfig::load_or_default(),
    };
    config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;

    let mut device = MockDevice::new();
    if options.legacy {
        device = device.legacy();
    }
    let session = SessionOrchestrator::new(device.into_arc(), MockNetwork::new().into_arc(), config);

    run_init(&session, options.json).await?;

    match options.command.as_str() {
        "init" => {}
        "switch" => cmd_switch(&session, &options).await?,
        "set" => cmd_set(&session, &options).await?,
        "values" => cmd_values(&session, &options).await?,
        "capture" => cmd_capture(&session, options.json).await?,
        other => bail!("Unknown command: {}", other),
    }

    session.shutdown().await;
    Ok(())
}

async fn run_init(session: &Arc<SessionOrchestrator>, json: bool) -> Result<()> {
    let mut events = session.initialize()?;
    while let Some(event) = events.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{:?}", event);
        }
        match event {
            PipelineEvent::Succeeded { .. } => return Ok(()),
            PipelineEvent::Failed(step) => return Err(SessionError::StepFailed(step).into()),
            PipelineEvent::Started | PipelineEvent::Progress(_) => {}
        }
    }
    bail!("pipeline ended without a result")
}

async fn cmd_switch(session: &Arc<SessionOrchestrator>, options: &Options) -> Result<()> {
    let index: usize = options
        .operands
        .first()
        .context("Usage: crabcapture-sim switch <mode_index>")?
        .parse()?;

    let mut events = session.switch_mode(index);
    while let Some(event) = events.recv().await {
        if options.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{:?}", event);
        }
        if event != SwitchEvent::Started {
            break;
        }
    }

    if let Some(mode) = session.current_mode().await {
        println!("current mode: {}", mode);
    }
    Ok(())
}

async fn cmd_set(session: &Arc<SessionOrchestrator>, options: &Options) -> Result<()> {
    let (kind, code) = match options.operands.as_slice() {
        [kind, code, ..] => (kind, code),
        _ => bail!("Usage: crabcapture-sim set <kind> <native_value>"),
    };
    let kind: SettingKind = kind
        .parse()
        .map_err(|_| anyhow!("Invalid setting kind: {}", kind))?;
    let code: i32 = code.parse()?;

    let report = session.set_setting(kind, native(kind, code), None).await?;
    let value = session.get_setting(kind).await?;

    if options.json {
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("{}", value);
        println!("refreshed: {:?}", report.checked);
        for failure in &report.stale {
            println!("stale: {}", failure);
        }
    }
    Ok(())
}

async fn cmd_values(session: &Arc<SessionOrchestrator>, options: &Options) -> Result<()> {
    let kind = options
        .operands
        .first()
        .context("Usage: crabcapture-sim values <kind>")?;
    let kind: SettingKind = kind
        .parse()
        .map_err(|_| anyhow!("Invalid setting kind: {}", kind))?;

    let values = session.supported_values(kind).await?;
    if options.json {
        println!("{}", serde_json::to_string(&values)?);
    } else {
        for value in values {
            println!("{}", value);
        }
    }
    Ok(())
}

/// One full shutter cycle: a recording or live push is stopped again right away.
async fn cmd_capture(session: &Arc<SessionOrchestrator>, json: bool) -> Result<()> {
    let mut action = session.start_capture().await?;
    print_action(action, json)?;
    if matches!(action, CaptureAction::RecordingStarted | CaptureAction::LiveStarted) {
        action = session.start_capture().await?;
        print_action(action, json)?;
    }
    if action.finishes_capture() {
        session.after_capture_finished().await?;
    }
    Ok(())
}

fn print_action(action: CaptureAction, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&action)?);
    } else {
        println!("{:?}", action);
    }
    Ok(())
}
