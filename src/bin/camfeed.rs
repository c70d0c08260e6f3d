use anyhow::{bail, Context, Result};
use camfeed::capture::SessionStatus;
use camfeed::config::AppConfig;
use camfeed::platform::CameraBackend;
use camfeed::{
    CustomCameraApp, LoopbackEngine, PreviewSurface, Rect, SetupOutcome, SyntheticBackend,
};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const USAGE: &str = "Usage: camfeed [--config PATH] [--app-id ID] [--channel NAME] [--frames N] \
[--snapshot PATH] [--list-devices] [--native] [--json]";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    app_id: Option<String>,
    channel: Option<String>,
    frames: Option<u64>,
    snapshot: Option<PathBuf>,
    list_devices: bool,
    native: bool,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                parsed.config = Some(PathBuf::from(value(args, i, "--config")?));
            }
            "--app-id" => {
                i += 1;
                parsed.app_id = Some(value(args, i, "--app-id")?.to_string());
            }
            "--channel" => {
                i += 1;
                parsed.channel = Some(value(args, i, "--channel")?.to_string());
            }
            "--frames" => {
                i += 1;
                parsed.frames = Some(value(args, i, "--frames")?.parse()?);
            }
            "--snapshot" => {
                i += 1;
                parsed.snapshot = Some(PathBuf::from(value(args, i, "--snapshot")?));
            }
            "--list-devices" => parsed.list_devices = true,
            "--native" => parsed.native = true,
            "--json" => parsed.json = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {}\n{}", other, USAGE),
        }
        i += 1;
    }
    Ok(parsed)
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("{} needs a value", flag))
}

fn backend(native: bool) -> Result<Arc<dyn CameraBackend>> {
    if native {
        #[cfg(feature = "native")]
        return Ok(Arc::new(camfeed::NativeBackend::new()));
        #[cfg(not(feature = "native"))]
        bail!("--native requires camfeed built with the `native` feature");
    }
    Ok(Arc::new(SyntheticBackend::phone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    camfeed::init_logging();

    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;

    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(Some(config_path.as_path()))?;
    if let Some(app_id) = args.app_id {
        config.rtc.app_id = app_id;
    }
    if let Some(channel) = args.channel {
        config.rtc.channel = channel;
    }

    let backend = backend(args.native)?;

    if args.list_devices {
        let devices = backend.devices()?;
        if args.json {
            println!("{}", serde_json::to_string(&devices)?);
        } else {
            for d in devices {
                println!("{}", d);
            }
        }
        return Ok(());
    }

    let engine = LoopbackEngine::initialize(config.rtc.app_id.clone())
        .context("set rtc.app_id in the config file, CAMFEED__RTC__APP_ID or --app-id")?;
    let pushed = engine.frames_pushed();

    let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));
    let outcome = CustomCameraApp::setup(&config, backend, Box::new(engine), &mut surface).await?;
    let feed = match outcome {
        SetupOutcome::Ready(feed) => feed,
        SetupOutcome::NoMatchingCamera {
            preferred,
            position,
            ..
        } => {
            eprintln!(
                "No camera found (types {:?}, position {:?})",
                preferred, position
            );
            std::process::exit(2);
        }
    };

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let mut tick = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                log::info!("Interrupted");
                break;
            }
            _ = tick.tick() => {
                if args.frames.is_some_and(|n| pushed.load(Ordering::Relaxed) >= n) {
                    break;
                }
                match feed.capture_status() {
                    SessionStatus::Ended => break,
                    SessionStatus::Failed(reason) => {
                        log::error!("Capture failed: {}", reason);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let preview = surface.remove_preview_layer();
    if let Some(path) = &args.snapshot {
        match preview.map(|layer| layer.snapshot()).transpose()?.flatten() {
            Some(img) => {
                img.save(path)
                    .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
                log::info!("Snapshot saved to {}", path.display());
            }
            None => log::warn!("No frame captured, snapshot skipped"),
        }
    }

    let report = feed.shutdown(SHUTDOWN_TIMEOUT).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    } else {
        let stats = report.summary.stats;
        println!("session:          {}", report.summary.session_id);
        println!("samples received: {}", stats.samples_received);
        println!("frames forwarded: {}", stats.frames_forwarded);
        println!("dropped:          {}", stats.dropped());
        println!("push failures:    {}", stats.push_failures);
    }

    Ok(())
}
