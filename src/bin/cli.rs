use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use stockcam::batch::FileBatchCounter;
use stockcam::capture::postprocess::{self, PostProcessOptions};
use stockcam::config::StockcamConfig;
use stockcam::engine::{CaptureEngine, EngineParts};
use stockcam::feedback::{LogSink, LoggingNotifier};
use stockcam::lens::resolve_lenses;
use stockcam::quality::SharpnessEvaluator;
use stockcam::scan::ScanDecision;
use stockcam::store::MemoryStore;
use stockcam::testing::{FrameScript, MemoryImageHost, SimulatedCaptureDevice, StaticCapabilityProvider};
use stockcam::types::{CaptureMode, Orientation};
use stockcam::upload::upload_pending_batch;
use stockcam::ModeBinder;

const USAGE: &str = "Usage: stockcam-cli <command> [args]

Commands:
  evaluate <image> [--threshold N] [--json]
  process <image> <out> [--mode standard|macro|wide]
  bind <mode> [--landscape] [--no-macro-lens] [--config PATH]
  config [path] [--write]
  simulate [dir] [--items A,B] [--script sharp,blurry,...] [--config PATH] [--json]";

fn main() -> Result<()> {
    stockcam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "evaluate" => cmd_evaluate(&args),
        "process" => cmd_process(&args),
        "bind" => cmd_bind(&args),
        "config" => cmd_config(&args),
        "simulate" => cmd_simulate(&args),
        "--help" | "-h" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn option<'a>(args: &'a [String], name: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == name) {
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| anyhow!("{} needs a value", name)),
        None => Ok(None),
    }
}

/// Positional arguments after the command, skipping flags and their values
fn positional(args: &[String], valued: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 2;
    while i < args.len() {
        let arg = &args[i];
        if valued.contains(&arg.as_str()) {
            i += 2;
            continue;
        }
        if !arg.starts_with("--") {
            out.push(arg.clone());
        }
        i += 1;
    }
    out
}

fn load_config(args: &[String]) -> Result<StockcamConfig> {
    match option(args, "--config")? {
        Some(path) => Ok(StockcamConfig::load_from_file(path)?),
        None => Ok(StockcamConfig::load_or_default()),
    }
}

fn cmd_evaluate(args: &[String]) -> Result<()> {
    let paths = positional(args, &["--threshold"]);
    let path = paths.first().context("image path required")?;

    let mut evaluator = SharpnessEvaluator::default();
    if let Some(threshold) = option(args, "--threshold")? {
        evaluator.threshold = threshold.parse().context("invalid --threshold")?;
    }

    let image = image::open(path).with_context(|| format!("failed to open {}", path))?;
    let report = evaluator.evaluate_dynamic(&image);

    if flag(args, "--json") {
        println!("{}", serde_json::to_string(&report)?);
    } else if report.skipped {
        println!("{}: too small to judge ({}px window), accepted", path, report.crop_side);
    } else {
        println!(
            "{}: score {:.2} (threshold {:.2}, window {}px) -> {}",
            path,
            report.score,
            evaluator.threshold,
            report.crop_side,
            if report.is_sharp { "SHARP" } else { "BLURRY" }
        );
    }
    Ok(())
}

fn cmd_process(args: &[String]) -> Result<()> {
    let paths = positional(args, &["--mode", "--config"]);
    let (input, output) = match paths.as_slice() {
        [input, output, ..] => (input, output),
        _ => bail!("Usage: stockcam-cli process <image> <out> [--mode M]"),
    };
    let mode: CaptureMode = option(args, "--mode")?
        .unwrap_or("standard")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let config = load_config(args)?;

    std::fs::copy(input, output).with_context(|| format!("failed to copy {}", input))?;
    let options = PostProcessOptions {
        square_crop: mode.crops_to_square(),
        max_side: config.quality.max_output_side,
        jpeg_quality: config.camera.jpeg_quality,
    };
    let processed = postprocess::process_file(&PathBuf::from(output), &options)?;
    let report = SharpnessEvaluator::from_config(&config.quality).evaluate_dynamic(&processed);

    println!(
        "{} -> {} ({}x{}, score {:.2}, {})",
        input,
        output,
        processed.width(),
        processed.height(),
        report.score,
        if report.is_sharp { "sharp" } else { "blurry" }
    );
    Ok(())
}

fn cmd_bind(args: &[String]) -> Result<()> {
    let modes = positional(args, &["--config"]);
    let mode: CaptureMode = modes
        .first()
        .map(String::as_str)
        .unwrap_or("standard")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let orientation = if flag(args, "--landscape") {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    let config = load_config(args)?;

    let provider = if flag(args, "--no-macro-lens") {
        StaticCapabilityProvider::single_camera()
    } else {
        StaticCapabilityProvider::multi_camera(&[("2", 2.2), ("0", 4.0), ("3", 6.0)])
    };
    let lenses = resolve_lenses(&provider).map(Arc::new);
    let binder = ModeBinder::new(lenses, config.camera);
    let request = binder.bind(mode, orientation);

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

fn cmd_config(args: &[String]) -> Result<()> {
    let paths = positional(args, &[]);
    let path = paths
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(StockcamConfig::default_path);

    if flag(args, "--write") {
        StockcamConfig::default().save_to_file(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = StockcamConfig::load_from_file(&path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn parse_script(list: &str) -> Result<Vec<FrameScript>> {
    list.split(',')
        .map(|s| match s.trim() {
            "sharp" => Ok(FrameScript::Sharp),
            "blurry" => Ok(FrameScript::Blurry),
            "error" => Ok(FrameScript::DeviceError),
            "corrupt" => Ok(FrameScript::Corrupt),
            other => Err(anyhow!("unknown frame kind: {}", other)),
        })
        .collect()
}

fn cmd_simulate(args: &[String]) -> Result<()> {
    let dirs = positional(args, &["--items", "--script", "--config"]);
    let items: Vec<String> = option(args, "--items")?
        .unwrap_or("INV0001,INV0002")
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    let script = parse_script(option(args, "--script")?.unwrap_or("sharp,blurry,sharp,sharp"))?;
    let json = flag(args, "--json");
    let mut config = load_config(args)?;
    if let Some(dir) = dirs.first() {
        config.storage.relocate(dir);
    }
    config.validate().map_err(|e| anyhow!(e))?;
    std::fs::create_dir_all(&config.storage.output_directory)
        .with_context(|| format!("failed to create {}", config.storage.output_directory))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let device = Arc::new(SimulatedCaptureDevice::from_config(&config));
        let store = Arc::new(MemoryStore::open(&config.storage.store_path)?);
        let batches = Arc::new(FileBatchCounter::open(&config.storage.batch_counter_path)?);
        let parts = EngineParts {
            device: device.clone(),
            store: store.clone(),
            sink: Arc::new(LogSink),
            notifier: Arc::new(LoggingNotifier),
            batches: batches.clone(),
        };
        let provider = StaticCapabilityProvider::multi_camera(&[("2", 2.2), ("0", 4.0), ("3", 6.0)]);
        let engine = CaptureEngine::start(&config, &provider, parts);

        for item in &items {
            let decision = engine.scan(item.as_str()).await?;
            println!("scan {} -> {:?}", item, decision);
            if decision != ScanDecision::Accepted {
                engine.acknowledge_prompt().await;
                continue;
            }

            device.push_script(&script);
            for _ in 0..script.len() {
                let pending = match engine.trigger_capture().await {
                    Ok(pending) => pending,
                    Err(rejection) => {
                        println!("  shutter refused: {}", rejection);
                        continue;
                    }
                };
                let name = pending.photo_name().to_string();
                let outcome = pending.outcome().await;
                if json {
                    println!("{}", serde_json::json!({ "photo": name, "outcome": format!("{:?}", outcome) }));
                } else {
                    println!("  {} -> {:?}", name, outcome);
                }
            }

            let status = engine.status().await?;
            println!("  {} has {} photos", item, status.photo_count);
        }

        let host = MemoryImageHost::new();
        let report = upload_pending_batch(
            store.as_ref(),
            &host,
            batches.as_ref(),
            &config.storage.upload_folder_prefix,
        )
        .await?;
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!(
                "upload: {} images ok, {} failed, next batch {:?}",
                report.images_uploaded, report.images_failed, report.next_batch
            );
        }

        engine.shutdown().await;
        Ok::<_, anyhow::Error>(())
    })
}
