use anyhow::{anyhow, bail, Context, Result};
use camerak::config::CamerakConfig;
use camerak::gallery::{FsMediaIndex, GalleryState};
use camerak::platform::{CameraService, DesktopCameraService};
use camerak::preferences::PreferencesRepository;
use camerak::processing::{crop_rect, exif, process_still, StillProcessingParams};
use camerak::types::{AspectRatio, CaptureMode, DisplayRotation, LensFacing};
use std::env;
use std::fs;
use std::path::PathBuf;

const USAGE: &str = "Usage: camerak-cli <command> [args] [--config <path>] [--json]

Commands:
  list-cameras
  process <input.jpg> <output.jpg> [--ratio <r>] [--sensor <deg>] [--display <deg>] [--front] [--quality <q>]
  crop-rect <width> <height> <ratio>
  latest-media
  prefs [set <remember_camera_mode|remember_aspect_ratio> <true|false>]
  config [--write]";

fn main() -> Result<()> {
    camerak::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let json = args.iter().any(|a| a == "--json");
    let config = load_config(&args)?;

    match args[1].as_str() {
        "list-cameras" => cmd_list_cameras(json),
        "process" => cmd_process(&args, &config, json),
        "crop-rect" => cmd_crop_rect(&args, json),
        "latest-media" => cmd_latest_media(&config, json),
        "prefs" => cmd_prefs(&args, &config, json),
        "config" => cmd_config(&args, &config),
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values
fn positionals(args: &[String]) -> Vec<&str> {
    const VALUED: [&str; 5] = ["--config", "--ratio", "--sensor", "--display", "--quality"];
    let mut out = Vec::new();
    let mut i = 2;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUED.contains(&arg) {
            i += 2;
            continue;
        }
        if !arg.starts_with("--") {
            out.push(arg);
        }
        i += 1;
    }
    out
}

fn load_config(args: &[String]) -> Result<CamerakConfig> {
    let path = flag_value(args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(CamerakConfig::default_path);
    let config = CamerakConfig::load_from_file(&path)?;
    config.validate().map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
    Ok(config)
}

fn cmd_list_cameras(json: bool) -> Result<()> {
    let service = DesktopCameraService::new();
    let mut cameras = Vec::new();
    for id in service.camera_ids()? {
        cameras.push(service.characteristics(&id)?);
    }

    if json {
        println!("{}", serde_json::to_string(&cameras)?);
    } else if cameras.is_empty() {
        println!("No cameras found");
    } else {
        for c in cameras {
            let sizes: Vec<String> = c.preview_sizes.iter().map(|s| s.to_string()).collect();
            println!("{}: {:?}, flash: {}, sizes: {}", c.id, c.lens_facing, c.flash_available, sizes.join(", "));
        }
    }
    Ok(())
}

fn cmd_process(args: &[String], config: &CamerakConfig, json: bool) -> Result<()> {
    let files = positionals(args);
    let [input, output] = files[..] else {
        bail!("process needs <input.jpg> <output.jpg>");
    };

    let ratio: AspectRatio = flag_value(args, "--ratio").unwrap_or("Full").parse()?;
    let mut params = StillProcessingParams::new(ratio);
    if let Some(sensor) = flag_value(args, "--sensor") {
        params.sensor_orientation = sensor.parse().context("--sensor must be degrees")?;
    }
    if let Some(display) = flag_value(args, "--display") {
        params.display_rotation = DisplayRotation::from_degrees(display.parse().context("--display must be degrees")?);
    }
    if args.iter().any(|a| a == "--front") {
        params.lens_facing = LensFacing::Front;
    }
    params.jpeg_quality = match flag_value(args, "--quality") {
        Some(q) => q.parse().context("--quality must be 1-100")?,
        None => config.capture.jpeg_quality,
    };

    let jpeg = fs::read(input).with_context(|| format!("Failed to read {}", input))?;
    let processed = process_still(&jpeg, &params)?;
    fs::write(output, &processed.jpeg).with_context(|| format!("Failed to write {}", output))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "output": output,
                "width": processed.width,
                "height": processed.height,
                "rotation": processed.rotation,
                "source_orientation": processed.source_orientation,
                "orientation": exif::read_orientation(&processed.jpeg),
                "crop": processed.crop,
            })
        );
    } else {
        println!(
            "{} -> {}: {}x{} (rotated {}, source orientation {:?})",
            input, output, processed.width, processed.height, processed.rotation, processed.source_orientation
        );
    }
    Ok(())
}

fn cmd_crop_rect(args: &[String], json: bool) -> Result<()> {
    let values = positionals(args);
    let [width, height, ratio] = values[..] else {
        bail!("crop-rect needs <width> <height> <ratio>");
    };
    let rect = crop_rect(width.parse()?, height.parse()?, ratio.parse()?);

    if json {
        println!("{}", serde_json::to_string(&rect)?);
    } else {
        println!("{}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y);
    }
    Ok(())
}

fn cmd_latest_media(config: &CamerakConfig, json: bool) -> Result<()> {
    let index = FsMediaIndex::from_config(config);
    let mut gallery = GalleryState::default();
    gallery.refresh(&index);

    if json {
        println!("{}", serde_json::to_string(&gallery)?);
        return Ok(());
    }
    for (label, item) in [
        ("photo", &gallery.last_photo),
        ("video", &gallery.last_video),
        ("latest", &gallery.latest),
    ] {
        match item {
            Some(item) => println!("{}: {} ({})", label, item.path.display(), item.date_added),
            None => println!("{}: none", label),
        }
    }
    Ok(())
}

fn cmd_prefs(args: &[String], config: &CamerakConfig, json: bool) -> Result<()> {
    let prefs = PreferencesRepository::open(config.preferences_dir())?;

    let values = positionals(args);
    if let ["set", key, value] = values[..] {
        let value: bool = value.parse().context("value must be true or false")?;
        match key {
            "remember_camera_mode" => prefs.set_remember_camera_mode(value)?,
            "remember_aspect_ratio" => prefs.set_remember_aspect_ratio(value)?,
            other => bail!("Unknown preference: {}", other),
        }
    }

    let mode = prefs.last_camera_mode().map(|m: CaptureMode| m.as_str());
    let ratio = prefs.last_aspect_ratio().map(|r| r.as_str());
    if json {
        println!(
            "{}",
            serde_json::json!({
                "remember_camera_mode": prefs.remember_camera_mode(),
                "remember_aspect_ratio": prefs.remember_aspect_ratio(),
                "last_camera_mode": mode,
                "last_aspect_ratio": ratio,
            })
        );
    } else {
        println!("remember_camera_mode: {}", prefs.remember_camera_mode());
        println!("remember_aspect_ratio: {}", prefs.remember_aspect_ratio());
        println!("last_camera_mode: {}", mode.unwrap_or("-"));
        println!("last_aspect_ratio: {}", ratio.unwrap_or("-"));
    }
    Ok(())
}

fn cmd_config(args: &[String], config: &CamerakConfig) -> Result<()> {
    if args.iter().any(|a| a == "--write") {
        let path = flag_value(args, "--config")
            .map(PathBuf::from)
            .unwrap_or_else(CamerakConfig::default_path);
        config.save_to_file(&path)?;
        println!("Wrote {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
