//! hdr-adjust CLI - merge HDR renders, follow a trace dump, export a tone-mapped PNG.

use std::env;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, LevelFilter};
use tracing_subscriber::prelude::*;

use hdr_adjust::ingest::{self, scene_name};
use hdr_adjust::prelude::*;
use hdr_adjust::tonemap::export_prefix;

/// Frame used when only a trace dump is followed.
const DEFAULT_WIDTH: usize = 240;
const DEFAULT_HEIGHT: usize = 160;

/// How long to wait for the final recompute before giving up.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(600);

struct Source {
    path: PathBuf,
    weight: f32,
}

struct Options {
    sources: Vec<Source>,
    follow_trace_dump: bool,
    size: (usize, usize),
    exposure: Option<f32>,
    gamma: Option<f32>,
    dither: Option<bool>,
    bleed: Option<bool>,
    output: Option<String>,
    save_settings: bool,
    log_level: LevelFilter,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            follow_trace_dump: false,
            size: (DEFAULT_WIDTH, DEFAULT_HEIGHT),
            exposure: None,
            gamma: None,
            dither: None,
            bleed: None,
            output: None,
            save_settings: false,
            log_level: LevelFilter::Info,
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("hdr-adjust");

    let opts = match parse_args(&args[1.min(args.len())..]) {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(prog);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(opts.log_level)
        .init();
    let _trace_guard = init_tracing();

    if let Err(e) = run(opts) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("hdr-adjust - tone map HDR radiance and export PNG");
    println!();
    println!("Usage: {} [options] [-weight W] <file.hdr|file.exr>...", prog);
    println!();
    println!("Options:");
    println!("  -follow-trace-dump   Read sample records from stdin");
    println!(
        "  -size WxH            Frame size when no file is given (default {}x{})",
        DEFAULT_WIDTH, DEFAULT_HEIGHT
    );
    println!("  -weight W            Exposure weight for the following files");
    println!("  -exposure E          Exposure multiplier");
    println!("  -gamma G             Display gamma");
    println!("  -dither on|off       Ordered dithering");
    println!("  -bleed on|off        Light bleed");
    println!("  -o PREFIX            Export file prefix");
    println!("  -save-settings       Persist tone settings as new defaults");
    println!("  -v, --verbose        Debug output");
    println!("  -q, --quiet          Errors only");
    println!("  -h, --help           Show this help");
    println!("  --version            Show version");
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut opts = Options::default();
    let mut weight = 1.0f32;
    let mut it = args.iter();

    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .map(String::as_str)
                .ok_or_else(|| anyhow!("{} needs a value", name))
        };
        match arg.as_str() {
            "-follow-trace-dump" => opts.follow_trace_dump = true,
            "-weight" => weight = value("-weight")?.parse().context("-weight")?,
            "-size" => opts.size = parse_size(value("-size")?)?,
            "-exposure" => opts.exposure = Some(value("-exposure")?.parse().context("-exposure")?),
            "-gamma" => opts.gamma = Some(value("-gamma")?.parse().context("-gamma")?),
            "-dither" => opts.dither = Some(parse_switch(value("-dither")?)?),
            "-bleed" => opts.bleed = Some(parse_switch(value("-bleed")?)?),
            "-o" => opts.output = Some(value("-o")?.to_string()),
            "-save-settings" => opts.save_settings = true,
            "-v" | "--verbose" => opts.log_level = LevelFilter::Debug,
            "-q" | "--quiet" => opts.log_level = LevelFilter::Error,
            "-h" | "--help" => {
                print_usage("hdr-adjust");
                return Ok(None);
            }
            "--version" => {
                println!(
                    "hdr-adjust {} (built {} {})",
                    env!("CARGO_PKG_VERSION"),
                    env!("HDR_ADJUST_BUILD_DATE"),
                    env!("HDR_ADJUST_BUILD_TIME")
                );
                return Ok(None);
            }
            path if ingest::is_radiance_file(path.as_ref()) => {
                opts.sources.push(Source { path: PathBuf::from(path), weight });
            }
            other => bail!("Invalid argument: {}", other),
        }
    }
    Ok(Some(opts))
}

fn parse_switch(s: &str) -> Result<bool> {
    match s {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => bail!("expected on/off, got {}", s),
    }
}

fn parse_size(s: &str) -> Result<(usize, usize)> {
    let (w, h) = s.split_once('x').ok_or_else(|| anyhow!("expected WxH, got {}", s))?;
    Ok((w.parse().context("width")?, h.parse().context("height")?))
}

fn run(opts: Options) -> Result<()> {
    let mut settings = ToneSettings::load();
    if let Some(e) = opts.exposure {
        settings.exposure = e;
    }
    if let Some(g) = opts.gamma {
        settings.gamma = g;
    }
    if let Some(d) = opts.dither {
        settings.dither = d;
    }
    if let Some(b) = opts.bleed {
        settings.bleed = b;
    }
    if opts.save_settings {
        settings.save().context("saving settings")?;
    }

    let mut merge = ExposureMerge::new();
    let mut scene = None;
    for source in &opts.sources {
        let exposure = load_radiance_file(&source.path)
            .with_context(|| format!("loading {}", source.path.display()))?;
        merge
            .push(exposure, source.weight)
            .with_context(|| format!("merging {}", source.path.display()))?;
        scene = Some(scene_name(&source.path));
    }
    let spp = merge.samples_per_pixel();

    let sum = match merge.finish() {
        Some(sum) => sum,
        None if opts.follow_trace_dump => RadianceAccumulator::new(opts.size.0, opts.size.1)?,
        None => bail!("No dumps specified!"),
    };
    info!("Combined image is {}x{}", sum.width(), sum.height());

    let acc = share(sum);
    let adjuster = Adjuster::new(settings)?;
    adjuster.set_accumulator(Arc::clone(&acc));
    adjuster.set_visible(true);

    if opts.follow_trace_dump {
        let stdin = BufReader::new(io::stdin().lock());
        let stats = follow(stdin, &acc, |_| adjuster.accumulator_updated())?;
        info!(
            "{} samples read, {} deposited, {} outside the frame",
            stats.read, stats.deposited, stats.dropped
        );
    }

    let buffer = adjuster
        .wait_until_current(PUBLISH_TIMEOUT)
        .ok_or_else(|| anyhow!("timed out waiting for the tone-mapped image"))?;
    for line in buffer.settings().status_lines() {
        info!("{}", line);
    }

    let prefix = opts
        .output
        .unwrap_or_else(|| export_prefix(scene.as_deref().unwrap_or("trace"), spp));
    let path = adjuster.export_png(&prefix)?;
    println!("{}", path.display());
    Ok(())
}

fn init_tracing() -> Option<tracing_chrome::FlushGuard> {
    if std::env::var("HDR_ADJUST_TRACE").ok().as_deref() != Some("1") {
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();

    let subscriber = tracing_subscriber::registry().with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }

    Some(guard)
}
