//! Sequence frame CLI - play, inspect and build texture packages.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use sequence_frame::{
    package::{Compression, PackageLayout, PackageWriter, PixelFormat, parse},
    pipeline::{FramePipeline, PipelineEvent, TickOutcome},
    schema::PlaybackConfig,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("play") if args.len() >= 3 => run_play(&args[2..]),
        Some("info") if args.len() >= 3 => run_info(&args[2]),
        Some("pack") if args.len() >= 8 => run_pack(&args[2..]),
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!();
    eprintln!("Play, inspect and build sequence frame texture packages.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  play <config.json> [max_frames]   Play the configured package");
    eprintln!("  info <package>                    Print header and frame sizes");
    eprintln!("  pack <output> <width> <height> <pixel-format> <lz4|zlib> <frame>...");
    eprintln!("                                    Pack raw decoded frame files");
    eprintln!("  --example                         Print an example configuration");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for pipeline logging.");
}

fn run_play(args: &[String]) {
    let config_path = PathBuf::from(&args[0]);
    let max_frames: Option<u64> = args.get(1).and_then(|s| s.parse().ok());

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: PlaybackConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    // Package paths are relative to the config file
    if let Some(path) = config.package_path.take() {
        let resolved = match config_path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        };
        config.package_path = Some(resolved);
    }

    println!("Sequence Frame Playback");
    println!("=======================");
    if let Some(path) = &config.package_path {
        println!("Package: {}", path.display());
    }
    println!("FPS: {}", config.effective_fps());
    println!(
        "Loop: {}, reverse: {}, keep last frame: {}",
        config.loop_playback, config.reverse, config.keep_last_frame_visible
    );
    println!();

    let mut pipeline = FramePipeline::new(config).unwrap_or_else(|e| {
        eprintln!("Error starting decoder thread: {}", e);
        std::process::exit(1);
    });
    let events = pipeline.events();

    if let Err(e) = pipeline.play() {
        eprintln!("Error loading package: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    let mut presented = 0u64;
    let mut stale = 0u64;
    let mut ticks = 0u64;

    loop {
        let Some(due) = pipeline.next_tick_due() else {
            break;
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }

        let Some(outcome) = pipeline.update(Instant::now()) else {
            continue;
        };
        ticks += 1;
        if let TickOutcome::Presented { stale: true, .. } = outcome {
            stale += 1;
        }

        let mut finished = false;
        for event in events.try_iter() {
            match event {
                PipelineEvent::LoadingFinished { frame_count } => {
                    println!("Loaded {} frames", frame_count);
                }
                PipelineEvent::FramePresented { index } => {
                    presented += 1;
                    log::debug!("Presented frame {}", index);
                }
                PipelineEvent::PlayingFinished => finished = true,
            }
        }

        if finished || max_frames.is_some_and(|max| presented >= max) {
            break;
        }
    }

    pipeline.stop();
    let elapsed = start.elapsed();

    println!();
    println!("Presented: {} frames ({} stale, {} ticks)", presented, stale, ticks);
    println!(
        "Time: {:.2}s ({:.1} frames/s)",
        elapsed.as_secs_f32(),
        presented as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
}

fn run_info(path: &str) {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading package: {}", e);
        std::process::exit(1);
    });

    let (header, table) = parse(&bytes).unwrap_or_else(|e| {
        eprintln!("Error parsing package: {}", e);
        std::process::exit(1);
    });

    println!("Package: {}", path);
    println!("  Size: {} bytes", bytes.len());
    println!("  Frames: {}", header.frame_count);
    println!("  Dimensions: {}x{}", header.width, header.height);
    println!(
        "  Pixel format: {:?} ({})",
        header.pixel_format,
        header.pixel_format.tag()
    );
    match header.compression() {
        Some(compression) => println!("  Compression: {:?}", compression),
        None => println!("  Compression: unknown ({})", header.algorithm),
    }
    println!("  Decoded frame: {} bytes", header.frame_size);
    println!("  Size table offset: {}", header.size_table_offset);
    println!("  Data offset: {}", header.data_offset);

    if table.is_empty() {
        return;
    }

    let total: usize = table.sizes().sum();
    let raw = header.frame_size * table.len();
    println!(
        "  Compressed data: {} bytes ({:.1}% of raw)",
        total,
        total as f64 / raw.max(1) as f64 * 100.0
    );
    println!();
    println!("Frame sizes:");
    for (i, size) in table.sizes().enumerate() {
        println!("  {:>5}: {} bytes", i, size);
    }
}

fn run_pack(args: &[String]) {
    let output = PathBuf::from(&args[0]);
    let width: u32 = parse_arg(&args[1], "width");
    let height: u32 = parse_arg(&args[2], "height");
    let format_tag: i32 = parse_arg(&args[3], "pixel format");

    let pixel_format = PixelFormat::from_tag(format_tag).unwrap_or_else(|| {
        eprintln!("Unsupported pixel format: {}", format_tag);
        std::process::exit(1);
    });
    let compression = match args[4].as_str() {
        "lz4" => Compression::Lz4,
        "zlib" => Compression::Zlib,
        other => {
            eprintln!("Unknown compression '{}', expected lz4 or zlib", other);
            std::process::exit(1);
        }
    };

    let layout = PackageLayout {
        width,
        height,
        pixel_format,
        compression,
    };
    let mut writer = PackageWriter::create(&output, layout).unwrap_or_else(|e| {
        eprintln!("Error creating package: {}", e);
        std::process::exit(1);
    });

    for frame_path in &args[5..] {
        let frame = fs::read(frame_path).unwrap_or_else(|e| {
            eprintln!("Error reading frame {}: {}", frame_path, e);
            std::process::exit(1);
        });
        if let Err(e) = writer.push_frame(&frame) {
            eprintln!("Error packing frame {}: {}", frame_path, e);
            std::process::exit(1);
        }
    }

    let (_, stats) = writer.finalize().unwrap_or_else(|e| {
        eprintln!("Error finalizing package: {}", e);
        std::process::exit(1);
    });

    println!("Wrote {}", output.display());
    println!("{}", stats);
}

fn parse_arg<T: std::str::FromStr>(value: &str, name: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {}: {}", name, value);
        std::process::exit(1);
    })
}

fn print_example_config() {
    let config = PlaybackConfig {
        package_path: Some(PathBuf::from("frames.pkg")),
        fps: 30.0,
        loop_playback: true,
        ..Default::default()
    };

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
