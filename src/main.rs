use std::path::PathBuf;

use anyhow::{bail, Context};

use relayout::scene::{self, load_scene};
use relayout::settings::{load_settings, Settings};
use relayout::{perf, Canvas};

mod logging;

const USAGE: &str = "usage: relayout <scene.json> [settings.json]";

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args_os().skip(1);
    let Some(scene_path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let settings = match args.next().map(PathBuf::from) {
        Some(path) => load_settings(&path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let logging_guard = logging::init(&settings.log);

    let scene = load_scene(&scene_path)
        .with_context(|| format!("loading scene from {}", scene_path.display()))?;

    let mut canvas = Canvas::with_settings(&settings);
    let root = scene.build(&mut canvas, None).context("building scene")?;

    for _ in 0..settings.frames {
        canvas.will_render_canvases();
    }
    tracing::info!(
        frames = canvas.frame_count(),
        elements = canvas.tree().len(),
        "layout settled"
    );

    let snapshot = scene::snapshot(&canvas, root);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let report = perf::report();
    if !report.is_empty() {
        eprint!("{report}");
    }

    canvas.teardown();
    if let Some(dir) = logging_guard.as_ref().and_then(|g| g.log_dir()) {
        eprintln!("logs written to {}", dir.display());
    }
    Ok(())
}
