// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Snapbooth: a layered photo-booth composition engine

pub mod booth;
pub mod canvas;
pub mod compositor;
pub mod editing;
pub mod file_watcher;
pub mod model;
pub mod render;
pub mod settings;
pub mod store;
pub mod sync;
pub mod theme;

use anyhow::{Context, bail};
use booth::Booth;
use compositor::{WorkerResources, render_composite};
use model::Session;
use settings::Config;
use std::path::{Path, PathBuf};
use std::time::Instant;
use store::{JsonFileStore, SessionStore};
use sync::SyncBus;
use theme::Theme;

/// Width of CLI renders when `--width` is not given
const DEFAULT_RENDER_WIDTH: u32 = 1200;

const USAGE: &str = "Usage: snapbooth <session.json|session-dir> [out.png] [--config path] [--width px]
       snapbooth booth [--config path]";

/// Install the tracing subscriber (controlled via the RUST_LOG env var).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("snapbooth=info"));
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Command-line options for a one-shot render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderArgs {
    pub session: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub width: u32,
}

impl RenderArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut config = None;
        let mut width = DEFAULT_RENDER_WIDTH;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    config = Some(PathBuf::from(args.next().context("--config needs a path")?));
                }
                "--width" => {
                    let value = args.next().context("--width needs a value")?;
                    width = value
                        .parse()
                        .with_context(|| format!("bad --width {value:?}"))?;
                }
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        let mut positional = positional.into_iter();
        let Some(session) = positional.next() else {
            bail!("{USAGE}");
        };
        let output = positional
            .next()
            .unwrap_or_else(|| session.with_extension("png"));
        if let Some(extra) = positional.next() {
            bail!("unexpected argument {}\n{USAGE}", extra.display());
        }
        if width == 0 {
            bail!("--width must be positive");
        }
        Ok(Self {
            session,
            output,
            config,
            width,
        })
    }
}

/// Command-line options for a running booth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoothArgs {
    pub config: Option<PathBuf>,
}

impl BoothArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut config = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    config = Some(PathBuf::from(args.next().context("--config needs a path")?));
                }
                other => bail!("unexpected argument {other}\n{USAGE}"),
            }
        }
        Ok(Self { config })
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    })
}

/// Entry point for the `snapbooth` binary: render a stored session to PNG,
/// or run the booth with `booth`.
pub fn run(args: impl IntoIterator<Item = String>) -> anyhow::Result<()> {
    init_tracing();
    let mut args = args.into_iter().peekable();
    if args.next_if(|arg| arg == "booth").is_some() {
        return run_booth(BoothArgs::parse(args)?);
    }
    let args = RenderArgs::parse(args)?;

    let config = load_config(args.config.as_deref())?;
    let session = load_session(&args.session)?;
    let image_dir = if args.session.is_dir() {
        Some(args.session.clone())
    } else {
        args.session.parent().map(Path::to_path_buf)
    };

    let resources = WorkerResources {
        image_dir,
        fonts_dir: config.fonts_dir.clone(),
        theme: Theme::default(),
    };
    let height = (args.width as f64 / config.aspect.ratio()).round() as u32;
    let request = compositor::CompositeRequest::snapshot(
        1,
        &session,
        args.width,
        height,
        config.frame_src.as_deref(),
        config.frame_opacity,
        config.global_photo_scale,
    );
    let response = render_composite(
        &request,
        &mut resources.image_store(),
        &resources.font_book(),
        &resources.theme,
    )
    .context("render failed")?;
    if response.skipped_layers > 0 {
        tracing::warn!("{} layers could not be drawn", response.skipped_layers);
    }

    let png = response.png_bytes().context("bad composite payload")?;
    std::fs::write(&args.output, png)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    tracing::info!(
        "Rendered {}x{} in {:.1}ms to {}",
        response.width,
        response.height,
        response.render_duration_ms,
        args.output.display()
    );
    Ok(())
}

/// Run the booth until interrupted.
fn run_booth(args: BoothArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let bus = SyncBus::from_config("booth", &config);
    let mut booth = Booth::from_config(config, Theme::default(), &bus)?;
    match booth.resume(Instant::now()) {
        Ok(true) => {}
        Ok(false) => tracing::info!("Starting with an empty session"),
        Err(e) => tracing::warn!("Cannot resume saved session, starting fresh: {}", e),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start the booth runtime")?;
    runtime.block_on(booth.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for ctrl-c: {}", e);
        }
    }));
    Ok(())
}

/// A session file, or the newest snapshot in a store directory.
fn load_session(path: &Path) -> anyhow::Result<Session> {
    if path.is_dir() {
        return JsonFileStore::new(path)
            .load_latest()?
            .with_context(|| format!("no saved sessions in {}", path.display()));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let session: Session = serde_json::from_str(&text)
        .with_context(|| format!("cannot parse session {}", path.display()))?;
    session
        .reserve_ids()
        .with_context(|| format!("cannot load session {}", path.display()))?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<RenderArgs> {
        RenderArgs::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_arguments() {
        let parsed = args(&["s.json", "--width", "300", "out.png", "--config", "c.toml"]).unwrap();
        assert_eq!(parsed.session, PathBuf::from("s.json"));
        assert_eq!(parsed.output, PathBuf::from("out.png"));
        assert_eq!(parsed.config, Some(PathBuf::from("c.toml")));
        assert_eq!(parsed.width, 300);

        assert_eq!(args(&["s.json"]).unwrap().output, PathBuf::from("s.png"));
        assert!(args(&[]).is_err());
        assert!(args(&["s.json", "--loud"]).is_err());
        assert!(args(&["s.json", "--width", "wide"]).is_err());
        assert!(args(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn parses_booth_arguments() {
        let parse = |list: &[&str]| BoothArgs::parse(list.iter().map(|s| s.to_string()));
        assert_eq!(parse(&[]).unwrap(), BoothArgs::default());
        assert_eq!(
            parse(&["--config", "booth.toml"]).unwrap().config,
            Some(PathBuf::from("booth.toml"))
        );
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["extra"]).is_err());
    }

    #[test]
    fn renders_a_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("booth.json");
        let mut session = Session::new();
        session.filter = "sepia(1)".to_string();
        std::fs::write(&session_path, serde_json::to_string(&session).unwrap()).unwrap();

        let out = dir.path().join("booth.png");
        run([
            session_path.display().to_string(),
            "--width".to_string(),
            "40".to_string(),
        ])
        .unwrap();
        let image = image::open(&out).unwrap();
        assert_eq!((image.width(), image.height()), (40, 60));
    }
}
