use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, Command, value_parser};
use filterchain::config::{app_name, version};
use filterchain::synthetic::{InitBehavior, SyntheticFactory};
use filterchain::{FilterRole, MediaKind, Pipeline, PipelineConfig, PipelineError, PipelineResult};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

fn callback() -> (
    impl FnOnce(PipelineResult) + Send + 'static,
    oneshot::Receiver<PipelineResult>,
) {
    let (tx, rx) = oneshot::channel();
    (
        move |result| {
            let _ = tx.send(result);
        },
        rx,
    )
}

fn log_stats(pipeline: &Pipeline) {
    let (width, height) = pipeline.video_size();
    info!(
        "Stats: time {:?}/{:?}, buffered {:?}, bytes {}/{}, video {}x{}, audio {}, video {}",
        pipeline.time(),
        pipeline.duration(),
        pipeline.buffered_time(),
        pipeline.buffered_bytes(),
        pipeline.total_bytes(),
        width,
        height,
        pipeline.is_rendered("audio"),
        pipeline.is_rendered("video"),
    );
}

async fn stop(pipeline: &Pipeline) -> Result<()> {
    let (done, rx) = callback();
    pipeline.stop(done);
    rx.await.context("stop callback dropped")??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("uri")
                .value_name("URI")
                .help("Uri handed to the data source.")
                .default_value("synthetic://demo"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .help("Produce a clip without an audio stream.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-video")
                .long("no-video")
                .help("Produce a clip without a video stream.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail")
                .long("fail")
                .value_name("ROLE")
                .help("Make the filter for this role fail its initialization."),
        )
        .arg(
            Arg::new("duration-ms")
                .long("duration-ms")
                .value_name("MILLIS")
                .help("Duration of the synthetic clip.")
                .value_parser(value_parser!(u64))
                .default_value("5000"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON pipeline configuration."),
        )
        .get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let mut kinds = Vec::new();
    if !matches.get_flag("no-audio") {
        kinds.push(MediaKind::Audio);
    }
    if !matches.get_flag("no-video") {
        kinds.push(MediaKind::Video);
    }
    if kinds.is_empty() {
        bail!("--no-audio and --no-video leave nothing to play");
    }

    let duration_ms = matches.get_one::<u64>("duration-ms").copied().unwrap_or(5000);
    let mut factory = SyntheticFactory::new()
        .with_streams(&kinds)
        .with_duration(Duration::from_millis(duration_ms));
    if let Some(role) = matches.get_one::<String>("fail") {
        let role: FilterRole = role.parse()?;
        factory = factory.with_behavior(role, InitBehavior::Fail(PipelineError::InitializationFailed));
    }

    let uri = matches
        .get_one::<String>("uri")
        .cloned()
        .unwrap_or_default();
    let pipeline = Pipeline::with_config(Handle::current(), config.clone());

    let (done, started) = callback();
    if !pipeline.start(Arc::new(factory), uri.clone(), done) {
        bail!("pipeline refused to start {}", uri);
    }
    if let Err(e) = started.await.context("start callback dropped")? {
        warn!("Pipeline: start failed: {}", e);
        stop(&pipeline).await?;
        bail!("failed to start {}: {}", uri, e);
    }
    info!("Pipeline: started {}", uri);

    pipeline.set_playback_rate(config.initial_playback_rate);
    tokio::time::sleep(Duration::from_millis(200)).await;
    log_stats(&pipeline);

    let target = pipeline.duration() / 2;
    let (done, sought) = callback();
    pipeline.seek(target, done);
    sought.await.context("seek callback dropped")??;
    info!("Pipeline: sought to {:?}", target);

    tokio::time::sleep(Duration::from_millis(200)).await;
    log_stats(&pipeline);

    stop(&pipeline).await?;
    info!("Pipeline: stopped");
    Ok(())
}
