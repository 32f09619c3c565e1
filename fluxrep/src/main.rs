/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow};
use log::{debug, error, info};

use fluxrep::config::ReporterConfig;
use fluxrep::opts::ProcArgs;
use fluxrep::{Reporter, TickReport};
use fluxrep_registry::{GaugeValue, MetricName, Registry};

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        fluxrep::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let _log_guard =
        fluxrep::log::setup(proc_args.verbose_level).context("failed to setup logger")?;

    let config = fluxrep::config::load(&proc_args.config_file)
        .context(format!("failed to load config, opts: {:?}", &proc_args))?;
    debug!("loaded config from {}", proc_args.config_file.display());

    if proc_args.test_config {
        info!("the format of the config file is ok");
        return Ok(());
    }
    if !config.enabled() && !proc_args.once {
        info!("metrics reporter is not enabled");
        return Ok(());
    }

    let registry = Arc::new(Registry::new());
    register_process_metrics(&registry);

    let reporter = build_reporter(&config, registry)?;
    if proc_args.once {
        let report = reporter.run()?;
        print_report(&report);
        return match report.write_error {
            Some(e) => Err(anyhow!("failed to write points: {e}")),
            None => Ok(()),
        };
    }

    reporter
        .start(config.emit_interval())
        .context("failed to start metrics reporter")?;

    let ret = tokio_run();
    reporter.stop();

    match ret {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn build_reporter(config: &ReporterConfig, registry: Arc<Registry>) -> anyhow::Result<Reporter> {
    let mut builder = config
        .reporter_builder(registry)
        .context("failed to create sink client")?;
    if config.resource_metrics() {
        #[cfg(target_os = "linux")]
        {
            builder = builder.resource_source(Arc::new(
                fluxrep_registry::resource::ProcessResourceSource::new(),
            ));
        }
        #[cfg(not(target_os = "linux"))]
        log::warn!("process resource metrics are not supported on this platform");
    }
    Ok(builder.build())
}

fn register_process_metrics(registry: &Registry) {
    let started = Instant::now();
    registry.gauge(
        MetricName::new(fluxrep::build::PKG_NAME, "Process", "UptimeSeconds"),
        move || Ok(GaugeValue::Long(started.elapsed().as_secs() as i64)),
    );
    registry.gauge(
        MetricName::with_scope(
            fluxrep::build::PKG_NAME,
            "Process",
            "Version",
            fluxrep::build::VERSION,
        ),
        || Ok(GaugeValue::Text(fluxrep::build::VERSION.to_string())),
    );
}

fn print_report(report: &TickReport) {
    println!("timestamp: {}", report.timestamp_ms);
    println!("points: {}", report.points);
    println!("skipped: {}", report.skipped);
    println!("failed: {}", report.failed);
    for name in &report.invalid_gauges {
        match name.scope() {
            Some(scope) => println!("invalid gauge: {name} ({scope})"),
            None => println!("invalid gauge: {name}"),
        }
    }
    match &report.write_error {
        Some(e) => println!("write: failed, {e}"),
        None => println!("write: ok"),
    }
}

fn tokio_run() -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    rt.block_on(wait_for_quit())?;
    info!("received quit signal");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_quit() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term_sig = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("failed to create SIGTERM listener: {e}"))?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r.map_err(|e| anyhow!("failed to listen for Ctrl-C: {e}")),
        _ = term_sig.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_quit() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("failed to listen for Ctrl-C: {e}"))
}
