//! Live telemetry: one JSON line per decoded record on stdout, periodic
//! message-count reports on stderr.

use std::io::Write;
use std::time::Duration;

use tracing::info;

use ecoflow_core::{ChannelSink, Controller};

use crate::cli::{GlobalOpts, ListenArgs};
use crate::error::CliError;
use crate::output;

const RECORD_BUFFER: usize = 4096;

pub async fn handle(
    controller: &Controller,
    args: &ListenArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (sink, mut records) = ChannelSink::new(RECORD_BUFFER);
    controller.connect(sink).await?;
    eprintln!(
        "listening to {} device(s), press Ctrl-C to stop",
        controller.devices().len()
    );

    let report_every = (args.report_every > 0).then(|| Duration::from_secs(args.report_every));
    let mut ticker = tokio::time::interval(report_every.unwrap_or(Duration::from_secs(3600)));
    ticker.tick().await;

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted, shutting down");
                break;
            }
            record = records.recv() => {
                let Some(record) = record else { break };
                if !global.quiet {
                    let line = output::render_json(&record, true)?;
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{line}")?;
                }
            }
            _ = ticker.tick(), if report_every.is_some() => {
                report(controller).await;
            }
        }
    }

    report(controller).await;
    Ok(())
}

async fn report(controller: &Controller) {
    let dropped = controller.dropped_messages().await;
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "{}", controller.stats().report());
    if dropped > 0 {
        let _ = writeln!(stderr, "  {dropped} broker message(s) dropped");
    }
}
