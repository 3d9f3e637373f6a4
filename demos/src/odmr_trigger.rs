//! Builds the ODMR trigger files and, when `AWG520_ADDR` names an
//! instrument, uploads them and runs a scan.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;

use awg520::prelude::*;

const NUM_AVERAGES: u32 = 100;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dir = PathBuf::from("sequencefiles");
    std::fs::create_dir_all(&dir)?;

    let config = TriggerConfig::default();
    let files = write_trigger_sequence(&dir, &config)?;
    tracing::info!(
        "Wrote {} waveform files and {}",
        files.waveforms.len(),
        files.sequence.display()
    );

    let Some(addr) = std::env::var_os("AWG520_ADDR") else {
        tracing::info!("AWG520_ADDR is not set; wrote files only");
        return Ok(());
    };
    let addr: IpAddr = addr.to_string_lossy().parse()?;

    let awg = Awg520::open(TcpLink::new(addr), Awg520Option::default())?;
    let elapsed = awg.upload(&dir)?;
    tracing::info!(?elapsed, "Upload finished");

    let awg = Awg520::open(TcpLink::new(addr), Awg520Option::default())?;
    awg.run_and_acquire(NUM_AVERAGES)?;
    tracing::info!("Scan finished");
    Ok(())
}
