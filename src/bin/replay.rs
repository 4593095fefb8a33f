use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use baro_ekf_rs::{AccelData, Ekf10d, FilterConfig, FilterError, GyroData};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a recorded IMU/baro log through the 10-state EKF", long_about = None)]
struct Args {
    /// Path to a JSON array of samples
    #[arg(long)]
    log: PathBuf,

    /// Optional filter configuration (JSON, missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a snapshot after every update
    #[arg(long, default_value_t = false)]
    trace_updates: bool,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Sample {
    Imu {
        dt: f32,
        gyro: GyroData,
        accel_mg: AccelData,
    },
    Baro {
        dt: f32,
        pressure_pa: f32,
        accel_mg: AccelData,
        gyro: GyroData,
    },
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config: FilterConfig = match args.config.as_ref() {
        Some(path) => load_json(path)?,
        None => FilterConfig::default(),
    };
    let samples: Vec<Sample> = load_json(&args.log)?;
    info!("replay: {} samples from {}", samples.len(), args.log.display());

    let mut ekf = Ekf10d::new(&config)?;
    let mut rejected = 0u64;
    let mut max_altitude = ekf.position().z;

    for (idx, sample) in samples.iter().enumerate() {
        let result = match *sample {
            Sample::Imu { dt, gyro, accel_mg } => ekf.predict(dt, gyro, accel_mg),
            Sample::Baro {
                dt,
                pressure_pa,
                accel_mg,
                gyro,
            } => {
                let result = ekf.update(dt, pressure_pa, accel_mg, gyro);
                if args.trace_updates && result.is_ok() {
                    println!("{}", serde_json::to_string(&ekf.get_state())?);
                }
                result
            }
        };

        match result {
            Ok(()) => {}
            // Counted by the filter itself
            Err(FilterError::NumericalDegeneracy(_)) => {}
            Err(e) => {
                rejected += 1;
                warn!("replay: sample {} rejected: {}", idx, e);
            }
        }

        max_altitude = max_altitude.max(ekf.position().z);
    }

    let state = ekf.get_state();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "samples": samples.len(),
            "rejected_samples": rejected,
            "skipped_updates": state.skipped_updates,
            "max_altitude_m": max_altitude,
            "final_state": state,
        }))?
    );
    Ok(())
}
