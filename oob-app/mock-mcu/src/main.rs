use std::{io::BufRead, path::PathBuf, thread, time::Duration};

use clap::{Parser, ValueEnum};
use embassy_executor::{Executor, Spawner};
use oob_core::mk_static;
use oob_core::utils::controllers::{
    Backend, ConfigCommand, RobotConfig, RobotContext, SystemCommand, COMMAND_CHANNEL,
};
use static_cell::StaticCell;
use tracing::{error, info, warn};

mod sim;

use sim::SimBoard;

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Servo,
    DcMotor,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Servo => Backend::Servo,
            BackendArg::DcMotor => Backend::DcMotor,
        }
    }
}

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// select this backend at startup
    #[clap(long, value_enum)]
    backend: Option<BackendArg>,
    /// JSON file with a `RobotConfig` (pins, calibration, follower, tick)
    #[clap(long)]
    config: Option<PathBuf>,
    /// simulated obstacle distance in cm; omit for an empty field of view
    #[clap(long)]
    obstacle_cm: Option<f32>,
    /// left line sensor sees the line
    #[clap(long)]
    line_left: bool,
    /// right line sensor sees the line
    #[clap(long)]
    line_right: bool,
}

fn load_config(path: Option<&PathBuf>) -> RobotConfig {
    let Some(path) = path else {
        return RobotConfig::default();
    };
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<RobotConfig>(&text).map_err(|e| e.to_string()))
        .and_then(|config| {
            config
                .validate()
                .map(|()| config)
                .map_err(|field| format!("invalid calibration value `{}`", field))
        });
    match parsed {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Forward one JSON command per stdin line to the control loop.
fn stdin_reader() {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match SystemCommand::from_json(&line) {
            Ok(mut cmd) => {
                while let Err(embassy_sync::channel::TrySendError::Full(back)) =
                    COMMAND_CHANNEL.try_send(cmd)
                {
                    cmd = back;
                    thread::sleep(Duration::from_millis(5));
                }
            }
            Err(e) => warn!("invalid command {:?}: {}", line, e),
        }
    }
    info!("stdin closed");
}

#[embassy_executor::task]
async fn robot_task(robot: &'static mut RobotContext<SimBoard>) -> ! {
    robot.run().await
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let opts: Opts = Opts::parse();
    let config = load_config(opts.config.as_ref());

    let board = SimBoard::new(
        config.pins,
        config.calibration.range.cm_per_us,
        opts.obstacle_cm,
        opts.line_left,
        opts.line_right,
    );
    let robot = mk_static!(RobotContext<SimBoard>, RobotContext::new(board, config));

    if let Some(backend) = opts.backend {
        COMMAND_CHANNEL
            .send(SystemCommand::C(ConfigCommand::Init {
                backend: backend.into(),
            }))
            .await;
    }

    spawner.spawn(robot_task(robot)).unwrap();
    thread::spawn(stdin_reader);
    info!("robot ready, reading JSON commands from stdin");
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}
