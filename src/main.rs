//! mbed-flasher - flash mbed boards through their USB mass-storage drive
//!
//! The image is copied onto the board's drive, the board is followed across
//! re-enumeration by its target id, and the result is read back from the
//! marker files its interface firmware leaves on the drive. The process exit
//! code is the outcome's code, so scripts can tell failures apart.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use mbed_flasher::commands;
use mbed_flasher::flasher::{FlashReport, FlashRequest, TargetDescriptor};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, String> {
    let settings = commands::settings::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Flash {
            image,
            target_id,
            mount_point,
            serial_port,
            method,
            no_reset,
        } => {
            let mut target = TargetDescriptor::new(target_id, mount_point);
            if let Some(port) = serial_port {
                target = target.with_serial_port(port);
            }
            let request = FlashRequest::new(image, target)
                .method(method.into())
                .suppress_reset(no_reset);

            let report = commands::flash::flash_target(settings, request).await?;
            print_reports(std::slice::from_ref(&report), cli.json)?;
            Ok(report.outcome.exit_code())
        }
        Commands::FlashMany {
            image,
            targets,
            no_reset,
        } => {
            let targets = commands::flash::load_targets(&targets)?;
            log::info!("flashing {} boards", targets.len());

            let reports = commands::flash::flash_many(settings, image, targets, no_reset).await?;
            print_reports(&reports, cli.json)?;
            Ok(commands::flash::batch_exit_code(&reports))
        }
        Commands::Reset { serial_port } => {
            commands::reset::reset_board(settings, serial_port).await?;
            Ok(0)
        }
        Commands::Config(ConfigCommands::Show) => {
            println!("{}", commands::settings::show_settings(cli.config.as_deref())?);
            Ok(0)
        }
        Commands::Config(ConfigCommands::Init { file }) => {
            let path = commands::settings::init_settings(&file)?;
            println!("Wrote default settings to {}", path.display());
            Ok(0)
        }
    }
}

fn print_reports(reports: &[FlashReport], json: bool) -> Result<(), String> {
    if json {
        let out = match reports {
            [report] => serde_json::to_string_pretty(report),
            _ => serde_json::to_string_pretty(reports),
        }
        .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    for report in reports {
        println!(
            "{}: {} ({:.1}s)",
            report.target_id,
            report.outcome,
            report.elapsed.as_secs_f32()
        );
    }
    Ok(())
}
