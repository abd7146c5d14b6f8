use anyhow::{anyhow, Result};
use std::panic;
use std::process::ExitCode;

use audio_join::config::AppConfig;
use audio_join::settings::{run_setup, settings_path};
use audio_join::{
    init_logging, init_tracing, install_interrupt_handler, is_interrupted, log_debug,
    log_file_path, log_panic, run_join, CancelToken,
};

/// Exit code for a run stopped by Ctrl-C, as shells report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let config = match AppConfig::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("audio-join: {err:#}");
            return ExitCode::from(2);
        }
    };

    init_logging(&config);
    let trace_path = init_tracing(&config);
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));
    log_debug("=== audio-join started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));
    if let Some(path) = trace_path {
        log_debug(&format!("Trace file: {path:?}"));
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_interrupted(&err) => {
            eprintln!("audio-join: interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            log_debug(&format!("failed: {err:#}"));
            eprintln!("audio-join: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &AppConfig) -> Result<()> {
    if config.envoptions {
        let path = settings_path(config.settings.as_deref())
            .ok_or_else(|| anyhow!("no settings location: set HOME or pass --settings"))?;
        run_setup(&path)?;
        println!("Run audio-join again to use the new settings.");
        return Ok(());
    }

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;
    let summary = run_join(config, &cancel)?;
    if summary.protocol_warnings > 0 {
        println!(
            "{} host replies could not be read; check the result.",
            summary.protocol_warnings
        );
    }
    println!("Exported {}", summary.output_path.display());
    Ok(())
}
