// Install command: validate, run the pipeline, render the result

use log::debug;
use svforge::InstallationDirector;

use crate::cli::InstallArgs;
use crate::config::Settings;
use crate::ui;
use crate::validation::build_request;

/// Exit code for an install abandoned with Ctrl-C
const EXIT_CANCELLED: i32 = 130;

pub async fn install(args: &InstallArgs, settings: &Settings) -> anyhow::Result<i32> {
    let request = build_request(args, settings)?;
    debug!("Install request: {:?}", request);

    let mut options = settings.director_options();
    if args.no_java_install {
        options.auto_install_java = false;
    }
    let director = InstallationDirector::new(options)?;

    ui::action(&format!(
        "Installing {} {} into {}",
        request.server_type,
        request.game_version,
        request.target_directory.display()
    ));

    let reporter = ui::TerminalReporter::default();
    let shutdown = async {
        // If the handler cannot be installed, never cancel
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match director.install_until(&request, &reporter, shutdown).await {
        Ok(result) => {
            reporter.finish();
            let build = result
                .build
                .as_ref()
                .map(|b| format!(" (build {})", b))
                .unwrap_or_default();
            ui::success(&format!(
                "Installed {} {}{} in {:.1}s",
                result.server_type, result.game_version, build, result.duration_seconds
            ));
            ui::status("Directory", &result.server_directory.display().to_string());
            ui::status("Launch", &result.jar_path.display().to_string());
            ui::status(
                "Java",
                &format!(
                    "{} ({})",
                    result.java_used.major_version,
                    result.java_used.executable_path.display()
                ),
            );
            ui::dim(&format!(
                "Start it with: {}",
                result.server_directory.join("start.sh").display()
            ));
            Ok(0)
        }
        Err(err) if err.is_cancelled() => {
            reporter.fail();
            ui::warning("Installation cancelled; nothing was written to the target directory");
            Ok(EXIT_CANCELLED)
        }
        Err(err) => {
            reporter.fail();
            ui::error(&err.to_string());
            Ok(1)
        }
    }
}
