mod app;

use annotator::cli::{self, CliArgs};
use annotator::settings::AnnotatorSettings;
use annotator::{log_err, logger};
use app::AnnotatorApp;
use clap::Parser;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    let args = CliArgs::parse();
    let mut settings = AnnotatorSettings::load();
    args.apply_to(&mut settings);

    // -- Headless export ----------------------------------------------
    if args.is_headless() {
        let code = cli::run(args, &settings);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Session log (overwrites the previous session's log)
    logger::init();

    let target = match args.target() {
        Ok(t) => t,
        Err(e) => {
            log_err!("launch: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("Annotator"),
        ..Default::default()
    };

    eframe::run_native(
        "Annotator",
        options,
        Box::new(move |cc| Box::new(AnnotatorApp::new(cc, settings, target))),
    )
}
