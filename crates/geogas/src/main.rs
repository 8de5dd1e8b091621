// The binary uses the library, not duplicate modules
use geogas::{Settings, logging};

fn main() {
    logging::setup_logging();
    let settings = Settings::from_cli();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(geogas::run(settings)) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
