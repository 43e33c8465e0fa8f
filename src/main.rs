use vectora::{AppConfig, AppServices};

fn main() {
    vectora::config::load_dotenv();
    tracing_subscriber::fmt::init();

    let services = match AppConfig::from_env().and_then(|config| AppServices::from_config(&config))
    {
        Ok(services) => services,
        Err(err) => {
            tracing::error!(error = ?err, "failed to start");
            std::process::exit(1);
        }
    };

    dioxus::LaunchBuilder::new()
        .with_context(services)
        .launch(vectora::ui::App);
}
