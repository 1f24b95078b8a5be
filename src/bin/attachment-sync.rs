#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = attachment_sync::cli::run().await {
        log::debug!("{e:?}");
        attachment_sync::cli::print_error(&e);
        std::process::exit(1);
    }
}
