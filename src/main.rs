use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "CONTRACT_GATE_LOG";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if let Err(e) = contract_gate::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
