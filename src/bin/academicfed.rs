use std::{env, process};

use academicfed::{
    client::CommandLineConfig, config::FederationConfig, errors::FederationResult,
    federation::Federation,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            eprint!("{}", CommandLineConfig::help());
            process::exit(2);
        }
    };
    let request = match config.request.to_request() {
        Ok(request) => request,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let federation = match open_federation(&config) {
        Ok(federation) => federation,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let outcome = federation.coordinator().handle(&request);
    federation.close();
    let (json, code) = match outcome {
        Ok(response) => (serde_json::to_string_pretty(&response), 0),
        Err(failure) => (serde_json::to_string_pretty(&failure), 1),
    };
    match json {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("cannot encode response: {err}");
            process::exit(1);
        }
    }
    process::exit(code);
}

fn open_federation(config: &CommandLineConfig) -> FederationResult<Federation> {
    let store_config = match &config.config {
        Some(path) => FederationConfig::from_path(path)?,
        None => FederationConfig::from_env()?,
    };
    let federation = Federation::open(&store_config)?;
    if let Some(dataset) = config.dataset.load()? {
        federation.load(&dataset)?;
    }
    Ok(federation)
}
