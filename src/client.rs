use std::path::PathBuf;

use crate::{
    coordinator::LogicalRequest,
    dataset::Dataset,
    errors::FederationResult,
    synthetic::{DatasetShape, generate_dataset},
};

/// Where the binary gets the data it loads before serving the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetSource {
    /// Serve whatever the configured stores already hold.
    Existing,
    File(PathBuf),
    Synthetic(u64),
}

impl DatasetSource {
    pub fn load(&self) -> FederationResult<Option<Dataset>> {
        match self {
            DatasetSource::Existing => Ok(None),
            DatasetSource::File(path) => Dataset::from_path(path).map(Some),
            DatasetSource::Synthetic(seed) => {
                Ok(Some(generate_dataset(&DatasetShape::default(), *seed)))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestSpec {
    Json(String),
    Command { name: String, args: Vec<String> },
}

impl RequestSpec {
    pub fn to_request(&self) -> FederationResult<LogicalRequest> {
        match self {
            RequestSpec::Json(raw) => LogicalRequest::from_json_str(raw),
            RequestSpec::Command { name, args } => LogicalRequest::from_command(name, args),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub dataset: DatasetSource,
    pub config: Option<PathBuf>,
    pub request: RequestSpec,
}

impl CommandLineConfig {
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut dataset = DatasetSource::Existing;
        let mut config = None;
        let mut request = None;
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match *arg {
                "--dataset" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| "--dataset requires a value".to_string())?;
                    dataset = DatasetSource::File(PathBuf::from(path));
                }
                "--synthetic" => {
                    let seed = iter
                        .next()
                        .ok_or_else(|| "--synthetic requires a seed".to_string())?;
                    let seed = seed
                        .parse::<u64>()
                        .map_err(|_| format!("--synthetic seed {seed:?} is not a number"))?;
                    dataset = DatasetSource::Synthetic(seed);
                }
                "--config" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| "--config requires a value".to_string())?;
                    config = Some(PathBuf::from(path));
                }
                "--request" => {
                    let raw = iter
                        .next()
                        .ok_or_else(|| "--request requires a value".to_string())?;
                    request = Some(RequestSpec::Json(raw.to_string()));
                }
                "--command" => {
                    let name = iter
                        .next()
                        .ok_or_else(|| "--command requires a value".to_string())?;
                    // Everything after the query name is a key=value argument.
                    let args = iter.by_ref().map(|a| a.to_string()).collect();
                    request = Some(RequestSpec::Command {
                        name: name.to_string(),
                        args,
                    });
                }
                other => {
                    return Err(format!("unknown argument {other}"));
                }
            }
        }
        let request =
            request.ok_or_else(|| "either --request or --command is required".to_string())?;
        Ok(Self {
            dataset,
            config,
            request,
        })
    }

    pub fn help() -> &'static str {
        "Usage: academicfed [--dataset PATH | --synthetic SEED] [--config PATH] \
         (--request JSON | --command NAME [key=value ...])\n"
    }
}
