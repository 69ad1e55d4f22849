//! CLI runner - executes commands

use super::pipeline::{run_streams, RunReport};
use crate::auth::SessionResolver;
use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::client::{ApiClient, SalesforceApi};
use crate::config::{ConfigProvider, ExtractionConfig, FileConfigProvider, PipelineConfig};
use crate::engine::ExtractionEngine;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::JsonlSink;
use crate::secrets::{resolve_credential, FileSecretProvider};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination directory when neither the command line nor the pipeline names one
const DEFAULT_OUTPUT_DIR: &str = "output";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run { streams, output } => {
                self.run_pipeline(streams, output.as_deref()).await
            }
            Commands::Check { object } => self.check(object).await,
            Commands::Streams => self.streams(),
        }
    }

    /// Load the pipeline document
    fn load_pipeline(&self) -> Result<PipelineConfig> {
        let path = self
            .cli
            .pipeline
            .as_ref()
            .ok_or_else(|| Error::config("Pipeline file not specified (use -p flag)"))?;
        FileConfigProvider::new(path).load()
    }

    /// Built-in catalog extended with the pipeline's own stream definitions
    fn catalog(config: &PipelineConfig) -> Result<Catalog> {
        config
            .source
            .extra_streams
            .iter()
            .cloned()
            .try_fold(Catalog::salesforce(), Catalog::with_stream)
    }

    /// Resolve credentials and negotiate a session
    async fn connect(&self, config: &PipelineConfig) -> Result<ApiClient> {
        let kind = config.source.credential_kind()?;
        let reference = config.source.credentials_ref()?;
        let secrets = FileSecretProvider::new(&self.cli.secrets_dir);
        let credential = resolve_credential(&secrets, kind, reference).await?;

        let client_config = config.source.client.clone();
        let http = HttpClient::from_client_config(&client_config)?;
        let session = SessionResolver::new(http.clone(), client_config)
            .resolve(&credential)
            .await?;

        let extraction = ExtractionConfig::from_source(&config.source);
        Ok(ApiClient::new(http, session).with_config(&extraction))
    }

    /// Extract and load the selected streams
    async fn run_pipeline(&self, streams: &[String], output: Option<&Path>) -> Result<()> {
        let config = self.load_pipeline()?;
        let catalog = Self::catalog(&config)?;
        let names = if streams.is_empty() {
            config.source.streams.as_slice()
        } else {
            streams
        };
        let specs = catalog.select(names)?;

        let dir = output
            .map(Path::to_path_buf)
            .or_else(|| config.destination.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
            .join(config.dataset_name());
        let state_path = self
            .cli
            .state
            .clone()
            .unwrap_or_else(|| dir.join("state.json"));
        let state = StateManager::from_file(&state_path)?;
        let sink = JsonlSink::new(&dir);

        let api = self.connect(&config).await?;
        let engine =
            ExtractionEngine::new(api).with_config(ExtractionConfig::from_source(&config.source));

        info!(
            pipeline = %config.pipeline_name,
            streams = specs.len(),
            output = %dir.display(),
            "Starting run"
        );
        let report = run_streams(&engine, &specs, &state, &sink).await;
        self.output_report(&report);

        if report.is_success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "{} of {} streams failed",
                report.failed(),
                report.streams.len()
            )))
        }
    }

    /// Test credentials by describing one object
    async fn check(&self, object: &str) -> Result<()> {
        let config = self.load_pipeline()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!("Checking connection for {}", config.pipeline_name)
            }
        }));

        let described = match self.connect(&config).await {
            Ok(api) => api.describe_object(object).await,
            Err(e) => Err(e),
        };

        match described {
            Ok(schema) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": format!(
                            "Described {} ({} fields)",
                            schema.name,
                            schema.fields.len()
                        )
                    }
                }));
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
            }
        }

        Ok(())
    }

    /// List catalog streams
    fn streams(&self) -> Result<()> {
        let catalog = match &self.cli.pipeline {
            Some(_) => Self::catalog(&self.load_pipeline()?)?,
            None => Catalog::salesforce(),
        };

        for spec in catalog.streams() {
            self.output_message(&json!({
                "type": "STREAM",
                "stream": spec
            }));
        }
        Ok(())
    }

    fn output_report(&self, report: &RunReport) {
        for stream in &report.streams {
            self.output_message(&json!({
                "type": "STREAM_STATUS",
                "streamStatus": stream
            }));
        }
        self.output_message(&json!({
            "type": "RUN_SUMMARY",
            "runSummary": {
                "streams": report.streams.len(),
                "failed": report.failed()
            }
        }));
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
