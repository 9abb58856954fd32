use anyhow::{anyhow, Context, Result};
use clap::{Arg, Command};
use std::path::Path;

use cartegrise::{
    config::Config,
    mime_detection,
    ocr::{QualityVerdict, UploadKind},
    pipeline::ExtractionPipeline,
};

fn main() -> Result<()> {
    let matches = Command::new("extract_carte_grise")
        .about("Extract the fields of a French vehicle registration certificate")
        .arg(
            Arg::new("file")
                .help("JPEG, PNG or PDF scan of the certificate")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("content-type")
                .help("Content type to decode as, detected from the file when omitted")
                .long("content-type")
                .short('t')
                .value_name("MIME"),
        )
        .arg(
            Arg::new("force-verdict")
                .help("Skip quality assessment and preprocess as GOOD or POOR")
                .long("force-verdict")
                .value_name("VERDICT"),
        )
        .arg(
            Arg::new("verbose")
                .help("Print the full report instead of the extracted fields")
                .long("verbose")
                .short('v')
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file = matches
        .get_one::<String>("file")
        .ok_or_else(|| anyhow!("missing FILE argument"))?;
    let path = Path::new(file);
    let bytes = std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;

    let content_type = match matches.get_one::<String>("content-type") {
        Some(declared) => declared.clone(),
        None => mime_detection::content_type_for_file(path, &bytes),
    };
    if !UploadKind::is_allowed(&content_type) {
        return Err(anyhow!("unsupported content type {}", content_type));
    }

    let config = Config::from_env()?;
    let mut pipeline = ExtractionPipeline::from_config(&config);
    if let Some(verdict) = matches.get_one::<String>("force-verdict") {
        let verdict: QualityVerdict = verdict.parse().map_err(|e| anyhow!("{}", e))?;
        pipeline = pipeline.with_forced_verdict(verdict);
    }

    let report = pipeline.run(&bytes, &content_type)?;

    let output = if verbose {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.outcome)?
    };
    println!("{}", output);

    Ok(())
}
