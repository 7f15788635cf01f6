use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roomshift_contracts::events::EventWriter;
use roomshift_contracts::prompt::build_prompt;
use roomshift_contracts::request::{validate_request, Palette, Style, ValidationError};
use roomshift_contracts::response::ValidationFailureBody;
use roomshift_engine::{PipelineConfig, TransformPipeline};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "roomshift", version, about = "Room photo restyling pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one transformation request and print the response body.
    Transform(TransformArgs),
    /// Validate a request and print the prompt it would send.
    Prompt(PromptArgs),
    /// Print the style and palette vocabularies.
    Catalog,
}

#[derive(Debug, Parser)]
struct TransformArgs {
    /// Request JSON file, or `-` for stdin.
    #[arg(long)]
    payload: String,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Ignore any configured credential and answer from the mock rotation.
    #[arg(long)]
    mock: bool,
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[arg(long)]
    payload: String,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("roomshift error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Transform(args) => run_transform(args),
        Command::Prompt(args) => run_prompt(args),
        Command::Catalog => {
            println!("{}", serde_json::to_string_pretty(&catalog_json())?);
            Ok(0)
        }
    }
}

fn run_transform(args: TransformArgs) -> Result<i32> {
    let mut config = PipelineConfig::from_env();
    if args.mock {
        config = config.without_credential();
    }
    let events = match args.events {
        Some(path) => EventWriter::new(path),
        None => EventWriter::disabled(),
    };
    let body = read_payload(&args.payload)?;
    let (code, rendered) = transform_payload(&config, events, &body, args.compact)?;
    println!("{rendered}");
    Ok(code)
}

fn transform_payload(
    config: &PipelineConfig,
    events: EventWriter,
    body: &str,
    compact: bool,
) -> Result<(i32, String)> {
    let pipeline = TransformPipeline::from_config(config, events)?;
    let outcome = pipeline.transform_body(body);
    let rendered = render_json(&outcome.body(), compact)?;
    Ok((exit_code_for_status(outcome.status_code()), rendered))
}

fn run_prompt(args: PromptArgs) -> Result<i32> {
    let body = read_payload(&args.payload)?;
    match prompt_for_payload(&body)? {
        Ok(prompt) => {
            println!("{prompt}");
            Ok(0)
        }
        Err(details) => {
            eprintln!("{}", render_json(&details, false)?);
            Ok(2)
        }
    }
}

/// Outer error is I/O; the inner `Err` is the 400-style body for an invalid request.
fn prompt_for_payload(body: &str) -> Result<Result<String, Value>> {
    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(err) => {
            let err = ValidationError::single("body", format!("invalid JSON: {err}"));
            return Ok(Err(serde_json::to_value(ValidationFailureBody::from(&err))?));
        }
    };
    match validate_request(&payload) {
        Ok(request) => Ok(Ok(build_prompt(&request))),
        Err(err) => Ok(Err(serde_json::to_value(ValidationFailureBody::from(&err))?)),
    }
}

fn read_payload(source: &str) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        io::stdin()
            .read_to_string(&mut body)
            .context("failed to read payload from stdin")?;
        return Ok(body);
    }
    fs::read_to_string(source).with_context(|| format!("failed to read payload {source}"))
}

fn render_json(value: &Value, compact: bool) -> Result<String> {
    Ok(if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    })
}

fn exit_code_for_status(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 2,
        _ => 1,
    }
}

fn catalog_json() -> Value {
    json!({
        "styles": Style::ALL
            .iter()
            .map(|style| json!({
                "label": style.label(),
                "slug": style.slug(),
                "descriptor": style.descriptor(),
            }))
            .collect::<Vec<_>>(),
        "palettes": Palette::ALL
            .iter()
            .map(|palette| json!({ "label": palette.label(), "colors": palette.colors() }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use roomshift_contracts::events::EventWriter;
    use roomshift_engine::PipelineConfig;
    use serde_json::{json, Value};

    use super::{
        catalog_json, exit_code_for_status, prompt_for_payload, read_payload, transform_payload,
    };

    const PAYLOAD: &str = r#"{
        "dimensions": { "longueur": 16, "largeur": 12, "hauteur": 9 },
        "photosProjetUrls": ["https://cdn.example.com/bedroom.jpg"],
        "style": "Art Déco",
        "palette": "Sombre"
    }"#;

    #[test]
    fn status_codes_map_to_exit_codes() {
        assert_eq!(exit_code_for_status(200), 0);
        assert_eq!(exit_code_for_status(400), 2);
        assert_eq!(exit_code_for_status(500), 1);
    }

    #[test]
    fn mock_transform_prints_a_success_body() -> anyhow::Result<()> {
        let config = PipelineConfig::default().without_credential();
        let (code, rendered) = transform_payload(&config, EventWriter::disabled(), PAYLOAD, true)?;
        assert_eq!(code, 0);
        assert!(!rendered.contains('\n'));
        let body: Value = serde_json::from_str(&rendered)?;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["avantUrl"], json!("https://cdn.example.com/bedroom.jpg"));
        assert_eq!(body["meta"]["mode"], json!("mock-no-credential"));
        Ok(())
    }

    #[test]
    fn invalid_payload_exits_with_two() -> anyhow::Result<()> {
        let config = PipelineConfig::default().without_credential();
        let (code, rendered) =
            transform_payload(&config, EventWriter::disabled(), r#"{"style":"Moderne"}"#, false)?;
        assert_eq!(code, 2);
        let body: Value = serde_json::from_str(&rendered)?;
        assert_eq!(body["error"], json!("Invalid request"));
        Ok(())
    }

    #[test]
    fn prompt_command_reports_prompt_or_details() -> anyhow::Result<()> {
        let prompt = prompt_for_payload(PAYLOAD)?;
        assert!(prompt.as_ref().is_ok_and(|text| text.contains("Art Déco")));

        let config = PipelineConfig::default().without_credential();
        let (_, pipeline_body) =
            transform_payload(&config, EventWriter::disabled(), "not json", true)?;
        let pipeline_body: Value = serde_json::from_str(&pipeline_body)?;
        let details = prompt_for_payload("not json")?;
        assert!(details.err().is_some_and(|body| body == pipeline_body));
        Ok(())
    }

    #[test]
    fn payload_is_read_from_a_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("request.json");
        std::fs::write(&path, PAYLOAD)?;
        let body = read_payload(&path.to_string_lossy())?;
        assert_eq!(body, PAYLOAD);
        assert!(read_payload(&temp.path().join("missing.json").to_string_lossy()).is_err());
        Ok(())
    }

    #[test]
    fn catalog_lists_both_vocabularies() {
        let catalog = catalog_json();
        assert_eq!(catalog["styles"].as_array().map(Vec::len), Some(8));
        assert_eq!(catalog["palettes"].as_array().map(Vec::len), Some(8));
        assert_eq!(catalog["styles"][7]["label"], json!("Art Déco"));
    }
}
