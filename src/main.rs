//! certmatch - client-certificate policy compiler

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use certmatch::{
    Result,
    cli::{Cli, Command},
    config::{Config, OutputFormat},
    criteria::{CompiledCriterion, Generator, Registry},
    inspect::CertificateFacts,
    setup_tracing,
    value::Value,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.unwrap_or(config.logging.format);
    if let Err(e) = setup_tracing(level, Some(format.as_str())) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Compile {
            file,
            criterion,
            label,
            format,
        } => run_compile(
            &config,
            &file,
            &criterion,
            label.as_deref(),
            format.unwrap_or(config.compiler.output),
        ),
        Command::Inspect { cert } => run_inspect(&cert, config.compiler.output),
        Command::Criteria => {
            run_criteria();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Compile a policy document and print the resulting rules
fn run_compile(
    config: &Config,
    file: &Path,
    criterion: &str,
    label: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let source = std::fs::read_to_string(file)?;
    let document = Value::from_yaml_str(&source)?;
    let label = label.map_or_else(|| file.display().to_string(), str::to_owned);

    let registry = Registry::builtin();
    let generator = Generator::shared(&config.compiler);

    let compiled = match keyed_by_criterion(&registry, &document) {
        Some(entries) => entries
            .into_iter()
            .map(|(name, data)| registry.compile(name, &generator, &format!("{label}#{name}"), data))
            .collect::<Result<Vec<_>>>()?,
        None => vec![registry.compile(criterion, &generator, &label, &document)?],
    };
    info!(label = %label, rules = compiled.len(), "compiled policy");

    print_rules(&compiled, output)
}

/// Split a document whose top-level keys all name registered criteria.
fn keyed_by_criterion<'a>(
    registry: &Registry,
    document: &'a Value,
) -> Option<Vec<(&'a str, &'a Value)>> {
    let obj = document.as_object()?;
    let keyed = !obj.is_empty() && obj.iter().all(|(key, _)| registry.get(key).is_some());
    debug!(keyed, "policy document layout");
    keyed.then(|| obj.iter().collect())
}

fn print_rules(compiled: &[CompiledCriterion], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Rego => {
            let rules: Vec<String> = compiled
                .iter()
                .flat_map(|c| std::iter::once(&c.rule).chain(&c.additional_rules))
                .map(ToString::to_string)
                .collect();
            println!("{}", rules.join("\n\n"));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(compiled)?),
    }
    Ok(())
}

/// Print the facts derived from a certificate file
fn run_inspect(cert: &Path, output: OutputFormat) -> Result<()> {
    let bytes = std::fs::read(cert)?;
    let facts = CertificateFacts::from_bytes(&bytes)?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }

    println!("fingerprint: {}", facts.fingerprint);
    println!("spki_hash:   {}", facts.spki_hash);
    print_list("email", &facts.san_email_addresses);
    print_list("dns", &facts.san_dns_names);
    print_list("ip", &facts.san_ip_addresses);
    if !facts.san_uris.is_empty() {
        println!("uri:");
        for uri in &facts.san_uris {
            println!("  - {}    # SAN {}", uri.reconstructed(), uri.raw);
        }
    }
    Ok(())
}

fn print_list(key: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{key}:");
    for item in items {
        println!("  - {item}");
    }
}

/// List registered criteria
fn run_criteria() {
    let registry = Registry::builtin();
    for registration in registry.registrations() {
        println!("{}\t{}", registration.name, registration.data_type);
    }
}
