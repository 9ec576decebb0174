use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skillguard_core::{
    assess,
    report::{render_summary, render_suspicious, OutputFormat},
    suspicious_entries, Action, CatalogSource, DecisionMap, Extraction, PolicyBundle, PresetName,
    SanitizeSettings, Summary, TreeListing,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "SKILLGUARD";

#[derive(Parser, Debug)]
#[command(
    name = "skillguard",
    author,
    version,
    about = "Risk classifier and sanitizer for skill catalogs"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON); SKILLGUARD_* variables override it
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Built-in policy version (comprehensive, refined, legacy)
    #[arg(long, value_name = "NAME", global = true)]
    policy: Option<PresetName>,

    /// Policy document (.yaml, .json, .json5); takes precedence over --policy
    #[arg(long = "policy-file", value_name = "FILE", global = true)]
    policy_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify and categorize a catalog and print a summary report
    Scan {
        /// Markdown catalog to scan
        #[arg(long, value_name = "FILE", conflicts_with = "tree")]
        input: Option<PathBuf>,
        /// Repository tree listing (JSON) to scan instead of a markdown catalog
        #[arg(long, value_name = "FILE")]
        tree: Option<PathBuf>,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
        /// Also write the JSON report to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write entries above `low` (with reasons) to this file
        #[arg(long = "suspicious-out", value_name = "FILE")]
        suspicious_out: Option<PathBuf>,
    },
    /// Rewrite a markdown catalog, removing or flagging risky entries
    Sanitize {
        #[arg(long, value_name = "FILE", default_value = "README.md")]
        input: PathBuf,
        /// Destination file; stdout when omitted
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Take decisions from a tree listing instead of the catalog itself
        #[arg(long, value_name = "FILE")]
        tree: Option<PathBuf>,
    },
    /// List the active policy tiers and rules
    ListRules {
        /// Emit rules as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let policy = settings.load_policy()?;
    info!(
        policy = policy.risk.name(),
        rules = policy.risk.rule_count(),
        "policy loaded"
    );

    match cli
        .command
        .unwrap_or(Commands::ListRules { json: false })
    {
        Commands::Scan {
            input,
            tree,
            json,
            out,
            suspicious_out,
        } => scan(
            &settings,
            &policy,
            input.as_deref(),
            tree.as_deref(),
            json,
            out.as_deref(),
            suspicious_out.as_deref(),
        )?,
        Commands::Sanitize {
            input,
            output,
            tree,
        } => sanitize(&settings, &policy, &input, output.as_deref(), tree.as_deref())?,
        Commands::ListRules { json } => list_rules(&policy, json)?,
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<SanitizeSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
    let mut settings: SanitizeSettings = builder
        .build()
        .and_then(|cfg| cfg.try_deserialize())
        .context("failed to load settings")?;

    if let Some(policy) = cli.policy {
        settings.policy = policy;
    }
    if let Some(path) = &cli.policy_file {
        settings.policy_file = Some(path.clone());
    }
    Ok(settings)
}

fn extract(
    settings: &SanitizeSettings,
    input: Option<&Path>,
    tree: Option<&Path>,
) -> Result<Extraction> {
    let extractor = settings.extractor();
    if let Some(path) = tree {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read tree listing {}", path.display()))?;
        let listing = TreeListing::from_json(&raw)
            .with_context(|| format!("invalid tree listing {}", path.display()))?;
        return Ok(extractor.extract(CatalogSource::Tree(&listing)));
    }
    let path = input.unwrap_or_else(|| Path::new("README.md"));
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    Ok(extractor.extract(CatalogSource::Markdown(&text)))
}

fn scan(
    settings: &SanitizeSettings,
    policy: &PolicyBundle,
    input: Option<&Path>,
    tree: Option<&Path>,
    json: bool,
    out: Option<&Path>,
    suspicious_out: Option<&Path>,
) -> Result<()> {
    let extraction = extract(settings, input, tree)?;
    warn_on_duplicates(&extraction);
    info!(entries = extraction.entries.len(), "entries extracted");

    let assessments = assess(extraction.entries, policy);
    let summary = Summary::from_assessments(&assessments);
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print!("{}", render_summary(&summary, format)?);
    if json {
        println!();
    }

    if let Some(path) = out {
        write_file(path, &render_summary(&summary, OutputFormat::Json)?)?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = suspicious_out {
        let suspicious = suspicious_entries(&assessments);
        write_file(path, &render_suspicious(&suspicious)?)?;
        info!(path = %path.display(), count = suspicious.len(), "suspicious entries written");
    }
    Ok(())
}

fn sanitize(
    settings: &SanitizeSettings,
    policy: &PolicyBundle,
    input: &Path,
    output: Option<&Path>,
    tree: Option<&Path>,
) -> Result<()> {
    let document = fs::read_to_string(input)
        .with_context(|| format!("failed to read catalog {}", input.display()))?;
    let extraction = match tree {
        Some(_) => extract(settings, None, tree)?,
        None => settings.extractor().extract(CatalogSource::Markdown(&document)),
    };
    warn_on_duplicates(&extraction);
    let assessments = assess(extraction.entries, policy);
    let decisions = DecisionMap::from_entries(
        assessments.iter().map(|assessment| &assessment.entry),
        &settings.decisions,
    );
    info!(
        remove = decisions.count(Action::Remove),
        flag = decisions.count(Action::Flag),
        "decisions derived"
    );

    let rewriter = settings.rewriter()?;
    let anchor = settings.anchor();
    let outcome = rewriter.rewrite(&document, &decisions, &*anchor);
    if let Some(warning) = outcome.warning() {
        warn!(
            anchor_kind = ?settings.anchor_kind,
            anchor_level = settings.anchor_level,
            anchor_keyword = %settings.anchor_keyword,
            "{warning}"
        );
    }
    if outcome.fence_left_open {
        warn!("document ends inside an unterminated fenced block");
    }

    match output {
        Some(path) => {
            write_file(path, &outcome.document)?;
            info!(path = %path.display(), "sanitized catalog written");
        }
        None => print!("{}", outcome.document),
    }
    info!(
        removed = outcome.removed,
        flagged = outcome.flagged,
        notice_inserted = outcome.notice_inserted(),
        "sanitization complete"
    );
    Ok(())
}

fn list_rules(policy: &PolicyBundle, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&policy.risk.to_specs())?);
        return Ok(());
    }

    println!(
        "{} rule(s) in policy `{}`",
        policy.risk.rule_count(),
        policy.risk.name()
    );
    for tier in policy.risk.tiers() {
        println!("[{}]", tier.tier());
        for rule in tier.rules() {
            println!(
                "- {pattern:<28} :: {label}",
                pattern = rule.pattern(),
                label = rule.label()
            );
        }
    }
    println!("categories:");
    for category in policy.categories.iter() {
        let patterns: Vec<_> = category.patterns().collect();
        println!("- {:<10} :: {}", category.name(), patterns.join(", "));
    }
    Ok(())
}

fn warn_on_duplicates(extraction: &Extraction) {
    if extraction.duplicates_discarded > 0 {
        warn!(
            duplicates = extraction.duplicates_discarded,
            "duplicate catalog entries discarded"
        );
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
