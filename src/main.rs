use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::Path;

use flood_risk_core::error::KeyDisplay;
use flood_risk_core::{
    rank_wards, score, BulkImporter, Config, EntityKind, ImportAbort, ImportOutcome, ImportResult,
    RiskDistribution, RiskFactors, RiskLevel, SqliteStore,
};

const USAGE: &str = "Usage:
  flood-risk import <kind> <file.csv>
  flood-risk score <exposure> <susceptibility> <resilience>
  flood-risk wards
  flood-risk template <kind>

Kinds: ward, weather, drainage, structure, risk_index";

fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["import", kind, file] => run_import(kind, file),
        ["score", exposure, susceptibility, resilience] => {
            run_score(exposure, susceptibility, resilience)
        }
        ["wards"] => run_wards(),
        ["template", kind] => run_template(kind),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn parse_kind(raw: &str) -> Result<EntityKind> {
    raw.parse::<EntityKind>().map_err(anyhow::Error::msg)
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })
}

fn run_import(kind: &str, file: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let config = Config::load().context("Failed to load configuration")?;

    println!("🗄️  Import {} records: CSV → SQLite", kind.name());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Read CSV
    let text = fs::read_to_string(Path::new(file))
        .with_context(|| format!("Failed to read CSV file {}", file))?;

    // 2. Open store and pre-fetch keys
    let store = open_store(&config)?;
    let existing = store
        .natural_keys(kind)
        .context("Failed to read existing keys")?;
    println!("✓ {} {} records already stored", existing.len(), kind);

    // 3. Import
    let result = BulkImporter::new(&store, config.import_timeout)
        .bulk_import(kind, &text, &existing, &config.actor)
        .context("Import rejected")?;

    print_report(&result);
    Ok(())
}

fn print_report(result: &ImportResult) {
    let summary = result.summary();

    println!("\n✅ Imported: {}", summary.successful);
    for row in &result.successful {
        println!("   row {:>4}  {}  ({})", row.row_number, row.natural_key, row.id);
    }

    println!("\n❌ Failed: {}", summary.failed);
    for row in &result.failed {
        println!(
            "   row {:>4}  {}  {}",
            row.row_number,
            KeyDisplay(row.natural_key.as_deref()),
            row.message()
        );
    }

    println!("\n🔁 Duplicates: {}", summary.duplicates);
    for row in &result.duplicates {
        println!("   row {:>4}  {}  {}", row.row_number, row.natural_key, row.reason.as_str());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match summary.outcome {
        ImportOutcome::AllImported => println!("🎉 All {} rows imported", summary.total_rows),
        ImportOutcome::Partial => println!("⚠️  Some rows need attention"),
        ImportOutcome::AllInvalid => println!("❌ Every row failed validation"),
        ImportOutcome::NothingNew => println!("ℹ️  Nothing new: every row already exists"),
        ImportOutcome::StoreUnavailable | ImportOutcome::TimedOut => {}
    }
    match &result.abort {
        Some(ImportAbort::StoreUnavailable { row_number, error }) => {
            println!("🛑 Store unreachable at row {}: {}", row_number, error)
        }
        Some(ImportAbort::TimedOut { elapsed }) => {
            println!("⏱️  Timed out after {:.1}s", elapsed.as_secs_f64())
        }
        None => {}
    }
}

fn run_score(exposure: &str, susceptibility: &str, resilience: &str) -> Result<()> {
    let parse = |name: &str, raw: &str| -> Result<f64> {
        let value: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw))?;
        if !value.is_finite() || value < 0.0 {
            bail!("{} must be a finite number of at least 0, got '{}'", name, raw);
        }
        Ok(value)
    };

    let factors = RiskFactors::new(
        parse("exposure", exposure)?,
        parse("susceptibility", susceptibility)?,
        flood_risk_core::risk::resilience_or_default(Some(parse("resilience", resilience)?)),
    );
    let result = score(&factors);

    println!("index: {:.2}", result.index);
    println!("level: {}", result.level);
    println!("color: {}", result.level.color_token());
    Ok(())
}

fn run_wards() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let store = open_store(&config)?;

    let wards = store.wards().context("Failed to load wards")?;
    if wards.is_empty() {
        println!("No wards stored. Run: flood-risk import ward <file.csv>");
        return Ok(());
    }

    let ranked = rank_wards(&wards);
    println!("🌊 Ward flood risk ({} wards)", ranked.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for ward in &ranked {
        println!(
            "{:>6.2}  {:<7} {:<7} {}",
            ward.score.index,
            ward.score.level.as_str(),
            ward.score.level.color_token(),
            ward.ward_name
        );
    }

    let distribution = RiskDistribution::from_scores(ranked.iter().map(|w| &w.score));
    println!();
    for level in RiskLevel::ALL {
        println!("{:<7} {}", level.as_str(), distribution.count(level));
    }

    Ok(())
}

fn run_template(kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;

    println!("{}", kind.template_header());
    let example: Vec<String> = kind
        .fields()
        .iter()
        .map(|f| f.example.clone().unwrap_or_default())
        .collect();
    println!("{}", example.join(","));

    // Field notes go to stderr so stdout stays a valid CSV
    for field in kind.fields() {
        let marker = if field.required { " (required)" } else { "" };
        if field.description.is_empty() {
            eprintln!("# {}{}", field.name, marker);
        } else {
            eprintln!("# {}{}: {}", field.name, marker, field.description);
        }
    }
    Ok(())
}
