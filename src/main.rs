//! heka CLI: rule-based triple inference.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use heka::engine::{InfContext, Reasoner, ReasonerConfig};
use heka::parser::{parse_facts, parse_pattern};
use heka::store::FactQuery;
use heka::symbol::SymbolTable;
use heka::term::Fact;

#[derive(Parser)]
#[command(name = "heka", version, about = "Rule-based triple inference engine")]
struct Cli {
    /// TOML configuration file (mode, firing limit, tabling, ...).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a rule file and list the parsed rules.
    Parse {
        /// Path to a rule file.
        rules: PathBuf,
    },

    /// Compute the closure of a fact file under a rule file and print
    /// every fact that holds.
    Infer {
        /// Path to a rule file.
        rules: PathBuf,

        /// Path to a fact file (one ground triple per line).
        facts: PathBuf,

        /// Emit JSON instead of rendered triples.
        #[arg(long)]
        json: bool,
    },

    /// Answer a goal pattern, e.g. "(?x ancestor ?y)".
    Query {
        /// Path to a rule file.
        rules: PathBuf,

        /// Path to a fact file.
        facts: PathBuf,

        /// Goal pattern; ?name introduces a variable, _ a wildcard.
        goal: String,

        /// Emit JSON instead of rendered triples.
        #[arg(long)]
        json: bool,
    },

    /// Print the proof tree for a ground fact, e.g. "(ida ancestor joe)".
    Explain {
        /// Path to a rule file.
        rules: PathBuf,

        /// Path to a fact file.
        facts: PathBuf,

        /// The fact to explain; must be ground.
        fact: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { rules } => {
            let source = fs::read_to_string(&rules).into_diagnostic()?;
            let symbols = SymbolTable::new();
            let parsed =
                heka::parser::parse_rules_with_limit(&source, &symbols, config.max_rule_vars)?;
            println!("{} rule(s) parsed from {}", parsed.len(), rules.display());
            for rule in &parsed {
                println!("  {}", rule.label());
            }
        }

        Commands::Infer { rules, facts, json } => {
            let mut ctx = build_context(&rules, &facts, config)?;
            ctx.prepare()?;
            let all = ctx.find(&FactQuery::any())?;
            print_facts(&all, ctx.symbols(), json)?;
            let stats = ctx.stats();
            eprintln!(
                "{} fact(s); {} rule firing(s), {} base assertion(s), {} deduction(s)",
                all.len(),
                stats.rules_fired,
                stats.base_facts,
                stats.deductions,
            );
        }

        Commands::Query {
            rules,
            facts,
            goal,
            json,
        } => {
            let mut ctx = build_context(&rules, &facts, config)?;
            let pattern = parse_pattern(&goal, ctx.symbols())?;
            let answers = ctx.infer(&pattern)?.collect::<Result<Vec<Fact>, _>>()?;
            print_facts(&answers, ctx.symbols(), json)?;
        }

        Commands::Explain { rules, facts, fact } => {
            let mut config = config;
            config.record_derivations = true;
            let mut ctx = build_context(&rules, &facts, config)?;
            let pattern = parse_pattern(&fact, ctx.symbols())?;
            let Some(target) = pattern.to_fact() else {
                miette::bail!("the fact to explain must be ground: {fact}");
            };
            if !ctx.holds(&target)? {
                println!("{}: does not hold", target.render(ctx.symbols()));
                return Ok(());
            }
            print!("{}", ctx.explain(&target));
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReasonerConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).into_diagnostic()?;
            Ok(ReasonerConfig::from_toml_str(&text)?)
        }
        None => Ok(ReasonerConfig::default()),
    }
}

fn build_context(rules: &Path, facts: &Path, config: ReasonerConfig) -> Result<InfContext> {
    let mut reasoner = Reasoner::new(config)?;
    let rule_text = fs::read_to_string(rules).into_diagnostic()?;
    reasoner.add_rules(&rule_text)?;

    let mut ctx = reasoner.bind()?;
    let fact_text = fs::read_to_string(facts).into_diagnostic()?;
    let asserted = parse_facts(&fact_text, ctx.symbols())?;
    for fact in asserted {
        ctx.add_fact(fact)?;
    }
    Ok(ctx)
}

fn print_facts(facts: &[Fact], symbols: &SymbolTable, json: bool) -> Result<()> {
    if json {
        let rows: Vec<serde_json::Value> = facts
            .iter()
            .map(|f| {
                serde_json::json!({
                    "subject": symbols.render(f.subject),
                    "predicate": symbols.render(f.predicate),
                    "object": symbols.render(f.object),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).into_diagnostic()?
        );
    } else {
        for fact in facts {
            println!("{}", fact.render(symbols));
        }
    }
    Ok(())
}
