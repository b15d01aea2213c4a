//! nlforge clinical-text-to-bundle pipeline: demo CLI
//!
//! Runs one or all of the six published pipeline scenarios end to end
//! against a real `ClinicalPipeline`.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- prescription
//!   cargo run -p demo -- vitals
//!   cargo run -p demo -- allergy-conflict
//!   cargo run -p demo -- consent-capture
//!   cargo run -p demo -- cycle-detection
//!   cargo run -p demo -- budget-halt

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nlforge_contracts::error::PipelineResult;
use nlforge_pipeline::scenarios;

/// nlforge clinical-text-to-bundle pipeline demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "nlforge clinical-text-to-bundle pipeline demo",
    long_about = "Runs the published end-to-end scenarios against a real ClinicalPipeline:\n\n\
                  1. Prescription with frequency\n\
                  2. Vital signs observation\n\
                  3. Allergy vs contraindicated prescription\n\
                  4. Patient consent capture (R4 field-name boundary)\n\
                  5. Cycle detection\n\
                  6. Budget halt"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all six scenarios in sequence.
    RunAll,
    /// Scenario 1: prescription with a daily frequency.
    Prescription,
    /// Scenario 2: clustered vital signs plus a medication administration.
    Vitals,
    /// Scenario 3: allergy vs contraindicated prescription.
    AllergyConflict {
        /// Attach the blocking finding instead of failing the request.
        #[arg(long)]
        tolerant: bool,
    },
    /// Scenario 4: standalone consent capture.
    ConsentCapture,
    /// Scenario 5: mutual-reference cycle detection.
    CycleDetection,
    /// Scenario 6: ambiguous input with a zero cost ceiling.
    BudgetHalt,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = block_on(dispatch(cli.command));

    match result {
        Ok(()) => println!("Scenario(s) completed successfully."),
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn dispatch(command: Command) -> PipelineResult<()> {
    match command {
        Command::RunAll => run_all().await,
        Command::Prescription => run_prescription().await,
        Command::Vitals => run_vitals().await,
        Command::AllergyConflict { tolerant } => run_allergy_conflict(tolerant).await,
        Command::ConsentCapture => run_consent_capture(),
        Command::CycleDetection => run_cycle_detection(),
        Command::BudgetHalt => run_budget_halt().await,
    }
}

async fn run_all() -> PipelineResult<()> {
    run_prescription().await?;
    run_vitals().await?;
    run_allergy_conflict(true).await?;
    run_consent_capture()?;
    // Cycle detection is expected to fail; report it without aborting the run.
    if let Err(e) = run_cycle_detection() {
        println!("[5] cycle detection (expected failure): {}", e);
    }
    run_budget_halt().await?;
    Ok(())
}

async fn run_prescription() -> PipelineResult<()> {
    let outcome = scenarios::run_prescription_scenario().await?;
    println!("[1] prescription: {} bundle entries, {} validation issues", outcome.bundle.entry.len(), outcome.validation.issues.len());
    Ok(())
}

async fn run_vitals() -> PipelineResult<()> {
    let outcome = scenarios::run_vitals_scenario().await?;
    println!("[2] vitals: {} bundle entries, {} validation issues", outcome.bundle.entry.len(), outcome.validation.issues.len());
    Ok(())
}

async fn run_allergy_conflict(tolerant: bool) -> PipelineResult<()> {
    match scenarios::run_allergy_contraindication_scenario(tolerant).await {
        Ok(outcome) => {
            println!(
                "[3] allergy conflict (tolerant): {} bundle entries, {} validation issues",
                outcome.bundle.entry.len(),
                outcome.validation.issues.len()
            );
            Ok(())
        }
        Err(e) if !tolerant => {
            println!("[3] allergy conflict (non-tolerant, expected failure): {}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn run_consent_capture() -> PipelineResult<()> {
    let bundle = scenarios::run_consent_capture_scenario()?;
    println!("[4] consent capture: {} bundle entries", bundle.entry.len());
    Ok(())
}

fn run_cycle_detection() -> PipelineResult<()> {
    scenarios::run_cycle_detection_scenario()?;
    Ok(())
}

async fn run_budget_halt() -> PipelineResult<()> {
    let outcome = scenarios::run_budget_halt_scenario().await?;
    println!("[6] budget halt: {} bundle entries, {} validation issues", outcome.bundle.entry.len(), outcome.validation.issues.len());
    Ok(())
}

/// Drives a future to completion without an async runtime dependency. The
/// pipeline never suspends on a real executor, so one poll always resolves.
fn block_on<F: std::future::Future>(mut fut: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        noop_raw_waker()
    }
    fn noop_raw_waker() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
    }
}

fn print_banner() {
    println!();
    println!("nlforge: Clinical Text to FHIR R4 Bundle Pipeline");
    println!("===================================================");
    println!();
    println!("Pipeline stages per request:");
    println!("  [1] Tiered entity extraction (pattern -> tagger -> regex -> external model)");
    println!("  [2] Terminology coding against the embedded ontology tables");
    println!("  [3] Resource factory dispatch per extracted entity kind");
    println!("  [4] Bundle assembly: reference resolution + topological ordering");
    println!("  [5] Cross-resource safety checks + schema validation loop");
    println!();
}
