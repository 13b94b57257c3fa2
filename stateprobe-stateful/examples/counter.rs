//! Example: hunting injected bugs in the bounded counter
//!
//! Runs one campaign per flaw with the same seed and prints the minimal
//! reproducing sequence for each failure. Set `RUST_LOG=stateprobe=info`
//! together with a tracing subscriber to watch the campaign progress.

use stateprobe_stateful::prelude::*;

fn main() -> Result<(), EngineError> {
    println!("Testing the bounded counter against injected flaws\n");

    for flaw in Flaw::ALL {
        let config = CampaignConfig::default().seed(42).max_examples(200);
        let campaign = Campaign::new(counter_machine()?, move || CounterSubject::new(flaw), config)?;
        let report = campaign.run()?;

        println!("== subject: {flaw}");
        println!("{report}");
        if report.passed() {
            println!("{}", report.coverage);
        }
        if let Some(record) = report.first_failure() {
            println!("{record}");

            // The record replays to the same failure against a fresh subject
            let replay = campaign.replay(&record.sequence)?;
            println!("  Replay reproduces: {}", replay.failure() == Some(&record.failure()));
        }
        println!();
    }

    Ok(())
}
