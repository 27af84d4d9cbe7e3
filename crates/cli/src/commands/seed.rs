use mesero_db::{DemoMenuDataset, SeedResult, VerificationResult};

use crate::commands::{with_database, CommandResult, StepError};

pub fn run() -> CommandResult {
    with_database(
        "seed",
        |_, pool| async move {
            let seeded = DemoMenuDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;
            let verification = DemoMenuDataset::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 7u8))?;
            check_verification(&verification)?;
            Ok(seeded)
        },
        |seeded: SeedResult| {
            format!(
                "demo menu loaded: {} products, {} ingredients, {} promotions",
                seeded.products, seeded.ingredients, seeded.promotions
            )
        },
    )
}

fn check_verification(verification: &VerificationResult) -> Result<(), StepError> {
    if verification.all_present {
        return Ok(());
    }

    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    let message = if failed_checks.is_empty() {
        "some demo rows failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    };
    Err(("seed_verification", message, 7))
}
