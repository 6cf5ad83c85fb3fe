//! Micro grants stored in the data file (`/api/micro-grants` and
//! `medsplit grants`).
//!
//! Validation errors surface as [`GrantError`] inside the returned
//! `anyhow::Error`, so callers can tell bad input from I/O failures with
//! `downcast_ref`.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use medsplit_core::grants::{
    apply_donation, new_grant, sort_newest_first, GrantError, GrantRequest, MicroGrant,
};

use crate::config::Config;
use crate::data::DataFile;

/// All grants, newest first.
pub async fn list(data: &DataFile) -> Result<Vec<MicroGrant>> {
    let mut grants = data.load().await?.micro_grants;
    sort_newest_first(&mut grants);
    Ok(grants)
}

/// Validate and store a new request at the head of the list.
pub async fn request(data: &DataFile, req: &GrantRequest, max_amount: f64) -> Result<MicroGrant> {
    let grant = data
        .update(|d| {
            let grant = new_grant(
                req,
                &d.micro_grants,
                max_amount,
                &d.profiles,
                &d.users,
                Utc::now(),
            )?;
            d.micro_grants.insert(0, grant.clone());
            Ok(grant)
        })
        .await?;
    info!(id = grant.id, amount = grant.amount_needed, "grant requested");
    Ok(grant)
}

/// Add a donation to grant `id` and return the updated grant.
pub async fn donate(data: &DataFile, id: u64, amount: f64) -> Result<MicroGrant> {
    let grant = data
        .update(|d| Ok(apply_donation(&mut d.micro_grants, id, amount)?.clone()))
        .await?;
    info!(id, amount, raised = grant.amount_raised, "donation recorded");
    Ok(grant)
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<GrantError>(), Some(GrantError::NotFound(_)))
}

pub fn is_invalid_input(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<GrantError>(),
        Some(GrantError::InvalidInput(_))
    )
}

pub async fn run_list(config: &Config) -> Result<()> {
    let grants = list(&DataFile::from_config(config)).await?;
    if grants.is_empty() {
        println!("No grants.");
        return Ok(());
    }
    for g in &grants {
        println!(
            "{}. {} ({}){}",
            g.id,
            g.title,
            g.requester_name,
            if g.urgent { " [urgent]" } else { "" }
        );
        println!(
            "    raised: ${:.2} of ${:.2} ({:.0}%) from {} supporters",
            g.amount_raised,
            g.amount_needed,
            g.progress(),
            g.supporters
        );
        println!("    {}", g.description);
        println!();
    }
    Ok(())
}

pub async fn run_request(config: &Config, req: GrantRequest) -> Result<()> {
    let grant = request(&DataFile::from_config(config), &req, config.grants.max_amount).await?;
    println!(
        "Created grant {} for ${:.2} ({})",
        grant.id, grant.amount_needed, grant.requester_name
    );
    Ok(())
}

pub async fn run_donate(config: &Config, id: u64, amount: f64) -> Result<()> {
    let grant = donate(&DataFile::from_config(config), id, amount).await?;
    println!(
        "Grant {}: ${:.2} of ${:.2} raised ({:.0}%)",
        grant.id,
        grant.amount_raised,
        grant.amount_needed,
        grant.progress()
    );
    Ok(())
}
