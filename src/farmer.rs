//! A farmer runs its profiles one after another, either a fixed number of
//! times or until a wall-clock deadline passes.

use crate::config::{schema, ConfigNode, ConfigTree};
use crate::context::RuntimeContext;
use crate::error::{FloodError, Result};
use crate::pipeline::{run_profile, RunSummary};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a farmer keeps sweeping over its profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FarmerLimit {
    Count(u64),
    /// Checked before each sweep; a sweep in progress always completes.
    Time(Duration),
}

impl FarmerLimit {
    fn from_node(farmer: &ConfigNode) -> Result<Self> {
        if let Some(seconds) = farmer.parse_child::<f64>(schema::FARMER_TIME)? {
            let invalid = || {
                FloodError::invalid(
                    format!("<{}>/<{}>", schema::FARMER, schema::FARMER_TIME),
                    seconds.to_string(),
                )
            };
            let duration = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
            // the deadline must be representable as an Instant
            Instant::now().checked_add(duration).ok_or_else(invalid)?;
            return Ok(FarmerLimit::Time(duration));
        }
        Ok(FarmerLimit::Count(
            farmer.parse_child::<u64>(schema::FARMER_COUNT)?.unwrap_or(1),
        ))
    }
}

/// Run the farmer named `farmer_name` and total its profile runs.
pub fn run_farmer(ctx: &RuntimeContext, config: &ConfigTree, farmer_name: &str) -> Result<RunSummary> {
    info!("Running farmer '{}'", farmer_name);

    let farmer = config
        .find_root()
        .find_child_matching(schema::FARMER, schema::NAME, farmer_name)
        .ok_or_else(|| {
            FloodError::missing(schema::FARMER, format!("no farmer named '{}'", farmer_name))
        })?;

    let limit = FarmerLimit::from_node(farmer)?;
    let profiles: Vec<&str> = farmer
        .children_named(schema::FARMER_USEPROFILE)
        .map(ConfigNode::text)
        .collect();
    if profiles.is_empty() {
        return Err(FloodError::Config(format!(
            "farmer '{}' has no <{}> elements to run",
            farmer_name,
            schema::FARMER_USEPROFILE
        )));
    }

    let mut total = RunSummary::default();
    let sweep = |total: &mut RunSummary| -> Result<()> {
        for profile in &profiles {
            *total += run_profile(ctx, config, profile)?;
        }
        Ok(())
    };

    match limit {
        FarmerLimit::Count(count) => {
            for round in 0..count {
                debug!("Farmer '{}' sweep {} of {}", farmer_name, round + 1, count);
                sweep(&mut total)?;
            }
        }
        FarmerLimit::Time(duration) => {
            match Instant::now().checked_add(duration) {
                Some(deadline) => {
                    while Instant::now() < deadline {
                        sweep(&mut total)?;
                    }
                }
                None => loop {
                    sweep(&mut total)?;
                },
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputSink;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(OutputSink::memory().0).unwrap()
    }

    #[test]
    fn test_limit_defaults_to_one_sweep() {
        let farmer = ConfigNode::new("farmer");
        assert_eq!(FarmerLimit::from_node(&farmer).unwrap(), FarmerLimit::Count(1));

        let timed = ConfigNode::new("farmer")
            .with_child(ConfigNode::new("count").with_text("4"))
            .with_child(ConfigNode::new("time").with_text("1.5"));
        assert_eq!(
            FarmerLimit::from_node(&timed).unwrap(),
            FarmerLimit::Time(Duration::from_millis(1500))
        );

        let bad = ConfigNode::new("farmer").with_child(ConfigNode::new("count").with_text("lots"));
        assert!(matches!(
            FarmerLimit::from_node(&bad),
            Err(FloodError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_out_of_range_time_is_invalid() {
        for text in ["1e30", "-2", "NaN", "inf"] {
            let farmer = ConfigNode::new("farmer").with_child(ConfigNode::new("time").with_text(text));
            assert!(
                matches!(FarmerLimit::from_node(&farmer), Err(FloodError::InvalidValue { .. })),
                "time {} should be rejected",
                text
            );
        }

        let zero = ConfigNode::new("farmer").with_child(ConfigNode::new("time").with_text("0"));
        assert_eq!(FarmerLimit::from_node(&zero).unwrap(), FarmerLimit::Time(Duration::ZERO));
    }

    #[test]
    fn test_farmer_needs_profiles() {
        let config = ConfigTree::parse("<flood><farmer><name>Joe</name></farmer></flood>").unwrap();
        assert!(matches!(
            run_farmer(&ctx(), &config, "Joe"),
            Err(FloodError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_farmer() {
        let config = ConfigTree::parse("<flood/>").unwrap();
        assert!(matches!(
            run_farmer(&ctx(), &config, "Nobody"),
            Err(FloodError::MissingNode { .. })
        ));
    }

    #[test]
    fn test_profile_errors_stop_the_farmer() {
        let config = ConfigTree::parse(
            "<flood><farmer><name>Joe</name><count>3</count><useprofile>Ghost</useprofile></farmer></flood>",
        )
        .unwrap();
        assert!(matches!(
            run_farmer(&ctx(), &config, "Joe"),
            Err(FloodError::MissingNode { .. })
        ));
    }
}
