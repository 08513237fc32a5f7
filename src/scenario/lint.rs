//! Visibility-pair checking
//!
//! An RBAC surface is only verified when both directions are encoded: the
//! affordance exists for an actor holding the capability, and is absent
//! for an actor lacking it. One suite runs one actor, so a capability is
//! only ever checkable in one direction per suite; the pair completes
//! across the set of role suites handed to a single invocation. Suites
//! declare the pairing explicitly by tagging assertions with capability
//! tokens; nothing is inferred.

use std::collections::BTreeSet;

use crate::common::{Error, Result};

use super::{Step, Suite};

/// Capability tokens asserted in only one direction across the suite set
///
/// Returned sorted so reports are stable.
pub fn unpaired_capabilities(suites: &[Suite]) -> Vec<String> {
    let mut positive = BTreeSet::new();
    let mut negative = BTreeSet::new();

    for suite in suites {
        for scenario in &suite.scenarios {
            for step in &scenario.steps {
                match step {
                    Step::AssertExists {
                        capability: Some(token),
                        ..
                    } => {
                        positive.insert(token.clone());
                    }
                    Step::AssertAbsent {
                        capability: Some(token),
                        ..
                    } => {
                        negative.insert(token.clone());
                    }
                    _ => {}
                }
            }
        }
    }

    positive
        .symmetric_difference(&negative)
        .cloned()
        .collect()
}

/// Reject a suite set in which any capability token lacks its counterpart
pub fn check_visibility_pairs(suites: &[Suite]) -> Result<()> {
    match unpaired_capabilities(suites).into_iter().next() {
        Some(capability) => Err(Error::UnpairedCapability { capability }),
        None => Ok(()),
    }
}
