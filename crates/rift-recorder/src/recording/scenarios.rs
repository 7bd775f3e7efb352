//! Handling of repeated requests within one recording.

use crate::naming::{make_safe_name, url_path};
use crate::stub::{RequestPattern, StubArtifact};
use std::collections::HashMap;
use tracing::debug;

/// State every scenario starts in.
pub const STARTED_STATE: &str = "Started";

/// Resolve stubs that share a request pattern.
///
/// With `repeats_as_scenarios`, each group of two or more becomes a scenario
/// that replays the responses in capture order. Otherwise only the first stub
/// of each group is kept. Stubs stay in capture order either way.
pub fn process_scenarios(stubs: Vec<StubArtifact>, repeats_as_scenarios: bool) -> Vec<StubArtifact> {
    let mut group_index: HashMap<RequestPattern, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (position, stub) in stubs.iter().enumerate() {
        let next = groups.len();
        let group = *group_index.entry(stub.request.clone()).or_insert(next);
        if group == next {
            groups.push(Vec::new());
        }
        groups[group].push(position);
    }

    if !repeats_as_scenarios {
        let mut keep = vec![false; stubs.len()];
        for members in &groups {
            keep[members[0]] = true;
        }
        let before = stubs.len();
        let kept: Vec<StubArtifact> = stubs
            .into_iter()
            .zip(keep)
            .filter_map(|(stub, keep)| keep.then_some(stub))
            .collect();
        if kept.len() < before {
            debug!("Dropped {} repeated requests", before - kept.len());
        }
        return kept;
    }

    let mut stubs = stubs;
    let mut scenario_count = 0;
    for members in groups.iter().filter(|m| m.len() > 1) {
        scenario_count += 1;
        let name = scenario_name(scenario_count, &stubs[members[0]].request);
        debug!("Chaining {} stubs into scenario {}", members.len(), name);

        for (step, &position) in members.iter().enumerate() {
            let step = step + 1;
            let stub = &mut stubs[position];
            stub.scenario_name = Some(name.clone());
            stub.required_scenario_state = Some(if step == 1 {
                STARTED_STATE.to_string()
            } else {
                format!("{name}-{step}")
            });
            stub.new_scenario_state = (step < members.len()).then(|| format!("{name}-{}", step + 1));
        }
    }
    stubs
}

/// `scenario-<n>-<path segments>`, e.g. `scenario-1-api-users`.
fn scenario_name(index: usize, pattern: &RequestPattern) -> String {
    let path = url_path(pattern.url_matcher.expected().unwrap_or_default());
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let slug = make_safe_name(&parts.join("-"));
    if slug.is_empty() {
        format!("scenario-{index}-root")
    } else {
        format!("scenario-{index}-{slug}")
    }
}
