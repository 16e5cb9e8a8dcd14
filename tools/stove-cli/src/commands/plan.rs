//! Print render plans.

use std::path::PathBuf;

use stove_batch::run_pipeline;

use super::{find_project, load_manifest, parse_backends};

pub fn run(manifest_path: PathBuf, project: Option<String>, assume_gpu: Vec<String>) -> anyhow::Result<()> {
    let manifest = load_manifest(&manifest_path)?;
    let capabilities = parse_backends(&assume_gpu)?;

    let projects = match &project {
        Some(id) => vec![find_project(&manifest, id)?],
        None => manifest.projects.iter().collect(),
    };

    let mut plans = serde_json::Map::new();
    for project in projects {
        let output = run_pipeline(project, &manifest.config, &capabilities)
            .map_err(|e| anyhow::anyhow!("Project '{}' failed: {e}", project.id))?;
        for warning in &output.plan.warnings {
            eprintln!("[WARN] {}: {}", project.id, warning);
        }
        plans.insert(project.id.clone(), serde_json::to_value(&output.plan)?);
    }

    // A single requested project prints its bare plan.
    let value = match project {
        Some(id) => plans.remove(&id).unwrap_or_default(),
        None => serde_json::Value::Object(plans),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}
