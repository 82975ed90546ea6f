//! Boot-time provisioning supervisor
//!
//! Runs exactly once at startup: decides the vector store (reuse or seed),
//! reconciles the canonical agent definitions against the remote service,
//! and fires the readiness latch. Failures are logged and degrade the
//! published context; they never prevent the latch from firing.

use crate::context::{ProvisionContext, ProvisionPublisher};
use crate::definitions::canonical_definitions;
use crate::state_store::{StateStore, VECTOR_STORE_KEY};
use slated_agent::AgentApi;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const VECTOR_STORE_NAME: &str = "seed-data";
const VECTOR_STORE_READY_WAIT: Duration = Duration::from_secs(120);
const SEED_EXTENSIONS: [&str; 3] = ["md", "pdf", "txt"];

/// Inputs the supervisor needs from the process configuration
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub model_deployment_name: String,
    pub seed_data_dir: std::path::PathBuf,
}

/// Run provisioning to completion and fire the readiness latch
pub async fn provision(
    api: Arc<dyn AgentApi>,
    state: Arc<dyn StateStore>,
    settings: ProvisionSettings,
    publisher: ProvisionPublisher,
) {
    info!("Provisioning agent service resources");

    let vector_store_id = decide_vector_store(&*api, &*state, &settings.seed_data_dir).await;
    let agent_ids =
        reconcile_agents(&*api, &settings.model_deployment_name, vector_store_id.as_deref()).await;

    info!(
        "Provisioning complete ({} agents, vector store: {})",
        agent_ids.len(),
        vector_store_id.as_deref().unwrap_or("none")
    );

    publisher.publish(ProvisionContext {
        vector_store_id,
        agent_ids,
    });
}

/// Reuse the stored vector store, or build one from the seed directory
async fn decide_vector_store(
    api: &dyn AgentApi,
    state: &dyn StateStore,
    seed_dir: &Path,
) -> Option<String> {
    match state.get(VECTOR_STORE_KEY).await {
        Ok(Some(id)) => {
            info!("Reusing vector store {} from state", id);
            match api.wait_vector_store_ready(&id, VECTOR_STORE_READY_WAIT).await {
                Ok(()) => return Some(id),
                Err(e) => {
                    warn!("Stored vector store {} is not usable: {}", id, e);
                    return None;
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!("State store read failed: {}", e),
    }

    let seed_files = match scan_seed_files(seed_dir).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Could not scan seed directory {}: {}", seed_dir.display(), e);
            Vec::new()
        }
    };

    if seed_files.is_empty() {
        info!("No seed files found, file research unavailable");
        return None;
    }

    let mut file_ids = Vec::new();
    for path in &seed_files {
        match api.upload_file(path).await {
            Ok(id) => file_ids.push(id),
            Err(e) => warn!("Upload of {} failed: {}", path.display(), e),
        }
    }
    if file_ids.is_empty() {
        warn!("All seed uploads failed, file research unavailable");
        return None;
    }

    let store_id = match api.create_vector_store(VECTOR_STORE_NAME, &file_ids).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Vector store creation failed: {}", e);
            return None;
        }
    };

    if let Err(e) = api
        .wait_vector_store_ready(&store_id, VECTOR_STORE_READY_WAIT)
        .await
    {
        warn!("Vector store {} did not become ready: {}", store_id, e);
        return None;
    }

    if let Err(e) = state.set(VECTOR_STORE_KEY, &store_id).await {
        warn!("Could not persist vector store id: {}", e);
    }

    info!(
        "Created vector store {} from {} seed files",
        store_id,
        file_ids.len()
    );
    Some(store_id)
}

async fn scan_seed_files(dir: &Path) -> slated_core::Result<Vec<std::path::PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SEED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Update each canonical agent if it exists, create it otherwise
async fn reconcile_agents(
    api: &dyn AgentApi,
    model: &str,
    vector_store_id: Option<&str>,
) -> HashMap<String, String> {
    let existing = match api.list_agents_by_name().await {
        Ok(map) => map,
        Err(e) => {
            warn!("Agent listing failed, assuming none exist: {}", e);
            HashMap::new()
        }
    };

    let mut agent_ids = HashMap::new();
    for def in canonical_definitions(model, vector_store_id) {
        match existing.get(&def.name.to_lowercase()) {
            Some(id) => {
                if let Err(e) = api.update_agent(id, &def).await {
                    warn!("Update of agent {} failed: {}", def.name, e);
                }
                agent_ids.insert(def.name.clone(), id.clone());
            }
            None => match api.create_agent(&def).await {
                Ok(id) => {
                    info!("Created agent {} ({})", def.name, id);
                    agent_ids.insert(def.name.clone(), id);
                }
                Err(e) => warn!("Creation of agent {} failed: {}", def.name, e),
            },
        }
    }
    agent_ids
}
