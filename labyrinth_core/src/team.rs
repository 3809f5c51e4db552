//! Runs a team of explorers concurrently over one shared map.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigError, TeamConfig};
use crate::crawler::Crawler;
use crate::explorer::{ExploreOutcome, Explorer};
use crate::inventory::Inventory;
use crate::labyrinth::{Labyrinth, LabyrinthCrawler};
use crate::shared_map::SharedMap;

#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    #[error("No crawlers to launch")]
    NoCrawlers,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to write map export: {0}")]
    Export(#[from] std::io::Error),
}

/// Final state of one explorer. A failed agent never affects its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Finished(ExploreOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReport {
    pub id: usize,
    pub status: AgentStatus,
}

#[derive(Debug)]
pub struct TeamReport {
    pub agents: Vec<AgentReport>,
    map: Arc<SharedMap>,
}

impl TeamReport {
    pub fn map(&self) -> &SharedMap {
        &self.map
    }

    pub fn exits_found(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| matches!(&agent.status, AgentStatus::Finished(outcome) if outcome.found_exit()))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| matches!(agent.status, AgentStatus::Failed(_)))
            .count()
    }

    /// Writes the ASCII export of the merged map to `path`.
    pub fn write_map(&self, path: impl AsRef<Path>) -> Result<(), TeamError> {
        std::fs::write(path.as_ref(), self.map.export_ascii())?;
        info!(path = %path.as_ref().display(), "map exported");
        Ok(())
    }
}

/// Crawlers waiting to be launched together, each with its own bag.
pub struct Team<C> {
    config: TeamConfig,
    map: Arc<SharedMap>,
    members: Vec<(C, Inventory)>,
}

impl<C: Crawler + 'static> Team<C> {
    /// Builds a team of crawlers starting with empty bags.
    pub fn new(crawlers: Vec<C>, config: TeamConfig) -> Result<Self, TeamError> {
        let members = crawlers
            .into_iter()
            .map(|crawler| (crawler, Inventory::new()))
            .collect();
        Self::with_bags(members, config)
    }

    /// Builds a team whose shared map starts at the first crawler's position.
    ///
    /// # Arguments
    ///
    /// * `members`: Each crawler paired with the bag it starts out carrying.
    /// * `config`: Validated before anything else is built.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or an empty member list.
    pub fn with_bags(members: Vec<(C, Inventory)>, config: TeamConfig) -> Result<Self, TeamError> {
        config.validate()?;
        let origin = members.first().ok_or(TeamError::NoCrawlers)?.0.position();
        Ok(Self {
            config,
            map: Arc::new(SharedMap::new(origin)),
            members,
        })
    }

    /// The map the team writes to, readable while the team runs.
    pub fn map(&self) -> Arc<SharedMap> {
        Arc::clone(&self.map)
    }

    /// Launches every explorer on its own task and waits for all of them.
    pub async fn run(self) -> TeamReport {
        info!(
            crawlers = self.members.len(),
            max_actions = self.config.max_actions,
            "starting team"
        );

        let handles: Vec<_> = self
            .members
            .into_iter()
            .enumerate()
            .map(|(id, (crawler, mut bag))| {
                let map = Arc::clone(&self.map);
                let config = self.config.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(config.stagger_for(id)).await;
                    let mut explorer = Explorer::new(id, crawler, map, &config);
                    explorer.get_out(config.max_actions, &mut bag).await
                });
                (id, handle)
            })
            .collect();

        let mut agents = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let status = match handle.await {
                Ok(Ok(outcome)) => AgentStatus::Finished(outcome),
                Ok(Err(err)) => {
                    warn!(explorer = id, error = %err, "explorer failed");
                    AgentStatus::Failed(err.to_string())
                }
                Err(err) => {
                    warn!(explorer = id, error = %err, "explorer task aborted");
                    AgentStatus::Failed(format!("task aborted: {err}"))
                }
            };
            agents.push(AgentReport { id, status });
        }

        let report = TeamReport {
            agents,
            map: self.map,
        };
        info!(
            tiles = report.map.tile_count(),
            exits = report.exits_found(),
            failures = report.failures(),
            "exploration complete"
        );
        report
    }
}

impl Team<LabyrinthCrawler> {
    /// Places `config.crawlers` new crawlers on the labyrinth start.
    pub fn on_labyrinth(labyrinth: &Arc<Labyrinth>, config: TeamConfig) -> Result<Self, TeamError> {
        config.validate()?;
        let crawlers = (0..config.crawlers).map(|_| labyrinth.new_crawler()).collect();
        Self::new(crawlers, config)
    }
}
