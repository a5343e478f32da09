//! Sequencing of a run: generation of the configuration from subscription
//! sources, then delay and throughput checks of one group against the
//! running engine.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{error, info, warn};
use thiserror::Error;
use tokio::time::{timeout, Instant};

use crate::aggregator::{Aggregator, NodeFilter};
use crate::api::{ApiError, ClashApi, ControlPlane, HttpThroughputProbe, ThroughputProbe};
use crate::cache::{ExclusionCache, SpeedCache};
use crate::config::{ConfigError, ConfigStore};
use crate::models::{ClashConfig, DelayPhase, ProxyTestResult};
use crate::parser::{explode_sources, SourcePayload};
use crate::settings::Settings;
use crate::tester::{HealthTester, PhaseSummary, SpeedTester};

pub const NO_NODES_UPDATED: &str = "no nodes updated";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Control plane unavailable: {0}")]
    ControlPlaneUnavailable(#[source] ApiError),

    #[error("Invalid throughput probe settings: {0}")]
    ThroughputSetup(#[source] ApiError),

    #[error("Cannot persist configuration: {0}")]
    Persistence(#[source] ConfigError),

    #[error("Cannot load configuration: {0}")]
    Load(#[source] ConfigError),
}

/// Stage whose input turned out empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    GroupMembers,
    PrimaryProbe,
    SecondaryProbe,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generate => "generate",
            Stage::GroupMembers => "group members",
            Stage::PrimaryProbe => "primary probe",
            Stage::SecondaryProbe => "secondary probe",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Completed,
    Halted {
        stage: Stage,
    },
}

/// What a check run did to the configuration.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcome: Outcome,
    pub primary: Option<PhaseSummary>,
    pub secondary: Option<PhaseSummary>,
    /// Surviving node names after renaming, lowest delay first
    pub kept: Vec<String>,
    /// Old name to new name, only for names that changed
    pub renamed: HashMap<String, String>,
}

impl RunReport {
    fn halt(mut self, stage: Stage) -> Self {
        self.outcome = Outcome::Halted { stage };
        self
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

fn valid_names(results: &[ProxyTestResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| r.name.clone())
        .collect()
}

/// Owns the caches and the configuration store of one run
///
/// Both caches are loaded from the paths in [`Settings`] when the pipeline is
/// created and are saved at the end of [`Pipeline::generate`] and of every
/// check, whatever the outcome.
pub struct Pipeline {
    settings: Settings,
    filter: NodeFilter,
    exclusions: ExclusionCache,
    speeds: SpeedCache,
    store: ConfigStore,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let exclusions = ExclusionCache::load(&settings.exclusion_cache);
        let speeds = SpeedCache::load(&settings.speed_cache);
        Self::with_caches(settings, exclusions, speeds)
    }

    pub fn with_caches(settings: Settings, exclusions: ExclusionCache, speeds: SpeedCache) -> Self {
        Self {
            filter: settings.filter.node_filter(),
            store: ConfigStore::new(&settings.config_file),
            settings,
            exclusions,
            speeds,
        }
    }

    /// Replaces the filter built from the settings, e.g. to attach a GeoIP
    /// lookup.
    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn exclusions(&self) -> &ExclusionCache {
        &self.exclusions
    }

    pub fn speeds(&self) -> &SpeedCache {
        &self.speeds
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Node cap after probing; zero means no cap.
    fn limit(&self) -> usize {
        match self.settings.limit {
            0 => usize::MAX,
            limit => limit,
        }
    }

    fn save_exclusions(&self) {
        if let Err(e) = self.exclusions.save() {
            error!("Failed to save exclusion cache: {}", e);
        }
    }

    fn save_caches(&self) {
        self.save_exclusions();
        if let Err(e) = self.speeds.save() {
            error!("Failed to save speed cache: {}", e);
        }
    }

    /// Builds the configuration from `baseline` and the decoded `sources`
    /// and persists it
    ///
    /// Accepted nodes are listed in every group after the entry selector.
    /// When no node is accepted nothing is written and `baseline` is
    /// returned unchanged.
    pub fn generate(
        &self,
        mut baseline: ClashConfig,
        sources: Vec<SourcePayload>,
    ) -> Result<ClashConfig, PipelineError> {
        let nodes = explode_sources(sources, &self.settings.filter.allowed_types);
        let nodes = Aggregator::new(&self.filter, &self.exclusions).aggregate(nodes);

        let result = if nodes.is_empty() {
            warn!("No usable nodes found, {}", NO_NODES_UPDATED);
            Ok(baseline)
        } else {
            info!("Writing {} nodes", nodes.len());
            baseline.assign_nodes(nodes);
            self.store
                .save(&baseline)
                .map(|_| baseline)
                .map_err(PipelineError::Persistence)
        };
        self.save_exclusions();
        result
    }

    /// Group probed by the check: the configured one, else the first group
    /// after the entry selector.
    pub fn test_group(&self, config: &ClashConfig) -> Option<String> {
        match &self.settings.test_group {
            Some(group) => Some(group.clone()),
            None => config.group_names().get(1).map(|name| name.to_string()),
        }
    }

    /// Points the selector group at `DIRECT` so probing traffic does not
    /// depend on a previous selection. Failure only warns.
    async fn route_direct<C: ControlPlane>(&self, api: &C) {
        let group = &self.settings.api.selector_group;
        match timeout(self.settings.api.timeout(), api.switch_route(group, "DIRECT")).await {
            Ok(Ok(())) => info!("Switched `{}` to DIRECT", group),
            Ok(Err(e)) => warn!("Cannot switch `{}` to DIRECT: {}", group, e),
            Err(_) => warn!("Switching `{}` to DIRECT timed out", group),
        }
    }

    /// Runs every check stage over `config` in memory
    ///
    /// An empty stage input halts the run and leaves `config` untouched.
    pub async fn check_config<C, T>(&self, config: &mut ClashConfig, api: &C, probe: &T) -> RunReport
    where
        C: ControlPlane,
        T: ThroughputProbe,
    {
        let mut report = RunReport::default();
        let Some(group) = self.test_group(config) else {
            warn!("No proxy group to test");
            return report.halt(Stage::GroupMembers);
        };
        let members: Vec<String> = {
            let nodes = config.node_names();
            config
                .group_proxies(&group)
                .into_iter()
                .filter(|name| nodes.contains(name.as_str()))
                .collect()
        };
        if members.is_empty() {
            warn!("Group `{}` has no nodes", group);
            return report.halt(Stage::GroupMembers);
        }
        info!("Testing {} nodes of group `{}`", members.len(), group);

        self.route_direct(api).await;

        let limit = self.limit();
        let tester = HealthTester::new(api, &self.exclusions, &self.settings.health);

        let primary = tester.probe_batch(&members, DelayPhase::Primary).await;
        let summary = PhaseSummary::new(DelayPhase::Primary, &primary, limit);
        summary.log(&group);
        report.primary = Some(summary);
        let survivors = valid_names(&primary);
        if survivors.is_empty() {
            warn!("No node passed the primary test, stopping");
            return report.halt(Stage::PrimaryProbe);
        }

        let secondary = tester.probe_batch(&survivors, DelayPhase::Secondary).await;
        let summary = PhaseSummary::new(DelayPhase::Secondary, &secondary, limit);
        summary.log(&group);
        report.secondary = Some(summary);
        let mut passed: Vec<&ProxyTestResult> = secondary.iter().filter(|r| r.is_valid()).collect();
        if passed.is_empty() {
            warn!("No node passed the secondary test, stopping");
            return report.halt(Stage::SecondaryProbe);
        }

        passed.sort_by(|a, b| a.average_delay().total_cmp(&b.average_delay()));
        let ranked: Vec<String> = passed.iter().map(|r| r.name.clone()).collect();
        let removed = config.retain_nodes(&ranked.iter().cloned().collect());
        config.set_group_proxies(&group, ranked.clone());

        let kept: Vec<String> = ranked.into_iter().take(limit).collect();
        let over_limit = config.retain_nodes(&kept.iter().cloned().collect::<HashSet<_>>());
        info!(
            "Removed {} invalid nodes and {} over the limit, keeping {}",
            removed,
            over_limit,
            kept.len()
        );

        if !self.settings.speed.enabled {
            report.kept = kept;
            return report;
        }

        let speed = SpeedTester::new(api, probe, &self.exclusions, &self.speeds, &self.settings);
        let speeds = speed.measure_batch(&kept).await;
        let nodes: Vec<String> = config.proxies.iter().map(|p| p.name.clone()).collect();
        let mapping = speeds.rename_mapping(&nodes, self.settings.speed.min_speed, limit);
        config.rename_nodes(&mapping);
        report.kept = kept
            .iter()
            .map(|name| mapping.get(name).unwrap_or(name).clone())
            .collect();
        report.renamed = mapping.into_iter().filter(|(old, new)| old != new).collect();
        report
    }

    fn load(&self) -> Result<ClashConfig, PipelineError> {
        info!("Loading configuration {}", self.store.yaml_path().display());
        self.store.load().map_err(PipelineError::Load)
    }

    async fn check_loaded<C, T>(&self, mut config: ClashConfig, api: &C, probe: &T) -> Result<RunReport, PipelineError>
    where
        C: ControlPlane,
        T: ThroughputProbe,
    {
        let started = Instant::now();
        let report = self.check_config(&mut config, api, probe).await;
        let result = match report.outcome {
            Outcome::Completed => self.store.save(&config).map_err(PipelineError::Persistence),
            Outcome::Halted { stage } => {
                warn!("Run halted at {}, {}", stage, NO_NODES_UPDATED);
                Ok(())
            }
        };
        self.save_caches();
        info!("Total time: {:.2}s", started.elapsed().as_secs_f64());
        result.map(|_| report)
    }

    /// Loads the stored configuration, checks it against the given engine
    /// clients and persists the result together with both caches.
    pub async fn check_with<C, T>(&self, api: &C, probe: &T) -> Result<RunReport, PipelineError>
    where
        C: ControlPlane,
        T: ThroughputProbe,
    {
        let config = self.load()?;
        self.check_loaded(config, api, probe).await
    }

    /// [`Pipeline::check_with`] against the engine described by the settings
    ///
    /// The first configured API port answering `/version` is used.
    pub async fn check(&self) -> Result<RunReport, PipelineError> {
        let config = self.load()?;
        let speed = &self.settings.speed;
        let probe = HttpThroughputProbe::new(speed.url.clone(), &speed.proxy, speed.window())
            .map_err(PipelineError::ThroughputSetup)?;
        let api_settings = &self.settings.api;
        let api = ClashApi::connect(
            &api_settings.host,
            &api_settings.ports,
            &api_settings.secret,
            api_settings.timeout(),
        )
        .await
        .map_err(PipelineError::ControlPlaneUnavailable)?;
        self.check_loaded(config, &api, &probe).await
    }
}
