use crate::persistence::{FactoryConfig, DEFAULT_MAX_PENDING_CHANGE_LISTS};
use crate::settings::SettingsProvider;
use crate::tree::{ChildThresholds, TreeLimits};
use std::convert::TryFrom;
use std::str::FromStr;
use tokio::time::Duration;

pub const MAX_NODE_NAME_LENGTH: &str = "Limits.MaxNodeNameLength";
pub const MAX_NODE_PATH_LENGTH: &str = "Limits.MaxNodePathLength";
pub const MAX_NODE_DATA_SIZE: &str = "Limits.MaxNodeDataSize";
pub const MAX_GET_CHILDREN_ENUMERATION_COUNT: &str = "Limits.MaxGetChildrenEnumerationCount";
pub const MIN_SORTED_CHILDREN_THRESHOLD: &str = "Tree.MinSortedChildrenThreshold";
pub const MAX_SORTED_CHILDREN_THRESHOLD: &str = "Tree.MaxSortedChildrenThreshold";
pub const REQUEST_TIMEOUT_MS: &str = "Backend.RequestTimeoutMs";
pub const IN_MEMORY_PERSISTENCE: &str = "Persistence.InMemory";
pub const MAX_PENDING_CHANGE_LISTS: &str = "Persistence.MaxPendingChangeLists";

#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    pub max_node_name_length: Option<usize>,
    pub max_node_path_length: Option<usize>,
    pub max_node_data_size: Option<usize>,
    pub max_get_children_enumeration_count: Option<usize>,
    pub min_sorted_children_threshold: Option<usize>,
    pub max_sorted_children_threshold: Option<usize>,
    pub request_timeout: Option<Duration>,
    pub in_memory_persistence: Option<bool>,
    pub max_pending_change_lists: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("setting '{name}' has an unparseable value '{value}'")]
    Unparseable { name: &'static str, value: String },
    #[error("illegal backend options: {0}")]
    Illegal(&'static str),
}

fn parse<T: FromStr>(settings: &dyn SettingsProvider, name: &'static str) -> Result<Option<T>, OptionsError> {
    match settings.get_setting(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OptionsError::Unparseable { name, value }),
    }
}

impl BackendOptions {
    pub fn from_settings(settings: &dyn SettingsProvider) -> Result<Self, OptionsError> {
        Ok(BackendOptions {
            max_node_name_length: parse(settings, MAX_NODE_NAME_LENGTH)?,
            max_node_path_length: parse(settings, MAX_NODE_PATH_LENGTH)?,
            max_node_data_size: parse(settings, MAX_NODE_DATA_SIZE)?,
            max_get_children_enumeration_count: parse(settings, MAX_GET_CHILDREN_ENUMERATION_COUNT)?,
            min_sorted_children_threshold: parse(settings, MIN_SORTED_CHILDREN_THRESHOLD)?,
            max_sorted_children_threshold: parse(settings, MAX_SORTED_CHILDREN_THRESHOLD)?,
            request_timeout: parse::<u64>(settings, REQUEST_TIMEOUT_MS)?.map(Duration::from_millis),
            in_memory_persistence: parse(settings, IN_MEMORY_PERSISTENCE)?,
            max_pending_change_lists: parse(settings, MAX_PENDING_CHANGE_LISTS)?,
        })
    }

    /// Store configuration carrying the persistence settings of these options.
    pub fn factory_config(&self, name: &str, logger: slog::Logger) -> Result<FactoryConfig, OptionsError> {
        let validated = BackendOptionsValidated::try_from(self.clone())?;
        let mut config = FactoryConfig::new(name, logger);
        config.max_pending_change_lists = validated.max_pending_change_lists;
        Ok(config)
    }
}

#[derive(Debug)]
pub(crate) struct BackendOptionsValidated {
    pub limits: TreeLimits,
    pub request_timeout: Duration,
    pub max_pending_change_lists: usize,
}

impl BackendOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        let thresholds = self.limits.child_thresholds;
        if thresholds.min >= thresholds.max {
            return Err("Minimum sorted children threshold must be less than the maximum");
        }
        if self.request_timeout == Duration::ZERO {
            return Err("Request timeout must be positive");
        }
        if self.max_pending_change_lists == 0 {
            return Err("At least one pending change-list must be allowed");
        }

        Ok(())
    }
}

impl TryFrom<BackendOptions> for BackendOptionsValidated {
    type Error = OptionsError;

    fn try_from(options: BackendOptions) -> Result<Self, Self::Error> {
        let defaults = TreeLimits::default();
        let default_thresholds = ChildThresholds::default();
        let values = BackendOptionsValidated {
            limits: TreeLimits {
                max_node_name_length: options.max_node_name_length.unwrap_or(defaults.max_node_name_length),
                max_node_path_length: options.max_node_path_length.unwrap_or(defaults.max_node_path_length),
                max_node_data_size: options.max_node_data_size.unwrap_or(defaults.max_node_data_size),
                max_get_children_enumeration_count: options
                    .max_get_children_enumeration_count
                    .unwrap_or(defaults.max_get_children_enumeration_count),
                child_thresholds: ChildThresholds {
                    min: options.min_sorted_children_threshold.unwrap_or(default_thresholds.min),
                    max: options.max_sorted_children_threshold.unwrap_or(default_thresholds.max),
                },
            },
            request_timeout: options.request_timeout.unwrap_or(Duration::from_secs(30)),
            max_pending_change_lists: options
                .max_pending_change_lists
                .unwrap_or(DEFAULT_MAX_PENDING_CHANGE_LISTS),
        };
        if options.in_memory_persistence == Some(false) {
            return Err(OptionsError::Illegal("Only in-memory persistence is available"));
        }

        values.validate().map_err(OptionsError::Illegal)?;
        Ok(values)
    }
}
