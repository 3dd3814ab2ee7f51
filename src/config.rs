use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::annotate::{ApproachSettings, PlacementAnnotator};
use crate::collision::CollisionChecker;
use crate::pipeline::PlanningPipeline;
use crate::planner::PlannerConfig;

/// Complete service configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planning: PlanningConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planning: PlanningConfig::from_env(),
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "STACK_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "STACK_IT_NOW_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => parse_port(&raw).unwrap_or_else(|reason| {
                warn!(
                    "{} ('{}') {}. Using {}.",
                    Self::PORT_VAR,
                    raw,
                    reason,
                    Self::DEFAULT_PORT
                );
                Self::DEFAULT_PORT
            }),
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether the server binds to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Service-wide planning defaults.
#[derive(Clone, Debug)]
pub struct PlanningConfig {
    planner: PlannerConfig,
    clearance: f64,
    approach: ApproachSettings,
    check_approach: bool,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            clearance: CollisionChecker::DEFAULT_CLEARANCE,
            approach: ApproachSettings::default(),
            check_approach: Self::DEFAULT_CHECK_APPROACH,
        }
    }
}

impl PlanningConfig {
    const DEFAULT_CHECK_APPROACH: bool = true;

    const TOLERANCE_VAR: &'static str = "STACK_IT_NOW_PLANNER_TOLERANCE";
    const MAX_DEPTH_VAR: &'static str = "STACK_IT_NOW_PLANNER_MAX_DEPTH";
    const MAX_BOXES_VAR: &'static str = "STACK_IT_NOW_PLANNER_MAX_BOXES";
    const CLEARANCE_VAR: &'static str = "STACK_IT_NOW_COLLISION_CLEARANCE";
    const APPROACH_DISTANCE_VAR: &'static str = "STACK_IT_NOW_APPROACH_DISTANCE";
    const LABEL_OFFSET_VAR: &'static str = "STACK_IT_NOW_LABEL_OFFSET";
    const CHECK_APPROACH_VAR: &'static str = "STACK_IT_NOW_CHECK_APPROACH";

    fn from_env() -> Self {
        let tolerance = load_f64_with_warning(
            Self::TOLERANCE_VAR,
            PlannerConfig::DEFAULT_TOLERANCE,
            |value| value > 0.0 && value < 1.0,
            "must be between 0 and 1 (exclusive)",
            "Adjusted planner tolerance changes which boxes count as fitting",
        );

        let max_depth = env_string(Self::MAX_DEPTH_VAR).map_or(
            PlannerConfig::DEFAULT_MAX_DEPTH,
            |raw| parse_positive_setting(&raw, Self::MAX_DEPTH_VAR, PlannerConfig::DEFAULT_MAX_DEPTH),
        );
        let max_boxes = env_string(Self::MAX_BOXES_VAR).map_or(
            PlannerConfig::DEFAULT_MAX_BOXES,
            |raw| parse_positive_setting(&raw, Self::MAX_BOXES_VAR, PlannerConfig::DEFAULT_MAX_BOXES),
        );

        let clearance = load_f64_with_warning(
            Self::CLEARANCE_VAR,
            CollisionChecker::DEFAULT_CLEARANCE,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted clearance hides or reveals marginal contacts",
        );

        let distance = load_f64_with_warning(
            Self::APPROACH_DISTANCE_VAR,
            ApproachSettings::DEFAULT_DISTANCE,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted default approach distance",
        );

        let label_offset = load_f64_with_warning(
            Self::LABEL_OFFSET_VAR,
            ApproachSettings::DEFAULT_LABEL_OFFSET,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted default label offset",
        );

        let check_approach = env_string(Self::CHECK_APPROACH_VAR)
            .and_then(|raw| parse_bool(&raw, Self::CHECK_APPROACH_VAR))
            .unwrap_or(Self::DEFAULT_CHECK_APPROACH);

        Self {
            planner: PlannerConfig::builder()
                .tolerance(tolerance)
                .max_depth(max_depth)
                .max_boxes(max_boxes)
                .build(),
            clearance,
            approach: ApproachSettings {
                direction: None,
                distance,
                label_offset,
            },
            check_approach,
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        self.planner
    }

    pub fn approach(&self) -> ApproachSettings {
        self.approach
    }

    pub fn check_approach(&self) -> bool {
        self.check_approach
    }

    /// Builds the planning pipeline with these defaults.
    pub fn pipeline(&self) -> PlanningPipeline {
        let annotator = PlacementAnnotator::new(self.approach).unwrap_or_else(|err| {
            warn!("Invalid approach defaults ({err}). Using built-in values.");
            PlacementAnnotator::default()
        });
        PlanningPipeline::new(
            self.planner,
            CollisionChecker::new(self.clearance),
            annotator,
            self.check_approach,
        )
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    match raw.parse::<u16>() {
        Ok(0) => Err("must not be 0".to_string()),
        Ok(value) => Ok(value),
        Err(err) => Err(format!("could not be parsed: {err}")),
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

/// Parses a positive integer setting, falling back to `default` on invalid input.
fn parse_positive_setting<T>(raw: &str, var_name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display + Copy,
{
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(
                "{} contains invalid value '{}': must be a positive integer. Using {}.",
                var_name, raw, default
            );
            default
        }
    }
}

/// Parses a numeric setting, falling back to `default` on invalid input.
fn parse_f64_setting(
    raw: &str,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && validator(value) => value,
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    let Some(raw) = env_string(var_name) else {
        return default;
    };
    let value = parse_f64_setting(&raw, var_name, default, validator, invalid_hint);
    let tolerance = default.abs().max(1.0) * 1e-9;
    if (value - default).abs() > tolerance {
        info!("{} ({} = {}).", notice, var_name, value);
    }
    value
}
