//! Configuration for Switchboard
//!
//! CLI arguments and environment variable handling using clap.
//! Every flag can be supplied through the environment (and a `.env` file).

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::launcher::LauncherConfig;

/// How rooms get their agents
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rooms are queued and generic workers pull them from `/assign`
    Pool,
    /// Each room start launches a dedicated task on the compute backend
    Direct,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Direct => "direct",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public IP assignment for launched tasks
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignPublicIp {
    Enabled,
    Disabled,
}

impl AssignPublicIp {
    /// Wire value expected by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Switchboard - assigns voice agents to rooms
#[derive(Parser, Debug, Clone)]
#[command(name = "switchboard")]
#[command(about = "Room-to-agent assignment controller")]
#[command(version)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Operating mode: queue rooms for pooled workers, or launch one task per room
    #[arg(long, env = "MODE", value_enum, ignore_case = true, default_value = "pool")]
    pub mode: Mode,

    /// Real-time platform URL handed to agents
    #[arg(long, env = "LIVEKIT_URL")]
    pub livekit_url: Option<String>,

    /// API key used as the credential issuer
    #[arg(long, env = "LIVEKIT_API_KEY")]
    pub livekit_api_key: Option<String>,

    /// API secret used to sign join credentials
    #[arg(long, env = "LIVEKIT_API_SECRET", hide_env_values = true)]
    pub livekit_api_secret: Option<String>,

    /// Lifetime of minted join credentials
    #[arg(long, env = "CONTROLLER_TOKEN_TTL_SECONDS", default_value = "900")]
    pub token_ttl_seconds: u64,

    /// How long `/assign` waits for work before answering 204
    #[arg(long, env = "ASSIGN_TIMEOUT_MS", default_value = "25000")]
    pub assign_timeout_ms: u64,

    /// How often `/assign` re-checks the queue while waiting
    #[arg(long, env = "ASSIGN_POLL_INTERVAL_MS", default_value = "500")]
    pub assign_poll_interval_ms: u64,

    /// Drop claims older than this many seconds (0 keeps claims until the room ends)
    #[arg(long, env = "CLAIM_TTL_SECONDS", default_value = "0")]
    pub claim_ttl_seconds: u64,

    /// Compute backend configuration
    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Compute backend (container orchestrator) configuration
#[derive(Parser, Debug, Clone)]
pub struct BackendArgs {
    /// Backend region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// Explicit backend endpoint (defaults to the regional ECS endpoint)
    #[arg(long, env = "ECS_ENDPOINT")]
    pub ecs_endpoint: Option<String>,

    /// Cluster that runs agent tasks
    #[arg(long, env = "ECS_CLUSTER", default_value = "lk-agents")]
    pub ecs_cluster: String,

    /// Task definition for agent tasks
    #[arg(long, env = "AGENT_TASK_DEF", default_value = "lk-agent:1")]
    pub agent_task_def: String,

    /// Container inside the task definition that receives the overrides
    #[arg(long, env = "AGENT_CONTAINER", default_value = "agent")]
    pub agent_container: String,

    /// Comma-separated subnet ids
    #[arg(long, env = "SUBNETS_CSV", default_value = "")]
    pub subnets_csv: String,

    /// Comma-separated security group ids
    #[arg(long, env = "SECGRPS_CSV", default_value = "")]
    pub secgrps_csv: String,

    /// Capacity provider for launched tasks
    #[arg(long, env = "CAPACITY_PROVIDER", default_value = "FARGATE_SPOT")]
    pub capacity_provider: String,

    /// Public IP assignment for launched tasks
    #[arg(long, env = "PUBLIC_IP", value_enum, ignore_case = true, default_value = "enabled")]
    pub public_ip: AssignPublicIp,

    /// Wait up to this many seconds for a launched task to report RUNNING (0 = don't wait)
    #[arg(long, env = "WAIT_FOR_RUNNING_S", default_value = "0")]
    pub wait_for_running_s: u64,

    /// Speech-to-text key forwarded to launched agents
    #[arg(long, env = "DEEPGRAM_API_KEY", hide_env_values = true)]
    pub deepgram_api_key: Option<String>,

    /// Text-to-speech key forwarded to launched agents
    #[arg(long, env = "ELEVEN_API_KEY", hide_env_values = true)]
    pub eleven_api_key: Option<String>,

    /// Text-to-speech voice forwarded to launched agents
    #[arg(long, env = "ELEVEN_VOICE_ID")]
    pub eleven_voice_id: Option<String>,
}

/// Split a comma-separated list, trimming entries and dropping empties
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl BackendArgs {
    pub fn subnets(&self) -> Vec<String> {
        split_csv(&self.subnets_csv)
    }

    pub fn security_groups(&self) -> Vec<String> {
        split_csv(&self.secgrps_csv)
    }

    /// Effective backend endpoint
    pub fn endpoint(&self) -> String {
        self.ecs_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://ecs.{}.amazonaws.com", self.aws_region))
    }

    /// Provider keys forwarded into every launched task, in a stable order
    pub fn passthrough_env(&self) -> Vec<(String, String)> {
        [
            ("DEEPGRAM_API_KEY", &self.deepgram_api_key),
            ("ELEVEN_API_KEY", &self.eleven_api_key),
            ("ELEVEN_VOICE_ID", &self.eleven_voice_id),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
        .collect()
    }

    pub fn launcher_config(&self) -> LauncherConfig {
        LauncherConfig {
            cluster: self.ecs_cluster.clone(),
            task_definition: self.agent_task_def.clone(),
            container: self.agent_container.clone(),
            subnets: self.subnets(),
            security_groups: self.security_groups(),
            capacity_provider: self.capacity_provider.clone(),
            assign_public_ip: self.public_ip,
            wait_for_running: (self.wait_for_running_s > 0)
                .then(|| Duration::from_secs(self.wait_for_running_s)),
            passthrough_env: self.passthrough_env(),
            ..LauncherConfig::default()
        }
    }
}

impl Args {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    pub fn assign_timeout(&self) -> Duration {
        Duration::from_millis(self.assign_timeout_ms)
    }

    pub fn assign_poll_interval(&self) -> Duration {
        Duration::from_millis(self.assign_poll_interval_ms)
    }

    /// Claim time-to-live, if enabled
    pub fn claim_ttl(&self) -> Option<Duration> {
        (self.claim_ttl_seconds > 0).then(|| Duration::from_secs(self.claim_ttl_seconds))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.livekit_url.as_deref().map_or(true, str::is_empty) {
            return Err("LIVEKIT_URL is required".to_string());
        }
        if self.livekit_api_key.as_deref().map_or(true, str::is_empty) {
            return Err("LIVEKIT_API_KEY is required".to_string());
        }
        if self.livekit_api_secret.as_deref().map_or(true, str::is_empty) {
            return Err("LIVEKIT_API_SECRET is required".to_string());
        }
        if self.token_ttl_seconds == 0 {
            return Err("CONTROLLER_TOKEN_TTL_SECONDS must be greater than zero".to_string());
        }
        if self.assign_poll_interval_ms == 0 {
            return Err("ASSIGN_POLL_INTERVAL_MS must be greater than zero".to_string());
        }

        if self.mode == Mode::Direct {
            if self.backend.subnets().is_empty() {
                return Err("SUBNETS_CSV is empty; provide at least one subnet id".to_string());
            }
            if self.backend.security_groups().is_empty() {
                return Err(
                    "SECGRPS_CSV is empty; provide at least one security group id".to_string(),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "switchboard",
            "--livekit-url",
            "wss://rooms.example.com",
            "--livekit-api-key",
            "APIkey",
            "--livekit-api-secret",
            "secret",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv(" subnet-a, ,subnet-b ,"), vec!["subnet-a", "subnet-b"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.mode, Mode::Pool);
        assert_eq!(args.token_ttl(), Duration::from_secs(900));
        assert_eq!(args.assign_timeout(), Duration::from_secs(25));
        assert_eq!(args.assign_poll_interval(), Duration::from_millis(500));
        assert_eq!(args.claim_ttl(), None);
        assert_eq!(args.backend.endpoint(), "https://ecs.us-east-1.amazonaws.com");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_mode_and_public_ip_ignore_case() {
        let args = parse(&["--mode", "DIRECT", "--public-ip", "DISABLED"]);
        assert_eq!(args.mode, Mode::Direct);
        assert_eq!(args.backend.public_ip.as_str(), "DISABLED");
    }

    #[test]
    fn test_direct_mode_requires_network_placement() {
        let args = parse(&["--mode", "direct"]);
        assert!(args.validate().unwrap_err().contains("SUBNETS_CSV"));

        let args = parse(&["--mode", "direct", "--subnets-csv", "subnet-a"]);
        assert!(args.validate().unwrap_err().contains("SECGRPS_CSV"));

        let args = parse(&[
            "--mode",
            "direct",
            "--subnets-csv",
            "subnet-a",
            "--secgrps-csv",
            "sg-1",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let args = Args::parse_from(["switchboard", "--livekit-url", "wss://x"]);
        assert!(args.validate().unwrap_err().contains("LIVEKIT_API_KEY"));
    }

    #[test]
    fn test_passthrough_env_order() {
        let args = parse(&["--eleven-voice-id", "voice", "--deepgram-api-key", "dg"]);
        assert_eq!(
            args.backend.passthrough_env(),
            vec![
                ("DEEPGRAM_API_KEY".to_string(), "dg".to_string()),
                ("ELEVEN_VOICE_ID".to_string(), "voice".to_string()),
            ]
        );
    }

    #[test]
    fn test_launcher_config() {
        let args = parse(&["--wait-for-running-s", "30", "--subnets-csv", "a,b"]);
        let config = args.backend.launcher_config();
        assert_eq!(config.subnets, vec!["a", "b"]);
        assert_eq!(config.wait_for_running, Some(Duration::from_secs(30)));
        assert_eq!(config.cluster, "lk-agents");
    }
}
