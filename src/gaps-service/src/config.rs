use clap::Parser;

/// Process-wide configuration (§6.3), parsed once at startup from the
/// environment. Parsing fails fast -- a malformed or missing required
/// variable aborts process startup rather than surfacing as a per-request
/// error later.
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Secrets Manager id holding `{database, username, password}`.
    #[arg(long, env = "RDS_SECRET")]
    pub rds_secret: String,

    /// Database proxy/host to connect through.
    #[arg(long, env = "RDS_PROXY_HOST")]
    pub rds_proxy_host: String,

    /// One of `sit`, `uat`, `prod` (case-insensitive); selects the catalog
    /// base URL.
    #[arg(long, env = "CMR_ENV", default_value = "prod")]
    pub cmr_env: String,

    #[arg(long, env = "AWS_REGION")]
    pub aws_region: String,

    /// KV store of per-collection tolerance overrides.
    #[arg(long, env = "TOLERANCE_TABLE_NAME")]
    pub tolerance_table_name: String,

    #[arg(long, env = "SUBSCRIPTION_ARN_INGEST")]
    pub subscription_arn_ingest: String,

    #[arg(long, env = "SUBSCRIPTION_ARN_DELETION")]
    pub subscription_arn_deletion: String,

    #[arg(long, env = "GAP_REPORT_BUCKET")]
    pub gap_report_bucket: String,

    #[arg(long, env = "GAP_RESPONSE_BUCKET")]
    pub gap_response_bucket: String,

    #[arg(long, env = "QUEUE_URL")]
    pub queue_url: String,

    /// ARN of the deletion-event queue; an inbound event's `eventSourceARN`
    /// is compared against this to decide ingest vs. delete handling.
    #[arg(long, env = "DELETION_QUEUE_ARN")]
    pub deletion_queue_arn: String,
}

impl Config {
    /// Parses configuration from the process environment, failing fast with
    /// a descriptive error if anything required is missing or malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Every field is sourced from `env = "..."`; we deliberately don't
        // forward the Lambda runtime's own argv here.
        Ok(Config::try_parse_from(std::iter::once("gaps-service"))?)
    }
}
